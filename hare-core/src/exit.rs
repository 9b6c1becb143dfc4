//! Process exit codes reported by the daemon.
//!
//! `0` is success and any value in `1..=133` is the errno of the syscall that
//! failed. The remaining codes are sentinels that never collide with an errno.

/// The daemon processed its event.
pub const EXIT_SUCCESS: i32 = 0;

/// Caller or input misuse (the `-1` sentinel, as an 8-bit exit status).
pub const EXIT_BAD_INPUT: i32 = 255;

/// The event named a file that could not be located under the watched directory.
pub const EXIT_NO_MATCH: i32 = 254;

/// The channel was closed, or stayed empty past the idle-poll limit.
pub const EXIT_NO_EVENT: i32 = 253;

/// Human-readable label for an exit code, used in harness reports.
pub fn describe(code: i32) -> String {
    match code {
        EXIT_SUCCESS => "success".to_string(),
        EXIT_BAD_INPUT => "bad input".to_string(),
        EXIT_NO_MATCH => "no matching file".to_string(),
        EXIT_NO_EVENT => "no event received".to_string(),
        errno => std::io::Error::from_raw_os_error(errno).to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sentinels_are_distinct() {
        let codes = [EXIT_SUCCESS, EXIT_BAD_INPUT, EXIT_NO_MATCH, EXIT_NO_EVENT];
        for (i, a) in codes.iter().enumerate() {
            for b in &codes[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn describe_falls_back_to_os_error_text() {
        assert_eq!(describe(EXIT_NO_MATCH), "no matching file");
        let text = describe(2);
        assert!(text.contains("os error 2"), "got: {text}");
    }
}
