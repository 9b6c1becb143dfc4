//! # hare-stamp
//!
//! Timestamped, collision-refusing relocation of files into the processed
//! directory.
//!
//! Call [`stamp_and_move`] to move a file to
//! `<dest_dir>/YYYYMMDD_HHMMSS_<basename>`, or [`delete_matching_file`] to
//! clean up whatever a previous run left behind.

pub mod cleanup;
pub mod error;
pub mod stamper;

pub use cleanup::delete_matching_file;
pub use error::StampError;
pub use stamper::{
    stamp_and_move, stamp_and_move_at, stamped_destination, timestamp_prefix, STAMP_LEN,
};
