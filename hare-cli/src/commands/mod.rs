pub mod find;
pub mod run;
pub mod stamp;
