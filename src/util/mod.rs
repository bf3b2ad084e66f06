pub mod format;
pub mod hint;
pub mod print;
