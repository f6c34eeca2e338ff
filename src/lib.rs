pub mod error;
pub mod replay;
pub mod report;
pub mod trace;
