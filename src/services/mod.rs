//! 서비스 모듈.

pub mod dump;

pub use dump::{dump_table, dump_to_file, DumpSummary, PageSource};
