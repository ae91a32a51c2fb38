//! 설정 모듈.

pub mod env;
pub mod logging;

pub use env::*;
pub use logging::init_tracing;
