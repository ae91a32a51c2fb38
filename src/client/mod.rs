//! HTTP 클라이언트 모듈.

pub mod xata;

pub use xata::XataClient;
