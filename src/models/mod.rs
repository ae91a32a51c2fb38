//! Model module.
//!
//! Contains the collected-record builder, the query paging bodies and
//! record sanitizing.

pub mod notify;
pub mod page;
pub mod record;

pub use notify::*;
pub use page::*;
pub use record::*;
