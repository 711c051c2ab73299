//! Incremental tweet fetching: cursor, pager, fan-out and row mapping.

pub mod backoff;
pub mod budget;
pub mod coordinator;
pub mod cursor;
pub mod mapper;
pub mod pager;

pub use coordinator::{Coordinator, CycleReport, FetchSettings};
pub use cursor::FetchCursor;
pub use pager::{Pager, SpecFetch};
