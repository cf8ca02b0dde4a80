//! # Operators
//!
//! The declarative operations the host framework invokes, one module per
//! concern. All of them are methods on [`crate::provider::Provider`]; each
//! builds a reference from a logical path, calls one backend method and
//! adapts the result.

pub mod auth;
pub mod disconnect;
pub mod listen;
pub mod read;
pub mod storage;
pub mod task;
pub mod write;

pub use read::ValueResult;
pub use storage::PutOptions;
pub use task::ExecutionDetails;
