//! Application layer: loading, rendering and diagram services
//!
//! This layer orchestrates domain logic and depends on I/O boundary traits.

pub mod diagrams;
pub mod error;
pub mod error_ext;
pub mod report;
pub mod services;

pub use error::{ApplicationError, ApplicationResult};
pub use error_ext::IoResultExt;
