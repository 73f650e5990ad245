//! Domain layer: model graph, construction rules and scoring
//!
//! This layer is independent of external concerns (no I/O, no CLI, no config loading).

pub mod arena;
pub mod builder;
pub mod cvss;
pub mod entities;
pub mod error;
pub mod filter;
pub mod model;
pub mod object;

pub use arena::{TreeArena, TreeNode};
pub use builder::{parse_versions_filter, BuildOptions, DocumentProvider, ModelBuilder};
pub use cvss::{Cvss, CvssVector, Severity};
pub use entities::*;
pub use error::{DomainError, DomainResult};
pub use filter::Visibility;
pub use model::ThreatModelGraph;
pub use object::{ModelObject, RawMap};
