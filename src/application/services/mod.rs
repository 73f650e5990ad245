//! Application services
//!
//! Concrete service implementations that orchestrate domain logic.
//! Services depend on I/O boundary traits (FileSystem, CommandRunner)
//! but are themselves concrete structs, not traits.

mod diagram;
mod loader;
mod publish;
mod report;

pub use diagram::DiagramService;
pub use loader::{parse_document, LoaderService};
pub use publish::{PublishService, ToolOutcome};
pub use report::{ReportArtifacts, ReportService};
