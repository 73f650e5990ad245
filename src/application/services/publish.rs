//! External post-processing: diagram rendering and PDF conversion
//!
//! Runs after the report is written. A failing tool is logged and reported
//! back to the caller, but never turns into an error.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::config::Settings;
use crate::infrastructure::traits::{CommandRunner, FileSystem};
use crate::infrastructure::InfraError;

/// Result of one external tool step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolOutcome {
    /// No command configured
    Skipped,
    Succeeded,
    Failed(String),
}

/// Service for driving the configured external tools.
pub struct PublishService {
    fs: Arc<dyn FileSystem>,
    cmd: Arc<dyn CommandRunner>,
    settings: Arc<Settings>,
}

impl PublishService {
    pub fn new(fs: Arc<dyn FileSystem>, cmd: Arc<dyn CommandRunner>, settings: Arc<Settings>) -> Self {
        Self { fs, cmd, settings }
    }

    /// Renders diagram sources with `tools.plantuml`.
    pub fn render_diagrams(&self, sources: &[PathBuf]) -> ToolOutcome {
        let Some(command) = self.settings.tools.plantuml.as_deref() else {
            debug!("render_diagrams: no plantuml command configured");
            return ToolOutcome::Skipped;
        };
        if sources.is_empty() {
            return ToolOutcome::Skipped;
        }
        let files: Vec<String> = sources.iter().map(|p| p.display().to_string()).collect();
        self.run_tool(command, &files)
    }

    /// Converts `html` to `pdf` with `tools.pdf`.
    pub fn convert_pdf(&self, html: &Path, pdf: &Path) -> ToolOutcome {
        let Some(command) = self.settings.tools.pdf.as_deref() else {
            debug!("convert_pdf: no pdf command configured");
            return ToolOutcome::Skipped;
        };
        if !self.fs.is_file(html) {
            let message = format!("input not found: {}", html.display());
            warn!("pdf conversion skipped: {}", message);
            return ToolOutcome::Failed(message);
        }
        let outcome = self.run_tool(
            command,
            &[html.display().to_string(), pdf.display().to_string()],
        );
        if outcome == ToolOutcome::Succeeded {
            info!("wrote {}", pdf.display());
        }
        outcome
    }

    /// `command` may carry its own leading arguments, e.g. `plantuml -tsvg`.
    fn run_tool(&self, command: &str, extra: &[String]) -> ToolOutcome {
        let mut parts = command.split_whitespace();
        let Some(program) = parts.next() else {
            return ToolOutcome::Skipped;
        };
        let args: Vec<&str> = parts.chain(extra.iter().map(String::as_str)).collect();
        debug!("run_tool: {} {:?}", program, args);

        let error = match self.cmd.run(program, &args) {
            Ok(output) if output.status.success() => return ToolOutcome::Succeeded,
            Ok(output) => InfraError::ExternalTool {
                tool: program.to_string(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            },
            Err(e) => InfraError::ExternalTool {
                tool: program.to_string(),
                message: e.to_string(),
            },
        };
        warn!("{}", error);
        ToolOutcome::Failed(error.to_string())
    }
}
