//! Diagram source writing service

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::info;

use crate::application::diagrams::generate_all;
use crate::application::{ApplicationResult, IoResultExt};
use crate::domain::ThreatModelGraph;
use crate::infrastructure::traits::FileSystem;

/// Service for writing `.puml` sources below an output directory.
pub struct DiagramService {
    fs: Arc<dyn FileSystem>,
}

impl DiagramService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Writes every diagram source; returns the absolute paths written.
    pub fn write_all(&self, g: &ThreatModelGraph, out_dir: &Path) -> ApplicationResult<Vec<PathBuf>> {
        let mut written = Vec::new();
        for diagram in generate_all(g) {
            let path = out_dir.join(&diagram.path);
            self.fs
                .write_atomic(&path, &diagram.source)
                .with_path_context("write diagram", &path)?;
            written.push(path);
        }
        info!("wrote {} diagram sources to {}", written.len(), out_dir.display());
        Ok(written)
    }
}
