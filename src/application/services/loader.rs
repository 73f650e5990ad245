//! Model document loading
//!
//! Reads YAML/JSON model documents through the filesystem boundary and
//! hands them to the domain builder.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, warn};

use crate::application::{ApplicationError, ApplicationResult, IoResultExt};
use crate::domain::{BuildOptions, DocumentProvider, DomainError, DomainResult, ModelBuilder, ThreatModelGraph};
use crate::infrastructure::traits::FileSystem;
use crate::util::path::PathExt;

/// Parses document text by file extension; anything but `.json` is read as YAML.
pub fn parse_document(path: &Path, content: &str) -> DomainResult<Value> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    let parsed = if is_json {
        serde_json::from_str::<Value>(content).map_err(|e| e.to_string())
    } else {
        serde_yaml::from_str::<Value>(content).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| DomainError::DocumentLoad {
        path: path.to_path_buf(),
        message,
    })
}

/// Service for building the model graph from documents on disk.
pub struct LoaderService {
    fs: Arc<dyn FileSystem>,
}

impl LoaderService {
    pub fn new(fs: Arc<dyn FileSystem>) -> Self {
        Self { fs }
    }

    /// Reads and parses one document.
    pub fn read_document(&self, path: &Path) -> ApplicationResult<Value> {
        let content = self
            .fs
            .read_to_string(path)
            .with_path_context("read model", path)?;
        Ok(parse_document(path, &content)?)
    }

    /// Builds the full graph rooted at `root_path`, following `children` references.
    pub fn load(&self, root_path: &Path, options: BuildOptions) -> ApplicationResult<ThreatModelGraph> {
        debug!("load: root={}", root_path.display());
        if !self.fs.is_file(root_path) {
            return Err(ApplicationError::OperationFailed {
                context: format!("model not found: {}", root_path.display()),
                source: Box::new(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    "no such file",
                )),
            });
        }
        if !root_path.is_model_file() {
            warn!("{} has no .yaml/.yml/.json extension, reading as YAML", root_path.display());
        }
        let doc = self.read_document(root_path)?;
        let graph = ModelBuilder::new(self, options).build(root_path, &doc)?;
        debug!("load: {} nodes", graph.len());
        Ok(graph)
    }

    /// Candidate locations for child `child_id` of a document in `dir`.
    fn child_candidates(dir: &Path, child_id: &str) -> [PathBuf; 2] {
        [
            dir.join(child_id).join(format!("{child_id}.yaml")),
            dir.join(format!("{child_id}.yaml")),
        ]
    }
}

impl DocumentProvider for LoaderService {
    fn load_child(&self, parent_file: &Path, child_id: &str) -> DomainResult<Option<(PathBuf, Value)>> {
        let dir = parent_file.parent().unwrap_or_else(|| Path::new("."));
        let Some(path) = Self::child_candidates(dir, child_id)
            .into_iter()
            .find(|p| self.fs.is_file(p))
        else {
            return Ok(None);
        };
        let content = self
            .fs
            .read_to_string(&path)
            .map_err(|e| DomainError::DocumentLoad {
                path: path.clone(),
                message: e.to_string(),
            })?;
        let doc = parse_document(&path, &content)?;
        debug!("load_child: {} -> {}", child_id, path.display());
        Ok(Some((path, doc)))
    }
}
