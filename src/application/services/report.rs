//! Report building service
//!
//! Renders the markdown report for a loaded graph, writes it together with
//! its HTML page and copies static asset directories into the output.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::application::report::{render_report, Fragments, ReportOptions, ReportTemplate};
use crate::application::report::html::wrap_page;
use crate::application::{ApplicationResult, IoResultExt};
use crate::config::Settings;
use crate::domain::ThreatModelGraph;
use crate::infrastructure::traits::FileSystem;

const PRE_PREFIX: &str = "pre_";
const POST_PREFIX: &str = "post_";
const ASSETS_DIR: &str = "assets";

/// Files produced by one report build.
#[derive(Debug, Clone)]
pub struct ReportArtifacts {
    pub markdown: PathBuf,
    pub html: PathBuf,
}

/// Service for rendering and writing reports.
pub struct ReportService {
    fs: Arc<dyn FileSystem>,
    settings: Arc<Settings>,
}

impl ReportService {
    pub fn new(fs: Arc<dyn FileSystem>, settings: Arc<Settings>) -> Self {
        Self { fs, settings }
    }

    /// Render options derived from the settings, fragments read from disk.
    pub fn options(&self) -> ApplicationResult<ReportOptions> {
        let template: ReportTemplate = self.settings.template.parse()?;
        let fragments = match &self.settings.fragment_dir {
            Some(dir) => self.read_fragments(dir)?,
            None => None,
        };
        Ok(ReportOptions {
            template,
            ancestor_data: self.settings.ancestor_data,
            header_level: 1,
            main_title: self.settings.main_title.clone(),
            heading_numbering: self.settings.heading_numbering,
            process_toc: self.settings.process_toc,
            top_level: self.settings.top_level,
            fragments,
        })
    }

    /// `pre_*.md` and `post_*.md` files of `dir`, each list sorted by file name.
    ///
    /// `None` when `dir` does not exist: the report is then rendered without fragment injection.
    pub fn read_fragments(&self, dir: &Path) -> ApplicationResult<Option<Fragments>> {
        if !self.fs.is_dir(dir) {
            warn!("fragment directory {} not found", dir.display());
            return Ok(None);
        }
        let mut fragments = Fragments::default();
        for path in self
            .fs
            .read_dir_sorted(dir)
            .with_path_context("list fragments", dir)?
        {
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };
            if !name.ends_with(".md") || !self.fs.is_file(&path) {
                continue;
            }
            let target = if name.starts_with(PRE_PREFIX) {
                &mut fragments.pre
            } else if name.starts_with(POST_PREFIX) {
                &mut fragments.post
            } else {
                continue;
            };
            target.push(
                self.fs
                    .read_to_string(&path)
                    .with_path_context("read fragment", &path)?,
            );
        }
        debug!(
            "read_fragments: pre={}, post={}",
            fragments.pre.len(),
            fragments.post.len()
        );
        Ok(Some(fragments))
    }

    /// Report file stem: configured override or the root model id.
    pub fn base_name(&self, g: &ThreatModelGraph) -> String {
        self.settings
            .base_file_name
            .clone()
            .unwrap_or_else(|| g.object(g.root()).id.clone())
    }

    /// Renders the root model to markdown.
    pub fn render(&self, g: &ThreatModelGraph) -> ApplicationResult<String> {
        let options = self.options()?;
        Ok(render_report(g, g.root(), &options))
    }

    /// Renders and writes `{base}.md` and `{base}.html` into `out_dir`.
    pub fn build(&self, g: &ThreatModelGraph, out_dir: &Path) -> ApplicationResult<ReportArtifacts> {
        let markdown = self.render(g)?;
        let base = self.base_name(g);

        self.fs
            .create_dir_all(out_dir)
            .with_path_context("create output directory", out_dir)?;

        let md_path = out_dir.join(format!("{base}.md"));
        self.fs
            .write_atomic(&md_path, &markdown)
            .with_path_context("write report", &md_path)?;
        info!("wrote {}", md_path.display());

        let html_path = out_dir.join(format!("{base}.html"));
        self.fs
            .write_atomic(&html_path, &wrap_page(&markdown))
            .with_path_context("write report", &html_path)?;
        info!("wrote {}", html_path.display());

        Ok(ReportArtifacts {
            markdown: md_path,
            html: html_path,
        })
    }

    /// Copies every model's `assets/` directory and the configured asset dirs into `out_dir`.
    pub fn copy_assets(&self, g: &ThreatModelGraph, out_dir: &Path) -> ApplicationResult<usize> {
        let root = g.root();
        let mut sources: Vec<PathBuf> = Vec::new();
        for tm in std::iter::once(root).chain(g.descendants_tm(root)) {
            let Some(data) = g.threat_model(tm) else {
                continue;
            };
            if let Some(dir) = data.file.parent() {
                let assets = dir.join(ASSETS_DIR);
                if !sources.contains(&assets) {
                    sources.push(assets);
                }
            }
        }
        sources.extend(self.settings.asset_dirs.iter().map(PathBuf::from));

        let mut copied = 0;
        for src in sources.iter().filter(|p| self.fs.is_dir(p)) {
            self.fs
                .copy_dir(src, out_dir)
                .with_path_context("copy assets", src)?;
            debug!("copy_assets: {} -> {}", src.display(), out_dir.display());
            copied += 1;
        }
        Ok(copied)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{BuildOptions, DocumentProvider, DomainResult, ModelBuilder};
    use crate::infrastructure::traits::RealFileSystem;
    use serde_json::Value;
    use tempfile::TempDir;

    struct NoChildren;

    impl DocumentProvider for NoChildren {
        fn load_child(&self, _: &Path, _: &str) -> DomainResult<Option<(PathBuf, Value)>> {
            Ok(None)
        }
    }

    fn service(settings: Settings) -> ReportService {
        ReportService::new(Arc::new(RealFileSystem), Arc::new(settings))
    }

    #[test]
    fn given_fragment_dir_when_reading_then_split_by_prefix_in_name_order() {
        // Arrange
        let dir = TempDir::new().unwrap();
        for (name, body) in [
            ("pre_2.md", "# Two"),
            ("pre_1.md", "# One"),
            ("post_1.md", "# After"),
            ("notes.md", "# Ignored"),
            ("pre_3.txt", "# Ignored"),
        ] {
            std::fs::write(dir.path().join(name), body).unwrap();
        }

        // Act
        let fragments = service(Settings::default())
            .read_fragments(dir.path())
            .unwrap()
            .expect("fragment dir exists");

        // Assert
        assert_eq!(fragments.pre, vec!["# One", "# Two"]);
        assert_eq!(fragments.post, vec!["# After"]);
    }

    #[test]
    fn given_missing_fragment_dir_when_reading_then_none() {
        let fragments = service(Settings::default())
            .read_fragments(Path::new("/nonexistent/fragments"))
            .unwrap();
        assert!(fragments.is_none());
    }

    #[test]
    fn given_missing_fragment_dir_when_rendering_then_toc_kept() {
        // Arrange
        let doc = serde_json::json!({
            "ID": "Root",
            "title": "Root System",
            "scope": {"description": "Everything"},
            "threats": [
                {"ID": "T1", "title": "Open threat", "attack": "a", "threatType": "Tampering"}
            ]
        });
        let g = ModelBuilder::new(&NoChildren, BuildOptions::default())
            .build(Path::new("Root.yaml"), &doc)
            .unwrap();
        let plain = service(Settings::default());
        let missing = service(Settings {
            fragment_dir: Some(PathBuf::from("/nonexistent/fragments")),
            ..Settings::default()
        });

        // Act
        let expected = plain.render(&g).unwrap();
        let options = missing.options().unwrap();
        let actual = missing.render(&g).unwrap();

        // Assert
        assert!(options.fragments.is_none());
        assert!(actual.contains("* **[1 Executive Summary]"));
        assert_eq!(
            actual.lines().filter(|l| l.starts_with('#')).collect::<Vec<_>>(),
            expected.lines().filter(|l| l.starts_with('#')).collect::<Vec<_>>()
        );
    }

    #[test]
    fn given_unknown_template_when_building_options_then_error() {
        let svc = service(Settings {
            template: "TM_templateFancy".into(),
            ..Settings::default()
        });
        assert!(svc.options().is_err());
    }
}
