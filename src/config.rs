//! Configuration management with layered loading
//!
//! Precedence (lowest to highest):
//! 1. Compiled defaults
//! 2. Global config: `$XDG_CONFIG_HOME/tmreport/tmreport.toml`
//! 3. Local config: `<model_dir>/.tmreport.toml` (next to the root document)
//! 4. Environment variables: `TMREPORT_*` prefix
//!
//! CLI flags are applied on top by the command layer.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use config::{Config, ConfigError, Environment};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::application::ApplicationError;
use crate::domain::Visibility;
use crate::util::path::{expand_env_vars, PathExt};

pub const DEFAULT_TEMPLATE: &str = "TM_templateFull";

/// External programs run after the report is written.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(default)]
pub struct ToolsConfig {
    /// Diagram renderer, invoked as `<cmd> <file.puml>...`
    pub plantuml: Option<String>,
    /// HTML to PDF converter, invoked as `<cmd> <in.html> <out.pdf>`
    pub pdf: Option<String>,
}

/// Raw settings for intermediate parsing; `None` means "not specified, inherit".
#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawSettings {
    pub template: Option<String>,
    pub visibility: Option<Visibility>,
    pub main_title: Option<String>,
    pub heading_numbering: Option<bool>,
    pub process_toc: Option<bool>,
    pub top_level: Option<usize>,
    pub ancestor_data: Option<bool>,
    pub output_dir: Option<PathBuf>,
    pub base_file_name: Option<String>,
    pub fragment_dir: Option<PathBuf>,
    pub versions_filter: Option<String>,
    pub asset_dirs: Option<Vec<String>>,
    pub tools: RawToolsConfig,
}

#[derive(Debug, Clone, Deserialize, Default)]
#[serde(default)]
pub struct RawToolsConfig {
    pub plantuml: Option<String>,
    pub pdf: Option<String>,
}

/// Unified configuration for tmreport.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    /// Section layout variant
    pub template: String,
    pub visibility: Visibility,
    /// Replaces the root model title in the report heading
    pub main_title: Option<String>,
    pub heading_numbering: bool,
    pub process_toc: bool,
    /// Markdown depth that numbers as "1"
    pub top_level: usize,
    /// Note objectives inherited from ancestor models
    pub ancestor_data: bool,
    pub output_dir: PathBuf,
    /// Report file name without extension (default: root model id)
    pub base_file_name: Option<String>,
    /// Directory with `pre_*.md` / `post_*.md` fragments
    pub fragment_dir: Option<PathBuf>,
    /// Comma separated version list
    pub versions_filter: Option<String>,
    /// Extra directories copied into the output directory
    pub asset_dirs: Vec<String>,
    pub tools: ToolsConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            template: DEFAULT_TEMPLATE.to_string(),
            visibility: Visibility::Full,
            main_title: None,
            heading_numbering: true,
            process_toc: true,
            top_level: 1,
            ancestor_data: true,
            output_dir: PathBuf::from("build"),
            base_file_name: None,
            fragment_dir: None,
            versions_filter: None,
            asset_dirs: Vec::new(),
            tools: ToolsConfig::default(),
        }
    }
}

/// Get the XDG config directory for tmreport.
pub fn global_config_dir() -> Option<PathBuf> {
    ProjectDirs::from("", "", "tmreport").map(|dirs| dirs.config_dir().to_path_buf())
}

/// Get the path to the global config file.
pub fn global_config_path() -> Option<PathBuf> {
    global_config_dir().map(|dir| dir.join("tmreport.toml"))
}

/// Get the path to the local config file next to a model document.
pub fn local_config_path(model_dir: &Path) -> PathBuf {
    model_dir.join(".tmreport.toml")
}

/// Load a TOML file into RawSettings for manual merging.
fn load_raw_settings(path: &Path) -> Result<RawSettings, ApplicationError> {
    let content = std::fs::read_to_string(path).map_err(|e| ApplicationError::Config {
        message: format!("read {}: {}", path.display(), e),
    })?;
    toml::from_str(&content).map_err(|e| ApplicationError::Config {
        message: format!("parse {}: {}", path.display(), e),
    })
}

impl Settings {
    /// Union of two directory lists; `!dir` in the overlay removes an inherited entry.
    pub fn merge_array(base: &[String], overlay: &[String]) -> Vec<String> {
        let mut result: BTreeSet<String> = base.iter().cloned().collect();
        for item in overlay {
            if let Some(negated) = item.strip_prefix('!') {
                result.remove(negated);
            } else {
                result.insert(item.clone());
            }
        }
        result.into_iter().collect()
    }

    /// Expand shell variables and tilde in path-like fields.
    fn expand_paths(&mut self) {
        self.output_dir = self.output_dir.expanded();
        self.fragment_dir = self.fragment_dir.as_deref().map(PathExt::expanded);
        self.asset_dirs = self.asset_dirs.iter().map(|d| expand_env_vars(d)).collect();
    }

    fn apply_scalars(&self, raw: &RawSettings) -> Self {
        Self {
            template: raw.template.clone().unwrap_or_else(|| self.template.clone()),
            visibility: raw.visibility.unwrap_or(self.visibility),
            main_title: raw.main_title.clone().or_else(|| self.main_title.clone()),
            heading_numbering: raw.heading_numbering.unwrap_or(self.heading_numbering),
            process_toc: raw.process_toc.unwrap_or(self.process_toc),
            top_level: raw.top_level.unwrap_or(self.top_level),
            ancestor_data: raw.ancestor_data.unwrap_or(self.ancestor_data),
            output_dir: raw.output_dir.clone().unwrap_or_else(|| self.output_dir.clone()),
            base_file_name: raw
                .base_file_name
                .clone()
                .or_else(|| self.base_file_name.clone()),
            fragment_dir: raw.fragment_dir.clone().or_else(|| self.fragment_dir.clone()),
            versions_filter: raw
                .versions_filter
                .clone()
                .or_else(|| self.versions_filter.clone()),
            asset_dirs: self.asset_dirs.clone(),
            tools: ToolsConfig {
                plantuml: raw.tools.plantuml.clone().or_else(|| self.tools.plantuml.clone()),
                pdf: raw.tools.pdf.clone().or_else(|| self.tools.pdf.clone()),
            },
        }
    }

    /// Apply global config onto defaults; lists REPLACE.
    fn apply_global(&self, global: &RawSettings) -> Self {
        let mut merged = self.apply_scalars(global);
        if let Some(dirs) = &global.asset_dirs {
            merged.asset_dirs = dirs.clone();
        }
        merged
    }

    /// Merge local config onto self; lists UNION with `!` negation.
    fn merge_with(&self, overlay: &RawSettings) -> Self {
        let mut merged = self.apply_scalars(overlay);
        if let Some(dirs) = &overlay.asset_dirs {
            merged.asset_dirs = Self::merge_array(&self.asset_dirs, dirs);
        }
        merged
    }

    /// Load settings with layered precedence.
    ///
    /// # Arguments
    /// * `model_dir` - Directory of the root document, searched for `.tmreport.toml`
    pub fn load(model_dir: Option<&Path>) -> Result<Self, ApplicationError> {
        let mut current = Self::default();

        if let Some(global_path) = global_config_path() {
            if global_path.exists() {
                let raw = load_raw_settings(&global_path)?;
                current = current.apply_global(&raw);
            }
        }

        if let Some(dir) = model_dir {
            let local_path = local_config_path(dir);
            if local_path.exists() {
                let raw = load_raw_settings(&local_path)?;
                current = current.merge_with(&raw);
            }
        }

        current = Self::apply_env_overrides(current)?;
        current.expand_paths();

        Ok(current)
    }

    /// Apply TMREPORT_* environment variables as explicit overrides.
    fn apply_env_overrides(mut settings: Self) -> Result<Self, ApplicationError> {
        let config = Config::builder()
            .add_source(
                Environment::with_prefix("TMREPORT")
                    .separator("__")
                    .list_separator(",")
                    .with_list_parse_key("asset_dirs")
                    .try_parsing(true),
            )
            .build()
            .map_err(config_err)?;

        if let Ok(val) = config.get_string("template") {
            settings.template = val;
        }
        if let Ok(val) = config.get_string("visibility") {
            settings.visibility = val
                .parse()
                .map_err(|message| ApplicationError::Config { message })?;
        }
        if let Ok(val) = config.get_string("main_title") {
            settings.main_title = Some(val);
        }
        if let Ok(val) = config.get_bool("heading_numbering") {
            settings.heading_numbering = val;
        }
        if let Ok(val) = config.get_bool("process_toc") {
            settings.process_toc = val;
        }
        if let Ok(val) = config.get_int("top_level") {
            settings.top_level = usize::try_from(val).map_err(|_| ApplicationError::Config {
                message: format!("top_level must be positive, got {val}"),
            })?;
        }
        if let Ok(val) = config.get_bool("ancestor_data") {
            settings.ancestor_data = val;
        }
        if let Ok(val) = config.get_string("output_dir") {
            settings.output_dir = PathBuf::from(val);
        }
        if let Ok(val) = config.get_string("base_file_name") {
            settings.base_file_name = Some(val);
        }
        if let Ok(val) = config.get_string("fragment_dir") {
            settings.fragment_dir = Some(PathBuf::from(val));
        }
        if let Ok(val) = config.get_string("versions_filter") {
            settings.versions_filter = Some(val);
        }
        if let Ok(val) = config.get::<Vec<String>>("asset_dirs") {
            settings.asset_dirs = val;
        }
        if let Ok(val) = config.get_string("tools.plantuml") {
            settings.tools.plantuml = Some(val);
        }
        if let Ok(val) = config.get_string("tools.pdf") {
            settings.tools.pdf = Some(val);
        }

        Ok(settings)
    }

    /// Show the effective configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ApplicationError> {
        toml::to_string_pretty(self).map_err(|e| ApplicationError::Config {
            message: format!("serialize config: {e}"),
        })
    }

    /// Generate a template config file.
    pub fn template() -> String {
        r#"# tmreport configuration
#
# Locations (by precedence, lowest to highest):
#   Global: ~/.config/tmreport/tmreport.toml
#   Local:  <model_dir>/.tmreport.toml    (next to the root document)
#   Env:    TMREPORT_* environment variables (e.g. TMREPORT_TOOLS__PDF)
#   CLI flags override everything.
#
# asset_dirs from the local config are merged with the global list;
# use "!dir" to remove an inherited entry.

# Section layout: TM_templateFull | TM_templateMKDOCS | TM_templateNoTocNoSummary
# template = "TM_templateFull"

# full | public (public drops `public: false` items and ticket links)
# visibility = "full"

# main_title = "Acme Platform Threat Model"
# heading_numbering = true
# process_toc = true
# top_level = 1
# ancestor_data = true

# output_dir = "build"
# base_file_name = "report"
# fragment_dir = "fragments"
# versions_filter = "1.0,2.0"
# asset_dirs = ["~/tm/shared-assets"]

[tools]
# plantuml = "plantuml -tsvg"
# pdf = "wkhtmltopdf"
"#
        .to_string()
    }
}

fn config_err(e: ConfigError) -> ApplicationError {
    ApplicationError::Config {
        message: e.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn given_defaults_when_created_then_full_template_and_numbering() {
        let settings = Settings::default();
        assert_eq!(settings.template, "TM_templateFull");
        assert_eq!(settings.visibility, Visibility::Full);
        assert!(settings.heading_numbering);
        assert!(settings.process_toc);
        assert_eq!(settings.top_level, 1);
        assert_eq!(settings.output_dir, PathBuf::from("build"));
    }

    #[test]
    fn given_tilde_in_paths_when_expand_paths_then_expands_to_home() {
        let mut settings = Settings {
            output_dir: PathBuf::from("~/reports"),
            fragment_dir: Some(PathBuf::from("$HOME/fragments")),
            asset_dirs: vec!["${HOME}/assets".to_string()],
            ..Settings::default()
        };

        settings.expand_paths();

        let home = std::env::var("HOME").expect("HOME should be set");
        assert!(settings.output_dir.to_string_lossy().starts_with(&home));
        assert!(settings
            .fragment_dir
            .as_ref()
            .is_some_and(|d| d.to_string_lossy().starts_with(&home)));
        assert!(settings.asset_dirs[0].starts_with(&home));
    }

    #[test]
    fn given_overlay_when_merging_then_scalars_win_and_lists_union() {
        let base = Settings {
            asset_dirs: vec!["shared".to_string(), "old".to_string()],
            ..Settings::default()
        };
        let overlay: RawSettings = toml::from_str(
            r#"
            template = "TM_templateMKDOCS"
            visibility = "public"
            asset_dirs = ["local", "!old"]
            [tools]
            pdf = "wkhtmltopdf"
            "#,
        )
        .expect("parse overlay");

        let merged = base.merge_with(&overlay);

        assert_eq!(merged.template, "TM_templateMKDOCS");
        assert_eq!(merged.visibility, Visibility::Public);
        assert_eq!(merged.asset_dirs, vec!["local".to_string(), "shared".to_string()]);
        assert_eq!(merged.tools.pdf.as_deref(), Some("wkhtmltopdf"));
        assert!(merged.heading_numbering);
    }

    #[test]
    fn given_global_lists_when_applying_then_replaced() {
        let base = Settings {
            asset_dirs: vec!["default".to_string()],
            ..Settings::default()
        };
        let global = RawSettings {
            asset_dirs: Some(vec!["global".to_string()]),
            ..RawSettings::default()
        };

        let applied = base.apply_global(&global);

        assert_eq!(applied.asset_dirs, vec!["global".to_string()]);
    }

    #[test]
    fn given_template_when_parsed_then_valid_toml() {
        let raw: Result<RawSettings, _> = toml::from_str(&Settings::template());
        assert!(raw.is_ok());
    }

    #[test]
    fn given_settings_when_serialized_then_round_trips() {
        let settings = Settings {
            main_title: Some("Platform".into()),
            ..Settings::default()
        };
        let text = settings.to_toml().expect("serialize");
        let back: Settings = toml::from_str(&text).expect("parse");
        assert_eq!(back, settings);
    }
}
