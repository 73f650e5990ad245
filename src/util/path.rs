use std::ffi::OsStr;
use std::path::{Path, PathBuf};

/// Expands `~`, `$VAR` and `${VAR}`; unresolvable input is returned unchanged.
pub fn expand_env_vars(path: &str) -> String {
    shellexpand::full(path)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| path.to_string())
}

pub trait PathExt {
    fn is_model_file(&self) -> bool;
    fn expanded(&self) -> PathBuf;
}

impl PathExt for Path {
    /// YAML or JSON document.
    fn is_model_file(&self) -> bool {
        matches!(
            self.extension().and_then(OsStr::to_str),
            Some("yaml") | Some("yml") | Some("json")
        )
    }

    fn expanded(&self) -> PathBuf {
        PathBuf::from(expand_env_vars(&self.to_string_lossy()))
    }
}
