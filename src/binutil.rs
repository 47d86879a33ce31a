use derive_more::*;
use directories::ProjectDirs;
use std::{fmt::Display, path::PathBuf};

/// Where the router looks for its config file, if `--config` isn't given
/// explicitly (spec.md's ambient configuration section).
#[derive(Debug, Deref, DerefMut, FromStr)]
pub struct RouterDataDir(pub PathBuf);

impl Default for RouterDataDir {
    fn default() -> Self {
        Self(
            ProjectDirs::from("", "", "multisentry")
                .map(|pd| pd.config_dir().to_path_buf())
                .unwrap_or_else(|| "data".into()),
        )
    }
}

impl Display for RouterDataDir {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.as_os_str().to_str().unwrap())
    }
}
