//! Optional per-directory configuration.
//!
//! A `.lapse.toml` next to where the command is invoked can pin the
//! fingerprint mode and switch off the shell re-invocation, pager, or
//! completion bell. Every field has a default; no file means defaults.
//!
//! ```toml
//! fingerprint = "raw"
//! use-shell = false
//! state-dir = "/home/user/.cache/lapse"
//! ```

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::fingerprint::FingerprintMode;

const CONFIG_FILENAME: &str = ".lapse.toml";

#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct Config {
    /// How output lines are identified across runs.
    #[serde(default)]
    pub fingerprint: FingerprintMode,
    /// Re-invoke through `$SHELL -ic` when a shell is configured.
    #[serde(default = "default_true")]
    pub use_shell: bool,
    /// Launch `$PAGER` on the log after a run with history.
    #[serde(default = "default_true")]
    pub pager: bool,
    /// Ring the terminal bell when the command finishes.
    #[serde(default = "default_true")]
    pub bell: bool,
    /// Where state and log files live. Defaults to the platform temp
    /// directory.
    #[serde(default)]
    pub state_dir: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            fingerprint: FingerprintMode::default(),
            use_shell: true,
            pager: true,
            bell: true,
            state_dir: None,
        }
    }
}

impl Config {
    /// Load `.lapse.toml` from the working directory.
    ///
    /// Returns the config and the path it came from; a missing file is
    /// the defaults, a file that fails to parse is an error.
    pub fn load(cwd: &Path) -> Result<(Self, Option<PathBuf>)> {
        let path = cwd.join(CONFIG_FILENAME);
        if !path.is_file() {
            return Ok((Self::default(), None));
        }

        let raw = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        let config = toml::from_str(&raw)
            .with_context(|| format!("failed to parse {}", path.display()))?;
        Ok((config, Some(path)))
    }
}
