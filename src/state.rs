//! Run history: loading what happened last time, persisting what
//! happened this time.
//!
//! State files are private to lapse: bincode-encoded, keyed by a hash
//! of the working directory and the full argv, and replaced atomically
//! so a crashed write can never leave a half-record behind.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Everything worth remembering about one run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RunState {
    /// Line identity → time since the run epoch of each occurrence, in
    /// observation order.
    pub lines: HashMap<String, Vec<Duration>>,
    /// Wall time from the run epoch to child exit.
    pub duration: Duration,
}

#[derive(Debug, Error)]
pub enum StateError {
    #[error("failed to read state file {}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// A present-but-undecodable file. Distinct from "no prior state",
    /// which is not an error.
    #[error("state file {} is corrupt (delete it to start fresh)", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: bincode::Error,
    },
    #[error("failed to encode run state")]
    Encode {
        #[source]
        source: bincode::Error,
    },
    #[error("failed to write state file {}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to replace state file {}", path.display())]
    Replace {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// On-disk locations for one (directory, argv) session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionPaths {
    pub state: PathBuf,
    pub log: PathBuf,
}

/// Derive the session's file locations.
///
/// The key covers the working directory and every argv element,
/// length-prefixed so adjacent elements cannot alias (`["ab", "c"]` vs
/// `["a", "bc"]`). Same directory and argv → same paths; anything else
/// → a fresh session with no shared history.
pub fn session_paths(state_dir: &Path, cwd: &Path, argv: &[String]) -> SessionPaths {
    let mut hasher = Sha256::new();
    let cwd_bytes = cwd.as_os_str().as_encoded_bytes();
    hasher.update((cwd_bytes.len() as u64).to_le_bytes());
    hasher.update(cwd_bytes);
    for arg in argv {
        hasher.update((arg.len() as u64).to_le_bytes());
        hasher.update(arg.as_bytes());
    }
    let id = hex::encode(&hasher.finalize()[..6]);

    SessionPaths {
        state: state_dir.join(format!("lapse-{id}.state")),
        log: state_dir.join(format!("lapse-{id}.log")),
    }
}

/// Load the previous run's state, if any.
///
/// A missing file means "first run" and is `Ok(None)`; every other
/// failure is surfaced.
pub fn load(path: &Path) -> Result<Option<RunState>, StateError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(StateError::Read {
                path: path.to_path_buf(),
                source: e,
            });
        }
    };

    let state = bincode::deserialize(&bytes).map_err(|e| StateError::Corrupt {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(Some(state))
}

/// Persist a completed run, replacing any previous record.
///
/// Encodes into a sibling `.tmp` file and renames it over the target,
/// so readers only ever see the old record or the complete new one.
pub fn store(path: &Path, state: &RunState) -> Result<(), StateError> {
    let bytes = bincode::serialize(state).map_err(|e| StateError::Encode { source: e })?;

    let mut tmp_name = path.as_os_str().to_os_string();
    tmp_name.push(".tmp");
    let tmp = PathBuf::from(tmp_name);

    fs::write(&tmp, &bytes).map_err(|e| StateError::Write {
        path: tmp.clone(),
        source: e,
    })?;

    fs::rename(&tmp, path).map_err(|e| {
        let _ = fs::remove_file(&tmp);
        StateError::Replace {
            path: path.to_path_buf(),
            source: e,
        }
    })
}
