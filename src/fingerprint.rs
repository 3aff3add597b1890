//! Line identity tracking for a single run.
//!
//! Every output line is reduced to a stable identity and the time since
//! the run epoch is appended to that identity's history. Matching a
//! line between runs uses the identity *and* how many times it has been
//! seen so far, so repeated content ("Compiling foo", "Compiling foo")
//! lands on the right occurrence even when other lines move around.

use std::collections::HashMap;
use std::time::Duration;

use serde::Deserialize;
use sha2::{Digest, Sha256};

use crate::state::RunState;

/// How a line's identity is derived.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FingerprintMode {
    /// SHA-256 of the raw line bytes. Constant memory per distinct line;
    /// collisions are treated as content equality.
    #[default]
    Hashed,
    /// The line content itself. No collisions, costs memory on chatty
    /// commands.
    Raw,
}

/// One recorded line event: which identity, and which repetition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Observation {
    pub key: String,
    /// 0-based occurrence index of this content within the run.
    pub index: usize,
}

/// Per-run store of line identity → relative observation times.
///
/// Single writer: only the stream reader records into it. Timestamps
/// are supplied by the caller as durations since the run epoch, which
/// keeps the store deterministic under test.
#[derive(Debug)]
pub struct LineLog {
    mode: FingerprintMode,
    lines: HashMap<String, Vec<Duration>>,
}

impl LineLog {
    pub fn new(mode: FingerprintMode) -> Self {
        Self {
            mode,
            lines: HashMap::new(),
        }
    }

    /// Record one line observed `delta` after the run epoch.
    pub fn record(&mut self, line: &[u8], delta: Duration) -> Observation {
        let key = self.fingerprint(line);
        let deltas = self.lines.entry(key.clone()).or_default();
        deltas.push(delta);
        Observation {
            key,
            index: deltas.len() - 1,
        }
    }

    fn fingerprint(&self, line: &[u8]) -> String {
        match self.mode {
            FingerprintMode::Hashed => {
                let mut hasher = Sha256::new();
                hasher.update(line);
                hex::encode(hasher.finalize())
            }
            FingerprintMode::Raw => String::from_utf8_lossy(line).into_owned(),
        }
    }

    /// Freeze the store into the state persisted for the next run.
    pub fn into_state(self, duration: Duration) -> RunState {
        RunState {
            lines: self.lines,
            duration,
        }
    }
}
