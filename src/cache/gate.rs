//! The cache gate: decides whether an input has to be processed again.
//!
//! The only record of a previous run is the hash marker inside the hook output, which is written
//! last. An input is skipped only if that marker can be read, equals the current hash and every
//! output of the run still exists. An unreadable or corrupt hook output counts as "no record".

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::debug;

use crate::cache::{marker::read_marker, ContentHash};

/// The association of an input file with the hash of its last successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheRecord {
    /// File name of the input assembly
    pub input_name: String,
    /// Content hash recorded by the last successful run
    pub hash: ContentHash,
}

/// Why an input has to be processed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheMiss {
    /// The hook output is missing, unreadable or has no marker
    NoRecord,
    /// The input changed since the recorded run
    HashChanged {
        /// Hash found in the hook output
        recorded: ContentHash,
    },
    /// The hash matches but an output of the run is gone
    MissingOutput(PathBuf),
}

impl fmt::Display for CacheMiss {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CacheMiss::NoRecord => f.write_str("no previous record"),
            CacheMiss::HashChanged { recorded } => write!(f, "hash changed (was {recorded})"),
            CacheMiss::MissingOutput(path) => write!(f, "output '{}' is missing", path.display()),
        }
    }
}

/// Outcome of a gate check.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GateDecision {
    /// The recorded run is still valid
    Skip,
    /// The pipeline has to run
    Run(CacheMiss),
}

/// Cache gate for one input assembly.
#[derive(Debug, Clone)]
pub struct CacheGate {
    input: PathBuf,
    hook_output: PathBuf,
    outputs: Vec<PathBuf>,
}

impl CacheGate {
    /// Creates the gate for `input`, whose record lives in `hook_output`.
    #[must_use]
    pub fn new(input: impl Into<PathBuf>, hook_output: impl Into<PathBuf>) -> Self {
        let hook_output = hook_output.into();
        CacheGate {
            input: input.into(),
            outputs: vec![hook_output.clone()],
            hook_output,
        }
    }

    /// Adds an output that must exist for the input to be skipped.
    #[must_use]
    pub fn with_output(mut self, output: impl Into<PathBuf>) -> Self {
        self.outputs.push(output.into());
        self
    }

    /// The input this gate guards.
    #[must_use]
    pub fn input(&self) -> &Path {
        &self.input
    }

    /// The record of the last successful run, if the hook output carries a readable marker.
    #[must_use]
    pub fn recorded(&self) -> Option<CacheRecord> {
        if !self.hook_output.is_file() {
            return None;
        }

        match read_marker(&self.hook_output) {
            Ok(Some(hash)) => Some(CacheRecord {
                input_name: self
                    .input
                    .file_name()
                    .map(|name| name.to_string_lossy().into_owned())
                    .unwrap_or_default(),
                hash,
            }),
            Ok(None) => {
                debug!("{} has no hash marker", self.hook_output.display());
                None
            }
            Err(error) => {
                debug!(
                    "Ignoring unreadable hook output {}: {}",
                    self.hook_output.display(),
                    error
                );
                None
            }
        }
    }

    /// Compares `current` against the recorded run.
    #[must_use]
    pub fn check(&self, current: &ContentHash) -> GateDecision {
        let Some(record) = self.recorded() else {
            return GateDecision::Run(CacheMiss::NoRecord);
        };

        if record.hash != *current {
            return GateDecision::Run(CacheMiss::HashChanged {
                recorded: record.hash,
            });
        }

        match self.outputs.iter().find(|output| !output.is_file()) {
            Some(missing) => GateDecision::Run(CacheMiss::MissingOutput(missing.clone())),
            None => GateDecision::Skip,
        }
    }
}
