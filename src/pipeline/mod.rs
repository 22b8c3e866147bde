//! The per-file pipeline and the batch orchestrator.
//!
//! For every `assembly_*.dll` in the game's `Managed` directory the [`Pipeline`]
//!
//! 1. hashes the input and asks the [`CacheGate`] whether the previous run is still valid,
//! 2. publicizes the input into the publicized directory,
//! 3. generates the hook assembly from the publicized copy, marked with the input hash.
//!
//! Files are processed one after another in name order. The batch stops at the first failure;
//! files that completed before keep their marker, so the next run resumes at the failed file.

pub mod config;

use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::{
    cache::{CacheGate, CacheMiss, ContentHash, GateDecision},
    hookgen::{HookGenerator, HookStats},
    publicizer::Publicizer,
    Error, Result, Stage,
};

pub use config::{GameLayout, PipelineConfig};

/// What happened to one input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileOutcome {
    /// The recorded run is still valid
    Skipped {
        /// Hash of the unchanged input
        hash: ContentHash,
    },
    /// The input was publicized and its hooks generated
    Processed {
        /// Hash recorded in the new hook assembly
        hash: ContentHash,
        /// Why the cache missed
        reason: CacheMiss,
        /// Generation counters
        stats: HookStats,
    },
}

/// Outcome of a batch run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineReport {
    /// Every input with its outcome, in processing order
    pub files: Vec<(PathBuf, FileOutcome)>,
}

impl PipelineReport {
    /// Number of inputs that were processed.
    #[must_use]
    pub fn processed(&self) -> usize {
        self.files
            .iter()
            .filter(|(_, outcome)| matches!(outcome, FileOutcome::Processed { .. }))
            .count()
    }

    /// Number of inputs that were skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.files.len() - self.processed()
    }
}

/// Runs the gate, the publicizer and the hook generator over a game installation.
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::pipeline::{Pipeline, PipelineConfig};
///
/// let pipeline = Pipeline::new(PipelineConfig::for_game_root("/games/valheim")?);
/// let report = pipeline.run()?;
/// println!("{} processed, {} up to date", report.processed(), report.skipped());
/// # Ok::<(), bephookgen::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Pipeline {
    config: PipelineConfig,
    publicizer: Publicizer,
    generator: HookGenerator,
}

impl Pipeline {
    /// Creates the pipeline for `config`.
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        let publicizer = Publicizer::new(config.publicized_dir())
            .with_suffix(config.publicized_suffix());
        let generator = HookGenerator::new(config.runtime().clone());

        Pipeline {
            config,
            publicizer,
            generator,
        }
    }

    /// The configuration of this pipeline.
    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// The input assemblies, sorted by file name.
    ///
    /// # Errors
    /// Returns an error if the `Managed` directory cannot be listed.
    pub fn inputs(&self) -> Result<Vec<PathBuf>> {
        let mut inputs = Vec::new();
        for entry in std::fs::read_dir(self.config.managed_dir())? {
            let path = entry?.path();
            if path.is_file() && self.config.is_input(&path) {
                inputs.push(path);
            }
        }

        inputs.sort();
        Ok(inputs)
    }

    /// Runs the pipeline for one input.
    ///
    /// # Errors
    /// Returns [`Error::Stage`] naming `input` and the stage that failed.
    pub fn process(&self, input: &Path) -> Result<FileOutcome> {
        let staged = |stage: Stage| move |error: Error| error.in_stage(input, stage);

        let hash = ContentHash::of_file(input).map_err(staged(Stage::Hash))?;
        let publicized = self.publicizer.output_path(input);
        let hook = self.config.hook_path(input);

        let gate = CacheGate::new(input, &hook).with_output(&publicized);
        let reason = match gate.check(&hash) {
            GateDecision::Skip => {
                info!("{} is up to date ({})", input.display(), hash);
                return Ok(FileOutcome::Skipped { hash });
            }
            GateDecision::Run(reason) => reason,
        };
        info!("Processing {}: {}", input.display(), reason);

        let search_directories = self.config.search_directories();
        let publicized = self
            .publicizer
            .run(input, search_directories.clone())
            .map_err(staged(Stage::Publicize))?;
        debug!("Publicized {} to {}", input.display(), publicized.display());

        let stats = self
            .generator
            .run(&publicized, &hook, &hash, search_directories.clone())
            .map_err(|error| error.for_input(input))?;
        info!("Wrote {}: {}", hook.display(), stats);
        Ok(FileOutcome::Processed {
            hash,
            reason,
            stats,
        })
    }

    /// Processes every input in order, stopping at the first failure.
    ///
    /// # Errors
    /// Returns the listing error of the `Managed` directory, or the [`Error::Stage`] of the first
    /// input that failed.
    pub fn run(&self) -> Result<PipelineReport> {
        let inputs = self.inputs()?;
        info!(
            "Found {} assemblies in {}",
            inputs.len(),
            self.config.managed_dir().display()
        );

        let mut report = PipelineReport::default();
        for input in inputs {
            let outcome = self.process(&input)?;
            report.files.push((input, outcome));
        }

        Ok(report)
    }
}
