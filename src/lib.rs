// Copyright 2025 Johann Kempter
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(clippy::too_many_arguments)]
//#![deny(unsafe_code)]
// - 'file/physical.rs' uses mmap to map a file into memory
// - 'file/output.rs' uses mmap to write the output file

//! # bephookgen
//!
//! Build-time processing of Valheim game assemblies for BepInEx mods, in pure Rust.
//!
//! For every `assembly_*.dll` of a game installation the pipeline
//!
//! - **publicizes** the assembly: every type, method and field becomes public by rewriting the
//!   visibility flags in the metadata tables, written to
//!   `<Managed>/publicized_assemblies/<stem>_publicized.dll`;
//! - **generates hooks**: a companion `BepInEx/plugins/MMHOOK/MMHOOK_<file>` assembly with MonoMod
//!   `On.*` / `IL.*` events for every method, private ones included;
//! - **memoizes** both steps: the MD5 of the input is embedded in the hook assembly as an inert
//!   marker type, and unchanged inputs with complete outputs are skipped on the next run.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use bephookgen::prelude::*;
//!
//! let pipeline = Pipeline::new(PipelineConfig::for_game_root("/games/valheim")?);
//! for (input, outcome) in pipeline.run()?.files {
//!     println!("{}: {:?}", input.display(), outcome);
//! }
//! # Ok::<(), bephookgen::Error>(())
//! ```
//!
//! ## Building blocks
//!
//! ```rust,no_run
//! use bephookgen::{
//!     cache::ContentHash, metadata::image::AssemblyImage, publicizer::publicize,
//!     resolver::SearchDirectories,
//! };
//! use std::path::Path;
//!
//! let input = Path::new("valheim_Data/Managed/assembly_valheim.dll");
//! println!("{}", ContentHash::of_file(input)?);
//!
//! let mut image = AssemblyImage::from_file(input, SearchDirectories::for_game_root(".".as_ref()))?;
//! let report = publicize(&mut image);
//! println!("{report}");
//! image.write_to(Path::new("assembly_valheim_publicized.dll"))?;
//! # Ok::<(), bephookgen::Error>(())
//! ```
//!
//! ## Concurrency
//!
//! The pipeline is sequential and blocking. At most one instance may run against a given output
//! directory at a time; this is not enforced.

#[macro_use]
pub(crate) mod error;

/// PE container access and atomic output files
pub mod file;

/// Shared functionality which is used in unit tests
#[cfg(test)]
pub(crate) mod test;

/// Convenient re-exports of the most commonly used types.
///
/// # Example
///
/// ```rust,no_run
/// use bephookgen::prelude::*;
///
/// let hash = ContentHash::of_file("assembly_valheim.dll".as_ref())?;
/// println!("{hash}");
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub mod prelude;

/// Content hashes, hash markers and the cache gate
///
/// - [`cache::ContentHash`] - MD5 of an input file
/// - [`cache::marker`] - the `BepHookGen.hash<HEX>` type recording a hash in a hook assembly
/// - [`cache::CacheGate`] - decides whether an input must be processed again
pub mod cache;

/// Reading of ECMA-335 metadata and the mutable [`metadata::image::AssemblyImage`] model
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::{metadata::view::MetadataView, File};
/// use std::path::Path;
///
/// let file = File::from_file(Path::new("assembly_valheim.dll"))?;
/// let view = MetadataView::new(&file)?;
/// println!("Runtime: {}", view.root.version);
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub mod metadata;

/// Emission of new modules through [`writer::ModuleBuilder`]
pub mod writer;

/// Assembly reference resolution over ordered search directories
pub mod resolver;

/// Visibility rewriting of assemblies
pub mod publicizer;

/// MonoMod hook assembly generation
pub mod hookgen;

/// The gate / publicize / hookgen pipeline and its batch orchestrator
pub mod pipeline;

/// `bephookgen` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is always [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

/// `bephookgen` Error type
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::{pipeline::{Pipeline, PipelineConfig}, Error};
///
/// let pipeline = Pipeline::new(PipelineConfig::for_game_root("/games/valheim")?);
/// match pipeline.run() {
///     Ok(report) => println!("{} processed", report.processed()),
///     Err(Error::Stage { file, stage, source }) => {
///         println!("{} failed in {}: {}", file.display(), stage, source)
///     }
///     Err(e) => println!("Error: {}", e),
/// }
/// # Ok::<(), bephookgen::Error>(())
/// ```
pub use error::{Error, Stage};

pub use metadata::streams::{Blob, Guid, StreamHeader, Strings, TablesHeader};

pub use file::{parser::Parser, File};
