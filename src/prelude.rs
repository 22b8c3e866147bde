//! # bephookgen Prelude
//!
//! The types needed to drive the pipeline or its individual stages with a single glob import.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all bephookgen operations
pub use crate::Error;

/// The pipeline stage an error is attributed to
pub use crate::Stage;

/// The result type used throughout bephookgen
pub use crate::Result;

/// Low-level file parsing utilities
pub use crate::{File, Parser};

// ================================================================================================
// Pipeline
// ================================================================================================

/// Orchestration of a game installation
pub use crate::pipeline::{FileOutcome, GameLayout, Pipeline, PipelineConfig, PipelineReport};

/// Content hashing and cache decisions
pub use crate::cache::{CacheGate, CacheMiss, ContentHash, GateDecision};

/// Individual stages
pub use crate::{
    hookgen::{HookGenerator, HookRuntime, HookStats},
    publicizer::{publicize, PublicizeReport, Publicizer},
    resolver::SearchDirectories,
};

// ================================================================================================
// Metadata
// ================================================================================================

/// Metadata token type for referencing table entries
pub use crate::metadata::token::Token;

/// The mutable assembly model
pub use crate::metadata::image::{
    AssemblyImage, FieldDefinition, MethodDefinition, TypeDefinition, TypeScope, TypeVisibility,
};

/// Assembly identities
pub use crate::metadata::identity::{AssemblyIdentity, AssemblyVersion};

/// Module emission
pub use crate::writer::{IlBuilder, ModuleBuilder, NewMethod};
