//! Generation of MonoMod hook assemblies (`MMHOOK_*.dll`).
//!
//! For every hookable method `M` of a type `T` the generated module contains
//!
//! - `On.<ns>.T` with the delegates `orig_M` and `hook_M` and a static event `M` whose accessors
//!   register a `hook_M` with `HookEndpointManager.Add` / `Remove`,
//! - `IL.<ns>.T` with a static event `M` taking an `ILContext.Manipulator`, registered through
//!   `HookEndpointManager.Modify` / `Unmodify`.
//!
//! Nested types are mirrored as nested hook classes. Private methods are hooked like public
//! ones; methods without body, generic methods, type initializers and methods of generic or
//! compiler generated types are skipped.
//!
//! The module also carries the hash marker of the input it was generated from and takes its
//! MVID from that hash, so the same input always produces the same bytes.

pub mod emit;
pub mod importer;
pub mod naming;
pub mod runtime;

use std::{fmt, path::Path};

use log::debug;

use crate::{
    cache::{marker::add_marker, ContentHash},
    file::output::Output,
    metadata::{identity::AssemblyIdentity, image::AssemblyImage},
    resolver::SearchDirectories,
    writer::ModuleBuilder,
    Error, Result, Stage,
};

pub use emit::{HookKind, SkipReason};
pub use runtime::HookRuntime;

/// Counters of one generation run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStats {
    /// Types that received hook classes
    pub types: usize,
    /// Methods that received hooks
    pub hooks: usize,
    /// Methods that were skipped
    pub skipped: usize,
}

impl fmt::Display for HookStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} hooks in {} types, {} methods skipped",
            self.hooks, self.types, self.skipped
        )
    }
}

/// Generates hook modules.
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::{
///     cache::ContentHash, hookgen::HookGenerator, resolver::SearchDirectories,
/// };
/// use std::path::Path;
///
/// let root = Path::new("/games/valheim");
/// let hash = ContentHash::of_file(&root.join("valheim_Data/Managed/assembly_valheim.dll"))?;
/// let stats = HookGenerator::default().run(
///     &root.join("valheim_Data/Managed/publicized_assemblies/assembly_valheim_publicized.dll"),
///     &root.join("BepInEx/plugins/MMHOOK/MMHOOK_assembly_valheim.dll"),
///     &hash,
///     SearchDirectories::for_game_root(root),
/// )?;
/// println!("{stats}");
/// # Ok::<(), bephookgen::Error>(())
/// ```
#[derive(Debug, Clone, Default)]
pub struct HookGenerator {
    runtime: HookRuntime,
}

impl HookGenerator {
    /// Creates a generator binding against `runtime`.
    #[must_use]
    pub fn new(runtime: HookRuntime) -> Self {
        HookGenerator { runtime }
    }

    /// The MonoMod assemblies generated code references.
    #[must_use]
    pub fn runtime(&self) -> &HookRuntime {
        &self.runtime
    }

    /// Resolves every assembly reference of `image` through its search directories.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedAssembly`] for the first missing reference.
    pub fn resolve(&self, image: &AssemblyImage) -> Result<()> {
        for (identity, path) in image.resolve_references()? {
            debug!("{} -> {}", identity.display_name(), path.display());
        }

        Ok(())
    }

    /// Builds the hook module for `image`, named after `file_name`, and marks it with `hash`.
    ///
    /// # Errors
    /// Returns an error if `image` has no assembly manifest or the module cannot be laid out.
    pub fn generate(
        &self,
        image: &AssemblyImage,
        file_name: &str,
        hash: &ContentHash,
    ) -> Result<(Vec<u8>, HookStats)> {
        let version = image
            .identity()
            .map(|identity| identity.version)
            .unwrap_or_default();
        let assembly_name = Path::new(file_name)
            .file_stem()
            .map_or_else(|| file_name.to_string(), |stem| stem.to_string_lossy().into_owned());

        let builder = ModuleBuilder::new(file_name)
            .with_assembly(AssemblyIdentity::new(assembly_name, version, None))
            .with_mvid(*hash.as_bytes());

        let corlib = importer::corlib_identity(image);
        let mut emitter = emit::HookEmitter::new(image, builder, &corlib, &self.runtime)?;
        emitter.emit_all()?;

        let object = emitter.object();
        add_marker(emitter.builder_mut(), hash, object)?;

        let (builder, stats) = emitter.finish();
        Ok((builder.build()?, stats))
    }

    /// Replaces `output` with `image`.
    ///
    /// An existing output is deleted first, so a failed write never leaves the previous
    /// generation behind.
    ///
    /// # Errors
    /// Returns an error if the old file cannot be removed or the new one cannot be written.
    pub fn write(&self, image: &[u8], output: &Path) -> Result<()> {
        if output.exists() {
            std::fs::remove_file(output)?;
        }
        if let Some(parent) = output.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let mut file = Output::create(output, image.len())?;
        file.write_at(0, image)?;
        file.finalize()
    }

    /// Loads `input`, resolves its references, generates its hook module and writes it to
    /// `output`.
    ///
    /// Errors are annotated with `input` and the stage that failed.
    ///
    /// # Errors
    /// Returns [`Error::Stage`] wrapping the first failure.
    pub fn run(
        &self,
        input: &Path,
        output: &Path,
        hash: &ContentHash,
        search_directories: SearchDirectories,
    ) -> Result<HookStats> {
        let staged = |stage: Stage| move |error: Error| error.in_stage(input, stage);

        let image = AssemblyImage::from_file(input, search_directories)
            .map_err(staged(Stage::HookGen))?;
        self.resolve(&image).map_err(staged(Stage::Resolve))?;

        let file_name = output
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let (bytes, stats) = self
            .generate(&image, &file_name, hash)
            .map_err(staged(Stage::HookGen))?;
        self.write(&bytes, output).map_err(staged(Stage::Write))?;

        Ok(stats)
    }
}
