//! Visibility rewriting.
//!
//! The publicizer walks every type definition of an [`AssemblyImage`], nested types included at
//! any depth, and makes each type, method and field public. Top-level types become `Public`,
//! nested types become `NestedPublic`; a nested type is never promoted to top-level visibility.
//!
//! Only flag words change. The rewritten image is written next to a configurable directory as
//! `<stem>_publicized<ext>` and the input file is never touched.

use std::{
    fmt,
    path::{Path, PathBuf},
};

use log::debug;

use crate::{metadata::image::AssemblyImage, resolver::SearchDirectories, Error, Result};

/// Default suffix appended to the file stem of publicized assemblies
pub const PUBLICIZED_SUFFIX: &str = "_publicized";

/// Number of definitions whose visibility was changed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublicizeReport {
    /// Type definitions visited
    pub types_visited: usize,
    /// Types made public or nested public
    pub types: usize,
    /// Methods made public
    pub methods: usize,
    /// Fields made public
    pub fields: usize,
}

impl fmt::Display for PublicizeReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} of {} types, {} methods, {} fields made public",
            self.types, self.types_visited, self.methods, self.fields
        )
    }
}

/// Makes every type, method and field of `image` public.
///
/// Types are visited with an explicit worklist seeded with the top-level types, so nesting depth
/// is unbounded.
pub fn publicize(image: &mut AssemblyImage) -> PublicizeReport {
    let mut report = PublicizeReport::default();
    let mut worklist: Vec<usize> = image.top_level_types().collect();

    while let Some(index) = worklist.pop() {
        let Some(typedef) = image.type_mut(index) else {
            continue;
        };

        report.types_visited += 1;
        if typedef.make_public() {
            report.types += 1;
        }

        worklist.extend_from_slice(&typedef.nested);
        let methods = typedef.methods.clone();
        let fields = typedef.fields.clone();

        for method in methods {
            if image.method_mut(method).is_some_and(|method| method.make_public()) {
                report.methods += 1;
            }
        }
        for field in fields {
            if image.field_mut(field).is_some_and(|field| field.make_public()) {
                report.fields += 1;
            }
        }
    }

    report
}

/// Writes publicized copies of assemblies into an output directory.
///
/// # Examples
///
/// ```rust,no_run
/// use bephookgen::{publicizer::Publicizer, resolver::SearchDirectories};
/// use std::path::Path;
///
/// let managed = Path::new("valheim_Data/Managed");
/// let publicizer = Publicizer::new(managed.join("publicized_assemblies"));
/// let output = publicizer.run(
///     &managed.join("assembly_valheim.dll"),
///     SearchDirectories::new(vec![managed.to_path_buf()]),
/// )?;
/// assert!(output.ends_with("assembly_valheim_publicized.dll"));
/// # Ok::<(), bephookgen::Error>(())
/// ```
#[derive(Debug, Clone)]
pub struct Publicizer {
    output_dir: PathBuf,
    suffix: String,
}

impl Publicizer {
    /// Creates a publicizer writing into `output_dir`.
    #[must_use]
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Publicizer {
            output_dir: output_dir.into(),
            suffix: PUBLICIZED_SUFFIX.to_string(),
        }
    }

    /// Overrides the suffix appended to the file stem.
    #[must_use]
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// Where the publicized copy of `input` is written.
    #[must_use]
    pub fn output_path(&self, input: &Path) -> PathBuf {
        let stem = input
            .file_stem()
            .map(|stem| stem.to_string_lossy().into_owned())
            .unwrap_or_default();
        let file_name = match input.extension() {
            Some(extension) => format!("{stem}{}.{}", self.suffix, extension.to_string_lossy()),
            None => format!("{stem}{}", self.suffix),
        };

        self.output_dir.join(file_name)
    }

    /// Publicizes `input` and returns the path of the written copy.
    ///
    /// # Errors
    /// Returns an error if the output would replace the input, the input cannot be loaded, or the
    /// output directory or file cannot be written.
    pub fn run(&self, input: &Path, search_directories: SearchDirectories) -> Result<PathBuf> {
        let output = self.output_path(input);
        if is_same_file(input, &output) {
            return Err(Error::WriteFailed {
                message: format!(
                    "Publicized output would overwrite its input '{}'",
                    input.display()
                ),
            });
        }

        let mut image = AssemblyImage::from_file(input, search_directories)?;
        let report = publicize(&mut image);
        debug!("{}: {}", input.display(), report);

        std::fs::create_dir_all(&self.output_dir)?;
        image.write_to(&output)?;

        Ok(output)
    }
}

fn is_same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::image::TypeVisibility,
        test::{game, game_assembly_bytes},
    };
    use tempfile::tempdir;

    fn load() -> AssemblyImage {
        AssemblyImage::from_mem(game_assembly_bytes(), SearchDirectories::default()).unwrap()
    }

    #[test]
    fn every_definition_becomes_public() {
        let mut image = load();
        assert!(image.methods().iter().any(|method| !method.is_public()));

        let report = publicize(&mut image);
        assert_eq!(report.types_visited, image.types().len());
        assert!(report.methods > 0 && report.fields == 2);

        for (index, typedef) in image.types().iter().enumerate() {
            let expected = if typedef.is_nested() {
                TypeVisibility::NestedPublic
            } else {
                TypeVisibility::Public
            };
            assert_eq!(typedef.visibility(), expected, "{}", image.full_name(index));
        }
        assert!(image.methods().iter().all(|method| method.is_public()));
        assert!(image.fields().iter().all(|field| field.is_public()));
    }

    #[test]
    fn idempotent() {
        let mut image = load();
        publicize(&mut image);

        let again = publicize(&mut image);
        assert_eq!(again.types + again.methods + again.fields, 0);
    }

    #[test]
    fn round_trip_preserves_other_flags() {
        let mut image = load();
        publicize(&mut image);

        let reloaded =
            AssemblyImage::from_mem(image.to_bytes().unwrap(), SearchDirectories::default())
                .unwrap();
        let player = reloaded.find_type(game::NAMESPACE, game::PLAYER).unwrap();
        let stats = reloaded.find_nested(player, game::STATS).unwrap();
        let entry = reloaded.find_nested(stats, game::ENTRY).unwrap();
        let deep = reloaded.find_nested(entry, game::DEEP).unwrap();

        assert_eq!(reloaded.types()[deep].visibility(), TypeVisibility::NestedPublic);
        assert!(reloaded.types()[entry].is_value_type);
        assert_ne!(
            reloaded.types()[entry].flags & crate::metadata::tables::TypeAttributes::SEALED,
            0
        );
        assert!(reloaded.methods().iter().all(|method| method.is_public()));

        let spawn = reloaded.types()[player]
            .methods
            .iter()
            .map(|index| &reloaded.methods()[*index])
            .find(|method| method.name == "Spawn")
            .unwrap();
        assert!(spawn.is_static());
    }

    #[test]
    fn output_naming() {
        let publicizer = Publicizer::new("/out");
        assert_eq!(
            publicizer.output_path(Path::new("/in/assembly_valheim.dll")),
            Path::new("/out/assembly_valheim_publicized.dll")
        );
        assert_eq!(
            publicizer
                .with_suffix("_pub")
                .output_path(Path::new("/in/tool.exe")),
            Path::new("/out/tool_pub.exe")
        );
    }

    #[test]
    fn writes_copy_and_keeps_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("assembly_test.dll");
        std::fs::write(&input, game_assembly_bytes()).unwrap();
        let before = std::fs::read(&input).unwrap();

        let output = Publicizer::new(dir.path().join("publicized_assemblies"))
            .run(&input, SearchDirectories::default())
            .unwrap();

        assert_eq!(std::fs::read(&input).unwrap(), before);
        assert_eq!(output, dir.path().join("publicized_assemblies/assembly_test_publicized.dll"));

        let image = AssemblyImage::from_file(&output, SearchDirectories::default()).unwrap();
        assert!(image.types().iter().all(|typedef| matches!(
            typedef.visibility(),
            TypeVisibility::Public | TypeVisibility::NestedPublic
        )));
    }

    #[test]
    fn refuses_to_overwrite_input() {
        let dir = tempdir().unwrap();
        let input = dir.path().join("assembly_test.dll");
        std::fs::write(&input, game_assembly_bytes()).unwrap();

        let result = Publicizer::new(dir.path())
            .with_suffix("")
            .run(&input, SearchDirectories::default());
        assert!(matches!(result, Err(Error::WriteFailed { .. })));
    }

    #[test]
    fn missing_input() {
        let dir = tempdir().unwrap();
        let result = Publicizer::new(dir.path().join("out"))
            .run(&dir.path().join("missing.dll"), SearchDirectories::default());
        assert!(result.is_err());
        assert!(!dir.path().join("out").exists());
    }
}
