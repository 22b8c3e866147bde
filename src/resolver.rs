//! Assembly reference resolution over an ordered list of directories.
//!
//! References are resolved by probing `<dir>/<name>.dll` and `<dir>/<name>.exe` in every
//! directory in order. A candidate is only accepted if its `Assembly` row carries the requested
//! simple name (case-insensitively); directories that do not exist are skipped.

use std::path::{Path, PathBuf};

use log::debug;

use crate::{
    file::File,
    metadata::{identity::AssemblyIdentity, view::MetadataView},
    Error, Result,
};

const PROBE_EXTENSIONS: [&str; 2] = ["dll", "exe"];

/// The ordered directories assembly references are resolved against.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SearchDirectories {
    directories: Vec<PathBuf>,
}

impl SearchDirectories {
    /// Creates a list from explicit directories, searched in the given order.
    #[must_use]
    pub fn new(directories: Vec<PathBuf>) -> Self {
        SearchDirectories { directories }
    }

    /// The default resolution order for a game installation:
    ///
    /// 1. the working directory, then its `bin/Debug` and `bin/Release` build outputs
    /// 2. the directory of the running executable
    /// 3. the client and server `Managed` directories
    /// 4. `<root>/unstripped_corlib`
    #[must_use]
    pub fn for_game_root(root: &Path) -> Self {
        let mut directories = Vec::new();

        if let Ok(cwd) = std::env::current_dir() {
            directories.push(cwd.join("bin").join("Debug"));
            directories.push(cwd.join("bin").join("Release"));
            directories.insert(0, cwd);
        }
        if let Some(exe_dir) = std::env::current_exe()
            .ok()
            .and_then(|exe| exe.parent().map(Path::to_path_buf))
        {
            directories.push(exe_dir);
        }

        directories.push(root.join("valheim_Data").join("Managed"));
        directories.push(root.join("valheim_server_Data").join("Managed"));
        directories.push(root.join("unstripped_corlib"));

        SearchDirectories { directories }
    }

    /// Appends a directory after the existing ones.
    pub fn push(&mut self, directory: impl Into<PathBuf>) {
        self.directories.push(directory.into());
    }

    /// The directories in search order.
    #[must_use]
    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    /// Locates the file defining `reference`.
    ///
    /// # Errors
    /// Returns [`Error::UnresolvedAssembly`] listing every probed directory if no directory holds
    /// a matching assembly.
    pub fn resolve(&self, reference: &AssemblyIdentity) -> Result<PathBuf> {
        for directory in &self.directories {
            if !directory.is_dir() {
                continue;
            }

            for extension in PROBE_EXTENSIONS {
                let candidate = directory.join(format!("{}.{extension}", reference.name));
                if !candidate.is_file() {
                    continue;
                }

                match defined_name(&candidate) {
                    Ok(Some(name)) if reference.matches_name(&name) => {
                        debug!(
                            "Resolved {} to {}",
                            reference.display_name(),
                            candidate.display()
                        );
                        return Ok(candidate);
                    }
                    Ok(name) => debug!(
                        "Skipping {}: defines {:?}, wanted {}",
                        candidate.display(),
                        name,
                        reference.name
                    ),
                    Err(error) => {
                        debug!("Skipping {}: {}", candidate.display(), error);
                    }
                }
            }
        }

        Err(Error::UnresolvedAssembly {
            name: reference.name.clone(),
            searched: self.directories.clone(),
        })
    }
}

fn defined_name(path: &Path) -> Result<Option<String>> {
    let file = File::from_file(path)?;
    let view = MetadataView::new(&file)?;

    Ok(view.assembly_identity()?.map(|identity| identity.name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test::write_stub_assembly;
    use tempfile::tempdir;

    #[test]
    fn first_directory_wins() {
        let first = tempdir().unwrap();
        let second = tempdir().unwrap();
        write_stub_assembly(&first.path().join("mscorlib.dll"), "mscorlib");
        write_stub_assembly(&second.path().join("mscorlib.dll"), "mscorlib");

        let search = SearchDirectories::new(vec![
            first.path().join("missing"),
            first.path().to_path_buf(),
            second.path().to_path_buf(),
        ]);
        let resolved = search
            .resolve(&AssemblyIdentity::parse("mscorlib, Version=4.0.0.0").unwrap())
            .unwrap();

        assert_eq!(resolved, first.path().join("mscorlib.dll"));
    }

    #[test]
    fn name_must_match() {
        let dir = tempdir().unwrap();
        write_stub_assembly(&dir.path().join("UnityEngine.dll"), "SomethingElse");
        write_stub_assembly(&dir.path().join("netstandard.dll"), "NETSTANDARD");
        std::fs::write(dir.path().join("broken.dll"), b"not an assembly").unwrap();

        let search = SearchDirectories::new(vec![dir.path().to_path_buf()]);

        assert!(search
            .resolve(&AssemblyIdentity::parse("netstandard").unwrap())
            .is_ok());
        assert!(search
            .resolve(&AssemblyIdentity::parse("broken").unwrap())
            .is_err());
        match search.resolve(&AssemblyIdentity::parse("UnityEngine").unwrap()) {
            Err(Error::UnresolvedAssembly { name, searched }) => {
                assert_eq!(name, "UnityEngine");
                assert_eq!(searched, vec![dir.path().to_path_buf()]);
            }
            other => panic!("Expected UnresolvedAssembly, got {other:?}"),
        }
    }

    #[test]
    fn game_root_order() {
        let search = SearchDirectories::for_game_root(Path::new("/game"));
        let dirs = search.directories();
        let tail = &dirs[dirs.len() - 3..];

        assert_eq!(tail[0], Path::new("/game/valheim_Data/Managed"));
        assert_eq!(tail[1], Path::new("/game/valheim_server_Data/Managed"));
        assert_eq!(tail[2], Path::new("/game/unstripped_corlib"));
        assert!(dirs[1].ends_with("bin/Debug"));
        assert!(dirs[2].ends_with("bin/Release"));
    }
}
