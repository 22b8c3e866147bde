//! Pipeline configuration.
//!
//! Every path and naming convention the pipeline uses is derived from the game root by
//! [`PipelineConfig::for_game_root`] and can be overridden with the `with_*` methods.

use std::path::{Path, PathBuf};

use crate::{
    hookgen::HookRuntime, publicizer::PUBLICIZED_SUFFIX, resolver::SearchDirectories, Error,
    Result,
};

/// Default prefix of the game assemblies that are processed
pub const INPUT_PREFIX: &str = "assembly_";
/// Default prefix of generated hook assemblies
pub const HOOK_PREFIX: &str = "MMHOOK_";
/// Default directory below `Managed` receiving publicized assemblies
pub const PUBLICIZED_DIR: &str = "publicized_assemblies";

/// Which installation flavour a game root holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameLayout {
    /// The game client, `valheim_Data/Managed`
    Client,
    /// The dedicated server, `valheim_server_Data/Managed`
    Server,
}

impl GameLayout {
    /// The data directory name of this layout.
    #[must_use]
    pub fn data_dir(self) -> &'static str {
        match self {
            GameLayout::Client => "valheim_Data",
            GameLayout::Server => "valheim_server_Data",
        }
    }

    /// The `Managed` directory of this layout below `root`.
    #[must_use]
    pub fn managed_dir(self, root: &Path) -> PathBuf {
        root.join(self.data_dir()).join("Managed")
    }

    /// Detects the layout of `root`, preferring the client.
    ///
    /// # Errors
    /// Returns [`Error::ManagedDirNotFound`] if neither `Managed` directory exists.
    pub fn detect(root: &Path) -> Result<Self> {
        [GameLayout::Client, GameLayout::Server]
            .into_iter()
            .find(|layout| layout.managed_dir(root).is_dir())
            .ok_or_else(|| Error::ManagedDirNotFound(root.to_path_buf()))
    }
}

/// Paths and conventions of one pipeline run.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    game_root: PathBuf,
    layout: GameLayout,
    managed_dir: PathBuf,
    input_prefix: String,
    publicized_suffix: String,
    publicized_dir: PathBuf,
    hook_dir: PathBuf,
    hook_prefix: String,
    search_directories: SearchDirectories,
    runtime: HookRuntime,
}

impl PipelineConfig {
    /// The default configuration for the installation at `root`.
    ///
    /// # Errors
    /// Returns [`Error::ManagedDirNotFound`] if `root` has neither a client nor a server
    /// `Managed` directory.
    pub fn for_game_root(root: impl Into<PathBuf>) -> Result<Self> {
        let game_root = root.into();
        let layout = GameLayout::detect(&game_root)?;
        let managed_dir = layout.managed_dir(&game_root);

        Ok(PipelineConfig {
            layout,
            publicized_dir: managed_dir.join(PUBLICIZED_DIR),
            hook_dir: game_root.join("BepInEx").join("plugins").join("MMHOOK"),
            search_directories: SearchDirectories::for_game_root(&game_root),
            managed_dir,
            input_prefix: INPUT_PREFIX.to_string(),
            publicized_suffix: PUBLICIZED_SUFFIX.to_string(),
            hook_prefix: HOOK_PREFIX.to_string(),
            runtime: HookRuntime::default(),
            game_root,
        })
    }

    /// Overrides the prefix selecting input assemblies.
    #[must_use]
    pub fn with_input_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.input_prefix = prefix.into();
        self
    }

    /// Overrides the suffix of publicized file stems.
    #[must_use]
    pub fn with_publicized_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.publicized_suffix = suffix.into();
        self
    }

    /// Overrides the directory receiving publicized assemblies.
    #[must_use]
    pub fn with_publicized_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.publicized_dir = dir.into();
        self
    }

    /// Overrides the directory receiving hook assemblies.
    #[must_use]
    pub fn with_hook_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.hook_dir = dir.into();
        self
    }

    /// Overrides the file name prefix of hook assemblies.
    #[must_use]
    pub fn with_hook_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.hook_prefix = prefix.into();
        self
    }

    /// Replaces the assembly resolution directories.
    #[must_use]
    pub fn with_search_directories(mut self, search_directories: SearchDirectories) -> Self {
        self.search_directories = search_directories;
        self
    }

    /// Overrides the MonoMod assemblies hook code binds against.
    #[must_use]
    pub fn with_runtime(mut self, runtime: HookRuntime) -> Self {
        self.runtime = runtime;
        self
    }

    /// The game installation root.
    #[must_use]
    pub fn game_root(&self) -> &Path {
        &self.game_root
    }

    /// The detected layout.
    #[must_use]
    pub fn layout(&self) -> GameLayout {
        self.layout
    }

    /// The directory holding the input assemblies.
    #[must_use]
    pub fn managed_dir(&self) -> &Path {
        &self.managed_dir
    }

    /// Prefix selecting input assemblies.
    #[must_use]
    pub fn input_prefix(&self) -> &str {
        &self.input_prefix
    }

    /// Suffix of publicized file stems.
    #[must_use]
    pub fn publicized_suffix(&self) -> &str {
        &self.publicized_suffix
    }

    /// Directory receiving publicized assemblies.
    #[must_use]
    pub fn publicized_dir(&self) -> &Path {
        &self.publicized_dir
    }

    /// Directory receiving hook assemblies.
    #[must_use]
    pub fn hook_dir(&self) -> &Path {
        &self.hook_dir
    }

    /// Resolution directories for assembly references.
    #[must_use]
    pub fn search_directories(&self) -> &SearchDirectories {
        &self.search_directories
    }

    /// The MonoMod assemblies hook code binds against.
    #[must_use]
    pub fn runtime(&self) -> &HookRuntime {
        &self.runtime
    }

    /// Where the hook assembly of `input` is written: `<hook_dir>/<prefix><file name>`.
    #[must_use]
    pub fn hook_path(&self, input: &Path) -> PathBuf {
        let file_name = input
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        self.hook_dir.join(format!("{}{}", self.hook_prefix, file_name))
    }

    /// Whether `path` names an input assembly.
    #[must_use]
    pub fn is_input(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().map(|name| name.to_string_lossy()) else {
            return false;
        };

        name.starts_with(&self.input_prefix)
            && path
                .extension()
                .is_some_and(|extension| extension.eq_ignore_ascii_case("dll"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn layout_detection_prefers_client() {
        let dir = tempdir().unwrap();
        assert!(matches!(
            GameLayout::detect(dir.path()),
            Err(Error::ManagedDirNotFound(_))
        ));

        std::fs::create_dir_all(dir.path().join("valheim_server_Data/Managed")).unwrap();
        assert_eq!(GameLayout::detect(dir.path()).unwrap(), GameLayout::Server);

        std::fs::create_dir_all(dir.path().join("valheim_Data/Managed")).unwrap();
        assert_eq!(GameLayout::detect(dir.path()).unwrap(), GameLayout::Client);
    }

    #[test]
    fn default_paths() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("valheim_Data/Managed")).unwrap();
        let config = PipelineConfig::for_game_root(dir.path()).unwrap();

        assert_eq!(config.managed_dir(), dir.path().join("valheim_Data/Managed"));
        assert_eq!(
            config.publicized_dir(),
            dir.path().join("valheim_Data/Managed/publicized_assemblies")
        );
        assert_eq!(
            config.hook_path(&config.managed_dir().join("assembly_valheim.dll")),
            dir.path().join("BepInEx/plugins/MMHOOK/MMHOOK_assembly_valheim.dll")
        );
        assert_eq!(config.publicized_suffix(), "_publicized");

        assert!(config.is_input(Path::new("assembly_valheim.dll")));
        assert!(config.is_input(Path::new("assembly_utils.DLL")));
        assert!(!config.is_input(Path::new("UnityEngine.dll")));
        assert!(!config.is_input(Path::new("assembly_valheim.pdb")));
    }

    #[test]
    fn overrides() {
        let dir = tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("valheim_server_Data/Managed")).unwrap();
        let config = PipelineConfig::for_game_root(dir.path())
            .unwrap()
            .with_hook_dir("/hooks")
            .with_hook_prefix("HOOK_")
            .with_input_prefix("game_")
            .with_publicized_dir("/public")
            .with_publicized_suffix("_open")
            .with_runtime(HookRuntime::parse("Detours, Version=1.0.0.0", "Utils").unwrap())
            .with_search_directories(SearchDirectories::new(vec!["/refs".into()]));

        assert_eq!(config.layout(), GameLayout::Server);
        assert_eq!(
            config.hook_path(Path::new("game_core.dll")),
            Path::new("/hooks/HOOK_game_core.dll")
        );
        assert!(config.is_input(Path::new("game_core.dll")));
        assert_eq!(config.search_directories().directories(), [PathBuf::from("/refs")]);
        assert_eq!(config.publicized_dir(), Path::new("/public"));
        assert_eq!(config.publicized_suffix(), "_open");
        assert_eq!(config.runtime().runtime_detour.name, "Detours");
    }
}
