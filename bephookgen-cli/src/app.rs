use std::path::PathBuf;

use clap::Parser;

/// bephookgen - publicize Valheim assemblies and generate MonoMod hooks for BepInEx
#[derive(Debug, Parser)]
#[command(name = "bephookgen", version, about, long_about = None)]
pub struct Cli {
    /// Root of the game installation (the directory holding `valheim_Data` or
    /// `valheim_server_Data`).
    #[arg(value_name = "GAME_ROOT")]
    pub game_root: PathBuf,

    /// Enable verbose (debug-level) logging output.
    #[arg(short, long)]
    pub verbose: bool,
}
