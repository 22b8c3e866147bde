//! The MonoMod runtime assemblies generated hook code binds against.

use crate::{
    metadata::identity::{AssemblyIdentity, AssemblyVersion},
    Result,
};

/// Version of the MonoMod assemblies shipped with BepInEx 5
pub const MONOMOD_VERSION: AssemblyVersion = AssemblyVersion::new(21, 12, 13, 1);

/// Namespace of `HookEndpointManager`
pub const HOOKGEN_NAMESPACE: &str = "MonoMod.RuntimeDetour.HookGen";
/// Namespace of `ILContext`
pub const CIL_NAMESPACE: &str = "MonoMod.Cil";

/// Identities of the assemblies referenced by generated hook modules.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookRuntime {
    /// Defines `MonoMod.RuntimeDetour.HookGen.HookEndpointManager`
    pub runtime_detour: AssemblyIdentity,
    /// Defines `MonoMod.Cil.ILContext`
    pub utils: AssemblyIdentity,
}

impl HookRuntime {
    /// Builds a runtime description from two display names.
    ///
    /// # Errors
    /// Returns an error if a display name cannot be parsed.
    pub fn parse(runtime_detour: &str, utils: &str) -> Result<Self> {
        Ok(HookRuntime {
            runtime_detour: AssemblyIdentity::parse(runtime_detour)?,
            utils: AssemblyIdentity::parse(utils)?,
        })
    }
}

impl Default for HookRuntime {
    fn default() -> Self {
        HookRuntime {
            runtime_detour: AssemblyIdentity::new("MonoMod.RuntimeDetour", MONOMOD_VERSION, None),
            utils: AssemblyIdentity::new("MonoMod.Utils", MONOMOD_VERSION, None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let runtime = HookRuntime::default();
        assert_eq!(
            runtime.runtime_detour.display_name(),
            "MonoMod.RuntimeDetour, Version=21.12.13.1, Culture=neutral, PublicKeyToken=null"
        );
        assert_eq!(runtime.utils.name, "MonoMod.Utils");
    }

    #[test]
    fn parse_overrides() {
        let runtime = HookRuntime::parse(
            "MonoMod.RuntimeDetour, Version=22.1.0.0",
            "MonoMod.Utils, Version=22.1.0.0",
        )
        .unwrap();
        assert_eq!(runtime.utils.version, AssemblyVersion::new(22, 1, 0, 0));
        assert!(HookRuntime::parse("", "MonoMod.Utils").is_err());
    }
}
