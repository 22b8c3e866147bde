//! Assembly identities: simple name, version, culture and strong name.
//!
//! Used for the `Assembly` and `AssemblyRef` rows the pipeline reads, for matching resolved files
//! against the references that asked for them, and for the runtime assemblies the generated hook
//! module depends on.

use std::{fmt, fmt::Write as _, str::FromStr};

use crate::{Error, Result};

/// `AssemblyFlags.PublicKey`: the strong name blob holds the full public key
pub const ASSEMBLY_FLAGS_PUBLIC_KEY: u32 = 0x0001;

/// A four-part assembly version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct AssemblyVersion {
    /// Major version
    pub major: u16,
    /// Minor version
    pub minor: u16,
    /// Build number
    pub build: u16,
    /// Revision number
    pub revision: u16,
}

impl AssemblyVersion {
    /// Creates a version from its four parts.
    #[must_use]
    pub const fn new(major: u16, minor: u16, build: u16, revision: u16) -> Self {
        AssemblyVersion {
            major,
            minor,
            build,
            revision,
        }
    }

    /// Parses a dotted version with one to four parts.
    ///
    /// # Errors
    /// Returns a malformed error if a part is missing or not a 16-bit number.
    pub fn parse(version_str: &str) -> Result<Self> {
        let parts: Vec<&str> = version_str.trim().split('.').collect();
        if parts.len() > 4 {
            return Err(malformed_error!("Invalid version format: {}", version_str));
        }

        let mut components = [0u16; 4];
        for (i, part) in parts.iter().enumerate() {
            components[i] = part
                .parse::<u16>()
                .map_err(|_| malformed_error!("Invalid version component: {}", part))?;
        }

        Ok(AssemblyVersion::new(
            components[0],
            components[1],
            components[2],
            components[3],
        ))
    }
}

impl fmt::Display for AssemblyVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}.{}.{}.{}",
            self.major, self.minor, self.build, self.revision
        )
    }
}

impl FromStr for AssemblyVersion {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// The strong name part of an identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StrongName {
    /// The full public key
    PublicKey(Vec<u8>),
    /// The 8-byte public key token
    Token([u8; 8]),
}

impl StrongName {
    /// Interprets an `Assembly` / `AssemblyRef` key blob.
    ///
    /// # Errors
    /// Returns a malformed error if a token blob is not 8 bytes long.
    pub fn from_blob(data: &[u8], is_public_key: bool) -> Result<Option<Self>> {
        if data.is_empty() {
            return Ok(None);
        }

        if is_public_key {
            return Ok(Some(StrongName::PublicKey(data.to_vec())));
        }

        let token: [u8; 8] = data
            .try_into()
            .map_err(|_| malformed_error!("Public key token must be 8 bytes, got {}", data.len()))?;
        Ok(Some(StrongName::Token(token)))
    }

    /// The blob stored in the metadata row.
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        match self {
            StrongName::PublicKey(key) => key,
            StrongName::Token(token) => token,
        }
    }

    /// Whether the blob is a full public key.
    #[must_use]
    pub fn is_public_key(&self) -> bool {
        matches!(self, StrongName::PublicKey(_))
    }
}

/// Identity of an assembly.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct AssemblyIdentity {
    /// Simple name, e.g. `assembly_valheim`
    pub name: String,
    /// Version
    pub version: AssemblyVersion,
    /// Culture, `None` for neutral
    pub culture: Option<String>,
    /// Public key or token, `None` for unsigned assemblies
    pub strong_name: Option<StrongName>,
}

impl AssemblyIdentity {
    /// Creates a culture-neutral identity.
    #[must_use]
    pub fn new(
        name: impl Into<String>,
        version: AssemblyVersion,
        strong_name: Option<StrongName>,
    ) -> Self {
        AssemblyIdentity {
            name: name.into(),
            version,
            culture: None,
            strong_name,
        }
    }

    /// Parses a display name such as
    /// `MonoMod.RuntimeDetour, Version=21.12.13.1, Culture=neutral, PublicKeyToken=null`.
    ///
    /// # Errors
    /// Returns a malformed error for an empty name or an invalid component.
    pub fn parse(display_name: &str) -> Result<Self> {
        let mut parts = display_name.split(',').map(str::trim);

        let name = parts.next().unwrap_or_default().to_string();
        if name.is_empty() {
            return Err(malformed_error!("Assembly name cannot be empty"));
        }

        let mut identity = AssemblyIdentity::new(name, AssemblyVersion::default(), None);
        for part in parts {
            let Some((key, value)) = part.split_once('=') else {
                return Err(malformed_error!("Invalid assembly name component: {}", part));
            };

            let value = value.trim();
            match key.trim().to_ascii_lowercase().as_str() {
                "version" => identity.version = AssemblyVersion::parse(value)?,
                "culture" => {
                    identity.culture = if value.eq_ignore_ascii_case("neutral") {
                        None
                    } else {
                        Some(value.to_string())
                    };
                }
                "publickeytoken" => {
                    identity.strong_name = if value.eq_ignore_ascii_case("null") {
                        None
                    } else {
                        Some(StrongName::Token(parse_token(value)?))
                    };
                }
                _ => {}
            }
        }

        Ok(identity)
    }

    /// The display name of the identity.
    #[must_use]
    pub fn display_name(&self) -> String {
        let mut result = String::with_capacity(self.name.len() + 80);

        result.push_str(&self.name);
        let _ = write!(result, ", Version={}", self.version);
        let _ = write!(
            result,
            ", Culture={}",
            self.culture.as_deref().unwrap_or("neutral")
        );

        match &self.strong_name {
            Some(StrongName::Token(token)) => {
                result.push_str(", PublicKeyToken=");
                for byte in token {
                    let _ = write!(result, "{byte:02x}");
                }
            }
            Some(StrongName::PublicKey(_)) => {}
            None => result.push_str(", PublicKeyToken=null"),
        }

        result
    }

    /// Whether `name` refers to this assembly, compared the way the runtime binds simple names.
    #[must_use]
    pub fn matches_name(&self, name: &str) -> bool {
        self.name.eq_ignore_ascii_case(name)
    }

    /// `AssemblyFlags` for a row describing this identity.
    #[must_use]
    pub fn flags(&self) -> u32 {
        match self.strong_name {
            Some(StrongName::PublicKey(_)) => ASSEMBLY_FLAGS_PUBLIC_KEY,
            _ => 0,
        }
    }
}

fn parse_token(value: &str) -> Result<[u8; 8]> {
    if value.len() != 16 || !value.is_ascii() {
        return Err(malformed_error!("Invalid public key token: {}", value));
    }

    let mut token = [0_u8; 8];
    for (i, byte) in token.iter_mut().enumerate() {
        *byte = u8::from_str_radix(&value[i * 2..i * 2 + 2], 16)
            .map_err(|_| malformed_error!("Invalid public key token: {}", value))?;
    }

    Ok(token)
}

impl fmt::Display for AssemblyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl FromStr for AssemblyIdentity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_display_name() {
        let identity = AssemblyIdentity::parse(
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
        )
        .unwrap();

        assert_eq!(identity.name, "mscorlib");
        assert_eq!(identity.version, AssemblyVersion::new(4, 0, 0, 0));
        assert_eq!(identity.culture, None);
        assert_eq!(
            identity.strong_name,
            Some(StrongName::Token([
                0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89
            ]))
        );
        assert_eq!(
            identity.to_string(),
            "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089"
        );
    }

    #[test]
    fn unsigned() {
        let identity: AssemblyIdentity = "MonoMod.Utils, Version=21.12.13.1, PublicKeyToken=null"
            .parse()
            .unwrap();

        assert!(identity.strong_name.is_none());
        assert_eq!(identity.flags(), 0);
        assert!(identity.matches_name("monomod.utils"));
    }

    #[test]
    fn invalid() {
        assert!(AssemblyIdentity::parse("").is_err());
        assert!(AssemblyIdentity::parse("A, Version=1.x").is_err());
        assert!(AssemblyIdentity::parse("A, PublicKeyToken=abc").is_err());
        assert!(AssemblyVersion::parse("1.2.3.4.5").is_err());
    }

    #[test]
    fn strong_name_blob() {
        assert_eq!(StrongName::from_blob(&[], false).unwrap(), None);
        assert!(StrongName::from_blob(&[1, 2, 3], false).is_err());
        assert!(StrongName::from_blob(&[1, 2, 3], true)
            .unwrap()
            .unwrap()
            .is_public_key());
    }
}
