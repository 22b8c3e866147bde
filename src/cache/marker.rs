//! The hash marker: an inert type in the hook assembly whose name records the content hash of
//! the input it was generated from.
//!
//! The marker lives in namespace `BepHookGen` and is named `hash` followed by the uppercase hex
//! digest, e.g. `BepHookGen.hashD41D8CD98F00B204E9800998ECF8427E`.

use std::path::Path;

use crate::{
    cache::ContentHash,
    file::File,
    metadata::{
        tables::{TypeAttributes, TypeDefRaw},
        token::Token,
        view::MetadataView,
    },
    writer::ModuleBuilder,
    Result,
};

/// Namespace of the marker type
pub const MARKER_NAMESPACE: &str = "BepHookGen";
/// Prefix of the marker type name
pub const MARKER_PREFIX: &str = "hash";

/// Name of the marker type for `hash`.
#[must_use]
pub fn marker_type_name(hash: &ContentHash) -> String {
    format!("{MARKER_PREFIX}{hash}")
}

/// Adds the marker type for `hash` to `builder`, deriving from `object`.
///
/// # Errors
/// Returns an error if `object` is not a valid base type token.
pub fn add_marker(builder: &mut ModuleBuilder, hash: &ContentHash, object: Token) -> Result<Token> {
    builder.add_type(
        MARKER_NAMESPACE,
        &marker_type_name(hash),
        TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT | TypeAttributes::SEALED,
        Some(object),
    )
}

/// Extracts the recorded hash from the metadata of a loaded module.
///
/// Returns `Ok(None)` if the module has no marker type.
///
/// # Errors
/// Returns an error if the tables cannot be read or the marker does not carry a valid digest.
pub fn extract_marker(view: &MetadataView<'_>) -> Result<Option<ContentHash>> {
    for row in view.tables.rows::<TypeDefRaw>() {
        let row = row?;
        if view.strings.get(row.type_namespace as usize)? != MARKER_NAMESPACE {
            continue;
        }

        let name = view.strings.get(row.type_name as usize)?;
        if let Some(hex) = name.strip_prefix(MARKER_PREFIX) {
            return ContentHash::parse(hex).map(Some);
        }
    }

    Ok(None)
}

/// Reads the recorded hash from the hook assembly at `path`.
///
/// # Errors
/// Returns an error if the file cannot be loaded or its marker is invalid.
pub fn read_marker(path: &Path) -> Result<Option<ContentHash>> {
    let file = File::from_file(path)?;
    let view = MetadataView::new(&file)?;

    extract_marker(&view)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::identity::AssemblyIdentity;

    fn module_with_marker(name: Option<&str>) -> Vec<u8> {
        let mut builder = ModuleBuilder::new("MMHOOK_assembly_test.dll");
        let corlib = builder
            .add_assembly_ref(&AssemblyIdentity::parse("mscorlib, Version=4.0.0.0").unwrap())
            .unwrap();
        let object = builder.add_type_ref(corlib, "System", "Object").unwrap();
        builder.add_type("", "<Module>", 0, None).unwrap();
        builder
            .add_type("On", "Other", TypeAttributes::PUBLIC, Some(object))
            .unwrap();
        if let Some(name) = name {
            builder
                .add_type(MARKER_NAMESPACE, name, TypeAttributes::PUBLIC, Some(object))
                .unwrap();
        }
        builder.build().unwrap()
    }

    #[test]
    fn naming() {
        let hash = ContentHash::from([0xAB; 16]);
        assert_eq!(
            marker_type_name(&hash),
            "hashABABABABABABABABABABABABABABABAB"
        );
    }

    #[test]
    fn extract() {
        let hash = ContentHash::of_bytes(b"assembly_test.dll");
        let file = File::from_mem(module_with_marker(Some(&marker_type_name(&hash)))).unwrap();
        let view = MetadataView::new(&file).unwrap();

        assert_eq!(extract_marker(&view).unwrap(), Some(hash));
    }

    #[test]
    fn missing_and_invalid() {
        let file = File::from_mem(module_with_marker(None)).unwrap();
        let view = MetadataView::new(&file).unwrap();
        assert_eq!(extract_marker(&view).unwrap(), None);

        let file = File::from_mem(module_with_marker(Some("hashNOTHEX"))).unwrap();
        let view = MetadataView::new(&file).unwrap();
        assert!(extract_marker(&view).is_err());
    }
}
