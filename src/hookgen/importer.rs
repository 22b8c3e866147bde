//! Imports references to types of the hooked assembly into the hook module.
//!
//! Type definitions of the input become type references scoped to the input assembly (nested
//! types to their enclosing reference), and type references of the input are copied together
//! with their assembly reference. Every token is imported once.

use std::collections::HashMap;

use crate::{
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion, StrongName},
        image::{AssemblyImage, TypeRefScope, TypeScope},
        signatures::{SignatureMethod, TypeSignature, CALLING_CONVENTION},
        tables::TableId,
        token::Token,
    },
    writer::ModuleBuilder,
    Result,
};

/// Names the core library is known by, in order of preference
pub const CORLIB_NAMES: [&str; 4] = [
    "mscorlib",
    "netstandard",
    "System.Runtime",
    "System.Private.CoreLib",
];

const MSCORLIB_TOKEN: [u8; 8] = [0xb7, 0x7a, 0x5c, 0x56, 0x19, 0x34, 0xe0, 0x89];

/// The core library referenced by `image`, or `mscorlib 4.0.0.0` if it references none.
#[must_use]
pub fn corlib_identity(image: &AssemblyImage) -> AssemblyIdentity {
    CORLIB_NAMES
        .iter()
        .find_map(|name| {
            image
                .assembly_refs()
                .iter()
                .find(|reference| reference.identity.matches_name(name))
        })
        .map_or_else(
            || {
                AssemblyIdentity::new(
                    "mscorlib",
                    AssemblyVersion::new(4, 0, 0, 0),
                    Some(StrongName::Token(MSCORLIB_TOKEN)),
                )
            },
            |reference| reference.identity.clone(),
        )
}

/// Maps tokens of an input image to tokens of a [`ModuleBuilder`].
pub struct Importer<'a> {
    image: &'a AssemblyImage,
    assembly: AssemblyIdentity,
    imported: HashMap<Token, Token>,
}

impl<'a> Importer<'a> {
    /// Creates an importer for `image`.
    ///
    /// # Errors
    /// Returns an error if `image` is a module without assembly manifest.
    pub fn new(image: &'a AssemblyImage) -> Result<Self> {
        let Some(identity) = image.identity() else {
            return Err(malformed_error!(
                "Module {} has no assembly manifest",
                image.module_name()
            ));
        };

        Ok(Importer {
            image,
            assembly: identity.clone(),
            imported: HashMap::new(),
        })
    }

    /// The identity of the input assembly.
    #[must_use]
    pub fn assembly(&self) -> &AssemblyIdentity {
        &self.assembly
    }

    /// Imports the type definition at arena index `index`.
    ///
    /// # Errors
    /// Returns an error if the index is invalid or a reference cannot be added.
    pub fn import_definition(&mut self, builder: &mut ModuleBuilder, index: usize) -> Result<Token> {
        let Some(typedef) = self.image.types().get(index) else {
            return Err(malformed_error!("Type index {} out of range", index));
        };

        self.import_type(builder, typedef.token())
    }

    /// Imports a `TypeDef` or `TypeRef` token of the input.
    ///
    /// # Errors
    /// Returns an error for `TypeSpec` and other tokens that cannot name a type, and for type
    /// references scoped to a `ModuleRef`.
    pub fn import_type(&mut self, builder: &mut ModuleBuilder, token: Token) -> Result<Token> {
        if let Some(imported) = self.imported.get(&token) {
            return Ok(*imported);
        }

        let index = (token.row() as usize).checked_sub(1);
        let imported = match (token.table(), index) {
            (table, Some(index)) if table == TableId::TypeDef as u8 => {
                let Some(typedef) = self.image.types().get(index) else {
                    return Err(malformed_error!("Invalid type definition {}", token));
                };

                match &typedef.scope {
                    TypeScope::Namespace(namespace) => {
                        let scope = builder.add_assembly_ref(&self.assembly)?;
                        builder.add_type_ref(scope, namespace, &typedef.name)?
                    }
                    TypeScope::Nested(enclosing) => {
                        let enclosing = self.image.types()[*enclosing].token();
                        let scope = self.import_type(builder, enclosing)?;
                        builder.add_type_ref(scope, "", &typedef.name)?
                    }
                }
            }
            (table, Some(index)) if table == TableId::TypeRef as u8 => {
                let Some(typeref) = self.image.type_refs().get(index) else {
                    return Err(malformed_error!("Invalid type reference {}", token));
                };

                let scope = match typeref.scope {
                    TypeRefScope::Module => builder.add_assembly_ref(&self.assembly)?,
                    TypeRefScope::AssemblyRef(assembly) => builder
                        .add_assembly_ref(&self.image.assembly_refs()[assembly].identity)?,
                    TypeRefScope::Nested(enclosing) => {
                        let enclosing = Token::from_parts(TableId::TypeRef, enclosing as u32 + 1);
                        self.import_type(builder, enclosing)?
                    }
                    TypeRefScope::ModuleRef(_) => {
                        return Err(malformed_error!(
                            "Type reference {}.{} lives in another module",
                            typeref.namespace,
                            typeref.name
                        ))
                    }
                };
                builder.add_type_ref(scope, &typeref.namespace, &typeref.name)?
            }
            _ => {
                return Err(malformed_error!("Cannot import {} as a type", token));
            }
        };

        self.imported.insert(token, imported);
        Ok(imported)
    }

    /// Imports every type token of a signature type.
    ///
    /// # Errors
    /// Returns the first token import error.
    pub fn import_signature_type(
        &mut self,
        builder: &mut ModuleBuilder,
        signature: &TypeSignature,
    ) -> Result<TypeSignature> {
        signature.try_map_tokens(&mut |token| self.import_type(builder, token))
    }

    /// Imports every type token of a method signature.
    ///
    /// # Errors
    /// Returns an error for vararg signatures and the first token import error.
    pub fn import_method_signature(
        &mut self,
        builder: &mut ModuleBuilder,
        signature: &SignatureMethod,
    ) -> Result<SignatureMethod> {
        if signature.calling_convention == CALLING_CONVENTION::VARARG {
            return Err(malformed_error!("Vararg signatures cannot be hooked"));
        }

        signature.try_map_tokens(&mut |token| self.import_type(builder, token))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        metadata::image::TypeRefScope,
        resolver::SearchDirectories,
        test::{corlib_identity as test_corlib, game, game_assembly_bytes, minimal_module_bytes},
    };

    fn image() -> AssemblyImage {
        AssemblyImage::from_mem(game_assembly_bytes(), SearchDirectories::default()).unwrap()
    }

    #[test]
    fn corlib_detection() {
        assert_eq!(corlib_identity(&image()), test_corlib());

        let bare =
            AssemblyImage::from_mem(minimal_module_bytes(), SearchDirectories::default()).unwrap();
        let fabricated = corlib_identity(&bare);
        assert_eq!(fabricated.name, "mscorlib");
        assert_eq!(fabricated.strong_name, Some(StrongName::Token(MSCORLIB_TOKEN)));
    }

    #[test]
    fn nested_definitions_chain_references() {
        let image = image();
        let player = image.find_type(game::NAMESPACE, game::PLAYER).unwrap();
        let stats = image.find_nested(player, game::STATS).unwrap();
        let entry = image.find_nested(stats, game::ENTRY).unwrap();

        let mut builder = ModuleBuilder::new("MMHOOK_assembly_test.dll");
        let mut importer = Importer::new(&image).unwrap();
        let imported = importer.import_definition(&mut builder, entry).unwrap();
        assert_eq!(importer.import_definition(&mut builder, entry).unwrap(), imported);
        builder.add_type("", "<Module>", 0, None).unwrap();

        let hooks =
            AssemblyImage::from_mem(builder.build().unwrap(), SearchDirectories::default())
                .unwrap();
        let refs = hooks.type_refs();
        assert_eq!(refs.len(), 3);
        assert_eq!(refs[0].name, game::PLAYER);
        assert_eq!(refs[0].namespace, game::NAMESPACE);
        assert_eq!(refs[0].scope, TypeRefScope::AssemblyRef(0));
        assert_eq!(refs[1].scope, TypeRefScope::Nested(0));
        assert_eq!(refs[2].name, game::ENTRY);
        assert_eq!(refs[2].scope, TypeRefScope::Nested(1));
        assert_eq!(hooks.assembly_refs()[0].identity.name, "assembly_test");
    }

    #[test]
    fn signatures_and_failures() {
        let image = image();
        let mut builder = ModuleBuilder::new("hooks.dll");
        let mut importer = Importer::new(&image).unwrap();

        let object = image
            .type_refs()
            .iter()
            .position(|typeref| typeref.name == "Object")
            .unwrap();
        let signature = SignatureMethod::new(
            true,
            TypeSignature::Void,
            vec![TypeSignature::Class(Token::from_parts(
                TableId::TypeRef,
                object as u32 + 1,
            ))],
        );
        let imported = importer
            .import_method_signature(&mut builder, &signature)
            .unwrap();
        assert!(matches!(imported.params[0], TypeSignature::Class(token) if token.is_table(TableId::TypeRef)));

        let spec = TypeSignature::Class(Token::from_parts(TableId::TypeSpec, 1));
        assert!(importer.import_signature_type(&mut builder, &spec).is_err());

        let mut vararg = signature.clone();
        vararg.calling_convention = CALLING_CONVENTION::VARARG;
        assert!(importer.import_method_signature(&mut builder, &vararg).is_err());
    }
}
