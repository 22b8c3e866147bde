//! Member names of generated hooks.
//!
//! A hook is named after its target method with the leading dot of special names removed and
//! remaining dots replaced, so `.ctor` becomes `ctor` and `System.IDisposable.Dispose` becomes
//! `System_IDisposable_Dispose`. Overloads are told apart by the names of their parameter types
//! (`Heal_Int32`, `Heal_Single`); anything still ambiguous gets a numeric suffix.

use std::collections::{HashMap, HashSet};

use crate::metadata::{
    image::AssemblyImage,
    signatures::{SignatureMethod, TypeSignature},
    tables::TableId,
    token::Token,
};

/// `.ctor` -> `ctor`, `A.B` -> `A_B`.
#[must_use]
pub fn friendly_name(name: &str) -> String {
    name.strip_prefix('.').unwrap_or(name).replace('.', "_")
}

/// Simple name of a type token of `image`, without generic arity.
#[must_use]
pub fn token_name(image: &AssemblyImage, token: Token) -> String {
    let index = (token.row() as usize).checked_sub(1);
    let name = match (token.table(), index) {
        (table, Some(index)) if table == TableId::TypeDef as u8 => {
            image.types().get(index).map(|typedef| typedef.name.as_str())
        }
        (table, Some(index)) if table == TableId::TypeRef as u8 => {
            image.type_refs().get(index).map(|typeref| typeref.name.as_str())
        }
        _ => None,
    };

    let name = name.unwrap_or("Type");
    match name.split_once('`') {
        Some((stem, _)) => stem.to_string(),
        None => name.to_string(),
    }
}

/// Name of a signature type as used in overload suffixes.
#[must_use]
pub fn type_name(image: &AssemblyImage, signature: &TypeSignature) -> String {
    match signature {
        TypeSignature::Void => "Void".to_string(),
        TypeSignature::Boolean => "Boolean".to_string(),
        TypeSignature::Char => "Char".to_string(),
        TypeSignature::I1 => "SByte".to_string(),
        TypeSignature::U1 => "Byte".to_string(),
        TypeSignature::I2 => "Int16".to_string(),
        TypeSignature::U2 => "UInt16".to_string(),
        TypeSignature::I4 => "Int32".to_string(),
        TypeSignature::U4 => "UInt32".to_string(),
        TypeSignature::I8 => "Int64".to_string(),
        TypeSignature::U8 => "UInt64".to_string(),
        TypeSignature::R4 => "Single".to_string(),
        TypeSignature::R8 => "Double".to_string(),
        TypeSignature::String => "String".to_string(),
        TypeSignature::I => "IntPtr".to_string(),
        TypeSignature::U => "UIntPtr".to_string(),
        TypeSignature::Object => "Object".to_string(),
        TypeSignature::TypedByRef => "TypedReference".to_string(),
        TypeSignature::Ptr(base) => format!("{}Ptr", type_name(image, base)),
        TypeSignature::ByRef(base) => format!("{}Ref", type_name(image, base)),
        TypeSignature::ValueType(token) | TypeSignature::Class(token) => token_name(image, *token),
        TypeSignature::GenericParamType(number) => format!("T{number}"),
        TypeSignature::GenericParamMethod(number) => format!("M{number}"),
        TypeSignature::Array(array) => format!("{}Array{}", type_name(image, &array.base), array.rank),
        TypeSignature::SzArray(base) => format!("{}Array", type_name(image, base)),
        TypeSignature::GenericInst(base, _) => type_name(image, base),
        TypeSignature::FnPtr(_) => "FnPtr".to_string(),
        TypeSignature::Modified(_, base) | TypeSignature::Pinned(base) => type_name(image, base),
    }
}

/// Assigns a unique hook name to each method of one type, in order.
///
/// `methods` pairs each method name with its signature.
#[must_use]
pub fn hook_names(image: &AssemblyImage, methods: &[(&str, &SignatureMethod)]) -> Vec<String> {
    let bases: Vec<String> = methods.iter().map(|(name, _)| friendly_name(name)).collect();

    let mut counts: HashMap<&str, usize> = HashMap::new();
    for base in &bases {
        *counts.entry(base.as_str()).or_default() += 1;
    }

    let candidates: Vec<String> = bases
        .iter()
        .zip(methods)
        .map(|(base, (_, signature))| {
            if counts.get(base.as_str()).copied().unwrap_or(0) < 2 || signature.params.is_empty() {
                return base.clone();
            }

            let mut name = base.clone();
            for param in &signature.params {
                name.push('_');
                name.push_str(&type_name(image, param));
            }
            name
        })
        .collect();

    let mut taken: HashSet<String> = HashSet::new();
    candidates
        .into_iter()
        .map(|candidate| {
            let mut name = candidate.clone();
            let mut suffix = 1;
            while taken.contains(&name) {
                name = format!("{candidate}_{suffix}");
                suffix += 1;
            }
            taken.insert(name.clone());
            name
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{resolver::SearchDirectories, test::game_assembly_bytes};

    fn image() -> AssemblyImage {
        AssemblyImage::from_mem(game_assembly_bytes(), SearchDirectories::default()).unwrap()
    }

    #[test]
    fn friendly() {
        assert_eq!(friendly_name(".ctor"), "ctor");
        assert_eq!(friendly_name("System.IDisposable.Dispose"), "System_IDisposable_Dispose");
        assert_eq!(friendly_name("Update"), "Update");
    }

    #[test]
    fn overloads() {
        let image = image();
        let void = |params| SignatureMethod::new(true, TypeSignature::Void, params);
        let int = void(vec![TypeSignature::I4]);
        let float = void(vec![TypeSignature::R4]);
        let array = void(vec![TypeSignature::SzArray(Box::new(TypeSignature::String))]);
        let none = void(vec![]);
        let int_again = void(vec![TypeSignature::I4]);

        let names = hook_names(
            &image,
            &[
                ("Heal", &int),
                ("Heal", &float),
                ("Heal", &array),
                ("Heal", &none),
                ("Heal", &int_again),
                (".ctor", &none),
            ],
        );

        assert_eq!(
            names,
            vec![
                "Heal_Int32",
                "Heal_Single",
                "Heal_StringArray",
                "Heal",
                "Heal_Int32_1",
                "ctor"
            ]
        );
    }

    #[test]
    fn type_tokens() {
        let image = image();
        let object = image
            .type_refs()
            .iter()
            .position(|typeref| typeref.name == "Object")
            .unwrap();
        let token = Token::from_parts(TableId::TypeRef, object as u32 + 1);
        assert_eq!(
            type_name(&image, &TypeSignature::ByRef(Box::new(TypeSignature::Class(token)))),
            "ObjectRef"
        );

        let boxed = image.find_type("Game", "Box`1").unwrap();
        assert_eq!(token_name(&image, image.types()[boxed].token()), "Box");
    }
}
