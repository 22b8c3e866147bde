//! Shared fixtures for the unit tests.
//!
//! Every assembly used by the tests is synthesized with [`ModuleBuilder`]; there are no binary
//! samples in the repository.

use std::path::Path;

use crate::{
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion},
        signatures::{SignatureField, SignatureMethod, TypeSignature},
        tables::{
            FieldAttributes, MethodAccessFlags, MethodImplAttributes, MethodModifiers,
            TypeAttributes,
        },
        token::Token,
    },
    writer::{GenericOwner, IlBuilder, ModuleBuilder, NewMethod},
};

pub(crate) const PRIVATE: u16 = MethodAccessFlags::PRIVATE.bits();
pub(crate) const HIDE_BY_SIG: u16 = MethodModifiers::HIDE_BY_SIG.bits();
pub(crate) const STATIC: u16 = MethodModifiers::STATIC.bits();
pub(crate) const CTOR: u16 =
    MethodModifiers::SPECIAL_NAME.bits() | MethodModifiers::RT_SPECIAL_NAME.bits();

pub(crate) fn corlib_identity() -> AssemblyIdentity {
    AssemblyIdentity::parse(
        "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
    )
    .unwrap()
}

/// A bare assembly called `minimal` holding only `<Module>`.
pub(crate) fn minimal_module_bytes() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("minimal.dll").with_assembly(AssemblyIdentity::new(
        "minimal",
        AssemblyVersion::new(1, 0, 0, 0),
        None,
    ));
    builder.add_type("", "<Module>", 0, None).unwrap();
    builder.build().unwrap()
}

/// An assembly named `name` that defines `System.Object` and `System.ValueType`.
pub(crate) fn stub_assembly_bytes(name: &str) -> Vec<u8> {
    let mut builder = ModuleBuilder::new(format!("{name}.dll")).with_assembly(
        AssemblyIdentity::new(name, AssemblyVersion::new(4, 0, 0, 0), None),
    );
    builder.add_type("", "<Module>", 0, None).unwrap();
    let object = builder
        .add_type("System", "Object", TypeAttributes::PUBLIC, None)
        .unwrap();
    builder
        .add_type(
            "System",
            "ValueType",
            TypeAttributes::PUBLIC | TypeAttributes::ABSTRACT,
            Some(object),
        )
        .unwrap();
    builder.build().unwrap()
}

pub(crate) fn write_stub_assembly(path: &Path, name: &str) {
    std::fs::write(path, stub_assembly_bytes(name)).unwrap();
}

fn void_body() -> crate::writer::MethodBody {
    IlBuilder::new().ret().finish()
}

/// Names used by [`game_assembly_bytes`].
pub(crate) mod game {
    pub(crate) const NAMESPACE: &str = "Game";
    pub(crate) const PLAYER: &str = "Player";
    pub(crate) const STATS: &str = "Stats";
    pub(crate) const ENTRY: &str = "Entry";
    pub(crate) const DEEP: &str = "Deep";
    pub(crate) const BOX: &str = "Box`1";
    pub(crate) const DETAILS: &str = "<PrivateImplementationDetails>";
}

/// A small game assembly, `assembly_test`, referencing `mscorlib`:
///
/// - `Game.Player` (internal) with a private field, a private `.ctor`, two private `Heal`
///   overloads, a private static `Spawn`, a `.cctor`, a generic `Get<T>` and a runtime `Extern`
/// - `Player/Stats` (nested private) with `Reset`
/// - `Player/Stats/Entry` (nested assembly value type) with `Touch`
/// - `Player/Stats/Entry/Deep` (nested family) with a private field
/// - `Game.Box`1` (generic) with `Open`
/// - `<PrivateImplementationDetails>` with `Compute`
pub(crate) fn game_assembly_bytes() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("assembly_test.dll").with_assembly(
        AssemblyIdentity::new("assembly_test", AssemblyVersion::new(1, 0, 0, 0), None),
    );
    let mscorlib = builder.add_assembly_ref(&corlib_identity()).unwrap();
    let object = builder.add_type_ref(mscorlib, "System", "Object").unwrap();
    let value_type = builder
        .add_type_ref(mscorlib, "System", "ValueType")
        .unwrap();

    builder.add_type("", "<Module>", 0, None).unwrap();

    let player = builder
        .add_type(
            game::NAMESPACE,
            game::PLAYER,
            TypeAttributes::NOT_PUBLIC | TypeAttributes::BEFORE_FIELD_INIT,
            Some(object),
        )
        .unwrap();
    builder
        .add_field(
            player,
            "health",
            FieldAttributes::PRIVATE,
            &SignatureField {
                base: TypeSignature::I4,
            },
        )
        .unwrap();
    add_methods(&mut builder, player);

    let stats = builder
        .add_nested_type(
            player,
            game::STATS,
            TypeAttributes::NESTED_PRIVATE,
            Some(object),
        )
        .unwrap();
    add_instance(&mut builder, stats, "Reset", vec![]);

    let entry = builder
        .add_nested_type(
            stats,
            game::ENTRY,
            TypeAttributes::NESTED_ASSEMBLY | TypeAttributes::SEALED,
            Some(value_type),
        )
        .unwrap();
    add_instance(&mut builder, entry, "Touch", vec![TypeSignature::String]);

    let deep = builder
        .add_nested_type(entry, game::DEEP, TypeAttributes::NESTED_FAMILY, Some(object))
        .unwrap();
    builder
        .add_field(
            deep,
            "secret",
            FieldAttributes::ASSEMBLY,
            &SignatureField {
                base: TypeSignature::Boolean,
            },
        )
        .unwrap();

    let generic = builder
        .add_type(game::NAMESPACE, game::BOX, TypeAttributes::NOT_PUBLIC, Some(object))
        .unwrap();
    builder
        .add_generic_param(GenericOwner::Type(generic), "T")
        .unwrap();
    add_instance(&mut builder, generic, "Open", vec![]);

    let details = builder
        .add_type("", game::DETAILS, TypeAttributes::NOT_PUBLIC, Some(object))
        .unwrap();
    builder
        .add_method(
            details,
            NewMethod::new(
                "Compute",
                PRIVATE | STATIC,
                SignatureMethod::new(false, TypeSignature::U4, vec![TypeSignature::String]),
            )
            .params(["s"])
            .body(void_body()),
        )
        .unwrap();

    builder.build().unwrap()
}

fn add_instance(builder: &mut ModuleBuilder, owner: Token, name: &str, params: Vec<TypeSignature>) {
    let names: Vec<String> = (0..params.len()).map(|i| format!("arg{i}")).collect();
    builder
        .add_method(
            owner,
            NewMethod::new(
                name,
                PRIVATE | HIDE_BY_SIG,
                SignatureMethod::new(true, TypeSignature::Void, params),
            )
            .params(names)
            .body(void_body()),
        )
        .unwrap();
}

fn add_methods(builder: &mut ModuleBuilder, player: Token) {
    builder
        .add_method(
            player,
            NewMethod::new(
                ".ctor",
                PRIVATE | HIDE_BY_SIG | CTOR,
                SignatureMethod::new(true, TypeSignature::Void, vec![]),
            )
            .body(void_body()),
        )
        .unwrap();
    add_instance(builder, player, "Heal", vec![TypeSignature::I4]);
    add_instance(builder, player, "Heal", vec![TypeSignature::R4]);
    builder
        .add_method(
            player,
            NewMethod::new(
                "Spawn",
                PRIVATE | HIDE_BY_SIG | STATIC,
                SignatureMethod::new(false, TypeSignature::Class(player), vec![]),
            )
            .body(void_body()),
        )
        .unwrap();
    builder
        .add_method(
            player,
            NewMethod::new(
                ".cctor",
                PRIVATE | HIDE_BY_SIG | STATIC | CTOR,
                SignatureMethod::new(false, TypeSignature::Void, vec![]),
            )
            .body(void_body()),
        )
        .unwrap();

    let mut generic = SignatureMethod::new(true, TypeSignature::GenericParamMethod(0), vec![]);
    generic.generic_param_count = 1;
    let get = builder
        .add_method(
            player,
            NewMethod::new("Get", PRIVATE | HIDE_BY_SIG, generic).body(void_body()),
        )
        .unwrap();
    builder
        .add_generic_param(GenericOwner::Method(get), "T")
        .unwrap();

    builder
        .add_method(
            player,
            NewMethod::new(
                "Extern",
                PRIVATE | HIDE_BY_SIG,
                SignatureMethod::new(true, TypeSignature::Void, vec![]),
            )
            .impl_flags(MethodImplAttributes::RUNTIME),
        )
        .unwrap();
}
