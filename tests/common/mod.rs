//! Fixtures shared by the integration tests.
//!
//! Assemblies are synthesized with the public [`ModuleBuilder`] API.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use bephookgen::{
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion},
        signatures::{SignatureField, SignatureMethod, TypeSignature},
        tables::{FieldAttributes, MethodAccessFlags, MethodModifiers, TypeAttributes},
        token::Token,
    },
    pipeline::PipelineConfig,
    resolver::SearchDirectories,
    writer::{IlBuilder, ModuleBuilder, NewMethod},
};
use tempfile::TempDir;

pub const NAMESPACE: &str = "Game";

/// Nesting chain below `Game.Player`, outermost first.
pub const NESTING: [&str; 4] = ["Inventory", "Slot", "Item", "Stack"];

fn private_instance() -> u16 {
    MethodAccessFlags::PRIVATE.bits() | MethodModifiers::HIDE_BY_SIG.bits()
}

fn corlib() -> AssemblyIdentity {
    AssemblyIdentity::parse(
        "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
    )
    .unwrap()
}

/// `mscorlib` defining only `System.Object`.
pub fn corlib_bytes() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("mscorlib.dll").with_assembly(AssemblyIdentity::new(
        "mscorlib",
        AssemblyVersion::new(4, 0, 0, 0),
        None,
    ));
    builder.add_type("", "<Module>", 0, None).unwrap();
    builder
        .add_type("System", "Object", TypeAttributes::PUBLIC, None)
        .unwrap();
    builder.build().unwrap()
}

fn add_private_method(builder: &mut ModuleBuilder, owner: Token, name: &str) {
    builder
        .add_method(
            owner,
            NewMethod::new(
                name,
                private_instance(),
                SignatureMethod::new(true, TypeSignature::Void, vec![TypeSignature::I4]),
            )
            .params(["amount"])
            .body(IlBuilder::new().ret().finish()),
        )
        .unwrap();
}

/// `assembly_test`: one internal class `Game.Player` with a private method `Hide(int)`.
pub fn simple_assembly_bytes() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("assembly_test.dll").with_assembly(
        AssemblyIdentity::new("assembly_test", AssemblyVersion::new(1, 0, 0, 0), None),
    );
    let mscorlib = builder.add_assembly_ref(&corlib()).unwrap();
    let object = builder.add_type_ref(mscorlib, "System", "Object").unwrap();
    builder.add_type("", "<Module>", 0, None).unwrap();

    let player = builder
        .add_type(NAMESPACE, "Player", TypeAttributes::NOT_PUBLIC, Some(object))
        .unwrap();
    add_private_method(&mut builder, player, "Hide");

    builder.build().unwrap()
}

/// `assembly_nested`: `Game.Player` with the [`NESTING`] chain below it. Every level is
/// non-public and holds a private field and a private method.
pub fn nested_assembly_bytes() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("assembly_nested.dll").with_assembly(
        AssemblyIdentity::new("assembly_nested", AssemblyVersion::new(2, 1, 0, 0), None),
    );
    let mscorlib = builder.add_assembly_ref(&corlib()).unwrap();
    let object = builder.add_type_ref(mscorlib, "System", "Object").unwrap();
    builder.add_type("", "<Module>", 0, None).unwrap();

    let mut owner = builder
        .add_type(NAMESPACE, "Player", TypeAttributes::NOT_PUBLIC, Some(object))
        .unwrap();
    add_members(&mut builder, owner);

    let nested_flags = [
        TypeAttributes::NESTED_PRIVATE,
        TypeAttributes::NESTED_FAMILY,
        TypeAttributes::NESTED_ASSEMBLY,
        TypeAttributes::NESTED_FAM_AND_ASSEM,
    ];
    for (name, flags) in NESTING.iter().zip(nested_flags) {
        owner = builder
            .add_nested_type(owner, name, flags, Some(object))
            .unwrap();
        add_members(&mut builder, owner);
    }

    builder.build().unwrap()
}

fn add_members(builder: &mut ModuleBuilder, owner: Token) {
    let field_flags = [
        FieldAttributes::PRIVATE,
        FieldAttributes::ASSEMBLY,
        FieldAttributes::FAMILY,
    ];
    for (i, flags) in field_flags.into_iter().enumerate() {
        builder
            .add_field(
                owner,
                &format!("field{i}"),
                flags,
                &SignatureField {
                    base: TypeSignature::I4,
                },
            )
            .unwrap();
    }
    add_private_method(builder, owner, "Update");
}

/// One method per access level of `Game.Access`, with the modifiers it is declared with.
pub const ACCESS_LEVELS: [(&str, MethodAccessFlags, u16); 7] = [
    (
        "CompilerControlled",
        MethodAccessFlags::COMPILER_CONTROLLED,
        MethodModifiers::STATIC.bits(),
    ),
    (
        "Private",
        MethodAccessFlags::PRIVATE,
        MethodModifiers::HIDE_BY_SIG.bits(),
    ),
    (
        "FamAndAssem",
        MethodAccessFlags::FAM_AND_ASSEM,
        MethodModifiers::VIRTUAL.bits() | MethodModifiers::NEW_SLOT.bits(),
    ),
    (
        "Assembly",
        MethodAccessFlags::ASSEMBLY,
        MethodModifiers::STATIC.bits() | MethodModifiers::HIDE_BY_SIG.bits(),
    ),
    (
        "Family",
        MethodAccessFlags::FAMILY,
        MethodModifiers::VIRTUAL.bits()
            | MethodModifiers::NEW_SLOT.bits()
            | MethodModifiers::STRICT.bits(),
    ),
    (
        "FamOrAssem",
        MethodAccessFlags::FAM_OR_ASSEM,
        MethodModifiers::VIRTUAL.bits()
            | MethodModifiers::FINAL.bits()
            | MethodModifiers::HIDE_BY_SIG.bits(),
    ),
    (
        "Public",
        MethodAccessFlags::PUBLIC,
        MethodModifiers::HIDE_BY_SIG.bits(),
    ),
];

/// `assembly_access`: internal `Game.Access` declaring one method per [`ACCESS_LEVELS`] entry.
pub fn access_assembly_bytes() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("assembly_access.dll").with_assembly(
        AssemblyIdentity::new("assembly_access", AssemblyVersion::new(1, 0, 0, 0), None),
    );
    let mscorlib = builder.add_assembly_ref(&corlib()).unwrap();
    let object = builder.add_type_ref(mscorlib, "System", "Object").unwrap();
    builder.add_type("", "<Module>", 0, None).unwrap();

    let access = builder
        .add_type(NAMESPACE, "Access", TypeAttributes::NOT_PUBLIC, Some(object))
        .unwrap();
    for (name, level, modifiers) in ACCESS_LEVELS {
        let has_this = modifiers & MethodModifiers::STATIC.bits() == 0;
        builder
            .add_method(
                access,
                NewMethod::new(
                    name,
                    level.bits() | modifiers,
                    SignatureMethod::new(has_this, TypeSignature::Void, vec![]),
                )
                .body(IlBuilder::new().ret().finish()),
            )
            .unwrap();
    }

    builder.build().unwrap()
}

/// A temporary game installation with `valheim_Data/Managed` holding `mscorlib.dll`.
pub struct GameRoot {
    pub dir: TempDir,
}

impl GameRoot {
    pub fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let root = GameRoot { dir };
        std::fs::create_dir_all(root.managed()).unwrap();
        std::fs::write(root.managed().join("mscorlib.dll"), corlib_bytes()).unwrap();
        root
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    pub fn managed(&self) -> PathBuf {
        self.dir.path().join("valheim_Data").join("Managed")
    }

    /// Writes `bytes` as `<Managed>/<name>` and returns the path.
    pub fn add_input(&self, name: &str, bytes: &[u8]) -> PathBuf {
        let path = self.managed().join(name);
        std::fs::write(&path, bytes).unwrap();
        path
    }

    pub fn publicized(&self, stem: &str) -> PathBuf {
        self.managed()
            .join("publicized_assemblies")
            .join(format!("{stem}_publicized.dll"))
    }

    pub fn hook(&self, file_name: &str) -> PathBuf {
        self.path()
            .join("BepInEx")
            .join("plugins")
            .join("MMHOOK")
            .join(format!("MMHOOK_{file_name}"))
    }

    /// Configuration resolving only against the managed directory.
    pub fn config(&self) -> PipelineConfig {
        PipelineConfig::for_game_root(self.path())
            .unwrap()
            .with_search_directories(SearchDirectories::new(vec![self.managed()]))
    }
}
