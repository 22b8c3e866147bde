mod common;

use bephookgen::{
    metadata::{
        image::{AssemblyImage, TypeVisibility},
        tables::{MethodAccessFlags, MethodModifiers},
    },
    publicizer::{publicize, Publicizer},
    resolver::SearchDirectories,
    Error,
};
use common::{
    access_assembly_bytes, nested_assembly_bytes, GameRoot, ACCESS_LEVELS, NAMESPACE, NESTING,
};

fn load(bytes: Vec<u8>) -> AssemblyImage {
    AssemblyImage::from_mem(bytes, SearchDirectories::default()).unwrap()
}

#[test]
fn nested_types_become_nested_public() {
    let mut image = load(nested_assembly_bytes());
    let report = publicize(&mut image);
    // `<Module>`, `Player` and the nesting chain
    assert_eq!(report.types, 2 + NESTING.len());
    assert_eq!(report.types_visited, image.types().len());

    let reloaded = load(image.to_bytes().unwrap());
    let mut current = reloaded.find_type(NAMESPACE, "Player").unwrap();
    assert_eq!(
        reloaded.types()[current].visibility(),
        TypeVisibility::Public
    );

    for name in NESTING {
        current = reloaded.find_nested(current, name).unwrap();
        let typedef = &reloaded.types()[current];
        assert!(typedef.is_nested());
        assert_eq!(typedef.visibility(), TypeVisibility::NestedPublic, "{name}");
    }
}

#[test]
fn every_member_becomes_public() {
    let mut image = load(nested_assembly_bytes());
    let report = publicize(&mut image);

    let reloaded = load(image.to_bytes().unwrap());
    assert!(reloaded.methods().iter().all(|method| method.is_public()));
    assert!(reloaded.fields().iter().all(|field| field.is_public()));
    assert_eq!(report.methods, reloaded.methods().len());
    assert_eq!(report.fields, reloaded.fields().len());

    // Publicizing is idempotent
    let mut again = reloaded;
    let second = publicize(&mut again);
    assert_eq!((second.types, second.methods, second.fields), (0, 0, 0));
}

#[test]
fn every_access_level_becomes_public() {
    let mut image = load(access_assembly_bytes());
    let report = publicize(&mut image);
    // `Public` is already public
    assert_eq!(report.methods, ACCESS_LEVELS.len() - 1);

    let reloaded = load(image.to_bytes().unwrap());
    let access = reloaded.find_type(NAMESPACE, "Access").unwrap();
    for (name, _, modifiers) in ACCESS_LEVELS {
        let method = reloaded
            .methods()
            .iter()
            .find(|method| method.declaring_type == access && method.name == name)
            .unwrap();
        assert_eq!(
            MethodAccessFlags::from_method_flags(method.flags),
            MethodAccessFlags::PUBLIC,
            "{name}"
        );
        assert_eq!(
            MethodModifiers::from_method_flags(method.flags).bits(),
            modifiers,
            "{name}"
        );
    }
}

#[test]
fn flags_outside_visibility_are_kept() {
    let original = load(nested_assembly_bytes());
    let mut image = load(nested_assembly_bytes());
    publicize(&mut image);

    for (before, after) in original.types().iter().zip(image.types()) {
        assert_eq!(before.flags & !0x7, after.flags & !0x7);
    }
    for (before, after) in original.methods().iter().zip(image.methods()) {
        assert_eq!(before.flags & !0x7, after.flags & !0x7);
    }
}

#[test]
fn writes_next_to_the_managed_assemblies() {
    let game = GameRoot::new();
    let input = game.add_input("assembly_nested.dll", &nested_assembly_bytes());

    let publicizer = Publicizer::new(game.managed().join("publicized_assemblies"));
    let output = publicizer.run(&input, SearchDirectories::default()).unwrap();
    assert_eq!(output, game.publicized("assembly_nested"));

    let image = AssemblyImage::from_file(&output, SearchDirectories::default()).unwrap();
    assert!(image.methods().iter().all(|method| method.is_public()));
    assert_eq!(image.identity().unwrap().name, "assembly_nested");
}

#[test]
fn missing_input() {
    let game = GameRoot::new();
    let publicizer = Publicizer::new(game.managed().join("publicized_assemblies"));

    let error = publicizer
        .run(&game.managed().join("assembly_missing.dll"), SearchDirectories::default())
        .unwrap_err();
    assert!(matches!(error, Error::FileError(_)));
}
