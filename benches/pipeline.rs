//! Benchmarks for the per-file stages.
//!
//! - MD5 hashing of an input
//! - Loading and publicizing a module
//! - Generating its hook module
//! - Method signature parsing

extern crate bephookgen;

use bephookgen::{
    cache::ContentHash,
    hookgen::HookGenerator,
    metadata::{
        identity::{AssemblyIdentity, AssemblyVersion},
        image::AssemblyImage,
        signatures::{SignatureMethod, SignatureParser, TypeSignature},
        tables::{MethodAccessFlags, MethodModifiers, TypeAttributes},
    },
    publicizer::publicize,
    resolver::SearchDirectories,
    writer::{IlBuilder, ModuleBuilder, NewMethod},
};
use criterion::{criterion_group, criterion_main, Criterion};
use std::hint::black_box;

const TYPES: usize = 200;
const METHODS_PER_TYPE: usize = 10;

/// A module shaped like a game assembly: `TYPES` internal classes, each with private overloads.
fn synthetic_assembly() -> Vec<u8> {
    let mut builder = ModuleBuilder::new("assembly_bench.dll").with_assembly(
        AssemblyIdentity::new("assembly_bench", AssemblyVersion::new(1, 0, 0, 0), None),
    );
    let mscorlib = builder
        .add_assembly_ref(
            &AssemblyIdentity::parse(
                "mscorlib, Version=4.0.0.0, Culture=neutral, PublicKeyToken=b77a5c561934e089",
            )
            .unwrap(),
        )
        .unwrap();
    let object = builder.add_type_ref(mscorlib, "System", "Object").unwrap();
    builder.add_type("", "<Module>", 0, None).unwrap();

    let flags = MethodAccessFlags::PRIVATE.bits() | MethodModifiers::HIDE_BY_SIG.bits();
    let params = [
        TypeSignature::I4,
        TypeSignature::R4,
        TypeSignature::String,
        TypeSignature::Boolean,
    ];

    for t in 0..TYPES {
        let owner = builder
            .add_type(
                "Bench",
                &format!("Type{t}"),
                TypeAttributes::NOT_PUBLIC,
                Some(object),
            )
            .unwrap();
        for m in 0..METHODS_PER_TYPE {
            let signature = SignatureMethod::new(
                true,
                TypeSignature::Void,
                vec![params[m % params.len()].clone()],
            );
            builder
                .add_method(
                    owner,
                    NewMethod::new(&format!("Method{}", m / 2), flags, signature)
                        .params(["value"])
                        .body(IlBuilder::new().ret().finish()),
                )
                .unwrap();
        }
    }

    builder.build().unwrap()
}

fn bench_hash(c: &mut Criterion) {
    let data = vec![0x5A_u8; 4 * 1024 * 1024];

    c.bench_function("hash_4mb", |b| {
        b.iter(|| black_box(ContentHash::of_bytes(black_box(&data))));
    });
}

fn bench_publicize(c: &mut Criterion) {
    let data = synthetic_assembly();

    c.bench_function("publicize", |b| {
        b.iter(|| {
            let mut image =
                AssemblyImage::from_mem(black_box(data.clone()), SearchDirectories::default())
                    .unwrap();
            let report = publicize(&mut image);
            black_box((report, image.to_bytes().unwrap()))
        });
    });
}

fn bench_hookgen(c: &mut Criterion) {
    let image = AssemblyImage::from_mem(synthetic_assembly(), SearchDirectories::default()).unwrap();
    let generator = HookGenerator::default();
    let hash = ContentHash::of_bytes(b"bench");

    c.bench_function("hookgen", |b| {
        b.iter(|| {
            black_box(
                generator
                    .generate(black_box(&image), "MMHOOK_assembly_bench.dll", &hash)
                    .unwrap(),
            )
        });
    });
}

/// Signature: int Method(int a, string b, bool c)
fn bench_method_signature(c: &mut Criterion) {
    let signature = [0x20, 0x03, 0x08, 0x08, 0x0E, 0x02];

    c.bench_function("sig_method_primitives", |b| {
        b.iter(|| {
            let sig = SignatureParser::new(black_box(&signature))
                .parse_method_signature()
                .unwrap();
            black_box(sig)
        });
    });
}

criterion_group!(
    benches,
    bench_hash,
    bench_publicize,
    bench_hookgen,
    bench_method_signature
);
criterion_main!(benches);
