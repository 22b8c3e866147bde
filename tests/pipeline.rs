mod common;

use std::{fs, thread, time::Duration};

use bephookgen::{
    cache::{marker::read_marker, CacheMiss, ContentHash},
    metadata::image::{AssemblyImage, TypeVisibility},
    pipeline::{FileOutcome, Pipeline},
    resolver::SearchDirectories,
    Error, Stage,
};
use common::{simple_assembly_bytes, GameRoot, NAMESPACE};

#[test]
fn end_to_end() {
    let game = GameRoot::new();
    let input = game.add_input("assembly_test.dll", &simple_assembly_bytes());

    let report = Pipeline::new(game.config()).run().unwrap();
    assert_eq!(report.processed(), 1);
    assert_eq!(report.skipped(), 0);

    let publicized = game.publicized("assembly_test");
    let image = AssemblyImage::from_file(&publicized, SearchDirectories::default()).unwrap();
    let player = image.find_type(NAMESPACE, "Player").unwrap();
    assert_eq!(image.types()[player].visibility(), TypeVisibility::Public);
    let hide = image.types()[player].methods[0];
    assert_eq!(image.methods()[hide].name, "Hide");
    assert!(image.methods()[hide].is_public());

    let hook = game.hook("assembly_test.dll");
    assert_eq!(
        read_marker(&hook).unwrap(),
        Some(ContentHash::of_file(&input).unwrap())
    );

    let hooks = AssemblyImage::from_file(&hook, SearchDirectories::default()).unwrap();
    let on = hooks.find_type("On.Game", "Player").unwrap();
    assert!(hooks.find_nested(on, "orig_Hide").is_some());
    assert!(hooks.find_nested(on, "hook_Hide").is_some());
    assert!(hooks.find_type("IL.Game", "Player").is_some());
}

#[test]
fn second_run_changes_nothing() {
    let game = GameRoot::new();
    game.add_input("assembly_test.dll", &simple_assembly_bytes());
    let pipeline = Pipeline::new(game.config());
    pipeline.run().unwrap();

    let outputs = [game.publicized("assembly_test"), game.hook("assembly_test.dll")];
    let before: Vec<_> = outputs
        .iter()
        .map(|path| {
            (
                fs::read(path).unwrap(),
                fs::metadata(path).unwrap().modified().unwrap(),
            )
        })
        .collect();

    // Coarse filesystem timestamps would hide a rewrite
    thread::sleep(Duration::from_millis(50));

    let report = pipeline.run().unwrap();
    assert_eq!(report.processed(), 0);
    assert_eq!(report.skipped(), 1);

    for (path, (bytes, modified)) in outputs.iter().zip(before) {
        assert_eq!(fs::read(path).unwrap(), bytes);
        assert_eq!(fs::metadata(path).unwrap().modified().unwrap(), modified);
    }
}

#[test]
fn deleted_publicized_output_is_rebuilt() {
    let game = GameRoot::new();
    let input = game.add_input("assembly_test.dll", &simple_assembly_bytes());
    let pipeline = Pipeline::new(game.config());
    pipeline.run().unwrap();

    let publicized = game.publicized("assembly_test");
    fs::remove_file(&publicized).unwrap();

    match pipeline.process(&input).unwrap() {
        FileOutcome::Processed { reason, .. } => {
            assert_eq!(reason, CacheMiss::MissingOutput(publicized.clone()));
        }
        other => panic!("Expected Processed, got {other:?}"),
    }
    assert!(publicized.exists());
}

#[test]
fn deleted_hook_output_is_rebuilt() {
    let game = GameRoot::new();
    let input = game.add_input("assembly_test.dll", &simple_assembly_bytes());
    let pipeline = Pipeline::new(game.config());
    pipeline.run().unwrap();

    let hook = game.hook("assembly_test.dll");
    fs::remove_file(&hook).unwrap();

    assert!(matches!(
        pipeline.process(&input).unwrap(),
        FileOutcome::Processed {
            reason: CacheMiss::NoRecord,
            ..
        }
    ));
    assert_eq!(
        read_marker(&hook).unwrap(),
        Some(ContentHash::of_file(&input).unwrap())
    );
}

#[test]
fn corrupt_input_halts_the_batch() {
    let game = GameRoot::new();
    let broken = game.add_input("assembly_a.dll", b"not an assembly");
    game.add_input("assembly_test.dll", &simple_assembly_bytes());

    let error = Pipeline::new(game.config()).run().unwrap_err();
    match error {
        Error::Stage { file, stage, .. } => {
            assert_eq!(file, broken);
            assert_eq!(stage, Stage::Publicize);
        }
        other => panic!("Expected a stage error, got {other:?}"),
    }
    assert!(!game.hook("assembly_test.dll").exists());
}

#[test]
fn server_layout() {
    let dir = tempfile::tempdir().unwrap();
    let managed = dir.path().join("valheim_server_Data").join("Managed");
    fs::create_dir_all(&managed).unwrap();
    fs::write(managed.join("mscorlib.dll"), common::corlib_bytes()).unwrap();
    fs::write(managed.join("assembly_test.dll"), simple_assembly_bytes()).unwrap();

    let config = bephookgen::pipeline::PipelineConfig::for_game_root(dir.path())
        .unwrap()
        .with_search_directories(SearchDirectories::new(vec![managed.clone()]));
    let report = Pipeline::new(config).run().unwrap();

    assert_eq!(report.processed(), 1);
    assert!(managed
        .join("publicized_assemblies")
        .join("assembly_test_publicized.dll")
        .exists());
}

#[test]
fn missing_layout() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        bephookgen::pipeline::PipelineConfig::for_game_root(dir.path()),
        Err(Error::ManagedDirNotFound(_))
    ));
}
