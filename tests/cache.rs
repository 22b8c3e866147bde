mod common;

use bephookgen::cache::{CacheGate, CacheMiss, ContentHash, GateDecision};
use common::{simple_assembly_bytes, GameRoot};
use proptest::prelude::*;

proptest! {
    #[test]
    fn any_byte_change_changes_the_hash(
        data in proptest::collection::vec(any::<u8>(), 1..512),
        index in any::<prop::sample::Index>(),
        flip in 1_u8..=255,
    ) {
        let mut mutated = data.clone();
        let at = index.index(mutated.len());
        mutated[at] ^= flip;

        prop_assert_ne!(ContentHash::of_bytes(&data), ContentHash::of_bytes(&mutated));
    }

    #[test]
    fn hex_round_trip(data in proptest::collection::vec(any::<u8>(), 0..64)) {
        let hash = ContentHash::of_bytes(&data);
        prop_assert_eq!(ContentHash::parse(&hash.to_string()).unwrap(), hash);
        prop_assert_eq!(ContentHash::parse(&hash.to_string().to_lowercase()).unwrap(), hash);
    }
}

#[test]
fn file_and_memory_hashes_agree() {
    let game = GameRoot::new();
    let bytes = simple_assembly_bytes();
    let input = game.add_input("assembly_test.dll", &bytes);

    assert_eq!(
        ContentHash::of_file(&input).unwrap(),
        ContentHash::of_bytes(&bytes)
    );
}

#[test]
fn gate_without_outputs() {
    let game = GameRoot::new();
    let input = game.add_input("assembly_test.dll", &simple_assembly_bytes());
    let gate = CacheGate::new(&input, game.hook("assembly_test.dll"));

    assert!(gate.recorded().is_none());
    assert_eq!(
        gate.check(&ContentHash::of_file(&input).unwrap()),
        GateDecision::Run(CacheMiss::NoRecord)
    );
}
