use crate::arena::Arena;
use crate::layout::NULL;
use crate::node;
use crate::ops::get::find_leaf;
use crate::ops::insert::{insert, ValueSource};
use crate::ops::remove::{remove, RemoveOutcome};
use crate::MapHandle;

/// Inserts with a caller-chosen hash, bypassing FNV-1a, so full 32-bit
/// collisions can be forced deterministically.
fn forced_insert(a: &mut Arena, root: u32, hash: u32, key: &[u8], val: &[u8]) -> u32 {
    insert(a, root, hash, key, ValueSource::Bytes(val), 0)
        .unwrap()
        .node
}

fn forced_get<'a>(a: &'a Arena, root: u32, hash: u32, key: &[u8]) -> Option<&'a [u8]> {
    let leaf = find_leaf(a, root, hash, key);
    (leaf != NULL).then(|| node::leaf_val(a, leaf))
}

/// Hash-collision candidates from the public surface: all retrievable.
#[test]
fn candidate_keys_all_retrievable() {
    let mut a = Arena::new();
    let keys: [&[u8]; 5] = [b"aa", b"aA", b"bB", b"Bb", b"BB"];
    let mut map = MapHandle::new();
    for (i, key) in keys.iter().enumerate() {
        map = map.set(&mut a, key, format!("v{i}").as_bytes()).unwrap();
    }
    assert_eq!(map.len(), 5);
    for (i, key) in keys.iter().enumerate() {
        assert_eq!(map.get(&a, key), Some(format!("v{i}").as_bytes()));
    }
}

/// Two keys with the same full 32-bit hash land in a collision node.
#[test]
fn two_full_hash_collisions() {
    let mut a = Arena::new();
    let hash = 0xDEAD_BEEF;
    let root = forced_insert(&mut a, NULL, hash, b"first", b"1");
    let root = forced_insert(&mut a, root, hash, b"second", b"2");

    assert_eq!(forced_get(&a, root, hash, b"first"), Some(&b"1"[..]));
    assert_eq!(forced_get(&a, root, hash, b"second"), Some(&b"2"[..]));
    assert_eq!(forced_get(&a, root, hash, b"third"), None);
}

/// Three colliding keys extend the positional node.
#[test]
fn three_full_hash_collisions() {
    let mut a = Arena::new();
    let hash = 0xCAFE;
    let mut root = NULL;
    for i in 0..3u32 {
        root = forced_insert(&mut a, root, hash, format!("key{i}").as_bytes(), b"x");
    }
    for i in 0..3u32 {
        assert!(find_leaf(&a, root, hash, format!("key{i}").as_bytes()) != NULL);
    }
}

/// Overwriting inside a collision node replaces just that entry.
#[test]
fn overwrite_in_collision_node() {
    let mut a = Arena::new();
    let hash = 0xBBBB;
    let root = forced_insert(&mut a, NULL, hash, b"k1", b"old");
    let root = forced_insert(&mut a, root, hash, b"k2", b"v2");
    let out = insert(&mut a, root, hash, b"k1", ValueSource::Bytes(b"new"), 0).unwrap();

    assert!(out.existed);
    assert_eq!(forced_get(&a, out.node, hash, b"k1"), Some(&b"new"[..]));
    assert_eq!(forced_get(&a, out.node, hash, b"k2"), Some(&b"v2"[..]));
}

/// Removing the second-to-last colliding leaf collapses the node to the
/// surviving leaf.
#[test]
fn collision_collapse_on_remove() {
    let mut a = Arena::new();
    let hash = 0xAAAA;
    let mut root = NULL;
    for key in [&b"k1"[..], b"k2", b"k3"] {
        root = forced_insert(&mut a, root, hash, key, b"x");
    }

    for key in [&b"k2"[..], b"k3"] {
        root = match remove(&mut a, root, hash, key, 0).unwrap() {
            RemoveOutcome::Removed { node } => node,
            RemoveOutcome::NotFound => panic!("{key:?} should be present"),
        };
    }
    assert!(find_leaf(&a, root, hash, b"k1") != NULL);
    assert_eq!(find_leaf(&a, root, hash, b"k2"), NULL);
    assert_eq!(find_leaf(&a, root, hash, b"k3"), NULL);
}

/// Removing a key whose hash matches a collision node but whose bytes are
/// absent reports not-found without mutating.
#[test]
fn collision_remove_miss() {
    let mut a = Arena::new();
    let hash = 0x1234;
    let root = forced_insert(&mut a, NULL, hash, b"k1", b"1");
    let root = forced_insert(&mut a, root, hash, b"k2", b"2");

    assert!(matches!(
        remove(&mut a, root, hash, b"k9", 0).unwrap(),
        RemoveOutcome::NotFound
    ));
}

/// Hashes sharing some low fragments split into a chain of single-child
/// nodes before diverging.
#[test]
fn partial_hash_overlap_splits_deep() {
    let mut a = Arena::new();
    // Same fragments at shifts 0 and 5, diverging at shift 10.
    let h1 = 0b00001_00010_00011;
    let h2 = 0b00111_00010_00011;
    let root = forced_insert(&mut a, NULL, h1, b"left", b"L");
    let root = forced_insert(&mut a, root, h2, b"right", b"R");

    assert_eq!(forced_get(&a, root, h1, b"left"), Some(&b"L"[..]));
    assert_eq!(forced_get(&a, root, h2, b"right"), Some(&b"R"[..]));

    // A third key diverging at the first level still resolves.
    let h3 = 0b11111;
    let root = forced_insert(&mut a, root, h3, b"third", b"T");
    assert_eq!(forced_get(&a, root, h3, b"third"), Some(&b"T"[..]));
    assert_eq!(forced_get(&a, root, h1, b"left"), Some(&b"L"[..]));
}
