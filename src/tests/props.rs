//! Model-based property tests against the standard collections.

use std::collections::HashMap;

use proptest::prelude::*;

use crate::{Arena, MapHandle, VectorHandle};

#[derive(Debug, Clone)]
enum MapAction {
    Insert(u8, u8),
    Remove(u8),
}

fn map_action() -> impl Strategy<Value = MapAction> {
    prop_oneof![
        (0u8..40, any::<u8>()).prop_map(|(k, v)| MapAction::Insert(k, v)),
        (0u8..40).prop_map(MapAction::Remove),
    ]
}

/// A small key space forces overwrites, deletes of present keys and
/// deep structural churn.
fn key_bytes(k: u8) -> Vec<u8> {
    format!("key-{k}").into_bytes()
}

proptest! {
    /// Any action sequence leaves the newest version agreeing with a
    /// `HashMap` model, with superseded versions released along the way.
    #[test]
    fn map_matches_std_model(actions in prop::collection::vec(map_action(), 1..300)) {
        let mut arena = Arena::new();
        let mut model: HashMap<Vec<u8>, Vec<u8>> = HashMap::new();
        let mut cur = MapHandle::new();

        // Writes always return a handle owning its own reference, so the
        // superseded version is released unconditionally.
        for action in actions {
            match action {
                MapAction::Insert(k, v) => {
                    let key = key_bytes(k);
                    let val = vec![v; usize::from(v % 7) + 1];
                    let next = cur.set(&mut arena, &key, &val).unwrap();
                    cur.release(&mut arena);
                    cur = next;
                    model.insert(key, val);
                }
                MapAction::Remove(k) => {
                    let key = key_bytes(k);
                    let next = cur.delete(&mut arena, &key).unwrap();
                    cur.release(&mut arena);
                    cur = next;
                    model.remove(&key);
                }
            }
            prop_assert_eq!(cur.len() as usize, model.len());
        }

        for (k, v) in &model {
            prop_assert_eq!(cur.get(&arena, k), Some(v.as_slice()));
        }
        for k in 0..40u8 {
            let key = key_bytes(k);
            if !model.contains_key(&key) {
                prop_assert!(!cur.has(&arena, &key));
            }
        }
    }
}

#[derive(Debug, Clone)]
enum VecAction {
    Push(i32),
    Pop,
    Set(u16, i32),
}

fn vec_action() -> impl Strategy<Value = VecAction> {
    prop_oneof![
        any::<i32>().prop_map(VecAction::Push),
        Just(VecAction::Pop),
        (any::<u16>(), any::<i32>()).prop_map(|(i, x)| VecAction::Set(i, x)),
    ]
}

proptest! {
    /// Push/pop/set sequences agree with a `Vec<f64>` model.
    #[test]
    fn vector_matches_std_model(actions in prop::collection::vec(vec_action(), 1..250)) {
        let mut arena = Arena::new();
        let mut model: Vec<f64> = Vec::new();
        let mut cur = VectorHandle::new();

        for action in actions {
            match action {
                VecAction::Push(x) => {
                    let next = cur.push(&mut arena, f64::from(x)).unwrap();
                    cur.release(&mut arena);
                    cur = next;
                    model.push(f64::from(x));
                }
                VecAction::Pop => {
                    match cur.pop(&mut arena) {
                        Some(next) => {
                            cur.release(&mut arena);
                            cur = next;
                            model.pop();
                        }
                        None => prop_assert!(model.is_empty()),
                    }
                }
                VecAction::Set(i, x) => {
                    if !model.is_empty() {
                        let idx = u32::from(i) % cur.len();
                        let next = cur.set(&mut arena, idx, f64::from(x)).unwrap();
                        cur.release(&mut arena);
                        cur = next;
                        model[idx as usize] = f64::from(x);
                    }
                }
            }
            prop_assert_eq!(cur.len() as usize, model.len());
        }

        for (i, expect) in model.iter().enumerate() {
            prop_assert_eq!(cur.get(&arena, i as u32), Some(*expect));
        }
    }
}
