use crate::{Arena, SetHandle};

#[test]
fn insert_contains_remove() {
    let mut a = Arena::new();
    let s1 = SetHandle::new().insert(&mut a, b"member").unwrap();

    assert!(s1.contains(&a, b"member"));
    assert!(!s1.contains(&a, b"other"));
    assert_eq!(s1.len(), 1);

    let s2 = s1.remove(&mut a, b"member").unwrap();
    assert!(!s2.contains(&a, b"member"));
    assert!(s1.contains(&a, b"member"));
}

#[test]
fn duplicate_insert_keeps_size() {
    let mut a = Arena::new();
    let set = SetHandle::new()
        .insert(&mut a, b"x")
        .unwrap()
        .insert(&mut a, b"x")
        .unwrap();
    assert_eq!(set.len(), 1);
}

#[test]
fn remove_absent_is_identity() {
    let mut a = Arena::new();
    let s1 = SetHandle::new().insert(&mut a, b"a").unwrap();
    let s2 = s1.remove(&mut a, b"zzz").unwrap();
    assert_eq!(s2.as_map().root(), s1.as_map().root());
    assert_eq!(s2.len(), 1);

    // The alias owns its own reference; releasing both is sound.
    s1.release(&mut a);
    assert!(s2.contains(&a, b"a"));
    s2.release(&mut a);
}

#[test]
fn versions_are_independent() {
    let mut a = Arena::new();
    let base = SetHandle::new().insert(&mut a, b"shared").unwrap();
    let left = base.insert(&mut a, b"left").unwrap();
    let right = base.insert(&mut a, b"right").unwrap();

    assert!(left.contains(&a, b"shared") && left.contains(&a, b"left"));
    assert!(!left.contains(&a, b"right"));
    assert!(right.contains(&a, b"shared") && right.contains(&a, b"right"));
    assert!(!right.contains(&a, b"left"));
}

#[test]
fn many_members() {
    let mut a = Arena::new();
    let mut set = SetHandle::new();
    for i in 0..256u32 {
        let next = set.insert(&mut a, format!("m{i}").as_bytes()).unwrap();
        set.release(&mut a);
        set = next;
    }
    assert_eq!(set.len(), 256);
    for i in 0..256u32 {
        assert!(set.contains(&a, format!("m{i}").as_bytes()));
    }
}
