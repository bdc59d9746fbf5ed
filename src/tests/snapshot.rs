use crate::{Arena, MapHandle, Queue, SetHandle, VectorHandle, VectorKind};

/// A reader attached to `(bytes, heap_end, free_head, root)` recovers the
/// same value for every key the producer wrote.
#[test]
fn attached_reader_sees_every_key() {
    let mut producer = Arena::new();
    let mut map = MapHandle::new();
    for i in 0..200u32 {
        map = map
            .set(
                &mut producer,
                format!("shared-{i}").as_bytes(),
                format!("payload-{i}").as_bytes(),
            )
            .unwrap();
    }

    // Out-of-band handoff: buffer copy, allocator state, snapshot record.
    let bytes = producer.as_bytes().to_vec();
    let state = producer.state();
    let record = map.snapshot();

    let reader = Arena::attach(bytes, state);
    let view = record.into_handle();

    assert_eq!(view.len(), 200);
    for i in 0..200u32 {
        assert_eq!(
            view.get(&reader, format!("shared-{i}").as_bytes()),
            Some(format!("payload-{i}").as_bytes()),
            "key {i} must survive the handoff"
        );
    }
    assert_eq!(view.get(&reader, b"never-inserted"), None);
}

/// An attached reader that becomes a writer allocates without colliding
/// with the producer's nodes.
#[test]
fn attached_writer_extends_without_corruption() {
    let mut producer = Arena::new();
    let map = MapHandle::new().set(&mut producer, b"original", b"o").unwrap();

    let mut reader = Arena::attach(producer.as_bytes().to_vec(), producer.state());
    let view = map.snapshot().into_handle();

    let extended = view.set(&mut reader, b"added", b"a").unwrap();
    assert_eq!(extended.get(&reader, b"original"), Some(&b"o"[..]));
    assert_eq!(extended.get(&reader, b"added"), Some(&b"a"[..]));

    // The producer's arena never saw the reader's write.
    assert_eq!(map.get(&producer, b"original"), Some(&b"o"[..]));
    assert!(!map.has(&producer, b"added"));
}

#[test]
fn vector_snapshot_round_trips() {
    let mut producer = Arena::new();
    let mut vec = VectorHandle::new();
    for i in 0..300u32 {
        vec = vec.push(&mut producer, f64::from(i) * 0.5).unwrap();
    }

    let reader = Arena::attach(producer.as_bytes().to_vec(), producer.state());
    let view = vec.snapshot().into_handle();

    assert_eq!(view.len(), 300);
    assert_eq!(view.depth(), vec.depth());
    for i in 0..300u32 {
        assert_eq!(view.get(&reader, i), Some(f64::from(i) * 0.5));
    }
}

#[test]
fn packed_vector_snapshot_round_trips() {
    let mut producer = Arena::new();
    let vec = VectorHandle::with_kind(VectorKind::Packed)
        .push_bytes(&mut producer, b"over the wire")
        .unwrap();

    let reader = Arena::attach(producer.as_bytes().to_vec(), producer.state());
    let view = vec.snapshot().into_handle();
    assert_eq!(view.get_bytes(&reader, 0), Some(&b"over the wire"[..]));
}

/// Queue handoff carries the head index alongside the vector triple.
#[test]
fn queue_snapshot_keeps_head() {
    let mut producer = Arena::new();
    let mut q = Queue::new();
    for i in 1..=6u32 {
        q = q.enqueue(&mut producer, f64::from(i)).unwrap();
    }
    let (q, _) = q.dequeue(&mut producer).unwrap();
    let (q, _) = q.dequeue(&mut producer).unwrap();

    let reader = Arena::attach(producer.as_bytes().to_vec(), producer.state());
    let view = q.snapshot().into_handle();

    assert_eq!(view.len(), 4);
    assert_eq!(view.peek(&reader), Some(3.0));
}

#[test]
fn set_snapshot_round_trips() {
    let mut producer = Arena::new();
    let mut set = SetHandle::new();
    for item in [&b"alpha"[..], b"beta", b"gamma"] {
        set = set.insert(&mut producer, item).unwrap();
    }

    let reader = Arena::attach(producer.as_bytes().to_vec(), producer.state());
    let view = SetHandle::from_map(set.snapshot().into_handle());

    assert!(view.contains(&reader, b"alpha"));
    assert!(view.contains(&reader, b"gamma"));
    assert!(!view.contains(&reader, b"delta"));
}
