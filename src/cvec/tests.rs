//! Container scenarios: mutation, cache pressure, serialization parity and
//! concurrent readers.

use super::CompressedVec;
use crate::CompressionContext;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

#[test]
fn test_push_pop_roundtrip() {
    let mut v: CompressedVec<u32> = CompressedVec::new();
    assert!(v.is_empty());
    for i in 0..10_000u32 {
        v.push(i * 3);
    }
    assert_eq!(v.len(), 10_000);
    for i in (0..10_000u32).rev() {
        assert_eq!(v.pop(), Some(i * 3));
    }
    assert_eq!(v.pop(), None);
    assert!(v.is_empty());
}

#[test]
fn test_random_access_across_chunks() {
    let mut v: CompressedVec<u64> = CompressedVec::new();
    let n = 5 * v.chunk_elems() + 17;
    for i in 0..n {
        v.push((i as u64) << 7);
    }
    // Touch chunks in a pattern that forces cache churn.
    for &i in &[0usize, n - 1, n / 2, 1, n - 2, n / 3, 0] {
        assert_eq!(*v.get(i), (i as u64) << 7);
    }
    assert!(v.at(n).is_none());
}

#[test]
fn test_get_mut_writes_stick() {
    let mut v: CompressedVec<u32> = CompressedVec::new();
    let n = 3 * v.chunk_elems();
    for _ in 0..n {
        v.push(0);
    }
    for i in (0..n).step_by(97) {
        *v.get_mut(i) = i as u32;
    }
    v.shrink_to_fit();
    for i in 0..n {
        let expected = if i % 97 == 0 { i as u32 } else { 0 };
        assert_eq!(*v.get(i), expected);
    }
}

#[test]
fn test_proxy_take() {
    let mut v: CompressedVec<u16> = CompressedVec::new();
    v.push(41);
    let mut p = v.get_mut(0);
    assert_eq!(p.take(), 41);
    *p.get_mut() = 42;
    drop(p);
    assert_eq!(*v.get(0).get(), 42);
}

#[test]
fn test_for_each_early_stop() {
    let mut v: CompressedVec<u32> = CompressedVec::new();
    for i in 0..1000u32 {
        v.push(i);
    }
    let mut seen = Vec::new();
    let visited = v.for_each(100, 900, |&x| {
        if x == 500 {
            return false;
        }
        seen.push(x);
        true
    });
    assert_eq!(visited, 400);
    assert_eq!(seen.len(), 400);
    assert_eq!(seen[0], 100);
    assert_eq!(*seen.last().unwrap(), 499);
}

#[test]
fn test_insert_remove() {
    let mut v: CompressedVec<u32> = CompressedVec::new();
    for i in 0..600u32 {
        v.push(i);
    }
    v.insert(0, 9999);
    v.insert(300, 8888);
    assert_eq!(v.len(), 602);
    assert_eq!(*v.get(0), 9999);
    assert_eq!(*v.get(300), 8888);
    assert_eq!(*v.get(601), 599);

    assert_eq!(v.remove(300), 8888);
    assert_eq!(v.remove(0), 9999);
    assert_eq!(v.len(), 600);
    for i in 0..600 {
        assert_eq!(*v.get(i), i as u32);
    }
}

#[test]
fn test_resize_bulk_fill() {
    let mut v: CompressedVec<u32> = CompressedVec::new();
    v.push(7);
    // Growth spanning many whole chunks exercises the compress-once path.
    let n = 20 * v.chunk_elems() + 5;
    v.resize(n, 0xDEAD_BEEF);
    assert_eq!(v.len(), n);
    assert_eq!(*v.get(0), 7);
    assert_eq!(*v.get(1), 0xDEAD_BEEF);
    assert_eq!(*v.get(n - 1), 0xDEAD_BEEF);

    v.resize(3, 0);
    assert_eq!(v.len(), 3);
    assert_eq!(*v.get(0), 7);
    assert_eq!(*v.get(2), 0xDEAD_BEEF);
}

#[test]
fn test_raw_cap_respected_after_shrink() {
    let mut v: CompressedVec<u32> = CompressedVec::new();
    v.set_max_raw_chunks(1);
    let n = 8 * v.chunk_elems();
    for i in 0..n {
        v.push(i as u32);
    }
    v.shrink_to_fit();
    // Everything still readable after demotion.
    let mut sum = 0u64;
    v.for_each(0, n, |&x| {
        sum += x as u64;
        true
    });
    assert_eq!(sum, (n as u64 - 1) * n as u64 / 2);
}

#[test]
fn test_serialize_matches_flat_compress() {
    let mut rng = StdRng::seed_from_u64(21);
    let mut v: CompressedVec<u32> = CompressedVec::new();
    let values: Vec<u32> = (0..10_000).map(|_| rng.gen_range(0..5000)).collect();
    for &x in &values {
        v.push(x);
    }
    let frame = v.serialize().unwrap();

    let flat: Vec<u8> = values.iter().flat_map(|x| x.to_le_bytes()).collect();
    let mut ctx = CompressionContext::new();
    ctx.set_level(1);
    ctx.set_block_shift(Some(0)).unwrap();
    let mut expected = vec![0u8; crate::bound(flat.len())];
    let n = ctx.compress(&flat, 4, &mut expected).unwrap();

    assert_eq!(frame, &expected[..n]);
}

#[test]
fn test_serialize_deserialize_roundtrip() {
    let mut rng = StdRng::seed_from_u64(22);
    let mut v: CompressedVec<u64> = CompressedVec::with_options(1, 2);
    let n = 100_000;
    for _ in 0..n {
        v.push(rng.gen());
    }
    let frame = v.serialize().unwrap();

    let mut w: CompressedVec<u64> = CompressedVec::with_options(1, 2);
    w.deserialize(&frame).unwrap();
    assert_eq!(w.len(), n);

    let a = v.to_vec();
    let b = w.to_vec();
    assert_eq!(a, b);
}

#[test]
fn test_deserialize_rejects_wrong_chunk_size() {
    let mut v: CompressedVec<u32> = CompressedVec::with_options(1, 0);
    for i in 0..1000u32 {
        v.push(i);
    }
    let frame = v.serialize().unwrap();

    let mut w: CompressedVec<u32> = CompressedVec::with_options(1, 3);
    assert!(w.deserialize(&frame).is_err());
}

#[test]
fn test_push_shuffle_sort_iterate() {
    let n = 1_000_000u32;
    let mut values: Vec<u32> = (0..n).collect();
    values.shuffle(&mut StdRng::seed_from_u64(5));

    let mut v: CompressedVec<u32> = CompressedVec::with_options(1, 4);
    for &x in &values {
        v.push(x);
    }
    v.sort_unstable();

    let mut expected = 0u32;
    let mut ok = true;
    v.for_each(0, n as usize, |&x| {
        ok &= x == expected;
        expected += 1;
        true
    });
    assert!(ok, "sorted container must equal 0..n");
    assert_eq!(expected, n);
}

#[test]
fn test_serialize_roundtrip_large_random_u64() {
    let mut rng = StdRng::seed_from_u64(6);
    let n = 1_000_000usize;
    let mut v: CompressedVec<u64> = CompressedVec::with_options(1, 4);
    for _ in 0..n {
        v.push(rng.gen());
    }
    let frame = v.serialize().unwrap();

    let mut w: CompressedVec<u64> = CompressedVec::with_options(1, 4);
    w.deserialize(&frame).unwrap();

    let a = v.to_vec();
    let b = w.to_vec();
    assert_eq!(a.len(), n);
    assert_eq!(a, b);
}

#[test]
fn test_concurrent_readers_agree() {
    let mut v: CompressedVec<u32> = CompressedVec::new();
    v.set_max_raw_chunks(2);
    let n = 50 * v.chunk_elems();
    for i in 0..n {
        v.push((i as u32).wrapping_mul(2654435761));
    }

    let mut single = 0u64;
    v.for_each(0, n, |&x| {
        single = single.wrapping_add(x as u64);
        true
    });

    let shared = &v;
    std::thread::scope(|scope| {
        let handles: Vec<_> = (0..4)
            .map(|_| {
                scope.spawn(move || {
                    let mut sum = 0u64;
                    shared.for_each(0, n, |&x| {
                        sum = sum.wrapping_add(x as u64);
                        true
                    });
                    sum
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), single);
        }
    });
}
