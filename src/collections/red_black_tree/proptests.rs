use super::*;

use proptest::prelude::*;
use std::collections::BTreeMap;

/// Aligned storage for a tree with `capacity` `u64` values.
fn buffer(capacity: usize) -> Vec<u128> {
    vec![0u128; RedBlackTreeMut::<u64>::data_len(capacity).div_ceil(16)]
}

fn for_each_permutation<T: Clone>(items: &[T], mut f: impl FnMut(Vec<T>)) {
    fn rec<T: Clone>(items: &[T], used: &mut [bool], out: &mut Vec<T>, f: &mut impl FnMut(Vec<T>)) {
        if out.len() == items.len() {
            f(out.clone());
            return;
        }
        for i in 0..items.len() {
            if used[i] {
                continue;
            }
            used[i] = true;
            out.push(items[i].clone());
            rec(items, used, out, f);
            out.pop();
            used[i] = false;
        }
    }

    let mut used = vec![false; items.len()];
    let mut out = Vec::with_capacity(items.len());
    rec(items, &mut used, &mut out, &mut f);
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 256,
        .. ProptestConfig::default()
    })]

    #[test]
    fn prop_equivalence_with_btree_map(
        entries in prop::collection::vec((any::<u128>(), any::<u64>()), 0..=512)
    ) {
        let mut data = buffer(entries.len());
        let mut t = RedBlackTreeMut::<u64>::empty(bytemuck::cast_slice_mut(&mut data));
        let mut m: BTreeMap<u128, u64> = BTreeMap::new();

        for (k, v) in entries {
            let expected = if m.contains_key(&k) {
                Err(RedBlackTreeError::DuplicateKey)
            } else {
                m.insert(k, v);
                Ok(m.len() as u32)
            };
            prop_assert_eq!(t.insert(k, v), expected);
        }

        t.verify();
        prop_assert_eq!(t.len(), m.len());

        let got: Vec<(u128, u64)> = t.iter().map(|(k, v)| (k, *v)).collect();
        let expected: Vec<(u128, u64)> = m.iter().map(|(k, v)| (*k, *v)).collect();
        prop_assert_eq!(got, expected);
    }

    #[test]
    fn prop_small_key_space(
        keys in prop::collection::vec(0u128..64, 0..=256),
        probes in prop::collection::vec(0u128..128, 0..=32)
    ) {
        let mut data = buffer(64);
        let mut t = RedBlackTreeMut::<u64>::empty(bytemuck::cast_slice_mut(&mut data));
        let mut m: BTreeMap<u128, u32> = BTreeMap::new();

        for k in keys {
            let root = t.root();
            let leftmost = t.leftmost();
            let len = t.len();

            match t.insert(k, k as u64) {
                Ok(index) => {
                    prop_assert!(m.insert(k, index).is_none());
                    prop_assert_eq!(t.len(), len + 1);
                }
                Err(error) => {
                    // a full tree reports InsertFull before looking for the key
                    let expected = if len == t.capacity() {
                        RedBlackTreeError::InsertFull
                    } else {
                        RedBlackTreeError::DuplicateKey
                    };
                    prop_assert_eq!(error, expected);
                    prop_assert!(m.contains_key(&k));
                    prop_assert_eq!(t.root(), root);
                    prop_assert_eq!(t.leftmost(), leftmost);
                    prop_assert_eq!(t.len(), len);
                }
            }

            let lowest = m.keys().next().copied();
            prop_assert_eq!(t.lowest().map(|(k, _)| k), lowest);
            prop_assert_eq!(t.key_at(t.leftmost()), lowest);
        }

        t.verify();

        for k in probes {
            prop_assert_eq!(t.find(k), m.get(&k).copied());
        }
    }

    #[test]
    fn prop_height_bound(count in 1usize..=2048, seed in any::<u64>()) {
        use rand::rngs::StdRng;
        use rand::seq::SliceRandom;
        use rand::SeedableRng;

        let mut keys: Vec<u128> = (0..count as u128).collect();
        keys.shuffle(&mut StdRng::seed_from_u64(seed));

        let mut data = buffer(count);
        let mut t = RedBlackTreeMut::<u64>::empty(bytemuck::cast_slice_mut(&mut data));

        for k in keys {
            t.insert(k, 0).unwrap();
        }

        t.verify();
        prop_assert!(t.is_full());
        prop_assert!(t.height() as f64 <= 2.0 * ((count + 1) as f64).log2());
    }

    #[test]
    fn prop_full_tree_rejects_insert(count in 0usize..=64, key in any::<u128>()) {
        let mut data = buffer(count);
        let mut t = RedBlackTreeMut::<u64>::empty(bytemuck::cast_slice_mut(&mut data));

        for k in 0..count as u128 {
            t.insert(k.wrapping_mul(0x9e37_79b9_7f4a_7c15), 0).unwrap();
        }

        let snapshot = bytemuck::cast_slice::<_, u8>(&data).to_vec();

        let mut t = RedBlackTreeMut::<u64>::from_bytes_mut(bytemuck::cast_slice_mut(&mut data));
        prop_assert_eq!(t.insert(key, 1), Err(RedBlackTreeError::InsertFull));
        drop(t);

        prop_assert_eq!(bytemuck::cast_slice::<_, u8>(&data), &snapshot[..]);
    }
}

#[test]
fn exhaustive_insert_order_small_set() {
    let keys: Vec<u128> = vec![10, 20, 30, 40, 50, 60];

    for_each_permutation(&keys, |perm| {
        let mut data = buffer(keys.len());
        let mut t = RedBlackTreeMut::<u64>::empty(bytemuck::cast_slice_mut(&mut data));

        for (i, k) in perm.into_iter().enumerate() {
            assert_eq!(t.insert(k, i as u64), Ok(i as u32 + 1));
            t.verify();
        }

        let got: Vec<u128> = t.iter().map(|(k, _)| k).collect();
        assert_eq!(got, keys);
        assert_eq!(t.lowest().map(|(k, _)| k), Some(10));
    });
}
