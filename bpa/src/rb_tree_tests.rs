#![cfg(test)]
use crate::rb_tree::{InsertError, RbTree};
use kestrel_bpv6::acs::CidRange;

fn range(first: u64, count: u64) -> CidRange {
    CidRange { first, count }
}

fn ranges(tree: &RbTree) -> Vec<CidRange> {
    tree.iter().collect()
}

/// A small multiplicative congruential generator, so the stress tests are
/// deterministic without pulling in a rand dependency.
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, bound: u64) -> u64 {
        self.0 = self
            .0
            .wrapping_mul(6364136223846793005)
            .wrapping_add(1442695040888963407);
        (self.0 >> 33) % bound
    }
}

#[test]
fn new_tree_is_empty() {
    let tree = RbTree::new(10);
    assert!(tree.is_empty());
    assert!(!tree.is_full());
    assert_eq!(tree.size(), 0);
    assert_eq!(tree.capacity(), 10);
    assert_eq!(ranges(&tree), []);
    tree.assert_valid();
}

#[test]
fn zero_capacity_tree_rejects_everything() {
    let mut tree = RbTree::new(0);
    assert!(tree.is_full());
    assert_eq!(tree.insert(0), Err(InsertError::TreeFull));
}

#[test]
fn full_tree_still_merges() {
    let mut tree = RbTree::new(2);
    tree.insert(0).unwrap();
    tree.insert(10).unwrap();
    assert!(tree.is_full());

    // A disjoint value needs a node and fails.
    assert_eq!(tree.insert(5), Err(InsertError::TreeFull));
    // Adjacent values extend in place.
    tree.insert(1).unwrap();
    tree.insert(9).unwrap();
    assert_eq!(ranges(&tree), [range(0, 2), range(9, 2)]);
    tree.assert_valid();
}

#[test]
fn insert_builds_subtrees() {
    let mut tree = RbTree::new(10);
    for value in [10, 5, 15, 0, 7, 12, 20] {
        tree.insert(value).unwrap();
        tree.assert_valid();
    }
    assert_eq!(
        ranges(&tree),
        [
            range(0, 1),
            range(5, 1),
            range(7, 1),
            range(10, 1),
            range(12, 1),
            range(15, 1),
            range(20, 1)
        ]
    );
}

#[test]
fn merge_lower_neighbour() {
    let mut tree = RbTree::new(10);
    tree.insert(5).unwrap();
    tree.insert(4).unwrap();
    assert_eq!(ranges(&tree), [range(4, 2)]);
    assert_eq!(tree.size(), 1);
}

#[test]
fn merge_upper_neighbour() {
    let mut tree = RbTree::new(10);
    tree.insert(5).unwrap();
    tree.insert(6).unwrap();
    assert_eq!(ranges(&tree), [range(5, 2)]);
    assert_eq!(tree.size(), 1);
}

#[test]
fn bridge_merges_predecessor_node() {
    // {0..=2} and {4..=5}: inserting 3 must collapse both into one node.
    let mut tree = RbTree::new(10);
    for value in [0, 1, 2, 4, 5] {
        tree.insert(value).unwrap();
    }
    assert_eq!(tree.size(), 2);
    tree.insert(3).unwrap();
    assert_eq!(ranges(&tree), [range(0, 6)]);
    assert_eq!(tree.size(), 1);
    tree.assert_valid();
}

#[test]
fn bridge_merges_successor_node() {
    let mut tree = RbTree::new(10);
    for value in [4, 5, 0, 1] {
        tree.insert(value).unwrap();
    }
    tree.insert(2).unwrap();
    tree.insert(3).unwrap();
    assert_eq!(ranges(&tree), [range(0, 6)]);
    tree.assert_valid();
}

#[test]
fn permutations_coalesce_to_single_node() {
    const N: u64 = 64;
    let ascending: Vec<u64> = (0..N).collect();
    let descending: Vec<u64> = (0..N).rev().collect();
    let evens_then_odds: Vec<u64> = (0..N)
        .step_by(2)
        .chain((0..N).skip(1).step_by(2))
        .collect();
    let mut shuffled: Vec<u64> = (0..N).collect();
    let mut lcg = Lcg(0xDEC0DE);
    for i in (1..shuffled.len()).rev() {
        shuffled.swap(i, lcg.next(i as u64 + 1) as usize);
    }

    for order in [ascending, descending, evens_then_odds, shuffled] {
        let mut tree = RbTree::new(N as usize);
        for value in order {
            tree.insert(value).unwrap();
            tree.assert_valid();
        }
        assert_eq!(ranges(&tree), [range(0, N)]);
        assert_eq!(tree.size(), 1);
    }
}

#[test]
fn duplicates_rejected() {
    let mut tree = RbTree::new(10);
    for value in [5, 6, 7, 20] {
        tree.insert(value).unwrap();
    }
    // Exact node start, interior of a run, and its last value.
    assert_eq!(tree.insert(5), Err(InsertError::Duplicate));
    assert_eq!(tree.insert(6), Err(InsertError::Duplicate));
    assert_eq!(tree.insert(7), Err(InsertError::Duplicate));
    assert_eq!(tree.insert(20), Err(InsertError::Duplicate));
    assert_eq!(ranges(&tree), [range(5, 3), range(20, 1)]);
}

#[test]
fn pop_first_drains_in_order() {
    let mut tree = RbTree::new(10);
    for value in [10, 11, 1, 2, 3, 7, 8, 30] {
        tree.insert(value).unwrap();
    }
    let mut drained = Vec::new();
    while let Some(range) = tree.pop_first() {
        drained.push(range);
        tree.assert_valid();
    }
    assert_eq!(
        drained,
        [range(1, 3), range(7, 2), range(10, 2), range(30, 1)]
    );
    assert!(tree.is_empty());
    assert_eq!(tree.pop_first(), None);
}

#[test]
fn clear_returns_all_nodes() {
    let mut tree = RbTree::new(4);
    for value in [0, 10, 20, 30] {
        tree.insert(value).unwrap();
    }
    assert!(tree.is_full());
    tree.clear();
    assert!(tree.is_empty());
    for value in [5, 15, 25, 35] {
        tree.insert(value).unwrap();
    }
    assert!(tree.is_full());
    tree.assert_valid();
}

#[test]
fn random_stress_against_model() {
    const CAPACITY: usize = 64;
    const UNIVERSE: u64 = 256;

    let mut lcg = Lcg(0xACE5);
    let mut tree = RbTree::new(CAPACITY);
    let mut model = std::collections::BTreeSet::new();

    for round in 0..2000 {
        let value = lcg.next(UNIVERSE);
        match tree.insert(value) {
            Ok(()) => {
                assert!(model.insert(value), "round {round}: model had {value}");
            }
            Err(InsertError::Duplicate) => {
                assert!(model.contains(&value), "round {round}: spurious duplicate");
            }
            Err(InsertError::TreeFull) => {
                assert!(!model.contains(&value));
                // Drain a little and move on, as the custody engine does.
                for _ in 0..8 {
                    if let Some(popped) = tree.pop_first() {
                        for v in popped.first..popped.first + popped.count {
                            model.remove(&v);
                        }
                    }
                }
            }
        }
        tree.assert_valid();
        if round % 97 == 0 {
            assert_eq!(ranges(&tree), model_ranges(&model));
        }
    }
    assert_eq!(ranges(&tree), model_ranges(&model));
}

fn model_ranges(model: &std::collections::BTreeSet<u64>) -> Vec<CidRange> {
    let mut out: Vec<CidRange> = Vec::new();
    for &value in model {
        match out.last_mut() {
            Some(last) if last.first + last.count == value => last.count += 1,
            _ => out.push(range(value, 1)),
        }
    }
    out
}
