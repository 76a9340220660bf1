use std::collections::BTreeMap;

use gridwalk_core::{Aabb, Fixed, FixedVec2};
use gridwalk_spatial::SpatialIndex;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const REGION_CELLS: i32 = 32;

#[test]
fn contents_match_naive_reference_under_random_operations() {
    for seed in [0x5eed_u64, 0xdead_beef, 42, 7_777] {
        run_fuzz(seed, 600);
    }
}

#[test]
fn identical_operation_sequences_build_identical_answers() {
    let first = record_answers(0x1234_5678);
    let second = record_answers(0x1234_5678);
    assert_eq!(first, second, "index answers diverged between replays");
}

fn run_fuzz(seed: u64, operations: usize) {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut index = SpatialIndex::new(region(), 3, Fixed::ONE).expect("valid index");
    let mut reference: BTreeMap<u32, Aabb> = BTreeMap::new();

    for _ in 0..operations {
        let key = rng.gen_range(0..24);
        match rng.gen_range(0..3) {
            0 => {
                let bounds = random_box(&mut rng);
                let result = index.attach(key, bounds);
                if reference.contains_key(&key) {
                    assert!(result.is_err(), "double attach of {key} must fail");
                } else {
                    result.expect("attach inside region");
                    let _ = reference.insert(key, bounds);
                }
            }
            1 => {
                let result = index.detach(key);
                match reference.remove(&key) {
                    Some(bounds) => assert_eq!(result, Ok(bounds)),
                    None => assert!(result.is_err(), "detach of unknown {key} must fail"),
                }
            }
            _ => {
                if !reference.contains_key(&key) {
                    continue;
                }
                let bounds = random_box(&mut rng);
                let token = index.begin_move(key).expect("attached content");
                index.end_move(token, bounds).expect("move inside region");
                let _ = reference.insert(key, bounds);
            }
        }

        let query = random_box(&mut rng);
        assert_eq!(
            index.contents_in(&query),
            naive_in(&reference, &query),
            "rectangle query diverged (seed {seed:#x})"
        );

        let point = random_point(&mut rng);
        assert_eq!(
            index.contents_at(point),
            naive_at(&reference, point),
            "point query diverged (seed {seed:#x})"
        );
        assert_eq!(index.len(), reference.len());
    }
}

fn record_answers(seed: u64) -> Vec<Vec<u32>> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut index = SpatialIndex::new(region(), 2, Fixed::ONE).expect("valid index");
    let mut answers = Vec::new();
    for key in 0..40 {
        let bounds = random_box(&mut rng);
        index.attach(key, bounds).expect("attach");
        answers.push(index.contents_in(&random_box(&mut rng)));
    }
    answers.push(vec![u32::try_from(index.node_count()).expect("fits")]);
    answers
}

fn naive_in(reference: &BTreeMap<u32, Aabb>, query: &Aabb) -> Vec<u32> {
    reference
        .iter()
        .filter(|(_, bounds)| bounds.intersects(query))
        .map(|(key, _)| *key)
        .collect()
}

fn naive_at(reference: &BTreeMap<u32, Aabb>, point: FixedVec2) -> Vec<u32> {
    reference
        .iter()
        .filter(|(_, bounds)| bounds.contains_point(point))
        .map(|(key, _)| *key)
        .collect()
}

fn region() -> Aabb {
    Aabb::from_min_size(
        FixedVec2::ZERO,
        Fixed::from_num(REGION_CELLS),
        Fixed::from_num(REGION_CELLS),
    )
    .expect("non-empty region")
}

fn quarters(value: i32) -> Fixed {
    Fixed::from_num(value) / Fixed::from_num(4)
}

fn random_point(rng: &mut ChaCha8Rng) -> FixedVec2 {
    FixedVec2::new(
        quarters(rng.gen_range(0..REGION_CELLS * 4)),
        quarters(rng.gen_range(0..REGION_CELLS * 4)),
    )
}

fn random_box(rng: &mut ChaCha8Rng) -> Aabb {
    let width = rng.gen_range(1..=16);
    let height = rng.gen_range(1..=16);
    let x = rng.gen_range(0..=(REGION_CELLS * 4 - width));
    let y = rng.gen_range(0..=(REGION_CELLS * 4 - height));
    Aabb::from_min_size(
        FixedVec2::new(quarters(x), quarters(y)),
        quarters(width),
        quarters(height),
    )
    .expect("positive size")
}
