use newsdex::postings::{complement, difference, intersect, union, union_all};
use newsdex::NewsId;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::BTreeSet;

const UNIVERSE: u32 = 2_000;

fn random_list(rng: &mut StdRng) -> Vec<NewsId> {
    // mix dense, sparse and empty lists so skips trigger on lopsided pairs
    let density = match rng.gen_range(0..4) {
        0 => 0.0,
        1 => 0.005,
        2 => 0.1,
        _ => 0.8,
    };
    (0..UNIVERSE).filter(|_| rng.gen_bool(density)).collect()
}

fn set(v: &[NewsId]) -> BTreeSet<NewsId> {
    v.iter().copied().collect()
}

fn is_canonical(v: &[NewsId]) -> bool {
    v.windows(2).all(|w| w[0] < w[1])
}

#[test]
fn binary_operators_match_naive_sets() {
    let mut rng = StdRng::seed_from_u64(7);
    for _ in 0..200 {
        let (a, b) = (random_list(&mut rng), random_list(&mut rng));
        let (sa, sb) = (set(&a), set(&b));

        let and = intersect(&a, &b);
        assert!(is_canonical(&and));
        assert_eq!(set(&and), &sa & &sb);
        assert_eq!(and, intersect(&b, &a));

        let or = union(&a, &b);
        assert!(is_canonical(&or));
        assert_eq!(set(&or), &sa | &sb);
        assert_eq!(or, union(&b, &a));

        let minus = difference(&a, &b);
        assert!(is_canonical(&minus));
        assert_eq!(set(&minus), &sa - &sb);
    }
}

#[test]
fn and_or_are_associative() {
    let mut rng = StdRng::seed_from_u64(11);
    for _ in 0..100 {
        let (a, b, c) = (random_list(&mut rng), random_list(&mut rng), random_list(&mut rng));
        assert_eq!(intersect(&intersect(&a, &b), &c), intersect(&a, &intersect(&b, &c)));
        assert_eq!(union(&union(&a, &b), &c), union(&a, &union(&b, &c)));
        assert_eq!(union_all(vec![a.clone(), b.clone(), c.clone()]), union(&a, &union(&b, &c)));
    }
}

#[test]
fn complement_laws() {
    let mut rng = StdRng::seed_from_u64(23);
    let universe: Vec<NewsId> = (0..UNIVERSE).collect();
    for _ in 0..100 {
        let p = random_list(&mut rng);
        let not_p = complement(&p, UNIVERSE as usize);
        assert_eq!(complement(&not_p, UNIVERSE as usize), p);
        assert!(intersect(&p, &not_p).is_empty());
        assert_eq!(union(&p, &not_p), universe);
        assert_eq!(not_p, difference(&universe, &p));
    }
}
