//! Set algebra over sorted, duplicate-free news id lists.
//!
//! All operators are linear merges (intersection may skip ahead sub-linearly); none of
//! them materializes the universe to filter it.

use std::cmp::Ordering;

use crate::index::{NewsId, ResultSet};

/// Skip distance for a list of `len` ids: ⌊√len⌋, at least 1.
pub fn skip_distance(len: usize) -> usize {
    ((len as f64).sqrt() as usize).max(1)
}

/// Intersection with skip pointers. Each side jumps ⌊√n⌋ ids at a time while the
/// jump target is still below the other side's current id.
pub fn intersect(p1: &[NewsId], p2: &[NewsId]) -> ResultSet {
    let (skip1, skip2) = (skip_distance(p1.len()), skip_distance(p2.len()));
    let mut out = Vec::with_capacity(p1.len().min(p2.len()));
    let (mut i, mut j) = (0, 0);
    while i < p1.len() && j < p2.len() {
        match p1[i].cmp(&p2[j]) {
            Ordering::Equal => {
                out.push(p1[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => i = advance(p1, i, skip1, p2[j]),
            Ordering::Greater => j = advance(p2, j, skip2, p1[i]),
        }
    }
    out
}

fn advance(list: &[NewsId], mut at: usize, skip: usize, target: NewsId) -> usize {
    if skip > 1 && at + skip < list.len() && list[at + skip] < target {
        while at + skip < list.len() && list[at + skip] < target {
            at += skip;
        }
        at
    } else {
        at + 1
    }
}

pub fn union(p1: &[NewsId], p2: &[NewsId]) -> ResultSet {
    let mut out = Vec::with_capacity(p1.len() + p2.len());
    let (mut i, mut j) = (0, 0);
    while i < p1.len() && j < p2.len() {
        match p1[i].cmp(&p2[j]) {
            Ordering::Equal => {
                out.push(p1[i]);
                i += 1;
                j += 1;
            }
            Ordering::Less => {
                out.push(p1[i]);
                i += 1;
            }
            Ordering::Greater => {
                out.push(p2[j]);
                j += 1;
            }
        }
    }
    out.extend_from_slice(&p1[i..]);
    out.extend_from_slice(&p2[j..]);
    out
}

/// Ids of `p1` absent from `p2`.
pub fn difference(p1: &[NewsId], p2: &[NewsId]) -> ResultSet {
    let mut out = Vec::with_capacity(p1.len());
    let mut j = 0;
    for &id in p1 {
        while j < p2.len() && p2[j] < id {
            j += 1;
        }
        if j >= p2.len() || p2[j] != id {
            out.push(id);
        }
    }
    out
}

/// Every id in `0..universe` that is not in `p`, in one merge pass.
pub fn complement(p: &[NewsId], universe: usize) -> ResultSet {
    let mut out = Vec::with_capacity(universe.saturating_sub(p.len()));
    let mut j = 0;
    for id in 0..universe as NewsId {
        if j < p.len() && p[j] == id {
            j += 1;
        } else {
            out.push(id);
        }
    }
    out
}

/// Union of many lists, merged pairwise smallest-first.
pub fn union_all<I>(lists: I) -> ResultSet
where
    I: IntoIterator<Item = ResultSet>,
{
    let mut lists: Vec<ResultSet> = lists.into_iter().collect();
    lists.sort_by_key(|l| std::cmp::Reverse(l.len()));
    while lists.len() > 1 {
        let a = lists.pop().unwrap_or_default();
        let b = lists.pop().unwrap_or_default();
        let merged = union(&a, &b);
        let at = lists.partition_point(|l| l.len() > merged.len());
        lists.insert(at, merged);
    }
    lists.pop().unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intersect_with_long_skips() {
        let long: Vec<NewsId> = (0..1000).collect();
        assert_eq!(intersect(&long, &[3, 500, 998, 2000]), vec![3, 500, 998]);
        assert_eq!(intersect(&[3, 500, 998, 2000], &long), vec![3, 500, 998]);
        assert!(intersect(&long, &[]).is_empty());
    }

    #[test]
    fn intersect_lands_on_skip_targets() {
        let a: Vec<NewsId> = (0..100).map(|x| x * 2).collect();
        // 20 sits exactly on a skip boundary of `a` (skip = 10)
        assert_eq!(intersect(&a, &[20, 21, 198]), vec![20, 198]);
    }

    #[test]
    fn union_dedups_and_drains() {
        assert_eq!(union(&[1, 3, 5], &[2, 3, 9, 10]), vec![1, 2, 3, 5, 9, 10]);
        assert_eq!(union(&[], &[4]), vec![4]);
    }

    #[test]
    fn difference_and_complement() {
        assert_eq!(difference(&[1, 2, 3, 7], &[2, 7, 8]), vec![1, 3]);
        assert_eq!(complement(&[0, 2, 4], 6), vec![1, 3, 5]);
        assert_eq!(complement(&[], 3), vec![0, 1, 2]);
        assert!(complement(&[0, 1, 2], 3).is_empty());
    }

    #[test]
    fn union_all_of_several() {
        let r = union_all(vec![vec![5, 9], vec![], vec![1, 5], vec![2]]);
        assert_eq!(r, vec![1, 2, 5, 9]);
        assert!(union_all(Vec::<ResultSet>::new()).is_empty());
    }

    #[test]
    fn skip_distance_is_floor_sqrt() {
        assert_eq!(skip_distance(0), 1);
        assert_eq!(skip_distance(15), 3);
        assert_eq!(skip_distance(16), 4);
    }
}
