//! Ordering of pending entries.
//!
//! A hybrid sort: runs of up to [`INS_SORT_THRESHOLD`] elements are
//! insertion-sorted in place, longer runs are split at the midpoint, sorted
//! recursively and merged. Both paths are stable, so equal keys keep their
//! discovery order.

use std::cmp::Ordering;

use super::enumerate::PendingEntry;

/// Longest run handled by insertion sort.
pub const INS_SORT_THRESHOLD: usize = 6;

/// Sort `items` with the hybrid insertion/merge sort.
pub fn sort_by<T, F>(items: Vec<T>, mut cmp: F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    sort_with_threshold(items, INS_SORT_THRESHOLD, &mut cmp)
}

/// Same as [`sort_by`] with an explicit insertion-sort threshold.
/// A threshold of 1 gives a plain merge sort.
pub fn sort_with_threshold<T, F>(mut items: Vec<T>, threshold: usize, cmp: &mut F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    if items.len() <= threshold.max(1) {
        insertion_sort(&mut items, cmp);
        return items;
    }

    let right = items.split_off(items.len() / 2);
    let left = sort_with_threshold(items, threshold, cmp);
    let right = sort_with_threshold(right, threshold, cmp);
    merge(left, right, cmp)
}

fn insertion_sort<T, F>(items: &mut [T], cmp: &mut F)
where
    F: FnMut(&T, &T) -> Ordering,
{
    for i in 1..items.len() {
        let mut j = i;
        while j > 0 && cmp(&items[j - 1], &items[j]) == Ordering::Greater {
            items.swap(j - 1, j);
            j -= 1;
        }
    }
}

/// Merge two sorted runs. Ties go to the left run.
fn merge<T, F>(left: Vec<T>, right: Vec<T>, cmp: &mut F) -> Vec<T>
where
    F: FnMut(&T, &T) -> Ordering,
{
    let mut out = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    loop {
        let take_left = match (left.peek(), right.peek()) {
            (Some(l), Some(r)) => cmp(l, r) != Ordering::Greater,
            (Some(_), None) => true,
            (None, Some(_)) => false,
            (None, None) => break,
        };
        let next = if take_left { left.next() } else { right.next() };
        out.extend(next);
    }
    out
}

/// Ascending inode: the order that reads the files with the least seeking.
pub fn by_inode(a: &PendingEntry, b: &PendingEntry) -> Ordering {
    a.inode.cmp(&b.inode)
}

/// Byte-wise path order. Tombstones sort first.
pub fn by_path(a: &PendingEntry, b: &PendingEntry) -> Ordering {
    a.path().cmp(&b.path())
}
