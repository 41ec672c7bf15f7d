use criterion::{criterion_group, criterion_main, BatchSize, Criterion};

use maildex::maildir::enumerate::PendingEntry;
use maildex::maildir::sort;
use maildex::model::Message;

/// Entries in a scrambled but reproducible order, like a directory listing.
fn entries(n: u64) -> Vec<PendingEntry> {
    (0..n)
        .map(|i| {
            let inode = (i * 7919) % n + 1000;
            PendingEntry::new(inode, Message::new(format!("{}", (i * 31) % n)))
        })
        .collect()
}

fn bench_sort_by_inode(c: &mut Criterion) {
    c.bench_function("sort_10k_by_inode", |b| {
        b.iter_batched(
            || entries(10_000),
            |list| sort::sort_by(list, sort::by_inode),
            BatchSize::LargeInput,
        )
    });

    c.bench_function("std_sort_10k_by_inode", |b| {
        b.iter_batched(
            || entries(10_000),
            |mut list| {
                list.sort_by(sort::by_inode);
                list
            },
            BatchSize::LargeInput,
        )
    });
}

fn bench_sort_by_path(c: &mut Criterion) {
    c.bench_function("sort_10k_by_path", |b| {
        b.iter_batched(
            || entries(10_000),
            |list| sort::sort_by(list, sort::by_path),
            BatchSize::LargeInput,
        )
    });
}

criterion_group!(benches, bench_sort_by_inode, bench_sort_by_path);
criterion_main!(benches);
