//! Workload partitioning across workers.

use ms_core::{Error, Result};

/// Number of workers actually used for `n_items`: at least 1, at most one per item.
pub fn effective_workers(requested: usize, n_items: usize) -> usize {
    requested.clamp(1, n_items.max(1))
}

/// Chunk sizes for `n` items over `k` chunks: the first `n % k` chunks get one extra.
pub fn chunk_sizes(n: usize, k: usize) -> Result<Vec<usize>> {
    if k == 0 {
        return Err(Error::Validation("number of chunks must be positive".to_string()));
    }
    let base = n / k;
    let remainder = n % k;
    Ok((0..k).map(|i| if i < remainder { base + 1 } else { base }).collect())
}

/// Split `items` into `k` contiguous, order-preserving chunks whose sizes differ by at most 1.
///
/// Callers clamp `k` with [`effective_workers`] first; with `k > items.len()` the
/// trailing chunks are empty.
pub fn partition<T>(items: &[T], k: usize) -> Result<Vec<&[T]>> {
    let sizes = chunk_sizes(items.len(), k)?;
    let mut chunks = Vec::with_capacity(k);
    let mut rest = items;
    for size in sizes {
        let (head, tail) = rest.split_at(size);
        chunks.push(head);
        rest = tail;
    }
    Ok(chunks)
}
