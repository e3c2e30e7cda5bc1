//! Chunked lane scheduling arithmetic for generation batches.
//!
//! A batch of N units is cut into consecutive chunks of `concurrency`
//! units. Each chunk becomes one lane: lanes run concurrently with each
//! other, units inside a lane run strictly one after another.
//!
//! Note the consequence: the number of lanes in flight is `ceil(N / C)`,
//! not `C`. A batch of 10 units with concurrency 3 runs as 4 lanes
//! (3 + 3 + 3 + 1). Larger `concurrency` values therefore mean *fewer*
//! parallel provider calls. [`lane_count`] exposes the figure so it can be
//! reported back to callers.

use crate::error::CoreError;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Chunk size used when a request does not specify one.
pub const DEFAULT_CONCURRENCY: usize = 3;

/// Upper bound on the chunk size a request may ask for.
pub const MAX_CONCURRENCY: usize = 20;

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a requested chunk size against `max`.
pub fn validate_concurrency(concurrency: usize, max: usize) -> Result<(), CoreError> {
    if concurrency == 0 || concurrency > max {
        return Err(CoreError::Validation(format!(
            "concurrency must be between 1 and {max}, got {concurrency}"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Chunking
// ---------------------------------------------------------------------------

/// Number of lanes a batch of `units` runs as: `ceil(units / concurrency)`.
///
/// Returns 0 for an empty batch. A zero `concurrency` is treated as 1.
pub fn lane_count(units: usize, concurrency: usize) -> usize {
    units.div_ceil(concurrency.max(1))
}

/// Split `items` into consecutive chunks of at most `concurrency` items,
/// preserving order.
pub fn chunk<T>(items: Vec<T>, concurrency: usize) -> Vec<Vec<T>> {
    let size = concurrency.max(1);
    let mut chunks = Vec::with_capacity(lane_count(items.len(), size));
    let mut iter = items.into_iter().peekable();
    while iter.peek().is_some() {
        chunks.push(iter.by_ref().take(size).collect());
    }
    chunks
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
