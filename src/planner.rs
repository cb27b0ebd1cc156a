//! Depth-axis partitioning - splits a volume into slice bunches to bound memory

use crate::error::{Result, VolConvError};
use serde::{Deserialize, Serialize};

/// Default number of bunches a volume is split into
pub const DEFAULT_DIVISOR: usize = 64;

/// Ordered bunch sizes tiling `[0, depth)`.
///
/// `divisor` bunches of `depth / divisor` slices (when that is nonzero),
/// followed by one bunch of `depth % divisor` slices (when that is nonzero).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FracList {
    sizes: Vec<usize>,
}

impl FracList {
    /// Bunch sizes in streaming order
    pub fn sizes(&self) -> &[usize] {
        &self.sizes
    }

    /// Number of bunches
    pub fn len(&self) -> usize {
        self.sizes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sizes.is_empty()
    }

    /// Total number of slices covered
    pub fn total(&self) -> usize {
        self.sizes.iter().sum()
    }

    /// Largest bunch, which sets the peak read buffer size
    pub fn max_bunch(&self) -> usize {
        self.sizes.iter().copied().max().unwrap_or(0)
    }

    /// Iterate `(bunch_index, start_slice, slice_count)`
    pub fn ranges(&self) -> impl Iterator<Item = BunchRange> + '_ {
        self.sizes
            .iter()
            .scan(0usize, |start, &count| {
                let range = (*start, count);
                *start += count;
                Some(range)
            })
            .enumerate()
            .map(|(index, (start, count))| BunchRange {
                index,
                start,
                count,
            })
    }
}

/// Position of one bunch along the depth axis
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BunchRange {
    pub index: usize,
    pub start: usize,
    pub count: usize,
}

impl BunchRange {
    /// One past the last slice of this bunch
    pub fn end(&self) -> usize {
        self.start + self.count
    }
}

/// Partition `depth` slices into at most `divisor + 1` bunches.
///
/// When `divisor > depth` the quotient is zero and the whole depth lands in the
/// single remainder bunch.
pub fn plan_bunches(depth: usize, divisor: usize) -> Result<FracList> {
    if divisor == 0 {
        return Err(VolConvError::InvalidConfiguration(
            "divisor must be at least 1".to_string(),
        ));
    }

    let (per_bunch, extra) = (depth / divisor, depth % divisor);
    let mut sizes = if per_bunch > 0 {
        vec![per_bunch; divisor]
    } else {
        Vec::new()
    };
    if extra > 0 {
        sizes.push(extra);
    }

    Ok(FracList { sizes })
}
