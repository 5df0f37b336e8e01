//! Row partitioning across devices.

use core::ops::Range;

use crate::device::DeviceId;

/// Contiguous block of query rows assigned to one device.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RowChunk {
    /// Device that searches the chunk.
    pub device: DeviceId,
    /// First query row of the chunk.
    pub start: usize,
    /// Number of query rows in the chunk.
    pub len: usize,
}

impl RowChunk {
    /// Returns the query rows covered by the chunk.
    #[must_use]
    pub fn rows(&self) -> Range<usize> {
        self.start..self.start + self.len
    }
}

/// Splits `rows` across `devices` devices.
///
/// Every device receives `rows / devices` rows; the last one also takes the
/// remainder. Chunk `i` starts at `i * (rows / devices)` and is assigned to
/// device `i`. Returns no chunks when `devices == 0`.
///
/// # Examples
/// ```
/// use reachgraph_core::partition_rows;
///
/// let chunks = partition_rows(10, 3);
/// let sizes: Vec<_> = chunks.iter().map(|chunk| chunk.len).collect();
/// assert_eq!(sizes, vec![3, 3, 4]);
/// assert_eq!(chunks[2].start, 6);
/// ```
#[must_use]
pub fn partition_rows(rows: usize, devices: usize) -> Vec<RowChunk> {
    let ordinals: Vec<DeviceId> = (0..devices).map(DeviceId::new).collect();
    partition_rows_across(rows, &ordinals)
}

/// Splits `rows` across the listed devices, in list order.
///
/// Chunk sizes follow [`partition_rows`]; chunk `i` is assigned to
/// `devices[i]`.
///
/// # Examples
/// ```
/// use reachgraph_core::{DeviceId, partition_rows_across};
///
/// let chunks = partition_rows_across(7, &[DeviceId::new(0), DeviceId::new(3)]);
/// assert_eq!(chunks[1].device, DeviceId::new(3));
/// assert_eq!((chunks[1].start, chunks[1].len), (3, 4));
/// ```
#[must_use]
pub fn partition_rows_across(rows: usize, devices: &[DeviceId]) -> Vec<RowChunk> {
    let count = devices.len();
    if count == 0 {
        return Vec::new();
    }
    let base = rows / count;
    let remainder = rows % count;
    devices
        .iter()
        .enumerate()
        .map(|(position, &device)| RowChunk {
            device,
            start: position * base,
            len: if position + 1 == count {
                base + remainder
            } else {
                base
            },
        })
        .collect()
}
