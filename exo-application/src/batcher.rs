//! Point batching
//!
//! Addresses are grouped by device, in first-seen order and without
//! duplicates, then split into chunks. Each chunk becomes one correlated
//! request. A trailing chunk smaller than the configured minimum is merged
//! into the chunk before it.

use exo_core::PointAddress;

/// Chunking limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchSettings {
    /// Items per request for device 0
    pub items_per_read: usize,
    /// Items per request for every other device
    pub slave_items_per_read: usize,
    /// Smallest trailing chunk that is sent on its own
    pub min_chunk_items: usize,
}

impl BatchSettings {
    /// Get the chunk size for a device
    pub fn chunk_size(&self, device: u32) -> usize {
        let size = if device == 0 {
            self.items_per_read
        } else {
            self.slave_items_per_read
        };
        size.max(1)
    }
}

impl Default for BatchSettings {
    fn default() -> Self {
        Self {
            items_per_read: 80,
            slave_items_per_read: 80,
            min_chunk_items: 5,
        }
    }
}

/// Items of one device sent in one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PointChunk {
    pub device: u32,
    pub items: Vec<u32>,
}

/// Groups addresses and splits them into request chunks
#[derive(Debug, Clone, Default)]
pub struct PointBatcher {
    settings: BatchSettings,
}

impl PointBatcher {
    pub fn new(settings: BatchSettings) -> Self {
        Self { settings }
    }

    pub fn settings(&self) -> &BatchSettings {
        &self.settings
    }

    /// Group addresses by device
    ///
    /// Malformed addresses are skipped.
    pub fn group<S: AsRef<str>>(&self, addresses: &[S]) -> Vec<(u32, Vec<u32>)> {
        let mut groups: Vec<(u32, Vec<u32>)> = Vec::new();
        for address in addresses {
            let address = match PointAddress::from_string(address.as_ref()) {
                Ok(address) => address,
                Err(e) => {
                    log::debug!("Skipping point: {}", e);
                    continue;
                }
            };

            let index = match groups.iter().position(|(device, _)| *device == address.device()) {
                Some(index) => index,
                None => {
                    groups.push((address.device(), Vec::new()));
                    groups.len() - 1
                }
            };
            let items = &mut groups[index].1;
            if !items.contains(&address.item()) {
                items.push(address.item());
            }
        }
        groups
    }

    /// Split one device's items into chunks
    ///
    /// # Arguments
    ///
    /// * `items` - Items of a single device
    /// * `chunk_size` - Regular chunk size
    /// * `min_chunk_items` - A remainder smaller than this joins the current chunk
    pub fn split_items(items: &[u32], chunk_size: usize, min_chunk_items: usize) -> Vec<Vec<u32>> {
        let chunk_size = chunk_size.max(1);
        let mut chunks = Vec::new();
        let mut remaining = items;
        while !remaining.is_empty() {
            if remaining.len() < chunk_size + min_chunk_items {
                chunks.push(remaining.to_vec());
                remaining = &[];
            } else {
                let (chunk, rest) = remaining.split_at(chunk_size);
                chunks.push(chunk.to_vec());
                remaining = rest;
            }
        }
        chunks
    }

    /// Turn an address list into request chunks
    pub fn chunks<S: AsRef<str>>(&self, addresses: &[S]) -> Vec<PointChunk> {
        let mut chunks = Vec::new();
        for (device, items) in self.group(addresses) {
            let chunk_size = self.settings.chunk_size(device);
            for items in Self::split_items(&items, chunk_size, self.settings.min_chunk_items) {
                chunks.push(PointChunk { device, items });
            }
        }
        chunks
    }
}
