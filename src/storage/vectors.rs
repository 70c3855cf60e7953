//! Binary vector snapshot file.
//!
//! Layout, all integers little-endian:
//!
//! ```text
//! [magic: "SWVS"] [format version: u32] [dimension: u32] [count: u32]
//! [record]*count where record = [item id: u32] [dimension x f32]
//! ```
//!
//! Writes stream through a buffered writer; reads memory-map the file
//! and validate the header and length before touching any record.

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use memmap2::Mmap;
use tracing::{debug, info};

use crate::catalog::ItemId;
use crate::storage::SnapshotError;
use crate::vector::VectorDimension;

const MAGIC: &[u8; 4] = b"SWVS";
const FORMAT_VERSION: u32 = 1;
const HEADER_SIZE: usize = 16;

/// A loaded vector snapshot: every item's embedding, in file order.
#[derive(Debug)]
pub struct VectorSnapshot {
    dimension: VectorDimension,
    entries: Vec<(ItemId, Vec<f32>)>,
}

impl VectorSnapshot {
    /// Writes a snapshot file, replacing any existing one.
    ///
    /// Fails with [`SnapshotError::DimensionMismatch`] if any vector's
    /// length differs from `dimension`.
    pub fn save(
        path: &Path,
        dimension: VectorDimension,
        entries: &[(ItemId, Vec<f32>)],
    ) -> Result<(), SnapshotError> {
        for (id, vector) in entries {
            if vector.len() != dimension.get() {
                debug!(item = %id, "vector length differs from snapshot dimension");
                return Err(SnapshotError::DimensionMismatch {
                    expected: dimension.get(),
                    actual: vector.len(),
                });
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&FORMAT_VERSION.to_le_bytes())?;
        writer.write_all(&(dimension.get() as u32).to_le_bytes())?;
        writer.write_all(&(entries.len() as u32).to_le_bytes())?;

        for (id, vector) in entries {
            writer.write_all(&id.get().to_le_bytes())?;
            for &value in vector {
                writer.write_all(&value.to_le_bytes())?;
            }
        }
        writer.flush()?;

        info!(
            path = %path.display(),
            items = entries.len(),
            dimension = dimension.get(),
            "vector snapshot written"
        );
        Ok(())
    }

    /// Loads a snapshot file via memory mapping.
    pub fn load(path: &Path) -> Result<Self, SnapshotError> {
        let file = File::open(path)?;
        // Read-only map over a file we never truncate while open
        let mmap = unsafe { Mmap::map(&file)? };
        let data: &[u8] = &mmap;

        if data.len() < HEADER_SIZE {
            return Err(SnapshotError::Corrupted {
                reason: format!("file too short for header: {} bytes", data.len()),
            });
        }
        if &data[0..4] != MAGIC {
            return Err(SnapshotError::Corrupted {
                reason: "bad magic bytes".to_string(),
            });
        }

        let format_version = read_u32(data, 4);
        if format_version != FORMAT_VERSION {
            return Err(SnapshotError::VersionMismatch {
                expected: FORMAT_VERSION,
                actual: format_version,
            });
        }

        let dimension = VectorDimension::new(read_u32(data, 8) as usize).map_err(|_| {
            SnapshotError::Corrupted {
                reason: "zero dimension in header".to_string(),
            }
        })?;
        let count = read_u32(data, 12) as usize;

        let record_size = 4 + dimension.get() * 4;
        let expected_len = HEADER_SIZE + count * record_size;
        if data.len() != expected_len {
            return Err(SnapshotError::Corrupted {
                reason: format!(
                    "file length {} does not match header (expected {expected_len})",
                    data.len()
                ),
            });
        }

        let mut entries = Vec::with_capacity(count);
        let mut offset = HEADER_SIZE;
        for _ in 0..count {
            let raw_id = read_u32(data, offset);
            let id = ItemId::new(raw_id).ok_or(SnapshotError::InvalidId(raw_id))?;
            offset += 4;

            let mut vector = Vec::with_capacity(dimension.get());
            for _ in 0..dimension.get() {
                let bytes: [u8; 4] = data[offset..offset + 4]
                    .try_into()
                    .map_err(|_| SnapshotError::Corrupted {
                        reason: "truncated record".to_string(),
                    })?;
                vector.push(f32::from_le_bytes(bytes));
                offset += 4;
            }
            entries.push((id, vector));
        }

        debug!(path = %path.display(), items = entries.len(), "vector snapshot loaded");
        Ok(Self { dimension, entries })
    }

    #[must_use]
    pub fn dimension(&self) -> VectorDimension {
        self.dimension
    }

    #[must_use]
    pub fn entries(&self) -> &[(ItemId, Vec<f32>)] {
        &self.entries
    }

    #[must_use]
    pub fn into_entries(self) -> Vec<(ItemId, Vec<f32>)> {
        self.entries
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn read_u32(data: &[u8], offset: usize) -> u32 {
    let bytes: [u8; 4] = data[offset..offset + 4]
        .try_into()
        .unwrap_or([0, 0, 0, 0]);
    u32::from_le_bytes(bytes)
}
