//! Flat vector index
//!
//! Append-only arena of fixed-dimension vectors with exhaustive nearest
//! neighbour search. A vector's position is its insertion offset; the index
//! has no other notion of identity.
//!
//! On-disk layout:
//! - 12-byte header: magic `CFVX`, format version (u32), dimension (u32),
//!   bincode fixed-int little-endian
//! - raw little-endian f32 sequence, `dimension` floats per vector
//!
//! The vector count is derived from the file length, so new vectors can be
//! appended in place. A torn trailing vector is dropped on load.

use serde::{Deserialize, Serialize};
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

use super::distance::squared_euclidean;
use crate::core::error::{VaultError, VaultResult};

const INDEX_MAGIC: [u8; 4] = *b"CFVX";
const INDEX_VERSION: u32 = 1;
const HEADER_LEN: u64 = 12;
const F32_BYTES: usize = std::mem::size_of::<f32>();

#[derive(Debug, Serialize, Deserialize)]
struct IndexHeader {
    magic: [u8; 4],
    version: u32,
    dimension: u32,
}

/// One search hit: position in the index and squared L2 distance
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: u64,
    pub distance: f32,
}

#[derive(Debug, Clone)]
pub struct FlatIndex {
    dimension: usize,
    /// Layout: [v0_0, v0_1, ..., v0_d, v1_0, ...]
    data: Vec<f32>,
}

impl FlatIndex {
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            data: Vec::new(),
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        if self.dimension == 0 {
            0
        } else {
            self.data.len() / self.dimension
        }
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Check dimension and reject NaN / infinite components
    pub fn validate(&self, vector: &[f32]) -> VaultResult<()> {
        if vector.len() != self.dimension {
            return Err(VaultError::dimension_mismatch(self.dimension, vector.len()));
        }
        if let Some(i) = vector.iter().position(|v| !v.is_finite()) {
            return Err(VaultError::InvalidInput(format!(
                "non-finite value at component {}",
                i
            )));
        }
        Ok(())
    }

    /// Append a vector and return its position (the prior count)
    pub fn append(&mut self, vector: &[f32]) -> VaultResult<u64> {
        self.validate(vector)?;
        let position = self.len() as u64;
        self.data.extend_from_slice(vector);
        Ok(position)
    }

    pub fn get(&self, position: u64) -> Option<&[f32]> {
        let start = (position as usize).checked_mul(self.dimension)?;
        self.data.get(start..start + self.dimension)
    }

    /// Drop every vector at or after `len`. Rollback and crash repair only.
    pub fn truncate(&mut self, len: usize) {
        self.data.truncate(len * self.dimension);
    }

    /// Up to `k` nearest vectors by ascending squared distance.
    /// Equal distances keep insertion order.
    pub fn search(&self, query: &[f32], k: usize) -> VaultResult<Vec<Neighbor>> {
        self.validate(query)?;
        let candidates = self
            .data
            .chunks_exact(self.dimension.max(1))
            .enumerate()
            .map(|(i, v)| Neighbor {
                position: i as u64,
                distance: squared_euclidean(query, v),
            })
            .collect();
        Ok(top_k(candidates, k))
    }

    /// Exact search restricted to the given positions
    pub fn search_subset(
        &self,
        query: &[f32],
        positions: &[u64],
        k: usize,
    ) -> VaultResult<Vec<Neighbor>> {
        self.validate(query)?;
        let mut candidates = Vec::with_capacity(positions.len());
        for &position in positions {
            let vector = self.get(position).ok_or_else(|| {
                VaultError::ConsistencyViolation(format!(
                    "position {} is beyond the index size {}",
                    position,
                    self.len()
                ))
            })?;
            candidates.push(Neighbor {
                position,
                distance: squared_euclidean(query, vector),
            });
        }
        Ok(top_k(candidates, k))
    }

    /// Write the whole index to `path` through a temp file and rename
    pub fn persist(&self, path: &Path) -> VaultResult<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let tmp = path.with_extension("tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            self.write_header(&mut writer)?;
            write_vectors(&mut writer, &self.data)?;
            let file = writer.into_inner().map_err(|e| e.into_error())?;
            file.sync_all()?;
        }
        fs::rename(&tmp, path)?;

        debug!(path = %path.display(), vectors = self.len(), "persisted vector index");
        Ok(())
    }

    /// Write through the vectors not yet on disk.
    ///
    /// `durable_len` is the number of vectors the file currently holds. A file
    /// holding more than memory (after a rollback) is cut back first. Returns
    /// the new durable length.
    pub fn sync_to(&self, path: &Path, durable_len: usize) -> VaultResult<usize> {
        if !path.exists() {
            self.persist(path)?;
            return Ok(self.len());
        }

        let keep = durable_len.min(self.len());
        let vector_bytes = (self.dimension * F32_BYTES) as u64;

        let mut file = OpenOptions::new().write(true).open(path)?;
        file.set_len(HEADER_LEN + keep as u64 * vector_bytes)?;
        file.seek(SeekFrom::End(0))?;
        {
            let mut writer = BufWriter::new(&mut file);
            write_vectors(&mut writer, &self.data[keep * self.dimension..])?;
            writer.flush()?;
        }
        file.sync_data()?;

        Ok(self.len())
    }

    /// Load an index written by [`persist`](Self::persist) or
    /// [`sync_to`](Self::sync_to). The stored dimension must match.
    pub fn load(path: &Path, dimension: usize) -> VaultResult<Self> {
        let file = File::open(path)?;
        let file_len = file.metadata()?.len();
        if file_len < HEADER_LEN {
            return Err(VaultError::StorageUnavailable(format!(
                "index file {} is shorter than its header",
                path.display()
            )));
        }

        let mut reader = BufReader::new(file);
        let header: IndexHeader = bincode::deserialize_from(&mut reader)?;
        if header.magic != INDEX_MAGIC {
            return Err(VaultError::StorageUnavailable(format!(
                "{} is not a vector index file",
                path.display()
            )));
        }
        if header.version != INDEX_VERSION {
            return Err(VaultError::StorageUnavailable(format!(
                "unsupported index format version {}",
                header.version
            )));
        }
        if header.dimension as usize != dimension {
            return Err(VaultError::dimension_mismatch(
                dimension,
                header.dimension as usize,
            ));
        }

        let vector_bytes = (dimension * F32_BYTES) as u64;
        let body = file_len - HEADER_LEN;
        let count = body / vector_bytes.max(1);
        let torn = body - count * vector_bytes;
        if torn != 0 {
            warn!(
                path = %path.display(),
                torn_bytes = torn,
                "ignoring partial trailing vector in index file"
            );
        }

        let mut bytes = vec![0u8; (count * vector_bytes) as usize];
        reader.read_exact(&mut bytes)?;
        let data = bytes
            .chunks_exact(F32_BYTES)
            .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
            .collect();

        Ok(Self { dimension, data })
    }

    fn write_header<W: Write>(&self, writer: &mut W) -> VaultResult<()> {
        let header = IndexHeader {
            magic: INDEX_MAGIC,
            version: INDEX_VERSION,
            dimension: self.dimension as u32,
        };
        bincode::serialize_into(writer, &header)?;
        Ok(())
    }
}

fn write_vectors<W: Write>(writer: &mut W, data: &[f32]) -> std::io::Result<()> {
    for value in data {
        writer.write_all(&value.to_le_bytes())?;
    }
    Ok(())
}

/// Keep the `k` best candidates ordered by (distance, position)
fn top_k(mut candidates: Vec<Neighbor>, k: usize) -> Vec<Neighbor> {
    let order = |a: &Neighbor, b: &Neighbor| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.position.cmp(&b.position))
    };

    if k == 0 {
        return Vec::new();
    }
    if k < candidates.len() {
        candidates.select_nth_unstable_by(k - 1, order);
        candidates.truncate(k);
    }
    candidates.sort_by(order);
    candidates
}
