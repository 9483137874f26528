//! Memory-mapped vector file backing a persisted [`FlatIndex`].
//!
//! # Storage Format
//!
//! - Header (20 bytes): magic `WVEC`, version, metric tag, dimension, vector count
//! - Vectors: contiguous little-endian f32 rows in position order
//!
//! Row `i` is the vector at position `i`, so no ids are stored. A file with
//! zero vectors has dimension 0.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use memmap2::{Mmap, MmapOptions};

use crate::vector::{DistanceMetric, FlatIndex, VectorDimension, VectorError};

/// Current storage format version.
const STORAGE_VERSION: u32 = 1;

/// Size of the storage header in bytes.
const HEADER_SIZE: usize = 20;

/// Magic bytes to identify vector storage files.
const MAGIC_BYTES: &[u8; 4] = b"WVEC";

/// Number of bytes per f32 value.
const BYTES_PER_F32: usize = 4;

/// Parsed header of a vector file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VectorFileHeader {
    pub metric: DistanceMetric,
    pub dimension: Option<VectorDimension>,
    pub count: usize,
}

impl VectorFileHeader {
    /// Exact file size the header implies, `None` if it overflows `usize`.
    fn expected_len(&self) -> Option<usize> {
        self.count
            .checked_mul(self.dimension.map_or(0, |d| d.get()))?
            .checked_mul(BYTES_PER_F32)?
            .checked_add(HEADER_SIZE)
    }
}

/// Read-only view of a vector file.
#[derive(Debug)]
pub struct MmapVectorStorage {
    path: PathBuf,
    mmap: Mmap,
    header: VectorFileHeader,
}

impl MmapVectorStorage {
    /// Writes the rows of `index` to `path`.
    ///
    /// Data goes to a sibling temp file first and is renamed into place, so a
    /// crash never leaves a truncated file under the final name.
    pub fn write(path: impl AsRef<Path>, index: &FlatIndex) -> Result<(), VectorError> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let dimension = index.dimension().map_or(0, |d| d.get());
        let dimension = u32::try_from(dimension)
            .map_err(|_| VectorError::InvalidFormat(format!("dimension {dimension} too large")))?;
        let count =
            u32::try_from(index.len()).map_err(|_| VectorError::TooManyVectors(index.len()))?;

        let temp_path = path.with_extension("vec.tmp");
        {
            let mut writer = BufWriter::new(File::create(&temp_path)?);
            writer.write_all(MAGIC_BYTES)?;
            writer.write_all(&STORAGE_VERSION.to_le_bytes())?;
            writer.write_all(&index.metric().to_tag().to_le_bytes())?;
            writer.write_all(&dimension.to_le_bytes())?;
            writer.write_all(&count.to_le_bytes())?;
            for value in index.as_slice() {
                writer.write_all(&value.to_le_bytes())?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        std::fs::rename(&temp_path, path)?;

        tracing::debug!(
            path = %path.display(),
            vectors = index.len(),
            "wrote vector file"
        );
        Ok(())
    }

    /// Opens an existing vector file and validates its header and length.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, VectorError> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(VectorError::Storage(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Vector storage file not found: {}", path.display()),
            )));
        }

        let file = File::open(&path)?;
        // SAFETY: the file is only replaced through rename, never modified in place.
        let mmap = unsafe { MmapOptions::new().map(&file)? };

        let header = Self::read_header(&mmap)?;
        let Some(expected) = header.expected_len() else {
            return Err(VectorError::InvalidFormat(format!(
                "header declares {} vectors of dimension {}, which no file can hold",
                header.count,
                header.dimension.map_or(0, |d| d.get())
            )));
        };
        if mmap.len() != expected {
            return Err(VectorError::InvalidFormat(format!(
                "expected {expected} bytes for {} vectors, file has {}",
                header.count,
                mmap.len()
            )));
        }

        Ok(Self { path, mmap, header })
    }

    /// Header of the opened file.
    #[must_use]
    pub fn header(&self) -> VectorFileHeader {
        self.header
    }

    /// Path of the opened file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copies all rows into a [`FlatIndex`] without re-normalizing them.
    pub fn load_index(&self) -> Result<FlatIndex, VectorError> {
        let data: Vec<f32> = self.mmap[HEADER_SIZE..]
            .chunks_exact(BYTES_PER_F32)
            .map(|b| f32::from_le_bytes([b[0], b[1], b[2], b[3]]))
            .collect();
        FlatIndex::from_rows(self.header.metric, self.header.dimension, data)
    }

    fn read_header(mmap: &Mmap) -> Result<VectorFileHeader, VectorError> {
        if mmap.len() < HEADER_SIZE {
            return Err(VectorError::InvalidFormat(
                "File too small to contain header".to_string(),
            ));
        }

        // Check magic bytes
        if &mmap[0..4] != MAGIC_BYTES {
            return Err(VectorError::InvalidFormat(
                "Invalid magic bytes".to_string(),
            ));
        }

        let field = |at: usize| u32::from_le_bytes([mmap[at], mmap[at + 1], mmap[at + 2], mmap[at + 3]]);

        let version = field(4);
        if version != STORAGE_VERSION {
            return Err(VectorError::VersionMismatch {
                expected: STORAGE_VERSION,
                actual: version,
            });
        }

        let metric_tag = field(8);
        let metric = DistanceMetric::from_tag(metric_tag)
            .ok_or_else(|| VectorError::InvalidFormat(format!("unknown metric tag {metric_tag}")))?;

        let dim_value = field(12) as usize;
        let count = field(16) as usize;
        let dimension = match (dim_value, count) {
            (0, 0) => None,
            (0, _) => {
                return Err(VectorError::InvalidFormat(
                    "zero dimension with stored vectors".to_string(),
                ));
            }
            (d, _) => Some(VectorDimension::new(d)?),
        };

        Ok(VectorFileHeader {
            metric,
            dimension,
            count,
        })
    }
}
