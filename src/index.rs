use crate::embeddings::Embedding;
use anyhow::{bail, Context, Result};
use log::debug;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::Path;

const MAGIC: &[u8; 8] = b"FLATL2v1";
const HEADER_LEN: usize = 8 + 4 + 8;

/// One search hit: the vector's insertion position and its distance to the query
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    pub position: usize,
    pub distance: f32,
}

/// A store of vectors supporting nearest-neighbor lookup.
///
/// Positions are assigned in insertion order starting from zero, and
/// `search` returns neighbors nearest first.
#[allow(async_fn_in_trait)]
pub trait VectorIndex {
    /// Append vectors; the first one gets position `len()` at call time
    async fn add(&mut self, vectors: Vec<Embedding>) -> Result<()>;

    /// Find up to `k` nearest neighbors of `query`
    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>>;
}

/// Exact, brute-force index over squared L2 distance
#[derive(Debug, Clone, PartialEq)]
pub struct FlatL2Index {
    dimension: usize,
    /// Row-major, `len() * dimension` values
    data: Vec<f32>,
}

impl FlatL2Index {
    pub fn new(dimension: usize) -> Self {
        FlatL2Index {
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

    fn row(&self, position: usize) -> &[f32] {
        let start = position * self.dimension;
        &self.data[start..start + self.dimension]
    }

    /// Append vectors synchronously
    pub fn add_vectors(&mut self, vectors: &[Embedding]) -> Result<()> {
        for (offset, vector) in vectors.iter().enumerate() {
            if vector.dimension() != self.dimension {
                bail!(
                    "Vector {} has {} dimensions, index expects {}",
                    offset,
                    vector.dimension(),
                    self.dimension
                );
            }
        }
        self.data.reserve(vectors.len() * self.dimension);
        for vector in vectors {
            self.data.extend_from_slice(&vector.values);
        }
        Ok(())
    }

    /// Exact k-nearest-neighbor search, ties broken by lower position
    pub fn nearest(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>> {
        if query.dimension() != self.dimension {
            bail!(
                "Query has {} dimensions, index expects {}",
                query.dimension(),
                self.dimension
            );
        }

        let mut neighbors: Vec<Neighbor> = (0..self.len())
            .map(|position| Neighbor {
                position,
                distance: squared_l2(self.row(position), &query.values),
            })
            .collect();

        neighbors.sort_by(|a, b| {
            a.distance
                .total_cmp(&b.distance)
                .then_with(|| a.position.cmp(&b.position))
        });
        neighbors.truncate(k);
        Ok(neighbors)
    }

    /// Persist the index to `path`, overwriting any existing file
    pub fn write_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file = File::create(path)
            .with_context(|| format!("Failed to create index file {}", path.display()))?;
        let mut writer = BufWriter::new(file);

        writer.write_all(MAGIC)?;
        writer.write_all(&(self.dimension as u32).to_le_bytes())?;
        writer.write_all(&(self.len() as u64).to_le_bytes())?;
        for value in &self.data {
            writer.write_all(&value.to_le_bytes())?;
        }
        writer
            .flush()
            .with_context(|| format!("Failed to write index file {}", path.display()))?;

        debug!(
            "Wrote {} vectors of dimension {} to {}",
            self.len(),
            self.dimension,
            path.display()
        );
        Ok(())
    }

    /// Load an index previously written by [`FlatL2Index::write_to`].
    ///
    /// Missing files surface as `NotFound`; anything that does not match the
    /// format exactly surfaces as `InvalidData`.
    pub fn read_from<P: AsRef<Path>>(path: P) -> io::Result<Self> {
        let file = File::open(path.as_ref())?;
        let expected_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);

        let mut header = [0u8; HEADER_LEN];
        reader
            .read_exact(&mut header)
            .map_err(|_| invalid_data("index file is shorter than its header"))?;
        if &header[..8] != MAGIC {
            return Err(invalid_data("index file has an unknown format"));
        }

        let dimension = u32::from_le_bytes([header[8], header[9], header[10], header[11]]) as usize;
        let mut count_bytes = [0u8; 8];
        count_bytes.copy_from_slice(&header[12..20]);
        let count = u64::from_le_bytes(count_bytes);

        if dimension == 0 {
            return Err(invalid_data("index file declares zero dimensions"));
        }
        let body_len = count
            .checked_mul(dimension as u64)
            .and_then(|values| values.checked_mul(4))
            .ok_or_else(|| invalid_data("index file declares an impossible size"))?;
        if HEADER_LEN as u64 + body_len != expected_len {
            return Err(invalid_data("index file length does not match its header"));
        }

        let mut body = Vec::with_capacity(body_len as usize);
        reader.read_to_end(&mut body)?;
        let data = body
            .chunks_exact(4)
            .map(|bytes| f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
            .collect();

        Ok(FlatL2Index { dimension, data })
    }
}

impl VectorIndex for FlatL2Index {
    async fn add(&mut self, vectors: Vec<Embedding>) -> Result<()> {
        self.add_vectors(&vectors)
    }

    async fn search(&self, query: &Embedding, k: usize) -> Result<Vec<Neighbor>> {
        self.nearest(query, k)
    }
}

fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| {
            let d = x - y;
            d * d
        })
        .sum()
}

fn invalid_data(message: &str) -> io::Error {
    io::Error::new(io::ErrorKind::InvalidData, message.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::new(values.to_vec())
    }

    fn sample_index() -> FlatL2Index {
        let mut index = FlatL2Index::new(2);
        index
            .add_vectors(&[emb(&[0.0, 0.0]), emb(&[3.0, 4.0]), emb(&[1.0, 0.0])])
            .expect("vectors should fit");
        index
    }

    #[test]
    fn test_nearest_orders_by_distance() {
        let neighbors = sample_index()
            .nearest(&emb(&[0.9, 0.0]), 3)
            .expect("search should succeed");

        let positions: Vec<usize> = neighbors.iter().map(|n| n.position).collect();
        assert_eq!(positions, vec![2, 0, 1]);
        assert!(neighbors
            .windows(2)
            .all(|pair| pair[0].distance <= pair[1].distance));
        assert!((neighbors[0].distance - 0.01).abs() < 1e-6);
    }

    #[test]
    fn test_nearest_caps_at_index_size_and_k() {
        let index = sample_index();
        assert_eq!(index.nearest(&emb(&[0.0, 0.0]), 10).unwrap().len(), 3);
        assert_eq!(index.nearest(&emb(&[0.0, 0.0]), 1).unwrap().len(), 1);
        assert!(index.nearest(&emb(&[0.0, 0.0]), 0).unwrap().is_empty());
    }

    #[test]
    fn test_ties_prefer_lower_position() {
        let mut index = FlatL2Index::new(1);
        index
            .add_vectors(&[emb(&[2.0]), emb(&[-2.0]), emb(&[2.0])])
            .unwrap();

        let positions: Vec<usize> = index
            .nearest(&emb(&[0.0]), 3)
            .unwrap()
            .iter()
            .map(|n| n.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let mut index = FlatL2Index::new(2);
        assert!(index.add_vectors(&[emb(&[1.0, 2.0, 3.0])]).is_err());
        assert!(index.is_empty());
        assert!(sample_index().nearest(&emb(&[1.0]), 1).is_err());
    }

    #[test]
    fn test_file_round_trip_preserves_search_results() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("workout.index");
        let index = sample_index();

        index.write_to(&path).expect("write should succeed");
        let loaded = FlatL2Index::read_from(&path).expect("read should succeed");

        assert_eq!(loaded, index);
        assert_eq!(
            loaded.nearest(&emb(&[3.0, 3.0]), 2).unwrap(),
            index.nearest(&emb(&[3.0, 3.0]), 2).unwrap()
        );
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = FlatL2Index::read_from(dir.path().join("absent.index")).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_corrupt_files_are_invalid_data() {
        let dir = tempfile::tempdir().expect("tempdir");

        let garbage = dir.path().join("garbage.index");
        std::fs::write(&garbage, b"this is not an index at all").unwrap();
        let err = FlatL2Index::read_from(&garbage).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);

        let truncated = dir.path().join("truncated.index");
        sample_index().write_to(&truncated).unwrap();
        let bytes = std::fs::read(&truncated).unwrap();
        std::fs::write(&truncated, &bytes[..bytes.len() - 3]).unwrap();
        let err = FlatL2Index::read_from(&truncated).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }
}
