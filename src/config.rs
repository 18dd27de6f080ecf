use anyhow::{bail, Result};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Where vectors live
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum IndexBackend {
    /// Flat L2 index files next to the text files
    Flat,
    /// One Qdrant collection per domain
    Qdrant,
}

impl FromStr for IndexBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "flat" => Ok(IndexBackend::Flat),
            "qdrant" => Ok(IndexBackend::Qdrant),
            other => bail!("Unknown index backend: {}", other),
        }
    }
}

/// Locations of source corpora and index outputs
#[derive(Debug, Clone)]
pub struct CorpusConfig {
    /// Holds `<domain>.index` and `<domain>.txt`
    pub data_dir: PathBuf,
    /// Holds one source folder per domain
    pub corpus_dir: PathBuf,
    pub backend: IndexBackend,
}

impl CorpusConfig {
    /// Create a new configuration from environment variables
    pub fn from_env() -> Result<Self> {
        let data_dir = env::var("FITCOACH_DATA_DIR").unwrap_or_else(|_| "data".to_string());
        let corpus_dir = env::var("FITCOACH_CORPUS_DIR").unwrap_or_else(|_| "pdfs".to_string());
        let backend = match env::var("FITCOACH_INDEX_BACKEND") {
            Ok(raw) => raw.parse()?,
            Err(_) => IndexBackend::Flat,
        };

        Ok(CorpusConfig {
            data_dir: PathBuf::from(data_dir),
            corpus_dir: PathBuf::from(corpus_dir),
            backend,
        })
    }
}
