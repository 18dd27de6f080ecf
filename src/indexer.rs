use crate::chunking::{split_into_windows, CHUNK_WORDS};
use crate::document::{read_document_content, DocumentKind};
use crate::embeddings::{Embedder, Embedding, EMBEDDING_DIMENSION};
use crate::index::{FlatL2Index, VectorIndex};
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// Outcome of one indexing run
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IndexReport {
    pub files_read: usize,
    pub files_skipped: usize,
    pub chunks_seen: usize,
    pub chunks_embedded: usize,
    /// False when nothing embedded and no output was written
    pub written: bool,
}

impl IndexReport {
    pub fn chunks_dropped(&self) -> usize {
        self.chunks_seen - self.chunks_embedded
    }
}

/// Chunks that embedded successfully, in corpus order.
///
/// `texts[i]` is the chunk that produced `vectors[i]`; the two are only ever
/// extended together.
#[derive(Debug, Clone, Default)]
pub struct EmbeddedCorpus {
    texts: Vec<String>,
    vectors: Vec<Embedding>,
    report: IndexReport,
}

impl EmbeddedCorpus {
    pub fn is_empty(&self) -> bool {
        self.texts.is_empty()
    }

    pub fn report(&self) -> &IndexReport {
        &self.report
    }

    fn push(&mut self, text: String, vector: Embedding) {
        self.texts.push(text);
        self.vectors.push(vector);
    }

    /// Add every vector to `index` and write the matching text file.
    ///
    /// An empty corpus writes nothing and reports a no-op.
    pub async fn write_into<I: VectorIndex>(
        self,
        index: &mut I,
        text_path: &Path,
    ) -> Result<IndexReport> {
        let mut report = self.report;
        if self.texts.is_empty() {
            info!("No chunks embedded; leaving {} untouched", text_path.display());
            return Ok(report);
        }

        index
            .add(self.vectors)
            .await
            .context("Failed to add vectors to index")?;
        write_lines(text_path, &self.texts)?;

        report.written = true;
        Ok(report)
    }

    /// Write a fresh flat L2 index and the matching text file.
    pub async fn write_flat(
        self,
        dimension: usize,
        index_path: &Path,
        text_path: &Path,
    ) -> Result<IndexReport> {
        if self.texts.is_empty() {
            info!(
                "No chunks embedded; leaving {} and {} untouched",
                index_path.display(),
                text_path.display()
            );
            return Ok(self.report);
        }

        let mut index = FlatL2Index::new(dimension);
        let report = self.write_into(&mut index, text_path).await?;
        index.write_to(index_path)?;

        info!(
            "Wrote {} vectors to {} and {} lines to {}",
            index.len(),
            index_path.display(),
            report.chunks_embedded,
            text_path.display()
        );
        Ok(report)
    }
}

/// Turns a folder of source documents into an index and a line-ordered text file
pub struct Indexer<E> {
    embedder: E,
    dimension: usize,
    chunk_words: usize,
}

impl<E: Embedder> Indexer<E> {
    pub fn new(embedder: E) -> Self {
        Indexer {
            embedder,
            dimension: EMBEDDING_DIMENSION,
            chunk_words: CHUNK_WORDS,
        }
    }

    /// Override the expected embedding dimensionality
    pub fn with_dimension(mut self, dimension: usize) -> Self {
        self.dimension = dimension;
        self
    }

    pub fn with_chunk_words(mut self, chunk_words: usize) -> Self {
        self.chunk_words = chunk_words;
        self
    }

    /// Read, chunk, and embed every supported document in `source_folder`.
    ///
    /// A chunk whose embedding fails is dropped whole: it contributes neither
    /// a vector nor a text line.
    pub async fn embed_folder(&self, source_folder: &Path) -> Result<EmbeddedCorpus> {
        let mut corpus = EmbeddedCorpus::default();

        for path in list_files(source_folder)? {
            let Some(kind) = DocumentKind::from_path(&path) else {
                debug!("Skipping unsupported file: {}", path.display());
                corpus.report.files_skipped += 1;
                continue;
            };

            let content = read_document_content(&path, kind)?;
            corpus.report.files_read += 1;

            let mut embedded_here = 0;
            for (chunk_index, chunk) in split_into_windows(&content, self.chunk_words).enumerate()
            {
                corpus.report.chunks_seen += 1;
                match self.embed_chunk(&chunk).await {
                    Ok(vector) => {
                        corpus.push(chunk, vector);
                        corpus.report.chunks_embedded += 1;
                        embedded_here += 1;
                    }
                    Err(e) => warn!(
                        "Dropping chunk {} of {}: {}",
                        chunk_index,
                        path.display(),
                        e
                    ),
                }
            }
            info!("Embedded {} chunks from {}", embedded_here, path.display());
        }

        Ok(corpus)
    }

    async fn embed_chunk(&self, chunk: &str) -> Result<Embedding> {
        let vector = self.embedder.embed(chunk).await?;
        if vector.dimension() != self.dimension {
            anyhow::bail!(
                "embedding has {} dimensions, expected {}",
                vector.dimension(),
                self.dimension
            );
        }
        Ok(vector)
    }

    /// Build a flat L2 index for one domain's source folder.
    ///
    /// Both outputs are overwritten; nothing is written when no chunk embeds.
    pub async fn build_index(
        &self,
        source_folder: &Path,
        index_output_path: &Path,
        text_output_path: &Path,
    ) -> Result<IndexReport> {
        let corpus = self.embed_folder(source_folder).await?;
        if !corpus.is_empty() {
            ensure_parent(index_output_path)?;
            ensure_parent(text_output_path)?;
        }

        let report = corpus
            .write_flat(self.dimension, index_output_path, text_output_path)
            .await?;
        info!(
            "Indexed {}: {} files, {} skipped, {}/{} chunks embedded",
            source_folder.display(),
            report.files_read,
            report.files_skipped,
            report.chunks_embedded,
            report.chunks_seen
        );
        Ok(report)
    }
}

/// Regular files in `folder`, sorted by name so repeated runs index in the same order
fn list_files(folder: &Path) -> Result<Vec<PathBuf>> {
    let entries = fs::read_dir(folder)
        .with_context(|| format!("Failed to read source folder {}", folder.display()))?;

    let mut files = Vec::new();
    for entry in entries {
        let entry =
            entry.with_context(|| format!("Failed to list source folder {}", folder.display()))?;
        // follows symlinks, so linked sources are indexed like regular files
        let path = entry.path();
        if path.is_file() {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create directory {}", parent.display()))?;
    }
    Ok(())
}

fn write_lines(path: &Path, lines: &[String]) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create text file {}", path.display()))?;
    let mut writer = BufWriter::new(file);
    for line in lines {
        writer.write_all(line.as_bytes())?;
        writer.write_all(b"\n")?;
    }
    writer
        .flush()
        .with_context(|| format!("Failed to write text file {}", path.display()))?;
    Ok(())
}
