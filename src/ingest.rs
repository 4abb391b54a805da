//! Offline ingestion: PDFs → pages → chunks → vector index.
//!
//! Re-running ingestion appends; chunks already in the index are not
//! detected and will be stored again under new ids.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use crate::chunk::Chunker;
use crate::config::Config;
use crate::embedding::create_embedder;
use crate::extract::{list_pdf_paths, parse_pdf};
use crate::index::{EmbeddingIndex, VectorIndex};
use crate::models::Document;
use crate::store::open_store;

/// Counts reported at the end of an ingestion run.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct IngestReport {
    pub pdfs_found: usize,
    pub pdfs_skipped: usize,
    pub pages: usize,
    pub chunks_indexed: usize,
}

/// Ingest every PDF in `ingest.pdf_dir` into the configured vector store.
pub async fn run_ingest(config: &Config) -> Result<IngestReport> {
    let paths = list_pdf_paths(&config.ingest)?;
    if paths.is_empty() {
        println!(
            "No PDFs found in {}. Add PDFs and run again.",
            config.ingest.pdf_dir.display()
        );
        return Ok(IngestReport::default());
    }

    let mut report = IngestReport {
        pdfs_found: paths.len(),
        ..Default::default()
    };

    let mut documents: Vec<Document> = Vec::new();
    for path in &paths {
        match parse_pdf(path) {
            Ok(pages) => {
                info!(path = %path.display(), pages = pages.len(), "parsed PDF");
                documents.extend(pages);
            }
            Err(e) => {
                warn!("Skipping {}: {:#}", path.display(), e);
                report.pdfs_skipped += 1;
            }
        }
    }
    report.pages = documents.len();

    let chunker = Chunker::new(config.chunking.max_chars, config.chunking.overlap_chars);
    if documents.iter().all(|d| d.text.trim().is_empty()) {
        println!("No chunks to index.");
        return Ok(report);
    }

    let embedder = create_embedder(&config.embedding)?;
    let store = open_store(&config.vector_store).await?;
    let index: Arc<dyn VectorIndex> = Arc::new(EmbeddingIndex::new(embedder, store));

    report.chunks_indexed =
        index_documents(index.as_ref(), &chunker, &documents, config.embedding.batch_size).await?;

    println!("ingest {}", config.ingest.pdf_dir.display());
    println!("  PDFs found: {}", report.pdfs_found);
    println!("  PDFs skipped: {}", report.pdfs_skipped);
    println!("  pages parsed: {}", report.pages);
    println!(
        "  Indexed {} chunks into collection '{}'.",
        report.chunks_indexed, config.vector_store.collection
    );
    println!("ok");

    Ok(report)
}

/// Chunk `documents` and upsert them in batches of `batch_size`.
/// Returns the number of chunks written.
pub async fn index_documents(
    index: &dyn VectorIndex,
    chunker: &Chunker,
    documents: &[Document],
    batch_size: usize,
) -> Result<usize> {
    let chunks = chunker.chunk(documents);
    let total = chunks.len();

    for (i, batch) in chunks.chunks(batch_size.max(1)).enumerate() {
        index.upsert(batch).await?;
        info!(batch = i + 1, chunks = batch.len(), total, "upserted batch");
    }
    Ok(total)
}
