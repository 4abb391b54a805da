//! Context assembly: retrieved chunks → one prompt-ready text block.
//!
//! Each chunk is rendered as a provenance header followed by its text:
//!
//! ```text
//! [source=data/pdfs/manual.pdf, page=3]
//! <chunk text>
//! ```
//!
//! The page is omitted when unknown (`[source=notes.pdf]`). Blocks are
//! joined by a horizontal rule ([`BLOCK_SEPARATOR`]) in retrieval rank
//! order. The answer prompt depends on this exact layout; changing it
//! changes model behaviour.

use crate::models::{ChunkMetadata, RetrievedChunk};

/// Separator placed between rendered chunk blocks.
pub const BLOCK_SEPARATOR: &str = "\n\n---\n\n";

/// Render chunks, most relevant first. No chunks → empty string.
pub fn assemble(chunks: &[RetrievedChunk]) -> String {
    chunks
        .iter()
        .map(|rc| format!("{}\n{}", provenance_header(&rc.chunk.metadata), rc.chunk.text))
        .collect::<Vec<_>>()
        .join(BLOCK_SEPARATOR)
}

/// `[source=<source>, page=<page>]`, or `[source=<source>]` without a page.
pub fn provenance_header(meta: &ChunkMetadata) -> String {
    match meta.page {
        Some(page) => format!("[source={}, page={}]", meta.source, page),
        None => format!("[source={}]", meta.source),
    }
}
