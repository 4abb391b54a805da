//! PDF discovery and per-page text extraction.
//!
//! [`list_pdf_paths`] finds the PDFs under the configured directory;
//! [`parse_pdf`] turns one file into a [`Document`] per non-blank page,
//! tagged with the file path and its 1-based page number.

use anyhow::{Context, Result};
use globset::{GlobBuilder, GlobSet, GlobSetBuilder};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::IngestConfig;
use crate::models::Document;

/// PDFs under `pdf_dir` matching `include_globs`, sorted by path.
///
/// Globs match paths relative to `pdf_dir` and `*` stops at `/`, so the
/// default `*.pdf` only picks up top-level files; use `**/*.pdf` to recurse.
///
/// The directory is created when missing, so a fresh checkout yields an
/// empty list rather than an error.
pub fn list_pdf_paths(config: &IngestConfig) -> Result<Vec<PathBuf>> {
    let root = &config.pdf_dir;
    std::fs::create_dir_all(root)
        .with_context(|| format!("Failed to create PDF directory: {}", root.display()))?;

    let include_set = build_globset(&config.include_globs)?;

    let mut paths = Vec::new();
    for entry in WalkDir::new(root) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let relative = path.strip_prefix(root).unwrap_or(path);
        if include_set.is_match(relative) {
            paths.push(path.to_path_buf());
        }
    }

    paths.sort();
    Ok(paths)
}

/// Extract the text of every page of the PDF at `path`.
pub fn parse_pdf(path: &Path) -> Result<Vec<Document>> {
    let bytes =
        std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    parse_pdf_bytes(&bytes, &path.to_string_lossy())
}

/// As [`parse_pdf`], for bytes already in memory. `source` is recorded
/// as each page's provenance.
pub fn parse_pdf_bytes(bytes: &[u8], source: &str) -> Result<Vec<Document>> {
    let pages = pdf_extract::extract_text_from_mem_by_pages(bytes)
        .map_err(|e| anyhow::anyhow!("PDF extraction failed for {}: {}", source, e))?;

    Ok(pages
        .into_iter()
        .enumerate()
        .filter(|(_, text)| !text.trim().is_empty())
        .map(|(i, text)| Document::new(text, source, Some(i as u32 + 1)))
        .collect())
}

fn build_globset(patterns: &[String]) -> Result<GlobSet> {
    let mut builder = GlobSetBuilder::new();
    for pattern in patterns {
        builder.add(GlobBuilder::new(pattern).literal_separator(true).build()?);
    }
    Ok(builder.build()?)
}
