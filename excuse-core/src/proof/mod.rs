//! Proof artifact rendering.
//!
//! Document-style kinds become a one-page PDF certificate, every other kind a
//! PNG receipt. Artifacts are write-once files with fresh random names and are
//! not linked back to the excuse that produced them.

pub mod document;
pub mod receipt;

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

use crate::config::ProofConfig;
use crate::models::ProofKind;

#[derive(Error, Debug)]
pub enum ProofError {
    #[error("IO error writing artifact: {0}")]
    Io(#[from] std::io::Error),

    #[error("PDF error: {0}")]
    Pdf(String),

    #[error("PNG encoding error: {0}")]
    Png(#[from] png::EncodingError),
}

/// A rendered proof file and the root-relative URL it is served under.
#[derive(Debug, Clone, Serialize)]
pub struct ProofArtifact {
    pub kind: ProofKind,
    #[serde(skip)]
    pub path: PathBuf,
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ProofRenderer {
    output_dir: PathBuf,
    url_prefix: String,
}

impl ProofRenderer {
    pub fn new(output_dir: impl Into<PathBuf>, url_prefix: impl Into<String>) -> Self {
        Self {
            output_dir: output_dir.into(),
            url_prefix: url_prefix.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn from_config(config: &ProofConfig) -> Self {
        Self::new(config.output_dir(), config.url_prefix())
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Render a proof for `excuse_text`. Blocking: file I/O and rasterization.
    pub fn render(&self, excuse_text: &str, kind: ProofKind) -> Result<ProofArtifact, ProofError> {
        fs::create_dir_all(&self.output_dir)?;

        let extension = if kind.is_document() { "pdf" } else { "png" };
        let file_name = artifact_file_name(extension);
        let path = self.output_dir.join(&file_name);

        if kind.is_document() {
            document::render(excuse_text, kind, &path)?;
        } else {
            receipt::render(excuse_text, kind, &path)?;
        }

        let url = format!("{}/{}", self.url_prefix, file_name);
        tracing::info!(kind = %kind, url = %url, "Rendered proof artifact");

        Ok(ProofArtifact { kind, path, url })
    }
}

/// Greedy word wrap to at most `max_chars` characters per line. Words longer
/// than a line are split. Whitespace runs collapse to single spaces.
pub fn wrap_words(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    let mut lines = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in text.split_whitespace() {
        let mut word: Vec<char> = word.chars().collect();

        while word.len() > max_chars {
            if current_len > 0 {
                lines.push(std::mem::take(&mut current));
                current_len = 0;
            }
            let rest = word.split_off(max_chars);
            lines.push(word.into_iter().collect());
            word = rest;
        }

        if current_len > 0 && current_len + 1 + word.len() > max_chars {
            lines.push(std::mem::take(&mut current));
            current_len = 0;
        }
        if current_len > 0 {
            current.push(' ');
            current_len += 1;
        }
        current_len += word.len();
        current.extend(word);
    }

    if current_len > 0 {
        lines.push(current);
    }
    lines
}

/// `proof_<32 hex chars>.<extension>`
fn artifact_file_name(extension: &str) -> String {
    format!("proof_{}.{}", Uuid::new_v4().simple(), extension)
}
