use crate::statics;
use anyhow::Context;
use std::{
    fs,
    path::{Path, PathBuf},
};

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LineEnding {
    Lf,
    CrLf,
}

impl LineEnding {
    pub fn as_str(self) -> &'static str {
        match self {
            LineEnding::Lf => statics::NL_LF,
            LineEnding::CrLf => statics::NL_CRLF,
        }
    }
}

/// A BPMN document loaded from disk, preserving its original bytes so an unmodified
/// document saves back byte-for-byte.
#[derive(Debug, Clone)]
pub struct LoadedDocument {
    pub source_path: Option<PathBuf>,
    pub line_ending: LineEnding,
    pub has_bom: bool,
    pub original_bytes: Vec<u8>,
    pub text: String,
    pub dirty: bool,
}

impl LoadedDocument {
    pub fn load_path(path: &Path) -> anyhow::Result<Self> {
        let bytes = fs::read(path).with_context(|| format!("reading {path:?}"))?;
        let mut doc = Self::from_bytes(bytes)?;
        doc.source_path = Some(path.to_path_buf());
        Ok(doc)
    }

    pub fn from_bytes(bytes: Vec<u8>) -> anyhow::Result<Self> {
        let has_bom = bytes.starts_with(UTF8_BOM);
        let body = if has_bom {
            &bytes[UTF8_BOM.len()..]
        } else {
            &bytes[..]
        };
        let line_ending = detect_line_ending(body);
        let text = std::str::from_utf8(body)
            .context("document is not valid UTF-8")?
            .to_string();

        Ok(Self {
            source_path: None,
            line_ending,
            has_bom,
            original_bytes: bytes,
            text,
            dirty: false,
        })
    }

    /// Short name for title bars: the file name, or a placeholder for unsaved documents.
    pub fn display_name(&self) -> String {
        self.source_path
            .as_deref()
            .and_then(Path::file_name)
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| statics::EN_PLACEHOLDER_UNSAVED.to_string())
    }

    /// Replace the document text, e.g. after a sync, and recompute `dirty`.
    pub fn set_text(&mut self, text: &str) {
        if text == self.text {
            return;
        }
        self.text = text.to_string();
        self.refresh_dirty();
    }

    /// Recompute `dirty` by comparing the bytes that would be written to `original_bytes`.
    /// Edits that are later undone leave the document clean again.
    pub fn refresh_dirty(&mut self) {
        self.dirty = self.generate_bytes() != self.original_bytes;
    }

    /// Bytes for the current text with the document's own line ending and BOM.
    pub fn generate_bytes(&self) -> Vec<u8> {
        let text = normalize_line_endings(&self.text, self.line_ending);
        let mut bytes = Vec::with_capacity(text.len() + UTF8_BOM.len());
        if self.has_bom {
            bytes.extend_from_slice(UTF8_BOM);
        }
        bytes.extend_from_slice(text.as_bytes());
        bytes
    }

    pub fn save_bytes(&self) -> Vec<u8> {
        if !self.dirty {
            return self.original_bytes.clone();
        }
        self.generate_bytes()
    }

    pub fn save_to_path(&mut self, path: &Path) -> anyhow::Result<()> {
        let bytes = self.save_bytes();
        fs::write(path, &bytes).with_context(|| format!("writing {path:?}"))?;

        tracing::info!(path = %path.display(), bytes = bytes.len(), "document saved");
        self.source_path = Some(path.to_path_buf());
        self.original_bytes = bytes;
        self.dirty = false;
        Ok(())
    }
}

pub(crate) fn detect_line_ending(text_bytes: &[u8]) -> LineEnding {
    // Count actual terminators; a stray CRLF in a mostly-LF file should not flip it.
    let mut lf_count = 0usize;
    let mut crlf_count = 0usize;

    for (i, b) in text_bytes.iter().enumerate() {
        if *b != b'\n' {
            continue;
        }
        if i > 0 && text_bytes[i - 1] == b'\r' {
            crlf_count += 1;
        } else {
            lf_count += 1;
        }
    }

    if crlf_count > lf_count {
        LineEnding::CrLf
    } else {
        LineEnding::Lf
    }
}

pub(crate) fn normalize_line_endings(text: &str, line_ending: LineEnding) -> String {
    let lf = text.replace(statics::NL_CRLF, statics::NL_LF);
    match line_ending {
        LineEnding::Lf => lf,
        LineEnding::CrLf => lf.replace(statics::NL_LF, statics::NL_CRLF),
    }
}
