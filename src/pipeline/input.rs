//! Input resolution: turn a user-supplied path (or `-`) into typed input.
//!
//! ## Why sniff magic bytes?
//!
//! Dispatch lists arrive renamed, mailed and re-saved, so the extension is
//! not always truthful. A known spreadsheet extension wins; otherwise the
//! ZIP (`xlsx`/`ods`) and OLE2 (`xls`) signatures are checked before the
//! bytes are treated as pasted text.

use crate::error::DispatchError;
use std::path::{Path, PathBuf};
use tokio::io::AsyncReadExt;
use tracing::debug;

const ZIP_MAGIC: &[u8] = b"PK\x03\x04";
const OLE_MAGIC: &[u8] = &[0xD0, 0xCF, 0x11, 0xE0];

const WORKBOOK_EXTENSIONS: &[&str] = &["xlsx", "xlsm", "xlsb", "xls", "ods"];
const TEXT_EXTENSIONS: &[&str] = &["csv", "txt", "tsv"];

/// Input ready for one of the adapters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolvedInput {
    /// Spreadsheet bytes for the tabular adapter.
    Workbook { name: String, bytes: Vec<u8> },
    /// Comma-separated text for the delimited adapter.
    Text { name: String, text: String },
}

impl ResolvedInput {
    /// Display name used in messages and errors.
    pub fn name(&self) -> &str {
        match self {
            ResolvedInput::Workbook { name, .. } | ResolvedInput::Text { name, .. } => name,
        }
    }
}

/// What a byte buffer looks like.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputKind {
    Workbook,
    Text,
}

/// Decide how to read `bytes`, using the extension of `path` when it is known.
pub fn detect_kind(path: Option<&Path>, bytes: &[u8]) -> InputKind {
    let ext = path
        .and_then(|p| p.extension())
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());

    match ext.as_deref() {
        Some(e) if WORKBOOK_EXTENSIONS.contains(&e) => return InputKind::Workbook,
        Some(e) if TEXT_EXTENSIONS.contains(&e) => return InputKind::Text,
        _ => {}
    }

    if bytes.starts_with(ZIP_MAGIC) || bytes.starts_with(OLE_MAGIC) {
        InputKind::Workbook
    } else {
        InputKind::Text
    }
}

/// Resolve a path, or `-` for standard input.
///
/// Standard input is always read as text.
pub async fn resolve_input(input: &str) -> Result<ResolvedInput, DispatchError> {
    if input == "-" {
        let mut text = String::new();
        tokio::io::stdin()
            .read_to_string(&mut text)
            .await
            .map_err(|e| DispatchError::UnsupportedInput {
                path: PathBuf::from("-"),
                reason: e.to_string(),
            })?;
        return Ok(ResolvedInput::Text {
            name: "stdin".into(),
            text,
        });
    }

    let path = PathBuf::from(input);
    let bytes = match tokio::fs::read(&path).await {
        Ok(b) => b,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DispatchError::FileNotFound { path });
        }
        Err(e) if e.kind() == std::io::ErrorKind::PermissionDenied => {
            return Err(DispatchError::PermissionDenied { path });
        }
        Err(e) => {
            return Err(DispatchError::UnsupportedInput {
                path,
                reason: e.to_string(),
            });
        }
    };

    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| input.to_string());

    let kind = detect_kind(Some(&path), &bytes);
    debug!("Resolved '{}' as {:?} ({} bytes)", path.display(), kind, bytes.len());

    match kind {
        InputKind::Workbook => Ok(ResolvedInput::Workbook { name, bytes }),
        InputKind::Text => {
            let text = String::from_utf8(bytes).map_err(|_| DispatchError::UnsupportedInput {
                path,
                reason: "neither a spreadsheet nor UTF-8 text".into(),
            })?;
            Ok(ResolvedInput::Text { name, text })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extension_wins() {
        assert_eq!(
            detect_kind(Some(Path::new("list.XLSX")), b"not a zip"),
            InputKind::Workbook
        );
        assert_eq!(
            detect_kind(Some(Path::new("list.csv")), ZIP_MAGIC),
            InputKind::Text
        );
    }

    #[test]
    fn magic_bytes_decide_unknown_extensions() {
        assert_eq!(detect_kind(Some(Path::new("export.dat")), b"PK\x03\x04rest"), InputKind::Workbook);
        assert_eq!(detect_kind(None, &[0xD0, 0xCF, 0x11, 0xE0, 0xA1]), InputKind::Workbook);
        assert_eq!(detect_kind(None, b"P00001,Store"), InputKind::Text);
    }

    #[tokio::test]
    async fn missing_file() {
        let err = resolve_input("/nonexistent/dispatch.xlsx").await.unwrap_err();
        assert!(matches!(err, DispatchError::FileNotFound { .. }));
    }

    #[tokio::test]
    async fn text_file_resolves_as_text() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("paste.txt");
        std::fs::write(&path, "P00001,Alpha").unwrap();
        let input = resolve_input(path.to_str().unwrap()).await.unwrap();
        assert_eq!(input.name(), "paste.txt");
        assert!(matches!(input, ResolvedInput::Text { ref text, .. } if text == "P00001,Alpha"));
    }

    #[tokio::test]
    async fn binary_garbage_is_unsupported() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("blob.bin");
        std::fs::write(&path, [0xFF, 0xFE, 0x00, 0x80]).unwrap();
        let err = resolve_input(path.to_str().unwrap()).await.unwrap_err();
        assert!(matches!(err, DispatchError::UnsupportedInput { .. }));
    }
}
