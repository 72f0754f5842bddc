//! PDF page text via `lopdf`.

use std::ops::ControlFlow;
use std::path::{Path, PathBuf};

use lopdf::Document;
use tracing::{debug, trace};

use super::{DocumentSource, ExtractError};

#[derive(Debug, Clone)]
enum Origin {
    File(PathBuf),
    Bytes { label: String, data: Vec<u8> },
}

/// A PDF document read from disk or memory.
///
/// Parsing is deferred until pages are requested, so constructing a
/// `PdfDocument` never fails. The parsed document never outlives a single
/// [`DocumentSource::for_each_page`] call.
#[derive(Debug, Clone)]
pub struct PdfDocument {
    origin: Origin,
}

impl PdfDocument {
    /// PDF stored at `path`.
    #[must_use]
    pub fn open(path: &Path) -> Self {
        Self {
            origin: Origin::File(path.to_path_buf()),
        }
    }

    /// PDF held in memory (e.g. an upload body).
    #[must_use]
    pub fn from_bytes(label: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            origin: Origin::Bytes {
                label: label.into(),
                data,
            },
        }
    }

    fn load(&self) -> Result<Document, ExtractError> {
        match &self.origin {
            Origin::File(path) => {
                if !path.is_file() {
                    return Err(ExtractError::Io {
                        path: path.clone(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "no such file",
                        ),
                    });
                }
                Document::load(path).map_err(|e| ExtractError::unreadable(self.label(), e))
            }
            Origin::Bytes { data, .. } => {
                Document::load_mem(data).map_err(|e| ExtractError::unreadable(self.label(), e))
            }
        }
    }
}

impl DocumentSource for PdfDocument {
    fn label(&self) -> String {
        match &self.origin {
            Origin::File(path) => path.display().to_string(),
            Origin::Bytes { label, .. } => label.clone(),
        }
    }

    fn for_each_page(
        &self,
        visit: &mut dyn FnMut(Option<String>) -> ControlFlow<()>,
    ) -> Result<(), ExtractError> {
        let document = self.load()?;
        let pages = document.get_pages();
        debug!(document = %self.label(), pages = pages.len(), "opened PDF");

        for page_number in pages.keys() {
            let text = match document.extract_text(&[*page_number]) {
                Ok(text) if !text.trim().is_empty() => Some(text),
                Ok(_) => None,
                Err(error) => {
                    trace!(page = page_number, error = %error, "page yielded no text");
                    None
                }
            };
            if visit(text).is_break() {
                break;
            }
        }

        Ok(())
    }
}
