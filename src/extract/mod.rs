//! Document text extraction.
//!
//! A [`DocumentSource`] yields the text of each page in order. The extractor
//! concatenates those page texts into one document-level string, bounded by a
//! character budget. Pages that yield no text contribute nothing; only a
//! container that cannot be opened at all is an error.
//!
//! # Example
//!
//! ```
//! use papertag_core::extract::{TextPages, extract_text};
//!
//! let pages = TextPages::new(vec!["Deep Learning".to_string(), String::new()]);
//! let extracted = extract_text(&pages, 12_000).unwrap();
//! assert_eq!(extracted.text, "Deep Learning");
//! assert_eq!(extracted.empty_pages, 1);
//! ```

mod error;
mod pdf;

pub use error::ExtractError;
pub use pdf::PdfDocument;

use std::ops::ControlFlow;

use tracing::{debug, instrument};

/// Default character budget for extracted text.
pub const DEFAULT_MAX_INPUT_CHARS: usize = 12_000;

/// An ordered source of page texts for one document.
pub trait DocumentSource: Send + Sync {
    /// Short label used in logs (file name, paper id, ...).
    fn label(&self) -> String;

    /// Feeds each page's text to `visit`, in page order.
    ///
    /// A page without extractable text is reported as `None`. Iteration
    /// stops early when `visit` returns [`ControlFlow::Break`].
    ///
    /// # Errors
    ///
    /// Returns [`ExtractError`] when the document container cannot be opened
    /// or iterated.
    fn for_each_page(
        &self,
        visit: &mut dyn FnMut(Option<String>) -> ControlFlow<()>,
    ) -> Result<(), ExtractError>;
}

/// Already-decoded page texts.
#[derive(Debug, Clone, Default)]
pub struct TextPages {
    pages: Vec<String>,
}

impl TextPages {
    /// Wraps page texts in reading order.
    #[must_use]
    pub fn new(pages: Vec<String>) -> Self {
        Self { pages }
    }

    /// Number of pages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pages.len()
    }

    /// Returns true when there are no pages at all.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for TextPages {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(Into::into).collect())
    }
}

impl DocumentSource for TextPages {
    fn label(&self) -> String {
        format!("text({} pages)", self.pages.len())
    }

    fn for_each_page(
        &self,
        visit: &mut dyn FnMut(Option<String>) -> ControlFlow<()>,
    ) -> Result<(), ExtractError> {
        for page in &self.pages {
            let text = if page.is_empty() {
                None
            } else {
                Some(page.clone())
            };
            if visit(text).is_break() {
                break;
            }
        }
        Ok(())
    }
}

/// Document-level text produced by [`extract_text`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExtractedText {
    /// Concatenated page text, at most the character budget long.
    pub text: String,
    /// Pages visited.
    pub pages: usize,
    /// Visited pages that yielded no text.
    pub empty_pages: usize,
    /// True when text beyond the budget was dropped.
    pub truncated: bool,
}

impl ExtractedText {
    /// Returns true when the text holds nothing but whitespace.
    #[must_use]
    pub fn is_blank(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// Concatenates the page texts of `source`, keeping at most `max_chars`
/// characters.
///
/// Page texts are appended as-is with no separator. Reading stops as soon as
/// the budget is spent.
///
/// # Errors
///
/// Returns [`ExtractError`] if the source cannot be opened or iterated.
#[instrument(skip(source), fields(source = %source.label()))]
pub fn extract_text(
    source: &dyn DocumentSource,
    max_chars: usize,
) -> Result<ExtractedText, ExtractError> {
    let mut extracted = ExtractedText::default();
    let mut remaining = max_chars;

    source.for_each_page(&mut |page| {
        extracted.pages += 1;
        let Some(text) = page.filter(|t| !t.is_empty()) else {
            extracted.empty_pages += 1;
            return ControlFlow::Continue(());
        };

        if remaining == 0 {
            extracted.truncated = true;
            return ControlFlow::Break(());
        }

        let len = text.chars().count();
        if len <= remaining {
            extracted.text.push_str(&text);
            remaining -= len;
            ControlFlow::Continue(())
        } else {
            extracted.text.extend(text.chars().take(remaining));
            remaining = 0;
            extracted.truncated = true;
            ControlFlow::Break(())
        }
    })?;

    debug!(
        pages = extracted.pages,
        empty_pages = extracted.empty_pages,
        chars = max_chars - remaining,
        truncated = extracted.truncated,
        "extracted document text"
    );

    Ok(extracted)
}
