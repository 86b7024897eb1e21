//! Optional collaborators injected at construction.
//!
//! Features that need an external library (CSS inlining, spreadsheet export,
//! figure rendering) go through these traits. A missing collaborator is
//! reported as [`Error::MissingCapability`](crate::Error::MissingCapability)
//! when the feature is first needed.

use crate::table::Table;
use std::fmt;
use std::io;
use std::sync::Arc;

/// Moves `<style>` rules into `style` attributes so mail clients render them.
pub trait CssInliner: fmt::Debug + Send + Sync {
    /// Inlines the CSS of an HTML document or fragment.
    ///
    /// # Errors
    ///
    /// Returns an error if the document cannot be processed.
    fn inline(&self, html: &str) -> io::Result<String>;
}

/// Serializes a table as an Excel workbook.
pub trait SpreadsheetWriter: fmt::Debug + Send + Sync {
    /// Writes the table as `.xlsx` bytes.
    ///
    /// # Errors
    ///
    /// Returns an error if the workbook cannot be written.
    fn write_xlsx(&self, table: &Table) -> io::Result<Vec<u8>>;
}

/// Anything that can export itself as an image, such as a chart.
pub trait Figure: fmt::Debug + Send + Sync {
    /// Exports the figure in the given format (`png`, `svg`, ...).
    ///
    /// # Errors
    ///
    /// Returns an error if the figure cannot be exported in that format.
    fn export(&self, format: &str) -> io::Result<Vec<u8>>;
}

/// The set of optional collaborators available to a sender.
#[derive(Debug, Clone, Default)]
pub struct Capabilities {
    /// Used for styled tables in HTML bodies.
    pub css_inliner: Option<Arc<dyn CssInliner>>,
    /// Used for `.xlsx` table attachments.
    pub spreadsheet: Option<Arc<dyn SpreadsheetWriter>>,
}

impl Capabilities {
    /// No optional collaborators.
    #[must_use]
    pub fn none() -> Self {
        Self::default()
    }

    /// Adds a CSS inliner.
    #[must_use]
    pub fn with_css_inliner(mut self, inliner: impl CssInliner + 'static) -> Self {
        self.css_inliner = Some(Arc::new(inliner));
        self
    }

    /// Adds a spreadsheet writer.
    #[must_use]
    pub fn with_spreadsheet(mut self, writer: impl SpreadsheetWriter + 'static) -> Self {
        self.spreadsheet = Some(Arc::new(writer));
        self
    }
}
