//! Structured diagnostic messages with cell/site/tile context.

use crate::severity::Severity;
use serde::{Deserialize, Serialize};
use std::fmt;

/// A single diagnostic message emitted during legalization.
///
/// Netlists carry no source locations, so traceability context is the names
/// of the design and device objects involved: the cell being legalized and,
/// for site-resolved cells, the physical site and tile.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Diagnostic {
    /// The severity level of this diagnostic.
    pub severity: Severity,
    /// The main diagnostic message.
    pub message: String,
    /// Name of the cell this diagnostic refers to, if any.
    pub cell: Option<String>,
    /// Name of the physical site involved, if any.
    pub site: Option<String>,
    /// Name of the tile involved, if any.
    pub tile: Option<String>,
}

impl Diagnostic {
    /// Creates an informational diagnostic.
    pub fn info(message: impl Into<String>) -> Self {
        Self::new(Severity::Info, message)
    }

    /// Creates a warning diagnostic.
    pub fn warning(message: impl Into<String>) -> Self {
        Self::new(Severity::Warning, message)
    }

    fn new(severity: Severity, message: impl Into<String>) -> Self {
        Self {
            severity,
            message: message.into(),
            cell: None,
            site: None,
            tile: None,
        }
    }

    /// Attaches the name of the cell involved.
    pub fn with_cell(mut self, cell: impl Into<String>) -> Self {
        self.cell = Some(cell.into());
        self
    }

    /// Attaches the name of the site involved.
    pub fn with_site(mut self, site: impl Into<String>) -> Self {
        self.site = Some(site.into());
        self
    }

    /// Attaches the name of the tile involved.
    pub fn with_tile(mut self, tile: impl Into<String>) -> Self {
        self.tile = Some(tile.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.severity, self.message)?;
        if let Some(cell) = &self.cell {
            write!(f, " [cell '{cell}']")?;
        }
        if let Some(site) = &self.site {
            write!(f, " [site '{site}']")?;
        }
        if let Some(tile) = &self.tile {
            write!(f, " [tile '{tile}']")?;
        }
        Ok(())
    }
}
