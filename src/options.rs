use crate::error::LayoutError;
use crate::types::{Color, Pt};
use serde::{Deserialize, Serialize};

/// Pagination settings. Every field has a default, so a partial JSON
/// document is a valid configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SplitOptions {
    /// Split plain-text cells at the page bottom instead of moving the whole
    /// row to the next page.
    pub split_cells_in_final_row: bool,
    /// Re-stamp the header rows at the top of every continuation page.
    pub repeat_header: bool,
    /// Background colors cycled over body rows, restarting on every page.
    pub row_colors: Vec<Color>,
    /// Slack allowed in every fit comparison.
    pub tolerance: Pt,
}

impl Default for SplitOptions {
    fn default() -> Self {
        Self {
            split_cells_in_final_row: false,
            repeat_header: true,
            row_colors: Vec::new(),
            tolerance: Pt::MILLI,
        }
    }
}

impl SplitOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_json(json: &str) -> Result<Self, LayoutError> {
        let options: SplitOptions = serde_json::from_str(json)?;
        options.validate()?;
        Ok(options)
    }

    pub fn validate(&self) -> Result<(), LayoutError> {
        if self.tolerance < Pt::ZERO {
            return Err(LayoutError::InvalidConfiguration(format!(
                "tolerance must not be negative, got {}",
                self.tolerance
            )));
        }
        Ok(())
    }

    pub fn split_cells_in_final_row(mut self, enabled: bool) -> Self {
        self.split_cells_in_final_row = enabled;
        self
    }

    pub fn repeat_header(mut self, enabled: bool) -> Self {
        self.repeat_header = enabled;
        self
    }

    pub fn row_colors(mut self, colors: Vec<Color>) -> Self {
        self.row_colors = colors;
        self
    }

    pub fn tolerance(mut self, tolerance: Pt) -> Self {
        self.tolerance = tolerance;
        self
    }

    /// Banding color for a body row `index` rows below the page's first body
    /// row.
    pub(crate) fn band_color(&self, index: usize) -> Option<Color> {
        if self.row_colors.is_empty() {
            return None;
        }
        self.row_colors.get(index % self.row_colors.len()).copied()
    }
}
