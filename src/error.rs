use crate::types::Pt;

/// Hard failures. These only occur while building the inputs of a layout
/// (grid, options, fonts, page geometry); pagination itself cannot fail.
#[derive(Debug, thiserror::Error)]
pub enum LayoutError {
    #[error("invalid table grid: {0}")]
    InvalidGrid(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("font error: {0}")]
    Font(String),

    #[error("options json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Conditions the planner recovers from locally. They are collected in the
/// pagination report and logged, never returned as errors.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum LayoutWarning {
    #[error("row {row} overflows the page but holds content that cannot be split; moved whole")]
    UnsplittableRowOverflow { row: usize },

    #[error("row {row} has no room for a single line; moved whole")]
    ZeroHeightBudget { row: usize },

    #[error(
        "cell {row}/{column} still needs {required} after reconciliation but only {available} is available"
    )]
    InconsistentSpanGeometry {
        row: usize,
        column: usize,
        required: Pt,
        available: Pt,
    },

    #[error("row {row} needs {required} at the top of a page with {available} available; printed with overflow")]
    RowExceedsPage {
        row: usize,
        required: Pt,
        available: Pt,
    },
}

impl LayoutWarning {
    pub fn code(&self) -> &'static str {
        match self {
            LayoutWarning::UnsplittableRowOverflow { .. } => "UNSPLITTABLE_ROW_OVERFLOW",
            LayoutWarning::ZeroHeightBudget { .. } => "ZERO_HEIGHT_BUDGET",
            LayoutWarning::InconsistentSpanGeometry { .. } => "INCONSISTENT_SPAN_GEOMETRY",
            LayoutWarning::RowExceedsPage { .. } => "ROW_EXCEEDS_PAGE",
        }
    }

    pub fn row(&self) -> usize {
        match self {
            LayoutWarning::UnsplittableRowOverflow { row }
            | LayoutWarning::ZeroHeightBudget { row }
            | LayoutWarning::InconsistentSpanGeometry { row, .. }
            | LayoutWarning::RowExceedsPage { row, .. } => *row,
        }
    }
}
