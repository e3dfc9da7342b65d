use crate::cell::{Cell, CellKind};
use crate::measure::TextMeasurer;
use crate::types::Pt;

/// Outcome of splitting one cell at a height budget. `visible` followed by
/// `continuation` is exactly the content the cell held before the split.
#[derive(Debug, Clone, PartialEq)]
pub struct SplitResult {
    pub visible: String,
    pub continuation: String,
    /// Height of the visible part, padding included. Zero when no line fit.
    pub consumed: Pt,
    pub lines_placed: usize,
}

impl SplitResult {
    /// True when the budget did not hold a single line of non-empty content.
    pub fn placed_nothing(&self) -> bool {
        self.lines_placed == 0 && !self.continuation.is_empty()
    }

    pub fn is_complete(&self) -> bool {
        self.continuation.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum SplitRefusal {
    #[error("cell {row}/{column} does not hold plain text")]
    NotSplittable { row: usize, column: usize },
}

/// Splits a plain-text cell so that the visible part, padding included, fits
/// in `available`.
pub fn split<M: TextMeasurer + ?Sized>(
    cell: &Cell,
    available: Pt,
    measurer: &M,
    tolerance: Pt,
) -> Result<SplitResult, SplitRefusal> {
    let text = match &cell.kind {
        CellKind::Text(text) if cell.is_splittable() => text,
        _ => {
            return Err(SplitRefusal::NotSplittable {
                row: cell.row,
                column: cell.column,
            });
        }
    };
    let padding = cell.padding.vertical();

    if text.content.is_empty() {
        return Ok(SplitResult {
            visible: String::new(),
            continuation: String::new(),
            consumed: padding.max(cell.min_height).min(available.max(Pt::ZERO)),
            lines_placed: 0,
        });
    }

    let lines = measurer.measure_lines(&text.content, cell.content_width(), &text.style);
    let mut used = Pt::ZERO;
    let mut fitted = 0usize;
    for line in &lines {
        let next = used + line.height;
        if !(padding + next).fits_within(available, tolerance) {
            break;
        }
        used = next;
        fitted += 1;
    }

    if fitted == 0 {
        return Ok(SplitResult {
            visible: String::new(),
            continuation: text.content.clone(),
            consumed: Pt::ZERO,
            lines_placed: 0,
        });
    }

    let (cut, consumed) = if fitted == lines.len() {
        let full = (padding + used).max(cell.min_height.min(available));
        (text.content.len(), full)
    } else {
        (lines[fitted - 1].range.end, padding + used)
    };
    Ok(SplitResult {
        visible: text.content[..cut].to_string(),
        continuation: text.content[cut..].to_string(),
        consumed,
        lines_placed: fitted,
    })
}

/// Space the first line of a cell needs, padding included. Cells that cannot
/// be split need their full content height.
pub fn opening_height<M: TextMeasurer + ?Sized>(cell: &Cell, measurer: &M) -> Pt {
    match &cell.kind {
        CellKind::Text(text) if cell.is_splittable() => measurer
            .measure_lines(&text.content, cell.content_width(), &text.style)
            .first()
            .map(|line| line.height + cell.padding.vertical())
            .unwrap_or_else(|| cell.padding.vertical()),
        CellKind::Placeholder(_) => Pt::ZERO,
        _ => cell.content_height,
    }
}
