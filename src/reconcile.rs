use crate::cell::{Cell, CellId};
use crate::error::LayoutWarning;
use crate::measure::TextMeasurer;
use crate::split::{SplitResult, split};
use crate::table::Table;
use crate::types::Pt;

/// A cell whose split is decided but not yet committed to the table.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingSplit {
    pub cell: CellId,
    pub row: usize,
    pub last_row: usize,
    pub column: usize,
    pub budget: Pt,
    pub result: SplitResult,
}

impl PendingSplit {
    pub fn new(cell: &Cell, id: CellId, budget: Pt, result: SplitResult) -> Self {
        Self {
            cell: id,
            row: cell.row(),
            last_row: cell.last_row(),
            column: cell.column(),
            budget,
            result,
        }
    }

    /// A cell whose top lies below the page bottom: nothing is placed and the
    /// whole content continues.
    pub fn untouched(cell: &Cell, id: CellId) -> Self {
        let content = cell.text().unwrap_or_default().to_string();
        Self::new(
            cell,
            id,
            Pt::ZERO,
            SplitResult {
                visible: String::new(),
                continuation: content,
                consumed: Pt::ZERO,
                lines_placed: 0,
            },
        )
    }

    fn spans_rows(&self) -> bool {
        self.last_row > self.row
    }
}

/// Splits pending for the row range `first_row..=last_row`, in row-major
/// order. `room` is the height between the range's top and the page bottom;
/// rows up to `placed_through` land on the current page.
#[derive(Debug, Clone)]
pub struct PendingSplitSet {
    entries: Vec<PendingSplit>,
    first_row: usize,
    last_row: usize,
    placed_through: usize,
    room: Pt,
}

impl PendingSplitSet {
    pub fn new(first_row: usize, last_row: usize, room: Pt) -> Self {
        Self {
            entries: Vec::new(),
            first_row,
            last_row: last_row.max(first_row),
            placed_through: first_row,
            room,
        }
    }

    /// Entries anchored outside the range are ignored.
    pub fn push(&mut self, entry: PendingSplit) {
        if (self.first_row..=self.last_row).contains(&entry.row) {
            self.entries.push(entry);
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingSplit> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn first_row(&self) -> usize {
        self.first_row
    }

    pub fn last_row(&self) -> usize {
        self.last_row
    }

    pub fn room(&self) -> Pt {
        self.room
    }

    /// Marks the rows up to `row` as landing on the current page.
    pub fn place_through(&mut self, row: usize) {
        self.placed_through = row.clamp(self.first_row, self.last_row);
    }

    pub fn placed_through(&self) -> usize {
        self.placed_through
    }

    /// True when at least one line of content was placed somewhere.
    pub fn made_progress(&self) -> bool {
        self.entries.iter().any(|entry| entry.result.lines_placed > 0)
    }

    /// True when `row` keeps the rows after it off this page: one of its own
    /// cells continues, or a span starting there could not begin.
    pub fn blocks_after(&self, row: usize) -> bool {
        self.entries.iter().filter(|entry| entry.row == row).any(|entry| {
            !entry.result.is_complete() && (!entry.spans_rows() || entry.result.placed_nothing())
        })
    }

    /// True when a cell of `row` that ends there still has content left.
    pub fn row_continues(&self, row: usize) -> bool {
        self.entries
            .iter()
            .any(|entry| entry.row == row && !entry.spans_rows() && !entry.result.is_complete())
    }

    /// Height left for `row` below the rows settled above it.
    pub fn budget_for(&self, row: usize) -> Pt {
        if row <= self.first_row {
            return self.room;
        }
        let above: Pt = self.settle(row - 1, false).into_iter().sum();
        self.room - above
    }

    /// Height each row of the range takes on the current page; rows after
    /// `placed_through` take none. A span claims only what the rows it
    /// covers on this page do not already provide, and that remainder goes
    /// to the last of those rows.
    pub fn visible_heights(&self) -> Vec<Pt> {
        let mut heights = self.settle(self.placed_through, true);
        heights.resize(self.last_row - self.first_row + 1, Pt::ZERO);
        heights
    }

    /// Heights of `first_row..=through`. Spans ending after `through` are
    /// left out unless `charge_open` folds them into `through`.
    fn settle(&self, through: usize, charge_open: bool) -> Vec<Pt> {
        let through = through.clamp(self.first_row, self.last_row);
        let mut heights = vec![Pt::ZERO; through - self.first_row + 1];
        let settled = self.entries.iter().filter(|entry| entry.row <= through);
        for entry in settled.clone().filter(|entry| !entry.spans_rows()) {
            let slot = &mut heights[entry.row - self.first_row];
            *slot = (*slot).max(entry.result.consumed);
        }

        let mut spans: Vec<(usize, &PendingSplit)> = settled
            .filter(|entry| entry.spans_rows())
            .filter_map(|entry| match entry.last_row {
                end if end <= through => Some((end, entry)),
                _ if charge_open => Some((through, entry)),
                _ => None,
            })
            .collect();
        spans.sort_by_key(|(end, _)| *end);
        for (end, entry) in spans {
            let rows = entry.row - self.first_row..=end - self.first_row;
            let space: Pt = heights[rows].iter().sum();
            if space < entry.result.consumed {
                heights[end - self.first_row] += entry.result.consumed - space;
            }
        }
        heights
    }

    /// Entries whose visible part reaches below the page bottom.
    fn overflowing(&self, heights: &[Pt], tolerance: Pt) -> Vec<usize> {
        self.entries
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                let top = self.top_of(entry.row, heights);
                !(top + entry.result.consumed).fits_within(self.room, tolerance)
            })
            .map(|(index, _)| index)
            .collect()
    }

    fn top_of(&self, row: usize, heights: &[Pt]) -> Pt {
        let above = row.saturating_sub(self.first_row).min(heights.len());
        heights[..above].iter().sum()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Reconciliation {
    pub first_row: usize,
    pub last_row: usize,
    pub resplit: usize,
    pub warnings: Vec<LayoutWarning>,
}

/// Re-derives the row heights of a pending set once the page break inside
/// it is known. Spans straddling the break are charged against the rows that
/// stay on this page. Entries that would then reach below the page bottom
/// are split again, row by row, from the table's unmodified content with the
/// room left at their row's top; whatever still overflows is reported.
/// Returns `None` when no span straddles the break and everything fits.
pub fn reconcile<M: TextMeasurer + ?Sized>(
    set: &mut PendingSplitSet,
    table: &Table,
    measurer: &M,
    tolerance: Pt,
) -> Option<Reconciliation> {
    let placed_through = set.placed_through;
    let straddling = set
        .entries
        .iter()
        .filter(|entry| entry.spans_rows() && entry.last_row > placed_through)
        .map(|entry| entry.row)
        .min();
    let over = set.overflowing(&set.visible_heights(), tolerance);
    if over.is_empty() {
        return straddling.map(|first_row| Reconciliation {
            first_row,
            last_row: placed_through,
            ..Reconciliation::default()
        });
    }

    let first_row = over.iter().map(|&index| set.entries[index].row).min()?;
    let mut resplit = 0usize;
    for row in first_row..=placed_through {
        let budget = set.budget_for(row).max(Pt::ZERO);
        for index in 0..set.entries.len() {
            if set.entries[index].row != row {
                continue;
            }
            let Some(cell) = table.cell(set.entries[index].cell) else {
                continue;
            };
            if let Ok(result) = split(cell, budget, measurer, tolerance) {
                let entry = &mut set.entries[index];
                entry.budget = budget;
                entry.result = result;
                resplit += 1;
            }
        }
    }

    let heights = set.visible_heights();
    let warnings = set
        .overflowing(&heights, tolerance)
        .into_iter()
        .map(|index| {
            let entry = &set.entries[index];
            LayoutWarning::InconsistentSpanGeometry {
                row: entry.row,
                column: entry.column,
                required: entry.result.consumed,
                available: set.room - set.top_of(entry.row, &heights),
            }
        })
        .collect();

    Some(Reconciliation {
        first_row: straddling.map_or(first_row, |row| row.min(first_row)),
        last_row: placed_through,
        resplit,
        warnings,
    })
}
