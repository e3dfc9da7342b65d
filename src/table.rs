use crate::cell::{Cell, CellId, CellKind, CellSpec, SpanDirection, SpanPlaceholder};
use crate::error::LayoutError;
use crate::measure::TextMeasurer;
use crate::types::Pt;
use rayon::prelude::*;
use std::ops::{Range, RangeInclusive};

/// A fully resolved cell grid. Every slot holds either a real cell or a
/// placeholder pointing at the real cell whose span covers it, so row `r`
/// always owns the cell ids `r * columns .. (r + 1) * columns`.
///
/// Cell `y` positions live on an unbounded canvas starting at 0 for the first
/// row; the planner maps them onto pages with a per-page offset.
#[derive(Debug, Clone)]
pub struct Table {
    pub(crate) cells: Vec<Cell>,
    column_widths: Vec<Pt>,
    row_heights: Vec<Pt>,
    row_origins: Vec<Pt>,
    header_rows: usize,
}

impl Table {
    pub fn rows(&self) -> usize {
        self.row_heights.len()
    }

    pub fn columns(&self) -> usize {
        self.column_widths.len()
    }

    pub fn header_rows(&self) -> usize {
        self.header_rows
    }

    pub fn is_header_row(&self, row: usize) -> bool {
        row < self.header_rows
    }

    pub fn column_widths(&self) -> &[Pt] {
        &self.column_widths
    }

    pub fn width(&self) -> Pt {
        self.column_widths.iter().sum()
    }

    pub fn cells(&self) -> &[Cell] {
        &self.cells
    }

    pub fn cell(&self, id: CellId) -> Option<&Cell> {
        self.cells.get(id)
    }

    pub(crate) fn cell_mut(&mut self, id: CellId) -> Option<&mut Cell> {
        self.cells.get_mut(id)
    }

    pub fn cell_at(&self, row: usize, column: usize) -> Option<&Cell> {
        if column >= self.columns() {
            return None;
        }
        self.cells.get(row * self.columns() + column)
    }

    /// Ids of every slot in the row, placeholders included.
    pub fn cells_in_row(&self, row: usize) -> Range<CellId> {
        let start = (row * self.columns()).min(self.cells.len());
        let end = ((row + 1) * self.columns()).min(self.cells.len());
        start..end
    }

    pub fn row_cells(&self, row: usize) -> &[Cell] {
        &self.cells[self.cells_in_row(row)]
    }

    /// Real cells whose top-left slot lies in `row`.
    pub(crate) fn anchored_ids(&self, row: usize) -> Vec<CellId> {
        self.cells_in_row(row)
            .filter(|id| !self.cells[*id].is_placeholder())
            .collect()
    }

    /// Real cells anchored above `row` whose span reaches into it.
    pub(crate) fn straddling_owner_ids(&self, row: usize) -> Vec<CellId> {
        let mut owners = Vec::new();
        for cell in self.row_cells(row) {
            if let CellKind::Placeholder(SpanPlaceholder {
                owner,
                direction: SpanDirection::Row,
            }) = cell.kind
            {
                if !owners.contains(&owner) {
                    owners.push(owner);
                }
            }
        }
        owners
    }

    pub fn row_height(&self, row: usize) -> Pt {
        self.row_heights.get(row).copied().unwrap_or(Pt::ZERO)
    }

    pub fn row_origin(&self, row: usize) -> Pt {
        self.row_origins.get(row).copied().unwrap_or(Pt::ZERO)
    }

    pub fn rows_height(&self, rows: RangeInclusive<usize>) -> Pt {
        let start = *rows.start();
        let end = (*rows.end()).min(self.rows().saturating_sub(1));
        if start > end || self.rows() == 0 {
            return Pt::ZERO;
        }
        self.row_heights[start..=end].iter().sum()
    }

    pub fn header_height(&self) -> Pt {
        if self.header_rows == 0 {
            return Pt::ZERO;
        }
        self.rows_height(0..=self.header_rows - 1)
    }

    pub fn header_cells(&self) -> Vec<Cell> {
        if self.header_rows == 0 {
            return Vec::new();
        }
        let end = self.cells_in_row(self.header_rows - 1).end;
        self.cells[..end].to_vec()
    }

    /// The tallest thing anchored at `row`: its track height or any span
    /// starting there.
    pub fn row_extent(&self, row: usize) -> Pt {
        self.row_cells(row)
            .iter()
            .filter(|cell| !cell.is_placeholder() && !cell.is_finished())
            .fold(self.row_height(row), |acc, cell| acc.max(cell.height))
    }

    /// Last row reached by any span anchored at `row`.
    pub fn span_end(&self, row: usize) -> usize {
        self.row_cells(row)
            .iter()
            .filter(|cell| !cell.is_placeholder())
            .map(Cell::last_row)
            .fold(row, usize::max)
    }

    /// True when every real cell anchored in the row, and every owner
    /// reaching into it, holds plain text.
    pub fn row_is_splittable(&self, row: usize) -> bool {
        self.row_cells(row).iter().all(|cell| match cell.owner() {
            Some(owner) => self.cells.get(owner).is_some_and(Cell::is_splittable),
            None => cell.is_splittable(),
        })
    }

    /// Part of a cell's content height not covered by the other rows it spans.
    pub(crate) fn residual_demand(&self, cell: &Cell, content_height: Pt) -> Pt {
        if !cell.spans_rows() {
            return content_height;
        }
        let others = self.rows_height(cell.row + 1..=cell.last_row());
        (content_height - others).max(Pt::ZERO)
    }

    /// Re-derives the row's height from the cells anchored in it, stores it,
    /// and re-stretches every cell whose box covers the row.
    pub fn recalculate_row_height(&mut self, row: usize) -> Pt {
        let mut height = Pt::ZERO;
        for id in self.anchored_ids(row) {
            let cell = &self.cells[id];
            height = height.max(self.residual_demand(cell, cell.content_height));
        }
        if let Some(slot) = self.row_heights.get_mut(row) {
            *slot = height;
        }
        for id in self.anchored_ids(row) {
            self.stretch_cell(id);
        }
        for owner in self.straddling_owner_ids(row) {
            self.stretch_cell(owner);
        }
        for id in self.cells_in_row(row) {
            if self.cells[id].is_placeholder() {
                self.cells[id].height = height;
            }
        }
        height
    }

    fn stretch_cell(&mut self, id: CellId) {
        let Some(cell) = self.cells.get(id) else {
            return;
        };
        let height = self.rows_height(cell.row..=cell.last_row());
        self.cells[id].height = height;
    }

    pub(crate) fn set_row_height(&mut self, row: usize, height: Pt) {
        if let Some(slot) = self.row_heights.get_mut(row) {
            *slot = height;
        }
    }

    /// Brings every cell covering `row` back to the sum of its rows.
    pub(crate) fn restretch_row(&mut self, row: usize) {
        let height = self.row_height(row);
        for id in self.cells_in_row(row) {
            if self.cells[id].is_placeholder() {
                self.cells[id].height = height;
            } else {
                self.stretch_cell(id);
            }
        }
        for owner in self.straddling_owner_ids(row) {
            self.stretch_cell(owner);
        }
    }

    /// Re-derives the origin of every row after `row` from the heights above
    /// it, moving rows up when those heights shrank.
    pub(crate) fn reflow_origins(&mut self, row: usize) {
        for next in row + 1..self.rows() {
            let expected = self.row_origins[next - 1] + self.row_heights[next - 1];
            let delta = self.row_origins[next] - expected;
            if delta != Pt::ZERO {
                self.reduce_row_origin(next, delta);
            }
        }
    }

    /// Moves the row (and everything placed in it) up by `delta` on the
    /// canvas.
    pub fn reduce_row_origin(&mut self, row: usize, delta: Pt) {
        let Some(origin) = self.row_origins.get_mut(row) else {
            return;
        };
        *origin -= delta;
        for id in self.cells_in_row(row) {
            self.cells[id].y -= delta;
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Slot {
    Real(usize),
    Covered { row: usize, column: usize },
}

/// Collects rows of `CellSpec`s (HTML style: slots covered by an earlier span
/// are skipped automatically) and resolves them into a `Table`.
#[derive(Debug, Clone)]
pub struct TableBuilder {
    column_widths: Vec<Pt>,
    rows: Vec<Vec<CellSpec>>,
    header_rows: usize,
}

impl TableBuilder {
    pub fn new(column_widths: Vec<Pt>) -> Self {
        Self {
            column_widths,
            rows: Vec::new(),
            header_rows: 0,
        }
    }

    pub fn row(mut self, cells: Vec<CellSpec>) -> Self {
        self.rows.push(cells);
        self
    }

    pub fn rows(mut self, rows: impl IntoIterator<Item = Vec<CellSpec>>) -> Self {
        self.rows.extend(rows);
        self
    }

    pub fn header_rows(mut self, count: usize) -> Self {
        self.header_rows = count;
        self
    }

    /// Validates the grid, measures every real cell (in parallel) and
    /// derives nominal row heights and canvas positions.
    pub fn build<M>(self, measurer: &M) -> Result<Table, LayoutError>
    where
        M: TextMeasurer + Sync + ?Sized,
    {
        let columns = self.column_widths.len();
        let row_count = self.rows.len();
        if columns == 0 {
            return Err(LayoutError::InvalidGrid("table has no columns".to_string()));
        }
        if self.column_widths.iter().any(|width| *width < Pt::ZERO) {
            return Err(LayoutError::InvalidGrid(
                "column widths must not be negative".to_string(),
            ));
        }
        if self.header_rows > row_count {
            return Err(LayoutError::InvalidGrid(format!(
                "{} header rows requested but the table has {} rows",
                self.header_rows, row_count
            )));
        }

        let specs: Vec<(usize, usize, CellSpec)> = self
            .rows
            .into_iter()
            .enumerate()
            .flat_map(|(row, cells)| cells.into_iter().map(move |spec| (row, spec)))
            .enumerate()
            .map(|(index, (row, spec))| (index, row, spec))
            .collect();
        let grid = resolve_slots(&specs, row_count, columns)?;

        let mut offsets = Vec::with_capacity(columns + 1);
        let mut acc = Pt::ZERO;
        offsets.push(acc);
        for width in &self.column_widths {
            acc += *width;
            offsets.push(acc);
        }

        let mut specs: Vec<Option<CellSpec>> = specs.into_iter().map(|(_, _, s)| Some(s)).collect();
        let mut cells: Vec<Cell> = Vec::with_capacity(row_count * columns);
        for (row, slots) in grid.iter().enumerate() {
            for (column, slot) in slots.iter().enumerate() {
                let cell = match *slot {
                    Slot::Real(index) => {
                        let Some(spec) = specs.get_mut(index).and_then(Option::take) else {
                            return Err(LayoutError::InvalidGrid(format!(
                                "cell {row}/{column} resolved twice"
                            )));
                        };
                        let end = column + spec.col_span;
                        Cell {
                            row,
                            column,
                            row_span: spec.row_span,
                            col_span: spec.col_span,
                            kind: spec.kind,
                            x: offsets[column],
                            y: Pt::ZERO,
                            width: offsets[end] - offsets[column],
                            height: Pt::ZERO,
                            content_height: Pt::ZERO,
                            min_height: spec.min_height,
                            padding: spec.padding,
                            background: spec.background,
                            finished: false,
                        }
                    }
                    Slot::Covered {
                        row: owner_row,
                        column: owner_column,
                    } => Cell {
                        row,
                        column,
                        row_span: 1,
                        col_span: 1,
                        kind: CellKind::Placeholder(SpanPlaceholder {
                            owner: owner_row * columns + owner_column,
                            direction: if owner_row == row {
                                SpanDirection::Column
                            } else {
                                SpanDirection::Row
                            },
                        }),
                        x: offsets[column],
                        y: Pt::ZERO,
                        width: offsets[column + 1] - offsets[column],
                        height: Pt::ZERO,
                        content_height: Pt::ZERO,
                        min_height: Pt::ZERO,
                        padding: Default::default(),
                        background: None,
                        finished: false,
                    },
                };
                cells.push(cell);
            }
        }

        let heights: Vec<Pt> = cells
            .par_iter()
            .map(|cell| cell.measure_content_height(measurer))
            .collect();
        for (cell, height) in cells.iter_mut().zip(heights) {
            cell.content_height = height;
        }

        let mut table = Table {
            cells,
            column_widths: self.column_widths,
            row_heights: vec![Pt::ZERO; row_count],
            row_origins: vec![Pt::ZERO; row_count],
            header_rows: self.header_rows,
        };
        table.derive_geometry();
        Ok(table)
    }
}

fn resolve_slots(
    specs: &[(usize, usize, CellSpec)],
    row_count: usize,
    columns: usize,
) -> Result<Vec<Vec<Slot>>, LayoutError> {
    let mut grid: Vec<Vec<Option<Slot>>> = vec![vec![None; columns]; row_count];
    let mut cursor = vec![0usize; row_count];
    for (index, row, spec) in specs {
        let (index, row) = (*index, *row);
        let mut column = cursor[row];
        while column < columns && grid[row][column].is_some() {
            column += 1;
        }
        if column + spec.col_span > columns {
            return Err(LayoutError::InvalidGrid(format!(
                "row {row} does not have room for a cell spanning {} columns at column {column}",
                spec.col_span
            )));
        }
        if row + spec.row_span > row_count {
            return Err(LayoutError::InvalidGrid(format!(
                "cell {row}/{column} spans {} rows past the end of the table",
                spec.row_span
            )));
        }
        for r in row..row + spec.row_span {
            for c in column..column + spec.col_span {
                if grid[r][c].is_some() {
                    return Err(LayoutError::InvalidGrid(format!(
                        "cell {row}/{column} overlaps slot {r}/{c}"
                    )));
                }
                grid[r][c] = Some(if r == row && c == column {
                    Slot::Real(index)
                } else {
                    Slot::Covered { row, column }
                });
            }
        }
        cursor[row] = column + spec.col_span;
    }

    grid.into_iter()
        .enumerate()
        .map(|(row, slots)| {
            slots
                .into_iter()
                .enumerate()
                .map(|(column, slot)| {
                    slot.ok_or_else(|| {
                        LayoutError::InvalidGrid(format!("slot {row}/{column} is empty"))
                    })
                })
                .collect()
        })
        .collect()
}

impl Table {
    /// Nominal geometry: rows are sized bottom-up so that a span's deficit is
    /// charged to its anchor row, then origins are accumulated top-down.
    fn derive_geometry(&mut self) {
        for row in (0..self.rows()).rev() {
            let mut height = Pt::ZERO;
            for id in self.anchored_ids(row) {
                let cell = &self.cells[id];
                height = height.max(self.residual_demand(cell, cell.content_height));
            }
            self.row_heights[row] = height;
        }

        let mut origin = Pt::ZERO;
        for row in 0..self.rows() {
            self.row_origins[row] = origin;
            origin += self.row_heights[row];
        }

        for id in 0..self.cells.len() {
            let (row, last_row, placeholder) = {
                let cell = &self.cells[id];
                (cell.row, cell.last_row(), cell.is_placeholder())
            };
            let height = if placeholder {
                self.row_heights[row]
            } else {
                self.rows_height(row..=last_row)
            };
            let cell = &mut self.cells[id];
            cell.y = self.row_origins[row];
            cell.height = height;
        }
    }
}
