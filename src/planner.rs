use crate::cell::CellId;
use crate::debug::DebugLogger;
use crate::error::LayoutWarning;
use crate::metrics::{LayoutMetrics, PageMetrics};
use crate::options::SplitOptions;
use crate::reconcile::{PendingSplit, PendingSplitSet, reconcile};
use crate::sink::{FlushOutcome, PageManager, PageSink, Renderer, RepeatedHeader};
use crate::split::{opening_height, split};
use crate::table::Table;
use crate::types::Pt;
use serde::Serialize;
use tracing::{debug, warn};

/// Where the planner stands on the current page. `offset` maps canvas y to
/// page y: `page_y = canvas_y + offset`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub(crate) struct PaginationContext {
    offset: Pt,
    page_bottom: Pt,
    at_top: bool,
    /// First body row placed on the current page; banding counts from here.
    started_new_page_at_row: usize,
    page_number: usize,
    /// Lowest edge drawn on the current page.
    cursor: Pt,
}

impl PaginationContext {
    fn page_y(&self, canvas_y: Pt) -> Pt {
        canvas_y + self.offset
    }

    fn available_below(&self, canvas_y: Pt) -> Pt {
        self.page_bottom - self.page_y(canvas_y)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PaginationReport {
    /// Pages that received table content.
    pub pages: usize,
    pub warnings: Vec<LayoutWarning>,
    pub metrics: LayoutMetrics,
}

/// The table after layout: cells hold what was drawn on the last page they
/// appeared on.
#[derive(Debug, Clone)]
pub struct LaidOutTable {
    table: Table,
    report: PaginationReport,
}

impl LaidOutTable {
    pub fn table(&self) -> &Table {
        &self.table
    }

    pub fn report(&self) -> &PaginationReport {
        &self.report
    }

    pub fn into_report(self) -> PaginationReport {
        self.report
    }
}

#[derive(Serialize)]
#[serde(tag = "type")]
enum LayoutEvent<'a> {
    #[serde(rename = "split.page_break")]
    PageBreak {
        page: usize,
        row: usize,
        reason: &'a str,
        next_top: Pt,
    },
    #[serde(rename = "split.cell")]
    CellSplit {
        row: usize,
        column: usize,
        budget: Pt,
        consumed: Pt,
        lines: usize,
        continued: bool,
    },
    #[serde(rename = "split.reconcile")]
    Reconcile {
        first_row: usize,
        last_row: usize,
        resplit: usize,
    },
    #[serde(rename = "split.warning")]
    Warning {
        code: &'a str,
        row: usize,
        message: String,
    },
}

enum RowSplit {
    /// Every cell of the range fit once shrunk to its visible height.
    Completed { last_row: usize },
    /// Visible parts were placed, the page was flushed and continuations wait
    /// at the top of the next page.
    Continued,
    NothingFits,
}

/// Lays a table out across pages, splitting plain-text rows at the page
/// bottom when enabled.
#[derive(Debug)]
pub struct Paginator {
    table: Table,
    options: SplitOptions,
    logger: Option<DebugLogger>,
    left: Pt,
}

impl Paginator {
    pub fn new(table: Table, options: SplitOptions) -> Self {
        Self {
            table,
            options,
            logger: None,
            left: Pt::ZERO,
        }
    }

    pub fn with_logger(mut self, logger: DebugLogger) -> Self {
        self.logger = Some(logger);
        self
    }

    /// Page x of the table's left edge.
    pub fn with_left(mut self, left: Pt) -> Self {
        self.left = left;
        self
    }

    pub fn paginate<R, P>(self, renderer: &mut R, pages: &mut P) -> LaidOutTable
    where
        R: Renderer + ?Sized,
        P: PageManager + ?Sized,
    {
        let ctx = PaginationContext {
            offset: pages.current_y_origin() - self.table.row_origin(0),
            page_bottom: pages.usable_bottom(),
            at_top: pages.is_at_top_of_page(),
            started_new_page_at_row: self.table.header_rows(),
            page_number: 1,
            cursor: pages.current_y_origin(),
        };
        let run = Run {
            table: self.table,
            options: self.options,
            logger: self.logger,
            left: self.left,
            renderer,
            pages,
            sink: PageSink::new(),
            ctx,
            warnings: Vec::new(),
            metrics: LayoutMetrics::default(),
        };
        run.execute()
    }
}

struct Run<'a, R: ?Sized, P: ?Sized> {
    table: Table,
    options: SplitOptions,
    logger: Option<DebugLogger>,
    left: Pt,
    renderer: &'a mut R,
    pages: &'a mut P,
    sink: PageSink,
    ctx: PaginationContext,
    warnings: Vec<LayoutWarning>,
    metrics: LayoutMetrics,
}

impl<R, P> Run<'_, R, P>
where
    R: Renderer + ?Sized,
    P: PageManager + ?Sized,
{
    fn execute(mut self) -> LaidOutTable {
        let rows = self.table.rows();
        if rows > 0 {
            self.open();
            let mut row = 0;
            while row < rows {
                row = self.step(row);
            }
            self.close();
        }
        if let Some(logger) = &self.logger {
            logger.emit_summary("table");
            logger.flush();
        }
        self.metrics.total_render_ms = self.metrics.pages.iter().map(|page| page.render_ms).sum();
        LaidOutTable {
            table: self.table,
            report: PaginationReport {
                pages: self.metrics.pages.len(),
                warnings: self.warnings,
                metrics: self.metrics,
            },
        }
    }

    /// Starts a fresh page first when not even the header and the opening
    /// of the first body row fit below the cursor.
    fn open(&mut self) {
        if self.ctx.at_top {
            return;
        }
        let need = self.table.header_height() + self.opening_requirement();
        let available = self.ctx.available_below(self.table.row_origin(0));
        if need.fits_within(available, self.options.tolerance) {
            return;
        }
        debug!(need = %need, available = %available, "table opening does not fit, starting a new page");
        // The page being left belongs to the host, so it is not counted.
        let outcome = self.sink.flush(&mut *self.renderer, &mut *self.pages, true);
        self.enter_page(0, outcome, "opening");
    }

    fn opening_requirement(&self) -> Pt {
        let first_body = self.table.header_rows();
        if first_body >= self.table.rows() {
            return Pt::ZERO;
        }
        if self.options.split_cells_in_final_row && self.table.row_is_splittable(first_body) {
            self.table
                .row_cells(first_body)
                .iter()
                .map(|cell| opening_height(cell, &*self.renderer))
                .fold(Pt::ZERO, Pt::max)
        } else {
            self.table.row_extent(first_body)
        }
    }

    /// Handles one row and returns the next row to process; the same row is
    /// returned after a page break so it is retried on the fresh page.
    fn step(&mut self, row: usize) -> usize {
        let tolerance = self.options.tolerance;
        let available = self.ctx.available_below(self.table.row_origin(row));
        let extent = self.table.row_extent(row);
        if extent.fits_within(available, tolerance) {
            self.place_row(row);
            return row + 1;
        }

        let mut reason = None;
        if self.options.split_cells_in_final_row && !self.table.is_header_row(row) {
            let last = self.split_range_end(row);
            if (row..=last).all(|r| self.table.row_is_splittable(r)) {
                if available.is_positive() {
                    match self.split_rows(row, last) {
                        RowSplit::Completed { last_row } => return last_row + 1,
                        RowSplit::Continued => return row,
                        RowSplit::NothingFits => {
                            reason = Some(LayoutWarning::ZeroHeightBudget { row });
                        }
                    }
                }
            } else {
                reason = Some(LayoutWarning::UnsplittableRowOverflow { row });
            }
        }

        if self.ctx.at_top {
            self.warn(LayoutWarning::RowExceedsPage {
                row,
                required: extent,
                available,
            });
            self.place_row(row);
            return row + 1;
        }
        if let Some(reason) = reason {
            self.warn(reason);
        }
        self.metrics.whole_row_breaks += 1;
        self.break_page(row, "whole_row");
        row
    }

    /// Rows that must be split together with `row` because spans tie them.
    fn split_range_end(&self, row: usize) -> usize {
        let mut last = self.table.span_end(row);
        let mut next = row + 1;
        while next <= last {
            last = last.max(self.table.span_end(next));
            next += 1;
        }
        last
    }

    fn place_row(&mut self, row: usize) {
        let band = if self.table.is_header_row(row) {
            None
        } else {
            self.options
                .band_color(row.saturating_sub(self.ctx.started_new_page_at_row))
        };
        for id in self.table.cells_in_row(row) {
            let cell = &self.table.cells()[id];
            if cell.is_finished() {
                continue;
            }
            let cell = cell.clone();
            let fill = if cell.is_placeholder() {
                None
            } else {
                cell.background().or(band)
            };
            let x = self.left + cell.x();
            let y = self.ctx.page_y(cell.y());
            self.ctx.cursor = self.ctx.cursor.max(y + cell.height());
            self.sink.collect(cell, x, y, fill, false);
        }
        // rows emptied on an earlier page take no room
        if self.table.row_extent(row).is_positive() {
            self.ctx.at_top = false;
        }

        let header_rows = self.table.header_rows();
        if self.options.repeat_header && header_rows > 0 && row + 1 == header_rows {
            self.sink
                .arm_header(RepeatedHeader::new(self.table.header_cells()), self.left);
        }
    }

    /// Splits every cell of `first..=last` against the room left on the
    /// page. Rows are taken in order, each budgeted from the bottom of the
    /// rows settled above it, until a row continues or cannot start.
    fn pending_splits(&self, first: usize, last: usize) -> PendingSplitSet {
        let tolerance = self.options.tolerance;
        let room = self.ctx.available_below(self.table.row_origin(first));
        let mut set = PendingSplitSet::new(first, last, room);
        for row in first..=last {
            let budget = set.budget_for(row);
            if row > first && (!budget.is_positive() || set.blocks_after(row - 1)) {
                break;
            }
            let mut entries = Vec::new();
            for id in self.table.anchored_ids(row) {
                let cell = &self.table.cells()[id];
                if cell.is_finished() {
                    continue;
                }
                let entry = match split(cell, budget, &*self.renderer, tolerance) {
                    Ok(result) => PendingSplit::new(cell, id, budget, result),
                    Err(_) => PendingSplit::untouched(cell, id),
                };
                entries.push(entry);
            }
            let started = entries.iter().any(|entry| entry.result.lines_placed > 0)
                || entries.iter().all(|entry| entry.result.is_complete());
            if row > first && !started {
                break;
            }
            for entry in entries {
                set.push(entry);
            }
            set.place_through(row);
        }
        set
    }

    fn split_rows(&mut self, first: usize, last: usize) -> RowSplit {
        let tolerance = self.options.tolerance;
        let mut set = self.pending_splits(first, last);

        if set.made_progress() {
            if let Some(outcome) = reconcile(&mut set, &self.table, &*self.renderer, tolerance) {
                self.metrics.reconciliations += 1;
                debug!(
                    first_row = outcome.first_row,
                    last_row = outcome.last_row,
                    resplit = outcome.resplit,
                    "reconciled span splits"
                );
                self.log(&LayoutEvent::Reconcile {
                    first_row: outcome.first_row,
                    last_row: outcome.last_row,
                    resplit: outcome.resplit,
                });
                for warning in outcome.warnings {
                    self.warn(warning);
                }
            }
        }
        if !set.made_progress() {
            return RowSplit::NothingFits;
        }

        let heights = set.visible_heights();
        let last_placed = set.placed_through();
        let complete = last_placed == last && set.iter().all(|entry| entry.result.is_complete());
        self.place_split_rows(&set, &heights, last_placed);

        if complete {
            for (index, row) in (first..=last).enumerate() {
                self.table.set_row_height(row, heights[index]);
            }
            for row in first..=last {
                self.table.restretch_row(row);
            }
            self.table.reflow_origins(first);
            return RowSplit::Completed { last_row: last };
        }

        let last_row_continues = set.row_continues(last_placed);
        for entry in set.iter() {
            let continued = !entry.result.is_complete();
            if continued && entry.result.lines_placed > 0 {
                self.metrics.splits += 1;
            }
            debug!(
                row = entry.row,
                column = entry.column,
                budget = %entry.budget,
                consumed = %entry.result.consumed,
                lines = entry.result.lines_placed,
                "split cell"
            );
            self.log(&LayoutEvent::CellSplit {
                row: entry.row,
                column: entry.column,
                budget: entry.budget,
                consumed: entry.result.consumed,
                lines: entry.result.lines_placed,
                continued,
            });
            // A finished cell is kept, empty, only while its box reaches
            // rows that resume on the next page.
            let reaches_next_page = entry.last_row > last_placed
                || (entry.last_row == last_placed && last_row_continues);
            if continued || reaches_next_page {
                self.carry_over(entry.cell, entry.result.continuation.clone());
            } else if let Some(cell) = self.table.cell_mut(entry.cell) {
                cell.retire();
            }
        }
        for row in (first..=last).rev() {
            self.table.recalculate_row_height(row);
        }
        self.table.reflow_origins(first);

        self.break_page(first, "split");
        RowSplit::Continued
    }

    /// Collects the visible parts of rows `first..=last_placed` at their
    /// visible heights. Rows after `last_placed` stay whole for the next page.
    fn place_split_rows(&mut self, set: &PendingSplitSet, heights: &[Pt], last_placed: usize) {
        let first = set.first_row();
        let mut top = self.ctx.page_y(self.table.row_origin(first));
        for row in first..=last_placed {
            let band = self
                .options
                .band_color(row.saturating_sub(self.ctx.started_new_page_at_row));
            let row_height = heights[row - first];
            for id in self.table.cells_in_row(row) {
                let mut cell = self.table.cells()[id].clone();
                if cell.is_finished() {
                    continue;
                }
                let mut continued = false;
                if cell.is_placeholder() {
                    cell.height = row_height;
                } else {
                    let end = cell.last_row().min(last_placed);
                    cell.height = heights[row - first..=end - first].iter().sum();
                    if let Some(entry) = set.iter().find(|entry| entry.cell == id) {
                        cell.set_text(entry.result.visible.clone());
                        cell.content_height = entry.result.consumed;
                        continued = !entry.result.is_complete();
                    }
                }
                let fill = if cell.is_placeholder() {
                    None
                } else {
                    cell.background().or(band)
                };
                let x = self.left + cell.x();
                self.ctx.cursor = self.ctx.cursor.max(top + cell.height());
                self.sink.collect(cell, x, top, fill, continued);
            }
            top += row_height;
        }
        self.ctx.at_top = false;
    }

    /// Replaces a split cell's content with what continues on the next page.
    fn carry_over(&mut self, id: CellId, continuation: String) {
        let Some(cell) = self.table.cell_mut(id) else {
            return;
        };
        cell.set_text(continuation);
        cell.content_height = cell.measure_content_height(&*self.renderer);
    }

    fn break_page(&mut self, row: usize, reason: &str) {
        let outcome = self.sink.flush(&mut *self.renderer, &mut *self.pages, true);
        self.record_page(&outcome);
        self.enter_page(row, outcome, reason);
    }

    fn enter_page(&mut self, row: usize, outcome: FlushOutcome, reason: &str) {
        let top = outcome
            .next_top
            .unwrap_or_else(|| self.pages.current_y_origin());
        self.ctx.page_number = self.sink.page();
        self.ctx.page_bottom = self.pages.usable_bottom();
        self.ctx.offset = top - self.table.row_origin(row);
        self.ctx.at_top = true;
        self.ctx.cursor = top;
        self.ctx.started_new_page_at_row = row.max(self.table.header_rows());
        debug!(page = self.ctx.page_number, row, reason, next_top = %top, "page break");
        self.log(&LayoutEvent::PageBreak {
            page: self.ctx.page_number,
            row,
            reason,
            next_top: top,
        });
    }

    fn record_page(&mut self, outcome: &FlushOutcome) {
        self.metrics.pages.push(PageMetrics {
            page_number: self.ctx.page_number,
            render_ms: outcome.render_ms,
            cell_count: outcome.cells_drawn,
            split_cell_count: outcome.continued,
        });
    }

    fn close(&mut self) {
        let outcome = self.sink.flush(&mut *self.renderer, &mut *self.pages, false);
        self.record_page(&outcome);
        self.pages.move_cursor_to(self.ctx.cursor);
    }

    fn warn(&mut self, warning: LayoutWarning) {
        warn!(code = warning.code(), row = warning.row(), "{warning}");
        self.log(&LayoutEvent::Warning {
            code: warning.code(),
            row: warning.row(),
            message: warning.to_string(),
        });
        if let Some(logger) = &self.logger {
            logger.increment(warning.code(), 1);
        }
        self.warnings.push(warning);
    }

    fn log(&self, event: &LayoutEvent<'_>) {
        if let Some(logger) = &self.logger {
            logger.log_event(event);
            let key = match event {
                LayoutEvent::PageBreak { .. } => "split.page_break",
                LayoutEvent::CellSplit { .. } => "split.cell",
                LayoutEvent::Reconcile { .. } => "split.reconcile",
                LayoutEvent::Warning { .. } => return,
            };
            logger.increment(key, 1);
        }
    }
}
