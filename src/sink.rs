use crate::cell::Cell;
use crate::measure::TextMeasurer;
use crate::types::{Color, Pt};
use std::time::Instant;

/// A cell snapshot positioned on a page. `y` is the page coordinate of the
/// cell's top edge; `fill` is the background after banding was applied.
#[derive(Debug, Clone, PartialEq)]
pub struct PlacedCell {
    pub cell: Cell,
    pub x: Pt,
    pub y: Pt,
    pub page: usize,
    pub fill: Option<Color>,
    /// Set when the cell's content carries on to the next page.
    pub continued: bool,
}

impl PlacedCell {
    pub fn bottom(&self) -> Pt {
        self.y + self.cell.height
    }
}

/// Draws positioned cells. The renderer is also the measurer the splitter
/// consults, so measured lines and drawn lines agree.
pub trait Renderer: TextMeasurer {
    fn draw_cell(&mut self, cell: &PlacedCell);

    /// Closes the current page.
    fn finish_page(&mut self);
}

/// Page creation and cursor primitives of the host document.
pub trait PageManager {
    /// Cursor position on the current page.
    fn current_y_origin(&self) -> Pt;

    /// Lowest y content may reach on the current page.
    fn usable_bottom(&self) -> Pt;

    /// Opens a page and returns the y of its first usable line.
    fn start_new_page(&mut self) -> Pt;

    fn is_at_top_of_page(&self) -> bool;

    fn move_cursor_to(&mut self, y: Pt);
}

/// Supplies the rows re-stamped at the top of every continuation page, with
/// `y` relative to the header's own top edge.
pub trait HeaderProvider {
    fn header_rows(&self) -> Vec<Cell>;
}

#[derive(Debug, Clone, Default)]
pub struct RepeatedHeader {
    cells: Vec<Cell>,
}

impl RepeatedHeader {
    pub fn new(mut cells: Vec<Cell>) -> Self {
        let top = cells.iter().map(Cell::y).fold(None, |acc: Option<Pt>, y| {
            Some(acc.map_or(y, |a| a.min(y)))
        });
        if let Some(top) = top {
            for cell in &mut cells {
                cell.y -= top;
            }
        }
        Self { cells }
    }
}

impl HeaderProvider for RepeatedHeader {
    fn header_rows(&self) -> Vec<Cell> {
        self.cells.clone()
    }
}

/// Result of handing one page to the renderer.
#[derive(Debug, Clone, Copy)]
pub struct FlushOutcome {
    pub cells_drawn: usize,
    pub continued: usize,
    pub render_ms: f64,
    /// First free y on the new page, below any re-stamped header.
    pub next_top: Option<Pt>,
}

/// Buffers the cells of the page being built. Pages are numbered from 1.
pub struct PageSink {
    buffer: Vec<PlacedCell>,
    header: Option<Box<dyn HeaderProvider>>,
    header_left: Pt,
    page: usize,
}

impl std::fmt::Debug for PageSink {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PageSink")
            .field("buffered", &self.buffer.len())
            .field("header", &self.header.is_some())
            .field("page", &self.page)
            .finish()
    }
}

impl Default for PageSink {
    fn default() -> Self {
        Self::new()
    }
}

impl PageSink {
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            header: None,
            header_left: Pt::ZERO,
            page: 1,
        }
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    /// Starts re-stamping `header` on every page opened from now on, shifted
    /// right by `left`.
    pub fn arm_header(&mut self, header: impl HeaderProvider + 'static, left: Pt) {
        self.header = Some(Box::new(header));
        self.header_left = left;
    }

    pub fn collect(&mut self, cell: Cell, x: Pt, y: Pt, fill: Option<Color>, continued: bool) {
        self.buffer.push(PlacedCell {
            cell,
            x,
            y,
            page: self.page,
            fill,
            continued,
        });
    }

    /// Draws the buffered cells (placeholders are skipped). With `advance`
    /// the renderer page is closed, a new page is opened and the header is
    /// re-stamped on it. An empty buffer draws nothing but still advances.
    pub fn flush<R, P>(&mut self, renderer: &mut R, pages: &mut P, advance: bool) -> FlushOutcome
    where
        R: Renderer + ?Sized,
        P: PageManager + ?Sized,
    {
        let started = Instant::now();
        let mut cells_drawn = 0usize;
        let mut continued = 0usize;
        for placed in self.buffer.drain(..) {
            if placed.cell.is_placeholder() {
                continue;
            }
            if placed.continued {
                continued += 1;
            }
            renderer.draw_cell(&placed);
            cells_drawn += 1;
        }
        let render_ms = started.elapsed().as_secs_f64() * 1000.0;

        if !advance {
            return FlushOutcome {
                cells_drawn,
                continued,
                render_ms,
                next_top: None,
            };
        }

        renderer.finish_page();
        let top = pages.start_new_page();
        self.page += 1;
        let mut next_top = top;
        if let Some(header) = &self.header {
            for cell in header.header_rows() {
                let placed = PlacedCell {
                    x: self.header_left + cell.x,
                    y: top + cell.y,
                    page: self.page,
                    fill: cell.background,
                    continued: false,
                    cell,
                };
                next_top = next_top.max(placed.bottom());
                if !placed.cell.is_placeholder() {
                    renderer.draw_cell(&placed);
                }
            }
        }
        FlushOutcome {
            cells_drawn,
            continued,
            render_ms,
            next_top: Some(next_top),
        }
    }
}
