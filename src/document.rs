use crate::canvas::{Canvas, Document};
use crate::debug::DebugLogger;
use crate::error::LayoutError;
use crate::frame::PageFrame;
use crate::measure::TextMeasurer;
use crate::options::SplitOptions;
use crate::planner::{PaginationReport, Paginator};
use crate::table::Table;
use crate::types::{Margins, Pt, Size};

/// One-call driver: lays a table out on fresh pages of a fixed size and
/// records the result.
#[derive(Debug, Clone)]
pub struct TableDocument {
    page_size: Size,
    margins: Margins,
    options: SplitOptions,
    debug: Option<DebugLogger>,
    /// Content drawn by the host above the table on the first page.
    lead_in: Pt,
}

impl TableDocument {
    pub fn new(page_size: Size, margins: Margins) -> Self {
        Self {
            page_size,
            margins,
            options: SplitOptions::default(),
            debug: None,
            lead_in: Pt::ZERO,
        }
    }

    pub fn with_options(mut self, options: SplitOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_debug(mut self, debug: DebugLogger) -> Self {
        self.debug = Some(debug);
        self
    }

    /// Starts the table `height` below the top of the first page.
    pub fn with_lead_in(mut self, height: Pt) -> Self {
        self.lead_in = height.max(Pt::ZERO);
        self
    }

    pub fn build<M: TextMeasurer>(
        &self,
        table: Table,
        measurer: M,
    ) -> Result<(Document, PaginationReport), LayoutError> {
        self.options.validate()?;
        let mut frame = PageFrame::new(self.page_size, self.margins);
        let content = frame.rect();
        if !content.width.is_positive() || !content.height.is_positive() {
            return Err(LayoutError::InvalidConfiguration(format!(
                "margins leave no content area on a {}x{} page",
                self.page_size.width, self.page_size.height
            )));
        }
        if self.lead_in > Pt::ZERO {
            frame.advance(self.lead_in);
        }

        let mut canvas = Canvas::new(self.page_size, measurer);
        let mut paginator = Paginator::new(table, self.options.clone()).with_left(content.x);
        if let Some(debug) = &self.debug {
            paginator = paginator.with_logger(debug.clone());
        }
        let laid_out = paginator.paginate(&mut canvas, &mut frame);
        Ok((canvas.finish(), laid_out.into_report()))
    }
}
