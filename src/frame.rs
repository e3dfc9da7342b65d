use crate::sink::PageManager;
use crate::types::{Margins, Pt, Rect, Size};

/// Page geometry and a vertical cursor over the content area of the current
/// page.
#[derive(Debug, Clone)]
pub struct PageFrame {
    rect: Rect,
    cursor_y: Pt,
    page_count: usize,
}

impl PageFrame {
    pub fn new(page_size: Size, margins: Margins) -> Self {
        let rect = Rect {
            x: margins.left,
            y: margins.top,
            width: page_size.width - margins.left - margins.right,
            height: page_size.height - margins.top - margins.bottom,
        };
        Self {
            rect,
            cursor_y: rect.y,
            page_count: 1,
        }
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn remaining_height(&self) -> Pt {
        (self.rect.bottom() - self.cursor_y).max(Pt::ZERO)
    }

    /// Moves the cursor down, as if the host had drawn `height` of content.
    pub fn advance(&mut self, height: Pt) {
        self.cursor_y = (self.cursor_y + height).min(self.rect.bottom());
    }
}

impl PageManager for PageFrame {
    fn current_y_origin(&self) -> Pt {
        self.cursor_y
    }

    fn usable_bottom(&self) -> Pt {
        self.rect.bottom()
    }

    fn start_new_page(&mut self) -> Pt {
        self.page_count += 1;
        self.cursor_y = self.rect.y;
        self.cursor_y
    }

    fn is_at_top_of_page(&self) -> bool {
        self.cursor_y <= self.rect.y
    }

    fn move_cursor_to(&mut self, y: Pt) {
        self.cursor_y = y.max(self.rect.y);
    }
}
