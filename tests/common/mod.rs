#![allow(dead_code)]

use tablesplit::{
    CellSpec, MonospaceMeasurer, PageManager, PlacedCell, Pt, Renderer, TextMeasurer, TextStyle,
};

/// Renderer that keeps every placed cell.
#[derive(Default)]
pub struct Recorder {
    pub placed: Vec<PlacedCell>,
    pub finished_pages: usize,
}

impl Recorder {
    pub fn on_page(&self, page: usize) -> Vec<&PlacedCell> {
        self.placed.iter().filter(|cell| cell.page == page).collect()
    }

    pub fn texts_on_page(&self, page: usize) -> Vec<String> {
        self.on_page(page)
            .into_iter()
            .filter_map(|cell| cell.cell.text().map(str::to_string))
            .collect()
    }

    pub fn last_page(&self) -> usize {
        self.placed.iter().map(|cell| cell.page).max().unwrap_or(0)
    }
}

impl TextMeasurer for Recorder {
    fn text_width(&self, text: &str, style: &TextStyle) -> Pt {
        MonospaceMeasurer::new().text_width(text, style)
    }
}

impl Renderer for Recorder {
    fn draw_cell(&mut self, cell: &PlacedCell) {
        self.placed.push(cell.clone());
    }

    fn finish_page(&mut self) {
        self.finished_pages += 1;
    }
}

/// Pages whose usable area runs from y = 0 to a per-page bottom; the last
/// bottom repeats.
pub struct ScriptedPages {
    bottoms: Vec<Pt>,
    page: usize,
    cursor: Pt,
    pub opened: usize,
}

impl ScriptedPages {
    pub fn new(bottoms: &[i32]) -> Self {
        Self {
            bottoms: bottoms.iter().map(|b| Pt::from_i32(*b)).collect(),
            page: 0,
            cursor: Pt::ZERO,
            opened: 0,
        }
    }

    pub fn uniform(bottom: i32) -> Self {
        Self::new(&[bottom])
    }

    pub fn starting_at(mut self, y: i32) -> Self {
        self.cursor = Pt::from_i32(y);
        self
    }

    pub fn cursor(&self) -> Pt {
        self.cursor
    }
}

impl PageManager for ScriptedPages {
    fn current_y_origin(&self) -> Pt {
        self.cursor
    }

    fn usable_bottom(&self) -> Pt {
        let index = self.page.min(self.bottoms.len().saturating_sub(1));
        self.bottoms.get(index).copied().unwrap_or(Pt::ZERO)
    }

    fn start_new_page(&mut self) -> Pt {
        self.page += 1;
        self.opened += 1;
        self.cursor = Pt::ZERO;
        self.cursor
    }

    fn is_at_top_of_page(&self) -> bool {
        self.cursor <= Pt::ZERO
    }

    fn move_cursor_to(&mut self, y: Pt) {
        self.cursor = y;
    }
}

pub fn style() -> TextStyle {
    TextStyle::sized(10.0, 10.0)
}

/// A text cell of `count` 10pt lines: `{prefix}0`, `{prefix}1`, ...
pub fn lines(prefix: &str, count: usize) -> CellSpec {
    lines_of(prefix, count, 10.0)
}

pub fn lines_of(prefix: &str, count: usize, line_height: f32) -> CellSpec {
    let text = (0..count)
        .map(|i| format!("{prefix}{i}"))
        .collect::<Vec<_>>()
        .join("\n");
    CellSpec::text(text).style(TextStyle::sized(10.0, line_height))
}
