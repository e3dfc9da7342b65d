use crate::cell::CellKind;
use crate::measure::{MeasuredLine, TextMeasurer, TextStyle};
use crate::sink::{PlacedCell, Renderer};
use crate::types::{Color, Pt, Size};

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    // Non-rendered metadata used for page-aware reporting.
    Meta {
        key: String,
        value: String,
    },
    SetFillColor(Color),
    SetStrokeColor(Color),
    SetFontName(String),
    SetFontSize(Pt),
    FillRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    StrokeRect {
        x: Pt,
        y: Pt,
        width: Pt,
        height: Pt,
    },
    /// `y` is the baseline.
    DrawString {
        x: Pt,
        y: Pt,
        text: String,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Page {
    pub commands: Vec<Command>,
}

impl Page {
    /// Strings drawn on the page, in drawing order.
    pub fn strings(&self) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::DrawString { text, .. } => Some(text.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn meta_values(&self, key: &str) -> Vec<&str> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Meta { key: k, value } if k == key => Some(value.as_str()),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone)]
pub struct Document {
    pub page_size: Size,
    pub pages: Vec<Page>,
}

impl Document {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }
}

#[derive(Debug, Clone)]
struct GraphicsState {
    fill_color: Color,
    stroke_color: Color,
    font_size: Pt,
    font_name: String,
}

impl Default for GraphicsState {
    fn default() -> Self {
        let style = TextStyle::default();
        Self {
            fill_color: Color::BLACK,
            stroke_color: Color::BLACK,
            font_size: style.font_size,
            font_name: style.font_name,
        }
    }
}

/// Recording renderer: every drawn cell becomes a list of commands on the
/// current page. Text is broken into lines with the same measurer the
/// splitter uses.
#[derive(Debug)]
pub struct Canvas<M> {
    measurer: M,
    page_size: Size,
    pages: Vec<Page>,
    current: Page,
    current_state: GraphicsState,
    border: Option<Color>,
}

impl<M: TextMeasurer> Canvas<M> {
    pub fn new(page_size: Size, measurer: M) -> Self {
        Self {
            measurer,
            page_size,
            pages: Vec::new(),
            current: Page::default(),
            current_state: GraphicsState::default(),
            border: Some(Color::BLACK),
        }
    }

    /// Cell border color; `None` draws no borders.
    pub fn with_border(mut self, border: Option<Color>) -> Self {
        self.border = border;
        self
    }

    pub fn page_size(&self) -> Size {
        self.page_size
    }

    pub fn measurer(&self) -> &M {
        &self.measurer
    }

    pub fn meta(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.current.commands.push(Command::Meta {
            key: key.into(),
            value: value.into(),
        });
    }

    pub fn set_fill_color(&mut self, color: Color) {
        if self.current_state.fill_color == color {
            return;
        }
        self.current_state.fill_color = color;
        self.current.commands.push(Command::SetFillColor(color));
    }

    pub fn set_stroke_color(&mut self, color: Color) {
        if self.current_state.stroke_color == color {
            return;
        }
        self.current_state.stroke_color = color;
        self.current.commands.push(Command::SetStrokeColor(color));
    }

    pub fn set_font_name(&mut self, name: &str) {
        if self.current_state.font_name == name {
            return;
        }
        self.current_state.font_name = name.to_string();
        self.current
            .commands
            .push(Command::SetFontName(name.to_string()));
    }

    pub fn set_font_size(&mut self, size: Pt) {
        if self.current_state.font_size == size {
            return;
        }
        self.current_state.font_size = size;
        self.current.commands.push(Command::SetFontSize(size));
    }

    pub fn fill_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::FillRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn stroke_rect(&mut self, x: Pt, y: Pt, width: Pt, height: Pt) {
        self.current.commands.push(Command::StrokeRect {
            x,
            y,
            width,
            height,
        });
    }

    pub fn draw_string(&mut self, x: Pt, y: Pt, text: impl Into<String>) {
        self.current.commands.push(Command::DrawString {
            x,
            y,
            text: text.into(),
        });
    }

    pub fn show_page(&mut self) {
        let current = std::mem::take(&mut self.current);
        self.pages.push(current);
        self.current_state = GraphicsState::default();
    }

    pub fn is_current_empty(&self) -> bool {
        self.current.commands.is_empty()
    }

    pub fn finish(mut self) -> Document {
        if !self.current.commands.is_empty() || self.pages.is_empty() {
            self.show_page();
        }
        Document {
            page_size: self.page_size,
            pages: self.pages,
        }
    }

    fn draw_text(&mut self, placed: &PlacedCell, content: &str, style: &TextStyle) {
        let cell = &placed.cell;
        let padding = cell.padding();
        let width = (cell.width() - padding.horizontal()).max(Pt::ZERO);
        let lines: Vec<MeasuredLine> = self.measurer.measure_lines(content, width, style);
        self.set_font_name(&style.font_name);
        self.set_font_size(style.font_size);
        self.set_fill_color(Color::BLACK);
        let mut baseline = placed.y + padding.top;
        for line in lines {
            baseline += line.height;
            let text = content[line.range].trim_end();
            if text.is_empty() {
                continue;
            }
            self.draw_string(placed.x + padding.left, baseline, text);
        }
    }
}

impl<M: TextMeasurer> TextMeasurer for Canvas<M> {
    fn text_width(&self, text: &str, style: &TextStyle) -> Pt {
        self.measurer.text_width(text, style)
    }

    fn line_height(&self, style: &TextStyle) -> Pt {
        self.measurer.line_height(style)
    }

    fn measure_lines(&self, text: &str, width: Pt, style: &TextStyle) -> Vec<MeasuredLine> {
        self.measurer.measure_lines(text, width, style)
    }
}

impl<M: TextMeasurer> Renderer for Canvas<M> {
    fn draw_cell(&mut self, placed: &PlacedCell) {
        let cell = &placed.cell;
        let (x, y, width, height) = (placed.x, placed.y, cell.width(), cell.height());
        if let Some(fill) = placed.fill {
            self.set_fill_color(fill);
            self.fill_rect(x, y, width, height);
        }
        if let Some(border) = self.border {
            self.set_stroke_color(border);
            self.stroke_rect(x, y, width, height);
        }
        match cell.kind() {
            CellKind::Text(text) => self.draw_text(placed, &text.content, &text.style),
            CellKind::Opaque(opaque) => self.meta("opaque", opaque.label.clone()),
            CellKind::Placeholder(_) => {}
        }
        if placed.continued {
            self.meta("continued", format!("{}/{}", cell.row(), cell.column()));
        }
    }

    fn finish_page(&mut self) {
        self.show_page();
    }
}
