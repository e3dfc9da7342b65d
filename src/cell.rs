use crate::measure::{TextMeasurer, TextStyle};
use crate::types::{Color, EdgeSizes, Pt};

/// Index of a cell in the table's row-major cell list.
pub type CellId = usize;

#[derive(Debug, Clone, PartialEq)]
pub struct TextCell {
    pub content: String,
    pub style: TextStyle,
    /// Rotation in degrees.
    pub rotation: Option<f32>,
    pub single_line: bool,
    /// Extra spacing between lines.
    pub leading: Option<Pt>,
}

impl TextCell {
    fn is_plain(&self) -> bool {
        self.rotation.is_none() && self.leading.is_none() && !self.single_line
    }
}

/// Content the layout cannot look into (images, drawings). Its height is
/// fixed at construction.
#[derive(Debug, Clone, PartialEq)]
pub struct OpaqueCell {
    pub label: String,
    pub height: Pt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanDirection {
    /// The slot lies in a row below the owner's anchor row.
    Row,
    /// The slot lies in the owner's anchor row, right of the owner.
    Column,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpanPlaceholder {
    pub owner: CellId,
    pub direction: SpanDirection,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CellKind {
    Text(TextCell),
    Opaque(OpaqueCell),
    Placeholder(SpanPlaceholder),
}

impl CellKind {
    pub fn is_splittable(&self) -> bool {
        match self {
            CellKind::Text(text) => text.is_plain(),
            CellKind::Opaque(_) | CellKind::Placeholder(_) => false,
        }
    }

    /// Placeholders borrow their owner's height and never create demand.
    pub fn contributes_to_row_height(&self) -> bool {
        !matches!(self, CellKind::Placeholder(_))
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    pub(crate) row: usize,
    pub(crate) column: usize,
    pub(crate) row_span: usize,
    pub(crate) col_span: usize,
    pub(crate) kind: CellKind,
    pub(crate) x: Pt,
    pub(crate) y: Pt,
    pub(crate) width: Pt,
    pub(crate) height: Pt,
    /// Height of the content alone, padding included, ignoring any span.
    pub(crate) content_height: Pt,
    pub(crate) min_height: Pt,
    pub(crate) padding: EdgeSizes,
    pub(crate) background: Option<Color>,
    /// All content went out on an earlier page and nothing of the cell
    /// remains to be drawn.
    pub(crate) finished: bool,
}

impl Cell {
    pub fn row(&self) -> usize {
        self.row
    }

    pub fn column(&self) -> usize {
        self.column
    }

    pub fn row_span(&self) -> usize {
        self.row_span
    }

    pub fn col_span(&self) -> usize {
        self.col_span
    }

    /// Last grid row covered by this cell.
    pub fn last_row(&self) -> usize {
        self.row + self.row_span.max(1) - 1
    }

    pub fn kind(&self) -> &CellKind {
        &self.kind
    }

    pub fn x(&self) -> Pt {
        self.x
    }

    pub fn y(&self) -> Pt {
        self.y
    }

    pub fn width(&self) -> Pt {
        self.width
    }

    pub fn height(&self) -> Pt {
        self.height
    }

    pub fn content_height(&self) -> Pt {
        self.content_height
    }

    pub fn padding(&self) -> EdgeSizes {
        self.padding
    }

    pub fn background(&self) -> Option<Color> {
        self.background
    }

    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            CellKind::Text(text) => Some(&text.content),
            _ => None,
        }
    }

    pub fn is_placeholder(&self) -> bool {
        matches!(self.kind, CellKind::Placeholder(_))
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn is_splittable(&self) -> bool {
        self.kind.is_splittable()
    }

    pub fn owner(&self) -> Option<CellId> {
        match self.kind {
            CellKind::Placeholder(placeholder) => Some(placeholder.owner),
            _ => None,
        }
    }

    pub(crate) fn spans_rows(&self) -> bool {
        self.row_span > 1 && !self.is_placeholder()
    }

    pub(crate) fn content_width(&self) -> Pt {
        (self.width - self.padding.horizontal()).max(Pt::ZERO)
    }

    pub(crate) fn set_text(&mut self, content: String) {
        if let CellKind::Text(text) = &mut self.kind {
            text.content = content;
        }
    }

    /// Empties the cell for good: it is no longer drawn and no longer
    /// claims height in its row.
    pub(crate) fn retire(&mut self) {
        self.set_text(String::new());
        self.content_height = Pt::ZERO;
        self.finished = true;
    }

    /// Measures the natural height of the current content, padding included,
    /// never below the cell's minimum height.
    pub(crate) fn measure_content_height<M: TextMeasurer + ?Sized>(&self, measurer: &M) -> Pt {
        let natural = match &self.kind {
            CellKind::Text(text) => {
                let lines = measurer.measure_lines(&text.content, self.content_width(), &text.style);
                let mut height: Pt = lines.iter().map(|line| line.height).sum();
                if let Some(leading) = text.leading {
                    if lines.len() > 1 {
                        height += leading * ((lines.len() - 1) as i32);
                    }
                }
                height + self.padding.vertical()
            }
            CellKind::Opaque(opaque) => opaque.height,
            CellKind::Placeholder(_) => return Pt::ZERO,
        };
        natural.max(self.min_height)
    }
}

/// Declarative description of one real cell, consumed by `TableBuilder`.
#[derive(Debug, Clone)]
pub struct CellSpec {
    pub(crate) kind: CellKind,
    pub(crate) row_span: usize,
    pub(crate) col_span: usize,
    pub(crate) padding: EdgeSizes,
    pub(crate) background: Option<Color>,
    pub(crate) min_height: Pt,
}

impl CellSpec {
    pub fn text(content: impl Into<String>) -> Self {
        Self::with_kind(CellKind::Text(TextCell {
            content: content.into(),
            style: TextStyle::default(),
            rotation: None,
            single_line: false,
            leading: None,
        }))
    }

    pub fn opaque(label: impl Into<String>, height: Pt) -> Self {
        Self::with_kind(CellKind::Opaque(OpaqueCell {
            label: label.into(),
            height,
        }))
    }

    fn with_kind(kind: CellKind) -> Self {
        Self {
            kind,
            row_span: 1,
            col_span: 1,
            padding: EdgeSizes::default(),
            background: None,
            min_height: Pt::ZERO,
        }
    }

    pub fn row_span(mut self, span: usize) -> Self {
        self.row_span = span.max(1);
        self
    }

    pub fn col_span(mut self, span: usize) -> Self {
        self.col_span = span.max(1);
        self
    }

    pub fn padding(mut self, padding: EdgeSizes) -> Self {
        self.padding = padding;
        self
    }

    pub fn background(mut self, color: Color) -> Self {
        self.background = Some(color);
        self
    }

    pub fn min_height(mut self, height: Pt) -> Self {
        self.min_height = height.max(Pt::ZERO);
        self
    }

    pub fn style(mut self, style: TextStyle) -> Self {
        if let CellKind::Text(text) = &mut self.kind {
            text.style = style;
        }
        self
    }

    pub fn rotated(mut self, degrees: f32) -> Self {
        if let CellKind::Text(text) = &mut self.kind {
            text.rotation = Some(degrees);
        }
        self
    }

    pub fn single_line(mut self) -> Self {
        if let CellKind::Text(text) = &mut self.kind {
            text.single_line = true;
        }
        self
    }

    pub fn leading(mut self, leading: Pt) -> Self {
        if let CellKind::Text(text) = &mut self.kind {
            text.leading = Some(leading);
        }
        self
    }
}
