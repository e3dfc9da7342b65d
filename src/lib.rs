//! Table pagination that splits plain-text rows across fixed-height pages.
//!
//! A [`Table`] is built once with [`TableBuilder`], then moved into a
//! [`Paginator`] that walks it row by row against a [`PageManager`], handing
//! positioned cells to a [`Renderer`]. [`TableDocument`] wires the bundled
//! [`Canvas`], [`PageFrame`] and a [`TextMeasurer`] together.

mod canvas;
mod cell;
mod debug;
mod document;
mod error;
mod frame;
mod measure;
mod metrics;
mod options;
mod planner;
mod reconcile;
mod sink;
mod split;
mod table;
mod types;

pub use canvas::{Canvas, Command, Document, Page};
pub use cell::{
    Cell, CellId, CellKind, CellSpec, OpaqueCell, SpanDirection, SpanPlaceholder, TextCell,
};
pub use debug::DebugLogger;
pub use document::TableDocument;
pub use error::{LayoutError, LayoutWarning};
pub use frame::PageFrame;
pub use measure::{
    FontMeasurer, MeasuredLine, MonospaceMeasurer, TextMeasurer, TextStyle, wrap_text,
};
pub use metrics::{LayoutMetrics, PageMetrics};
pub use options::SplitOptions;
pub use planner::{LaidOutTable, PaginationReport, Paginator};
pub use reconcile::{PendingSplit, PendingSplitSet, Reconciliation, reconcile};
pub use sink::{
    FlushOutcome, HeaderProvider, PageManager, PageSink, PlacedCell, Renderer, RepeatedHeader,
};
pub use split::{SplitRefusal, SplitResult, opening_height, split};
pub use table::{Table, TableBuilder};
pub use types::{Color, EdgeSizes, Margins, Pt, Rect, Size};
