use serde::Serialize;

#[derive(Debug, Clone, Default, Serialize)]
pub struct PageMetrics {
    pub page_number: usize,
    pub render_ms: f64,
    pub cell_count: usize,
    /// Cells on this page whose content continues on the next one.
    pub split_cell_count: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct LayoutMetrics {
    pub pages: Vec<PageMetrics>,
    pub total_render_ms: f64,
    pub splits: usize,
    pub reconciliations: usize,
    pub whole_row_breaks: usize,
}
