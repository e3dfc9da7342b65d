use crate::error::LayoutError;
use crate::types::Pt;
use rustybuzz::{Direction as HbDirection, Face as HbFace, UnicodeBuffer};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::fs;
use std::ops::Range;
use std::path::Path;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextStyle {
    pub font_name: String,
    pub font_size: Pt,
    pub line_height: Pt,
}

impl Default for TextStyle {
    fn default() -> Self {
        Self {
            font_name: "Helvetica".to_string(),
            font_size: Pt::from_f32(12.0),
            line_height: Pt::from_f32(14.4),
        }
    }
}

impl TextStyle {
    pub fn sized(font_size: f32, line_height: f32) -> Self {
        Self {
            font_size: Pt::from_f32(font_size),
            line_height: Pt::from_f32(line_height),
            ..Self::default()
        }
    }
}

/// One rendered line. `range` indexes into the measured text; consecutive
/// lines are contiguous and together cover the whole text, separators
/// included, so that any line boundary is a lossless cut point.
#[derive(Debug, Clone, PartialEq)]
pub struct MeasuredLine {
    pub range: Range<usize>,
    pub width: Pt,
    pub height: Pt,
}

pub trait TextMeasurer {
    fn text_width(&self, text: &str, style: &TextStyle) -> Pt;

    fn line_height(&self, style: &TextStyle) -> Pt {
        style.line_height
    }

    fn measure_lines(&self, text: &str, width: Pt, style: &TextStyle) -> Vec<MeasuredLine> {
        let line_height = self.line_height(style);
        wrap_text(text, width, line_height, |slice| self.text_width(slice, style))
    }
}

impl<T: TextMeasurer + ?Sized> TextMeasurer for &T {
    fn text_width(&self, text: &str, style: &TextStyle) -> Pt {
        (**self).text_width(text, style)
    }

    fn line_height(&self, style: &TextStyle) -> Pt {
        (**self).line_height(style)
    }

    fn measure_lines(&self, text: &str, width: Pt, style: &TextStyle) -> Vec<MeasuredLine> {
        (**self).measure_lines(text, width, style)
    }
}

/// Greedy word wrap producing contiguous byte ranges. Hard breaks (`\n`) end
/// a line and stay attached to it; whitespace after a word stays on the line
/// the word ends. Words wider than `max_width` are broken between chars.
pub fn wrap_text<F>(text: &str, max_width: Pt, line_height: Pt, mut measure: F) -> Vec<MeasuredLine>
where
    F: FnMut(&str) -> Pt,
{
    let mut lines = Vec::new();
    let mut start = 0usize;
    while start < text.len() {
        let (body_end, next) = match text[start..].find('\n') {
            Some(idx) => (start + idx, start + idx + 1),
            None => (text.len(), text.len()),
        };
        wrap_segment(
            text,
            start..body_end,
            next,
            max_width,
            line_height,
            &mut measure,
            &mut lines,
        );
        start = next;
    }
    lines
}

fn wrap_segment<F>(
    text: &str,
    body: Range<usize>,
    next: usize,
    max_width: Pt,
    line_height: Pt,
    measure: &mut F,
    lines: &mut Vec<MeasuredLine>,
) where
    F: FnMut(&str) -> Pt,
{
    let mut line_start = body.start;
    let mut line_width = Pt::ZERO;
    let mut line_has_word = false;

    for word in words_in(text, body.clone()) {
        if line_has_word {
            let candidate = measure(&text[line_start..word.end]);
            if candidate <= max_width {
                line_width = candidate;
                continue;
            }
            lines.push(MeasuredLine {
                range: line_start..word.start,
                width: line_width,
                height: line_height,
            });
            line_start = word.start;
        }

        let candidate = measure(&text[line_start..word.end]);
        if candidate <= max_width {
            line_width = candidate;
        } else {
            let (tail_start, tail_width) =
                break_long_word(text, line_start, word.end, max_width, line_height, measure, lines);
            line_start = tail_start;
            line_width = tail_width;
        }
        line_has_word = true;
    }

    lines.push(MeasuredLine {
        range: line_start..next,
        width: line_width,
        height: line_height,
    });
}

fn break_long_word<F>(
    text: &str,
    from: usize,
    to: usize,
    max_width: Pt,
    line_height: Pt,
    measure: &mut F,
    lines: &mut Vec<MeasuredLine>,
) -> (usize, Pt)
where
    F: FnMut(&str) -> Pt,
{
    let mut part_start = from;
    let mut part_width = Pt::ZERO;
    for (offset, ch) in text[from..to].char_indices() {
        let idx = from + offset;
        let end = idx + ch.len_utf8();
        let width = measure(&text[part_start..end]);
        if width > max_width && idx > part_start {
            lines.push(MeasuredLine {
                range: part_start..idx,
                width: part_width,
                height: line_height,
            });
            part_start = idx;
            part_width = measure(&text[part_start..end]);
        } else {
            part_width = width;
        }
    }
    (part_start, part_width)
}

fn words_in(text: &str, body: Range<usize>) -> Vec<Range<usize>> {
    let mut words = Vec::new();
    let mut current: Option<usize> = None;
    for (offset, ch) in text[body.clone()].char_indices() {
        let idx = body.start + offset;
        if ch.is_whitespace() {
            if let Some(start) = current.take() {
                words.push(start..idx);
            }
        } else if current.is_none() {
            current = Some(idx);
        }
    }
    if let Some(start) = current {
        words.push(start..body.end);
    }
    words
}

/// Fixed advance per character; the fallback metric when no font is known.
#[derive(Debug, Clone, Copy, Default)]
pub struct MonospaceMeasurer {
    advance: Option<Pt>,
}

impl MonospaceMeasurer {
    pub fn new() -> Self {
        Self { advance: None }
    }

    pub fn with_advance(advance: Pt) -> Self {
        Self {
            advance: Some(advance),
        }
    }
}

impl TextMeasurer for MonospaceMeasurer {
    fn text_width(&self, text: &str, style: &TextStyle) -> Pt {
        let advance = self
            .advance
            .unwrap_or_else(|| (style.font_size * 0.6).max(Pt::from_f32(1.0)));
        advance * (text.chars().count() as i32)
    }
}

#[derive(Debug, Clone, Hash, PartialEq, Eq)]
struct TextWidthKey {
    font_index: usize,
    size_milli: i64,
    text: String,
}

#[derive(Debug)]
struct TextWidthCache {
    map: HashMap<TextWidthKey, Pt>,
    order: VecDeque<TextWidthKey>,
    max_entries: usize,
}

impl TextWidthCache {
    fn new(max_entries: usize) -> Self {
        Self {
            map: HashMap::new(),
            order: VecDeque::new(),
            max_entries,
        }
    }

    fn get(&self, key: &TextWidthKey) -> Option<Pt> {
        self.map.get(key).copied()
    }

    fn insert(&mut self, key: TextWidthKey, value: Pt) {
        if self.map.contains_key(&key) {
            return;
        }
        self.map.insert(key.clone(), value);
        self.order.push_back(key);
        while self.map.len() > self.max_entries {
            let Some(old) = self.order.pop_front() else {
                break;
            };
            self.map.remove(&old);
        }
    }
}

const FIRST_CHAR: u32 = 32;
const LAST_CHAR: u32 = 255;

#[derive(Debug)]
struct FontMetrics {
    /// Advances for `FIRST_CHAR..=LAST_CHAR` in 1/1000 em.
    widths: Vec<u16>,
    missing_width: u16,
    /// ascender - descender + line gap, in 1/1000 em.
    line_height_1000: i32,
}

#[derive(Debug)]
struct LoadedFont {
    data: Vec<u8>,
    metrics: FontMetrics,
}

impl FontMetrics {
    fn from_face(face: &ttf_parser::Face<'_>) -> Self {
        let units_per_em = face.units_per_em().max(1) as i64;
        let scale = |value: i64| -> i64 { (value * 1000 + units_per_em / 2) / units_per_em };
        let widths: Vec<u16> = (FIRST_CHAR..=LAST_CHAR)
            .map(|code| {
                char::from_u32(code)
                    .and_then(|ch| face.glyph_index(ch))
                    .and_then(|gid| face.glyph_hor_advance(gid))
                    .map(|adv| scale(adv as i64).clamp(0, u16::MAX as i64) as u16)
                    .unwrap_or(0)
            })
            .collect();
        let missing_width = widths.first().copied().unwrap_or(0);
        let line_height_1000 = scale(face.ascender() as i64 - face.descender() as i64
            + face.line_gap() as i64) as i32;
        Self {
            widths,
            missing_width,
            line_height_1000,
        }
    }
}

impl LoadedFont {
    fn is_within_basic_latin(text: &str) -> bool {
        text.chars()
            .all(|ch| (FIRST_CHAR..=LAST_CHAR).contains(&(ch as u32)))
    }

    fn simple_width(&self, font_size: Pt, text: &str) -> Pt {
        let mut total: i32 = 0;
        for ch in text.chars() {
            let idx = (ch as u32).saturating_sub(FIRST_CHAR) as usize;
            let adv = self
                .metrics
                .widths
                .get(idx)
                .copied()
                .unwrap_or(self.metrics.missing_width);
            total = total.saturating_add(adv as i32);
        }
        if total <= 0 {
            return Pt::ZERO;
        }
        font_size.mul_ratio(total, 1000)
    }

    fn shaped_width(&self, font_size: Pt, text: &str) -> Option<Pt> {
        let face = HbFace::from_slice(&self.data, 0)?;
        let units_per_em = face.units_per_em().max(1) as i64;
        let mut buffer = UnicodeBuffer::new();
        buffer.set_direction(detect_direction(text));
        buffer.push_str(text);
        let output = rustybuzz::shape(&face, &[], buffer);
        let positions = output.glyph_positions();
        if positions.is_empty() {
            return None;
        }
        let mut total: i32 = 0;
        for pos in positions {
            let adv = (((pos.x_advance as i64) * 1000 + (units_per_em / 2)) / units_per_em) as i32;
            total = total.saturating_add(adv);
        }
        if total <= 0 {
            return Some(Pt::ZERO);
        }
        Some(font_size.mul_ratio(total, 1000))
    }
}

fn detect_direction(text: &str) -> HbDirection {
    let rtl = text.chars().any(|ch| {
        matches!(
            ch as u32,
            0x0590..=0x08FF | 0xFB1D..=0xFDFF | 0xFE70..=0xFEFF | 0x1EE00..=0x1EEFF
        )
    });
    if rtl {
        HbDirection::RightToLeft
    } else {
        HbDirection::LeftToRight
    }
}

fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|ch| !ch.is_whitespace() && *ch != '-' && *ch != '_')
        .flat_map(char::to_lowercase)
        .collect()
}

/// Measures text with real font metrics. Fonts are looked up by
/// `TextStyle::font_name`; unknown names fall back to the monospace estimate.
#[derive(Debug)]
pub struct FontMeasurer {
    fonts: Vec<LoadedFont>,
    lookup: HashMap<String, usize>,
    width_cache: Mutex<TextWidthCache>,
}

impl Default for FontMeasurer {
    fn default() -> Self {
        Self::new()
    }
}

impl FontMeasurer {
    pub fn new() -> Self {
        Self {
            fonts: Vec::new(),
            lookup: HashMap::new(),
            width_cache: Mutex::new(TextWidthCache::new(20_000)),
        }
    }

    pub fn register_file(&mut self, name: &str, path: impl AsRef<Path>) -> Result<(), LayoutError> {
        let data = fs::read(path)?;
        self.register_bytes(name, data)
    }

    pub fn register_bytes(&mut self, name: &str, data: Vec<u8>) -> Result<(), LayoutError> {
        let metrics = {
            let face = ttf_parser::Face::parse(&data, 0)
                .map_err(|err| LayoutError::Font(format!("invalid font data for {name}: {err}")))?;
            FontMetrics::from_face(&face)
        };
        let index = self.fonts.len();
        self.fonts.push(LoadedFont { data, metrics });
        self.lookup.insert(normalize_name(name), index);
        Ok(())
    }

    pub fn has_font(&self, name: &str) -> bool {
        self.lookup.contains_key(&normalize_name(name))
    }

    fn resolve(&self, name: &str) -> Option<(usize, &LoadedFont)> {
        let index = *self.lookup.get(&normalize_name(name))?;
        self.fonts.get(index).map(|font| (index, font))
    }
}

impl TextMeasurer for FontMeasurer {
    fn text_width(&self, text: &str, style: &TextStyle) -> Pt {
        let Some((index, font)) = self.resolve(&style.font_name) else {
            return MonospaceMeasurer::new().text_width(text, style);
        };
        let key = TextWidthKey {
            font_index: index,
            size_milli: style.font_size.to_milli_i64(),
            text: text.to_string(),
        };
        if let Ok(cache) = self.width_cache.lock() {
            if let Some(value) = cache.get(&key) {
                return value;
            }
        }
        let value = if LoadedFont::is_within_basic_latin(text) {
            font.simple_width(style.font_size, text)
        } else {
            font.shaped_width(style.font_size, text)
                .unwrap_or_else(|| font.simple_width(style.font_size, text))
        };
        if let Ok(mut cache) = self.width_cache.lock() {
            cache.insert(key, value);
        }
        value
    }

    fn line_height(&self, style: &TextStyle) -> Pt {
        let Some((_, font)) = self.resolve(&style.font_name) else {
            return style.line_height;
        };
        if font.metrics.line_height_1000 <= 0 {
            return style.line_height;
        }
        style
            .font_size
            .mul_ratio(font.metrics.line_height_1000, 1000)
            .max(style.line_height)
    }
}
