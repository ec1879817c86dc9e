//! Content stream interpretation.
//!
//! Walks the decoded operations of a page and tracks just enough graphics
//! and text state to place text runs, images and vector paths on the page.
//! Glyph widths are approximated from the font size, which is precise
//! enough for matching against the generous boxes used by consent layouts.

use lopdf::content::Operation;
use lopdf::Object;

use super::geometry::{Matrix, Rect};
use super::{ElementKind, PdfElement};

/// Average glyph advance as a fraction of the font size.
const GLYPH_WIDTH_EM: f32 = 0.5;
const ASCENT_EM: f32 = 0.8;
const DESCENT_EM: f32 = -0.2;

/// `TJ` adjustments wider than this (thousandths of an em) read as a space.
const TJ_SPACE_THRESHOLD: f32 = 200.0;

#[derive(Debug, Clone, Copy)]
struct GraphicsState {
    ctm: Matrix,
}

#[derive(Debug, Clone, Copy)]
struct TextState {
    matrix: Matrix,
    line_matrix: Matrix,
    font_size: f32,
    leading: f32,
    char_spacing: f32,
    word_spacing: f32,
    horizontal_scale: f32,
    rise: f32,
}

impl Default for TextState {
    fn default() -> Self {
        Self {
            matrix: Matrix::IDENTITY,
            line_matrix: Matrix::IDENTITY,
            font_size: 12.0,
            leading: 0.0,
            char_spacing: 0.0,
            word_spacing: 0.0,
            horizontal_scale: 1.0,
            rise: 0.0,
        }
    }
}

#[derive(Debug, Default)]
struct PathBuilder {
    points: Vec<(f32, f32)>,
    line_segments: usize,
    rects: usize,
    has_curve: bool,
}

impl PathBuilder {
    fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    fn kind(&self) -> ElementKind {
        if self.has_curve {
            ElementKind::Curve
        } else if self.rects > 0 && self.line_segments == 0 {
            ElementKind::Rect
        } else if self.rects == 0 && self.line_segments == 1 {
            ElementKind::Line
        } else {
            // polylines such as hand-drawn check marks
            ElementKind::Curve
        }
    }
}

/// Interprets one page's operations into positioned elements.
pub(crate) fn interpret(operations: &[Operation]) -> Vec<PdfElement> {
    let mut interpreter = Interpreter::default();
    for operation in operations {
        interpreter.step(operation);
    }
    interpreter.elements
}

#[derive(Debug, Default)]
struct Interpreter {
    graphics: GraphicsStack,
    text: TextState,
    path: PathBuilder,
    elements: Vec<PdfElement>,
}

#[derive(Debug)]
struct GraphicsStack {
    current: GraphicsState,
    saved: Vec<GraphicsState>,
}

impl Default for GraphicsStack {
    fn default() -> Self {
        Self {
            current: GraphicsState {
                ctm: Matrix::IDENTITY,
            },
            saved: Vec::new(),
        }
    }
}

impl Interpreter {
    fn ctm(&self) -> Matrix {
        self.graphics.current.ctm
    }

    fn step(&mut self, op: &Operation) {
        let operands = &op.operands;
        match op.operator.as_str() {
            "q" => self.graphics.saved.push(self.graphics.current),
            "Q" => {
                if let Some(state) = self.graphics.saved.pop() {
                    self.graphics.current = state;
                }
            }
            "cm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.graphics.current.ctm = m.then(&self.ctm());
                }
            }

            "BT" => {
                self.text.matrix = Matrix::IDENTITY;
                self.text.line_matrix = Matrix::IDENTITY;
            }
            "Tf" => {
                if let Some(size) = operands.get(1).and_then(number) {
                    self.text.font_size = size;
                }
            }
            "TL" => self.set_text_param(operands, |t, v| t.leading = v),
            "Tc" => self.set_text_param(operands, |t, v| t.char_spacing = v),
            "Tw" => self.set_text_param(operands, |t, v| t.word_spacing = v),
            "Tz" => self.set_text_param(operands, |t, v| t.horizontal_scale = v / 100.0),
            "Ts" => self.set_text_param(operands, |t, v| t.rise = v),
            "Td" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.move_line(tx, ty);
                }
            }
            "TD" => {
                if let Some([tx, ty]) = numbers::<2>(operands) {
                    self.text.leading = -ty;
                    self.move_line(tx, ty);
                }
            }
            "Tm" => {
                if let Some(m) = matrix_operand(operands) {
                    self.text.matrix = m;
                    self.text.line_matrix = m;
                }
            }
            "T*" => self.next_line(),
            "Tj" => {
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(&[TextChunk::Text(decode_text(bytes))]);
                }
            }
            "'" => {
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.first() {
                    self.show_text(&[TextChunk::Text(decode_text(bytes))]);
                }
            }
            "\"" => {
                if let (Some(aw), Some(ac)) = (
                    operands.first().and_then(number),
                    operands.get(1).and_then(number),
                ) {
                    self.text.word_spacing = aw;
                    self.text.char_spacing = ac;
                }
                self.next_line();
                if let Some(Object::String(bytes, _)) = operands.get(2) {
                    self.show_text(&[TextChunk::Text(decode_text(bytes))]);
                }
            }
            "TJ" => {
                if let Some(Object::Array(items)) = operands.first() {
                    let chunks: Vec<TextChunk> = items
                        .iter()
                        .filter_map(|item| match item {
                            Object::String(bytes, _) => Some(TextChunk::Text(decode_text(bytes))),
                            other => number(other).map(TextChunk::Adjust),
                        })
                        .collect();
                    self.show_text(&chunks);
                }
            }

            "m" | "l" => {
                if let Some([x, y]) = numbers::<2>(operands) {
                    self.path.points.push(self.ctm().apply(x, y));
                    if op.operator == "l" {
                        self.path.line_segments += 1;
                    }
                }
            }
            "c" => {
                if let Some(coords) = numbers::<6>(operands) {
                    self.push_curve(&coords);
                }
            }
            "v" | "y" => {
                if let Some(coords) = numbers::<4>(operands) {
                    self.push_curve(&coords);
                }
            }
            "h" => {
                if !self.path.is_empty() {
                    self.path.line_segments += 1;
                }
            }
            "re" => {
                if let Some([x, y, w, h]) = numbers::<4>(operands) {
                    let rect = self.ctm().apply_rect(&Rect::from_origin(x, y, w, h));
                    self.path.points.push((rect.left, rect.bottom));
                    self.path.points.push((rect.right, rect.top));
                    self.path.rects += 1;
                }
            }
            "S" | "s" | "f" | "F" | "f*" | "B" | "B*" | "b" | "b*" => self.paint_path(),
            "n" => self.path = PathBuilder::default(),

            "Do" | "EI" => {
                let bbox = self.ctm().apply_rect(&Rect::new(0.0, 0.0, 1.0, 1.0));
                self.elements.push(PdfElement {
                    kind: ElementKind::Image,
                    bbox,
                });
            }
            _ => {}
        }
    }

    fn set_text_param(&mut self, operands: &[Object], set: impl FnOnce(&mut TextState, f32)) {
        if let Some(value) = operands.first().and_then(number) {
            set(&mut self.text, value);
        }
    }

    fn move_line(&mut self, tx: f32, ty: f32) {
        self.text.line_matrix = Matrix::translate(tx, ty).then(&self.text.line_matrix);
        self.text.matrix = self.text.line_matrix;
    }

    fn next_line(&mut self) {
        let leading = self.text.leading;
        self.move_line(0.0, -leading);
    }

    fn push_curve(&mut self, coords: &[f32]) {
        for pair in coords.chunks_exact(2) {
            self.path.points.push(self.ctm().apply(pair[0], pair[1]));
        }
        self.path.has_curve = true;
    }

    fn paint_path(&mut self) {
        let path = std::mem::take(&mut self.path);
        if path.is_empty() {
            return;
        }
        self.elements.push(PdfElement {
            kind: path.kind(),
            bbox: Rect::bounding(&path.points),
        });
    }

    fn show_text(&mut self, chunks: &[TextChunk]) {
        let state = self.text;
        let scale = state.horizontal_scale;
        let mut text = String::new();
        let mut advance = 0.0_f32;

        for chunk in chunks {
            match chunk {
                TextChunk::Text(run) => {
                    for ch in run.chars() {
                        let mut width = GLYPH_WIDTH_EM * state.font_size + state.char_spacing;
                        if ch == ' ' {
                            width += state.word_spacing;
                        }
                        advance += width * scale;
                        text.push(ch);
                    }
                }
                TextChunk::Adjust(amount) => {
                    advance -= amount / 1000.0 * state.font_size * scale;
                    if -amount > TJ_SPACE_THRESHOLD && !text.ends_with(' ') {
                        text.push(' ');
                    }
                }
            }
        }

        let extent = Rect::new(
            0.0,
            DESCENT_EM * state.font_size + state.rise,
            advance.max(0.0),
            ASCENT_EM * state.font_size + state.rise,
        );
        let to_page = state.matrix.then(&self.ctm());
        self.text.matrix = Matrix::translate(advance, 0.0).then(&state.matrix);

        if !text.is_empty() {
            self.elements.push(PdfElement {
                kind: ElementKind::Text(text),
                bbox: to_page.apply_rect(&extent),
            });
        }
    }
}

enum TextChunk {
    Text(String),
    Adjust(f32),
}

fn number(object: &Object) -> Option<f32> {
    match object {
        Object::Integer(value) => Some(*value as f32),
        #[allow(clippy::unnecessary_cast)]
        Object::Real(value) => Some(*value as f32),
        _ => None,
    }
}

fn numbers<const N: usize>(operands: &[Object]) -> Option<[f32; N]> {
    if operands.len() < N {
        return None;
    }
    let mut values = [0.0_f32; N];
    for (slot, operand) in values.iter_mut().zip(operands) {
        *slot = number(operand)?;
    }
    Some(values)
}

fn matrix_operand(operands: &[Object]) -> Option<Matrix> {
    numbers::<6>(operands).map(|[a, b, c, d, e, f]| Matrix::new(a, b, c, d, e, f))
}

/// Decodes a PDF string: UTF-16BE when it carries a byte order mark,
/// otherwise single-byte (Latin-1 compatible) text.
pub(crate) fn decode_text(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    bytes.iter().map(|&b| b as char).collect()
}
