//! In-memory layout model of a parsed PDF.
//!
//! Pages hold positioned elements (text runs, images and vector paths) in
//! PDF user space. Consent layouts are matched against this model with
//! geometric box intersection and normalized phrase search.

mod content;
pub mod geometry;

pub use geometry::{Matrix, Rect};

use lopdf::content::Content;
use serde::Serialize;

use crate::error::{ConsentError, ConsentResult};

/// US Letter, used when a page carries no readable media box.
const DEFAULT_PAGE_SIZE: (f32, f32) = (612.0, 792.0);

/// What a positioned element is.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum ElementKind {
    Text(String),
    Image,
    Curve,
    Line,
    Rect,
}

/// A single positioned element on a page.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfElement {
    pub kind: ElementKind,
    pub bbox: Rect,
}

impl PdfElement {
    pub fn text(&self) -> Option<&str> {
        match &self.kind {
            ElementKind::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn is_image(&self) -> bool {
        self.kind == ElementKind::Image
    }

    pub fn is_curve(&self) -> bool {
        self.kind == ElementKind::Curve
    }

    pub fn new_text(text: impl Into<String>, bbox: Rect) -> Self {
        Self {
            kind: ElementKind::Text(text.into()),
            bbox,
        }
    }

    pub fn new_image(bbox: Rect) -> Self {
        Self {
            kind: ElementKind::Image,
            bbox,
        }
    }

    pub fn new_curve(bbox: Rect) -> Self {
        Self {
            kind: ElementKind::Curve,
            bbox,
        }
    }
}

/// One page of a document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PdfPage {
    pub width: f32,
    pub height: f32,
    pub elements: Vec<PdfElement>,
}

impl PdfPage {
    pub fn new(elements: Vec<PdfElement>) -> Self {
        Self {
            width: DEFAULT_PAGE_SIZE.0,
            height: DEFAULT_PAGE_SIZE.1,
            elements,
        }
    }
}

/// A phrase to look for on a page: either a single string or the same
/// sentence in several locales, any of which may match.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phrase {
    One(&'static str),
    AnyOf(&'static [&'static str]),
}

impl Phrase {
    fn found_in(&self, normalized_haystack: &str) -> bool {
        match self {
            Phrase::One(text) => normalized_haystack.contains(&normalize(text)),
            Phrase::AnyOf(options) => options
                .iter()
                .any(|text| normalized_haystack.contains(&normalize(text))),
        }
    }
}

/// Lowercases and strips every whitespace character. Extracted PDF text
/// splits and joins words unpredictably, so phrase matching ignores spacing.
pub fn normalize(text: &str) -> String {
    text.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Parsed document.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PdfDocument {
    pages: Vec<PdfPage>,
}

impl PdfDocument {
    /// Parses PDF bytes into the layout model.
    pub fn parse(bytes: &[u8]) -> ConsentResult<Self> {
        let document = lopdf::Document::load_mem(bytes)?;
        let mut pages = Vec::new();

        for (index, page_id) in document.get_pages().into_values().enumerate() {
            let raw = document
                .get_page_content(page_id)
                .map_err(|e| ConsentError::PdfProcessing {
                    message: "Failed to read page content".to_string(),
                    page: Some(index + 1),
                    source: Some(Box::new(e)),
                })?;
            let content = Content::decode(&raw).map_err(|e| ConsentError::PdfProcessing {
                message: "Failed to decode content stream".to_string(),
                page: Some(index + 1),
                source: Some(Box::new(e)),
            })?;

            let (width, height) = media_box(&document, page_id).unwrap_or(DEFAULT_PAGE_SIZE);
            pages.push(PdfPage {
                width,
                height,
                elements: content::interpret(&content.operations),
            });
        }

        Ok(Self { pages })
    }

    /// A document without pages; what an unreadable upload degrades to.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_pages(pages: Vec<PdfPage>) -> Self {
        Self { pages }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn pages(&self) -> &[PdfPage] {
        &self.pages
    }

    /// Elements on `page` whose bounding box overlaps `rect`. A page index
    /// past the end of the document yields nothing.
    pub fn intersecting(&self, rect: &Rect, page: usize) -> Vec<&PdfElement> {
        self.pages
            .get(page)
            .map(|p| {
                p.elements
                    .iter()
                    .filter(|element| element.bbox.intersects(rect))
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Trimmed text of every text element overlapping `rect`, joined with
    /// single spaces. `None` when no non-blank text is there.
    pub fn text_in(&self, rect: &Rect, page: usize) -> Option<String> {
        let parts: Vec<&str> = self
            .intersecting(rect, page)
            .into_iter()
            .filter_map(PdfElement::text)
            .map(str::trim)
            .filter(|text| !text.is_empty())
            .collect();
        (!parts.is_empty()).then(|| parts.join(" "))
    }

    /// All text on a page in content order.
    pub fn page_text(&self, page: usize) -> String {
        self.pages
            .get(page)
            .map(|p| {
                p.elements
                    .iter()
                    .filter_map(PdfElement::text)
                    .collect::<Vec<_>>()
                    .join(" ")
            })
            .unwrap_or_default()
    }

    /// Index of the first page containing every phrase.
    pub fn page_of(&self, phrases: &[Phrase]) -> Option<usize> {
        (0..self.pages.len()).find(|&page| {
            let haystack = normalize(&self.page_text(page));
            phrases.iter().all(|phrase| phrase.found_in(&haystack))
        })
    }

    pub fn contains_phrase(&self, phrase: Phrase) -> bool {
        self.page_of(&[phrase]).is_some()
    }
}

fn media_box(document: &lopdf::Document, page_id: lopdf::ObjectId) -> Option<(f32, f32)> {
    let page = document.get_dictionary(page_id).ok()?;
    let values = page.get(b"MediaBox").ok()?.as_array().ok()?;
    let coords: Vec<f32> = values
        .iter()
        .filter_map(|value| match value {
            lopdf::Object::Integer(v) => Some(*v as f32),
            #[allow(clippy::unnecessary_cast)]
            lopdf::Object::Real(v) => Some(*v as f32),
            _ => None,
        })
        .collect();
    match coords.as_slice() {
        [x0, y0, x1, y1] => Some(((x1 - x0).abs(), (y1 - y0).abs())),
        _ => None,
    }
}
