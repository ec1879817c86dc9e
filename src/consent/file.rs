use chrono::NaiveDate;
use tracing::debug;

use super::dates::parse_signing_date;
use super::layout::{
    ConsentVariant, PageLocator, Region, TemplateLayout, CABOR_MARKER, VA_MARKER,
};
use crate::collaborators::BlobInfo;
use crate::domain::{ConsentType, UploadSource};
use crate::pdf::{PdfDocument, PdfElement, Rect};

/// What was found in a signature box.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Signature {
    Text(String),
    Image,
}

/// A downloaded consent PDF bound to the layouts of its variant.
#[derive(Debug, Clone)]
pub struct ConsentFile {
    variant: &'static ConsentVariant,
    blob: BlobInfo,
    document: PdfDocument,
}

impl PageLocator {
    /// Zero-based page index on `document`, if the page exists.
    pub fn resolve(&self, document: &PdfDocument) -> Option<usize> {
        match *self {
            PageLocator::Last => document.page_count().checked_sub(1),
            PageLocator::Containing(phrases) => document.page_of(phrases),
        }
    }
}

impl Region {
    fn text(&self, document: &PdfDocument) -> Option<String> {
        let page = self.page.resolve(document)?;
        document.text_in(&self.rect, page)
    }
}

fn is_check_mark(element: &PdfElement) -> bool {
    element.is_curve()
        || matches!(
            element.text().map(str::trim),
            Some("X" | "x" | "\u{2713}" | "\u{2714}")
        )
}

impl ConsentFile {
    pub fn new(variant: &'static ConsentVariant, blob: BlobInfo, document: PdfDocument) -> Self {
        Self {
            variant,
            blob,
            document,
        }
    }

    pub fn consent_type(&self) -> ConsentType {
        self.variant.consent_type
    }

    pub fn source(&self) -> UploadSource {
        self.variant.source
    }

    pub fn variant(&self) -> &'static ConsentVariant {
        self.variant
    }

    pub fn blob(&self) -> &BlobInfo {
        &self.blob
    }

    pub fn document(&self) -> &PdfDocument {
        &self.document
    }

    /// The printing this document follows: the newest layout whose
    /// signature page is present. Every field is read from this one layout.
    pub fn layout(&self) -> Option<&'static TemplateLayout> {
        self.variant
            .layouts
            .iter()
            .find(|layout| layout.signature.page.resolve(&self.document).is_some())
    }

    /// Typed text wins over a drawn image when a box holds both.
    pub fn signature(&self) -> Option<Signature> {
        let layout = self.layout()?;
        let region = layout.signature;
        let page = region.page.resolve(&self.document)?;
        if let Some(text) = self.document.text_in(&region.rect, page) {
            debug!(layout = layout.id, "signature text found");
            return Some(Signature::Text(text));
        }
        if self
            .document
            .intersecting(&region.rect, page)
            .iter()
            .any(|element| element.is_image())
        {
            debug!(layout = layout.id, "signature image found");
            return Some(Signature::Image);
        }
        debug!(layout = layout.id, "signature box is empty");
        None
    }

    pub fn signing_date(&self) -> Option<NaiveDate> {
        let layout = self.layout()?;
        let text = layout.date.text(&self.document)?;
        let parsed = parse_signing_date(&text);
        if parsed.is_none() {
            debug!(layout = layout.id, %text, "date box text is not a date");
        }
        parsed
    }

    pub fn printed_name(&self) -> Option<String> {
        self.layout()?.printed_name?.text(&self.document)
    }

    pub fn is_va_version(&self) -> bool {
        self.document.contains_phrase(VA_MARKER)
    }

    pub fn is_cabor(&self) -> bool {
        self.document.contains_phrase(CABOR_MARKER)
    }

    /// The file carries the sensitive-information page.
    pub fn is_sensitive_ehr_form(&self) -> bool {
        self.variant
            .sensitive_ehr
            .map(|layout| self.document.contains_phrase(layout.marker))
            .unwrap_or(false)
    }

    /// All five initials boxes on the sensitive page are filled in.
    pub fn has_valid_sensitive_initials(&self) -> bool {
        let Some(layout) = self.variant.sensitive_ehr else {
            return false;
        };
        let Some(page) = self.document.page_of(&[layout.marker]) else {
            return false;
        };
        layout
            .initials
            .iter()
            .all(|rect| self.document.text_in(rect, page).is_some())
    }

    /// GROR "I want to know" confirmation box.
    pub fn is_confirmation_checked(&self) -> bool {
        self.is_box_checked()
    }

    /// Primary update agreement box.
    pub fn is_agreement_checked(&self) -> bool {
        self.is_box_checked()
    }

    fn is_box_checked(&self) -> bool {
        let Some(layout) = self.variant.checkbox else {
            return false;
        };
        let Some(page) = layout.page.resolve(&self.document) else {
            return false;
        };
        let rect: Rect = if self.document.contains_phrase(layout.spanish_marker) {
            layout.spanish
        } else {
            layout.english
        };
        self.document
            .intersecting(&rect, page)
            .into_iter()
            .any(is_check_mark)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::consent::layout::variant_for;
    use crate::pdf::PdfPage;
    use chrono::Utc;

    fn blob() -> BlobInfo {
        BlobInfo {
            bucket: "uploads".to_string(),
            name: "Participant/P1/ConsentPII__1.pdf".to_string(),
            updated: Utc::now(),
        }
    }

    fn file(ty: ConsentType, source: UploadSource, pages: Vec<PdfPage>) -> ConsentFile {
        let variant = variant_for(ty, source).unwrap();
        ConsentFile::new(variant, blob(), PdfDocument::from_pages(pages))
    }

    fn vibrent_signature_page(extra: Vec<PdfElement>) -> PdfPage {
        let mut elements = vec![PdfElement::new_text(
            "Sign Your Full Name:",
            Rect::new(40.0, 150.0, 120.0, 160.0),
        )];
        elements.extend(extra);
        PdfPage::new(elements)
    }

    #[test]
    fn test_current_layout_text_signature_and_date() {
        let page = vibrent_signature_page(vec![
            PdfElement::new_text("Jane Doe", Rect::new(130.0, 155.0, 170.0, 165.0)),
            PdfElement::new_text("Jane Doe", Rect::new(130.0, 130.0, 170.0, 140.0)),
            PdfElement::new_text("Mar 1, 2022", Rect::new(130.0, 105.0, 190.0, 115.0)),
        ]);
        let file = file(ConsentType::Primary, UploadSource::Vibrent, vec![page]);
        assert_eq!(file.signature(), Some(Signature::Text("Jane Doe".to_string())));
        assert_eq!(file.signing_date(), NaiveDate::from_ymd_opt(2022, 3, 1));
        assert_eq!(file.printed_name().as_deref(), Some("Jane Doe"));
    }

    #[test]
    fn test_image_signature() {
        let page = vibrent_signature_page(vec![PdfElement::new_image(Rect::new(
            130.0, 152.0, 200.0, 168.0,
        ))]);
        let file = file(ConsentType::Primary, UploadSource::Vibrent, vec![page]);
        assert_eq!(file.signature(), Some(Signature::Image));
    }

    #[test]
    fn test_legacy_layout_fallback() {
        let page = PdfPage::new(vec![
            PdfElement::new_text("Jane Doe", Rect::new(90.0, 645.0, 130.0, 655.0)),
            PdfElement::new_text("2019-06-02", Rect::new(90.0, 605.0, 140.0, 615.0)),
        ]);
        let file = file(ConsentType::Primary, UploadSource::Vibrent, vec![page]);
        assert_eq!(file.signature(), Some(Signature::Text("Jane Doe".to_string())));
        assert_eq!(file.signing_date(), NaiveDate::from_ymd_opt(2019, 6, 2));
    }

    #[test]
    fn test_current_layout_does_not_fall_back_to_legacy_boxes() {
        let page = vibrent_signature_page(vec![
            PdfElement::new_text(
                "I freely and willingly choose to take part",
                Rect::new(90.0, 645.0, 300.0, 655.0),
            ),
            PdfElement::new_text("Jane Doe", Rect::new(130.0, 130.0, 170.0, 140.0)),
            PdfElement::new_text("2022-03-01", Rect::new(130.0, 105.0, 180.0, 115.0)),
        ]);
        let file = file(ConsentType::Primary, UploadSource::Vibrent, vec![page]);
        assert_eq!(file.layout().map(|layout| layout.id), Some("vibrent-2020"));
        assert_eq!(file.signature(), None);
        assert_eq!(file.signing_date(), NaiveDate::from_ymd_opt(2022, 3, 1));
    }

    #[test]
    fn test_missing_signature_page() {
        let file = file(
            ConsentType::Primary,
            UploadSource::Vibrent,
            vec![PdfPage::new(Vec::new())],
        );
        assert_eq!(file.signature(), None);
        assert_eq!(file.signing_date(), None);
    }

    #[test]
    fn test_gror_checkbox_english_and_spanish() {
        let english = PdfPage::new(vec![
            PdfElement::new_text(
                "I want to know about my DNA results",
                Rect::new(90.0, 482.0, 300.0, 492.0),
            ),
            PdfElement {
                kind: crate::pdf::ElementKind::Rect,
                bbox: Rect::new(70.0, 480.0, 85.0, 495.0),
            },
        ]);
        let unchecked = file(ConsentType::Gror, UploadSource::Vibrent, vec![english.clone()]);
        assert!(!unchecked.is_confirmation_checked());

        let mut checked = english;
        checked
            .elements
            .push(PdfElement::new_curve(Rect::new(72.0, 482.0, 83.0, 493.0)));
        let checked = file(ConsentType::Gror, UploadSource::Vibrent, vec![checked]);
        assert!(checked.is_confirmation_checked());

        let spanish = PdfPage::new(vec![
            PdfElement::new_text(
                "Quiero saber los resultados de mi ADN",
                Rect::new(90.0, 457.0, 300.0, 467.0),
            ),
            PdfElement::new_text("X", Rect::new(74.0, 458.0, 80.0, 468.0)),
        ]);
        let spanish = file(ConsentType::Gror, UploadSource::Vibrent, vec![spanish]);
        assert!(spanish.is_confirmation_checked());
    }

    #[test]
    fn test_sensitive_ehr_initials() {
        let mut elements = vec![PdfElement::new_text(
            "Sharing sensitive health information",
            Rect::new(72.0, 700.0, 400.0, 712.0),
        )];
        for top in [620.0, 580.0, 540.0, 500.0, 460.0] {
            elements.push(PdfElement::new_text(
                "JD",
                Rect::new(80.0, top - 15.0, 95.0, top - 5.0),
            ));
        }
        let complete = file(
            ConsentType::Ehr,
            UploadSource::Vibrent,
            vec![PdfPage::new(elements.clone())],
        );
        assert!(complete.is_sensitive_ehr_form());
        assert!(complete.has_valid_sensitive_initials());

        elements.pop();
        let partial = file(
            ConsentType::Ehr,
            UploadSource::Vibrent,
            vec![PdfPage::new(elements)],
        );
        assert!(!partial.has_valid_sensitive_initials());
    }

    #[test]
    fn test_version_markers() {
        let page = PdfPage::new(vec![PdfElement::new_text(
            "U.S. Department of Veterans Affairs",
            Rect::new(40.0, 740.0, 300.0, 752.0),
        )]);
        let file = file(ConsentType::Primary, UploadSource::Vibrent, vec![page]);
        assert!(file.is_va_version());
        assert!(!file.is_cabor());
    }
}
