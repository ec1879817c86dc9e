//! Test fixtures and PDF builders.
//!
//! Consent PDFs are written with raw `lopdf` objects so text, images and
//! check marks land at exact coordinates of the consent layouts.

use std::sync::Arc;

use chrono::{DateTime, TimeZone, Utc};
use lopdf::{dictionary, Document, Object, Stream};

use consent_validator::collaborators::{
    MemoryBlobStore, MemoryConsentStore, MemoryParticipantFacts, ParticipantSummary,
    RecordingNotifier,
};
use consent_validator::{
    ConsentType, ConsentValidationController, ConsentValidator, ParticipantId, UploadSource,
    ValidationConfig,
};

/// Builder for consent PDFs, one content stream per page.
///
/// # Example
///
/// ```no_run
/// let bytes = ConsentPdfBuilder::new()
///     .text(40.0, 700.0, 12.0, "All of Us Research Program")
///     .new_page()
///     .check_mark(72.0, 482.0)
///     .build();
/// ```
#[derive(Debug, Clone)]
pub struct ConsentPdfBuilder {
    pages: Vec<String>,
}

impl ConsentPdfBuilder {
    pub fn new() -> Self {
        Self {
            pages: vec![String::new()],
        }
    }

    fn current(&mut self) -> &mut String {
        if self.pages.is_empty() {
            self.pages.push(String::new());
        }
        let last = self.pages.len() - 1;
        &mut self.pages[last]
    }

    pub fn new_page(mut self) -> Self {
        self.pages.push(String::new());
        self
    }

    /// Text with its baseline starting at (x, y). Must be ASCII without
    /// parentheses or backslashes.
    pub fn text(mut self, x: f32, y: f32, size: f32, text: &str) -> Self {
        self.current()
            .push_str(&format!("BT /F1 {size} Tf {x} {y} Td ({text}) Tj ET\n"));
        self
    }

    /// An image XObject scaled to the given box.
    pub fn image(mut self, x: f32, y: f32, width: f32, height: f32) -> Self {
        self.current()
            .push_str(&format!("q {width} 0 0 {height} {x} {y} cm /Im1 Do Q\n"));
        self
    }

    /// Stroked square outline, as printed around a checkbox.
    pub fn checkbox(mut self, x: f32, y: f32, size: f32) -> Self {
        self.current()
            .push_str(&format!("{x} {y} {size} {size} re S\n"));
        self
    }

    /// A two-stroke tick whose lower-left corner is at (x, y).
    pub fn check_mark(mut self, x: f32, y: f32) -> Self {
        let (mx, my) = (x + 4.0, y);
        let (ex, ey) = (x + 11.0, y + 11.0);
        self.current().push_str(&format!(
            "{x} {} m {mx} {my} l {ex} {ey} l S\n",
            y + 5.0
        ));
        self
    }

    pub fn build(self) -> Vec<u8> {
        let mut doc = Document::with_version("1.5");

        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => "Helvetica",
        });
        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => 1,
                "Height" => 1,
                "ColorSpace" => "DeviceGray",
                "BitsPerComponent" => 8,
            },
            vec![0u8],
        ));
        let resources_id = doc.add_object(dictionary! {
            "Font" => dictionary! { "F1" => font_id },
            "XObject" => dictionary! { "Im1" => image_id },
        });

        let pages_id = doc.new_object_id();
        let mut kids: Vec<Object> = Vec::new();
        for content in &self.pages {
            let content_id = doc.add_object(Stream::new(
                dictionary! {},
                content.clone().into_bytes(),
            ));
            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), 612.into(), 792.into()],
                "Contents" => content_id,
                "Resources" => resources_id,
            });
            kids.push(page_id.into());
        }

        let count = kids.len() as i64;
        doc.objects.insert(
            pages_id,
            Object::Dictionary(dictionary! {
                "Type" => "Pages",
                "Kids" => kids,
                "Count" => count,
            }),
        );
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let mut bytes = Vec::new();
        doc.save_to(&mut bytes).expect("failed to serialize test PDF");
        bytes
    }
}

impl Default for ConsentPdfBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// What goes into the signature block of a Vibrent consent.
#[derive(Debug, Clone)]
pub struct SignatureBlock {
    pub signature: Option<&'static str>,
    pub signature_image: bool,
    pub printed_name: Option<&'static str>,
    pub date: Option<&'static str>,
}

impl SignatureBlock {
    pub fn signed(name: &'static str, date: &'static str) -> Self {
        Self {
            signature: Some(name),
            signature_image: false,
            printed_name: Some(name),
            date: Some(date),
        }
    }

    pub fn blank() -> Self {
        Self {
            signature: None,
            signature_image: false,
            printed_name: None,
            date: None,
        }
    }
}

/// Adds the current Vibrent signature page.
pub fn vibrent_signature_page(builder: ConsentPdfBuilder, block: &SignatureBlock) -> ConsentPdfBuilder {
    let mut builder = builder.text(40.0, 156.0, 8.0, "Sign Your Full Name:");
    if let Some(signature) = block.signature {
        builder = builder.text(130.0, 156.0, 10.0, signature);
    }
    if block.signature_image {
        builder = builder.image(130.0, 152.0, 100.0, 14.0);
    }
    if let Some(name) = block.printed_name {
        builder = builder.text(130.0, 131.0, 10.0, name);
    }
    if let Some(date) = block.date {
        builder = builder.text(130.0, 106.0, 10.0, date);
    }
    builder
}

/// Single-page Vibrent primary consent.
pub fn vibrent_primary_pdf(block: &SignatureBlock, va_version: bool) -> Vec<u8> {
    let mut builder = ConsentPdfBuilder::new().text(40.0, 740.0, 12.0, "All of Us Research Program");
    if va_version {
        builder = builder.text(40.0, 720.0, 10.0, "U.S. Department of Veterans Affairs");
    }
    vibrent_signature_page(builder, block).build()
}

/// Vibrent CABOR form: primary layout plus the bill of rights heading.
pub fn vibrent_cabor_pdf(block: &SignatureBlock) -> Vec<u8> {
    let builder = ConsentPdfBuilder::new()
        .text(40.0, 740.0, 12.0, "California Experimental Subject's Bill of Rights");
    vibrent_signature_page(builder, block).build()
}

/// Vibrent GROR form: confirmation page then signature page.
pub fn vibrent_gror_pdf(block: &SignatureBlock, checked: bool, spanish: bool) -> Vec<u8> {
    let mut builder = ConsentPdfBuilder::new();
    if spanish {
        builder = builder
            .text(90.0, 459.0, 10.0, "Quiero saber los resultados de mi ADN")
            .checkbox(70.0, 455.0, 15.0);
        if checked {
            builder = builder.check_mark(72.0, 457.0);
        }
    } else {
        builder = builder
            .text(90.0, 484.0, 10.0, "I want to know about my DNA results")
            .checkbox(70.0, 480.0, 15.0);
        if checked {
            builder = builder.check_mark(72.0, 482.0);
        }
    }
    vibrent_signature_page(builder.new_page(), block).build()
}

/// Vibrent EHR form, optionally with the sensitive-information page and
/// some number of the five initials filled in.
pub fn vibrent_ehr_pdf(block: &SignatureBlock, sensitive_initials: Option<usize>) -> Vec<u8> {
    let mut builder = ConsentPdfBuilder::new().text(40.0, 740.0, 12.0, "Electronic Health Records");
    if let Some(filled) = sensitive_initials {
        builder = builder.text(
            40.0,
            700.0,
            12.0,
            "Sharing sensitive health information",
        );
        for box_top in [620.0, 580.0, 540.0, 500.0, 460.0].into_iter().take(filled) {
            builder = builder.text(80.0, box_top - 14.0, 10.0, "JD");
        }
        builder = builder.new_page();
    }
    vibrent_signature_page(builder, block).build()
}

/// CareEvolution primary consent: signature and date share one row.
pub fn ce_primary_pdf(signature: Option<&str>, date: Option<&str>) -> Vec<u8> {
    let mut builder = ConsentPdfBuilder::new()
        .text(40.0, 740.0, 12.0, "All of Us Research Program")
        .text(60.0, 380.0, 8.0, "Participant Signature");
    if let Some(signature) = signature {
        builder = builder.text(70.0, 406.0, 10.0, signature);
    }
    if let Some(date) = date {
        builder = builder.text(330.0, 406.0, 10.0, date);
    }
    builder.build()
}

pub fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(y, m, d, h, 0, 0)
        .single()
        .expect("valid test timestamp")
}

/// When fixtures are "uploaded" unless a test says otherwise.
pub fn upload_time() -> DateTime<Utc> {
    utc(2022, 3, 3, 12)
}

/// Fixed "now" for validators built by the harness.
pub fn check_time() -> DateTime<Utc> {
    utc(2022, 3, 10, 9)
}

/// In-memory collaborators wired the way the engine expects.
pub struct Harness {
    pub config: ValidationConfig,
    pub store: Arc<MemoryConsentStore>,
    pub blobs: Arc<MemoryBlobStore>,
    pub facts: Arc<MemoryParticipantFacts>,
    pub notifier: Arc<RecordingNotifier>,
}

impl Harness {
    pub fn new() -> Self {
        Self {
            config: ValidationConfig::default(),
            store: Arc::new(MemoryConsentStore::new()),
            blobs: Arc::new(MemoryBlobStore::new()),
            facts: Arc::new(MemoryParticipantFacts::new()),
            notifier: Arc::new(RecordingNotifier::new()),
        }
    }

    /// Registers a participant with one authored consent type.
    pub fn participant(
        &self,
        id: i64,
        source: UploadSource,
        authored: &[(ConsentType, DateTime<Utc>)],
    ) -> ParticipantSummary {
        let mut summary = ParticipantSummary::new(ParticipantId(id), source);
        summary.authored.extend(authored.iter().copied());
        self.facts.insert(summary.clone());
        summary
    }

    pub fn register(&self, summary: ParticipantSummary) {
        self.facts.insert(summary);
    }

    pub fn upload(&self, source: UploadSource, participant: i64, file_name: &str, bytes: Vec<u8>) {
        self.upload_at(source, participant, file_name, bytes, upload_time());
    }

    pub fn upload_at(
        &self,
        source: UploadSource,
        participant: i64,
        file_name: &str,
        bytes: Vec<u8>,
        updated: DateTime<Utc>,
    ) {
        let bucket = self.config.bucket_for(source).to_string();
        self.blobs.put(
            &bucket,
            &format!("Participant/P{participant}/{file_name}"),
            bytes,
            updated,
        );
    }

    pub fn file_path(&self, source: UploadSource, participant: i64, file_name: &str) -> String {
        format!(
            "{}/Participant/P{participant}/{file_name}",
            self.config.bucket_for(source)
        )
    }

    pub fn validator(&self) -> ConsentValidator {
        ConsentValidator::new(self.blobs.clone(), self.facts.clone(), self.config.clone())
            .with_clock(check_time)
    }

    pub fn controller(&self) -> ConsentValidationController {
        ConsentValidationController::with_validator(
            self.store.clone(),
            self.facts.clone(),
            self.notifier.clone(),
            self.validator(),
        )
    }
}

impl Default for Harness {
    fn default() -> Self {
        Self::new()
    }
}
