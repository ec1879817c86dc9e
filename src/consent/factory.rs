//! Finds a participant's uploaded consent files and binds each to its
//! variant.

use tracing::{debug, warn};

use super::file::ConsentFile;
use super::layout::variant_for;
use crate::collaborators::{BlobInfo, BlobStore};
use crate::config::ValidationConfig;
use crate::domain::{ConsentType, ParticipantId, UploadSource};
use crate::error::{ConsentError, ConsentResult};
use crate::pdf::PdfDocument;

/// What a file name says about its consent type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileClass {
    Known(ConsentType),
    /// Primary consent and CABOR share a name prefix; the content decides.
    PrimaryOrCabor,
    Unknown,
}

impl FileClass {
    fn may_be(&self, wanted: ConsentType) -> bool {
        match self {
            FileClass::Known(ty) => *ty == wanted,
            FileClass::PrimaryOrCabor => {
                matches!(wanted, ConsentType::Primary | ConsentType::Cabor)
            }
            FileClass::Unknown => false,
        }
    }
}

// Checked in order, case-insensitively; longer prefixes first where one
// prefix extends another.
const VIBRENT_PREFIXES: &[(&str, FileClass)] = &[
    ("ConsentPII", FileClass::PrimaryOrCabor),
    ("EHRConsentPII", FileClass::Known(ConsentType::Ehr)),
    ("GROR", FileClass::Known(ConsentType::Gror)),
    ("PrimaryConsentUpdate", FileClass::Known(ConsentType::PrimaryUpdate)),
    ("PrimaryReconsent", FileClass::Known(ConsentType::PrimaryReconsent)),
    ("EHRReconsent", FileClass::Known(ConsentType::EhrReconsent)),
    ("WearConsent", FileClass::Known(ConsentType::Wear)),
    ("EtMConsent", FileClass::Known(ConsentType::Etm)),
];

const CE_PREFIXES: &[(&str, FileClass)] = &[
    ("PrimaryConsentUpdate", FileClass::Known(ConsentType::PrimaryUpdate)),
    ("PrimaryConsent", FileClass::Known(ConsentType::Primary)),
    ("PrimaryReconsent", FileClass::Known(ConsentType::PrimaryReconsent)),
    ("EHRReconsent", FileClass::Known(ConsentType::EhrReconsent)),
    ("EHRConsent", FileClass::Known(ConsentType::Ehr)),
    ("GROR", FileClass::Known(ConsentType::Gror)),
    ("EtMConsent", FileClass::Known(ConsentType::Etm)),
];

/// Classifies an object by its file name (the part after the last `/`).
pub fn classify(source: UploadSource, file_name: &str) -> FileClass {
    let lowered = file_name.to_ascii_lowercase();
    if !lowered.ends_with(".pdf") {
        return FileClass::Unknown;
    }
    let prefixes = match source {
        UploadSource::Vibrent => VIBRENT_PREFIXES,
        UploadSource::CareEvolution => CE_PREFIXES,
    };
    prefixes
        .iter()
        .find(|(prefix, _)| lowered.starts_with(&prefix.to_ascii_lowercase()))
        .map(|(_, class)| *class)
        .unwrap_or(FileClass::Unknown)
}

/// Object name prefix holding a participant's uploads.
pub fn participant_prefix(participant_id: ParticipantId) -> String {
    format!("Participant/{participant_id}/")
}

pub struct ConsentFileFactory<'a> {
    blobs: &'a dyn BlobStore,
    config: &'a ValidationConfig,
}

impl<'a> ConsentFileFactory<'a> {
    pub fn new(blobs: &'a dyn BlobStore, config: &'a ValidationConfig) -> Self {
        Self { blobs, config }
    }

    /// Every consent file of the participant, optionally only those of
    /// `wanted`. Files of other types are not downloaded.
    pub fn list_files(
        &self,
        participant_id: ParticipantId,
        source: UploadSource,
        wanted: Option<ConsentType>,
    ) -> ConsentResult<Vec<ConsentFile>> {
        let bucket = self.config.bucket_for(source);
        let blobs = self
            .blobs
            .list(bucket, &participant_prefix(participant_id))
            .map_err(|source| ConsentError::BlobStore {
                bucket: bucket.to_string(),
                source,
            })?;

        let mut files = Vec::new();
        for blob in blobs {
            let class = classify(source, blob.file_name());
            if class == FileClass::Unknown {
                debug!(path = %blob.path(), "skipping unrecognized upload");
                continue;
            }
            if let Some(wanted) = wanted {
                if !class.may_be(wanted) {
                    continue;
                }
            }
            let document = self.download(&blob)?;
            let consent_type = match class {
                FileClass::Known(ty) => ty,
                FileClass::PrimaryOrCabor if is_cabor(&document) => ConsentType::Cabor,
                _ => ConsentType::Primary,
            };
            if wanted.is_some_and(|wanted| wanted != consent_type) {
                continue;
            }
            if let Some(file) = self.bind(blob, source, consent_type, document) {
                files.push(file);
            }
        }
        Ok(files)
    }

    /// Loads one known object as `consent_type`, for revalidating a stored
    /// row. `None` when the object is gone.
    pub fn load_file(
        &self,
        bucket: &str,
        name: &str,
        source: UploadSource,
        consent_type: ConsentType,
    ) -> ConsentResult<Option<ConsentFile>> {
        let listed = self
            .blobs
            .list(bucket, name)
            .map_err(|source| ConsentError::BlobStore {
                bucket: bucket.to_string(),
                source,
            })?;
        let Some(blob) = listed.into_iter().find(|blob| blob.name == name) else {
            return Ok(None);
        };
        let document = self.download(&blob)?;
        match self.bind(blob, source, consent_type, document) {
            Some(file) => Ok(Some(file)),
            None => Err(ConsentError::InvalidInput {
                parameter: "consent_type".to_string(),
                reason: format!("no {source} layout for {consent_type}"),
            }),
        }
    }

    fn download(&self, blob: &BlobInfo) -> ConsentResult<PdfDocument> {
        let bytes = self
            .blobs
            .download(&blob.bucket, &blob.name)
            .map_err(|source| ConsentError::BlobStore {
                bucket: blob.bucket.clone(),
                source,
            })?;
        Ok(PdfDocument::parse(&bytes).unwrap_or_else(|err| {
            warn!(path = %blob.path(), error = %err, "unreadable consent PDF, treating as blank");
            PdfDocument::empty()
        }))
    }

    fn bind(
        &self,
        blob: BlobInfo,
        source: UploadSource,
        consent_type: ConsentType,
        document: PdfDocument,
    ) -> Option<ConsentFile> {
        match variant_for(consent_type, source) {
            Some(variant) => Some(ConsentFile::new(variant, blob, document)),
            None => {
                warn!(path = %blob.path(), %consent_type, %source, "no layout for consent variant");
                None
            }
        }
    }
}

fn is_cabor(document: &PdfDocument) -> bool {
    document.contains_phrase(super::layout::CABOR_MARKER)
}
