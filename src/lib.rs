//! Consent document validation engine.
//!
//! Reads uploaded consent PDFs, extracts the signature, signing date and
//! printed name from known page regions, runs consent-type specific checks
//! and reconciles the outcome with previously stored validation results.
//!
//! # Architecture
//!
//! - [`pdf`]: Layout model of parsed PDFs (positioned text, images, paths)
//! - [`consent`]: Variant table, consent file wrapper and file factory
//! - [`validation`]: Per participant and consent type validation
//! - [`output`]: Store / Replace / Update / Log result strategies
//! - [`controller`]: Polling, bulk, correction and single-record runs
//! - [`collaborators`]: Store, blob, notifier and participant fact boundaries
//! - [`config`], [`telemetry`], [`error`]: Ambient concerns
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use consent_validator::collaborators::{
//!     LocalBlobStore, MemoryConsentStore, MemoryParticipantFacts, TracingNotifier,
//! };
//! use consent_validator::{ConsentValidationController, ValidationConfig};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let controller = ConsentValidationController::new(
//!     Arc::new(MemoryConsentStore::new()),
//!     Arc::new(LocalBlobStore::new("/srv/uploads")),
//!     Arc::new(MemoryParticipantFacts::new()),
//!     Arc::new(TracingNotifier),
//!     ValidationConfig::load()?,
//! );
//! let summary = controller.validate_consent_submissions()?;
//! println!("{} results, {} rows changed", summary.validated, summary.changed_ids.len());
//! # Ok(())
//! # }
//! ```
//!
//! ## Signing dates
//!
//! ```
//! use chrono::NaiveDate;
//! use consent_validator::consent::parse_signing_date;
//!
//! assert_eq!(
//!     parse_signing_date("1 de marzo de 2022"),
//!     NaiveDate::from_ymd_opt(2022, 3, 1)
//! );
//! ```

pub mod collaborators;
pub mod config;
pub mod consent;
pub mod controller;
pub mod domain;
pub mod error;
pub mod output;
pub mod pdf;
pub mod telemetry;
pub mod validation;

pub use config::ValidationConfig;
pub use consent::{ConsentFile, ConsentFileFactory, Signature};
pub use controller::{ConsentValidationController, RunSummary, ValidationFilter};
pub use domain::{
    ConsentOtherError, ConsentType, ParticipantId, SyncStatus, UploadSource, ValidationResult,
};
pub use error::{ConsentError, ConsentResult};
pub use output::{ResultStrategy, ValidationOutput};
pub use pdf::{PdfDocument, Rect};
pub use validation::ConsentValidator;
