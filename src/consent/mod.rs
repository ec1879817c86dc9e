//! Consent files and the layouts used to read them.

pub mod dates;
pub mod factory;
mod file;
pub mod layout;

pub use dates::parse_signing_date;
pub use factory::{classify, participant_prefix, ConsentFileFactory, FileClass};
pub use file::{ConsentFile, Signature};
pub use layout::{variant_for, ConsentVariant, ExtraCheck, PageLocator, Region, TemplateLayout};
