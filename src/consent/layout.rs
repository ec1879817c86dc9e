//! Where each consent variant keeps its signature, date and checkboxes.
//!
//! A variant is a (consent type, upload source) pair. Each variant lists its
//! template layouts newest first; older printings are extra rows here rather
//! than extra code paths. A document is read against the first layout whose
//! signature page it contains, and only that layout.

use crate::domain::{ConsentType, UploadSource};
use crate::pdf::{Phrase, Rect};

/// How to find the page a region lives on.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PageLocator {
    Last,
    /// First page containing every phrase.
    Containing(&'static [Phrase]),
}

/// A rectangle on a located page.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Region {
    pub page: PageLocator,
    pub rect: Rect,
}

/// One printing of a consent form.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TemplateLayout {
    pub id: &'static str,
    pub signature: Region,
    pub date: Region,
    pub printed_name: Option<Region>,
}

/// A checkbox whose position shifts on the Spanish printing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckboxLayout {
    pub page: PageLocator,
    pub english: Rect,
    pub spanish: Rect,
    pub spanish_marker: Phrase,
}

/// The page of the sensitive-information EHR form and its initials boxes.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SensitiveEhrLayout {
    pub marker: Phrase,
    pub initials: [Rect; 5],
}

/// Type-specific checks run after signature and date extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExtraCheck {
    /// VA wording must match the participant's VA pairing.
    VersionMatch,
    /// Sensitive EHR form must match the participant's state, with initials.
    SensitiveEhr,
    /// GROR confirmation box must be checked.
    GrorConfirmation,
    /// Primary update agreement box must be checked.
    UpdateAgreement,
}

/// Everything known about one (type, source) combination.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConsentVariant {
    pub consent_type: ConsentType,
    pub source: UploadSource,
    pub layouts: &'static [TemplateLayout],
    pub checks: &'static [ExtraCheck],
    pub checkbox: Option<&'static CheckboxLayout>,
    pub sensitive_ehr: Option<&'static SensitiveEhrLayout>,
}

impl ConsentVariant {
    pub fn has_printed_name_field(&self) -> bool {
        self.layouts.iter().any(|layout| layout.printed_name.is_some())
    }
}

/// Present only on the VA printing. English only.
pub const VA_MARKER: Phrase = Phrase::One("Department of Veterans Affairs");

/// Distinguishes the CABOR form from the primary consent; both are uploaded
/// under the same file name prefix.
pub const CABOR_MARKER: Phrase = Phrase::AnyOf(&[
    "California Experimental Subject's Bill of Rights",
    "Declaración de Derechos del Sujeto de Experimentación de California",
]);

const VIBRENT_SIGNATURE_PAGE: &[Phrase] = &[Phrase::AnyOf(&[
    "Sign Your Full Name",
    "Firme con su nombre completo",
])];

const CE_SIGNATURE_PAGE: &[Phrase] = &[Phrase::AnyOf(&[
    "Participant Signature",
    "Firma del participante",
])];

const VIBRENT_CURRENT: TemplateLayout = TemplateLayout {
    id: "vibrent-2020",
    signature: Region {
        page: PageLocator::Containing(VIBRENT_SIGNATURE_PAGE),
        rect: Rect::new(125.0, 150.0, 450.0, 170.0),
    },
    date: Region {
        page: PageLocator::Containing(VIBRENT_SIGNATURE_PAGE),
        rect: Rect::new(125.0, 100.0, 450.0, 120.0),
    },
    printed_name: Some(Region {
        page: PageLocator::Containing(VIBRENT_SIGNATURE_PAGE),
        rect: Rect::new(125.0, 125.0, 450.0, 145.0),
    }),
};

/// 2018 printing: signature block at the top of the last page.
const VIBRENT_LEGACY: TemplateLayout = TemplateLayout {
    id: "vibrent-2018",
    signature: Region {
        page: PageLocator::Last,
        rect: Rect::new(80.0, 640.0, 320.0, 660.0),
    },
    date: Region {
        page: PageLocator::Last,
        rect: Rect::new(80.0, 600.0, 320.0, 620.0),
    },
    printed_name: Some(Region {
        page: PageLocator::Last,
        rect: Rect::new(80.0, 560.0, 320.0, 580.0),
    }),
};

/// In-app consents (wearables, EtM) print no name line.
const VIBRENT_IN_APP: TemplateLayout = TemplateLayout {
    id: "vibrent-in-app",
    signature: Region {
        page: PageLocator::Containing(VIBRENT_SIGNATURE_PAGE),
        rect: Rect::new(125.0, 150.0, 450.0, 170.0),
    },
    date: Region {
        page: PageLocator::Containing(VIBRENT_SIGNATURE_PAGE),
        rect: Rect::new(125.0, 100.0, 450.0, 120.0),
    },
    printed_name: None,
};

const CE_CURRENT: TemplateLayout = TemplateLayout {
    id: "ce-2021",
    signature: Region {
        page: PageLocator::Containing(CE_SIGNATURE_PAGE),
        rect: Rect::new(60.0, 400.0, 300.0, 420.0),
    },
    date: Region {
        page: PageLocator::Containing(CE_SIGNATURE_PAGE),
        rect: Rect::new(320.0, 400.0, 560.0, 420.0),
    },
    printed_name: None,
};

/// Early CE printing: same row, one line lower on the last page.
const CE_LEGACY: TemplateLayout = TemplateLayout {
    id: "ce-2020",
    signature: Region {
        page: PageLocator::Last,
        rect: Rect::new(60.0, 370.0, 300.0, 390.0),
    },
    date: Region {
        page: PageLocator::Last,
        rect: Rect::new(320.0, 370.0, 560.0, 390.0),
    },
    printed_name: None,
};

const VIBRENT_LAYOUTS: &[TemplateLayout] = &[VIBRENT_CURRENT, VIBRENT_LEGACY];
const VIBRENT_IN_APP_LAYOUTS: &[TemplateLayout] = &[VIBRENT_IN_APP];
const CE_LAYOUTS: &[TemplateLayout] = &[CE_CURRENT, CE_LEGACY];

const GROR_PAGE: &[Phrase] = &[Phrase::AnyOf(&[
    "I want to know about my DNA results",
    "Quiero saber los resultados de mi ADN",
])];

const SPANISH_MARKER: Phrase = Phrase::AnyOf(&["Quiero saber", "Acepto el consentimiento"]);

static VIBRENT_GROR_CHECKBOX: CheckboxLayout = CheckboxLayout {
    page: PageLocator::Containing(GROR_PAGE),
    english: Rect::new(70.0, 480.0, 85.0, 495.0),
    spanish: Rect::new(70.0, 455.0, 85.0, 470.0),
    spanish_marker: SPANISH_MARKER,
};

static CE_GROR_CHECKBOX: CheckboxLayout = CheckboxLayout {
    page: PageLocator::Containing(GROR_PAGE),
    english: Rect::new(50.0, 300.0, 65.0, 315.0),
    spanish: Rect::new(50.0, 280.0, 65.0, 295.0),
    spanish_marker: SPANISH_MARKER,
};

const UPDATE_AGREEMENT_PAGE: &[Phrase] = &[Phrase::AnyOf(&[
    "I agree to the updated consent",
    "Acepto el consentimiento actualizado",
])];

static UPDATE_AGREEMENT_CHECKBOX: CheckboxLayout = CheckboxLayout {
    page: PageLocator::Containing(UPDATE_AGREEMENT_PAGE),
    english: Rect::new(70.0, 520.0, 85.0, 535.0),
    spanish: Rect::new(70.0, 520.0, 85.0, 535.0),
    spanish_marker: SPANISH_MARKER,
};

static SENSITIVE_EHR: SensitiveEhrLayout = SensitiveEhrLayout {
    marker: Phrase::AnyOf(&[
        "sensitive health information",
        "información de salud delicada",
    ]),
    initials: [
        Rect::new(72.0, 600.0, 132.0, 620.0),
        Rect::new(72.0, 560.0, 132.0, 580.0),
        Rect::new(72.0, 520.0, 132.0, 540.0),
        Rect::new(72.0, 480.0, 132.0, 500.0),
        Rect::new(72.0, 440.0, 132.0, 460.0),
    ],
};

const NO_CHECKS: &[ExtraCheck] = &[];
const VERSION_CHECKS: &[ExtraCheck] = &[ExtraCheck::VersionMatch];
const VIBRENT_EHR_CHECKS: &[ExtraCheck] = &[ExtraCheck::VersionMatch, ExtraCheck::SensitiveEhr];
const GROR_CHECKS: &[ExtraCheck] = &[ExtraCheck::GrorConfirmation];
const UPDATE_CHECKS: &[ExtraCheck] = &[ExtraCheck::VersionMatch, ExtraCheck::UpdateAgreement];

const fn variant(
    consent_type: ConsentType,
    source: UploadSource,
    layouts: &'static [TemplateLayout],
    checks: &'static [ExtraCheck],
) -> ConsentVariant {
    ConsentVariant {
        consent_type,
        source,
        layouts,
        checks,
        checkbox: None,
        sensitive_ehr: None,
    }
}

/// The full variant matrix. CareEvolution uploads carry no CABOR or
/// wearables consent, and their EHR form has no sensitive-information page.
pub static VARIANTS: &[ConsentVariant] = &[
    // Vibrent
    variant(ConsentType::Primary, UploadSource::Vibrent, VIBRENT_LAYOUTS, VERSION_CHECKS),
    variant(
        ConsentType::PrimaryReconsent,
        UploadSource::Vibrent,
        VIBRENT_LAYOUTS,
        VERSION_CHECKS,
    ),
    variant(ConsentType::Cabor, UploadSource::Vibrent, VIBRENT_LAYOUTS, NO_CHECKS),
    ConsentVariant {
        sensitive_ehr: Some(&SENSITIVE_EHR),
        ..variant(ConsentType::Ehr, UploadSource::Vibrent, VIBRENT_LAYOUTS, VIBRENT_EHR_CHECKS)
    },
    ConsentVariant {
        sensitive_ehr: Some(&SENSITIVE_EHR),
        ..variant(
            ConsentType::EhrReconsent,
            UploadSource::Vibrent,
            VIBRENT_LAYOUTS,
            VIBRENT_EHR_CHECKS,
        )
    },
    ConsentVariant {
        checkbox: Some(&VIBRENT_GROR_CHECKBOX),
        ..variant(ConsentType::Gror, UploadSource::Vibrent, VIBRENT_LAYOUTS, GROR_CHECKS)
    },
    ConsentVariant {
        checkbox: Some(&UPDATE_AGREEMENT_CHECKBOX),
        ..variant(
            ConsentType::PrimaryUpdate,
            UploadSource::Vibrent,
            VIBRENT_LAYOUTS,
            UPDATE_CHECKS,
        )
    },
    variant(ConsentType::Wear, UploadSource::Vibrent, VIBRENT_IN_APP_LAYOUTS, NO_CHECKS),
    variant(ConsentType::Etm, UploadSource::Vibrent, VIBRENT_IN_APP_LAYOUTS, NO_CHECKS),
    // CareEvolution
    variant(ConsentType::Primary, UploadSource::CareEvolution, CE_LAYOUTS, VERSION_CHECKS),
    variant(
        ConsentType::PrimaryReconsent,
        UploadSource::CareEvolution,
        CE_LAYOUTS,
        VERSION_CHECKS,
    ),
    variant(ConsentType::Ehr, UploadSource::CareEvolution, CE_LAYOUTS, VERSION_CHECKS),
    variant(
        ConsentType::EhrReconsent,
        UploadSource::CareEvolution,
        CE_LAYOUTS,
        VERSION_CHECKS,
    ),
    ConsentVariant {
        checkbox: Some(&CE_GROR_CHECKBOX),
        ..variant(ConsentType::Gror, UploadSource::CareEvolution, CE_LAYOUTS, GROR_CHECKS)
    },
    ConsentVariant {
        checkbox: Some(&UPDATE_AGREEMENT_CHECKBOX),
        ..variant(
            ConsentType::PrimaryUpdate,
            UploadSource::CareEvolution,
            CE_LAYOUTS,
            UPDATE_CHECKS,
        )
    },
    variant(ConsentType::Etm, UploadSource::CareEvolution, CE_LAYOUTS, NO_CHECKS),
];

pub fn variant_for(
    consent_type: ConsentType,
    source: UploadSource,
) -> Option<&'static ConsentVariant> {
    VARIANTS
        .iter()
        .find(|v| v.consent_type == consent_type && v.source == source)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_validated_type_has_a_vibrent_variant() {
        for ty in ConsentType::VALIDATED {
            assert!(
                variant_for(ty, UploadSource::Vibrent).is_some(),
                "missing Vibrent variant for {ty}"
            );
        }
    }

    #[test]
    fn test_variants_are_unique() {
        for (i, a) in VARIANTS.iter().enumerate() {
            for b in &VARIANTS[i + 1..] {
                assert!(
                    !(a.consent_type == b.consent_type && a.source == b.source),
                    "duplicate variant {} / {}",
                    a.consent_type,
                    a.source
                );
            }
        }
    }

    #[test]
    fn test_checks_have_the_layout_they_need() {
        for v in VARIANTS {
            for check in v.checks {
                match check {
                    ExtraCheck::SensitiveEhr => assert!(v.sensitive_ehr.is_some()),
                    ExtraCheck::GrorConfirmation | ExtraCheck::UpdateAgreement => {
                        assert!(v.checkbox.is_some())
                    }
                    ExtraCheck::VersionMatch => {}
                }
            }
            assert!(!v.layouts.is_empty());
        }
    }

    #[test]
    fn test_printed_name_only_on_vibrent_paper_layouts() {
        let primary = variant_for(ConsentType::Primary, UploadSource::Vibrent).unwrap();
        assert!(primary.has_printed_name_field());
        let wear = variant_for(ConsentType::Wear, UploadSource::Vibrent).unwrap();
        assert!(!wear.has_printed_name_field());
        let ce = variant_for(ConsentType::Primary, UploadSource::CareEvolution).unwrap();
        assert!(!ce.has_printed_name_field());
        assert!(variant_for(ConsentType::Cabor, UploadSource::CareEvolution).is_none());
    }
}
