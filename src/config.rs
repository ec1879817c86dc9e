//! Runtime configuration loaded from the environment.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use chrono::NaiveDate;
use chrono_tz::Tz;

use crate::domain::UploadSource;
use crate::error::{ConsentError, ConsentResult};

/// States whose residents must sign the sensitive-information EHR form.
pub const DEFAULT_SENSITIVE_STATES: [&str; 11] = [
    "CA", "CT", "IL", "MA", "MI", "NJ", "NY", "OR", "PA", "WA", "WY",
];

/// Settings controlling validation and reconciliation.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Timezone in which expected signing dates are compared.
    pub business_timezone: Tz,
    /// Signing dates this many days or more away from the expected date fail.
    pub date_tolerance_days: i64,
    pub signature_max_length: usize,
    /// EHR files uploaded before this date predate the sensitive form.
    pub ehr_sensitive_cutoff: NaiveDate,
    pub sensitive_states: Vec<String>,
    /// Results buffered by an output strategy before it flushes.
    pub batch_size: usize,
    pub fallback_delay: Duration,
    pub vibrent_bucket: String,
    pub ce_bucket: String,
    pub telemetry: TelemetryConfig,
}

/// Tracing controls.
#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub log_level: String,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            business_timezone: chrono_tz::America::Chicago,
            date_tolerance_days: 10,
            signature_max_length: 200,
            ehr_sensitive_cutoff: NaiveDate::from_ymd_opt(2023, 9, 1).unwrap_or_default(),
            sensitive_states: DEFAULT_SENSITIVE_STATES
                .iter()
                .map(|s| s.to_string())
                .collect(),
            batch_size: 500,
            fallback_delay: Duration::from_secs(2 * 60 * 60),
            vibrent_bucket: "ptc-uploads-all-of-us-prod".to_string(),
            ce_bucket: "ce-uploads-all-of-us-prod".to_string(),
            telemetry: TelemetryConfig {
                log_level: "info".to_string(),
            },
        }
    }
}

impl ValidationConfig {
    /// Reads `CONSENT_*` variables (after loading a `.env` file if present),
    /// falling back to the defaults for anything unset.
    pub fn load() -> ConsentResult<Self> {
        dotenvy::dotenv().ok();
        let defaults = Self::default();

        let business_timezone = match env::var("CONSENT_TIMEZONE") {
            Ok(value) => value.trim().parse::<Tz>().map_err(|err| ConsentError::Config {
                parameter: "CONSENT_TIMEZONE".to_string(),
                reason: err.to_string(),
            })?,
            Err(_) => defaults.business_timezone,
        };

        let ehr_sensitive_cutoff = match env::var("CONSENT_EHR_SENSITIVE_CUTOFF") {
            Ok(value) => NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|err| {
                ConsentError::Config {
                    parameter: "CONSENT_EHR_SENSITIVE_CUTOFF".to_string(),
                    reason: err.to_string(),
                }
            })?,
            Err(_) => defaults.ehr_sensitive_cutoff,
        };

        let sensitive_states = match env::var("CONSENT_SENSITIVE_STATES") {
            Ok(value) => value
                .split(',')
                .map(|state| state.trim().to_ascii_uppercase())
                .filter(|state| !state.is_empty())
                .collect(),
            Err(_) => defaults.sensitive_states,
        };

        let batch_size: usize = parse_var("CONSENT_BATCH_SIZE", defaults.batch_size)?;
        if batch_size == 0 {
            return Err(ConsentError::Config {
                parameter: "CONSENT_BATCH_SIZE".to_string(),
                reason: "must be at least 1".to_string(),
            });
        }

        Ok(Self {
            business_timezone,
            date_tolerance_days: parse_var(
                "CONSENT_DATE_TOLERANCE_DAYS",
                defaults.date_tolerance_days,
            )?,
            signature_max_length: parse_var(
                "CONSENT_SIGNATURE_MAX_LEN",
                defaults.signature_max_length,
            )?,
            ehr_sensitive_cutoff,
            sensitive_states,
            batch_size,
            fallback_delay: Duration::from_secs(parse_var(
                "CONSENT_FALLBACK_DELAY_SECS",
                defaults.fallback_delay.as_secs(),
            )?),
            vibrent_bucket: env::var("CONSENT_VIBRENT_BUCKET").unwrap_or(defaults.vibrent_bucket),
            ce_bucket: env::var("CONSENT_CE_BUCKET").unwrap_or(defaults.ce_bucket),
            telemetry: TelemetryConfig {
                log_level: env::var("CONSENT_LOG_LEVEL")
                    .unwrap_or(defaults.telemetry.log_level),
            },
        })
    }

    pub fn bucket_for(&self, source: UploadSource) -> &str {
        match source {
            UploadSource::Vibrent => &self.vibrent_bucket,
            UploadSource::CareEvolution => &self.ce_bucket,
        }
    }

    /// Reverse of [`bucket_for`](Self::bucket_for).
    pub fn source_for_bucket(&self, bucket: &str) -> Option<UploadSource> {
        if bucket == self.vibrent_bucket {
            Some(UploadSource::Vibrent)
        } else if bucket == self.ce_bucket {
            Some(UploadSource::CareEvolution)
        } else {
            None
        }
    }

    pub fn is_sensitive_state(&self, state: &str) -> bool {
        let state = state.trim();
        self.sensitive_states
            .iter()
            .any(|known| known.eq_ignore_ascii_case(state))
    }
}

fn parse_var<T: FromStr>(key: &str, default: T) -> ConsentResult<T>
where
    T::Err: std::fmt::Display,
{
    match env::var(key) {
        Ok(value) => value.trim().parse().map_err(|err: T::Err| ConsentError::Config {
            parameter: key.to_string(),
            reason: err.to_string(),
        }),
        Err(_) => Ok(default),
    }
}
