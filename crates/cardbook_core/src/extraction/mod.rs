//! Card extraction contract.
//!
//! # Responsibility
//! - Define the boundary to the multimodal model that reads card images.
//! - Decode its untrusted output into company groups without panicking.
//!
//! # Invariants
//! - Extracted groups never carry store ids.
//! - Missing or null fields in model output default to empty values.

pub mod demo;
pub mod payload;

use crate::model::company_group::CompanyGroup;
use crate::model::settings::ExtractionSettings;
use once_cell::sync::Lazy;
use regex::Regex;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub use demo::DemoExtractor;
pub use payload::{parse_generate_response, parse_groups_payload};

static DATA_URL_PREFIX_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^data:image/(png|jpeg|webp);base64,").expect("valid data url regex")
});

pub type ExtractionResult<T> = Result<T, ExtractionError>;

/// Failure for one image. Messages are single-line and user-facing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExtractionError {
    /// Demo mode is off and no API key is configured.
    MissingApiKey,
    /// The model API answered with an error envelope.
    Api(String),
    /// The model answered but its output is not the expected JSON shape.
    MalformedResponse(String),
    /// Network or transport failure reported by the caller's client.
    Transport(String),
}

impl Display for ExtractionError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingApiKey => write!(f, "set an API key or enable demo mode first"),
            Self::Api(message) => write!(f, "extraction request failed: {message}"),
            Self::MalformedResponse(message) => {
                write!(f, "extraction returned malformed data: {message}")
            }
            Self::Transport(message) => write!(f, "extraction transport error: {message}"),
        }
    }
}

impl Error for ExtractionError {}

/// Reads business cards from one image.
pub trait Extractor {
    /// `image_data` is base64 image data, with or without a data-URL prefix.
    fn process(&self, image_data: &str) -> ExtractionResult<Vec<CompanyGroup>>;
}

/// Strips a leading `data:image/<png|jpeg|webp>;base64,` prefix.
pub fn strip_data_url_prefix(image_data: &str) -> &str {
    match DATA_URL_PREFIX_RE.find(image_data) {
        Some(prefix) => &image_data[prefix.end()..],
        None => image_data,
    }
}

/// Checks that a real (non-demo) extraction can be attempted.
pub fn ensure_extraction_ready(settings: &ExtractionSettings) -> ExtractionResult<()> {
    if settings.demo_mode || settings.has_api_key() {
        Ok(())
    } else {
        Err(ExtractionError::MissingApiKey)
    }
}
