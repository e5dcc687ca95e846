//! Extraction settings model.
//!
//! # Responsibility
//! - Hold user-editable configuration for the card extraction service.
//!
//! # Invariants
//! - `model_name` is never empty after `normalized()`.

use serde::{Deserialize, Serialize};

/// Model used when no explicit model name is configured.
pub const DEFAULT_MODEL_NAME: &str = "gemini-1.5-flash";

/// User configuration for the extraction service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractionSettings {
    /// API key for the multimodal model. Empty means unset.
    pub api_key: String,
    pub model_name: String,
    /// When set, scans use fixed sample data instead of the model.
    pub demo_mode: bool,
}

impl Default for ExtractionSettings {
    fn default() -> Self {
        Self {
            api_key: String::new(),
            model_name: DEFAULT_MODEL_NAME.to_string(),
            demo_mode: false,
        }
    }
}

impl ExtractionSettings {
    /// Trims text fields and restores the default model for blank input.
    pub fn normalized(mut self) -> Self {
        self.api_key = self.api_key.trim().to_string();
        self.model_name = self.model_name.trim().to_string();
        if self.model_name.is_empty() {
            self.model_name = DEFAULT_MODEL_NAME.to_string();
        }
        self
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}
