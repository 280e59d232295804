//! Shared types used across the state holders and add-ons.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{LabError, LabResult};

// -----------------------------------------------------------------------------
// Preference store keys
// -----------------------------------------------------------------------------

/// Preference key holding the theme as `"dark"` or `"light"`.
pub const THEME_KEY: &str = "theme";

/// Preference key holding the JSON array of saved prompt templates.
pub const TEMPLATES_KEY: &str = "promptTemplates";

// -----------------------------------------------------------------------------
// Generation parameters
// -----------------------------------------------------------------------------

pub const MAX_TOKENS_MIN: u32 = 50;
pub const MAX_TOKENS_MAX: u32 = 4000;
/// Max tokens moves in whole steps of this size (slider granularity).
pub const MAX_TOKENS_STEP: u32 = 50;

/// Which generation parameter a `set_parameter` call targets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ParameterKey {
    Temperature,
    MaxTokens,
    TopP,
}

impl ParameterKey {
    pub const ALL: [ParameterKey; 3] = [
        ParameterKey::Temperature,
        ParameterKey::MaxTokens,
        ParameterKey::TopP,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterKey::Temperature => "temperature",
            ParameterKey::MaxTokens => "maxTokens",
            ParameterKey::TopP => "topP",
        }
    }
}

impl fmt::Display for ParameterKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ParameterKey {
    type Err = LabError;

    /// Accepts the wire names (`maxTokens`) as well as snake/kebab spellings typed at a prompt.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(|c| c.to_lowercase())
            .collect();
        match normalized.as_str() {
            "temperature" | "temp" => Ok(ParameterKey::Temperature),
            "maxtokens" | "tokens" => Ok(ParameterKey::MaxTokens),
            "topp" => Ok(ParameterKey::TopP),
            _ => Err(LabError::Validation(format!("unknown parameter '{}'", s.trim()))),
        }
    }
}

/// Sampling parameters attached to every request. Always replaced as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParameters {
    /// Randomness, 0.0 (deterministic) to 1.0 (creative).
    pub temperature: f64,
    /// Upper bound on response length, 50..=4000 in steps of 50.
    pub max_tokens: u32,
    /// Nucleus sampling mass, 0.0..=1.0.
    pub top_p: f64,
}

impl Default for GenerationParameters {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_tokens: 500,
            top_p: 1.0,
        }
    }
}

impl GenerationParameters {
    pub fn new(temperature: f64, max_tokens: u32, top_p: f64) -> Self {
        Self {
            temperature,
            max_tokens,
            top_p,
        }
    }

    /// Returns a copy with `key` replaced by `value`, or the reason the value is out of range.
    /// `self` is never touched.
    pub fn with_value(&self, key: ParameterKey, value: f64) -> LabResult<Self> {
        let mut next = *self;
        match key {
            ParameterKey::Temperature => next.temperature = check_unit(key, value)?,
            ParameterKey::TopP => next.top_p = check_unit(key, value)?,
            ParameterKey::MaxTokens => next.max_tokens = check_max_tokens(value)?,
        }
        Ok(next)
    }

    /// Checks all three fields; used when a whole object is handed in at once.
    pub fn validate(&self) -> LabResult<()> {
        check_unit(ParameterKey::Temperature, self.temperature)?;
        check_unit(ParameterKey::TopP, self.top_p)?;
        check_max_tokens(f64::from(self.max_tokens))?;
        Ok(())
    }

    pub fn get(&self, key: ParameterKey) -> f64 {
        match key {
            ParameterKey::Temperature => self.temperature,
            ParameterKey::MaxTokens => f64::from(self.max_tokens),
            ParameterKey::TopP => self.top_p,
        }
    }

    /// One-line summary as shown under an assistant message.
    pub fn summary(&self) -> String {
        format!(
            "Temp: {} | Tokens: {} | Top-P: {:.2}",
            self.temperature, self.max_tokens, self.top_p
        )
    }
}

fn check_unit(key: ParameterKey, value: f64) -> LabResult<f64> {
    if !value.is_finite() || !(0.0..=1.0).contains(&value) {
        return Err(LabError::InvalidParameter {
            key,
            reason: format!("{} is outside 0.0..=1.0", value),
        });
    }
    Ok(value)
}

fn check_max_tokens(value: f64) -> LabResult<u32> {
    let key = ParameterKey::MaxTokens;
    if !value.is_finite() || value.fract() != 0.0 {
        return Err(LabError::InvalidParameter {
            key,
            reason: format!("{} is not a whole number", value),
        });
    }
    if value < f64::from(MAX_TOKENS_MIN) || value > f64::from(MAX_TOKENS_MAX) {
        return Err(LabError::InvalidParameter {
            key,
            reason: format!("{} is outside {}..={}", value, MAX_TOKENS_MIN, MAX_TOKENS_MAX),
        });
    }
    let tokens = value as u32;
    if tokens % MAX_TOKENS_STEP != 0 {
        return Err(LabError::InvalidParameter {
            key,
            reason: format!("{} is not a multiple of {}", tokens, MAX_TOKENS_STEP),
        });
    }
    Ok(tokens)
}

// -----------------------------------------------------------------------------
// Models
// -----------------------------------------------------------------------------

/// Entry in the fixed model list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ModelOption {
    pub id: &'static str,
    pub label: &'static str,
}

/// Models offered by the selector, in display order. The first entry is the default.
pub const MODEL_OPTIONS: &[ModelOption] = &[
    ModelOption { id: "gpt-4", label: "GPT-4" },
    ModelOption { id: "gpt-3.5", label: "GPT-3.5" },
    ModelOption { id: "gemini", label: "Gemini" },
    ModelOption { id: "perplexity", label: "Perplexity" },
    ModelOption { id: "grok", label: "Grok" },
    ModelOption { id: "claude", label: "Claude" },
];

// -----------------------------------------------------------------------------
// Prompt templates
// -----------------------------------------------------------------------------

/// Saved prompt. Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PromptTemplate {
    pub id: String,
    pub title: String,
    pub content: String,
}

// -----------------------------------------------------------------------------
// Theme
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ThemePreference {
    #[default]
    Dark,
    Light,
}

impl ThemePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            ThemePreference::Dark => "dark",
            ThemePreference::Light => "light",
        }
    }

    /// Stored values other than `"light"` fall back to dark.
    pub fn from_stored(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("light") {
            ThemePreference::Light
        } else {
            ThemePreference::Dark
        }
    }

    pub fn flipped(&self) -> Self {
        match self {
            ThemePreference::Dark => ThemePreference::Light,
            ThemePreference::Light => ThemePreference::Dark,
        }
    }
}

impl fmt::Display for ThemePreference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// -----------------------------------------------------------------------------
// Chat
// -----------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One entry in the chat log. `params` is a snapshot taken when the message was created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: String,
    pub role: Role,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub params: Option<GenerationParameters>,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>, params: GenerationParameters) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::User,
            content: content.into(),
            params: Some(params),
        }
    }

    pub fn assistant(content: impl Into<String>, params: GenerationParameters) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            role: Role::Assistant,
            content: content.into(),
            params: Some(params),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn get_reads_each_key() {
        let params = GenerationParameters::new(0.3, 1200, 0.85);
        let values: Vec<f64> = ParameterKey::ALL.iter().map(|k| params.get(*k)).collect();
        assert_eq!(values, vec![0.3, 1200.0, 0.85]);
    }

    #[test]
    fn with_value_leaves_original_untouched() {
        let base = GenerationParameters::default();
        let next = base.with_value(ParameterKey::Temperature, 0.2).unwrap();
        assert_eq!(base.temperature, 0.7);
        assert_eq!(next.temperature, 0.2);
        assert_eq!(next.max_tokens, base.max_tokens);
    }

    #[test]
    fn max_tokens_must_sit_on_step() {
        let base = GenerationParameters::default();
        assert!(base.with_value(ParameterKey::MaxTokens, 4000.0).is_ok());
        assert!(base.with_value(ParameterKey::MaxTokens, 50.0).is_ok());
        assert!(base.with_value(ParameterKey::MaxTokens, 125.0).is_err());
        assert!(base.with_value(ParameterKey::MaxTokens, 4050.0).is_err());
        assert!(base.with_value(ParameterKey::MaxTokens, 100.5).is_err());
    }

    #[test]
    fn unit_params_reject_nan_and_out_of_range() {
        let base = GenerationParameters::default();
        for bad in [f64::NAN, -0.01, 1.5, f64::INFINITY] {
            let err = base.with_value(ParameterKey::TopP, bad).unwrap_err();
            assert!(matches!(err, LabError::InvalidParameter { key: ParameterKey::TopP, .. }));
        }
    }

    #[test]
    fn parameter_key_parses_loose_spellings() {
        assert_eq!("maxTokens".parse::<ParameterKey>().unwrap(), ParameterKey::MaxTokens);
        assert_eq!("max_tokens".parse::<ParameterKey>().unwrap(), ParameterKey::MaxTokens);
        assert_eq!("top-p".parse::<ParameterKey>().unwrap(), ParameterKey::TopP);
        assert!("seed".parse::<ParameterKey>().is_err());
    }

    #[test]
    fn params_serialize_with_camel_case_names() {
        let json = serde_json::to_value(GenerationParameters::new(0.5, 100, 0.9)).unwrap();
        assert_eq!(json["maxTokens"], 100);
        assert_eq!(json["topP"], 0.9);
    }

    #[test]
    fn theme_fallback_is_dark() {
        assert_eq!(ThemePreference::from_stored("light"), ThemePreference::Light);
        assert_eq!(ThemePreference::from_stored("sepia"), ThemePreference::Dark);
        assert_eq!(ThemePreference::Dark.flipped(), ThemePreference::Light);
    }
}
