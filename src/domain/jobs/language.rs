use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use serde::{Deserialize, Serialize};

/// Only the start of the text is inspected
const DETECTION_SAMPLE_CHARS: usize = 500;

/// ISO 639-1 codes of the languages the detector knows
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LanguageCode {
    #[serde(rename = "en")]
    English,
    #[serde(rename = "es")]
    Spanish,
    #[serde(rename = "fr")]
    French,
    #[serde(rename = "de")]
    German,
    #[serde(rename = "it")]
    Italian,
    #[serde(rename = "pt")]
    Portuguese,
    #[serde(rename = "el")]
    Greek,
}

impl LanguageCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            LanguageCode::English => "en",
            LanguageCode::Spanish => "es",
            LanguageCode::French => "fr",
            LanguageCode::German => "de",
            LanguageCode::Italian => "it",
            LanguageCode::Portuguese => "pt",
            LanguageCode::Greek => "el",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            LanguageCode::English => "English",
            LanguageCode::Spanish => "Spanish",
            LanguageCode::French => "French",
            LanguageCode::German => "German",
            LanguageCode::Italian => "Italian",
            LanguageCode::Portuguese => "Portuguese",
            LanguageCode::Greek => "Greek",
        }
    }

    fn from_lingua(language: Language) -> Self {
        match language {
            Language::English => LanguageCode::English,
            Language::Spanish => LanguageCode::Spanish,
            Language::French => LanguageCode::French,
            Language::German => LanguageCode::German,
            Language::Italian => LanguageCode::Italian,
            Language::Portuguese => LanguageCode::Portuguese,
            Language::Greek => LanguageCode::Greek,
        }
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Warns when a text is probably not English. Both voices are tuned for
/// English, so other languages may be mispronounced. Never blocks a job.
pub struct LanguageNotice {
    detector: LanguageDetector,
}

impl LanguageNotice {
    pub fn new() -> Self {
        let languages = [
            Language::English,
            Language::Spanish,
            Language::French,
            Language::German,
            Language::Italian,
            Language::Portuguese,
            Language::Greek,
        ];
        Self {
            detector: LanguageDetectorBuilder::from_languages(&languages).build(),
        }
    }

    pub fn detect(&self, text: &str) -> Option<LanguageCode> {
        let sample: String = text.chars().take(DETECTION_SAMPLE_CHARS).collect();
        self.detector
            .detect_language_of(sample)
            .map(LanguageCode::from_lingua)
    }

    /// Notice to attach to the job, if any
    pub fn notice_for(&self, text: &str) -> Option<String> {
        match self.detect(text) {
            Some(LanguageCode::English) | None => None,
            Some(language) => {
                tracing::info!(language = %language, "Non-English text submitted");
                Some(format!(
                    "text appears to be {}; pronunciation may be inaccurate",
                    language.name()
                ))
            }
        }
    }
}

impl Default for LanguageNotice {
    fn default() -> Self {
        Self::new()
    }
}
