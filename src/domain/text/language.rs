use lingua::{Language, LanguageDetector, LanguageDetectorBuilder};
use serde::{Deserialize, Serialize};

/// Narration languages the detector is built for
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
        }
    }

    /// BCP-47 tag sent to the speech provider
    pub fn speech_tag(&self) -> &'static str {
        match self {
            LanguageCode::English => "en-US",
            LanguageCode::Spanish => "es-US",
            LanguageCode::French => "fr-FR",
            LanguageCode::German => "de-DE",
            LanguageCode::Italian => "it-IT",
            LanguageCode::Portuguese => "pt-BR",
        }
    }

    fn from_lingua(language: Language) -> Option<Self> {
        match language {
            Language::English => Some(LanguageCode::English),
            Language::Spanish => Some(LanguageCode::Spanish),
            Language::French => Some(LanguageCode::French),
            Language::German => Some(LanguageCode::German),
            Language::Italian => Some(LanguageCode::Italian),
            Language::Portuguese => Some(LanguageCode::Portuguese),
            #[allow(unreachable_patterns)]
            _ => None,
        }
    }

    /// Prebuilt voices tuned for a specific language.
    pub fn for_voice(voice: &str) -> Option<Self> {
        match voice {
            "Kore" | "Orus" => Some(LanguageCode::Portuguese),
            "Algieba" | "Despina" => Some(LanguageCode::Spanish),
            "Erinome" | "Algenib" => Some(LanguageCode::French),
            "Rasalgethi" | "Laomedeia" => Some(LanguageCode::German),
            _ => None,
        }
    }
}

impl std::fmt::Display for LanguageCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Picks the language tag for a job: explicit request, then the voice's language,
/// then detection over the text.
pub struct LanguageResolver {
    detector: LanguageDetector,
}

impl LanguageResolver {
    pub fn new() -> Self {
        let languages = [
            Language::English,
            Language::Spanish,
            Language::French,
            Language::German,
            Language::Italian,
            Language::Portuguese,
        ];
        Self {
            detector: LanguageDetectorBuilder::from_languages(&languages).build(),
        }
    }

    pub fn detect(&self, text: &str) -> Option<LanguageCode> {
        self.detector
            .detect_language_of(text)
            .and_then(LanguageCode::from_lingua)
    }

    pub fn resolve(&self, requested: Option<&str>, voice: &str, text: &str) -> Option<String> {
        if let Some(tag) = requested.map(str::trim).filter(|tag| !tag.is_empty()) {
            return Some(tag.to_string());
        }
        LanguageCode::for_voice(voice)
            .or_else(|| self.detect(text))
            .map(|code| code.speech_tag().to_string())
    }
}

impl Default for LanguageResolver {
    fn default() -> Self {
        Self::new()
    }
}
