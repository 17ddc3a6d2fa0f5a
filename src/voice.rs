//! Voice catalog for the bundled Kokoro voice pack
//!
//! Voices are static: they are listed, looked up by display name or code,
//! and handed to the synthesis worker with each request.

use crate::{MurmurError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Language variant of a voice, taken from the first letter of its code
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Language {
    AmericanEnglish,
    BritishEnglish,
}

impl Language {
    pub fn from_code_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'a' => Some(Language::AmericanEnglish),
            'b' => Some(Language::BritishEnglish),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Language::AmericanEnglish => "English (US)",
            Language::BritishEnglish => "English (UK)",
        }
    }

    fn short(&self) -> &'static str {
        match self {
            Language::AmericanEnglish => "US",
            Language::BritishEnglish => "UK",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Gender {
    Female,
    Male,
}

impl Gender {
    pub fn from_code_marker(marker: char) -> Option<Self> {
        match marker {
            'f' => Some(Gender::Female),
            'm' => Some(Gender::Male),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Gender::Female => "Female",
            Gender::Male => "Male",
        }
    }
}

/// A single selectable voice
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Voice {
    /// Display name, e.g. "Heart (US Female)"
    pub name: String,

    pub language: Language,

    pub gender: Gender,

    /// Model-internal code, e.g. "af_heart"
    pub code: String,

    /// Index of this voice inside the model's voice pack
    pub speaker_id: i32,
}

impl Voice {
    /// Build a voice from its model code (`<lang><gender>_<name>`)
    pub fn from_code(code: &str, speaker_id: i32) -> Result<Self> {
        let mut chars = code.chars();
        let (Some(lang), Some(gender), Some('_')) = (chars.next(), chars.next(), chars.next())
        else {
            return Err(MurmurError::ConfigError(format!(
                "Malformed voice code: {}",
                code
            )));
        };

        let language = Language::from_code_prefix(lang).ok_or_else(|| {
            MurmurError::ConfigError(format!("Unsupported voice language in code: {}", code))
        })?;
        let gender = Gender::from_code_marker(gender).ok_or_else(|| {
            MurmurError::ConfigError(format!("Unsupported voice gender in code: {}", code))
        })?;

        let base = chars.as_str();
        if base.is_empty() {
            return Err(MurmurError::ConfigError(format!(
                "Malformed voice code: {}",
                code
            )));
        }

        let mut display = String::with_capacity(base.len());
        let mut upper = true;
        for c in base.chars() {
            if upper {
                display.extend(c.to_uppercase());
                upper = false;
            } else {
                display.push(c);
            }
        }

        Ok(Self {
            name: format!("{} ({} {})", display, language.short(), gender.label()),
            language,
            gender,
            code: code.to_string(),
            speaker_id,
        })
    }
}

impl fmt::Display for Voice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}, {}]", self.name, self.language.label(), self.gender.label())
    }
}

/// Voice codes shipped with the kokoro-multi-lang voice pack, with their speaker ids
const BUILTIN_VOICES: &[(&str, i32)] = &[
    // American female
    ("af_heart", 3),
    ("af_bella", 2),
    ("af_nicole", 6),
    ("af_sarah", 9),
    ("af_nova", 7),
    ("af_alloy", 0),
    // American male
    ("am_michael", 16),
    ("am_adam", 11),
    ("am_echo", 12),
    ("am_liam", 15),
    ("am_onyx", 17),
    // British female
    ("bf_alice", 20),
    ("bf_emma", 21),
    ("bf_isabella", 22),
    ("bf_lily", 23),
    // British male
    ("bm_daniel", 24),
    ("bm_george", 26),
    ("bm_lewis", 27),
];

#[derive(Clone, Debug)]
pub struct VoiceCatalog {
    voices: Vec<Voice>,
}

impl VoiceCatalog {
    /// The 18 voices bundled with the default model
    pub fn builtin() -> Self {
        let voices = BUILTIN_VOICES
            .iter()
            .filter_map(|(code, sid)| Voice::from_code(code, *sid).ok())
            .collect();
        Self { voices }
    }

    pub fn voices(&self) -> &[Voice] {
        &self.voices
    }

    pub fn len(&self) -> usize {
        self.voices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.voices.is_empty()
    }

    /// Exact match on display name
    pub fn find_by_name(&self, name: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.name == name)
    }

    pub fn find_by_code(&self, code: &str) -> Option<&Voice> {
        self.voices.iter().find(|v| v.code == code)
    }

    /// Look up by display name, falling back to code
    pub fn find(&self, name_or_code: &str) -> Option<&Voice> {
        self.find_by_name(name_or_code)
            .or_else(|| self.find_by_code(name_or_code))
    }

    pub fn default_voice(&self) -> Option<&Voice> {
        self.voices.first()
    }

    pub fn by_language(&self, language: Language) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(move |v| v.language == language)
    }

    pub fn by_gender(&self, gender: Gender) -> impl Iterator<Item = &Voice> {
        self.voices.iter().filter(move |v| v.gender == gender)
    }
}

impl Default for VoiceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
