use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::InvalidKeyChord;

/// A key press with modifiers. `Mod` is the platform command key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct KeyChord {
    pub key: String,
    pub modifier: bool,
    pub shift: bool,
    pub alt: bool,
}

impl KeyChord {
    pub fn key(key: &str) -> Self {
        Self {
            key: normalize_key(key),
            modifier: false,
            shift: false,
            alt: false,
        }
    }

    /// `Mod-<key>`
    pub fn with_mod(key: &str) -> Self {
        Self {
            modifier: true,
            ..Self::key(key)
        }
    }

    pub fn shift(mut self) -> Self {
        self.shift = true;
        self
    }

    pub fn alt(mut self) -> Self {
        self.alt = true;
        self
    }

    pub fn parse(s: &str) -> Result<Self, InvalidKeyChord> {
        s.parse()
    }
}

fn normalize_key(key: &str) -> String {
    if key.chars().count() == 1 {
        key.to_lowercase()
    } else {
        key.to_string()
    }
}

impl FromStr for KeyChord {
    type Err = InvalidKeyChord;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || InvalidKeyChord(s.to_string());
        let (mods, key) = match s.rsplit_once('-') {
            // "Mod--" binds the minus key.
            Some((mods, "")) => (mods.strip_suffix('-').ok_or_else(err)?, "-"),
            Some((mods, key)) => (mods, key),
            None => ("", s),
        };
        if key.is_empty() {
            return Err(err());
        }
        let mut chord = KeyChord::key(key);
        for part in mods.split('-').filter(|p| !p.is_empty()) {
            match part.to_ascii_lowercase().as_str() {
                "mod" | "cmd" | "ctrl" | "meta" | "control" => chord.modifier = true,
                "shift" => chord.shift = true,
                "alt" | "option" => chord.alt = true,
                _ => return Err(err()),
            }
        }
        Ok(chord)
    }
}

impl TryFrom<String> for KeyChord {
    type Error = InvalidKeyChord;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<KeyChord> for String {
    fn from(value: KeyChord) -> Self {
        value.to_string()
    }
}

impl fmt::Display for KeyChord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.modifier {
            f.write_str("Mod-")?;
        }
        if self.alt {
            f.write_str("Alt-")?;
        }
        if self.shift {
            f.write_str("Shift-")?;
        }
        f.write_str(&self.key)
    }
}

/// A file handed to the editor by drag and drop or paste. The engine never
/// reads file contents.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub name: String,
    pub mime: String,
    #[serde(default)]
    pub size: u64,
}

impl FileInfo {
    pub fn new(name: impl Into<String>, mime: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            mime: mime.into(),
            size: 0,
        }
    }

    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// Pointer, clipboard and text input from the host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InputEvent {
    Click {
        pos: usize,
    },
    CaptionInput {
        pos: usize,
        caption: String,
    },
    Drop {
        #[serde(default)]
        pos: Option<usize>,
        files: Vec<FileInfo>,
    },
    Paste {
        #[serde(default)]
        files: Vec<FileInfo>,
        #[serde(default)]
        text: Option<String>,
    },
    TextInput {
        text: String,
    },
}

/// Requests for collaborators outside the engine, drained with
/// `Editor::take_events`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EditorEvent {
    ImageUploadRequested { file: FileInfo },
    ImageDialogRequested,
    FeaturedImageRequested,
}
