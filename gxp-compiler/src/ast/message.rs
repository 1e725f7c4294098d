//! Extracted translatable messages.

use serde::Serialize;
use sha2::{Digest, Sha256};

/// One piece of a message as a translator sees it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum MessagePart {
    Text { text: String },
    Placeholder {
        name: String,
        example: String,
        /// Literal text, or `%N` for the N-th dynamic parameter.
        presentation: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Message {
    pub id: String,
    /// Text with `%1`..`%9` for dynamic parameters and `%%` for a literal percent sign.
    pub presentation: String,
    pub meaning: Option<String>,
    pub description: Option<String>,
    pub hidden: bool,
    /// `file: Lline, Ccolumn`.
    pub source: String,
    pub parts: Vec<MessagePart>,
}

impl Message {
    /// Fingerprint of the presentation and meaning, as a decimal number.
    pub fn fingerprint(presentation: &str, meaning: Option<&str>) -> String {
        let mut hasher = Sha256::new();
        hasher.update(presentation.as_bytes());
        hasher.update([0u8]);
        hasher.update(meaning.unwrap_or("").as_bytes());
        let digest = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&digest[..8]);
        // Top bit cleared so ids stay positive in languages with signed 64-bit integers.
        (u64::from_be_bytes(bytes) & (u64::MAX >> 1)).to_string()
    }

    pub fn placeholder_names(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            MessagePart::Placeholder { name, .. } => Some(name.as_str()),
            MessagePart::Text { .. } => None,
        })
    }
}
