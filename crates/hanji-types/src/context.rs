//! Explicit UI context: locale and the message catalog.
//!
//! Components that show text to the user (notices, placeholder rows) take a
//! [`Locale`] as a parameter instead of reading it from ambient state.

use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

/// Display language for user-facing strings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "lowercase")]
#[strum(ascii_case_insensitive)]
pub enum Locale {
    #[default]
    #[strum(serialize = "en", serialize = "english")]
    En,
    #[strum(serialize = "ko", serialize = "korean")]
    Ko,
}

/// User-facing messages the editing layer can emit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Message {
    /// The backend rejected a save; the edit was reverted.
    SaveFailed,
    /// The backend could not be reached; the edit was reverted.
    Offline,
    /// A move would have placed a block inside itself.
    MoveIntoSelf,
    /// Edit exceeds a length limit.
    TooLong,
    /// Placeholder label for block types this build can't render.
    UnsupportedBlock,
    /// Placeholder for empty text blocks.
    EmptyBlock,
    /// Terminal row of a fully loaded list.
    AllLoaded,
    /// Row shown while the next page loads.
    Loading,
}

impl Locale {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Look up a message in this locale.
    pub fn text(&self, message: Message) -> &'static str {
        match (self, message) {
            (Locale::En, Message::SaveFailed) => "Couldn't save your changes. They were reverted.",
            (Locale::En, Message::Offline) => {
                "You appear to be offline. Your changes were reverted."
            }
            (Locale::En, Message::MoveIntoSelf) => "A block can't be moved inside itself.",
            (Locale::En, Message::TooLong) => "That's too long.",
            (Locale::En, Message::UnsupportedBlock) => "Unsupported block",
            (Locale::En, Message::EmptyBlock) => "Type something…",
            (Locale::En, Message::AllLoaded) => "That's everything.",
            (Locale::En, Message::Loading) => "Loading…",
            (Locale::Ko, Message::SaveFailed) => "변경 사항을 저장하지 못해 되돌렸습니다.",
            (Locale::Ko, Message::Offline) => "오프라인 상태입니다. 변경 사항을 되돌렸습니다.",
            (Locale::Ko, Message::MoveIntoSelf) => "블록을 자기 자신 안으로 옮길 수 없습니다.",
            (Locale::Ko, Message::TooLong) => "내용이 너무 깁니다.",
            (Locale::Ko, Message::UnsupportedBlock) => "지원하지 않는 블록",
            (Locale::Ko, Message::EmptyBlock) => "내용을 입력하세요…",
            (Locale::Ko, Message::AllLoaded) => "모두 불러왔습니다.",
            (Locale::Ko, Message::Loading) => "불러오는 중…",
        }
    }
}
