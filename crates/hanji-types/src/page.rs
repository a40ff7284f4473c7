//! Pages and their typed properties.
//!
//! A page is the root of a block forest. Its `properties` are what structured
//! filters run against; the property *type* decides which filter operators
//! apply (see `hanji-search::filter`).

use std::collections::BTreeMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use strum::EnumString;

use crate::ids::{BlockId, PageId};

/// Declared type of a page property.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum PropertyType {
    Text,
    Number,
    #[strum(serialize = "select", serialize = "single_select")]
    Select,
    #[strum(serialize = "multi_select", serialize = "multiselect")]
    MultiSelect,
    Date,
    Checkbox,
    Url,
    Email,
    #[strum(serialize = "phone", serialize = "phone_number")]
    Phone,
}

impl PropertyType {
    /// Parse from string (case-insensitive).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            PropertyType::Text => "text",
            PropertyType::Number => "number",
            PropertyType::Select => "select",
            PropertyType::MultiSelect => "multi_select",
            PropertyType::Date => "date",
            PropertyType::Checkbox => "checkbox",
            PropertyType::Url => "url",
            PropertyType::Email => "email",
            PropertyType::Phone => "phone",
        }
    }

    /// Text-like types share the string operator set.
    pub fn is_textual(&self) -> bool {
        matches!(
            self,
            PropertyType::Text | PropertyType::Url | PropertyType::Email | PropertyType::Phone
        )
    }
}

impl std::fmt::Display for PropertyType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A typed property value.
///
/// Types that can be "unset" carry an `Option`; text-like values are empty
/// when the string is empty.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum PropertyValue {
    Text(String),
    Number(Option<f64>),
    Select(Option<String>),
    MultiSelect(Vec<String>),
    /// Unix millis.
    Date(Option<i64>),
    Checkbox(bool),
    Url(String),
    Email(String),
    Phone(String),
}

impl PropertyValue {
    /// The declared type of this value.
    pub fn property_type(&self) -> PropertyType {
        match self {
            PropertyValue::Text(_) => PropertyType::Text,
            PropertyValue::Number(_) => PropertyType::Number,
            PropertyValue::Select(_) => PropertyType::Select,
            PropertyValue::MultiSelect(_) => PropertyType::MultiSelect,
            PropertyValue::Date(_) => PropertyType::Date,
            PropertyValue::Checkbox(_) => PropertyType::Checkbox,
            PropertyValue::Url(_) => PropertyType::Url,
            PropertyValue::Email(_) => PropertyType::Email,
            PropertyValue::Phone(_) => PropertyType::Phone,
        }
    }

    /// Whether the value counts as empty for `is_empty` filters.
    ///
    /// Checkboxes are never empty; unchecked is a value.
    pub fn is_empty(&self) -> bool {
        match self {
            PropertyValue::Text(s)
            | PropertyValue::Url(s)
            | PropertyValue::Email(s)
            | PropertyValue::Phone(s) => s.trim().is_empty(),
            PropertyValue::Number(n) => n.is_none(),
            PropertyValue::Select(s) => s.is_none(),
            PropertyValue::MultiSelect(v) => v.is_empty(),
            PropertyValue::Date(d) => d.is_none(),
            PropertyValue::Checkbox(_) => false,
        }
    }

    /// String view of text-like and select values.
    pub fn as_text(&self) -> Option<&str> {
        match self {
            PropertyValue::Text(s)
            | PropertyValue::Url(s)
            | PropertyValue::Email(s)
            | PropertyValue::Phone(s) => Some(s),
            PropertyValue::Select(s) => s.as_deref(),
            _ => None,
        }
    }

    /// Human-readable rendering (CLI tables, search bodies).
    pub fn display(&self) -> String {
        match self {
            PropertyValue::Text(s)
            | PropertyValue::Url(s)
            | PropertyValue::Email(s)
            | PropertyValue::Phone(s) => s.clone(),
            PropertyValue::Number(n) => n.map(|n| n.to_string()).unwrap_or_default(),
            PropertyValue::Select(s) => s.clone().unwrap_or_default(),
            PropertyValue::MultiSelect(v) => v.join(", "),
            PropertyValue::Date(d) => d.map(|d| d.to_string()).unwrap_or_default(),
            PropertyValue::Checkbox(b) => b.to_string(),
        }
    }
}

/// Property name → value.
pub type PropertyMap = BTreeMap<String, PropertyValue>;

/// A titled document owning a forest of top-level blocks.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Page {
    pub id: PageId,
    pub title: String,
    #[serde(default)]
    pub properties: PropertyMap,
    /// Ordered top-level block IDs.
    #[serde(default)]
    pub children: Vec<BlockId>,
    /// Unix millis.
    pub created_at: u64,
    /// Unix millis, never decreases.
    pub modified_at: u64,
}

impl Page {
    /// Create an empty page with a fresh ID.
    pub fn new(title: impl Into<String>) -> Self {
        let now = crate::now_millis();
        Self {
            id: PageId::new(),
            title: title.into(),
            properties: PropertyMap::new(),
            children: Vec::new(),
            created_at: now,
            modified_at: now,
        }
    }

    /// Builder-style property setter.
    pub fn with_property(mut self, name: impl Into<String>, value: PropertyValue) -> Self {
        self.properties.insert(name.into(), value);
        self
    }

    /// Look up a property by name.
    pub fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }

    /// Advance `modified_at`, never moving it backwards.
    pub fn touch(&mut self, now: u64) {
        self.modified_at = self.modified_at.max(now);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_property_type_parse_aliases() {
        assert_eq!(PropertyType::from_str("single_select"), Some(PropertyType::Select));
        assert_eq!(PropertyType::from_str("MultiSelect"), Some(PropertyType::MultiSelect));
        assert_eq!(PropertyType::from_str("nope"), None);
    }

    #[test]
    fn test_emptiness_per_type() {
        assert!(PropertyValue::Text("  ".into()).is_empty());
        assert!(PropertyValue::Number(None).is_empty());
        assert!(!PropertyValue::Number(Some(0.0)).is_empty());
        assert!(PropertyValue::MultiSelect(vec![]).is_empty());
        assert!(!PropertyValue::Checkbox(false).is_empty());
    }

    #[test]
    fn test_property_value_json_shape() {
        let value = PropertyValue::Select(Some("open".into()));
        let json = serde_json::to_value(&value).unwrap();
        assert_eq!(json, serde_json::json!({"type": "select", "value": "open"}));
    }

    #[test]
    fn test_page_builder() {
        let page = Page::new("Seoul trip notes")
            .with_property("status", PropertyValue::Select(Some("open".into())));
        assert_eq!(
            page.property("status").and_then(|v| v.as_text()),
            Some("open")
        );
        assert!(page.property("missing").is_none());
    }
}
