//! Structured filtering over typed page properties.
//!
//! A [`FilterCondition`] names a property, an operator, and (except for the
//! emptiness checks) a value. Which operators apply depends on the property's
//! declared [`PropertyType`]. Conditions are grouped by a [`FilterGroup`]
//! (AND/OR), and groups by a [`CompoundFilter`]; there is no deeper nesting.
//!
//! Evaluation never fails: a condition on a property the item doesn't have,
//! or an operator that doesn't fit the value's type, is simply false. Use
//! [`FilterGroup::validate`] to report those mistakes up front.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use hanji_types::{Page, PropertyType, PropertyValue};
use serde::{Deserialize, Serialize};
use strum::EnumString;
use thiserror::Error;

const DAY_MS: i64 = 86_400_000;
const WEEK_MS: i64 = 7 * DAY_MS;

// ============================================================================
// Errors
// ============================================================================

/// Problems found by [`FilterGroup::validate`].
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    #[error("operator '{operator}' is not supported for {property_type} property '{property}'")]
    UnsupportedOperator {
        property: String,
        operator: FilterOperator,
        property_type: PropertyType,
    },

    #[error("operator '{operator}' on '{property}' needs a value")]
    MissingValue {
        property: String,
        operator: FilterOperator,
    },

    #[error("value for '{property}' should be {expected}")]
    ValueType {
        property: String,
        expected: &'static str,
    },

    #[error("malformed condition '{0}' (expected property:operator[:value])")]
    Malformed(String),
}

// ============================================================================
// Property access
// ============================================================================

/// Anything with named, typed properties.
pub trait PropertySource {
    fn property(&self, name: &str) -> Option<&PropertyValue>;
}

impl PropertySource for Page {
    fn property(&self, name: &str) -> Option<&PropertyValue> {
        self.properties.get(name)
    }
}

impl<T: PropertySource + ?Sized> PropertySource for &T {
    fn property(&self, name: &str) -> Option<&PropertyValue> {
        (**self).property(name)
    }
}

// ============================================================================
// Operators and values
// ============================================================================

/// Comparison operators. Availability per property type: see [`FilterOperator::supports`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(ascii_case_insensitive)]
pub enum FilterOperator {
    #[strum(serialize = "equals", serialize = "eq", serialize = "is")]
    Equals,
    #[strum(serialize = "does_not_equal", serialize = "ne", serialize = "is_not")]
    DoesNotEqual,
    #[strum(serialize = "contains")]
    Contains,
    #[strum(serialize = "does_not_contain")]
    DoesNotContain,
    #[strum(serialize = "starts_with")]
    StartsWith,
    #[strum(serialize = "ends_with")]
    EndsWith,
    #[strum(serialize = "greater_than", serialize = "gt")]
    GreaterThan,
    #[strum(serialize = "less_than", serialize = "lt")]
    LessThan,
    #[strum(serialize = "greater_than_or_equal_to", serialize = "gte")]
    GreaterThanOrEqualTo,
    #[strum(serialize = "less_than_or_equal_to", serialize = "lte")]
    LessThanOrEqualTo,
    #[strum(serialize = "before")]
    Before,
    #[strum(serialize = "after")]
    After,
    #[strum(serialize = "on_or_before")]
    OnOrBefore,
    #[strum(serialize = "on_or_after")]
    OnOrAfter,
    #[strum(serialize = "past_week")]
    PastWeek,
    #[strum(serialize = "next_week")]
    NextWeek,
    #[strum(serialize = "is_empty", serialize = "empty")]
    IsEmpty,
    #[strum(serialize = "is_not_empty", serialize = "not_empty")]
    IsNotEmpty,
}

impl FilterOperator {
    /// Parse from string (case-insensitive, short aliases accepted).
    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Option<Self> {
        <Self as FromStr>::from_str(s).ok()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Equals => "equals",
            FilterOperator::DoesNotEqual => "does_not_equal",
            FilterOperator::Contains => "contains",
            FilterOperator::DoesNotContain => "does_not_contain",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::GreaterThan => "greater_than",
            FilterOperator::LessThan => "less_than",
            FilterOperator::GreaterThanOrEqualTo => "greater_than_or_equal_to",
            FilterOperator::LessThanOrEqualTo => "less_than_or_equal_to",
            FilterOperator::Before => "before",
            FilterOperator::After => "after",
            FilterOperator::OnOrBefore => "on_or_before",
            FilterOperator::OnOrAfter => "on_or_after",
            FilterOperator::PastWeek => "past_week",
            FilterOperator::NextWeek => "next_week",
            FilterOperator::IsEmpty => "is_empty",
            FilterOperator::IsNotEmpty => "is_not_empty",
        }
    }

    /// Whether the operator is defined for this property type.
    pub fn supports(&self, property_type: PropertyType) -> bool {
        use FilterOperator::*;
        match self {
            IsEmpty | IsNotEmpty => property_type != PropertyType::Checkbox,
            Equals | DoesNotEqual => property_type != PropertyType::MultiSelect,
            Contains | DoesNotContain => {
                property_type.is_textual() || property_type == PropertyType::MultiSelect
            }
            StartsWith | EndsWith => property_type.is_textual(),
            GreaterThan | LessThan | GreaterThanOrEqualTo | LessThanOrEqualTo => {
                property_type == PropertyType::Number
            }
            Before | After | OnOrBefore | OnOrAfter | PastWeek | NextWeek => {
                property_type == PropertyType::Date
            }
        }
    }

    /// Whether a comparison value is required.
    pub fn needs_value(&self) -> bool {
        !matches!(
            self,
            FilterOperator::IsEmpty
                | FilterOperator::IsNotEmpty
                | FilterOperator::PastWeek
                | FilterOperator::NextWeek
        )
    }
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison value of a condition. Dates are Unix millis (numbers).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FilterValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl FilterValue {
    /// Interpret a command-line literal: `true`/`false`, a number, or text.
    pub fn parse_literal(s: &str) -> Self {
        if let Ok(b) = s.parse::<bool>() {
            FilterValue::Bool(b)
        } else if let Ok(n) = s.parse::<f64>() {
            FilterValue::Number(n)
        } else {
            FilterValue::Text(s.to_string())
        }
    }

    fn as_text(&self) -> Option<String> {
        match self {
            FilterValue::Text(s) => Some(s.to_lowercase()),
            FilterValue::Number(n) => Some(n.to_string()),
            FilterValue::Bool(_) => None,
        }
    }

    fn as_number(&self) -> Option<f64> {
        match self {
            FilterValue::Number(n) => Some(*n),
            FilterValue::Text(s) => s.trim().parse().ok(),
            FilterValue::Bool(_) => None,
        }
    }

    fn as_bool(&self) -> Option<bool> {
        match self {
            FilterValue::Bool(b) => Some(*b),
            FilterValue::Text(s) => s.parse().ok(),
            FilterValue::Number(_) => None,
        }
    }
}

/// Evaluation-time inputs that aren't part of the items (the clock).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FilterContext {
    /// Unix millis used by relative date operators.
    pub now: i64,
}

impl FilterContext {
    pub fn at(now: i64) -> Self {
        Self { now }
    }

    pub fn now() -> Self {
        Self::at(hanji_types::now_millis() as i64)
    }
}

// ============================================================================
// Conditions
// ============================================================================

/// One `property operator value` test.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    pub property: String,
    pub operator: FilterOperator,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value: Option<FilterValue>,
}

impl FilterCondition {
    pub fn new(
        property: impl Into<String>,
        operator: FilterOperator,
        value: Option<FilterValue>,
    ) -> Self {
        Self {
            property: property.into(),
            operator,
            value,
        }
    }

    /// Shorthand for a text equality condition.
    pub fn equals(property: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(property, FilterOperator::Equals, Some(FilterValue::Text(value.into())))
    }

    /// Parse `property:operator[:value]`. Everything after the second colon is the value.
    pub fn parse(spec: &str) -> Result<Self, FilterError> {
        let mut parts = spec.splitn(3, ':');
        let property = parts.next().filter(|p| !p.is_empty());
        let operator = parts.next().and_then(FilterOperator::from_str);
        match (property, operator) {
            (Some(property), Some(operator)) => Ok(Self::new(
                property,
                operator,
                parts.next().map(FilterValue::parse_literal),
            )),
            _ => Err(FilterError::Malformed(spec.to_string())),
        }
    }

    /// Evaluate against one item. Missing property → false.
    pub fn matches(&self, item: &dyn PropertySource, ctx: &FilterContext) -> bool {
        let Some(actual) = item.property(&self.property) else {
            return false;
        };
        if !self.operator.supports(actual.property_type()) {
            return false;
        }
        match self.operator {
            FilterOperator::IsEmpty => return actual.is_empty(),
            FilterOperator::IsNotEmpty => return !actual.is_empty(),
            FilterOperator::PastWeek => {
                return date_of(actual).is_some_and(|d| d >= ctx.now - WEEK_MS && d <= ctx.now);
            }
            FilterOperator::NextWeek => {
                return date_of(actual).is_some_and(|d| d >= ctx.now && d <= ctx.now + WEEK_MS);
            }
            _ => {}
        }
        let Some(expected) = &self.value else {
            return false;
        };
        compare(actual, self.operator, expected)
    }

    /// Check the condition against a property schema.
    ///
    /// Properties absent from the schema are not an error; they just never match.
    pub fn validate(&self, schema: &BTreeMap<String, PropertyType>) -> Result<(), FilterError> {
        let Some(&property_type) = schema.get(&self.property) else {
            return Ok(());
        };
        if !self.operator.supports(property_type) {
            return Err(FilterError::UnsupportedOperator {
                property: self.property.clone(),
                operator: self.operator,
                property_type,
            });
        }
        if !self.operator.needs_value() {
            return Ok(());
        }
        let Some(value) = &self.value else {
            return Err(FilterError::MissingValue {
                property: self.property.clone(),
                operator: self.operator,
            });
        };
        let (ok, expected) = match property_type {
            PropertyType::Number | PropertyType::Date => (value.as_number().is_some(), "a number"),
            PropertyType::Checkbox => (value.as_bool().is_some(), "true or false"),
            _ => (value.as_text().is_some(), "text"),
        };
        if ok {
            Ok(())
        } else {
            Err(FilterError::ValueType {
                property: self.property.clone(),
                expected,
            })
        }
    }
}

fn date_of(value: &PropertyValue) -> Option<i64> {
    match value {
        PropertyValue::Date(d) => *d,
        _ => None,
    }
}

fn compare(actual: &PropertyValue, op: FilterOperator, expected: &FilterValue) -> bool {
    use FilterOperator::*;
    match actual {
        PropertyValue::Text(s)
        | PropertyValue::Url(s)
        | PropertyValue::Email(s)
        | PropertyValue::Phone(s) => {
            let Some(needle) = expected.as_text() else {
                return false;
            };
            let hay = s.to_lowercase();
            match op {
                Equals => hay == needle,
                DoesNotEqual => hay != needle,
                Contains => hay.contains(&needle),
                DoesNotContain => !hay.contains(&needle),
                StartsWith => hay.starts_with(&needle),
                EndsWith => hay.ends_with(&needle),
                _ => false,
            }
        }
        PropertyValue::Select(s) => {
            let Some(needle) = expected.as_text() else {
                return false;
            };
            let hay = s.as_deref().map(str::to_lowercase);
            match op {
                Equals => hay.as_deref() == Some(needle.as_str()),
                DoesNotEqual => hay.as_deref() != Some(needle.as_str()),
                _ => false,
            }
        }
        PropertyValue::MultiSelect(tags) => {
            let Some(needle) = expected.as_text() else {
                return false;
            };
            let has = tags.iter().any(|t| t.to_lowercase() == needle);
            match op {
                Contains => has,
                DoesNotContain => !has,
                _ => false,
            }
        }
        PropertyValue::Number(n) => {
            let (Some(n), Some(v)) = (n, expected.as_number()) else {
                return false;
            };
            match op {
                Equals => *n == v,
                DoesNotEqual => *n != v,
                GreaterThan => *n > v,
                LessThan => *n < v,
                GreaterThanOrEqualTo => *n >= v,
                LessThanOrEqualTo => *n <= v,
                _ => false,
            }
        }
        PropertyValue::Date(d) => {
            let (Some(d), Some(v)) = (d, expected.as_number()) else {
                return false;
            };
            let v = v as i64;
            // Equality is by UTC calendar day; ordering by instant.
            match op {
                Equals => d.div_euclid(DAY_MS) == v.div_euclid(DAY_MS),
                DoesNotEqual => d.div_euclid(DAY_MS) != v.div_euclid(DAY_MS),
                Before => *d < v,
                After => *d > v,
                OnOrBefore => *d <= v,
                OnOrAfter => *d >= v,
                _ => false,
            }
        }
        PropertyValue::Checkbox(b) => {
            let Some(v) = expected.as_bool() else {
                return false;
            };
            match op {
                Equals => *b == v,
                DoesNotEqual => *b != v,
                _ => false,
            }
        }
    }
}

// ============================================================================
// Groups
// ============================================================================

/// How a group's members combine.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

/// Anything that can decide whether an item passes.
pub trait Matcher {
    fn matches(&self, item: &dyn PropertySource, ctx: &FilterContext) -> bool;
}

/// Conditions joined by one combinator.
///
/// An empty group matches everything.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FilterGroup {
    #[serde(default)]
    pub combinator: Combinator,
    pub conditions: Vec<FilterCondition>,
}

impl FilterGroup {
    pub fn all(conditions: Vec<FilterCondition>) -> Self {
        Self {
            combinator: Combinator::And,
            conditions,
        }
    }

    pub fn any(conditions: Vec<FilterCondition>) -> Self {
        Self {
            combinator: Combinator::Or,
            conditions,
        }
    }

    /// Validate every condition, reporting the first problem.
    pub fn validate(&self, schema: &BTreeMap<String, PropertyType>) -> Result<(), FilterError> {
        self.conditions.iter().try_for_each(|c| c.validate(schema))
    }
}

impl Matcher for FilterGroup {
    fn matches(&self, item: &dyn PropertySource, ctx: &FilterContext) -> bool {
        if self.conditions.is_empty() {
            return true;
        }
        // Iterator::all / any stop at the first decisive condition.
        match self.combinator {
            Combinator::And => self.conditions.iter().all(|c| c.matches(item, ctx)),
            Combinator::Or => self.conditions.iter().any(|c| c.matches(item, ctx)),
        }
    }
}

/// Groups joined by one combinator (two levels, no deeper).
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct CompoundFilter {
    #[serde(default)]
    pub combinator: Combinator,
    pub groups: Vec<FilterGroup>,
}

impl CompoundFilter {
    pub fn validate(&self, schema: &BTreeMap<String, PropertyType>) -> Result<(), FilterError> {
        self.groups.iter().try_for_each(|g| g.validate(schema))
    }
}

impl From<FilterGroup> for CompoundFilter {
    fn from(group: FilterGroup) -> Self {
        Self {
            combinator: Combinator::And,
            groups: vec![group],
        }
    }
}

impl Matcher for CompoundFilter {
    fn matches(&self, item: &dyn PropertySource, ctx: &FilterContext) -> bool {
        if self.groups.is_empty() {
            return true;
        }
        match self.combinator {
            Combinator::And => self.groups.iter().all(|g| g.matches(item, ctx)),
            Combinator::Or => self.groups.iter().any(|g| g.matches(item, ctx)),
        }
    }
}

/// Keep the items that pass `filter`, in their original order.
pub fn apply_filter<'a, T, M>(items: &'a [T], filter: &M) -> Vec<&'a T>
where
    T: PropertySource,
    M: Matcher + ?Sized,
{
    apply_filter_at(items, filter, &FilterContext::now())
}

/// [`apply_filter`] with an explicit clock.
pub fn apply_filter_at<'a, T, M>(items: &'a [T], filter: &M, ctx: &FilterContext) -> Vec<&'a T>
where
    T: PropertySource,
    M: Matcher + ?Sized,
{
    items.iter().filter(|item| filter.matches(*item, ctx)).collect()
}

/// Collect a property schema from items, first declared type wins.
pub fn infer_schema<'a, I>(pages: I) -> BTreeMap<String, PropertyType>
where
    I: IntoIterator<Item = &'a Page>,
{
    let mut schema = BTreeMap::new();
    for page in pages {
        for (name, value) in &page.properties {
            schema.entry(name.clone()).or_insert_with(|| value.property_type());
        }
    }
    schema
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::cell::Cell;

    fn status(s: &str) -> Page {
        Page::new(format!("page {s}"))
            .with_property("status", PropertyValue::Select(Some(s.into())))
    }

    #[test]
    fn test_equals_keeps_matching_in_order() {
        let pages = vec![status("open"), status("closed"), status("open")];
        let group = FilterGroup::all(vec![FilterCondition::equals("status", "open")]);
        let kept = apply_filter(&pages, &group);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, pages[0].id);
        assert_eq!(kept[1].id, pages[2].id);
    }

    #[test]
    fn test_missing_property_is_false() {
        let page = Page::new("bare");
        let ctx = FilterContext::at(0);
        for op in [FilterOperator::Equals, FilterOperator::IsEmpty, FilterOperator::DoesNotEqual] {
            let cond = FilterCondition::new("status", op, Some(FilterValue::Text("open".into())));
            assert!(!cond.matches(&page, &ctx), "{op} on missing property");
        }
    }

    #[test]
    fn test_or_combinator() {
        let pages = vec![status("open"), status("closed"), status("archived")];
        let group = FilterGroup::any(vec![
            FilterCondition::equals("status", "open"),
            FilterCondition::equals("status", "closed"),
        ]);
        assert_eq!(apply_filter(&pages, &group).len(), 2);
    }

    #[test]
    fn test_empty_group_matches_everything() {
        let pages = vec![status("open"), Page::new("bare")];
        assert_eq!(apply_filter(&pages, &FilterGroup::any(vec![])).len(), 2);
    }

    struct Counting<'a> {
        page: Page,
        reads: &'a Cell<usize>,
    }

    impl PropertySource for Counting<'_> {
        fn property(&self, name: &str) -> Option<&PropertyValue> {
            self.reads.set(self.reads.get() + 1);
            self.page.property(name)
        }
    }

    #[test]
    fn test_and_short_circuits() {
        let reads = Cell::new(0);
        let item = Counting {
            page: status("closed"),
            reads: &reads,
        };
        let group = FilterGroup::all(vec![
            FilterCondition::equals("status", "open"),
            FilterCondition::equals("status", "closed"),
        ]);
        assert!(!group.matches(&item, &FilterContext::at(0)));
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn test_or_short_circuits() {
        let reads = Cell::new(0);
        let item = Counting {
            page: status("open"),
            reads: &reads,
        };
        let group = FilterGroup::any(vec![
            FilterCondition::equals("status", "open"),
            FilterCondition::equals("status", "closed"),
        ]);
        assert!(group.matches(&item, &FilterContext::at(0)));
        assert_eq!(reads.get(), 1);
    }

    #[test]
    fn test_text_operators_case_insensitive() {
        let page =
            Page::new("p").with_property("email", PropertyValue::Email("Jin@Example.com".into()));
        let ctx = FilterContext::at(0);
        let check = |op, v: &str| {
            FilterCondition::new("email", op, Some(FilterValue::Text(v.into())))
                .matches(&page, &ctx)
        };
        assert!(check(FilterOperator::Contains, "example"));
        assert!(check(FilterOperator::EndsWith, ".COM"));
        assert!(check(FilterOperator::StartsWith, "jin@"));
        assert!(!check(FilterOperator::DoesNotContain, "jin"));
    }

    #[test]
    fn test_number_comparisons() {
        let page = Page::new("p").with_property("budget", PropertyValue::Number(Some(1200.0)));
        let ctx = FilterContext::at(0);
        let cond = |op, v| FilterCondition::new("budget", op, Some(FilterValue::Number(v)));
        assert!(cond(FilterOperator::GreaterThan, 1000.0).matches(&page, &ctx));
        assert!(cond(FilterOperator::LessThanOrEqualTo, 1200.0).matches(&page, &ctx));
        assert!(!cond(FilterOperator::LessThan, 1200.0).matches(&page, &ctx));
    }

    #[test]
    fn test_unset_number_is_empty_not_comparable() {
        let page = Page::new("p").with_property("budget", PropertyValue::Number(None));
        let ctx = FilterContext::at(0);
        assert!(FilterCondition::new("budget", FilterOperator::IsEmpty, None).matches(&page, &ctx));
        let zero = Some(FilterValue::Number(0.0));
        let above_zero = FilterCondition::new("budget", FilterOperator::GreaterThan, zero);
        assert!(!above_zero.matches(&page, &ctx));
    }

    #[test]
    fn test_multi_select_contains() {
        let page = Page::new("p").with_property(
            "tags",
            PropertyValue::MultiSelect(vec!["Skin".into(), "Seoul".into()]),
        );
        let ctx = FilterContext::at(0);
        let cond = |op| FilterCondition::new("tags", op, Some(FilterValue::Text("seoul".into())));
        assert!(cond(FilterOperator::Contains).matches(&page, &ctx));
        assert!(!cond(FilterOperator::DoesNotContain).matches(&page, &ctx));
        assert!(!cond(FilterOperator::Equals).matches(&page, &ctx));
    }

    #[test]
    fn test_relative_dates() {
        let now = 100 * DAY_MS;
        let ctx = FilterContext::at(now);
        let page = |d| Page::new("p").with_property("visit", PropertyValue::Date(Some(d)));
        let past = FilterCondition::new("visit", FilterOperator::PastWeek, None);
        let next = FilterCondition::new("visit", FilterOperator::NextWeek, None);

        assert!(past.matches(&page(now - 3 * DAY_MS), &ctx));
        assert!(!past.matches(&page(now - 8 * DAY_MS), &ctx));
        assert!(next.matches(&page(now + DAY_MS), &ctx));
        assert!(!next.matches(&page(now - DAY_MS), &ctx));
    }

    #[test]
    fn test_date_equals_same_day() {
        let ctx = FilterContext::at(0);
        let page =
            Page::new("p").with_property("visit", PropertyValue::Date(Some(10 * DAY_MS + 5_000)));
        let cond = FilterCondition::new(
            "visit",
            FilterOperator::Equals,
            Some(FilterValue::Number((10 * DAY_MS + 60_000) as f64)),
        );
        assert!(cond.matches(&page, &ctx));
    }

    #[test]
    fn test_checkbox() {
        let ctx = FilterContext::at(0);
        let page = Page::new("p").with_property("paid", PropertyValue::Checkbox(false));
        let cond =
            FilterCondition::new("paid", FilterOperator::Equals, Some(FilterValue::Bool(false)));
        assert!(cond.matches(&page, &ctx));
        let empty = FilterCondition::new("paid", FilterOperator::IsEmpty, None);
        assert!(!empty.matches(&page, &ctx));
    }

    #[test]
    fn test_validate_reports_unsupported_operator() {
        let pages = vec![status("open")];
        let schema = infer_schema(&pages);
        let group = FilterGroup::all(vec![FilterCondition::new(
            "status",
            FilterOperator::GreaterThan,
            Some(FilterValue::Number(1.0)),
        )]);
        assert_eq!(
            group.validate(&schema),
            Err(FilterError::UnsupportedOperator {
                property: "status".into(),
                operator: FilterOperator::GreaterThan,
                property_type: PropertyType::Select,
            })
        );
    }

    #[test]
    fn test_validate_reports_missing_value() {
        let schema = infer_schema(&[status("open")]);
        let group =
            FilterGroup::all(vec![FilterCondition::new("status", FilterOperator::Equals, None)]);
        assert!(matches!(group.validate(&schema), Err(FilterError::MissingValue { .. })));
    }

    #[test]
    fn test_validate_allows_unknown_property() {
        let schema = infer_schema(&[status("open")]);
        let group = FilterGroup::all(vec![FilterCondition::equals("owner", "jin")]);
        assert_eq!(group.validate(&schema), Ok(()));
    }

    #[test]
    fn test_compound_filter() {
        let pages = vec![
            status("open").with_property("budget", PropertyValue::Number(Some(10.0))),
            status("open").with_property("budget", PropertyValue::Number(Some(500.0))),
            status("closed").with_property("budget", PropertyValue::Number(Some(900.0))),
        ];
        let filter = CompoundFilter {
            combinator: Combinator::Or,
            groups: vec![
                FilterGroup::all(vec![
                    FilterCondition::equals("status", "open"),
                    FilterCondition::new(
                        "budget",
                        FilterOperator::GreaterThan,
                        Some(FilterValue::Number(100.0)),
                    ),
                ]),
                FilterGroup::all(vec![FilterCondition::equals("status", "closed")]),
            ],
        };
        let kept = apply_filter(&pages, &filter);
        assert_eq!(kept.len(), 2);
        assert_eq!(kept[0].id, pages[1].id);
        assert_eq!(kept[1].id, pages[2].id);
    }

    #[test]
    fn test_parse_condition() {
        let cond = FilterCondition::parse("budget:gte:250").unwrap();
        assert_eq!(cond.operator, FilterOperator::GreaterThanOrEqualTo);
        assert_eq!(cond.value, Some(FilterValue::Number(250.0)));

        let cond = FilterCondition::parse("note:is_empty").unwrap();
        assert_eq!(cond.value, None);

        let cond = FilterCondition::parse("url:contains:https://x.y").unwrap();
        assert_eq!(cond.value, Some(FilterValue::Text("https://x.y".into())));

        assert!(FilterCondition::parse("status:bogus:x").is_err());
    }

    #[test]
    fn test_group_json_shape() {
        let json = r#"{"combinator":"or","conditions":[{"property":"status","operator":"equals","value":"open"}]}"#;
        let group: FilterGroup = serde_json::from_str(json).unwrap();
        assert_eq!(group.combinator, Combinator::Or);
        assert_eq!(group.conditions[0].value, Some(FilterValue::Text("open".into())));
    }
}
