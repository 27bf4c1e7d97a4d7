//! Predicate model and the pure selector.
//!
//! # Responsibility
//! - Match single item fields against an expected value with a comparator.
//! - Combine predicates with `MatchAll` / `MatchAny` policies.
//! - Select matching items from a raw fetched collection.
//!
//! # Invariants
//! - A `FilterSet` always holds at least one predicate; evaluation is total.
//! - Regex patterns are compiled when the predicate is built, never while
//!   evaluating.
//! - `Equals` / `NotEquals` compare exact strings unless fold-case is requested.
//!
//! # Absent fields
//! A field the item does not carry resolves to [`FieldValue::Absent`], which is
//! distinct from an empty string. `Equals`, `Contains` and `Matches` are false
//! for an absent field; `NotEquals` and `NotContains` are true, being the exact
//! negations of `Equals` and `Contains`.

use crate::collection::live_unique;
use crate::model::item::{Item, BODY_FIELD, LABEL_FIELD};
use regex::{Regex, RegexBuilder};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::str::FromStr;

/// Validation errors raised while building predicates and filter sets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterError {
    EmptyFilterSet,
    InvalidPattern { pattern: String, message: String },
    UnknownComparator(String),
    UnknownField(String),
}

impl Display for FilterError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyFilterSet => write!(f, "filter set must contain at least one predicate"),
            Self::InvalidPattern { pattern, message } => {
                write!(f, "invalid regex pattern `{pattern}`: {message}")
            }
            Self::UnknownComparator(value) => write!(f, "unknown comparator `{value}`"),
            Self::UnknownField(value) => write!(f, "unknown field selector `{value}`"),
        }
    }
}

impl Error for FilterError {}

/// Compiles a user-supplied pattern with standard, unanchored regex semantics.
pub fn compile_pattern(pattern: &str, fold_case: bool) -> Result<Regex, FilterError> {
    RegexBuilder::new(pattern)
        .case_insensitive(fold_case)
        .build()
        .map_err(|err| FilterError::InvalidPattern {
            pattern: pattern.to_string(),
            message: err.to_string(),
        })
}

/// Which part of an item a predicate inspects.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FieldSelector {
    Id,
    Type,
    Label,
    Body,
    /// Any other named content field, looked up verbatim.
    Named(String),
}

impl FromStr for FieldSelector {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(FilterError::UnknownField(value.to_string()));
        }
        Ok(match trimmed.to_ascii_lowercase().as_str() {
            "uuid" | "id" => Self::Id,
            "type" | "content_type" => Self::Type,
            "title" | "label" => Self::Label,
            "text" | "body" => Self::Body,
            _ => Self::Named(trimmed.to_string()),
        })
    }
}

/// Result of resolving a field selector against one item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Present(&'a str),
    Absent,
}

impl FieldSelector {
    pub fn resolve<'a>(&self, item: &'a Item) -> FieldValue<'a> {
        let value = match self {
            Self::Id => Some(item.id.as_str()),
            Self::Type => Some(item.item_type.as_str()),
            Self::Label => item.field(LABEL_FIELD),
            Self::Body => item.field(BODY_FIELD),
            Self::Named(name) => item.field(name),
        };
        value.map_or(FieldValue::Absent, FieldValue::Present)
    }
}

/// Closed set of comparators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Comparator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    /// Unanchored regular expression match.
    Matches,
}

impl FromStr for Comparator {
    type Err = FilterError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "==" | "eq" | "equals" => Ok(Self::Equals),
            "!=" | "ne" | "not-equals" => Ok(Self::NotEquals),
            "contains" => Ok(Self::Contains),
            "!contains" | "not-contains" => Ok(Self::NotContains),
            "~" | "matches" | "regex" => Ok(Self::Matches),
            other => Err(FilterError::UnknownComparator(other.to_string())),
        }
    }
}

/// `(field, comparator, expected value)` triple over one item.
#[derive(Debug, Clone)]
pub struct Predicate {
    field: FieldSelector,
    comparator: Comparator,
    value: String,
    fold_case: bool,
    pattern: Option<Regex>,
}

impl Predicate {
    /// Builds a case-respecting predicate.
    ///
    /// # Errors
    /// - `FilterError::InvalidPattern` when `comparator` is `Matches` and
    ///   `value` is not a valid regex.
    pub fn new(
        field: FieldSelector,
        comparator: Comparator,
        value: impl Into<String>,
    ) -> Result<Self, FilterError> {
        Self::build(field, comparator, value.into(), false)
    }

    /// Builds a predicate that compares with case folding.
    pub fn folded(
        field: FieldSelector,
        comparator: Comparator,
        value: impl Into<String>,
    ) -> Result<Self, FilterError> {
        Self::build(field, comparator, value.into(), true)
    }

    /// Exact equality predicate. Infallible since no pattern is compiled.
    pub fn equals(field: FieldSelector, value: impl Into<String>) -> Self {
        Self {
            field,
            comparator: Comparator::Equals,
            value: value.into(),
            fold_case: false,
            pattern: None,
        }
    }

    /// Parses the caller-facing `(field, comparator, value)` string triple.
    pub fn parse(field: &str, comparator: &str, value: &str) -> Result<Self, FilterError> {
        Self::new(field.parse()?, comparator.parse()?, value)
    }

    fn build(
        field: FieldSelector,
        comparator: Comparator,
        value: String,
        fold_case: bool,
    ) -> Result<Self, FilterError> {
        let pattern = match comparator {
            Comparator::Matches => Some(compile_pattern(&value, fold_case)?),
            _ => None,
        };
        Ok(Self {
            field,
            comparator,
            value,
            fold_case,
            pattern,
        })
    }

    pub fn field(&self) -> &FieldSelector {
        &self.field
    }

    pub fn comparator(&self) -> Comparator {
        self.comparator
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn is_fold_case(&self) -> bool {
        self.fold_case
    }

    /// Evaluates this predicate against one item.
    pub fn evaluate(&self, item: &Item) -> bool {
        match self.field.resolve(item) {
            FieldValue::Present(actual) => self.compare(actual),
            FieldValue::Absent => matches!(
                self.comparator,
                Comparator::NotEquals | Comparator::NotContains
            ),
        }
    }

    fn compare(&self, actual: &str) -> bool {
        match self.comparator {
            Comparator::Equals => self.equals_value(actual),
            Comparator::NotEquals => !self.equals_value(actual),
            Comparator::Contains => self.contains_value(actual),
            Comparator::NotContains => !self.contains_value(actual),
            Comparator::Matches => self
                .pattern
                .as_ref()
                .is_some_and(|pattern| pattern.is_match(actual)),
        }
    }

    fn equals_value(&self, actual: &str) -> bool {
        if self.fold_case {
            actual.to_lowercase() == self.value.to_lowercase()
        } else {
            actual == self.value
        }
    }

    fn contains_value(&self, actual: &str) -> bool {
        if self.fold_case {
            actual.to_lowercase().contains(&self.value.to_lowercase())
        } else {
            actual.contains(self.value.as_str())
        }
    }
}

/// Combination policy for a filter set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MatchPolicy {
    /// Conjunction.
    #[default]
    MatchAll,
    /// Disjunction.
    MatchAny,
}

/// Non-empty predicate list plus a combination policy.
#[derive(Debug, Clone)]
pub struct FilterSet {
    predicates: Vec<Predicate>,
    policy: MatchPolicy,
}

impl FilterSet {
    /// # Errors
    /// - `FilterError::EmptyFilterSet` when `predicates` is empty.
    pub fn new(predicates: Vec<Predicate>, policy: MatchPolicy) -> Result<Self, FilterError> {
        if predicates.is_empty() {
            return Err(FilterError::EmptyFilterSet);
        }
        Ok(Self { predicates, policy })
    }

    pub fn all(predicates: Vec<Predicate>) -> Result<Self, FilterError> {
        Self::new(predicates, MatchPolicy::MatchAll)
    }

    pub fn any(predicates: Vec<Predicate>) -> Result<Self, FilterError> {
        Self::new(predicates, MatchPolicy::MatchAny)
    }

    /// Single exact-label filter.
    pub fn label_equals(label: impl Into<String>) -> Self {
        Self {
            predicates: vec![Predicate::equals(FieldSelector::Label, label)],
            policy: MatchPolicy::MatchAll,
        }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn policy(&self) -> MatchPolicy {
        self.policy
    }

    /// Exact label the store may use to narrow a fetch.
    ///
    /// Only returned when the label equality must hold for every match, that
    /// is under `MatchAll` with a case-respecting `Equals` on the label.
    pub fn label_hint(&self) -> Option<&str> {
        if self.policy != MatchPolicy::MatchAll {
            return None;
        }
        self.predicates
            .iter()
            .find(|predicate| {
                predicate.field == FieldSelector::Label
                    && predicate.comparator == Comparator::Equals
                    && !predicate.fold_case
            })
            .map(Predicate::value)
    }
}

/// Evaluates one predicate against one item.
pub fn evaluate(item: &Item, predicate: &Predicate) -> bool {
    predicate.evaluate(item)
}

/// Evaluates a filter set, short-circuiting per its policy.
pub fn evaluate_filter_set(item: &Item, filter_set: &FilterSet) -> bool {
    debug_assert!(
        !filter_set.predicates.is_empty(),
        "FilterSet::new rejects empty predicate lists"
    );
    match filter_set.policy {
        MatchPolicy::MatchAll => filter_set.predicates.iter().all(|p| p.evaluate(item)),
        MatchPolicy::MatchAny => filter_set.predicates.iter().any(|p| p.evaluate(item)),
    }
}

/// Selects matching live items from a raw fetched collection.
///
/// Duplicates and tombstones are removed first; matches keep their original
/// relative order.
pub fn select(items: &[Item], filter_set: &FilterSet) -> Vec<Item> {
    live_unique(items)
        .into_iter()
        .filter(|item| evaluate_filter_set(item, filter_set))
        .collect()
}
