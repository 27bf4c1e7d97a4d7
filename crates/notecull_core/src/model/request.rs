//! Caller-built request shapes.
//!
//! These are constructed upstream (CLI flags, config) and consumed once by the
//! query and mutation services.

use crate::model::filter::{
    Comparator, FieldSelector, FilterError, FilterSet, MatchPolicy, Predicate,
};
use crate::model::item::ItemType;
use serde::{Deserialize, Serialize};

/// How label values in a deletion request are interpreted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabelMatch {
    /// Case-sensitive string equality.
    #[default]
    Exact,
    /// Unanchored regular expression.
    Regex,
}

/// Identifier, label and pattern deletion shapes; their matches are unioned.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeletionRequest {
    #[serde(default)]
    pub item_type: ItemType,
    #[serde(default)]
    pub identifiers: Vec<String>,
    #[serde(default)]
    pub labels: Vec<String>,
    /// When set, every entry in `labels` is a pattern.
    #[serde(default)]
    pub regex: bool,
}

impl DeletionRequest {
    pub fn by_identifiers<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            identifiers: ids.into_iter().map(Into::into).collect(),
            ..Self::default()
        }
    }

    pub fn by_labels<I, S>(labels: I, mode: LabelMatch) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            labels: labels.into_iter().map(Into::into).collect(),
            regex: mode == LabelMatch::Regex,
            ..Self::default()
        }
    }

    pub fn with_item_type(mut self, item_type: ItemType) -> Self {
        self.item_type = item_type;
        self
    }

    pub fn label_match(&self) -> LabelMatch {
        if self.regex {
            LabelMatch::Regex
        } else {
            LabelMatch::Exact
        }
    }

    pub fn is_empty(&self) -> bool {
        self.identifiers.is_empty() && self.labels.is_empty()
    }

    /// Expresses the union of all shapes as one `MatchAny` filter set.
    ///
    /// Returns `Ok(None)` for a request with nothing to match. Every pattern is
    /// compiled here, so an invalid regex fails before any store call.
    pub fn to_filter_set(&self) -> Result<Option<FilterSet>, FilterError> {
        let mut predicates: Vec<Predicate> = self
            .identifiers
            .iter()
            .map(|id| Predicate::equals(FieldSelector::Id, id.as_str()))
            .collect();
        for label in &self.labels {
            let predicate = match self.label_match() {
                LabelMatch::Exact => Predicate::equals(FieldSelector::Label, label.as_str()),
                LabelMatch::Regex => {
                    Predicate::new(FieldSelector::Label, Comparator::Matches, label.as_str())?
                }
            };
            predicates.push(predicate);
        }

        if predicates.is_empty() {
            return Ok(None);
        }
        FilterSet::any(predicates).map(Some)
    }
}

/// Tombstone every live item of one type.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WipeRequest {
    pub item_type: ItemType,
}

impl WipeRequest {
    pub fn new(item_type: ItemType) -> Self {
        Self { item_type }
    }
}

/// One `(field, comparator, value)` entry of a [`FilterSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PredicateSpec {
    pub field: String,
    pub comparator: String,
    pub value: String,
    #[serde(default)]
    pub fold_case: bool,
}

/// Serializable filter set shape: `{predicates: [...], matchAny: bool}`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FilterSpec {
    pub predicates: Vec<PredicateSpec>,
    #[serde(default)]
    pub match_any: bool,
}

impl FilterSpec {
    /// Validates and compiles this spec into a [`FilterSet`].
    pub fn build(&self) -> Result<FilterSet, FilterError> {
        let predicates = self
            .predicates
            .iter()
            .map(|spec| {
                let field = spec.field.parse()?;
                let comparator = spec.comparator.parse()?;
                if spec.fold_case {
                    Predicate::folded(field, comparator, spec.value.as_str())
                } else {
                    Predicate::new(field, comparator, spec.value.as_str())
                }
            })
            .collect::<Result<Vec<_>, _>>()?;
        let policy = if self.match_any {
            MatchPolicy::MatchAny
        } else {
            MatchPolicy::MatchAll
        };
        FilterSet::new(predicates, policy)
    }
}
