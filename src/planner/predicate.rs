//! Predicates
//!
//! A [`Where`] is an ordered conjunction of per-field [`Condition`]s.

use std::cmp::Ordering;

use crate::value::{Entity, Value};

/// Constraint on one field
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Equals(Value),
    NotEquals(Value),
    In(Vec<Value>),
    NotIn(Vec<Value>),
    Gt(Value),
    Gte(Value),
    Lt(Value),
    Lte(Value),
}

impl Condition {
    /// Evaluate against a field value (`None` = field absent, treated as null)
    ///
    /// Comparisons across value kinds never match.
    pub fn matches(&self, actual: Option<&Value>) -> bool {
        let actual = actual.unwrap_or(&Value::Null);
        let cmp = |expected: &Value| actual.compare(expected);

        match self {
            Condition::Equals(expected) => cmp(expected) == Some(Ordering::Equal),
            Condition::NotEquals(expected) => cmp(expected) != Some(Ordering::Equal),
            Condition::In(options) => options
                .iter()
                .any(|o| cmp(o) == Some(Ordering::Equal)),
            Condition::NotIn(options) => !options
                .iter()
                .any(|o| cmp(o) == Some(Ordering::Equal)),
            Condition::Gt(bound) => cmp(bound) == Some(Ordering::Greater),
            Condition::Gte(bound) => matches!(
                cmp(bound),
                Some(Ordering::Greater) | Some(Ordering::Equal)
            ),
            Condition::Lt(bound) => cmp(bound) == Some(Ordering::Less),
            Condition::Lte(bound) => {
                matches!(cmp(bound), Some(Ordering::Less) | Some(Ordering::Equal))
            }
        }
    }

    pub fn is_equality(&self) -> bool {
        matches!(self, Condition::Equals(_))
    }
}

/// Conjunction of field conditions; empty matches every record
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Where {
    conditions: Vec<(String, Condition)>,
}

impl Where {
    /// Matches everything
    pub fn all() -> Self {
        Self::default()
    }

    pub fn new() -> Self {
        Self::default()
    }

    pub fn condition(mut self, field: impl Into<String>, condition: Condition) -> Self {
        self.conditions.push((field.into(), condition));
        self
    }

    pub fn equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::Equals(value.into()))
    }

    pub fn not_equals(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::NotEquals(value.into()))
    }

    pub fn is_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.condition(field, Condition::In(values))
    }

    pub fn not_in<V: Into<Value>>(
        self,
        field: impl Into<String>,
        values: impl IntoIterator<Item = V>,
    ) -> Self {
        let values = values.into_iter().map(Into::into).collect();
        self.condition(field, Condition::NotIn(values))
    }

    pub fn gt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::Gt(value.into()))
    }

    pub fn gte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::Gte(value.into()))
    }

    pub fn lt(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::Lt(value.into()))
    }

    pub fn lte(self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.condition(field, Condition::Lte(value.into()))
    }

    pub fn conditions(&self) -> &[(String, Condition)] {
        &self.conditions
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn len(&self) -> usize {
        self.conditions.len()
    }

    /// True when every condition holds for `entity`
    pub fn matches(&self, entity: &Entity) -> bool {
        self.conditions
            .iter()
            .all(|(field, condition)| condition.matches(entity.get(field)))
    }

    /// Copy of this predicate without the condition at `index`
    pub(crate) fn without(&self, index: usize) -> Where {
        let mut conditions = self.conditions.clone();
        conditions.remove(index);
        Where { conditions }
    }
}
