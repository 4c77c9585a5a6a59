use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::operator::Operator;

/// Operand of a condition, shaped by its operator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum FilterValue {
    /// IS_NULL / IS_NOT_NULL / TRUE / FALSE
    None,
    Scalar(Value),
    /// IN / NIN
    List(Vec<Value>),
    /// BETWEEN, inclusive on both ends
    Range(Value, Value),
}

/// A single field/operator/value comparison
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    field: String,
    operator: Operator,
    value: FilterValue,
    #[serde(default)]
    ignore_case: bool,
}

impl Condition {
    pub fn new(field: impl Into<String>, operator: Operator, value: FilterValue) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            ignore_case: false,
        }
    }

    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, FilterValue::Scalar(value.into()))
    }

    pub fn ignoring_case(mut self) -> Self {
        self.ignore_case = true;
        self
    }

    /// Dotted relation path, e.g. `oficina.provincia.nombre`
    pub fn field(&self) -> &str {
        &self.field
    }

    pub fn path(&self) -> impl Iterator<Item = &str> {
        self.field.split('.')
    }

    pub fn operator(&self) -> Operator {
        self.operator
    }

    pub fn value(&self) -> &FilterValue {
        &self.value
    }

    pub fn ignore_case(&self) -> bool {
        self.ignore_case
    }
}

/// Boolean tree over conditions.
///
/// An empty `And` matches every record; an empty `Or` matches none.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", content = "children", rename_all = "snake_case")]
pub enum FilterExpression {
    And(Vec<FilterExpression>),
    Or(Vec<FilterExpression>),
    Condition(Condition),
}

impl FilterExpression {
    pub fn and(children: Vec<FilterExpression>) -> Self {
        FilterExpression::And(children)
    }

    pub fn or(children: Vec<FilterExpression>) -> Self {
        FilterExpression::Or(children)
    }

    pub fn condition(condition: Condition) -> Self {
        FilterExpression::Condition(condition)
    }

    /// Matches everything
    pub fn always() -> Self {
        FilterExpression::And(Vec::new())
    }

    /// Matches nothing
    pub fn never() -> Self {
        FilterExpression::Or(Vec::new())
    }

    /// AND-augment with another expression; the result never matches more than `self`
    pub fn narrow(self, extra: FilterExpression) -> Self {
        if extra.is_always() {
            return self;
        }
        if self.is_always() {
            return extra;
        }
        match self {
            FilterExpression::And(mut children) => {
                children.push(extra);
                FilterExpression::And(children)
            }
            other => FilterExpression::And(vec![other, extra]),
        }
    }

    pub fn is_always(&self) -> bool {
        matches!(self, FilterExpression::And(children) if children.is_empty())
    }

    pub fn is_never(&self) -> bool {
        matches!(self, FilterExpression::Or(children) if children.is_empty())
    }

    /// All leaf conditions, depth first
    pub fn conditions(&self) -> Vec<&Condition> {
        let mut out = Vec::new();
        self.collect_conditions(&mut out);
        out
    }

    fn collect_conditions<'a>(&'a self, out: &mut Vec<&'a Condition>) {
        match self {
            FilterExpression::And(children) | FilterExpression::Or(children) => {
                for child in children {
                    child.collect_conditions(out);
                }
            }
            FilterExpression::Condition(condition) => out.push(condition),
        }
    }
}

impl Default for FilterExpression {
    fn default() -> Self {
        Self::always()
    }
}

impl From<Condition> for FilterExpression {
    fn from(condition: Condition) -> Self {
        FilterExpression::Condition(condition)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortDirection {
    Asc,
    Desc,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSpec {
    pub field: String,
    pub sort: SortDirection,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_keeps_existing_and_children() {
        let base = FilterExpression::and(vec![Condition::eq("a", 1).into()]);
        let narrowed = base.narrow(Condition::eq("b", 2).into());
        match narrowed {
            FilterExpression::And(children) => assert_eq!(children.len(), 2),
            other => panic!("expected AND, got {:?}", other),
        }
    }

    #[test]
    fn narrow_with_always_is_identity() {
        let base: FilterExpression = Condition::eq("a", 1).into();
        assert_eq!(base.clone().narrow(FilterExpression::always()), base);
        assert_eq!(FilterExpression::always().narrow(base.clone()), base);
    }

    #[test]
    fn conditions_are_collected_depth_first() {
        let expr = FilterExpression::and(vec![
            Condition::eq("a", 1).into(),
            FilterExpression::or(vec![Condition::eq("b", 2).into(), Condition::eq("c", 3).into()]),
        ]);
        let fields: Vec<&str> = expr.conditions().iter().map(|c| c.field()).collect();
        assert_eq!(fields, vec!["a", "b", "c"]);
    }
}
