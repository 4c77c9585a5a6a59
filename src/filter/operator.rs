use serde::{Deserialize, Serialize};
use std::fmt;

use super::error::FilterError;

/// Comparison kinds understood by the filter language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Operator {
    Eq,
    Not,
    Like,
    NotLike,
    Gt,
    Gte,
    Lt,
    Lte,
    Ne,
    In,
    Nin,
    Between,
    IsNull,
    IsNotNull,
    True,
    False,
    StartingWith,
    EndingWith,
    Containing,
    Before,
    After,
    IgnoreCase,
    Distinct,
}

/// Suffix vocabulary, lowercase. Longest match wins when parsing argument keys.
const VOCABULARY: &[(&str, Operator)] = &[
    ("equals", Operator::Eq),
    ("is", Operator::Eq),
    ("eq", Operator::Eq),
    ("not", Operator::Not),
    ("notequals", Operator::Ne),
    ("notequal", Operator::Ne),
    ("ne", Operator::Ne),
    ("neq", Operator::Ne),
    ("like", Operator::Like),
    ("notlike", Operator::NotLike),
    ("greaterthan", Operator::Gt),
    ("gt", Operator::Gt),
    ("after", Operator::After),
    ("isafter", Operator::After),
    ("greaterthanequal", Operator::Gte),
    ("greaterthanorequal", Operator::Gte),
    ("greaterthanequals", Operator::Gte),
    ("gte", Operator::Gte),
    ("lessthan", Operator::Lt),
    ("lt", Operator::Lt),
    ("before", Operator::Before),
    ("isbefore", Operator::Before),
    ("lessthanequal", Operator::Lte),
    ("lessthanorequal", Operator::Lte),
    ("lessthanequals", Operator::Lte),
    ("lte", Operator::Lte),
    ("in", Operator::In),
    ("isin", Operator::In),
    ("notin", Operator::Nin),
    ("isnotin", Operator::Nin),
    ("nin", Operator::Nin),
    ("between", Operator::Between),
    ("isbetween", Operator::Between),
    ("isnull", Operator::IsNull),
    ("null", Operator::IsNull),
    ("isnotnull", Operator::IsNotNull),
    ("notnull", Operator::IsNotNull),
    ("true", Operator::True),
    ("istrue", Operator::True),
    ("false", Operator::False),
    ("isfalse", Operator::False),
    ("startingwith", Operator::StartingWith),
    ("startswith", Operator::StartingWith),
    ("endingwith", Operator::EndingWith),
    ("endswith", Operator::EndingWith),
    ("containing", Operator::Containing),
    ("contains", Operator::Containing),
    ("ignorecase", Operator::IgnoreCase),
    ("distinct", Operator::Distinct),
];

impl Operator {
    /// Parse a standalone token such as "gte", "GreaterThanEqual" or "after"
    pub fn parse(token: &str) -> Result<Self, FilterError> {
        let lowered = token.to_ascii_lowercase();
        VOCABULARY
            .iter()
            .find(|(word, _)| *word == lowered)
            .map(|(_, op)| *op)
            .ok_or_else(|| FilterError::UnsupportedOperator(token.to_string()))
    }

    /// Find the longest vocabulary suffix of `key` that leaves a non-empty
    /// field part ending on a camel-case boundary. Returns the operator and
    /// the byte length of the matched suffix.
    pub fn match_suffix(key: &str) -> Option<(Operator, usize)> {
        let lowered = key.to_ascii_lowercase();
        VOCABULARY
            .iter()
            .filter(|(word, _)| word.len() < key.len() && lowered.ends_with(word))
            .filter(|(word, _)| {
                let split = key.len() - word.len();
                key.is_char_boundary(split)
                    && key[split..].starts_with(|c: char| c.is_ascii_uppercase())
            })
            .max_by_key(|(word, _)| word.len())
            .map(|(word, op)| (*op, word.len()))
    }

    /// Canonical comparison family; BEFORE/AFTER order like LT/GT
    pub fn family(&self) -> Operator {
        match self {
            Operator::After => Operator::Gt,
            Operator::Before => Operator::Lt,
            Operator::Not => Operator::Ne,
            other => *other,
        }
    }

    /// Operators that take no value from the argument
    pub fn is_unary(&self) -> bool {
        matches!(
            self,
            Operator::IsNull | Operator::IsNotNull | Operator::True | Operator::False
        )
    }

    /// Substring-style operators that honour a chained IgnoreCase
    pub fn is_string_match(&self) -> bool {
        matches!(
            self,
            Operator::Like
                | Operator::NotLike
                | Operator::StartingWith
                | Operator::EndingWith
                | Operator::Containing
                | Operator::Eq
                | Operator::Ne
                | Operator::Not
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operator::Eq => "EQ",
            Operator::Not => "NOT",
            Operator::Like => "LIKE",
            Operator::NotLike => "NOT_LIKE",
            Operator::Gt => "GT",
            Operator::Gte => "GTE",
            Operator::Lt => "LT",
            Operator::Lte => "LTE",
            Operator::Ne => "NE",
            Operator::In => "IN",
            Operator::Nin => "NIN",
            Operator::Between => "BETWEEN",
            Operator::IsNull => "IS_NULL",
            Operator::IsNotNull => "IS_NOT_NULL",
            Operator::True => "TRUE",
            Operator::False => "FALSE",
            Operator::StartingWith => "STARTING_WITH",
            Operator::EndingWith => "ENDING_WITH",
            Operator::Containing => "CONTAINING",
            Operator::Before => "BEFORE",
            Operator::After => "AFTER",
            Operator::IgnoreCase => "IGNORE_CASE",
            Operator::Distinct => "DISTINCT",
        }
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokens_normalize_case_insensitively() {
        assert_eq!(Operator::parse("GreaterThanEqual").unwrap(), Operator::Gte);
        assert_eq!(Operator::parse("gte").unwrap(), Operator::Gte);
        assert_eq!(Operator::parse("greaterthan").unwrap(), Operator::Gt);
        assert_eq!(Operator::parse("AFTER").unwrap().family(), Operator::Gt);
        assert_eq!(Operator::parse("before").unwrap().family(), Operator::Lt);
        assert_eq!(Operator::parse("NotIn").unwrap(), Operator::Nin);
    }

    #[test]
    fn unknown_token_is_unsupported() {
        assert_eq!(
            Operator::parse("roughly"),
            Err(FilterError::UnsupportedOperator("roughly".to_string()))
        );
    }

    #[test]
    fn longest_suffix_wins() {
        assert_eq!(
            Operator::match_suffix("salarioLessThanEqual"),
            Some((Operator::Lte, "lessthanequal".len()))
        );
        assert_eq!(
            Operator::match_suffix("salarioLessThan"),
            Some((Operator::Lt, "lessthan".len()))
        );
        assert_eq!(
            Operator::match_suffix("nombreNotIn"),
            Some((Operator::Nin, "notin".len()))
        );
    }

    #[test]
    fn suffix_must_start_on_camel_boundary() {
        // "domain" ends with "in" but not on an uppercase boundary
        assert_eq!(Operator::match_suffix("domain"), None);
        // the whole key is never consumed as an operator
        assert_eq!(Operator::match_suffix("Between"), None);
        assert_eq!(Operator::match_suffix("idIn"), Some((Operator::In, 2)));
    }
}
