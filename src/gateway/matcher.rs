use std::cmp::Ordering;

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde_json::Value;

use crate::filter::{Condition, FilterExpression, FilterValue, Operator};
use crate::types::Record;

/// Evaluate a filter tree against one record
pub fn matches(expr: &FilterExpression, record: &Record) -> bool {
    match expr {
        FilterExpression::And(children) => children.iter().all(|child| matches(child, record)),
        FilterExpression::Or(children) => children.iter().any(|child| matches(child, record)),
        FilterExpression::Condition(condition) => matches_condition(condition, record),
    }
}

/// Values reachable through a dotted path. To-many relations fan out, so one
/// path may yield several values; an absent path yields none.
pub fn resolve<'a>(record: &'a Record, path: &str) -> Vec<&'a Value> {
    let mut segments = path.split('.');
    let Some(first) = segments.next() else { return Vec::new() };
    let mut current: Vec<&Value> = record.get(first).into_iter().collect();

    for segment in segments {
        let mut next = Vec::new();
        for value in current {
            collect_field(value, segment, &mut next);
        }
        current = next;
    }

    // A to-many leaf compares element-wise
    current
        .into_iter()
        .flat_map(|value| match value {
            Value::Array(items) => items.iter().collect::<Vec<_>>(),
            other => vec![other],
        })
        .collect()
}

fn collect_field<'a>(value: &'a Value, field: &str, out: &mut Vec<&'a Value>) {
    match value {
        Value::Object(map) => out.extend(map.get(field)),
        Value::Array(items) => {
            for item in items {
                collect_field(item, field, out);
            }
        }
        _ => {}
    }
}

pub fn matches_condition(condition: &Condition, record: &Record) -> bool {
    let values = resolve(record, condition.field());
    let ignore_case = condition.ignore_case();
    let operator = condition.operator();

    match operator {
        Operator::IsNull => return values.is_empty() || values.iter().any(|v| v.is_null()),
        Operator::IsNotNull => return values.iter().any(|v| !v.is_null()),
        Operator::Distinct => return true,
        _ => {}
    }

    // Absent value fails every other operator
    if values.is_empty() {
        return false;
    }

    match (operator.family(), condition.value()) {
        (Operator::True, _) => values.iter().any(|v| as_bool(v) == Some(true)),
        (Operator::False, _) => values.iter().any(|v| as_bool(v) == Some(false)),
        (Operator::Eq | Operator::IgnoreCase, FilterValue::Scalar(expected)) => {
            values.iter().any(|v| loose_eq(v, expected, ignore_case))
        }
        (Operator::Ne, FilterValue::Scalar(expected)) => {
            !values.iter().any(|v| loose_eq(v, expected, ignore_case))
        }
        (Operator::In, FilterValue::List(items)) => values
            .iter()
            .any(|v| items.iter().any(|item| loose_eq(v, item, ignore_case))),
        (Operator::Nin, FilterValue::List(items)) => !values
            .iter()
            .any(|v| items.iter().any(|item| loose_eq(v, item, ignore_case))),
        (Operator::Between, FilterValue::Range(lo, hi)) => values.iter().any(|v| {
            matches!(compare(v, lo), Some(Ordering::Greater | Ordering::Equal))
                && matches!(compare(v, hi), Some(Ordering::Less | Ordering::Equal))
        }),
        (Operator::Gt, FilterValue::Scalar(bound)) => {
            values.iter().any(|v| compare(v, bound) == Some(Ordering::Greater))
        }
        (Operator::Gte, FilterValue::Scalar(bound)) => values
            .iter()
            .any(|v| matches!(compare(v, bound), Some(Ordering::Greater | Ordering::Equal))),
        (Operator::Lt, FilterValue::Scalar(bound)) => {
            values.iter().any(|v| compare(v, bound) == Some(Ordering::Less))
        }
        (Operator::Lte, FilterValue::Scalar(bound)) => values
            .iter()
            .any(|v| matches!(compare(v, bound), Some(Ordering::Less | Ordering::Equal))),
        (Operator::Like, FilterValue::Scalar(pattern)) => {
            text_test(&values, pattern, ignore_case, |text, pattern| like(text, pattern))
        }
        (Operator::NotLike, FilterValue::Scalar(pattern)) => {
            !text_test(&values, pattern, ignore_case, |text, pattern| like(text, pattern))
        }
        (Operator::StartingWith, FilterValue::Scalar(prefix)) => {
            text_test(&values, prefix, ignore_case, |text, prefix| text.starts_with(prefix))
        }
        (Operator::EndingWith, FilterValue::Scalar(suffix)) => {
            text_test(&values, suffix, ignore_case, |text, suffix| text.ends_with(suffix))
        }
        (Operator::Containing, FilterValue::Scalar(needle)) => {
            text_test(&values, needle, ignore_case, |text, needle| text.contains(needle))
        }
        (op, value) => {
            tracing::warn!("Operator {} cannot take operand {:?}; condition fails", op, value);
            false
        }
    }
}

fn text_test(values: &[&Value], operand: &Value, ignore_case: bool, test: impl Fn(&str, &str) -> bool) -> bool {
    let Some(operand) = as_text(operand) else { return false };
    let operand = if ignore_case { operand.to_lowercase() } else { operand };
    values.iter().filter_map(|v| as_text(v)).any(|text| {
        if ignore_case {
            test(&text.to_lowercase(), &operand)
        } else {
            test(&text, &operand)
        }
    })
}

/// Unanchored substring test: `%` matches any run, `_` any single char.
fn like(text: &str, pattern: &str) -> bool {
    if !pattern.contains(|c: char| c == '%' || c == '_') {
        return text.contains(pattern);
    }
    let text: Vec<char> = text.chars().collect();
    let mut wrapped = vec!['%'];
    wrapped.extend(pattern.chars());
    wrapped.push('%');
    glob(&text, &wrapped)
}

/// Linear backtracking over the most recent `%` only.
fn glob(text: &[char], pattern: &[char]) -> bool {
    let (mut t, mut p) = (0, 0);
    let mut star: Option<(usize, usize)> = None;
    while t < text.len() {
        match pattern.get(p) {
            Some('%') => {
                star = Some((p + 1, t));
                p += 1;
            }
            Some('_') => {
                t += 1;
                p += 1;
            }
            Some(c) if *c == text[t] => {
                t += 1;
                p += 1;
            }
            _ => match star {
                Some((resume, from)) => {
                    p = resume;
                    t = from + 1;
                    star = Some((resume, from + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '%')
}

fn as_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn as_bool(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) if s.eq_ignore_ascii_case("true") => Some(true),
        Value::String(s) if s.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

fn loose_eq(actual: &Value, expected: &Value, ignore_case: bool) -> bool {
    match (actual, expected) {
        (Value::String(a), Value::String(b)) if ignore_case => a.to_lowercase() == b.to_lowercase(),
        (Value::String(a), Value::String(b)) => a == b || compare(actual, expected) == Some(Ordering::Equal),
        (Value::Null, Value::Null) => true,
        _ => actual == expected || compare(actual, expected) == Some(Ordering::Equal),
    }
}

/// Natural ordering: numbers numerically, ISO dates chronologically, other strings lexically
pub fn compare(a: &Value, b: &Value) -> Option<Ordering> {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => compare_numbers(x, y),
        (Value::Number(x), Value::String(s)) => x.as_f64()?.partial_cmp(&s.trim().parse::<f64>().ok()?),
        (Value::String(s), Value::Number(y)) => s.trim().parse::<f64>().ok()?.partial_cmp(&y.as_f64()?),
        (Value::String(x), Value::String(y)) => match (as_instant(x), as_instant(y)) {
            (Some(x), Some(y)) => Some(x.cmp(&y)),
            _ => Some(x.cmp(y)),
        },
        (Value::Bool(x), Value::Bool(y)) => Some(x.cmp(y)),
        _ => None,
    }
}

fn compare_numbers(x: &serde_json::Number, y: &serde_json::Number) -> Option<Ordering> {
    if let (Some(x), Some(y)) = (x.as_i64(), y.as_i64()) {
        return Some(x.cmp(&y));
    }
    x.as_f64()?.partial_cmp(&y.as_f64()?)
}

fn as_instant(s: &str) -> Option<NaiveDateTime> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.naive_utc());
    }
    for format in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M:%S"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, format) {
            return Some(dt);
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d").ok()?.and_hms_opt(0, 0, 0)
}
