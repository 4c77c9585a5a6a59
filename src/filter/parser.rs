use chrono::{DateTime, NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value};

use super::error::FilterError;
use super::filter_order::FilterOrder;
use super::operator::Operator;
use super::types::{Condition, FilterExpression, FilterValue, OrderSpec};
use crate::schema::{FieldDef, FieldKind, ScalarType, Schema, TypeDef};

/// Argument keys with a meaning of their own
const RESERVED_KEYS: &[&str] = &["include", "order", "sort", "limit", "offset", "or"];

/// Parser knobs, normally taken from `config().filter`
#[derive(Debug, Clone)]
pub struct ParserOptions {
    pub max_nested_depth: usize,
    pub max_limit: Option<usize>,
    pub debug_logging: bool,
}

impl Default for ParserOptions {
    fn default() -> Self {
        Self {
            max_nested_depth: 10,
            max_limit: None,
            debug_logging: false,
        }
    }
}

impl ParserOptions {
    pub fn from_config() -> Self {
        let filter = &crate::config::config().filter;
        Self {
            max_nested_depth: filter.max_nested_depth,
            max_limit: filter.max_limit,
            debug_logging: filter.debug_logging,
        }
    }
}

/// Resolved query for one entity type: filter tree plus read options
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryParameter {
    type_name: String,
    filter: FilterExpression,
    include: Vec<String>,
    order: Vec<OrderSpec>,
    limit: Option<usize>,
    offset: Option<usize>,
    distinct: Vec<String>,
}

impl QueryParameter {
    /// Parse raw arguments with default parser options
    pub fn parse(schema: &Schema, type_name: &str, args: &Map<String, Value>) -> Result<Self, FilterError> {
        QueryParser::new(schema).parse(type_name, args)
    }

    /// Wrap an already-built filter
    pub fn from_filter(type_name: impl Into<String>, filter: FilterExpression) -> Self {
        Self {
            type_name: type_name.into(),
            filter,
            include: Vec::new(),
            order: Vec::new(),
            limit: None,
            offset: None,
            distinct: Vec::new(),
        }
    }

    pub fn type_name(&self) -> &str { &self.type_name }
    pub fn filter(&self) -> &FilterExpression { &self.filter }
    pub fn include(&self) -> &[String] { &self.include }
    pub fn order(&self) -> &[OrderSpec] { &self.order }
    pub fn limit(&self) -> Option<usize> { self.limit }
    pub fn offset(&self) -> Option<usize> { self.offset }
    pub fn distinct(&self) -> &[String] { &self.distinct }

    /// Replace the filter, keeping read options. Used after restriction.
    pub fn with_filter(mut self, filter: FilterExpression) -> Self {
        self.filter = filter;
        self
    }
}

/// Result of resolving one argument key
enum Parsed {
    Condition(Condition),
    Distinct(String),
    Skip,
}

struct ResolvedPath {
    dotted: String,
    leaf: FieldDef,
    hops: usize,
}

/// Translates suffix-style argument maps (`salarioGreaterThan`, `oficinaProvinciaNombreEquals`)
/// into a typed filter tree, validating every path against the schema before any storage access.
pub struct QueryParser<'a> {
    schema: &'a Schema,
    options: ParserOptions,
}

impl<'a> QueryParser<'a> {
    pub fn new(schema: &'a Schema) -> Self {
        Self { schema, options: ParserOptions::default() }
    }

    pub fn with_options(mut self, options: ParserOptions) -> Self {
        self.options = options;
        self
    }

    pub fn parse(&self, type_name: &str, args: &Map<String, Value>) -> Result<QueryParameter, FilterError> {
        let type_def = self
            .schema
            .get_type(type_name)
            .ok_or_else(|| FilterError::UnknownType(type_name.to_string()))?;

        let mut query = QueryParameter::from_filter(type_def.name.clone(), FilterExpression::always());
        let mut children = Vec::new();

        for (key, value) in args {
            let result = match key.as_str() {
                "include" => self.parse_include(type_def, value).map(|paths| query.include = paths),
                "order" | "sort" => self.parse_order(type_def, value).map(|specs| query.order = specs),
                "limit" => self.parse_limit(value).map(|limit| query.limit = Some(limit)),
                "offset" => Self::parse_count("offset", value).map(|offset| query.offset = Some(offset)),
                "or" => self.parse_or(type_def, value).map(|expr| children.push(expr)),
                _ => self.parse_argument(type_def, key, value).map(|parsed| match parsed {
                    Parsed::Condition(condition) => children.push(FilterExpression::condition(condition)),
                    Parsed::Distinct(path) => query.distinct.push(path),
                    Parsed::Skip => {}
                }),
            };

            if let Err(error) = result {
                tracing::debug!("Rejected filter argument '{}' for {}: {}", key, type_def.name, error);
                return Err(error);
            }
        }

        if self.options.debug_logging {
            tracing::debug!(
                "Parsed {} filter node(s) for {} (include={:?}, order={:?}, limit={:?})",
                children.len(), type_def.name, query.include, query.order, query.limit
            );
        }

        query.filter = FilterExpression::and(children);
        Ok(query)
    }

    fn parse_or(&self, type_def: &TypeDef, value: &Value) -> Result<FilterExpression, FilterError> {
        let groups = value
            .as_array()
            .filter(|groups| !groups.is_empty())
            .ok_or_else(|| FilterError::malformed("or", "expected a non-empty array of argument objects"))?;

        let mut branches = Vec::with_capacity(groups.len());
        for group in groups {
            let group = group
                .as_object()
                .ok_or_else(|| FilterError::malformed("or", "each group must be an object"))?;
            let mut conditions = Vec::with_capacity(group.len());
            for (key, value) in group {
                if RESERVED_KEYS.contains(&key.as_str()) {
                    return Err(FilterError::malformed(key, "not allowed inside an 'or' group"));
                }
                match self.parse_argument(type_def, key, value)? {
                    Parsed::Condition(condition) => conditions.push(FilterExpression::condition(condition)),
                    Parsed::Distinct(_) => {
                        return Err(FilterError::malformed(key, "distinct is not allowed inside an 'or' group"))
                    }
                    Parsed::Skip => {}
                }
            }
            branches.push(FilterExpression::and(conditions));
        }
        Ok(FilterExpression::or(branches))
    }

    fn parse_argument(&self, type_def: &TypeDef, key: &str, value: &Value) -> Result<Parsed, FilterError> {
        let candidates = Self::candidates(key);
        let mut resolved = None;
        for (field_part, operator, ignore_case) in &candidates {
            if let Some(path) = self.resolve_path(type_def, field_part) {
                resolved = Some((path, *operator, *ignore_case));
                break;
            }
        }

        let (path, operator, ignore_case) = resolved.ok_or_else(|| {
            let field_part = candidates.first().map(|c| c.0.as_str()).unwrap_or(key);
            FilterError::malformed(
                key,
                format!("cannot resolve field path '{}' on type {}", field_part, type_def.name),
            )
        })?;

        if path.hops > self.options.max_nested_depth {
            return Err(FilterError::malformed(
                key,
                format!(
                    "relation path '{}' exceeds maximum depth {}",
                    path.dotted, self.options.max_nested_depth
                ),
            ));
        }

        if operator == Operator::Distinct {
            return Ok(match value {
                Value::Bool(false) => Parsed::Skip,
                Value::String(s) if s.eq_ignore_ascii_case("false") => Parsed::Skip,
                _ => Parsed::Distinct(path.dotted),
            });
        }

        // Standalone IgnoreCase is case-insensitive equality
        let operator = if operator == Operator::IgnoreCase { Operator::Eq } else { operator };

        // Equality against null reads as a null check
        let operator = match (operator, value) {
            (Operator::Eq, Value::Null) => Operator::IsNull,
            (Operator::Ne | Operator::Not, Value::Null) => Operator::IsNotNull,
            (op, _) => op,
        };

        let scalar = match &path.leaf.kind {
            FieldKind::Scalar(scalar) => *scalar,
            FieldKind::Relation { .. } if matches!(operator, Operator::IsNull | Operator::IsNotNull) => ScalarType::String,
            FieldKind::Relation { .. } => {
                return Err(FilterError::malformed(
                    key,
                    format!("'{}' is a relation; compare one of its fields instead", path.dotted),
                ))
            }
        };

        let filter_value = Self::build_value(key, operator, scalar, value)?;
        let mut condition = Condition::new(path.dotted, operator, filter_value);
        if ignore_case {
            condition = condition.ignoring_case();
        }
        Ok(Parsed::Condition(condition))
    }

    /// Candidate (field part, operator, ignore_case) splits of an argument key, in priority order
    fn candidates(key: &str) -> Vec<(String, Operator, bool)> {
        let mut out = Vec::new();
        match Operator::match_suffix(key) {
            Some((Operator::IgnoreCase, len)) => {
                let stripped = &key[..key.len() - len];
                if let Some((inner, inner_len)) = Operator::match_suffix(stripped) {
                    if inner.is_string_match() {
                        out.push((stripped[..stripped.len() - inner_len].to_string(), inner, true));
                    }
                }
                out.push((stripped.to_string(), Operator::IgnoreCase, true));
            }
            Some((operator, len)) => out.push((key[..key.len() - len].to_string(), operator, false)),
            None => {}
        }
        // A key without a recognised suffix is implicit equality
        out.push((key.to_string(), Operator::Eq, false));
        out
    }

    /// Resolve a camel-cased (`oficinaProvinciaNombre`) or dotted (`oficina.provincia.nombre`)
    /// path against the schema's relation graph
    fn resolve_path(&self, type_def: &TypeDef, raw: &str) -> Option<ResolvedPath> {
        if raw.is_empty() {
            return None;
        }
        if raw.contains('.') {
            return self.resolve_dotted(type_def, raw);
        }
        let segments = split_camel(raw);
        let (names, leaf) = self.walk(type_def, &segments, 0)?;
        Some(ResolvedPath { hops: names.len() - 1, dotted: names.join("."), leaf })
    }

    fn resolve_dotted(&self, type_def: &TypeDef, raw: &str) -> Option<ResolvedPath> {
        let parts: Vec<&str> = raw.split('.').collect();
        let mut current = type_def;
        let mut names = Vec::with_capacity(parts.len());
        for (i, part) in parts.iter().enumerate() {
            let field = current.field(part)?;
            names.push(field.name.clone());
            if i + 1 == parts.len() {
                return Some(ResolvedPath { hops: names.len() - 1, dotted: names.join("."), leaf: field.clone() });
            }
            current = self.schema.get_type(field.relation_target()?)?;
        }
        None
    }

    /// Depth-first match of camel segments against field names, longest field first,
    /// backtracking when a shorter split is the only one that reaches a leaf
    fn walk(&self, type_def: &TypeDef, segments: &[&str], start: usize) -> Option<(Vec<String>, FieldDef)> {
        for end in (start + 1..=segments.len()).rev() {
            let candidate: String = segments[start..end].concat();
            let Some(field) = type_def.field(&candidate) else { continue };

            if end == segments.len() {
                return Some((vec![field.name.clone()], field.clone()));
            }
            if let Some(target) = field.relation_target().and_then(|t| self.schema.get_type(t)) {
                if let Some((mut rest, leaf)) = self.walk(target, segments, end) {
                    rest.insert(0, field.name.clone());
                    return Some((rest, leaf));
                }
            }
        }
        None
    }

    fn parse_include(&self, type_def: &TypeDef, value: &Value) -> Result<Vec<String>, FilterError> {
        let mut paths = Vec::new();
        for raw in split_list(value) {
            let raw = match raw {
                Value::String(s) => s,
                other => return Err(FilterError::malformed("include", format!("expected a path, got {}", other))),
            };
            let path = self
                .resolve_path(type_def, &raw)
                .ok_or_else(|| FilterError::malformed("include", format!("unknown relation path '{}'", raw)))?;
            if path.leaf.relation_target().is_none() {
                return Err(FilterError::malformed("include", format!("'{}' is not a relation", path.dotted)));
            }
            if path.hops + 1 > self.options.max_nested_depth {
                return Err(FilterError::malformed(
                    "include",
                    format!("'{}' exceeds maximum depth {}", path.dotted, self.options.max_nested_depth),
                ));
            }
            paths.push(path.dotted);
        }
        Ok(paths)
    }

    fn parse_order(&self, type_def: &TypeDef, value: &Value) -> Result<Vec<OrderSpec>, FilterError> {
        FilterOrder::parse(value)?
            .into_iter()
            .map(|spec| {
                let path = self
                    .resolve_path(type_def, &spec.field)
                    .ok_or_else(|| FilterError::malformed("order", format!("unknown field '{}'", spec.field)))?;
                if path.leaf.scalar_type().is_none() {
                    return Err(FilterError::malformed("order", format!("cannot sort on relation '{}'", path.dotted)));
                }
                Ok(OrderSpec { field: path.dotted, sort: spec.sort })
            })
            .collect()
    }

    fn parse_limit(&self, value: &Value) -> Result<usize, FilterError> {
        let limit = Self::parse_count("limit", value)?;
        match self.options.max_limit {
            Some(max) if limit > max => {
                if self.options.debug_logging {
                    tracing::warn!("Limit {} exceeds max {}, capping to max", limit, max);
                }
                Ok(max)
            }
            _ => Ok(limit),
        }
    }

    fn parse_count(name: &str, value: &Value) -> Result<usize, FilterError> {
        let invalid = |reason: String| match name {
            "limit" => FilterError::InvalidLimit(reason),
            _ => FilterError::InvalidOffset(reason),
        };
        match value {
            Value::Number(n) => n
                .as_u64()
                .map(|n| n as usize)
                .ok_or_else(|| invalid(format!("{} must be a non-negative integer", name))),
            Value::String(s) => s
                .trim()
                .parse::<usize>()
                .map_err(|_| invalid(format!("{} must be a non-negative integer, got '{}'", name, s))),
            other => Err(invalid(format!("{} must be a number, got {}", name, other))),
        }
    }

    fn build_value(key: &str, operator: Operator, scalar: ScalarType, value: &Value) -> Result<FilterValue, FilterError> {
        if operator.is_unary() {
            if matches!(operator, Operator::True | Operator::False) && scalar != ScalarType::Boolean {
                return Err(FilterError::malformed(key, format!("{} applies to boolean fields only", operator)));
            }
            return Ok(FilterValue::None);
        }
        match operator {
            Operator::In | Operator::Nin => {
                let items = split_list(value)
                    .into_iter()
                    .map(|item| coerce(key, scalar, item))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(FilterValue::List(items))
            }
            Operator::Between => {
                let mut bounds = split_list(value);
                if bounds.len() != 2 {
                    return Err(FilterError::malformed(
                        key,
                        format!("BETWEEN requires exactly two comma-separated bounds, got {}", bounds.len()),
                    ));
                }
                let hi = coerce(key, scalar, bounds.remove(1))?;
                let lo = coerce(key, scalar, bounds.remove(0))?;
                Ok(FilterValue::Range(lo, hi))
            }
            Operator::Like
            | Operator::NotLike
            | Operator::StartingWith
            | Operator::EndingWith
            | Operator::Containing => match value {
                Value::String(_) => Ok(FilterValue::Scalar(value.clone())),
                Value::Number(n) => Ok(FilterValue::Scalar(Value::String(n.to_string()))),
                other => Err(FilterError::malformed(key, format!("{} expects text, got {}", operator, other))),
            },
            _ => Ok(FilterValue::Scalar(coerce(key, scalar, value.clone())?)),
        }
    }
}

/// `"a,b"` or `["a","b"]` into individual values
fn split_list(value: &Value) -> Vec<Value> {
    match value {
        Value::Array(items) => items.clone(),
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|part| !part.is_empty())
            .map(|part| Value::String(part.to_string()))
            .collect(),
        Value::Null => Vec::new(),
        other => vec![other.clone()],
    }
}

/// Split `oficinaProvinciaNombre` into `["oficina", "Provincia", "Nombre"]`
fn split_camel(raw: &str) -> Vec<&str> {
    let mut segments = Vec::new();
    let mut start = 0;
    for (i, c) in raw.char_indices() {
        if i > start && c.is_uppercase() {
            segments.push(&raw[start..i]);
            start = i;
        }
    }
    segments.push(&raw[start..]);
    segments
}

/// Type a raw argument value against the field's scalar type
fn coerce(key: &str, scalar: ScalarType, value: Value) -> Result<Value, FilterError> {
    let mismatch = |expected: &str, got: &Value| {
        FilterError::malformed(key, format!("expected {}, got {}", expected, got))
    };

    match scalar {
        ScalarType::Integer => match &value {
            Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<i64>()
                .map(Value::from)
                .map_err(|_| mismatch("an integer", &value)),
            _ => Err(mismatch("an integer", &value)),
        },
        ScalarType::Number => match &value {
            Value::Number(_) => Ok(value),
            Value::String(s) => s
                .trim()
                .parse::<f64>()
                .ok()
                .and_then(Number::from_f64)
                .map(Value::Number)
                .ok_or_else(|| mismatch("a number", &value)),
            _ => Err(mismatch("a number", &value)),
        },
        ScalarType::Boolean => match &value {
            Value::Bool(_) => Ok(value),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(Value::Bool(true)),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(Value::Bool(false)),
            _ => Err(mismatch("a boolean", &value)),
        },
        ScalarType::Date => match &value {
            Value::String(s) if NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() || is_datetime(s) => Ok(value),
            _ => Err(mismatch("an ISO date (YYYY-MM-DD)", &value)),
        },
        ScalarType::DateTime => match &value {
            Value::String(s) if is_datetime(s) || NaiveDate::parse_from_str(s, "%Y-%m-%d").is_ok() => Ok(value),
            _ => Err(mismatch("an ISO date-time", &value)),
        },
        ScalarType::String | ScalarType::Id => match value {
            Value::String(_) => Ok(value),
            Value::Number(n) => Ok(Value::String(n.to_string())),
            Value::Bool(b) => Ok(Value::String(b.to_string())),
            other => Err(mismatch("text", &other)),
        },
    }
}

fn is_datetime(s: &str) -> bool {
    DateTime::parse_from_rfc3339(s).is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S").is_ok()
        || NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}
