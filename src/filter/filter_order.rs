use serde_json::Value;

use super::error::FilterError;
use super::types::{OrderSpec, SortDirection};

pub struct FilterOrder;

impl FilterOrder {
    /// Accepts `"salario desc, nombre"`, `["salario desc", "nombre"]` or
    /// `{ "salario": "desc", "nombre": "asc" }`. Field names are returned as written.
    pub fn parse(order: &Value) -> Result<Vec<OrderSpec>, FilterError> {
        match order {
            Value::String(s) => Self::parse_order_string(s),
            Value::Array(arr) => {
                let mut out = Vec::new();
                for v in arr {
                    match v {
                        Value::String(s) => out.extend(Self::parse_order_string(s)?),
                        other => {
                            return Err(FilterError::malformed(
                                "order",
                                format!("expected string entries, got {}", other),
                            ))
                        }
                    }
                }
                Ok(out)
            }
            Value::Object(obj) => {
                let mut out = Vec::new();
                for (k, v) in obj {
                    let sort = Self::parse_direction(v.as_str().unwrap_or("asc"))?;
                    out.push(OrderSpec { field: k.clone(), sort });
                }
                Ok(out)
            }
            Value::Null => Ok(vec![]),
            other => Err(FilterError::malformed(
                "order",
                format!("unsupported order format: {}", other),
            )),
        }
    }

    fn parse_order_string(s: &str) -> Result<Vec<OrderSpec>, FilterError> {
        // split on commas, then each token into column and direction
        let mut out = Vec::new();
        for part in s.split(',') {
            let trimmed = part.trim();
            if trimmed.is_empty() { continue; }
            let mut it = trimmed.split_whitespace();
            if let Some(col) = it.next() {
                let sort = Self::parse_direction(it.next().unwrap_or("asc"))?;
                if let Some(extra) = it.next() {
                    return Err(FilterError::malformed("order", format!("unexpected token '{}'", extra)));
                }
                out.push(OrderSpec { field: col.to_string(), sort });
            }
        }
        Ok(out)
    }

    fn parse_direction(dir: &str) -> Result<SortDirection, FilterError> {
        if dir.eq_ignore_ascii_case("asc") {
            Ok(SortDirection::Asc)
        } else if dir.eq_ignore_ascii_case("desc") {
            Ok(SortDirection::Desc)
        } else {
            Err(FilterError::malformed("order", format!("unknown sort direction '{}'", dir)))
        }
    }
}
