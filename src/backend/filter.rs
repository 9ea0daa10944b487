//! Structured metadata filter.
//!
//! A filter is a JSON object mapping metadata keys (dotted paths allowed) to
//! conditions; every condition must hold. Accepted condition forms:
//!
//! - string, integer or bool: equality
//! - float: equality, expressed as a closed range
//! - array of strings or of integers: match any
//! - object with any of `gt`, `gte`, `lt`, `lte`: numeric range

use serde_json::Value;

use crate::types::Metadata;

/// Exact-match condition.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchValue {
    Keyword(String),
    Integer(i64),
    Bool(bool),
    AnyKeyword(Vec<String>),
    AnyInteger(Vec<i64>),
}

/// Numeric range condition; unset bounds are open.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RangeBounds {
    pub gt: Option<f64>,
    pub gte: Option<f64>,
    pub lt: Option<f64>,
    pub lte: Option<f64>,
}

impl RangeBounds {
    fn contains(&self, x: f64) -> bool {
        self.gt.is_none_or(|b| x > b)
            && self.gte.is_none_or(|b| x >= b)
            && self.lt.is_none_or(|b| x < b)
            && self.lte.is_none_or(|b| x <= b)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Match(MatchValue),
    Range(RangeBounds),
}

/// Conjunction of per-key conditions against `metadata.<key>`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MetadataFilter {
    conditions: Vec<(String, Condition)>,
}

impl MetadataFilter {
    /// Build a filter from a parsed JSON object.
    ///
    /// # Errors
    ///
    /// Returns a description of the first unsupported condition.
    pub fn from_json(map: &Metadata) -> Result<Self, String> {
        let mut conditions = Vec::with_capacity(map.len());
        for (key, value) in map {
            if key.trim().is_empty() {
                return Err("filter keys cannot be empty".to_string());
            }
            let condition = parse_condition(key, value)?;
            conditions.push((key.clone(), condition));
        }
        Ok(Self { conditions })
    }

    pub fn is_empty(&self) -> bool {
        self.conditions.is_empty()
    }

    pub fn conditions(&self) -> impl Iterator<Item = (&str, &Condition)> {
        self.conditions.iter().map(|(k, c)| (k.as_str(), c))
    }

    /// Evaluate the filter against stored metadata.
    ///
    /// Array-valued metadata matches when any element satisfies the condition.
    pub fn matches(&self, metadata: Option<&Metadata>) -> bool {
        self.conditions.iter().all(|(key, condition)| {
            let Some(value) = metadata.and_then(|m| lookup_path(m, key)) else {
                return false;
            };
            match value {
                Value::Array(items) => items.iter().any(|v| condition_holds(condition, v)),
                other => condition_holds(condition, other),
            }
        })
    }
}

fn parse_condition(key: &str, value: &Value) -> Result<Condition, String> {
    match value {
        Value::String(s) => Ok(Condition::Match(MatchValue::Keyword(s.clone()))),
        Value::Bool(b) => Ok(Condition::Match(MatchValue::Bool(*b))),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(Condition::Match(MatchValue::Integer(i)))
            } else {
                let f = n
                    .as_f64()
                    .ok_or_else(|| format!("filter value for '{key}' is out of range"))?;
                Ok(Condition::Range(RangeBounds {
                    gte: Some(f),
                    lte: Some(f),
                    ..Default::default()
                }))
            }
        }
        Value::Array(items) => parse_any(key, items),
        Value::Object(bounds) => parse_range(key, bounds),
        Value::Null => Err(format!("filter value for '{key}' cannot be null")),
    }
}

fn parse_any(key: &str, items: &[Value]) -> Result<Condition, String> {
    if items.is_empty() {
        return Err(format!("filter list for '{key}' cannot be empty"));
    }
    if let Some(strings) = items
        .iter()
        .map(|v| v.as_str().map(str::to_string))
        .collect::<Option<Vec<_>>>()
    {
        return Ok(Condition::Match(MatchValue::AnyKeyword(strings)));
    }
    if let Some(ints) = items.iter().map(Value::as_i64).collect::<Option<Vec<_>>>() {
        return Ok(Condition::Match(MatchValue::AnyInteger(ints)));
    }
    Err(format!(
        "filter list for '{key}' must contain only strings or only integers"
    ))
}

fn parse_range(key: &str, bounds: &serde_json::Map<String, Value>) -> Result<Condition, String> {
    if bounds.is_empty() {
        return Err(format!("range for '{key}' needs at least one of gt, gte, lt, lte"));
    }
    let mut range = RangeBounds::default();
    for (op, bound) in bounds {
        let bound = bound
            .as_f64()
            .ok_or_else(|| format!("range bound '{op}' for '{key}' must be a number"))?;
        match op.as_str() {
            "gt" => range.gt = Some(bound),
            "gte" => range.gte = Some(bound),
            "lt" => range.lt = Some(bound),
            "lte" => range.lte = Some(bound),
            other => {
                return Err(format!(
                    "unsupported range operator '{other}' for '{key}' (use gt, gte, lt, lte)"
                ));
            }
        }
    }
    Ok(Condition::Range(range))
}

fn lookup_path<'a>(metadata: &'a Metadata, path: &str) -> Option<&'a Value> {
    if let Some(value) = metadata.get(path) {
        return Some(value);
    }
    let mut parts = path.split('.');
    let mut current = metadata.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn condition_holds(condition: &Condition, value: &Value) -> bool {
    match condition {
        Condition::Match(MatchValue::Keyword(s)) => value.as_str() == Some(s.as_str()),
        Condition::Match(MatchValue::Integer(i)) => value.as_i64() == Some(*i),
        Condition::Match(MatchValue::Bool(b)) => value.as_bool() == Some(*b),
        Condition::Match(MatchValue::AnyKeyword(options)) => value
            .as_str()
            .is_some_and(|s| options.iter().any(|o| o == s)),
        Condition::Match(MatchValue::AnyInteger(options)) => {
            value.as_i64().is_some_and(|i| options.contains(&i))
        }
        Condition::Range(range) => value.as_f64().is_some_and(|x| range.contains(x)),
    }
}
