use bson::oid::ObjectId;
use bson::{Bson, Document};
use chrono::{DateTime, NaiveDate, Utc};

use crate::db::models::{FieldKind, Schema};
use crate::error::AppError;
use crate::query::features::QueryParams;

/// Query-string keys that drive sorting, projection and pagination rather
/// than filtering.
pub const RESERVED_KEYS: [&str; 4] = ["page", "sort", "limit", "fields"];

/// Comparison applied by a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operator {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Operator {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "gt" => Some(Operator::Gt),
            "gte" => Some(Operator::Gte),
            "lt" => Some(Operator::Lt),
            "lte" => Some(Operator::Lte),
            _ => None,
        }
    }

    /// MongoDB operator name. Plain equality has none.
    pub fn mongo_operator(&self) -> Option<&'static str> {
        match self {
            Operator::Eq => None,
            Operator::Gt => Some("$gt"),
            Operator::Gte => Some("$gte"),
            Operator::Lt => Some("$lt"),
            Operator::Lte => Some("$lte"),
        }
    }
}

/// One `field op value` condition parsed from the query string.
#[derive(Debug, Clone, PartialEq)]
pub struct Predicate {
    pub field: String,
    pub operator: Operator,
    pub value: Bson,
}

/// The filter part of a list query: every non-reserved query parameter as a
/// typed predicate.
///
/// `price[gte]=500` becomes `price >= 500.0`; `difficulty=easy` becomes an
/// equality. Values are cast with the field kinds declared by the schema.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Filter {
    predicates: Vec<Predicate>,
}

impl Filter {
    pub fn parse<S: Schema>(params: &QueryParams) -> Result<Self, AppError> {
        let mut predicates = Vec::new();

        for (key, raw) in params.iter() {
            if RESERVED_KEYS.contains(&key) {
                continue;
            }
            let (field, operator) = parse_key(key)?;
            let value = cast_value(S::field_kind(&field), &field, raw)?;
            predicates.push(Predicate {
                field,
                operator,
                value,
            });
        }

        Ok(Self { predicates })
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    /// Build the MongoDB filter document.
    ///
    /// Predicates on the same field merge into one condition; repeated
    /// equalities become an `$in` set.
    pub fn to_document(&self) -> Document {
        let mut fields: Vec<(&str, Vec<Bson>, Document)> = Vec::new();

        for predicate in &self.predicates {
            let index = match fields.iter().position(|(f, _, _)| *f == predicate.field) {
                Some(index) => index,
                None => {
                    fields.push((predicate.field.as_str(), Vec::new(), Document::new()));
                    fields.len() - 1
                }
            };
            let (_, equals, comparisons) = &mut fields[index];
            match predicate.operator.mongo_operator() {
                None => equals.push(predicate.value.clone()),
                Some(op) => {
                    comparisons.insert(op, predicate.value.clone());
                }
            }
        }

        let mut filter = Document::new();
        for (field, mut equals, mut comparisons) in fields {
            let condition = match (equals.len(), comparisons.is_empty()) {
                (1, true) => equals.remove(0),
                (0, _) => Bson::Document(comparisons),
                (1, false) => {
                    comparisons.insert("$eq", equals.remove(0));
                    Bson::Document(comparisons)
                }
                (_, _) => {
                    comparisons.insert("$in", equals);
                    Bson::Document(comparisons)
                }
            };
            filter.insert(field, condition);
        }
        filter
    }
}

/// Split `field[op]` into its parts. A bare key is an equality.
fn parse_key(key: &str) -> Result<(String, Operator), AppError> {
    let Some((field, rest)) = key.split_once('[') else {
        check_field(key)?;
        return Ok((key.to_string(), Operator::Eq));
    };
    check_field(field)?;
    let token = rest.strip_suffix(']').unwrap_or(rest);
    let operator = Operator::parse(token).ok_or_else(|| {
        AppError::bad_request(format!(
            "Invalid filter operator '{token}' for field '{field}'"
        ))
    })?;
    Ok((field.to_string(), operator))
}

/// Field names are document paths, never query operators.
fn check_field(field: &str) -> Result<(), AppError> {
    if field.is_empty() || field.starts_with('$') {
        return Err(AppError::bad_request(format!(
            "Invalid filter field '{field}'"
        )));
    }
    Ok(())
}

fn cast_value(kind: FieldKind, field: &str, raw: &str) -> Result<Bson, AppError> {
    let cast_error = || AppError::Cast {
        path: field.to_string(),
        value: raw.to_string(),
        expected: kind.name(),
    };

    match kind {
        FieldKind::Text => Ok(Bson::String(raw.to_string())),
        FieldKind::Number => raw
            .trim()
            .parse::<f64>()
            .ok()
            .filter(|n| n.is_finite())
            .map(Bson::Double)
            .ok_or_else(cast_error),
        FieldKind::Boolean => match raw {
            "true" | "1" => Ok(Bson::Boolean(true)),
            "false" | "0" => Ok(Bson::Boolean(false)),
            _ => Err(cast_error()),
        },
        FieldKind::Date => parse_date(raw)
            .map(|d| Bson::DateTime(bson::DateTime::from_chrono(d)))
            .ok_or_else(cast_error),
        FieldKind::Id => ObjectId::parse_str(raw)
            .map(Bson::ObjectId)
            .map_err(|_| cast_error()),
    }
}

/// Accepts RFC 3339 timestamps and plain `YYYY-MM-DD` dates (midnight UTC).
fn parse_date(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(date) = DateTime::parse_from_rfc3339(raw) {
        return Some(date.with_timezone(&Utc));
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}
