//! Request body validation and coercion against a derived object schema.

use super::{ObjectSchema, SchemaField};
use crate::config::{FieldKind, Transform};
use crate::executor::Record;
use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use serde::Serialize;
use serde_json::{Number, Value};

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct FieldIssue {
    pub field: String,
    pub message: String,
}

impl ObjectSchema {
    /// Parse `body` into its canonical form. Unknown keys are dropped, explicit nulls
    /// count as omitted, and defaults fill absent fields unless the schema is partial.
    pub fn parse(&self, body: &Value) -> Result<Record, Vec<FieldIssue>> {
        let Value::Object(input) = body else {
            return Err(vec![FieldIssue {
                field: String::new(),
                message: "body must be a JSON object".into(),
            }]);
        };

        let mut out = Record::new();
        let mut issues = Vec::new();
        for field in &self.fields {
            let spec = &field.spec;
            let provided = input.get(&spec.name).filter(|v| !v.is_null());
            let candidate = match provided {
                Some(v) => Some(v),
                None if !self.partial => spec.default.as_ref(),
                None => None,
            };
            match candidate {
                Some(v) => match coerce(field, v) {
                    Ok(value) => {
                        out.insert(spec.name.clone(), value);
                    }
                    Err(message) => issues.push(FieldIssue {
                        field: spec.name.clone(),
                        message,
                    }),
                },
                None if spec.optional => {}
                None => issues.push(FieldIssue {
                    field: spec.name.clone(),
                    message: "is required".into(),
                }),
            }
        }

        if issues.is_empty() {
            Ok(out)
        } else {
            Err(issues)
        }
    }
}

/// Kind check, constraints, then transform.
pub(crate) fn coerce(field: &SchemaField, v: &Value) -> Result<Value, String> {
    let spec = &field.spec;
    let value = check_kind(&spec.kind, v)?;

    check_bounds(&spec.kind, &value, spec.min, spec.max)?;
    if let (Some(re), Some(s)) = (&field.pattern, value.as_str()) {
        if !re.is_match(s) {
            return Err("does not match required pattern".into());
        }
    }

    match spec.transform {
        Some(t) => apply_transform(t, &value),
        None => Ok(value),
    }
}

/// Length bound for strings and arrays, value bound for numbers.
fn check_bounds(kind: &FieldKind, value: &Value, min: Option<f64>, max: Option<f64>) -> Result<(), String> {
    match kind {
        FieldKind::String => {
            let len = value.as_str().map(|s| s.chars().count()).unwrap_or(0) as f64;
            check_length(len, min, max, "characters")
        }
        FieldKind::Array { .. } => {
            let len = value.as_array().map(Vec::len).unwrap_or(0) as f64;
            check_length(len, min, max, "items")
        }
        FieldKind::Number | FieldKind::Integer => {
            let n = value.as_f64().unwrap_or(0.0);
            if let Some(min) = min {
                if n < min {
                    return Err(format!("must be at least {}", min));
                }
            }
            if let Some(max) = max {
                if n > max {
                    return Err(format!("must be at most {}", max));
                }
            }
            Ok(())
        }
        _ => Ok(()),
    }
}

fn check_length(len: f64, min: Option<f64>, max: Option<f64>, unit: &str) -> Result<(), String> {
    if let Some(min) = min {
        if len < min {
            return Err(format!("must be at least {} {}", min, unit));
        }
    }
    if let Some(max) = max {
        if len > max {
            return Err(format!("must be at most {} {}", max, unit));
        }
    }
    Ok(())
}

fn check_kind(kind: &FieldKind, v: &Value) -> Result<Value, String> {
    match kind {
        FieldKind::String => v
            .as_str()
            .map(|s| Value::String(s.to_string()))
            .ok_or_else(|| "must be a string".into()),
        FieldKind::Number => match v {
            Value::Number(_) => Ok(v.clone()),
            _ => Err("must be a number".into()),
        },
        FieldKind::Integer => as_integer(v)
            .map(Value::from)
            .ok_or_else(|| "must be an integer".into()),
        FieldKind::Boolean => v
            .as_bool()
            .map(Value::Bool)
            .ok_or_else(|| "must be a boolean".into()),
        FieldKind::Timestamp => parse_timestamp(v)
            .map(timestamp_value)
            .ok_or_else(|| "must be a timestamp".into()),
        FieldKind::Identifier => v
            .as_str()
            .and_then(|s| uuid::Uuid::parse_str(s).ok())
            .map(|u| Value::String(u.hyphenated().to_string()))
            .ok_or_else(|| "must be a valid UUID".into()),
        FieldKind::Enum { values } => match v.as_str() {
            Some(s) if values.iter().any(|a| a == s) => Ok(v.clone()),
            _ => Err(format!(
                "must be one of: {:?}",
                values.iter().take(5).collect::<Vec<_>>()
            )),
        },
        FieldKind::Array { items } => {
            let arr = v.as_array().ok_or_else(|| "must be an array".to_string())?;
            let mut out = Vec::with_capacity(arr.len());
            for (i, item) in arr.iter().enumerate() {
                let item = check_kind(&items.kind, item)
                    .and_then(|item| check_bounds(&items.kind, &item, items.min, items.max).map(|_| item))
                    .map_err(|e| format!("item {} {}", i, e))?;
                out.push(item);
            }
            Ok(Value::Array(out))
        }
    }
}

fn as_integer(v: &Value) -> Option<i64> {
    if let Some(n) = v.as_i64() {
        return Some(n);
    }
    let f = v.as_f64()?;
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f <= i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn apply_transform(transform: Transform, v: &Value) -> Result<Value, String> {
    match transform {
        Transform::ParseNumber => v
            .as_str()
            .and_then(|s| s.trim().parse::<f64>().ok())
            .and_then(Number::from_f64)
            .map(Value::Number)
            .ok_or_else(|| "must be a numeric string".into()),
        Transform::EpochMillis => v
            .as_f64()
            .and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64))
            .map(timestamp_value)
            .ok_or_else(|| "must be milliseconds since the epoch".into()),
        Transform::ParseDate => v
            .as_str()
            .and_then(parse_timestamp_str)
            .map(timestamp_value)
            .ok_or_else(|| "invalid date format".into()),
    }
}

fn parse_timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => parse_timestamp_str(s),
        Value::Number(n) => n.as_f64().and_then(|ms| DateTime::<Utc>::from_timestamp_millis(ms as i64)),
        _ => None,
    }
}

fn parse_timestamp_str(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if let Ok(d) = DateTime::parse_from_rfc3339(s) {
        return Some(d.with_timezone(&Utc));
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(d) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(d.and_utc());
        }
    }
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|d| d.and_utc())
}

fn timestamp_value(d: DateTime<Utc>) -> Value {
    Value::String(d.to_rfc3339_opts(SecondsFormat::Millis, true))
}

#[cfg(test)]
mod tests {
    use crate::config::{FieldKind, FieldRole, FieldSchema, FieldSpec, ItemSpec, Transform};
    use crate::model::derive;
    use serde_json::json;

    fn task_model() -> crate::model::Model {
        derive(&FieldSchema::new(vec![
            FieldSpec::new("id", FieldKind::Identifier).role(FieldRole::ServerAssigned),
            FieldSpec::new("user_id", FieldKind::Identifier).role(FieldRole::OwnerRef),
            FieldSpec::new("name", FieldKind::String).bounds(Some(1.0), Some(50.0)),
            FieldSpec::new("goal", FieldKind::String).transform(Transform::ParseNumber),
            FieldSpec::new("deadline", FieldKind::Number)
                .transform(Transform::EpochMillis)
                .optional(),
            FieldSpec::new("date", FieldKind::String).transform(Transform::ParseDate).optional(),
            FieldSpec::new("completed", FieldKind::Boolean).default_value(json!(false)),
            FieldSpec::new("hour", FieldKind::String)
                .pattern(r"^([0-1]?[0-9]|2[0-3]):[0-5][0-9]$")
                .optional(),
            FieldSpec::new(
                "days",
                FieldKind::Array {
                    items: Box::new(ItemSpec::new(FieldKind::Integer).bounds(Some(0.0), Some(6.0))),
                },
            )
            .bounds(None, Some(7.0))
            .optional(),
            FieldSpec::new(
                "repeat",
                FieldKind::Enum {
                    values: vec!["daily".into(), "weekly".into()],
                },
            )
            .optional(),
            FieldSpec::new("parent", FieldKind::Identifier).optional(),
        ]))
        .unwrap()
    }

    #[test]
    fn create_applies_transforms_and_defaults() {
        let model = task_model();
        let out = model
            .create
            .parse(&json!({ "name": "Run", "goal": "5", "deadline": 0, "date": "2024-03-01" }))
            .unwrap();
        assert_eq!(out["name"], json!("Run"));
        assert_eq!(out["goal"], json!(5.0));
        assert_eq!(out["deadline"], json!("1970-01-01T00:00:00.000Z"));
        assert_eq!(out["date"], json!("2024-03-01T00:00:00.000Z"));
        assert_eq!(out["completed"], json!(false));
        assert!(!out.contains_key("hour"));
    }

    #[test]
    fn client_cannot_supply_reserved_fields() {
        let model = task_model();
        let out = model
            .create
            .parse(&json!({
                "name": "Run",
                "goal": "1",
                "user_id": "6f1c2a44-3f5e-4f55-a4a5-6a1b0c1d2e3f",
                "id": "6f1c2a44-3f5e-4f55-a4a5-6a1b0c1d2e3f",
                "bogus": 1
            }))
            .unwrap();
        assert!(!out.contains_key("user_id"));
        assert!(!out.contains_key("id"));
        assert!(!out.contains_key("bogus"));
    }

    #[test]
    fn missing_required_fields_are_reported() {
        let model = task_model();
        let issues = model.create.parse(&json!({ "goal": "1" })).unwrap_err();
        assert_eq!(issues.len(), 1);
        assert_eq!(issues[0].field, "name");

        let issues = model.create.parse(&json!({ "name": null, "goal": null })).unwrap_err();
        assert_eq!(issues.len(), 2);
    }

    #[test]
    fn update_accepts_empty_object_without_defaults() {
        let model = task_model();
        let out = model.update.parse(&json!({})).unwrap();
        assert!(out.is_empty());
    }

    #[test]
    fn update_still_checks_present_fields() {
        let model = task_model();
        assert!(model.update.parse(&json!({ "name": "" })).is_err());
        assert!(model.update.parse(&json!({ "goal": "ten" })).is_err());
        assert!(model.update.parse(&json!({ "hour": "25:00" })).is_err());
        let out = model.update.parse(&json!({ "hour": "07:30", "goal": "10" })).unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out["goal"], json!(10.0));
    }

    #[test]
    fn kinds_are_enforced() {
        let model = task_model();
        let base = |extra: serde_json::Value| {
            let mut body = json!({ "name": "Run", "goal": "1" });
            for (k, v) in extra.as_object().unwrap() {
                body[k] = v.clone();
            }
            model.create.parse(&body)
        };
        assert!(base(json!({ "completed": "yes" })).is_err());
        assert!(base(json!({ "days": [1, 2.5] })).is_err());
        assert!(base(json!({ "days": [1, 2, 3, 4, 5, 6, 0, 1] })).is_err());
        assert!(base(json!({ "repeat": "yearly" })).is_err());
        assert!(base(json!({ "parent": "not-a-uuid" })).is_err());
        assert!(base(json!({ "name": 12 })).is_err());
        assert!(base(json!({ "name": "x".repeat(51) })).is_err());

        let out = base(json!({ "days": [1, 2.0], "parent": "6F1C2A44-3F5E-4F55-A4A5-6A1B0C1D2E3F" })).unwrap();
        assert_eq!(out["days"], json!([1, 2]));
        assert_eq!(out["parent"], json!("6f1c2a44-3f5e-4f55-a4a5-6a1b0c1d2e3f"));
    }

    #[test]
    fn array_items_respect_their_bounds() {
        let model = task_model();
        let issues = model
            .create
            .parse(&json!({ "name": "Run", "goal": "1", "days": [7] }))
            .unwrap_err();
        assert_eq!(issues[0].field, "days");
        assert_eq!(issues[0].message, "item 0 must be at most 6");
        assert!(model.update.parse(&json!({ "days": [2, -3] })).is_err());
        let out = model.update.parse(&json!({ "days": [0, 6] })).unwrap();
        assert_eq!(out["days"], json!([0, 6]));
    }

    #[test]
    fn non_object_body_is_rejected() {
        let model = task_model();
        assert!(model.create.parse(&json!(["Run"])).is_err());
        assert!(model.update.parse(&json!("Run")).is_err());
    }
}
