//! Model derivation: full, create and update object schemas from one field schema.
//!
//! Every structural check on a resource definition happens here, once, at startup.
//! The derived schemas are immutable and shared by the statement builder and the
//! request validator, so both iterate fields in the same order.

mod validation;

pub use validation::FieldIssue;

use crate::config::{FieldKind, FieldRole, FieldSchema, FieldSpec, Transform};
use crate::error::ConfigError;
use regex::Regex;
use std::sync::OnceLock;

/// Owner column used when the schema does not tag one.
pub const DEFAULT_OWNER_COLUMN: &str = "user_id";

const MAX_IDENTIFIER_LEN: usize = 63;

fn identifier_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").expect("static regex"))
}

fn type_name_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*(\.[A-Za-z_][A-Za-z0-9_]*)?(\[\])?$").expect("static regex")
    })
}

/// True when `name` can be used as a bare SQL identifier.
pub fn is_safe_identifier(name: &str) -> bool {
    name.len() <= MAX_IDENTIFIER_LEN && identifier_re().is_match(name)
}

/// True for `table` or `schema.table`.
pub fn is_safe_table_name(name: &str) -> bool {
    let mut parts = name.split('.');
    match (parts.next(), parts.next(), parts.next()) {
        (Some(t), None, None) => is_safe_identifier(t),
        (Some(s), Some(t), None) => is_safe_identifier(s) && is_safe_identifier(t),
        _ => false,
    }
}

/// A field ready for validation: its spec plus the compiled pattern.
#[derive(Clone, Debug)]
pub struct SchemaField {
    pub spec: FieldSpec,
    pattern: Option<Regex>,
}

/// Validation view over a set of fields.
#[derive(Clone, Debug)]
pub struct ObjectSchema {
    fields: Vec<SchemaField>,
    /// Update schemas never fill defaults, so omitted fields stay untouched in storage.
    partial: bool,
}

impl ObjectSchema {
    pub fn fields(&self) -> impl Iterator<Item = &FieldSpec> {
        self.fields.iter().map(|f| &f.spec)
    }

    pub fn field_names(&self) -> Vec<&str> {
        self.fields().map(|f| f.name.as_str()).collect()
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.fields().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn is_partial(&self) -> bool {
        self.partial
    }
}

impl PartialEq for ObjectSchema {
    fn eq(&self, other: &Self) -> bool {
        self.partial == other.partial && self.fields().eq(other.fields())
    }
}

/// The three schemas derived from a field schema.
#[derive(Clone, Debug, PartialEq)]
pub struct Model {
    pub full: ObjectSchema,
    pub create: ObjectSchema,
    pub update: ObjectSchema,
}

impl Model {
    /// Column holding the owning user id.
    pub fn owner_column(&self) -> &str {
        self.full
            .fields()
            .find(|f| f.role == FieldRole::OwnerRef)
            .map(|f| f.name.as_str())
            .unwrap_or(DEFAULT_OWNER_COLUMN)
    }
}

/// Derive the full/create/update schemas. Fails with a configuration error when a
/// descriptor is malformed.
pub fn derive(schema: &FieldSchema) -> Result<Model, ConfigError> {
    if schema.fields().is_empty() {
        return Err(ConfigError::EmptySchema);
    }

    let mut seen = std::collections::HashSet::new();
    let mut owner: Option<&str> = None;
    let mut full = Vec::with_capacity(schema.fields().len());
    for spec in schema.fields() {
        if !seen.insert(spec.name.as_str()) {
            return Err(ConfigError::DuplicateField(spec.name.clone()));
        }
        if spec.role == FieldRole::OwnerRef {
            if let Some(first) = owner {
                return Err(ConfigError::DuplicateOwner(format!("{}, {}", first, spec.name)));
            }
            owner = Some(&spec.name);
        }
        full.push(check_field(spec)?);
    }
    if owner.is_none() {
        if let Some(spec) = schema
            .fields()
            .iter()
            .find(|f| f.name == DEFAULT_OWNER_COLUMN && f.role == FieldRole::Normal)
        {
            return Err(ConfigError::field(&spec.name, "collides with the owner column"));
        }
    }

    let create: Vec<SchemaField> = full
        .iter()
        .filter(|f| f.spec.role == FieldRole::Normal)
        .cloned()
        .collect();
    let update = create
        .iter()
        .cloned()
        .map(|mut f| {
            f.spec.optional = true;
            f
        })
        .collect();

    Ok(Model {
        full: ObjectSchema { fields: full, partial: false },
        create: ObjectSchema { fields: create, partial: false },
        update: ObjectSchema { fields: update, partial: true },
    })
}

fn check_field(spec: &FieldSpec) -> Result<SchemaField, ConfigError> {
    if !is_safe_identifier(&spec.name) {
        return Err(ConfigError::InvalidIdentifier {
            kind: "column",
            name: spec.name.clone(),
        });
    }
    if let Some(sql_type) = &spec.sql_type {
        if !type_name_re().is_match(sql_type) {
            return Err(ConfigError::InvalidIdentifier {
                kind: "type",
                name: sql_type.clone(),
            });
        }
    }
    check_kind(&spec.name, &spec.kind)?;

    check_bounds(&spec.name, &spec.kind, spec.min, spec.max)?;

    let pattern = match &spec.pattern {
        Some(p) if spec.kind == FieldKind::String => Some(
            Regex::new(p).map_err(|e| ConfigError::field(&spec.name, format!("invalid pattern: {}", e)))?,
        ),
        Some(_) => {
            return Err(ConfigError::field(&spec.name, "pattern requires a string field"));
        }
        None => None,
    };

    if let Some(transform) = spec.transform {
        let compatible = match transform {
            Transform::ParseNumber | Transform::ParseDate => spec.kind == FieldKind::String,
            Transform::EpochMillis => matches!(spec.kind, FieldKind::Number | FieldKind::Integer),
        };
        if !compatible {
            return Err(ConfigError::field(
                &spec.name,
                format!("transform {:?} cannot apply to {} fields", transform, spec.kind.name()),
            ));
        }
    }

    if spec.role == FieldRole::OwnerRef && spec.kind != FieldKind::Identifier {
        return Err(ConfigError::field(&spec.name, "owner_ref fields must be identifiers"));
    }

    let field = SchemaField {
        spec: spec.clone(),
        pattern,
    };
    if let Some(default) = &spec.default {
        validation::coerce(&field, default)
            .map_err(|reason| ConfigError::field(&spec.name, format!("invalid default: {}", reason)))?;
    }
    Ok(field)
}

fn check_kind(field: &str, kind: &FieldKind) -> Result<(), ConfigError> {
    match kind {
        FieldKind::Enum { values } if values.is_empty() => {
            Err(ConfigError::field(field, "enum requires at least one value"))
        }
        FieldKind::Array { items } => {
            check_kind(field, &items.kind)?;
            check_bounds(field, &items.kind, items.min, items.max)
        }
        _ => Ok(()),
    }
}

fn check_bounds(field: &str, kind: &FieldKind, min: Option<f64>, max: Option<f64>) -> Result<(), ConfigError> {
    let bounded = matches!(
        kind,
        FieldKind::String | FieldKind::Number | FieldKind::Integer | FieldKind::Array { .. }
    );
    if (min.is_some() || max.is_some()) && !bounded {
        return Err(ConfigError::field(
            field,
            format!("min/max not supported for {} fields", kind.name()),
        ));
    }
    if let (Some(min), Some(max)) = (min, max) {
        if min > max {
            return Err(ConfigError::field(field, format!("min {} exceeds max {}", min, max)));
        }
    }
    Ok(())
}
