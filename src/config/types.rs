//! Declarative resource definitions: field schemas and resource registrations.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Value kind of a field as the client sends it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FieldKind {
    String,
    Number,
    Integer,
    Boolean,
    Timestamp,
    Identifier,
    Enum { values: Vec<String> },
    Array { items: Box<ItemSpec> },
}

/// Element descriptor of an array field.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ItemSpec {
    #[serde(flatten)]
    pub kind: FieldKind,
    /// Value bound for numeric items, length bound for string items.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
}

impl ItemSpec {
    pub fn new(kind: FieldKind) -> Self {
        ItemSpec { kind, min: None, max: None }
    }

    pub fn bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }
}

impl FieldKind {
    /// Array of unbounded items.
    pub fn array_of(kind: FieldKind) -> Self {
        FieldKind::Array {
            items: Box::new(ItemSpec::new(kind)),
        }
    }

    /// Column type used for statement casts and DDL.
    pub fn column_type(&self) -> &'static str {
        match self {
            FieldKind::String | FieldKind::Enum { .. } => "text",
            FieldKind::Number => "float8",
            FieldKind::Integer => "int8",
            FieldKind::Boolean => "bool",
            FieldKind::Timestamp => "timestamptz",
            FieldKind::Identifier => "uuid",
            FieldKind::Array { .. } => "jsonb",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            FieldKind::String => "string",
            FieldKind::Number => "number",
            FieldKind::Integer => "integer",
            FieldKind::Boolean => "boolean",
            FieldKind::Timestamp => "timestamp",
            FieldKind::Identifier => "identifier",
            FieldKind::Enum { .. } => "enum",
            FieldKind::Array { .. } => "array",
        }
    }
}

/// Who controls a field's value.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldRole {
    /// Generated by the store (primary key, creation timestamp).
    ServerAssigned,
    /// The owning user; always taken from the authenticated caller.
    OwnerRef,
    #[default]
    Normal,
}

/// Conversion applied after the kind check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Transform {
    /// Decimal string to number.
    ParseNumber,
    /// Milliseconds since the Unix epoch to timestamp.
    EpochMillis,
    /// Date or date-time string to timestamp.
    ParseDate,
}

impl Transform {
    pub fn output_kind(&self) -> FieldKind {
        match self {
            Transform::ParseNumber => FieldKind::Number,
            Transform::EpochMillis | Transform::ParseDate => FieldKind::Timestamp,
        }
    }
}

/// One named field of a record type.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FieldSpec {
    pub name: String,
    #[serde(flatten)]
    pub kind: FieldKind,
    #[serde(default)]
    pub role: FieldRole,
    #[serde(default)]
    pub optional: bool,
    /// Length bound for strings and arrays, value bound for numbers.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transform: Option<Transform>,
    /// Overrides the column type derived from the kind (e.g. a PostgreSQL enum type).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sql_type: Option<String>,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind) -> Self {
        FieldSpec {
            name: name.into(),
            kind,
            role: FieldRole::Normal,
            optional: false,
            min: None,
            max: None,
            pattern: None,
            default: None,
            transform: None,
            sql_type: None,
        }
    }

    pub fn role(mut self, role: FieldRole) -> Self {
        self.role = role;
        self
    }

    pub fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    pub fn bounds(mut self, min: Option<f64>, max: Option<f64>) -> Self {
        self.min = min;
        self.max = max;
        self
    }

    pub fn pattern(mut self, pattern: impl Into<String>) -> Self {
        self.pattern = Some(pattern.into());
        self
    }

    pub fn default_value(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    pub fn transform(mut self, transform: Transform) -> Self {
        self.transform = Some(transform);
        self
    }

    /// Kind of the value after the transform, i.e. what gets stored.
    pub fn stored_kind(&self) -> FieldKind {
        self.transform
            .map(|t| t.output_kind())
            .unwrap_or_else(|| self.kind.clone())
    }

    pub fn column_type(&self) -> String {
        self.sql_type
            .clone()
            .unwrap_or_else(|| self.stored_kind().column_type().to_string())
    }
}

/// Ordered field list describing a record type.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldSchema(pub Vec<FieldSpec>);

impl FieldSchema {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        FieldSchema(fields)
    }

    pub fn fields(&self) -> &[FieldSpec] {
        &self.0
    }

    pub fn get(&self, name: &str) -> Option<&FieldSpec> {
        self.0.iter().find(|f| f.name == name)
    }
}

fn default_key_column() -> String {
    "id".into()
}

/// Binds a backing table and a mount point to a field schema.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ResourceRegistration {
    pub table: String,
    pub endpoint: String,
    /// Primary key column used by the id-scoped statements.
    #[serde(default = "default_key_column")]
    pub key_column: String,
    pub schema: FieldSchema,
}

impl ResourceRegistration {
    pub fn new(table: impl Into<String>, endpoint: impl Into<String>, schema: FieldSchema) -> Self {
        ResourceRegistration {
            table: table.into(),
            endpoint: endpoint.into(),
            key_column: default_key_column(),
            schema,
        }
    }
}
