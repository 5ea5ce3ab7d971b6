use indexmap::IndexMap;
use serde::{Serialize, Serializer};
use serde_json::Map;

/// A decoded field value. `Null` marks an absent optional field.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Record(ExtractedRecord),
    Sequence(Vec<Value>),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Value::Integer(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_record(&self) -> Option<&ExtractedRecord> {
        match self {
            Value::Record(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_sequence(&self) -> Option<&[Value]> {
        match self {
            Value::Sequence(items) => Some(items),
            _ => None,
        }
    }

    /// Convert to a plain JSON tree. Records become objects in field order.
    pub fn to_plain_value(&self) -> serde_json::Value {
        match self {
            Value::Null => serde_json::Value::Null,
            Value::Text(s) => serde_json::Value::String(s.clone()),
            Value::Integer(n) => serde_json::Value::from(*n),
            Value::Record(r) => r.to_plain_value(),
            Value::Sequence(items) => {
                serde_json::Value::Array(items.iter().map(Value::to_plain_value).collect())
            }
        }
    }

    /// Rebuild a value from its plain JSON form. Nested records come back
    /// unnamed since names are not part of the plain tree. Booleans and
    /// non-integer numbers have no counterpart and yield `None`.
    pub fn from_plain(plain: &serde_json::Value) -> Option<Value> {
        Some(match plain {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::String(s) => Value::Text(s.clone()),
            serde_json::Value::Number(n) => Value::Integer(n.as_i64()?),
            serde_json::Value::Array(items) => Value::Sequence(
                items.iter().map(Value::from_plain).collect::<Option<_>>()?,
            ),
            serde_json::Value::Object(map) => {
                let mut record = ExtractedRecord::new("");
                for (name, field) in map {
                    record.set_field(name.as_str(), Value::from_plain(field)?);
                }
                Value::Record(record)
            }
            serde_json::Value::Bool(_) => return None,
        })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<ExtractedRecord> for Value {
    fn from(r: ExtractedRecord) -> Self {
        Value::Record(r)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map_or(Value::Null, Into::into)
    }
}

impl From<Vec<Value>> for Value {
    fn from(items: Vec<Value>) -> Self {
        Value::Sequence(items)
    }
}

/// Output of one extraction: the schema name plus its fields in schema order.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ExtractedRecord {
    name: String,
    fields: IndexMap<String, Value>,
}

impl ExtractedRecord {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: IndexMap::new(),
        }
    }

    /// Builder-style insert, used when assembling records by hand.
    pub fn with(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set_field(name, value);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Insert or overwrite a field. Overwriting keeps the field's position, so
    /// patching the same field twice is idempotent.
    pub fn set_field(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(name.into(), value.into());
    }

    pub fn fields(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn to_plain_value(&self) -> serde_json::Value {
        let map: Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(k, v)| (k.clone(), v.to_plain_value()))
            .collect();
        serde_json::Value::Object(map)
    }
}

impl Serialize for ExtractedRecord {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.fields.serialize(serializer)
    }
}
