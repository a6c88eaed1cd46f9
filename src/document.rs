//! The embedded metadata document.
//!
//! A [`Document`] is the `{name, password, data}` object stored in a media
//! file's header region. The nested `data` tree uses serde_json's closed
//! [`Value`] union (null, bool, number, string, array, object), so coercions
//! are explicit matches on its variants rather than duck typing.
//!
//! A file whose header has been wiped carries no document at all; that is
//! modelled by [`Header::Wiped`], which is a different state from a document
//! whose `data` has merely been cleared.

use serde::Serialize;
use serde_json::{Map, Value};

/// The exact set of keys a valid document carries.
pub const DOCUMENT_KEYS: [&str; 3] = ["name", "password", "data"];

/// Reasons a JSON value is not a valid document.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShapeError {
    /// The top-level value is not an object.
    #[error("expected an object, found {0}")]
    NotAnObject(&'static str),

    /// A required key is absent.
    #[error("missing key '{0}'")]
    MissingKey(&'static str),

    /// A key other than `name`, `password` and `data` is present.
    #[error("unexpected key '{0}'")]
    UnexpectedKey(String),

    /// A known key holds a value of the wrong type.
    #[error("key '{key}' must be {expected}")]
    WrongType {
        key: &'static str,
        expected: &'static str,
    },
}

/// The embedded `{name, password, data}` object.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct Document {
    /// Display label.
    pub name: Option<String>,
    /// Password digest in PHC string form; `None` when unlocked.
    pub password: Option<String>,
    /// User-defined nested document.
    pub data: Map<String, Value>,
}

impl Document {
    /// Build a document from a parsed JSON value, enforcing the exact shape.
    pub fn from_value(value: Value) -> Result<Self, ShapeError> {
        let mut object = match value {
            Value::Object(object) => object,
            other => return Err(ShapeError::NotAnObject(kind_name(&other))),
        };

        if let Some(extra) = object
            .keys()
            .find(|key| !DOCUMENT_KEYS.contains(&key.as_str()))
        {
            return Err(ShapeError::UnexpectedKey(extra.clone()));
        }

        let name = optional_string(&mut object, "name")?;
        let password = optional_string(&mut object, "password")?;
        let data = match object.remove("data") {
            Some(Value::Object(data)) => data,
            Some(_) => {
                return Err(ShapeError::WrongType {
                    key: "data",
                    expected: "an object",
                })
            }
            None => return Err(ShapeError::MissingKey("data")),
        };

        Ok(Self {
            name,
            password,
            data,
        })
    }

    /// Convert back into a JSON object value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        let mut object = Map::new();
        object.insert(
            "name".into(),
            self.name.clone().map_or(Value::Null, Value::String),
        );
        object.insert(
            "password".into(),
            self.password.clone().map_or(Value::Null, Value::String),
        );
        object.insert("data".into(), Value::Object(self.data.clone()));
        Value::Object(object)
    }

    /// Whether a password digest is stored.
    #[must_use]
    pub fn is_locked(&self) -> bool {
        self.password.is_some()
    }
}

fn optional_string(
    object: &mut Map<String, Value>,
    key: &'static str,
) -> Result<Option<String>, ShapeError> {
    match object.remove(key) {
        Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(_) => Err(ShapeError::WrongType {
            key,
            expected: "a string or null",
        }),
        None => Err(ShapeError::MissingKey(key)),
    }
}

/// Human-readable name of a value's variant, for error messages.
#[must_use]
pub fn kind_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// What a loaded file's header region holds.
#[derive(Debug, Clone, PartialEq)]
pub enum Header {
    /// A document, possibly the default one.
    Present(Document),
    /// The header was wiped; saving removes it from the file entirely.
    Wiped,
}

impl Header {
    /// The document, unless the header was wiped.
    #[must_use]
    pub fn document(&self) -> Option<&Document> {
        match self {
            Self::Present(doc) => Some(doc),
            Self::Wiped => None,
        }
    }

    /// Mutable access to the document, unless the header was wiped.
    pub fn document_mut(&mut self) -> Option<&mut Document> {
        match self {
            Self::Present(doc) => Some(doc),
            Self::Wiped => None,
        }
    }

    #[must_use]
    pub fn is_wiped(&self) -> bool {
        matches!(self, Self::Wiped)
    }

    /// JSON view of the header; a wiped header is `{}`.
    #[must_use]
    pub fn to_value(&self) -> Value {
        match self {
            Self::Present(doc) => doc.to_value(),
            Self::Wiped => Value::Object(Map::new()),
        }
    }
}
