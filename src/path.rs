//! Path-addressed mutation of a document's `data` tree.
//!
//! A key expression such as `a.b[0][2].c` is split on `.` into segments; a
//! segment is a mapping key optionally followed by list indices. Applying an
//! expression writes a value at that location, creating intermediate objects
//! and arrays as needed.
//!
//! # Rules
//!
//! - Allowed characters are ASCII letters, digits, `.`, `[` and `]`.
//! - Every segment needs a non-empty key; indices are plain digits.
//! - Arrays only ever grow by one: index `len` appends, anything larger is
//!   out of bounds.
//! - Writes are copy-on-write: nothing changes unless the whole path applies.
//! - The result reports whether anything actually changed, so writing a value
//!   that is already there is a no-op.

use std::fmt;
use std::str::FromStr;

use serde_json::{Map, Value};
use thiserror::Error;

/// Error type for key expressions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PathError {
    /// The expression is malformed.
    #[error("invalid key '{path}': {reason}")]
    Validation { path: String, reason: String },

    /// A list index is outside the `0..=len` growth range.
    #[error("index {index} is out of bounds for '{segment}' (length {len})")]
    Bounds {
        segment: String,
        index: String,
        len: usize,
    },
}

impl PathError {
    fn invalid(path: &str, reason: impl Into<String>) -> Self {
        Self::Validation {
            path: path.to_string(),
            reason: reason.into(),
        }
    }
}

/// One dot-separated part of a key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Segment {
    /// Mapping key.
    pub name: String,
    /// List indices following the key, outermost first. Kept as text so an
    /// index too large for `usize` still reports as out of bounds.
    pub indices: Vec<String>,
}

impl Segment {
    /// Whether this segment addresses into a list.
    #[must_use]
    pub fn is_list(&self) -> bool {
        !self.indices.is_empty()
    }

    fn parse(path: &str, text: &str) -> Result<Self, PathError> {
        if text.is_empty() {
            return Err(PathError::invalid(path, "empty segment"));
        }

        let (name, mut rest) = match text.find(|c: char| c == '[' || c == ']') {
            Some(pos) => text.split_at(pos),
            None => (text, ""),
        };
        if name.is_empty() {
            return Err(PathError::invalid(
                path,
                format!("segment '{}' has no key before its index", text),
            ));
        }

        let mut indices = Vec::new();
        while !rest.is_empty() {
            let Some(body) = rest.strip_prefix('[') else {
                return Err(PathError::invalid(
                    path,
                    format!("unexpected '{}' in segment '{}'", rest, text),
                ));
            };
            let Some(close) = body.find(']') else {
                return Err(PathError::invalid(
                    path,
                    format!("unclosed '[' in segment '{}'", text),
                ));
            };
            let index = &body[..close];
            if index.is_empty() {
                return Err(PathError::invalid(
                    path,
                    format!("empty index in segment '{}'", text),
                ));
            }
            if !index.bytes().all(|b| b.is_ascii_digit()) {
                return Err(PathError::invalid(
                    path,
                    format!("index '{}' in segment '{}' is not a number", index, text),
                ));
            }
            indices.push(index.to_string());
            rest = &body[close + 1..];
        }

        Ok(Self {
            name: name.to_string(),
            indices,
        })
    }
}

impl fmt::Display for Segment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        for index in &self.indices {
            write!(f, "[{}]", index)?;
        }
        Ok(())
    }
}

/// A parsed key expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPath {
    segments: Vec<Segment>,
}

impl KeyPath {
    /// Parse a key expression.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Validation`] for disallowed characters, empty
    /// segments, empty keys, unbalanced or empty brackets and non-numeric
    /// indices.
    pub fn parse(text: &str) -> Result<Self, PathError> {
        if let Some(bad) = text
            .chars()
            .find(|&c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '[' | ']')))
        {
            return Err(PathError::invalid(
                text,
                format!("character '{}' is not allowed", bad),
            ));
        }

        let segments = text
            .split('.')
            .map(|segment| Segment::parse(text, segment))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { segments })
    }

    /// The parsed segments, in order.
    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Drop a leading plain `data` segment, which names the data root itself.
    ///
    /// A lone `data` is kept: it addresses a key called `data` inside the root.
    #[must_use]
    pub fn strip_data_root(mut self) -> Self {
        if self.segments.len() > 1 && self.segments[0].name == "data" && !self.segments[0].is_list()
        {
            self.segments.remove(0);
        }
        self
    }

    /// Write `value` at this path inside `data`.
    ///
    /// Works on a copy; `data` is only replaced when the whole path applies.
    /// Returns whether anything changed.
    ///
    /// # Errors
    ///
    /// Returns [`PathError::Bounds`] when an index exceeds the length of its
    /// list; `data` is left untouched.
    pub fn apply(&self, data: &mut Map<String, Value>, value: Value) -> Result<bool, PathError> {
        let mut draft = data.clone();
        let changed = write_object(&mut draft, &self.segments, value)?;
        if changed {
            *data = draft;
        }
        Ok(changed)
    }
}

impl FromStr for KeyPath {
    type Err = PathError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for KeyPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, segment) in self.segments.iter().enumerate() {
            if i > 0 {
                f.write_str(".")?;
            }
            write!(f, "{}", segment)?;
        }
        Ok(())
    }
}

/// Parse `path` and apply it to a copy of `data`.
///
/// Returns the new tree and whether it differs from the input.
///
/// # Errors
///
/// Returns [`PathError`] for malformed paths or out-of-bounds indices.
pub fn apply(
    data: &Map<String, Value>,
    path: &str,
    value: Value,
) -> Result<(Map<String, Value>, bool), PathError> {
    let path = KeyPath::parse(path)?;
    let mut next = data.clone();
    let changed = path.apply(&mut next, value)?;
    Ok((next, changed))
}

/// Shape a slot must have before descending into it.
#[derive(Clone, Copy)]
enum Shape {
    Object,
    Array,
}

impl Shape {
    fn empty(self) -> Value {
        match self {
            Self::Object => Value::Object(Map::new()),
            Self::Array => Value::Array(Vec::new()),
        }
    }

    fn matches(self, value: &Value) -> bool {
        match self {
            Self::Object => value.is_object(),
            Self::Array => value.is_array(),
        }
    }
}

/// Replace `slot` with an empty container unless it already has `shape`.
fn coerce(slot: &mut Value, shape: Shape) -> bool {
    if shape.matches(slot) {
        false
    } else {
        *slot = shape.empty();
        true
    }
}

fn write_object(
    object: &mut Map<String, Value>,
    segments: &[Segment],
    value: Value,
) -> Result<bool, PathError> {
    let Some((segment, rest)) = segments.split_first() else {
        return Ok(false);
    };

    if !segment.is_list() {
        if rest.is_empty() {
            if object.get(&segment.name) == Some(&value) {
                return Ok(false);
            }
            object.insert(segment.name.clone(), value);
            return Ok(true);
        }

        let slot = object
            .entry(segment.name.clone())
            .or_insert(Value::Null);
        let mut changed = coerce(slot, Shape::Object);
        if let Value::Object(inner) = slot {
            changed |= write_object(inner, rest, value)?;
        }
        return Ok(changed);
    }

    let slot = object
        .entry(segment.name.clone())
        .or_insert(Value::Null);
    let mut changed = coerce(slot, Shape::Array);
    if let Value::Array(list) = slot {
        changed |= write_list(list, segment, 0, rest, value)?;
    }
    Ok(changed)
}

fn write_list(
    list: &mut Vec<Value>,
    segment: &Segment,
    depth: usize,
    rest: &[Segment],
    value: Value,
) -> Result<bool, PathError> {
    let raw = &segment.indices[depth];
    let index = checked_index(raw, list.len()).ok_or_else(|| PathError::Bounds {
        segment: segment.to_string(),
        index: raw.clone(),
        len: list.len(),
    })?;
    let last_index = depth + 1 == segment.indices.len();

    if last_index && rest.is_empty() {
        if index == list.len() {
            list.push(value);
            return Ok(true);
        }
        if list[index] == value {
            return Ok(false);
        }
        list[index] = value;
        return Ok(true);
    }

    let shape = if last_index { Shape::Object } else { Shape::Array };
    let mut changed = false;
    if index == list.len() {
        list.push(shape.empty());
        changed = true;
    }
    let slot = &mut list[index];
    changed |= coerce(slot, shape);

    match slot {
        Value::Array(inner) => changed |= write_list(inner, segment, depth + 1, rest, value)?,
        Value::Object(inner) => changed |= write_object(inner, rest, value)?,
        _ => {}
    }
    Ok(changed)
}

/// Resolve an index within the growth range `0..=len`.
///
/// Index text is digits only, so negative indices never reach here.
fn checked_index(raw: &str, len: usize) -> Option<usize> {
    raw.parse::<usize>().ok().filter(|&index| index <= len)
}
