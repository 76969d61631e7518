//! Field readers over a raw event object
//!
//! A [`FieldReader`] walks one raw JSON object and accumulates every
//! structural error and analytics warning it meets, so a caller can read all
//! fields first and decide afterwards. Readers return `None` both for absent
//! optional fields and for fields that were rejected; rejections are always
//! recorded in the error list.

use serde_json::{Map, Value};

use warden_core::{Difficulty, DurationMs, GuestEvent, LevelId, SessionId, KIND_FIELD, MAX_SAFE_INTEGER};

use crate::{FieldError, FieldWarning, ValidationOutcome};

/// Parser for a single structural field
pub type Parse<T> = fn(&Value) -> Result<T, String>;

pub struct FieldReader<'a> {
    obj: &'a Map<String, Value>,
    consumed: Vec<&'static str>,
    errors: Vec<FieldError>,
    warnings: Vec<FieldWarning>,
}

impl<'a> FieldReader<'a> {
    pub fn new(obj: &'a Map<String, Value>) -> Self {
        FieldReader {
            obj,
            consumed: Vec::with_capacity(obj.len()),
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Mark a field as read and fetch it; `null` reads as absent
    fn take(&mut self, field: &'static str) -> Option<&'a Value> {
        self.consumed.push(field);
        let obj = self.obj;
        match obj.get(field) {
            None | Some(Value::Null) => None,
            Some(value) => Some(value),
        }
    }

    pub fn error(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.errors.push(FieldError::new(field, message));
    }

    pub fn warn(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.warnings.push(FieldWarning::new(field, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// Required structural field: absent or invalid rejects the event
    pub fn required<T>(&mut self, field: &'static str, parse: Parse<T>) -> Option<T> {
        match self.take(field) {
            None => {
                self.error(field, "is required");
                None
            }
            Some(value) => self.parse_structural(field, value, parse),
        }
    }

    /// Optional structural field: absent is fine, invalid rejects the event
    pub fn optional<T>(&mut self, field: &'static str, parse: Parse<T>) -> Option<T> {
        let value = self.take(field)?;
        self.parse_structural(field, value, parse)
    }

    fn parse_structural<T>(&mut self, field: &'static str, value: &Value, parse: Parse<T>) -> Option<T> {
        match parse(value) {
            Ok(parsed) => Some(parsed),
            Err(message) => {
                self.error(field, message);
                None
            }
        }
    }

    /// Required enumerated field
    pub fn tag<T>(&mut self, field: &'static str, from_tag: fn(&str) -> Option<T>) -> Option<T> {
        let Some(value) = self.take(field) else {
            self.error(field, "is required");
            return None;
        };
        match value.as_str() {
            Some(raw) => match from_tag(raw) {
                Some(parsed) => Some(parsed),
                None => {
                    self.error(field, format!("unrecognized value {:?}", truncate(raw)));
                    None
                }
            },
            None => {
                self.error(field, format!("expected string, found {}", json_type(value)));
                None
            }
        }
    }

    /// Analytics number clamped into `[min, max]`
    pub fn clamped(&mut self, field: &'static str, min: f64, max: f64) -> Option<f64> {
        let value = self.take(field)?;
        let Some(n) = value.as_f64().filter(|n| n.is_finite()) else {
            self.warn(field, format!("non-numeric value ({}) dropped", json_type(value)));
            return None;
        };
        if n < min {
            self.warn(field, format!("{} clamped to {}", n, min));
            Some(min)
        } else if n > max {
            self.warn(field, format!("{} clamped to {}", n, max));
            Some(max)
        } else {
            Some(n)
        }
    }

    /// Analytics proportion in [0, 1]
    #[inline]
    pub fn proportion(&mut self, field: &'static str) -> Option<f64> {
        self.clamped(field, 0.0, 1.0)
    }

    /// Analytics magnitude in [0, inf)
    #[inline]
    pub fn magnitude(&mut self, field: &'static str) -> Option<f64> {
        self.clamped(field, 0.0, f64::MAX)
    }

    /// Analytics count: clamped non-negative, fractional parts truncated
    pub fn count(&mut self, field: &'static str) -> Option<u64> {
        let n = self.clamped(field, 0.0, MAX_SAFE_INTEGER)?;
        if n.fract() != 0.0 {
            self.warn(field, format!("{} truncated to {}", n, n.trunc()));
        }
        Some(n.trunc() as u64)
    }

    /// Accept the event if no structural error was recorded
    pub fn finish(mut self, event: GuestEvent) -> ValidationOutcome {
        self.flag_unknown_fields();
        if self.errors.is_empty() {
            ValidationOutcome::accepted(event, self.warnings)
        } else {
            ValidationOutcome::rejected(self.errors, self.warnings)
        }
    }

    /// Reject with the errors collected so far
    pub fn reject(mut self) -> ValidationOutcome {
        self.flag_unknown_fields();
        if self.errors.is_empty() {
            self.error("$", "rejected");
        }
        ValidationOutcome::rejected(self.errors, self.warnings)
    }

    fn flag_unknown_fields(&mut self) {
        let unknown: Vec<String> = self
            .obj
            .keys()
            .filter(|key| {
                key.as_str() != KIND_FIELD && !self.consumed.iter().any(|c| *c == key.as_str())
            })
            .map(|key| truncate(key).to_string())
            .collect();
        for key in unknown {
            self.warn(key, "unknown field ignored");
        }
    }
}

pub fn session_id(value: &Value) -> Result<SessionId, String> {
    let raw = expect_str(value)?;
    SessionId::new(raw).map_err(|e| e.to_string())
}

pub fn level_id(value: &Value) -> Result<LevelId, String> {
    let raw = expect_str(value)?;
    LevelId::new(raw).map_err(|e| e.to_string())
}

pub fn difficulty(value: &Value) -> Result<Difficulty, String> {
    let raw = expect_number(value)?;
    Difficulty::from_f64(raw).map_err(|e| e.to_string())
}

pub fn duration(value: &Value) -> Result<DurationMs, String> {
    let raw = expect_number(value)?;
    DurationMs::from_f64(raw).map_err(|e| e.to_string())
}

/// Control-flow count: non-negative integer that fits in u32
pub fn step_count(value: &Value) -> Result<u32, String> {
    let raw = expect_number(value)?;
    match warden_core::non_negative_integer(raw) {
        Some(n) if n <= u32::MAX as u64 => Ok(n as u32),
        _ => Err(format!("expected non-negative integer, found {}", raw)),
    }
}

/// Control-flow count that must be at least one
pub fn positive_count(value: &Value) -> Result<u32, String> {
    match step_count(value)? {
        0 => Err("expected integer >= 1, found 0".to_string()),
        n => Ok(n),
    }
}

pub fn boolean(value: &Value) -> Result<bool, String> {
    value
        .as_bool()
        .ok_or_else(|| format!("expected boolean, found {}", json_type(value)))
}

pub fn string(value: &Value) -> Result<String, String> {
    expect_str(value).map(str::to_string)
}

pub fn non_empty_string(value: &Value) -> Result<String, String> {
    match expect_str(value)? {
        "" => Err("expected non-empty string".to_string()),
        raw => Ok(raw.to_string()),
    }
}

/// Any JSON value; presence is checked by the reader
pub fn opaque(value: &Value) -> Result<Value, String> {
    Ok(value.clone())
}

fn expect_str(value: &Value) -> Result<&str, String> {
    value
        .as_str()
        .ok_or_else(|| format!("expected string, found {}", json_type(value)))
}

fn expect_number(value: &Value) -> Result<f64, String> {
    value
        .as_f64()
        .ok_or_else(|| format!("expected number, found {}", json_type(value)))
}

pub fn json_type(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Keep guest-controlled text in diagnostics short
fn truncate(raw: &str) -> &str {
    const MAX: usize = 64;
    if raw.len() <= MAX {
        return raw;
    }
    let mut end = MAX;
    while !raw.is_char_boundary(end) {
        end -= 1;
    }
    &raw[..end]
}
