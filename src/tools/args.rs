//! Typed access to a tool call's flat argument map

use crate::error::{Result, ToolError};
use serde_json::{Map, Value};

pub struct Arguments<'a> {
    map: &'a Map<String, Value>,
}

fn invalid(name: &str, expected: &str, value: &Value) -> ToolError {
    ToolError::validation(format!("{name} must be {expected}, got {value}"))
}

impl<'a> Arguments<'a> {
    pub fn new(map: &'a Map<String, Value>) -> Self {
        Self { map }
    }

    /// `null` counts as absent
    fn get(&self, name: &str) -> Option<&'a Value> {
        self.map.get(name).filter(|v| !v.is_null())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// Present and non-blank
    pub fn required_str(&self, name: &str) -> Result<String> {
        self.optional_str(name)?
            .ok_or_else(|| ToolError::validation(format!("{name} is required and must not be empty")))
    }

    /// Blank strings count as absent
    pub fn optional_str(&self, name: &str) -> Result<Option<String>> {
        match self.get(name) {
            None => Ok(None),
            Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(invalid(name, "a string", other)),
        }
    }

    /// Integers may arrive as numbers, integral floats or numeric strings
    pub fn optional_int(&self, name: &str) -> Result<Option<i64>> {
        let Some(value) = self.get(name) else {
            return Ok(None);
        };
        let parsed = match value {
            Value::Number(n) => n
                .as_i64()
                .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64)),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed
            .map(Some)
            .ok_or_else(|| invalid(name, "an integer", value))
    }

    pub fn u32_or(&self, name: &str, default: u32) -> Result<u32> {
        match self.optional_int(name)? {
            None => Ok(default),
            Some(n) => u32::try_from(n).map_err(|_| {
                ToolError::validation(format!("{name} must be a non-negative integer, got {n}"))
            }),
        }
    }

    pub fn required_u32(&self, name: &str) -> Result<u32> {
        if !self.contains(name) {
            return Err(ToolError::validation(format!("{name} is required")));
        }
        self.u32_or(name, 0)
    }

    pub fn f64_or(&self, name: &str, default: f64) -> Result<f64> {
        let Some(value) = self.get(name) else {
            return Ok(default);
        };
        let parsed = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        };
        parsed
            .filter(|f: &f64| f.is_finite())
            .ok_or_else(|| invalid(name, "a number", value))
    }

    /// Accepts booleans, 0/1 and "true"/"false"
    pub fn bool_or(&self, name: &str, default: bool) -> Result<bool> {
        let Some(value) = self.get(name) else {
            return Ok(default);
        };
        match value {
            Value::Bool(b) => Ok(*b),
            Value::Number(n) if n.as_i64() == Some(0) => Ok(false),
            Value::Number(n) if n.as_i64() == Some(1) => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("true") => Ok(true),
            Value::String(s) if s.eq_ignore_ascii_case("false") => Ok(false),
            other => Err(invalid(name, "a boolean", other)),
        }
    }
}
