//! Protocol message definitions
//!
//! Controllers speak in method calls: a method name plus a map of named
//! arguments, answered by exactly one response.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Method names understood by the command bridge
pub mod methods {
    pub const MOVE_CURSOR: &str = "moveCursor";
    pub const PERFORM_CLICK: &str = "performClick";
    pub const OPEN_ACCESSIBILITY_SETTINGS: &str = "openAccessibilitySettings";
}

/// A request from the controller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MethodCall {
    pub method: String,
    #[serde(default)]
    pub arguments: Map<String, Value>,
}

impl MethodCall {
    pub fn new(method: impl Into<String>) -> Self {
        Self {
            method: method.into(),
            arguments: Map::new(),
        }
    }

    pub fn with_argument(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.arguments.insert(name.into(), value.into());
        self
    }

    pub fn move_cursor(delta_x: i32, delta_y: i32) -> Self {
        Self::new(methods::MOVE_CURSOR)
            .with_argument("deltaX", delta_x)
            .with_argument("deltaY", delta_y)
    }

    pub fn perform_click() -> Self {
        Self::new(methods::PERFORM_CLICK)
    }

    pub fn open_accessibility_settings() -> Self {
        Self::new(methods::OPEN_ACCESSIBILITY_SETTINGS)
    }

    /// Integer argument saturated to the i32 range.
    /// Missing or non-integer values read as `None`.
    pub fn int_argument(&self, name: &str) -> Option<i32> {
        self.arguments
            .get(name)
            .and_then(Value::as_i64)
            .map(|v| v.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }
}

/// The answer to a [`MethodCall`]
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum MethodResponse {
    /// The command was received
    Success,
    /// The method name is not known
    NotImplemented { method: String },
    /// The request could not be processed
    Error { message: String },
}

impl MethodResponse {
    pub fn is_success(&self) -> bool {
        matches!(self, MethodResponse::Success)
    }
}
