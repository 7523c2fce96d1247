// SPDX-License-Identifier: MIT OR Apache-2.0
//! Port definitions for node inputs/outputs.

use serde::{Deserialize, Serialize};

/// Port direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PortDirection {
    /// Input port
    Input,
    /// Output port
    Output,
}

/// How an unconnected input port is edited inline.
///
/// `None` means the port has no inline editor and only receives its value
/// through a connection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Control {
    /// No inline editor
    None,
    /// Checkbox
    Boolean,
    /// Integer spinner
    Integer,
    /// Float field
    Float,
    /// Free-form text field
    String,
    /// Dropdown restricted to the listed options
    Select {
        /// Allowed values, in display order
        options: Vec<String>,
    },
}

impl Control {
    /// Whether this control kind can hold an inline literal at all
    pub fn holds_value(&self) -> bool {
        !matches!(self, Self::None)
    }

    /// Check that a literal is consistent with this control kind
    pub fn accepts(&self, value: &PortValue) -> bool {
        match (self, value) {
            (Self::Boolean, PortValue::Bool(_))
            | (Self::Integer, PortValue::Int(_))
            | (Self::Float, PortValue::Float(_))
            | (Self::String, PortValue::Str(_)) => true,
            (Self::Select { options }, PortValue::Str(s)) => options.iter().any(|o| o == s),
            _ => false,
        }
    }
}

/// A literal value held by an unconnected input port.
///
/// The active variant must always match the port's declared [`Control`];
/// the graph rejects mismatched literals instead of coercing them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PortValue {
    /// Boolean
    Bool(bool),
    /// Integer
    Int(i64),
    /// Float
    Float(f64),
    /// String
    Str(String),
}

impl PortValue {
    /// Short name of the active variant, for error reporting
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Bool(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Float(_) => "float",
            Self::Str(_) => "string",
        }
    }
}

/// A port on a node
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Port {
    /// Port name, unique within its owning node
    pub name: String,
    /// Port direction
    pub direction: PortDirection,
    /// Datatype identifier, resolved against the [`crate::TypeRegistry`]
    pub datatype: String,
    /// Inline editor kind for unconnected inputs
    pub control: Control,
    /// Kind-defined default literal (inputs with a control only)
    pub default_value: Option<PortValue>,
    /// Current literal. `None` while the port has an incoming connection
    /// or has no control.
    pub value: Option<PortValue>,
}

impl Port {
    /// Create a new input port
    pub fn input(name: impl Into<String>, datatype: impl Into<String>, control: Control) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Input,
            datatype: datatype.into(),
            control,
            default_value: None,
            value: None,
        }
    }

    /// Create a new output port
    pub fn output(name: impl Into<String>, datatype: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            direction: PortDirection::Output,
            datatype: datatype.into(),
            control: Control::None,
            default_value: None,
            value: None,
        }
    }

    /// Set the default literal (and the initial current value)
    pub fn with_default(mut self, value: PortValue) -> Self {
        self.default_value = Some(value.clone());
        self.value = Some(value);
        self
    }

    /// Whether this is an input port
    pub fn is_input(&self) -> bool {
        self.direction == PortDirection::Input
    }

    /// Revert the current literal to the kind-defined default
    pub fn reset_value(&mut self) {
        self.value = self.default_value.clone();
    }
}
