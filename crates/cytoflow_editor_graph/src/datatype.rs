// SPDX-License-Identifier: MIT OR Apache-2.0
//! The closed registry of port datatypes.
//!
//! The registry is populated once at bootstrap and treated as immutable for
//! the rest of the editing session. Compatibility is directional: datatype
//! `A` may feed a port expecting `B` iff `A == B` or `B` is listed in `A`'s
//! widening set.

use crate::graph::GraphError;
use crate::port::Control;
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

/// A registered port datatype
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Datatype {
    /// Stable identifier, e.g. `"fcs-channel"`
    pub id: String,
    /// Datatypes this one may feed in addition to itself
    pub feeds: Vec<String>,
    /// Default inline editor for a bare input of this type
    pub control: Control,
    /// Display color for ports and wires of this type
    pub color: [u8; 3],
}

impl Datatype {
    /// Create a new datatype with no widenings
    pub fn new(id: impl Into<String>, control: Control) -> Self {
        Self {
            id: id.into(),
            feeds: Vec::new(),
            control,
            color: [150, 150, 150],
        }
    }

    /// Allow this datatype to feed another one
    pub fn feeds(mut self, target: impl Into<String>) -> Self {
        self.feeds.push(target.into());
        self
    }

    /// Set the display color
    pub fn with_color(mut self, color: [u8; 3]) -> Self {
        self.color = color;
        self
    }
}

/// Registry of the datatypes ports may carry.
///
/// Closed after bootstrap; the editing session never mutates it.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: IndexMap<String, Datatype>,
}

impl TypeRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a datatype. Re-registering an id replaces the earlier entry.
    pub fn register(&mut self, datatype: Datatype) {
        self.types.insert(datatype.id.clone(), datatype);
    }

    /// Get a datatype by id
    pub fn get(&self, id: &str) -> Option<&Datatype> {
        self.types.get(id)
    }

    /// Whether an id is registered
    pub fn contains(&self, id: &str) -> bool {
        self.types.contains_key(id)
    }

    /// All registered datatypes, in registration order
    pub fn datatypes(&self) -> impl Iterator<Item = &Datatype> {
        self.types.values()
    }

    /// Whether `source` may feed a port expecting `target`.
    ///
    /// Reflexive for every registered datatype; fails with
    /// [`GraphError::UnknownDatatype`] for any unregistered id.
    pub fn is_compatible(&self, source: &str, target: &str) -> Result<bool, GraphError> {
        let source = self
            .types
            .get(source)
            .ok_or_else(|| GraphError::UnknownDatatype(source.to_owned()))?;
        if !self.types.contains_key(target) {
            return Err(GraphError::UnknownDatatype(target.to_owned()));
        }
        Ok(source.id == target || source.feeds.iter().any(|t| t == target))
    }

    /// Check that every widening target refers to a registered datatype.
    ///
    /// Registration order is free (a widening may name a datatype that is
    /// registered later), so hosts call this once bootstrap is complete;
    /// a typo'd `feeds` entry surfaces as [`GraphError::UnknownDatatype`]
    /// at startup instead of sitting in the registry as dead data.
    pub fn validate(&self) -> Result<(), GraphError> {
        for datatype in self.types.values() {
            for target in &datatype.feeds {
                if !self.types.contains_key(target) {
                    return Err(GraphError::UnknownDatatype(target.clone()));
                }
            }
        }
        Ok(())
    }

    /// Default inline control for a bare input port of the given datatype
    pub fn control_for(&self, id: &str) -> Result<&Control, GraphError> {
        self.types
            .get(id)
            .map(|d| &d.control)
            .ok_or_else(|| GraphError::UnknownDatatype(id.to_owned()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registry() -> TypeRegistry {
        let mut types = TypeRegistry::new();
        types.register(Datatype::new("integer", Control::Integer).feeds("float"));
        types.register(Datatype::new("float", Control::Float));
        types.register(Datatype::new("fcs-channel", Control::None));
        types
    }

    #[test]
    fn test_compatibility_is_reflexive() {
        let types = registry();
        assert!(types.is_compatible("float", "float").unwrap());
        assert!(types.is_compatible("fcs-channel", "fcs-channel").unwrap());
    }

    #[test]
    fn test_widening_is_directional() {
        let types = registry();
        assert!(types.is_compatible("integer", "float").unwrap());
        assert!(!types.is_compatible("float", "integer").unwrap());
        assert!(!types.is_compatible("float", "fcs-channel").unwrap());
    }

    #[test]
    fn test_unknown_datatype_is_reported() {
        let types = registry();
        assert!(matches!(
            types.is_compatible("gate-region", "float"),
            Err(GraphError::UnknownDatatype(id)) if id == "gate-region"
        ));
        assert!(matches!(
            types.is_compatible("float", "gate-region"),
            Err(GraphError::UnknownDatatype(_))
        ));
        assert!(types.control_for("gate-region").is_err());
    }

    #[test]
    fn test_validate_catches_unregistered_widening_target() {
        assert!(registry().validate().is_ok());

        let mut types = TypeRegistry::new();
        types.register(Datatype::new("integer", Control::Integer).feeds("flaot"));
        types.register(Datatype::new("float", Control::Float));
        assert!(matches!(
            types.validate(),
            Err(GraphError::UnknownDatatype(id)) if id == "flaot"
        ));
    }

    #[test]
    fn test_control_for() {
        let types = registry();
        assert_eq!(types.control_for("integer").unwrap(), &Control::Integer);
        assert_eq!(types.control_for("fcs-channel").unwrap(), &Control::None);
    }
}
