// SPDX-License-Identifier: MIT OR Apache-2.0
//! Built-in flow-cytometry datatypes and node kinds.
//!
//! This is bootstrap data only: the core never consults it directly, a
//! host populates its registries from here (or from its own catalog) at
//! process start.

use crate::datatype::{Datatype, TypeRegistry};
use crate::graph::GraphError;
use crate::node::{KindRegistry, NodeKind};
use crate::port::{Control, Port, PortValue};

/// Register the standard cytometry datatypes.
pub fn register_cytometry_types(types: &mut TypeRegistry) {
    types.register(
        Datatype::new("boolean", Control::Boolean).with_color([200, 80, 80]),
    );
    types.register(
        Datatype::new("integer", Control::Integer)
            .feeds("float")
            .with_color([80, 200, 200]),
    );
    types.register(Datatype::new("float", Control::Float).with_color([80, 200, 80]));
    types.register(Datatype::new("string", Control::String).with_color([200, 180, 150]));
    types.register(Datatype::new("fcs-channel", Control::None).with_color([100, 150, 200]));
    types.register(Datatype::new("gate-region", Control::None).with_color([200, 100, 200]));
}

/// Register the standard cytometry node kinds.
///
/// Fails if the kinds are inconsistent with the given type registry; with
/// the registry from [`register_cytometry_types`] this cannot happen.
pub fn register_cytometry_kinds(
    types: &TypeRegistry,
    kinds: &mut KindRegistry,
) -> Result<(), GraphError> {
    // ========================================================================
    // Sources
    // ========================================================================

    kinds.register(
        types,
        NodeKind::new(
            "fcs-source",
            "FCS File",
            "Event population loaded from an FCS file",
            vec![
                Port::input("file", "string", Control::String)
                    .with_default(PortValue::Str(String::new())),
                Port::output("events", "fcs-channel"),
            ],
        ),
    )?;

    kinds.register(
        types,
        NodeKind::new(
            "constant",
            "Constant",
            "Constant scalar value",
            vec![
                Port::input("value", "float", Control::Float)
                    .with_default(PortValue::Float(0.0)),
                Port::output("out", "float"),
            ],
        ),
    )?;

    kinds.register(
        types,
        NodeKind::new(
            "polygon-region",
            "Polygon Region",
            "Region drawn with the polygon gate tool",
            vec![Port::output("region", "gate-region")],
        ),
    )?;

    // ========================================================================
    // Gates
    // ========================================================================

    kinds.register(
        types,
        NodeKind::new(
            "threshold-gate",
            "Threshold Gate",
            "Keep events whose channel value exceeds a threshold",
            vec![
                Port::input("events", "fcs-channel", Control::None),
                Port::input("threshold", "float", Control::Float)
                    .with_default(PortValue::Float(0.0)),
                Port::output("out", "fcs-channel"),
            ],
        ),
    )?;

    kinds.register(
        types,
        NodeKind::new(
            "range-gate",
            "Range Gate",
            "Keep events inside a closed channel interval",
            vec![
                Port::input("events", "fcs-channel", Control::None),
                Port::input("min", "float", Control::Float).with_default(PortValue::Float(0.0)),
                Port::input("max", "float", Control::Float)
                    .with_default(PortValue::Float(1.0)),
                Port::output("out", "fcs-channel"),
            ],
        ),
    )?;

    kinds.register(
        types,
        NodeKind::new(
            "polygon-gate",
            "Polygon Gate",
            "Keep events inside a drawn polygon region",
            vec![
                Port::input("events", "fcs-channel", Control::None),
                Port::input("region", "gate-region", Control::None),
                Port::output("out", "fcs-channel"),
            ],
        ),
    )?;

    // ========================================================================
    // Views
    // ========================================================================

    kinds.register(
        types,
        NodeKind::new(
            "scatter-view",
            "Scatter View",
            "Two-channel scatter plot of an event population",
            vec![
                Port::input("events", "fcs-channel", Control::None),
                Port::input("x", "string", Control::String)
                    .with_default(PortValue::Str("FSC-A".into())),
                Port::input("y", "string", Control::String)
                    .with_default(PortValue::Str("SSC-A".into())),
                Port::input(
                    "scale",
                    "string",
                    Control::Select {
                        options: vec!["linear".into(), "log".into(), "logicle".into()],
                    },
                )
                .with_default(PortValue::Str("linear".into())),
            ],
        ),
    )?;

    kinds.register(
        types,
        NodeKind::new(
            "histogram-view",
            "Histogram View",
            "Single-channel histogram of an event population",
            vec![
                Port::input("events", "fcs-channel", Control::None),
                Port::input("channel", "string", Control::String)
                    .with_default(PortValue::Str("FSC-A".into())),
                Port::input("bins", "integer", Control::Integer)
                    .with_default(PortValue::Int(256)),
            ],
        ),
    )?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_catalog_registers_cleanly() {
        let mut types = TypeRegistry::new();
        register_cytometry_types(&mut types);
        types.validate().unwrap();
        let mut kinds = KindRegistry::new();
        register_cytometry_kinds(&types, &mut kinds).unwrap();

        assert!(types.contains("fcs-channel"));
        assert!(kinds.get("threshold-gate").is_some());
        assert!(kinds.kinds().count() >= 6);

        // Every catalog port datatype resolves in the catalog registry.
        for kind in kinds.kinds() {
            for port in &kind.ports {
                assert!(types.contains(&port.datatype), "{}:{}", kind.id, port.name);
            }
        }
    }
}
