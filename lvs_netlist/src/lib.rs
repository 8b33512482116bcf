//! In-memory hierarchical netlist model.
//!
//! This crate holds the data the comparison engine operates on: netlists
//! made of circuits, which in turn contain pins, nets, primitive devices,
//! and subcircuit instances. Entities are stored in arenas and addressed by
//! index ids; [`refs`] provides `Copy` handles that pair an id with its
//! netlist for use across crate boundaries.

mod device_class;
mod ids;
mod netlist;
mod refs;

pub use device_class::{standard, DeviceClass, DeviceKind, ParamDef, TerminalDef};
pub use ids::{CircuitId, DeviceClassId, DeviceId, NetId, PinId, SubCircuitId};
pub use netlist::{Circuit, Device, Net, Netlist, NetlistError, Pin, SubCircuit};
pub use refs::{CircuitRef, DeviceClassRef, DeviceRef, NetRef, PinRef, SubCircuitRef};
