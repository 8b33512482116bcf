//! Hierarchical netlist comparison.
//!
//! Decides whether two netlists are structurally equivalent and derives a
//! bijection between their nets, pins, devices, and subcircuits. Matching
//! tolerates swapped symmetric pins, equivalently declared device classes
//! and circuits, filtered parasitic devices, and symmetric sub-regions that
//! can only be paired ambiguously.
//!
//! The unit of work is the circuit pair: circuits are paired by category
//! (name or declaration), walked bottom-up, and compared through their
//! per-circuit net graphs with a two-pass backtracking node-pairing
//! algorithm. Results are streamed to a [`CompareLogger`];
//! [`NetlistComparer::compare`] returns the overall verdict.
//!
//! ```
//! use lvs_compare::NetlistComparer;
//! use lvs_netlist::{DeviceClass, Netlist};
//!
//! let mut a = Netlist::new();
//! let res = a.add_device_class(DeviceClass::resistor("RES"));
//! let c = a.add_circuit("DIV");
//! let n1 = a.add_net(c, Some("IN"));
//! let n2 = a.add_net(c, Some("OUT"));
//! let r = a.add_device(c, Some("R1"), res, &[1000.0]);
//! a.connect_terminal(c, r, 0, n1).unwrap();
//! a.connect_terminal(c, r, 1, n2).unwrap();
//!
//! let b = a.clone();
//! let comparer = NetlistComparer::new();
//! assert!(comparer.compare(&a, &b));
//! ```

mod categorize;
mod circuit_map;
mod compare;
mod device_filter;
mod engine;
mod equiv;
mod graph;
mod logger;
mod pin_map;

pub use categorize::{CircuitCategorizer, DeviceCategorizer, NO_CATEGORY};
pub use circuit_map::CircuitMapper;
pub use compare::{CompareConfig, CompareError, NetlistComparer, MAX_SUBCIRCUIT_ANALYSIS_SET};
pub use device_filter::DeviceFilter;
pub use equiv::EquivalenceClusters;
pub use logger::{CompareEvent, CompareLogger, EventLog, NullLogger};
pub use pin_map::CircuitPinMapper;
