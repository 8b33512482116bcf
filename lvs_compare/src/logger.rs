//! The event sink the comparison engine reports through.
//!
//! Every observation the engine makes — matched nets, missing devices,
//! skipped circuits — is delivered as one call on [`CompareLogger`]. All
//! methods default to no-ops so implementors only handle what they care
//! about, and the engine's behavior never depends on whether anybody
//! listens.

use lvs_netlist::{
    CircuitRef, DeviceClassRef, DeviceRef, NetRef, Netlist, PinRef, SubCircuitRef,
};

/// Receiver for match/mismatch events of one comparison run.
///
/// Events arrive in a deterministic order: netlist bracketing first, then
/// class/circuit level mismatches, then per-circuit-pair events in
/// bottom-up circuit order.
pub trait CompareLogger {
    fn begin_netlist(&mut self, _a: &Netlist, _b: &Netlist) {}
    fn end_netlist(&mut self, _a: &Netlist, _b: &Netlist) {}

    /// A device class category present in only one netlist.
    fn device_class_mismatch(
        &mut self,
        _a: Option<DeviceClassRef<'_>>,
        _b: Option<DeviceClassRef<'_>>,
    ) {
    }

    /// A circuit category present in only one netlist.
    fn circuit_mismatch(&mut self, _a: Option<CircuitRef<'_>>, _b: Option<CircuitRef<'_>>) {}

    fn begin_circuit(&mut self, _a: CircuitRef<'_>, _b: CircuitRef<'_>) {}
    fn end_circuit(&mut self, _a: CircuitRef<'_>, _b: CircuitRef<'_>, _matched: bool) {}

    /// The pair could not be analyzed because a callee was not verified.
    fn circuit_skipped(&mut self, _a: CircuitRef<'_>, _b: CircuitRef<'_>) {}

    fn match_nets(&mut self, _a: NetRef<'_>, _b: NetRef<'_>) {}

    /// The nets are paired but at least one alternative partner was
    /// topologically indistinguishable.
    fn match_ambiguous_nets(&mut self, _a: NetRef<'_>, _b: NetRef<'_>) {}

    fn net_mismatch(&mut self, _a: Option<NetRef<'_>>, _b: Option<NetRef<'_>>) {}

    fn match_pins(&mut self, _a: Option<PinRef<'_>>, _b: Option<PinRef<'_>>) {}
    fn pin_mismatch(&mut self, _a: Option<PinRef<'_>>, _b: Option<PinRef<'_>>) {}

    fn match_devices(&mut self, _a: DeviceRef<'_>, _b: DeviceRef<'_>) {}

    /// Devices pair topologically but their parameters differ.
    fn match_devices_with_different_parameters(&mut self, _a: DeviceRef<'_>, _b: DeviceRef<'_>) {}

    /// Devices pair topologically but their classes are not equivalent.
    fn match_devices_with_different_device_classes(
        &mut self,
        _a: DeviceRef<'_>,
        _b: DeviceRef<'_>,
    ) {
    }

    fn device_mismatch(&mut self, _a: Option<DeviceRef<'_>>, _b: Option<DeviceRef<'_>>) {}

    fn match_subcircuits(&mut self, _a: SubCircuitRef<'_>, _b: SubCircuitRef<'_>) {}
    fn subcircuit_mismatch(
        &mut self,
        _a: Option<SubCircuitRef<'_>>,
        _b: Option<SubCircuitRef<'_>>,
    ) {
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLogger;

impl CompareLogger for NullLogger {}

/// One recorded comparison event, with entities flattened to
/// `circuit/entity` name strings so the record outlives the netlists.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum CompareEvent {
    BeginNetlist,
    EndNetlist,
    DeviceClassMismatch {
        a: Option<String>,
        b: Option<String>,
    },
    CircuitMismatch {
        a: Option<String>,
        b: Option<String>,
    },
    BeginCircuit {
        a: String,
        b: String,
    },
    EndCircuit {
        a: String,
        b: String,
        matched: bool,
    },
    CircuitSkipped {
        a: String,
        b: String,
    },
    MatchNets {
        a: String,
        b: String,
    },
    MatchAmbiguousNets {
        a: String,
        b: String,
    },
    NetMismatch {
        a: Option<String>,
        b: Option<String>,
    },
    MatchPins {
        a: Option<String>,
        b: Option<String>,
    },
    PinMismatch {
        a: Option<String>,
        b: Option<String>,
    },
    MatchDevices {
        a: String,
        b: String,
    },
    MatchDevicesWithDifferentParameters {
        a: String,
        b: String,
    },
    MatchDevicesWithDifferentDeviceClasses {
        a: String,
        b: String,
    },
    DeviceMismatch {
        a: Option<String>,
        b: Option<String>,
    },
    MatchSubCircuits {
        a: String,
        b: String,
    },
    SubCircuitMismatch {
        a: Option<String>,
        b: Option<String>,
    },
}

impl CompareEvent {
    /// Whether this event reports a discrepancy.
    pub fn is_mismatch(&self) -> bool {
        matches!(
            self,
            CompareEvent::DeviceClassMismatch { .. }
                | CompareEvent::CircuitMismatch { .. }
                | CompareEvent::CircuitSkipped { .. }
                | CompareEvent::NetMismatch { .. }
                | CompareEvent::PinMismatch { .. }
                | CompareEvent::MatchDevicesWithDifferentParameters { .. }
                | CompareEvent::MatchDevicesWithDifferentDeviceClasses { .. }
                | CompareEvent::DeviceMismatch { .. }
                | CompareEvent::SubCircuitMismatch { .. }
        )
    }

    /// The same event with the two sides exchanged.
    pub fn swapped(&self) -> CompareEvent {
        use CompareEvent::*;
        match self.clone() {
            BeginNetlist => BeginNetlist,
            EndNetlist => EndNetlist,
            DeviceClassMismatch { a, b } => DeviceClassMismatch { a: b, b: a },
            CircuitMismatch { a, b } => CircuitMismatch { a: b, b: a },
            BeginCircuit { a, b } => BeginCircuit { a: b, b: a },
            EndCircuit { a, b, matched } => EndCircuit { a: b, b: a, matched },
            CircuitSkipped { a, b } => CircuitSkipped { a: b, b: a },
            MatchNets { a, b } => MatchNets { a: b, b: a },
            MatchAmbiguousNets { a, b } => MatchAmbiguousNets { a: b, b: a },
            NetMismatch { a, b } => NetMismatch { a: b, b: a },
            MatchPins { a, b } => MatchPins { a: b, b: a },
            PinMismatch { a, b } => PinMismatch { a: b, b: a },
            MatchDevices { a, b } => MatchDevices { a: b, b: a },
            MatchDevicesWithDifferentParameters { a, b } => {
                MatchDevicesWithDifferentParameters { a: b, b: a }
            }
            MatchDevicesWithDifferentDeviceClasses { a, b } => {
                MatchDevicesWithDifferentDeviceClasses { a: b, b: a }
            }
            DeviceMismatch { a, b } => DeviceMismatch { a: b, b: a },
            MatchSubCircuits { a, b } => MatchSubCircuits { a: b, b: a },
            SubCircuitMismatch { a, b } => SubCircuitMismatch { a: b, b: a },
        }
    }
}

fn net_name(n: NetRef<'_>) -> String {
    format!("{}/{}", n.circuit().name(), n.expanded_name())
}

fn pin_name(p: PinRef<'_>) -> String {
    format!("{}/{}", p.circuit().name(), p.expanded_name())
}

fn device_name(d: DeviceRef<'_>) -> String {
    format!("{}/{}", d.circuit().name(), d.expanded_name())
}

fn subcircuit_name(s: SubCircuitRef<'_>) -> String {
    format!("{}/{}", s.circuit().name(), s.expanded_name())
}

/// Records the full event sequence of a run.
///
/// The recorded sequence is the ground truth the determinism and symmetry
/// guarantees are stated over: two runs match iff their `events()` compare
/// equal.
#[derive(Clone, Debug, Default)]
pub struct EventLog {
    events: Vec<CompareEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> &[CompareEvent] {
        &self.events
    }

    pub fn into_events(self) -> Vec<CompareEvent> {
        self.events
    }

    /// All events with the two sides exchanged, for symmetry checks.
    pub fn swapped_events(&self) -> Vec<CompareEvent> {
        self.events.iter().map(CompareEvent::swapped).collect()
    }

    pub fn mismatch_count(&self) -> usize {
        self.events.iter().filter(|e| e.is_mismatch()).count()
    }
}

impl CompareLogger for EventLog {
    fn begin_netlist(&mut self, _a: &Netlist, _b: &Netlist) {
        self.events.push(CompareEvent::BeginNetlist);
    }

    fn end_netlist(&mut self, _a: &Netlist, _b: &Netlist) {
        self.events.push(CompareEvent::EndNetlist);
    }

    fn device_class_mismatch(
        &mut self,
        a: Option<DeviceClassRef<'_>>,
        b: Option<DeviceClassRef<'_>>,
    ) {
        self.events.push(CompareEvent::DeviceClassMismatch {
            a: a.map(|c| c.name().to_string()),
            b: b.map(|c| c.name().to_string()),
        });
    }

    fn circuit_mismatch(&mut self, a: Option<CircuitRef<'_>>, b: Option<CircuitRef<'_>>) {
        self.events.push(CompareEvent::CircuitMismatch {
            a: a.map(|c| c.name().to_string()),
            b: b.map(|c| c.name().to_string()),
        });
    }

    fn begin_circuit(&mut self, a: CircuitRef<'_>, b: CircuitRef<'_>) {
        self.events.push(CompareEvent::BeginCircuit {
            a: a.name().to_string(),
            b: b.name().to_string(),
        });
    }

    fn end_circuit(&mut self, a: CircuitRef<'_>, b: CircuitRef<'_>, matched: bool) {
        self.events.push(CompareEvent::EndCircuit {
            a: a.name().to_string(),
            b: b.name().to_string(),
            matched,
        });
    }

    fn circuit_skipped(&mut self, a: CircuitRef<'_>, b: CircuitRef<'_>) {
        self.events.push(CompareEvent::CircuitSkipped {
            a: a.name().to_string(),
            b: b.name().to_string(),
        });
    }

    fn match_nets(&mut self, a: NetRef<'_>, b: NetRef<'_>) {
        self.events.push(CompareEvent::MatchNets {
            a: net_name(a),
            b: net_name(b),
        });
    }

    fn match_ambiguous_nets(&mut self, a: NetRef<'_>, b: NetRef<'_>) {
        self.events.push(CompareEvent::MatchAmbiguousNets {
            a: net_name(a),
            b: net_name(b),
        });
    }

    fn net_mismatch(&mut self, a: Option<NetRef<'_>>, b: Option<NetRef<'_>>) {
        self.events.push(CompareEvent::NetMismatch {
            a: a.map(net_name),
            b: b.map(net_name),
        });
    }

    fn match_pins(&mut self, a: Option<PinRef<'_>>, b: Option<PinRef<'_>>) {
        self.events.push(CompareEvent::MatchPins {
            a: a.map(pin_name),
            b: b.map(pin_name),
        });
    }

    fn pin_mismatch(&mut self, a: Option<PinRef<'_>>, b: Option<PinRef<'_>>) {
        self.events.push(CompareEvent::PinMismatch {
            a: a.map(pin_name),
            b: b.map(pin_name),
        });
    }

    fn match_devices(&mut self, a: DeviceRef<'_>, b: DeviceRef<'_>) {
        self.events.push(CompareEvent::MatchDevices {
            a: device_name(a),
            b: device_name(b),
        });
    }

    fn match_devices_with_different_parameters(&mut self, a: DeviceRef<'_>, b: DeviceRef<'_>) {
        self.events
            .push(CompareEvent::MatchDevicesWithDifferentParameters {
                a: device_name(a),
                b: device_name(b),
            });
    }

    fn match_devices_with_different_device_classes(
        &mut self,
        a: DeviceRef<'_>,
        b: DeviceRef<'_>,
    ) {
        self.events
            .push(CompareEvent::MatchDevicesWithDifferentDeviceClasses {
                a: device_name(a),
                b: device_name(b),
            });
    }

    fn device_mismatch(&mut self, a: Option<DeviceRef<'_>>, b: Option<DeviceRef<'_>>) {
        self.events.push(CompareEvent::DeviceMismatch {
            a: a.map(device_name),
            b: b.map(device_name),
        });
    }

    fn match_subcircuits(&mut self, a: SubCircuitRef<'_>, b: SubCircuitRef<'_>) {
        self.events.push(CompareEvent::MatchSubCircuits {
            a: subcircuit_name(a),
            b: subcircuit_name(b),
        });
    }

    fn subcircuit_mismatch(
        &mut self,
        a: Option<SubCircuitRef<'_>>,
        b: Option<SubCircuitRef<'_>>,
    ) {
        self.events.push(CompareEvent::SubCircuitMismatch {
            a: a.map(subcircuit_name),
            b: b.map(subcircuit_name),
        });
    }
}
