//! Swappable-pin bookkeeping.
//!
//! Swappable pins are realized by mapping every pin id of a cluster to one
//! shared representative, so transition keys built from normalized pin ids
//! are invariant under permutations of the cluster.

use ahash::AHashMap;
use lvs_netlist::{CircuitRef, PinId};

use crate::equiv::EquivalenceClusters;

/// Per-circuit clusters of electrically interchangeable pins.
#[derive(Clone, Debug, Default)]
pub struct CircuitPinMapper<'nl> {
    clusters: AHashMap<CircuitRef<'nl>, EquivalenceClusters>,
}

impl<'nl> CircuitPinMapper<'nl> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declares all given pins of the circuit mutually swappable.
    pub fn map_pins(&mut self, circuit: CircuitRef<'nl>, pins: &[PinId]) {
        if pins.len() < 2 {
            return;
        }
        let clusters = self.clusters.entry(circuit).or_default();
        for pin in &pins[1..] {
            clusters.same(pins[0].as_usize(), pin.as_usize());
        }
    }

    /// Whether the pin participates in any swappable cluster.
    pub fn is_mapped(&self, circuit: CircuitRef<'nl>, pin: PinId) -> bool {
        self.clusters
            .get(&circuit)
            .map_or(false, |c| c.contains(pin.as_usize()))
    }

    /// The representative pin id of the pin's cluster (the smallest member);
    /// unclustered pins normalize to themselves.
    pub fn normalize_pin_id(&self, circuit: CircuitRef<'nl>, pin: PinId) -> PinId {
        match self.clusters.get(&circuit) {
            Some(c) => PinId::from(c.representative(pin.as_usize())),
            None => pin,
        }
    }
}
