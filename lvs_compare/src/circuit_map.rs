//! Pin mapping between a circuit and its paired counterpart.

use ahash::AHashMap;
use lvs_netlist::{CircuitRef, PinId};

/// The pin bijection between a circuit and the corresponding circuit of the
/// other netlist.
///
/// `other` is the canonical counterpart circuit; the maps translate between
/// this circuit's pin space and the counterpart's pin space. Either
/// direction may be partial while the comparison is still in flight.
#[derive(Clone, Debug)]
pub struct CircuitMapper<'nl> {
    other: CircuitRef<'nl>,
    pin_map: AHashMap<PinId, PinId>,
    rev_pin_map: AHashMap<PinId, PinId>,
}

impl<'nl> CircuitMapper<'nl> {
    pub fn new(other: CircuitRef<'nl>) -> Self {
        CircuitMapper {
            other,
            pin_map: AHashMap::new(),
            rev_pin_map: AHashMap::new(),
        }
    }

    /// The counterpart circuit in the other netlist.
    pub fn other(&self) -> CircuitRef<'nl> {
        self.other
    }

    /// Records `this_pin` ↔ `other_pin`.
    pub fn map_pin(&mut self, this_pin: PinId, other_pin: PinId) {
        self.pin_map.insert(this_pin, other_pin);
        self.rev_pin_map.insert(other_pin, this_pin);
    }

    pub fn other_pin_for_this(&self, this_pin: PinId) -> Option<PinId> {
        self.pin_map.get(&this_pin).copied()
    }

    pub fn this_pin_for_other(&self, other_pin: PinId) -> Option<PinId> {
        self.rev_pin_map.get(&other_pin).copied()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lvs_netlist::Netlist;

    #[test]
    fn mapping_works_in_both_directions() {
        let mut nl = Netlist::new();
        nl.add_circuit("OTHER");
        let other = nl.circuits().next().unwrap();

        let mut m = CircuitMapper::new(other);
        m.map_pin(0usize.into(), 2usize.into());
        m.map_pin(1usize.into(), 0usize.into());

        assert_eq!(m.other(), other);
        assert_eq!(m.other_pin_for_this(0usize.into()), Some(2usize.into()));
        assert_eq!(m.this_pin_for_other(2usize.into()), Some(0usize.into()));
        assert_eq!(m.other_pin_for_this(1usize.into()), Some(0usize.into()));
        assert_eq!(m.this_pin_for_other(1usize.into()), None);
    }
}
