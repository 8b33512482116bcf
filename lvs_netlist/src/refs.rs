//! Reference handles: a netlist entity plus the netlist it lives in.
//!
//! A handle is a plain `&Netlist` and the indices that locate the entity,
//! so it is `Copy` and can be passed around freely. Equality and hashing go
//! by netlist identity (address) and index, which lets handles from two
//! different netlists key the same map without ever comparing equal.

use std::fmt;
use std::hash::{Hash, Hasher};

use crate::device_class::DeviceClass;
use crate::ids::{CircuitId, DeviceClassId, DeviceId, NetId, PinId, SubCircuitId};
use crate::netlist::{Circuit, Device, Net, Netlist, Pin, SubCircuit};

macro_rules! identity_eq {
    ($name:ident { $($field:ident),+ }) => {
        impl<'nl> PartialEq for $name<'nl> {
            fn eq(&self, other: &Self) -> bool {
                std::ptr::eq(self.netlist, other.netlist) $(&& self.$field == other.$field)+
            }
        }

        impl<'nl> Eq for $name<'nl> {}

        impl<'nl> Hash for $name<'nl> {
            fn hash<H: Hasher>(&self, state: &mut H) {
                (self.netlist as *const Netlist as usize).hash(state);
                $(self.$field.hash(state);)+
            }
        }
    };
}

macro_rules! fmt_ref_debug {
    ($tyname:literal, $namefn:ident) => {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, concat!($tyname, "({})"), self.$namefn())
        }
    };
}

/// A circuit within a netlist.
#[derive(Clone, Copy)]
pub struct CircuitRef<'nl> {
    netlist: &'nl Netlist,
    circuit: CircuitId,
}

identity_eq!(CircuitRef { circuit });

impl<'nl> CircuitRef<'nl> {
    pub fn netlist(&self) -> &'nl Netlist {
        self.netlist
    }

    pub fn id(&self) -> CircuitId {
        self.circuit
    }

    pub fn data(&self) -> &'nl Circuit {
        self.netlist.circuit(self.circuit)
    }

    pub fn name(&self) -> &'nl str {
        self.data().name()
    }

    pub fn pin_count(&self) -> usize {
        self.data().pin_count()
    }

    pub fn pin(&self, pin: PinId) -> PinRef<'nl> {
        PinRef {
            netlist: self.netlist,
            circuit: self.circuit,
            pin,
        }
    }

    pub fn net(&self, net: NetId) -> NetRef<'nl> {
        NetRef {
            netlist: self.netlist,
            circuit: self.circuit,
            net,
        }
    }

    pub fn device(&self, device: DeviceId) -> DeviceRef<'nl> {
        DeviceRef {
            netlist: self.netlist,
            circuit: self.circuit,
            device,
        }
    }

    pub fn subcircuit(&self, subcircuit: SubCircuitId) -> SubCircuitRef<'nl> {
        SubCircuitRef {
            netlist: self.netlist,
            circuit: self.circuit,
            subcircuit,
        }
    }

    pub fn pins(&self) -> impl Iterator<Item = PinRef<'nl>> + '_ {
        let this = *self;
        self.data().pin_ids().map(move |p| this.pin(p))
    }

    pub fn nets(&self) -> impl Iterator<Item = NetRef<'nl>> + '_ {
        let this = *self;
        self.data().net_ids().map(move |n| this.net(n))
    }

    pub fn devices(&self) -> impl Iterator<Item = DeviceRef<'nl>> + '_ {
        let this = *self;
        self.data().device_ids().map(move |d| this.device(d))
    }

    pub fn subcircuits(&self) -> impl Iterator<Item = SubCircuitRef<'nl>> + '_ {
        let this = *self;
        self.data().subcircuit_ids().map(move |s| this.subcircuit(s))
    }

    pub fn net_for_pin(&self, pin: PinId) -> Option<NetRef<'nl>> {
        self.data().net_for_pin(pin).map(|n| self.net(n))
    }

    pub fn net_by_name(&self, name: &str) -> Option<NetRef<'nl>> {
        self.data().net_by_name(name).map(|n| self.net(n))
    }

    pub fn pin_by_name(&self, name: &str) -> Option<PinRef<'nl>> {
        self.data().pin_by_name(name).map(|p| self.pin(p))
    }

    pub fn device_by_name(&self, name: &str) -> Option<DeviceRef<'nl>> {
        self.data().device_by_name(name).map(|d| self.device(d))
    }
}

impl fmt::Debug for CircuitRef<'_> {
    fmt_ref_debug!("CircuitRef", name);
}

/// A net within a circuit.
#[derive(Clone, Copy)]
pub struct NetRef<'nl> {
    netlist: &'nl Netlist,
    circuit: CircuitId,
    net: NetId,
}

identity_eq!(NetRef { circuit, net });

impl<'nl> NetRef<'nl> {
    pub fn netlist(&self) -> &'nl Netlist {
        self.netlist
    }

    pub fn circuit(&self) -> CircuitRef<'nl> {
        CircuitRef {
            netlist: self.netlist,
            circuit: self.circuit,
        }
    }

    pub fn id(&self) -> NetId {
        self.net
    }

    pub fn data(&self) -> &'nl Net {
        self.netlist.circuit(self.circuit).net(self.net)
    }

    pub fn name(&self) -> Option<&'nl str> {
        self.data().name()
    }

    /// The net name, or a positional placeholder for anonymous nets.
    pub fn expanded_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("${}", self.net),
        }
    }

    pub fn is_floating(&self) -> bool {
        self.data().is_floating()
    }
}

impl fmt::Debug for NetRef<'_> {
    fmt_ref_debug!("NetRef", expanded_name);
}

/// A pin of a circuit.
#[derive(Clone, Copy)]
pub struct PinRef<'nl> {
    netlist: &'nl Netlist,
    circuit: CircuitId,
    pin: PinId,
}

identity_eq!(PinRef { circuit, pin });

impl<'nl> PinRef<'nl> {
    pub fn circuit(&self) -> CircuitRef<'nl> {
        CircuitRef {
            netlist: self.netlist,
            circuit: self.circuit,
        }
    }

    pub fn id(&self) -> PinId {
        self.pin
    }

    pub fn data(&self) -> &'nl Pin {
        self.netlist.circuit(self.circuit).pin(self.pin)
    }

    pub fn name(&self) -> Option<&'nl str> {
        self.data().name()
    }

    pub fn expanded_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("${}", self.pin),
        }
    }

    pub fn net(&self) -> Option<NetRef<'nl>> {
        self.circuit().net_for_pin(self.pin)
    }
}

impl fmt::Debug for PinRef<'_> {
    fmt_ref_debug!("PinRef", expanded_name);
}

/// A device instance within a circuit.
#[derive(Clone, Copy)]
pub struct DeviceRef<'nl> {
    netlist: &'nl Netlist,
    circuit: CircuitId,
    device: DeviceId,
}

identity_eq!(DeviceRef { circuit, device });

impl<'nl> DeviceRef<'nl> {
    pub fn circuit(&self) -> CircuitRef<'nl> {
        CircuitRef {
            netlist: self.netlist,
            circuit: self.circuit,
        }
    }

    pub fn id(&self) -> DeviceId {
        self.device
    }

    pub fn data(&self) -> &'nl Device {
        self.netlist.circuit(self.circuit).device(self.device)
    }

    pub fn class(&self) -> DeviceClassRef<'nl> {
        DeviceClassRef {
            netlist: self.netlist,
            class: self.data().class(),
        }
    }

    pub fn name(&self) -> Option<&'nl str> {
        self.data().name()
    }

    pub fn expanded_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("${}", self.device),
        }
    }

    pub fn net_for_terminal(&self, terminal: usize) -> Option<NetRef<'nl>> {
        self.data()
            .net_for_terminal(terminal)
            .map(|n| self.circuit().net(n))
    }
}

impl fmt::Debug for DeviceRef<'_> {
    fmt_ref_debug!("DeviceRef", expanded_name);
}

/// A subcircuit instance within a circuit.
#[derive(Clone, Copy)]
pub struct SubCircuitRef<'nl> {
    netlist: &'nl Netlist,
    circuit: CircuitId,
    subcircuit: SubCircuitId,
}

identity_eq!(SubCircuitRef { circuit, subcircuit });

impl<'nl> SubCircuitRef<'nl> {
    pub fn circuit(&self) -> CircuitRef<'nl> {
        CircuitRef {
            netlist: self.netlist,
            circuit: self.circuit,
        }
    }

    pub fn id(&self) -> SubCircuitId {
        self.subcircuit
    }

    pub fn data(&self) -> &'nl SubCircuit {
        self.netlist.circuit(self.circuit).subcircuit(self.subcircuit)
    }

    /// The circuit this instance refers to.
    pub fn target(&self) -> CircuitRef<'nl> {
        CircuitRef {
            netlist: self.netlist,
            circuit: self.data().target(),
        }
    }

    pub fn name(&self) -> Option<&'nl str> {
        self.data().name()
    }

    pub fn expanded_name(&self) -> String {
        match self.name() {
            Some(name) => name.to_string(),
            None => format!("${}", self.subcircuit),
        }
    }

    pub fn net_for_pin(&self, pin: PinId) -> Option<NetRef<'nl>> {
        self.data().net_for_pin(pin).map(|n| self.circuit().net(n))
    }
}

impl fmt::Debug for SubCircuitRef<'_> {
    fmt_ref_debug!("SubCircuitRef", expanded_name);
}

/// A device class within a netlist.
#[derive(Clone, Copy)]
pub struct DeviceClassRef<'nl> {
    netlist: &'nl Netlist,
    class: DeviceClassId,
}

identity_eq!(DeviceClassRef { class });

impl<'nl> DeviceClassRef<'nl> {
    pub fn netlist(&self) -> &'nl Netlist {
        self.netlist
    }

    pub fn id(&self) -> DeviceClassId {
        self.class
    }

    pub fn data(&self) -> &'nl DeviceClass {
        self.netlist.device_class(self.class)
    }

    pub fn name(&self) -> &'nl str {
        self.data().name()
    }
}

impl fmt::Debug for DeviceClassRef<'_> {
    fmt_ref_debug!("DeviceClassRef", name);
}

impl Netlist {
    pub fn circuit_ref(&self, id: CircuitId) -> CircuitRef<'_> {
        CircuitRef {
            netlist: self,
            circuit: id,
        }
    }

    pub fn device_class_ref(&self, id: DeviceClassId) -> DeviceClassRef<'_> {
        DeviceClassRef {
            netlist: self,
            class: id,
        }
    }

    pub fn circuits(&self) -> impl Iterator<Item = CircuitRef<'_>> {
        self.circuit_ids().map(|id| self.circuit_ref(id))
    }

    pub fn circuit_ref_by_name(&self, name: &str) -> Option<CircuitRef<'_>> {
        self.circuit_by_name(name).map(|id| self.circuit_ref(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device_class::DeviceClass;

    fn small() -> Netlist {
        let mut nl = Netlist::new();
        let res = nl.add_device_class(DeviceClass::resistor("RES"));
        let c = nl.add_circuit("C");
        let n = nl.add_net(c, Some("N"));
        let m = nl.add_net(c, None);
        let d = nl.add_device(c, Some("R1"), res, &[1.0]);
        nl.connect_terminal(c, d, 0, n).unwrap();
        nl.connect_terminal(c, d, 1, m).unwrap();
        nl
    }

    #[test]
    fn handles_compare_by_netlist_identity() {
        let a = small();
        let b = a.clone();

        let ca = a.circuit_ref_by_name("C").unwrap();
        let cb = b.circuit_ref_by_name("C").unwrap();
        assert_eq!(ca, a.circuit_ref_by_name("C").unwrap());
        assert_ne!(ca, cb);

        let na = ca.net_by_name("N").unwrap();
        let nb = cb.net_by_name("N").unwrap();
        assert_ne!(na, nb);
        assert_eq!(na.expanded_name(), nb.expanded_name());
    }

    #[test]
    fn anonymous_entities_get_positional_names() {
        let nl = small();
        let c = nl.circuits().next().unwrap();
        let anon = c.nets().nth(1).unwrap();
        assert_eq!(anon.expanded_name(), "$n1");
    }

    #[test]
    fn device_handles_resolve_class_and_nets() {
        let nl = small();
        let c = nl.circuits().next().unwrap();
        let d = c.device_by_name("R1").unwrap();
        assert_eq!(d.class().name(), "RES");
        assert_eq!(
            d.net_for_terminal(0).unwrap().expanded_name(),
            "N"
        );
        assert!(d.net_for_terminal(5).is_none());
    }
}
