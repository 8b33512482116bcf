//! The arena-backed netlist model.
//!
//! A [`Netlist`] owns circuits and device classes; a [`Circuit`] owns its
//! pins, nets, devices, and subcircuit instances. All cross references are
//! index ids, so the model is cheap to clone and free of reference cycles.
//! Connectivity is kept consistent from both ends: a net knows its
//! attachments and every pin/terminal knows its net.

use thiserror::Error;

use crate::device_class::DeviceClass;
use crate::ids::{CircuitId, DeviceClassId, DeviceId, NetId, PinId, SubCircuitId};

/// Errors raised by the netlist mutation API.
#[derive(Debug, Error)]
pub enum NetlistError {
    #[error("terminal {terminal} is out of range for device class {class}")]
    TerminalOutOfRange { class: String, terminal: usize },

    #[error("pin {pin} is out of range for circuit {circuit}")]
    PinOutOfRange { circuit: String, pin: PinId },

    #[error("pin {pin} of circuit {circuit} is already connected")]
    PinAlreadyConnected { circuit: String, pin: PinId },

    #[error("terminal {terminal} of device {device} is already connected")]
    TerminalAlreadyConnected { device: String, terminal: usize },

    #[error("pin {pin} of subcircuit {subcircuit} is already connected")]
    SubCircuitPinAlreadyConnected { subcircuit: String, pin: PinId },
}

/// An external port of a circuit.
#[derive(Clone, Debug)]
pub struct Pin {
    pub(crate) name: Option<String>,
    pub(crate) net: Option<NetId>,
}

impl Pin {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn net(&self) -> Option<NetId> {
        self.net
    }
}

/// An electrical node inside a circuit.
///
/// A net records every attachment point: circuit pins, device terminals,
/// and subcircuit pins.
#[derive(Clone, Debug, Default)]
pub struct Net {
    pub(crate) name: Option<String>,
    pub(crate) pins: Vec<PinId>,
    pub(crate) terminals: Vec<(DeviceId, usize)>,
    pub(crate) subcircuit_pins: Vec<(SubCircuitId, PinId)>,
}

impl Net {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn pins(&self) -> &[PinId] {
        &self.pins
    }

    pub fn terminals(&self) -> &[(DeviceId, usize)] {
        &self.terminals
    }

    pub fn subcircuit_pins(&self) -> &[(SubCircuitId, PinId)] {
        &self.subcircuit_pins
    }

    /// Total number of attachment points.
    pub fn connection_count(&self) -> usize {
        self.pins.len() + self.terminals.len() + self.subcircuit_pins.len()
    }

    /// A net with fewer than two attachments carries no signal.
    pub fn is_floating(&self) -> bool {
        self.connection_count() < 2
    }
}

/// A primitive device instance.
#[derive(Clone, Debug)]
pub struct Device {
    pub(crate) name: Option<String>,
    pub(crate) class: DeviceClassId,
    pub(crate) params: Vec<f64>,
    pub(crate) terminal_nets: Vec<Option<NetId>>,
}

impl Device {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    pub fn class(&self) -> DeviceClassId {
        self.class
    }

    /// The value of the given parameter; unset parameters read as 0.0.
    pub fn param(&self, param: usize) -> f64 {
        self.params.get(param).copied().unwrap_or(0.0)
    }

    pub fn params(&self) -> &[f64] {
        &self.params
    }

    pub fn net_for_terminal(&self, terminal: usize) -> Option<NetId> {
        self.terminal_nets.get(terminal).copied().flatten()
    }
}

/// An instance of another circuit within this one.
#[derive(Clone, Debug)]
pub struct SubCircuit {
    pub(crate) name: Option<String>,
    pub(crate) target: CircuitId,
    pub(crate) pin_nets: Vec<Option<NetId>>,
}

impl SubCircuit {
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// The circuit this instance refers to.
    pub fn target(&self) -> CircuitId {
        self.target
    }

    pub fn net_for_pin(&self, pin: PinId) -> Option<NetId> {
        self.pin_nets.get(pin.as_usize()).copied().flatten()
    }
}

/// One level of the netlist hierarchy.
#[derive(Clone, Debug)]
pub struct Circuit {
    pub(crate) name: String,
    pub(crate) pins: Vec<Pin>,
    pub(crate) nets: Vec<Net>,
    pub(crate) devices: Vec<Device>,
    pub(crate) subcircuits: Vec<SubCircuit>,
}

impl Circuit {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pin_count(&self) -> usize {
        self.pins.len()
    }

    pub fn pin(&self, pin: PinId) -> &Pin {
        &self.pins[pin.as_usize()]
    }

    pub fn net(&self, net: NetId) -> &Net {
        &self.nets[net.as_usize()]
    }

    pub fn device(&self, device: DeviceId) -> &Device {
        &self.devices[device.as_usize()]
    }

    pub fn subcircuit(&self, subcircuit: SubCircuitId) -> &SubCircuit {
        &self.subcircuits[subcircuit.as_usize()]
    }

    pub fn net_for_pin(&self, pin: PinId) -> Option<NetId> {
        self.pins.get(pin.as_usize()).and_then(|p| p.net)
    }

    pub fn pin_ids(&self) -> impl Iterator<Item = PinId> + '_ {
        (0..self.pins.len()).map(PinId::from)
    }

    pub fn net_ids(&self) -> impl Iterator<Item = NetId> + '_ {
        (0..self.nets.len()).map(NetId::from)
    }

    pub fn device_ids(&self) -> impl Iterator<Item = DeviceId> + '_ {
        (0..self.devices.len()).map(DeviceId::from)
    }

    pub fn subcircuit_ids(&self) -> impl Iterator<Item = SubCircuitId> + '_ {
        (0..self.subcircuits.len()).map(SubCircuitId::from)
    }

    pub fn net_by_name(&self, name: &str) -> Option<NetId> {
        self.nets
            .iter()
            .position(|n| n.name.as_deref() == Some(name))
            .map(NetId::from)
    }

    pub fn pin_by_name(&self, name: &str) -> Option<PinId> {
        self.pins
            .iter()
            .position(|p| p.name.as_deref() == Some(name))
            .map(PinId::from)
    }

    pub fn device_by_name(&self, name: &str) -> Option<DeviceId> {
        self.devices
            .iter()
            .position(|d| d.name.as_deref() == Some(name))
            .map(DeviceId::from)
    }
}

/// A hierarchical collection of circuits plus the device classes their
/// devices refer to.
#[derive(Clone, Debug, Default)]
pub struct Netlist {
    pub(crate) circuits: Vec<Circuit>,
    pub(crate) device_classes: Vec<DeviceClass>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    #[contracts::debug_requires(!class.name().is_empty())]
    pub fn add_device_class(&mut self, class: DeviceClass) -> DeviceClassId {
        self.device_classes.push(class);
        DeviceClassId::from(self.device_classes.len() - 1)
    }

    #[contracts::debug_requires(!name.is_empty())]
    pub fn add_circuit(&mut self, name: &str) -> CircuitId {
        self.circuits.push(Circuit {
            name: name.to_string(),
            pins: Vec::new(),
            nets: Vec::new(),
            devices: Vec::new(),
            subcircuits: Vec::new(),
        });
        CircuitId::from(self.circuits.len() - 1)
    }

    pub fn add_pin(&mut self, circuit: CircuitId, name: Option<&str>) -> PinId {
        let c = &mut self.circuits[circuit.as_usize()];
        c.pins.push(Pin {
            name: name.map(str::to_string),
            net: None,
        });
        PinId::from(c.pins.len() - 1)
    }

    pub fn add_net(&mut self, circuit: CircuitId, name: Option<&str>) -> NetId {
        let c = &mut self.circuits[circuit.as_usize()];
        c.nets.push(Net {
            name: name.map(str::to_string),
            ..Net::default()
        });
        NetId::from(c.nets.len() - 1)
    }

    pub fn add_device(
        &mut self,
        circuit: CircuitId,
        name: Option<&str>,
        class: DeviceClassId,
        params: &[f64],
    ) -> DeviceId {
        let terminal_count = self.device_classes[class.as_usize()].terminal_count();
        let c = &mut self.circuits[circuit.as_usize()];
        c.devices.push(Device {
            name: name.map(str::to_string),
            class,
            params: params.to_vec(),
            terminal_nets: vec![None; terminal_count],
        });
        DeviceId::from(c.devices.len() - 1)
    }

    pub fn add_subcircuit(
        &mut self,
        circuit: CircuitId,
        name: Option<&str>,
        target: CircuitId,
    ) -> SubCircuitId {
        let pin_count = self.circuits[target.as_usize()].pin_count();
        let c = &mut self.circuits[circuit.as_usize()];
        c.subcircuits.push(SubCircuit {
            name: name.map(str::to_string),
            target,
            pin_nets: vec![None; pin_count],
        });
        SubCircuitId::from(c.subcircuits.len() - 1)
    }

    /// Attaches a circuit pin to a net.
    pub fn connect_pin(
        &mut self,
        circuit: CircuitId,
        pin: PinId,
        net: NetId,
    ) -> Result<(), NetlistError> {
        let c = &mut self.circuits[circuit.as_usize()];
        let slot = c
            .pins
            .get_mut(pin.as_usize())
            .ok_or_else(|| NetlistError::PinOutOfRange {
                circuit: c.name.clone(),
                pin,
            })?;
        if slot.net.is_some() {
            return Err(NetlistError::PinAlreadyConnected {
                circuit: c.name.clone(),
                pin,
            });
        }
        slot.net = Some(net);
        c.nets[net.as_usize()].pins.push(pin);
        Ok(())
    }

    /// Attaches a device terminal to a net.
    pub fn connect_terminal(
        &mut self,
        circuit: CircuitId,
        device: DeviceId,
        terminal: usize,
        net: NetId,
    ) -> Result<(), NetlistError> {
        let class_name = {
            let d = &self.circuits[circuit.as_usize()].devices[device.as_usize()];
            self.device_classes[d.class.as_usize()].name().to_string()
        };
        let c = &mut self.circuits[circuit.as_usize()];
        let d = &mut c.devices[device.as_usize()];
        let slot =
            d.terminal_nets
                .get_mut(terminal)
                .ok_or(NetlistError::TerminalOutOfRange {
                    class: class_name,
                    terminal,
                })?;
        if slot.is_some() {
            return Err(NetlistError::TerminalAlreadyConnected {
                device: d.name.clone().unwrap_or_else(|| format!("{}", device)),
                terminal,
            });
        }
        *slot = Some(net);
        c.nets[net.as_usize()].terminals.push((device, terminal));
        Ok(())
    }

    /// Attaches a subcircuit pin (a pin of the instantiated circuit) to a net
    /// of the containing circuit.
    pub fn connect_subcircuit_pin(
        &mut self,
        circuit: CircuitId,
        subcircuit: SubCircuitId,
        pin: PinId,
        net: NetId,
    ) -> Result<(), NetlistError> {
        let target = self.circuits[circuit.as_usize()].subcircuits[subcircuit.as_usize()].target;
        if pin.as_usize() >= self.circuits[target.as_usize()].pin_count() {
            return Err(NetlistError::PinOutOfRange {
                circuit: self.circuits[target.as_usize()].name.clone(),
                pin,
            });
        }
        let c = &mut self.circuits[circuit.as_usize()];
        let sc = &mut c.subcircuits[subcircuit.as_usize()];
        if sc.pin_nets.len() <= pin.as_usize() {
            sc.pin_nets.resize(pin.as_usize() + 1, None);
        }
        if sc.pin_nets[pin.as_usize()].is_some() {
            return Err(NetlistError::SubCircuitPinAlreadyConnected {
                subcircuit: sc.name.clone().unwrap_or_else(|| format!("{}", subcircuit)),
                pin,
            });
        }
        sc.pin_nets[pin.as_usize()] = Some(net);
        c.nets[net.as_usize()].subcircuit_pins.push((subcircuit, pin));
        Ok(())
    }

    pub fn circuit(&self, id: CircuitId) -> &Circuit {
        &self.circuits[id.as_usize()]
    }

    pub fn device_class(&self, id: DeviceClassId) -> &DeviceClass {
        &self.device_classes[id.as_usize()]
    }

    pub fn circuit_count(&self) -> usize {
        self.circuits.len()
    }

    pub fn device_class_count(&self) -> usize {
        self.device_classes.len()
    }

    pub fn circuit_ids(&self) -> impl Iterator<Item = CircuitId> + '_ {
        (0..self.circuits.len()).map(CircuitId::from)
    }

    pub fn device_class_ids(&self) -> impl Iterator<Item = DeviceClassId> + '_ {
        (0..self.device_classes.len()).map(DeviceClassId::from)
    }

    pub fn circuit_by_name(&self, name: &str) -> Option<CircuitId> {
        self.circuits
            .iter()
            .position(|c| c.name == name)
            .map(CircuitId::from)
    }

    /// Circuits in dependency order: every instantiated circuit appears
    /// before each of its instantiating circuits.
    ///
    /// The order is deterministic (post-order over the instantiation DAG,
    /// roots visited in id order).
    pub fn bottom_up(&self) -> Vec<CircuitId> {
        let mut visited = vec![false; self.circuits.len()];
        let mut order = Vec::with_capacity(self.circuits.len());
        for id in self.circuit_ids() {
            self.visit_bottom_up(id, &mut visited, &mut order);
        }
        order
    }

    fn visit_bottom_up(&self, id: CircuitId, visited: &mut [bool], order: &mut Vec<CircuitId>) {
        if visited[id.as_usize()] {
            return;
        }
        visited[id.as_usize()] = true;
        for sc in &self.circuits[id.as_usize()].subcircuits {
            self.visit_bottom_up(sc.target, visited, order);
        }
        order.push(id);
    }
}
