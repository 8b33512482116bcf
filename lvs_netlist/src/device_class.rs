//! Device classes: the type-level description of primitive devices.
//!
//! A device class names a device species (resistor, capacitor, MOS
//! transistor, ...), defines its terminals and parameters, and knows which
//! terminals are electrically interchangeable. Terminal and parameter ids
//! are indices into the definition lists; the well-known ids of the
//! standard classes are published in [`standard`].

use std::cmp::Ordering;

/// Well-known terminal and parameter ids of the standard device classes.
pub mod standard {
    /// First terminal of a two-terminal device (resistor, capacitor, inductor).
    pub const TERM_A: usize = 0;
    /// Second terminal of a two-terminal device.
    pub const TERM_B: usize = 1;

    /// Anode of a diode.
    pub const DIODE_ANODE: usize = 0;
    /// Cathode of a diode.
    pub const DIODE_CATHODE: usize = 1;

    /// Source terminal of a MOS transistor.
    pub const MOS_SOURCE: usize = 0;
    /// Gate terminal of a MOS transistor.
    pub const MOS_GATE: usize = 1;
    /// Drain terminal of a MOS transistor.
    pub const MOS_DRAIN: usize = 2;
    /// Bulk terminal of a four-terminal MOS transistor.
    pub const MOS_BULK: usize = 3;

    /// Resistance parameter of a resistor, in Ohm.
    pub const PARAM_R: usize = 0;
    /// Capacitance parameter of a capacitor, in Farad.
    pub const PARAM_C: usize = 0;
    /// Inductance parameter of an inductor, in Henry.
    pub const PARAM_L: usize = 0;
    /// Area parameter of a diode.
    pub const PARAM_AREA: usize = 0;
    /// Gate length parameter of a MOS transistor.
    pub const PARAM_MOS_L: usize = 0;
    /// Gate width parameter of a MOS transistor.
    pub const PARAM_MOS_W: usize = 1;
}

/// The species of a device class.
///
/// The kind drives terminal normalization and lets the comparison core
/// recognize parasitic candidates (resistors and capacitors) without
/// inspecting class names.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DeviceKind {
    Resistor,
    Capacitor,
    Inductor,
    Diode,
    /// Three-terminal MOS transistor (source, gate, drain).
    Mos3,
    /// Four-terminal MOS transistor (source, gate, drain, bulk).
    Mos4,
    /// A class with no built-in terminal symmetry or parameter semantics.
    Generic,
}

/// A named terminal slot of a device class.
#[derive(Clone, Debug)]
pub struct TerminalDef {
    name: String,
}

impl TerminalDef {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// A named parameter slot of a device class.
#[derive(Clone, Debug)]
pub struct ParamDef {
    name: String,
}

impl ParamDef {
    pub fn name(&self) -> &str {
        &self.name
    }
}

/// The definition of one device species within a netlist.
#[derive(Clone, Debug)]
pub struct DeviceClass {
    name: String,
    kind: DeviceKind,
    terminals: Vec<TerminalDef>,
    params: Vec<ParamDef>,
}

impl DeviceClass {
    fn new(name: &str, kind: DeviceKind, terminals: &[&str], params: &[&str]) -> Self {
        DeviceClass {
            name: name.to_string(),
            kind,
            terminals: terminals
                .iter()
                .map(|n| TerminalDef { name: (*n).to_string() })
                .collect(),
            params: params
                .iter()
                .map(|n| ParamDef { name: (*n).to_string() })
                .collect(),
        }
    }

    /// Standard resistor: terminals A/B (swappable), parameter R.
    pub fn resistor(name: &str) -> Self {
        Self::new(name, DeviceKind::Resistor, &["A", "B"], &["R"])
    }

    /// Standard capacitor: terminals A/B (swappable), parameter C.
    pub fn capacitor(name: &str) -> Self {
        Self::new(name, DeviceKind::Capacitor, &["A", "B"], &["C"])
    }

    /// Standard inductor: terminals A/B (swappable), parameter L.
    pub fn inductor(name: &str) -> Self {
        Self::new(name, DeviceKind::Inductor, &["A", "B"], &["L"])
    }

    /// Standard diode: anode and cathode, parameter AREA.
    pub fn diode(name: &str) -> Self {
        Self::new(name, DeviceKind::Diode, &["A", "C"], &["AREA"])
    }

    /// Three-terminal MOS transistor: source, gate, drain; source and drain
    /// are swappable. Parameters L and W.
    pub fn mos3(name: &str) -> Self {
        Self::new(name, DeviceKind::Mos3, &["S", "G", "D"], &["L", "W"])
    }

    /// Four-terminal MOS transistor: like [`Self::mos3`] plus a bulk terminal.
    pub fn mos4(name: &str) -> Self {
        Self::new(name, DeviceKind::Mos4, &["S", "G", "D", "B"], &["L", "W"])
    }

    /// A class with caller-defined terminals and parameters and no terminal
    /// symmetry.
    pub fn generic(name: &str, terminals: &[&str], params: &[&str]) -> Self {
        Self::new(name, DeviceKind::Generic, terminals, params)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn kind(&self) -> DeviceKind {
        self.kind
    }

    pub fn terminal_count(&self) -> usize {
        self.terminals.len()
    }

    pub fn terminals(&self) -> &[TerminalDef] {
        &self.terminals
    }

    pub fn param_count(&self) -> usize {
        self.params.len()
    }

    pub fn params(&self) -> &[ParamDef] {
        &self.params
    }

    /// Maps a terminal id to the canonical id of its symmetry group.
    ///
    /// Swapping two terminals that normalize to the same id does not change
    /// the electrical behavior of the device: resistor/capacitor/inductor
    /// A and B collapse to A, MOS drain collapses onto source. All other
    /// terminals map to themselves.
    pub fn normalize_terminal_id(&self, terminal: usize) -> usize {
        match self.kind {
            DeviceKind::Resistor | DeviceKind::Capacitor | DeviceKind::Inductor => {
                if terminal == standard::TERM_B {
                    standard::TERM_A
                } else {
                    terminal
                }
            }
            DeviceKind::Mos3 | DeviceKind::Mos4 => {
                if terminal == standard::MOS_DRAIN {
                    standard::MOS_SOURCE
                } else {
                    terminal
                }
            }
            DeviceKind::Diode | DeviceKind::Generic => terminal,
        }
    }

    /// Orders two parameter vectors of devices of this class.
    ///
    /// Missing trailing parameters compare as 0.0, so devices created with
    /// fewer values than the class declares are still well-ordered.
    pub fn compare_parameters(&self, a: &[f64], b: &[f64]) -> Ordering {
        for i in 0..self.params.len() {
            let pa = a.get(i).copied().unwrap_or(0.0);
            let pb = b.get(i).copied().unwrap_or(0.0);
            match pa.total_cmp(&pb) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    }

    /// Whether two parameter vectors are equivalent for this class.
    pub fn equal_parameters(&self, a: &[f64], b: &[f64]) -> bool {
        self.compare_parameters(a, b) == Ordering::Equal
    }
}

#[cfg(test)]
mod tests {
    use super::standard::*;
    use super::*;

    #[test]
    fn two_terminal_classes_normalize_b_to_a() {
        for class in [
            DeviceClass::resistor("RES"),
            DeviceClass::capacitor("CAP"),
            DeviceClass::inductor("IND"),
        ] {
            assert_eq!(class.normalize_terminal_id(TERM_A), TERM_A);
            assert_eq!(class.normalize_terminal_id(TERM_B), TERM_A);
        }
    }

    #[test]
    fn mos_normalizes_drain_to_source() {
        let class = DeviceClass::mos4("NMOS");
        assert_eq!(class.normalize_terminal_id(MOS_SOURCE), MOS_SOURCE);
        assert_eq!(class.normalize_terminal_id(MOS_DRAIN), MOS_SOURCE);
        assert_eq!(class.normalize_terminal_id(MOS_GATE), MOS_GATE);
        assert_eq!(class.normalize_terminal_id(MOS_BULK), MOS_BULK);
    }

    #[test]
    fn diode_and_generic_keep_terminals() {
        let diode = DeviceClass::diode("D");
        assert_eq!(diode.normalize_terminal_id(DIODE_CATHODE), DIODE_CATHODE);

        let gen = DeviceClass::generic("XYZ", &["P", "Q", "R"], &[]);
        for t in 0..3 {
            assert_eq!(gen.normalize_terminal_id(t), t);
        }
    }

    #[test]
    fn parameter_comparison_is_lexicographic() {
        let mos = DeviceClass::mos3("NMOS");
        assert_eq!(
            mos.compare_parameters(&[0.18, 1.0], &[0.18, 1.0]),
            Ordering::Equal
        );
        assert_eq!(
            mos.compare_parameters(&[0.18, 1.0], &[0.18, 2.0]),
            Ordering::Less
        );
        assert_eq!(
            mos.compare_parameters(&[0.25, 1.0], &[0.18, 2.0]),
            Ordering::Greater
        );
    }

    #[test]
    fn missing_parameters_compare_as_zero() {
        let mos = DeviceClass::mos3("NMOS");
        assert!(mos.equal_parameters(&[0.18], &[0.18, 0.0]));
        assert_eq!(
            mos.compare_parameters(&[0.18], &[0.18, 1.0]),
            Ordering::Less
        );
    }
}
