//! Parasitic device filtering.

use lvs_netlist::{standard, DeviceKind, DeviceRef};

/// Decides which devices take part in graph construction and device
/// cross-referencing.
///
/// Extraction tends to produce large series resistors and small coupling
/// capacitors that the drawn netlist does not have; both can be stripped by
/// threshold. A negative threshold disables the respective filter.
#[derive(Clone, Copy, Debug)]
pub struct DeviceFilter {
    cap_threshold: f64,
    res_threshold: f64,
}

impl DeviceFilter {
    pub fn new(cap_threshold: f64, res_threshold: f64) -> Self {
        DeviceFilter {
            cap_threshold,
            res_threshold,
        }
    }

    /// Whether the device participates in the comparison.
    pub fn passes(&self, device: DeviceRef<'_>) -> bool {
        match device.class().data().kind() {
            DeviceKind::Resistor => {
                !(self.res_threshold > 0.0
                    && device.data().param(standard::PARAM_R) > self.res_threshold)
            }
            DeviceKind::Capacitor => {
                !(self.cap_threshold > 0.0
                    && device.data().param(standard::PARAM_C) < self.cap_threshold)
            }
            _ => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lvs_netlist::{DeviceClass, DeviceRef, Netlist};

    fn netlist_with_devices() -> Netlist {
        let mut nl = Netlist::new();
        let res = nl.add_device_class(DeviceClass::resistor("RES"));
        let cap = nl.add_device_class(DeviceClass::capacitor("CAP"));
        let mos = nl.add_device_class(DeviceClass::mos3("NMOS"));
        let c = nl.add_circuit("C");
        nl.add_device(c, Some("R1"), res, &[1000.0]);
        nl.add_device(c, Some("C1"), cap, &[1e-15]);
        nl.add_device(c, Some("M1"), mos, &[0.18, 1.0]);
        nl
    }

    fn device<'nl>(nl: &'nl Netlist, name: &str) -> DeviceRef<'nl> {
        nl.circuits().next().unwrap().device_by_name(name).unwrap()
    }

    #[test]
    fn disabled_filter_passes_everything() {
        let nl = netlist_with_devices();
        let filter = DeviceFilter::new(-1.0, -1.0);
        for name in ["R1", "C1", "M1"] {
            assert!(filter.passes(device(&nl, name)));
        }
    }

    #[test]
    fn big_resistors_are_skipped() {
        let nl = netlist_with_devices();
        let filter = DeviceFilter::new(-1.0, 100.0);
        assert!(!filter.passes(device(&nl, "R1")));
        assert!(filter.passes(device(&nl, "C1")));

        let lenient = DeviceFilter::new(-1.0, 1e6);
        assert!(lenient.passes(device(&nl, "R1")));
    }

    #[test]
    fn small_caps_are_skipped() {
        let nl = netlist_with_devices();
        let filter = DeviceFilter::new(1e-12, -1.0);
        assert!(!filter.passes(device(&nl, "C1")));
        assert!(filter.passes(device(&nl, "R1")));

        let lenient = DeviceFilter::new(1e-18, -1.0);
        assert!(lenient.passes(device(&nl, "C1")));
    }

    #[test]
    fn non_rc_devices_always_pass() {
        let nl = netlist_with_devices();
        let filter = DeviceFilter::new(1e-3, 1e-3);
        assert!(filter.passes(device(&nl, "M1")));
    }
}
