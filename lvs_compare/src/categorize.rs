//! Category assignment for device classes and circuits.
//!
//! A category is an opaque positive id; items sharing a category are
//! interchangeable during matching. Category 0 is reserved and never
//! assigned. By default an item is categorized by its upper-cased name, so
//! identically named library cells from the two netlists land in the same
//! category; explicit `declare_same` calls unify categories across
//! differing names.

use std::hash::Hash;

use ahash::AHashMap;
use lvs_netlist::{CircuitRef, DeviceClassRef, DeviceRef, SubCircuitRef};

/// The reserved "no category" id.
pub const NO_CATEGORY: usize = 0;

#[derive(Clone, Debug)]
pub(crate) struct Categorizer<K> {
    by_key: AHashMap<K, usize>,
    by_name: AHashMap<String, usize>,
    next_category: usize,
}

impl<K: Eq + Hash + Copy> Default for Categorizer<K> {
    fn default() -> Self {
        Categorizer {
            by_key: AHashMap::new(),
            by_name: AHashMap::new(),
            next_category: NO_CATEGORY,
        }
    }
}

impl<K: Eq + Hash + Copy> Categorizer<K> {
    /// Declares two items interchangeable.
    ///
    /// When both items already carry distinct categories, every entry with
    /// the second category is rewritten to the first. The maps stay small
    /// and declarations precede the query-heavy phase, so the rewrite scan
    /// is preferable to threading a union-find through every lookup.
    pub(crate) fn declare_same(&mut self, a: K, b: K) {
        let ca = self.by_key.get(&a).copied();
        let cb = self.by_key.get(&b).copied();
        match (ca, cb) {
            (Some(ca), Some(cb)) => {
                if ca != cb {
                    for cat in self.by_key.values_mut() {
                        if *cat == cb {
                            *cat = ca;
                        }
                    }
                    for cat in self.by_name.values_mut() {
                        if *cat == cb {
                            *cat = ca;
                        }
                    }
                }
            }
            (None, Some(cb)) => {
                self.by_key.insert(a, cb);
            }
            (Some(ca), None) => {
                self.by_key.insert(b, ca);
            }
            (None, None) => {
                self.next_category += 1;
                self.by_key.insert(a, self.next_category);
                self.by_key.insert(b, self.next_category);
            }
        }
    }

    /// The category of an item, assigning one by (case-insensitive) name on
    /// first sight.
    pub(crate) fn category_for(&mut self, key: K, name: &str) -> usize {
        if let Some(&cat) = self.by_key.get(&key) {
            return cat;
        }
        let folded = name.to_uppercase();
        if let Some(&cat) = self.by_name.get(&folded) {
            self.by_key.insert(key, cat);
            return cat;
        }
        self.next_category += 1;
        self.by_name.insert(folded, self.next_category);
        self.by_key.insert(key, self.next_category);
        self.next_category
    }
}

/// Assigns equivalence categories to device classes.
#[derive(Clone, Debug, Default)]
pub struct DeviceCategorizer<'nl> {
    inner: Categorizer<DeviceClassRef<'nl>>,
}

impl<'nl> DeviceCategorizer<'nl> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_same(&mut self, a: DeviceClassRef<'nl>, b: DeviceClassRef<'nl>) {
        self.inner.declare_same(a, b);
    }

    pub fn cat_for_device_class(&mut self, class: DeviceClassRef<'nl>) -> usize {
        self.inner.category_for(class, class.name())
    }

    pub fn cat_for_device(&mut self, device: DeviceRef<'nl>) -> usize {
        self.cat_for_device_class(device.class())
    }
}

/// Assigns equivalence categories to circuits.
#[derive(Clone, Debug, Default)]
pub struct CircuitCategorizer<'nl> {
    inner: Categorizer<CircuitRef<'nl>>,
}

impl<'nl> CircuitCategorizer<'nl> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn declare_same(&mut self, a: CircuitRef<'nl>, b: CircuitRef<'nl>) {
        self.inner.declare_same(a, b);
    }

    pub fn cat_for_circuit(&mut self, circuit: CircuitRef<'nl>) -> usize {
        self.inner.category_for(circuit, circuit.name())
    }

    pub fn cat_for_subcircuit(&mut self, subcircuit: SubCircuitRef<'nl>) -> usize {
        self.cat_for_circuit(subcircuit.target())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lvs_netlist::{DeviceClass, Netlist};

    fn netlist_with_classes(names: &[&str]) -> Netlist {
        let mut nl = Netlist::new();
        for name in names {
            nl.add_device_class(DeviceClass::generic(name, &["A", "B"], &[]));
        }
        nl
    }

    #[test]
    fn name_matching_is_case_insensitive() {
        let a = netlist_with_classes(&["nmos"]);
        let b = netlist_with_classes(&["NMOS"]);
        let mut cat = DeviceCategorizer::new();
        let ca = cat.cat_for_device_class(a.device_class_ref(0usize.into()));
        let cb = cat.cat_for_device_class(b.device_class_ref(0usize.into()));
        assert_eq!(ca, cb);
        assert_ne!(ca, NO_CATEGORY);
    }

    #[test]
    fn distinct_names_get_distinct_categories() {
        let nl = netlist_with_classes(&["NMOS", "PMOS"]);
        let mut cat = DeviceCategorizer::new();
        let c0 = cat.cat_for_device_class(nl.device_class_ref(0usize.into()));
        let c1 = cat.cat_for_device_class(nl.device_class_ref(1usize.into()));
        assert_ne!(c0, c1);
    }

    #[test]
    fn declared_classes_share_a_category() {
        let a = netlist_with_classes(&["NMOS"]);
        let b = netlist_with_classes(&["nch"]);
        let mut cat = DeviceCategorizer::new();
        cat.declare_same(
            a.device_class_ref(0usize.into()),
            b.device_class_ref(0usize.into()),
        );
        assert_eq!(
            cat.cat_for_device_class(a.device_class_ref(0usize.into())),
            cat.cat_for_device_class(b.device_class_ref(0usize.into()))
        );
    }

    #[test]
    fn declarations_are_transitive() {
        let a = netlist_with_classes(&["A1"]);
        let b = netlist_with_classes(&["B1"]);
        let c = netlist_with_classes(&["C1"]);
        let (ra, rb, rc) = (
            a.device_class_ref(0usize.into()),
            b.device_class_ref(0usize.into()),
            c.device_class_ref(0usize.into()),
        );

        let mut cat = DeviceCategorizer::new();
        // seed all three with name-based categories first, then unify
        cat.cat_for_device_class(ra);
        cat.cat_for_device_class(rb);
        cat.cat_for_device_class(rc);
        cat.declare_same(ra, rb);
        cat.declare_same(rb, rc);
        let expect = cat.cat_for_device_class(ra);
        assert_eq!(cat.cat_for_device_class(rb), expect);
        assert_eq!(cat.cat_for_device_class(rc), expect);
    }

    #[test]
    fn circuit_categorizer_unifies_on_declare() {
        let mut a = Netlist::new();
        a.add_circuit("INV");
        let mut b = Netlist::new();
        b.add_circuit("INVERTER");
        let ra = a.circuit_ref(0usize.into());
        let rb = b.circuit_ref(0usize.into());

        let mut cat = CircuitCategorizer::new();
        assert_ne!(cat.cat_for_circuit(ra), cat.cat_for_circuit(rb));
        cat.declare_same(ra, rb);
        assert_eq!(cat.cat_for_circuit(ra), cat.cat_for_circuit(rb));
    }
}
