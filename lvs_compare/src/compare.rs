//! The top-level netlist comparator.
//!
//! [`NetlistComparer`] holds the persistent declarations (equivalent pins,
//! same classes/circuits/nets, filter thresholds). Each [`compare`] call
//! works on private copies of that state, walks both netlists bottom-up,
//! and for every circuit pair whose callees are verified builds the two net
//! graphs, runs the pairing engine, and cross-references pins, devices, and
//! subcircuits.
//!
//! [`compare`]: NetlistComparer::compare

use std::collections::{BTreeMap, VecDeque};

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

use lvs_netlist::{
    CircuitRef, DeviceClassRef, DeviceRef, NetRef, Netlist, PinId, PinRef, SubCircuitRef,
};

use crate::categorize::{CircuitCategorizer, DeviceCategorizer};
use crate::circuit_map::CircuitMapper;
use crate::device_filter::DeviceFilter;
use crate::engine::PairingEngine;
use crate::graph::{DeviceRanks, GraphBuildContext, NetGraph};
use crate::logger::{CompareLogger, NullLogger};
use crate::pin_map::CircuitPinMapper;

/// Above this many unmatched subcircuits, the pairwise alignment analysis
/// is skipped and they are reported individually. The cutoff only affects
/// diagnostic pairing quality, never the verdict.
pub const MAX_SUBCIRCUIT_ANALYSIS_SET: usize = 1000;

/// Tunable limits and thresholds of a comparison run.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CompareConfig {
    /// Capacitors below this value are ignored; negative disables.
    pub cap_threshold: f64,
    /// Resistors above this value are ignored; negative disables.
    pub res_threshold: f64,
    /// Maximum backtracking recursion depth (graph jumps).
    pub max_depth: usize,
    /// Maximum decision-tree branching complexity.
    pub max_branch_complexity: usize,
}

impl Default for CompareConfig {
    fn default() -> Self {
        CompareConfig {
            cap_threshold: -1.0,
            res_threshold: -1.0,
            max_depth: 8,
            max_branch_complexity: 100,
        }
    }
}

/// Errors raised by the comparer's configuration surface.
#[derive(Debug, Error)]
pub enum CompareError {
    #[error("pin {pin} is out of range for circuit {circuit}")]
    PinOutOfRange { circuit: String, pin: PinId },
}

type NetIdentityMap<'nl> =
    AHashMap<(CircuitRef<'nl>, CircuitRef<'nl>), Vec<(NetRef<'nl>, NetRef<'nl>)>>;

type Key = Vec<(usize, usize)>;

/// Compares two hierarchical netlists for structural equivalence.
pub struct NetlistComparer<'nl> {
    config: CompareConfig,
    device_categorizer: DeviceCategorizer<'nl>,
    circuit_categorizer: CircuitCategorizer<'nl>,
    pin_mapper: CircuitPinMapper<'nl>,
    net_identities: NetIdentityMap<'nl>,
}

impl<'nl> Default for NetlistComparer<'nl> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'nl> NetlistComparer<'nl> {
    pub fn new() -> Self {
        Self::with_config(CompareConfig::default())
    }

    pub fn with_config(config: CompareConfig) -> Self {
        NetlistComparer {
            config,
            device_categorizer: DeviceCategorizer::new(),
            circuit_categorizer: CircuitCategorizer::new(),
            pin_mapper: CircuitPinMapper::new(),
            net_identities: NetIdentityMap::default(),
        }
    }

    pub fn config(&self) -> &CompareConfig {
        &self.config
    }

    /// Ignores capacitors below the threshold; negative disables.
    pub fn exclude_caps(&mut self, threshold: f64) {
        self.config.cap_threshold = threshold;
    }

    /// Ignores resistors above the threshold; negative disables.
    pub fn exclude_resistors(&mut self, threshold: f64) {
        self.config.res_threshold = threshold;
    }

    /// Declares two nets identical up front, seeding the pairing engine for
    /// the circuit pair they live in.
    pub fn same_nets(&mut self, a: NetRef<'nl>, b: NetRef<'nl>) {
        self.net_identities
            .entry((a.circuit(), b.circuit()))
            .or_default()
            .push((a, b));
    }

    /// Declares the given pins of the circuit electrically swappable. Pin
    /// sets from overlapping calls merge into one cluster.
    pub fn equivalent_pins(
        &mut self,
        circuit: CircuitRef<'nl>,
        pins: &[PinId],
    ) -> Result<(), CompareError> {
        for &pin in pins {
            if pin.as_usize() >= circuit.pin_count() {
                return Err(CompareError::PinOutOfRange {
                    circuit: circuit.name().to_string(),
                    pin,
                });
            }
        }
        self.pin_mapper.map_pins(circuit, pins);
        Ok(())
    }

    /// Declares two device classes equivalent (for example `NMOS` ≙ `nch`).
    pub fn same_device_classes(&mut self, a: DeviceClassRef<'nl>, b: DeviceClassRef<'nl>) {
        self.device_categorizer.declare_same(a, b);
    }

    /// Declares two circuits equivalent despite differing names.
    pub fn same_circuits(&mut self, a: CircuitRef<'nl>, b: CircuitRef<'nl>) {
        self.circuit_categorizer.declare_same(a, b);
    }

    /// Compares the two netlists, discarding events. Returns whether they
    /// are structurally equivalent.
    pub fn compare(&self, a: &'nl Netlist, b: &'nl Netlist) -> bool {
        let mut logger = NullLogger;
        self.compare_with_logger(a, b, &mut logger)
    }

    /// Compares the two netlists, reporting every match and mismatch to the
    /// logger. Repeated calls are independent: the persistent declarations
    /// are copied into the run and never modified.
    pub fn compare_with_logger(
        &self,
        a: &'nl Netlist,
        b: &'nl Netlist,
        logger: &mut dyn CompareLogger,
    ) -> bool {
        let mut run = CompareRun {
            config: self.config.clone(),
            device_categorizer: self.device_categorizer.clone(),
            circuit_categorizer: self.circuit_categorizer.clone(),
            pin_mapper: self.pin_mapper.clone(),
            net_identities: &self.net_identities,
            c12: AHashMap::new(),
            c22: AHashMap::new(),
            verified_a: AHashSet::new(),
            verified_b: AHashSet::new(),
            logger,
        };
        run.compare_netlists(a, b)
    }
}

/// The working state of one `compare` invocation.
struct CompareRun<'nl, 'r> {
    config: CompareConfig,
    device_categorizer: DeviceCategorizer<'nl>,
    circuit_categorizer: CircuitCategorizer<'nl>,
    pin_mapper: CircuitPinMapper<'nl>,
    net_identities: &'r NetIdentityMap<'nl>,
    /// Pin mapping of verified A-side circuits onto their B counterparts.
    c12: AHashMap<CircuitRef<'nl>, CircuitMapper<'nl>>,
    /// Identity mapping of verified B-side circuits, so both graphs express
    /// subcircuit transitions in the same (B-side) pin space.
    c22: AHashMap<CircuitRef<'nl>, CircuitMapper<'nl>>,
    verified_a: AHashSet<CircuitRef<'nl>>,
    verified_b: AHashSet<CircuitRef<'nl>>,
    logger: &'r mut dyn CompareLogger,
}

impl<'nl, 'r> CompareRun<'nl, 'r> {
    fn compare_netlists(&mut self, a: &'nl Netlist, b: &'nl Netlist) -> bool {
        let mut good = true;

        let mut cat2circuits: BTreeMap<usize, (Option<CircuitRef<'nl>>, Option<CircuitRef<'nl>>)> =
            BTreeMap::new();
        for c in a.circuits() {
            let cat = self.circuit_categorizer.cat_for_circuit(c);
            cat2circuits.entry(cat).or_default().0 = Some(c);
        }
        for c in b.circuits() {
            let cat = self.circuit_categorizer.cat_for_circuit(c);
            cat2circuits.entry(cat).or_default().1 = Some(c);
        }

        self.logger.begin_netlist(a, b);

        let mut cat2classes: BTreeMap<
            usize,
            (Option<DeviceClassRef<'nl>>, Option<DeviceClassRef<'nl>>),
        > = BTreeMap::new();
        for id in a.device_class_ids() {
            let class = a.device_class_ref(id);
            let cat = self.device_categorizer.cat_for_device_class(class);
            cat2classes.entry(cat).or_default().0 = Some(class);
        }
        for id in b.device_class_ids() {
            let class = b.device_class_ref(id);
            let cat = self.device_categorizer.cat_for_device_class(class);
            cat2classes.entry(cat).or_default().1 = Some(class);
        }

        for (ca, cb) in cat2classes.values() {
            if ca.is_none() || cb.is_none() {
                good = false;
                self.logger.device_class_mismatch(*ca, *cb);
            }
        }

        for (ca, cb) in cat2circuits.values() {
            if ca.is_none() || cb.is_none() {
                good = false;
                self.logger.circuit_mismatch(*ca, *cb);
            }
        }

        for id in a.bottom_up() {
            let cat = self.circuit_categorizer.cat_for_circuit(a.circuit_ref(id));
            let Some(&(pa, pb)) = cat2circuits.get(&cat) else {
                continue;
            };
            let (Some(ca), Some(cb)) = (pa, pb) else {
                continue;
            };

            let net_identity = self
                .net_identities
                .get(&(ca, cb))
                .cloned()
                .unwrap_or_default();

            if all_subcircuits_verified(ca, &self.verified_a)
                && all_subcircuits_verified(cb, &self.verified_b)
            {
                info!(a = ca.name(), b = cb.name(), "comparing circuit pair");
                self.logger.begin_circuit(ca, cb);

                let mut pin_mismatch = false;
                let g = self.compare_circuits(ca, cb, &net_identity, &mut pin_mismatch);
                if !g {
                    good = false;
                }
                if !pin_mismatch {
                    self.verified_a.insert(ca);
                    self.verified_b.insert(cb);
                }
                self.derive_pin_equivalence(ca, cb);

                self.logger.end_circuit(ca, cb, g);
            } else {
                debug!(a = ca.name(), b = cb.name(), "skipped, callees unverified");
                self.logger.circuit_skipped(ca, cb);
                good = false;
            }
        }

        self.logger.end_netlist(a, b);
        good
    }

    fn compare_circuits(
        &mut self,
        c1: CircuitRef<'nl>,
        c2: CircuitRef<'nl>,
        net_identity: &[(NetRef<'nl>, NetRef<'nl>)],
        pin_mismatch: &mut bool,
    ) -> bool {
        let filter = DeviceFilter::new(self.config.cap_threshold, self.config.res_threshold);
        let ranks = DeviceRanks::build(c1, c2, &mut self.device_categorizer);

        // Subcircuit transitions of both graphs are expressed in c2 pin
        // space (the c22 map carries identity mappers), so pin swapping only
        // has to be applied there.
        let mut g1 = {
            let mut ctx = GraphBuildContext {
                circuit_categorizer: &mut self.circuit_categorizer,
                device_filter: &filter,
                circuit_map: &self.c12,
                pin_mapper: &self.pin_mapper,
                device_ranks: &ranks,
            };
            NetGraph::build(c1, &mut ctx)
        };
        let mut g2 = {
            let mut ctx = GraphBuildContext {
                circuit_categorizer: &mut self.circuit_categorizer,
                device_filter: &filter,
                circuit_map: &self.c22,
                pin_mapper: &self.pin_mapper,
                device_ranks: &ranks,
            };
            NetGraph::build(c2, &mut ctx)
        };

        // seed: the two dummies pair with each other, then user hints
        g1.identify(0, 0);
        g2.identify(0, 0);
        for (na, nb) in net_identity {
            let ni1 = g1.node_index_for_net(Some(na.id()));
            let ni2 = g2.node_index_for_net(Some(nb.id()));
            g1.identify(ni1, ni2);
            g2.identify(ni2, ni1);
        }

        let mut good = {
            let mut engine = PairingEngine {
                g1: &mut g1,
                g2: &mut g2,
                max_depth: self.config.max_depth,
                max_n_branch: self.config.max_branch_complexity,
                logger: &mut *self.logger,
            };
            engine.run()
        };

        self.cross_reference_pins(c1, c2, &g1, &g2, pin_mismatch, &mut good);
        self.cross_reference_devices(c1, c2, &g1, &g2, &filter, &mut good);
        self.cross_reference_subcircuits(c1, c2, &g1, &g2, &mut good);

        good
    }

    /// Matches the pins of the two circuits through their paired nets and
    /// populates the circuit mappers parents will consume.
    fn cross_reference_pins(
        &mut self,
        c1: CircuitRef<'nl>,
        c2: CircuitRef<'nl>,
        g1: &NetGraph<'nl>,
        g2: &NetGraph<'nl>,
        pin_mismatch: &mut bool,
        good: &mut bool,
    ) {
        if c1.pin_count() == 0 || c2.pin_count() == 0 {
            // Typically top-level circuits: report the pins as matched
            // against nothing and keep the pair out of parents' way only
            // when the counts disagree.
            for p in c1.pins() {
                self.logger.match_pins(Some(p), None);
            }
            for p in c2.pins() {
                self.logger.match_pins(None, Some(p));
            }
            if c1.pin_count() != c2.pin_count() {
                *pin_mismatch = true;
            }
            return;
        }

        let mut floating: VecDeque<PinRef<'nl>> = VecDeque::new();
        let mut net2pin: BTreeMap<usize, VecDeque<PinRef<'nl>>> = BTreeMap::new();
        for p in c2.pins() {
            match p.net() {
                Some(net) => net2pin
                    .entry(g2.node_index_for_net(Some(net.id())))
                    .or_default()
                    .push_back(p),
                None => floating.push_back(p),
            }
        }

        let mut map12: Vec<(PinId, PinId)> = Vec::new();
        let mut map22: Vec<(PinId, PinId)> = Vec::new();
        let mut handled: AHashSet<PinId> = AHashSet::new();

        for p in c1.pins() {
            if handled.contains(&p.id()) {
                continue;
            }

            let Some(net) = p.net() else {
                // A floating pin consumes a floating partner; the pin
                // equivalence derived after this circuit legitimizes the
                // arbitrary choice.
                match floating.pop_front() {
                    Some(f) => {
                        self.logger.match_pins(Some(p), Some(f));
                        map12.push((p.id(), f.id()));
                        map22.push((f.id(), f.id()));
                    }
                    None => {
                        self.logger.pin_mismatch(Some(p), None);
                        *pin_mismatch = true;
                        *good = false;
                    }
                }
                continue;
            };

            let ni = g1.node_index_for_net(Some(net.id()));
            if !g1.node(ni).has_other() {
                self.logger.pin_mismatch(Some(p), None);
                *pin_mismatch = true;
                *good = false;
                continue;
            }

            // walk every pin of this net against the queued peer pins of
            // the partner node
            let other_index = g1.node(ni).other_index;
            let mut queue = net2pin.remove(&other_index).unwrap_or_default();
            for &pin_id in net.data().pins() {
                let pi = c1.pin(pin_id);
                handled.insert(pin_id);
                match queue.pop_front() {
                    Some(np) => {
                        self.logger.match_pins(Some(pi), Some(np));
                        map12.push((pin_id, np.id()));
                        map22.push((np.id(), np.id()));
                    }
                    None => {
                        self.logger.pin_mismatch(Some(pi), None);
                        *pin_mismatch = true;
                        *good = false;
                    }
                }
            }
            if !queue.is_empty() {
                net2pin.insert(other_index, queue);
            }
        }

        // peer pins that were never consumed
        for queue in net2pin.into_values() {
            for np in queue {
                self.logger.pin_mismatch(None, Some(np));
                *pin_mismatch = true;
                *good = false;
            }
        }
        for f in floating {
            self.logger.pin_mismatch(None, Some(f));
            *pin_mismatch = true;
            *good = false;
        }

        // Register the mappers even when no pin matched: their presence is
        // what marks the pair usable for parent graphs.
        let m12 = self.c12.entry(c1).or_insert_with(|| CircuitMapper::new(c2));
        for (t, o) in map12 {
            m12.map_pin(t, o);
        }
        let m22 = self.c22.entry(c2).or_insert_with(|| CircuitMapper::new(c2));
        for (t, o) in map22 {
            m22.map_pin(t, o);
        }
    }

    /// Pairs devices through their (terminal, paired-node) keys.
    fn cross_reference_devices(
        &mut self,
        c1: CircuitRef<'nl>,
        c2: CircuitRef<'nl>,
        g1: &NetGraph<'nl>,
        g2: &NetGraph<'nl>,
        filter: &DeviceFilter,
        good: &mut bool,
    ) {
        let mut device_map: BTreeMap<Key, VecDeque<(DeviceRef<'nl>, usize)>> = BTreeMap::new();

        for d in c1.devices() {
            if !filter.passes(d) {
                continue;
            }
            let key = device_key(d, g1);
            if key.iter().any(|&(_, node)| !g1.node(node).has_other()) {
                self.logger.device_mismatch(Some(d), None);
                *good = false;
            } else {
                let cat = self.device_categorizer.cat_for_device(d);
                device_map.entry(key).or_default().push_back((d, cat));
            }
        }

        for d in c2.devices() {
            if !filter.passes(d) {
                continue;
            }
            let mut key = device_key(d, g2);
            let mut mapped = true;
            for entry in &mut key {
                if !g2.node(entry.1).has_other() {
                    mapped = false;
                } else {
                    entry.1 = g2.node(entry.1).other_index;
                }
            }
            key.sort_unstable();

            let bucket = if mapped {
                device_map.get_mut(&key).filter(|q| !q.is_empty())
            } else {
                None
            };
            let Some(bucket) = bucket else {
                self.logger.device_mismatch(None, Some(d));
                *good = false;
                continue;
            };

            let (da, cat_a) = bucket.pop_front().expect("bucket is not empty");
            let cat_b = self.device_categorizer.cat_for_device(d);
            if cat_a != cat_b {
                self.logger.match_devices_with_different_device_classes(da, d);
                *good = false;
            } else if !da
                .class()
                .data()
                .equal_parameters(da.data().params(), d.data().params())
            {
                self.logger.match_devices_with_different_parameters(da, d);
                *good = false;
            } else {
                self.logger.match_devices(da, d);
            }
        }

        for bucket in device_map.into_values() {
            for (da, _) in bucket {
                self.logger.device_mismatch(Some(da), None);
                *good = false;
            }
        }
    }

    /// Pairs subcircuits through their (pin, paired-node) keys; leftovers
    /// are aligned heuristically for better diagnostics.
    fn cross_reference_subcircuits(
        &mut self,
        c1: CircuitRef<'nl>,
        c2: CircuitRef<'nl>,
        g1: &NetGraph<'nl>,
        g2: &NetGraph<'nl>,
        good: &mut bool,
    ) {
        let mut subcircuit_map: BTreeMap<Key, VecDeque<(SubCircuitRef<'nl>, usize)>> =
            BTreeMap::new();
        let mut unmatched_a: Vec<(Key, SubCircuitRef<'nl>)> = Vec::new();
        let mut unmatched_b: Vec<(Key, SubCircuitRef<'nl>)> = Vec::new();

        for sc in c1.subcircuits() {
            let key = subcircuit_key(sc, g1, &self.c12, &self.pin_mapper);
            if key.iter().any(|&(_, node)| !g1.node(node).has_other()) {
                self.logger.subcircuit_mismatch(Some(sc), None);
                *good = false;
            } else if key.is_empty() {
                // unpaired callee, no usable key; aligned below
                unmatched_a.push((key, sc));
                *good = false;
            } else {
                let cat = self.circuit_categorizer.cat_for_subcircuit(sc);
                subcircuit_map.entry(key).or_default().push_back((sc, cat));
            }
        }

        for sc in c2.subcircuits() {
            let mut key = subcircuit_key(sc, g2, &self.c22, &self.pin_mapper);
            let mut mapped = true;
            for entry in &mut key {
                if !g2.node(entry.1).has_other() {
                    mapped = false;
                } else {
                    entry.1 = g2.node(entry.1).other_index;
                }
            }
            key.sort_unstable();

            let bucket = if mapped && !key.is_empty() {
                subcircuit_map.get_mut(&key).filter(|q| !q.is_empty())
            } else {
                None
            };
            let Some(bucket) = bucket else {
                unmatched_b.push((key, sc));
                *good = false;
                continue;
            };

            let (sa, cat_a) = bucket.pop_front().expect("bucket is not empty");
            let cat_b = self.circuit_categorizer.cat_for_subcircuit(sc);
            if cat_a != cat_b {
                self.logger.subcircuit_mismatch(Some(sa), Some(sc));
                *good = false;
            } else {
                self.logger.match_subcircuits(sa, sc);
            }
        }

        for (key, bucket) in subcircuit_map {
            for (sa, _) in bucket {
                unmatched_a.push((key.clone(), sa));
                *good = false;
            }
        }

        self.report_unmatched_subcircuits(unmatched_a, unmatched_b);
    }

    /// Pairs leftover subcircuits by key similarity so reports point at the
    /// likely counterpart instead of two bare lists.
    fn report_unmatched_subcircuits(
        &mut self,
        mut unmatched_a: Vec<(Key, SubCircuitRef<'nl>)>,
        mut unmatched_b: Vec<(Key, SubCircuitRef<'nl>)>,
    ) {
        if unmatched_a.is_empty() && unmatched_b.is_empty() {
            return;
        }

        if unmatched_a.len() + unmatched_b.len() > MAX_SUBCIRCUIT_ANALYSIS_SET {
            // pairing analysis on a set this large is wasted time
            for (_, sc) in unmatched_a {
                self.logger.subcircuit_mismatch(Some(sc), None);
            }
            for (_, sc) in unmatched_b {
                self.logger.subcircuit_mismatch(None, Some(sc));
            }
            return;
        }

        unmatched_a.sort_by_key(|(k, _)| k.len());
        unmatched_b.sort_by_key(|(k, _)| k.len());

        let mut i = 0;
        let mut j = 0;
        while i < unmatched_a.len() || j < unmatched_b.len() {
            while j < unmatched_b.len()
                && (i >= unmatched_a.len() || unmatched_b[j].0.len() < unmatched_a[i].0.len())
            {
                self.logger.subcircuit_mismatch(None, Some(unmatched_b[j].1));
                j += 1;
            }
            while i < unmatched_a.len()
                && (j >= unmatched_b.len() || unmatched_a[i].0.len() < unmatched_b[j].0.len())
            {
                self.logger.subcircuit_mismatch(Some(unmatched_a[i].1), None);
                i += 1;
            }
            if i >= unmatched_a.len() && j >= unmatched_b.len() {
                break;
            }

            // both sides now start a run of keys with the same length
            let len = unmatched_a[i].0.len();
            let i_end = i + unmatched_a[i..]
                .iter()
                .take_while(|(k, _)| k.len() == len)
                .count();
            let j_end = j + unmatched_b[j..]
                .iter()
                .take_while(|(k, _)| k.len() == len)
                .count();
            self.align_group(&unmatched_a[i..i_end], &unmatched_b[j..j_end]);
            i = i_end;
            j = j_end;
        }
    }

    /// Pairwise swap improvement over the key distance within one
    /// equal-key-length group, then reports the resulting pairs.
    fn align_group(
        &mut self,
        group_a: &[(Key, SubCircuitRef<'nl>)],
        group_b: &[(Key, SubCircuitRef<'nl>)],
    ) {
        let len = group_a.len().max(group_b.len());
        let mut order_b: Vec<Option<usize>> =
            (0..len).map(|m| (m < group_b.len()).then_some(m)).collect();

        if len > 1 {
            let mut improved = true;
            while improved {
                improved = false;
                for n in 0..len {
                    for m in (n + 1)..len {
                        let (Some(an), Some(am)) = (group_a.get(n), group_a.get(m)) else {
                            continue;
                        };
                        let (Some(bn), Some(bm)) = (order_b[n], order_b[m]) else {
                            continue;
                        };
                        let current = key_distance(&an.0, &group_b[bn].0)
                            + key_distance(&am.0, &group_b[bm].0);
                        let swapped = key_distance(&an.0, &group_b[bm].0)
                            + key_distance(&am.0, &group_b[bn].0);
                        if swapped < current {
                            order_b.swap(n, m);
                            improved = true;
                        }
                    }
                }
            }
        }

        for n in 0..len {
            let a = group_a.get(n).map(|(_, sc)| *sc);
            let b = order_b[n].map(|m| group_b[m].1);
            self.logger.subcircuit_mismatch(a, b);
        }
    }

    /// Declares all pins on floating nets of both circuits mutually
    /// equivalent.
    ///
    /// Pins on floating nets cannot be told apart topologically; treating
    /// them as swappable lets parents instantiate abstract callees with any
    /// pin order. This does not capture abstract subcircuits that are wired
    /// differently on the two sides.
    fn derive_pin_equivalence(&mut self, ca: CircuitRef<'nl>, cb: CircuitRef<'nl>) {
        let pa = collect_pins_with_empty_nets(ca, &self.pin_mapper);
        let pb = collect_pins_with_empty_nets(cb, &self.pin_mapper);
        self.pin_mapper.map_pins(ca, &pa);
        self.pin_mapper.map_pins(cb, &pb);
    }
}

fn collect_pins_with_empty_nets<'nl>(
    circuit: CircuitRef<'nl>,
    pin_mapper: &CircuitPinMapper<'nl>,
) -> Vec<PinId> {
    circuit
        .pins()
        .filter(|p| {
            let empty = p.net().map_or(true, |n| n.is_floating());
            empty && !pin_mapper.is_mapped(circuit, p.id())
        })
        .map(|p| p.id())
        .collect()
}

/// Whether every multi-pin callee of the circuit has been verified.
/// Single-pin (via-like) callees contribute no graph edges and are ignored.
fn all_subcircuits_verified<'nl>(
    circuit: CircuitRef<'nl>,
    verified: &AHashSet<CircuitRef<'nl>>,
) -> bool {
    circuit.subcircuits().all(|sc| {
        let target = sc.target();
        target.pin_count() <= 1 || verified.contains(&target)
    })
}

/// The sorted (normalized terminal, node index) key of a device.
fn device_key(device: DeviceRef<'_>, g: &NetGraph<'_>) -> Key {
    let class = device.class().data();
    let mut key: Key = (0..class.terminal_count())
        .map(|t| {
            (
                class.normalize_terminal_id(t),
                g.node_index_for_net(device.data().net_for_terminal(t)),
            )
        })
        .collect();
    key.sort_unstable();
    key
}

/// The sorted (normalized peer pin, node index) key of a subcircuit.
/// Empty when the callee has no counterpart circuit.
fn subcircuit_key<'nl>(
    sc: SubCircuitRef<'nl>,
    g: &NetGraph<'nl>,
    circuit_map: &AHashMap<CircuitRef<'nl>, CircuitMapper<'nl>>,
    pin_mapper: &CircuitPinMapper<'nl>,
) -> Key {
    let Some(cm) = circuit_map.get(&sc.target()) else {
        return Key::new();
    };
    let other = cm.other();
    let mut key = Key::new();
    for p in other.pins() {
        if let Some(this_pin) = cm.this_pin_for_other(p.id()) {
            let pin_id = pin_mapper.normalize_pin_id(other, p.id());
            let node = g.node_index_for_net(sc.net_for_pin(this_pin).map(|n| n.id()));
            key.push((pin_id.as_usize(), node));
        }
    }
    key.sort_unstable();
    key
}

fn key_distance(a: &[(usize, usize)], b: &[(usize, usize)]) -> f64 {
    debug_assert_eq!(a.len(), b.len());
    a.iter()
        .zip(b)
        .map(|(x, y)| {
            let dp = x.0 as f64 - y.0 as f64;
            let dn = x.1 as f64 - y.1 as f64;
            dp * dp + dn * dn
        })
        .sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_distance_prefers_identical_keys() {
        let a = vec![(0, 3), (1, 5)];
        let b = vec![(0, 3), (1, 5)];
        let c = vec![(0, 4), (1, 9)];
        assert_eq!(key_distance(&a, &b), 0.0);
        assert!(key_distance(&a, &c) > 0.0);
    }

    #[test]
    fn key_distance_is_symmetric() {
        let a = vec![(0, 2), (3, 7)];
        let b = vec![(1, 5), (2, 6)];
        assert_eq!(key_distance(&a, &b), key_distance(&b, &a));
    }
}
