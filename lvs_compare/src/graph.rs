//! The per-circuit net graph.
//!
//! Each net of a circuit becomes one [`NetGraphNode`]. A node's edges
//! describe how the net reaches other nets: every passage through a device
//! (terminal to terminal) or a subcircuit (pin to pin) is one
//! [`Transition`], and all transitions leading to the same far net are
//! merged into one edge. Transition lists are sorted, edges are sorted, and
//! nodes are sorted, so structurally equivalent nets of two circuits
//! produce identical keys and can be lined up by plain comparison.

use std::cmp::Ordering;

use ahash::AHashMap;
use lvs_netlist::{
    CircuitRef, DeviceId, DeviceRef, NetId, NetRef, PinId, SubCircuitId, SubCircuitRef,
};

use crate::categorize::{CircuitCategorizer, DeviceCategorizer};
use crate::circuit_map::CircuitMapper;
use crate::device_filter::DeviceFilter;
use crate::pin_map::CircuitPinMapper;

/// Marker for a node that has no partner in the peer graph yet.
pub(crate) const UNSET: usize = usize::MAX;

/// How many mapped subcircuit pins beyond the attached one contribute
/// transitions.
///
/// Edges from every pin to every other pin would blow up node fan-out on
/// wide subcircuits, so each subcircuit pin only looks at the next few
/// mapped, non-equivalent pins in cyclic order. Unmapped and equivalent
/// pins do not consume the budget. Nets that need more context than this
/// window are still separated later through fixed-point propagation.
pub(crate) const TAKE_ADDITIONAL_PINS: usize = 5;

/// Consistent ordering keys for the devices of one circuit pair.
///
/// Transition ordering must compare devices by (category, parameters)
/// across both graphs without access to the netlists. Ranks are assigned by
/// sorting all devices of the two circuits once; equal rank means equal
/// category and equal parameters.
pub(crate) struct DeviceRanks<'nl> {
    ranks: AHashMap<DeviceRef<'nl>, usize>,
}

impl<'nl> DeviceRanks<'nl> {
    pub(crate) fn build(
        c1: CircuitRef<'nl>,
        c2: CircuitRef<'nl>,
        categorizer: &mut DeviceCategorizer<'nl>,
    ) -> Self {
        let mut entries: Vec<(usize, DeviceRef<'nl>)> = c1
            .devices()
            .chain(c2.devices())
            .map(|d| (categorizer.cat_for_device(d), d))
            .collect();
        entries.sort_by(|(ca, da), (cb, db)| {
            ca.cmp(cb).then_with(|| {
                da.class()
                    .data()
                    .compare_parameters(da.data().params(), db.data().params())
            })
        });

        let mut ranks = AHashMap::with_capacity(entries.len());
        let mut rank = 0usize;
        for (i, (cat, device)) in entries.iter().enumerate() {
            if i > 0 {
                let (prev_cat, prev) = &entries[i - 1];
                let same = *prev_cat == *cat
                    && prev
                        .class()
                        .data()
                        .compare_parameters(prev.data().params(), device.data().params())
                        == Ordering::Equal;
                if !same {
                    rank += 1;
                }
            }
            ranks.insert(*device, rank);
        }
        DeviceRanks { ranks }
    }

    pub(crate) fn rank(&self, device: DeviceRef<'nl>) -> usize {
        *self
            .ranks
            .get(&device)
            .expect("device is missing from the rank table")
    }
}

/// What a transition passes through.
#[derive(Clone, Copy, Debug)]
pub(crate) enum TransitionVia {
    /// Through a device, identified for ordering purposes by its rank.
    Device { device: DeviceId, rank: usize },
    /// Through a subcircuit, identified by its circuit category.
    SubCircuit {
        subcircuit: SubCircuitId,
        category: usize,
    },
}

/// One passage from this net to a far net.
///
/// `id1`/`id2` are normalized terminal ids (device transitions) or
/// normalized peer-space pin ids (subcircuit transitions). The concrete
/// device/subcircuit instance does not participate in ordering or equality;
/// transitions from the two graphs compare equal exactly when they are
/// interchangeable.
#[derive(Clone, Copy, Debug)]
pub(crate) struct Transition {
    pub(crate) via: TransitionVia,
    pub(crate) id1: usize,
    pub(crate) id2: usize,
}

impl Transition {
    fn sort_key(&self) -> (u8, usize, usize, usize) {
        match self.via {
            TransitionVia::Device { rank, .. } => (0, rank, self.id1, self.id2),
            TransitionVia::SubCircuit { category, .. } => (1, category, self.id1, self.id2),
        }
    }
}

impl PartialEq for Transition {
    fn eq(&self, other: &Self) -> bool {
        self.sort_key() == other.sort_key()
    }
}

impl Eq for Transition {}

impl PartialOrd for Transition {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Transition {
    fn cmp(&self, other: &Self) -> Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}

/// All transitions from one net to one particular far net.
#[derive(Clone, Debug)]
pub(crate) struct Edge {
    pub(crate) transitions: Vec<Transition>,
    pub(crate) far_net: Option<NetId>,
    pub(crate) far_index: usize,
}

/// Ordering fallback for nets without transitions: such nodes are told
/// apart by their attached pins.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord)]
struct PinKey {
    has_net: bool,
    pin_count: usize,
    first_pin_name: Option<String>,
}

/// One net of the circuit plus its sorted outgoing edges.
#[derive(Clone, Debug)]
pub(crate) struct NetGraphNode {
    pub(crate) net: Option<NetId>,
    pub(crate) other_index: usize,
    pub(crate) edges: Vec<Edge>,
    pin_key: PinKey,
}

impl NetGraphNode {
    /// Builds the node for `net` (`None` builds the dummy node standing in
    /// for absent connections).
    fn for_net<'nl>(
        circuit: CircuitRef<'nl>,
        net: Option<NetId>,
        ctx: &mut GraphBuildContext<'nl, '_>,
    ) -> NetGraphNode {
        let mut edges: Vec<Edge> = Vec::new();
        let mut edge_of_net: AHashMap<Option<NetId>, usize> = AHashMap::new();

        let mut push = |far: Option<NetId>, transition: Transition| {
            let slot = *edge_of_net.entry(far).or_insert_with(|| {
                edges.push(Edge {
                    transitions: Vec::new(),
                    far_net: far,
                    far_index: UNSET,
                });
                edges.len() - 1
            });
            edges[slot].transitions.push(transition);
        };

        if let Some(net_id) = net {
            let net_data = circuit.data().net(net_id);

            for &(sc_id, pin_id) in net_data.subcircuit_pins() {
                let sc = circuit.subcircuit(sc_id);
                Self::subcircuit_pin_transitions(sc_id, sc, pin_id, ctx, &mut push);
            }

            for &(device_id, terminal_id) in net_data.terminals() {
                let device = circuit.device(device_id);
                if !ctx.device_filter.passes(device) {
                    continue;
                }
                let class = device.class().data();
                let rank = ctx.device_ranks.rank(device);
                let id1 = class.normalize_terminal_id(terminal_id);
                for t in 0..class.terminal_count() {
                    if t == terminal_id {
                        // no self loops through the attaching terminal
                        continue;
                    }
                    push(
                        device.data().net_for_terminal(t),
                        Transition {
                            via: TransitionVia::Device {
                                device: device_id,
                                rank,
                            },
                            id1,
                            id2: class.normalize_terminal_id(t),
                        },
                    );
                }
            }
        }

        for edge in &mut edges {
            edge.transitions.sort_unstable();
        }
        edges.sort_by(|a, b| {
            a.transitions
                .cmp(&b.transitions)
                .then_with(|| a.far_net.cmp(&b.far_net))
        });

        let pin_key = match net {
            Some(net_id) => {
                let net_data = circuit.data().net(net_id);
                PinKey {
                    has_net: true,
                    pin_count: net_data.pins().len(),
                    first_pin_name: net_data
                        .pins()
                        .first()
                        .and_then(|&p| circuit.data().pin(p).name())
                        .filter(|n| !n.is_empty())
                        .map(str::to_string),
                }
            }
            None => PinKey {
                has_net: false,
                pin_count: 0,
                first_pin_name: None,
            },
        };

        NetGraphNode {
            net,
            other_index: UNSET,
            edges,
            pin_key,
        }
    }

    fn subcircuit_pin_transitions<'nl>(
        sc_id: SubCircuitId,
        sc: SubCircuitRef<'nl>,
        pin_id: PinId,
        ctx: &mut GraphBuildContext<'nl, '_>,
        push: &mut impl FnMut(Option<NetId>, Transition),
    ) {
        let target = sc.target();
        let category = ctx.circuit_categorizer.cat_for_subcircuit(sc);

        if target.net_for_pin(pin_id).is_none() {
            // The callee is abstract at this pin. A transition to the dummy
            // keeps the net distinguishable from one without the connection.
            push(
                None,
                Transition {
                    via: TransitionVia::SubCircuit {
                        subcircuit: sc_id,
                        category,
                    },
                    id1: pin_id.as_usize(),
                    id2: pin_id.as_usize(),
                },
            );
            return;
        }

        let Some(cm) = ctx.circuit_map.get(&target) else {
            // The callee circuit has no counterpart. Single-pin (via-like)
            // callees still mark the net through the dummy; anything else is
            // dropped here and surfaces as a subcircuit mismatch later.
            if target.pin_count() == 1 {
                push(
                    None,
                    Transition {
                        via: TransitionVia::SubCircuit {
                            subcircuit: sc_id,
                            category,
                        },
                        id1: pin_id.as_usize(),
                        id2: pin_id.as_usize(),
                    },
                );
            }
            return;
        };

        let Some(other_pin) = cm.other_pin_for_this(pin_id) else {
            return;
        };
        let other = cm.other();
        let pin_norm = ctx.pin_mapper.normalize_pin_id(other, other_pin);
        let pin_count = other.pin_count();
        if pin_count == 0 {
            return;
        }

        // The attached pin first, then a bounded window of further mapped
        // pins in cyclic order. Pins equivalent to the attached one carry no
        // information and unmapped pins cannot be translated; neither
        // consumes the window.
        let mut pids: Vec<PinId> = Vec::with_capacity(TAKE_ADDITIONAL_PINS + 1);
        pids.push(pin_norm);
        let mut take_additional = TAKE_ADDITIONAL_PINS;
        let mut n = 0;
        while n < take_additional {
            let add = PinId::from((pin_norm.as_usize() + n + 1) % pin_count);
            if add == pin_norm {
                break;
            }
            if cm.this_pin_for_other(add).is_some()
                && ctx.pin_mapper.normalize_pin_id(other, add) != pin_norm
            {
                pids.push(add);
            } else {
                take_additional += 1;
            }
            n += 1;
        }

        for &pin2 in &pids {
            let Some(this_pin2) = cm.this_pin_for_other(pin2) else {
                continue;
            };
            if this_pin2 == pin_id {
                // no transition back to the attaching pin itself
                continue;
            }
            push(
                sc.net_for_pin(this_pin2).map(|net| net.id()),
                Transition {
                    via: TransitionVia::SubCircuit {
                        subcircuit: sc_id,
                        category,
                    },
                    id1: pin_norm.as_usize(),
                    id2: ctx.pin_mapper.normalize_pin_id(other, pin2).as_usize(),
                },
            );
        }
    }

    pub(crate) fn has_other(&self) -> bool {
        self.other_index != UNSET
    }

    /// Finds the contiguous run of edges whose transition list equals
    /// `transitions`. Edges are sorted, so the run is found by bisection.
    pub(crate) fn find_edge_run(&self, transitions: &[Transition]) -> Option<(usize, usize)> {
        let start = self
            .edges
            .partition_point(|e| e.transitions.as_slice() < transitions);
        if start == self.edges.len() || self.edges[start].transitions.as_slice() != transitions {
            return None;
        }
        let mut end = start + 1;
        while end < self.edges.len() && self.edges[end].transitions.as_slice() == transitions {
            end += 1;
        }
        Some((start, end))
    }
}

/// Canonical node ordering: lexicographic over the edge transition lists;
/// nodes without edges fall back to their pin key.
pub(crate) fn cmp_nodes(a: &NetGraphNode, b: &NetGraphNode) -> Ordering {
    let by_edges = a.edges.len().cmp(&b.edges.len()).then_with(|| {
        for (ea, eb) in a.edges.iter().zip(&b.edges) {
            match ea.transitions.cmp(&eb.transitions) {
                Ordering::Equal => continue,
                other => return other,
            }
        }
        Ordering::Equal
    });
    if by_edges != Ordering::Equal {
        return by_edges;
    }
    if a.edges.is_empty() {
        a.pin_key.cmp(&b.pin_key)
    } else {
        Ordering::Equal
    }
}

pub(crate) fn nodes_equal(a: &NetGraphNode, b: &NetGraphNode) -> bool {
    cmp_nodes(a, b) == Ordering::Equal
}

/// Everything node construction needs besides the net itself.
pub(crate) struct GraphBuildContext<'nl, 'a> {
    pub(crate) circuit_categorizer: &'a mut CircuitCategorizer<'nl>,
    pub(crate) device_filter: &'a DeviceFilter,
    pub(crate) circuit_map: &'a AHashMap<CircuitRef<'nl>, CircuitMapper<'nl>>,
    pub(crate) pin_mapper: &'a CircuitPinMapper<'nl>,
    pub(crate) device_ranks: &'a DeviceRanks<'nl>,
}

/// The net graph of one circuit.
///
/// Index 0 is the dummy node for the null net. Nets that contribute neither
/// edges nor pins are left out; every remaining net maps to exactly one
/// node index.
pub(crate) struct NetGraph<'nl> {
    pub(crate) circuit: CircuitRef<'nl>,
    pub(crate) nodes: Vec<NetGraphNode>,
    net_index: AHashMap<NetId, usize>,
}

impl<'nl> NetGraph<'nl> {
    pub(crate) fn build(circuit: CircuitRef<'nl>, ctx: &mut GraphBuildContext<'nl, '_>) -> Self {
        tracing::debug!(circuit = circuit.name(), "building net graph");

        let mut nodes = vec![NetGraphNode::for_net(circuit, None, ctx)];
        for net_id in circuit.data().net_ids() {
            let node = NetGraphNode::for_net(circuit, Some(net_id), ctx);
            if !node.edges.is_empty() || !circuit.data().net(net_id).pins().is_empty() {
                nodes.push(node);
            }
        }

        nodes.sort_by(|a, b| cmp_nodes(a, b));
        debug_assert!(nodes[0].net.is_none(), "dummy node must sort first");

        let mut graph = NetGraph {
            circuit,
            nodes,
            net_index: AHashMap::new(),
        };
        graph.apply_net_index();
        graph
    }

    /// Resolves every edge's far net into a node index and brings edges into
    /// their final (transitions, far index) order.
    fn apply_net_index(&mut self) {
        self.net_index = self
            .nodes
            .iter()
            .enumerate()
            .filter_map(|(i, n)| n.net.map(|net| (net, i)))
            .collect();

        for node in &mut self.nodes {
            for edge in &mut node.edges {
                edge.far_index = match edge.far_net {
                    None => 0,
                    Some(net) => *self
                        .net_index
                        .get(&net)
                        .expect("edge references a net without a graph node"),
                };
            }
            node.edges.sort_by(|a, b| {
                a.transitions
                    .cmp(&b.transitions)
                    .then_with(|| a.far_index.cmp(&b.far_index))
            });
        }
    }

    pub(crate) fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub(crate) fn node(&self, index: usize) -> &NetGraphNode {
        &self.nodes[index]
    }

    /// The node index of a net; `None` resolves to the dummy node.
    pub(crate) fn node_index_for_net(&self, net: Option<NetId>) -> usize {
        match net {
            None => 0,
            Some(net) => *self.net_index.get(&net).expect("net has no graph node"),
        }
    }

    /// Establishes this[index] ≙ other[other_index].
    pub(crate) fn identify(&mut self, index: usize, other_index: usize) {
        self.nodes[index].other_index = other_index;
    }

    pub(crate) fn unidentify(&mut self, index: usize) {
        self.nodes[index].other_index = UNSET;
    }

    pub(crate) fn net_ref(&self, index: usize) -> Option<NetRef<'nl>> {
        self.nodes[index].net.map(|net| self.circuit.net(net))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::categorize::{CircuitCategorizer, DeviceCategorizer};
    use crate::circuit_map::CircuitMapper;
    use crate::device_filter::DeviceFilter;
    use crate::pin_map::CircuitPinMapper;
    use lvs_netlist::{DeviceClass, Netlist};

    // A --R1-- M --R2-- B with pins on A and B.
    fn series_resistors(swap_r1_terminals: bool) -> Netlist {
        let mut nl = Netlist::new();
        let res = nl.add_device_class(DeviceClass::resistor("RES"));
        let c = nl.add_circuit("DIV");
        let pa = nl.add_pin(c, Some("A"));
        let pb = nl.add_pin(c, Some("B"));
        let na = nl.add_net(c, Some("A"));
        let nm = nl.add_net(c, Some("M"));
        let nb = nl.add_net(c, Some("B"));
        nl.connect_pin(c, pa, na).unwrap();
        nl.connect_pin(c, pb, nb).unwrap();
        let r1 = nl.add_device(c, Some("R1"), res, &[100.0]);
        let r2 = nl.add_device(c, Some("R2"), res, &[100.0]);
        if swap_r1_terminals {
            nl.connect_terminal(c, r1, 1, na).unwrap();
            nl.connect_terminal(c, r1, 0, nm).unwrap();
        } else {
            nl.connect_terminal(c, r1, 0, na).unwrap();
            nl.connect_terminal(c, r1, 1, nm).unwrap();
        }
        nl.connect_terminal(c, r2, 0, nm).unwrap();
        nl.connect_terminal(c, r2, 1, nb).unwrap();
        nl
    }

    fn build<'nl>(nl: &'nl Netlist, filter: DeviceFilter) -> NetGraph<'nl> {
        let c = nl.circuit_ref_by_name("DIV").unwrap();
        let mut device_cat = DeviceCategorizer::new();
        let mut circuit_cat = CircuitCategorizer::new();
        let circuit_map: AHashMap<CircuitRef<'_>, CircuitMapper<'_>> = AHashMap::new();
        let pin_mapper = CircuitPinMapper::new();
        let ranks = DeviceRanks::build(c, c, &mut device_cat);
        let mut ctx = GraphBuildContext {
            circuit_categorizer: &mut circuit_cat,
            device_filter: &filter,
            circuit_map: &circuit_map,
            pin_mapper: &pin_mapper,
            device_ranks: &ranks,
        };
        NetGraph::build(c, &mut ctx)
    }

    #[test]
    fn dummy_node_sorts_first() {
        let nl = series_resistors(false);
        let g = build(&nl, DeviceFilter::new(-1.0, -1.0));
        assert!(g.node(0).net.is_none());
        assert!(!g.node(0).has_other());
        assert_eq!(g.node_index_for_net(None), 0);
    }

    #[test]
    fn far_indices_are_resolved() {
        let nl = series_resistors(false);
        let g = build(&nl, DeviceFilter::new(-1.0, -1.0));
        for i in 0..g.node_count() {
            for edge in &g.node(i).edges {
                assert!(edge.far_index < g.node_count());
            }
        }
    }

    #[test]
    fn edges_merge_by_far_net() {
        let nl = series_resistors(false);
        let g = build(&nl, DeviceFilter::new(-1.0, -1.0));
        let c = nl.circuit_ref_by_name("DIV").unwrap();
        let m = c.net_by_name("M").unwrap();
        let node = g.node(g.node_index_for_net(Some(m.id())));
        // one edge towards A, one towards B
        assert_eq!(node.edges.len(), 2);
        for edge in &node.edges {
            assert_eq!(edge.transitions.len(), 1);
        }
    }

    #[test]
    fn swapped_resistor_terminals_produce_equal_nodes() {
        let plain = series_resistors(false);
        let swapped = series_resistors(true);
        let gp = build(&plain, DeviceFilter::new(-1.0, -1.0));
        let gs = build(&swapped, DeviceFilter::new(-1.0, -1.0));
        for name in ["A", "M", "B"] {
            let np = gp.node(gp.node_index_for_net(Some(
                plain
                    .circuit_ref_by_name("DIV")
                    .unwrap()
                    .net_by_name(name)
                    .unwrap()
                    .id(),
            )));
            let ns = gs.node(gs.node_index_for_net(Some(
                swapped
                    .circuit_ref_by_name("DIV")
                    .unwrap()
                    .net_by_name(name)
                    .unwrap()
                    .id(),
            )));
            assert!(nodes_equal(np, ns), "nodes for net {} differ", name);
        }
    }

    #[test]
    fn filtered_devices_leave_no_edges() {
        let nl = series_resistors(false);
        // both resistors exceed the threshold and are skipped
        let g = build(&nl, DeviceFilter::new(-1.0, 10.0));
        // M has neither edges nor pins and is dropped; A and B keep their pins
        assert_eq!(g.node_count(), 3);
        for i in 1..g.node_count() {
            assert!(g.node(i).edges.is_empty());
        }
    }

    #[test]
    fn device_transitions_sort_before_subcircuit_transitions() {
        let d = Transition {
            via: TransitionVia::Device {
                device: DeviceId::from(0usize),
                rank: 9,
            },
            id1: 7,
            id2: 7,
        };
        let s = Transition {
            via: TransitionVia::SubCircuit {
                subcircuit: SubCircuitId::from(0usize),
                category: 0,
            },
            id1: 0,
            id2: 0,
        };
        assert!(d < s);
    }

    #[test]
    fn transition_identity_ignores_the_instance() {
        let a = Transition {
            via: TransitionVia::Device {
                device: DeviceId::from(0usize),
                rank: 3,
            },
            id1: 0,
            id2: 1,
        };
        let b = Transition {
            via: TransitionVia::Device {
                device: DeviceId::from(17usize),
                rank: 3,
            },
            id1: 0,
            id2: 1,
        };
        assert_eq!(a, b);
        assert_eq!(a.cmp(&b), Ordering::Equal);
    }

    #[test]
    fn device_ranks_split_on_parameters() {
        let mut nl = Netlist::new();
        let res = nl.add_device_class(DeviceClass::resistor("RES"));
        let c = nl.add_circuit("C");
        let r1 = nl.add_device(c, Some("R1"), res, &[100.0]);
        let r2 = nl.add_device(c, Some("R2"), res, &[100.0]);
        let r3 = nl.add_device(c, Some("R3"), res, &[220.0]);
        let _ = (r1, r2, r3);

        let cr = nl.circuits().next().unwrap();
        let mut cat = DeviceCategorizer::new();
        let ranks = DeviceRanks::build(cr, cr, &mut cat);
        let rank_of = |name: &str| ranks.rank(cr.device_by_name(name).unwrap());
        assert_eq!(rank_of("R1"), rank_of("R2"));
        assert_ne!(rank_of("R1"), rank_of("R3"));
    }
}
