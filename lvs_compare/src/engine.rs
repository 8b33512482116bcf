//! The backtracking net-pairing engine.
//!
//! Starting from seed pairings (the dummy nodes and user-declared net
//! identities), the engine repeatedly derives new pairings from already
//! paired nodes and from the globally sorted set of unpaired nodes, until a
//! fixed point. Ambiguous groups — runs of structurally identical nodes —
//! are resolved by speculatively pairing candidates and checking whether
//! the pairing propagates without contradiction; speculative work is
//! recorded in a [`TentativeMapping`] and rolled back before the next
//! candidate is tried.
//!
//! Two complexity bounds keep the search tractable: `max_depth` limits how
//! many graph jumps a derivation may take, and `max_n_branch` caps the
//! product of ambiguity-group sizes along a speculation chain. A branch
//! that exceeds either bound reports [`UNRESOLVED`] and is treated as a
//! mismatch.

use std::cmp::Ordering;

use ahash::AHashSet;
use itertools::Itertools;
use tracing::trace;

use crate::equiv::EquivalenceClusters;
use crate::graph::{cmp_nodes, nodes_equal, NetGraph, Transition};
use crate::logger::CompareLogger;

/// Sentinel for a branch that could not be decided within the bounds.
pub(crate) const UNRESOLVED: usize = usize::MAX;

/// Undo journal for speculative pairings.
///
/// Every pairing recorded here must be reverted before the owning scope is
/// left, on success and failure alike; [`Self::unroll`] consumes the
/// journal to enforce single rollback.
pub(crate) struct TentativeMapping {
    recorded: Vec<(usize, usize)>,
}

impl TentativeMapping {
    pub(crate) fn new() -> Self {
        TentativeMapping {
            recorded: Vec::new(),
        }
    }

    fn record(&mut self, n1: usize, n2: usize) {
        self.recorded.push((n1, n2));
    }

    /// Reverts every recorded pairing on both graphs.
    pub(crate) fn unroll(self, g1: &mut NetGraph<'_>, g2: &mut NetGraph<'_>) {
        for &(n1, n2) in self.recorded.iter().rev() {
            g1.unidentify(n1);
            g2.unidentify(n2);
        }
    }
}

/// A run of structurally identical nodes in the two sorted candidate sets.
struct NodeRange {
    num: usize,
    n1: usize,
    nn1: usize,
    n2: usize,
    nn2: usize,
}

pub(crate) struct PairingEngine<'nl, 'e> {
    pub(crate) g1: &'e mut NetGraph<'nl>,
    pub(crate) g2: &'e mut NetGraph<'nl>,
    pub(crate) max_depth: usize,
    pub(crate) max_n_branch: usize,
    pub(crate) logger: &'e mut dyn CompareLogger,
}

impl<'nl, 'e> PairingEngine<'nl, 'e> {
    /// Runs both passes to their fixed points and reports remaining
    /// unpaired nodes. Returns whether every node found a partner.
    pub(crate) fn run(&mut self) -> bool {
        let mut good = true;

        for pass in 0..2 {
            let with_ambiguous = pass > 0;
            if with_ambiguous {
                trace!("including ambiguous nodes now");
            }

            good = true;
            loop {
                let mut new_identities = 0;

                // deduce from every pairing established so far
                for i in 0..self.g1.node_count() {
                    let n = self.g1.node(i);
                    if n.has_other() && n.net.is_some() {
                        let ni = self.derive_node_identities(i, 0, 1, None, with_ambiguous);
                        if ni > 0 && ni != UNRESOLVED {
                            new_identities += ni;
                        }
                    }
                }

                // deduce from the topology of everything still unpaired
                let mut nodes: Vec<usize> = (0..self.g1.node_count())
                    .filter(|&i| {
                        let n = self.g1.node(i);
                        !n.has_other() && n.net.is_some()
                    })
                    .collect();
                let mut other_nodes: Vec<usize> = (0..self.g2.node_count())
                    .filter(|&i| {
                        let n = self.g2.node(i);
                        !n.has_other() && n.net.is_some()
                    })
                    .collect();

                if nodes.is_empty() || other_nodes.is_empty() {
                    if !(nodes.is_empty() && other_nodes.is_empty()) {
                        good = false;
                    }
                    break;
                }

                nodes.sort_by(|&x, &y| cmp_nodes(self.g1.node(x), self.g1.node(y)));
                other_nodes.sort_by(|&x, &y| cmp_nodes(self.g2.node(x), self.g2.node(y)));

                let ni =
                    self.derive_from_node_set(&nodes, &other_nodes, 0, 1, None, with_ambiguous);
                if ni > 0 && ni != UNRESOLVED {
                    new_identities += ni;
                }

                if new_identities == 0 {
                    good = false;
                    break;
                }
            }
        }

        for i in 0..self.g1.node_count() {
            if !self.g1.node(i).has_other() {
                let net = self.g1.net_ref(i);
                self.logger.net_mismatch(net, None);
            }
        }
        for i in 0..self.g2.node_count() {
            if !self.g2.node(i).has_other() {
                let net = self.g2.net_ref(i);
                self.logger.net_mismatch(None, net);
            }
        }

        good
    }

    fn map_pair(
        g1: &mut NetGraph<'_>,
        n1: usize,
        g2: &mut NetGraph<'_>,
        n2: usize,
        tentative: Option<&mut TentativeMapping>,
    ) {
        g1.identify(n1, n2);
        g2.identify(n2, n1);
        if let Some(t) = tentative {
            t.record(n1, n2);
        }
    }

    /// Reports a committed pairing: a clean match when the node contents
    /// agree, a net mismatch when the pairing was forced.
    fn emit_pairing(&mut self, ni: usize, oni: usize) {
        let a = self.g1.net_ref(ni).expect("paired node has a net");
        let b = self.g2.net_ref(oni).expect("paired node has a net");
        if nodes_equal(self.g1.node(ni), self.g2.node(oni)) {
            self.logger.match_nets(a, b);
        } else {
            self.logger.net_mismatch(Some(a), Some(b));
        }
    }

    /// Derives pairings from the already paired node `net_index`.
    ///
    /// Returns the number of new pairings, or [`UNRESOLVED`] when a
    /// speculative derivation ran into a contradiction or a bound.
    fn derive_node_identities(
        &mut self,
        net_index: usize,
        depth: usize,
        n_branch: usize,
        mut tentative: Option<&mut TentativeMapping>,
        with_ambiguous: bool,
    ) -> usize {
        let other_index = self.g1.node(net_index).other_index;

        if tentative.is_none() {
            trace!(
                depth,
                "deducing from pair: {} vs {}",
                self.g1
                    .net_ref(net_index)
                    .map_or_else(|| "(null)".to_string(), |n| n.expanded_name()),
                self.g2
                    .net_ref(other_index)
                    .map_or_else(|| "(null)".to_string(), |n| n.expanded_name()),
            );
        }

        let mut new_nodes = 0;

        // group this node's edges into runs with identical transition lists
        let runs: Vec<(Vec<Transition>, Vec<usize>)> = {
            let node = self.g1.node(net_index);
            let grouped = node.edges.iter().chunk_by(|e| e.transitions.clone());
            let mut runs = Vec::new();
            for (transitions, edges) in &grouped {
                runs.push((transitions, edges.map(|e| e.far_index).collect()));
            }
            runs
        };

        for (transitions, mut nodes) in runs {
            // candidates behind the identically keyed edges of the partner
            // node; capped at two, any more counts as heavily ambiguous
            let mut other_nodes: Vec<usize> = {
                let other = self.g2.node(other_index);
                match other.find_edge_run(&transitions) {
                    Some((s, e)) => other.edges[s..e.min(s + 2)]
                        .iter()
                        .map(|ed| ed.far_index)
                        .collect(),
                    None => Vec::new(),
                }
            };

            nodes.sort_by(|&x, &y| cmp_nodes(self.g1.node(x), self.g1.node(y)));
            other_nodes.sort_by(|&x, &y| cmp_nodes(self.g2.node(x), self.g2.node(y)));

            if tentative.is_some() {
                // a speculative branch only survives an exact structural
                // correspondence of the candidate sets
                if nodes.len() != other_nodes.len() {
                    return UNRESOLVED;
                }
                if nodes.len() > 1 {
                    for (&x, &y) in nodes.iter().zip(&other_nodes) {
                        if !nodes_equal(self.g1.node(x), self.g2.node(y)) {
                            return UNRESOLVED;
                        }
                    }
                }
            }

            let bt = self.derive_from_node_set(
                &nodes,
                &other_nodes,
                depth,
                n_branch,
                tentative.as_deref_mut(),
                with_ambiguous,
            );
            if bt == UNRESOLVED {
                if tentative.is_some() {
                    return UNRESOLVED;
                }
            } else {
                new_nodes += bt;
            }
        }

        new_nodes
    }

    /// Pairs up two sorted candidate sets, resolving ambiguous runs through
    /// tentative trials when `with_ambiguous` allows it.
    fn derive_from_node_set(
        &mut self,
        nodes: &[usize],
        other_nodes: &[usize],
        depth: usize,
        n_branch: usize,
        mut tentative: Option<&mut TentativeMapping>,
        with_ambiguous: bool,
    ) -> usize {
        if depth > self.max_depth {
            trace!(depth, "maximum depth exhausted");
            return UNRESOLVED;
        }

        let mut new_nodes = 0;

        if nodes.len() == 1 && other_nodes.len() == 1 {
            let ni = nodes[0];
            let oni = other_nodes[0];
            if !self.g1.node(ni).has_other() && !self.g2.node(oni).has_other() {
                // the only candidate: take it, even if the contents differ,
                // so the pairing keeps propagating
                Self::map_pair(self.g1, ni, self.g2, oni, tentative.as_deref_mut());
                if tentative.is_none() {
                    self.emit_pairing(ni, oni);
                }
                let bt = self.derive_node_identities(
                    ni,
                    depth + 1,
                    n_branch,
                    tentative.as_deref_mut(),
                    with_ambiguous,
                );
                if bt != UNRESOLVED {
                    new_nodes += bt;
                } else if tentative.is_some() {
                    return bt;
                }
                new_nodes += 1;
            } else if self.g1.node(ni).has_other() {
                if self.g1.node(ni).other_index != oni {
                    // contradicts an established pairing
                    return UNRESOLVED;
                }
            } else {
                // one side is already taken
                return UNRESOLVED;
            }
            return new_nodes;
        }

        // walk both sorted sets in lockstep and group maximal runs of
        // structurally equal, unassigned nodes
        let mut ranges: Vec<NodeRange> = Vec::new();
        let mut i1 = 0;
        let mut i2 = 0;
        while i1 < nodes.len() && i2 < other_nodes.len() {
            if self.g1.node(nodes[i1]).has_other() {
                i1 += 1;
                continue;
            }
            if self.g2.node(other_nodes[i2]).has_other() {
                i2 += 1;
                continue;
            }
            match cmp_nodes(self.g1.node(nodes[i1]), self.g2.node(other_nodes[i2])) {
                Ordering::Less => {
                    i1 += 1;
                    continue;
                }
                Ordering::Greater => {
                    i2 += 1;
                    continue;
                }
                Ordering::Equal => {}
            }

            let mut k1 = i1 + 1;
            let mut k2 = i2 + 1;
            let mut num = 1;
            while k1 < nodes.len() && k2 < other_nodes.len() {
                if self.g1.node(nodes[k1]).has_other() {
                    k1 += 1;
                } else if self.g2.node(other_nodes[k2]).has_other() {
                    k2 += 1;
                } else if !nodes_equal(self.g1.node(nodes[k1]), self.g1.node(nodes[i1]))
                    || !nodes_equal(self.g2.node(other_nodes[k2]), self.g2.node(other_nodes[i2]))
                {
                    break;
                } else {
                    num += 1;
                    k1 += 1;
                    k2 += 1;
                }
            }

            if num == 1 || with_ambiguous {
                ranges.push(NodeRange {
                    num,
                    n1: i1,
                    nn1: k1,
                    n2: i2,
                    nn2: k2,
                });
            }
            if num > 1 && tentative.is_some() && !with_ambiguous {
                // ambiguity cannot support a speculative branch yet
                return UNRESOLVED;
            }

            i1 = k1;
            i2 = k2;
        }

        if with_ambiguous {
            // small groups first: resolving them anchors the bigger ones
            ranges.sort_by_key(|r| r.num);
        }

        for range in &mut ranges {
            // earlier ranges may have assigned nodes of this one; skip past
            // them and recount
            while range.n1 != range.nn1 && range.n2 != range.nn2 {
                if self.g1.node(nodes[range.n1]).has_other() {
                    range.n1 += 1;
                } else if self.g2.node(other_nodes[range.n2]).has_other() {
                    range.n2 += 1;
                } else {
                    break;
                }
            }
            range.num = 0;
            let mut j1 = range.n1;
            let mut j2 = range.n2;
            while j1 < range.nn1 && j2 < range.nn2 {
                if self.g1.node(nodes[j1]).has_other() {
                    j1 += 1;
                } else if self.g2.node(other_nodes[j2]).has_other() {
                    j2 += 1;
                } else {
                    range.num += 1;
                    j1 += 1;
                    j2 += 1;
                }
            }

            if range.num < 1 {
                // the whole range got assigned meanwhile
            } else if range.num == 1 {
                let ni = nodes[range.n1];
                let oni = other_nodes[range.n2];
                if !self.g1.node(ni).has_other() && !self.g2.node(oni).has_other() {
                    Self::map_pair(self.g1, ni, self.g2, oni, tentative.as_deref_mut());
                    if tentative.is_none() {
                        self.emit_pairing(ni, oni);
                    }
                    let bt = self.derive_node_identities(
                        ni,
                        depth + 1,
                        n_branch,
                        tentative.as_deref_mut(),
                        with_ambiguous,
                    );
                    if bt != UNRESOLVED {
                        new_nodes += bt;
                        new_nodes += 1;
                    } else if tentative.is_some() {
                        return UNRESOLVED;
                    }
                } else if self.g1.node(ni).has_other() {
                    if self.g1.node(ni).other_index != oni {
                        return UNRESOLVED;
                    }
                } else {
                    return UNRESOLVED;
                }
            } else if range.num * n_branch > self.max_n_branch {
                trace!(
                    "complexity bound exceeded ({} * {} > {})",
                    range.num,
                    n_branch,
                    self.max_n_branch
                );
                return UNRESOLVED;
            } else {
                trace!("analyzing ambiguity group with {} members", range.num);

                let mut pairs: Vec<(usize, usize)> = Vec::new();
                let mut equivalent_others = EquivalenceClusters::new();
                let mut seen: AHashSet<usize> = AHashSet::new();

                for j1 in range.n1..range.nn1 {
                    let ni = nodes[j1];
                    if self.g1.node(ni).has_other() {
                        continue;
                    }
                    let mut any = false;

                    for j2 in range.n2..range.nn2 {
                        let oni = other_nodes[j2];
                        if self.g2.node(oni).has_other() || seen.contains(&oni) {
                            continue;
                        }

                        let mut probe = TentativeMapping::new();
                        Self::map_pair(self.g1, ni, self.g2, oni, Some(&mut probe));
                        trace!("trying pair in tentative mode");
                        let bt = self.derive_node_identities(
                            ni,
                            depth + 1,
                            range.num * n_branch,
                            Some(&mut probe),
                            with_ambiguous,
                        );
                        probe.unroll(self.g1, self.g2);

                        if bt != UNRESOLVED {
                            if any {
                                // a second workable partner: the earlier
                                // pairing is ambiguous
                                equivalent_others
                                    .same(oni, pairs.last().expect("pair exists").1);
                            } else {
                                new_nodes += bt + 1;
                                pairs.push((ni, oni));
                                seen.insert(oni);
                                any = true;
                            }
                        }
                    }

                    if !any && tentative.is_some() {
                        return UNRESOLVED;
                    }
                }

                if tentative.is_none() {
                    for &(ni, oni) in &pairs {
                        Self::map_pair(self.g1, ni, self.g2, oni, None);
                        let a = self.g1.net_ref(ni).expect("paired node has a net");
                        let b = self.g2.net_ref(oni).expect("paired node has a net");
                        if equivalent_others.contains(oni) {
                            self.logger.match_ambiguous_nets(a, b);
                        } else {
                            self.logger.match_nets(a, b);
                        }
                    }
                    for &(ni, _) in &pairs {
                        // the trial for this pair succeeded, so the committed
                        // re-derivation cannot fail
                        let _ = self.derive_node_identities(
                            ni,
                            depth + 1,
                            range.num * n_branch,
                            None,
                            with_ambiguous,
                        );
                    }
                } else {
                    for &(ni, oni) in &pairs {
                        Self::map_pair(self.g1, ni, self.g2, oni, tentative.as_deref_mut());
                    }
                }
            }
        }

        new_nodes
    }
}
