//! Cycle enumeration over the waits-for graph (spec.md §4.4).
//!
//! A direct translation of the teacher's three-color DFS style into a reusable,
//! stateless-between-calls detector, grounded on `util.py`'s `DetectCycles` in
//! `original_source/` (WHITE/GRAY/BLACK node coloring, a parent chain used to
//! reconstruct the cycle when a GRAY neighbor is hit).

use std::collections::HashMap;

use crate::model::TxnId;

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
    White,
    Gray,
    Black,
}

/// DFS-based cycle enumerator for a directed graph keyed by transaction id.
///
/// Internal state is cleared at the start of every `find_cycles` call, so one
/// detector instance can be reused across ticks without carrying stale state.
#[derive(Default)]
pub struct CycleDetector {
    colors: HashMap<TxnId, Color>,
    path: Vec<TxnId>,
    cycles: Vec<Vec<TxnId>>,
}

impl CycleDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enumerate all cycles in `graph` (adjacency list, `A -> B` meaning A waits for B).
    /// Nodes not present as keys but referenced as neighbors are treated as isolated
    /// (terminal transactions contribute no outgoing edges; spec.md §4.3).
    pub fn find_cycles(&mut self, graph: &HashMap<TxnId, Vec<TxnId>>) -> Vec<Vec<TxnId>> {
        self.colors.clear();
        self.path.clear();
        self.cycles.clear();

        for node in graph.keys() {
            self.colors.insert(node.clone(), Color::White);
        }

        let nodes: Vec<TxnId> = graph.keys().cloned().collect();
        for node in nodes {
            if self.colors.get(&node).copied().unwrap_or(Color::White) == Color::White {
                self.visit(graph, &node);
            }
        }

        std::mem::take(&mut self.cycles)
    }

    fn visit(&mut self, graph: &HashMap<TxnId, Vec<TxnId>>, node: &TxnId) {
        self.colors.insert(node.clone(), Color::Gray);
        self.path.push(node.clone());

        if let Some(neighbors) = graph.get(node) {
            for neighbor in neighbors {
                match self.colors.get(neighbor).copied().unwrap_or(Color::White) {
                    Color::White => self.visit(graph, neighbor),
                    Color::Gray => {
                        let cycle = self.extract_cycle(neighbor);
                        self.cycles.push(cycle);
                    }
                    Color::Black => {}
                }
            }
        }

        self.colors.insert(node.clone(), Color::Black);
        self.path.pop();
    }

    /// Build the cycle from `back_to` (the GRAY node we hit) to the current path head.
    fn extract_cycle(&self, back_to: &TxnId) -> Vec<TxnId> {
        let mut cycle = vec![back_to.clone()];
        for n in self.path.iter().rev() {
            if n == back_to {
                break;
            }
            cycle.push(n.clone());
        }
        cycle
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn graph(pairs: &[(&str, &str)]) -> HashMap<TxnId, Vec<TxnId>> {
        let mut g: HashMap<TxnId, Vec<TxnId>> = HashMap::new();
        for (a, b) in pairs {
            g.entry(a.to_string()).or_default().push(b.to_string());
            g.entry(b.to_string()).or_default();
        }
        g
    }

    #[test]
    fn no_cycle_in_a_dag() {
        let g = graph(&[("T1", "T2"), ("T2", "T3")]);
        let mut d = CycleDetector::new();
        assert!(d.find_cycles(&g).is_empty());
    }

    #[test]
    fn finds_simple_cycle() {
        let g = graph(&[("T1", "T2"), ("T2", "T1")]);
        let mut d = CycleDetector::new();
        let cycles = d.find_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 2);
    }

    #[test]
    fn finds_four_way_cycle() {
        let g = graph(&[("T1", "T2"), ("T2", "T3"), ("T3", "T4"), ("T4", "T1")]);
        let mut d = CycleDetector::new();
        let cycles = d.find_cycles(&g);
        assert_eq!(cycles.len(), 1);
        assert_eq!(cycles[0].len(), 4);
    }

    #[test]
    fn detector_is_stateless_across_calls() {
        let mut d = CycleDetector::new();
        let with_cycle = graph(&[("T1", "T2"), ("T2", "T1")]);
        assert_eq!(d.find_cycles(&with_cycle).len(), 1);
        let without = graph(&[("T1", "T2")]);
        assert!(d.find_cycles(&without).is_empty());
    }
}
