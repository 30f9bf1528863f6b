//! Provenance views: how an entity was derived.
//!
//! Records are stored flat (one per derivation step). This module rebuilds
//! them into:
//!
//! - a shallow tree ([`build_tree`]): each record plus the records of the
//!   entities it was directly derived from, one hop only
//! - a directed graph ([`ProvenanceGraph`]) for transitive ancestry
//! - a chronological timeline ([`validation_timeline`])

use std::collections::{HashMap, HashSet, VecDeque};

use chrono::{DateTime, Utc};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};

use crate::entity::{Entity, EntityId, Objection, ProvenanceRecord};
use crate::store::{EntityStore, StoreResult};

// ---------------------------------------------------------------------------
// One-hop tree
// ---------------------------------------------------------------------------

/// A provenance record with the records of its direct sources attached.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceNode {
    pub id: EntityId,
    pub entity_type: String,
    pub entity_id: EntityId,
    pub generated_by: Option<EntityId>,
    pub derived_from: Vec<EntityId>,
    pub attributed_to: String,
    pub timestamp: DateTime<Utc>,
    /// First record found for each `derived_from` id. Not expanded further.
    pub children: Vec<ProvenanceRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProvenanceTree {
    /// Ids of nodes with no `derived_from` sources.
    pub roots: Vec<EntityId>,
    pub nodes: Vec<ProvenanceNode>,
}

/// Build the one-hop tree for `records`, resolving sources among `parents`.
///
/// A source id with no matching parent record contributes no child.
pub fn build_tree(records: &[ProvenanceRecord], parents: &[ProvenanceRecord]) -> ProvenanceTree {
    let mut tree = ProvenanceTree::default();
    for record in records {
        let children = record
            .was_derived_from
            .iter()
            .filter_map(|source| parents.iter().find(|p| &p.entity_id == source))
            .cloned()
            .collect();
        if record.was_derived_from.is_empty() {
            tree.roots.push(record.id.clone());
        }
        tree.nodes.push(ProvenanceNode {
            id: record.id.clone(),
            entity_type: record.entity_type.clone(),
            entity_id: record.entity_id.clone(),
            generated_by: record.was_generated_by.clone(),
            derived_from: record.was_derived_from.clone(),
            attributed_to: record.was_attributed_to.clone(),
            timestamp: record.generated_at,
            children,
        });
    }
    tree
}

// ---------------------------------------------------------------------------
// Transitive graph
// ---------------------------------------------------------------------------

/// Directed derivation graph: an edge `a → b` means `b` was derived from or
/// generated by `a`. Edge weights are provenance record ids.
#[derive(Debug, Default)]
pub struct ProvenanceGraph {
    graph: DiGraph<EntityId, EntityId>,
    index: HashMap<EntityId, NodeIndex>,
}

impl ProvenanceGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a ProvenanceRecord>) -> Self {
        let mut graph = Self::new();
        for record in records {
            graph.add_record(record);
        }
        graph
    }

    fn ensure_node(&mut self, id: &EntityId) -> NodeIndex {
        if let Some(idx) = self.index.get(id) {
            return *idx;
        }
        let idx = self.graph.add_node(id.clone());
        self.index.insert(id.clone(), idx);
        idx
    }

    /// Add every edge described by one record.
    pub fn add_record(&mut self, record: &ProvenanceRecord) {
        let derived = self.ensure_node(&record.entity_id);
        let sources = record
            .was_derived_from
            .iter()
            .chain(record.was_generated_by.iter());
        let mut seen = HashSet::new();
        for source in sources {
            if !seen.insert(source) {
                continue;
            }
            let from = self.ensure_node(source);
            self.graph.add_edge(from, derived, record.id.clone());
        }
    }

    /// Every transitive ancestor of an entity, nearest first.
    pub fn ancestry(&self, id: &EntityId) -> Vec<EntityId> {
        let Some(&start) = self.index.get(id) else {
            return vec![];
        };
        let mut visited = HashSet::from([start]);
        let mut queue = VecDeque::from([start]);
        let mut out = Vec::new();
        while let Some(node) = queue.pop_front() {
            for edge in self.graph.edges_directed(node, Direction::Incoming) {
                let source = edge.source();
                if visited.insert(source) {
                    if let Some(weight) = self.graph.node_weight(source) {
                        out.push(weight.clone());
                    }
                    queue.push_back(source);
                }
            }
        }
        out
    }

    /// Length of the longest derivation chain ending at `id` (0 for a root).
    pub fn depth(&self, id: &EntityId) -> usize {
        let Some(&start) = self.index.get(id) else {
            return 0;
        };
        let mut memo = HashMap::new();
        self.depth_of(start, &mut memo, &mut HashSet::new())
    }

    fn depth_of(
        &self,
        node: NodeIndex,
        memo: &mut HashMap<NodeIndex, usize>,
        on_path: &mut HashSet<NodeIndex>,
    ) -> usize {
        if let Some(&d) = memo.get(&node) {
            return d;
        }
        // Acyclic by construction, but a hand-edited store could still loop.
        if !on_path.insert(node) {
            return 0;
        }
        let sources: Vec<NodeIndex> = self
            .graph
            .edges_directed(node, Direction::Incoming)
            .map(|e| e.source())
            .collect();
        let depth = sources
            .into_iter()
            .map(|s| self.depth_of(s, memo, on_path) + 1)
            .max()
            .unwrap_or(0);
        on_path.remove(&node);
        memo.insert(node, depth);
        depth
    }
}

/// Fetch every provenance record reachable from `entity_id` by following
/// sources transitively, up to `max_records`.
pub fn collect_lineage(
    store: &dyn EntityStore,
    entity_id: &EntityId,
    max_records: usize,
) -> StoreResult<Vec<ProvenanceRecord>> {
    let mut out = Vec::new();
    let mut visited = HashSet::from([entity_id.clone()]);
    let mut queue = VecDeque::from([entity_id.clone()]);
    while let Some(id) = queue.pop_front() {
        for record in store.provenance_for(&id)? {
            let sources = record
                .was_derived_from
                .iter()
                .chain(record.was_generated_by.iter());
            for source in sources {
                if visited.insert(source.clone()) {
                    queue.push_back(source.clone());
                }
            }
            out.push(record);
            if out.len() >= max_records {
                return Ok(out);
            }
        }
    }
    Ok(out)
}

// ---------------------------------------------------------------------------
// Timeline
// ---------------------------------------------------------------------------

/// One entry of a validation timeline.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimelineEvent {
    pub timestamp: DateTime<Utc>,
    pub event: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entity_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub provenance_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub objection_id: Option<EntityId>,
}

impl TimelineEvent {
    fn new(timestamp: DateTime<Utc>, event: impl Into<String>) -> Self {
        Self {
            timestamp,
            event: event.into(),
            entity_type: None,
            entity_id: None,
            provenance_id: None,
            objection_id: None,
        }
    }
}

/// Sort events ascending by timestamp, keeping gather order for ties.
pub fn timeline(mut events: Vec<TimelineEvent>) -> Vec<TimelineEvent> {
    events.sort_by_key(|e| e.timestamp);
    events
}

/// Creation, generation and objection events for an entity, in time order.
pub fn validation_timeline(
    entity: &Entity,
    provenance: &[ProvenanceRecord],
    objections: &[Objection],
) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(1 + provenance.len() + objections.len());

    let mut created = TimelineEvent::new(entity.created_at(), "Entity created");
    created.entity_type = Some(entity.kind().to_string());
    created.entity_id = Some(entity.id().clone());
    events.push(created);

    for record in provenance {
        let mut e = TimelineEvent::new(
            record.generated_at,
            format!("Generated by {}", record.was_attributed_to),
        );
        e.provenance_id = Some(record.id.clone());
        events.push(e);
    }

    for objection in objections {
        let mut e = TimelineEvent::new(
            objection.created_at,
            format!("Objection raised: {}", objection.attack_type),
        );
        e.objection_id = Some(objection.id.clone());
        events.push(e);
    }

    timeline(events)
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::entity::{Claim, ProvenanceMetadata, ThesisStatus};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + secs, 0).unwrap()
    }

    fn record(entity: &str, derived_from: &[&str], attributed: &str, secs: i64) -> ProvenanceRecord {
        ProvenanceRecord {
            id: EntityId::generate(),
            entity_type: "thesis".into(),
            entity_id: entity.into(),
            was_generated_by: None,
            was_derived_from: derived_from.iter().map(|s| EntityId::from(*s)).collect(),
            was_attributed_to: attributed.into(),
            metadata: ProvenanceMetadata::Validation {
                status: ThesisStatus::Validated,
                gates_passed: 6,
                gates_total: 6,
            },
            generated_at: at(secs),
        }
    }

    #[test]
    fn tree_resolves_one_hop_only() {
        let rpe = record("rpe", &["seed"], "generator", 0);
        let seed = record("seed", &[], "import", 0);
        let thesis = record("t1", &["rpe", "missing"], "validation", 5);

        let tree = build_tree(&[thesis.clone()], &[rpe.clone(), seed]);
        assert!(tree.roots.is_empty());
        assert_eq!(tree.nodes.len(), 1);
        // "missing" has no record and contributes nothing; "seed" is two hops away.
        assert_eq!(tree.nodes[0].children, vec![rpe]);
    }

    #[test]
    fn records_without_sources_are_roots() {
        let root = record("t1", &[], "validation", 0);
        let tree = build_tree(std::slice::from_ref(&root), &[]);
        assert_eq!(tree.roots, vec![root.id]);
    }

    #[test]
    fn graph_ancestry_is_transitive() {
        let records = [
            record("rpe", &["seed"], "generator", 0),
            record("t1", &["rpe"], "validation", 1),
            record("run", &["t1"], "loop", 2),
        ];
        let graph = ProvenanceGraph::from_records(records.iter());
        assert!(graph.ancestry(&"seed".into()).is_empty());
        assert_eq!(
            graph.ancestry(&"run".into()),
            vec![EntityId::from("t1"), "rpe".into(), "seed".into()]
        );
        assert_eq!(graph.depth(&"run".into()), 3);
        assert_eq!(graph.depth(&"seed".into()), 0);
        assert_eq!(
            graph.ancestry(&"t1".into()),
            vec![EntityId::from("rpe"), "seed".into()]
        );
    }

    #[test]
    fn depth_survives_cycles() {
        let records = [record("a", &["b"], "x", 0), record("b", &["a"], "x", 1)];
        let graph = ProvenanceGraph::from_records(records.iter());
        assert!(graph.depth(&"a".into()) <= 2);
    }

    #[test]
    fn timeline_is_sorted_regardless_of_gather_order() {
        let claim = Claim {
            id: "c1".into(),
            statement: "s".into(),
            formal_representation: "P".into(),
            domain: "d".into(),
            source_concepts: vec![],
            created_at: at(10),
        };
        let provenance = vec![record("c1", &[], "late", 30), record("c1", &[], "early", 5)];
        let events = validation_timeline(&Entity::Claim(claim), &provenance, &[]);
        let stamps: Vec<_> = events.iter().map(|e| e.timestamp).collect();
        let mut sorted = stamps.clone();
        sorted.sort();
        assert_eq!(stamps, sorted);
        assert_eq!(events[0].event, "Generated by early");
        assert_eq!(events[1].event, "Entity created");
        assert_eq!(events.last().map(|e| e.timestamp), Some(at(10) + Duration::seconds(20)));
    }
}
