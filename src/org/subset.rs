use std::collections::{BTreeSet, HashMap, HashSet, VecDeque};
use std::sync::Arc;

use fuzzy_matcher::FuzzyMatcher;
use fuzzy_matcher::skim::SkimMatcherV2;

use super::catalog::OrgCatalog;
use super::model::{Department, OrgEdge, OrgNode};

/// Nodes and edges currently handed to the layout engine.
#[derive(Clone, Debug, Default)]
pub struct ActiveSubset {
    pub nodes: Vec<Arc<OrgNode>>,
    pub edges: Vec<OrgEdge>,
}

impl ActiveSubset {
    pub fn contains(&self, id: &str) -> bool {
        self.nodes.iter().any(|node| node.id == id)
    }

    pub fn person_count(&self) -> usize {
        self.nodes.iter().filter(|node| !node.is_grouping()).count()
    }

    /// Same node objects (not just equal ids) and same edges, in order.
    pub fn same_members(&self, other: &ActiveSubset) -> bool {
        self.nodes.len() == other.nodes.len()
            && self
                .nodes
                .iter()
                .zip(&other.nodes)
                .all(|(a, b)| Arc::ptr_eq(a, b))
            && self.edges == other.edges
    }
}

fn fuzzy_match_score(matcher: &SkimMatcherV2, text: &str, query: &str) -> Option<i64> {
    matcher
        .fuzzy_match(text, query)
        .or_else(|| matcher.fuzzy_match(&text.to_ascii_lowercase(), &query.to_ascii_lowercase()))
}

fn node_matches(matcher: &SkimMatcherV2, node: &OrgNode, query: &str) -> bool {
    fuzzy_match_score(matcher, &node.name, query).is_some()
        || node
            .title
            .as_deref()
            .is_some_and(|title| fuzzy_match_score(matcher, title, query).is_some())
        || fuzzy_match_score(matcher, &node.id, query).is_some()
        || fuzzy_match_score(matcher, node.department.label(), query).is_some()
}

/// Ids of non-grouping nodes matching `query` directly.
pub fn search_matches(nodes: &[Arc<OrgNode>], query: &str) -> HashSet<String> {
    let query = query.trim();
    if query.is_empty() {
        return HashSet::new();
    }

    let matcher = SkimMatcherV2::default();
    nodes
        .iter()
        .filter(|node| !node.is_grouping() && node_matches(&matcher, node, query))
        .map(|node| node.id.clone())
        .collect()
}

fn with_ancestors(catalog: &OrgCatalog, seeds: HashSet<String>) -> HashSet<String> {
    let mut parents: HashMap<&str, Vec<&str>> = HashMap::new();
    for edge in catalog.edges() {
        parents
            .entry(edge.target.as_str())
            .or_default()
            .push(edge.source.as_str());
    }

    let mut kept = seeds;
    let mut queue = kept.iter().cloned().collect::<VecDeque<_>>();
    while let Some(id) = queue.pop_front() {
        let Some(sources) = parents.get(id.as_str()) else {
            continue;
        };
        for source in sources {
            if kept.insert((*source).to_owned()) {
                queue.push_back((*source).to_owned());
            }
        }
    }
    kept
}

/// Pure function of its inputs: grouping nodes are always kept, and every
/// returned edge has both endpoints in the returned node list.
pub fn derive_active_subset(
    catalog: &OrgCatalog,
    query: &str,
    departments: &BTreeSet<Department>,
) -> ActiveSubset {
    let department_ok =
        |node: &OrgNode| departments.is_empty() || departments.contains(&node.department);

    let query = query.trim();
    let query_kept = if query.is_empty() {
        None
    } else {
        let candidates = catalog
            .nodes()
            .iter()
            .filter(|node| department_ok(node))
            .cloned()
            .collect::<Vec<_>>();
        Some(with_ancestors(catalog, search_matches(&candidates, query)))
    };

    let nodes = catalog
        .nodes()
        .iter()
        .filter(|node| {
            node.is_grouping()
                || (department_ok(node)
                    && query_kept
                        .as_ref()
                        .is_none_or(|kept| kept.contains(&node.id)))
        })
        .cloned()
        .collect::<Vec<_>>();

    let present = nodes
        .iter()
        .map(|node| node.id.as_str())
        .collect::<HashSet<_>>();
    let edges = catalog
        .edges()
        .iter()
        .filter(|edge| {
            present.contains(edge.source.as_str()) && present.contains(edge.target.as_str())
        })
        .cloned()
        .collect();

    ActiveSubset { nodes, edges }
}
