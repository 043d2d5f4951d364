use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

use super::model::{Department, EdgeKind, OrgEdge, OrgNode};

const SAMPLE_CATALOG: &str = include_str!("../../data/sample_org.json");

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("failed to read catalog {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse catalog JSON")]
    Parse(#[from] serde_json::Error),
    #[error("catalog contains no nodes")]
    Empty,
}

#[derive(Deserialize)]
struct RawCatalog {
    nodes: Vec<OrgNode>,
    #[serde(default)]
    edges: Vec<OrgEdge>,
}

/// Immutable node/edge snapshot every derived subset is computed from.
#[derive(Clone, Debug)]
pub struct OrgCatalog {
    nodes: Vec<Arc<OrgNode>>,
    edges: Vec<OrgEdge>,
    index_by_id: HashMap<String, usize>,
    departments: Vec<Department>,
}

impl OrgCatalog {
    pub fn load(path: &Path) -> Result<Self, CatalogError> {
        let raw = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let catalog = Self::from_json_str(&raw)?;
        info!(
            path = %path.display(),
            nodes = catalog.nodes.len(),
            edges = catalog.edges.len(),
            "loaded org catalog"
        );
        Ok(catalog)
    }

    pub fn sample() -> Result<Self, CatalogError> {
        Self::from_json_str(SAMPLE_CATALOG)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, CatalogError> {
        let raw: RawCatalog = serde_json::from_str(raw)?;
        Self::from_parts(raw.nodes, raw.edges)
    }

    pub fn from_parts(nodes: Vec<OrgNode>, edges: Vec<OrgEdge>) -> Result<Self, CatalogError> {
        let mut kept = Vec::with_capacity(nodes.len());
        let mut index_by_id = HashMap::with_capacity(nodes.len());

        for node in nodes {
            if index_by_id.contains_key(&node.id) {
                warn!(id = %node.id, "dropping duplicate catalog node");
                continue;
            }
            index_by_id.insert(node.id.clone(), kept.len());
            kept.push(Arc::new(node));
        }

        if kept.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut seen = HashSet::new();
        let mut valid_edges = Vec::with_capacity(edges.len());
        for edge in edges {
            if edge.source == edge.target {
                warn!(id = %edge.source, "dropping self-referencing edge");
                continue;
            }
            if !index_by_id.contains_key(&edge.source) || !index_by_id.contains_key(&edge.target) {
                warn!(
                    source = %edge.source,
                    target = %edge.target,
                    "dropping dangling edge"
                );
                continue;
            }
            if seen.insert(edge.clone()) {
                valid_edges.push(edge);
            }
        }

        let present = kept
            .iter()
            .map(|node| node.department)
            .collect::<HashSet<_>>();
        let departments = Department::ALL
            .into_iter()
            .filter(|department| present.contains(department))
            .collect();

        Ok(Self {
            nodes: kept,
            edges: valid_edges,
            index_by_id,
            departments,
        })
    }

    pub fn nodes(&self) -> &[Arc<OrgNode>] {
        &self.nodes
    }

    pub fn edges(&self) -> &[OrgEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&Arc<OrgNode>> {
        self.index_by_id.get(id).map(|&index| &self.nodes[index])
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    /// Departments present in the catalog, in enumeration order.
    pub fn departments(&self) -> &[Department] {
        &self.departments
    }

    pub fn direct_reports(&self, id: &str) -> Vec<&Arc<OrgNode>> {
        self.edges
            .iter()
            .filter(|edge| edge.kind == EdgeKind::ReportsTo && edge.source == id)
            .filter_map(|edge| self.node(&edge.target))
            .collect()
    }

    pub fn manager_of(&self, id: &str) -> Option<&Arc<OrgNode>> {
        self.edges
            .iter()
            .find(|edge| edge.kind == EdgeKind::ReportsTo && edge.target == id)
            .and_then(|edge| self.node(&edge.source))
    }

    /// Chain of superiors from the top of the chart down to `id`, following
    /// the first incoming edge of any kind. Grouping nodes are included.
    pub fn reporting_chain(&self, id: &str) -> Vec<&Arc<OrgNode>> {
        let Some(mut current) = self.node(id) else {
            return Vec::new();
        };

        let mut visited = HashSet::from([current.id.as_str()]);
        let mut chain = vec![current];
        while let Some(parent) = self
            .edges
            .iter()
            .find(|edge| edge.target == current.id)
            .and_then(|edge| self.node(&edge.source))
        {
            if !visited.insert(parent.id.as_str()) {
                warn!(id = %parent.id, "cycle in reporting chain");
                break;
            }
            chain.push(parent);
            current = parent;
        }
        chain.reverse();
        chain
    }

    pub fn department_size(&self, department: Department) -> usize {
        self.nodes
            .iter()
            .filter(|node| !node.is_grouping() && node.department == department)
            .count()
    }
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;
    use crate::org::model::NodeRole;

    pub(crate) fn node(id: &str, department: Department, role: NodeRole, level: f32) -> OrgNode {
        OrgNode {
            id: id.to_owned(),
            name: id.to_owned(),
            title: None,
            department,
            role,
            level,
            email: None,
            phone: None,
            location: None,
            start_date: None,
            avatar: None,
        }
    }

    pub(crate) fn edge(source: &str, target: &str, kind: EdgeKind) -> OrgEdge {
        OrgEdge {
            source: source.to_owned(),
            target: target.to_owned(),
            kind,
        }
    }

    /// ceo -> cto/cmo, each owning a grouping node, manager and employees.
    pub(crate) fn small_catalog() -> OrgCatalog {
        use Department::{Engineering, Executive, Marketing};
        use EdgeKind::{DepartmentMembership, ReportsTo};
        use NodeRole::{DepartmentGroup, Employee, Executive as Exec, Manager};

        let nodes = vec![
            node("ceo", Executive, Exec, 0.0),
            node("cto", Engineering, Exec, 1.0),
            node("cmo", Marketing, Exec, 1.0),
            node("grp-engineering", Engineering, DepartmentGroup, 2.5),
            node("grp-marketing", Marketing, DepartmentGroup, 2.5),
            node("eng-manager1", Engineering, Manager, 3.0),
            node("engineer1", Engineering, Employee, 4.0),
            node("engineer2", Engineering, Employee, 4.0),
            node("mkt-manager1", Marketing, Manager, 3.0),
            node("marketer1", Marketing, Employee, 4.0),
        ];
        let edges = vec![
            edge("ceo", "cto", ReportsTo),
            edge("ceo", "cmo", ReportsTo),
            edge("cto", "grp-engineering", DepartmentMembership),
            edge("cmo", "grp-marketing", DepartmentMembership),
            edge("grp-engineering", "eng-manager1", DepartmentMembership),
            edge("grp-marketing", "mkt-manager1", DepartmentMembership),
            edge("eng-manager1", "engineer1", ReportsTo),
            edge("eng-manager1", "engineer2", ReportsTo),
            edge("mkt-manager1", "marketer1", ReportsTo),
        ];
        OrgCatalog::from_parts(nodes, edges).expect("fixture catalog is valid")
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::{edge, node, small_catalog};
    use super::*;
    use crate::org::model::NodeRole;

    #[test]
    fn sample_catalog_parses_and_contains_engineer1() {
        let catalog = OrgCatalog::sample().unwrap();
        assert!(catalog.node("engineer1").is_some());
        assert!(catalog.departments().contains(&Department::Engineering));
        assert!(
            catalog
                .edges()
                .iter()
                .all(|edge| catalog.node(&edge.source).is_some()
                    && catalog.node(&edge.target).is_some())
        );
    }

    #[test]
    fn dangling_and_duplicate_entries_are_dropped() {
        let catalog = OrgCatalog::from_parts(
            vec![
                node("a", Department::Sales, NodeRole::Manager, 3.0),
                node("b", Department::Sales, NodeRole::Employee, 4.0),
                node("a", Department::Legal, NodeRole::Employee, 4.0),
            ],
            vec![
                edge("a", "b", EdgeKind::ReportsTo),
                edge("a", "b", EdgeKind::ReportsTo),
                edge("a", "ghost", EdgeKind::ReportsTo),
                edge("b", "b", EdgeKind::ReportsTo),
            ],
        )
        .unwrap();

        assert_eq!(catalog.node_count(), 2);
        assert_eq!(catalog.node("a").unwrap().department, Department::Sales);
        assert_eq!(catalog.edge_count(), 1);
    }

    #[test]
    fn empty_catalog_is_an_error() {
        let error = OrgCatalog::from_json_str(r#"{"nodes":[],"edges":[]}"#).unwrap_err();
        assert!(matches!(error, CatalogError::Empty));
    }

    #[test]
    fn malformed_json_is_a_parse_error() {
        let error = OrgCatalog::from_json_str("{ nodes: ").unwrap_err();
        assert!(matches!(error, CatalogError::Parse(_)));
    }

    #[test]
    fn missing_file_reports_the_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.json");
        let error = OrgCatalog::load(&path).unwrap_err();
        assert!(matches!(error, CatalogError::Io { .. }));
    }

    #[test]
    fn reporting_lines_are_derived_from_reports_to_edges() {
        let catalog = small_catalog();
        let reports = catalog
            .direct_reports("eng-manager1")
            .into_iter()
            .map(|node| node.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(reports, vec!["engineer1", "engineer2"]);
        assert_eq!(catalog.manager_of("engineer2").unwrap().id, "eng-manager1");
        assert!(catalog.manager_of("eng-manager1").is_none());
        assert_eq!(catalog.department_size(Department::Engineering), 4);
    }

    #[test]
    fn reporting_chain_runs_from_the_top_down() {
        let catalog = small_catalog();
        let chain = catalog
            .reporting_chain("engineer1")
            .into_iter()
            .map(|node| node.id.as_str())
            .collect::<Vec<_>>();
        assert_eq!(
            chain,
            vec!["ceo", "cto", "grp-engineering", "eng-manager1", "engineer1"]
        );
        assert_eq!(catalog.reporting_chain("ceo").len(), 1);
        assert!(catalog.reporting_chain("ghost").is_empty());
    }

    #[test]
    fn reporting_chain_stops_on_cycles() {
        let catalog = OrgCatalog::from_parts(
            vec![
                node("a", Department::Sales, NodeRole::Manager, 3.0),
                node("b", Department::Sales, NodeRole::Employee, 4.0),
            ],
            vec![
                edge("a", "b", EdgeKind::ReportsTo),
                edge("b", "a", EdgeKind::ReportsTo),
            ],
        )
        .unwrap();
        assert_eq!(catalog.reporting_chain("b").len(), 2);
    }

    #[test]
    fn departments_follow_enumeration_order() {
        let catalog = small_catalog();
        assert_eq!(
            catalog.departments(),
            &[
                Department::Executive,
                Department::Engineering,
                Department::Marketing
            ]
        );
    }
}
