use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;

use crate::org::{ActiveSubset, Department, OrgCatalog, OrgNode, derive_active_subset, search_matches};

#[derive(Clone, Debug)]
pub struct FilterConfig {
    pub search_debounce_secs: f64,
    pub resize_debounce_secs: f64,
}

impl Default for FilterConfig {
    fn default() -> Self {
        Self {
            search_debounce_secs: 0.3,
            resize_debounce_secs: 0.25,
        }
    }
}

/// Live query text, the debounced query the layout actually uses, and the
/// department toggles (empty = every department).
#[derive(Clone, Debug, Default)]
pub struct FilterState {
    query: String,
    applied_query: String,
    departments: BTreeSet<Department>,
}

impl FilterState {
    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn applied_query(&self) -> &str {
        &self.applied_query
    }

    pub fn departments(&self) -> &BTreeSet<Department> {
        &self.departments
    }

    pub fn is_department_active(&self, department: Department) -> bool {
        self.departments.contains(&department)
    }

    /// Records typed text; returns whether a debounce should be scheduled.
    pub fn set_query(&mut self, text: &str) -> bool {
        if self.query == text {
            return false;
        }
        self.query = text.to_owned();
        true
    }

    /// Promotes the live text once the debounce fires. Whitespace-only edits
    /// do not count as a change.
    pub fn apply_query(&mut self) -> bool {
        let changed = self.applied_query.trim() != self.query.trim();
        self.applied_query.clone_from(&self.query);
        changed
    }

    pub fn toggle_department(&mut self, department: Department) {
        if !self.departments.remove(&department) {
            self.departments.insert(department);
        }
    }

    pub fn clear_departments(&mut self) -> bool {
        let changed = !self.departments.is_empty();
        self.departments.clear();
        changed
    }

    pub fn derive(&self, catalog: &OrgCatalog) -> ActiveSubset {
        derive_active_subset(catalog, &self.applied_query, &self.departments)
    }

    pub fn search_highlight(&self, nodes: &[Arc<OrgNode>]) -> HashSet<String> {
        search_matches(nodes, &self.applied_query)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::org::fixtures::small_catalog;

    #[test]
    fn typed_text_waits_for_the_debounce() {
        let catalog = small_catalog();
        let mut filter = FilterState::default();
        assert!(filter.set_query("marketer1"));
        assert!(!filter.set_query("marketer1"));
        assert_eq!(filter.derive(&catalog).nodes.len(), catalog.node_count());

        assert!(filter.apply_query());
        assert!(!filter.derive(&catalog).contains("engineer1"));
        assert!(!filter.apply_query());
    }

    #[test]
    fn trailing_whitespace_is_not_a_change() {
        let mut filter = FilterState::default();
        filter.set_query("cto");
        filter.apply_query();
        filter.set_query("cto  ");
        assert!(!filter.apply_query());
    }

    #[test]
    fn department_toggles_flip_membership() {
        let mut filter = FilterState::default();
        filter.toggle_department(Department::Sales);
        assert!(filter.is_department_active(Department::Sales));
        filter.toggle_department(Department::Sales);
        assert!(filter.departments().is_empty());
        filter.toggle_department(Department::Legal);
        assert!(filter.clear_departments());
        assert!(!filter.clear_departments());
    }

    #[test]
    fn highlight_uses_direct_matches_only() {
        let catalog = small_catalog();
        let mut filter = FilterState::default();
        filter.set_query("engineer2");
        filter.apply_query();
        let subset = filter.derive(&catalog);
        let highlight = filter.search_highlight(&subset.nodes);
        assert!(highlight.contains("engineer2"));
        assert!(subset.contains("eng-manager1"));
        assert!(!highlight.contains("eng-manager1"));
    }
}
