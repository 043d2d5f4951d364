mod catalog;
mod model;
mod subset;

#[cfg(test)]
pub(crate) use catalog::fixtures;
pub use catalog::OrgCatalog;
pub use model::{Department, EdgeKind, NodeRole, OrgNode};
pub use subset::{ActiveSubset, derive_active_subset, search_matches};
