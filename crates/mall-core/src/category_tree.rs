//! # Category Tree Builder
//!
//! Assembles a flat, pre-sorted list of categories into parent → children
//! groups rooted at parent id `0`.
//!
//! ## Algorithm
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Input (sorted by sort, id)        Index pass, O(n)                    │
//! │                                                                         │
//! │  [1 → 0] [2 → 1] [3 → 1] [4 → 99]  children: { 0: [1], 1: [2, 3],      │
//! │                                              99: [4] }                 │
//! │                                    ids:      { 1, 2, 3, 4 }             │
//! │                                                                         │
//! │  Assembly pass, O(n)                                                    │
//! │                                                                         │
//! │  roots = children[0] ──► 1                                             │
//! │                          ├── 2                                          │
//! │                          └── 3                                          │
//! │                                                                         │
//! │  4 points at a missing parent (99): an ORPHAN                          │
//! │    OrphanPolicy::Drop          → excluded, reported in `orphans`        │
//! │    OrphanPolicy::PromoteToRoot → appended as a root, reported too       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Sibling order always follows input order, so callers sort once in SQL.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::types::{Category, CategoryStatus, ROOT_CATEGORY_ID};

// =============================================================================
// Types
// =============================================================================

/// What to do with categories whose parent does not exist.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrphanPolicy {
    /// Leave orphans (and their subtrees) out of the tree.
    #[default]
    Drop,
    /// Treat orphans as additional roots.
    PromoteToRoot,
}

/// A category together with its children.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryNode {
    #[serde(flatten)]
    pub category: Category,
    pub children: Vec<CategoryNode>,
}

impl CategoryNode {
    /// Number of nodes in this subtree, including itself.
    pub fn len(&self) -> usize {
        1 + self.children.iter().map(CategoryNode::len).sum::<usize>()
    }

    /// Always false; a node counts itself.
    pub fn is_empty(&self) -> bool {
        false
    }
}

/// Result of [`build_tree`].
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CategoryTree {
    pub roots: Vec<CategoryNode>,

    /// Ids whose `parent_id` referenced a missing category.
    pub orphans: Vec<i64>,
}

impl CategoryTree {
    /// Removes hidden categories together with everything below them.
    ///
    /// Build from the full active list first so that children of a hidden
    /// parent are not mistaken for orphans.
    pub fn without_hidden(self) -> CategoryTree {
        CategoryTree {
            roots: retain_visible(self.roots),
            orphans: self.orphans,
        }
    }
}

fn retain_visible(nodes: Vec<CategoryNode>) -> Vec<CategoryNode> {
    nodes
        .into_iter()
        .filter(|node| node.category.status == CategoryStatus::Visible)
        .map(|node| CategoryNode {
            children: retain_visible(node.children),
            category: node.category,
        })
        .collect()
}

// =============================================================================
// Builder
// =============================================================================

/// Builds the category tree.
///
/// ## Arguments
/// * `categories` - flat list, already ordered by `sort ASC, id ASC`
/// * `policy` - orphan handling
///
/// ## Example
/// ```rust,ignore
/// let tree = build_tree(repo.list_all().await?, OrphanPolicy::Drop);
/// if !tree.orphans.is_empty() {
///     warn!(orphans = ?tree.orphans, "categories with missing parents");
/// }
/// ```
pub fn build_tree(categories: Vec<Category>, policy: OrphanPolicy) -> CategoryTree {
    let ids: HashSet<i64> = categories.iter().map(|c| c.id).collect();

    // parent id → child slot indices, in input order
    let mut children: HashMap<i64, Vec<usize>> = HashMap::with_capacity(categories.len());
    let mut root_slots = Vec::new();
    let mut orphans = Vec::new();

    for (slot, category) in categories.iter().enumerate() {
        if category.parent_id == ROOT_CATEGORY_ID {
            root_slots.push(slot);
        } else if ids.contains(&category.parent_id) {
            children.entry(category.parent_id).or_default().push(slot);
        } else {
            orphans.push(category.id);
            if policy == OrphanPolicy::PromoteToRoot {
                root_slots.push(slot);
            }
        }
    }

    let mut slots: Vec<Option<Category>> = categories.into_iter().map(Some).collect();
    let roots = root_slots
        .into_iter()
        .filter_map(|slot| assemble(slot, &mut slots, &children))
        .collect();

    CategoryTree { roots, orphans }
}

/// Moves the category at `slot` out and attaches its children.
///
/// A slot is taken at most once, so a corrupt parent cycle cannot recurse
/// forever.
fn assemble(
    slot: usize,
    slots: &mut [Option<Category>],
    children: &HashMap<i64, Vec<usize>>,
) -> Option<CategoryNode> {
    let category = slots[slot].take()?;
    let child_nodes = children
        .get(&category.id)
        .map(|child_slots| {
            child_slots
                .iter()
                .filter_map(|&child| assemble(child, slots, children))
                .collect()
        })
        .unwrap_or_default();

    Some(CategoryNode {
        category,
        children: child_nodes,
    })
}

/// Checks whether `candidate` is `ancestor` itself or lies below it.
///
/// Used to refuse re-parenting a category under its own subtree.
pub fn is_in_subtree(categories: &[Category], ancestor: i64, candidate: i64) -> bool {
    let parents: HashMap<i64, i64> = categories.iter().map(|c| (c.id, c.parent_id)).collect();

    let mut current = candidate;
    let mut seen = HashSet::new();
    while current != ROOT_CATEGORY_ID && seen.insert(current) {
        if current == ancestor {
            return true;
        }
        match parents.get(&current) {
            Some(&parent) => current = parent,
            None => return false,
        }
    }
    false
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RecordState;
    use chrono::Utc;

    fn cat(id: i64, parent_id: i64) -> Category {
        let now = Utc::now();
        Category {
            id,
            name: format!("category-{id}"),
            parent_id,
            level: if parent_id == 0 { 1 } else { 2 },
            sort: 0,
            status: CategoryStatus::Visible,
            created_at: now,
            updated_at: now,
            state: RecordState::Active,
        }
    }

    fn child_ids(node: &CategoryNode) -> Vec<i64> {
        node.children.iter().map(|c| c.category.id).collect()
    }

    #[test]
    fn test_orphan_is_dropped_by_default() {
        let tree = build_tree(
            vec![cat(1, 0), cat(2, 1), cat(3, 1), cat(4, 99)],
            OrphanPolicy::Drop,
        );

        assert_eq!(tree.roots.len(), 1);
        assert_eq!(tree.roots[0].category.id, 1);
        assert_eq!(child_ids(&tree.roots[0]), vec![2, 3]);
        assert_eq!(tree.orphans, vec![4]);

        let total: usize = tree.roots.iter().map(CategoryNode::len).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_orphan_promoted_to_root() {
        let tree = build_tree(
            vec![cat(1, 0), cat(2, 1), cat(3, 1), cat(4, 99), cat(5, 4)],
            OrphanPolicy::PromoteToRoot,
        );

        let root_ids: Vec<i64> = tree.roots.iter().map(|n| n.category.id).collect();
        assert_eq!(root_ids, vec![1, 4]);
        assert_eq!(child_ids(&tree.roots[1]), vec![5]);
        assert_eq!(tree.orphans, vec![4]);
    }

    #[test]
    fn test_sibling_order_follows_input() {
        let tree = build_tree(
            vec![cat(10, 0), cat(7, 10), cat(3, 10), cat(9, 10)],
            OrphanPolicy::Drop,
        );
        assert_eq!(child_ids(&tree.roots[0]), vec![7, 3, 9]);
    }

    #[test]
    fn test_child_listed_before_parent() {
        let tree = build_tree(vec![cat(2, 1), cat(1, 0)], OrphanPolicy::Drop);
        assert_eq!(tree.roots.len(), 1);
        assert_eq!(child_ids(&tree.roots[0]), vec![2]);
        assert!(tree.orphans.is_empty());
    }

    #[test]
    fn test_parent_cycle_terminates() {
        // 1 ↔ 2 never reach the root; they must not loop forever
        let tree = build_tree(vec![cat(1, 2), cat(2, 1), cat(3, 0)], OrphanPolicy::Drop);
        assert_eq!(tree.roots.len(), 1);
        assert_eq!(tree.roots[0].category.id, 3);
    }

    #[test]
    fn test_hidden_parent_is_not_an_orphan() {
        let mut hidden = cat(1, 0);
        hidden.status = CategoryStatus::Hidden;
        let categories = vec![hidden, cat(2, 1), cat(3, 0), cat(4, 3), cat(5, 99)];

        let tree = build_tree(categories, OrphanPolicy::Drop).without_hidden();

        let root_ids: Vec<i64> = tree.roots.iter().map(|n| n.category.id).collect();
        assert_eq!(root_ids, vec![3]);
        assert_eq!(child_ids(&tree.roots[0]), vec![4]);
        assert_eq!(tree.orphans, vec![5]);
    }

    #[test]
    fn test_is_in_subtree() {
        let cats = vec![cat(1, 0), cat(2, 1), cat(3, 2), cat(4, 0)];
        assert!(is_in_subtree(&cats, 1, 3));
        assert!(is_in_subtree(&cats, 2, 2));
        assert!(!is_in_subtree(&cats, 3, 1));
        assert!(!is_in_subtree(&cats, 1, 4));
    }

    #[test]
    fn test_tree_json_nests_children() {
        let tree = build_tree(vec![cat(1, 0), cat(2, 1)], OrphanPolicy::Drop);
        let json = serde_json::to_value(&tree.roots).unwrap();
        assert_eq!(json[0]["id"], 1);
        assert_eq!(json[0]["children"][0]["id"], 2);
        assert_eq!(json[0]["children"][0]["children"], serde_json::json!([]));
    }
}
