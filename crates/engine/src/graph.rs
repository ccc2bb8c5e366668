// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-memory forest built from persisted rows for one `tree_ident`
//! (`spec.md` §4.4).
//!
//! Grounded verbatim on `business_logic/storage_tree.py`
//! (`StorageNode`/`DiskSnapshotStorageTree`), hand-rolled instead of the
//! Python `anytree` library since the Rust ecosystem has no equivalent the
//! rest of this workspace's stack pulls in — a plain `HashMap`-keyed graph
//! is the closest fit to how the rest of this codebase builds in-memory
//! structures from flat rows.

use snapd_core::{CoreError, CoreResult, StorageIdent, TreeIdent};
use snapd_storage::SnapshotStorage;
use std::collections::{HashMap, VecDeque};

/// Order in which [`StorageGraph::path_to_root`] returns its result.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum PathOrder {
    RootToTail,
    TailToRoot,
}

/// An in-memory tree of `SnapshotStorage` rows sharing one `tree_ident`.
/// Construction enforces the single-root invariant: failure to do so
/// signals graph corruption (`GraphIntegrity`).
pub struct StorageGraph {
    tree_ident: TreeIdent,
    nodes: HashMap<StorageIdent, SnapshotStorage>,
    children: HashMap<StorageIdent, Vec<StorageIdent>>,
    root: Option<StorageIdent>,
}

impl StorageGraph {
    /// Builds a tree from already-queried valid rows (status ≠ DELETED) of
    /// one tree. An empty `rows` produces an empty, rootless graph.
    pub fn build(tree_ident: TreeIdent, rows: Vec<SnapshotStorage>) -> CoreResult<Self> {
        let mut nodes = HashMap::new();
        for row in rows {
            nodes.insert(row.ident, row);
        }

        let mut children: HashMap<StorageIdent, Vec<StorageIdent>> = HashMap::new();
        let mut roots = Vec::new();
        for node in nodes.values() {
            match node.parent_ident {
                None => roots.push(node.ident),
                Some(parent) => {
                    if !nodes.contains_key(&parent) {
                        return Err(CoreError::graph_integrity(format!(
                            "generate tree failed: dangling parent_ident {parent} on {}",
                            node.ident
                        )));
                    }
                    children.entry(parent).or_default().push(node.ident);
                }
            }
        }

        if roots.len() > 1 {
            return Err(CoreError::graph_integrity(format!(
                "tree split: {} roots for tree_ident {tree_ident}",
                roots.len()
            )));
        }

        Ok(Self { tree_ident, nodes, children, root: roots.into_iter().next() })
    }

    pub fn tree_ident(&self) -> TreeIdent {
        self.tree_ident
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn root(&self) -> Option<&SnapshotStorage> {
        self.root.and_then(|id| self.nodes.get(&id))
    }

    pub fn get(&self, ident: StorageIdent) -> Option<&SnapshotStorage> {
        self.nodes.get(&ident)
    }

    pub fn children_of(&self, ident: StorageIdent) -> Vec<&SnapshotStorage> {
        self.children
            .get(&ident)
            .map(|idents| idents.iter().filter_map(|id| self.nodes.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn parent_of(&self, ident: StorageIdent) -> Option<&SnapshotStorage> {
        let node = self.nodes.get(&ident)?;
        node.parent_ident.and_then(|p| self.nodes.get(&p))
    }

    pub fn is_root(&self, ident: StorageIdent) -> bool {
        self.root == Some(ident)
    }

    pub fn is_leaf(&self, ident: StorageIdent) -> bool {
        self.children.get(&ident).map(|c| c.is_empty()).unwrap_or(true)
    }

    /// Level-order iteration from the root.
    pub fn nodes_by_bfs(&self) -> Vec<&SnapshotStorage> {
        let mut out = Vec::new();
        let Some(root) = self.root else { return out };
        let mut queue = VecDeque::new();
        queue.push_back(root);
        while let Some(ident) = queue.pop_front() {
            if let Some(node) = self.nodes.get(&ident) {
                out.push(node);
            }
            if let Some(kids) = self.children.get(&ident) {
                queue.extend(kids.iter().copied());
            }
        }
        out
    }

    pub fn leaves(&self) -> Vec<&SnapshotStorage> {
        self.nodes
            .values()
            .filter(|n| self.is_leaf(n.ident))
            .collect()
    }

    /// Walks from `ident` to the root, returned in `order`.
    pub fn path_to_root(&self, ident: StorageIdent, order: PathOrder) -> CoreResult<Vec<&SnapshotStorage>> {
        let mut path = Vec::new();
        let mut current = Some(ident);
        while let Some(id) = current {
            let node = self
                .nodes
                .get(&id)
                .ok_or_else(|| CoreError::not_found(format!("storage ident {id} in tree {}", self.tree_ident)))?;
            path.push(node);
            current = node.parent_ident;
        }
        if order == PathOrder::RootToTail {
            path.reverse();
        }
        Ok(path)
    }
}

#[cfg(test)]
#[path = "graph_tests.rs"]
mod tests;
