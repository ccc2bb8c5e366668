// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use snapd_core::{Status, StorageType};

fn row(tree: TreeIdent, ident: StorageIdent, parent: Option<StorageIdent>) -> SnapshotStorage {
    SnapshotStorage {
        id: 0,
        ident,
        parent_ident: parent,
        parent_timestamp: None,
        storage_type: StorageType::Qcow,
        disk_bytes: 1,
        status: Status::Storage,
        image_path: "/s/x.qcow".into(),
        tree_ident: tree,
        file_level_deduplication: false,
        start_timestamp: None,
        finish_timestamp: None,
    }
}

#[test]
fn build_empty_rows_yields_empty_graph() {
    let g = StorageGraph::build(TreeIdent::generate(), vec![]).expect("empty ok");
    assert!(g.is_empty());
    assert!(g.root().is_none());
}

#[test]
fn build_detects_tree_split_on_two_roots() {
    let tree = TreeIdent::generate();
    let rows = vec![
        row(tree, StorageIdent::generate(), None),
        row(tree, StorageIdent::generate(), None),
    ];
    let err = StorageGraph::build(tree, rows).unwrap_err();
    assert_eq!(err.code(), snapd_core::code::GRAPH_INTEGRITY);
}

#[test]
fn build_detects_dangling_parent() {
    let tree = TreeIdent::generate();
    let rows = vec![row(tree, StorageIdent::generate(), Some(StorageIdent::generate()))];
    let err = StorageGraph::build(tree, rows).unwrap_err();
    assert_eq!(err.code(), snapd_core::code::GRAPH_INTEGRITY);
}

#[test]
fn bfs_visits_root_then_children_then_grandchildren() {
    let tree = TreeIdent::generate();
    let root = StorageIdent::generate();
    let mid = StorageIdent::generate();
    let leaf = StorageIdent::generate();
    let rows = vec![row(tree, root, None), row(tree, mid, Some(root)), row(tree, leaf, Some(mid))];
    let g = StorageGraph::build(tree, rows).expect("builds");

    let order: Vec<_> = g.nodes_by_bfs().into_iter().map(|n| n.ident).collect();
    assert_eq!(order, vec![root, mid, leaf]);
    assert!(g.is_root(root));
    assert!(!g.is_leaf(root));
    assert!(g.is_leaf(leaf));
    assert_eq!(g.leaves().into_iter().map(|n| n.ident).collect::<Vec<_>>(), vec![leaf]);
}

#[test]
fn path_to_root_orders_correctly() {
    let tree = TreeIdent::generate();
    let root = StorageIdent::generate();
    let mid = StorageIdent::generate();
    let leaf = StorageIdent::generate();
    let rows = vec![row(tree, root, None), row(tree, mid, Some(root)), row(tree, leaf, Some(mid))];
    let g = StorageGraph::build(tree, rows).expect("builds");

    let root_to_tail: Vec<_> = g.path_to_root(leaf, PathOrder::RootToTail).unwrap().into_iter().map(|n| n.ident).collect();
    assert_eq!(root_to_tail, vec![root, mid, leaf]);

    let tail_to_root: Vec<_> = g.path_to_root(leaf, PathOrder::TailToRoot).unwrap().into_iter().map(|n| n.ident).collect();
    assert_eq!(tail_to_root, vec![leaf, mid, root]);
}

#[test]
fn path_to_root_errors_on_unknown_ident() {
    let g = StorageGraph::build(TreeIdent::generate(), vec![]).unwrap();
    assert!(g.path_to_root(StorageIdent::generate(), PathOrder::RootToTail).is_err());
}

mod forest_invariant {
    use super::*;
    use proptest::prelude::*;

    /// Builds a guaranteed-single-root, dangling-free forest: node 0 is the
    /// root (`usize::MAX` sentinel), every later node attaches to a
    /// uniformly chosen earlier one.
    fn arb_forest(max_nodes: usize) -> impl Strategy<Value = Vec<usize>> {
        (1..=max_nodes).prop_flat_map(|n| {
            proptest::collection::vec(any::<usize>(), n.saturating_sub(1)).prop_map(move |raw| {
                let mut parents = Vec::with_capacity(n);
                parents.push(usize::MAX);
                for (i, choice) in raw.into_iter().enumerate() {
                    let idx = i + 1;
                    parents.push(choice % idx);
                }
                parents
            })
        })
    }

    proptest! {
        /// Any single-root, dangling-free set of rows builds successfully,
        /// yields exactly the same node count on BFS, and every node's
        /// `path_to_root` terminates at the root (`spec.md` §3 "Forest").
        #[test]
        fn single_root_forest_always_builds_and_is_fully_reachable(parents in arb_forest(12)) {
            let tree = TreeIdent::generate();
            let idents: Vec<StorageIdent> = (0..parents.len()).map(|_| StorageIdent::generate()).collect();
            let rows: Vec<SnapshotStorage> = parents
                .iter()
                .enumerate()
                .map(|(i, &p)| row(tree, idents[i], if p == usize::MAX { None } else { Some(idents[p]) }))
                .collect();

            let graph = StorageGraph::build(tree, rows).expect("single-root dangling-free forest always builds");

            prop_assert_eq!(graph.nodes_by_bfs().len(), idents.len());
            prop_assert!(graph.root().is_some());

            for &ident in &idents {
                let path = graph.path_to_root(ident, PathOrder::TailToRoot).expect("every node reaches the root");
                prop_assert_eq!(path.last().map(|n| n.ident), graph.root().map(|n| n.ident));
            }
        }

        /// A row whose `parent_ident` names no other row in the set is
        /// always rejected as `GraphIntegrity`, never panics.
        #[test]
        fn dangling_parent_always_rejected(extra_nodes in 0..6usize) {
            let tree = TreeIdent::generate();
            let dangling_parent = StorageIdent::generate();
            let mut rows = vec![row(tree, StorageIdent::generate(), Some(dangling_parent))];
            for _ in 0..extra_nodes {
                rows.push(row(tree, StorageIdent::generate(), None));
            }
            // at most one legitimate root among the extras would still leave
            // the dangling-parent row unresolved.
            let err = StorageGraph::build(tree, rows);
            prop_assert!(err.is_err());
        }
    }
}
