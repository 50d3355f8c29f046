// src/cluster/labeler.rs
use std::collections::BTreeMap;
use ahash::AHashMap;
use log::debug;
use petgraph::unionfind::UnionFind;
use crate::error::{Error, Result};
use crate::types::ClusterAssignment;
use super::graph::ProximityGraph;

/// Connected components of `graph`, numbered by ascending smallest member id.
///
/// `feature_ids` must be exactly the node set of the graph; anything else is
/// an internal inconsistency.
pub fn label_components(graph: &ProximityGraph, feature_ids: &[usize]) -> Result<ClusterAssignment> {
    let position: AHashMap<usize, usize> = feature_ids.iter()
        .enumerate()
        .map(|(pos, &id)| (id, pos))
        .collect();
    if position.len() != feature_ids.len() {
        return Err(Error::internal("duplicate feature ids passed to the labeler"));
    }
    if let Some(missing) = feature_ids.iter().find(|&&id| !graph.contains_node(id)) {
        return Err(Error::internal(format!("feature {} is missing from the proximity graph", missing)));
    }
    if graph.node_count() != feature_ids.len() {
        return Err(Error::internal(format!(
            "proximity graph has {} nodes for {} features", graph.node_count(), feature_ids.len()
        )));
    }

    let mut uf = UnionFind::<usize>::new(feature_ids.len());
    for (a, b) in graph.edges() {
        uf.union(position[&a], position[&b]);
    }

    // Smallest feature id under each root
    let mut root_min: AHashMap<usize, usize> = AHashMap::new();
    for (pos, &id) in feature_ids.iter().enumerate() {
        let root = uf.find_mut(pos);
        root_min.entry(root)
            .and_modify(|min| *min = (*min).min(id))
            .or_insert(id);
    }

    let mut ordered: Vec<(usize, usize)> = root_min.into_iter()
        .map(|(root, min_id)| (min_id, root))
        .collect();
    ordered.sort_unstable();
    let cluster_of_root: AHashMap<usize, usize> = ordered.iter()
        .enumerate()
        .map(|(cluster, &(_, root))| (root, cluster))
        .collect();

    let mut labels = BTreeMap::new();
    for (pos, &id) in feature_ids.iter().enumerate() {
        labels.insert(id, cluster_of_root[&uf.find_mut(pos)]);
    }

    debug!("Labeled {} features into {} clusters", labels.len(), ordered.len());
    Ok(ClusterAssignment::from_labels(labels, ordered.len()))
}
