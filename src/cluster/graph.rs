// src/cluster/graph.rs
use ahash::AHashMap;
use geo_types::Geometry;
use log::{debug, info, trace, warn};
use petgraph::graphmap::UnGraphMap;
use rayon::prelude::*;
use crate::config::ClusterConfig;
use crate::config::subsystems::{IndexBackend, ReferenceCrs};
use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::geometry::{self, Shape};
use crate::types::ProjectedFeature;
use super::spatial::{new_index, SpatialIndex};

/// Undirected simple graph over feature ids; an edge means "within tolerance".
#[derive(Debug, Clone, Default)]
pub struct ProximityGraph {
    graph: UnGraphMap<usize, ()>,
    reference_crs: Option<u32>,
}

impl ProximityGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_nodes(ids: impl IntoIterator<Item = usize>) -> Result<Self> {
        let mut graph = Self::new();
        for id in ids {
            if graph.contains_node(id) {
                return Err(Error::internal(format!("duplicate feature id {}", id)));
            }
            graph.add_node(id);
        }
        Ok(graph)
    }

    pub fn add_node(&mut self, id: usize) {
        self.graph.add_node(id);
    }

    /// Returns true if the edge was not present before. Both endpoints must
    /// already be nodes and must differ.
    pub fn add_edge(&mut self, a: usize, b: usize) -> Result<bool> {
        if a == b {
            return Err(Error::internal(format!("self-edge on feature {}", a)));
        }
        if !self.contains_node(a) || !self.contains_node(b) {
            return Err(Error::internal(format!("edge ({}, {}) references an unknown feature", a, b)));
        }
        Ok(self.graph.add_edge(a, b, ()).is_none())
    }

    pub fn contains_node(&self, id: usize) -> bool {
        self.graph.contains_node(id)
    }

    pub fn has_edge(&self, a: usize, b: usize) -> bool {
        self.graph.contains_edge(a, b)
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn nodes(&self) -> Vec<usize> {
        let mut nodes: Vec<usize> = self.graph.nodes().collect();
        nodes.sort_unstable();
        nodes
    }

    /// Edges as `(low, high)` pairs, sorted.
    pub fn edges(&self) -> Vec<(usize, usize)> {
        let mut edges: Vec<(usize, usize)> = self.graph.all_edges()
            .map(|(a, b, _)| (a.min(b), a.max(b)))
            .collect();
        edges.sort_unstable();
        edges
    }

    pub fn neighbors(&self, id: usize) -> Vec<usize> {
        let mut neighbors: Vec<usize> = self.graph.neighbors(id).collect();
        neighbors.sort_unstable();
        neighbors
    }

    /// EPSG code of the plane comparisons were made in, if any feature
    /// could be compared at all.
    pub fn reference_crs(&self) -> Option<u32> {
        self.reference_crs
    }
}

/// Most frequent metric CRS among resolved features, ties broken by the
/// smallest EPSG code.
pub fn select_reference_crs(features: &[ProjectedFeature]) -> Option<u32> {
    let mut counts: AHashMap<u32, usize> = AHashMap::new();
    for code in features.iter().filter_map(|f| f.metric_crs) {
        *counts.entry(code).or_insert(0) += 1;
    }
    counts.into_iter()
        .max_by(|(code_a, n_a), (code_b, n_b)| n_a.cmp(n_b).then(code_b.cmp(code_a)))
        .map(|(code, _)| code)
}

#[derive(Debug, Clone)]
pub struct GraphBuilder {
    tolerance_m: f64,
    reference: ReferenceCrs,
    index: IndexBackend,
    parallel: bool,
}

impl GraphBuilder {
    pub fn new(tolerance_m: f64) -> Result<Self> {
        if !tolerance_m.is_finite() || tolerance_m < 0.0 {
            return Err(Error::InvalidTolerance(tolerance_m));
        }
        Ok(Self {
            tolerance_m,
            reference: ReferenceCrs::MostFrequent,
            index: IndexBackend::RTree,
            parallel: false,
        })
    }

    pub fn from_config(config: &ClusterConfig) -> Result<Self> {
        Ok(Self::new(config.clustering.tolerance_m)?
            .with_reference_crs(config.projection.reference_crs)
            .with_index(config.clustering.index)
            .with_parallel(config.clustering.parallel))
    }

    pub fn with_reference_crs(mut self, reference: ReferenceCrs) -> Self {
        self.reference = reference;
        self
    }

    pub fn with_index(mut self, index: IndexBackend) -> Self {
        self.index = index;
        self
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn tolerance_m(&self) -> f64 {
        self.tolerance_m
    }

    pub fn build(&self, features: &[ProjectedFeature]) -> Result<ProximityGraph> {
        let mut index = new_index(self.index);
        self.build_with_index(features, index.as_mut())
    }

    /// Build the graph using a caller-supplied (empty) index.
    pub fn build_with_index(
        &self,
        features: &[ProjectedFeature],
        index: &mut dyn SpatialIndex,
    ) -> Result<ProximityGraph> {
        if features.is_empty() {
            return Err(Error::EmptyCollection);
        }

        let mut graph = ProximityGraph::with_nodes(features.iter().map(|f| f.id))?;

        let reference_epsg = match self.reference {
            ReferenceCrs::MostFrequent => select_reference_crs(features),
            ReferenceCrs::Fixed(code) => Some(code),
        };
        let Some(reference_epsg) = reference_epsg else {
            warn!("No feature has a metric CRS; all {} features stay isolated", features.len());
            return Ok(graph);
        };
        graph.reference_crs = Some(reference_epsg);
        let reference = Crs::from_epsg(reference_epsg)?;
        debug!("Comparing {} features in reference CRS {}", features.len(), reference);

        let (comparison, stranded) = comparison_geometries(features, reference)?;
        index.load(comparison.iter()
            .enumerate()
            .filter_map(|(pos, (_, geom))| geom.bounds().map(|bounds| (pos, bounds)))
            .collect());
        let index: &dyn SpatialIndex = index;

        let tolerance = self.tolerance_m;
        let find_edges = |pos: usize| -> Vec<(usize, usize)> {
            let (id_i, geom_i) = &comparison[pos];
            let buffered = geom_i.buffer(tolerance);
            let Some(query) = buffered.bounds() else {
                return Vec::new();
            };

            let mut candidates = index.query(&query);
            candidates.sort_unstable();
            candidates.into_iter()
                .filter_map(|c| {
                    let (id_j, geom_j) = &comparison[c];
                    (*id_j > *id_i && buffered.intersects(geom_j)).then_some((*id_i, *id_j))
                })
                .collect()
        };

        let mut edges: Vec<(usize, usize)> = if self.parallel {
            (0..comparison.len()).into_par_iter().flat_map_iter(&find_edges).collect()
        } else {
            (0..comparison.len()).flat_map(&find_edges).collect()
        };
        for feature in stranded {
            edges.extend(self.local_edges(feature, features)?);
        }
        edges.sort_unstable();
        edges.dedup();

        for (a, b) in edges {
            trace!("Edge ({}, {})", a, b);
            graph.add_edge(a, b)?;
        }

        info!("Proximity graph built: {} nodes, {} edges (tolerance {} m, {})",
            graph.node_count(), graph.edge_count(), tolerance, reference);
        Ok(graph)
    }

    /// Edges of a feature that has no image in the reference plane, tested
    /// against every other resolved feature in the feature's own metric CRS.
    fn local_edges(
        &self,
        feature: &ProjectedFeature,
        features: &[ProjectedFeature],
    ) -> Result<Vec<(usize, usize)>> {
        let (Some(geom), Some(code)) = (feature.geometry.as_ref(), feature.metric_crs) else {
            return Err(Error::internal(format!("resolved feature {} has no geometry", feature.id)));
        };
        let local = Crs::from_epsg(code)?;
        let own = geometry::reproject(geom, Crs::parse(&feature.source_crs)?, local)
            .map_err(|e| Error::internal(format!("feature {} lost its metric image: {}", feature.id, e)))?;
        let buffered = own.buffer(self.tolerance_m);

        let mut edges = Vec::new();
        for other in features.iter().filter(|f| f.is_resolved() && f.id != feature.id) {
            let Some(other_geom) = other.geometry.as_ref() else {
                continue;
            };
            match geometry::reproject(other_geom, Crs::parse(&other.source_crs)?, local) {
                Ok(projected) if buffered.intersects(&projected) => {
                    edges.push((feature.id.min(other.id), feature.id.max(other.id)));
                }
                Ok(_) => {}
                Err(e) => debug!("Features {} and {} not compared in {}: {}", feature.id, other.id, local, e),
            }
        }
        Ok(edges)
    }
}

/// Resolved features reprojected into the shared comparison plane, keyed by
/// feature id, plus the resolved features that cannot be brought into that
/// plane. Those are compared in their own metric CRS instead.
fn comparison_geometries(
    features: &[ProjectedFeature],
    reference: Crs,
) -> Result<(Vec<(usize, Geometry<f64>)>, Vec<&ProjectedFeature>)> {
    let mut comparison = Vec::with_capacity(features.len());
    let mut stranded = Vec::new();
    for feature in features.iter().filter(|f| f.is_resolved()) {
        let Some(geom) = feature.geometry.as_ref() else {
            return Err(Error::internal(format!("resolved feature {} has no geometry", feature.id)));
        };
        let source = Crs::parse(&feature.source_crs)?;
        match geometry::reproject(geom, source, reference) {
            Ok(projected) => comparison.push((feature.id, projected)),
            Err(e) => {
                warn!("Feature {} cannot be compared in {} ({}); comparing it in EPSG:{}",
                    feature.id, reference, e, feature.metric_crs.unwrap_or_default());
                stranded.push(feature);
            }
        }
    }
    Ok((comparison, stranded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cluster::spatial::BruteForceIndex;
    use crate::geometry::parse_wkt;
    use crate::projector::MetricProjector;
    use crate::types::{FeatureTable, Value};

    fn features(wkts: &[&str], crs: &str) -> Vec<ProjectedFeature> {
        let rows = wkts.iter().map(|w| vec![Value::from(*w)]).collect();
        let table = FeatureTable::with_rows(["geometry"], rows).unwrap();
        MetricProjector::new().project(&table, "geometry", crs).unwrap()
    }

    fn parallel_lines() -> Vec<ProjectedFeature> {
        features(&[
            "LINESTRING(500000 5000000, 500100 5000000)",
            "LINESTRING(500000 5000005, 500100 5000005)",
            "LINESTRING(500000 5000020, 500100 5000020)",
        ], "EPSG:32632")
    }

    #[test]
    fn test_graph_rejects_self_and_unknown_edges() {
        let mut graph = ProximityGraph::with_nodes([0, 1]).unwrap();
        assert!(graph.add_edge(0, 1).unwrap());
        assert!(!graph.add_edge(1, 0).unwrap());
        assert_eq!(graph.edge_count(), 1);
        assert!(matches!(graph.add_edge(1, 1), Err(Error::InternalInconsistency(_))));
        assert!(matches!(graph.add_edge(0, 7), Err(Error::InternalInconsistency(_))));
        assert!(ProximityGraph::with_nodes([3, 3]).is_err());
    }

    #[test]
    fn test_reference_crs_majority_and_ties() {
        let mut fs = parallel_lines();
        assert_eq!(select_reference_crs(&fs), Some(32632));

        fs[0].metric_crs = Some(32633);
        fs[1].metric_crs = Some(32633);
        assert_eq!(select_reference_crs(&fs), Some(32633));

        fs[2].metric_crs = Some(32631);
        fs[1].metric_crs = Some(32632);
        // One each: smallest code wins
        assert_eq!(select_reference_crs(&fs), Some(32631));

        for f in fs.iter_mut() {
            f.metric_crs = None;
        }
        assert_eq!(select_reference_crs(&fs), None);
    }

    #[test]
    fn test_edges_within_tolerance() {
        let graph = GraphBuilder::new(10.0).unwrap().build(&parallel_lines()).unwrap();
        assert_eq!(graph.nodes(), vec![0, 1, 2]);
        assert_eq!(graph.edges(), vec![(0, 1)]);
        assert_eq!(graph.reference_crs(), Some(32632));

        let wide = GraphBuilder::new(15.5).unwrap().build(&parallel_lines()).unwrap();
        assert_eq!(wide.edges(), vec![(0, 1), (1, 2)]);
    }

    #[test]
    fn test_zero_tolerance_needs_contact() {
        let fs = features(&[
            "LINESTRING(500000 5000000, 500100 5000000)",
            "LINESTRING(500100 5000000, 500200 5000000)",
            "LINESTRING(500200.5 5000000, 500300 5000000)",
        ], "EPSG:32632");
        let graph = GraphBuilder::new(0.0).unwrap().build(&fs).unwrap();
        assert_eq!(graph.edges(), vec![(0, 1)]);
    }

    #[test]
    fn test_backends_and_parallel_agree() {
        let fs = parallel_lines();
        let tree = GraphBuilder::new(10.0).unwrap().build(&fs).unwrap();
        let mut brute_index = BruteForceIndex::default();
        let brute = GraphBuilder::new(10.0).unwrap().build_with_index(&fs, &mut brute_index).unwrap();
        let parallel = GraphBuilder::new(10.0).unwrap().with_parallel(true).build(&fs).unwrap();
        assert_eq!(tree.edges(), brute.edges());
        assert_eq!(tree.edges(), parallel.edges());
    }

    #[test]
    fn test_unresolved_rows_are_isolated() {
        let mut fs = parallel_lines();
        fs[1].metric_crs = None;
        fs[1].length_m = None;
        fs[1].error = Some(crate::types::RowError {
            kind: crate::types::RowErrorKind::InvalidGeometry,
            message: "test".to_string(),
        });
        let graph = GraphBuilder::new(10.0).unwrap().build(&fs).unwrap();
        assert_eq!(graph.node_count(), 3);
        assert!(graph.neighbors(1).is_empty());
    }

    #[test]
    fn test_fixed_reference_crs() {
        let fs = parallel_lines();
        let graph = GraphBuilder::new(10.0).unwrap()
            .with_reference_crs(ReferenceCrs::Fixed(32633))
            .build(&fs)
            .unwrap();
        assert_eq!(graph.reference_crs(), Some(32633));
        assert_eq!(graph.edges(), vec![(0, 1)]);
    }

    #[test]
    fn test_empty_and_invalid_tolerance() {
        assert!(matches!(GraphBuilder::new(1.0).unwrap().build(&[]), Err(Error::EmptyCollection)));
        assert!(matches!(GraphBuilder::new(-1.0), Err(Error::InvalidTolerance(_))));
        assert!(matches!(GraphBuilder::new(f64::NAN), Err(Error::InvalidTolerance(_))));
    }

    #[test]
    fn test_features_outside_reference_plane_keep_contacts() {
        let fs = features(&[
            "LINESTRING(3 10, 3.01 10)",
            "LINESTRING(3 11, 3.01 11)",
            "LINESTRING(3 12, 3.01 12)",
            "LINESTRING(92.99 0, 93 0)",
            "LINESTRING(93 0, 93.01 0)",
        ], "EPSG:4326");
        assert!(fs.iter().all(|f| f.is_resolved()));
        // 90 degrees off the zone 31 central meridian on the equator
        let zone31 = Crs::from_epsg(32631).unwrap();
        assert!(geometry::reproject(fs[3].geometry.as_ref().unwrap(), Crs::Wgs84, zone31).is_err());

        for parallel in [false, true] {
            let graph = GraphBuilder::new(0.0).unwrap().with_parallel(parallel).build(&fs).unwrap();
            assert_eq!(graph.reference_crs(), Some(32631));
            assert_eq!(graph.edges(), vec![(3, 4)]);
        }
        let wide = GraphBuilder::new(2.0).unwrap().build(&fs).unwrap();
        assert_eq!(wide.edges(), vec![(3, 4)]);
    }

    #[test]
    fn test_polygon_and_line_mix() {
        let fs = features(&[
            "POLYGON((500000 5000000, 500010 5000000, 500010 5000010, 500000 5000010, 500000 5000000))",
            "LINESTRING(500013 5000000, 500013 5000010)",
        ], "EPSG:32632");
        let near = GraphBuilder::new(3.5).unwrap().build(&fs).unwrap();
        assert_eq!(near.edges(), vec![(0, 1)]);
        let far = GraphBuilder::new(2.5).unwrap().build(&fs).unwrap();
        assert!(far.edges().is_empty());
        // Touching the buffered polygon interior is enough
        let inside = parse_wkt("POINT(500005 5000005)").unwrap();
        assert!(fs[0].geometry.as_ref().unwrap().buffer(0.0).intersects(&inside));
    }
}
