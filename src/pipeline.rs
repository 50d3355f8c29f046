//! Pipeline orchestration: metric projection, proximity graph, labeling.
//!
//! ```text
//! FeatureTable ──► MetricProjector ──► GraphBuilder ──► label_components
//!                  (per-row UTM)       (reference CRS,   (union-find,
//!                                       R-tree prune,     smallest id first)
//!                                       buffer test)
//! ```
//!
//! Nothing is kept between runs; every call builds its own index and graph.

use std::time::Instant;
use log::{debug, info};
use crate::cluster::{label_components, GraphBuilder};
use crate::config::ClusterConfig;
use crate::error::{Error, Result};
use crate::projector::{annotate_table, MetricProjector};
use crate::types::{
    ClusterAssignment, FeatureTable, ProjectedFeature, Value, CLUSTER_COLUMN, LENGTH_COLUMN,
    METRIC_CRS_COLUMN,
};

/// Output of one pipeline run: the input table plus `metric_crs_id`,
/// `length_m` and `cluster_id` columns, and the typed results behind them.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusteredTable {
    pub table: FeatureTable,
    pub features: Vec<ProjectedFeature>,
    pub assignment: ClusterAssignment,
    pub reference_crs: Option<u32>,
}

impl ClusteredTable {
    fn empty(input: &FeatureTable) -> Result<Self> {
        let table = input.with_column(METRIC_CRS_COLUMN, Vec::new())?
            .with_column(LENGTH_COLUMN, Vec::new())?
            .with_column(CLUSTER_COLUMN, Vec::new())?;
        Ok(Self {
            table,
            features: Vec::new(),
            assignment: ClusterAssignment::default(),
            reference_crs: None,
        })
    }

    pub fn len(&self) -> usize {
        self.table.len()
    }

    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Cluster id per row, in row order.
    pub fn cluster_ids(&self) -> Vec<usize> {
        self.features.iter()
            .filter_map(|f| self.assignment.cluster_of(f.id))
            .collect()
    }

    pub fn cluster_count(&self) -> usize {
        self.assignment.cluster_count()
    }

    /// Rows whose geometry or CRS could not be resolved.
    pub fn failed_rows(&self) -> Vec<&ProjectedFeature> {
        self.features.iter().filter(|f| !f.is_resolved()).collect()
    }
}

#[derive(Debug, Clone)]
pub struct ClusterPipeline {
    config: ClusterConfig,
}

impl ClusterPipeline {
    pub fn new(config: ClusterConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ClusterConfig {
        &self.config
    }

    pub fn run(&self, table: &FeatureTable) -> Result<ClusteredTable> {
        let start_time = Instant::now();
        let projection = &self.config.projection;
        let clustering = &self.config.clustering;

        table.require_column(&projection.geometry_column)?;
        if table.is_empty() {
            info!("Input collection is empty, nothing to cluster");
            return ClusteredTable::empty(table);
        }

        info!("Clustering {} features (geometry column '{}', source {}, tolerance {} m)",
            table.len(), projection.geometry_column, projection.source_crs, clustering.tolerance_m);

        // Step 1: per-row metric CRS and length
        let features = MetricProjector::new()
            .with_parallel(clustering.parallel)
            .project(table, &projection.geometry_column, &projection.source_crs)?;

        // Step 2: proximity graph in a shared reference plane
        let graph = match GraphBuilder::from_config(&self.config)?.build(&features) {
            Ok(graph) => graph,
            Err(Error::EmptyCollection) => return ClusteredTable::empty(table),
            Err(e) => return Err(e),
        };

        // Step 3: connected components
        let ids: Vec<usize> = features.iter().map(|f| f.id).collect();
        let assignment = label_components(&graph, &ids)?;

        let cluster_values = features.iter()
            .map(|f| {
                assignment.cluster_of(f.id)
                    .map(|c| Value::Int(c as i64))
                    .ok_or_else(|| Error::internal(format!("feature {} has no cluster", f.id)))
            })
            .collect::<Result<Vec<_>>>()?;
        let output = annotate_table(table, &features)?
            .with_column(CLUSTER_COLUMN, cluster_values)?;

        info!("Analysis completed: detected {} unique groups", assignment.cluster_count());
        debug!("Pipeline finished in {:?}", start_time.elapsed());

        Ok(ClusteredTable {
            table: output,
            features,
            assignment,
            reference_crs: graph.reference_crs(),
        })
    }
}

/// Run the whole pipeline with default settings apart from the three
/// caller-facing parameters.
pub fn cluster_features(
    table: &FeatureTable,
    geometry_column: &str,
    source_crs: &str,
    tolerance_m: f64,
) -> Result<ClusteredTable> {
    let mut config = ClusterConfig::default();
    config.projection.geometry_column = geometry_column.to_string();
    config.projection.source_crs = source_crs.to_string();
    config.clustering.tolerance_m = tolerance_m;
    ClusterPipeline::new(config)?.run(table)
}
