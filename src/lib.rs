//! linecluster groups linear geometries (road and curb segments, parcel
//! outlines) into clusters of features that touch or lie within a metric
//! tolerance of each other, even when the input spans several UTM zones.
//!
//! Each row is measured in its own UTM zone; proximity is tested in one
//! shared reference zone; clusters are the connected components of the
//! resulting proximity graph.

// Module declarations
pub mod error;
pub mod types;
pub mod config;
pub mod crs;
pub mod geometry;
pub mod projector;
pub mod cluster;
pub mod pipeline;

// Re-exports
pub use error::{Error, Result};
pub use types::{
    ClusterAssignment, Feature, FeatureTable, ProjectedFeature, RowError, RowErrorKind, Value,
    CLUSTER_COLUMN, LENGTH_COLUMN, METRIC_CRS_COLUMN,
};
pub use cluster::{GraphBuilder, ProximityGraph, SpatialIndex};
pub use crs::{Crs, UtmZone};
pub use pipeline::{cluster_features, ClusterPipeline, ClusteredTable};
pub use projector::MetricProjector;

// Re-export the config from config module
pub use config::ClusterConfig;
