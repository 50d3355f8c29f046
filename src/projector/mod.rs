//! Per-row metric projection.
//!
//! Every row is resolved on its own (no shared state between rows), so the
//! result does not depend on processing order or on how rows are split
//! across threads.

pub mod resolver;

use geo_types::Geometry;
use log::{debug, info, warn};
use rayon::prelude::*;
use crate::error::{Error, Result};
use crate::geometry::parse_wkt;
use crate::types::{
    Feature, FeatureTable, ProjectedFeature, RowError, Value, LENGTH_COLUMN, METRIC_CRS_COLUMN,
};

pub use resolver::{resolve, resolve_with_crs, MetricResolution};

/// Decode a geometry cell: decoded shapes pass through, text is read as WKT.
pub fn decode_geometry(value: &Value) -> Result<Geometry<f64>> {
    match value {
        Value::Geometry(geometry) => Ok(geometry.clone()),
        Value::Text(text) => parse_wkt(text),
        Value::Null => Err(Error::invalid_geometry("geometry is null")),
        other => Err(Error::invalid_geometry(format!(
            "geometry cell holds a {} value", other.kind()
        ))),
    }
}

#[derive(Debug, Clone, Default)]
pub struct MetricProjector {
    parallel: bool,
}

impl MetricProjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Resolve every row of `table`. Only a missing geometry column fails the
    /// call; per-row failures are recorded on the row.
    pub fn project(
        &self,
        table: &FeatureTable,
        geometry_column: &str,
        source_crs: &str,
    ) -> Result<Vec<ProjectedFeature>> {
        let col = table.require_column(geometry_column)?;
        info!("Projecting {} rows from {} (parallel: {})", table.len(), source_crs, self.parallel);

        let rows = table.rows();
        let projected: Vec<Result<ProjectedFeature>> = if self.parallel {
            rows.par_iter()
                .enumerate()
                .map(|(id, row)| project_row(id, &row[col], source_crs))
                .collect()
        } else {
            rows.iter()
                .enumerate()
                .map(|(id, row)| project_row(id, &row[col], source_crs))
                .collect()
        };
        let projected = projected.into_iter().collect::<Result<Vec<_>>>()?;

        let failed = projected.iter().filter(|f| !f.is_resolved()).count();
        debug!("Projection finished: {} resolved, {} failed", projected.len() - failed, failed);
        Ok(projected)
    }

    /// Copy of `table` with the `metric_crs_id` and `length_m` columns added,
    /// plus the typed rows they came from.
    pub fn annotate(
        &self,
        table: &FeatureTable,
        geometry_column: &str,
        source_crs: &str,
    ) -> Result<(FeatureTable, Vec<ProjectedFeature>)> {
        let projected = self.project(table, geometry_column, source_crs)?;
        let annotated = annotate_table(table, &projected)?;
        Ok((annotated, projected))
    }
}

fn project_row(id: usize, cell: &Value, source_crs: &str) -> Result<ProjectedFeature> {
    let geometry = match decode_geometry(cell) {
        Ok(geometry) => geometry,
        Err(e) => {
            warn!("Row {}: {}", id, e);
            return Ok(ProjectedFeature::failed(id, None, source_crs, RowError::from_error(e)?));
        },
    };

    let feature = Feature { id, geometry, source_crs: source_crs.to_string() };
    match resolve(&feature.geometry, &feature.source_crs) {
        Ok(res) => Ok(ProjectedFeature::resolved(feature, res.metric_crs, res.length_m)),
        Err(e) => {
            warn!("Row {}: {}", id, e);
            let row_error = RowError::from_error(e)?;
            Ok(ProjectedFeature::failed(id, Some(feature.geometry), source_crs, row_error))
        },
    }
}

pub(crate) fn annotate_table(table: &FeatureTable, projected: &[ProjectedFeature]) -> Result<FeatureTable> {
    let metric: Vec<Value> = projected.iter()
        .map(|f| Value::from(f.metric_crs.map(i64::from)))
        .collect();
    let lengths: Vec<Value> = projected.iter()
        .map(|f| Value::from(f.length_m))
        .collect();

    table.with_column(METRIC_CRS_COLUMN, metric)?
        .with_column(LENGTH_COLUMN, lengths)
}
