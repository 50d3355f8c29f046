// types.rs
use std::collections::BTreeMap;
use std::fmt;
use geo_types::Geometry;
use serde::{Serialize, Deserialize};
use crate::error::{Error, Result};

pub const METRIC_CRS_COLUMN: &str = "metric_crs_id";
pub const LENGTH_COLUMN: &str = "length_m";
pub const CLUSTER_COLUMN: &str = "cluster_id";

/// A single cell of a [`FeatureTable`].
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Geometry(Geometry<f64>),
}

impl Value {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(v) => Some(*v),
            Value::Int(v) => Some(*v as f64),
            _ => None,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "bool",
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Geometry(_) => "geometry",
        }
    }
}

impl From<i64> for Value {
    fn from(v: i64) -> Self {
        Value::Int(v)
    }
}

impl From<f64> for Value {
    fn from(v: f64) -> Self {
        Value::Float(v)
    }
}

impl From<bool> for Value {
    fn from(v: bool) -> Self {
        Value::Bool(v)
    }
}

impl From<&str> for Value {
    fn from(v: &str) -> Self {
        Value::Text(v.to_string())
    }
}

impl From<String> for Value {
    fn from(v: String) -> Self {
        Value::Text(v)
    }
}

impl From<Geometry<f64>> for Value {
    fn from(v: Geometry<f64>) -> Self {
        Value::Geometry(v)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(Value::Null)
    }
}

/// Row-oriented table with one geometry-bearing column.
///
/// Row position is the feature id used throughout the pipeline.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FeatureTable {
    columns: Vec<String>,
    rows: Vec<Vec<Value>>,
}

impl FeatureTable {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows<S: Into<String>>(
        columns: impl IntoIterator<Item = S>,
        rows: Vec<Vec<Value>>,
    ) -> Result<Self> {
        let mut table = Self::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    pub fn push_row(&mut self, row: Vec<Value>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(Error::RowWidth {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn rows(&self) -> &[Vec<Value>] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn require_column(&self, name: &str) -> Result<usize> {
        self.column_index(name)
            .ok_or_else(|| Error::MissingColumn(name.to_string()))
    }

    pub fn value(&self, row: usize, column: &str) -> Option<&Value> {
        let col = self.column_index(column)?;
        self.rows.get(row).map(|r| &r[col])
    }

    /// Copy of this table with `values` set as column `name`; an existing
    /// column of that name is overwritten in place.
    pub fn with_column(&self, name: &str, values: Vec<Value>) -> Result<Self> {
        if values.len() != self.rows.len() {
            return Err(Error::internal(format!(
                "column '{}' has {} values for {} rows", name, values.len(), self.rows.len()
            )));
        }

        let mut table = self.clone();
        match table.column_index(name) {
            Some(col) => {
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row[col] = value;
                }
            },
            None => {
                table.columns.push(name.to_string());
                for (row, value) in table.rows.iter_mut().zip(values) {
                    row.push(value);
                }
            },
        }
        Ok(table)
    }
}

/// A decoded input row ready for metric resolution.
#[derive(Debug, Clone, PartialEq)]
pub struct Feature {
    pub id: usize,
    pub geometry: Geometry<f64>,
    pub source_crs: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum RowErrorKind {
    InvalidGeometry,
    UnknownCrs,
}

/// Why a row carries sentinel metric values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RowError {
    pub kind: RowErrorKind,
    pub message: String,
}

impl RowError {
    /// Only row-level errors can be attached to a row; anything else is
    /// handed back unchanged.
    pub fn from_error(err: Error) -> std::result::Result<Self, Error> {
        match err {
            Error::InvalidGeometry(message) => Ok(Self { kind: RowErrorKind::InvalidGeometry, message }),
            Error::UnknownCrs(message) => Ok(Self { kind: RowErrorKind::UnknownCrs, message }),
            other => Err(other),
        }
    }
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            RowErrorKind::InvalidGeometry => write!(f, "invalid geometry: {}", self.message),
            RowErrorKind::UnknownCrs => write!(f, "unknown CRS: {}", self.message),
        }
    }
}

/// A row after metric resolution. `metric_crs` and `length_m` are `None`
/// exactly when `error` is set.
#[derive(Debug, Clone, PartialEq)]
pub struct ProjectedFeature {
    pub id: usize,
    pub geometry: Option<Geometry<f64>>,
    pub source_crs: String,
    pub metric_crs: Option<u32>,
    pub length_m: Option<f64>,
    pub error: Option<RowError>,
}

impl ProjectedFeature {
    pub fn resolved(feature: Feature, metric_crs: u32, length_m: f64) -> Self {
        Self {
            id: feature.id,
            geometry: Some(feature.geometry),
            source_crs: feature.source_crs,
            metric_crs: Some(metric_crs),
            length_m: Some(length_m),
            error: None,
        }
    }

    pub fn failed(id: usize, geometry: Option<Geometry<f64>>, source_crs: &str, error: RowError) -> Self {
        Self {
            id,
            geometry,
            source_crs: source_crs.to_string(),
            metric_crs: None,
            length_m: None,
            error: Some(error),
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.error.is_none() && self.metric_crs.is_some()
    }
}

/// Feature id to cluster id. Cluster ids are dense, starting at 0, in
/// ascending order of each cluster's smallest feature id.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterAssignment {
    labels: BTreeMap<usize, usize>,
    cluster_count: usize,
}

impl ClusterAssignment {
    pub(crate) fn from_labels(labels: BTreeMap<usize, usize>, cluster_count: usize) -> Self {
        Self { labels, cluster_count }
    }

    pub fn cluster_of(&self, feature_id: usize) -> Option<usize> {
        self.labels.get(&feature_id).copied()
    }

    pub fn cluster_count(&self) -> usize {
        self.cluster_count
    }

    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// (feature id, cluster id) pairs in ascending feature id order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, usize)> + '_ {
        self.labels.iter().map(|(&id, &cluster)| (id, cluster))
    }

    /// Members of every cluster, indexed by cluster id, each sorted ascending.
    pub fn clusters(&self) -> Vec<Vec<usize>> {
        let mut clusters = vec![Vec::new(); self.cluster_count];
        for (&id, &cluster) in &self.labels {
            clusters[cluster].push(id);
        }
        clusters
    }
}
