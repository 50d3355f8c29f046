use std::io::Write;
use std::path::PathBuf;
use chrono::Local;
use clap::Parser;
use env_logger::Builder;
use log::{info, warn};
use linecluster::{
    ClusterConfig, ClusterPipeline, FeatureTable, Value,
    CLUSTER_COLUMN, LENGTH_COLUMN, METRIC_CRS_COLUMN,
};
use linecluster::config::subsystems::IndexBackend;

/// Cluster a small synthetic set of curb segments and print the result.
#[derive(Debug, Parser)]
#[command(name = "cluster_demo")]
struct Args {
    /// INI file with [projection] and [clustering] sections
    config: Option<PathBuf>,

    /// Override the clustering tolerance in meters
    #[arg(long)]
    tolerance: Option<f64>,

    /// Use the brute-force index instead of the R-tree
    #[arg(long)]
    brute_force: bool,

    /// Run projection and candidate checks on the rayon pool
    #[arg(long)]
    parallel: bool,
}

// Meters to degrees of latitude, close enough for a demo around 45-50N
const DEG_PER_METER_LAT: f64 = 1.0 / 111_230.0;

fn offset_segment(lon: f64, lat: f64, north_m: f64, length_deg: f64) -> String {
    let lat = lat + north_m * DEG_PER_METER_LAT;
    format!("LINESTRING({} {}, {} {})", lon, lat, lon + length_deg, lat)
}

fn demo_table() -> linecluster::Result<FeatureTable> {
    let rows = vec![
        vec!["curb-a".into(), offset_segment(10.0, 50.0, 0.0, 0.001).into()],
        vec!["curb-b".into(), offset_segment(10.0, 50.0, 5.0, 0.001).into()],
        vec!["curb-c".into(), offset_segment(10.0, 50.0, 20.0, 0.001).into()],
        vec!["zone31-edge".into(), "LINESTRING(5.99 45, 6 45)".into()],
        vec!["zone32-edge".into(), "LINESTRING(6 45, 6.01 45)".into()],
        vec!["missing".into(), Value::Null],
    ];
    FeatureTable::with_rows(["name", "geometry"], rows)
}

fn format_cell(value: Option<&Value>) -> String {
    match value {
        Some(Value::Int(v)) => v.to_string(),
        Some(Value::Float(v)) => format!("{:.2}", v),
        Some(Value::Text(v)) => v.clone(),
        _ => "-".to_string(),
    }
}

fn main() -> linecluster::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => ClusterConfig::from_ini(path)?,
        None => ClusterConfig::default(),
    };
    if let Some(tolerance) = args.tolerance {
        config.clustering.tolerance_m = tolerance;
    } else if args.config.is_none() {
        config.clustering.tolerance_m = 10.0;
    }
    if args.brute_force {
        config.clustering.index = IndexBackend::BruteForce;
    }
    config.clustering.parallel |= args.parallel;

    Builder::new()
        .format(|buf, record| {
            writeln!(buf,
                "{} [{}] - {}",
                Local::now().format("%Y-%m-%d %H:%M:%S"),
                record.level(),
                record.args()
            )
        })
        .filter(None, config.clustering.get_log_level())
        .init();

    info!("Starting cluster demo with index {}", config.clustering.index.as_str());

    let pipeline = ClusterPipeline::new(config)?;
    let table = demo_table()?;
    let result = pipeline.run(&table)?;

    for failed in result.failed_rows() {
        if let Some(err) = &failed.error {
            warn!("Row {} left unresolved: {}", failed.id, err);
        }
    }

    println!("{:<12} {:>10} {:>12} {:>8}", "name", METRIC_CRS_COLUMN, LENGTH_COLUMN, CLUSTER_COLUMN);
    for row in 0..result.len() {
        println!("{:<12} {:>10} {:>12} {:>8}",
            format_cell(result.table.value(row, "name")),
            format_cell(result.table.value(row, METRIC_CRS_COLUMN)),
            format_cell(result.table.value(row, LENGTH_COLUMN)),
            format_cell(result.table.value(row, CLUSTER_COLUMN)),
        );
    }
    println!("{} clusters, reference CRS {}",
        result.cluster_count(),
        result.reference_crs.map(|c| format!("EPSG:{}", c)).unwrap_or_else(|| "-".to_string()));

    Ok(())
}
