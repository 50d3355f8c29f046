use std::collections::{BTreeMap, BTreeSet};
use linecluster::config::subsystems::{IndexBackend, ReferenceCrs};
use linecluster::{
    cluster_features, ClusterConfig, ClusterPipeline, ClusteredTable, FeatureTable, RowErrorKind,
    Value, CLUSTER_COLUMN, LENGTH_COLUMN, METRIC_CRS_COLUMN,
};

fn utm_segment(x: f64, y: f64, length: f64) -> String {
    format!("LINESTRING({} {}, {} {})", x, y, x + length, y)
}

fn named_table(geometries: &[String]) -> FeatureTable {
    let rows = geometries.iter()
        .enumerate()
        .map(|(i, wkt)| vec![Value::Int(i as i64), Value::from(wkt.as_str())])
        .collect();
    FeatureTable::with_rows(["name", "geometry"], rows).unwrap()
}

/// Clusters as sets of the `name` column, independent of numbering.
fn partition(result: &ClusteredTable) -> BTreeSet<BTreeSet<i64>> {
    let mut groups: BTreeMap<i64, BTreeSet<i64>> = BTreeMap::new();
    for row in 0..result.len() {
        let name = result.table.value(row, "name").and_then(Value::as_i64).unwrap();
        let cluster = result.table.value(row, CLUSTER_COLUMN).and_then(Value::as_i64).unwrap();
        groups.entry(cluster).or_default().insert(name);
    }
    groups.into_values().collect()
}

fn scattered_segments() -> Vec<String> {
    let offsets = [0.0, 3.0, 7.0, 15.0, 16.0, 30.0, 45.0, 47.0, 80.0, 81.5];
    offsets.iter()
        .enumerate()
        .map(|(i, dy)| utm_segment(500_000.0 + (i % 3) as f64 * 20.0, 5_000_000.0 + dy, 50.0))
        .collect()
}

#[test]
fn three_parallel_segments() {
    let table = named_table(&[
        utm_segment(500_000.0, 5_000_000.0, 100.0),
        utm_segment(500_000.0, 5_000_005.0, 100.0),
        utm_segment(500_000.0, 5_000_020.0, 100.0),
    ]);
    let result = cluster_features(&table, "geometry", "EPSG:32632", 10.0).unwrap();
    assert_eq!(result.cluster_ids(), vec![0, 0, 1]);
    assert_eq!(result.cluster_count(), 2);

    for row in 0..3 {
        assert_eq!(result.table.value(row, METRIC_CRS_COLUMN), Some(&Value::Int(32632)));
        let length = result.table.value(row, LENGTH_COLUMN).and_then(Value::as_f64).unwrap();
        assert!((length - 100.0).abs() < 1e-3);
    }
}

#[test]
fn three_parallel_segments_in_degrees() {
    // 5 m and 15 m apart at 50N, lon 10 (zone 32)
    let step = 1.0 / 111_230.0;
    let seg = |m: f64| format!("LINESTRING(10 {}, 10.001 {})", 50.0 + m * step, 50.0 + m * step);
    let table = named_table(&[seg(0.0), seg(5.0), seg(20.0)]);
    let result = cluster_features(&table, "geometry", "EPSG:4326", 10.0).unwrap();
    let expected: BTreeSet<BTreeSet<i64>> = [BTreeSet::from([0, 1]), BTreeSet::from([2])].into();
    assert_eq!(partition(&result), expected);
}

#[test]
fn single_feature_is_its_own_cluster() {
    for tolerance in [0.0, 1.0, 1_000.0] {
        let table = named_table(&[utm_segment(500_000.0, 5_000_000.0, 10.0)]);
        let result = cluster_features(&table, "geometry", "EPSG:32632", tolerance).unwrap();
        assert_eq!(result.cluster_count(), 1);
        assert_eq!(result.cluster_ids(), vec![0]);
    }
}

#[test]
fn touching_segments_across_utm_zones() {
    let table = named_table(&[
        "LINESTRING(5.99 45, 6 45)".to_string(),
        "LINESTRING(6 45, 6.01 45)".to_string(),
    ]);
    let result = cluster_features(&table, "geometry", "EPSG:4326", 0.0).unwrap();

    assert_eq!(result.table.value(0, METRIC_CRS_COLUMN), Some(&Value::Int(32631)));
    assert_eq!(result.table.value(1, METRIC_CRS_COLUMN), Some(&Value::Int(32632)));
    assert_eq!(result.reference_crs, Some(32631));
    assert_eq!(result.cluster_ids(), vec![0, 0]);
}

#[test]
fn separated_segments_across_utm_zones_stay_apart() {
    let table = named_table(&[
        "LINESTRING(5.99 45, 6 45)".to_string(),
        "LINESTRING(6.0001 45, 6.01 45)".to_string(),
    ]);
    // Gap is about 7.9 m
    let tight = cluster_features(&table, "geometry", "EPSG:4326", 5.0).unwrap();
    assert_eq!(tight.cluster_ids(), vec![0, 1]);
    let loose = cluster_features(&table, "geometry", "EPSG:4326", 10.0).unwrap();
    assert_eq!(loose.cluster_ids(), vec![0, 0]);
}

#[test]
fn empty_collection_returns_empty_result() {
    let table = FeatureTable::new(["name", "geometry"]);
    let result = cluster_features(&table, "geometry", "EPSG:4326", 5.0).unwrap();
    assert!(result.is_empty());
    assert!(result.features.is_empty());
    assert!(result.assignment.is_empty());
}

#[test]
fn transitive_closure_links_chain() {
    // A-B 5 m, B-C 5 m, A-C 10 m; tolerance 6 joins all three
    let table = named_table(&[
        utm_segment(500_000.0, 5_000_000.0, 100.0),
        utm_segment(500_000.0, 5_000_005.0, 100.0),
        utm_segment(500_000.0, 5_000_010.0, 100.0),
    ]);
    let result = cluster_features(&table, "geometry", "EPSG:32632", 6.0).unwrap();
    assert_eq!(result.cluster_ids(), vec![0, 0, 0]);
}

#[test]
fn every_row_gets_exactly_one_cluster() {
    let mut geometries = scattered_segments();
    geometries.push("LINESTRING(oops".to_string());
    geometries.push("LINESTRING EMPTY".to_string());
    let mut table = named_table(&geometries);
    table.push_row(vec![Value::Int(99), Value::Null]).unwrap();

    let result = cluster_features(&table, "geometry", "EPSG:32632", 2.0).unwrap();
    assert_eq!(result.len(), table.len());
    assert_eq!(result.assignment.len(), table.len());
    for row in 0..result.len() {
        assert!(result.table.value(row, CLUSTER_COLUMN).and_then(Value::as_i64).is_some());
    }

    let failed = result.failed_rows();
    assert_eq!(failed.len(), 3);
    assert!(failed.iter().all(|f| f.error.as_ref().unwrap().kind == RowErrorKind::InvalidGeometry));
    for f in failed {
        assert_eq!(result.table.value(f.id, METRIC_CRS_COLUMN), Some(&Value::Null));
        assert_eq!(result.table.value(f.id, LENGTH_COLUMN), Some(&Value::Null));
        // Unresolved rows are singletons
        let cluster = result.assignment.cluster_of(f.id).unwrap();
        assert_eq!(result.assignment.clusters()[cluster], vec![f.id]);
    }
}

#[test]
fn unknown_source_crs_leaves_every_row_alone() {
    let table = named_table(&[
        utm_segment(500_000.0, 5_000_000.0, 100.0),
        utm_segment(500_100.0, 5_000_000.0, 100.0),
        utm_segment(500_200.0, 5_000_000.0, 100.0),
    ]);
    let result = cluster_features(&table, "geometry", "EPSG:9999", 10.0).unwrap();
    assert_eq!(result.reference_crs, None);
    assert_eq!(result.cluster_ids(), vec![0, 1, 2]);
    assert_eq!(result.failed_rows().len(), 3);
    for row in 0..result.len() {
        assert_eq!(result.features[row].error.as_ref().unwrap().kind, RowErrorKind::UnknownCrs);
        assert_eq!(result.table.value(row, METRIC_CRS_COLUMN), Some(&Value::Null));
        assert_eq!(result.table.value(row, LENGTH_COLUMN), Some(&Value::Null));
    }
}

#[test]
fn touching_pair_far_from_reference_zone_stays_joined() {
    let table = named_table(&[
        "LINESTRING(3 10, 3.01 10)".to_string(),
        "LINESTRING(3 11, 3.01 11)".to_string(),
        "LINESTRING(3 12, 3.01 12)".to_string(),
        "LINESTRING(92.99 0, 93 0)".to_string(),
        "LINESTRING(93 0, 93.01 0)".to_string(),
    ]);
    let result = cluster_features(&table, "geometry", "EPSG:4326", 0.0).unwrap();
    assert_eq!(result.reference_crs, Some(32631));
    assert_eq!(result.cluster_ids(), vec![0, 1, 2, 3, 3]);
    assert_eq!(result.table.value(3, METRIC_CRS_COLUMN), Some(&Value::Int(32646)));
}

#[test]
fn repeated_runs_are_identical() {
    let table = named_table(&scattered_segments());
    let first = cluster_features(&table, "geometry", "EPSG:32632", 4.0).unwrap();
    let second = cluster_features(&table, "geometry", "EPSG:32632", 4.0).unwrap();
    assert_eq!(first, second);
}

#[test]
fn row_order_does_not_change_partition() {
    let geometries = scattered_segments();
    let table = named_table(&geometries);

    let mut reversed_rows: Vec<Vec<Value>> = table.rows().to_vec();
    reversed_rows.reverse();
    let reversed = FeatureTable::with_rows(["name", "geometry"], reversed_rows).unwrap();

    let mut rotated_rows: Vec<Vec<Value>> = table.rows().to_vec();
    rotated_rows.rotate_left(4);
    let rotated = FeatureTable::with_rows(["name", "geometry"], rotated_rows).unwrap();

    for tolerance in [0.0, 2.0, 5.0, 20.0] {
        let base = partition(&cluster_features(&table, "geometry", "EPSG:32632", tolerance).unwrap());
        let rev = partition(&cluster_features(&reversed, "geometry", "EPSG:32632", tolerance).unwrap());
        let rot = partition(&cluster_features(&rotated, "geometry", "EPSG:32632", tolerance).unwrap());
        assert_eq!(base, rev, "tolerance {}", tolerance);
        assert_eq!(base, rot, "tolerance {}", tolerance);
    }
}

#[test]
fn numbering_follows_smallest_row() {
    let table = named_table(&[
        utm_segment(500_000.0, 5_000_100.0, 10.0),
        utm_segment(500_000.0, 5_000_000.0, 10.0),
        utm_segment(500_000.0, 5_000_101.0, 10.0),
        utm_segment(500_000.0, 5_000_001.0, 10.0),
    ]);
    let result = cluster_features(&table, "geometry", "EPSG:32632", 2.0).unwrap();
    assert_eq!(result.cluster_ids(), vec![0, 1, 0, 1]);
}

#[test]
fn larger_tolerance_only_merges() {
    let table = named_table(&scattered_segments());
    let tolerances = [0.0, 1.0, 2.0, 4.0, 8.0, 16.0, 40.0];
    let partitions: Vec<_> = tolerances.iter()
        .map(|&t| partition(&cluster_features(&table, "geometry", "EPSG:32632", t).unwrap()))
        .collect();

    for pair in partitions.windows(2) {
        let (fine, coarse) = (&pair[0], &pair[1]);
        assert!(coarse.len() <= fine.len());
        for cluster in fine {
            let containing = coarse.iter().filter(|c| cluster.is_subset(c)).count();
            assert_eq!(containing, 1, "cluster {:?} not inside exactly one of {:?}", cluster, coarse);
        }
    }
}

#[test]
fn configured_variants_agree() {
    let table = named_table(&scattered_segments());
    let mut base = ClusterConfig::default();
    base.projection.source_crs = "EPSG:32632".to_string();
    base.clustering.tolerance_m = 4.0;

    let expected = ClusterPipeline::new(base.clone()).unwrap().run(&table).unwrap();

    let mut brute = base.clone();
    brute.clustering.index = IndexBackend::BruteForce;
    let mut parallel = base.clone();
    parallel.clustering.parallel = true;
    let mut fixed = base.clone();
    fixed.projection.reference_crs = ReferenceCrs::Fixed(32632);

    for config in [brute, parallel, fixed] {
        let result = ClusterPipeline::new(config).unwrap().run(&table).unwrap();
        assert_eq!(result.cluster_ids(), expected.cluster_ids());
    }
}

#[test]
fn input_table_is_not_mutated() {
    let table = named_table(&scattered_segments());
    let before = table.clone();
    let result = cluster_features(&table, "geometry", "EPSG:32632", 3.0).unwrap();
    assert_eq!(table, before);
    assert_eq!(result.table.columns().len(), before.columns().len() + 3);
    for row in 0..table.len() {
        assert_eq!(result.table.value(row, "name"), table.value(row, "name"));
        assert_eq!(result.table.value(row, "geometry"), table.value(row, "geometry"));
    }
}
