// cluster/mod.rs
pub mod spatial;
pub mod graph;
pub mod labeler;

pub use self::graph::{select_reference_crs, GraphBuilder, ProximityGraph};
pub use self::labeler::label_components;
pub use self::spatial::{new_index, BruteForceIndex, RTreeIndex, SpatialIndex};
