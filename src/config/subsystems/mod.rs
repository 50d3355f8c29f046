pub mod projection;
pub mod clustering;

pub use projection::{ProjectionConfig, ReferenceCrs};
pub use clustering::{ClusteringConfig, IndexBackend};
