mod settings;

pub use settings::{
    BusConfig, HealthConfig, HttpConfig, MeshConfig, RuntimeConfig, SimilarityConfig,
};
