//! # Pooling Layers
pub mod downsample_pool;
pub mod global_avg_pool;
