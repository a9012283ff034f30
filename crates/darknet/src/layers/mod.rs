//! Reusable layers for composing DarkNet backbones in Burn.
pub mod activation;
pub mod blocks;
pub mod pool;
