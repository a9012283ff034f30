//! # Blocks
pub mod cna;
