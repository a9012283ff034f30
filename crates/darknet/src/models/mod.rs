//! # Model Families
pub mod darknet;
