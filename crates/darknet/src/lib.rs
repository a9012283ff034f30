#![warn(missing_docs)]
//!# darknet - DarkNet Backbones for Burn
//!
//! ## Notable Components
//!
//! * [`compat`] - shape arithmetic not (yet) provided by ``burn``.
//! * [`layers`] - reusable neural network modules.
//!   * [`layers::activation`] - activation layer abstraction wrapper.
//!   * [`layers::blocks::cna`] - ``Conv2d + BatchNorm2d + Activation`` block.
//!   * [`layers::pool`] - downsampling and global average pooling.
//! * [`models`] - complete model families.
//!   * [`models::darknet`] - DarkNet-19 and DarkNet-53.
//!     * [`models::darknet::init`] - the DarkNet weight initialization policy.
//!     * [`models::darknet::prefabs`] - well-known DarkNet configs.
//! * [`prefabs`] - named config builders.
//! * [`summary`] - parameter counts and sample shapes.

/// Test-only macro import.
#[cfg(test)]
#[allow(unused_imports)]
#[macro_use]
extern crate hamcrest;

pub mod compat;
pub mod layers;
pub mod models;
pub mod prefabs;
pub mod summary;
