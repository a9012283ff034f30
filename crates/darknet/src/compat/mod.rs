//! # Compat
//!
//! Shape utilities that are not (yet) provided by ``burn``.

pub mod conv_shape;
