//! # Global Average Pooling
//!
//! Averages a ``[batch, channels, height, width]`` feature map over its
//! spatial dims, producing a ``[batch, channels]`` feature vector.
use burn::module::Module;
use burn::nn::pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// Global average pooling, with the spatial dims flattened away.
#[derive(Module, Clone, Debug)]
pub struct GlobalAvgPool2d {
    pool: AdaptiveAvgPool2d,
}

impl Default for GlobalAvgPool2d {
    fn default() -> Self {
        Self::new()
    }
}

impl GlobalAvgPool2d {
    /// Create a new [`GlobalAvgPool2d`].
    pub fn new() -> Self {
        Self {
            pool: AdaptiveAvgPool2dConfig::new([1, 1]).init(),
        }
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, channels, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, channels]``
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch, channels, _, _] = input.dims();

        let x = self.pool.forward(input);
        x.reshape([batch, channels])
    }
}
