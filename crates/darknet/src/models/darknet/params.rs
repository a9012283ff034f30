//! # Trainable Parameter Counts
//!
//! burn's [`Module::num_params`] counts every float tensor a module visits,
//! including the [`BatchNorm`] running mean and variance.
//! [`TrainableParams`] counts only the learned parameters:
//!
//! * [`Conv2d`] - weight, and bias if present.
//! * [`BatchNorm`] - gamma and beta.
//! * [`Linear`] - weight, and bias if present.
//!
//! Composite modules implement [`TrainableParams`] by summing their children.

use crate::layers::activation::Activation;
use crate::layers::blocks::cna::CNA2d;
use burn::module::Module;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, Linear};
use burn::prelude::Backend;

/// Count the learned parameters of a module.
pub trait TrainableParams {
    /// Number of learned parameter elements.
    fn num_trainable_params(&self) -> usize;
}

impl<B: Backend> TrainableParams for Conv2d<B> {
    fn num_trainable_params(&self) -> usize {
        self.weight.shape().num_elements()
            + self
                .bias
                .as_ref()
                .map_or(0, |bias| bias.shape().num_elements())
    }
}

impl<B: Backend> TrainableParams for BatchNorm<B, 2> {
    fn num_trainable_params(&self) -> usize {
        self.gamma.shape().num_elements() + self.beta.shape().num_elements()
    }
}

impl<B: Backend> TrainableParams for Linear<B> {
    fn num_trainable_params(&self) -> usize {
        self.weight.shape().num_elements()
            + self
                .bias
                .as_ref()
                .map_or(0, |bias| bias.shape().num_elements())
    }
}

impl<B: Backend> TrainableParams for Activation<B> {
    fn num_trainable_params(&self) -> usize {
        // Activations carry no running state.
        self.num_params()
    }
}

impl<B: Backend> TrainableParams for CNA2d<B> {
    fn num_trainable_params(&self) -> usize {
        self.conv.num_trainable_params()
            + self.norm.num_trainable_params()
            + self.act.num_trainable_params()
    }
}

impl<M: TrainableParams> TrainableParams for Vec<M> {
    fn num_trainable_params(&self) -> usize {
        self.iter().map(|m| m.num_trainable_params()).sum()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layers::activation::ActivationConfig;
    use crate::layers::blocks::cna::CNA2dConfig;
    use burn::backend::NdArray;
    use burn::nn::conv::Conv2dConfig;
    use burn::nn::{BatchNormConfig, LinearConfig, PReluConfig};

    type B = NdArray<f32>;

    #[test]
    fn test_leaf_counts() {
        let device = Default::default();

        let conv: Conv2d<B> = Conv2dConfig::new([3, 32], [3, 3]).init(&device);
        assert_eq!(conv.num_trainable_params(), 3 * 32 * 9 + 32);

        let conv: Conv2d<B> = Conv2dConfig::new([3, 32], [3, 3])
            .with_bias(false)
            .init(&device);
        assert_eq!(conv.num_trainable_params(), 3 * 32 * 9);

        let norm: BatchNorm<B, 2> = BatchNormConfig::new(32).init(&device);
        assert_eq!(norm.num_trainable_params(), 2 * 32);

        let linear: Linear<B> = LinearConfig::new(1024, 10).init(&device);
        assert_eq!(linear.num_trainable_params(), 1024 * 10 + 10);
    }

    #[test]
    fn test_running_stats_are_not_trainable() {
        let device = Default::default();

        let block: CNA2d<B> = CNA2dConfig::new(3, 32, 3).init(&device);
        let trainable = block.num_trainable_params();
        assert_eq!(trainable, 3 * 32 * 9 + 2 * 32);

        // `num_params` also visits the running mean and variance.
        assert_eq!(block.num_params(), trainable + 2 * 32);
    }

    #[test]
    fn test_prelu_alpha_is_trainable() {
        let device = Default::default();

        let block: CNA2d<B> = CNA2dConfig::new(3, 8, 1)
            .with_act(ActivationConfig::PRelu(PReluConfig::new()))
            .init(&device);
        assert_eq!(block.num_trainable_params(), 3 * 8 + 2 * 8 + 1);

        let blocks = vec![block.clone(), block];
        assert_eq!(blocks.num_trainable_params(), 2 * (3 * 8 + 2 * 8 + 1));
    }
}
