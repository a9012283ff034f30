//! # DarkNet Weight Initialization
//!
//! [`DarkNetInitConfig`] describes the initialization policy, and
//! [`InitWeights`] applies it, dispatched by module kind:
//!
//! * [`Conv2d`] - Kaiming normal weights (fan-in mode, leaky-relu gain); zero bias.
//! * [`BatchNorm`] - unit gamma; zero beta.
//! * [`Linear`] - ``Normal(0, 0.01)`` weights; zero bias.
//!
//! Composite modules implement [`InitWeights`] by delegating to their children.

use crate::layers::blocks::cna::CNA2d;
use burn::config::Config;
use burn::module::Param;
use burn::nn::conv::Conv2d;
use burn::nn::{BatchNorm, Linear};
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;

/// Kaiming gain for a leaky relu with the given negative slope.
///
/// ``gain = sqrt(2 / (1 + negative_slope^2))``
pub fn leaky_relu_gain(negative_slope: f64) -> f64 {
    (2.0 / (1.0 + negative_slope * negative_slope)).sqrt()
}

/// DarkNet weight initialization policy.
#[derive(Config, Debug)]
pub struct DarkNetInitConfig {
    /// Negative slope used to derive the conv Kaiming gain.
    ///
    /// Zero yields the standard ``sqrt(2)`` gain.
    #[config(default = 0.0)]
    pub conv_negative_slope: f64,

    /// Mean of the linear layer weight distribution.
    #[config(default = 0.0)]
    pub linear_mean: f64,

    /// Standard deviation of the linear layer weight distribution.
    #[config(default = 0.01)]
    pub linear_std: f64,
}

impl Default for DarkNetInitConfig {
    fn default() -> Self {
        Self::new()
    }
}

impl DarkNetInitConfig {
    /// Standard deviation of conv weights for the given fan-in.
    pub fn conv_std(
        &self,
        fan_in: usize,
    ) -> f64 {
        leaky_relu_gain(self.conv_negative_slope) / (fan_in as f64).sqrt()
    }

    /// Apply this policy to a module.
    pub fn apply<B: Backend, M: InitWeights<B>>(
        &self,
        module: M,
    ) -> M {
        module.init_weights(self)
    }
}

/// Re-initialize module weights under a [`DarkNetInitConfig`].
pub trait InitWeights<B: Backend>: Sized {
    /// Consume the module, returning it with re-initialized weights.
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self;
}

/// Replace a parameter's value, keeping its id.
pub(crate) fn reset_param<B: Backend, const D: usize, F>(
    param: Param<Tensor<B, D>>,
    f: F,
) -> Param<Tensor<B, D>>
where
    F: FnOnce(Tensor<B, D>) -> Tensor<B, D>,
{
    let id = param.id;
    let value = f(param.val()).detach().require_grad();
    Param::initialized(id, value)
}

fn normal_like<B: Backend, const D: usize>(
    tensor: Tensor<B, D>,
    mean: f64,
    std: f64,
) -> Tensor<B, D> {
    Tensor::random(tensor.shape(), Distribution::Normal(mean, std), &tensor.device())
}

impl<B: Backend> InitWeights<B> for Conv2d<B> {
    fn init_weights(
        mut self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        let [_, channels_per_group, kernel_height, kernel_width] = self.weight.dims();
        let std = policy.conv_std(channels_per_group * kernel_height * kernel_width);

        self.weight = reset_param(self.weight, |w| normal_like(w, 0.0, std));
        self.bias = self.bias.map(|b| reset_param(b, |b| b.zeros_like()));
        self
    }
}

impl<B: Backend> InitWeights<B> for BatchNorm<B, 2> {
    fn init_weights(
        mut self,
        _policy: &DarkNetInitConfig,
    ) -> Self {
        self.gamma = reset_param(self.gamma, |g| g.ones_like());
        self.beta = reset_param(self.beta, |b| b.zeros_like());
        self
    }
}

impl<B: Backend> InitWeights<B> for Linear<B> {
    fn init_weights(
        mut self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        let (mean, std) = (policy.linear_mean, policy.linear_std);
        self.weight = reset_param(self.weight, |w| normal_like(w, mean, std));
        self.bias = self.bias.map(|b| reset_param(b, |b| b.zeros_like()));
        self
    }
}

impl<B: Backend> InitWeights<B> for CNA2d<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        let CNA2d { conv, norm, act } = self;
        CNA2d {
            conv: conv.init_weights(policy),
            norm: norm.init_weights(policy),
            act,
        }
    }
}

impl<B: Backend, M: InitWeights<B>> InitWeights<B> for Vec<M> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        self.into_iter().map(|m| m.init_weights(policy)).collect()
    }
}
