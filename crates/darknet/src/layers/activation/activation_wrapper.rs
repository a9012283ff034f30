//! # Activation Layer Wrapper
//!
//! DarkNet conv blocks are followed by a [`LeakyRelu`] by default,
//! and by a plain [`Relu`] when the leaky variant is disabled.
//! A learned-slope [`PRelu`] is also supported.
use burn::nn::{LeakyRelu, LeakyReluConfig, PRelu, PReluConfig, Relu};
use burn::prelude::{Backend, Config, Module, Tensor};

/// Default negative slope of the DarkNet [`LeakyRelu`].
pub const DARKNET_LEAKY_SLOPE: f64 = 0.01;

/// [`Activation`] Configuration.
#[derive(Config, Debug)]
#[non_exhaustive]
pub enum ActivationConfig {
    /// [`Relu`] activation layer.
    Relu,

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyReluConfig),

    /// [`PRelu`] activation layer.
    PRelu(PReluConfig),
}

impl From<LeakyReluConfig> for ActivationConfig {
    fn from(config: LeakyReluConfig) -> Self {
        Self::LeakyRelu(config)
    }
}

impl From<PReluConfig> for ActivationConfig {
    fn from(config: PReluConfig) -> Self {
        Self::PRelu(config)
    }
}

impl Default for ActivationConfig {
    fn default() -> Self {
        Self::leaky_relu()
    }
}

impl ActivationConfig {
    /// The DarkNet [`LeakyRelu`], with a negative slope of [`DARKNET_LEAKY_SLOPE`].
    pub fn leaky_relu() -> Self {
        LeakyReluConfig::new()
            .with_negative_slope(DARKNET_LEAKY_SLOPE)
            .into()
    }

    /// Select between the leaky (`true`) and plain (`false`) relu.
    pub fn from_leaky_flag(leaky: bool) -> Self {
        if leaky { Self::leaky_relu() } else { Self::Relu }
    }

    /// Initialize a wrapped activation layer.
    pub fn init<B: Backend>(
        &self,
        device: &B::Device,
    ) -> Activation<B> {
        match self {
            ActivationConfig::Relu => Activation::Relu(Relu::new()),
            ActivationConfig::LeakyRelu(conf) => Activation::LeakyRelu(conf.init()),
            ActivationConfig::PRelu(conf) => Activation::PRelu(conf.init(device)),
        }
    }
}

/// Activation Layer Wrapper.
#[derive(Module, Debug)]
#[non_exhaustive]
pub enum Activation<B: Backend> {
    /// [`Relu`] activation layer.
    Relu(Relu),

    /// [`LeakyRelu`] activation layer.
    LeakyRelu(LeakyRelu),

    /// [`PRelu`] activation layer.
    PRelu(PRelu<B>),
}

impl<B: Backend> Activation<B> {
    /// Forward pass.
    pub fn forward<const D: usize>(
        &self,
        input: Tensor<B, D>,
    ) -> Tensor<B, D> {
        match self {
            Activation::Relu(layer) => layer.forward(input),
            Activation::LeakyRelu(layer) => layer.forward(input),
            Activation::PRelu(layer) => layer.forward(input),
        }
    }

    /// Build a [`ActivationConfig`] for this module.
    pub fn to_config(&self) -> ActivationConfig {
        match self {
            Activation::Relu(_) => ActivationConfig::Relu,
            Activation::LeakyRelu(layer) => LeakyReluConfig::new()
                .with_negative_slope(layer.negative_slope)
                .into(),
            Activation::PRelu(layer) => PReluConfig::new()
                .with_alpha(layer.alpha_value)
                .with_num_parameters(layer.num_params())
                .into(),
        }
    }
}
