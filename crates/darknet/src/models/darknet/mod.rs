//! # DarkNet
//!
//! The DarkNet backbone family:
//! * [`darknet19`] - a plain conv/max-pool stack with a fully convolutional head.
//! * [`darknet53`] - a residual stack with a linear head.
//!
//! [`DarkNetConfig`] and [`DarkNet`] wrap both behind a uniform API.
//!
//! ```rust,no_run
//! use burn::backend::NdArray;
//! use darknet::models::darknet::{DarkNet, darknet53};
//!
//! let device = Default::default();
//! let model: DarkNet<NdArray> = darknet53(1000, true).init(&device);
//! ```

pub mod darknet19;
pub mod darknet53;
pub mod features;
pub mod init;
pub mod params;
pub mod prefabs;
pub mod residual_block;

use crate::models::darknet::darknet19::{DarkNet19, DarkNet19Config};
use crate::models::darknet::darknet53::{DarkNet53, DarkNet53Config};
use crate::models::darknet::features::DarkNetFeatures;
use crate::models::darknet::init::{DarkNetInitConfig, InitWeights};
use crate::models::darknet::params::TrainableParams;
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// Build a [`DarkNetConfig`] for DarkNet-19.
pub fn darknet19(
    num_classes: usize,
    init_weights: bool,
) -> DarkNetConfig {
    DarkNet19Config::new()
        .with_num_classes(num_classes)
        .with_init_weights(init_weights)
        .into()
}

/// Build a [`DarkNetConfig`] for DarkNet-53.
pub fn darknet53(
    num_classes: usize,
    init_weights: bool,
) -> DarkNetConfig {
    DarkNet53Config::new()
        .with_num_classes(num_classes)
        .with_init_weights(init_weights)
        .into()
}

/// [`DarkNet`] Config.
#[derive(Config, Debug)]
pub enum DarkNetConfig {
    /// DarkNet-19.
    DarkNet19(DarkNet19Config),

    /// DarkNet-53.
    DarkNet53(DarkNet53Config),
}

impl From<DarkNet19Config> for DarkNetConfig {
    fn from(config: DarkNet19Config) -> Self {
        Self::DarkNet19(config)
    }
}

impl From<DarkNet53Config> for DarkNetConfig {
    fn from(config: DarkNet53Config) -> Self {
        Self::DarkNet53(config)
    }
}

impl DarkNetConfig {
    /// The model family name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DarkNet19(_) => "DarkNet19",
            Self::DarkNet53(_) => "DarkNet53",
        }
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        match self {
            Self::DarkNet19(config) => config.num_classes,
            Self::DarkNet53(config) => config.num_classes,
        }
    }

    /// Set the number of output classes.
    pub fn with_num_classes(
        self,
        num_classes: usize,
    ) -> Self {
        match self {
            Self::DarkNet19(config) => config.with_num_classes(num_classes).into(),
            Self::DarkNet53(config) => config.with_num_classes(num_classes).into(),
        }
    }

    /// Enable or disable the init policy.
    pub fn with_init_weights(
        self,
        init_weights: bool,
    ) -> Self {
        match self {
            Self::DarkNet19(config) => config.with_init_weights(init_weights).into(),
            Self::DarkNet53(config) => config.with_init_weights(init_weights).into(),
        }
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        match self {
            Self::DarkNet19(config) => config.try_validate(),
            Self::DarkNet53(config) => config.try_validate(),
        }
    }

    /// Initialize a [`DarkNet`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DarkNet<B> {
        match self {
            Self::DarkNet19(config) => DarkNet::DarkNet19(config.init(device)),
            Self::DarkNet53(config) => DarkNet::DarkNet53(config.init(device)),
        }
    }
}

/// A DarkNet model.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum DarkNet<B: Backend> {
    /// DarkNet-19.
    DarkNet19(DarkNet19<B>),

    /// DarkNet-53.
    DarkNet53(DarkNet53<B>),
}

impl<B: Backend> From<DarkNet19<B>> for DarkNet<B> {
    fn from(model: DarkNet19<B>) -> Self {
        Self::DarkNet19(model)
    }
}

impl<B: Backend> From<DarkNet53<B>> for DarkNet<B> {
    fn from(model: DarkNet53<B>) -> Self {
        Self::DarkNet53(model)
    }
}

impl<B: Backend> InitWeights<B> for DarkNet<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        match self {
            Self::DarkNet19(model) => Self::DarkNet19(model.init_weights(policy)),
            Self::DarkNet53(model) => Self::DarkNet53(model.init_weights(policy)),
        }
    }
}

impl<B: Backend> TrainableParams for DarkNet<B> {
    fn num_trainable_params(&self) -> usize {
        match self {
            Self::DarkNet19(model) => model.num_trainable_params(),
            Self::DarkNet53(model) => model.num_trainable_params(),
        }
    }
}

impl<B: Backend> DarkNet<B> {
    /// The model family name.
    pub fn name(&self) -> &'static str {
        match self {
            Self::DarkNet19(_) => "DarkNet19",
            Self::DarkNet53(_) => "DarkNet53",
        }
    }

    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        match self {
            Self::DarkNet19(model) => model.num_classes(),
            Self::DarkNet53(model) => model.num_classes(),
        }
    }

    /// Borrow the feature extractor.
    pub fn features(&self) -> &DarkNetFeatures<B> {
        match self {
            Self::DarkNet19(model) => model.features(),
            Self::DarkNet53(model) => model.features(),
        }
    }

    /// Consume the model, keeping only the feature extractor.
    pub fn into_features(self) -> DarkNetFeatures<B> {
        match self {
            Self::DarkNet19(model) => model.into_features(),
            Self::DarkNet53(model) => model.into_features(),
        }
    }

    /// Replace the classifier head.
    pub fn with_classes(
        self,
        num_classes: usize,
        device: &B::Device,
    ) -> Self {
        match self {
            Self::DarkNet19(model) => model.with_classes(num_classes, device).into(),
            Self::DarkNet53(model) => model.with_classes(num_classes, device).into(),
        }
    }

    /// Feature extractor forward pass.
    ///
    /// ``[batch, 3, height, width] -> [batch, 1024, height / 32, width / 32]``
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.features().forward(input)
    }

    /// Forward pass, without the final softmax.
    pub fn forward_logits(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        match self {
            Self::DarkNet19(model) => model.forward_logits(input),
            Self::DarkNet53(model) => model.forward_logits(input),
        }
    }

    /// Forward pass.
    ///
    /// ``[batch, 3, height, width] -> [batch, num_classes]`` class probabilities.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        match self {
            Self::DarkNet19(model) => model.forward(input),
            Self::DarkNet53(model) => model.forward(input),
        }
    }
}
