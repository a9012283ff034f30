//! # DarkNet-19
//!
//! The DarkNet-19 classifier is a [`DarkNetFeatures`] trunk followed by a
//! fully convolutional head:
//!
//! ```text
//! features -> CNA(1024, num_classes, 1x1) -> global avg pool -> softmax
//! ```

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta};
use crate::layers::pool::global_avg_pool::GlobalAvgPool2d;
use crate::models::darknet::features::{
    DARKNET_FEATURE_CHANNELS, DarkNetFeatures, DarkNetFeaturesConfig, DarkNetFeaturesMeta,
};
use crate::models::darknet::init::{DarkNetInitConfig, InitWeights};
use crate::models::darknet::params::TrainableParams;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};
use burn::tensor::activation::softmax;
use tracing::debug;

/// [`DarkNet19`] Config.
#[derive(Config, Debug)]
pub struct DarkNet19Config {
    /// Number of output classes.
    #[config(default = 1000)]
    pub num_classes: usize,

    /// Apply [`DarkNet19Config::init_policy`] after construction.
    ///
    /// When false, burn's default initializers are kept.
    #[config(default = true)]
    pub init_weights: bool,

    /// Conv block activation.
    #[config(default = "ActivationConfig::default()")]
    pub act: ActivationConfig,

    /// Weight initialization policy.
    #[config(default = "DarkNetInitConfig::new()")]
    pub init_policy: DarkNetInitConfig,
}

impl DarkNet19Config {
    /// The trunk config.
    pub fn features_config(&self) -> DarkNetFeaturesConfig {
        DarkNetFeaturesConfig::darknet19(self.act.clone())
    }

    /// The 1x1 classifier conv config.
    pub fn head_config(&self) -> CNA2dConfig {
        CNA2dConfig::new(DARKNET_FEATURE_CHANNELS, self.num_classes, 1).with_act(self.act.clone())
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.num_classes == 0 {
            return Err("num_classes must be > 0".to_string());
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a [`DarkNet19`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DarkNet19<B> {
        self.expect_valid();
        debug!(
            num_classes = self.num_classes,
            init_weights = self.init_weights,
            "init DarkNet19"
        );

        let model = DarkNet19 {
            features: self.features_config().init(device),
            head_conv: self.head_config().init(device),
            pool: GlobalAvgPool2d::new(),
        };

        if self.init_weights {
            model.init_weights(&self.init_policy)
        } else {
            model
        }
    }
}

/// DarkNet-19 classifier.
#[derive(Module, Debug)]
pub struct DarkNet19<B: Backend> {
    /// Feature extractor trunk.
    pub features: DarkNetFeatures<B>,

    /// 1x1 conv projecting features to class scores.
    pub head_conv: CNA2d<B>,

    /// Spatial pooling.
    pub pool: GlobalAvgPool2d,
}

impl<B: Backend> InitWeights<B> for DarkNet19<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        Self {
            features: self.features.init_weights(policy),
            head_conv: self.head_conv.init_weights(policy),
            pool: self.pool,
        }
    }
}

impl<B: Backend> TrainableParams for DarkNet19<B> {
    fn num_trainable_params(&self) -> usize {
        self.features.num_trainable_params() + self.head_conv.num_trainable_params()
    }
}

impl<B: Backend> DarkNet19<B> {
    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.head_conv.out_channels()
    }

    /// Borrow the feature extractor.
    pub fn features(&self) -> &DarkNetFeatures<B> {
        &self.features
    }

    /// Consume the model, keeping only the feature extractor.
    pub fn into_features(self) -> DarkNetFeatures<B> {
        self.features
    }

    /// Feature map resolution for a given input resolution.
    pub fn feature_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.features.output_resolution(input_resolution)
    }

    /// Replace the classifier head.
    ///
    /// The new head uses burn's default initializers.
    pub fn with_classes(
        self,
        num_classes: usize,
        device: &B::Device,
    ) -> Self {
        let head_conv = CNA2dConfig::new(DARKNET_FEATURE_CHANNELS, num_classes, 1)
            .with_act(self.head_conv.act.to_config())
            .init(device);
        Self { head_conv, ..self }
    }

    /// Feature extractor forward pass.
    ///
    /// ``[batch, 3, height, width] -> [batch, 1024, height / 32, width / 32]``
    pub fn forward_features(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.features.forward(input)
    }

    /// Forward pass, without the final softmax.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` class scores.
    pub fn forward_logits(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        let [batch] = unpack_shape_contract!(
            ["batch", "channels", "height", "width"],
            &input,
            &["batch"],
            &[("channels", self.features.in_channels())]
        );

        let x = self.features.forward(input);
        let x = self.head_conv.forward(x);
        let x = self.pool.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "classes"],
            &x,
            &[("batch", batch), ("classes", self.num_classes())]
        );

        x
    }

    /// Forward pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, 3, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, num_classes]`` class probabilities; rows sum to 1.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 2> {
        softmax(self.forward_logits(input), 1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::darknet::features::DarkNetLayer;
    use crate::models::darknet::init::tests::{assert_norm_reset, mean_std, perturb_norm};
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, Tolerance};
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    #[test]
    fn test_config_defaults() {
        let config = DarkNet19Config::new();
        assert_eq!(config.num_classes, 1000);
        assert!(config.init_weights);
        config.expect_valid();

        assert!(
            DarkNet19Config::new()
                .with_num_classes(0)
                .try_validate()
                .is_err()
        );

        let head = config.head_config();
        assert_eq!(head.in_channels(), 1024);
        assert_eq!(head.out_channels(), 1000);
        assert_eq!(head.kernel_size(), 1);
        assert_eq!(head.padding(), 0);
    }

    #[test]
    fn test_num_params() {
        let device = Default::default();

        let model: DarkNet19<B> = DarkNet19Config::new()
            .with_init_weights(false)
            .init(&device);
        assert_eq!(model.num_classes(), 1000);
        assert_eq!(model.num_trainable_params(), 20_843_376);
        assert_eq!(model.features().num_trainable_params(), 19_817_376);

        // BatchNorm running mean and variance over 7200 trunk + 1000 head channels.
        assert_eq!(model.num_params(), 20_843_376 + 2 * (7200 + 1000));

        let model = model.with_classes(10, &device);
        assert_eq!(model.num_classes(), 10);
        assert_eq!(model.num_trainable_params(), 19_827_636);

        let features = model.into_features();
        assert_eq!(features.out_channels(), 1024);
    }

    #[test]
    fn test_forward() {
        let device = Default::default();

        let model: DarkNet19<B> = DarkNet19Config::new()
            .with_num_classes(10)
            .init(&device);

        let batch = 2;
        let input = Tensor::random([batch, 3, 64, 64], Distribution::Default, &device);

        let features = model.forward_features(input.clone());
        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &features,
            &[("batch", batch), ("channels", 1024), ("height", 2), ("width", 2)],
        );
        assert_eq!(model.feature_resolution([64, 64]), [2, 2]);

        let output = model.forward(input.clone());
        assert_shape_contract!(
            ["batch", "classes"],
            &output,
            &[("batch", batch), ("classes", 10)],
        );

        output.clone().sum_dim(1).to_data().assert_approx_eq::<f32>(
            &Tensor::<B, 2>::ones([batch, 1], &device).to_data(),
            Tolerance::default(),
        );

        let expected = softmax(model.forward_logits(input), 1);
        output
            .to_data()
            .assert_approx_eq::<f32>(&expected.to_data(), Tolerance::default());
    }

    #[test]
    fn test_init_policy_resets_norms() {
        let device = Default::default();

        let mut model: DarkNet19<B> = DarkNet19Config::new()
            .with_num_classes(10)
            .with_init_weights(false)
            .init(&device);

        model.head_conv.norm = perturb_norm(model.head_conv.norm);
        if let Some(DarkNetLayer::Conv(layer)) = model.features.layers.first_mut() {
            layer.norm = perturb_norm(layer.norm.clone());
        }

        let model = model.init_weights(&DarkNetInitConfig::new());

        assert_norm_reset(&model.head_conv.norm);
        match model.features.layers.first() {
            Some(DarkNetLayer::Conv(layer)) => assert_norm_reset(&layer.norm),
            other => panic!("unexpected first layer: {other:?}"),
        }
    }

    #[test]
    fn test_init_policy_applied() {
        let device = Default::default();

        let model: DarkNet19<B> = DarkNet19Config::new().with_num_classes(10).init(&device);

        // Last trunk conv: 512 -> 1024, 3x3.
        let policy = DarkNetInitConfig::new();
        let expected_std = policy.conv_std(512 * 3 * 3);
        let conv = match model.features.layers.last() {
            Some(DarkNetLayer::Conv(layer)) => &layer.conv,
            other => panic!("unexpected last layer: {other:?}"),
        };
        let (mean, std) = mean_std(conv.weight.val());
        assert_that!(mean, is(close_to(0.0, 0.001)));
        assert_that!(std, is(close_to(expected_std, expected_std * 0.05)));

        let (gamma_mean, gamma_std) = mean_std(model.head_conv.norm.gamma.val());
        assert_eq!(gamma_mean, 1.0);
        assert_eq!(gamma_std, 0.0);
    }
}
