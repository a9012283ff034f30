//! # DarkNet-53
//!
//! The DarkNet-53 classifier: a residual [`DarkNetFeatures`] trunk,
//! global average pooling, and a [`Linear`] classifier.
//!
//! ```text
//! features -> global avg pool -> Linear(1024, num_classes) -> softmax
//! ```

use crate::layers::activation::ActivationConfig;
use crate::layers::pool::global_avg_pool::GlobalAvgPool2d;
use crate::models::darknet::features::{
    DARKNET_FEATURE_CHANNELS, DARKNET53_DEPTHS, DarkNetFeatures, DarkNetFeaturesConfig,
    DarkNetFeaturesMeta,
};
use crate::models::darknet::init::{DarkNetInitConfig, InitWeights};
use crate::models::darknet::params::TrainableParams;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::nn::{Linear, LinearConfig};
use burn::prelude::{Backend, Module, Tensor};
use burn::tensor::activation::softmax;
use tracing::debug;

/// [`DarkNet53`] Config.
#[derive(Config, Debug)]
pub struct DarkNet53Config {
    /// Number of output classes.
    #[config(default = 1000)]
    pub num_classes: usize,

    /// Apply [`DarkNet53Config::init_policy`] after construction.
    #[config(default = true)]
    pub init_weights: bool,

    /// Residual blocks per stage; a zero depth omits that stage.
    #[config(default = "DARKNET53_DEPTHS")]
    pub depths: [usize; 5],

    /// Conv block activation.
    #[config(default = "ActivationConfig::default()")]
    pub act: ActivationConfig,

    /// Weight initialization policy.
    #[config(default = "DarkNetInitConfig::new()")]
    pub init_policy: DarkNetInitConfig,
}

impl DarkNet53Config {
    /// The trunk config.
    pub fn features_config(&self) -> DarkNetFeaturesConfig {
        DarkNetFeaturesConfig::darknet53(self.depths, self.act.clone())
    }

    /// The classifier config.
    pub fn fc_config(&self) -> LinearConfig {
        LinearConfig::new(DARKNET_FEATURE_CHANNELS, self.num_classes)
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

    /// Initialize a [`DarkNet53`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DarkNet53<B> {
        self.expect_valid();
        debug!(
            num_classes = self.num_classes,
            init_weights = self.init_weights,
            depths = ?self.depths,
            "init DarkNet53"
        );

        let model = DarkNet53 {
            features: self.features_config().init(device),
            pool: GlobalAvgPool2d::new(),
            fc: self.fc_config().init(device),
        };

        if self.init_weights {
            model.init_weights(&self.init_policy)
        } else {
            model
        }
    }
}

/// DarkNet-53 classifier.
#[derive(Module, Debug)]
pub struct DarkNet53<B: Backend> {
    /// Feature extractor trunk.
    pub features: DarkNetFeatures<B>,

    /// Spatial pooling.
    pub pool: GlobalAvgPool2d,

    /// Classifier.
    pub fc: Linear<B>,
}

impl<B: Backend> InitWeights<B> for DarkNet53<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        Self {
            features: self.features.init_weights(policy),
            pool: self.pool,
            fc: self.fc.init_weights(policy),
        }
    }
}

impl<B: Backend> TrainableParams for DarkNet53<B> {
    fn num_trainable_params(&self) -> usize {
        self.features.num_trainable_params() + self.fc.num_trainable_params()
    }
}

impl<B: Backend> DarkNet53<B> {
    /// Number of output classes.
    pub fn num_classes(&self) -> usize {
        self.fc.weight.dims()[1]
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

    /// Replace the classifier.
    ///
    /// The new classifier uses burn's default initializers.
    pub fn with_classes(
        self,
        num_classes: usize,
        device: &B::Device,
    ) -> Self {
        let fc = LinearConfig::new(DARKNET_FEATURE_CHANNELS, num_classes).init(device);
        Self { fc, ..self }
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
    /// ``[batch, 3, height, width] -> [batch, num_classes]``
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
        let x = self.pool.forward(x);
        let x = self.fc.forward(x);

        assert_shape_contract_periodically!(
            ["batch", "classes"],
            &x,
            &[("batch", batch), ("classes", self.num_classes())]
        );

        x
    }

    /// Forward pass.
    ///
    /// ``[batch, 3, height, width] -> [batch, num_classes]``; rows sum to 1.
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
    use crate::models::darknet::residual_block::DarkResidualStageMeta;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::{Distribution, Tolerance};
    use hamcrest::prelude::*;

    type B = NdArray<f32>;

    #[test]
    fn test_config() {
        let config = DarkNet53Config::new();
        assert_eq!(config.num_classes, 1000);
        assert_eq!(config.depths, [1, 2, 8, 8, 4]);
        assert!(config.init_weights);
        config.expect_valid();

        assert!(
            DarkNet53Config::new()
                .with_num_classes(0)
                .try_validate()
                .is_err()
        );
    }

    #[test]
    fn test_zero_depth_stage() {
        let device = Default::default();

        let config = DarkNet53Config::new()
            .with_num_classes(10)
            .with_depths([1, 0, 1, 0, 1]);
        config.expect_valid();

        let features = config.features_config();
        features.expect_valid();
        // 2 stem convs, 3 residual stages, 4 downsample convs.
        assert_eq!(features.layers.len(), 9);

        let model: DarkNet53<B> = config.init(&device);
        let stages: Vec<usize> = model
            .features
            .layers
            .iter()
            .filter_map(|layer| match layer {
                DarkNetLayer::Residual(stage) => Some(stage.planes()),
                _ => None,
            })
            .collect();
        assert_eq!(stages, vec![64, 256, 1024]);

        let input = Tensor::random([1, 3, 64, 64], Distribution::Default, &device);
        let output = model.forward(input);
        assert_shape_contract!(
            ["batch", "classes"],
            &output,
            &[("batch", 1), ("classes", 10)],
        );
    }

    #[test]
    fn test_num_params() {
        let device = Default::default();

        let model: DarkNet53<B> = DarkNet53Config::new()
            .with_init_weights(false)
            .init(&device);
        assert_eq!(model.num_classes(), 1000);
        assert_eq!(model.num_trainable_params(), 41_609_928);
        assert_eq!(model.features().num_trainable_params(), 40_584_928);
        assert!(model.num_params() > model.num_trainable_params());

        let model = model.with_classes(10, &device);
        assert_eq!(model.num_classes(), 10);
        assert_eq!(model.num_trainable_params(), 40_595_178);
    }

    #[test]
    fn test_forward() {
        let device = Default::default();

        let model: DarkNet53<B> = DarkNet53Config::new()
            .with_num_classes(10)
            .with_depths([1, 1, 1, 1, 1])
            .init(&device);

        let batch = 2;
        let input = Tensor::random([batch, 3, 64, 64], Distribution::Default, &device);

        let features = model.forward_features(input.clone());
        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &features,
            &[("batch", batch), ("channels", 1024), ("height", 2), ("width", 2)],
        );

        let output = model.forward(input);
        assert_shape_contract!(
            ["batch", "classes"],
            &output,
            &[("batch", batch), ("classes", 10)],
        );
        output.sum_dim(1).to_data().assert_approx_eq::<f32>(
            &Tensor::<B, 2>::ones([batch, 1], &device).to_data(),
            Tolerance::default(),
        );

        assert_eq!(model.feature_resolution([64, 64]), [2, 2]);
        let features = model.into_features();
        assert_eq!(features.stride(), 32);
    }

    #[test]
    fn test_init_policy_applied() {
        let device = Default::default();

        let model: DarkNet53<B> = DarkNet53Config::new()
            .with_depths([1, 1, 1, 1, 1])
            .init(&device);

        let (mean, std) = mean_std(model.fc.weight.val());
        assert_that!(mean, is(close_to(0.0, 0.001)));
        assert_that!(std, is(close_to(0.01, 0.0005)));

        let (bias_mean, bias_std) = mean_std(model.fc.bias.unwrap().val());
        assert_eq!(bias_mean, 0.0);
        assert_eq!(bias_std, 0.0);
    }

    #[test]
    fn test_init_policy_resets_norms() {
        let device = Default::default();

        let mut model: DarkNet53<B> = DarkNet53Config::new()
            .with_depths([1, 1, 1, 1, 1])
            .with_init_weights(false)
            .init(&device);

        // The first residual stage follows the two stem convs.
        match model.features.layers.get_mut(2) {
            Some(DarkNetLayer::Residual(stage)) => {
                let block = &mut stage.blocks[0];
                block.cna1.norm = perturb_norm(block.cna1.norm.clone());
                block.cna2.norm = perturb_norm(block.cna2.norm.clone());
            }
            other => panic!("unexpected layer: {other:?}"),
        }

        let model = model.init_weights(&DarkNetInitConfig::new());

        match model.features.layers.get(2) {
            Some(DarkNetLayer::Residual(stage)) => {
                assert_norm_reset(&stage.blocks[0].cna1.norm);
                assert_norm_reset(&stage.blocks[0].cna2.norm);
            }
            other => panic!("unexpected layer: {other:?}"),
        }
    }
}
