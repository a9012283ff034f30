//! # DarkNet Feature Extractors
//!
//! A [`DarkNetFeatures`] module is the convolutional trunk of a DarkNet
//! model: a sequence of [`DarkNetLayer`]s, each one of
//! * a [`CNA2d`] conv/norm/activation block,
//! * a [`DownsamplePool2d`] max-pool,
//! * a [`DarkResidualStage`].
//!
//! [`DarkNetFeaturesConfig::darknet19`] and [`DarkNetFeaturesConfig::darknet53`]
//! build the two standard schedules. Both reduce resolution by 32,
//! and produce 1024 output channels.

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta};
use crate::layers::pool::downsample_pool::{DownsamplePool2d, DownsamplePool2dConfig};
use crate::models::darknet::init::{DarkNetInitConfig, InitWeights};
use crate::models::darknet::params::TrainableParams;
use crate::models::darknet::residual_block::{
    DarkResidualStage, DarkResidualStageConfig, DarkResidualStageMeta,
};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};
use tracing::debug;

/// Number of image channels consumed by the standard schedules.
pub const DARKNET_IN_CHANNELS: usize = 3;

/// Number of feature channels produced by the standard schedules.
pub const DARKNET_FEATURE_CHANNELS: usize = 1024;

/// Residual stage depths of DarkNet-53.
pub const DARKNET53_DEPTHS: [usize; 5] = [1, 2, 8, 8, 4];

/// Conv schedule of DarkNet-19, as ``(in, out, kernel)``; ``None`` marks a max-pool.
const DARKNET19_SCHEDULE: &[Option<(usize, usize, usize)>] = &[
    Some((3, 32, 3)),
    None,
    Some((32, 64, 3)),
    None,
    Some((64, 128, 3)),
    Some((128, 64, 1)),
    Some((64, 128, 3)),
    None,
    Some((128, 256, 3)),
    Some((256, 128, 1)),
    Some((128, 256, 3)),
    None,
    Some((256, 512, 3)),
    Some((512, 256, 1)),
    Some((256, 512, 3)),
    Some((512, 256, 1)),
    Some((256, 512, 3)),
    None,
    Some((512, 1024, 3)),
    Some((1024, 512, 1)),
    Some((512, 1024, 3)),
    Some((1024, 512, 1)),
    Some((512, 1024, 3)),
];

/// [`DarkNetLayer`] Meta API.
pub trait DarkNetLayerMeta {
    /// Required input channels; ``None`` if channel-agnostic.
    fn in_channels(&self) -> Option<usize>;

    /// Produced output channels; ``None`` if channels pass through.
    fn out_channels(&self) -> Option<usize>;

    /// Spatial downsampling factor.
    fn stride(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2];
}

/// [`DarkNetLayer`] Config.
#[derive(Config, Debug)]
pub enum DarkNetLayerConfig {
    /// A [`CNA2d`] block.
    Conv(CNA2dConfig),

    /// A [`DownsamplePool2d`] layer.
    Pool(DownsamplePool2dConfig),

    /// A [`DarkResidualStage`].
    Residual(DarkResidualStageConfig),
}

impl From<CNA2dConfig> for DarkNetLayerConfig {
    fn from(config: CNA2dConfig) -> Self {
        Self::Conv(config)
    }
}

impl From<DownsamplePool2dConfig> for DarkNetLayerConfig {
    fn from(config: DownsamplePool2dConfig) -> Self {
        Self::Pool(config)
    }
}

impl From<DarkResidualStageConfig> for DarkNetLayerConfig {
    fn from(config: DarkResidualStageConfig) -> Self {
        Self::Residual(config)
    }
}

impl DarkNetLayerMeta for DarkNetLayerConfig {
    fn in_channels(&self) -> Option<usize> {
        match self {
            Self::Conv(config) => Some(config.in_channels()),
            Self::Pool(_) => None,
            Self::Residual(config) => Some(config.planes()),
        }
    }

    fn out_channels(&self) -> Option<usize> {
        match self {
            Self::Conv(config) => Some(config.out_channels()),
            Self::Pool(_) => None,
            Self::Residual(config) => Some(config.planes()),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Conv(config) => config.stride(),
            Self::Pool(config) => config.stride,
            Self::Residual(_) => 1,
        }
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        match self {
            Self::Conv(config) => config.output_resolution(input_resolution),
            Self::Pool(config) => config.output_resolution(input_resolution),
            Self::Residual(_) => input_resolution,
        }
    }
}

impl DarkNetLayerConfig {
    /// Check if the layer config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        match self {
            Self::Residual(config) => config.try_validate(),
            _ => Ok(()),
        }
    }

    /// Initialize a [`DarkNetLayer`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DarkNetLayer<B> {
        match self {
            Self::Conv(config) => DarkNetLayer::Conv(config.init(device)),
            Self::Pool(config) => DarkNetLayer::Pool(config.init()),
            Self::Residual(config) => DarkNetLayer::Residual(config.init(device)),
        }
    }
}

/// A single step of a DarkNet trunk.
#[derive(Module, Debug)]
#[allow(clippy::large_enum_variant)]
pub enum DarkNetLayer<B: Backend> {
    /// A [`CNA2d`] block.
    Conv(CNA2d<B>),

    /// A [`DownsamplePool2d`] layer.
    Pool(DownsamplePool2d),

    /// A [`DarkResidualStage`].
    Residual(DarkResidualStage<B>),
}

impl<B: Backend> DarkNetLayerMeta for DarkNetLayer<B> {
    fn in_channels(&self) -> Option<usize> {
        match self {
            Self::Conv(layer) => Some(layer.in_channels()),
            Self::Pool(_) => None,
            Self::Residual(stage) => Some(stage.planes()),
        }
    }

    fn out_channels(&self) -> Option<usize> {
        match self {
            Self::Conv(layer) => Some(layer.out_channels()),
            Self::Pool(_) => None,
            Self::Residual(stage) => Some(stage.planes()),
        }
    }

    fn stride(&self) -> usize {
        match self {
            Self::Conv(layer) => layer.stride(),
            Self::Pool(pool) => pool.stride,
            Self::Residual(_) => 1,
        }
    }

    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        match self {
            Self::Conv(layer) => layer.output_resolution(input_resolution),
            Self::Pool(pool) => pool.output_resolution(input_resolution),
            Self::Residual(_) => input_resolution,
        }
    }
}

impl<B: Backend> InitWeights<B> for DarkNetLayer<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        match self {
            Self::Conv(layer) => Self::Conv(layer.init_weights(policy)),
            Self::Pool(pool) => Self::Pool(pool),
            Self::Residual(stage) => Self::Residual(stage.init_weights(policy)),
        }
    }
}

impl<B: Backend> TrainableParams for DarkNetLayer<B> {
    fn num_trainable_params(&self) -> usize {
        match self {
            Self::Conv(layer) => layer.num_trainable_params(),
            Self::Pool(_) => 0,
            Self::Residual(stage) => stage.num_trainable_params(),
        }
    }
}

impl<B: Backend> DarkNetLayer<B> {
    /// Build a [`DarkNetLayerConfig`] describing this layer.
    pub fn to_config(&self) -> DarkNetLayerConfig {
        match self {
            Self::Conv(layer) => layer.to_config().into(),
            Self::Pool(pool) => pool.to_config().into(),
            Self::Residual(stage) => stage.to_config().into(),
        }
    }

    /// Forward Pass.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        match self {
            Self::Conv(layer) => layer.forward(input),
            Self::Pool(pool) => pool.forward(input),
            Self::Residual(stage) => stage.forward(input),
        }
    }
}

/// [`DarkNetFeatures`] Meta API.
pub trait DarkNetFeaturesMeta {
    /// The layer metadata, in order.
    fn layer_metas(&self) -> Vec<&dyn DarkNetLayerMeta>;

    /// Number of input channels.
    fn in_channels(&self) -> usize {
        self.layer_metas()
            .iter()
            .find_map(|layer| layer.in_channels())
            .unwrap_or(0)
    }

    /// Number of output channels.
    fn out_channels(&self) -> usize {
        self.layer_metas()
            .iter()
            .rev()
            .find_map(|layer| layer.out_channels())
            .unwrap_or(0)
    }

    /// Total spatial downsampling factor; the product of the layer strides.
    fn stride(&self) -> usize {
        self.layer_metas()
            .iter()
            .map(|layer| layer.stride())
            .product()
    }

    /// Get the output resolution for a given input resolution.
    ///
    /// # Panics
    ///
    /// If some layer has no legal output for its input resolution.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        self.layer_metas()
            .iter()
            .fold(input_resolution, |res, layer| layer.output_resolution(res))
    }
}

/// [`DarkNetFeatures`] Config.
#[derive(Config, Debug)]
pub struct DarkNetFeaturesConfig {
    /// The trunk layers, in order.
    pub layers: Vec<DarkNetLayerConfig>,
}

impl From<Vec<DarkNetLayerConfig>> for DarkNetFeaturesConfig {
    fn from(layers: Vec<DarkNetLayerConfig>) -> Self {
        Self { layers }
    }
}

impl DarkNetFeaturesMeta for DarkNetFeaturesConfig {
    fn layer_metas(&self) -> Vec<&dyn DarkNetLayerMeta> {
        self.layers
            .iter()
            .map(|layer| layer as &dyn DarkNetLayerMeta)
            .collect()
    }
}

impl DarkNetFeaturesConfig {
    /// The DarkNet-19 trunk.
    pub fn darknet19(act: ActivationConfig) -> Self {
        DARKNET19_SCHEDULE
            .iter()
            .map(|step| match step {
                Some((c_in, c_out, k)) => CNA2dConfig::new(*c_in, *c_out, *k)
                    .with_act(act.clone())
                    .into(),
                None => DownsamplePool2dConfig::new().into(),
            })
            .collect::<Vec<DarkNetLayerConfig>>()
            .into()
    }

    /// The DarkNet-53 trunk.
    ///
    /// # Arguments
    ///
    /// - `depths`: residual blocks per stage, at 64, 128, 256, 512 and 1024 planes;
    ///   see [`DARKNET53_DEPTHS`]. Zero-depth stages are omitted.
    /// - `act`: conv block activation.
    pub fn darknet53(
        depths: [usize; 5],
        act: ActivationConfig,
    ) -> Self {
        let conv = |c_in: usize, c_out: usize, stride: usize| -> DarkNetLayerConfig {
            CNA2dConfig::new(c_in, c_out, 3)
                .with_stride(stride)
                .with_act(act.clone())
                .into()
        };

        let mut layers = vec![conv(DARKNET_IN_CHANNELS, 32, 1), conv(32, 64, 2)];
        let mut planes = 64;
        for (idx, depth) in depths.iter().enumerate() {
            if idx > 0 {
                layers.push(conv(planes, planes * 2, 2));
                planes *= 2;
            }
            if *depth > 0 {
                layers.push(DarkResidualStageConfig::build(*depth, planes, act.clone()).into());
            }
        }

        layers.into()
    }

    /// Check if the config is valid.
    ///
    /// The layers must be non-empty, individually valid,
    /// and their channel widths must chain.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.layers.is_empty() {
            return Err("layers is empty".to_string());
        }

        let mut current: Option<usize> = None;
        for (idx, layer) in self.layers.iter().enumerate() {
            layer
                .try_validate()
                .map_err(|err| format!("layer[{idx}]: {err}"))?;

            if let (Some(prev), Some(next)) = (current, layer.in_channels()) {
                if prev != next {
                    return Err(format!(
                        "layer[{idx}].in_channels({next}) != previous out_channels({prev})"
                    ));
                }
            }
            if let Some(out) = layer.out_channels() {
                current = Some(out);
            }
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a [`DarkNetFeatures`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DarkNetFeatures<B> {
        self.expect_valid();
        debug!(
            layers = self.layers.len(),
            in_channels = self.in_channels(),
            out_channels = self.out_channels(),
            stride = self.stride(),
            "init DarkNetFeatures"
        );

        DarkNetFeatures {
            layers: self
                .layers
                .into_iter()
                .map(|layer| layer.init(device))
                .collect(),
        }
    }
}

/// DarkNet convolutional trunk; the feature extractor.
#[derive(Module, Debug)]
pub struct DarkNetFeatures<B: Backend> {
    /// The trunk layers, in order.
    pub layers: Vec<DarkNetLayer<B>>,
}

impl<B: Backend> DarkNetFeaturesMeta for DarkNetFeatures<B> {
    fn layer_metas(&self) -> Vec<&dyn DarkNetLayerMeta> {
        self.layers
            .iter()
            .map(|layer| layer as &dyn DarkNetLayerMeta)
            .collect()
    }
}

impl<B: Backend> InitWeights<B> for DarkNetFeatures<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        Self {
            layers: self.layers.init_weights(policy),
        }
    }
}

impl<B: Backend> TrainableParams for DarkNetFeatures<B> {
    fn num_trainable_params(&self) -> usize {
        self.layers.num_trainable_params()
    }
}

impl<B: Backend> DarkNetFeatures<B> {
    /// Build a [`DarkNetFeaturesConfig`] describing this trunk.
    pub fn to_config(&self) -> DarkNetFeaturesConfig {
        self.layers
            .iter()
            .map(|layer| layer.to_config())
            .collect::<Vec<_>>()
            .into()
    }

    /// Forward Pass.
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, in_channels, in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, out_channels, out_height, out_width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, in_height, in_width] = unpack_shape_contract!(
            ["batch", "in_channels", "in_height", "in_width"],
            &input,
            &["batch", "in_height", "in_width"],
            &[("in_channels", self.in_channels())]
        );
        let [out_height, out_width] = self.output_resolution([in_height, in_width]);

        let x = self.layers.iter().fold(input, |x, layer| layer.forward(x));

        assert_shape_contract_periodically!(
            ["batch", "out_channels", "out_height", "out_width"],
            &x,
            &[
                ("batch", batch),
                ("out_channels", self.out_channels()),
                ("out_height", out_height),
                ("out_width", out_width)
            ]
        );

        x
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bimm_contracts::assert_shape_contract;
    use burn::backend::NdArray;
    use burn::tensor::Distribution;

    #[test]
    fn test_darknet19_schedule() {
        let config = DarkNetFeaturesConfig::darknet19(ActivationConfig::default());
        config.expect_valid();

        assert_eq!(config.layers.len(), 23);
        let convs = config
            .layers
            .iter()
            .filter(|l| matches!(l, DarkNetLayerConfig::Conv(_)))
            .count();
        let pools = config
            .layers
            .iter()
            .filter(|l| matches!(l, DarkNetLayerConfig::Pool(_)))
            .count();
        assert_eq!(convs, 18);
        assert_eq!(pools, 5);

        assert_eq!(config.in_channels(), DARKNET_IN_CHANNELS);
        assert_eq!(config.out_channels(), DARKNET_FEATURE_CHANNELS);
        assert_eq!(config.stride(), 32);
        assert_eq!(config.output_resolution([256, 256]), [8, 8]);
        assert_eq!(config.output_resolution([224, 224]), [7, 7]);
    }

    #[test]
    fn test_darknet53_schedule() {
        let config = DarkNetFeaturesConfig::darknet53(DARKNET53_DEPTHS, ActivationConfig::default());
        config.expect_valid();

        // 2 stem convs, 5 residual stages, 4 downsample convs.
        assert_eq!(config.layers.len(), 11);

        let depths: Vec<(usize, usize)> = config
            .layers
            .iter()
            .filter_map(|l| match l {
                DarkNetLayerConfig::Residual(stage) => Some((stage.planes(), stage.len())),
                _ => None,
            })
            .collect();
        assert_eq!(
            depths,
            vec![(64, 1), (128, 2), (256, 8), (512, 8), (1024, 4)]
        );

        let strides: Vec<usize> = config
            .layers
            .iter()
            .filter_map(|l| match l {
                DarkNetLayerConfig::Conv(conv) => Some(conv.stride()),
                _ => None,
            })
            .collect();
        assert_eq!(strides, vec![1, 2, 2, 2, 2, 2]);

        assert_eq!(config.in_channels(), DARKNET_IN_CHANNELS);
        assert_eq!(config.out_channels(), DARKNET_FEATURE_CHANNELS);
        assert_eq!(config.stride(), 32);
        assert_eq!(config.output_resolution([256, 256]), [8, 8]);
    }

    #[test]
    fn test_features_validation() {
        let empty = DarkNetFeaturesConfig::new(vec![]);
        assert!(empty.try_validate().is_err());

        let layers: Vec<DarkNetLayerConfig> = vec![
            CNA2dConfig::new(3, 16, 3).into(),
            DownsamplePool2dConfig::new().into(),
            CNA2dConfig::new(32, 64, 3).into(),
        ];
        let mismatched = DarkNetFeaturesConfig::from(layers);
        let err = mismatched.try_validate().unwrap_err();
        assert!(err.contains("layer[2]"), "{err}");

        let layers: Vec<DarkNetLayerConfig> = vec![
            CNA2dConfig::new(3, 16, 3).into(),
            DarkResidualStageConfig::build(0, 16, ActivationConfig::default()).into(),
        ];
        let bad_stage = DarkNetFeaturesConfig::from(layers);
        assert!(bad_stage.try_validate().is_err());
    }

    #[test]
    fn test_small_features_forward() {
        type B = NdArray<f32>;
        let device = Default::default();

        let act = ActivationConfig::default();
        let layers: Vec<DarkNetLayerConfig> = vec![
            CNA2dConfig::new(3, 8, 3).with_act(act.clone()).into(),
            DownsamplePool2dConfig::new().into(),
            CNA2dConfig::new(8, 16, 3).with_stride(2).with_act(act.clone()).into(),
            DarkResidualStageConfig::build(2, 16, act).into(),
        ];
        let config = DarkNetFeaturesConfig::from(layers);
        assert_eq!(config.output_resolution([16, 12]), [4, 3]);

        let features: DarkNetFeatures<B> = config.init(&device);
        assert_eq!(features.in_channels(), 3);
        assert_eq!(features.out_channels(), 16);
        assert_eq!(features.stride(), 4);
        assert_eq!(features.to_config().layers.len(), 4);

        let input = Tensor::random([2, 3, 16, 12], Distribution::Default, &device);
        let output = features.forward(input.clone());
        assert_shape_contract!(
            ["batch", "channels", "height", "width"],
            &output,
            &[("batch", 2), ("channels", 16), ("height", 4), ("width", 3)],
        );

        let mut expected = input;
        for layer in features.layers.iter() {
            expected = layer.forward(expected);
        }
        output.to_data().assert_eq(&expected.to_data(), true);
    }
}
