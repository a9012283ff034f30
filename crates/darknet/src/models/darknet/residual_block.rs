//! # DarkNet Residual Blocks
//!
//! [`DarkResidualBlock`] squeezes ``planes`` to ``planes / 2`` with a 1x1
//! conv, expands back with a 3x3 conv, and adds the identity shortcut.
//!
//! [`DarkResidualStage`] is a run of same-width [`DarkResidualBlock`]s.
//!
//! Both follow the usual split:
//! * `*Meta` traits define the shared meta API of configs and modules,
//! * `*Config` types implement [`Config`] and provide `init`,
//! * the modules implement [`Module`] and provide `forward`.

use crate::layers::activation::ActivationConfig;
use crate::layers::blocks::cna::{CNA2d, CNA2dConfig, CNA2dMeta};
use crate::models::darknet::init::{DarkNetInitConfig, InitWeights};
use crate::models::darknet::params::TrainableParams;
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::prelude::{Backend, Module, Tensor};

/// [`DarkResidualBlock`] Meta API.
pub trait DarkResidualBlockMeta {
    /// The number of input (and output) feature planes.
    fn planes(&self) -> usize;

    /// The number of planes between the squeeze and expand convs.
    fn hidden_planes(&self) -> usize {
        self.planes() / 2
    }
}

/// [`DarkResidualBlock`] Config.
///
/// Implements [`DarkResidualBlockMeta`].
#[derive(Config, Debug)]
pub struct DarkResidualBlockConfig {
    /// The number of input (and output) feature planes.
    pub planes: usize,

    /// The conv block activation.
    #[config(default = "ActivationConfig::default()")]
    pub act: ActivationConfig,
}

impl DarkResidualBlockMeta for DarkResidualBlockConfig {
    fn planes(&self) -> usize {
        self.planes
    }
}

impl DarkResidualBlockConfig {
    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.planes == 0 || self.planes % 2 != 0 {
            return Err(format!(
                "residual block planes must be even and non-zero: {}",
                self.planes
            ));
        }
        Ok(())
    }

    /// Panic if `try_validate` returns an error.
    pub fn expect_valid(&self) {
        if let Err(err) = self.try_validate() {
            panic!("{}", err);
        }
    }

    /// Initialize a [`DarkResidualBlock`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DarkResidualBlock<B> {
        self.expect_valid();

        let planes = self.planes();
        let hidden = self.hidden_planes();

        DarkResidualBlock {
            cna1: CNA2dConfig::new(planes, hidden, 1)
                .with_padding(Some(0))
                .with_act(self.act.clone())
                .init(device),
            cna2: CNA2dConfig::new(hidden, planes, 3)
                .with_act(self.act)
                .init(device),
        }
    }
}

/// DarkNet residual block.
///
/// Implements [`DarkResidualBlockMeta`].
#[derive(Module, Debug)]
pub struct DarkResidualBlock<B: Backend> {
    /// 1x1 squeeze block.
    pub cna1: CNA2d<B>,

    /// 3x3 expand block.
    pub cna2: CNA2d<B>,
}

impl<B: Backend> DarkResidualBlockMeta for DarkResidualBlock<B> {
    fn planes(&self) -> usize {
        self.cna1.in_channels()
    }

    fn hidden_planes(&self) -> usize {
        self.cna1.out_channels()
    }
}

impl<B: Backend> InitWeights<B> for DarkResidualBlock<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        Self {
            cna1: self.cna1.init_weights(policy),
            cna2: self.cna2.init_weights(policy),
        }
    }
}

impl<B: Backend> TrainableParams for DarkResidualBlock<B> {
    fn num_trainable_params(&self) -> usize {
        self.cna1.num_trainable_params() + self.cna2.num_trainable_params()
    }
}

impl<B: Backend> DarkResidualBlock<B> {
    /// Build a [`DarkResidualBlockConfig`] describing this block.
    pub fn to_config(&self) -> DarkResidualBlockConfig {
        DarkResidualBlockConfig::new(self.planes()).with_act(self.cna1.act.to_config())
    }

    /// Forward Pass.
    ///
    /// ``output = cna2(cna1(input)) + input``
    ///
    /// # Arguments
    ///
    /// - `input`: ``[batch, planes, height, width]``.
    ///
    /// # Returns
    ///
    /// ``[batch, planes, height, width]``
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        let [batch, height, width] = unpack_shape_contract!(
            ["batch", "planes", "height", "width"],
            &input,
            &["batch", "height", "width"],
            &[("planes", self.planes())]
        );

        let x = self.cna1.forward(input.clone());
        let x = self.cna2.forward(x);
        let x = x + input;

        assert_shape_contract_periodically!(
            ["batch", "planes", "height", "width"],
            &x,
            &[
                ("batch", batch),
                ("planes", self.planes()),
                ("height", height),
                ("width", width)
            ]
        );

        x
    }
}

/// [`DarkResidualStage`] Meta API.
pub trait DarkResidualStageMeta {
    /// The number of blocks.
    fn len(&self) -> usize;

    /// Check if the stage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The number of feature planes; 0 for an empty stage.
    fn planes(&self) -> usize;
}

/// [`DarkResidualStage`] Config.
#[derive(Config, Debug)]
pub struct DarkResidualStageConfig {
    /// The component blocks.
    pub blocks: Vec<DarkResidualBlockConfig>,
}

impl From<Vec<DarkResidualBlockConfig>> for DarkResidualStageConfig {
    fn from(blocks: Vec<DarkResidualBlockConfig>) -> Self {
        Self { blocks }
    }
}

impl DarkResidualStageMeta for DarkResidualStageConfig {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn planes(&self) -> usize {
        self.blocks.first().map_or(0, |block| block.planes())
    }
}

impl DarkResidualStageConfig {
    /// Build a stage of `num_blocks` identical blocks.
    pub fn build(
        num_blocks: usize,
        planes: usize,
        act: ActivationConfig,
    ) -> Self {
        (0..num_blocks)
            .map(|_| DarkResidualBlockConfig::new(planes).with_act(act.clone()))
            .collect::<Vec<_>>()
            .into()
    }

    /// Check if the config is valid.
    pub fn try_validate(&self) -> Result<(), String> {
        if self.is_empty() {
            return Err("blocks is empty".to_string());
        }
        for (idx, block) in self.blocks.iter().enumerate() {
            block.try_validate()?;
            if block.planes() != self.planes() {
                return Err(format!(
                    "block[{}].planes({}) != block[0].planes({})",
                    idx,
                    block.planes(),
                    self.planes(),
                ));
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

    /// Apply a mapping over the blocks.
    pub fn map_blocks<F>(
        self,
        f: &mut F,
    ) -> Self
    where
        F: FnMut(usize, DarkResidualBlockConfig) -> DarkResidualBlockConfig,
    {
        Self {
            blocks: self
                .blocks
                .into_iter()
                .enumerate()
                .map(|(idx, block)| f(idx, block))
                .collect(),
        }
    }

    /// Initialize a [`DarkResidualStage`].
    ///
    /// # Panics
    ///
    /// If the config is not valid.
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> DarkResidualStage<B> {
        self.expect_valid();

        DarkResidualStage {
            blocks: self
                .blocks
                .into_iter()
                .map(|block| block.init(device))
                .collect(),
        }
    }
}

/// A run of same-width residual blocks.
#[derive(Module, Debug)]
pub struct DarkResidualStage<B: Backend> {
    /// Internal blocks.
    pub blocks: Vec<DarkResidualBlock<B>>,
}

impl<B: Backend> DarkResidualStageMeta for DarkResidualStage<B> {
    fn len(&self) -> usize {
        self.blocks.len()
    }

    fn planes(&self) -> usize {
        self.blocks.first().map_or(0, |block| block.planes())
    }
}

impl<B: Backend> InitWeights<B> for DarkResidualStage<B> {
    fn init_weights(
        self,
        policy: &DarkNetInitConfig,
    ) -> Self {
        Self {
            blocks: self.blocks.init_weights(policy),
        }
    }
}

impl<B: Backend> TrainableParams for DarkResidualStage<B> {
    fn num_trainable_params(&self) -> usize {
        self.blocks.num_trainable_params()
    }
}

impl<B: Backend> DarkResidualStage<B> {
    /// Build a [`DarkResidualStageConfig`] describing this stage.
    pub fn to_config(&self) -> DarkResidualStageConfig {
        self.blocks
            .iter()
            .map(|block| block.to_config())
            .collect::<Vec<_>>()
            .into()
    }

    /// Apply the blocks in sequence.
    pub fn forward(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.blocks.iter().fold(input, |x, block| block.forward(x))
    }
}
