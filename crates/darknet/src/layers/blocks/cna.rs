//! # `CNA2d` - conv/norm/activation block.
//!
//! A [`CNA2d`] module is:
//! * a bias-free [`Conv2d`] layer,
//! * a [`BatchNorm`] layer sized to the conv output channels,
//! * an [`Activation`] layer.
//!
//! This is the basic unit of every DarkNet backbone.
//! Padding defaults to ``kernel_size / 2``, which preserves the
//! resolution of odd-sized kernels at stride 1.

use crate::compat::conv_shape::expect_window_output_shape;
use crate::layers::activation::{Activation, ActivationConfig};
use bimm_contracts::{assert_shape_contract_periodically, unpack_shape_contract};
use burn::config::Config;
use burn::module::Module;
use burn::nn::conv::{Conv2d, Conv2dConfig};
use burn::nn::{BatchNorm, BatchNormConfig, PaddingConfig2d};
use burn::prelude::{Backend, Tensor};

/// [`CNA2d`] Meta.
pub trait CNA2dMeta {
    /// Number of input channels.
    fn in_channels(&self) -> usize;

    /// Number of output channels.
    fn out_channels(&self) -> usize;

    /// Square kernel size.
    fn kernel_size(&self) -> usize;

    /// Stride, applied to both spatial dims.
    fn stride(&self) -> usize;

    /// Padding, applied to all four sides.
    fn padding(&self) -> usize;

    /// Number of groups.
    fn groups(&self) -> usize;

    /// Get the output resolution for a given input resolution.
    ///
    /// # Arguments
    ///
    /// - `input_resolution`: ``[in_height, in_width]``.
    ///
    /// # Returns
    ///
    /// ``[out_height, out_width]``
    ///
    /// # Panics
    ///
    /// If the kernel does not fit in the padded input.
    fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        let k = self.kernel_size();
        let s = self.stride();
        let p = self.padding();
        expect_window_output_shape(input_resolution, [k, k], [s, s], [p, p], [1, 1])
    }
}

/// [`CNA2d`] Config.
///
/// Implements [`CNA2dMeta`].
#[derive(Config, Debug)]
pub struct CNA2dConfig {
    /// Number of input channels.
    pub in_channels: usize,

    /// Number of output channels.
    pub out_channels: usize,

    /// Square kernel size.
    pub kernel_size: usize,

    /// Stride of the convolution.
    #[config(default = 1)]
    pub stride: usize,

    /// Explicit padding; ``None`` selects ``kernel_size / 2``.
    #[config(default = "None")]
    pub padding: Option<usize>,

    /// Number of groups.
    #[config(default = 1)]
    pub groups: usize,

    /// The [`Activation`] config.
    #[config(default = "ActivationConfig::default()")]
    pub act: ActivationConfig,
}

impl CNA2dMeta for CNA2dConfig {
    fn in_channels(&self) -> usize {
        self.in_channels
    }

    fn out_channels(&self) -> usize {
        self.out_channels
    }

    fn kernel_size(&self) -> usize {
        self.kernel_size
    }

    fn stride(&self) -> usize {
        self.stride
    }

    fn padding(&self) -> usize {
        self.padding.unwrap_or(self.kernel_size / 2)
    }

    fn groups(&self) -> usize {
        self.groups
    }
}

impl CNA2dConfig {
    /// Build the [`Conv2dConfig`] for the inner conv layer.
    pub fn conv_config(&self) -> Conv2dConfig {
        let k = self.kernel_size();
        let s = self.stride();
        let p = self.padding();
        Conv2dConfig::new([self.in_channels, self.out_channels], [k, k])
            .with_stride([s, s])
            .with_padding(PaddingConfig2d::Explicit(p, p))
            .with_groups(self.groups)
            .with_bias(false)
    }

    /// Initialize a [`CNA2d`].
    pub fn init<B: Backend>(
        self,
        device: &B::Device,
    ) -> CNA2d<B> {
        CNA2d {
            conv: self.conv_config().init(device),
            norm: BatchNormConfig::new(self.out_channels).init(device),
            act: self.act.init(device),
        }
    }
}

/// Sequenced conv/norm/activation block.
///
/// Implements [`CNA2dMeta`].
#[derive(Module, Debug)]
pub struct CNA2d<B: Backend> {
    /// Internal Conv2d layer.
    pub conv: Conv2d<B>,

    /// Internal Norm Layer.
    pub norm: BatchNorm<B, 2>,

    /// Activation layer.
    pub act: Activation<B>,
}

impl<B: Backend> CNA2dMeta for CNA2d<B> {
    fn in_channels(&self) -> usize {
        self.conv.weight.shape().dims[1] * self.groups()
    }

    fn out_channels(&self) -> usize {
        self.conv.weight.shape().dims[0]
    }

    fn kernel_size(&self) -> usize {
        self.conv.kernel_size[0]
    }

    fn stride(&self) -> usize {
        self.conv.stride[0]
    }

    fn padding(&self) -> usize {
        match &self.conv.padding.0 {
            PaddingConfig2d::Explicit(height, _) => *height,
            PaddingConfig2d::Same => self.kernel_size() / 2,
            PaddingConfig2d::Valid => 0,
        }
    }

    fn groups(&self) -> usize {
        self.conv.groups
    }
}

impl<B: Backend> CNA2d<B> {
    /// Build a [`CNA2dConfig`] describing this block.
    pub fn to_config(&self) -> CNA2dConfig {
        CNA2dConfig::new(self.in_channels(), self.out_channels(), self.kernel_size())
            .with_stride(self.stride())
            .with_padding(Some(self.padding()))
            .with_groups(self.groups())
            .with_act(self.act.to_config())
    }

    /// Forward Pass.
    ///
    /// Applies the conv/norm/act layers in sequence.
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

        let x = self.conv.forward(input);
        let x = self.norm.forward(x);
        let x = self.act.forward(x);

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
