//! # Downsample Pool
//!
//! A [`MaxPool2d`] with a square kernel and no padding, which carries
//! its own window geometry for resolution planning.
use crate::compat::conv_shape::expect_window_output_shape;
use burn::config::Config;
use burn::module::Module;
use burn::nn::pool::{MaxPool2d, MaxPool2dConfig};
use burn::prelude::{Backend, Tensor};

/// [`DownsamplePool2d`] Config.
#[derive(Config, Debug)]
pub struct DownsamplePool2dConfig {
    /// Square kernel size.
    #[config(default = 2)]
    pub kernel_size: usize,

    /// Stride, applied to both spatial dims.
    #[config(default = 2)]
    pub stride: usize,
}

impl DownsamplePool2dConfig {
    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        pool_output_resolution(input_resolution, self.kernel_size, self.stride)
    }

    /// Initialize a [`DownsamplePool2d`].
    pub fn init(&self) -> DownsamplePool2d {
        DownsamplePool2d {
            pool: MaxPool2dConfig::new([self.kernel_size, self.kernel_size])
                .with_strides([self.stride, self.stride])
                .init(),
            kernel_size: self.kernel_size,
            stride: self.stride,
        }
    }
}

/// Max-pool downsampling layer.
#[derive(Module, Clone, Debug)]
pub struct DownsamplePool2d {
    /// Inner pool.
    pub pool: MaxPool2d,

    /// Square kernel size.
    pub kernel_size: usize,

    /// Stride.
    pub stride: usize,
}

impl DownsamplePool2d {
    /// Get the output resolution for a given input resolution.
    pub fn output_resolution(
        &self,
        input_resolution: [usize; 2],
    ) -> [usize; 2] {
        pool_output_resolution(input_resolution, self.kernel_size, self.stride)
    }

    /// Build a [`DownsamplePool2dConfig`] describing this layer.
    pub fn to_config(&self) -> DownsamplePool2dConfig {
        DownsamplePool2dConfig::new()
            .with_kernel_size(self.kernel_size)
            .with_stride(self.stride)
    }

    /// Forward Pass.
    ///
    /// ``[batch, channels, in_height, in_width] -> [batch, channels, out_height, out_width]``
    pub fn forward<B: Backend>(
        &self,
        input: Tensor<B, 4>,
    ) -> Tensor<B, 4> {
        self.pool.forward(input)
    }
}

fn pool_output_resolution(
    input_resolution: [usize; 2],
    kernel_size: usize,
    stride: usize,
) -> [usize; 2] {
    expect_window_output_shape(
        input_resolution,
        [kernel_size, kernel_size],
        [stride, stride],
        [0, 0],
        [1, 1],
    )
}
