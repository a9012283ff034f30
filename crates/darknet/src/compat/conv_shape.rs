//! # Convolution Shape Arithmetic
//!
//! Output size prediction for strided windows (convolution and pooling).
//!
//! ```text
//! out_size = floor( (in_size + 2*padding - dilation*(kernel_size-1) - 1) / stride ) + 1
//! ```
//!
//! # Reference
//!
//! - [conv_arithmetic diagram](https://github.com/vdumoulin/conv_arithmetic/blob/master/README.md)

/// Predict the output size of a strided window along one axis.
///
/// # Arguments
///
/// - `input_size`: The input dimension size, must be > 0.
/// - `kernel_size`: The window size, must be > 0.
/// - `stride`: The window stride, must be > 0.
/// - `padding`: Padding added evenly to both sides of the input.
/// - `dilation`: The window dilation, must be > 0.
///
/// # Returns
///
/// The output size; or `None` if no window fits.
pub fn maybe_window_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> Option<usize> {
    assert!(input_size > 0);
    assert!(kernel_size > 0);
    assert!(stride > 0);
    assert!(dilation > 0);

    let padded = input_size + 2 * padding;
    let span = 1 + dilation * (kernel_size - 1);
    if padded < span {
        return None;
    }
    Some((padded - span) / stride + 1)
}

/// Predict the output size of a strided window along one axis.
///
/// The ``panic``-ing variant of [`maybe_window_output_size`].
///
/// # Panics
///
/// If no window fits in the padded input.
pub fn expect_window_output_size(
    input_size: usize,
    kernel_size: usize,
    stride: usize,
    padding: usize,
    dilation: usize,
) -> usize {
    match maybe_window_output_size(input_size, kernel_size, stride, padding, dilation) {
        Some(size) => size,
        None => panic!(
            "No legal output size for window with:\n input_size:{input_size}\n kernel_size:{kernel_size}\n stride:{stride}\n dilation:{dilation}\n padding:{padding}",
        ),
    }
}

/// Predict the output resolution of a strided window over `D` axes.
///
/// Applies [`maybe_window_output_size`] per axis.
pub fn maybe_window_output_shape<const D: usize>(
    input_shape: [usize; D],
    kernel_shape: [usize; D],
    stride: [usize; D],
    padding: [usize; D],
    dilation: [usize; D],
) -> Option<[usize; D]> {
    let mut output_shape = input_shape;
    for i in 0..D {
        output_shape[i] = maybe_window_output_size(
            input_shape[i],
            kernel_shape[i],
            stride[i],
            padding[i],
            dilation[i],
        )?;
    }
    Some(output_shape)
}

/// Predict the output resolution of a strided window over `D` axes.
///
/// The ``panic``-ing variant of [`maybe_window_output_shape`].
///
/// # Panics
///
/// If any axis has no legal output size.
pub fn expect_window_output_shape<const D: usize>(
    input_shape: [usize; D],
    kernel_shape: [usize; D],
    stride: [usize; D],
    padding: [usize; D],
    dilation: [usize; D],
) -> [usize; D] {
    match maybe_window_output_shape(input_shape, kernel_shape, stride, padding, dilation) {
        Some(shape) => shape,
        None => panic!(
            "No legal output shape for window with:\n input_shape:{input_shape:?}\n kernel_shape:{kernel_shape:?}\n stride:{stride:?}\n dilation:{dilation:?}\n padding:{padding:?}",
        ),
    }
}
