//! # Model Summaries
//!
//! A [`ModelSummary`] records the parameter count of a [`DarkNet`] model,
//! and the shapes produced by a random sample input.

use crate::models::darknet::DarkNet;
use crate::models::darknet::params::TrainableParams;
use burn::prelude::{Backend, Tensor};
use burn::tensor::Distribution;
use serde::Serialize;
use tracing::info;

/// Parameter count and sample shapes of a model.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ModelSummary {
    /// Model name.
    pub name: String,

    /// Number of trainable parameters.
    pub num_params: usize,

    /// Sample input shape; ``[batch, 3, height, width]``.
    pub input_shape: Vec<usize>,

    /// Classifier output shape; ``[batch, num_classes]``.
    pub output_shape: Vec<usize>,

    /// Feature extractor output shape; ``[batch, 1024, height / 32, width / 32]``.
    pub feature_shape: Vec<usize>,
}

impl ModelSummary {
    /// Summarize a model, using a random ``[batch, 3, height, width]`` sample.
    pub fn summarize<B: Backend>(
        name: &str,
        model: &DarkNet<B>,
        input_shape: [usize; 4],
        device: &B::Device,
    ) -> Self {
        let input: Tensor<B, 4> = Tensor::random(input_shape, Distribution::Default, device);

        let output = model.forward(input.clone());
        let features = model.forward_features(input);

        let summary = Self {
            name: name.to_string(),
            num_params: model.num_trainable_params(),
            input_shape: input_shape.to_vec(),
            output_shape: output.dims().to_vec(),
            feature_shape: features.dims().to_vec(),
        };
        info!(
            name = %summary.name,
            num_params = summary.num_params,
            "summarized model"
        );
        summary
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::darknet::darknet19;
    use burn::backend::NdArray;

    #[test]
    fn test_summarize() {
        type B = NdArray<f32>;
        let device = Default::default();

        let model: DarkNet<B> = darknet19(10, false).init(&device);
        let summary = ModelSummary::summarize("darknet19", &model, [2, 3, 64, 64], &device);

        assert_eq!(summary.name, "darknet19");
        assert_eq!(summary.num_params, 19_827_636);
        assert_eq!(summary.input_shape, vec![2, 3, 64, 64]);
        assert_eq!(summary.output_shape, vec![2, 10]);
        assert_eq!(summary.feature_shape, vec![2, 1024, 2, 2]);

        let json = serde_json::to_value(&summary).unwrap();
        assert_eq!(json["num_params"], 19_827_636);
        assert_eq!(json["feature_shape"], serde_json::json!([2, 1024, 2, 2]));
    }
}
