//! Resnet5: a stem and two basic residual blocks, then global pooling.

use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig},
        BatchNorm, BatchNormConfig, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Tensor},
};
use dl_utils::{
    conv_2d,
    nn::{Flatten42, Flatten42Config, Relu, ReluConfig},
    pipe,
};
use dl_utils_burn_sequential::SequentialForward;

use super::convnet::{ConvBlock, ConvBlockConfig};

/// conv3x3 -> bn -> relu -> conv3x3 -> bn
#[derive(Debug, Module, SequentialForward)]
#[dims(4, 4)]
pub struct ResBlockCore<B: Backend> {
    pub conv_1: Conv2d<B>,
    pub bn_1: BatchNorm<B, 2>,
    pub act: Relu,
    pub conv_2: Conv2d<B>,
    pub bn_2: BatchNorm<B, 2>,
}

/// 1x1 projection of the shortcut when the block changes shape.
#[derive(Debug, Module, SequentialForward)]
#[dims(4, 4)]
pub struct Projection<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
}

#[derive(Debug, Module, SequentialForward)]
#[manual_forward]
pub struct ResBlock<B: Backend> {
    pub core: ResBlockCore<B>,
    pub projection: Option<Projection<B>>,
    pub act: Relu,
}

impl<B: Backend> ResBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>) -> Tensor<B, 4> {
        let shortcut = match &self.projection {
            Some(projection) => projection.forward(x.clone()),
            None => x.clone(),
        };
        self.act.forward(self.core.forward(x) + shortcut)
    }
}

impl ResBlockConfig {
    pub fn basic(c_in: usize, c_out: usize, stride: usize) -> Self {
        let core = ResBlockCoreConfig::new(
            conv_2d!(c_in, c_out, kernel_size = 3, padding = 1, stride = stride, bias = false),
            BatchNormConfig::new(c_out),
            ReluConfig::new(),
            conv_2d!(c_out, c_out, kernel_size = 3, padding = 1, bias = false),
            BatchNormConfig::new(c_out),
        );
        let projection = (stride != 1 || c_in != c_out).then(|| {
            ProjectionConfig::new(
                conv_2d!(c_in, c_out, kernel_size = 1, stride = stride, bias = false),
                BatchNormConfig::new(c_out),
            )
        });

        Self {
            core,
            projection,
            act: ReluConfig::new(),
        }
    }
}

/// Channels of the stem, doubled by the second block.
const WIDTH: usize = 16;

#[derive(Debug, Module, SequentialForward)]
#[manual_forward]
pub struct Model<B: Backend> {
    pub stem: ConvBlock<B>,
    pub body: Vec<ResBlock<B>>,
    pub pool: AdaptiveAvgPool2d,
    pub flatten: Flatten42,
    pub output: Linear<B>,
}

impl<B: Backend> Model<B> {
    pub fn forward(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        let x = self.stem.forward(images);
        let x = self.body.iter().fold(x, |x, block| block.forward(x));
        pipe!(x, self.pool, self.flatten, self.output)
    }
}

pub fn config(num_classes: usize) -> ModelConfig {
    let stem = ConvBlockConfig::plain(conv_2d!(
        3,
        WIDTH,
        kernel_size = 3,
        padding = 1,
        bias = false
    ))
    .normalized();

    ModelConfig {
        stem,
        body: vec![
            ResBlockConfig::basic(WIDTH, WIDTH, 1),
            ResBlockConfig::basic(WIDTH, 2 * WIDTH, 2),
        ],
        pool: AdaptiveAvgPool2dConfig::new([1, 1]),
        flatten: Flatten42Config::new(),
        output: LinearConfig::new(2 * WIDTH, num_classes),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;

    type B = NdArray;

    #[test]
    fn projection_only_when_shape_changes() {
        assert!(ResBlockConfig::basic(16, 16, 1).projection.is_none());
        assert!(ResBlockConfig::basic(16, 32, 2).projection.is_some());
        assert!(ResBlockConfig::basic(16, 32, 1).projection.is_some());
    }

    #[test]
    fn downsampling_block_halves_resolution() {
        let device = Default::default();
        let block = ResBlockConfig::basic(4, 8, 2).init::<B>(&device);
        let out = block.forward(Tensor::zeros([2, 4, 16, 16], &device));
        assert_eq!(out.dims(), [2, 8, 8, 8]);
    }

    #[test]
    fn pools_to_one_feature_per_channel() {
        let device = Default::default();
        let model = config(100).init::<B>(&device);
        assert_eq!(model.body.len(), 2);
        assert_eq!(model.forward(Tensor::zeros([3, 3, 32, 32], &device)).dims(), [3, 100]);
    }

    #[test]
    fn output_is_non_negative_after_relu() {
        let device = Default::default();
        let block = ResBlockConfig::basic(4, 4, 1).init::<B>(&device);
        let out = block.forward(Tensor::random(
            [1, 4, 6, 6],
            burn::tensor::Distribution::Normal(0.0, 1.0),
            &device,
        ));
        let min = out.min().into_scalar();
        assert!(min >= 0.0);
    }
}
