use burn::{
    backend::NdArray,
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig,
        PaddingConfig2d,
    },
    tensor::{backend::Backend, Distribution, Tensor},
};
use dl_utils::nn::{Flatten42, Flatten42Config, Relu, ReluConfig};
use dl_utils::LayerInit;
use dl_utils_burn_sequential::SequentialForward;

type B = NdArray;

#[derive(Debug, Module, SequentialForward)]
#[dims(4, 4)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: BatchNorm<B, 2>,
    pub act: Relu,
}

#[derive(Debug, Module, SequentialForward)]
#[dims(4, 4)]
#[res]
pub struct SameBlock<B: Backend> {
    conv: Conv2d<B>,
}

#[derive(Debug, Module, SequentialForward)]
#[dims(4, 2)]
struct Net<B: Backend> {
    stem: ConvBlock<B>,
    blocks: Vec<SameBlock<B>>,
    pool: Option<MaxPool2d>,
    flatten: Flatten42,
    dropout: Dropout,
    linear: Linear<B>,
}

fn net_config(pool: bool) -> NetConfig {
    let same = || {
        SameBlockConfig::new(
            Conv2dConfig::new([4, 4], [3, 3]).with_padding(PaddingConfig2d::Explicit(1, 1)),
        )
    };

    NetConfig {
        stem: ConvBlockConfig::new(
            Conv2dConfig::new([3, 4], [3, 3]).with_padding(PaddingConfig2d::Explicit(1, 1)),
            BatchNormConfig::new(4),
            ReluConfig::new(),
        ),
        blocks: vec![same(), same()],
        pool: pool.then(|| MaxPool2dConfig::new([2, 2]).with_strides([2, 2])),
        flatten: Flatten42Config::new(),
        dropout: DropoutConfig::new(0.5),
        linear: LinearConfig::new(if pool { 4 * 4 * 4 } else { 4 * 8 * 8 }, 10),
    }
}

#[test]
fn forwards_through_every_field() {
    let device = Default::default();
    let x: Tensor<B, 4> = Tensor::random([2, 3, 8, 8], Distribution::Normal(0.0, 1.0), &device);

    let with_pool = net_config(true).init::<B>(&device);
    assert_eq!(with_pool.blocks.len(), 2);
    assert_eq!(with_pool.forward(x.clone()).dims(), [2, 10]);

    let without_pool = net_config(false).init::<B>(&device);
    assert!(without_pool.pool.is_none());
    assert_eq!(without_pool.forward(x).dims(), [2, 10]);
}

#[test]
fn res_attribute_adds_the_input() {
    let device = Default::default();
    let block = SameBlockConfig::new(
        Conv2dConfig::new([2, 2], [3, 3]).with_padding(PaddingConfig2d::Explicit(1, 1)),
    )
    .init::<B>(&device);

    let x: Tensor<B, 4> = Tensor::random([1, 2, 4, 4], Distribution::Normal(0.0, 1.0), &device);
    let expected = block.conv.forward(x.clone()) + x.clone();
    block
        .forward(x)
        .into_data()
        .assert_approx_eq(&expected.into_data(), 5);
}

#[test]
fn derived_configs_are_layer_inits() {
    let device = Default::default();
    let config = ConvBlockConfig::new(
        Conv2dConfig::new([3, 8], [1, 1]),
        BatchNormConfig::new(8),
        ReluConfig::new(),
    );
    let block: ConvBlock<B> = LayerInit::<B>::init_layer(&config, &device);
    let x: Tensor<B, 4> = Tensor::zeros([1, 3, 5, 5], &device);
    assert_eq!(block.forward(x).dims(), [1, 8, 5, 5]);
}
