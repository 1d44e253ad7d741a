use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{
            AdaptiveAvgPool2d, AdaptiveAvgPool2dConfig, MaxPool2d, MaxPool2dConfig,
        },
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::backend::Backend,
};

pub mod builder;
pub mod nn;

/// Uniform way of turning a layer config into its layer.
///
/// Some of burn's configs need a device to allocate parameters and some are
/// parameter-free, so their `init` signatures differ. Code generated by
/// `dl-utils-burn-sequential` only ever calls `init_layer`.
pub trait LayerInit<B: Backend> {
    type Layer: Module<B>;

    fn init_layer(&self, device: &B::Device) -> Self::Layer;
}

impl<B: Backend> LayerInit<B> for Conv2dConfig {
    type Layer = Conv2d<B>;

    fn init_layer(&self, device: &B::Device) -> Self::Layer {
        self.init::<B>(device)
    }
}

impl<B: Backend> LayerInit<B> for LinearConfig {
    type Layer = Linear<B>;

    fn init_layer(&self, device: &B::Device) -> Self::Layer {
        self.init::<B>(device)
    }
}

/// Only the 2d flavour is used by the image models.
impl<B: Backend> LayerInit<B> for BatchNormConfig {
    type Layer = BatchNorm<B, 2>;

    fn init_layer(&self, device: &B::Device) -> Self::Layer {
        self.init::<B, 2>(device)
    }
}

macro_rules! impl_stateless_layer_init {
    ($config:ty => $layer:ty) => {
        impl<B: Backend> LayerInit<B> for $config {
            type Layer = $layer;

            fn init_layer(&self, _device: &B::Device) -> Self::Layer {
                self.init()
            }
        }
    };
}

impl_stateless_layer_init!(DropoutConfig => Dropout);
impl_stateless_layer_init!(MaxPool2dConfig => MaxPool2d);
impl_stateless_layer_init!(AdaptiveAvgPool2dConfig => AdaptiveAvgPool2d);

#[macro_export]
macro_rules! pipe {
    ($x:expr $(,$path:ident.$layer:ident)*$(,)?) => {{
        let x = $x;
        $(let x = $path.$layer.forward(x);)*
        x
    }};
}
