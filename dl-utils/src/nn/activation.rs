use burn::{
    config::Config,
    module::Module,
    tensor::{backend::Backend, Tensor},
};
use derive_new::new;

use crate::LayerInit;

/// Parameter-free ReLU, usable as a field of a sequential module.
#[derive(Debug, Module, Clone, Copy, Default, new)]
pub struct Relu {}

impl Relu {
    pub fn forward<B: Backend, const D: usize>(&self, x: Tensor<B, D>) -> Tensor<B, D> {
        burn::tensor::activation::relu(x)
    }
}

#[derive(Debug, Config)]
pub struct ReluConfig {}

impl ReluConfig {
    pub fn init(&self) -> Relu {
        Relu::new()
    }
}

impl<B: Backend> LayerInit<B> for ReluConfig {
    type Layer = Relu;

    fn init_layer(&self, _device: &B::Device) -> Self::Layer {
        self.init()
    }
}
