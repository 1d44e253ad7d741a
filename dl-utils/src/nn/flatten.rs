use burn::config::Config;
use burn::module::Module;
use burn::tensor::{backend::Backend, Tensor};

use crate::LayerInit;

#[derive(Debug, Module, Clone, Copy)]
pub struct Flatten<const DI: usize, const DO: usize> {
    pub start_dim: usize,
    pub end_dim: usize,
}

impl<const DI: usize, const DO: usize> Flatten<DI, DO> {
    pub fn forward<B: Backend>(&self, x: Tensor<B, DI>) -> Tensor<B, DO> {
        x.flatten(self.start_dim, self.end_dim)
    }
}

/// Collapses everything but the batch dimension of an image batch.
pub type Flatten42 = Flatten<4, 2>;

#[derive(Debug, Config)]
pub struct Flatten42Config {
    #[config(default = 1)]
    pub start_dim: usize,
    #[config(default = 3)]
    pub end_dim: usize,
}

impl Flatten42Config {
    pub fn init(&self) -> Flatten42 {
        Flatten {
            start_dim: self.start_dim,
            end_dim: self.end_dim,
        }
    }
}

impl<B: Backend> LayerInit<B> for Flatten42Config {
    type Layer = Flatten42;

    fn init_layer(&self, _device: &B::Device) -> Self::Layer {
        self.init()
    }
}
