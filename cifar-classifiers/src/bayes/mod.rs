//! Bayes-by-backprop: layers with Gaussian weight posteriors trained on a
//! Monte Carlo estimate of the evidence lower bound.

use burn::{
    config::Config,
    module::Module,
    nn::loss::CrossEntropyLossConfig,
    tensor::{backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};
use dl_utils::LayerInit;

pub mod distribution;
pub mod layers;

pub use distribution::{GaussianVariational, ScaleMixturePrior, VariationalConfig};
pub use layers::{BayesConv2d, BayesConv2dConfig, BayesLinear, BayesLinearConfig};

/// Sum of `ln q(w) - ln p(w)` over the weights sampled in one forward pass.
pub struct Complexity<B: Backend> {
    total: Option<Tensor<B, 1>>,
    terms: usize,
}

impl<B: Backend> Default for Complexity<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: Backend> Complexity<B> {
    pub fn new() -> Self {
        Self {
            total: None,
            terms: 0,
        }
    }

    pub fn add(&mut self, kl: Tensor<B, 1>) {
        self.total = Some(match self.total.take() {
            Some(total) => total + kl,
            None => kl,
        });
        self.terms += 1;
    }

    /// Number of sampled weight tensors charged so far.
    pub fn terms(&self) -> usize {
        self.terms
    }

    pub fn total(self, device: &B::Device) -> Tensor<B, 1> {
        self.total.unwrap_or_else(|| Tensor::zeros([1], device))
    }
}

/// A model whose forward pass samples its weights.
pub trait BayesianModel<B: Backend> {
    fn forward_sampled(&self, images: Tensor<B, 4>, complexity: &mut Complexity<B>)
        -> Tensor<B, 2>;
}

#[derive(Config, Debug)]
pub struct ElboConfig {
    /// Forward samples averaged per step.
    #[config(default = 3)]
    pub sample_nbr: usize,
    /// Weight of the complexity cost, usually one over the training set size.
    #[config(default = 2.0e-5)]
    pub complexity_cost_weight: f64,
}

impl ElboConfig {
    pub fn init(&self) -> Elbo {
        Elbo {
            sample_nbr: self.sample_nbr.max(1),
            complexity_cost_weight: self.complexity_cost_weight,
        }
    }
}

impl<B: Backend> LayerInit<B> for ElboConfig {
    type Layer = Elbo;

    fn init_layer(&self, _device: &B::Device) -> Self::Layer {
        self.init()
    }
}

/// ELBO settings carried by a Bayesian model so its train step can use them.
#[derive(Module, Debug, Clone, Copy)]
pub struct Elbo {
    pub sample_nbr: usize,
    pub complexity_cost_weight: f64,
}

impl Elbo {
    /// Average over `sample_nbr` forward samples of cross entropy plus the
    /// weighted complexity cost. The logits of the last sample are reported.
    pub fn sample<B: Backend, M: BayesianModel<B>>(
        &self,
        model: &M,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let device = images.device();
        let criterion = CrossEntropyLossConfig::new().init(&device);
        let samples = self.sample_nbr.max(1);

        let draw = || {
            let mut complexity = Complexity::new();
            let output = model.forward_sampled(images.clone(), &mut complexity);
            let loss = criterion.forward(output.clone(), targets.clone())
                + complexity.total(&device) * self.complexity_cost_weight;
            (loss, output)
        };

        let (mut loss, mut output) = draw();
        for _ in 1..samples {
            let (sample_loss, sample_output) = draw();
            loss = loss + sample_loss;
            output = sample_output;
        }

        ClassificationOutput::new(loss / samples as f64, output, targets)
    }
}

/// [`Elbo::sample`] with explicit settings.
pub fn sample_elbo<B: Backend, M: BayesianModel<B>>(
    model: &M,
    images: Tensor<B, 4>,
    targets: Tensor<B, 1, Int>,
    config: &ElboConfig,
) -> ClassificationOutput<B> {
    config.init().sample(model, images, targets)
}
