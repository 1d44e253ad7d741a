use std::f64::consts::PI;

use burn::{
    config::Config,
    module::{Module, Param},
    tensor::{activation::relu, backend::Backend, Distribution, Shape, Tensor},
};

/// `ln N(x; mu, sigma)` elementwise.
fn log_normal<B: Backend, const D: usize>(
    x: Tensor<B, D>,
    mu: Tensor<B, D>,
    sigma: Tensor<B, D>,
) -> Tensor<B, D> {
    let z = (x - mu) / sigma.clone();
    (z.clone() * z)
        .mul_scalar(-0.5)
        .sub(sigma.log())
        .sub_scalar(0.5 * (2.0 * PI).ln())
}

fn log_normal_centered<B: Backend, const D: usize>(x: Tensor<B, D>, sigma: f64) -> Tensor<B, D> {
    (x.clone() * x)
        .div_scalar(-2.0 * sigma * sigma)
        .sub_scalar(sigma.ln() + 0.5 * (2.0 * PI).ln())
}

/// Numerically stable `ln(1 + e^x)`.
pub fn softplus<B: Backend, const D: usize>(x: Tensor<B, D>) -> Tensor<B, D> {
    relu(x.clone()) + x.abs().neg().exp().add_scalar(1.0).log()
}

#[derive(Config, Debug)]
pub struct VariationalConfig {
    #[config(default = 1.0)]
    pub prior_pi: f64,
    #[config(default = 0.1)]
    pub prior_sigma_1: f64,
    #[config(default = 0.4)]
    pub prior_sigma_2: f64,
    #[config(default = 0.0)]
    pub posterior_mu_init: f64,
    #[config(default = -7.0)]
    pub posterior_rho_init: f64,
    /// Spread of the random initialisation of both `mu` and `rho`.
    #[config(default = 0.1)]
    pub init_std: f64,
}

impl VariationalConfig {
    pub fn prior(&self) -> ScaleMixturePrior {
        ScaleMixturePrior {
            pi: self.prior_pi,
            sigma_1: self.prior_sigma_1,
            sigma_2: self.prior_sigma_2,
        }
    }

    pub fn init_posterior<B: Backend, const D: usize>(
        &self,
        shape: [usize; D],
        device: &B::Device,
    ) -> GaussianVariational<B, D> {
        let mu = Tensor::random(
            Shape::new(shape),
            Distribution::Normal(self.posterior_mu_init, self.init_std),
            device,
        );
        let rho = Tensor::random(
            Shape::new(shape),
            Distribution::Normal(self.posterior_rho_init, self.init_std),
            device,
        );
        GaussianVariational {
            mu: Param::from(mu),
            rho: Param::from(rho),
        }
    }
}

/// Weight posterior `N(mu, softplus(rho)^2)`, trained through the
/// reparameterisation `w = mu + sigma * eps`.
#[derive(Module, Debug)]
pub struct GaussianVariational<B: Backend, const D: usize> {
    pub mu: Param<Tensor<B, D>>,
    pub rho: Param<Tensor<B, D>>,
}

impl<B: Backend, const D: usize> GaussianVariational<B, D> {
    pub fn sigma(&self) -> Tensor<B, D> {
        softplus(self.rho.val())
    }

    pub fn shape(&self) -> Shape<D> {
        self.mu.val().shape()
    }

    /// Draws a fresh weight and returns it with its log posterior density.
    pub fn sample(&self) -> (Tensor<B, D>, Tensor<B, 1>) {
        let mu = self.mu.val();
        let sigma = self.sigma();
        let eps = Tensor::random(mu.shape(), Distribution::Normal(0.0, 1.0), &mu.device());
        let weight = mu.clone() + sigma.clone() * eps;
        let log_posterior = log_normal(weight.clone(), mu, sigma).sum();
        (weight, log_posterior)
    }
}

/// `pi * N(0, sigma_1) + (1 - pi) * N(0, sigma_2)`.
#[derive(Module, Debug, Clone, Copy)]
pub struct ScaleMixturePrior {
    pub pi: f64,
    pub sigma_1: f64,
    pub sigma_2: f64,
}

impl ScaleMixturePrior {
    /// Summed log density; the `1e-6` floor keeps `ln` finite for far-out weights.
    pub fn log_prob<B: Backend, const D: usize>(&self, weight: Tensor<B, D>) -> Tensor<B, 1> {
        let density = |sigma: f64| log_normal_centered(weight.clone(), sigma).exp();
        let mixture = density(self.sigma_1).mul_scalar(self.pi)
            + density(self.sigma_2).mul_scalar(1.0 - self.pi);
        mixture.add_scalar(1e-6).log().sum()
    }
}
