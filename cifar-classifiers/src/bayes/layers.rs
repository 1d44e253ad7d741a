use burn::{
    config::Config,
    module::Module,
    nn::PaddingConfig2d,
    tensor::{backend::Backend, module::conv2d, ops::ConvOptions, Tensor},
};
use dl_utils::LayerInit;

use super::{
    distribution::{GaussianVariational, ScaleMixturePrior, VariationalConfig},
    Complexity,
};

/// Samples a weight, charges its complexity and returns it.
fn draw<B: Backend, const D: usize>(
    posterior: &GaussianVariational<B, D>,
    prior: &ScaleMixturePrior,
    complexity: &mut Complexity<B>,
) -> Tensor<B, D> {
    let (weight, log_posterior) = posterior.sample();
    complexity.add(log_posterior - prior.log_prob(weight.clone()));
    weight
}

#[derive(Config, Debug)]
pub struct BayesLinearConfig {
    pub d_input: usize,
    pub d_output: usize,
    #[config(default = true)]
    pub bias: bool,
    #[config(default = "VariationalConfig::new()")]
    pub variational: VariationalConfig,
}

/// Fully connected layer with a Gaussian posterior over its weights.
#[derive(Module, Debug)]
pub struct BayesLinear<B: Backend> {
    pub weight: GaussianVariational<B, 2>,
    pub bias: Option<GaussianVariational<B, 1>>,
    pub prior: ScaleMixturePrior,
}

impl BayesLinearConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BayesLinear<B> {
        BayesLinear {
            weight: self
                .variational
                .init_posterior([self.d_input, self.d_output], device),
            bias: self
                .bias
                .then(|| self.variational.init_posterior([self.d_output], device)),
            prior: self.variational.prior(),
        }
    }
}

impl<B: Backend> LayerInit<B> for BayesLinearConfig {
    type Layer = BayesLinear<B>;

    fn init_layer(&self, device: &B::Device) -> Self::Layer {
        self.init(device)
    }
}

impl<B: Backend> BayesLinear<B> {
    /// `[N, d_input] -> [N, d_output]` with freshly sampled weights.
    pub fn forward(&self, x: Tensor<B, 2>, complexity: &mut Complexity<B>) -> Tensor<B, 2> {
        let weight = draw(&self.weight, &self.prior, complexity);
        let output = x.matmul(weight);

        match &self.bias {
            Some(bias) => output + draw(bias, &self.prior, complexity).unsqueeze(),
            None => output,
        }
    }
}

#[derive(Config, Debug)]
pub struct BayesConv2dConfig {
    pub channels: [usize; 2],
    pub kernel_size: [usize; 2],
    #[config(default = "[1, 1]")]
    pub stride: [usize; 2],
    #[config(default = "PaddingConfig2d::Valid")]
    pub padding: PaddingConfig2d,
    #[config(default = true)]
    pub bias: bool,
    #[config(default = "VariationalConfig::new()")]
    pub variational: VariationalConfig,
}

/// 2d convolution with a Gaussian posterior over its kernels.
#[derive(Module, Debug)]
pub struct BayesConv2d<B: Backend> {
    pub weight: GaussianVariational<B, 4>,
    pub bias: Option<GaussianVariational<B, 1>>,
    pub prior: ScaleMixturePrior,
    pub stride: [usize; 2],
    pub padding: [usize; 2],
}

impl BayesConv2dConfig {
    pub fn init<B: Backend>(&self, device: &B::Device) -> BayesConv2d<B> {
        let [c_in, c_out] = self.channels;
        let [k_h, k_w] = self.kernel_size;

        BayesConv2d {
            weight: self
                .variational
                .init_posterior([c_out, c_in, k_h, k_w], device),
            bias: self
                .bias
                .then(|| self.variational.init_posterior([c_out], device)),
            prior: self.variational.prior(),
            stride: self.stride,
            padding: self.explicit_padding(),
        }
    }

    fn explicit_padding(&self) -> [usize; 2] {
        match &self.padding {
            PaddingConfig2d::Valid => [0, 0],
            // odd kernels with unit stride
            PaddingConfig2d::Same => self.kernel_size.map(|k| (k - 1) / 2),
            PaddingConfig2d::Explicit(h, w) => [*h, *w],
        }
    }
}

impl<B: Backend> LayerInit<B> for BayesConv2dConfig {
    type Layer = BayesConv2d<B>;

    fn init_layer(&self, device: &B::Device) -> Self::Layer {
        self.init(device)
    }
}

impl<B: Backend> BayesConv2d<B> {
    pub fn forward(&self, x: Tensor<B, 4>, complexity: &mut Complexity<B>) -> Tensor<B, 4> {
        let weight = draw(&self.weight, &self.prior, complexity);
        let bias = self
            .bias
            .as_ref()
            .map(|bias| draw(bias, &self.prior, complexity));

        conv2d(
            x,
            weight,
            bias,
            ConvOptions::new(self.stride, self.padding, [1, 1], 1),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use dl_utils::conv_2d;

    type B = NdArray;

    #[test]
    fn linear_shapes_and_complexity() {
        let device = Default::default();
        let layer = BayesLinearConfig::new(6, 4).init::<B>(&device);
        assert_eq!(layer.weight.shape().dims, [6, 4]);
        assert_eq!(layer.num_params(), 2 * (6 * 4 + 4));

        let mut complexity = Complexity::new();
        let out = layer.forward(Tensor::ones([5, 6], &device), &mut complexity);
        assert_eq!(out.dims(), [5, 4]);
        assert_eq!(complexity.terms(), 2);
        assert!(complexity.total(&device).into_data().value[0].is_finite());
    }

    #[test]
    fn linear_without_bias() {
        let device = Default::default();
        let layer = BayesLinearConfig::new(3, 2).with_bias(false).init::<B>(&device);
        assert!(layer.bias.is_none());

        let mut complexity = Complexity::new();
        layer.forward(Tensor::ones([1, 3], &device), &mut complexity);
        assert_eq!(complexity.terms(), 1);
    }

    #[test]
    fn conv_matches_regular_conv_geometry() {
        let device = Default::default();
        let layer = conv_2d!(BayesConv2dConfig: 3, 8, kernel_size = 3, padding = 1, stride = 2)
            .init::<B>(&device);
        assert_eq!(layer.weight.shape().dims, [8, 3, 3, 3]);

        let mut complexity = Complexity::new();
        let out = layer.forward(Tensor::zeros([2, 3, 32, 32], &device), &mut complexity);
        assert_eq!(out.dims(), [2, 8, 16, 16]);
        assert_eq!(complexity.terms(), 2);
    }

    #[test]
    fn same_padding_keeps_resolution() {
        let device = Default::default();
        let layer = BayesConv2dConfig::new([1, 1], [5, 5])
            .with_padding(PaddingConfig2d::Same)
            .with_bias(false)
            .init::<B>(&device);
        assert_eq!(layer.padding, [2, 2]);

        let mut complexity = Complexity::new();
        let out = layer.forward(Tensor::zeros([1, 1, 9, 9], &device), &mut complexity);
        assert_eq!(out.dims(), [1, 1, 9, 9]);
    }
}
