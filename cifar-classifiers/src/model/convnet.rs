use burn::{
    module::Module,
    nn::{
        conv::{Conv2d, Conv2dConfig},
        pool::{MaxPool2d, MaxPool2dConfig},
        BatchNorm, BatchNormConfig, Dropout, DropoutConfig, Linear, LinearConfig,
    },
    tensor::{backend::Backend, Tensor},
};
use dl_utils::nn::{Flatten42, Flatten42Config, Relu, ReluConfig};
use dl_utils_burn_sequential::SequentialForward;

use crate::bayes::{
    BayesConv2d, BayesConv2dConfig, BayesLinear, BayesLinearConfig, BayesianModel, Complexity,
    Elbo, ElboConfig,
};

fn halving_pool() -> MaxPool2dConfig {
    MaxPool2dConfig::new([2, 2]).with_strides([2, 2])
}

/// conv -> [batch norm] -> relu -> [2x2 max pool]
#[derive(Debug, Module, SequentialForward)]
#[dims(4, 4)]
pub struct ConvBlock<B: Backend> {
    pub conv: Conv2d<B>,
    pub bn: Option<BatchNorm<B, 2>>,
    pub act: Relu,
    pub pool: Option<MaxPool2d>,
}

impl ConvBlockConfig {
    pub fn plain(conv: Conv2dConfig) -> Self {
        Self {
            conv,
            bn: None,
            act: ReluConfig::new(),
            pool: None,
        }
    }

    pub fn normalized(self) -> Self {
        let c_out = self.conv.channels[1];
        Self {
            bn: Some(BatchNormConfig::new(c_out)),
            ..self
        }
    }

    pub fn pooled(self) -> Self {
        Self {
            pool: Some(halving_pool()),
            ..self
        }
    }
}

/// [dropout] -> linear -> relu
#[derive(Debug, Module, SequentialForward)]
#[dims(2, 2)]
pub struct Dense<B: Backend> {
    pub dropout: Option<Dropout>,
    pub linear: Linear<B>,
    pub act: Relu,
}

impl DenseConfig {
    pub fn plain(d_input: usize, d_output: usize) -> Self {
        Self {
            dropout: None,
            linear: LinearConfig::new(d_input, d_output),
            act: ReluConfig::new(),
        }
    }

    pub fn with_dropout(self, prob: f64) -> Self {
        Self {
            dropout: Some(DropoutConfig::new(prob)),
            ..self
        }
    }
}

/// Convolutional feature extractor followed by a fully connected classifier.
#[derive(Debug, Module, SequentialForward)]
#[dims(4, 2)]
pub struct ConvNet<B: Backend> {
    pub features: Vec<ConvBlock<B>>,
    pub flatten: Flatten42,
    pub hidden: Vec<Dense<B>>,
    pub output: Linear<B>,
}

impl ConvNetConfig {
    pub fn stack(
        features: Vec<ConvBlockConfig>,
        hidden: Vec<DenseConfig>,
        output: LinearConfig,
    ) -> Self {
        Self {
            features,
            flatten: Flatten42Config::new(),
            hidden,
            output,
        }
    }
}

#[derive(Debug, Module, SequentialForward)]
#[manual_forward]
pub struct BayesConvBlock<B: Backend> {
    pub conv: BayesConv2d<B>,
    pub bn: Option<BatchNorm<B, 2>>,
    pub act: Relu,
    pub pool: Option<MaxPool2d>,
}

impl<B: Backend> BayesConvBlock<B> {
    pub fn forward(&self, x: Tensor<B, 4>, complexity: &mut Complexity<B>) -> Tensor<B, 4> {
        let x = self.conv.forward(x, complexity);
        let x = match &self.bn {
            Some(bn) => bn.forward(x),
            None => x,
        };
        let x = self.act.forward(x);
        match &self.pool {
            Some(pool) => pool.forward(x),
            None => x,
        }
    }
}

impl BayesConvBlockConfig {
    pub fn plain(conv: BayesConv2dConfig) -> Self {
        Self {
            conv,
            bn: None,
            act: ReluConfig::new(),
            pool: None,
        }
    }

    pub fn normalized(self) -> Self {
        let c_out = self.conv.channels[1];
        Self {
            bn: Some(BatchNormConfig::new(c_out)),
            ..self
        }
    }

    pub fn pooled(self) -> Self {
        Self {
            pool: Some(halving_pool()),
            ..self
        }
    }
}

#[derive(Debug, Module, SequentialForward)]
#[manual_forward]
pub struct BayesDense<B: Backend> {
    pub linear: BayesLinear<B>,
    pub act: Relu,
}

impl<B: Backend> BayesDense<B> {
    pub fn forward(&self, x: Tensor<B, 2>, complexity: &mut Complexity<B>) -> Tensor<B, 2> {
        self.act.forward(self.linear.forward(x, complexity))
    }
}

impl BayesDenseConfig {
    pub fn plain(d_input: usize, d_output: usize) -> Self {
        Self::new(BayesLinearConfig::new(d_input, d_output), ReluConfig::new())
    }
}

/// [`ConvNet`] with every convolution and linear layer made Bayesian.
#[derive(Debug, Module, SequentialForward)]
#[manual_forward]
pub struct BayesConvNet<B: Backend> {
    pub features: Vec<BayesConvBlock<B>>,
    pub flatten: Flatten42,
    pub hidden: Vec<BayesDense<B>>,
    pub output: BayesLinear<B>,
    pub elbo: Elbo,
}

impl BayesConvNetConfig {
    pub fn stack(
        features: Vec<BayesConvBlockConfig>,
        hidden: Vec<BayesDenseConfig>,
        output: BayesLinearConfig,
        elbo: ElboConfig,
    ) -> Self {
        Self {
            features,
            flatten: Flatten42Config::new(),
            hidden,
            output,
            elbo,
        }
    }
}

impl<B: Backend> BayesianModel<B> for BayesConvNet<B> {
    fn forward_sampled(
        &self,
        images: Tensor<B, 4>,
        complexity: &mut Complexity<B>,
    ) -> Tensor<B, 2> {
        let x = self
            .features
            .iter()
            .fold(images, |x, block| block.forward(x, complexity));
        let x = self.flatten.forward(x);
        let x = self
            .hidden
            .iter()
            .fold(x, |x, dense| dense.forward(x, complexity));
        self.output.forward(x, complexity)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use dl_utils::conv_2d;

    type B = NdArray;

    #[test]
    fn block_builders() {
        let block = ConvBlockConfig::plain(conv_2d!(3, 8, kernel_size = 3))
            .normalized()
            .pooled();
        assert_eq!(block.bn.as_ref().map(|bn| bn.num_features), Some(8));
        assert_eq!(block.pool.as_ref().map(|pool| pool.strides), Some([2, 2]));

        let dense = DenseConfig::plain(10, 4).with_dropout(0.25);
        assert_eq!(dense.dropout.map(|d| d.prob), Some(0.25));
    }

    #[test]
    fn bayes_net_charges_every_layer() {
        let device = Default::default();
        let config = BayesConvNetConfig::stack(
            vec![BayesConvBlockConfig::plain(conv_2d!(BayesConv2dConfig: 3, 4, kernel_size = 3))
                .normalized()
                .pooled()],
            vec![BayesDenseConfig::plain(4 * 3 * 3, 6)],
            BayesLinearConfig::new(6, 2),
            ElboConfig::new(),
        );
        let net = config.init::<B>(&device);

        let mut complexity = Complexity::new();
        let logits = net.forward_sampled(Tensor::zeros([2, 3, 8, 8], &device), &mut complexity);
        assert_eq!(logits.dims(), [2, 2]);
        // weight and bias of three layers
        assert_eq!(complexity.terms(), 6);
    }
}
