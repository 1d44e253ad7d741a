//! LeNet-5 (<http://yann.lecun.com/exdb/lenet/>) for 3x32x32 inputs.

use burn::nn::LinearConfig;
use dl_utils::conv_2d;

use super::convnet::{
    BayesConvBlockConfig, BayesConvNetConfig, BayesDenseConfig, ConvBlockConfig, ConvNetConfig,
    DenseConfig,
};
use crate::bayes::{BayesConv2dConfig, BayesLinearConfig, ElboConfig};

const FEATURES: [(usize, usize); 2] = [(3, 6), (6, 16)];
const HIDDEN: [(usize, usize); 2] = [(16 * 5 * 5, 120), (120, 84)];

pub fn config(num_classes: usize) -> ConvNetConfig {
    ConvNetConfig::stack(
        FEATURES
            .into_iter()
            .map(|(c_in, c_out)| {
                ConvBlockConfig::plain(conv_2d!(c_in, c_out, kernel_size = 5)).pooled()
            })
            .collect(),
        HIDDEN
            .into_iter()
            .map(|(d_in, d_out)| DenseConfig::plain(d_in, d_out))
            .collect(),
        LinearConfig::new(84, num_classes),
    )
}

pub fn bayes_config(num_classes: usize, elbo: ElboConfig) -> BayesConvNetConfig {
    BayesConvNetConfig::stack(
        FEATURES
            .into_iter()
            .map(|(c_in, c_out)| {
                let conv = conv_2d!(BayesConv2dConfig: c_in, c_out, kernel_size = 5);
                BayesConvBlockConfig::plain(conv).pooled()
            })
            .collect(),
        HIDDEN
            .into_iter()
            .map(|(d_in, d_out)| BayesDenseConfig::plain(d_in, d_out))
            .collect(),
        BayesLinearConfig::new(84, num_classes),
        elbo,
    )
}
