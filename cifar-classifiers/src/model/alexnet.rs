//! AlexNet scaled down to 32x32 inputs.

use burn::nn::LinearConfig;
use dl_utils::conv_2d;

use super::convnet::{
    BayesConvBlockConfig, BayesConvNetConfig, BayesDenseConfig, ConvBlockConfig, ConvNetConfig,
    DenseConfig,
};
use crate::bayes::{BayesConv2dConfig, BayesLinearConfig, ElboConfig};

/// `(c_in, c_out, stride, pool)`, all 3x3 kernels with padding 1.
const FEATURES: [(usize, usize, usize, bool); 5] = [
    (3, 64, 2, true),
    (64, 192, 1, true),
    (192, 384, 1, false),
    (384, 256, 1, false),
    (256, 256, 1, true),
];

/// 256 channels on a 2x2 grid.
const FLAT_FEATURES: usize = 256 * 2 * 2;
const HIDDEN: usize = 4096;
const BAYES_HIDDEN: usize = 512;

pub fn config(num_classes: usize) -> ConvNetConfig {
    ConvNetConfig::stack(
        FEATURES
            .into_iter()
            .map(|(c_in, c_out, stride, pool)| {
                let block = ConvBlockConfig::plain(conv_2d!(
                    c_in,
                    c_out,
                    kernel_size = 3,
                    padding = 1,
                    stride = stride
                ));
                if pool {
                    block.pooled()
                } else {
                    block
                }
            })
            .collect(),
        vec![
            DenseConfig::plain(FLAT_FEATURES, HIDDEN).with_dropout(0.5),
            DenseConfig::plain(HIDDEN, HIDDEN).with_dropout(0.5),
        ],
        LinearConfig::new(HIDDEN, num_classes),
    )
}

pub fn bayes_config(num_classes: usize, elbo: ElboConfig) -> BayesConvNetConfig {
    BayesConvNetConfig::stack(
        FEATURES
            .into_iter()
            .map(|(c_in, c_out, stride, pool)| {
                let block = BayesConvBlockConfig::plain(conv_2d!(
                    BayesConv2dConfig: c_in,
                    c_out,
                    kernel_size = 3,
                    padding = 1,
                    stride = stride
                ));
                if pool {
                    block.pooled()
                } else {
                    block
                }
            })
            .collect(),
        vec![BayesDenseConfig::plain(FLAT_FEATURES, BAYES_HIDDEN)],
        BayesLinearConfig::new(BAYES_HIDDEN, num_classes),
        elbo,
    )
}
