//! VGG with batch norm, one linear layer on top of the 512 final channels.

use std::{fmt, str::FromStr};

use burn::nn::LinearConfig;
use dl_utils::conv_2d;

use super::convnet::{
    BayesConvBlockConfig, BayesConvNetConfig, ConvBlockConfig, ConvNetConfig,
};
use crate::{
    bayes::{BayesConv2dConfig, BayesLinearConfig, ElboConfig},
    error::Error,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VggDepth {
    #[default]
    Vgg11,
    Vgg13,
    Vgg16,
    Vgg19,
}

impl VggDepth {
    /// Weight layers counted the classic way, three fully connected included.
    pub fn layers(&self) -> usize {
        match self {
            Self::Vgg11 => 11,
            Self::Vgg13 => 13,
            Self::Vgg16 => 16,
            Self::Vgg19 => 19,
        }
    }

    /// Output channels of every conv, one inner vec per pooling stage.
    pub fn stages(&self) -> Vec<Vec<usize>> {
        let repeat = |counts: [usize; 5]| {
            [64, 128, 256, 512, 512]
                .into_iter()
                .zip(counts)
                .map(|(channels, count)| vec![channels; count])
                .collect()
        };
        match self {
            Self::Vgg11 => repeat([1, 1, 2, 2, 2]),
            Self::Vgg13 => repeat([2, 2, 2, 2, 2]),
            Self::Vgg16 => repeat([2, 2, 3, 3, 3]),
            Self::Vgg19 => repeat([2, 2, 4, 4, 4]),
        }
    }

    /// `(c_in, c_out, pool after)` for every conv.
    fn convs(&self) -> Vec<(usize, usize, bool)> {
        let mut c_in = 3;
        let mut convs = Vec::new();
        for stage in self.stages() {
            let last = stage.len() - 1;
            for (i, c_out) in stage.into_iter().enumerate() {
                convs.push((c_in, c_out, i == last));
                c_in = c_out;
            }
        }
        convs
    }
}

impl FromStr for VggDepth {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().trim_start_matches("vgg") {
            "11" => Ok(Self::Vgg11),
            "13" => Ok(Self::Vgg13),
            "16" => Ok(Self::Vgg16),
            "19" => Ok(Self::Vgg19),
            _ => Err(Error::UnknownVggDepth(s.to_owned())),
        }
    }
}

impl fmt::Display for VggDepth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "VGG{}", self.layers())
    }
}

pub fn config(depth: VggDepth, num_classes: usize) -> ConvNetConfig {
    ConvNetConfig::stack(
        depth
            .convs()
            .into_iter()
            .map(|(c_in, c_out, pool)| {
                let block =
                    ConvBlockConfig::plain(conv_2d!(c_in, c_out, kernel_size = 3, padding = 1))
                        .normalized();
                if pool {
                    block.pooled()
                } else {
                    block
                }
            })
            .collect(),
        Vec::new(),
        LinearConfig::new(512, num_classes),
    )
}

pub fn bayes_config(depth: VggDepth, num_classes: usize, elbo: ElboConfig) -> BayesConvNetConfig {
    BayesConvNetConfig::stack(
        depth
            .convs()
            .into_iter()
            .map(|(c_in, c_out, pool)| {
                let block = BayesConvBlockConfig::plain(conv_2d!(
                    BayesConv2dConfig: c_in,
                    c_out,
                    kernel_size = 3,
                    padding = 1
                ))
                .normalized();
                if pool {
                    block.pooled()
                } else {
                    block
                }
            })
            .collect(),
        Vec::new(),
        BayesLinearConfig::new(512, num_classes),
        elbo,
    )
}
