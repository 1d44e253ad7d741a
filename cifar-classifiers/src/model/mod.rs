use std::{fmt, str::FromStr};

use burn::{
    module::Module,
    nn::loss::CrossEntropyLossConfig,
    tensor::{backend::Backend, Int, Tensor},
    train::ClassificationOutput,
};

use crate::{
    bayes::{BayesianModel, Complexity, ElboConfig},
    error::Error,
};

pub mod alexnet;
pub mod convnet;
pub mod lenet;
pub mod resnet;
pub mod vgg;

pub use convnet::{BayesConvNet, BayesConvNetConfig, ConvNet, ConvNetConfig};
pub use vgg::VggDepth;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ModelKind {
    Lenet5,
    Alexnet,
    Vgg,
    Resnet5,
}

impl ModelKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Lenet5 => "lenet5",
            Self::Alexnet => "alexnet",
            Self::Vgg => "vgg",
            Self::Resnet5 => "resnet5",
        }
    }

    pub fn has_bayesian_variant(&self) -> bool {
        !matches!(self, Self::Resnet5)
    }
}

impl FromStr for ModelKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenet5" | "lenet" => Ok(Self::Lenet5),
            "alexnet" => Ok(Self::Alexnet),
            "vgg" => Ok(Self::Vgg),
            // old scripts spell it restnet5
            "resnet5" | "restnet5" => Ok(Self::Resnet5),
            _ => Err(Error::UnknownModel(s.to_owned())),
        }
    }
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A validated model selection, only built through [`ModelSpec::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ModelSpec {
    kind: ModelKind,
    bayesian: bool,
    vgg_depth: VggDepth,
}

impl ModelSpec {
    pub fn new(kind: ModelKind, bayesian: bool, vgg_depth: VggDepth) -> Result<Self, Error> {
        if bayesian && !kind.has_bayesian_variant() {
            return Err(Error::NoBayesianVariant(kind));
        }
        Ok(Self {
            kind,
            bayesian,
            vgg_depth,
        })
    }

    pub fn kind(&self) -> ModelKind {
        self.kind
    }

    pub fn is_bayesian(&self) -> bool {
        self.bayesian
    }

    /// Only meaningful for [`ModelKind::Vgg`].
    pub fn vgg_depth(&self) -> VggDepth {
        self.vgg_depth
    }

    /// Used in log lines and weight file names.
    pub fn name(&self) -> String {
        let base = match self.kind {
            ModelKind::Vgg => format!("vgg{}", self.vgg_depth.layers()),
            kind => kind.name().to_owned(),
        };
        if self.bayesian {
            format!("{base}-bayes")
        } else {
            base
        }
    }

    pub fn architecture(&self, num_classes: usize, elbo: &ElboConfig) -> Architecture {
        let elbo = elbo.clone();
        match (self.kind, self.bayesian) {
            (ModelKind::Lenet5, false) => Architecture::ConvNet(lenet::config(num_classes)),
            (ModelKind::Lenet5, true) => {
                Architecture::BayesConvNet(lenet::bayes_config(num_classes, elbo))
            }
            (ModelKind::Alexnet, false) => Architecture::ConvNet(alexnet::config(num_classes)),
            (ModelKind::Alexnet, true) => {
                Architecture::BayesConvNet(alexnet::bayes_config(num_classes, elbo))
            }
            (ModelKind::Vgg, false) => {
                Architecture::ConvNet(vgg::config(self.vgg_depth, num_classes))
            }
            (ModelKind::Vgg, true) => {
                Architecture::BayesConvNet(vgg::bayes_config(self.vgg_depth, num_classes, elbo))
            }
            // no bayesian variant, `new` refuses it
            (ModelKind::Resnet5, _) => Architecture::Resnet(resnet::config(num_classes)),
        }
    }
}

/// Configuration of one of the concrete model types.
#[derive(Debug, Clone)]
pub enum Architecture {
    ConvNet(ConvNetConfig),
    BayesConvNet(BayesConvNetConfig),
    Resnet(resnet::ModelConfig),
}

/// Initializes the model described by an [`Architecture`] and evaluates
/// `$body` with it bound to `$model`. Every arm must produce the same type.
#[macro_export]
macro_rules! with_model {
    ($backend:ty, $architecture:expr, $device:expr, |$model:ident| $body:expr) => {
        match $architecture {
            $crate::model::Architecture::ConvNet(config) => {
                let $model = config.init::<$backend>($device);
                $body
            }
            $crate::model::Architecture::BayesConvNet(config) => {
                let $model = config.init::<$backend>($device);
                $body
            }
            $crate::model::Architecture::Resnet(config) => {
                let $model = config.init::<$backend>($device);
                $body
            }
        }
    };
}

pub trait ClassificationModel<B: Backend>: Module<B> {
    /// Class scores, `N x num_classes`.
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2>;

    fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        let output = self.logits(images);
        let loss = CrossEntropyLossConfig::new()
            .init(&output.device())
            .forward(output.clone(), targets.clone());

        ClassificationOutput::new(loss, output, targets)
    }
}

impl<B: Backend> ClassificationModel<B> for ConvNet<B> {
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }
}

impl<B: Backend> ClassificationModel<B> for resnet::Model<B> {
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward(images)
    }
}

impl<B: Backend> ClassificationModel<B> for BayesConvNet<B> {
    /// One stochastic forward pass.
    fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
        self.forward_sampled(images, &mut Complexity::new())
    }

    fn forward_classification(
        &self,
        images: Tensor<B, 4>,
        targets: Tensor<B, 1, Int>,
    ) -> ClassificationOutput<B> {
        self.elbo.sample(self, images, targets)
    }
}
