use std::path::PathBuf;

use crate::model::ModelKind;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("unknown model `{0}`, expected one of: lenet5, alexnet, vgg, resnet5")]
    UnknownModel(String),
    #[error("unknown dataset `{0}`, expected cifar10 or cifar100")]
    UnknownDataset(String),
    #[error("unknown optimizer `{0}`, expected adam or sgd")]
    UnknownOptimizer(String),
    #[error("unknown vgg depth `{0}`, expected 11, 13, 16 or 19")]
    UnknownVggDepth(String),
    #[error("{0} has no bayesian variant")]
    NoBayesianVariant(ModelKind),
    #[error("no trained weights at {}", .0.display())]
    MissingWeights(PathBuf),
}
