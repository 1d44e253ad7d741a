use std::{fmt, str::FromStr};

use burn::{
    config::Config,
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Data, Int, Shape, Tensor},
};

use self::cifar::{
    CifarItem, CIFAR100_CLASSES, CIFAR10_CLASSES, IMG_CHANNELS, IMG_HEIGHT, IMG_WIDTH,
};
use crate::error::Error;

pub mod cifar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Cifar10,
    Cifar100,
}

impl DatasetKind {
    /// Huggingface dataset id, also used in weight file names.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cifar10 => "cifar10",
            Self::Cifar100 => "cifar100",
        }
    }

    pub fn num_classes(&self) -> usize {
        self.class_names().len()
    }

    pub fn class_names(&self) -> &'static [&'static str] {
        match self {
            Self::Cifar10 => &CIFAR10_CLASSES,
            Self::Cifar100 => &CIFAR100_CLASSES,
        }
    }

    pub fn channels(&self) -> usize {
        IMG_CHANNELS as _
    }

    pub fn image_dim(&self) -> usize {
        IMG_WIDTH as _
    }
}

impl FromStr for DatasetKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "cifar10" => Ok(Self::Cifar10),
            "cifar100" => Ok(Self::Cifar100),
            _ => Err(Error::UnknownDataset(s.to_owned())),
        }
    }
}

impl fmt::Display for DatasetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-channel `(x - mean) / std`.
#[derive(Config, Debug)]
pub struct Normalization {
    #[config(default = "[0.5, 0.5, 0.5]")]
    pub mean: [f32; 3],
    #[config(default = "[0.5, 0.5, 0.5]")]
    pub std: [f32; 3],
}

pub struct CifarBatcher<B: Backend> {
    device: B::Device,
    normalization: Normalization,
}

impl<B: Backend> CifarBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self::with_normalization(device, Normalization::new())
    }

    pub fn with_normalization(device: B::Device, normalization: Normalization) -> Self {
        Self {
            device,
            normalization,
        }
    }

    fn channel_tensor(&self, values: [f32; 3]) -> Tensor<B, 4> {
        Tensor::<B, 1>::from_data(Data::from(values).convert(), &self.device).reshape([1, 3, 1, 1])
    }
}

#[derive(Debug, Clone)]
pub struct CifarBatch<B: Backend> {
    /// N x C x H x W
    pub images: Tensor<B, 4>,
    pub targets: Tensor<B, 1, Int>,
}

impl<B: Backend> Batcher<CifarItem, CifarBatch<B>> for CifarBatcher<B> {
    fn batch(&self, items: Vec<CifarItem>) -> CifarBatch<B> {
        let n = items.len();
        let pixels = items
            .iter()
            .flat_map(|item| item.img.iter().flatten().flatten().copied())
            .collect::<Vec<f32>>();
        let shape = Shape::new([n, IMG_HEIGHT as _, IMG_WIDTH as _, IMG_CHANNELS as _]);

        let images = Tensor::<B, 4>::from_data(Data::new(pixels, shape).convert(), &self.device)
            // N x H x W x C -> N x C x W x H
            .swap_dims(1, 3)
            // N x C x W x H -> N x C x H x W
            .swap_dims(2, 3);
        let images = (images - self.channel_tensor(self.normalization.mean))
            / self.channel_tensor(self.normalization.std);

        let labels = items
            .iter()
            .map(|item| item.label as i64)
            .collect::<Vec<_>>();
        let targets = Tensor::<B, 1, Int>::from_data(
            Data::new(labels, Shape::new([n])).convert(),
            &self.device,
        );

        CifarBatch { images, targets }
    }
}
