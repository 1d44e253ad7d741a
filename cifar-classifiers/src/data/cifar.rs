use std::path::PathBuf;

use burn::data::dataset::{
    transform::{Mapper, MapperDataset},
    Dataset, HuggingfaceDatasetLoader, InMemDataset, SqliteDataset,
};
use image::RgbImage;

use super::DatasetKind;

pub const IMG_WIDTH: u32 = 32;
pub const IMG_HEIGHT: u32 = 32;
pub const IMG_CHANNELS: u32 = 3;

pub const CIFAR10_CLASSES: [&str; 10] = [
    "airplane",
    "automobile",
    "bird",
    "cat",
    "deer",
    "dog",
    "frog",
    "horse",
    "ship",
    "truck",
];

/// Fine labels, in label order.
pub const CIFAR100_CLASSES: [&str; 100] = [
    "apple", "aquarium_fish", "baby", "bear", "beaver", "bed", "bee", "beetle", "bicycle",
    "bottle", "bowl", "boy", "bridge", "bus", "butterfly", "camel", "can", "castle",
    "caterpillar", "cattle", "chair", "chimpanzee", "clock", "cloud", "cockroach", "couch",
    "crab", "crocodile", "cup", "dinosaur", "dolphin", "elephant", "flatfish", "forest", "fox",
    "girl", "hamster", "house", "kangaroo", "keyboard", "lamp", "lawn_mower", "leopard", "lion",
    "lizard", "lobster", "man", "maple_tree", "motorcycle", "mountain", "mouse", "mushroom",
    "oak_tree", "orange", "orchid", "otter", "palm_tree", "pear", "pickup_truck", "pine_tree",
    "plain", "plate", "poppy", "porcupine", "possum", "rabbit", "raccoon", "ray", "road",
    "rocket", "rose", "sea", "seal", "shark", "shrew", "skunk", "skyscraper", "snail", "snake",
    "spider", "squirrel", "streetcar", "sunflower", "sweet_pepper", "table", "tank",
    "telephone", "television", "tiger", "tractor", "train", "trout", "tulip", "turtle",
    "wardrobe", "whale", "willow_tree", "wolf", "woman", "worm",
];

pub type Image = [[[f32; IMG_CHANNELS as _]; IMG_WIDTH as _]; IMG_HEIGHT as _];

// Rows of the sqlite cache written by burn's huggingface importer.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Cifar10RawItem {
    pub img_bytes: Vec<u8>,
    pub img_path: Option<PathBuf>,
    pub label: i64,
    pub row_id: i64,
}

#[derive(Debug, Clone, serde::Deserialize)]
pub struct Cifar100RawItem {
    pub img_bytes: Vec<u8>,
    pub img_path: Option<PathBuf>,
    pub fine_label: i64,
    pub coarse_label: i64,
    pub row_id: i64,
}

/// H x W x C image with values in `[0, 1]`.
#[derive(Debug, Clone)]
pub struct CifarItem {
    pub img: Image,
    pub label: usize,
}

/// Panics unless `image` is 32x32.
pub fn rgb_to_array(image: &RgbImage) -> Image {
    let (width, height) = image.dimensions();
    assert!(
        (width, height) == (IMG_WIDTH, IMG_HEIGHT),
        "expected a {IMG_WIDTH}x{IMG_HEIGHT} image, got {width}x{height}"
    );

    let mut img = [[[0f32; IMG_CHANNELS as _]; IMG_WIDTH as _]; IMG_HEIGHT as _];
    for (x, y, pixel) in image.enumerate_pixels() {
        let i = y as usize;
        let j = x as usize;
        for (c, value) in pixel.0.iter().enumerate() {
            img[i][j][c] = *value as f32 / 255.0;
        }
    }
    img
}

// The mapper has no error channel: a row that breaks the dataset invariants
// means a corrupt cache, so these panic with the offending row.

fn decode(bytes: &[u8], row_id: i64) -> Image {
    let image = image::load_from_memory(bytes)
        .unwrap_or_else(|err| panic!("cifar row {row_id} holds an undecodable image: {err}"))
        .to_rgb8();
    let (width, height) = image.dimensions();
    if (width, height) != (IMG_WIDTH, IMG_HEIGHT) {
        panic!(
            "cifar row {row_id} holds a {width}x{height} image, expected {IMG_WIDTH}x{IMG_HEIGHT}"
        );
    }
    rgb_to_array(&image)
}

fn checked_label(label: i64, num_classes: usize, row_id: i64) -> usize {
    match usize::try_from(label) {
        Ok(label) if label < num_classes => label,
        _ => panic!("cifar row {row_id} has label {label}, expected one below {num_classes}"),
    }
}

#[derive(Debug, Clone, Copy)]
struct BytesToImage {
    num_classes: usize,
}

impl BytesToImage {
    fn new(kind: DatasetKind) -> Self {
        Self {
            num_classes: kind.num_classes(),
        }
    }
}

impl Mapper<Cifar10RawItem, CifarItem> for BytesToImage {
    fn map(&self, item: &Cifar10RawItem) -> CifarItem {
        CifarItem {
            img: decode(&item.img_bytes, item.row_id),
            label: checked_label(item.label, self.num_classes, item.row_id),
        }
    }
}

impl Mapper<Cifar100RawItem, CifarItem> for BytesToImage {
    fn map(&self, item: &Cifar100RawItem) -> CifarItem {
        CifarItem {
            img: decode(&item.img_bytes, item.row_id),
            label: checked_label(item.fine_label, self.num_classes, item.row_id),
        }
    }
}

pub struct CifarDataset {
    dataset: Box<dyn Dataset<CifarItem>>,
}

impl CifarDataset {
    pub fn train(kind: DatasetKind) -> anyhow::Result<Self> {
        Self::new(kind, "train")
    }

    pub fn test(kind: DatasetKind) -> anyhow::Result<Self> {
        Self::new(kind, "test")
    }

    pub fn from_items(items: Vec<CifarItem>) -> Self {
        Self {
            dataset: Box::new(InMemDataset::new(items)),
        }
    }

    fn new(kind: DatasetKind, split: &str) -> anyhow::Result<Self> {
        let mut loader = HuggingfaceDatasetLoader::new(kind.name());
        if let Some(base_dir) = crate::utils::env_var("DB_BASE_DIR") {
            loader = loader.with_base_dir(&base_dir);
        }

        let dataset: Box<dyn Dataset<CifarItem>> = match kind {
            DatasetKind::Cifar10 => {
                let raw: SqliteDataset<Cifar10RawItem> = loader.dataset(split)?;
                Box::new(MapperDataset::new(raw, BytesToImage::new(kind)))
            }
            DatasetKind::Cifar100 => {
                let raw: SqliteDataset<Cifar100RawItem> = loader.dataset(split)?;
                Box::new(MapperDataset::new(raw, BytesToImage::new(kind)))
            }
        };
        log::info!("{} {split}: {} items", kind.name(), dataset.len());

        Ok(Self { dataset })
    }
}

impl Dataset<CifarItem> for CifarDataset {
    fn get(&self, index: usize) -> Option<CifarItem> {
        self.dataset.get(index)
    }

    fn len(&self) -> usize {
        self.dataset.len()
    }
}
