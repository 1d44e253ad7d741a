use std::{
    ffi::OsString,
    path::{Path, PathBuf},
    sync::Arc,
};

use anyhow::Context;
use burn::{
    data::{
        dataloader::{DataLoader, DataLoaderBuilder},
        dataset::Dataset,
    },
    module::Module,
    record::{CompactRecorder, Recorder},
    tensor::{backend::Backend, ElementConversion, Int, Tensor},
};
use indicatif::{ProgressBar, ProgressStyle};

use crate::{
    data::{cifar::CifarDataset, CifarBatch, CifarBatcher, DatasetKind},
    error::Error,
    model::{ClassificationModel, ModelSpec},
    training::{TrainingConfig, WEIGHTS_EXTENSION},
    with_model,
};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Accuracy {
    pub correct: usize,
    pub total: usize,
}

impl Accuracy {
    pub fn update<B: Backend>(&mut self, predicted: Tensor<B, 1, Int>, targets: Tensor<B, 1, Int>) {
        self.total += targets.dims()[0];
        let correct = predicted.equal(targets).int().sum().into_scalar().elem::<i64>();
        self.correct += correct as usize;
    }

    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        100.0 * self.correct as f64 / self.total as f64
    }
}

/// Runs the model over every batch of `loader` and counts argmax hits.
pub fn evaluate<B: Backend, M: ClassificationModel<B>>(
    model: &M,
    loader: Arc<dyn DataLoader<CifarBatch<B>>>,
    num_batches: usize,
) -> anyhow::Result<Accuracy> {
    let style = ProgressStyle::default_bar()
        .template("test [{bar:30}] {pos:>5}/{len:5} {msg}")?
        .progress_chars("=> ");
    let bar = ProgressBar::new(num_batches as u64).with_style(style);

    let mut accuracy = Accuracy::default();
    for batch in loader.iter() {
        let predicted = model.logits(batch.images).argmax(1).flatten::<1>(0, 1);
        accuracy.update(predicted, batch.targets);

        bar.inc(1);
        bar.set_message(format!("Accuracy: {:.2}", accuracy.percent()));
    }
    bar.finish();

    Ok(accuracy)
}

/// `weights_path` with the recorder's extension appended.
pub fn weights_file(weights_path: &Path) -> PathBuf {
    let mut file = OsString::from(weights_path.as_os_str());
    file.push(".");
    file.push(WEIGHTS_EXTENSION);
    file.into()
}

fn existing_weights_file(weights_path: &Path) -> Result<PathBuf, Error> {
    let file = weights_file(weights_path);
    if file.is_file() {
        Ok(file)
    } else {
        Err(Error::MissingWeights(file))
    }
}

/// Loads the weights saved at `weights_path` into `model`.
pub fn load_weights<B: Backend, M: Module<B>>(
    model: M,
    weights_path: &Path,
    device: &B::Device,
) -> anyhow::Result<M> {
    let file = existing_weights_file(weights_path)?;
    let record = CompactRecorder::new()
        .load(weights_path.to_path_buf(), device)
        .with_context(|| format!("loading {}", file.display()))?;

    Ok(model.load_record(record))
}

/// Loads the trained weights of `spec` and evaluates them on the test split.
pub fn test<B: Backend>(
    spec: ModelSpec,
    dataset: DatasetKind,
    config: &TrainingConfig,
    weights_path: &Path,
    device: B::Device,
) -> anyhow::Result<Accuracy> {
    log::info!("- test {} on {} -", spec.name(), dataset);
    existing_weights_file(weights_path)?;
    B::seed(config.seed);

    let dataset_test = CifarDataset::test(dataset).context("test dataset")?;
    let num_batches = dataset_test.len().div_ceil(config.test_batch_size.max(1));
    let loader = DataLoaderBuilder::new(CifarBatcher::<B>::new(device.clone()))
        .batch_size(config.test_batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_test);

    let architecture = spec.architecture(dataset.num_classes(), &config.elbo);
    with_model!(B, architecture, &device, |model| {
        let model = load_weights(model, weights_path, &device)?;
        evaluate(&model, loader, num_batches)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::cifar::CifarItem;
    use burn::{backend::NdArray, tensor::Data};

    type B = NdArray;

    /// Scores each of the three classes by the mean of one colour channel.
    #[derive(Module, Debug)]
    struct BrightestChannel {}

    impl<B: Backend> ClassificationModel<B> for BrightestChannel {
        fn logits(&self, images: Tensor<B, 4>) -> Tensor<B, 2> {
            let [n, c, _, _] = images.dims();
            images.mean_dim(3).mean_dim(2).reshape([n, c])
        }
    }

    fn item(bright: usize, label: usize) -> CifarItem {
        let mut img = [[[0.0; 3]; 32]; 32];
        img.iter_mut()
            .flatten()
            .for_each(|pixel| pixel[bright] = 1.0);
        CifarItem { img, label }
    }

    #[test]
    fn accuracy_counts_matches() {
        let device = Default::default();
        let tensor = |values: [i64; 4]| {
            Tensor::<B, 1, Int>::from_data(Data::from(values).convert(), &device)
        };

        let mut accuracy = Accuracy::default();
        assert_eq!(accuracy.percent(), 0.0);

        accuracy.update(tensor([1, 2, 3, 4]), tensor([1, 0, 3, 0]));
        assert_eq!(accuracy, Accuracy { correct: 2, total: 4 });
        accuracy.update(tensor([0, 0, 0, 0]), tensor([0, 0, 0, 0]));
        assert_eq!(accuracy.percent(), 75.0);
    }

    #[test]
    fn evaluates_every_batch() {
        let device = Default::default();
        let items = [(0, 0), (1, 1), (2, 2), (2, 0), (2, 1)]
            .into_iter()
            .map(|(bright, label)| item(bright, label))
            .collect();
        let loader = DataLoaderBuilder::new(CifarBatcher::<B>::new(device))
            .batch_size(2)
            .build(CifarDataset::from_items(items));

        let accuracy = evaluate(&BrightestChannel {}, loader, 3).unwrap();
        assert_eq!(accuracy, Accuracy { correct: 3, total: 5 });
        assert_eq!(accuracy.percent(), 60.0);
    }

    #[test]
    fn missing_weights_are_reported() {
        let spec = ModelSpec::new(
            crate::model::ModelKind::Lenet5,
            false,
            crate::model::VggDepth::default(),
        )
        .unwrap();
        let path = std::env::temp_dir().join("cifar-classifiers-no-such-weights");
        let err = test::<B>(
            spec,
            DatasetKind::Cifar10,
            &TrainingConfig::new(),
            &path,
            Default::default(),
        )
        .unwrap_err();

        assert!(matches!(
            err.downcast_ref::<Error>(),
            Some(Error::MissingWeights(file))
                if file.ends_with("cifar-classifiers-no-such-weights.mpk.gz")
        ));
    }

    #[test]
    fn weights_file_appends_extension() {
        assert_eq!(
            weights_file(Path::new("trained_weights/vgg11-bayes-cifar10-150-256")),
            PathBuf::from("trained_weights/vgg11-bayes-cifar10-150-256.mpk.gz")
        );
    }
}
