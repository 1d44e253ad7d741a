use std::{
    fmt,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use anyhow::Context;
use burn::{
    config::Config,
    data::dataloader::{DataLoader, DataLoaderBuilder},
    module::{AutodiffModule, Module},
    optim::{momentum::MomentumConfig, AdamConfig, Optimizer, SgdConfig},
    record::CompactRecorder,
    tensor::backend::{AutodiffBackend, Backend},
    train::{
        metric::{AccuracyMetric, LossMetric},
        renderer::{MetricState, MetricsRenderer, TrainingProgress},
        ClassificationOutput, LearnerBuilder, TrainOutput, TrainStep, ValidStep,
    },
};
use serde::{Deserialize, Serialize};

use crate::{
    bayes::ElboConfig,
    data::{cifar::CifarDataset, CifarBatch, CifarBatcher, DatasetKind},
    error::Error,
    model::{resnet, BayesConvNet, ClassificationModel, ConvNet, ModelKind, ModelSpec},
    with_model,
};

/// Extension [`CompactRecorder`] appends to weight files.
pub const WEIGHTS_EXTENSION: &str = "mpk.gz";

macro_rules! impl_steps {
    ($model:ty) => {
        impl<B: AutodiffBackend> TrainStep<CifarBatch<B>, ClassificationOutput<B>> for $model {
            fn step(&self, batch: CifarBatch<B>) -> TrainOutput<ClassificationOutput<B>> {
                let item = self.forward_classification(batch.images, batch.targets);

                TrainOutput::new(self, item.loss.backward(), item)
            }
        }

        impl<B: Backend> ValidStep<CifarBatch<B>, ClassificationOutput<B>> for $model {
            fn step(&self, batch: CifarBatch<B>) -> ClassificationOutput<B> {
                self.forward_classification(batch.images, batch.targets)
            }
        }
    };
}

impl_steps!(ConvNet<B>);
impl_steps!(BayesConvNet<B>);
impl_steps!(resnet::Model<B>);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OptimizerKind {
    Adam,
    Sgd,
}

impl FromStr for OptimizerKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "adam" => Ok(Self::Adam),
            "sgd" => Ok(Self::Sgd),
            _ => Err(Error::UnknownOptimizer(s.to_owned())),
        }
    }
}

impl fmt::Display for OptimizerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Adam => "adam",
            Self::Sgd => "sgd",
        })
    }
}

#[derive(Config, Debug)]
pub struct TrainingConfig {
    #[config(default = 150)]
    pub num_epochs: usize,
    #[config(default = 256)]
    pub batch_size: usize,
    #[config(default = 10)]
    pub test_batch_size: usize,
    #[config(default = 4)]
    pub num_workers: usize,
    #[config(default = 33)]
    pub seed: u64,
    #[config(default = "OptimizerKind::Adam")]
    pub optimizer: OptimizerKind,
    #[config(default = 1.0e-3)]
    pub learning_rate: f64,
    /// Only used by SGD.
    #[config(default = 0.9)]
    pub momentum: f64,
    #[config(default = "ElboConfig::new()")]
    pub elbo: ElboConfig,
}

impl TrainingConfig {
    /// Defaults of the training script each model was tuned with.
    pub fn preset(kind: ModelKind) -> Self {
        match kind {
            ModelKind::Resnet5 => Self::new()
                .with_num_epochs(250)
                .with_batch_size(128)
                .with_optimizer(OptimizerKind::Sgd),
            _ => Self::new(),
        }
    }

    /// Adam with torch's epsilon.
    pub fn adam(&self) -> AdamConfig {
        AdamConfig::new().with_epsilon(1.0e-8)
    }

    /// SGD with undampened momentum, as torch applies it.
    pub fn sgd(&self) -> SgdConfig {
        let momentum = MomentumConfig::new()
            .with_momentum(self.momentum)
            .with_dampening(0.0);
        SgdConfig::new().with_momentum(Some(momentum))
    }
}

/// Where a training run writes and how it reports progress.
#[derive(Debug, Clone, Copy)]
pub struct TrainingRun<'a> {
    /// Learner checkpoints, metric logs and `config.json`.
    pub artifacts_dir: &'a Path,
    /// Trained weights, without the recorder's extension.
    pub weights_path: &'a Path,
    /// Terminal dashboard; epoch progress goes to the log otherwise.
    pub dashboard: bool,
}

/// `dir/{model}-{dataset}-{epochs}-{batch}`, without the recorder's extension.
pub fn weights_path(
    dir: impl AsRef<Path>,
    spec: &ModelSpec,
    dataset: DatasetKind,
    config: &TrainingConfig,
) -> PathBuf {
    dir.as_ref().join(format!(
        "{}-{}-{}-{}",
        spec.name(),
        dataset.name(),
        config.num_epochs,
        config.batch_size
    ))
}

pub fn train<B: AutodiffBackend>(
    spec: ModelSpec,
    dataset: DatasetKind,
    config: &TrainingConfig,
    run: &TrainingRun,
    device: B::Device,
) -> anyhow::Result<()> {
    log::info!("- train {} on {} -", spec.name(), dataset);

    log::info!("loading datasets");
    let dataset_train = CifarDataset::train(dataset).context("train dataset")?;
    let dataset_test = CifarDataset::test(dataset).context("test dataset")?;

    train_on::<B>(
        spec,
        dataset.num_classes(),
        (dataset_train, dataset_test),
        config,
        run,
        device,
    )
}

/// [`train`] on already loaded `(train, test)` splits.
pub fn train_on<B: AutodiffBackend>(
    spec: ModelSpec,
    num_classes: usize,
    (dataset_train, dataset_test): (CifarDataset, CifarDataset),
    config: &TrainingConfig,
    run: &TrainingRun,
    device: B::Device,
) -> anyhow::Result<()> {
    B::seed(config.seed);

    std::fs::create_dir_all(run.artifacts_dir).context("creating artifacts dir")?;
    config
        .save(run.artifacts_dir.join("config.json"))
        .context("saving training config")?;

    log::info!("creating loaders");
    let loader_train = DataLoaderBuilder::new(CifarBatcher::<B>::new(device.clone()))
        .batch_size(config.batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_train);
    let batcher_test = CifarBatcher::<B::InnerBackend>::new(device.clone());
    let loader_test = DataLoaderBuilder::new(batcher_test)
        .batch_size(config.test_batch_size)
        .shuffle(config.seed)
        .num_workers(config.num_workers)
        .build(dataset_test);

    let architecture = spec.architecture(num_classes, &config.elbo);
    with_model!(B, architecture, &device, |model| {
        println!(
            "Running Mode:{}, #Parameters:{}",
            spec.name(),
            model.num_params()
        );
        let loaders = (loader_train, loader_test);
        match config.optimizer {
            OptimizerKind::Adam => {
                let optim = config.adam().init();
                fit(model, optim, loaders, config, run, &device)
            }
            OptimizerKind::Sgd => {
                let optim = config.sgd().init();
                fit(model, optim, loaders, config, run, &device)
            }
        }
    })
}

type Loaders<B> = (
    Arc<dyn DataLoader<CifarBatch<B>>>,
    Arc<dyn DataLoader<CifarBatch<<B as AutodiffBackend>::InnerBackend>>>,
);

fn fit<B, M, O>(
    model: M,
    optim: O,
    (loader_train, loader_test): Loaders<B>,
    config: &TrainingConfig,
    run: &TrainingRun,
    device: &B::Device,
) -> anyhow::Result<()>
where
    B: AutodiffBackend,
    M: AutodiffModule<B>
        + TrainStep<CifarBatch<B>, ClassificationOutput<B>>
        + fmt::Display
        + 'static,
    M::InnerModule: ValidStep<CifarBatch<B::InnerBackend>, ClassificationOutput<B::InnerBackend>>,
    O: Optimizer<M, B>,
{
    log::info!("creating learner");
    let builder = LearnerBuilder::new(run.artifacts_dir.to_string_lossy().as_ref())
        .metric_train_numeric(AccuracyMetric::new())
        .metric_valid_numeric(AccuracyMetric::new())
        .metric_train_numeric(LossMetric::new())
        .metric_valid_numeric(LossMetric::new())
        .with_file_checkpointer(CompactRecorder::new())
        .devices(vec![device.clone()])
        .num_epochs(config.num_epochs);
    let builder = if run.dashboard {
        builder
    } else {
        builder.renderer(EpochLogRenderer::default())
    };
    let learner = builder.build(model, optim, config.learning_rate);

    log::info!("fitting");
    let trained_model = learner.fit(loader_train, loader_test);

    let weights_path = run.weights_path;
    log::info!("saving to {}", weights_path.display());
    if let Some(dir) = weights_path.parent() {
        std::fs::create_dir_all(dir).context("creating weights dir")?;
    }
    trained_model
        .save_file(weights_path.to_path_buf(), &CompactRecorder::new())
        .context("saving trained model")?;
    println!(
        "Trained Weights are Written to {}.{WEIGHTS_EXTENSION} file",
        weights_path.display()
    );

    Ok(())
}

/// Logs one line per started epoch instead of drawing the dashboard.
#[derive(Debug, Default)]
struct EpochLogRenderer {
    train_epoch: usize,
    valid_epoch: usize,
}

impl MetricsRenderer for EpochLogRenderer {
    fn update_train(&mut self, _state: MetricState) {}

    fn update_valid(&mut self, _state: MetricState) {}

    fn render_train(&mut self, item: TrainingProgress) {
        if item.epoch != self.train_epoch {
            self.train_epoch = item.epoch;
            log::info!("train epoch {}/{}", item.epoch, item.epoch_total);
        }
    }

    fn render_valid(&mut self, item: TrainingProgress) {
        if item.epoch != self.valid_epoch {
            self.valid_epoch = item.epoch;
            log::info!("valid epoch {}/{}", item.epoch, item.epoch_total);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        data::cifar::CifarItem,
        evaluation::{load_weights, weights_file},
        model::{lenet, VggDepth},
    };
    use burn::{
        backend::{Autodiff, NdArray},
        data::dataloader::batcher::Batcher,
        tensor::Tensor,
    };

    type AD = Autodiff<NdArray>;

    /// Solid images whose bright channel is the label.
    fn items(n: usize) -> Vec<CifarItem> {
        (0..n)
            .map(|i| {
                let mut img = [[[0.0; 3]; 32]; 32];
                img.iter_mut().flatten().for_each(|pixel| pixel[i % 3] = 1.0);
                CifarItem { img, label: i % 3 }
            })
            .collect()
    }

    fn images<B: Backend>(n: usize) -> Tensor<B, 4> {
        CifarBatcher::<B>::new(Default::default()).batch(items(n)).images
    }

    /// One epoch of LeNet-5 on a handful of in-memory images.
    fn train_lenet(bayesian: bool, dir: &Path) -> PathBuf {
        let spec = ModelSpec::new(ModelKind::Lenet5, bayesian, VggDepth::default()).unwrap();
        let config = TrainingConfig::new()
            .with_num_epochs(1)
            .with_batch_size(4)
            .with_test_batch_size(4)
            .with_num_workers(0);
        let weights_path = weights_path(dir.join("weights"), &spec, DatasetKind::Cifar10, &config);
        let artifacts_dir = dir.join("artifacts");
        let run = TrainingRun {
            artifacts_dir: &artifacts_dir,
            weights_path: &weights_path,
            dashboard: false,
        };
        let splits = (
            CifarDataset::from_items(items(8)),
            CifarDataset::from_items(items(4)),
        );

        train_on::<AD>(spec, 10, splits, &config, &run, Default::default()).unwrap();

        assert!(artifacts_dir.join("config.json").is_file());
        assert!(weights_file(&weights_path).is_file());
        weights_path
    }

    #[test]
    fn trained_lenet_reloads_into_fresh_models() {
        let dir = tempfile::tempdir().unwrap();
        let weights_path = train_lenet(false, dir.path());

        let device = Default::default();
        let load = || {
            load_weights(lenet::config(10).init::<NdArray>(&device), &weights_path, &device)
                .unwrap()
        };
        let (first, second) = (load(), load());

        first
            .logits(images(2))
            .into_data()
            .assert_approx_eq(&second.logits(images(2)).into_data(), 6);
    }

    #[test]
    fn trained_bayesian_lenet_reloads_its_posterior() {
        let dir = tempfile::tempdir().unwrap();
        let weights_path = train_lenet(true, dir.path());

        let device = Default::default();
        let load = || {
            let model = lenet::bayes_config(10, ElboConfig::new()).init::<NdArray>(&device);
            load_weights(model, &weights_path, &device).unwrap()
        };
        let (first, second) = (load(), load());

        first
            .output
            .weight
            .mu
            .val()
            .into_data()
            .assert_approx_eq(&second.output.weight.mu.val().into_data(), 6);
        first
            .output
            .weight
            .rho
            .val()
            .into_data()
            .assert_approx_eq(&second.output.weight.rho.val().into_data(), 6);
    }

    /// Output bias before and after a single optimizer step on one batch.
    fn bias_around_step<M, O>(model: M, mut optim: O, bias: fn(&M) -> Vec<f32>) -> [Vec<f32>; 2]
    where
        M: AutodiffModule<AD> + TrainStep<CifarBatch<AD>, ClassificationOutput<AD>>,
        O: Optimizer<M, AD>,
    {
        let before = bias(&model);
        let batch = CifarBatcher::<AD>::new(Default::default()).batch(items(4));
        let output = model.step(batch);
        let model = optim.step(1.0e-2, model, output.grads);

        [before, bias(&model)]
    }

    fn lenet_bias(model: &ConvNet<AD>) -> Vec<f32> {
        let bias = model.output.bias.as_ref().unwrap().val();
        bias.into_data().convert().value
    }

    fn bayes_lenet_bias(model: &BayesConvNet<AD>) -> Vec<f32> {
        let bias = model.output.bias.as_ref().unwrap().mu.val();
        bias.into_data().convert().value
    }

    #[test]
    fn adam_step_moves_parameters() {
        let config = TrainingConfig::new();
        let device = Default::default();

        let model = lenet::config(10).init::<AD>(&device);
        let [before, after] = bias_around_step(model, config.adam().init(), lenet_bias);
        assert_ne!(before, after);

        let model = lenet::bayes_config(10, config.elbo.clone()).init::<AD>(&device);
        let [before, after] = bias_around_step(model, config.adam().init(), bayes_lenet_bias);
        assert_ne!(before, after);
    }

    #[test]
    fn sgd_step_moves_parameters() {
        let config = TrainingConfig::preset(ModelKind::Resnet5);
        let device = Default::default();

        let model = lenet::config(10).init::<AD>(&device);
        let [before, after] = bias_around_step(model, config.sgd().init(), lenet_bias);
        assert_ne!(before, after);

        let model = lenet::bayes_config(10, config.elbo.clone()).init::<AD>(&device);
        let [before, after] = bias_around_step(model, config.sgd().init(), bayes_lenet_bias);
        assert_ne!(before, after);
    }

    #[test]
    fn optimizers_follow_torch_defaults() {
        let config = TrainingConfig::new();
        assert_eq!(config.adam().epsilon, 1.0e-8);

        let momentum = config.sgd().momentum.unwrap();
        assert_eq!(momentum.momentum, 0.9);
        assert_eq!(momentum.dampening, 0.0);
        assert!(!momentum.nesterov);
    }

    #[test]
    fn defaults_follow_the_training_script() {
        let config = TrainingConfig::new();
        assert_eq!(config.num_epochs, 150);
        assert_eq!(config.batch_size, 256);
        assert_eq!(config.test_batch_size, 10);
        assert_eq!(config.seed, 33);
        assert_eq!(config.optimizer, OptimizerKind::Adam);
        assert_eq!(config.elbo.sample_nbr, 3);
    }

    #[test]
    fn resnet_preset_uses_sgd() {
        let config = TrainingConfig::preset(ModelKind::Resnet5);
        assert_eq!(config.num_epochs, 250);
        assert_eq!(config.batch_size, 128);
        assert_eq!(config.optimizer, OptimizerKind::Sgd);
        assert_eq!(TrainingConfig::preset(ModelKind::Alexnet).optimizer, OptimizerKind::Adam);
    }

    #[test]
    fn weight_files_are_named_after_the_run() {
        let config = TrainingConfig::new();
        let spec = ModelSpec::new(ModelKind::Lenet5, false, VggDepth::default()).unwrap();
        assert_eq!(
            weights_path("trained_weights", &spec, DatasetKind::Cifar10, &config),
            PathBuf::from("trained_weights/lenet5-cifar10-150-256")
        );

        let spec = ModelSpec::new(ModelKind::Alexnet, true, VggDepth::default()).unwrap();
        assert_eq!(
            weights_path("w", &spec, DatasetKind::Cifar100, &config.with_num_epochs(3)),
            PathBuf::from("w/alexnet-bayes-cifar100-3-256")
        );
    }

    #[test]
    fn optimizer_names() {
        assert_eq!("SGD".parse::<OptimizerKind>().unwrap(), OptimizerKind::Sgd);
        assert_eq!(OptimizerKind::Adam.to_string(), "adam");
        assert!("rmsprop".parse::<OptimizerKind>().is_err());
    }
}
