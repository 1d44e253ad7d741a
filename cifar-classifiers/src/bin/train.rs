use std::path::PathBuf;

use burn::tensor::backend::AutodiffBackend;
use cifar_classifiers::{
    data::DatasetKind,
    evaluation,
    model::{ModelKind, ModelSpec, VggDepth},
    training::{self, OptimizerKind, TrainingConfig, TrainingRun},
    utils::init_logger,
};
use clap::Parser;
use dotenv::dotenv;

#[cfg(not(feature = "tch"))]
type Backend = burn::backend::Autodiff<burn::backend::NdArray>;
#[cfg(feature = "tch")]
type Backend = burn::backend::Autodiff<burn::backend::LibTorch>;

type Device = <Backend as burn::tensor::backend::Backend>::Device;
type InnerBackend = <Backend as AutodiffBackend>::InnerBackend;

/// Train and evaluate convolutional classifiers on CIFAR.
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Cli {
    /// lenet5, alexnet, vgg or resnet5
    #[arg(short, long, default_value = "lenet5")]
    model: ModelKind,
    /// Use the Bayes-by-backprop variant of the model
    #[arg(short = 'b', long = "is-bayesian", alias = "is_bayesian")]
    is_bayesian: bool,
    /// cifar10 or cifar100
    #[arg(short, long, default_value = "cifar10")]
    dataset: DatasetKind,
    #[arg(long, default_value = "11")]
    vgg_depth: VggDepth,
    #[arg(long)]
    epochs: Option<usize>,
    #[arg(long)]
    batch_size: Option<usize>,
    #[arg(long)]
    test_batch_size: Option<usize>,
    /// adam or sgd
    #[arg(long)]
    optimizer: Option<OptimizerKind>,
    #[arg(long)]
    learning_rate: Option<f64>,
    #[arg(long)]
    num_workers: Option<usize>,
    #[arg(long, default_value = "trained_weights")]
    weights_dir: PathBuf,
    /// Learner checkpoints, logs and the training config
    #[arg(long, env = "ARTIFACTS_DIR", default_value = "artifacts")]
    artifacts_dir: PathBuf,
    /// Skip training and evaluate previously saved weights
    #[arg(long)]
    eval_only: bool,
    /// Log epoch progress instead of drawing the training dashboard
    #[arg(long)]
    no_dashboard: bool,
    /// CUDA device index, CPU when absent
    #[cfg(feature = "tch")]
    #[arg(long)]
    gpu: Option<usize>,
}

impl Cli {
    fn training_config(&self) -> TrainingConfig {
        let mut config = TrainingConfig::preset(self.model);
        if let Some(epochs) = self.epochs {
            config.num_epochs = epochs;
        }
        if let Some(batch_size) = self.batch_size {
            config.batch_size = batch_size;
        }
        if let Some(test_batch_size) = self.test_batch_size {
            config.test_batch_size = test_batch_size;
        }
        if let Some(optimizer) = self.optimizer {
            config.optimizer = optimizer;
        }
        if let Some(learning_rate) = self.learning_rate {
            config.learning_rate = learning_rate;
        }
        if let Some(num_workers) = self.num_workers {
            config.num_workers = num_workers;
        }
        config
    }

    #[cfg(not(feature = "tch"))]
    fn device(&self) -> Device {
        burn::backend::ndarray::NdArrayDevice::Cpu
    }

    #[cfg(feature = "tch")]
    fn device(&self) -> Device {
        use burn::backend::libtorch::LibTorchDevice;
        match self.gpu {
            Some(index) => LibTorchDevice::Cuda(index),
            None => LibTorchDevice::Cpu,
        }
    }
}

fn main() -> anyhow::Result<()> {
    // a missing .env file is fine
    dotenv().ok();
    init_logger();
    let cli = Cli::parse();

    let spec = ModelSpec::new(cli.model, cli.is_bayesian, cli.vgg_depth)?;
    let config = cli.training_config();
    let weights_path = training::weights_path(&cli.weights_dir, &spec, cli.dataset, &config);

    let device = cli.device();
    println!("setup device {device:?}");

    if !cli.eval_only {
        println!("starting training");
        let run = TrainingRun {
            artifacts_dir: &cli.artifacts_dir,
            weights_path: &weights_path,
            dashboard: !cli.no_dashboard,
        };
        training::train::<Backend>(spec, cli.dataset, &config, &run, device.clone())?;
    }

    let accuracy =
        evaluation::test::<InnerBackend>(spec, cli.dataset, &config, &weights_path, device)?;
    println!(
        "Test Accuracy: {:.2}% ({}/{})",
        accuracy.percent(),
        accuracy.correct,
        accuracy.total
    );
    Ok(())
}
