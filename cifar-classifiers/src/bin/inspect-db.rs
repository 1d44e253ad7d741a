use std::path::PathBuf;

use anyhow::{Context, Result};
use burn::data::dataset::Dataset;
use cifar_classifiers::{
    data::{cifar::CifarDataset, DatasetKind},
    utils::{buffer_to_image, init_logger, show_image_terminal_color, Stats},
};
use clap::Parser;
use dotenv::dotenv;
use itertools::Itertools;

/// Print what a CIFAR split looks like.
#[derive(Parser, Debug)]
struct Cli {
    #[arg(short, long, default_value = "cifar10")]
    dataset: DatasetKind,
    /// Look at the test split instead of the train split
    #[arg(long)]
    test: bool,
    /// Sample to show
    #[arg(short, long, default_value_t = 1)]
    index: usize,
    #[arg(short, long, default_value = "./out/example-image.png")]
    out: PathBuf,
}

fn main() -> Result<()> {
    dotenv().ok();
    init_logger();
    let cli = Cli::parse();

    // load the data
    let dataset = if cli.test {
        CifarDataset::test(cli.dataset)?
    } else {
        CifarDataset::train(cli.dataset)?
    };
    println!("num items: {}", dataset.len());

    // sample an image
    let image = dataset
        .get(cli.index)
        .with_context(|| format!("no item {} in {}", cli.index, cli.dataset))?;
    println!(
        "label: {} - {}",
        image.label,
        cli.dataset.class_names()[image.label]
    );
    show_image_terminal_color(&image.img);
    if let Some(dir) = cli.out.parent() {
        std::fs::create_dir_all(dir)?;
    }
    buffer_to_image(&image.img).save(&cli.out)?;
    println!("saved to {}", cli.out.display());

    // class balance
    let counts = dataset.iter().map(|item| item.label).counts();
    for (label, count) in counts.into_iter().sorted() {
        println!("{:>16}: {count}", cli.dataset.class_names()[label]);
    }

    // calculate stats
    let stats = Stats::from_iter(dataset.iter().map(|item| item.img));
    println!("{:#?}", stats);
    println!("suggested normalization: {}", stats.normalization());

    Ok(())
}
