#![recursion_limit = "256"]

use anyhow::{Context, anyhow, bail};
use burn::backend::NdArray;
use burn::config::Config;
use burn::prelude::Backend;
use clap::Parser;
use darknet::models::darknet::DarkNetConfig;
use darknet::models::darknet::prefabs::{DARKNET_PREFABS, try_lookup_prefab};
use darknet::summary::ModelSummary;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Smallest input edge the DarkNet trunks accept.
const MIN_IMAGE_SIZE: usize = 32;

/// Prefab class count when `--num-classes` is not given.
const DEFAULT_NUM_CLASSES: usize = 1000;

// $ cargo run --release -p darknet_summary -- --models=darknet53 --num-classes=10
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    /// Prefab models to summarize, comma separated.
    #[arg(long, value_delimiter = ',', default_value = "darknet19,darknet53")]
    models: Vec<String>,

    /// Number of output classes; 1000 for prefabs, the saved value with `--config`.
    #[arg(long)]
    num_classes: Option<usize>,

    /// Edge length of the square sample image.
    #[arg(long, default_value_t = 256)]
    image_size: usize,

    /// Batch size of the sample input.
    #[arg(short, long, default_value_t = 1)]
    batch_size: usize,

    /// Keep burn's default initializers.
    #[arg(long)]
    no_init_weights: bool,

    /// Random seed for reproducibility.
    #[arg(short, long, default_value_t = 0)]
    seed: u64,

    /// Emit the summaries as JSON.
    #[arg(long)]
    json: bool,

    /// Directory to save the model configs to.
    #[arg(long)]
    save_config: Option<PathBuf>,

    /// Load a saved model config, instead of the prefabs.
    #[arg(long)]
    config: Option<PathBuf>,
}

/// Resolve the ``(name, config)`` pairs to summarize.
fn resolve_configs(args: &Args) -> anyhow::Result<Vec<(String, DarkNetConfig)>> {
    let configs = match &args.config {
        Some(path) => {
            let config = DarkNetConfig::load(path)
                .map_err(|err| anyhow!("failed to load {}: {err:?}", path.display()))?;
            let name = path
                .file_stem()
                .map(|stem| stem.to_string_lossy().to_string())
                .unwrap_or_else(|| config.name().to_lowercase());
            let config = match args.num_classes {
                Some(num_classes) => config.with_num_classes(num_classes),
                None => config,
            };
            let config = if args.no_init_weights {
                config.with_init_weights(false)
            } else {
                config
            };
            vec![(name, config)]
        }
        None => args
            .models
            .iter()
            .map(|name| match try_lookup_prefab(name) {
                Some(prefab) => Ok((
                    name.clone(),
                    prefab
                        .new_config()
                        .with_num_classes(args.num_classes.unwrap_or(DEFAULT_NUM_CLASSES))
                        .with_init_weights(!args.no_init_weights),
                )),
                None => Err(anyhow!(
                    "unknown model {name:?}; known: {:?}",
                    DARKNET_PREFABS.names()
                )),
            })
            .collect::<anyhow::Result<Vec<_>>>()?,
    };

    for (name, config) in configs.iter() {
        config
            .try_validate()
            .map_err(|err| anyhow!("invalid config {name:?}: {err}"))?;
    }
    Ok(configs)
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("darknet=info,darknet_summary=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.image_size < MIN_IMAGE_SIZE {
        bail!(
            "--image-size must be at least {MIN_IMAGE_SIZE}: {}",
            args.image_size
        );
    }
    if args.batch_size == 0 {
        bail!("--batch-size must be > 0");
    }

    type B = NdArray;
    let device = Default::default();
    B::seed(args.seed);

    let configs = resolve_configs(&args)?;

    if let Some(dir) = &args.save_config {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create {}", dir.display()))?;
        for (name, config) in configs.iter() {
            let path = dir.join(format!("{name}.json"));
            config
                .save(&path)
                .with_context(|| format!("failed to save {}", path.display()))?;
            info!(path = %path.display(), "saved config");
        }
    }

    let input_shape = [args.batch_size, 3, args.image_size, args.image_size];
    let mut summaries = Vec::with_capacity(configs.len());
    for (name, config) in configs {
        info!(name = %name, "building model");
        let display_name = config.name();
        let model = config.init::<B>(&device);
        let summary = ModelSummary::summarize(display_name, &model, input_shape, &device);

        if !args.json {
            println!("Num. of Params of {}: {}", summary.name, summary.num_params);
            println!("Output shape: {:?}", summary.output_shape);
            println!("Feature shape: {:?}", summary.feature_shape);
        }
        summaries.push(summary);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&summaries)?);
    }

    Ok(())
}
