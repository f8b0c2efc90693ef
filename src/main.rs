use std::path::PathBuf;

use clap::Parser;
use rootcause::prelude::*;
use tracing_subscriber::EnvFilter;

use levelport::data::{BlobStore, LevelStore};
use levelport::level::Level;
use levelport::level_types::Generation;
use levelport::pipeline::{Operation, Pipeline, PipelineConfig};

/// Convert and merge levels between engine generations
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Source level file (or a directory containing level.bin)
    source: PathBuf,

    /// Directory the resulting level is written into
    output_dir: PathBuf,

    /// Generation of the level built by `convert` when no --into is given
    #[clap(short, long)]
    target: Option<Generation>,

    /// Existing level to merge into instead of starting from an empty one
    #[clap(short, long)]
    into: Option<PathBuf>,

    /// convert, import-mobys, import-ties, import-shrubs, swap-skybox, swap-vendor or fix-culling
    #[clap(short, long, default_value = "convert")]
    op: Operation,

    /// Vendor model id used by swap-vendor
    #[clap(long)]
    vendor: Option<i32>,

    /// Model id stamped on the swapped skybox
    #[clap(long)]
    skybox: Option<i32>,

    /// JSON pipeline configuration
    #[clap(short, long)]
    config: Option<PathBuf>,

    /// Print the summary as JSON
    #[clap(long)]
    json: bool,
}

fn run(args: Args) -> Result<(), Report> {
    let mut config = match &args.config {
        Some(path) => PipelineConfig::from_json_file(path)
            .context_with(|| format!("Failed to read config: {}", path.display()))?,
        None => PipelineConfig::default(),
    };
    if let Some(target) = args.target {
        config.target = target;
    }
    if let Some(vendor) = args.vendor {
        config.merge.special_models.vendor = Some(vendor);
    }
    if let Some(skybox) = args.skybox {
        config.merge.special_models.skybox = Some(skybox);
    }

    let pipeline = Pipeline::new(config, BlobStore::new());
    let source = pipeline
        .store()
        .load(&args.source)
        .context_with(|| format!("Failed to load source level: {}", args.source.display()))?;

    let (mut target, source) = match (args.op, &args.into) {
        (Operation::FixCulling, _) => (source, None),
        (_, Some(into)) => {
            let target = pipeline
                .store()
                .load(into)
                .context_with(|| format!("Failed to load target level: {}", into.display()))?;
            (target, Some(source))
        }
        (_, None) => (Level::new(pipeline.config().target), Some(source)),
    };

    let summary = pipeline
        .run(&mut target, source.as_ref(), args.op, &args.output_dir)
        .context_with(|| format!("{} failed", args.op))?;

    if args.json {
        let text = serde_json::to_string_pretty(&summary).context("Failed to serialize summary")?;
        println!("{text}");
    } else {
        println!("{summary}");
    }
    Ok(())
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = run(Args::parse()) {
        eprintln!("Error: {err}");
        std::process::exit(1);
    }
}
