use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use eigenface_core::{FaceLocalizer, FaceRegion, RawImage, TrainingSample};
use eigenface_io::{load_gallery, ImageFileSource, PixelSource};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

mod config;
mod engine;

use config::Config;
use engine::{spawn_engine, EngineHandle};

#[derive(Parser)]
#[command(name = "eigenface", about = "Eigenface face identification")]
struct Cli {
    /// TOML file with recognizer settings (overrides EIGENFACE_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train on labeled galleries and identify probe photos
    Identify {
        /// Labeled folder, or a folder of labeled folders
        #[arg(short, long = "gallery", required = true)]
        galleries: Vec<PathBuf>,
        /// Use whole images instead of the skin-tone crop
        #[arg(long)]
        no_crop: bool,
        /// Emit results as JSON
        #[arg(long)]
        json: bool,
        /// Photos to identify
        #[arg(required = true)]
        probes: Vec<PathBuf>,
    },
    /// Localize the face in a photo and save the normalized crop
    Crop {
        input: PathBuf,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Train on galleries and print feature space statistics
    Stats {
        #[arg(short, long = "gallery", required = true)]
        galleries: Vec<PathBuf>,
        #[arg(long)]
        no_crop: bool,
    },
    /// Train on galleries and save the mean face
    MeanFace {
        #[arg(short, long = "gallery", required = true)]
        galleries: Vec<PathBuf>,
        #[arg(long)]
        no_crop: bool,
        #[arg(short, long)]
        output: PathBuf,
    },
    /// Dump the first three feature space axes as JSON
    FeatureSpace {
        #[arg(short, long = "gallery", required = true)]
        galleries: Vec<PathBuf>,
        #[arg(long)]
        no_crop: bool,
        /// Photo to place among the gallery points
        #[arg(long)]
        probe: Option<PathBuf>,
    },
}

#[derive(Serialize)]
struct ProbeReport {
    probe: PathBuf,
    identity: String,
    #[serde(flatten)]
    classification: eigenface_core::Classification,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();
    let config = Config::from_env(cli.config)?;
    if let Some(path) = &config.config_file {
        tracing::debug!(path = %path.display(), "using config file");
    }
    let localizer = FaceLocalizer::new(config.recognizer.localizer.clone());

    match cli.command {
        Commands::Identify {
            galleries,
            no_crop,
            json,
            probes,
        } => {
            let engine = train_engine(&config, &localizer, &galleries, !no_crop).await?;
            let mut reports = Vec::with_capacity(probes.len());
            for probe in probes {
                let region = load_region(&localizer, &probe, !no_crop)?;
                let classification = engine
                    .probe(region)
                    .await
                    .with_context(|| format!("failed to classify {}", probe.display()))?;
                if !json {
                    println!("{}: {}", probe.display(), classification.label());
                }
                reports.push(ProbeReport {
                    identity: classification.label().to_string(),
                    probe,
                    classification,
                });
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&reports)?);
            }
        }
        Commands::Crop { input, output } => {
            let region = load_region(&localizer, &input, true)?;
            region
                .to_gray_image()
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved {}x{} face to {}", region.width(), region.height(), output.display());
        }
        Commands::Stats { galleries, no_crop } => {
            let engine = train_engine(&config, &localizer, &galleries, !no_crop).await?;
            let report = engine.describe().await?;
            println!("{}", report.summary);
            println!("Labels: {}", report.labels.join(", "));
            let leading: Vec<String> = report
                .eigen_values
                .iter()
                .take(5)
                .map(|v| format!("{v:.1}"))
                .collect();
            println!(
                "Eigenfaces: {} (leading eigenvalues: {})",
                report.components,
                leading.join(", ")
            );
            println!("Acceptance threshold: {:.2}", report.threshold);
        }
        Commands::MeanFace {
            galleries,
            no_crop,
            output,
        } => {
            let engine = train_engine(&config, &localizer, &galleries, !no_crop).await?;
            engine
                .mean_face()
                .await?
                .save(&output)
                .with_context(|| format!("failed to write {}", output.display()))?;
            println!("Saved mean face to {}", output.display());
        }
        Commands::FeatureSpace {
            galleries,
            no_crop,
            probe,
        } => {
            let engine = train_engine(&config, &localizer, &galleries, !no_crop).await?;
            let probe = probe
                .map(|p| load_region(&localizer, &p, !no_crop))
                .transpose()?;
            let report = engine.feature_space(probe).await?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    Ok(())
}

/// Decode a photo and reduce it to a face region.
fn load_region(localizer: &FaceLocalizer, path: &Path, crop: bool) -> Result<FaceRegion> {
    let image = ImageFileSource
        .decode(path)
        .with_context(|| format!("failed to load {}", path.display()))?;
    Ok(to_region(localizer, &image, crop))
}

fn to_region(localizer: &FaceLocalizer, image: &RawImage, crop: bool) -> FaceRegion {
    if crop {
        localizer.localize(image)
    } else {
        localizer.normalize(image)
    }
}

/// Load every gallery, start the engine and train it.
async fn train_engine(
    config: &Config,
    localizer: &FaceLocalizer,
    galleries: &[PathBuf],
    crop: bool,
) -> Result<EngineHandle> {
    let mut samples = Vec::new();
    for dir in galleries {
        let images = load_gallery(&ImageFileSource, dir)
            .with_context(|| format!("failed to load gallery {}", dir.display()))?;
        for labeled in images {
            let region = to_region(localizer, &labeled.image, crop);
            samples.push(TrainingSample::new(labeled.label, region));
        }
    }
    tracing::info!(samples = samples.len(), crop, "galleries loaded");

    let engine = spawn_engine(config.recognizer.clone())?;
    let summary = engine.train(samples).await.context("training failed")?;
    tracing::info!(
        samples = summary.samples,
        classes = summary.classes,
        "engine ready"
    );
    Ok(engine)
}
