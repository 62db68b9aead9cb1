use anyhow::{bail, Context, Result};
use chrono::Utc;
use conversion_prediction::config::{AppConfig, ConfigManager};
use conversion_prediction::data::{CsvDataSource, FeatureSource, NdjsonSink, SourceFile};
use conversion_prediction::ml::features::FeatureFrameBuilder;
use conversion_prediction::ml::labeling::LabeledFeatureSource;
use conversion_prediction::{PredictionPipeline, TrainingPipeline};
use log::info;

const USAGE: &str = "usage: conversion_prediction <train|predict> [config-path]";

fn csv_builder(config: &AppConfig) -> Result<FeatureFrameBuilder> {
    let source = CsvDataSource::new(&config.data.input_dir);
    if !source.has_file(SourceFile::Profiles) {
        bail!("{} not found", source.path(SourceFile::Profiles).display());
    }

    let features: Box<dyn FeatureSource> = if config.data.label_from_events {
        Box::new(LabeledFeatureSource::new(
            Box::new(source.clone()),
            Box::new(source.clone()),
            Box::new(source.clone()),
        ))
    } else {
        Box::new(source.clone())
    };

    let builder = FeatureFrameBuilder::new(features, Box::new(source.clone()), Box::new(source.clone()));
    Ok(if config.features.commerce_features {
        builder.with_transactions(Box::new(source))
    } else {
        builder
    })
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = std::env::args().skip(1).collect();
    let (command, config_path) = match args.as_slice() {
        [command] => (command.as_str(), None),
        [command, path] => (command.as_str(), Some(path.as_str())),
        _ => bail!(USAGE),
    };

    let manager = ConfigManager::new();
    match config_path {
        Some(path) => manager
            .load_from_file(path)
            .with_context(|| format!("Failed to load config from {}", path))?,
        None => manager
            .load_from_env()
            .context("Failed to load config from environment")?,
    }
    let config = manager.get()?;
    let (min_date, max_date) = config.data.date_range(Utc::now().date_naive())?;
    let builder = csv_builder(&config)?;

    match command {
        "train" => {
            let run = TrainingPipeline::new(config, builder)
                .run(min_date, max_date)
                .context("Training failed")?;
            println!("Model date: {}", run.model_date);
            println!("{}", run.report);
        }
        "predict" => {
            let sink = NdjsonSink::new(&config.prediction.output_dir);
            let run = PredictionPipeline::new(config, builder, Box::new(sink))
                .run(min_date, max_date)
                .context("Prediction failed")?;
            info!("Scored with model dated {}", run.model_date);
            println!("Predicted {} rows", run.records.len());
            if let Some(report) = run.report {
                println!("{}", report);
            }
        }
        other => bail!("unknown command '{}'; {}", other, USAGE),
    }

    Ok(())
}
