use anyhow::Result;
use biasgen::cli::{Cli, Command};
use biasgen::generator::DataGenerator;
use biasgen::model::{Model, ModelKind};
use clap::Parser;
use tracing_subscriber::EnvFilter;

/// Initialize tracing subscriber for debug output
fn init_tracing(debug: bool) {
    if debug {
        tracing_subscriber::fmt()
            .with_env_filter(
                EnvFilter::from_default_env().add_directive(tracing::Level::DEBUG.into()),
            )
            .with_writer(std::io::stderr)
            .init();
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    match cli.command {
        Command::Generate {
            settings,
            output,
            data_mode,
            bias_mode,
            seed,
            runs,
        } => {
            let mut generator = DataGenerator::from_file(&settings, data_mode, bias_mode)?;
            generator.load_settings()?;
            match runs {
                None => {
                    generator.generate_data(seed)?;
                    generator.save_data(&output, None)?;
                    println!("dataset pair written to {}", output.display());
                }
                Some(runs) => {
                    for index in 0..runs {
                        generator.generate_data(seed + index as u64)?;
                        generator.save_data(&output, Some(index))?;
                    }
                    println!("{} dataset pairs written to {}", runs, output.display());
                }
            }
        }
        Command::Evaluate {
            settings,
            data_mode,
            bias_mode,
            model,
            preprocess,
            augment,
            seed,
        } => {
            let mut generator = DataGenerator::from_file(&settings, data_mode, bias_mode)?;
            generator.load_settings()?;
            generator.generate_data(seed)?;
            let (_, original, biased) = generator.get_data()?;

            let mut wrapper = Model::new(model)
                .with_train(original.features.clone(), original.labels.clone())
                .with_test(biased.features.clone());
            if let Some(method) = preprocess {
                wrapper = wrapper.with_preprocessing(method);
            }
            if let Some(kind) = augment {
                wrapper = wrapper.with_augmentation(kind);
            }
            wrapper.fit(None, None)?;

            let predictions = wrapper.predict(None, true)?;
            report(&predictions, &biased.labels, model);
        }
    }
    Ok(())
}

/// Print overall and per-class accuracy against the biased test labels
fn report(predictions: &[u8], truth: &[u8], model: ModelKind) {
    let total = truth.len().max(1);
    let hits = predictions
        .iter()
        .zip(truth.iter())
        .filter(|(a, b)| a == b)
        .count();

    let class_accuracy = |class: u8| {
        let rows: Vec<_> = predictions
            .iter()
            .zip(truth.iter())
            .filter(|(_, &y)| y == class)
            .collect();
        if rows.is_empty() {
            return 0.0;
        }
        rows.iter().filter(|(a, b)| a == b).count() as f64 / rows.len() as f64
    };

    println!("model: {model:?}");
    println!("accuracy: {:.4}", hits as f64 / total as f64);
    println!("signal accuracy: {:.4}", class_accuracy(1));
    println!("background accuracy: {:.4}", class_accuracy(0));
}
