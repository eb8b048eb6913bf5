use anyhow::Context;
use clap::{Parser, Subcommand};
use email_triage::{
    classification::ClassifierFacade,
    config::{ClassifierStrategy, Config},
    ml::{ModelTrainer, ModelType, StatisticalClassifier},
    telemetry,
};
use serde_json::json;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "email-triage")]
#[command(about = "Support email classifier", long_about = None, version)]
struct Cli {
    /// Configuration file layered over the built-in defaults
    #[arg(short, long, global = true, env = "EMAIL_TRIAGE_CONFIG")]
    config: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Train a model and write the artifact
    Train {
        /// Labeled dataset (JSON array or JSON lines)
        #[arg(short, long)]
        dataset: Option<PathBuf>,

        /// Artifact output path
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// linear_svm or logistic_regression
        #[arg(short, long)]
        model_type: Option<ModelType>,
    },

    /// Classify one email
    Classify {
        #[arg(short, long)]
        subject: String,

        #[arg(short, long)]
        body: String,

        /// keyword or statistical
        #[arg(long)]
        strategy: Option<ClassifierStrategy>,

        /// Include the model confidence (statistical strategy only)
        #[arg(long)]
        confidence: bool,
    },

    /// Print the metadata of a trained artifact
    Inspect {
        #[arg(short, long)]
        model: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    }
    .context("Failed to load configuration")?;

    telemetry::init(&config.observability);
    tracing::debug!("email-triage v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Train {
            dataset,
            output,
            model_type,
        } => train(config, dataset, output, model_type).await,
        Commands::Classify {
            subject,
            body,
            strategy,
            confidence,
        } => classify(config, &subject, &body, strategy, confidence),
        Commands::Inspect { model } => inspect(&config, model),
    }
}

async fn train(
    mut config: Config,
    dataset: Option<PathBuf>,
    output: Option<PathBuf>,
    model_type: Option<ModelType>,
) -> anyhow::Result<()> {
    if let Some(dataset) = dataset {
        config.training.dataset_path = Some(dataset);
    }
    if let Some(model_type) = model_type {
        config.training.model_type = model_type;
    }
    let output = output.unwrap_or_else(|| config.classifier.model_path.clone());

    let trainer = ModelTrainer::from_config(&config);
    let outcome = tokio::task::spawn_blocking(move || trainer.train_default())
        .await
        .context("Training task panicked")?
        .context("Training failed")?;

    ModelTrainer::save(&outcome.artifact, &output)
        .with_context(|| format!("Failed to write artifact to {}", output.display()))?;

    let report = json!({
        "model_id": outcome.artifact.metadata.model_id,
        "model_type": outcome.artifact.metadata.model_type,
        "artifact": output.display().to_string(),
        "report": outcome.report,
    });
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn classify(
    mut config: Config,
    subject: &str,
    body: &str,
    strategy: Option<ClassifierStrategy>,
    confidence: bool,
) -> anyhow::Result<()> {
    if let Some(strategy) = strategy {
        config.classifier.strategy = strategy;
    }

    let facade = ClassifierFacade::from_config(&config).context("Failed to build classifier")?;
    let category = facade.classify(subject, body)?;

    let mut result = json!({
        "category": category,
        "strategy": facade.strategy(),
    });

    match &facade {
        ClassifierFacade::Keyword(keyword) => {
            result["scores"] = serde_json::to_value(keyword.scores(subject, body))?;
        }
        ClassifierFacade::Statistical(_) if confidence => {
            result["prediction"] = serde_json::to_value(facade.confidence(subject, body)?)?;
        }
        ClassifierFacade::Statistical(_) => {}
    }

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

fn inspect(config: &Config, model: Option<PathBuf>) -> anyhow::Result<()> {
    let path = model.unwrap_or_else(|| config.classifier.model_path.clone());
    let classifier = StatisticalClassifier::load(&path)
        .with_context(|| format!("Failed to load model from {}", path.display()))?;

    if let Some(metadata) = classifier.metadata() {
        println!("{}", serde_json::to_string_pretty(metadata)?);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use email_triage::classification::KeywordClassifier;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_classify() {
        let cli = Cli::parse_from([
            "email-triage",
            "classify",
            "--subject",
            "Invoice",
            "--body",
            "wrong amount",
            "--strategy",
            "keyword",
        ]);
        match cli.command {
            Commands::Classify { strategy, confidence, .. } => {
                assert_eq!(strategy, Some(ClassifierStrategy::Keyword));
                assert!(!confidence);
            }
            _ => panic!("expected classify"),
        }
    }

    #[test]
    fn test_keyword_scores_serialize() {
        let scores = KeywordClassifier::default().scores("Invoice", "");
        let value = serde_json::to_value(scores).unwrap();
        assert_eq!(value["billing"], 1.5);
    }
}
