use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use refind_matcher::config::Settings;
use refind_matcher::core::{
    build_table, Classifier, FeatureBuilder, LinearModel, Matcher, TypeSimilarityTable,
    WordEmbeddings, FEATURE_SCHEMA_VERSION,
};
use refind_matcher::services::{BackendClient, MatcherService};
use tracing::{error, info};

#[derive(Parser)]
#[command(
    name = "refind-matcher",
    about = "Probabilistic matching service for the reFind lost & found platform"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Consume reported items from the broker and score them (default)
    Serve,
    /// Rebuild the type similarity table from word embeddings
    BuildTypes {
        /// Word2vec-format text file, one embedding per line, no header
        #[arg(long)]
        embeddings: PathBuf,
        /// Output path; defaults to the configured similarity table path
        #[arg(long)]
        output: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    // Configuration first; logging is configured from it
    let settings = Settings::load()
        .unwrap_or_else(|e| panic!("Configuration error: {}", e));

    // Initialize logging; env vars win over the configured values
    let log_level =
        std::env::var("LOG_LEVEL").unwrap_or_else(|_| settings.logging.level.clone());
    let log_format =
        std::env::var("LOG_FORMAT").unwrap_or_else(|_| settings.logging.format.clone());

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::new(log_level))
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }

    info!("Starting reFind matcher...");
    info!("Configuration loaded successfully");

    let cli = Cli::parse();
    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => serve(settings).await,
        Command::BuildTypes { embeddings, output } => {
            build_types(settings, embeddings, output).await
        }
    }
}

async fn serve(settings: Settings) -> std::io::Result<()> {
    // Model artifacts are loaded once, read-only, before consuming starts
    let table =
        TypeSimilarityTable::load(&settings.model.similarity_table_path).unwrap_or_else(|e| {
            error!("Failed to load similarity table: {}", e);
            panic!("Similarity table error: {}", e);
        });

    info!("Type similarity table loaded ({} types)", table.len());

    let classifier = LinearModel::load(&settings.model.classifier_path).unwrap_or_else(|e| {
        error!("Failed to load classifier: {}", e);
        panic!("Classifier error: {}", e);
    });

    info!(
        "Classifier loaded ({} features, builder schema {})",
        classifier.feature_names().len(),
        FEATURE_SCHEMA_VERSION
    );

    let backend = Arc::new(BackendClient::new(
        settings.backend.base_url.clone(),
        settings.backend.timeout_secs,
    ));

    let matcher = Arc::new(Matcher::new(
        FeatureBuilder::new(Arc::new(table), settings.matching.buffer_radius_m),
        Arc::new(classifier),
        settings.matching.probability_threshold,
    ));

    info!(
        "Matcher initialized (threshold {}, buffer radius {} m)",
        settings.matching.probability_threshold, settings.matching.buffer_radius_m
    );

    let service = MatcherService::new(
        backend,
        matcher,
        settings.amqp.url.clone(),
        settings.amqp.queue.clone(),
        settings.amqp.reconnect_delay_secs,
        settings.matching.retry_max_attempts,
    );

    service.run().await;
    Ok(())
}

async fn build_types(
    settings: Settings,
    embeddings_path: PathBuf,
    output: Option<PathBuf>,
) -> std::io::Result<()> {
    let backend = BackendClient::new(
        settings.backend.base_url.clone(),
        settings.backend.timeout_secs,
    );

    let types = backend
        .fetch_types()
        .await
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    info!("Fetched {} item types from taxonomy", types.len());

    let embeddings = WordEmbeddings::load(&embeddings_path)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;
    info!("Loaded {} embedding vectors", embeddings.len());

    let table = build_table(&types, &embeddings);
    let output = output.unwrap_or_else(|| PathBuf::from(&settings.model.similarity_table_path));
    table
        .save(&output)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e.to_string()))?;

    info!(
        "Similarity table with {} types written to {}",
        table.len(),
        output.display()
    );
    Ok(())
}
