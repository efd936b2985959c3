use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use pixmatch::models::config::AppConfig;
use pixmatch::models::error::AppError;
use pixmatch::services::comparison::ComparisonService;
use pixmatch::services::ingest::Ingestor;
use pixmatch::services::presenter::{self, format_percent};
use pixmatch::services::preview::PreviewPanel;
use pixmatch::services::store::{ImageStore, SingleSlot};

#[derive(Parser)]
#[command(name = "pixmatch", about = "Image similarity comparison client")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Probe the scoring service's health endpoint
    Health,
    /// Compare one original against one candidate image
    Single {
        original: PathBuf,
        candidate: PathBuf,
    },
    /// Compare one original against many candidates, best match first
    Batch {
        original: PathBuf,
        #[arg(required = true)]
        candidates: Vec<PathBuf>,
    },
    /// Compare two images with AI descriptions and free-form analysis
    Annotate {
        original: PathBuf,
        candidate: PathBuf,
        #[arg(long)]
        question: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env();

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli, Arc::new(config)).await {
        eprintln!("error: {}", e.user_message());
        std::process::exit(1);
    }
    Ok(())
}

async fn run(cli: Cli, config: Arc<AppConfig>) -> Result<(), AppError> {
    let ingestor = Ingestor::new(config.clone());
    let service = ComparisonService::new(config)?;

    match cli.command {
        Command::Health => {
            let health = service.health().await?;
            println!("service status: {}", health.status);
        }
        Command::Single { original, candidate } => {
            let original_slot = SingleSlot::new();
            let candidate_slot = SingleSlot::new();
            ingestor.ingest_single(&original_slot, &original).await?;
            ingestor.ingest_single(&candidate_slot, &candidate).await?;

            let similarity = service.compare_single(&original_slot, &candidate_slot).await?;
            let tier = presenter::SimilarityTier::from_score(similarity);
            println!("similarity: {} ({})", format_percent(similarity), tier.label());
        }
        Command::Batch { original, candidates } => {
            let original_slot = SingleSlot::new();
            ingestor.ingest_single(&original_slot, &original).await?;

            let store = Arc::new(ImageStore::new());
            let panel = PreviewPanel::new();
            ingestor.ingest_batch(&store, &candidates).await;
            panel.sync(&store);
            for row in panel.rows() {
                println!("candidate {}: {}", row.index + 1, row.source_name);
            }

            let results = service.compare_batch(&original_slot, &store).await?;
            println!("--- results, best match first ---");
            for item in presenter::present(results, &store) {
                match &item.outcome {
                    Ok(similarity) => {
                        let tier_label = item.tier.map(|t| t.label()).unwrap_or("");
                        println!(
                            "candidate {} ({}): {} ({})",
                            item.candidate_index + 1,
                            item.source_name,
                            format_percent(*similarity),
                            tier_label,
                        );
                    }
                    Err(message) => println!(
                        "candidate {} ({}): error: {}",
                        item.candidate_index + 1,
                        item.source_name,
                        message,
                    ),
                }
            }
        }
        Command::Annotate { original, candidate, question } => {
            let original_slot = SingleSlot::new();
            let candidate_slot = SingleSlot::new();
            ingestor.ingest_single(&original_slot, &original).await?;
            ingestor.ingest_single(&candidate_slot, &candidate).await?;

            let annotated = service
                .compare_with_annotation(&original_slot, &candidate_slot, &question)
                .await?;
            println!("question: {}", question.trim());
            println!("original image: {}", annotated.original_description);
            println!("comparison image: {}", annotated.compare_description);
            println!(
                "similarity: {} ({})",
                format_percent(annotated.similarity),
                presenter::SimilarityTier::from_score(annotated.similarity).label(),
            );
            println!("analysis: {}", annotated.analysis);
        }
    }
    Ok(())
}
