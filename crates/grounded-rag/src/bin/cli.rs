//! One-shot command line front end
//!
//! Run with: cargo run -p grounded-rag --features cli --bin grounded-rag -- ask --file notes.txt --question "..."

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use grounded_rag::{
    config::EmbeddingBackend, Credentials, Document, DocumentSource, RagConfig, RagPipeline,
    SourceKind,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "grounded-rag", version, about = "Answer questions from a single document")]
struct Cli {
    /// TOML configuration file (overrides GROUNDED_RAG_CONFIG)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Ingest a source and answer one question from it
    Ask(AskArgs),
    /// Print the collection name a source would be stored under
    Name(SourceArgs),
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct SourceArgs {
    /// PDF or text file
    #[arg(long)]
    file: Option<PathBuf>,

    /// Web page URL
    #[arg(long)]
    url: Option<String>,
}

#[derive(Args)]
struct AskArgs {
    #[command(flatten)]
    source: SourceArgs,

    /// The question to answer
    #[arg(long, short)]
    question: String,

    /// Collection name (derived from the source when omitted)
    #[arg(long)]
    collection: Option<String>,

    /// Passages to retrieve
    #[arg(long)]
    top_k: Option<usize>,

    /// Use the lexical hashing embedder instead of downloading the ONNX model
    #[arg(long)]
    offline_embeddings: bool,

    /// Also print the retrieved passages
    #[arg(long)]
    show_sources: bool,
}

impl SourceArgs {
    fn load(&self) -> anyhow::Result<DocumentSource> {
        match (&self.file, &self.url) {
            (Some(path), None) => {
                let bytes = std::fs::read(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                let filename = path
                    .file_name()
                    .map(|n| n.to_string_lossy().to_string())
                    .unwrap_or_else(|| path.display().to_string());
                Ok(DocumentSource::File(Document::from_upload(filename, bytes)?))
            }
            (None, Some(url)) => Ok(DocumentSource::Url(url.clone())),
            _ => anyhow::bail!("Pass exactly one of --file or --url"),
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "grounded_rag=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let mut config = match &cli.config {
        Some(path) => RagConfig::from_file(path)?,
        None => RagConfig::load()?,
    };

    match cli.command {
        Command::Name(source) => {
            let source = source.load()?;
            println!("{}", RagPipeline::default_collection(&source));
        }
        Command::Ask(args) => {
            if args.offline_embeddings {
                config.embeddings.backend = EmbeddingBackend::Hashing;
            }
            if let Some(k) = args.top_k {
                config.retrieval.top_k = k;
            }

            let source = args.source.load()?;
            if source.kind() == SourceKind::Pdf {
                tracing::info!("Extracting PDF text, this may take a while");
            }

            let credentials = Arc::new(Credentials::from_env()?);
            let pipeline = RagPipeline::from_config(config, credentials)?;
            let response = pipeline
                .answer_from_source(&source, &args.question, args.collection.as_deref())
                .await?;

            println!("{}", response.answer);
            if args.show_sources {
                println!();
                for (rank, passage) in response.sources.iter().enumerate() {
                    println!("[{}] ({:.3}) {}", rank + 1, passage.score, passage.text);
                }
            }
        }
    }

    Ok(())
}
