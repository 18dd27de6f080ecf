use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use dotenv::dotenv;
use log::{info, warn};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use qdrant_client::Qdrant;

use fitcoach_rag::brief::GroundingBrief;
use fitcoach_rag::config::{CorpusConfig, IndexBackend};
use fitcoach_rag::database::{self, QdrantConfig, QdrantIndex};
use fitcoach_rag::domain::Domain;
use fitcoach_rag::embeddings::Embedder;
use fitcoach_rag::gemini::{GeminiClient, GeminiConfig};
use fitcoach_rag::index::VectorIndex;
use fitcoach_rag::indexer::{IndexReport, Indexer};
use fitcoach_rag::profile::{Activity, Gender, Goal, UserProfile};
use fitcoach_rag::retriever::{Retriever, DEFAULT_TOP_K};
use fitcoach_rag::targets::calculate_macros;

/// Reference retrieval for the fitness coaching backend
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build the index and text file for one or all domains
    Ingest {
        /// Only this domain; all domains when omitted
        #[arg(long, value_enum)]
        domain: Option<Domain>,
        /// Overrides FITCOACH_INDEX_BACKEND
        #[arg(long, value_enum)]
        backend: Option<IndexBackend>,
    },
    /// Print the passages retrieved for a query
    Retrieve {
        #[arg(long, value_enum)]
        domain: Domain,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        #[arg(long, value_enum)]
        backend: Option<IndexBackend>,
        query: String,
    },
    /// Print macro targets and retrieved evidence for a profile as JSON
    Brief {
        /// JSON user profile
        #[arg(long)]
        profile: PathBuf,
        #[arg(long, default_value_t = DEFAULT_TOP_K)]
        top_k: usize,
        #[arg(long, value_enum)]
        backend: Option<IndexBackend>,
    },
    /// Print daily calorie and macro targets
    Macros {
        #[arg(long)]
        weight: f64,
        #[arg(long)]
        height: f64,
        #[arg(long)]
        age: u32,
        #[arg(long, value_enum)]
        gender: Gender,
        #[arg(long, value_enum)]
        goal: Goal,
        #[arg(long, value_enum)]
        activity: Activity,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment
    dotenv().ok();
    env_logger::init();

    let args = Args::parse();

    match args.command {
        Command::Ingest { domain, backend } => {
            let corpus = CorpusConfig::from_env()?;
            let domains = domain.map(|d| vec![d]).unwrap_or_else(|| Domain::ALL.to_vec());
            let gemini = gemini_client()?;
            ingest(&corpus, backend.unwrap_or(corpus.backend), gemini, &domains).await
        }
        Command::Retrieve {
            domain,
            top_k,
            backend,
            query,
        } => {
            let corpus = CorpusConfig::from_env()?;
            let gemini = gemini_client()?;
            match backend.unwrap_or(corpus.backend) {
                IndexBackend::Flat => {
                    let retriever = Retriever::open_flat(gemini, &corpus.data_dir);
                    print_passages(&retriever, domain, &query, top_k).await
                }
                IndexBackend::Qdrant => {
                    let client = qdrant_client()?;
                    let retriever =
                        Retriever::open_qdrant(gemini, client, &corpus.data_dir).await;
                    print_passages(&retriever, domain, &query, top_k).await
                }
            }
        }
        Command::Brief {
            profile,
            top_k,
            backend,
        } => {
            let corpus = CorpusConfig::from_env()?;
            let profile = UserProfile::from_file(&profile)?;
            let gemini = gemini_client()?;
            let brief = match backend.unwrap_or(corpus.backend) {
                IndexBackend::Flat => {
                    let retriever = Retriever::open_flat(gemini, &corpus.data_dir);
                    GroundingBrief::prepare(&retriever, &profile, top_k).await?
                }
                IndexBackend::Qdrant => {
                    let client = qdrant_client()?;
                    let retriever =
                        Retriever::open_qdrant(gemini, client, &corpus.data_dir).await;
                    GroundingBrief::prepare(&retriever, &profile, top_k).await?
                }
            };
            println!("{}", serde_json::to_string_pretty(&brief)?);
            Ok(())
        }
        Command::Macros {
            weight,
            height,
            age,
            gender,
            goal,
            activity,
        } => {
            let targets = calculate_macros(weight, height, age, gender, goal, activity);
            println!("{}", serde_json::to_string_pretty(&targets)?);
            Ok(())
        }
    }
}

fn gemini_client() -> Result<GeminiClient> {
    let config = GeminiConfig::from_env()?;
    if config.api_key.is_none() {
        warn!("GEMINI_API_KEY is not set; embedding calls will fail");
    }
    GeminiClient::new(config)
}

fn qdrant_client() -> Result<Arc<Qdrant>> {
    let config = QdrantConfig::from_env().context("Missing QDRANT_URL")?;
    database::connect(config)
}

async fn ingest(
    corpus: &CorpusConfig,
    backend: IndexBackend,
    gemini: GeminiClient,
    domains: &[Domain],
) -> Result<()> {
    let dimension = gemini.config().dimension;
    let indexer = Indexer::new(gemini).with_dimension(dimension);
    let qdrant = match backend {
        IndexBackend::Qdrant => Some(qdrant_client()?),
        IndexBackend::Flat => None,
    };

    for &domain in domains {
        let source = domain.source_dir(&corpus.corpus_dir);
        let text_path = domain.text_path(&corpus.data_dir);
        info!("Indexing {} from {}", domain, source.display());

        let report = match &qdrant {
            None => {
                indexer
                    .build_index(&source, &domain.index_path(&corpus.data_dir), &text_path)
                    .await?
            }
            Some(client) => {
                let embedded = indexer.embed_folder(&source).await?;
                if embedded.is_empty() {
                    embedded.report().clone()
                } else {
                    fs::create_dir_all(&corpus.data_dir).with_context(|| {
                        format!("Failed to create {}", corpus.data_dir.display())
                    })?;
                    let mut index = QdrantIndex::create(client.clone(), domain, dimension).await?;
                    embedded.write_into(&mut index, &text_path).await?
                }
            }
        };

        print_report(domain, &report);
    }

    Ok(())
}

fn print_report(domain: Domain, report: &IndexReport) {
    if report.written {
        println!(
            "{}: {} chunks indexed from {} files ({} dropped, {} files skipped)",
            domain,
            report.chunks_embedded,
            report.files_read,
            report.chunks_dropped(),
            report.files_skipped
        );
    } else {
        println!(
            "{}: nothing embedded, outputs left untouched ({} chunks dropped)",
            domain,
            report.chunks_dropped()
        );
    }
}

async fn print_passages<E: Embedder, I: VectorIndex>(
    retriever: &Retriever<E, I>,
    domain: Domain,
    query: &str,
    top_k: usize,
) -> Result<()> {
    if !retriever.is_available(domain) {
        warn!("{} index is unavailable; showing fallback passages", domain);
    }

    let passages = retriever.retrieve(domain, query, top_k).await?;
    for (rank, passage) in passages.iter().enumerate() {
        println!("{}. {}\n", rank + 1, passage);
    }
    Ok(())
}
