//! RAG chatbot CLI - main entry point

use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::PathBuf;
use tracing::warn;
use tracing_subscriber::EnvFilter;

use rag_chatbot::commands::{self, SessionOptions};
use rag_chatbot::{metrics, Settings};

#[derive(Parser)]
#[command(name = "rag_chatbot")]
#[command(about = "Retrieval-augmented chatbot over local documents and web search", long_about = None)]
#[command(version)]
struct Cli {
    /// Address to expose Prometheus metrics (e.g., 0.0.0.0:9898)
    #[arg(long, env = "METRICS_ADDR")]
    metrics_addr: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Clone)]
struct ChatArgs {
    /// Provider and model, e.g. groq:gemma2-9b-it
    #[arg(long)]
    llm: Option<String>,

    /// Retrieval variant: basic | knowledge_graph | hybrid
    #[arg(long, default_value = "basic")]
    rag: String,

    /// Directory with .txt/.md documents to select
    #[arg(long)]
    docs: Option<PathBuf>,

    /// Also attach the documents to each request (enables relevance checks)
    #[arg(long, default_value_t = false)]
    attach: bool,

    /// Enable internet search (needs SERPER_API_KEY)
    #[arg(long, default_value_t = false)]
    search: bool,

    /// Conversation session id
    #[arg(long, default_value = "cli")]
    session: String,

    /// Image file to send with the request (repeatable)
    #[arg(long = "image")]
    images: Vec<PathBuf>,
}

impl From<ChatArgs> for SessionOptions {
    fn from(args: ChatArgs) -> Self {
        SessionOptions {
            llm: args.llm,
            rag: args.rag,
            docs: args.docs,
            attach: args.attach,
            search: args.search,
            session: args.session,
            images: args.images,
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Ask a single question
    Ask {
        /// Question text
        question: String,

        #[command(flatten)]
        args: ChatArgs,
    },

    /// Interactive chat (/history, /clear, /config, /quit)
    Chat {
        #[command(flatten)]
        args: ChatArgs,
    },

    /// List available provider:model pairs
    Llms,

    /// List retrieval variants
    Variants,

    /// List documents found in a directory
    Docs {
        /// Directory with .txt/.md documents
        dir: PathBuf,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env for local development
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::from_default_env().add_directive("rag_chatbot=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    if let Some(addr) = cli.metrics_addr.as_deref() {
        match addr.parse::<SocketAddr>() {
            Ok(socket) => metrics::spawn_metrics_server(socket),
            Err(err) => warn!(%addr, "Invalid metrics address: {}", err),
        }
    }

    execute_command(cli.command).await
}

async fn execute_command(command: Commands) -> anyhow::Result<()> {
    match command {
        Commands::Ask { question, args } => {
            commands::ask_run(args.into(), &question).await?;
        }
        Commands::Chat { args } => {
            commands::chat_run(args.into()).await?;
        }
        Commands::Llms => commands::list::llms(&Settings::new()),
        Commands::Variants => commands::list::variants(&Settings::new()),
        Commands::Docs { dir } => commands::list::docs(&Settings::new(), &dir)?,
    }
    Ok(())
}
