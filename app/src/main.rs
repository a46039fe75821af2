#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod command;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use command::{
    ChatInput, ChatStrategy, CommandStrategy, ConvertInput, ConvertStrategy, InfoStrategy,
    InitStrategy, MentionsInput, MentionsStrategy, PostInput, PostStrategy, ServeInput,
    ServeStrategy, VersionStrategy,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[derive(Parser)]
#[command(name = "templar")]
#[command(about = "Templar knight conversational assistant", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Talk to the knight interactively
    Chat {
        /// Single message to send
        #[arg(short = 'm', long)]
        message: Option<String>,

        /// Model to use
        #[arg(short = 'M', long)]
        model: Option<String>,
    },
    /// Run the Instagram webhook server
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
    /// Convert YAML question/answer pairs into chat JSONL
    Convert {
        /// YAML file of `{input, output}` pairs
        input: PathBuf,

        /// Output file (defaults to the input with a .jsonl extension)
        #[arg(short = 'o', long)]
        output: Option<PathBuf>,
    },
    /// Publish a photo to the configured Instagram account
    Post {
        /// Publicly reachable image URL
        #[arg(long)]
        image_url: String,

        /// Caption for the photo
        #[arg(long, default_value = "")]
        caption: String,
    },
    /// Answer new X mentions once
    Mentions {
        /// Only answer mentions newer than this post id
        #[arg(long)]
        since_id: Option<String>,
    },
    /// Initialize configuration
    Init,
    /// Show configuration
    Info,
    /// Show version
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;

    let cli = Cli::parse();

    match cli.command {
        Commands::Chat { message, model } => {
            ChatStrategy.execute(ChatInput { message, model }).await
        }
        Commands::Serve { port } => ServeStrategy.execute(ServeInput { port }).await,
        Commands::Convert { input, output } => {
            ConvertStrategy
                .execute(ConvertInput { input, output })
                .await
        }
        Commands::Post { image_url, caption } => {
            PostStrategy
                .execute(PostInput { image_url, caption })
                .await
        }
        Commands::Mentions { since_id } => {
            MentionsStrategy.execute(MentionsInput { since_id }).await
        }
        Commands::Init => InitStrategy.execute(()).await,
        Commands::Info => InfoStrategy.execute(()).await,
        Commands::Version => VersionStrategy.execute(()).await,
    }
}
