mod missions;

use clap::{Parser, Subcommand};
use phoenix_browser::{SessionOptions, StealthSession};
use phoenix_core::config::ConfigLoader;
use phoenix_core::oracle::{GeminiConfig, GeminiOracle};
use phoenix_core::resolver::Resolver;
use phoenix_core::store::SelectorStore;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "phoenix", version, about = "Self-healing browser automation")]
struct Args {
    /// Selector table location (overrides the config file)
    #[arg(long)]
    selectors: Option<PathBuf>,

    /// Launch the browser with a visible window
    #[arg(long)]
    visible: bool,

    #[command(subcommand)]
    mission: Mission,
}

#[derive(Subcommand)]
enum Mission {
    /// Scrape discussion titles from a subreddit
    Reddit {
        #[arg(long, default_value = "SaaS")]
        subreddit: String,

        /// How many titles to print
        #[arg(long, default_value_t = 5)]
        limit: usize,
    },
    /// Turn an idea into a product document via the notebook web app
    Docgen {
        /// One-line product idea to expand
        idea: String,

        /// Document title (defaults to a trimmed form of the idea)
        #[arg(long)]
        title: Option<String>,

        /// JSON file with scraped pain points to fold into the source
        #[arg(long)]
        pain_points_file: Option<PathBuf>,

        /// Output directory for the generated document
        #[arg(long, default_value = "output/plans")]
        output: PathBuf,

        /// Auth cookie file (defaults to ~/.notebooklm-mcp/auth.json)
        #[arg(long)]
        auth: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Log to stderr so mission output on stdout stays clean
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config = ConfigLoader::load_default().await?;
    let store = SelectorStore::new(args.selectors.unwrap_or_else(|| config.selectors_path.clone()));

    let oracle = GeminiOracle::new(GeminiConfig {
        model: config.oracle.model.clone(),
        endpoint: config.oracle.endpoint.clone(),
        timeout: Duration::from_secs(config.oracle.timeout_secs),
        ..GeminiConfig::from_env()
    });

    let resolver = Resolver::new(store, oracle)
        .with_match_timeout(Duration::from_millis(config.match_timeout_ms));

    let session = StealthSession::launch(SessionOptions {
        headless: !args.visible,
    })
    .await?;

    let outcome = match args.mission {
        Mission::Reddit { subreddit, limit } => {
            missions::reddit::run(&session, &resolver, &subreddit, limit).await
        }
        Mission::Docgen {
            idea,
            title,
            pain_points_file,
            output,
            auth,
        } => {
            missions::docgen::run(
                &session,
                &resolver,
                missions::docgen::DocgenRequest {
                    idea,
                    title,
                    pain_points_file,
                    output_dir: output,
                    auth_path: auth,
                },
            )
            .await
        }
    };

    let closed = session.close().await;
    outcome?;
    closed?;
    Ok(())
}
