use std::path::PathBuf;

use clap::{Parser, Subcommand};
use exerlog_fetch::FetchConfig;

mod commands;

#[derive(Parser)]
#[command(
    name = "exerlog",
    about = "Exerlog: Fetch-style HTTP client and timestamp lookups",
    version,
    propagate_version = true,
)]
struct Cli {
    /// Client configuration file; defaults apply when it does not exist
    #[arg(short, long, global = true, default_value = "exerlog.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Send an HTTP request and print the response
    Fetch {
        url: String,
        /// Request method (default: POST with --data, GET otherwise)
        #[arg(short = 'X', long)]
        method: Option<String>,
        /// Extra header as "Name: value"; may be repeated
        #[arg(short = 'H', long = "header")]
        headers: Vec<String>,
        /// Request body
        #[arg(short, long)]
        data: Option<String>,
        /// Byte cap for the response body (0 disables it)
        #[arg(long)]
        max_size: Option<u64>,
        /// Timeout such as "5s" or "500ms"
        #[arg(long)]
        timeout: Option<String>,
        /// Return redirects instead of following them
        #[arg(long)]
        no_follow: bool,
        /// Print the status line and response headers
        #[arg(short, long)]
        include: bool,
    },
    /// Ask the timestamp service to resolve a date
    Timestamp {
        /// Date string or Unix milliseconds (default: now)
        date: Option<String>,
        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: String,
    },
    /// Print the effective configuration as TOML
    Config,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("exerlog=info".parse()?)
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Fetch {
            url,
            method,
            headers,
            data,
            max_size,
            timeout,
            no_follow,
            include,
        } => {
            let args = commands::fetch::FetchArgs {
                url,
                method,
                headers,
                data,
                max_size,
                timeout,
                no_follow,
                include,
            };
            commands::fetch::run(&config, args).await
        }
        Commands::Timestamp { date, format } => {
            commands::timestamp::run(config, date.as_deref(), &format).await
        }
        Commands::Config => {
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn load_config(path: &std::path::Path) -> anyhow::Result<FetchConfig> {
    if path.exists() {
        tracing::debug!(path = %path.display(), "loading config");
        Ok(FetchConfig::from_file(path)?)
    } else {
        Ok(FetchConfig::default())
    }
}
