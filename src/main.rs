use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use voxquery::api::{ApiServer, ApiState};
use voxquery::audio::{AudioBlob, FormatNormalizer, ValidationVerdict};
use voxquery::cache;
use voxquery::search::{Resolution, SearchResolver, SerpApiClient};
use voxquery::{Answer, Config, Pipeline};

/// Voxquery - answer spoken search queries with spoken results
#[derive(Parser)]
#[command(name = "voxquery", version, about)]
struct Cli {
    /// Increase verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API (default)
    Serve {
        /// Address to bind
        #[arg(long)]
        host: Option<String>,
        /// Port to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
    /// Validate an audio file without transcribing it
    Validate {
        /// Audio file to check
        file: PathBuf,
    },
    /// Run a text query through the cache and search provider
    Search {
        /// Query text
        #[arg(required = true, num_args = 1..)]
        query: Vec<String>,
    },
    /// Run an audio file through the whole pipeline
    Process {
        /// Audio file to answer
        file: PathBuf,
        /// Write the spoken response here
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Result cache maintenance
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },
}

#[derive(Subcommand)]
enum CacheAction {
    /// Drop every cached result set
    Clear,
    /// Delete expired entries
    Purge,
    /// Write and read back a probe entry
    Health,
    /// Time write/read round trips
    Bench {
        /// Number of round trips
        #[arg(default_value = "100")]
        iterations: u32,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Set up logging based on verbosity; RUST_LOG wins when set
    let filter = match cli.verbose {
        0 => "warn,voxquery=info",
        1 => "info,voxquery=debug",
        2 => "debug",
        _ => "trace",
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)))
        .init();

    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!("fatal: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    let config = Config::load()?;
    tracing::debug!(?config, "loaded configuration");

    match cli.command.unwrap_or(Command::Serve {
        host: None,
        port: None,
    }) {
        Command::Serve { host, port } => serve(config, host, port).await,
        Command::Validate { file } => validate(&config, &file),
        Command::Search { query } => search(&config, &query.join(" ")).await,
        Command::Process { file, output } => process(&config, &file, output).await,
        Command::Cache { action } => cache_command(&config, action).await,
    }
}

/// Start the HTTP API
async fn serve(config: Config, host: Option<String>, port: Option<u16>) -> anyhow::Result<()> {
    let host = host.unwrap_or_else(|| config.server.host.clone());
    let port = port.unwrap_or(config.server.port);

    let pipeline = Arc::new(Pipeline::from_config(&config)?);
    let state = ApiState::new(pipeline);

    tracing::info!(host = %host, port, "starting voxquery");
    ApiServer::new(state, host, port).run().await?;
    Ok(())
}

/// Report what the validator thinks of a file
fn validate(config: &Config, file: &std::path::Path) -> anyhow::Result<()> {
    let blob = AudioBlob::from_path(file)?;
    let verdict = config.audio.validator().validate(&blob);

    println!("File:    {}", file.display());
    println!("Type:    {}", blob.mime_type());
    println!("Size:    {} bytes", blob.len());
    println!("Verdict: {}", verdict.label());

    match verdict {
        ValidationVerdict::Valid { info } => {
            println!("Audio:   {info}");
        }
        ValidationVerdict::ValidNeedsConversion { info, target } => {
            println!("Audio:   {info}");
            let converted = FormatNormalizer.convert(&blob, target)?;
            println!(
                "Converted to {} Hz mono WAV ({} bytes)",
                target.sample_rate,
                converted.len()
            );
        }
        ValidationVerdict::Warning { reason, .. } => {
            println!("Warning: {reason}");
        }
        ValidationVerdict::Invalid { reason } => {
            anyhow::bail!("{reason}");
        }
    }

    Ok(())
}

/// Resolve a text query, bypassing speech
async fn search(config: &Config, query: &str) -> anyhow::Result<()> {
    let cache = cache::open(&config.cache)?;
    let client = SerpApiClient::from_config(&config.search)?;
    let resolver = SearchResolver::new(cache, Arc::new(client))
        .with_retry(config.retry.clone())
        .with_ttl(config.cache.ttl);

    match resolver.resolve(query).await? {
        Resolution::Found { results, source } => {
            println!("{} result(s) from {source:?}\n", results.len());
            for (i, hit) in results.hits().iter().enumerate() {
                println!("{}. {}", i + 1, hit.title);
                println!("   {}", hit.url);
                println!("   {}\n", hit.snippet);
            }
        }
        Resolution::NotFound => {
            println!("{}", voxquery::pipeline::NO_RESULTS_MESSAGE);
        }
    }

    Ok(())
}

/// Answer an audio file end to end
async fn process(
    config: &Config,
    file: &std::path::Path,
    output: Option<PathBuf>,
) -> anyhow::Result<()> {
    let pipeline = Pipeline::from_config(config)?;
    let outcome = pipeline.process(AudioBlob::from_path(file)?).await?;

    println!("Transcript: {}", outcome.transcript);
    println!("Query:      {} ({:?})", outcome.query, outcome.query_source);

    match outcome.answer {
        Answer::Results {
            results,
            source,
            speech,
            audio,
            ..
        } => {
            println!("Source:     {source:?}");
            println!("\n{}", serde_json::to_string_pretty(&results)?);
            println!("\n{speech}");

            if let Some(path) = output {
                std::fs::write(&path, &audio)?;
                println!("Spoken response written to {}", path.display());
            }
        }
        Answer::NoResults { message } => println!("\n{message}"),
    }

    Ok(())
}

async fn cache_command(config: &Config, action: CacheAction) -> anyhow::Result<()> {
    let cache = cache::open(&config.cache)?;

    match action {
        CacheAction::Clear => {
            cache.clear().await?;
            println!("{} cache cleared", cache.backend());
        }
        CacheAction::Purge => {
            let removed = cache.purge_expired().await?;
            println!("removed {removed} expired entr{}", if removed == 1 { "y" } else { "ies" });
        }
        CacheAction::Health => {
            if cache.health_check().await {
                println!("{} cache: ok", cache.backend());
            } else {
                anyhow::bail!("{} cache health check failed", cache.backend());
            }
        }
        CacheAction::Bench { iterations } => {
            let report = cache::bench(cache.as_ref(), iterations).await?;
            println!("{} cache, {} round trips", cache.backend(), report.iterations);
            println!("  write: {:?} mean", report.mean_write());
            println!("  read:  {:?} mean", report.mean_read());
        }
    }

    Ok(())
}
