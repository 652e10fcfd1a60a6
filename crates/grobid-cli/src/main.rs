use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use grobid_client::{
    default_coordinates, log_result, process_directory, write_result, Client, Options,
    ResultHandler, Service,
};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

mod config;

const DEFAULT_SERVER: &str = "http://localhost:8070";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

/// Send PDFs, citation lists, or patent XML to a GROBID server and collect
/// the extracted TEI (or JSON) metadata
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// GROBID server URL
    #[arg(short = 'S', long)]
    server: Option<String>,

    /// Service to call, e.g. processFulltextDocument or processCitationList
    #[arg(short = 's', long, default_value = "processFulltextDocument")]
    service: String,

    /// Single file to process
    #[arg(short = 'f', long)]
    file: Option<PathBuf>,

    /// Directory to scan; every eligible file is processed
    #[arg(short = 'd', long)]
    dir: Option<PathBuf>,

    /// Where outputs land (default: next to each input)
    #[arg(short = 'O', long)]
    output_dir: Option<PathBuf>,

    /// Path to a TOML config file (default: .grobid.toml, then the
    /// platform config dir)
    #[arg(short = 'c', long)]
    config: Option<PathBuf>,

    /// Number of concurrent workers (default: 1.5x CPU count)
    #[arg(short = 'n', long)]
    workers: Option<usize>,

    /// Request timeout in seconds
    #[arg(short = 'T', long)]
    timeout: Option<u64>,

    /// Check server health and exit
    #[arg(short = 'P', long)]
    ping: bool,

    /// Log results instead of writing output files
    #[arg(long)]
    debug: bool,

    /// With --file: print the parsed document as JSON instead of raw TEI
    #[arg(long)]
    json: bool,

    /// Reprocess files whose output already exists
    #[arg(long)]
    force: bool,

    /// Create SHA-256 named symlinks next to outputs
    #[arg(long)]
    hash_symlinks: bool,

    /// Ask the server to generate xml:id attributes
    #[arg(long)]
    generate_ids: bool,

    /// Consolidate header metadata against external services
    #[arg(long)]
    consolidate_header: bool,

    /// Consolidate extracted citations against external services
    #[arg(long)]
    consolidate_citations: bool,

    /// Include raw citation strings in the response
    #[arg(long)]
    include_raw_citations: bool,

    /// Include raw affiliation strings in the response
    #[arg(long)]
    include_raw_affiliations: bool,

    /// Request PDF coordinates for the default element set
    #[arg(long)]
    tei_coordinates: bool,

    /// Ask the server to segment sentences
    #[arg(long)]
    segment_sentences: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_tracing(cli.debug);

    // Resolve configuration: CLI flags > config file > defaults
    let file_config = match &cli.config {
        Some(path) => config::load_from_path(path)
            .ok_or_else(|| anyhow::anyhow!("could not read config file: {}", path.display()))?,
        None => config::load_config(),
    };
    let server = cli
        .server
        .clone()
        .or_else(|| std::env::var("GROBID_SERVER").ok())
        .or_else(|| file_config.server.clone())
        .unwrap_or_else(|| DEFAULT_SERVER.to_string());
    let timeout = cli
        .timeout
        .or(file_config.timeout_secs)
        .unwrap_or(DEFAULT_TIMEOUT_SECS);
    let workers = cli
        .workers
        .or(file_config.workers)
        .unwrap_or_else(recommended_workers);

    let service = Service::from_str(&cli.service)?;
    let client = Client::with_timeout(&server, Duration::from_secs(timeout))?;

    if cli.ping {
        return ping(&client).await;
    }

    let coordinates = if cli.tei_coordinates {
        file_config
            .coordinates
            .clone()
            .unwrap_or_else(default_coordinates)
    } else {
        Vec::new()
    };
    let opts = Options {
        generate_ids: cli.generate_ids,
        consolidate_header: cli.consolidate_header,
        consolidate_citations: cli.consolidate_citations,
        include_raw_citations: cli.include_raw_citations,
        include_raw_affiliations: cli.include_raw_affiliations,
        tei_coordinates: coordinates,
        segment_sentences: cli.segment_sentences,
        force: cli.force,
        output_dir: cli.output_dir.clone(),
        create_hash_symlinks: cli.hash_symlinks,
    };

    if let Some(file) = &cli.file {
        return process_single(&client, file, service, &opts, cli.json).await;
    }
    if let Some(dir) = &cli.dir {
        return process_dir(client, dir, service, workers, &opts, cli.debug).await;
    }

    anyhow::bail!("nothing to do: pass --file, --dir, or --ping")
}

async fn ping(client: &Client) -> anyhow::Result<()> {
    match client.ping().await {
        Ok(()) => {
            println!(
                "{}",
                serde_json::json!({"server": client.server(), "status": "ok"})
            );
            Ok(())
        }
        Err(err) => {
            println!(
                "{}",
                serde_json::json!({"server": client.server(), "status": "unreachable"})
            );
            anyhow::bail!("ping failed: {err}")
        }
    }
}

async fn process_single(
    client: &Client,
    file: &std::path::Path,
    service: Service,
    opts: &Options,
    json: bool,
) -> anyhow::Result<()> {
    if !file.exists() {
        anyhow::bail!("file not found: {}", file.display());
    }
    let result = client.process_file(file, service, opts).await?;
    if result.status != 200 {
        anyhow::bail!(
            "{}: server returned {}: {}",
            file.display(),
            result.status,
            result.body_text().trim()
        );
    }
    if json {
        print_json(service, &result.body)?;
    } else {
        std::io::stdout().write_all(&result.body)?;
    }
    Ok(())
}

/// Convert the TEI response to the JSON document model. Full-document
/// services yield a single document object; citation services yield an
/// array of parsed citations.
fn print_json(service: Service, body: &[u8]) -> anyhow::Result<()> {
    match service {
        Service::ProcessFulltextDocument | Service::ProcessHeaderDocument => {
            let doc = grobid_tei::parse_document(body)?;
            println!("{}", serde_json::to_string(&doc)?);
        }
        _ => {
            let citations = grobid_tei::parse_citation_list(std::str::from_utf8(body)?)?;
            println!("{}", serde_json::to_string(&citations)?);
        }
    }
    Ok(())
}

async fn process_dir(
    client: Client,
    dir: &std::path::Path,
    service: Service,
    workers: usize,
    opts: &Options,
    debug: bool,
) -> anyhow::Result<()> {
    if !dir.is_dir() {
        anyhow::bail!("not a directory: {}", dir.display());
    }

    let cancel = CancellationToken::new();
    let cancel_clone = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("interrupt received, letting in-flight files finish");
            cancel_clone.cancel();
        }
    });

    let handler: ResultHandler = if debug {
        Arc::new(log_result)
    } else {
        Arc::new(write_result)
    };
    let report =
        process_directory(Arc::new(client), dir, service, workers, handler, opts, cancel).await?;
    println!(
        "processed {} file(s), skipped {} already done",
        report.processed, report.skipped
    );
    Ok(())
}

fn init_tracing(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn recommended_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get() * 3 / 2)
        .unwrap_or(4)
        .max(1)
}
