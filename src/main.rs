//! # nvdb-mapper CLI
//!
//! Command-line interface for the nvdb-mapper library.
//! Routes between coordinates, maps the route onto the trace-level road
//! network and writes the collected road data as JSON.

use std::io::Write;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use log::{error, info, warn};
use nvdb_mapper::{
    Credentials, JobReport, MappingJob, MappingOptions, NvdbClient, RouteClient, RouteRequest,
    ServiceConfig, Severity, Stop,
};

mod cli;

/// Command-line interface for nvdb-mapper
#[derive(Parser)]
#[command(name = "nvdb-mapper")]
#[command(about = "Maps routes onto the NVDB trace-level road network")]
#[command(long_about = "Routes between coordinates (UTM33) and fetches road data along the route:
  nvdb-mapper --from 269756,7038421 --to 270728,7041733
  nvdb-mapper --from 269756,7038421 --via 270100,7040000 --to 270728,7041733 -
  nvdb-mapper --from 269756,7038421 --to 270728,7041733 --object-type 581 tunnels.json

Credentials:
  The routing service endpoint and login are read from a JSON file with one
  section per server, selected with --server (default: ruteplan).")]
#[command(version = env!("NVDB_MAPPER_VERSION"))]
struct Cli {
    /// Start of the route as x,y
    #[arg(long, allow_hyphen_values = true)]
    from: Stop,

    /// End of the route as x,y
    #[arg(long, allow_hyphen_values = true)]
    to: Stop,

    /// Intermediate stop as x,y (repeatable)
    #[arg(long, allow_hyphen_values = true)]
    via: Vec<Stop>,

    /// Output file path, or "-" for stdout
    #[arg(default_value = "nvdb-mapping.json")]
    output: String,

    /// Credentials file for the routing service
    #[arg(long, default_value = "credentials.json")]
    credentials: String,

    /// Section of the credentials file to use
    #[arg(long, default_value = "ruteplan")]
    server: String,

    /// Base URL of the NVDB read API
    #[arg(long)]
    nvdb_url: Option<String>,

    /// NVDB object type to collect along the route
    #[arg(long, default_value_t = nvdb_mapper::core::options::DEFAULT_OBJECT_TYPE)]
    object_type: u32,

    /// Number of link references per NVDB query
    #[arg(long, default_value_t = nvdb_mapper::core::options::DEFAULT_CHUNK_SIZE)]
    chunk_size: usize,

    /// Ask the routing service for alternative routes
    #[arg(long)]
    alternatives: bool,

    /// Fail an interval instead of warning on ambiguous segment boundaries
    #[arg(long)]
    strict: bool,

    /// Timeout per request, in seconds
    #[arg(long, default_value_t = 30)]
    timeout: u64,

    /// Enable dry-run mode (show what would be requested without any network access)
    #[arg(long)]
    dry_run: bool,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,
}

/// Output destination types
#[derive(Debug, PartialEq)]
enum OutputDestination {
    File(String),
    Stdout,
}

/// Resolve output destination from CLI arguments
fn resolve_output(output: &str) -> OutputDestination {
    match output {
        "-" => OutputDestination::Stdout,
        "" => OutputDestination::File("nvdb-mapping.json".to_string()),
        path => OutputDestination::File(path.to_string()),
    }
}

impl Cli {
    fn request(&self) -> nvdb_mapper::Result<RouteRequest> {
        let mut stops = Vec::with_capacity(self.via.len() + 2);
        stops.push(self.from);
        stops.extend(self.via.iter().copied());
        stops.push(self.to);
        Ok(RouteRequest::new(stops)?.with_alternatives(self.alternatives))
    }

    fn service_config(&self) -> ServiceConfig {
        let mut config = ServiceConfig::default();
        if let Some(url) = &self.nvdb_url {
            config.nvdb_base_url = url.clone();
        }
        config
    }

    fn options(&self) -> MappingOptions {
        let mut options = MappingOptions {
            strict: self.strict,
            chunk_size: self.chunk_size,
            object_type: self.object_type,
            ..Default::default()
        };
        options.fetch.timeout = Duration::from_secs(self.timeout.max(1));
        options
    }
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        error!("❌ Error: {e:#}");
        std::process::exit(1);
    }
}

async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging to stderr
    let mut logger = env_logger::Builder::from_default_env();
    logger.target(env_logger::Target::Stderr);
    if cli.verbose {
        logger.filter_level(log::LevelFilter::Debug);
    }
    logger.init();

    if cli.verbose {
        eprintln!("🛣️  nvdb-mapper v{} starting...", env!("NVDB_MAPPER_VERSION"));
    }

    let output = resolve_output(&cli.output);
    let request = cli.request()?;
    let config = cli.service_config();

    if cli.dry_run {
        eprintln!("🔍 [DRY RUN] Would route through: {}", request.stops_param());
        eprintln!(
            "🔍 [DRY RUN] Would collect object type {} from {} in chunks of {}",
            cli.object_type, config.nvdb_base_url, cli.chunk_size
        );
        eprintln!("🔍 [DRY RUN] Would write to {output:?}");
        return Ok(());
    }

    let credentials = Credentials::load(&cli.credentials, &cli.server)
        .with_context(|| format!("can't use credentials section '{}'", cli.server))?;

    let report = map_and_collect(&cli, &request, credentials, config).await?;
    summarize(&report);

    let json = serde_json::to_string_pretty(&report).context("can't serialize report")?;
    match output {
        OutputDestination::File(path) => {
            std::fs::write(&path, json).with_context(|| format!("can't write {path}"))?;
            eprintln!("📁 Saved to: {path}");
        }
        OutputDestination::Stdout => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{json}").context("can't write to stdout")?;
        }
    }

    Ok(())
}

/// Run the mapping job with a progress bar over the thematic lookup
async fn map_and_collect(
    args: &Cli,
    request: &RouteRequest,
    credentials: Credentials,
    config: ServiceConfig,
) -> anyhow::Result<JobReport> {
    let mut options = args.options();
    let http = nvdb_mapper::build_http_client(options.fetch.timeout)?;

    let progress_manager =
        cli::ProgressManager::new(&format!("🌐 Fetching object type {}", args.object_type));
    options.progress = Some(progress_manager.callback());

    let route = RouteClient::new(http.clone(), credentials);
    let nvdb = NvdbClient::new(http, config);
    let job = MappingJob::new(route, nvdb.clone(), nvdb, options);

    let result = job.run(request).await;
    progress_manager.finish();
    result.context("mapping job failed")
}

fn summarize(report: &JobReport) {
    for alternative in &report.alternatives {
        info!(
            "Alternative {}: {} reference(s) mapped to {} interval(s)",
            alternative.index,
            alternative.references.len(),
            alternative.mapped.len()
        );
    }
    let errors = report
        .issues
        .iter()
        .filter(|i| i.severity == Severity::Error)
        .count();
    if errors > 0 {
        warn!(
            "{errors} error(s) and {} warning(s) recorded, see \"issues\" in the output",
            report.issues.len() - errors
        );
    }
    eprintln!(
        "✅ {} record(s) from {} query key(s)",
        report.records.len(),
        report.query_keys.len()
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_output() {
        assert_eq!(resolve_output("-"), OutputDestination::Stdout);
        assert_eq!(
            resolve_output(""),
            OutputDestination::File("nvdb-mapping.json".to_string())
        );
        assert_eq!(
            resolve_output("limits.json"),
            OutputDestination::File("limits.json".to_string())
        );
    }

    #[test]
    fn test_request_keeps_stop_order() {
        let cli = Cli::parse_from([
            "nvdb-mapper",
            "--from",
            "1,2",
            "--via",
            "3,4",
            "--via",
            "5,6",
            "--to",
            "7,8",
        ]);
        let request = cli.request().unwrap();
        assert_eq!(request.stops_param(), "1,2;3,4;5,6;7,8");
        assert!(!request.alternatives);
    }

    #[test]
    fn test_options_from_flags() {
        let cli = Cli::parse_from([
            "nvdb-mapper",
            "--from",
            "1,2",
            "--to",
            "3,4",
            "--strict",
            "--chunk-size",
            "10",
            "--timeout",
            "5",
        ]);
        let options = cli.options();
        assert!(options.strict);
        assert_eq!(options.chunk_size, 10);
        assert_eq!(options.object_type, 105);
        assert_eq!(options.fetch.timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_negative_coordinates() {
        let cli = Cli::parse_from(["nvdb-mapper", "--from", "-10.5,2", "--to", "3,4"]);
        assert_eq!(cli.from, Stop::new(-10.5, 2.0));
    }
}
