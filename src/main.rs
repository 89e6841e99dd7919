//! `webvouch` CLI: `verify`, `crawl --json`, and `cache` subcommands.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Args, Parser, Subcommand};

use webvouch::cache::HtmlCache;
use webvouch::config::CacheConfig;
use webvouch::{
    Classification, CrawlAndScoreOverrides, CrawlConfig, CrawlResult, ScoreLabel, WebvouchError,
};

#[derive(Parser)]
#[command(
    name = "webvouch",
    version,
    about = "A naive backlink checker for non-cryptographic identity linking."
)]
struct Cli {
    #[arg(short, long, global = true, help = "Enable verbose logging output to stderr.")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Crawl a URL and print a summary of the backlink score.
    Verify {
        #[command(flatten)]
        common: CommonArgs,
    },
    /// Crawl a URL and write the full evidence report as JSON.
    Crawl {
        #[command(flatten)]
        common: CommonArgs,
        #[arg(long = "json", value_name = "FILEPATH", help = "Path to write the JSON output file.")]
        json_output: PathBuf,
    },
    /// Manage the on-disk HTML cache.
    Cache {
        #[arg(long = "dir", value_name = "PATH", help = "Cache directory to operate on.")]
        dir: Option<PathBuf>,
        #[arg(long = "os-default", help = "Use the OS-specific default cache directory.")]
        os_default: bool,
        #[command(subcommand)]
        cmd: CacheCommand,
    },
}

#[derive(Args)]
struct CommonArgs {
    #[arg(help = "The origin URL to start crawling from.")]
    url: String,
    #[arg(
        long = "links-file",
        value_name = "FILEPATH",
        help = "A file containing a list of candidate URLs to check, one per line."
    )]
    links_file: Option<PathBuf>,
    #[arg(
        long = "only-well-known-id-sites",
        help = "Only crawl URLs matching the built-in whitelist of identity-hosting sites."
    )]
    only_well_known_id_sites: bool,
    #[arg(
        long = "only-rel-me",
        help = "Only accept links explicitly marked rel=\"me\" as evidence."
    )]
    only_rel_me: bool,
}

#[derive(Subcommand)]
enum CacheCommand {
    /// Wipe the entire cache.
    Clear,
    /// Show item count and size on disk.
    Stats,
    /// Dump the raw cached record for a specific URL.
    Inspect { url: String },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    configure_logging(cli.verbose);
    ExitCode::from(run(cli).await)
}

async fn run(cli: Cli) -> u8 {
    match cli.command {
        Command::Verify { common } => run_verify(common).await,
        Command::Crawl { common, json_output } => run_crawl(common, json_output).await,
        Command::Cache { dir, os_default, cmd } => run_cache(dir, os_default, cmd).await,
    }
}

async fn run_verify(common: CommonArgs) -> u8 {
    println!("Verifying backlinks for: {}...", common.url);

    let seed_urls = match load_seed_urls(common.links_file.as_deref()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let overrides = build_overrides(&common);
    let result = match webvouch::crawl_and_score(&common.url, &config, &seed_urls, &overrides).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    render_score_line(&result);
    render_evidence_section(&result);
    render_link_graph_section(&result);
    render_errors_section(&result.errors);

    if result.evidence.is_empty() && result.errors.is_empty() {
        return 100;
    }
    0
}

async fn run_crawl(common: CommonArgs, json_output: PathBuf) -> u8 {
    let seed_urls = match load_seed_urls(common.links_file.as_deref()) {
        Ok(v) => v,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let config = match load_config() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    let overrides = build_overrides(&common);
    let result = match webvouch::crawl_and_score(&common.url, &config, &seed_urls, &overrides).await {
        Ok(r) => r,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    if let Some(parent) = json_output.parent()
        && !parent.as_os_str().is_empty()
        && std::fs::create_dir_all(parent).is_err()
    {
        eprintln!("error: could not create directory {}", parent.display());
        return 1;
    }

    let json = match serde_json::to_string_pretty(&result) {
        Ok(j) => j,
        Err(e) => {
            eprintln!("error: failed to serialize result: {e}");
            return 1;
        }
    };
    if let Err(e) = std::fs::write(&json_output, json) {
        eprintln!("error: failed to write {}: {e}", json_output.display());
        return 1;
    }

    println!("Full evidence report written to {}", json_output.display());
    0
}

async fn run_cache(dir: Option<PathBuf>, os_default: bool, cmd: CacheCommand) -> u8 {
    let cache_cfg = build_cache_config(dir, os_default);
    let cache = match HtmlCache::open(&cache_cfg).await {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return 1;
        }
    };

    match cmd {
        CacheCommand::Clear => {
            if let Err(e) = cache.clear_all().await {
                eprintln!("error: {e}");
                return 1;
            }
            let directory = cache
                .directory()
                .map(|d| d.display().to_string())
                .unwrap_or_else(|| "(disabled)".to_string());
            println!("Cache cleared at: {directory}");
            0
        }
        CacheCommand::Stats => {
            let stats = match cache.stats().await {
                Ok(s) => s,
                Err(e) => {
                    eprintln!("error: {e}");
                    return 1;
                }
            };
            let out = serde_json::json!({
                "directory": stats.directory.display().to_string(),
                "items": stats.item_count,
                "bytes": stats.bytes_on_disk,
                "human_bytes": human_bytes(stats.bytes_on_disk),
            });
            println!("{}", serde_json::to_string_pretty(&out).unwrap_or_default());
            0
        }
        CacheCommand::Inspect { url } => match cache.inspect(&url).await {
            Ok(Some(entry)) => {
                println!("{}", serde_json::to_string_pretty(&entry).unwrap_or_default());
                0
            }
            Ok(None) => {
                println!("Cache miss");
                2
            }
            Err(e) => {
                eprintln!("error: {e}");
                2
            }
        },
    }
}

fn load_seed_urls(path: Option<&Path>) -> Result<Vec<String>, WebvouchError> {
    let Some(path) = path else {
        return Ok(Vec::new());
    };
    if !path.exists() {
        return Err(WebvouchError::SeedFileNotFound(path.to_path_buf()));
    }
    let content = std::fs::read_to_string(path).map_err(|e| WebvouchError::Other(e.into()))?;
    let urls: Vec<String> = content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect();
    log::info!("loaded {} candidate URLs from {}", urls.len(), path.display());
    Ok(urls)
}

/// Reads `[tool.webvouch]` overrides from a project-local config file if
/// one exists, falling back to built-in defaults otherwise.
fn load_config() -> Result<CrawlConfig, WebvouchError> {
    for candidate in ["webvouch.toml", ".webvouch.toml"] {
        if let Ok(content) = std::fs::read_to_string(candidate) {
            return CrawlConfig::load_from_toml(&content);
        }
    }
    CrawlConfig::load_from_toml("")
}

fn build_overrides(common: &CommonArgs) -> CrawlAndScoreOverrides {
    CrawlAndScoreOverrides {
        only_whitelist: Some(common.only_well_known_id_sites),
        only_rel_me: Some(common.only_rel_me),
        ..Default::default()
    }
}

fn build_cache_config(dir: Option<PathBuf>, os_default: bool) -> CacheConfig {
    let mut cfg = CacheConfig::default();
    if os_default {
        cfg.directory = None;
    }
    if let Some(d) = dir {
        cfg.directory = Some(d);
    }
    cfg
}

fn configure_logging(verbose: bool) {
    let level = if verbose {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(level)
        .format_timestamp(None)
        .init();
}

fn label_str(label: ScoreLabel) -> &'static str {
    match label {
        ScoreLabel::High => "high",
        ScoreLabel::Medium => "medium",
        ScoreLabel::Low => "low",
    }
}

fn render_score_line(result: &CrawlResult) {
    println!("\nScore: {} ({})", result.score, label_str(result.label));
}

fn render_evidence_section(result: &CrawlResult) {
    if result.evidence.is_empty() {
        return;
    }
    println!("\n--- Evidence Found ---");
    for ev in &result.evidence {
        let cls = format!("{:?}", ev.classification).to_uppercase();
        println!("- [{cls:<8}] on: {}", ev.target.url);
    }
}

fn render_link_graph_section(result: &CrawlResult) {
    let Some(first) = result.evidence.first() else {
        return;
    };
    let origin = first.source.url.clone();

    let mut direct: std::collections::BTreeSet<String> = Default::default();
    let mut edges: std::collections::BTreeMap<String, Vec<String>> = Default::default();
    for ev in &result.evidence {
        match ev.classification {
            Classification::Strong | Classification::Weak => {
                direct.insert(ev.target.url.clone());
            }
            Classification::Indirect => {
                if let Some(pivot) = extract_pivot_from_notes(&ev.notes) {
                    edges.entry(pivot).or_default().push(ev.target.url.clone());
                }
            }
        }
    }

    println!("\n--- Link Graph ---");
    println!("{origin}");
    for b in &direct {
        println!("├─ {b}  [direct]");
        if let Some(children) = edges.get(b) {
            let mut sorted = children.clone();
            sorted.sort();
            for c in sorted {
                println!("│  └─ {c}  [indirect via {b}]");
            }
        }
    }
}

fn extract_pivot_from_notes(notes: &str) -> Option<String> {
    let after = notes.split("pivot=").nth(1)?;
    let pivot = after.split(" chain=").next()?;
    Some(pivot.trim().to_string())
}

fn render_errors_section(errors: &[String]) {
    if errors.is_empty() {
        return;
    }
    println!("\n--- Errors Encountered ---");
    for e in errors {
        println!("- {e}");
    }
}

fn human_bytes(n: i64) -> String {
    const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];
    let mut value = n as f64;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    let formatted = format!("{value:.2}");
    let trimmed = formatted.trim_end_matches('0').trim_end_matches('.');
    format!("{trimmed} {}", UNITS[unit])
}
