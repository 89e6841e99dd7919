//! Crawl a single URL for mutual backlinks and print the evidence.
//!
//! Usage: cargo run --example verify_url -- <URL>

use webvouch::{crawl_and_score, CrawlAndScoreOverrides, CrawlConfig};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args: Vec<String> = std::env::args().collect();
    let url = args
        .get(1)
        .map(String::as_str)
        .unwrap_or("https://github.com/rust-lang/rust");

    let config = CrawlConfig::default();
    let result = crawl_and_score(url, &config, &[], &CrawlAndScoreOverrides::default()).await?;

    println!("score: {} ({:?})", result.score, result.label);
    for ev in &result.evidence {
        println!("- {:?} {} -> {}", ev.classification, ev.source.url, ev.target.url);
    }
    for err in &result.errors {
        println!("error: {err}");
    }

    Ok(())
}
