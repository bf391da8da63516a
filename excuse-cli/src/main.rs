//! excuse-cli — command-line frontend for the excuse-server HTTP API
//!
//! # Subcommands
//! - `generate --scenario <S> --criticality <C> [--proof <KIND>]` — new excuse
//! - `rate <ID> <RATING>`                                         — rate 1–5
//! - `history [-n <limit>] [--json]`                              — recent excuses
//! - `clear`                                                      — wipe history
//! - `status`                                                     — server health

use clap::builder::PossibleValuesParser;
use clap::{Parser, Subcommand};
use serde::{Deserialize, Serialize};

const DEFAULT_SERVER: &str = "http://127.0.0.1:8770";
const DEFAULT_LIMIT: u32 = 5;

/// Tags accepted by POST /excuses, as listed by GET /options.
const SCENARIOS: [&str; 6] = ["School", "Office", "Family", "Friends", "Social Event", "Late"];
const CRITICALITIES: [&str; 3] = ["Low", "Medium", "High"];
const PROOF_KINDS: [&str; 4] = ["medical", "document", "casual", "receipt"];

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Debug, Parser)]
#[command(name = "excuse-cli", version, about = "Generate, rate and browse excuses")]
struct Cli {
    /// Excuse HTTP server URL (overrides EXCUSE_HTTP_URL env var)
    #[arg(long, env = "EXCUSE_HTTP_URL", default_value = DEFAULT_SERVER)]
    server: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Generate a new excuse, optionally with a proof artifact
    Generate {
        /// Situation the excuse is for
        #[arg(long, value_parser = PossibleValuesParser::new(SCENARIOS))]
        scenario: String,

        /// Urgency level
        #[arg(long, value_parser = PossibleValuesParser::new(CRITICALITIES))]
        criticality: String,

        /// Proof artifact to render alongside the excuse
        #[arg(long, value_parser = PossibleValuesParser::new(PROOF_KINDS))]
        proof: Option<String>,
    },

    /// Rate a stored excuse from 1 to 5
    Rate {
        id: i64,
        rating: i64,
    },

    /// Show recent excuses, newest first
    History {
        /// Maximum number of entries to show
        #[arg(short = 'n', long, default_value_t = DEFAULT_LIMIT)]
        limit: u32,

        /// Output the raw history as a JSON array
        #[arg(long)]
        json: bool,
    },

    /// Delete every stored excuse
    Clear,

    /// Show excuse server status
    Status,
}

// ============================================================================
// API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct Excuse {
    pub id: i64,
    pub text: String,
}

#[derive(Debug, Deserialize, Serialize)]
pub struct HistoryEntry {
    pub id: i64,
    pub text: String,
    pub rating: Option<i64>,
    pub formatted_time: String,
}

/// Response from POST /excuses
#[derive(Debug, Deserialize)]
pub struct GenerateResponse {
    pub excuse: Excuse,
    pub proof_url: Option<String>,
    #[serde(default)]
    pub history: Vec<HistoryEntry>,
}

/// Response from GET /excuses
#[derive(Debug, Deserialize)]
pub struct HistoryResponse {
    pub history: Vec<HistoryEntry>,
    pub count: usize,
}

// ============================================================================
// Formatting
// ============================================================================

/// Request body for POST /excuses. Proof is requested only when a kind is given.
pub fn generate_body(scenario: &str, criticality: &str, proof: Option<&str>) -> serde_json::Value {
    serde_json::json!({
        "scenario": scenario,
        "criticality": criticality,
        "with_proof": proof.is_some(),
        "proof_type": proof,
    })
}

/// Five-star bar, or "unrated".
pub fn rating_stars(rating: Option<i64>) -> String {
    match rating {
        Some(r) => {
            let filled = r.clamp(0, 5) as usize;
            format!("{}{}", "★".repeat(filled), "☆".repeat(5 - filled))
        }
        None => "unrated".to_string(),
    }
}

pub fn format_entry(entry: &HistoryEntry) -> String {
    format!(
        "#{} {} [{}]\n    {}",
        entry.id,
        entry.formatted_time,
        rating_stars(entry.rating),
        entry.text
    )
}

/// Absolute link for a root-relative artifact URL.
pub fn proof_link(server: &str, url: &str) -> String {
    if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("{}/{}", server.trim_end_matches('/'), url.trim_start_matches('/'))
    }
}

/// Pull the `error` field out of an error body, falling back to the raw text.
pub fn server_error_message(body: &str) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"].as_str().map(str::to_string))
        .unwrap_or_else(|| body.trim().to_string())
}

// ============================================================================
// HTTP Client Calls
// ============================================================================

fn client(timeout_secs: u64) -> anyhow::Result<reqwest::blocking::Client> {
    Ok(reqwest::blocking::Client::builder()
        .timeout(std::time::Duration::from_secs(timeout_secs))
        .build()?)
}

/// Send a request, turning connection failures and non-2xx replies into errors.
fn send(
    req: reqwest::blocking::RequestBuilder,
    url: &str,
) -> anyhow::Result<reqwest::blocking::Response> {
    let resp = match req.send() {
        Ok(r) => r,
        Err(e) => anyhow::bail!("connection failed to {}: {}", url, e),
    };

    if !resp.status().is_success() {
        let status = resp.status();
        let body = resp.text().unwrap_or_default();
        anyhow::bail!("server returned {}: {}", status, server_error_message(&body));
    }

    Ok(resp)
}

fn do_generate(
    server: &str,
    scenario: &str,
    criticality: &str,
    proof: Option<&str>,
) -> anyhow::Result<()> {
    // Generation waits on the completion service and its retries
    let client = client(120)?;
    let url = format!("{}/excuses", server);

    let resp = send(
        client.post(&url).json(&generate_body(scenario, criticality, proof)),
        &url,
    )?;
    let generated: GenerateResponse = resp.json()?;

    println!("{}", generated.excuse.text);
    println!("(id {})", generated.excuse.id);
    if let Some(proof_url) = &generated.proof_url {
        println!("Proof: {}", proof_link(server, proof_url));
    }

    if !generated.history.is_empty() {
        println!("\nRecent excuses:");
        for entry in &generated.history {
            println!("{}", format_entry(entry));
        }
    }

    Ok(())
}

fn do_rate(server: &str, id: i64, rating: i64) -> anyhow::Result<()> {
    let client = client(10)?;
    let url = format!("{}/excuses/{}/rating", server, id);

    send(client.post(&url).json(&serde_json::json!({ "rating": rating })), &url)?;
    println!("Rated excuse #{} {}", id, rating_stars(Some(rating)));
    Ok(())
}

fn do_history(server: &str, limit: u32, json_output: bool) -> anyhow::Result<()> {
    let client = client(10)?;
    let url = format!("{}/excuses?limit={}", server, limit);

    let history: HistoryResponse = send(client.get(&url), &url)?.json()?;

    if json_output {
        println!("{}", serde_json::to_string_pretty(&history.history)?);
    } else if history.count == 0 {
        eprintln!("No excuses yet.");
    } else {
        for entry in &history.history {
            println!("{}", format_entry(entry));
        }
    }

    Ok(())
}

fn do_clear(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;
    let url = format!("{}/excuses", server);

    let body: serde_json::Value = send(client.delete(&url), &url)?.json()?;
    println!("Cleared {} excuse(s)", body["cleared"].as_u64().unwrap_or(0));
    Ok(())
}

/// Show the server status by calling GET /health.
fn do_status(server: &str) -> anyhow::Result<()> {
    let client = client(10)?;
    let url = format!("{}/health", server);

    match client.get(&url).send() {
        Ok(r) if r.status().is_success() => {
            let body: serde_json::Value = r.json().unwrap_or_default();
            println!("Excuse server: {}", body["status"].as_str().unwrap_or("unknown"));
            println!("Version:       {}", body["version"].as_str().unwrap_or("?"));
            println!("SQLite:        {}", body["sqlite"].as_str().unwrap_or("?"));
        }
        Ok(r) => {
            eprintln!("excuse-cli: server unhealthy (HTTP {})", r.status());
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("excuse-cli: cannot reach {}: {}", url, e);
            std::process::exit(1);
        }
    }

    Ok(())
}

// ============================================================================
// Main
// ============================================================================

fn main() {
    let cli = Cli::parse();
    let server = cli.server.trim_end_matches('/').to_string();

    let result = match cli.command {
        Commands::Generate {
            scenario,
            criticality,
            proof,
        } => do_generate(&server, &scenario, &criticality, proof.as_deref()),
        Commands::Rate { id, rating } => do_rate(&server, id, rating),
        Commands::History { limit, json } => do_history(&server, limit, json),
        Commands::Clear => do_clear(&server),
        Commands::Status => do_status(&server),
    };

    if let Err(e) = result {
        eprintln!("excuse-cli: {}", e);
        std::process::exit(1);
    }
}

// ============================================================================
// Tests
// ============================================================================
