//! MediRAG federated retrieval demo CLI
//!
//! Runs the walkthrough scenarios, hosts organization endpoints, and issues
//! federated queries against them.
//!
//! Usage:
//!   cargo run -p demo -- scenarios
//!   cargo run -p demo -- serve --hospital a --addr 127.0.0.1:5001
//!   cargo run -p demo -- query --config demo/config/federation.toml \
//!       --subject '{"sub":"u1","org":"A","role":"physician"}' "Why was Marcus Webb sedated?"
//!   cargo run -p demo -- local --subject '{"org":"A","role":"physician"}' "chest pain"

use std::{
    net::SocketAddr,
    path::{Path, PathBuf},
    sync::Arc,
};

use clap::{Parser, Subcommand, ValueEnum};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

use medirag_contracts::{
    attributes::Subject,
    error::{MediragError, MediragResult},
    search::SearchParameters,
};
use medirag_federation::{
    server, BuildOptions, FederationConfig, FederationDispatcher, FederationReport, OrgConfig,
};
use medirag_ref_healthcare::{
    build_hospital, prompt::render_prompt, scenarios, spawn_hospital, Hospital, KNOWN_PATIENTS,
};

// ── CLI definition ────────────────────────────────────────────────────────────

/// MediRAG: access-controlled retrieval across organizations.
#[derive(Parser)]
#[command(
    name = "demo",
    about = "MediRAG federated retrieval demo",
    long_about = "Hosts hospital retrieval endpoints and runs federated queries against them,\n\
                  showing node gates, per-document policies, and partial-failure tolerance."
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run scenarios A to D in-process.
    Scenarios,
    /// Host one organization's retrieval endpoint.
    Serve {
        /// Organization tree file.
        #[arg(long, conflicts_with = "hospital", required_unless_present = "hospital")]
        config: Option<PathBuf>,
        /// One of the reference hospitals.
        #[arg(long, value_enum)]
        hospital: Option<HospitalArg>,
        #[arg(long, default_value = "127.0.0.1:5001")]
        addr: SocketAddr,
    },
    /// Query a running federation.
    Query {
        /// Federation root file.
        #[arg(long)]
        config: PathBuf,
        #[command(flatten)]
        request: QueryArgs,
    },
    /// Start hospitals A, B and C on ephemeral ports and query them.
    Local {
        #[command(flatten)]
        request: QueryArgs,
    },
}

#[derive(clap::Args)]
struct QueryArgs {
    /// Subject attributes as a JSON object, e.g. '{"org":"A","role":"physician"}'.
    #[arg(long)]
    subject: String,
    /// Skip every access check. Evaluation only.
    #[arg(long)]
    insecure: bool,
    /// Override the number of documents returned.
    #[arg(long)]
    k: Option<usize>,
    query: String,
}

impl QueryArgs {
    fn subject(&self) -> MediragResult<Subject> {
        serde_json::from_str(&self.subject).map_err(|e| MediragError::Config {
            reason: format!("--subject must be a JSON object: {}", e),
        })
    }

    fn params(&self, defaults: &SearchParameters) -> SearchParameters {
        let mut params = defaults.clone();
        if let Some(k) = self.k {
            params.k = k;
        }
        if self.insecure {
            params.secure = false;
        }
        params
    }
}

#[derive(Clone, Copy, ValueEnum)]
enum HospitalArg {
    A,
    B,
    C,
}

impl From<HospitalArg> for Hospital {
    fn from(arg: HospitalArg) -> Self {
        match arg {
            HospitalArg::A => Hospital::A,
            HospitalArg::B => Hospital::B,
            HospitalArg::C => Hospital::C,
        }
    }
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() {
    // Initialize structured logging.  Set RUST_LOG=debug for verbose output.
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .compact()
        .init();

    let cli = Cli::parse();

    print_banner();

    let result = match cli.command {
        Command::Scenarios => scenarios::run_all().await,
        Command::Serve { config, hospital, addr } => run_serve(config, hospital, addr).await,
        Command::Query { config, request } => run_query(&config, &request).await,
        Command::Local { request } => run_local(&request).await,
    };

    if let Err(e) = result {
        eprintln!("Demo error: {}", e);
        std::process::exit(1);
    }
}

// ── Commands ──────────────────────────────────────────────────────────────────

async fn run_serve(config: Option<PathBuf>, hospital: Option<HospitalArg>, addr: SocketAddr) -> MediragResult<()> {
    let tree = match (config, hospital) {
        (Some(path), _) => OrgConfig::from_file(&path)?.build_tree(&BuildOptions::default())?,
        (None, Some(hospital)) => build_hospital(hospital.into(), &BuildOptions::default())?,
        (None, None) => {
            return Err(MediragError::Config {
                reason: "either --config or --hospital is required".to_string(),
            })
        }
    };
    let listener = TcpListener::bind(addr).await.map_err(|e| MediragError::Config {
        reason: format!("failed to bind {}: {}", addr, e),
    })?;
    println!("Serving organization on http://{}", addr);
    server::serve(listener, Arc::new(tree)).await
}

async fn run_query(config: &Path, request: &QueryArgs) -> MediragResult<()> {
    let config = FederationConfig::from_file(config)?;
    let root = FederationDispatcher::from_config(&config)?;
    let report = root
        .retrieve_with_report(&request.query, &request.subject()?, &request.params(&config.search))
        .await?;
    print_report(&request.query, &report);
    Ok(())
}

async fn run_local(request: &QueryArgs) -> MediragResult<()> {
    let mut running = Vec::new();
    for hospital in Hospital::ALL {
        running.push(spawn_hospital(hospital, &BuildOptions::default()).await?);
    }

    let mut config = FederationConfig::new(running.iter().map(|h| h.endpoint()).collect());
    config.known_names = KNOWN_PATIENTS.iter().map(|name| name.to_string()).collect();
    let root = FederationDispatcher::from_config(&config)?;

    let report = root
        .retrieve_with_report(&request.query, &request.subject()?, &request.params(&config.search))
        .await?;
    print_report(&request.query, &report);
    Ok(())
}

// ── Output ────────────────────────────────────────────────────────────────────

fn print_report(query: &str, report: &FederationReport) {
    println!("Query {}: {:?}", report.query_id, query);
    println!();

    println!("Documents ({}):", report.documents.len());
    for (rank, doc) in report.documents.iter().enumerate() {
        let source = doc
            .metadata
            .get("org")
            .and_then(|v| v.as_str())
            .unwrap_or("?");
        println!("  {:>2}. [{:.3}] (org {}) {}", rank + 1, doc.score, source, doc.content.replace('\n', "; "));
    }
    println!();

    println!("Peers:");
    for peer in &report.peers {
        match &peer.error {
            None => println!(
                "  {:<45} OK      {} document(s) in {:?}",
                peer.endpoint, peer.documents, peer.elapsed
            ),
            Some(error) => println!("  {:<45} FAILED  {}", peer.endpoint, error),
        }
    }
    println!("  total {:?}", report.elapsed);
    println!();

    println!("Prompt:");
    println!("{}", render_prompt(query, &report.documents));
    println!();
}

// ── Banner ────────────────────────────────────────────────────────────────────

fn print_banner() {
    println!();
    println!("MediRAG: Federated Access-Controlled Retrieval");
    println!("==============================================");
    println!();
    println!("Per query:");
    println!("  [1] Root extracts patient names and fans out to every organization");
    println!("  [2] Each router and leaf gate decides whether the subject may search it");
    println!("  [3] Leaves query their index, then drop documents the subject may not read");
    println!("  [4] Every level merges by score and truncates to k");
    println!("  [5] Failed organizations contribute nothing; the query still answers");
    println!();
}
