// crates/hypepipe-cli/src/main.rs
// ============================================================================
// Module: HypePipe CLI Entry Point
// Description: Command dispatcher for the gateway server and token minting.
// Purpose: Provide the operational entry points for running HypePipe.
// Dependencies: clap, hypepipe-gateway, hypepipe-store-sqlite, tokio
// ============================================================================

//! ## Overview
//! Two subcommands: `serve` runs the gateway HTTP server over the SQLite
//! stores, and `token` mints a development bearer token signed with the
//! deployment's secret. Token minting is an ops convenience — the gateway
//! itself never issues credentials.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io::Write;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use clap::ValueEnum;
use hypepipe_caps::CapabilityRegistry;
use hypepipe_core::AuditSink;
use hypepipe_core::Clock;
use hypepipe_core::SnapshotReader;
use hypepipe_core::SystemClock;
use hypepipe_core::Tier;
use hypepipe_gateway::AuthConfigError;
use hypepipe_gateway::Gateway;
use hypepipe_gateway::GatewayConfig;
use hypepipe_gateway::GatewayServerError;
use hypepipe_gateway::HypePipeServer;
use hypepipe_gateway::ResultCache;
use hypepipe_gateway::ScopePolicy;
use hypepipe_gateway::SignError;
use hypepipe_gateway::TokenClaims;
use hypepipe_gateway::TokenVerifier;
use hypepipe_gateway::config::DEFAULT_BIND;
use hypepipe_gateway::config::DEFAULT_DB_FILE;
use hypepipe_gateway::resolve_secret;
use hypepipe_gateway::sign_token;
use hypepipe_store_sqlite::SqliteAuditStore;
use hypepipe_store_sqlite::SqliteSnapshotStore;
use thiserror::Error;
use tracing::warn;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "hypepipe", version, about = "HypePipe capability gateway")]
struct Cli {
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the gateway HTTP server.
    Serve(ServeArgs),
    /// Mint a development bearer token signed with the deployment secret.
    Token(TokenArgs),
}

/// Arguments for the `serve` subcommand.
#[derive(Args, Debug)]
struct ServeArgs {
    /// HTTP bind address.
    #[arg(long, default_value = DEFAULT_BIND)]
    bind: String,
    /// Database file holding the audit and snapshot tables.
    #[arg(long, value_name = "PATH", default_value = DEFAULT_DB_FILE)]
    db: PathBuf,
    /// Deployment root anchoring the secret-file fallback.
    #[arg(long, value_name = "PATH", default_value = ".")]
    root: PathBuf,
}

/// Arguments for the `token` subcommand.
#[derive(Args, Debug)]
struct TokenArgs {
    /// Agent identity bound to the token.
    #[arg(long)]
    agent_id: String,
    /// Scope to grant; repeatable.
    #[arg(long = "scope", value_name = "SCOPE")]
    scopes: Vec<String>,
    /// Caller tier.
    #[arg(long, value_enum, default_value_t = TierArg::Readonly)]
    tier: TierArg,
    /// Token lifetime in seconds.
    #[arg(long, default_value_t = 3_600)]
    ttl_secs: i64,
    /// Opaque policy version tag.
    #[arg(long)]
    policy_version: Option<String>,
    /// Deployment root anchoring the secret-file fallback.
    #[arg(long, value_name = "PATH", default_value = ".")]
    root: PathBuf,
}

/// Tier flag values for minted tokens.
#[derive(ValueEnum, Debug, Clone, Copy)]
enum TierArg {
    /// Read-only market intelligence consumer.
    Readonly,
    /// Paper-trading agent.
    Paper,
    /// Orchestrator-grade agent.
    Orchestrator,
}

impl From<TierArg> for Tier {
    fn from(value: TierArg) -> Self {
        match value {
            TierArg::Readonly => Self::Readonly,
            TierArg::Paper => Self::Paper,
            TierArg::Orchestrator => Self::Orchestrator,
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI errors surfaced to the operator.
#[derive(Debug, Error)]
enum CliError {
    /// Auth configuration failure (missing signing secret).
    #[error("{0}")]
    AuthConfig(#[from] AuthConfigError),
    /// Token signing failure.
    #[error("{0}")]
    Sign(#[from] SignError),
    /// Gateway server failure.
    #[error("{0}")]
    Server(#[from] GatewayServerError),
    /// Output stream failure.
    #[error("output error: {0}")]
    Output(#[from] std::io::Error),
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

#[tokio::main(flavor = "multi_thread")]
async fn main() -> ExitCode {
    init_tracing();
    match run().await {
        Ok(code) => code,
        Err(error) => emit_error(&error.to_string()),
    }
}

/// Executes the CLI command dispatcher.
async fn run() -> Result<ExitCode, CliError> {
    let cli = Cli::parse();
    match cli.command {
        Commands::Serve(args) => command_serve(args).await,
        Commands::Token(args) => command_token(&args),
    }
}

/// Installs the stderr tracing subscriber.
fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Runs the gateway HTTP server.
async fn command_serve(args: ServeArgs) -> Result<ExitCode, CliError> {
    let clock: Arc<dyn Clock> = Arc::new(SystemClock::new());
    // A missing signing secret refuses startup outright; no caller should
    // ever see a misleading per-request deny for a server-side fault.
    let verifier = TokenVerifier::from_env(&args.root, Arc::clone(&clock))?;

    let snapshots = Arc::new(SqliteSnapshotStore::new(&args.db));
    let audit = Arc::new(SqliteAuditStore::new(&args.db));
    if let Err(error) = audit.ensure_schema() {
        // Appends keep retrying the schema check; startup proceeds.
        warn!(%error, "audit schema warm-up failed");
    }

    let registry = CapabilityRegistry::builtin(
        snapshots as Arc<dyn SnapshotReader>,
        Arc::clone(&clock),
    );
    let mut config = GatewayConfig::from_env();
    config.bind = args.bind;
    config.db_path = args.db;
    config.deployment_root = args.root;
    let cache = ResultCache::with_kill_switch(Arc::clone(&clock), config.cache_disabled);
    if config.cache_disabled {
        warn!("result cache disabled by kill switch");
    }

    let gateway = Gateway::new(
        verifier,
        ScopePolicy::builtin(),
        registry,
        cache,
        audit as Arc<dyn AuditSink>,
        clock,
    );
    write_stderr_line(&format!("hypepipe: serving on {}", config.bind))?;
    HypePipeServer::new(config, gateway).serve().await?;
    Ok(ExitCode::SUCCESS)
}

/// Mints a development bearer token.
fn command_token(args: &TokenArgs) -> Result<ExitCode, CliError> {
    let secret = resolve_secret(&args.root)?;
    let clock = SystemClock::new();
    let claims = TokenClaims {
        agent_id: args.agent_id.clone(),
        scopes: args.scopes.clone(),
        tier: args.tier.into(),
        exp: clock.unix_seconds().saturating_add(args.ttl_secs),
        policy_version: args.policy_version.clone(),
    };
    let token = sign_token(secret.as_bytes(), &claims)?;
    write_stdout_line(&token)?;
    Ok(ExitCode::SUCCESS)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes one line to stdout.
fn write_stdout_line(message: &str) -> std::io::Result<()> {
    let mut stdout = std::io::stdout();
    writeln!(&mut stdout, "{message}")
}

/// Writes one line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Reports a fatal error and returns the failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only assertions use unwrap for clarity."
    )]

    use clap::CommandFactory;
    use hypepipe_core::Tier;

    use super::Cli;
    use super::TierArg;

    #[test]
    fn cli_definition_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn tier_flag_maps_onto_the_closed_tier_set() {
        assert_eq!(Tier::from(TierArg::Readonly), Tier::Readonly);
        assert_eq!(Tier::from(TierArg::Paper), Tier::Paper);
        assert_eq!(Tier::from(TierArg::Orchestrator), Tier::Orchestrator);
    }
}
