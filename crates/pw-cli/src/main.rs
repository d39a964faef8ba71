//! Path Warden server binary.
//!
//! Wires the identity graph, detection engine, response engine, audit
//! log, and effector registry together and serves the REST API.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pw_actions::{EffectorRegistry, MockCloud};
use pw_api::{ApiServer, ApiServerConfig, AppState};
use pw_core::{
    DetectionConfig, DetectionEngine, GraphSnapshot, IdentityGraph, NodeKind, ResponseEngine,
    TokenSigner, UserStore, GRAPH_SNAPSHOT_FILE,
};
use pw_ingest::{Ingester, MockIamIngester};
use pw_observability::{init_logging, AuditLog};
use std::net::SocketAddr;
use std::process::ExitCode;
use std::sync::Arc;
use tracing::{error, info, warn};

mod config;

use config::ServerConfig;

#[derive(Parser)]
#[command(name = "pathwarden")]
#[command(version)]
#[command(about = "Cloud identity attack-path detection and autonomous response", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the API server.
    Serve {
        /// Port to listen on (overrides PORT).
        #[arg(short, long)]
        port: Option<u16>,
    },
}

fn main() -> ExitCode {
    init_logging();

    let cli = Cli::parse();
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(err) => {
            error!("failed to start runtime: {err}");
            return ExitCode::FAILURE;
        }
    };

    let result = match cli.command {
        Commands::Serve { port } => runtime.block_on(serve(port)),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("unrecoverable startup failure: {err:#}");
            ExitCode::FAILURE
        }
    }
}

async fn serve(port_override: Option<u16>) -> Result<()> {
    let mut config = ServerConfig::from_env().context("invalid configuration")?;
    if let Some(port) = port_override {
        config.port = port;
    }

    std::fs::create_dir_all(&config.data_dir).with_context(|| {
        format!("cannot create data directory {}", config.data_dir.display())
    })?;

    let audit = Arc::new(AuditLog::open(&config.data_dir));

    // Each persisted component reloads its own file; parse failures are
    // recoverable and recorded in the audit trail.
    let (detection, detection_err) =
        DetectionEngine::open(&config.data_dir, DetectionConfig::default());
    let detection = Arc::new(detection);
    if let Some(err) = detection_err {
        audit
            .append(
                "persistence_load_failed",
                "system",
                Some("alerts.json"),
                "failure",
                Some(&err.to_string()),
            )
            .await;
    }

    let cloud = MockCloud::new();
    let effector = Arc::new(EffectorRegistry::with_builtin_handlers(cloud.clone()));
    let (responses, responses_err) =
        ResponseEngine::open(&config.data_dir, effector, audit.clone());
    let responses = Arc::new(responses);
    if let Some(err) = responses_err {
        audit
            .append(
                "persistence_load_failed",
                "system",
                Some("response_state.json"),
                "failure",
                Some(&err.to_string()),
            )
            .await;
    }

    let (users, users_err) = UserStore::open(&config.data_dir);
    let users = Arc::new(users);
    if let Some(err) = users_err {
        audit
            .append(
                "persistence_load_failed",
                "system",
                Some("users.json"),
                "failure",
                Some(&err.to_string()),
            )
            .await;
    }
    if let Some((username, password)) = &config.bootstrap_admin {
        users
            .ensure_admin(username, password)
            .await
            .context("bootstrap admin rejected")?;
    }

    let tokens = match &config.jwt_secret {
        Some(secret) => TokenSigner::new(secret.as_bytes()),
        None => {
            info!("mock mode without JWT_SECRET: using a random ephemeral secret");
            TokenSigner::ephemeral()
        }
    };

    // Reload the graph snapshot, then let mock mode regenerate the estate.
    let mut graph = IdentityGraph::new();
    let snapshot_path = config.data_dir.join(GRAPH_SNAPSHOT_FILE);
    match pw_core::load_json::<GraphSnapshot>(&snapshot_path) {
        Ok(Some(snapshot)) => {
            if let Err(err) = graph.restore(snapshot) {
                warn!(error = %err, "graph snapshot inconsistent, starting empty");
            }
        }
        Ok(None) => {}
        Err(err) => {
            warn!(error = %err, "graph snapshot unreadable, starting empty");
            audit
                .append(
                    "persistence_load_failed",
                    "system",
                    Some(GRAPH_SNAPSHOT_FILE),
                    "failure",
                    Some(&err.to_string()),
                )
                .await;
        }
    }

    let ingester: Arc<dyn Ingester> = Arc::new(MockIamIngester::new());
    if config.use_mock_data {
        let (nodes, edges) = ingester
            .ingest()
            .await
            .context("mock estate generation failed")?;
        graph
            .replace_all(nodes, edges)
            .context("mock estate is not a valid graph")?;
        info!(
            nodes = graph.node_count(),
            edges = graph.edge_count(),
            "mock IAM estate loaded"
        );
    }
    seed_cloud_from_graph(&cloud, &graph).await;

    audit
        .append("system_started", "system", None, "success", None)
        .await;

    let state = AppState::new(
        graph,
        detection,
        responses,
        audit,
        users,
        tokens,
        ingester,
        Some(config.data_dir.clone()),
    )
    .await;
    state.persist_graph().await;

    let server_config = ApiServerConfig {
        bind_address: SocketAddr::from(([0, 0, 0, 0], config.port)),
        ..Default::default()
    };
    info!(port = config.port, mock = config.use_mock_data, "starting Path Warden");
    ApiServer::new(state, server_config)
        .run()
        .await
        .context("server failed")?;
    Ok(())
}

/// Mirrors the graph's entities into the mock cloud so containment
/// actions against the simulated account find their targets.
async fn seed_cloud_from_graph(cloud: &MockCloud, graph: &IdentityGraph) {
    for node in graph.nodes() {
        match node.kind {
            NodeKind::User => cloud.seed_user(&node.id).await,
            NodeKind::Role => cloud.seed_role(&node.id, &[]).await,
            NodeKind::Policy => {
                let default = node
                    .attributes
                    .get("default_version")
                    .map(String::as_str)
                    .unwrap_or("v1");
                cloud.seed_policy(&node.id, &["v1", default]).await;
            }
            _ => {}
        }
    }
}
