// Demo cache node
//
// Runs one peercache node of a small cluster over a hardcoded score table,
// optionally exposing a public /api front end for clients that should not
// talk to the peer protocol directly.

use anyhow::{Context, bail};
use axum::Router;
use axum::extract::{Query, State};
use axum::http::{StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use clap::Parser;
use peercache::{Group, HttpPool, new_group};
use serde::Deserialize;
use std::collections::{BTreeMap, HashMap};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "peercache-server", about = "Run one node of a peercache demo cluster")]
struct Args {
    /// Port this node serves peer traffic on (must appear in the cluster config)
    #[arg(long, default_value_t = 8001)]
    port: u16,

    /// Also start the public API front end
    #[arg(long)]
    api: bool,

    /// JSON cluster config; defaults to a three-node localhost topology
    #[arg(long)]
    config: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
struct ClusterConfig {
    /// Address the public API listens on
    api_addr: String,
    /// Peer address per port, e.g. {"8001": "http://localhost:8001"}
    nodes: BTreeMap<u16, String>,
}

impl Default for ClusterConfig {
    fn default() -> Self {
        ClusterConfig {
            api_addr: "http://localhost:9999".to_string(),
            nodes: BTreeMap::from([
                (8001, "http://localhost:8001".to_string()),
                (8002, "http://localhost:8002".to_string()),
                (8003, "http://localhost:8003".to_string()),
            ]),
        }
    }
}

fn create_group() -> Arc<Group> {
    let db: HashMap<&str, &str> = HashMap::from([("Tom", "630"), ("Jack", "589"), ("Sam", "567")]);
    new_group("scores", 2 << 10, move |key: &str| {
        info!(key, "slow db lookup");
        db.get(key)
            .map(|v| v.as_bytes().to_vec())
            .ok_or_else(|| anyhow::anyhow!("{key} does not exist"))
    })
}

async fn api_entry(
    State(group): State<Arc<Group>>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let key = params.get("key").cloned().unwrap_or_default();
    let outcome = tokio::task::spawn_blocking(move || group.get(&key)).await;
    match outcome {
        Ok(Ok(view)) => (
            [(header::CONTENT_TYPE, "application/octet-stream")],
            view.to_vec(),
        )
            .into_response(),
        Ok(Err(err)) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
        Err(err) => (
            StatusCode::INTERNAL_SERVER_ERROR,
            format!("cache task failed: {err}"),
        )
            .into_response(),
    }
}

async fn serve_api(addr: String, group: Arc<Group>) -> anyhow::Result<()> {
    let app = Router::new().route("/api", get(api_entry)).with_state(group);
    let listener = TcpListener::bind(bind_addr(&addr)).await?;
    info!(%addr, "api server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

// Peer identifiers carry the scheme; sockets do not.
fn bind_addr(addr: &str) -> &str {
    addr.trim_start_matches("http://")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let args = Args::parse();
    let config = match &args.config {
        Some(path) => {
            let raw = std::fs::read_to_string(path)
                .with_context(|| format!("reading cluster config {}", path.display()))?;
            serde_json::from_str(&raw)
                .with_context(|| format!("parsing cluster config {}", path.display()))?
        }
        None => ClusterConfig::default(),
    };

    let Some(self_addr) = config.nodes.get(&args.port).cloned() else {
        bail!("port {} is not part of the cluster config", args.port);
    };

    let group = create_group();
    let pool = Arc::new(HttpPool::new(&self_addr));
    pool.set_peers(config.nodes.values());
    group.register_peers(pool.clone());

    if args.api {
        let api_addr = config.api_addr.clone();
        let api_group = Arc::clone(&group);
        tokio::spawn(async move {
            if let Err(err) = serve_api(api_addr, api_group).await {
                error!(%err, "api server failed");
            }
        });
    }

    let listener = TcpListener::bind(bind_addr(&self_addr))
        .await
        .with_context(|| format!("binding {self_addr}"))?;
    pool.serve(listener).await?;
    Ok(())
}
