//! rpclink command line client
//!
//! Connects to the service, runs one call and prints its JSON result.
//! - `rpclink-client get-version`
//! - `rpclink-client rpclink.yaml add-model '{"path":"a.swc"}' --long`
//!
//! With `--long` the call runs as a long task: progress goes to stderr and
//! Ctrl-C asks the server to cancel it.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use serde_json::Value;
use tracing_subscriber::{fmt, EnvFilter};

use rpclink_client::config::{self, ClientConfig, ClientSection};
use rpclink_client::{Progress, RpcClient};
use rpclink_core::error::{Result, RpcLinkError};
use rpclink_core::event::Listener;

#[derive(Debug, Parser)]
#[command(name = "rpclink-client", about = "Run one call against the remote service")]
struct Cli {
    /// Optional YAML config, then the entrypoint and its JSON params.
    #[arg(required = true, num_args = 1..=3)]
    args: Vec<String>,

    /// Run as a cancellable long task and report progress.
    #[arg(long)]
    long: bool,

    /// Override `client.address`.
    #[arg(long)]
    address: Option<String>,
}

struct Invocation {
    config: ClientConfig,
    entrypoint: String,
    params: Option<Value>,
}

fn parse_invocation(cli: &Cli) -> Result<Invocation> {
    let mut args = cli.args.iter().map(String::as_str).collect::<Vec<_>>();

    let mut cfg = match args.first() {
        Some(first) if first.ends_with(".yaml") || first.ends_with(".yml") => {
            let loaded = config::load_from_file(first)?;
            args.remove(0);
            loaded
        }
        _ => ClientConfig {
            version: 1,
            client: ClientSection::default(),
        },
    };

    let (entrypoint, params) = match args.as_slice() {
        [entrypoint] => (entrypoint.to_string(), None),
        [entrypoint, params] => {
            let params: Value = serde_json::from_str(params)
                .map_err(|e| RpcLinkError::Config(format!("params are not valid JSON: {e}")))?;
            (entrypoint.to_string(), Some(params))
        }
        _ => {
            return Err(RpcLinkError::Config(
                "expected [config.yaml] <entrypoint> [json-params]".into(),
            ))
        }
    };

    if let Some(address) = &cli.address {
        cfg.client.address = address.clone();
    }
    cfg.validate()?;

    Ok(Invocation {
        config: cfg,
        entrypoint,
        params,
    })
}

async fn run(cli: Cli) -> Result<Value> {
    let invocation = parse_invocation(&cli)?;
    let client = RpcClient::from_config(&invocation.config)?;

    client.event_connection_status().listen(|open: &bool| {
        tracing::debug!(open = *open, "connection status");
    });
    client.connect().await?;

    if !cli.long {
        return client
            .exec(&invocation.entrypoint, invocation.params, None)
            .await;
    }

    let on_progress: Listener<Progress> = Arc::new(|p: &Progress| {
        eprintln!("[{:>5.1}%] {}", p.value * 100.0, p.label);
    });
    let task = client.exec_long_task(
        &invocation.entrypoint,
        invocation.params,
        Some(on_progress),
        None,
    )?;

    let cancel = task.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("ctrl-c received, cancelling");
            cancel.cancel();
        }
    });

    task.wait().await
}

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    match run(Cli::parse()).await {
        Ok(result) => {
            println!("{}", serde_json::to_string_pretty(&result).unwrap_or_default());
            ExitCode::SUCCESS
        }
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "call failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
