use std::fs;
use std::io::ErrorKind;
use std::os::unix::net::UnixStream as StdUnixStream;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::unix::OwnedWriteHalf;
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, RwLock};
use tokio::time::{Instant, MissedTickBehavior};

use pickup_core::SourceOrderId;
use pickup_remote::{exchange_authorization_code, OAuthClient};
use pickup_sync::{pipeline, RunScope, TickReport, TickStatus, TickSummary};

use crate::engine::{build_engine, Engine};
use crate::error::{io_err, DaemonError};
use crate::paths::{run_dir, socket_path};
use crate::protocol::{DaemonRequest, DaemonResponse};

/// State shared by the ticker and every socket client.
pub(crate) struct DaemonState {
    engine: Engine,
    started_at: DateTime<Utc>,
    last_tick: RwLock<Option<TickSummary>>,
}

impl DaemonState {
    pub(crate) fn new(engine: Engine) -> Self {
        Self {
            engine,
            started_at: Utc::now(),
            last_tick: RwLock::new(None),
        }
    }
}

/// Start the daemon runtime and block the current thread until it exits.
pub fn start_blocking(home: &Path, log_json: bool) -> Result<(), DaemonError> {
    let engine = build_engine(home)?;
    init_tracing(log_json || engine.config.daemon.log_json);
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .map_err(|e| io_err("tokio-runtime", e))?;
    runtime.block_on(run(home.to_path_buf(), engine))
}

/// Run the daemon runtime.
pub async fn run(home: PathBuf, engine: Engine) -> Result<(), DaemonError> {
    ensure_runtime_dirs(&home)?;

    let interval = engine.config.reconcile.tick_interval();
    let state = Arc::new(DaemonState::new(engine));
    let (shutdown_tx, _) = broadcast::channel::<()>(16);
    tracing::info!(
        tick_interval_secs = interval.as_secs(),
        authorized = state.engine.credentials.is_authorized(),
        "pickup daemon starting",
    );

    let ticker_handle = {
        let shutdown = shutdown_tx.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result = ticker_task(state, interval, shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let socket_handle = {
        let shutdown = shutdown_tx.clone();
        let home = home.clone();
        let state = state.clone();
        tokio::spawn(async move {
            let result =
                socket_server_task(home, state, shutdown.clone(), shutdown.subscribe()).await;
            let _ = shutdown.send(());
            result
        })
    };

    let signal_handle = {
        let shutdown = shutdown_tx.clone();
        tokio::spawn(async move {
            let mut shutdown_rx = shutdown.subscribe();
            tokio::select! {
                _ = shutdown_rx.recv() => Ok(()),
                signal = tokio::signal::ctrl_c() => {
                    match signal {
                        Ok(()) => {
                            tracing::info!("received ctrl-c, shutting down daemon");
                            let _ = shutdown.send(());
                            Ok(())
                        }
                        Err(err) => Err(DaemonError::Protocol(format!("ctrl-c handler failed: {err}"))),
                    }
                }
            }
        })
    };

    let (ticker_result, socket_result, signal_result) =
        tokio::join!(ticker_handle, socket_handle, signal_handle);

    handle_join("ticker", ticker_result)?;
    handle_join("socket_server", socket_result)?;
    handle_join("signal_handler", signal_result)?;
    Ok(())
}

/// Fires once immediately, then every `interval`. A tick runs to completion
/// before the next one is considered; ticks missed meanwhile are skipped.
async fn ticker_task(
    state: Arc<DaemonState>,
    interval: Duration,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            _ = ticker.tick() => {
                let started = Instant::now();
                match run_scope(&state, RunScope::All).await {
                    Ok(report) => tracing::debug!(
                        status = ?report.status,
                        duration_ms = started.elapsed().as_millis() as u64,
                        "timer tick completed",
                    ),
                    // Join failures are logged; the ticker keeps going.
                    Err(err) => tracing::error!(error = %err, "timer tick failed"),
                }
            }
        }
    }
    Ok(())
}

/// Run the pipeline on the blocking pool and record the summary.
async fn run_scope(state: &Arc<DaemonState>, scope: RunScope) -> Result<TickReport, DaemonError> {
    let reconciler = state.engine.reconciler.clone();
    let report = tokio::task::spawn_blocking(move || pipeline::run(&reconciler, scope))
        .await
        .map_err(|err| DaemonError::Protocol(format!("tick join error: {err}")))?;

    if report.status != TickStatus::AlreadyRunning {
        *state.last_tick.write().await = Some(report.summary());
    }
    Ok(report)
}

async fn socket_server_task(
    home: PathBuf,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
    mut shutdown_rx: broadcast::Receiver<()>,
) -> Result<(), DaemonError> {
    let run = run_dir(&home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }

    let socket = socket_path(&home);
    prepare_socket_for_bind(&socket)?;

    let listener = UnixListener::bind(&socket).map_err(|e| io_err(&socket, e))?;
    set_socket_permissions(&socket)?;

    loop {
        tokio::select! {
            _ = shutdown_rx.recv() => break,
            accepted = listener.accept() => {
                let (stream, _) = accepted.map_err(|e| io_err(&socket, e))?;
                let home = home.clone();
                let state = state.clone();
                let shutdown_tx = shutdown_tx.clone();
                tokio::spawn(async move {
                    if let Err(err) = handle_socket_client(stream, home, state, shutdown_tx).await {
                        tracing::error!(error = %err, "socket client error");
                    }
                });
            }
        }
    }

    if socket.exists() {
        let _ = fs::remove_file(&socket);
    }
    Ok(())
}

async fn handle_socket_client(
    stream: UnixStream,
    home: PathBuf,
    state: Arc<DaemonState>,
    shutdown_tx: broadcast::Sender<()>,
) -> Result<(), DaemonError> {
    let (reader, mut writer) = stream.into_split();
    let mut lines = BufReader::new(reader).lines();

    while let Some(line) = lines
        .next_line()
        .await
        .map_err(|e| io_err("daemon socket read", e))?
    {
        if line.trim().is_empty() {
            continue;
        }

        let request: DaemonRequest = match serde_json::from_str(&line) {
            Ok(request) => request,
            Err(err) => {
                write_response(
                    &mut writer,
                    &DaemonResponse::error(format!("invalid request JSON: {err}")),
                )
                .await?;
                continue;
            }
        };

        let stop = request.cmd == "stop";
        let response = if stop {
            let _ = shutdown_tx.send(());
            DaemonResponse::ok(json!({ "stopping": true }))
        } else {
            dispatch(&home, &state, request).await
        };

        write_response(&mut writer, &response).await?;
        if stop {
            break;
        }
    }

    Ok(())
}

async fn dispatch(home: &Path, state: &Arc<DaemonState>, request: DaemonRequest) -> DaemonResponse {
    match request.cmd.as_str() {
        "status" => DaemonResponse::ok(build_status_payload(home, state).await),
        "run" => {
            let scope = match request.order {
                Some(id) => RunScope::Order(SourceOrderId(id)),
                None => RunScope::All,
            };
            match run_scope(state, scope).await {
                Ok(report) => DaemonResponse::ok(json!(report)),
                Err(err) => DaemonResponse::error(err.to_string()),
            }
        }
        "inspect" => {
            let Some(id) = request.order else {
                return DaemonResponse::error("inspect requires an order id");
            };
            let reconciler = state.engine.reconciler.clone();
            let inspected =
                tokio::task::spawn_blocking(move || reconciler.inspect(SourceOrderId(id))).await;
            match inspected {
                Ok(Ok(inspection)) => DaemonResponse::ok(json!(inspection)),
                Ok(Err(err)) => DaemonResponse::error(err.to_string()),
                Err(err) => DaemonResponse::error(format!("inspect join error: {err}")),
            }
        }
        "authorize" => match request.code {
            Some(code) => match authorize(state, code).await {
                Ok(payload) => DaemonResponse::ok(payload),
                Err(err) => DaemonResponse::error(err.to_string()),
            },
            None => DaemonResponse::error("authorize requires a code"),
        },
        other => DaemonResponse::error(format!("unknown command '{other}'")),
    }
}

/// Exchange an authorization code and store the token for the next tick.
async fn authorize(state: &Arc<DaemonState>, code: String) -> Result<Value, DaemonError> {
    let client = OAuthClient::from_env()
        .ok_or(DaemonError::MissingSecret("BLING_CLIENT_ID / BLING_CLIENT_SECRET"))?;
    let token_url = state.engine.config.source.oauth_token_url.clone();
    let timeout = state.engine.config.reconcile.request_timeout();

    let token = tokio::task::spawn_blocking(move || {
        exchange_authorization_code(&token_url, &client, &code, timeout)
    })
    .await
    .map_err(|err| DaemonError::Protocol(format!("authorize join error: {err}")))??;

    let expires_at = token.expires_at();
    state.engine.credentials.set(token);
    Ok(json!({ "authorized": true, "expires_at": expires_at }))
}

pub(crate) async fn build_status_payload(home: &Path, state: &DaemonState) -> Value {
    let last_tick = state.last_tick.read().await.clone();
    json!({
        "running": true,
        "pid": std::process::id(),
        "started_at": state.started_at,
        "authorized": state.engine.credentials.is_authorized(),
        "tick_interval_secs": state.engine.config.reconcile.tick_interval_secs,
        "tick_in_progress": state.engine.reconciler.is_running(),
        "last_tick": last_tick,
        "socket": socket_path(home).display().to_string(),
    })
}

fn prepare_socket_for_bind(socket: &Path) -> Result<(), DaemonError> {
    if !socket.exists() {
        return Ok(());
    }

    match StdUnixStream::connect(socket) {
        Ok(_) => {
            return Err(DaemonError::Protocol(format!(
                "daemon socket already in use: {}",
                socket.display()
            )));
        }
        Err(err) => {
            tracing::warn!(
                socket = %socket.display(),
                error = %err,
                "removing stale daemon socket before bind",
            );
        }
    }

    match fs::remove_file(socket) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
        Err(err) => Err(io_err(socket, err)),
    }
}

fn ensure_runtime_dirs(home: &Path) -> Result<(), DaemonError> {
    let run = run_dir(home);
    if !run.exists() {
        fs::create_dir_all(&run).map_err(|e| io_err(&run, e))?;
    }
    Ok(())
}

async fn write_response(
    writer: &mut OwnedWriteHalf,
    response: &DaemonResponse,
) -> Result<(), DaemonError> {
    let payload = serde_json::to_string(response)?;
    writer
        .write_all(payload.as_bytes())
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .write_all(b"\n")
        .await
        .map_err(|e| io_err("daemon socket write", e))?;
    writer
        .flush()
        .await
        .map_err(|e| io_err("daemon socket flush", e))?;
    Ok(())
}

fn handle_join(
    task: &str,
    result: Result<Result<(), DaemonError>, tokio::task::JoinError>,
) -> Result<(), DaemonError> {
    match result {
        Ok(inner) => inner,
        Err(err) => Err(DaemonError::Protocol(format!(
            "{task} task join failure: {err}"
        ))),
    }
}

/// Install the global subscriber. `RUST_LOG` overrides the default `info`.
pub fn init_tracing(json: bool) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = if json {
        fmt()
            .json()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    } else {
        fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
    };
}

#[cfg(unix)]
fn set_socket_permissions(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_socket_permissions(_path: &Path) -> Result<(), DaemonError> {
    Ok(())
}
