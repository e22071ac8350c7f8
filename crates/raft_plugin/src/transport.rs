use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicBool, AtomicU64, Ordering},
        Arc,
    },
    time::Duration,
};

use serde::Deserialize;
use serde_json::Value;
use tokio::{
    io::{AsyncBufReadExt, AsyncWriteExt, BufReader},
    process::{Child, ChildStderr, ChildStdin, ChildStdout, Command},
    sync::{mpsc, oneshot, Mutex},
    task::JoinHandle,
    time,
};
use tracing::{debug, error, info, trace, warn};

use crate::{LaunchSpec, LogParams, RequestId, TransportError, METHOD_LOG, METHOD_SHUTDOWN};

type PendingRequests =
    Arc<Mutex<HashMap<RequestId, oneshot::Sender<Result<Value, TransportError>>>>>;

/// ETXTBSY; freshly written plugin files can still be open for writing.
const EXECUTABLE_BUSY: i32 = 26;

enum Outgoing {
    Line(String),
    Close,
}

/// Line-delimited JSON-RPC 2.0 over a plugin's stdin/stdout.
pub(crate) struct PluginTransport {
    label: String,
    writer: mpsc::UnboundedSender<Outgoing>,
    pending: PendingRequests,
    next_id: AtomicU64,
    open: Arc<AtomicBool>,
    tasks: Vec<JoinHandle<()>>,
    child: Arc<Mutex<Option<Child>>>,
}

impl PluginTransport {
    pub(crate) async fn spawn(spec: &LaunchSpec, label: String) -> Result<Self, TransportError> {
        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .stdin(std::process::Stdio::piped())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);

        for (key, value) in &spec.env {
            command.env(key, value);
        }

        let mut child = spawn_with_retry(&mut command).await?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Transport("child stdout unavailable".into()))?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Transport("child stdin unavailable".into()))?;
        let stderr = child.stderr.take();

        let pending = Arc::new(Mutex::new(HashMap::new()));
        let open = Arc::new(AtomicBool::new(true));
        let (writer_tx, writer_rx) = mpsc::unbounded_channel();

        let mut tasks = vec![
            tokio::spawn(writer_task(stdin, writer_rx)),
            tokio::spawn(reader_task(
                stdout,
                pending.clone(),
                open.clone(),
                label.clone(),
            )),
        ];
        if let Some(stderr) = stderr {
            tasks.push(tokio::spawn(stderr_task(
                stderr,
                label.clone(),
                spec.mirror_stderr,
            )));
        }

        debug!(plugin = %label, pid = ?child.id(), "plugin process started");

        Ok(Self {
            label,
            writer: writer_tx,
            pending,
            next_id: AtomicU64::new(1),
            open,
            tasks,
            child: Arc::new(Mutex::new(Some(child))),
        })
    }

    /// Whether the plugin's stdout is still open.
    pub(crate) fn is_open(&self) -> bool {
        self.open.load(Ordering::SeqCst)
    }

    /// Sends a request and waits for its response.
    pub(crate) async fn request(
        &self,
        method: &str,
        params: Value,
        timeout: Duration,
    ) -> Result<Value, TransportError> {
        if !self.is_open() {
            return Err(TransportError::ChannelClosed);
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        let serialized = serde_json::to_string(&message)?;
        let (tx, rx) = oneshot::channel();

        {
            let mut guard = self.pending.lock().await;
            guard.insert(id, tx);
        }
        // The reader clears `open` before draining; an entry added after the
        // drain would never resolve.
        if !self.is_open() {
            self.pending.lock().await.remove(&id);
            return Err(TransportError::ChannelClosed);
        }

        trace!(plugin = %self.label, id, method, "sending request");
        if self.writer.send(Outgoing::Line(serialized)).is_err() {
            let mut guard = self.pending.lock().await;
            guard.remove(&id);
            return Err(TransportError::ChannelClosed);
        }

        let outcome = recv_with_timeout(rx, timeout).await;
        if matches!(outcome, Err(TransportError::Timeout(_))) {
            self.pending.lock().await.remove(&id);
        }
        outcome
    }

    pub(crate) fn notify(&self, method: &str, params: Value) -> Result<(), TransportError> {
        let message = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        let serialized = serde_json::to_string(&message)?;
        self.writer
            .send(Outgoing::Line(serialized))
            .map_err(|_| TransportError::ChannelClosed)
    }

    /// Sends `shutdown`, closes stdin and gives the process `grace` to exit
    /// before killing it.
    pub(crate) async fn shutdown(&self, grace: Duration) {
        let _ = self.notify(METHOD_SHUTDOWN, Value::Null);
        let _ = self.writer.send(Outgoing::Close);

        let mut guard = self.child.lock().await;
        if let Some(mut child) = guard.take() {
            match time::timeout(grace, child.wait()).await {
                Ok(Ok(status)) => debug!(plugin = %self.label, %status, "plugin exited"),
                Ok(Err(err)) => warn!(plugin = %self.label, "failed to reap plugin: {err}"),
                Err(_) => {
                    warn!(plugin = %self.label, "plugin ignored shutdown; killing it");
                    let _ = child.start_kill();
                }
            }
        }
        self.open.store(false, Ordering::SeqCst);
    }
}

impl Drop for PluginTransport {
    fn drop(&mut self) {
        for handle in &self.tasks {
            handle.abort();
        }

        if let Ok(mut child_guard) = self.child.try_lock() {
            if let Some(mut child) = child_guard.take() {
                let _ = child.start_kill();
            }
        }
    }
}

async fn spawn_with_retry(command: &mut Command) -> Result<Child, TransportError> {
    let mut backoff = Duration::from_millis(2);
    for attempt in 0..5 {
        match command.spawn() {
            Ok(child) => return Ok(child),
            Err(source) => {
                let is_busy = source.raw_os_error() == Some(EXECUTABLE_BUSY);
                if is_busy && attempt < 4 {
                    time::sleep(backoff).await;
                    backoff = std::cmp::min(backoff * 2, Duration::from_millis(50));
                    continue;
                }
                return Err(TransportError::Spawn {
                    command: format!("{:?}", command.as_std()),
                    source,
                });
            }
        }
    }
    Err(TransportError::Transport("spawn retries exhausted".into()))
}

#[derive(Debug, Deserialize)]
struct RpcResponse {
    id: Value,
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Debug, Deserialize)]
struct RpcNotification {
    method: String,
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i64,
    message: String,
    data: Option<Value>,
}

#[derive(Debug)]
enum Incoming {
    Response(RpcResponse),
    Notification(RpcNotification),
}

async fn writer_task(mut stdin: ChildStdin, mut rx: mpsc::UnboundedReceiver<Outgoing>) {
    while let Some(Outgoing::Line(message)) = rx.recv().await {
        if stdin.write_all(message.as_bytes()).await.is_err() {
            break;
        }
        if stdin.write_all(b"\n").await.is_err() {
            break;
        }
        let _ = stdin.flush().await;
    }

    let _ = stdin.shutdown().await;
}

async fn reader_task(
    stdout: ChildStdout,
    pending: PendingRequests,
    open: Arc<AtomicBool>,
    label: String,
) {
    let mut lines = BufReader::new(stdout).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if line.trim().is_empty() {
            continue;
        }

        let value: Value = match serde_json::from_str(&line) {
            Ok(value) => value,
            Err(err) => {
                // The answer the caller waits for may be this very line.
                warn!(plugin = %label, "non-JSON plugin stdout ({err}): {line}");
                fail_pending(&pending, || {
                    TransportError::Protocol(format!("non-JSON line on stdout ({err})"))
                })
                .await;
                continue;
            }
        };

        match decode_message(value) {
            Some(Incoming::Response(response)) => {
                handle_response(response, &pending, &label).await;
            }
            Some(Incoming::Notification(notification)) => {
                if notification.method == METHOD_LOG {
                    forward_log(&label, notification.params.unwrap_or(Value::Null));
                } else {
                    debug!(plugin = %label, method = %notification.method, "ignoring plugin notification");
                }
            }
            None => {
                warn!(plugin = %label, "received malformed JSON-RPC message");
            }
        }
    }

    open.store(false, Ordering::SeqCst);
    fail_pending(&pending, || TransportError::ChannelClosed).await;
}

async fn fail_pending(pending: &PendingRequests, error: impl Fn() -> TransportError) {
    let mut guard = pending.lock().await;
    for (_, tx) in guard.drain() {
        let _ = tx.send(Err(error()));
    }
}

async fn stderr_task(stderr: ChildStderr, label: String, mirror: bool) {
    let mut lines = BufReader::new(stderr).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        if mirror {
            eprintln!("[plugin {label}] {line}");
        } else {
            debug!(plugin = %label, "stderr: {line}");
        }
    }
}

fn forward_log(label: &str, params: Value) {
    let params: LogParams = match serde_json::from_value(params) {
        Ok(params) => params,
        Err(err) => {
            warn!(plugin = %label, "malformed log notification: {err}");
            return;
        }
    };
    let message = params.message;
    match params
        .level
        .as_deref()
        .map(str::to_ascii_lowercase)
        .as_deref()
    {
        Some("error" | "critical" | "fatal") => error!(plugin = %label, "{message}"),
        Some("warn" | "warning") => warn!(plugin = %label, "{message}"),
        Some("debug") => debug!(plugin = %label, "{message}"),
        Some("trace") => trace!(plugin = %label, "{message}"),
        _ => info!(plugin = %label, "{message}"),
    }
}

async fn recv_with_timeout(
    rx: oneshot::Receiver<Result<Value, TransportError>>,
    timeout: Duration,
) -> Result<Value, TransportError> {
    match time::timeout(timeout, rx).await {
        Ok(Ok(Ok(value))) => Ok(value),
        Ok(Ok(Err(err))) => Err(err),
        Ok(Err(_)) => Err(TransportError::ChannelClosed),
        Err(_) => Err(TransportError::Timeout(timeout)),
    }
}

fn decode_message(value: Value) -> Option<Incoming> {
    let is_notification = value.get("id").is_none() && value.get("method").is_some();
    if is_notification {
        let notification: RpcNotification = serde_json::from_value(value).ok()?;
        return Some(Incoming::Notification(notification));
    }

    let is_response = value.get("id").is_some();
    if is_response {
        let response: RpcResponse = serde_json::from_value(value).ok()?;
        return Some(Incoming::Response(response));
    }

    None
}

async fn handle_response(response: RpcResponse, pending: &PendingRequests, label: &str) {
    let Some(id) = parse_request_id(&response.id) else {
        warn!(plugin = %label, "received response without numeric id");
        return;
    };

    let sender = { pending.lock().await.remove(&id) };
    let Some(tx) = sender else {
        debug!(plugin = %label, id, "dropping response to an abandoned request");
        return;
    };

    if let Some(err) = response.error {
        let _ = tx.send(Err(TransportError::Rpc {
            code: err.code,
            message: err.message,
            data: err.data,
        }));
    } else if let Some(result) = response.result {
        let _ = tx.send(Ok(result));
    } else {
        // `"result": null` deserializes to `None`.
        let _ = tx.send(Ok(Value::Null));
    }
}

fn parse_request_id(value: &Value) -> Option<RequestId> {
    if let Some(num) = value.as_u64() {
        return Some(num);
    }

    value.as_str().and_then(|s| s.parse::<RequestId>().ok())
}
