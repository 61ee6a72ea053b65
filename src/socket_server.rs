use crate::actor::{self, Receiver, Sender};
use crate::ipc::{IpcCommand, IpcResponse};
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

/// A parsed command waiting for the daemon's answer
#[derive(Debug)]
pub struct IpcRequest {
    pub command: IpcCommand,
    pub reply: oneshot::Sender<IpcResponse>,
}

/// Guard that removes the socket file when dropped
pub struct SocketGuard {
    path: PathBuf,
}

impl Drop for SocketGuard {
    fn drop(&mut self) {
        if let Err(e) = fs::remove_file(&self.path) {
            if self.path.exists() {
                error!("Failed to remove socket file: {}", e);
            }
        } else {
            info!("Removed socket file at {}", self.path.display());
        }
    }
}

/// Start the IPC socket server at `socket_path`.
/// Returns a receiver for incoming requests and a guard that cleans up the socket
pub async fn start_server(socket_path: &Path) -> Result<(Receiver<IpcRequest>, SocketGuard)> {
    // Remove stale socket if it exists
    if socket_path.exists() {
        info!("Removing stale socket at {}", socket_path.display());
        fs::remove_file(socket_path)?;
    }

    let listener = UnixListener::bind(socket_path)
        .with_context(|| format!("Failed to bind socket at {}", socket_path.display()))?;

    info!("IPC socket listening at {}", socket_path.display());

    let guard = SocketGuard {
        path: socket_path.to_path_buf(),
    };
    let (tx, rx) = actor::channel();

    // Spawn task to accept connections
    tokio::spawn(async move {
        loop {
            match listener.accept().await {
                Ok((stream, _)) => {
                    let tx = tx.clone();
                    tokio::spawn(async move {
                        if let Err(e) = handle_client(stream, tx).await {
                            debug!("Client connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Failed to accept connection: {}", e);
                }
            }
        }
    });

    Ok((rx, guard))
}

/// Handle a single client connection
async fn handle_client(stream: UnixStream, tx: Sender<IpcRequest>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    // Read one command per connection
    reader.read_line(&mut line).await?;

    let response = match serde_json::from_str::<IpcCommand>(line.trim()) {
        Ok(command) => {
            debug!("Received IPC command: {:?}", command);
            let (reply, answer) = oneshot::channel();
            if !tx.send(IpcRequest { command, reply }) {
                IpcResponse::Error("Daemon is shutting down".to_string())
            } else {
                answer.await.unwrap_or_else(|_| {
                    IpcResponse::Error("Daemon dropped the request".to_string())
                })
            }
        }
        Err(e) => {
            warn!("Unknown IPC command: {}", line.trim());
            IpcResponse::Error(format!("Unknown command: {} ({})", line.trim(), e))
        }
    };

    // Send response
    let response_json = serde_json::to_string(&response)?;
    writer.write_all(response_json.as_bytes()).await?;
    writer.write_all(b"\n").await?;
    writer.flush().await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::socket_client::send_command_to;

    fn socket_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("appmgr-{}-{}.sock", name, std::process::id()))
    }

    #[tokio::test]
    async fn test_request_and_reply() {
        let path = socket_path("reply");
        let (mut rx, guard) = start_server(&path).await.unwrap();

        let client_path = path.clone();
        let client = tokio::task::spawn_blocking(move || {
            send_command_to(&client_path, &IpcCommand::Launch { app: "music".to_string() })
        });

        let request = rx.recv().await.unwrap();
        assert_eq!(request.command, IpcCommand::Launch { app: "music".to_string() });
        request.reply.send(IpcResponse::Error("busy".to_string())).unwrap();

        match client.await.unwrap().unwrap() {
            IpcResponse::Error(e) => assert_eq!(e, "busy"),
            other => panic!("unexpected response: {:?}", other),
        }

        drop(guard);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_garbage_is_rejected() {
        let path = socket_path("garbage");
        let (_rx, _guard) = start_server(&path).await.unwrap();

        let mut stream = UnixStream::connect(&path).await.unwrap();
        stream.write_all(b"show\n").await.unwrap();
        let mut line = String::new();
        BufReader::new(stream).read_line(&mut line).await.unwrap();
        let response: IpcResponse = serde_json::from_str(&line).unwrap();
        assert!(matches!(
            response,
            IpcResponse::Error(e) if e.starts_with("Unknown command: show")
        ));
    }
}
