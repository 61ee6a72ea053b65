use crate::ipc::{get_socket_path, IpcCommand, IpcResponse};
use anyhow::{Context, Result};
use std::io::{BufRead, BufReader, Write};
use std::os::unix::net::UnixStream;
use std::path::Path;
use std::time::Duration;

/// Send a command to the daemon and get the response
pub fn send_command(command: &IpcCommand) -> Result<IpcResponse> {
    send_command_to(&get_socket_path()?, command)
}

pub fn send_command_to(socket_path: &Path, command: &IpcCommand) -> Result<IpcResponse> {
    let mut stream = UnixStream::connect(socket_path).with_context(|| {
        format!(
            "Failed to connect to daemon at {}. Is the daemon running?",
            socket_path.display()
        )
    })?;

    // Set timeouts
    stream.set_read_timeout(Some(Duration::from_secs(5)))?;
    stream.set_write_timeout(Some(Duration::from_secs(5)))?;

    let line = serde_json::to_string(command)?;
    writeln!(stream, "{}", line)?;
    stream.flush()?;

    // Read response
    let mut reader = BufReader::new(stream);
    let mut response_line = String::new();
    reader.read_line(&mut response_line)?;

    let response: IpcResponse =
        serde_json::from_str(&response_line).context("Failed to parse daemon response")?;

    Ok(response)
}

/// Send command and print result, exit with appropriate code
pub fn send_command_and_exit(command: IpcCommand) -> ! {
    match send_command(&command) {
        Ok(IpcResponse::Ok) => {
            std::process::exit(0);
        }
        Ok(IpcResponse::Status { manager, focused }) => {
            println!("Manager Status:");
            println!("  State: {:?}", manager.state);
            println!("  Focus: {}", manager.focus.as_deref().unwrap_or("-"));
            println!("  Previous: {}", manager.previous.as_deref().unwrap_or("-"));
            if let Some(launching) = &manager.launching {
                println!("  Launching: {}", launching);
            }
            println!("  Queued requests: {}", manager.queued);
            println!("Applications:");
            for app in &manager.applications {
                println!(
                    "  {:<10} {:<18} {}",
                    app.name,
                    app.state,
                    if app.closeable { "closeable" } else { "" }
                );
            }
            if let Some(snapshot) = focused {
                println!(
                    "Window stack of {}: [{}]",
                    snapshot.name,
                    snapshot.window_stack.join(", ")
                );
            }
            std::process::exit(0);
        }
        Ok(IpcResponse::Error(e)) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            std::process::exit(1);
        }
    }
}
