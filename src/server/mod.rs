//! The TCP accept loop. One connection carries exactly one request/response
//! pair (spec.md §6): the client writes its JSON request, half-closes its
//! write side, then reads to EOF for the response. Scheduling is one OS
//! thread per accepted connection, the same worker-per-connection shape the
//! teacher's `WorkingThreadPool` describes, without the rayon pool.

use crate::wire::{self, Request};
use std::io::{Read, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;
use std::time::Duration;
use tracing::{info, warn};

use crate::config::CONNECTION_READ_TIMEOUT_MS;

pub fn serve(host: &str, port: u16) -> std::io::Result<()> {
    let addr = format!("{host}:{port}");
    let listener = TcpListener::bind(&addr)?;
    info!(addr = %addr, "mdbms server listening");

    for stream in listener.incoming() {
        match stream {
            Ok(stream) => {
                thread::spawn(move || handle_connection(stream));
            }
            Err(e) => warn!(error = %e, "failed to accept connection"),
        }
    }
    Ok(())
}

fn handle_connection(mut stream: TcpStream) {
    let peer = stream.peer_addr().map(|a| a.to_string()).unwrap_or_else(|_| "unknown".to_string());
    stream.set_read_timeout(Some(Duration::from_millis(CONNECTION_READ_TIMEOUT_MS))).ok();

    let mut raw = Vec::new();
    if let Err(e) = stream.read_to_end(&mut raw) {
        warn!(peer, error = %e, "failed reading request body");
        return;
    }

    let response = match serde_json::from_slice::<Request>(&raw) {
        Ok(request) => {
            info!(peer, transaction_id = request.transaction_id, query = %request.query, "handling request");
            wire::dispatch(&request)
        }
        Err(e) => {
            warn!(peer, error = %e, "malformed request payload");
            wire::malformed_request(&String::from_utf8_lossy(&raw))
        }
    };

    let payload = match serde_json::to_vec(&response) {
        Ok(bytes) => bytes,
        Err(e) => {
            warn!(peer, error = %e, "failed to serialize response");
            return;
        }
    };

    if let Err(e) = stream.write_all(&payload) {
        warn!(peer, error = %e, "failed writing response");
    }
    let _ = stream.shutdown(std::net::Shutdown::Write);
}
