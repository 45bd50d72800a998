//! TCP JSON-RPC server backed by an in-memory instrument session.
//!
//! Each CLI invocation is a separate process with its own connection; the
//! session state lives in the shared `FakeTia` so it persists across runs.

#![allow(dead_code)]

use std::io::{BufRead, BufReader, Write};
use std::net::{TcpListener, TcpStream};
use std::thread;

use assert_cmd::Command;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tia_core::test_support::FakeTia;
use tia_ipc::{RemoteError, RemoteHandle};

#[derive(Debug, Deserialize)]
struct Request {
    id: u64,
    method: String,
    params: Option<Value>,
}

#[derive(Debug, Serialize)]
struct Response {
    jsonrpc: &'static str,
    id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<RpcError>,
}

#[derive(Debug, Serialize)]
struct RpcError {
    code: i32,
    message: String,
}

pub struct FakeServer {
    addr: String,
    fake: FakeTia,
}

impl FakeServer {
    pub fn start() -> Self {
        Self::with_fake(FakeTia::new())
    }

    pub fn with_fake(fake: FakeTia) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").expect("Failed to bind fake server");
        let addr = listener.local_addr().expect("No local addr").to_string();
        let served = fake.clone();
        thread::spawn(move || {
            for stream in listener.incoming().flatten() {
                let fake = served.clone();
                thread::spawn(move || serve(stream, fake));
            }
        });
        Self { addr, fake }
    }

    pub fn addr(&self) -> &str {
        &self.addr
    }

    pub fn fake(&self) -> &FakeTia {
        &self.fake
    }

    /// The binary, pointed at this server, without colors or ambient logging.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::cargo_bin("tia-control").expect("Binary not built");
        cmd.env("TIA_ADDR", &self.addr)
            .env("NO_COLOR", "1")
            .env_remove("RUST_LOG")
            .env_remove("TIA_LOG");
        cmd
    }
}

/// The binary pointed at an address where nothing listens.
pub fn offline_cmd() -> Command {
    let mut cmd = Command::cargo_bin("tia-control").expect("Binary not built");
    cmd.env("TIA_ADDR", "127.0.0.1:1")
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("TIA_LOG");
    cmd
}

fn serve(stream: TcpStream, mut fake: FakeTia) {
    let Ok(write_half) = stream.try_clone() else {
        return;
    };
    let mut writer = write_half;
    let reader = BufReader::new(stream);
    for line in reader.lines() {
        let Ok(line) = line else { return };
        let Ok(request) = serde_json::from_str::<Request>(&line) else {
            return;
        };
        let response = match fake.call(&request.method, request.params) {
            Ok(result) => Response {
                jsonrpc: "2.0",
                id: request.id,
                result: Some(result),
                error: None,
            },
            Err(err) => {
                let (code, message) = match err {
                    RemoteError::Rpc { code, message, .. } => (code, message),
                    other => (other.code(), other.to_string()),
                };
                Response {
                    jsonrpc: "2.0",
                    id: request.id,
                    result: None,
                    error: Some(RpcError { code, message }),
                }
            }
        };
        let Ok(json) = serde_json::to_string(&response) else {
            return;
        };
        if writeln!(writer, "{}", json).is_err() {
            return;
        }
    }
}
