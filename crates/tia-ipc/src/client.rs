use std::io::BufRead;
use std::io::BufReader;
use std::io::Write;
use std::net::TcpStream;
use std::net::ToSocketAddrs;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;
use std::time::Duration;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::error::RemoteError;
use crate::handle::RemoteHandle;

static REQUEST_ID: AtomicU64 = AtomicU64::new(1);

pub const DEFAULT_ADDR: &str = "127.0.0.1:8088";

#[derive(Debug, Serialize)]
struct Request<'a> {
    jsonrpc: &'static str,
    id: u64,
    method: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    params: Option<Value>,
}

#[derive(Debug, Deserialize)]
struct Response {
    #[allow(dead_code)]
    jsonrpc: String,
    id: u64,
    #[serde(default, deserialize_with = "present_value")]
    result: Option<Value>,
    error: Option<RpcError>,
}

/// Keeps an explicit `"result": null` distinct from a missing result.
fn present_value<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(deserializer).map(Some)
}

#[derive(Debug, Deserialize)]
struct RpcError {
    code: i32,
    message: String,
    #[serde(default)]
    data: Option<Value>,
}

/// Connection settings for [`TcpRemoteHandle`].
#[derive(Debug, Clone)]
pub struct RemoteHandleConfig {
    pub addr: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
}

impl Default for RemoteHandleConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_ADDR.to_string(),
            read_timeout: Duration::from_secs(60),
            write_timeout: Duration::from_secs(10),
        }
    }
}

impl RemoteHandleConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_addr(mut self, addr: impl Into<String>) -> Self {
        self.addr = addr.into();
        self
    }

    pub fn with_read_timeout(mut self, timeout: Duration) -> Self {
        self.read_timeout = timeout;
        self
    }

    pub fn with_write_timeout(mut self, timeout: Duration) -> Self {
        self.write_timeout = timeout;
        self
    }
}

/// Line-delimited JSON-RPC 2.0 handle over one persistent TCP connection.
///
/// A failed call is reported once; the connection is dropped and later
/// calls fail with `NotConnected`.
pub struct TcpRemoteHandle {
    config: RemoteHandleConfig,
    stream: Option<BufReader<TcpStream>>,
}

impl TcpRemoteHandle {
    pub fn connect(config: RemoteHandleConfig) -> Result<Self, RemoteError> {
        let addr = config
            .addr
            .to_socket_addrs()?
            .next()
            .ok_or(RemoteError::NotConnected)?;
        let stream = TcpStream::connect_timeout(&addr, config.write_timeout)?;
        stream.set_read_timeout(Some(config.read_timeout))?;
        stream.set_write_timeout(Some(config.write_timeout))?;
        stream.set_nodelay(true)?;

        debug!(addr = %addr, "Connected to software server");

        Ok(Self {
            config,
            stream: Some(BufReader::new(stream)),
        })
    }

    pub fn config(&self) -> &RemoteHandleConfig {
        &self.config
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    fn exchange(
        reader: &mut BufReader<TcpStream>,
        method: &str,
        params: Option<Value>,
    ) -> Result<Value, RemoteError> {
        let id = REQUEST_ID.fetch_add(1, Ordering::SeqCst);
        let request = Request {
            jsonrpc: "2.0",
            id,
            method,
            params,
        };
        let request_json = serde_json::to_string(&request)?;

        let stream = reader.get_mut();
        writeln!(stream, "{}", request_json)?;
        stream.flush()?;

        let mut response_line = String::new();
        if reader.read_line(&mut response_line)? == 0 {
            return Err(RemoteError::NotConnected);
        }

        let response: Response = serde_json::from_str(&response_line)?;
        if response.id != id {
            return Err(RemoteError::InvalidResponse);
        }

        if let Some(error) = response.error {
            return Err(RemoteError::Rpc {
                code: error.code,
                message: error.message,
                context: error.data,
            });
        }

        response.result.ok_or(RemoteError::InvalidResponse)
    }
}

impl RemoteHandle for TcpRemoteHandle {
    fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, RemoteError> {
        let reader = self.stream.as_mut().ok_or(RemoteError::NotConnected)?;
        debug!(method, "Remote call");

        match Self::exchange(reader, method, params) {
            Ok(value) => Ok(value),
            Err(err @ RemoteError::Rpc { .. }) => Err(err),
            Err(err) => {
                debug!(method, error = %err, "Dropping connection after transport failure");
                self.stream = None;
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::TcpListener;
    use std::thread;

    fn serve_once<F>(reply: F) -> (String, thread::JoinHandle<String>)
    where
        F: FnOnce(&Value) -> String + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let handle = thread::spawn(move || {
            let (stream, _) = listener.accept().unwrap();
            let mut reader = BufReader::new(stream);
            let mut line = String::new();
            reader.read_line(&mut line).unwrap();
            let request: Value = serde_json::from_str(&line).unwrap();
            let response = reply(&request);
            let stream = reader.get_mut();
            writeln!(stream, "{}", response).unwrap();
            stream.flush().unwrap();
            line
        });
        (addr, handle)
    }

    #[test]
    fn test_request_serializes_to_jsonrpc_2_0() {
        let request = Request {
            jsonrpc: "2.0",
            id: 1,
            method: "DisplayWindowNames",
            params: None,
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"jsonrpc\":\"2.0\""));
        assert!(json.contains("\"id\":1"));
        assert!(json.contains("\"method\":\"DisplayWindowNames\""));
        assert!(!json.contains("\"params\""));
    }

    #[test]
    fn test_response_null_result_is_present() {
        let response: Response =
            serde_json::from_str(r#"{"jsonrpc":"2.0","id":1,"result":null}"#).unwrap();
        assert_eq!(response.result, Some(Value::Null));

        let response: Response = serde_json::from_str(r#"{"jsonrpc":"2.0","id":1}"#).unwrap();
        assert!(response.result.is_none());
    }

    #[test]
    fn test_response_deserializes_error_with_data() {
        let json = r#"{"jsonrpc":"2.0","id":3,"error":{"code":-32001,"message":"gone","data":{"name":"W"}}}"#;
        let response: Response = serde_json::from_str(json).unwrap();
        let error = response.error.unwrap();
        assert_eq!(error.code, -32001);
        assert_eq!(error.data, Some(serde_json::json!({"name": "W"})));
    }

    #[test]
    fn test_config_builders() {
        let config = RemoteHandleConfig::new()
            .with_addr("10.0.0.2:9000")
            .with_read_timeout(Duration::from_secs(5))
            .with_write_timeout(Duration::from_secs(2));
        assert_eq!(config.addr, "10.0.0.2:9000");
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.write_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_call_round_trip_over_tcp() {
        let (addr, server) = serve_once(|request| {
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "result": ["W"],
            })
            .to_string()
        });

        let mut handle =
            TcpRemoteHandle::connect(RemoteHandleConfig::new().with_addr(addr)).unwrap();
        let result = handle.call("DisplayWindowNames", None).unwrap();
        assert_eq!(result, serde_json::json!(["W"]));

        let sent = server.join().unwrap();
        assert!(sent.contains("\"method\":\"DisplayWindowNames\""));
    }

    #[test]
    fn test_rpc_error_keeps_connection() {
        let (addr, server) = serve_once(|request| {
            serde_json::json!({
                "jsonrpc": "2.0",
                "id": request["id"],
                "error": {"code": -32002, "message": "no setup"},
            })
            .to_string()
        });

        let mut handle =
            TcpRemoteHandle::connect(RemoteHandleConfig::new().with_addr(addr)).unwrap();
        let err = handle.call("SelectSetup", None).unwrap_err();
        assert_eq!(err.code(), -32002);
        assert!(handle.is_connected());
        server.join().unwrap();
    }

    #[test]
    fn test_mismatched_id_drops_connection() {
        let (addr, server) = serve_once(|_| {
            r#"{"jsonrpc":"2.0","id":0,"result":null}"#.to_string()
        });

        let mut handle =
            TcpRemoteHandle::connect(RemoteHandleConfig::new().with_addr(addr)).unwrap();
        let err = handle.call("Start", None).unwrap_err();
        assert!(matches!(err, RemoteError::InvalidResponse));
        assert!(!handle.is_connected());
        assert!(matches!(
            handle.call("Start", None).unwrap_err(),
            RemoteError::NotConnected
        ));
        server.join().unwrap();
    }

    #[test]
    fn test_connect_refused() {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);

        let result = TcpRemoteHandle::connect(RemoteHandleConfig::new().with_addr(addr));
        assert!(matches!(result, Err(RemoteError::ConnectionFailed(_))));
    }
}
