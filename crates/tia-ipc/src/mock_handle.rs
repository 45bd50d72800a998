use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::Mutex;

use serde_json::Value;
use serde_json::json;
use tia_common::mutex_lock_or_recover;

use crate::error::RemoteError;
use crate::error_codes;
use crate::handle::GET_PROPERTY;
use crate::handle::RemoteHandle;
use crate::handle::SET_PROPERTY;

type CallRecord = Vec<(String, Option<Value>)>;
type Handler = Arc<dyn Fn(Option<&Value>) -> Result<Value, RemoteError> + Send + Sync>;

/// A scripted reply for one method.
#[derive(Debug, Clone, PartialEq)]
pub enum MockReply {
    Value(Value),
    Error { code: i32, message: String },
}

impl MockReply {
    fn into_result(self) -> Result<Value, RemoteError> {
        match self {
            MockReply::Value(v) => Ok(v),
            MockReply::Error { code, message } => Err(RemoteError::rpc(code, message)),
        }
    }
}

/// A scripted `RemoteHandle` for tests.
///
/// Replies are resolved in this order: queued one-shot replies, handlers,
/// fixed replies, then the default. Property reads are served from a
/// property table that `set_property` also writes to, so a write followed
/// by a read behaves like the real server. Every call is recorded.
///
/// Clones share state, so a test can keep a clone for assertions after
/// handing the handle to the code under test.
///
/// # Example
///
/// ```ignore
/// use tia_ipc::{MockHandle, RemoteHandle};
/// use serde_json::json;
///
/// let mut mock = MockHandle::new();
/// mock.set_response("DisplayWindowNames", json!(["W"]));
///
/// let result = mock.call("DisplayWindowNames", None).unwrap();
/// assert_eq!(result, json!(["W"]));
/// assert_eq!(mock.call_count("DisplayWindowNames"), 1);
/// ```
#[derive(Clone)]
pub struct MockHandle {
    replies: Arc<Mutex<HashMap<String, MockReply>>>,
    queued: Arc<Mutex<HashMap<String, VecDeque<MockReply>>>>,
    handlers: Arc<Mutex<HashMap<String, Handler>>>,
    properties: Arc<Mutex<HashMap<String, Value>>>,
    calls: Arc<Mutex<CallRecord>>,
    default_response: Value,
    error_on_missing: bool,
}

impl Default for MockHandle {
    fn default() -> Self {
        Self::new()
    }
}

fn property_key(object: &str, property: &str) -> String {
    if object.is_empty() {
        property.to_string()
    } else {
        format!("{}.{}", object, property)
    }
}

impl MockHandle {
    /// Unconfigured methods answer `null`.
    pub fn new() -> Self {
        Self {
            replies: Arc::new(Mutex::new(HashMap::new())),
            queued: Arc::new(Mutex::new(HashMap::new())),
            handlers: Arc::new(Mutex::new(HashMap::new())),
            properties: Arc::new(Mutex::new(HashMap::new())),
            calls: Arc::new(Mutex::new(Vec::new())),
            default_response: Value::Null,
            error_on_missing: false,
        }
    }

    /// Unconfigured methods and properties fail with `METHOD_NOT_FOUND`.
    pub fn new_strict() -> Self {
        Self {
            error_on_missing: true,
            ..Self::new()
        }
    }

    pub fn set_response(&mut self, method: &str, response: Value) {
        mutex_lock_or_recover(&self.replies).insert(method.to_string(), MockReply::Value(response));
    }

    pub fn set_error(&mut self, method: &str, code: i32, message: &str) {
        mutex_lock_or_recover(&self.replies).insert(
            method.to_string(),
            MockReply::Error {
                code,
                message: message.to_string(),
            },
        );
    }

    /// Queues a one-shot reply; queued replies are consumed in FIFO order
    /// before any fixed reply is used.
    pub fn push_reply(&mut self, method: &str, reply: MockReply) {
        mutex_lock_or_recover(&self.queued)
            .entry(method.to_string())
            .or_default()
            .push_back(reply);
    }

    pub fn push_response(&mut self, method: &str, response: Value) {
        self.push_reply(method, MockReply::Value(response));
    }

    pub fn set_handler<F>(&mut self, method: &str, handler: F)
    where
        F: Fn(Option<&Value>) -> Result<Value, RemoteError> + Send + Sync + 'static,
    {
        mutex_lock_or_recover(&self.handlers).insert(method.to_string(), Arc::new(handler));
    }

    /// Seeds a property value read back by `get_property`.
    pub fn set_property_value(&mut self, object: &str, property: &str, value: Value) {
        mutex_lock_or_recover(&self.properties).insert(property_key(object, property), value);
    }

    pub fn property_value(&self, object: &str, property: &str) -> Option<Value> {
        mutex_lock_or_recover(&self.properties)
            .get(&property_key(object, property))
            .cloned()
    }

    pub fn set_default_response(&mut self, response: Value) {
        self.default_response = response;
    }

    pub fn get_calls(&self) -> Vec<(String, Option<Value>)> {
        mutex_lock_or_recover(&self.calls).clone()
    }

    pub fn call_count(&self, method: &str) -> usize {
        mutex_lock_or_recover(&self.calls)
            .iter()
            .filter(|(m, _)| m == method)
            .count()
    }

    pub fn total_calls(&self) -> usize {
        mutex_lock_or_recover(&self.calls).len()
    }

    pub fn last_call(&self, method: &str) -> Option<(String, Option<Value>)> {
        mutex_lock_or_recover(&self.calls)
            .iter()
            .rev()
            .find(|(m, _)| m == method)
            .cloned()
    }

    pub fn params_for(&self, method: &str) -> Vec<Option<Value>> {
        mutex_lock_or_recover(&self.calls)
            .iter()
            .filter(|(m, _)| m == method)
            .map(|(_, p)| p.clone())
            .collect()
    }

    /// Names of the methods called, in call order.
    pub fn method_log(&self) -> Vec<String> {
        mutex_lock_or_recover(&self.calls)
            .iter()
            .map(|(m, _)| m.clone())
            .collect()
    }

    pub fn clear_calls(&mut self) {
        mutex_lock_or_recover(&self.calls).clear();
    }

    pub fn reset(&mut self) {
        self.clear_calls();
        mutex_lock_or_recover(&self.replies).clear();
        mutex_lock_or_recover(&self.queued).clear();
        mutex_lock_or_recover(&self.handlers).clear();
        mutex_lock_or_recover(&self.properties).clear();
    }

    fn record(&self, method: &str, params: Option<Value>) {
        mutex_lock_or_recover(&self.calls).push((method.to_string(), params));
    }

    fn missing(&self, what: &str) -> Result<Value, RemoteError> {
        if self.error_on_missing {
            Err(RemoteError::rpc(
                error_codes::METHOD_NOT_FOUND,
                format!("No mock reply configured for '{}'", what),
            ))
        } else {
            Ok(self.default_response.clone())
        }
    }

    fn resolve(&self, method: &str, params: Option<&Value>) -> Result<Value, RemoteError> {
        let queued = mutex_lock_or_recover(&self.queued)
            .get_mut(method)
            .and_then(VecDeque::pop_front);
        if let Some(reply) = queued {
            return reply.into_result();
        }

        let handler = mutex_lock_or_recover(&self.handlers).get(method).cloned();
        if let Some(handler) = handler {
            return handler(params);
        }

        let reply = mutex_lock_or_recover(&self.replies).get(method).cloned();
        match reply {
            Some(reply) => reply.into_result(),
            None => self.missing(method),
        }
    }
}

impl RemoteHandle for MockHandle {
    fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, RemoteError> {
        self.record(method, params.clone());
        self.resolve(method, params.as_ref())
    }

    fn get_property(&mut self, object: &str, property: &str) -> Result<Value, RemoteError> {
        let params = json!({ "object": object, "property": property });
        self.record(GET_PROPERTY, Some(params.clone()));

        let key = property_key(object, property);
        let stored = mutex_lock_or_recover(&self.properties).get(&key).cloned();
        match stored {
            Some(value) => Ok(value),
            None => match self.resolve(GET_PROPERTY, Some(&params)) {
                Err(RemoteError::Rpc { code, .. }) if code == error_codes::METHOD_NOT_FOUND => {
                    self.missing(&key)
                }
                other => other,
            },
        }
    }

    fn set_property(
        &mut self,
        object: &str,
        property: &str,
        value: Value,
    ) -> Result<(), RemoteError> {
        let params = json!({ "object": object, "property": property, "value": value.clone() });
        self.record(SET_PROPERTY, Some(params.clone()));

        let has_script = mutex_lock_or_recover(&self.queued)
            .get(SET_PROPERTY)
            .is_some_and(|q| !q.is_empty())
            || mutex_lock_or_recover(&self.handlers).contains_key(SET_PROPERTY)
            || mutex_lock_or_recover(&self.replies).contains_key(SET_PROPERTY);
        if has_script {
            self.resolve(SET_PROPERTY, Some(&params))?;
        }

        mutex_lock_or_recover(&self.properties).insert(property_key(object, property), value);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_handle_returns_configured_response() {
        let mut mock = MockHandle::new();
        mock.set_response("DisplayWindowNames", json!(["W", "W2"]));

        let result = mock.call("DisplayWindowNames", None).unwrap();
        assert_eq!(result, json!(["W", "W2"]));
    }

    #[test]
    fn test_mock_handle_tracks_calls() {
        let mut mock = MockHandle::new();
        mock.call("DisplayWindowNames", None).unwrap();
        mock.call("AddDisplayWindow", Some(json!({"name": "W"})))
            .unwrap();
        mock.call("DisplayWindowNames", None).unwrap();

        assert_eq!(mock.call_count("DisplayWindowNames"), 2);
        assert_eq!(mock.call_count("AddDisplayWindow"), 1);
        assert_eq!(mock.total_calls(), 3);
        assert_eq!(
            mock.params_for("AddDisplayWindow"),
            vec![Some(json!({"name": "W"}))]
        );
    }

    #[test]
    fn test_mock_handle_default_is_null() {
        let mut mock = MockHandle::new();
        assert_eq!(mock.call("Anything", None).unwrap(), Value::Null);
    }

    #[test]
    fn test_mock_handle_strict_mode_errors_on_missing() {
        let mut mock = MockHandle::new_strict();
        let err = mock.call("Unconfigured", None).unwrap_err();
        assert_eq!(err.code(), error_codes::METHOD_NOT_FOUND);

        let err = mock.get_property("Acq", "IsAcquiring").unwrap_err();
        assert!(err.to_string().contains("Acq.IsAcquiring"));
    }

    #[test]
    fn test_mock_handle_queued_replies_are_fifo_then_fall_back() {
        let mut mock = MockHandle::new();
        mock.set_response("AddDisplayWindow", json!("fixed"));
        mock.push_response("AddDisplayWindow", json!("first"));
        mock.push_reply(
            "AddDisplayWindow",
            MockReply::Error {
                code: error_codes::REMOTE_REJECTED,
                message: "no".to_string(),
            },
        );

        assert_eq!(mock.call("AddDisplayWindow", None).unwrap(), json!("first"));
        assert!(mock.call("AddDisplayWindow", None).is_err());
        assert_eq!(mock.call("AddDisplayWindow", None).unwrap(), json!("fixed"));
    }

    #[test]
    fn test_mock_handle_handler_sees_params() {
        let mut mock = MockHandle::new();
        mock.set_handler("AddDisplayWindow", |params| {
            let name = params
                .and_then(|p| p.get("name"))
                .and_then(Value::as_str)
                .unwrap_or_default();
            Ok(json!(format!("{}-remote", name)))
        });

        let result = mock
            .call("AddDisplayWindow", Some(json!({"name": "W"})))
            .unwrap();
        assert_eq!(result, json!("W-remote"));
    }

    #[test]
    fn test_mock_handle_set_error() {
        let mut mock = MockHandle::new();
        mock.set_error("SelectSetup", error_codes::SETUP_NOT_FOUND, "missing");
        let err = mock.call("SelectSetup", None).unwrap_err();
        assert_eq!(err.code(), error_codes::SETUP_NOT_FOUND);
    }

    #[test]
    fn test_mock_handle_property_write_then_read() {
        let mut mock = MockHandle::new_strict();
        mock.set_property("Ccd", "IntegrationTime", json!(0.5))
            .unwrap();
        let value = mock.get_property("Ccd", "IntegrationTime").unwrap();
        assert_eq!(value, json!(0.5));
        assert_eq!(mock.call_count(SET_PROPERTY), 1);
        assert_eq!(mock.call_count(GET_PROPERTY), 1);
    }

    #[test]
    fn test_mock_handle_scripted_property_write_can_fail() {
        let mut mock = MockHandle::new();
        mock.set_error(SET_PROPERTY, error_codes::OUT_OF_RANGE, "too long");
        assert!(mock.set_property("Ccd", "IntegrationTime", json!(99.0)).is_err());
        assert_eq!(mock.property_value("Ccd", "IntegrationTime"), None);
    }

    #[test]
    fn test_mock_handle_clones_share_state() {
        let mock = MockHandle::new();
        let mut handed_out = mock.clone();
        handed_out.call("Start", None).unwrap();
        assert_eq!(mock.call_count("Start"), 1);
        assert_eq!(mock.method_log(), vec!["Start".to_string()]);
    }

    #[test]
    fn test_mock_handle_reset() {
        let mut mock = MockHandle::new();
        mock.set_response("Start", json!(true));
        mock.call("Start", None).unwrap();
        mock.reset();
        assert_eq!(mock.total_calls(), 0);
        assert_eq!(mock.call("Start", None).unwrap(), Value::Null);
    }
}
