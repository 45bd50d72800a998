use serde_json::Value;
use serde_json::json;

use crate::error::RemoteError;

pub const GET_PROPERTY: &str = "GetProperty";
pub const SET_PROPERTY: &str = "SetProperty";

/// Capability to invoke named methods on the software server and read or
/// write remote object properties.
///
/// Calls are synchronous and block until the server answers. Each call is
/// one request/response exchange; there is no batching and no retry.
pub trait RemoteHandle: Send {
    fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, RemoteError>;

    fn get_property(&mut self, object: &str, property: &str) -> Result<Value, RemoteError> {
        self.call(
            GET_PROPERTY,
            Some(json!({ "object": object, "property": property })),
        )
    }

    fn set_property(
        &mut self,
        object: &str,
        property: &str,
        value: Value,
    ) -> Result<(), RemoteError> {
        self.call(
            SET_PROPERTY,
            Some(json!({ "object": object, "property": property, "value": value })),
        )
        .map(|_| ())
    }
}

impl<H: RemoteHandle + ?Sized> RemoteHandle for Box<H> {
    fn call(&mut self, method: &str, params: Option<Value>) -> Result<Value, RemoteError> {
        (**self).call(method, params)
    }

    fn get_property(&mut self, object: &str, property: &str) -> Result<Value, RemoteError> {
        (**self).get_property(object, property)
    }

    fn set_property(
        &mut self,
        object: &str,
        property: &str,
        value: Value,
    ) -> Result<(), RemoteError> {
        (**self).set_property(object, property, value)
    }
}
