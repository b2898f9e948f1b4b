use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::Value;

use aws_cognito_auth::{Action, CognitoError, IdpDispatcher};

/// A scripted stand-in for the identity provider.
///
/// Responses are queued ahead of time and handed out in order; every request
/// is recorded so tests can assert on the exact wire bodies.
#[derive(Default)]
pub struct ScriptedIdp {
    responses: Mutex<VecDeque<Result<Value, CognitoError>>>,
    requests: Mutex<Vec<(Action, Value)>>,
}

impl ScriptedIdp {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a successful JSON response.
    pub fn respond(&self, response: Value) {
        self.responses.lock().unwrap().push_back(Ok(response));
    }

    /// Queue a structured service error, the way the HTTP transport would
    /// surface a `{__type, message}` body.
    pub fn fail(&self, kind: &str, message: &str) {
        let error = if kind == "NotAuthorizedException" {
            CognitoError::NotAuthorized(message.to_string())
        } else {
            CognitoError::Service {
                kind: kind.to_string(),
                message: message.to_string(),
            }
        };

        self.responses.lock().unwrap().push_back(Err(error));
    }

    /// Every request dispatched so far, in order.
    pub fn requests(&self) -> Vec<(Action, Value)> {
        self.requests.lock().unwrap().clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

#[async_trait]
impl IdpDispatcher for ScriptedIdp {
    async fn dispatch(&self, action: Action, body: Value) -> Result<Value, CognitoError> {
        self.requests.lock().unwrap().push((action, body));

        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| panic!("no scripted response left for {action:?}"))
    }
}
