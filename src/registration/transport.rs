//! HTTP transport towards the registration service.

use std::cell::RefCell;
use std::collections::VecDeque;
use std::fmt;
use std::rc::Rc;

use reqwest::blocking::Client;
use reqwest::Method;
use serde_json::Value;
use tracing::debug;

use crate::error::CharmError;

/// Request methods used by the registration client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

/// Status and body of a registry response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryResponse {
    pub status: u16,
    pub text: String,
}

impl RegistryResponse {
    pub fn new(status: u16, text: impl Into<String>) -> Self {
        Self {
            status,
            text: text.into(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == 200
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Sends one request to the registry.
///
/// `body` is JSON encoded into the request body when present. `token` goes
/// into the `AuthToken` header.
pub trait Transport {
    fn send(
        &mut self,
        method: HttpMethod,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<RegistryResponse, CharmError>;
}

/// Blocking reqwest transport.
#[derive(Debug, Default)]
pub struct HttpTransport {
    client: Client,
}

impl HttpTransport {
    pub fn new() -> Self {
        Self { client: Client::new() }
    }
}

impl Transport for HttpTransport {
    fn send(
        &mut self,
        method: HttpMethod,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<RegistryResponse, CharmError> {
        let reqwest_method = match method {
            HttpMethod::Get => Method::GET,
            HttpMethod::Post => Method::POST,
            HttpMethod::Put => Method::PUT,
            HttpMethod::Delete => Method::DELETE,
        };

        debug!(method = %method, url = %url, "Sending registry request");

        let mut request = self.client.request(reqwest_method, url).header("AuthToken", token);
        if let Some(body) = body {
            request = request.body(serde_json::to_string(body)?);
        }

        let transport_error = |e: reqwest::Error| CharmError::Registration {
            action: method.to_string(),
            target: url.to_string(),
            status: 0,
            body: e.to_string(),
        };

        let response = request.send().map_err(transport_error)?;
        let status = response.status().as_u16();
        let text = response.text().map_err(transport_error)?;

        debug!(method = %method, url = %url, status = status, "Registry responded");
        Ok(RegistryResponse { status, text })
    }
}

/// A request captured by [`ScriptedTransport`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub token: String,
    pub body: Option<Value>,
}

#[derive(Debug, Default)]
struct Script {
    responses: VecDeque<RegistryResponse>,
    requests: Vec<RecordedRequest>,
}

/// In-memory transport answering from a queue of canned responses.
///
/// Clones share the queue and the request log, so a test can keep a handle
/// after moving the transport into a client. An exhausted queue answers
/// `599` so unexpected requests fail loudly.
#[derive(Debug, Clone, Default)]
pub struct ScriptedTransport {
    script: Rc<RefCell<Script>>,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a response.
    pub fn respond(&self, status: u16, text: &str) -> &Self {
        self.script
            .borrow_mut()
            .responses
            .push_back(RegistryResponse::new(status, text));
        self
    }

    /// Requests sent so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.script.borrow().requests.clone()
    }

    /// Methods of the requests sent so far.
    pub fn methods(&self) -> Vec<HttpMethod> {
        self.script.borrow().requests.iter().map(|r| r.method).collect()
    }

    pub fn clear(&self) {
        let mut script = self.script.borrow_mut();
        script.requests.clear();
        script.responses.clear();
    }
}

impl Transport for ScriptedTransport {
    fn send(
        &mut self,
        method: HttpMethod,
        url: &str,
        token: &str,
        body: Option<&Value>,
    ) -> Result<RegistryResponse, CharmError> {
        let mut script = self.script.borrow_mut();
        script.requests.push(RecordedRequest {
            method,
            url: url.to_string(),
            token: token.to_string(),
            body: body.cloned(),
        });
        Ok(script
            .responses
            .pop_front()
            .unwrap_or_else(|| RegistryResponse::new(599, "no scripted response")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_status_classes() {
        assert!(RegistryResponse::new(200, "").is_ok());
        assert!(!RegistryResponse::new(201, "").is_ok());
        assert!(RegistryResponse::new(201, "").is_success());
        assert!(!RegistryResponse::new(300, "").is_success());
        assert!(!RegistryResponse::new(199, "").is_success());
    }

    #[test]
    fn test_scripted_transport_records_and_answers() {
        let transport = ScriptedTransport::new();
        transport.respond(200, "null");

        let mut sender = transport.clone();
        let first = sender
            .send(HttpMethod::Get, "http://registry/targets/a:1", "abc", None)
            .unwrap();
        let second = sender
            .send(HttpMethod::Delete, "http://registry/targets/a:1", "abc", Some(&serde_json::json!({})))
            .unwrap();

        assert_eq!(first, RegistryResponse::new(200, "null"));
        assert_eq!(second.status, 599);
        assert_eq!(transport.methods(), vec![HttpMethod::Get, HttpMethod::Delete]);
        assert_eq!(transport.requests()[1].body, Some(serde_json::json!({})));
    }

    #[test]
    fn test_method_display() {
        assert_eq!(HttpMethod::Get.to_string(), "GET");
        assert_eq!(HttpMethod::Delete.to_string(), "DELETE");
    }
}
