//! HTTP transport used by [`SoapClient`](crate::SoapClient).
//!
//! The client only needs one operation: send a fully built request, get the
//! response back with its body read into a `String`. Timeouts, TLS, proxies
//! and retries are the transport's business.

use std::sync::Arc;
use std::time::Duration;

use ureq::Agent;
use ureq::http::{Request, Response};

use crate::error::TransportError;

/// Timeout used when no configuration is given.
pub const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// One HTTP round trip.
///
/// Any status code must be returned as a response: HTTP 500 SOAP faults are
/// decoded by the client. Only connection-level failures are errors.
pub trait Transport {
    fn round_trip(&self, request: Request<String>) -> Result<Response<String>, TransportError>;
}

impl<T: Transport + ?Sized> Transport for &T {
    fn round_trip(&self, request: Request<String>) -> Result<Response<String>, TransportError> {
        (**self).round_trip(request)
    }
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn round_trip(&self, request: Request<String>) -> Result<Response<String>, TransportError> {
        (**self).round_trip(request)
    }
}

impl<T: Transport + ?Sized> Transport for Arc<T> {
    fn round_trip(&self, request: Request<String>) -> Result<Response<String>, TransportError> {
        (**self).round_trip(request)
    }
}

/// Blocking transport backed by a [`ureq::Agent`].
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: Agent,
}

impl UreqTransport {
    pub fn new(timeout: Duration) -> Self {
        // 4xx/5xx must not become Error::StatusCode, the body of an
        // HTTP 500 SOAP Fault is still needed.
        let config = Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build();

        Self {
            agent: config.into(),
        }
    }

    /// Wraps an existing agent. It should be configured with
    /// `http_status_as_error(false)`, otherwise error statuses surface as
    /// [`TransportError::Http`].
    pub fn with_agent(agent: Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(DEFAULT_HTTP_TIMEOUT)
    }
}

impl Transport for UreqTransport {
    fn round_trip(&self, request: Request<String>) -> Result<Response<String>, TransportError> {
        let response = self.agent.run(request)?;
        let (parts, mut body) = response.into_parts();
        let text = body.read_to_string()?;
        Ok(Response::from_parts(parts, text))
    }
}
