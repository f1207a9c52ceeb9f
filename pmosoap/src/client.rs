use bevy_reflect::PartialReflect;
use tracing::{debug, trace};
use ureq::http::header::CONTENT_TYPE;
use ureq::http::{Method, Request};
use url::Url;

use crate::config::ClientConfig;
use crate::decoder::{
    ActionResponse, assign_output, ensure_output_target, find_fault, parse_action_response,
};
use crate::envelope::ActionRequest;
use crate::error::SoapError;
use crate::fields::{FieldDescriptor, resolve_fields};
use crate::transport::{Transport, UreqTransport};

pub const SOAP_CONTENT_TYPE: &str = r#"text/xml; charset="utf-8""#;
pub const SOAP_ACTION_HEADER: &str = "SOAPAction";

/// SOAP client bound to one control endpoint.
///
/// The client holds no per-call state: it can be shared between threads as
/// long as its transport can.
#[derive(Debug, Clone)]
pub struct SoapClient<T = UreqTransport> {
    endpoint: Url,
    transport: T,
    body_excerpt_len: usize,
}

impl SoapClient<UreqTransport> {
    pub fn new(endpoint: Url) -> Self {
        Self::from_config(endpoint, &ClientConfig::default())
    }

    pub fn from_config(endpoint: Url, config: &ClientConfig) -> Self {
        Self {
            endpoint,
            transport: UreqTransport::new(config.timeout()),
            body_excerpt_len: config.body_excerpt_len,
        }
    }
}

impl<T: Transport> SoapClient<T> {
    pub fn with_transport(endpoint: Url, transport: T) -> Self {
        Self {
            endpoint,
            transport,
            body_excerpt_len: ClientConfig::default().body_excerpt_len,
        }
    }

    /// Maximum number of characters of an error body kept in
    /// [`SoapError::RemoteHttp`].
    pub fn with_body_excerpt_len(mut self, len: usize) -> Self {
        self.body_excerpt_len = len;
        self
    }

    pub fn endpoint(&self) -> &Url {
        &self.endpoint
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Invokes `action` and copies the response values into `output`.
    ///
    /// `input` is a struct deriving `Reflect`, a string-keyed map or a list of
    /// `(tag, value)` pairs; `output` is a struct or a `HashMap<String, String>`.
    /// Both are checked before anything is sent. Exactly one request is sent
    /// per call.
    ///
    /// ```ignore
    /// let mut volume = GetVolumeOut::default();
    /// client.perform_action(
    ///     "urn:schemas-upnp-org:service:RenderingControl:1",
    ///     "GetVolume",
    ///     &GetVolumeIn { instance_id: 0, channel: "Master".into() },
    ///     &mut volume,
    /// )?;
    /// ```
    pub fn perform_action(
        &self,
        namespace: &str,
        action: &str,
        input: &dyn PartialReflect,
        output: &mut dyn PartialReflect,
    ) -> Result<(), SoapError> {
        let fields = resolve_fields(input)?;
        ensure_output_target(output)?;

        let response = self.call(&ActionRequest::new(namespace, action, fields))?;
        assign_output(output, &response.values)
    }

    /// Invokes `action` with ordered `(name, value)` arguments and returns
    /// the decoded response.
    pub fn invoke_action(
        &self,
        namespace: &str,
        action: &str,
        args: &[(&str, &str)],
    ) -> Result<ActionResponse, SoapError> {
        let fields = args
            .iter()
            .map(|(name, value)| FieldDescriptor::new(*name, *value))
            .collect::<Result<Vec<_>, _>>()?;

        self.call(&ActionRequest::new(namespace, action, fields))
    }

    /// Sends `request` and decodes the response element.
    pub fn call(&self, request: &ActionRequest) -> Result<ActionResponse, SoapError> {
        let http_request = self.http_request(request)?;

        debug!(endpoint = %self.endpoint, action = %request.action, "Sending SOAP action");
        let response = self.transport.round_trip(http_request)?;

        let status = response.status();
        debug!(action = %request.action, %status, "SOAP response received");

        if !status.is_success() {
            let body = response.body();
            return Err(SoapError::RemoteHttp {
                action: request.action.clone(),
                status,
                body: excerpt(body, self.body_excerpt_len),
                fault: find_fault(body.as_bytes()),
            });
        }

        let decoded = parse_action_response(response.body().as_bytes(), &request.action)?;
        trace!(action = %request.action, values = ?decoded.values, "SOAP response decoded");
        Ok(decoded)
    }

    /// HTTP request carrying `request`: POST to the endpoint with the SOAP
    /// headers and the envelope as body.
    pub fn http_request(&self, request: &ActionRequest) -> Result<Request<String>, SoapError> {
        let body = request.to_xml();
        trace!(%body, "SOAP request envelope");

        let http_request = Request::builder()
            .method(Method::POST)
            .uri(self.endpoint.as_str())
            .header(CONTENT_TYPE, SOAP_CONTENT_TYPE)
            .header(SOAP_ACTION_HEADER, request.soap_action_header())
            .body(body)?;

        Ok(http_request)
    }
}

fn excerpt(body: &str, max_chars: usize) -> String {
    match body.char_indices().nth(max_chars) {
        Some((end, _)) => format!("{}...", &body[..end]),
        None => body.to_string(),
    }
}
