//! Error types for SOAP action invocation.

use thiserror::Error;
use ureq::http::StatusCode;

use crate::decoder::SoapFault;

/// Failure reported by a [`Transport`](crate::transport::Transport).
///
/// Surfaced unchanged by [`SoapClient`](crate::SoapClient), never retried.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("HTTP transport error: {0}")]
    Http(#[from] ureq::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

#[derive(Error, Debug)]
pub enum SoapError {
    #[error(
        "unsupported input kind {0}: expected a struct, a string-keyed map or a list of (tag, value) pairs"
    )]
    UnsupportedInputKind(String),

    #[error("unsupported output kind {0}: expected a struct or a string-keyed map")]
    UnsupportedOutputKind(String),

    #[error("field {field} has unsupported type {type_path}")]
    UnsupportedFieldValue { field: String, type_path: String },

    #[error("invalid XML tag name {0:?}")]
    InvalidTagName(String),

    #[error("cannot build HTTP request: {0}")]
    Request(#[from] ureq::http::Error),

    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error("{action} failed with HTTP status {status} and body: {body}")]
    RemoteHttp {
        action: String,
        status: StatusCode,
        body: String,
        fault: Option<SoapFault>,
    },

    #[error("malformed XML in SOAP response: {0}")]
    MalformedXml(#[from] xmltree::ParseError),

    #[error("unexpected SOAP response structure: {0}")]
    UnexpectedStructure(String),

    #[error("{action} returned SOAP fault: {fault}")]
    RemoteFault { action: String, fault: SoapFault },

    #[error("invalid value {value:?} for output field {field}")]
    InvalidOutputValue { field: String, value: String },
}

impl SoapError {
    pub(crate) fn unsupported_field(field: &str, type_path: &str) -> Self {
        SoapError::UnsupportedFieldValue {
            field: field.to_string(),
            type_path: type_path.to_string(),
        }
    }

    pub(crate) fn unexpected_structure(message: impl Into<String>) -> Self {
        SoapError::UnexpectedStructure(message.into())
    }

    /// The SOAP fault carried by this error, if the remote party sent one.
    pub fn fault(&self) -> Option<&SoapFault> {
        match self {
            SoapError::RemoteFault { fault, .. } => Some(fault),
            SoapError::RemoteHttp { fault, .. } => fault.as_ref(),
            _ => None,
        }
    }
}
