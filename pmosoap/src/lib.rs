//! # pmosoap - Client d'actions SOAP
//!
//! Invokes a SOAP action (UPnP control style) on an HTTP endpoint:
//!
//! 1. the input value is turned into ordered `(tag, value)` pairs
//!    ([`resolve_fields`]);
//! 2. the pairs are wrapped in a SOAP 1.1 envelope ([`build_soap_request`]);
//! 3. the envelope is POSTed through a [`Transport`] with the `SOAPAction`
//!    header;
//! 4. the `{action}Response` element is decoded and its children are copied
//!    into the output value by name ([`decode_action_response`]).
//!
//! Inputs and outputs are plain structs deriving [`bevy_reflect::Reflect`].
//! Field order is the declaration order; a field can carry another XML tag
//! with `#[reflect(@SoapTag::new("..."))]`.
//!
//! ## Example
//!
//! ```ignore
//! use bevy_reflect::Reflect;
//! use pmosoap::{SoapClient, SoapTag};
//! use url::Url;
//!
//! #[derive(Reflect)]
//! struct GetVolume {
//!     #[reflect(@SoapTag::new("InstanceID"))]
//!     instance_id: u32,
//!     #[reflect(@SoapTag::new("Channel"))]
//!     channel: String,
//! }
//!
//! #[derive(Reflect, Default)]
//! struct Volume {
//!     #[reflect(@SoapTag::new("CurrentVolume"))]
//!     current: u16,
//! }
//!
//! let client = SoapClient::new(Url::parse("http://192.168.1.20:49152/ctl/RenderingControl")?);
//! let mut volume = Volume::default();
//! client.perform_action(
//!     "urn:schemas-upnp-org:service:RenderingControl:1",
//!     "GetVolume",
//!     &GetVolume { instance_id: 0, channel: "Master".into() },
//!     &mut volume,
//! )?;
//! ```

pub mod client;
pub mod config;
pub mod decoder;
pub mod envelope;
pub mod error;
pub mod escape;
pub mod fields;
pub mod transport;

pub use client::SoapClient;
pub use config::ClientConfig;
pub use decoder::{
    ActionResponse, SoapFault, UpnpError, assign_output, decode_action_response, find_fault,
    parse_action_response,
};
pub use envelope::{ActionRequest, SOAP_PREFIX, SOAP_SUFFIX, build_soap_request};
pub use error::{SoapError, TransportError};
pub use escape::escape_xml_text;
pub use fields::{FieldDescriptor, SoapTag, resolve_fields};
pub use transport::{Transport, UreqTransport};
