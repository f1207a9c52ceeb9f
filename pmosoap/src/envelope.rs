//! Construction des requêtes SOAP

use std::fmt::Write;

use crate::escape::escape_xml_text;
use crate::fields::FieldDescriptor;

pub const SOAP_ENVELOPE_NS: &str = "http://schemas.xmlsoap.org/soap/envelope/";
pub const SOAP_ENCODING_STYLE: &str = "http://schemas.xmlsoap.org/soap/encoding/";

/// Everything before the action element, document declaration included.
pub const SOAP_PREFIX: &str = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
<s:Envelope xmlns:s=\"http://schemas.xmlsoap.org/soap/envelope/\" \
s:encodingStyle=\"http://schemas.xmlsoap.org/soap/encoding/\"><s:Body>";

/// Everything after the action element.
pub const SOAP_SUFFIX: &str = "</s:Body></s:Envelope>";

/// A fully resolved action call, ready to be serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionRequest {
    pub namespace: String,
    pub action: String,
    pub fields: Vec<FieldDescriptor>,
}

impl ActionRequest {
    pub fn new(
        namespace: impl Into<String>,
        action: impl Into<String>,
        fields: Vec<FieldDescriptor>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            action: action.into(),
            fields,
        }
    }

    /// Value of the `SOAPAction` HTTP header: `"namespace#action"`, quotes included.
    pub fn soap_action_header(&self) -> String {
        format!(r#""{}#{}""#, self.namespace, self.action)
    }

    pub fn to_xml(&self) -> String {
        build_soap_request(&self.namespace, &self.action, &self.fields)
    }
}

/// Builds the SOAP 1.1 request envelope for `action`.
///
/// `namespace` and `action` are inserted verbatim, field values are escaped.
/// The output is deterministic and carries no indentation, so it can be
/// compared byte for byte.
pub fn build_soap_request(namespace: &str, action: &str, fields: &[FieldDescriptor]) -> String {
    let mut xml = String::with_capacity(
        SOAP_PREFIX.len() + SOAP_SUFFIX.len() + 2 * action.len() + namespace.len() + 32,
    );

    xml.push_str(SOAP_PREFIX);
    let _ = write!(&mut xml, r#"<u:{action} xmlns:u="{namespace}">"#);
    for field in fields {
        let tag = field.tag_name();
        let _ = write!(
            &mut xml,
            "<{tag}>{}</{tag}>",
            escape_xml_text(field.raw_value())
        );
    }
    let _ = write!(&mut xml, "</u:{action}>");
    xml.push_str(SOAP_SUFFIX);

    xml
}

#[cfg(test)]
mod tests {
    use super::*;

    fn field(tag: &str, value: &str) -> FieldDescriptor {
        FieldDescriptor::new(tag, value).unwrap()
    }

    #[test]
    fn test_prefix_declares_envelope_namespaces() {
        assert!(SOAP_PREFIX.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<s:Envelope "));
        assert!(SOAP_PREFIX.contains(&format!("xmlns:s=\"{SOAP_ENVELOPE_NS}\"")));
        assert!(SOAP_PREFIX.contains(&format!("s:encodingStyle=\"{SOAP_ENCODING_STYLE}\"")));
        assert!(SOAP_PREFIX.ends_with("><s:Body>"));
    }

    #[test]
    fn test_build_request() {
        let fields = vec![
            field("Foo", "foo"),
            field("bar", "bar"),
            field("Baz", "quoted=\"baz\""),
        ];
        let xml = build_soap_request("mynamespace", "myaction", &fields);
        assert_eq!(
            xml,
            format!(
                "{SOAP_PREFIX}<u:myaction xmlns:u=\"mynamespace\">\
                 <Foo>foo</Foo><bar>bar</bar><Baz>quoted=\"baz\"</Baz>\
                 </u:myaction>{SOAP_SUFFIX}"
            )
        );
    }

    #[test]
    fn test_build_request_escapes_values() {
        let fields = vec![field("CurrentURIMetaData", "<DIDL-Lite>&amp;</DIDL-Lite>")];
        let xml = build_soap_request("urn:schemas-upnp-org:service:AVTransport:1", "SetAVTransportURI", &fields);
        assert!(xml.contains(
            "<CurrentURIMetaData>&lt;DIDL-Lite&gt;&amp;amp;&lt;/DIDL-Lite&gt;</CurrentURIMetaData>"
        ));
    }

    #[test]
    fn test_build_request_without_fields() {
        let xml = build_soap_request("urn:schemas-upnp-org:service:AVTransport:1", "Stop", &[]);
        assert_eq!(
            xml,
            format!(
                "{SOAP_PREFIX}<u:Stop xmlns:u=\"urn:schemas-upnp-org:service:AVTransport:1\"></u:Stop>{SOAP_SUFFIX}"
            )
        );
    }

    #[test]
    fn test_action_request() {
        let request = ActionRequest::new(
            "urn:schemas-upnp-org:service:RenderingControl:1",
            "GetVolume",
            vec![field("InstanceID", "0"), field("Channel", "Master")],
        );
        assert_eq!(
            request.soap_action_header(),
            "\"urn:schemas-upnp-org:service:RenderingControl:1#GetVolume\""
        );
        assert_eq!(
            request.to_xml(),
            build_soap_request(&request.namespace, &request.action, &request.fields)
        );
        assert_eq!(request.to_xml(), request.to_xml());
    }
}
