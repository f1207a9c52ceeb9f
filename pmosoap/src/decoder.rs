//! Décodage des réponses SOAP.
//!
//! Elements are matched by local name only: `xmltree` strips the prefix, so a
//! response using `u:`, `m:` or no prefix at all decodes the same way.

use std::fmt;

use bevy_reflect::{Map, PartialReflect, ReflectMut, ReflectRef, Struct, TypeInfo};
use tracing::trace;
use xmltree::{Element, ParserConfig, XMLNode};

use crate::error::SoapError;
use crate::fields::{struct_info, tag_at};

/// Decoded `<u:{action}Response>` element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActionResponse {
    /// Local name of the response element (ex: "GetVolumeResponse")
    pub name: String,

    /// Namespace URI bound to the response element, if any
    pub namespace: Option<String>,

    /// Child elements as `(local name, text)`, in document order
    pub values: Vec<(String, String)>,
}

impl ActionResponse {
    /// First value carried by the element `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.values
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }
}

/// SOAP Fault returned by the remote party.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SoapFault {
    /// Fault code (ex: "s:Client")
    pub fault_code: String,

    /// Human readable description
    pub fault_string: String,

    /// UPnP detail, when the fault carries a `UPnPError` element
    pub upnp_error: Option<UpnpError>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpnpError {
    pub error_code: u32,
    pub error_description: String,
}

impl fmt::Display for SoapFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.fault_code, self.fault_string)?;
        if let Some(err) = &self.upnp_error {
            write!(f, " (UPnP error {}: {})", err.error_code, err.error_description)?;
        }
        Ok(())
    }
}

/// Parses `body` and returns the response element of `action`.
///
/// A Body whose first element is a `Fault` yields [`SoapError::RemoteFault`].
/// Every child of the response element must be a leaf: one carrying elements
/// yields [`SoapError::UnexpectedStructure`].
pub fn parse_action_response(body: &[u8], action: &str) -> Result<ActionResponse, SoapError> {
    let envelope = parse_envelope(body)?;
    let soap_body = soap_body(&envelope)?;

    if let Some(fault) = leading_fault(soap_body) {
        return Err(SoapError::RemoteFault {
            action: action.to_string(),
            fault: parse_fault(fault),
        });
    }

    let expected = format!("{action}Response");
    let response = find_child(soap_body, &expected).ok_or_else(|| {
        SoapError::unexpected_structure(format!("missing {expected} element in SOAP Body"))
    })?;

    let values = child_elements(response)
        .map(leaf_value)
        .collect::<Result<Vec<_>, _>>()?;

    Ok(ActionResponse {
        name: response.name.clone(),
        namespace: response.namespace.clone(),
        values,
    })
}

/// Extracts the SOAP Fault from an error body, if it carries one.
pub fn find_fault(body: &[u8]) -> Option<SoapFault> {
    let envelope = parse_envelope(body).ok()?;
    let soap_body = soap_body(&envelope).ok()?;
    leading_fault(soap_body).map(parse_fault)
}

/// Parses `body` and copies the values of the `action` response into `output`.
///
/// On error `output` may already hold some of the values: fields are written
/// one after the other, in document order.
pub fn decode_action_response(
    body: &[u8],
    action: &str,
    output: &mut dyn PartialReflect,
) -> Result<(), SoapError> {
    let response = parse_action_response(body, action)?;
    assign_output(output, &response.values)
}

/// Checks that `output` can receive decoded values.
pub fn ensure_output_target(output: &dyn PartialReflect) -> Result<(), SoapError> {
    let supported = match output.reflect_ref() {
        ReflectRef::Struct(_) => true,
        ReflectRef::Map(_) => match output.get_represented_type_info() {
            Some(TypeInfo::Map(info)) => {
                info.key_ty().is::<String>() && info.value_ty().is::<String>()
            }
            Some(_) => false,
            None => true,
        },
        _ => false,
    };

    if supported {
        Ok(())
    } else {
        Err(SoapError::UnsupportedOutputKind(
            output.reflect_type_path().to_string(),
        ))
    }
}

/// Writes `values` into `output`.
///
/// Struct fields are matched by [`SoapTag`](crate::SoapTag) or field name;
/// elements without a matching field are skipped and fields without a
/// matching element keep their value. A map receives every element.
pub fn assign_output(
    output: &mut dyn PartialReflect,
    values: &[(String, String)],
) -> Result<(), SoapError> {
    ensure_output_target(output)?;

    match output.reflect_mut() {
        ReflectMut::Struct(record) => {
            for (name, value) in values {
                assign_field(record, name, value)?;
            }
        }
        ReflectMut::Map(mapping) => {
            for (name, value) in values {
                insert_entry(mapping, name, value);
            }
        }
        _ => {}
    }

    Ok(())
}

fn assign_field(record: &mut dyn Struct, name: &str, value: &str) -> Result<(), SoapError> {
    let index = {
        let view: &dyn Struct = &*record;
        let info = struct_info(view);
        (0..view.field_len()).find(|&i| tag_at(view, info, i) == Some(name))
    };

    let Some(index) = index else {
        trace!(element = name, "no output field for response element");
        return Ok(());
    };
    let Some(slot) = record.field_at_mut(index) else {
        return Ok(());
    };

    trace!(field = name, value, "assigning output field");
    set_slot(slot, name, value)
}

fn insert_entry(mapping: &mut dyn Map, name: &str, value: &str) {
    mapping.insert_boxed(Box::new(name.to_string()), Box::new(value.to_string()));
}

macro_rules! parse_scalars {
    ($slot:ident, $field:expr, $value:expr, $($ty:ty),+ $(,)?) => {
        $(
            if let Some(slot) = $slot.try_downcast_mut::<$ty>() {
                *slot = $value
                    .trim()
                    .parse::<$ty>()
                    .map_err(|_| invalid_value($field, $value))?;
                return Ok(());
            }
        )+
    };
}

fn set_slot(slot: &mut dyn PartialReflect, field: &str, value: &str) -> Result<(), SoapError> {
    if let Some(slot) = slot.try_downcast_mut::<String>() {
        *slot = value.to_string();
        return Ok(());
    }
    if let Some(slot) = slot.try_downcast_mut::<Option<String>>() {
        *slot = Some(value.to_string());
        return Ok(());
    }
    if let Some(slot) = slot.try_downcast_mut::<bool>() {
        *slot = parse_bool(value).ok_or_else(|| invalid_value(field, value))?;
        return Ok(());
    }
    parse_scalars!(
        slot, field, value, u8, u16, u32, u64, u128, usize, i8, i16, i32, i64, i128, isize, f32,
        f64,
    );

    Err(SoapError::unsupported_field(field, slot.reflect_type_path()))
}

fn parse_bool(value: &str) -> Option<bool> {
    let trimmed = value.trim();
    if trimmed == "1" || trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("yes")
    {
        return Some(true);
    }
    if trimmed == "0" || trimmed.eq_ignore_ascii_case("false") || trimmed.eq_ignore_ascii_case("no")
    {
        return Some(false);
    }
    None
}

fn invalid_value(field: &str, value: &str) -> SoapError {
    SoapError::InvalidOutputValue {
        field: field.to_string(),
        value: value.to_string(),
    }
}

// Whitespace-only text is kept: `<A>  </A>` carries two spaces.
fn parse_envelope(body: &[u8]) -> Result<Element, SoapError> {
    let config = ParserConfig::new().whitespace_to_characters(true);
    Ok(Element::parse_with_config(body, config)?)
}

fn leaf_value(element: &Element) -> Result<(String, String), SoapError> {
    if child_elements(element).next().is_some() {
        return Err(SoapError::unexpected_structure(format!(
            "element {} is not a leaf",
            element.name
        )));
    }
    let text = element.get_text().map(|t| t.into_owned()).unwrap_or_default();
    Ok((element.name.clone(), text))
}

fn leading_fault(soap_body: &Element) -> Option<&Element> {
    child_elements(soap_body)
        .next()
        .filter(|elem| elem.name == "Fault")
}

fn soap_body(envelope: &Element) -> Result<&Element, SoapError> {
    if envelope.name != "Envelope" {
        return Err(SoapError::unexpected_structure(format!(
            "root element is {}, expected Envelope",
            envelope.name
        )));
    }
    find_child(envelope, "Body")
        .ok_or_else(|| SoapError::unexpected_structure("missing Body element in SOAP Envelope"))
}

fn child_elements(parent: &Element) -> impl Iterator<Item = &Element> {
    parent.children.iter().filter_map(XMLNode::as_element)
}

fn find_child<'a>(parent: &'a Element, local_name: &str) -> Option<&'a Element> {
    child_elements(parent).find(|elem| elem.name == local_name)
}

fn child_text(parent: &Element, local_name: &str) -> Option<String> {
    find_child(parent, local_name)
        .and_then(|elem| elem.get_text())
        .map(|text| text.trim().to_string())
}

fn parse_fault(fault: &Element) -> SoapFault {
    // SOAP 1.1 first, then the SOAP 1.2 Code/Value and Reason/Text layout
    let fault_code = child_text(fault, "faultcode")
        .or_else(|| find_child(fault, "Code").and_then(|code| child_text(code, "Value")))
        .unwrap_or_default();
    let fault_string = child_text(fault, "faultstring")
        .or_else(|| find_child(fault, "Reason").and_then(|reason| child_text(reason, "Text")))
        .unwrap_or_default();

    let upnp_error = find_child(fault, "detail")
        .or_else(|| find_child(fault, "Detail"))
        .and_then(|detail| find_child(detail, "UPnPError"))
        .and_then(parse_upnp_error);

    SoapFault {
        fault_code,
        fault_string,
        upnp_error,
    }
}

fn parse_upnp_error(upnp_error: &Element) -> Option<UpnpError> {
    let error_code = child_text(upnp_error, "errorCode")?.parse::<u32>().ok()?;
    let error_description = child_text(upnp_error, "errorDescription").unwrap_or_default();

    Some(UpnpError {
        error_code,
        error_description,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use bevy_reflect::Reflect;
    use std::collections::HashMap;

    use crate::SoapTag;

    const RESPONSE: &str = r#"
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/">
  <s:Body>
    <u:myactionResponse xmlns:u="mynamespace">
      <A>valueA</A>
      <B>valueB</B>
    </u:myactionResponse>
  </s:Body>
</s:Envelope>"#;

    #[derive(Reflect, Default, Debug, PartialEq)]
    #[allow(non_snake_case)]
    struct Output {
        A: String,
        B: String,
    }

    #[derive(Reflect, Default, Debug, PartialEq)]
    struct VolumeInfo {
        #[reflect(@SoapTag::new("CurrentVolume"))]
        volume: u16,
        #[reflect(@SoapTag::new("CurrentMute"))]
        mute: bool,
        #[reflect(@SoapTag::new("Channel"))]
        channel: Option<String>,
        untouched: String,
    }

    fn envelope(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"><s:Body>{inner}</s:Body></s:Envelope>"#
        )
    }

    #[test]
    fn test_decode_into_struct() {
        let mut output = Output::default();
        decode_action_response(RESPONSE.as_bytes(), "myaction", &mut output).unwrap();
        assert_eq!(
            output,
            Output {
                A: "valueA".to_string(),
                B: "valueB".to_string()
            }
        );
    }

    #[test]
    fn test_prefix_is_ignored() {
        let body = envelope(
            r#"<m:myactionResponse xmlns:m="other-namespace"><A>x</A></m:myactionResponse>"#,
        );
        let response = parse_action_response(body.as_bytes(), "myaction").unwrap();
        assert_eq!(response.name, "myactionResponse");
        assert_eq!(response.namespace.as_deref(), Some("other-namespace"));
        assert_eq!(response.get("A"), Some("x"));

        let body = r#"<Envelope><Body><myactionResponse><A>x</A></myactionResponse></Body></Envelope>"#;
        let unprefixed = parse_action_response(body.as_bytes(), "myaction").unwrap();
        assert_eq!(unprefixed.values, response.values);
    }

    #[test]
    fn test_unknown_elements_and_missing_fields() {
        let body = envelope(
            r#"<u:myactionResponse xmlns:u="ns"><B>b</B><C>c</C><a>lower</a></u:myactionResponse>"#,
        );
        let mut output = Output {
            A: "keep".to_string(),
            B: String::new(),
        };
        decode_action_response(body.as_bytes(), "myaction", &mut output).unwrap();
        assert_eq!(output.A, "keep");
        assert_eq!(output.B, "b");
    }

    #[test]
    fn test_text_is_not_trimmed_and_empty_is_empty() {
        let body = envelope(
            r#"<u:myactionResponse xmlns:u="ns"><A> spaced </A><B/></u:myactionResponse>"#,
        );
        let mut output = Output {
            A: String::new(),
            B: "previous".to_string(),
        };
        decode_action_response(body.as_bytes(), "myaction", &mut output).unwrap();
        assert_eq!(output.A, " spaced ");
        assert_eq!(output.B, "");
    }

    #[test]
    fn test_whitespace_only_text_is_kept() {
        let body = envelope(r#"<u:myactionResponse xmlns:u="ns"><A>   </A></u:myactionResponse>"#);
        let response = parse_action_response(body.as_bytes(), "myaction").unwrap();
        assert_eq!(response.get("A"), Some("   "));
    }

    #[test]
    fn test_nested_element_is_rejected() {
        let body = envelope(
            r#"<u:myactionResponse xmlns:u="ns"><A><inner>v</inner></A><B>b</B></u:myactionResponse>"#,
        );
        let mut output = Output {
            A: "keep".to_string(),
            B: String::new(),
        };
        let err = decode_action_response(body.as_bytes(), "myaction", &mut output).unwrap_err();
        match err {
            SoapError::UnexpectedStructure(message) => assert!(message.contains("A"), "{message}"),
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(output.A, "keep");
        assert_eq!(output.B, "");
    }

    #[test]
    fn test_typed_fields() {
        let body = envelope(
            r#"<u:GetVolumeResponse xmlns:u="urn:schemas-upnp-org:service:RenderingControl:1">
                <CurrentVolume>42</CurrentVolume>
                <CurrentMute>1</CurrentMute>
                <Channel>Master</Channel>
            </u:GetVolumeResponse>"#,
        );
        let mut output = VolumeInfo::default();
        decode_action_response(body.as_bytes(), "GetVolume", &mut output).unwrap();
        assert_eq!(output.volume, 42);
        assert!(output.mute);
        assert_eq!(output.channel.as_deref(), Some("Master"));
        assert_eq!(output.untouched, "");
    }

    #[test]
    fn test_partial_assignment_on_bad_value() {
        let body = envelope(
            r#"<u:GetVolumeResponse xmlns:u="ns">
                <Channel>Master</Channel>
                <CurrentVolume>loud</CurrentVolume>
                <CurrentMute>1</CurrentMute>
            </u:GetVolumeResponse>"#,
        );
        let mut output = VolumeInfo::default();
        let err = decode_action_response(body.as_bytes(), "GetVolume", &mut output).unwrap_err();
        match err {
            SoapError::InvalidOutputValue { field, value } => {
                assert_eq!(field, "CurrentVolume");
                assert_eq!(value, "loud");
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(output.channel.as_deref(), Some("Master"));
        assert!(!output.mute);
    }

    #[test]
    fn test_decode_into_map() {
        let mut output: HashMap<String, String> = HashMap::new();
        decode_action_response(RESPONSE.as_bytes(), "myaction", &mut output).unwrap();
        assert_eq!(output.len(), 2);
        assert_eq!(output["A"], "valueA");
        assert_eq!(output["B"], "valueB");
    }

    #[test]
    fn test_unsupported_output_kind() {
        let mut number = 0u32;
        assert!(matches!(
            decode_action_response(RESPONSE.as_bytes(), "myaction", &mut number),
            Err(SoapError::UnsupportedOutputKind(_))
        ));

        let counts: HashMap<String, u32> = HashMap::new();
        assert!(matches!(
            ensure_output_target(&counts),
            Err(SoapError::UnsupportedOutputKind(_))
        ));
    }

    #[test]
    fn test_malformed_xml_leaves_output_untouched() {
        let mut output = Output::default();
        let err = decode_action_response(b"<s:Envelope><s:Body>", "myaction", &mut output)
            .unwrap_err();
        assert!(matches!(err, SoapError::MalformedXml(_)));
        assert_eq!(output, Output::default());

        let err = decode_action_response(b"not xml at all", "myaction", &mut output).unwrap_err();
        assert!(matches!(err, SoapError::MalformedXml(_)));
    }

    #[test]
    fn test_unexpected_structure() {
        let cases = [
            r#"<root><Body/></root>"#.to_string(),
            r#"<s:Envelope xmlns:s="http://schemas.xmlsoap.org/soap/envelope/"/>"#.to_string(),
            envelope(""),
            envelope(r#"<u:otherResponse xmlns:u="ns"><A>a</A></u:otherResponse>"#),
        ];
        for body in cases {
            let mut output = Output::default();
            let err = decode_action_response(body.as_bytes(), "myaction", &mut output).unwrap_err();
            assert!(
                matches!(err, SoapError::UnexpectedStructure(_)),
                "body {body}: {err}"
            );
            assert_eq!(output, Output::default());
        }
    }

    #[test]
    fn test_upnp_fault() {
        let body = envelope(
            r#"<s:Fault>
                <faultcode>s:Client</faultcode>
                <faultstring>UPnPError</faultstring>
                <detail>
                  <UPnPError xmlns="urn:schemas-upnp-org:control-1-0">
                    <errorCode>718</errorCode>
                    <errorDescription>Invalid InstanceID</errorDescription>
                  </UPnPError>
                </detail>
              </s:Fault>"#,
        );
        let mut output = Output::default();
        let err = decode_action_response(body.as_bytes(), "myaction", &mut output).unwrap_err();
        let fault = err.fault().cloned().unwrap();
        assert_eq!(fault.fault_code, "s:Client");
        assert_eq!(fault.fault_string, "UPnPError");
        assert_eq!(
            fault.upnp_error,
            Some(UpnpError {
                error_code: 718,
                error_description: "Invalid InstanceID".to_string()
            })
        );
        assert!(matches!(err, SoapError::RemoteFault { .. }));
        assert_eq!(
            fault.to_string(),
            "s:Client: UPnPError (UPnP error 718: Invalid InstanceID)"
        );
        assert_eq!(find_fault(body.as_bytes()), Some(fault));
    }

    #[test]
    fn test_only_leading_fault_counts() {
        let body = envelope(
            r#"<u:myactionResponse xmlns:u="ns"><A>a</A></u:myactionResponse><s:Fault><faultcode>s:Server</faultcode></s:Fault>"#,
        );
        let response = parse_action_response(body.as_bytes(), "myaction").unwrap();
        assert_eq!(response.get("A"), Some("a"));
        assert_eq!(find_fault(body.as_bytes()), None);
    }

    #[test]
    fn test_soap12_fault() {
        let body = r#"<env:Envelope xmlns:env="http://www.w3.org/2003/05/soap-envelope">
  <env:Body>
    <env:Fault>
      <env:Code><env:Value>env:Sender</env:Value></env:Code>
      <env:Reason><env:Text xml:lang="en">Malformed request</env:Text></env:Reason>
    </env:Fault>
  </env:Body>
</env:Envelope>"#;
        let fault = find_fault(body.as_bytes()).unwrap();
        assert_eq!(fault.fault_code, "env:Sender");
        assert_eq!(fault.fault_string, "Malformed request");
        assert!(fault.upnp_error.is_none());
    }

    #[test]
    fn test_find_fault_on_plain_body() {
        assert_eq!(find_fault(b"Internal Server Error"), None);
        assert_eq!(find_fault(RESPONSE.as_bytes()), None);
    }
}
