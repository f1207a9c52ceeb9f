//! Résolution des champs d'entrée d'une action SOAP.
//!
//! Turns a reflected input value into the ordered `(tag, value)` sequence that
//! becomes the children of the action element. Three input shapes are
//! accepted:
//!
//! - a struct deriving [`Reflect`]: fields in declaration order, tag taken from
//!   a [`SoapTag`] attribute when present, from the field name otherwise;
//! - a string-keyed map: entries sorted by key (byte order), so the envelope
//!   does not depend on hash iteration order;
//! - a list of `(tag, value)` tuples: entries in list order.
//!
//! ```ignore
//! use bevy_reflect::Reflect;
//! use pmosoap::SoapTag;
//!
//! #[derive(Reflect)]
//! struct SetVolume {
//!     #[reflect(@SoapTag::new("InstanceID"))]
//!     instance_id: u32,
//!     #[reflect(@SoapTag::new("Channel"))]
//!     channel: String,
//!     #[reflect(@SoapTag::new("DesiredVolume"))]
//!     desired_volume: u16,
//! }
//! ```

use bevy_reflect::{List, Map, PartialReflect, Reflect, ReflectRef, Struct, StructInfo, TypeInfo};

use crate::error::SoapError;

/// Tag override for a struct field, attached with
/// `#[reflect(@SoapTag::new("Name"))]`.
#[derive(Reflect, Debug, Clone, PartialEq, Eq)]
pub struct SoapTag(String);

impl SoapTag {
    pub fn new(tag: impl Into<String>) -> Self {
        Self(tag.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// One child element of the action element.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDescriptor {
    tag_name: String,
    raw_value: String,
}

impl FieldDescriptor {
    /// Builds a descriptor, rejecting tags that cannot be emitted verbatim.
    pub fn new(tag_name: impl Into<String>, raw_value: impl Into<String>) -> Result<Self, SoapError> {
        let tag_name = tag_name.into();
        if !is_valid_tag(&tag_name) {
            return Err(SoapError::InvalidTagName(tag_name));
        }
        Ok(Self {
            tag_name,
            raw_value: raw_value.into(),
        })
    }

    pub fn tag_name(&self) -> &str {
        &self.tag_name
    }

    /// Unescaped text value.
    pub fn raw_value(&self) -> &str {
        &self.raw_value
    }
}

fn is_valid_tag(tag: &str) -> bool {
    !tag.is_empty()
        && !tag
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '<' | '>' | '&' | '"' | '\'' | '/' | '='))
}

/// Resolves `input` into its ordered field sequence.
pub fn resolve_fields(input: &dyn PartialReflect) -> Result<Vec<FieldDescriptor>, SoapError> {
    match input.reflect_ref() {
        ReflectRef::Struct(record) => resolve_record(record),
        ReflectRef::Map(mapping) => resolve_mapping(mapping),
        ReflectRef::List(pairs) => resolve_pairs(pairs),
        _ => Err(SoapError::UnsupportedInputKind(
            input.reflect_type_path().to_string(),
        )),
    }
}

/// Checks that `input` has a shape [`resolve_fields`] understands, without
/// converting its values.
pub fn is_supported_input(input: &dyn PartialReflect) -> bool {
    matches!(
        input.reflect_ref(),
        ReflectRef::Struct(_) | ReflectRef::Map(_) | ReflectRef::List(_)
    )
}

pub(crate) fn struct_info(record: &dyn Struct) -> Option<&'static StructInfo> {
    match record.get_represented_type_info() {
        Some(TypeInfo::Struct(info)) => Some(info),
        _ => None,
    }
}

/// Tag of the field at `index`: its [`SoapTag`] if any, its name otherwise.
pub(crate) fn tag_at<'a>(
    record: &'a dyn Struct,
    info: Option<&'static StructInfo>,
    index: usize,
) -> Option<&'a str> {
    let tag = info
        .and_then(|info| info.field_at(index))
        .and_then(|field| field.get_attribute::<SoapTag>())
        .map(SoapTag::as_str);
    tag.or_else(|| record.name_at(index))
}

fn resolve_record(record: &dyn Struct) -> Result<Vec<FieldDescriptor>, SoapError> {
    let info = struct_info(record);
    let mut fields = Vec::with_capacity(record.field_len());

    for index in 0..record.field_len() {
        let (Some(tag), Some(value)) = (tag_at(record, info, index), record.field_at(index)) else {
            continue;
        };
        match field_value(value) {
            FieldValue::Text(text) => fields.push(FieldDescriptor::new(tag, text)?),
            FieldValue::Unset => {}
            FieldValue::Unsupported => {
                return Err(SoapError::unsupported_field(tag, value.reflect_type_path()));
            }
        }
    }

    Ok(fields)
}

fn resolve_mapping(mapping: &dyn Map) -> Result<Vec<FieldDescriptor>, SoapError> {
    let mut fields = Vec::with_capacity(mapping.len());

    for (key, value) in mapping.iter() {
        let tag = string_key(key).ok_or_else(|| {
            SoapError::UnsupportedInputKind(format!(
                "map with {} keys",
                key.reflect_type_path()
            ))
        })?;
        match field_value(value) {
            FieldValue::Text(text) => fields.push(FieldDescriptor::new(tag, text)?),
            FieldValue::Unset => {}
            FieldValue::Unsupported => {
                return Err(SoapError::unsupported_field(tag, value.reflect_type_path()));
            }
        }
    }

    fields.sort_by(|a, b| a.tag_name.cmp(&b.tag_name));
    Ok(fields)
}

fn resolve_pairs(pairs: &dyn List) -> Result<Vec<FieldDescriptor>, SoapError> {
    let mut fields = Vec::with_capacity(pairs.len());

    for item in pairs.iter() {
        let ReflectRef::Tuple(pair) = item.reflect_ref() else {
            return Err(SoapError::UnsupportedInputKind(format!(
                "list of {}",
                item.reflect_type_path()
            )));
        };
        let (Some(key), Some(value), 2) = (pair.field(0), pair.field(1), pair.field_len()) else {
            return Err(SoapError::UnsupportedInputKind(format!(
                "list of {}",
                item.reflect_type_path()
            )));
        };
        let tag = string_key(key).ok_or_else(|| {
            SoapError::UnsupportedInputKind(format!("list of {}", item.reflect_type_path()))
        })?;
        match field_value(value) {
            FieldValue::Text(text) => fields.push(FieldDescriptor::new(tag, text)?),
            FieldValue::Unset => {}
            FieldValue::Unsupported => {
                return Err(SoapError::unsupported_field(tag, value.reflect_type_path()));
            }
        }
    }

    Ok(fields)
}

fn string_key(key: &dyn PartialReflect) -> Option<&str> {
    key.try_downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| key.try_downcast_ref::<&'static str>().copied())
}

enum FieldValue {
    Text(String),
    Unset,
    Unsupported,
}

macro_rules! display_scalars {
    ($value:expr, $($ty:ty),+ $(,)?) => {
        $(
            if let Some(v) = $value.try_downcast_ref::<$ty>() {
                return FieldValue::Text(v.to_string());
            }
        )+
    };
}

fn field_value(value: &dyn PartialReflect) -> FieldValue {
    if let Some(v) = value.try_downcast_ref::<bool>() {
        return FieldValue::Text(if *v { "1" } else { "0" }.to_string());
    }
    if let Some(v) = value.try_downcast_ref::<Option<String>>() {
        return match v {
            Some(text) => FieldValue::Text(text.clone()),
            None => FieldValue::Unset,
        };
    }
    display_scalars!(
        value,
        String,
        &'static str,
        char,
        u8,
        u16,
        u32,
        u64,
        u128,
        usize,
        i8,
        i16,
        i32,
        i64,
        i128,
        isize,
        f32,
        f64,
    );
    FieldValue::Unsupported
}
