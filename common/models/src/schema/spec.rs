//! Spec string codec for feature types.
//!
//! `id:String:index=true,*geom:Point:srid=4326,dtg:Date;geomesa.version='10'`
//!
//! Attributes are comma separated, options follow the type separated by `:`,
//! a leading `*` marks the default geometry. User data follows the first `;`
//! as `key='value'` pairs; quotes and backslashes inside values are escaped
//! with a backslash.

use snafu::ensure;

use crate::errors::{InvalidSpecSnafu, ModelError, ModelResult};
use crate::schema::attribute::{AttributeDescriptor, AttributeType};
use crate::schema::feature_type::FeatureType;
use crate::schema::OPT_DEFAULT;

pub fn encode_type(ft: &FeatureType, include_user_data: bool) -> String {
    let attributes = ft
        .attributes()
        .iter()
        .map(encode_attribute)
        .collect::<Vec<_>>()
        .join(",");

    if !include_user_data || ft.user_data().is_empty() {
        return attributes;
    }

    let user_data = ft
        .user_data()
        .iter()
        .map(|(k, v)| format!("{}='{}'", k, escape(v)))
        .collect::<Vec<_>>()
        .join(",");

    format!("{};{}", attributes, user_data)
}

fn encode_attribute(attr: &AttributeDescriptor) -> String {
    let mut out = String::new();
    if attr.is_default() {
        out.push('*');
    }
    out.push_str(attr.name());
    out.push(':');
    out.push_str(&attr.binding().to_string());
    for (k, v) in attr.options() {
        if k == OPT_DEFAULT {
            continue;
        }
        out.push(':');
        out.push_str(k);
        out.push('=');
        out.push_str(v);
    }
    out
}

fn escape(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}

pub fn decode_type(name: &str, spec: &str) -> ModelResult<FeatureType> {
    let (attr_part, user_data_part) = match spec.split_once(';') {
        Some((a, u)) => (a, Some(u)),
        None => (spec, None),
    };

    let mut attributes = vec![];
    for token in attr_part.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        attributes.push(decode_attribute(spec, token)?);
    }
    ensure!(
        !attributes.is_empty(),
        InvalidSpecSnafu {
            spec: spec.to_string(),
            reason: "no attributes".to_string(),
        }
    );

    let mut ft = FeatureType::new(name, attributes);
    if let Some(user_data) = user_data_part {
        for (k, v) in decode_user_data(spec, user_data)? {
            ft.set_user_data(k, v);
        }
    }
    Ok(ft)
}

fn decode_attribute(spec: &str, token: &str) -> ModelResult<AttributeDescriptor> {
    let (is_default, token) = match token.strip_prefix('*') {
        Some(rest) => (true, rest),
        None => (false, token),
    };

    let mut parts = token.split(':');
    let name = parts.next().unwrap_or_default().trim();
    let binding = parts.next().map(str::trim).ok_or_else(|| {
        InvalidSpecSnafu {
            spec: spec.to_string(),
            reason: format!("attribute '{}' has no type", name),
        }
        .build()
    })?;
    let binding =
        binding
            .parse::<AttributeType>()
            .map_err(|_| ModelError::UnknownAttributeType {
                name: name.to_string(),
                binding: binding.to_string(),
            })?;

    let mut attr = AttributeDescriptor::new(name, binding);
    for opt in parts {
        let (k, v) = opt.split_once('=').ok_or_else(|| {
            InvalidSpecSnafu {
                spec: spec.to_string(),
                reason: format!("option '{}' of attribute '{}' is not key=value", opt, name),
            }
            .build()
        })?;
        attr = attr.with_option(k.trim(), v.trim());
    }
    if is_default {
        attr = attr.as_default();
    }
    Ok(attr)
}

fn decode_user_data(spec: &str, input: &str) -> ModelResult<Vec<(String, String)>> {
    let invalid = |reason: &str| {
        InvalidSpecSnafu {
            spec: spec.to_string(),
            reason: reason.to_string(),
        }
        .build()
    };

    let mut entries = vec![];
    let mut chars = input.chars().peekable();
    loop {
        while matches!(chars.peek(), Some(c) if c.is_whitespace() || *c == ',') {
            chars.next();
        }
        if chars.peek().is_none() {
            break;
        }

        let mut key = String::new();
        for c in chars.by_ref() {
            if c == '=' {
                break;
            }
            key.push(c);
        }
        if chars.next() != Some('\'') {
            return Err(invalid("user data value must be quoted"));
        }

        let mut value = String::new();
        let mut closed = false;
        while let Some(c) = chars.next() {
            match c {
                '\\' => match chars.next() {
                    Some(escaped) => value.push(escaped),
                    None => return Err(invalid("dangling escape in user data")),
                },
                '\'' => {
                    closed = true;
                    break;
                }
                c => value.push(c),
            }
        }
        if !closed {
            return Err(invalid("unterminated user data value"));
        }
        entries.push((key.trim().to_string(), value));
    }
    Ok(entries)
}
