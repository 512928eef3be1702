//! Attribute codec: one typed key/value attribute to and from its compact
//! wire record.
//!
//! Attributes the codec cannot represent on the wire (empty keys, non-finite
//! floats) are dropped with a warning rather than failing the surrounding
//! payload.

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::entity::{Attribute, AttributeValue};

/// Wire-side tagged attribute value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum WireValue {
    /// Signed integer.
    Int(i64),
    /// Finite floating point.
    Float(f64),
    /// UTF-8 string.
    Str(String),
    /// Boolean flag.
    Bool(bool),
}

/// Compact wire record for one attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttributeRecord {
    /// Attribute key.
    pub key: String,
    /// Tagged value.
    pub value: WireValue,
}

/// Encodes one attribute into its wire record.
///
/// Returns `None` (with a warning) for attributes that cannot round-trip:
/// empty keys and non-finite floats.
pub fn encode_attribute(attribute: &Attribute) -> Option<AttributeRecord> {
    if attribute.key.is_empty() {
        warn!("dropping attribute with empty key");
        return None;
    }
    let value = match &attribute.value {
        AttributeValue::Int(v) => WireValue::Int(*v),
        AttributeValue::Float(v) if v.is_finite() => WireValue::Float(*v),
        AttributeValue::Float(v) => {
            warn!(key = %attribute.key, value = %v, "dropping non-finite float attribute");
            return None;
        }
        AttributeValue::Str(v) => WireValue::Str(v.clone()),
        AttributeValue::Bool(v) => WireValue::Bool(*v),
    };
    Some(AttributeRecord {
        key: attribute.key.clone(),
        value,
    })
}

/// Decodes one wire record back into an attribute.
///
/// Returns `None` (with a warning) for records with an empty key; a bad
/// record never fails the surrounding payload.
pub fn decode_attribute(record: &AttributeRecord) -> Option<Attribute> {
    if record.key.is_empty() {
        warn!("dropping attribute record with empty key");
        return None;
    }
    let value = match &record.value {
        WireValue::Int(v) => AttributeValue::Int(*v),
        WireValue::Float(v) => AttributeValue::Float(*v),
        WireValue::Str(v) => AttributeValue::Str(v.clone()),
        WireValue::Bool(v) => AttributeValue::Bool(*v),
    };
    Some(Attribute {
        key: record.key.clone(),
        value,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_each_kind_round_trips() {
        let attrs = [
            Attribute {
                key: "count".into(),
                value: AttributeValue::Int(5),
            },
            Attribute {
                key: "durability".into(),
                value: AttributeValue::Float(0.75),
            },
            Attribute {
                key: "owner".into(),
                value: AttributeValue::Str("ysolda".into()),
            },
            Attribute {
                key: "stolen".into(),
                value: AttributeValue::Bool(true),
            },
        ];
        for attr in &attrs {
            let record = encode_attribute(attr).unwrap();
            let back = decode_attribute(&record).unwrap();
            assert_eq!(&back, attr);
        }
    }

    #[test]
    fn test_empty_key_dropped_not_error() {
        let attr = Attribute {
            key: String::new(),
            value: AttributeValue::Int(1),
        };
        assert!(encode_attribute(&attr).is_none());
    }

    #[test]
    fn test_non_finite_float_dropped() {
        for v in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let attr = Attribute {
                key: "weight".into(),
                value: AttributeValue::Float(v),
            };
            assert!(encode_attribute(&attr).is_none());
        }
    }

    #[test]
    fn test_kind_tag_is_explicit_in_serialized_form() {
        // The wire record keeps its kind tag through serialization, so a
        // receiver can never confuse e.g. Int(1) with Bool(true).
        let record = AttributeRecord {
            key: "stolen".into(),
            value: WireValue::Bool(true),
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("Bool"));
    }

    #[test]
    fn test_record_survives_wire_serialization() {
        let record = AttributeRecord {
            key: "count".into(),
            value: WireValue::Int(5),
        };
        let bytes = postcard::to_allocvec(&record).unwrap();
        let back: AttributeRecord = postcard::from_bytes(&bytes).unwrap();
        assert_eq!(back, record);
    }
}
