//! Envelope decoding.
//!
//! An envelope is one opaque payload from the transport. Depending on the
//! transport it is either the JSON document itself or base64 text wrapping
//! it (Kinesis delivers the latter).

use std::borrow::Cow;

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::Deserialize;
use thiserror::Error;

use crate::record::Record;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("envelope is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("payload is not valid UTF-8: {0}")]
    Utf8(#[from] std::str::Utf8Error),

    #[error("payload is not a valid sensor record: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("sensor record is missing required field `{field}`")]
    MissingField { field: &'static str },
}

/// How the bytes of an envelope wrap the JSON document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum EnvelopeEncoding {
    /// The envelope is the JSON document.
    #[default]
    Raw,
    /// The envelope is standard-alphabet base64 of the JSON document.
    Base64,
}

// Every field is optional here so that an absent or null field is reported
// by name instead of as a generic serde error.
#[derive(Deserialize)]
struct WireRecord {
    sensor_id: Option<i64>,
    temperature: Option<f64>,
    humidity: Option<f64>,
    timestamp: Option<i64>,
}

impl TryFrom<WireRecord> for Record {
    type Error = DecodeError;

    fn try_from(wire: WireRecord) -> Result<Self, Self::Error> {
        Ok(Record {
            sensor_id: wire.sensor_id.ok_or(DecodeError::MissingField {
                field: "sensor_id",
            })?,
            temperature: wire.temperature.ok_or(DecodeError::MissingField {
                field: "temperature",
            })?,
            humidity: wire.humidity.ok_or(DecodeError::MissingField {
                field: "humidity",
            })?,
            timestamp: wire.timestamp.ok_or(DecodeError::MissingField {
                field: "timestamp",
            })?,
        })
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct RecordDecoder {
    encoding: EnvelopeEncoding,
}

impl RecordDecoder {
    pub fn new(encoding: EnvelopeEncoding) -> Self {
        Self { encoding }
    }

    pub fn decode(&self, envelope: &[u8]) -> Result<Record, DecodeError> {
        let payload: Cow<'_, [u8]> = match self.encoding {
            EnvelopeEncoding::Raw => Cow::Borrowed(envelope),
            EnvelopeEncoding::Base64 => Cow::Owned(STANDARD.decode(envelope.trim_ascii())?),
        };
        let text = std::str::from_utf8(&payload)?;
        let wire: WireRecord = serde_json::from_str(text)?;
        Record::try_from(wire)
    }
}
