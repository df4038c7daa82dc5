//! Invocation input: the ordered envelopes one invocation processes.

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{InputFormat, decoder::EnvelopeEncoding};

#[derive(Deserialize)]
struct KinesisEvent {
    #[serde(rename = "Records")]
    records: Vec<KinesisEventRecord>,
}

#[derive(Deserialize)]
struct KinesisEventRecord {
    kinesis: KinesisPayload,
}

#[derive(Deserialize)]
struct KinesisPayload {
    data: String,
}

impl InputFormat {
    /// Encoding of the envelopes this input format yields.
    pub fn envelope_encoding(self) -> EnvelopeEncoding {
        match self {
            InputFormat::Kinesis => EnvelopeEncoding::Base64,
            InputFormat::Lines => EnvelopeEncoding::Raw,
        }
    }
}

/// Splits an invocation input into envelopes, preserving order.
///
/// A document that does not match `format` is an error for the whole input;
/// individual envelopes are not looked at here.
pub fn read_envelopes(input: &[u8], format: InputFormat) -> Result<Vec<Vec<u8>>> {
    match format {
        InputFormat::Kinesis => {
            let event: KinesisEvent = serde_json::from_slice(input)
                .context("Input is not a Kinesis event document with a `Records` array")?;
            Ok(event
                .records
                .into_iter()
                .map(|r| r.kinesis.data.into_bytes())
                .collect())
        }
        InputFormat::Lines => Ok(input
            .split(|b| *b == b'\n')
            .map(<[u8]>::trim_ascii)
            .filter(|line| !line.is_empty())
            .map(<[u8]>::to_vec)
            .collect()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        decoder::RecordDecoder,
        utils::test_helpers::{
            event_helpers::{TestEnvelope, kinesis_event, ndjson},
            test_data,
        },
    };

    #[test]
    fn test_kinesis_event_envelopes_decode() {
        let records = test_data::readings(3);
        let event = kinesis_event(&[
            TestEnvelope::Valid(records[0]),
            TestEnvelope::Garbage("oops"),
            TestEnvelope::Valid(records[1]),
            TestEnvelope::Valid(records[2]),
        ]);

        let envelopes = read_envelopes(event.as_bytes(), InputFormat::Kinesis).unwrap();
        assert_eq!(envelopes.len(), 4);

        let decoder = RecordDecoder::new(InputFormat::Kinesis.envelope_encoding());
        assert_eq!(decoder.decode(&envelopes[0]).unwrap(), records[0]);
        assert!(decoder.decode(&envelopes[1]).is_err());
        assert_eq!(decoder.decode(&envelopes[3]).unwrap(), records[2]);
    }

    #[test]
    fn test_kinesis_event_without_records_is_an_error() {
        let err = read_envelopes(br#"{"records": []}"#, InputFormat::Kinesis).unwrap_err();
        assert!(err.to_string().contains("Records"));
        assert!(read_envelopes(b"not json", InputFormat::Kinesis).is_err());
    }

    #[test]
    fn test_empty_kinesis_event() {
        let envelopes = read_envelopes(br#"{"Records": []}"#, InputFormat::Kinesis).unwrap();
        assert!(envelopes.is_empty());
    }

    #[test]
    fn test_lines_skip_blank_lines_and_trim() {
        let records = test_data::readings(2);
        let mut input = String::from("\n  \r\n");
        input.push_str(&ndjson(&[
            TestEnvelope::Valid(records[0]),
            TestEnvelope::Valid(records[1]),
        ]));
        let input = input.replace('\n', "\r\n");

        let envelopes = read_envelopes(input.as_bytes(), InputFormat::Lines).unwrap();
        assert_eq!(envelopes.len(), 2);

        let decoder = RecordDecoder::new(InputFormat::Lines.envelope_encoding());
        assert_eq!(decoder.decode(&envelopes[1]).unwrap(), records[1]);
    }
}
