//! Envelope decoding for LSF commands run with `-json`.
//!
//! The output is one object holding a record count and a `RECORDS` array:
//! `{"COMMAND": "bjobs", "JOBS": 2, "RECORDS": [{...}, {...}]}`.
//! The envelope either parses as a whole or the batch is rejected; records
//! inside it decode independently. Invalid UTF-8 is replaced, so one job
//! with a Latin-1 name does not reject the batch.

use crate::collectors::error::CollectorError;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::{debug, warn};

const FORMAT: &str = "json";

/// Key of the array holding one object per record.
pub const RECORDS_KEY: &str = "RECORDS";

/// Key LSF sets on a record it could not produce.
pub const ERROR_KEY: &str = "ERROR";

/// Decode the records of an LSF JSON envelope whose count lives under `count_key`.
///
/// # Errors
///
/// Returns [`CollectorError::DecodeFailed`] if the envelope is not a JSON
/// object, or if it announces records but carries no `RECORDS` array.
pub fn decode<T: DeserializeOwned>(output: &[u8], count_key: &str) -> Result<Vec<T>, CollectorError> {
    let text = String::from_utf8_lossy(output);
    let envelope: Value = serde_json::from_str(&text).map_err(|e| CollectorError::decode(FORMAT, e))?;

    let Value::Object(mut envelope) = envelope else {
        return Err(CollectorError::decode(FORMAT, "top-level value is not an object"));
    };

    let count = envelope.get(count_key).and_then(Value::as_u64).unwrap_or(0);

    let records = match envelope.remove(RECORDS_KEY) {
        Some(Value::Array(records)) => records,
        None | Some(Value::Null) if count == 0 => Vec::new(),
        None | Some(Value::Null) => {
            return Err(CollectorError::decode(
                FORMAT,
                format!("{count_key} is {count} but {RECORDS_KEY} is missing"),
            ));
        }
        Some(_) => {
            return Err(CollectorError::decode(
                FORMAT,
                format!("{RECORDS_KEY} is not an array"),
            ));
        }
    };

    if usize::try_from(count).ok() != Some(records.len()) {
        debug!(
            announced = count,
            received = records.len(),
            "record count differs from envelope count"
        );
    }

    let mut decoded = Vec::with_capacity(records.len());
    for (index, record) in records.into_iter().enumerate() {
        if let Some(reason) = record.get(ERROR_KEY) {
            debug!(index, reason = %reason, "skipping record reported as error");
            continue;
        }
        match T::deserialize(record) {
            Ok(r) => decoded.push(r),
            Err(e) => warn!(index, error = %e, "skipping undecodable record"),
        }
    }

    Ok(decoded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collectors::parse::lenient;
    use serde::Deserialize;

    #[derive(Debug, Default, Deserialize)]
    #[serde(default)]
    struct Job {
        #[serde(rename = "JOBID", deserialize_with = "lenient::string")]
        id: String,
        #[serde(rename = "QUEUE", deserialize_with = "lenient::string")]
        queue: String,
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_decode_envelope() {
        let out = br#"{"COMMAND":"bjobs","JOBS":2,"RECORDS":[
            {"JOBID":"101","QUEUE":"normal","UNKNOWN":"x"},
            {"JOBID":102}
        ]}"#;
        let jobs: Vec<Job> = decode(out, "JOBS").unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs.first().unwrap().queue, "normal");
        assert_eq!(jobs.last().unwrap().id, "102");
        assert_eq!(jobs.last().unwrap().queue, "");
    }

    #[test]
    fn test_malformed_envelope_is_single_error() {
        let res: Result<Vec<Job>, _> = decode(br#"{"JOBS":1,"RECORDS":[{"JOBID":"1"}"#, "JOBS");
        assert!(matches!(res, Err(CollectorError::DecodeFailed { format: "json", .. })));

        let res: Result<Vec<Job>, _> = decode(b"[]", "JOBS");
        assert!(matches!(res, Err(CollectorError::DecodeFailed { .. })));

        let res: Result<Vec<Job>, _> = decode(b"No unfinished job found", "JOBS");
        assert!(matches!(res, Err(CollectorError::DecodeFailed { .. })));
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_empty_envelope_without_records() {
        let jobs: Vec<Job> = decode(br#"{"COMMAND":"bjobs","JOBS":0}"#, "JOBS").unwrap();
        assert!(jobs.is_empty());

        let res: Result<Vec<Job>, _> = decode(br#"{"COMMAND":"bjobs","JOBS":3}"#, "JOBS");
        assert!(res.is_err());
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_invalid_utf8_keeps_every_record() {
        let out = b"{\"JOBS\":2,\"RECORDS\":[{\"JOBID\":\"1\",\"QUEUE\":\"normal\"},{\"JOBID\":\"2\",\"QUEUE\":\"r\xE9gion\"}]}";
        let jobs: Vec<Job> = decode(out, "JOBS").unwrap();
        assert_eq!(jobs.len(), 2);
        assert_eq!(jobs.first().unwrap().queue, "normal");
        assert_eq!(jobs.last().unwrap().queue, "r\u{FFFD}gion");
    }

    #[test]
    #[allow(clippy::unwrap_used)]
    fn test_error_and_undecodable_records_are_skipped() {
        let out = br#"{"JOBS":3,"RECORDS":[
            {"JOBID":"1","ERROR":"Job <1> is not found"},
            {"JOBID":["not","scalar"]},
            {"JOBID":"3"}
        ]}"#;
        let jobs: Vec<Job> = decode(out, "JOBS").unwrap();
        assert_eq!(jobs.len(), 1);
        assert_eq!(jobs.first().unwrap().id, "3");
    }
}
