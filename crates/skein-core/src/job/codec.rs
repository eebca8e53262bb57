//! Codec - job values <-> bytes.
//!
//! Every exported job starts with the same envelope: a `type` field holding
//! its `JobType`. Decoding reads the envelope first, then decodes the whole
//! value with the format the envelope names.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use super::job_type::{Format, JobType};
use crate::error::{Result, SkeinError};

#[derive(Deserialize)]
struct TypeEnvelope {
    #[serde(rename = "type")]
    job_type: JobType,
}

/// Encode `value` with `format`.
pub fn encode<T: Serialize>(format: Format, value: &T) -> Result<Vec<u8>> {
    match format {
        Format::Json => Ok(serde_json::to_vec(value)?),
    }
}

/// Read only the type envelope of exported bytes.
pub fn peek_type(bytes: &[u8]) -> Result<JobType> {
    if bytes.is_empty() {
        return Err(SkeinError::Serialization("empty payload".to_string()));
    }
    let envelope: TypeEnvelope = serde_json::from_slice(bytes)?;
    Ok(envelope.job_type)
}

/// Decode bytes produced by [`encode`].
pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    let job_type = peek_type(bytes)?;
    match job_type.format {
        Format::Json => Ok(serde_json::from_slice(bytes)?),
    }
}
