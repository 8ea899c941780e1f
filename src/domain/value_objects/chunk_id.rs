//! Codec for the string keys the vector backend stores.
//!
//! A chunk is addressed as `doc_<document_id>_chunk_<chunk_index>` and carries
//! the same two integers as decimal strings in its metadata. Both encodings go
//! through this module so a malformed value is always reported, never read as
//! zero.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

pub const DOCUMENT_ID_KEY: &str = "document_id";
pub const CHUNK_INDEX_KEY: &str = "chunk_index";

const ID_PREFIX: &str = "doc_";
const ID_SEPARATOR: &str = "_chunk_";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkCodecError {
    MalformedChunkId(String),
    MissingField(&'static str),
    InvalidField { key: &'static str, value: String },
}

impl std::fmt::Display for ChunkCodecError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChunkCodecError::MalformedChunkId(id) => write!(f, "Malformed chunk id: {:?}", id),
            ChunkCodecError::MissingField(key) => write!(f, "Missing metadata field: {}", key),
            ChunkCodecError::InvalidField { key, value } => {
                write!(f, "Invalid metadata field {}: {:?}", key, value)
            }
        }
    }
}

impl std::error::Error for ChunkCodecError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkId {
    pub document_id: i64,
    pub chunk_index: u32,
}

impl ChunkId {
    pub fn new(document_id: i64, chunk_index: u32) -> Self {
        Self {
            document_id,
            chunk_index,
        }
    }

    pub fn encode(&self) -> String {
        encode_chunk_id(self.document_id, self.chunk_index)
    }

    /// The two metadata entries every stored chunk carries.
    pub fn metadata_fields(&self) -> [(String, String); 2] {
        [
            (DOCUMENT_ID_KEY.to_string(), encode_document_id(self.document_id)),
            (CHUNK_INDEX_KEY.to_string(), self.chunk_index.to_string()),
        ]
    }

    pub fn from_metadata(metadata: &HashMap<String, String>) -> Result<Self, ChunkCodecError> {
        let document_id = metadata
            .get(DOCUMENT_ID_KEY)
            .ok_or(ChunkCodecError::MissingField(DOCUMENT_ID_KEY))?;
        let chunk_index = metadata
            .get(CHUNK_INDEX_KEY)
            .ok_or(ChunkCodecError::MissingField(CHUNK_INDEX_KEY))?;

        Ok(Self {
            document_id: decode_document_id(document_id)?,
            chunk_index: decode_chunk_index(chunk_index)?,
        })
    }
}

impl std::fmt::Display for ChunkId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}{}{}{}", ID_PREFIX, self.document_id, ID_SEPARATOR, self.chunk_index)
    }
}

impl FromStr for ChunkId {
    type Err = ChunkCodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let malformed = || ChunkCodecError::MalformedChunkId(s.to_string());

        let rest = s.strip_prefix(ID_PREFIX).ok_or_else(malformed)?;
        let (document_id, chunk_index) = rest.split_once(ID_SEPARATOR).ok_or_else(malformed)?;

        Ok(Self {
            document_id: parse_decimal(document_id).ok_or_else(malformed)?,
            chunk_index: parse_decimal(chunk_index).ok_or_else(malformed)?,
        })
    }
}

pub fn encode_chunk_id(document_id: i64, chunk_index: u32) -> String {
    ChunkId::new(document_id, chunk_index).to_string()
}

pub fn decode_chunk_id(chunk_id: &str) -> Result<(i64, u32), ChunkCodecError> {
    let id: ChunkId = chunk_id.parse()?;
    Ok((id.document_id, id.chunk_index))
}

pub fn encode_document_id(document_id: i64) -> String {
    document_id.to_string()
}

pub fn decode_document_id(value: &str) -> Result<i64, ChunkCodecError> {
    parse_decimal(value).ok_or_else(|| ChunkCodecError::InvalidField {
        key: DOCUMENT_ID_KEY,
        value: value.to_string(),
    })
}

pub fn decode_chunk_index(value: &str) -> Result<u32, ChunkCodecError> {
    parse_decimal(value).ok_or_else(|| ChunkCodecError::InvalidField {
        key: CHUNK_INDEX_KEY,
        value: value.to_string(),
    })
}

/// Canonical unsigned base-10 only: no sign, no padding, no whitespace.
fn parse_decimal<T: FromStr>(value: &str) -> Option<T> {
    let canonical = !value.is_empty()
        && value.bytes().all(|b| b.is_ascii_digit())
        && (value == "0" || !value.starts_with('0'));

    if canonical { value.parse().ok() } else { None }
}
