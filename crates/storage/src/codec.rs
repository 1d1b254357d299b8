// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Snapshot blob encoding
//!
//! A snapshot blob is a versioned JSON envelope around `DocumentState`,
//! optionally gzip-compressed. The compression tag is stored alongside the
//! blob so either form decodes.

use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use serde::{Deserialize, Serialize};
use std::io::{self, Read, Write};
use thiserror::Error;
use vellum_core::{Compression, DocumentState};

/// Envelope version written by this build
pub const SNAPSHOT_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum CodecError {
    #[error("snapshot JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("snapshot compression error: {0}")]
    Io(#[from] io::Error),
    #[error("unknown snapshot compression: {0}")]
    UnknownCompression(String),
    #[error("unsupported snapshot version {found} (expected at most {supported})")]
    UnsupportedVersion { found: u32, supported: u32 },
}

/// A snapshot ready to be written
#[derive(Debug, Clone)]
pub struct EncodedSnapshot {
    pub sequence: u64,
    pub compression: Compression,
    pub data: Vec<u8>,
    /// Size of the JSON envelope before compression
    pub uncompressed_len: u64,
}

#[derive(Serialize)]
struct EnvelopeRef<'a> {
    version: u32,
    sequence: u64,
    state: &'a DocumentState,
}

#[derive(Deserialize)]
struct Envelope {
    version: u32,
    sequence: u64,
    state: DocumentState,
}

/// Encode `state` as it stood after `sequence`
pub fn encode(
    state: &DocumentState,
    sequence: u64,
    compression: Compression,
) -> Result<EncodedSnapshot, CodecError> {
    let json = serde_json::to_vec(&EnvelopeRef {
        version: SNAPSHOT_VERSION,
        sequence,
        state,
    })?;
    let uncompressed_len = json.len() as u64;

    let data = match compression {
        Compression::None => json,
        Compression::Gzip => {
            let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&json)?;
            encoder.finish()?
        }
    };

    Ok(EncodedSnapshot {
        sequence,
        compression,
        data,
        uncompressed_len,
    })
}

/// Decode a stored blob, returning the sequence it covers and the state
pub fn decode(compression_tag: &str, data: &[u8]) -> Result<(u64, DocumentState), CodecError> {
    let compression: Compression = compression_tag
        .parse()
        .map_err(|_| CodecError::UnknownCompression(compression_tag.to_string()))?;

    let envelope: Envelope = match compression {
        Compression::None => serde_json::from_slice(data)?,
        Compression::Gzip => {
            let mut json = Vec::new();
            GzDecoder::new(data).read_to_end(&mut json)?;
            serde_json::from_slice(&json)?
        }
    };

    if envelope.version > SNAPSHOT_VERSION {
        return Err(CodecError::UnsupportedVersion {
            found: envelope.version,
            supported: SNAPSHOT_VERSION,
        });
    }
    Ok((envelope.sequence, envelope.state))
}

#[cfg(test)]
#[path = "codec_tests.rs"]
mod tests;
