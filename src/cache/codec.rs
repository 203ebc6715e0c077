//! Envelope Codec
//!
//! Serializes [`CacheEnvelope`]s for the key-value store. The JSON body is
//! compressed above a size threshold and prefixed with a one-byte header
//! naming the algorithm, so envelopes written under one setting stay readable
//! after the setting changes.

use crate::cache::entry::CacheEnvelope;
use crate::error::{Error, Result};
use bytes::{BufMut, Bytes, BytesMut};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Format version carried in the high nibble of the header byte
const FORMAT_VERSION: u8 = 1;

/// Largest decompressed body a stored envelope may declare
pub const MAX_DECODED_BYTES: usize = 256 * 1024 * 1024;

// =============================================================================
// Compression Algorithm
// =============================================================================

/// Compression algorithm identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompressionAlgorithm {
    None,
    #[default]
    Lz4,
    Zstd,
    Snappy,
}

impl CompressionAlgorithm {
    fn tag(self) -> u8 {
        match self {
            CompressionAlgorithm::None => 0,
            CompressionAlgorithm::Lz4 => 1,
            CompressionAlgorithm::Zstd => 2,
            CompressionAlgorithm::Snappy => 3,
        }
    }

    fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(CompressionAlgorithm::None),
            1 => Some(CompressionAlgorithm::Lz4),
            2 => Some(CompressionAlgorithm::Zstd),
            3 => Some(CompressionAlgorithm::Snappy),
            _ => None,
        }
    }

    fn compress(self, data: &[u8], level: i32) -> Result<Vec<u8>> {
        match self {
            CompressionAlgorithm::None => Ok(data.to_vec()),
            CompressionAlgorithm::Lz4 => lz4::block::compress(
                data,
                Some(lz4::block::CompressionMode::HIGHCOMPRESSION(level)),
                true,
            )
            .map_err(|e| Error::Codec(format!("LZ4 compression failed: {}", e))),
            CompressionAlgorithm::Zstd => zstd::encode_all(data, level)
                .map_err(|e| Error::Codec(format!("Zstd compression failed: {}", e))),
            CompressionAlgorithm::Snappy => snap::raw::Encoder::new()
                .compress_vec(data)
                .map_err(|e| Error::Codec(format!("Snappy compression failed: {}", e))),
        }
    }

    fn decompress(self, data: &[u8]) -> Result<Vec<u8>> {
        match self {
            CompressionAlgorithm::None => Ok(data.to_vec()),
            CompressionAlgorithm::Lz4 => {
                let declared = lz4_declared_size(data)?;
                lz4::block::decompress(&data[4..], Some(declared))
                    .map_err(|e| Error::Codec(format!("LZ4 decompression failed: {}", e)))
            }
            CompressionAlgorithm::Zstd => zstd::decode_all(data)
                .map_err(|e| Error::Codec(format!("Zstd decompression failed: {}", e))),
            CompressionAlgorithm::Snappy => {
                let declared = snap::raw::decompress_len(data)
                    .map_err(|e| Error::Codec(format!("Snappy decompression failed: {}", e)))?;
                check_declared_size(declared)?;
                snap::raw::Decoder::new()
                    .decompress_vec(data)
                    .map_err(|e| Error::Codec(format!("Snappy decompression failed: {}", e)))
            }
        }
    }
}

/// Read the little-endian size prefix written by `lz4::block::compress`
fn lz4_declared_size(data: &[u8]) -> Result<i32> {
    let prefix: [u8; 4] = data
        .get(..4)
        .and_then(|bytes| bytes.try_into().ok())
        .ok_or_else(|| Error::Codec("LZ4 payload shorter than its size prefix".into()))?;

    let declared = i32::from_le_bytes(prefix);
    let size = usize::try_from(declared)
        .map_err(|_| Error::Codec(format!("LZ4 payload declares negative size {}", declared)))?;
    check_declared_size(size)?;
    Ok(declared)
}

fn check_declared_size(size: usize) -> Result<()> {
    if size > MAX_DECODED_BYTES {
        return Err(Error::Codec(format!(
            "declared body of {} bytes exceeds the {} byte limit",
            size, MAX_DECODED_BYTES
        )));
    }
    Ok(())
}

impl fmt::Display for CompressionAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CompressionAlgorithm::None => write!(f, "none"),
            CompressionAlgorithm::Lz4 => write!(f, "lz4"),
            CompressionAlgorithm::Zstd => write!(f, "zstd"),
            CompressionAlgorithm::Snappy => write!(f, "snappy"),
        }
    }
}

// =============================================================================
// Codec Configuration
// =============================================================================

/// Configuration for envelope encoding
#[derive(Debug, Clone)]
pub struct CodecConfig {
    /// Algorithm used for bodies at or above `min_size_bytes`
    pub algorithm: CompressionAlgorithm,
    /// Smaller bodies are stored uncompressed
    pub min_size_bytes: usize,
    /// Compression level (algorithm-specific)
    pub level: i32,
}

impl Default for CodecConfig {
    fn default() -> Self {
        Self {
            algorithm: CompressionAlgorithm::Lz4,
            min_size_bytes: 1024,
            level: 3,
        }
    }
}

// =============================================================================
// Envelope Codec
// =============================================================================

/// Encoder/decoder for stored envelopes
#[derive(Debug, Clone, Default)]
pub struct EnvelopeCodec {
    config: CodecConfig,
}

impl EnvelopeCodec {
    pub fn new(config: CodecConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &CodecConfig {
        &self.config
    }

    /// Encode an envelope to its stored form
    pub fn encode(&self, envelope: &CacheEnvelope) -> Result<Bytes> {
        let body = serde_json::to_vec(envelope)?;

        let (algorithm, payload) = if body.len() >= self.config.min_size_bytes {
            match self.config.algorithm.compress(&body, self.config.level) {
                Ok(compressed) if compressed.len() < body.len() => (self.config.algorithm, compressed),
                Ok(_) => (CompressionAlgorithm::None, body),
                Err(e) => {
                    tracing::warn!(error = %e, "Envelope compression failed, storing uncompressed");
                    (CompressionAlgorithm::None, body)
                }
            }
        } else {
            (CompressionAlgorithm::None, body)
        };

        let mut out = BytesMut::with_capacity(payload.len() + 1);
        out.put_u8((FORMAT_VERSION << 4) | algorithm.tag());
        out.put_slice(&payload);
        Ok(out.freeze())
    }

    /// Decode a stored envelope
    pub fn decode(&self, stored: &[u8]) -> Result<CacheEnvelope> {
        let (&header, payload) = stored
            .split_first()
            .ok_or_else(|| Error::Codec("empty envelope".into()))?;

        let version = header >> 4;
        if version != FORMAT_VERSION {
            return Err(Error::Codec(format!("unsupported envelope version {}", version)));
        }

        let algorithm = CompressionAlgorithm::from_tag(header & 0x0F)
            .ok_or_else(|| Error::Codec(format!("unknown compression tag {}", header & 0x0F)))?;

        let body = algorithm.decompress(payload)?;
        Ok(serde_json::from_slice(&body)?)
    }
}
