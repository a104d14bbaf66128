//! Content hashing.
//!
//! This module provides:
//! - The supported hash algorithms (SHA-256 default, BLAKE3, MD5 fast/legacy)
//! - Streaming file-content hashing
//! - A digest helper for in-memory byte strings (enumeration digests)

use crate::error::EngineError;
use std::fmt;
use std::path::Path;

/// Supported content-hash algorithms.
///
/// SHA-256 is the default and the minimum acceptable strength for conflict
/// resolution and the integrity ledger. MD5 exists only as an explicitly
/// selected fast/legacy mode for very large read-only collections; it is
/// never chosen implicitly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ChecksumAlgorithm {
    /// MD5 (fast/legacy mode only; weak, never the default)
    Md5,
    /// SHA-256 (cryptographic, the default)
    #[default]
    Sha256,
    /// BLAKE3 (cryptographic, fast)
    Blake3,
}

impl fmt::Display for ChecksumAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Md5 => write!(f, "md5"),
            Self::Sha256 => write!(f, "sha256"),
            Self::Blake3 => write!(f, "blake3"),
        }
    }
}

impl ChecksumAlgorithm {
    /// Parse algorithm from string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "md5" => Some(Self::Md5),
            "sha256" => Some(Self::Sha256),
            "blake3" => Some(Self::Blake3),
            _ => None,
        }
    }
}

/// A computed content hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChecksumValue {
    algorithm: ChecksumAlgorithm,
    hex: String,
}

impl ChecksumValue {
    pub fn new(algorithm: ChecksumAlgorithm, hex: String) -> Self {
        ChecksumValue { algorithm, hex }
    }

    pub fn algorithm(&self) -> ChecksumAlgorithm {
        self.algorithm
    }

    /// Lowercase hex string of the digest.
    pub fn hex(&self) -> &str {
        &self.hex
    }
}

impl fmt::Display for ChecksumValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.hex)
    }
}

/// Trait for streaming checksum computation.
trait ChecksumHasher {
    fn update(&mut self, data: &[u8]);
    fn finalize(&mut self) -> ChecksumValue;
}

struct Md5Hasher {
    context: Option<md5::Context>,
}

impl ChecksumHasher for Md5Hasher {
    fn update(&mut self, data: &[u8]) {
        if let Some(ctx) = self.context.as_mut() {
            ctx.consume(data);
        }
    }

    fn finalize(&mut self) -> ChecksumValue {
        let digest = self
            .context
            .take()
            .unwrap_or_else(md5::Context::new)
            .compute();
        ChecksumValue::new(ChecksumAlgorithm::Md5, format!("{:x}", digest))
    }
}

struct Sha256Hasher {
    hasher: sha2::Sha256,
}

impl ChecksumHasher for Sha256Hasher {
    fn update(&mut self, data: &[u8]) {
        use sha2::Digest;
        self.hasher.update(data);
    }

    fn finalize(&mut self) -> ChecksumValue {
        use sha2::Digest;
        let digest = std::mem::take(&mut self.hasher).finalize();
        ChecksumValue::new(ChecksumAlgorithm::Sha256, format!("{:x}", digest))
    }
}

struct Blake3Hasher {
    hasher: blake3::Hasher,
}

impl ChecksumHasher for Blake3Hasher {
    fn update(&mut self, data: &[u8]) {
        self.hasher.update(data);
    }

    fn finalize(&mut self) -> ChecksumValue {
        let digest = self.hasher.finalize();
        ChecksumValue::new(ChecksumAlgorithm::Blake3, digest.to_hex().to_string())
    }
}

fn create_hasher(algorithm: ChecksumAlgorithm) -> Box<dyn ChecksumHasher> {
    match algorithm {
        ChecksumAlgorithm::Md5 => Box::new(Md5Hasher {
            context: Some(md5::Context::new()),
        }),
        ChecksumAlgorithm::Sha256 => Box::new(Sha256Hasher {
            hasher: sha2::Sha256::default(),
        }),
        ChecksumAlgorithm::Blake3 => Box::new(Blake3Hasher {
            hasher: blake3::Hasher::new(),
        }),
    }
}

/// Compute the content hash of a file, streaming in 64 KB chunks.
///
/// # Errors
/// Returns `EngineError::ReadError` if the file cannot be opened or read;
/// the caller decides whether that failure is transient (retry) or permanent.
pub fn compute_file_checksum(
    path: &Path,
    algorithm: ChecksumAlgorithm,
) -> Result<ChecksumValue, EngineError> {
    use std::fs::File;
    use std::io::Read;

    let mut file = File::open(path).map_err(|e| EngineError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let mut hasher = create_hasher(algorithm);
    let mut buffer = [0u8; 65536];

    loop {
        match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => hasher.update(&buffer[..n]),
            Err(e) => {
                return Err(EngineError::ReadError {
                    path: path.to_path_buf(),
                    source: e,
                })
            }
        }
    }

    Ok(hasher.finalize())
}

/// SHA-256 hex digest of an in-memory byte string.
///
/// Used for the enumeration digest the checkpoint relies on; always SHA-256
/// regardless of the run's file-hash algorithm, so checkpoints stay
/// comparable across hash configurations.
pub fn digest_hex(data: &[u8]) -> String {
    use sha2::Digest;
    let mut hasher = sha2::Sha256::default();
    hasher.update(data);
    format!("{:x}", hasher.finalize())
}
