// ─────────────────────────────────────────────────────────────────────
// Deadman Kernel — Replay Fingerprint
// ─────────────────────────────────────────────────────────────────────
//! Incremental SHA-256 digest over the decision stream.
//!
//! Each folded record is serialized as `{"type": tag, "record": ...}`
//! followed by a newline, so the digest binds both values and their
//! sequence. Two runs over the same events with the same config and
//! clock must produce equal digests; inequality is a nondeterminism
//! defect.

use serde::Serialize;
use sha2::{Digest, Sha256};

use deadman_types::{KernelError, KernelResult};

#[derive(Serialize)]
struct Tagged<'a, T: Serialize> {
    #[serde(rename = "type")]
    tag: &'a str,
    record: &'a T,
}

/// Incremental digest of the session's decision stream.
#[derive(Clone)]
pub struct Fingerprint {
    hasher: Sha256,
}

impl Fingerprint {
    pub fn new() -> Self {
        Self {
            hasher: Sha256::new(),
        }
    }

    /// Fold one tagged record into the digest.
    ///
    /// Canonical form is serde's declaration-order JSON, which is
    /// stable for every record type the pipeline folds.
    pub fn fold<T: Serialize>(&mut self, tag: &str, record: &T) -> KernelResult<()> {
        let line = serde_json::to_string(&Tagged { tag, record })
            .map_err(|e| KernelError::Telemetry(format!("fingerprint serialization: {e}")))?;
        self.hasher.update(line.as_bytes());
        self.hasher.update(b"\n");
        Ok(())
    }

    /// Hex digest of the stream folded so far, without consuming.
    pub fn hex(&self) -> String {
        let digest = self.hasher.clone().finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }

    /// Final hex digest.
    pub fn finish(self) -> String {
        let digest = self.hasher.finalize();
        digest.iter().map(|b| format!("{b:02x}")).collect()
    }
}

impl Default for Fingerprint {
    fn default() -> Self {
        Self::new()
    }
}
