// src/trigger/fingerprint.rs

use std::fmt;

use blake3::Hasher;

/// Deterministic digest of a step's trigger inputs (blake3, hex encoded).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn from_hex(hex: impl Into<String>) -> Self {
        Fingerprint(hex.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Order-sensitive digest of `inputs`.
///
/// Each input is framed with its length so that `["ab", "c"]` and
/// `["a", "bc"]` hash differently.
pub fn fingerprint<S: AsRef<str>>(inputs: &[S]) -> Fingerprint {
    let mut hasher = Hasher::new();
    hasher.update(&(inputs.len() as u64).to_le_bytes());
    for input in inputs {
        let bytes = input.as_ref().as_bytes();
        hasher.update(&(bytes.len() as u64).to_le_bytes());
        hasher.update(bytes);
    }
    Fingerprint(hasher.finalize().to_hex().to_string())
}

/// Whether a step has to run: true iff nothing is recorded for it or the
/// recorded fingerprint differs from the one computed from `current_inputs`.
pub fn should_run<S: AsRef<str>>(
    _step_id: &str,
    current_inputs: &[S],
    last_known: Option<&Fingerprint>,
) -> bool {
    match last_known {
        None => true,
        Some(last) => *last != fingerprint(current_inputs),
    }
}
