//! Forced argument serialization.
//!
//! Arguments of interactive and background calls can be deep-copied through
//! MsgPack before reaching the target, so a local service behaves as if it
//! sat across a process boundary: mutations made by the callee are not
//! visible to the caller, and non-serializable arguments fail early.

use callguard_core::Fault;
use serde::de::DeserializeOwned;
use serde::Serialize;

/// Deep-copies `args` by encoding them to named MsgPack and decoding the
/// bytes into a fresh value.
///
/// # Errors
///
/// Returns `Fault::Serialization` naming `method` if either direction fails.
pub fn deep_copy<A>(method: &str, args: &A) -> Result<A, Fault>
where
    A: Serialize + DeserializeOwned,
{
    let bytes = rmp_serde::to_vec_named(args).map_err(|e| Fault::Serialization {
        method: method.to_string(),
        reason: e.to_string(),
    })?;

    #[allow(clippy::cast_precision_loss)]
    let kib = bytes.len() as f64 / 1024.0;
    tracing::debug!(method, size_kib = kib, "arguments serialized");

    rmp_serde::from_slice(&bytes).map_err(|e| Fault::Serialization {
        method: method.to_string(),
        reason: e.to_string(),
    })
}
