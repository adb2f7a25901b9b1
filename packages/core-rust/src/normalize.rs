//! Strips transparent wrapper layers from a fault to reach the meaningful cause.

use crate::fault::Fault;

/// Walks the cause chain while the current fault is a transparent wrapper
/// that carries a cause, and returns the first fault that is not.
///
/// Idempotent: `normalize(normalize(f))` is `normalize(f)`.
#[must_use]
pub fn normalize(fault: &Fault) -> &Fault {
    let mut current = fault;
    while let Fault::Wrapped {
        cause: Some(cause), ..
    } = current
    {
        current = &**cause;
    }
    current
}

impl Fault {
    /// Owning form of [`normalize`], used where the caller keeps the cause.
    #[must_use]
    pub fn into_normalized(self) -> Fault {
        let mut current = self;
        loop {
            match current {
                Fault::Wrapped {
                    cause: Some(cause), ..
                } => current = *cause,
                other => return other,
            }
        }
    }

    /// True when normalization would return this fault unchanged.
    #[must_use]
    pub fn is_normalized(&self) -> bool {
        !matches!(self, Fault::Wrapped { cause: Some(_), .. })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
