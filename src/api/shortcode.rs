use anyhow::Result;
use rand::distr::{Alphanumeric, Distribution};

use crate::storage::Storage;

/// Length of the first generated code
pub const DEFAULT_CODE_LENGTH: usize = 6;

/// Retries after the first collision; each one is a character longer
pub const MAX_EXTRA_ATTEMPTS: usize = 6;

/// Random `[a-zA-Z0-9]` code of `length` characters
pub fn generate_short_code(length: usize) -> String {
    Alphanumeric
        .sample_iter(rand::rng())
        .take(length)
        .map(char::from)
        .collect()
}

/// Caller-chosen codes may only use ASCII letters and digits
pub fn is_valid_custom_code(code: &str) -> bool {
    !code.is_empty() && code.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Find an unused generated code.
///
/// Tries `DEFAULT_CODE_LENGTH` first, then up to `MAX_EXTRA_ATTEMPTS`
/// codes of strictly increasing length. Returns `None` once every
/// candidate was taken.
pub async fn allocate_generated_code<G>(
    storage: &dyn Storage,
    mut generate: G,
) -> Result<Option<String>>
where
    G: FnMut(usize) -> String,
{
    for length in DEFAULT_CODE_LENGTH..=DEFAULT_CODE_LENGTH + MAX_EXTRA_ATTEMPTS {
        let code = generate(length);
        if !storage.exists(&code).await? {
            return Ok(Some(code));
        }
        tracing::debug!(short_id = %code, length, "generated short code collided");
    }

    Ok(None)
}
