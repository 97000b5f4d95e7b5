//! Validation helpers for DTOs.

use validator::ValidationError;

/// Accept only an explicit `true`.
///
/// Destructive admin operations carry a `confirm` flag that defaults to
/// `false` when omitted, so forgetting it is rejected the same way as `false`.
pub fn validate_confirmed(confirm: &bool) -> Result<(), ValidationError> {
    if *confirm {
        return Ok(());
    }

    let mut err = ValidationError::new("confirmation_required");
    err.message = Some("this operation requires confirm=true".into());
    Err(err)
}
