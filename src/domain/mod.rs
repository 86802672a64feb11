//! Storefront domain: records, pricing rules and view-facing aggregates.

pub mod aggregates;
pub mod events;
pub mod pricing;
pub mod value_objects;

use validator::ValidationErrors;

/// The first form error, by field name, as a user-facing message.
pub fn validation_message(errors: &ValidationErrors) -> String {
    let fields = errors.field_errors();
    let mut names: Vec<&str> = fields.keys().copied().collect();
    names.sort_unstable();
    names
        .first()
        .and_then(|name| fields.get(name))
        .and_then(|errs| errs.first())
        .map(|e| e.message.as_ref().map_or_else(|| e.code.to_string(), |m| m.to_string()))
        .unwrap_or_else(|| "Invalid input".to_string())
}
