//! Manifest validation

use regex::Regex;
use sdk::errors::{PluginError, ValidationFailure};
use sdk::manifest::{Manifest, ManifestDraft};
use std::sync::OnceLock;

/// Required fields, in the order they are reported
pub const REQUIRED_FIELDS: [&str; 5] = ["id", "name", "version", "author", "main"];

fn id_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("valid id regex"))
}

/// Whether `id` is usable as a plugin identifier
pub fn is_valid_id(id: &str) -> bool {
    id_pattern().is_match(id)
}

/// Turn a parsed draft into a manifest
///
/// Reports the first missing field in [`REQUIRED_FIELDS`] order, then an
/// id outside `[a-z0-9_-]+`.
pub fn validate(draft: ManifestDraft) -> Result<Manifest, PluginError> {
    let missing = |field: &'static str| PluginError::Validation(ValidationFailure::MissingField(field));

    let id = draft.id.ok_or_else(|| missing("id"))?;
    let name = draft.name.ok_or_else(|| missing("name"))?;
    let version = draft.version.ok_or_else(|| missing("version"))?;
    let author = draft.author.ok_or_else(|| missing("author"))?;
    let main = draft.main.ok_or_else(|| missing("main"))?;

    if !is_valid_id(&id) {
        return Err(PluginError::Validation(ValidationFailure::InvalidId(id)));
    }

    Ok(Manifest {
        id,
        name,
        version,
        author,
        description: draft.description,
        main,
    })
}
