//! Slug derivation for taxonomy names and validation of client-supplied entry slugs.

use slug::slugify;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SlugError {
    #[error("slug source text is empty")]
    EmptyInput,
    #[error("failed to derive slug from `{input}`")]
    Unrepresentable { input: String },
    #[error("`{slug}` is not a valid slug (allowed: a-z, 0-9, `-`, `_`)")]
    Invalid { slug: String },
}

/// Derive a slug from a human-readable name such as a tag or category.
pub fn derive_slug(input: &str) -> Result<String, SlugError> {
    if input.trim().is_empty() {
        return Err(SlugError::EmptyInput);
    }

    let candidate = slugify(input);
    if candidate.is_empty() {
        return Err(SlugError::Unrepresentable {
            input: input.to_string(),
        });
    }
    Ok(candidate)
}

/// Entry slugs are chosen by the author and used verbatim in URLs and upload paths.
pub fn validate_entry_slug(slug: &str) -> Result<(), SlugError> {
    let valid = !slug.is_empty()
        && slug
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_'));
    if valid {
        Ok(())
    } else {
        Err(SlugError::Invalid {
            slug: slug.to_string(),
        })
    }
}
