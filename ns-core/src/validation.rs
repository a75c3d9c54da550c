//! Grammar checks for user-supplied namespace metadata.

use crate::error::{Result, ValidationError};

pub const NAME_MIN_LEN: usize = 3;
pub const NAME_MAX_LEN: usize = 63;
pub const DESCRIPTION_MAX_LEN: usize = 255;

fn invalid(name: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidName {
        name: name.to_string(),
        reason: reason.into(),
    }
}

/// Validate a namespace name
///
/// Names are 3-63 characters of lowercase ASCII letters, digits and `-`,
/// and must start and end with a letter or digit.
pub fn validate_namespace_name(name: &str) -> Result<()> {
    let len = name.chars().count();
    if !(NAME_MIN_LEN..=NAME_MAX_LEN).contains(&len) {
        return Err(invalid(
            name,
            format!(
                "must be between {} and {} characters (got {})",
                NAME_MIN_LEN, NAME_MAX_LEN, len
            ),
        ));
    }

    if let Some(bad) = name
        .chars()
        .find(|c| !(c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-'))
    {
        return Err(invalid(
            name,
            format!(
                "contains invalid character '{}' (only lowercase alphanumeric and '-' allowed)",
                bad.escape_default()
            ),
        ));
    }

    if name.starts_with('-') || name.ends_with('-') {
        return Err(invalid(name, "must start and end with an alphanumeric character"));
    }

    Ok(())
}

pub fn validate_description(description: &str) -> Result<()> {
    let len = description.chars().count();
    if len > DESCRIPTION_MAX_LEN {
        return Err(ValidationError::DescriptionTooLong {
            len,
            max: DESCRIPTION_MAX_LEN,
        });
    }
    Ok(())
}
