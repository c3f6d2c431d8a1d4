use crate::error::{CoreError, Result};

pub const PROVIDER_NAME_MAX_LEN: usize = 32;
pub const CHECK_NAME_MAX_LEN: usize = 128;
pub const SCAN_NAME_MAX_LEN: usize = 128;

/// Trim and bound-check a user supplied name. Returns the trimmed value.
pub fn normalize_name(field: &str, raw: &str, max_len: usize) -> Result<String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(CoreError::InvalidInput(format!("{field} must not be blank")));
    }

    let len = trimmed.chars().count();
    if len > max_len {
        return Err(CoreError::InvalidInput(format!(
            "{field} must be at most {max_len} characters (got {len})"
        )));
    }

    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trims_surrounding_whitespace() {
        assert_eq!(normalize_name("name", "  AWS ", 32).unwrap(), "AWS");
    }

    #[test]
    fn rejects_blank_and_oversized_names() {
        assert!(matches!(
            normalize_name("name", "   ", 32),
            Err(CoreError::InvalidInput(_))
        ));
        let long = "x".repeat(33);
        assert!(matches!(
            normalize_name("name", &long, 32),
            Err(CoreError::InvalidInput(_))
        ));
        assert!(normalize_name("name", &"x".repeat(32), 32).is_ok());
    }
}
