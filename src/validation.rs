use crate::error::{Error, Result};

const MAX_NAME_LEN: usize = 100;
const MAX_TITLE_LEN: usize = 512;

fn is_valid_name_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '-' || c == '_' || c == '.'
}

fn validate_name(name: &str, entity: &str) -> Result<()> {
    if name.is_empty() {
        return Err(Error::BadRequest(format!("{entity} name cannot be empty")));
    }
    if name.len() > MAX_NAME_LEN {
        return Err(Error::BadRequest(format!(
            "{entity} name cannot exceed {MAX_NAME_LEN} characters"
        )));
    }
    if !name.chars().all(is_valid_name_char) {
        return Err(Error::BadRequest(format!(
            "{entity} name can only contain alphanumeric characters, hyphens, underscores, and periods"
        )));
    }
    if name.starts_with('.') {
        return Err(Error::BadRequest(format!(
            "{entity} name cannot start with a period"
        )));
    }
    Ok(())
}

pub fn validate_bag_name(name: &str) -> Result<()> {
    validate_name(name, "Bag")
}

pub fn validate_recipe_name(name: &str) -> Result<()> {
    validate_name(name, "Recipe")
}

pub fn validate_role_name(name: &str) -> Result<()> {
    validate_name(name, "Role")
}

/// Titles are free text but must be non-blank, bounded, and free of
/// control characters.
pub fn validate_title(title: &str) -> Result<()> {
    if title.trim().is_empty() {
        return Err(Error::BadRequest("Title cannot be empty".to_string()));
    }
    if title.len() > MAX_TITLE_LEN {
        return Err(Error::BadRequest(format!(
            "Title cannot exceed {MAX_TITLE_LEN} bytes"
        )));
    }
    if title.chars().any(char::is_control) {
        return Err(Error::BadRequest(
            "Title cannot contain control characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names() {
        assert!(validate_bag_name("core").is_ok());
        assert!(validate_recipe_name("docs-v2.1").is_ok());
        assert!(validate_bag_name("").is_err());
        assert!(validate_bag_name("has space").is_err());
        assert!(validate_role_name(".hidden").is_err());
        assert!(validate_bag_name(&"a".repeat(101)).is_err());
    }

    #[test]
    fn test_titles() {
        assert!(validate_title("Home").is_ok());
        assert!(validate_title("$:/core/ui/PageTemplate").is_ok());
        assert!(validate_title("With spaces and ünïcode").is_ok());
        assert!(validate_title("   ").is_err());
        assert!(validate_title("line\nbreak").is_err());
    }
}
