//! Input validation for the HTTP boundary
//! Prevents oversized payloads and malformed identifiers from reaching the engine

use anyhow::{anyhow, Result};

/// Maximum lengths for security
pub const MAX_USER_ID_LENGTH: usize = 128;
pub const MAX_MESSAGE_LENGTH: usize = 50_000; // 50KB
pub const MAX_TAG_LENGTH: usize = 64;
pub const MAX_TAGS_PER_MEMORY: usize = 32;

/// Validate user_id
pub fn validate_user_id(user_id: &str) -> Result<()> {
    if user_id.is_empty() {
        return Err(anyhow!("user_id cannot be empty"));
    }

    if user_id.len() > MAX_USER_ID_LENGTH {
        return Err(anyhow!(
            "user_id too long: {} chars (max: {})",
            user_id.len(),
            MAX_USER_ID_LENGTH
        ));
    }

    // Only allow alphanumeric, dash, underscore, @, .
    if !user_id
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '@' || c == '.')
    {
        return Err(anyhow!(
            "user_id contains invalid characters (allowed: alphanumeric, -, _, @, .)"
        ));
    }

    Ok(())
}

/// Validate an incoming message or memory content
pub fn validate_message(message: &str) -> Result<()> {
    if message.trim().is_empty() {
        return Err(anyhow!("message cannot be empty"));
    }

    if message.len() > MAX_MESSAGE_LENGTH {
        return Err(anyhow!(
            "message too long: {} chars (max: {})",
            message.len(),
            MAX_MESSAGE_LENGTH
        ));
    }

    Ok(())
}

/// Validate memory_id (UUID format)
pub fn validate_memory_id(memory_id: &str) -> Result<uuid::Uuid> {
    uuid::Uuid::parse_str(memory_id).map_err(|e| anyhow!("Invalid memory_id UUID format: {e}"))
}

/// Validate a tag list attached to a remember request
pub fn validate_tags(tags: &[String]) -> Result<()> {
    if tags.len() > MAX_TAGS_PER_MEMORY {
        return Err(anyhow!(
            "Too many tags: {} (max: {})",
            tags.len(),
            MAX_TAGS_PER_MEMORY
        ));
    }

    for tag in tags {
        if tag.is_empty() {
            return Err(anyhow!("tags cannot be empty"));
        }
        if tag.len() > MAX_TAG_LENGTH {
            return Err(anyhow!(
                "tag too long: {} chars (max: {})",
                tag.len(),
                MAX_TAG_LENGTH
            ));
        }
        if tag.chars().any(|c| c.is_control()) {
            return Err(anyhow!("tag contains invalid control characters"));
        }
    }

    Ok(())
}

/// Validate max_results / limit parameters
pub fn validate_limit(limit: usize) -> Result<()> {
    if limit == 0 {
        return Err(anyhow!("limit must be greater than 0"));
    }

    if limit > 1_000 {
        return Err(anyhow!("limit too large: {limit} (max: 1,000)"));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_user_id() {
        assert!(validate_user_id("alice").is_ok());
        assert!(validate_user_id("user-123").is_ok());
        assert!(validate_user_id("test_user").is_ok());
        assert!(validate_user_id("user@example.com").is_ok());
    }

    #[test]
    fn test_invalid_user_id() {
        assert!(validate_user_id("").is_err()); // empty
        assert!(validate_user_id("user/123").is_err()); // invalid char
        assert!(validate_user_id(&"a".repeat(200)).is_err()); // too long
    }

    #[test]
    fn test_valid_message() {
        assert!(validate_message("What's my dog's name?").is_ok());
    }

    #[test]
    fn test_invalid_message() {
        assert!(validate_message("").is_err());
        assert!(validate_message("   ").is_err());
        assert!(validate_message(&"x".repeat(100_000)).is_err());
    }

    #[test]
    fn test_memory_id_parsing() {
        assert!(validate_memory_id("550e8400-e29b-41d4-a716-446655440000").is_ok());
        assert!(validate_memory_id("not-a-uuid").is_err());
    }

    #[test]
    fn test_tags() {
        let valid: Vec<String> = vec!["preferences".to_string(), "ui".to_string()];
        assert!(validate_tags(&valid).is_ok());

        let too_many: Vec<String> = (0..64).map(|i| format!("tag{i}")).collect();
        assert!(validate_tags(&too_many).is_err());

        assert!(validate_tags(&["".to_string()]).is_err());
        assert!(validate_tags(&["a".repeat(100)]).is_err());
    }

    #[test]
    fn test_limit() {
        assert!(validate_limit(1).is_ok());
        assert!(validate_limit(100).is_ok());
        assert!(validate_limit(0).is_err());
        assert!(validate_limit(5_000).is_err());
    }
}
