use tokio_util::sync::CancellationToken;

/// Truncate a string to `max_chars` characters, appending "..." when cut.
///
/// Works on character boundaries so multi-byte text in email bodies never panics.
pub fn safe_truncate(s: &str, max_chars: usize) -> String {
    if s.chars().count() <= max_chars {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max_chars.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

pub fn is_token_cancelled(cancellation_token: &Option<CancellationToken>) -> bool {
    cancellation_token
        .as_ref()
        .is_some_and(|t| t.is_cancelled())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_safe_truncate_ascii() {
        assert_eq!(safe_truncate("see you thursday", 40), "see you thursday");
        assert_eq!(safe_truncate("see you thursday", 10), "see you...");
        assert_eq!(safe_truncate("hello", 3), "...");
    }

    #[test]
    fn test_safe_truncate_multibyte() {
        let body = "Grüße aus München 🚲";
        assert_eq!(safe_truncate(body, 50), body);
        assert_eq!(safe_truncate(body, 8), "Grüße...");
    }

    #[test]
    fn test_is_token_cancelled() {
        assert!(!is_token_cancelled(&None));

        let token = CancellationToken::new();
        let maybe = Some(token.clone());
        assert!(!is_token_cancelled(&maybe));
        token.cancel();
        assert!(is_token_cancelled(&maybe));
    }
}
