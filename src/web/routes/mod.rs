pub mod attendance;
pub mod auth;
pub mod billing;
pub mod children;
pub mod dashboard;
pub mod events;
pub mod forms;
pub mod health;
pub mod incidents;
pub mod registrations;
pub mod sessions;
pub mod waitlist;

/// Accepts only same-origin absolute paths as redirect targets.
pub fn sanitize_return_to(value: &str) -> Option<&str> {
    let v = value.trim();
    if !v.starts_with('/') {
        return None;
    }
    if v.starts_with("//") || v.starts_with("/\\") || v.contains("://") {
        return None;
    }
    if v.chars().any(char::is_control) {
        return None;
    }
    Some(v)
}

/// Appends `notice=<notice>` to a path that may already carry a query.
pub fn with_notice(target: &str, notice: &str) -> String {
    let sep = if target.contains('?') { "&" } else { "?" };
    format!("{}{}notice={}", target, sep, notice)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_return_to() {
        assert_eq!(sanitize_return_to("/dashboard"), Some("/dashboard"));
        assert_eq!(sanitize_return_to("  /forms/1?x=2 "), Some("/forms/1?x=2"));
        assert_eq!(sanitize_return_to("https://evil.example"), None);
        assert_eq!(sanitize_return_to("//evil.example"), None);
        assert_eq!(sanitize_return_to("/\\evil.example"), None);
        assert_eq!(sanitize_return_to("/redirect?to=http://x"), None);
        assert_eq!(sanitize_return_to("dashboard"), None);
        assert_eq!(sanitize_return_to("/a\r\nSet-Cookie: x"), None);
    }

    #[test]
    fn test_with_notice() {
        assert_eq!(with_notice("/dashboard", "saved"), "/dashboard?notice=saved");
        assert_eq!(with_notice("/forms/1?child=2", "saved"), "/forms/1?child=2&notice=saved");
    }
}
