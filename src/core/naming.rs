//! Kubernetes-safe resource names.

/// Lowercase `value`, turning every run of characters outside `[a-z0-9]`
/// into a single `-` and trimming dashes from both ends.
pub fn to_valid_name(value: &str) -> String {
    let mut out = String::new();
    let mut prev_was_dash = false;

    for ch in value.trim().chars() {
        let normalized = match ch {
            'a'..='z' | '0'..='9' => ch,
            'A'..='Z' => ch.to_ascii_lowercase(),
            _ => '-',
        };

        if normalized == '-' {
            if out.is_empty() || prev_was_dash {
                continue;
            }
            prev_was_dash = true;
        } else {
            prev_was_dash = false;
        }
        out.push(normalized);
    }

    while out.ends_with('-') {
        out.pop();
    }
    out
}

/// Same as [`to_valid_name`] but never longer than `max_len` characters.
pub fn to_valid_name_truncated(value: &str, max_len: usize) -> String {
    let mut name = to_valid_name(value);
    if name.len() > max_len {
        name.truncate(max_len);
        while name.ends_with('-') {
            name.pop();
        }
    }
    name
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn collapses_and_lowercases() {
        assert_eq!(to_valid_name("environment-My_Cluster--staging"), "environment-my-cluster-staging");
        assert_eq!(to_valid_name("  jx.rocks  "), "jx-rocks");
        assert_eq!(to_valid_name("--logs--"), "logs");
    }

    #[test]
    fn truncation_does_not_leave_trailing_dash() {
        assert_eq!(to_valid_name_truncated("my-very-long-cluster-name-vo", 8), "my-very");
        assert_eq!(to_valid_name_truncated("short", 30), "short");
    }
}
