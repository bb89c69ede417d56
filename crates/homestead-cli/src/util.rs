//! Shared utility functions for CLI commands

/// Format a byte size as a human-readable string
#[must_use]
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

/// Truncate a hex digest for display, never panicking on short input
#[must_use]
pub fn truncate_hash(hash: &str, max_len: usize) -> &str {
    hash.get(..max_len).unwrap_or(hash)
}

/// Join identifiers for display, or `-` when empty
pub fn join_or_dash<T: ToString>(items: &[T]) -> String {
    if items.is_empty() {
        "-".to_string()
    } else {
        items
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_size() {
        assert_eq!(format_size(512), "512 B");
        assert_eq!(format_size(1536), "1.50 KB");
        assert_eq!(format_size(5242880), "5.00 MB");
        assert_eq!(format_size(1073741824), "1.00 GB");
    }

    #[test]
    fn test_truncate_hash() {
        assert_eq!(truncate_hash("abcdef1234567890", 8), "abcdef12");
        assert_eq!(truncate_hash("abc", 16), "abc");
        assert_eq!(truncate_hash("", 16), "");
    }

    #[test]
    fn test_join_or_dash() {
        assert_eq!(join_or_dash::<String>(&[]), "-");
        assert_eq!(join_or_dash(&[1, 2]), "1, 2");
    }
}
