/// Validate a hostname.
/// Allows alphanumeric, hyphens, dots, and underscores. No path separators or shell metacharacters.
pub fn is_valid_hostname(hostname: &str) -> bool {
    if hostname.is_empty() || hostname.len() > 253 {
        return false;
    }
    hostname.chars().all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.' || c == '_')
}

/// Lowercase, with every run of non-alphanumerics collapsed to one '-'
pub fn slugify(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { '-' })
        .collect::<String>()
        .split('-')
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

/// File name of a device's rendered configuration
pub fn config_filename(device: &str) -> String {
    format!("{}.cfg", device)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_valid_hostname() {
        assert!(is_valid_hostname("leaf1"));
        assert!(is_valid_hostname("spine-01.par_1"));
        assert!(!is_valid_hostname(""));
        assert!(!is_valid_hostname("../etc/passwd"));
        assert!(!is_valid_hostname("leaf 1"));
        assert!(!is_valid_hostname(&"a".repeat(254)));
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("DCS-7050SX"), "dcs-7050sx");
        assert_eq!(slugify("Paris  DC / Hall 2"), "paris-dc-hall-2");
        assert_eq!(slugify("--leaf--"), "leaf");
    }

    #[test]
    fn test_config_filename() {
        assert_eq!(config_filename("leaf1"), "leaf1.cfg");
    }
}
