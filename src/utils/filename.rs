//! Destination filenames for chart archives.

/// Upper bound on a sanitized name component, in characters.
pub const MAX_FILENAME_CHARS: usize = 200;

/// Sanitize a string for use as a filename component.
///
/// Filesystem-illegal and control characters become `_`, runs of whitespace
/// collapse to a single space, and the result is capped at
/// [`MAX_FILENAME_CHARS`] characters.
pub fn sanitize_filename(name: &str) -> String {
    let replaced: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0' => '_',
            c if c.is_whitespace() => ' ',
            c if c.is_control() => '_',
            c => c,
        })
        .collect();

    let collapsed = replaced.split_whitespace().collect::<Vec<_>>().join(" ");

    let truncated: String = collapsed.chars().take(MAX_FILENAME_CHARS).collect();
    let trimmed = truncated.trim();
    if trimmed.is_empty() {
        "untitled".to_string()
    } else {
        trimmed.to_string()
    }
}

/// Archive filename for a chart: `"<title> - <artist>.zip"`.
pub fn chart_filename(title: &str, artist: &str) -> String {
    format!(
        "{} - {}.zip",
        sanitize_filename(title),
        sanitize_filename(artist)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_replaces_illegal_chars() {
        assert_eq!(sanitize_filename("AC/DC: Live?"), "AC_DC_ Live_");
        assert_eq!(sanitize_filename("a<b>c|d\"e*f\\g"), "a_b_c_d_e_f_g");
    }

    #[test]
    fn test_sanitize_collapses_whitespace() {
        assert_eq!(sanitize_filename("  Through \t the\n\nFire  "), "Through the Fire");
    }

    #[test]
    fn test_sanitize_truncates_by_chars() {
        let long = "é".repeat(300);
        let out = sanitize_filename(&long);
        assert_eq!(out.chars().count(), MAX_FILENAME_CHARS);
    }

    #[test]
    fn test_sanitize_empty() {
        assert_eq!(sanitize_filename("   "), "untitled");
    }

    #[test]
    fn test_chart_filename() {
        assert_eq!(chart_filename("Foo", "Bar"), "Foo - Bar.zip");
        assert_eq!(chart_filename("Who?", "Me/You"), "Who_ - Me_You.zip");
    }
}
