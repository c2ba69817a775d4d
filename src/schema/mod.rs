//! Schema and service directory loading
//!
//! - [`loader`] reads per-service schema files (with `%include` directives) into
//!   ordered field lists
//! - [`directory`] reads the service directory
//! - [`registry`] joins the two into a name/port indexed table of immutable schemas

pub mod directory;
pub mod loader;
pub mod registry;

pub use directory::ServiceDirectory;
pub use loader::{SchemaLine, SchemaLoad, SchemaLoader, parse_line};
pub use registry::{SchemaRegistry, ServiceEntry};

/// Lines of `text` that carry content: trimmed, without blank lines and
/// without `#` or `//` comment lines.
pub(crate) fn content_lines(text: &str) -> impl Iterator<Item = &str> {
    text.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#') && !line.starts_with("//"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_lines_drop_blanks_and_comments() {
        let text = "  # comment\n\nA UINT8\n// also a comment\n   B BOOL  \n";
        let lines: Vec<&str> = content_lines(text).collect();
        assert_eq!(lines, vec!["A UINT8", "B BOOL"]);
    }
}
