//! Item name matching for [`crate::DiskImage::find`]

use diskimage_core::{Error, Result};
use regex::RegexBuilder;

/// Options controlling how a find pattern is matched
#[derive(Debug, Clone)]
pub struct FindOptions {
    /// Match case-insensitively
    pub ignore_case: bool,
    /// Treat the pattern as a regular expression instead of an exact name
    pub regex: bool,
}

impl Default for FindOptions {
    fn default() -> Self {
        Self {
            ignore_case: true,
            regex: false,
        }
    }
}

/// A compiled find pattern
pub(crate) enum Matcher {
    Exact { pattern: String, ignore_case: bool },
    Regex(regex::Regex),
}

impl Matcher {
    pub(crate) fn new(pattern: &str, options: &FindOptions) -> Result<Self> {
        if options.regex {
            let compiled = RegexBuilder::new(pattern)
                .case_insensitive(options.ignore_case)
                .build()
                .map_err(|e| Error::unsupported(format!("bad find pattern: {}", e)))?;
            Ok(Matcher::Regex(compiled))
        } else {
            Ok(Matcher::Exact {
                pattern: pattern.to_string(),
                ignore_case: options.ignore_case,
            })
        }
    }

    pub(crate) fn matches(&self, name: &str) -> bool {
        match self {
            Matcher::Exact {
                pattern,
                ignore_case: true,
            } => name.eq_ignore_ascii_case(pattern),
            Matcher::Exact { pattern, .. } => name == pattern,
            Matcher::Regex(regex) => regex.is_match(name),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_match_ignores_case_by_default() {
        let matcher = Matcher::new("README.TXT", &FindOptions::default()).unwrap();
        assert!(matcher.matches("readme.txt"));
        assert!(matcher.matches("README.TXT"));
        assert!(!matcher.matches("readme.txt.bak"));
    }

    #[test]
    fn test_exact_match_case_sensitive() {
        let options = FindOptions {
            ignore_case: false,
            regex: false,
        };
        let matcher = Matcher::new("Notes.md", &options).unwrap();
        assert!(matcher.matches("Notes.md"));
        assert!(!matcher.matches("notes.md"));
    }

    #[test]
    fn test_regex_match() {
        let options = FindOptions {
            ignore_case: true,
            regex: true,
        };
        let matcher = Matcher::new(r".*\.log$", &options).unwrap();
        assert!(matcher.matches("app.log"));
        assert!(matcher.matches("SYSTEM.LOG"));
        assert!(!matcher.matches("app.log.1"));
    }

    #[test]
    fn test_bad_regex_is_an_error() {
        let options = FindOptions {
            ignore_case: true,
            regex: true,
        };
        assert!(Matcher::new("(unclosed", &options).is_err());
    }
}
