//! Ignore list applied to local filenames before grouping.

/// Filename patterns excluded from mirroring.
///
/// A pattern starting with `*` matches filenames ending with the rest of the
/// pattern; any other pattern matches filenames containing it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreList {
    patterns: Vec<String>,
}

impl IgnoreList {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut list = Self::default();
        for pattern in patterns {
            list.add(pattern.into());
        }
        list
    }

    /// Parse ignore-file content: one pattern per line, `#` starts a comment line.
    pub fn parse(content: &str) -> Self {
        Self::new(
            content
                .lines()
                .map(str::trim)
                .filter(|line| !line.is_empty() && !line.starts_with('#')),
        )
    }

    fn add(&mut self, pattern: String) {
        if !self.patterns.contains(&pattern) {
            self.patterns.push(pattern);
        }
    }

    pub fn matches(&self, filename: &str) -> bool {
        self.patterns.iter().any(|pattern| match pattern.strip_prefix('*') {
            Some(suffix) => filename.ends_with(suffix),
            None => filename.contains(pattern.as_str()),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_suffix_wildcard() {
        let ignore = IgnoreList::new(["*.tar.5"]);
        assert!(ignore.matches("db_20260101_000000_full_x.tar.5"));
        assert!(!ignore.matches("db_20260101_000000_full_x.tar.50"));
    }

    #[test]
    fn test_substring_match() {
        let ignore = IgnoreList::new(["_test_"]);
        assert!(ignore.matches("db_test_20260101_000000_full.tar"));
        assert!(!ignore.matches("db_20260101_000000_full.tar"));
    }

    #[test]
    fn test_parse_skips_comments_and_duplicates() {
        let ignore = IgnoreList::parse("# keep out\n\n  staging \nstaging\n*.tmp\n");
        assert_eq!(ignore.len(), 2);
        assert!(ignore.matches("staging_20260101_000000_full.tar"));
        assert!(ignore.matches("x.tar.tmp"));
        assert!(!ignore.matches("# keep out"));
    }
}
