//! Visibility policy for directory entries.

use regex::Regex;

/// Decides which entry names show up in listings.
#[derive(Debug, Clone, Default)]
pub struct ExclusionFilter {
    include_dotfiles: bool,
    pattern: Option<Regex>,
}

impl ExclusionFilter {
    pub fn new(include_dotfiles: bool, pattern: Option<Regex>) -> Self {
        Self {
            include_dotfiles,
            pattern,
        }
    }

    /// Returns `true` when `name` should be listed.
    ///
    /// Dotfiles are hidden unless enabled; names matching the exclude
    /// pattern are hidden either way.
    pub fn include(&self, name: &str) -> bool {
        if !self.include_dotfiles && name.starts_with('.') {
            return false;
        }
        match &self.pattern {
            Some(pattern) => !pattern.is_match(name),
            None => true,
        }
    }

    pub fn pattern(&self) -> Option<&Regex> {
        self.pattern.as_ref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_hides_only_dotfiles() {
        let filter = ExclusionFilter::default();
        assert!(filter.include("readme.md"));
        assert!(filter.include("docs"));
        assert!(!filter.include(".git"));
        assert!(!filter.include(".env"));
    }

    #[test]
    fn test_dotfiles_enabled() {
        let filter = ExclusionFilter::new(true, None);
        assert!(filter.include(".git"));
        assert!(filter.include("readme.md"));
    }

    #[test]
    fn test_pattern_excludes_regardless_of_dotfiles() {
        let pattern = Regex::new(r"\.log$").unwrap();
        for include_dotfiles in [false, true] {
            let filter = ExclusionFilter::new(include_dotfiles, Some(pattern.clone()));
            assert!(!filter.include("server.log"));
            assert!(!filter.include(".hidden.log"));
            assert!(filter.include("server.txt"));
            assert_eq!(filter.include(".hidden"), include_dotfiles);
        }
    }

    #[test]
    fn test_pattern_is_unanchored() {
        let filter = ExclusionFilter::new(true, Some(Regex::new("tmp").unwrap()));
        assert!(!filter.include("my-tmp-file"));
        assert!(filter.include("temp"));
    }
}
