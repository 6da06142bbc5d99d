//! Configured ignore patterns, applied to paths relative to a watch root.

use std::path::Path;

use regex::Regex;

/// One compiled ignore pattern.
#[derive(Debug, Clone)]
enum Rule {
    /// Plain text, matches when it appears anywhere in the path.
    Substring(String),
    /// Pattern containing `*`. Only the first `*` is a wildcard; the rest of the
    /// pattern is literal. Unanchored, like the substring rule.
    Wildcard(Regex),
}

impl Rule {
    fn compile(pattern: &str) -> anyhow::Result<Self> {
        match pattern.split_once('*') {
            None => Ok(Rule::Substring(pattern.to_string())),
            Some((head, tail)) => {
                let source = format!("{}.*{}", regex::escape(head), regex::escape(tail));
                Ok(Rule::Wildcard(Regex::new(&source)?))
            }
        }
    }

    fn matches(&self, path: &str) -> bool {
        match self {
            Rule::Substring(text) => path.contains(text.as_str()),
            Rule::Wildcard(re) => re.is_match(path),
        }
    }
}

/// Decides whether a changed path is noise (build output, lockfiles, VCS internals).
///
/// This is deliberately narrow: substring checks plus a single-wildcard form.
/// It is not a glob engine.
#[derive(Debug, Clone, Default)]
pub struct IgnoreMatcher {
    rules: Vec<Rule>,
}

impl IgnoreMatcher {
    /// Compile `patterns`. Empty patterns are dropped, since they would match everything.
    pub fn new<S: AsRef<str>>(patterns: &[S]) -> anyhow::Result<Self> {
        let rules = patterns
            .iter()
            .map(AsRef::as_ref)
            .filter(|p| !p.is_empty())
            .map(Rule::compile)
            .collect::<anyhow::Result<Vec<_>>>()?;
        Ok(Self { rules })
    }

    /// Returns true if `path` matches any configured pattern.
    ///
    /// An empty path is never ignored; callers are expected not to forward one.
    pub fn is_ignored(&self, path: &str) -> bool {
        if path.is_empty() {
            return false;
        }
        self.rules.iter().any(|rule| rule.matches(path))
    }

    /// Path-typed convenience wrapper. Separators are normalised to `/` so the
    /// same pattern list behaves identically on every platform.
    pub fn is_ignored_path(&self, path: &Path) -> bool {
        let text = path.to_string_lossy().replace('\\', "/");
        self.is_ignored(&text)
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
