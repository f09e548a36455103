//! Regex wordlist scanning and redaction.
//!
//! A wordlist is one case-insensitive regex per line. Named lists live on disk
//! as `<dir>/<name>.txt` and are compiled once per process.

use dashmap::DashMap;
use regex::{NoExpand, Regex, RegexBuilder};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};

use crate::error::{AppError, AppResult};

static LIST_NAME_REGEX: OnceLock<Regex> = OnceLock::new();

fn list_name_regex() -> &'static Regex {
    LIST_NAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-z0-9_-]+$").expect("Wordlist name regex is valid"))
}

/// Where the patterns come from.
#[derive(Debug, Clone, Copy)]
pub enum WordlistSource<'a> {
    /// `<dir>/<name>.txt`
    Named(&'a str),
    /// Inline patterns (e.g. `POLICY_CUSTOM_WORDLIST`)
    Custom(&'a [String]),
}

/// Outcome of scanning one input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct WordlistMatch {
    pub matched: bool,
    /// Source text of every pattern that hit the original input
    pub patterns: Vec<String>,
    /// Input with every hit replaced by the marker
    pub redacted: String,
}

#[derive(Debug)]
struct CompiledPattern {
    source: String,
    regex: Regex,
}

/// Wordlist scanner with a per-process cache of compiled named lists.
pub struct WordlistMatcher {
    dir: PathBuf,
    compiled: DashMap<String, Arc<Vec<CompiledPattern>>>,
}

impl WordlistMatcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into(), compiled: DashMap::new() }
    }

    /// Scan `input` against `source`, replacing hits with `marker`.
    ///
    /// Patterns are tested against the original input but replaced in the
    /// working copy, in list order, so a later pattern may see text an earlier
    /// one already redacted.
    pub fn scan(&self, source: WordlistSource<'_>, input: &str, marker: &str) -> AppResult<WordlistMatch> {
        let patterns = match source {
            WordlistSource::Named(name) => self.named(name)?,
            WordlistSource::Custom(lines) => Arc::new(compile(lines.iter().map(String::as_str))?),
        };

        let mut result = WordlistMatch { redacted: input.to_string(), ..Default::default() };
        for pattern in patterns.iter() {
            if pattern.regex.is_match(input) {
                result.patterns.push(pattern.source.clone());
                result.redacted =
                    pattern.regex.replace_all(&result.redacted, NoExpand(marker)).into_owned();
            }
        }
        result.matched = !result.patterns.is_empty();
        Ok(result)
    }

    fn named(&self, name: &str) -> AppResult<Arc<Vec<CompiledPattern>>> {
        if let Some(hit) = self.compiled.get(name) {
            return Ok(Arc::clone(hit.value()));
        }

        if !list_name_regex().is_match(name) {
            return Err(AppError::Wordlist {
                name: name.to_string(),
                message: "invalid wordlist name".to_string(),
            });
        }

        let path = self.dir.join(format!("{}.txt", name));
        let content = std::fs::read_to_string(&path).map_err(|e| AppError::Wordlist {
            name: name.to_string(),
            message: format!("{}: {}", path.display(), e),
        })?;

        let patterns = Arc::new(compile(content.lines())?);
        tracing::debug!("[Wordlist] Compiled '{}' ({} patterns)", name, patterns.len());
        self.compiled.insert(name.to_string(), Arc::clone(&patterns));
        Ok(patterns)
    }
}

fn compile<'a>(lines: impl Iterator<Item = &'a str>) -> AppResult<Vec<CompiledPattern>> {
    lines
        .map(|line| line.trim_end_matches('\r'))
        .filter(|line| !line.trim().is_empty())
        .map(|line| -> AppResult<CompiledPattern> {
            let regex = RegexBuilder::new(line).case_insensitive(true).build()?;
            Ok(CompiledPattern { source: line.to_string(), regex })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn matcher_with(name: &str, content: &str) -> (WordlistMatcher, TempDir) {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join(format!("{}.txt", name)), content).unwrap();
        (WordlistMatcher::new(dir.path()), dir)
    }

    #[test]
    fn test_named_list_matches_case_insensitively() {
        let (matcher, _dir) = matcher_with("profanity", "darn\n\nheck\n");
        let result = matcher.scan(WordlistSource::Named("profanity"), "Well DARN it", "****").unwrap();

        assert!(result.matched);
        assert_eq!(result.patterns, vec!["darn".to_string()]);
        assert_eq!(result.redacted, "Well **** it");
    }

    #[test]
    fn test_no_match_leaves_input() {
        let (matcher, _dir) = matcher_with("profanity", "darn\n");
        let result = matcher.scan(WordlistSource::Named("profanity"), "all good", "****").unwrap();
        assert!(!result.matched);
        assert!(result.patterns.is_empty());
        assert_eq!(result.redacted, "all good");
    }

    #[test]
    fn test_blank_lines_do_not_match_everything() {
        let (matcher, _dir) = matcher_with("empty", "\n   \n\r\n");
        let result = matcher.scan(WordlistSource::Named("empty"), "anything", "****").unwrap();
        assert!(!result.matched);
    }

    #[test]
    fn test_marker_is_literal() {
        let patterns = vec![r"\d{3}-\d{4}".to_string()];
        let result =
            WordlistMatcher::new("unused").scan(WordlistSource::Custom(&patterns), "call 555-1234", "$0").unwrap();
        assert_eq!(result.redacted, "call $0");
    }

    #[test]
    fn test_later_patterns_see_redacted_text() {
        // "secret" hits the original input, but the first pass already removed it
        let patterns = vec!["top secret".to_string(), "secret".to_string()];
        let result = WordlistMatcher::new("unused")
            .scan(WordlistSource::Custom(&patterns), "a top secret plan", "[x]")
            .unwrap();
        assert_eq!(result.patterns.len(), 2);
        assert_eq!(result.redacted, "a [x] plan");
    }

    #[test]
    fn test_named_list_is_cached() {
        let (matcher, dir) = matcher_with("cached", "alpha\n");
        assert!(matcher.scan(WordlistSource::Named("cached"), "alpha", "*").unwrap().matched);

        // Changes on disk are not picked up once compiled
        fs::write(dir.path().join("cached.txt"), "beta\n").unwrap();
        assert!(matcher.scan(WordlistSource::Named("cached"), "alpha", "*").unwrap().matched);
    }

    #[test]
    fn test_missing_list_is_error() {
        let dir = TempDir::new().unwrap();
        let err = WordlistMatcher::new(dir.path())
            .scan(WordlistSource::Named("nope"), "x", "*")
            .unwrap_err();
        assert!(matches!(err, AppError::Wordlist { ref name, .. } if name == "nope"));
    }

    #[test]
    fn test_path_like_name_is_rejected() {
        let dir = TempDir::new().unwrap();
        let err = WordlistMatcher::new(dir.path())
            .scan(WordlistSource::Named("../etc/passwd"), "x", "*")
            .unwrap_err();
        assert!(matches!(err, AppError::Wordlist { .. }));
    }

    #[test]
    fn test_invalid_pattern_is_error() {
        let patterns = vec!["(unclosed".to_string()];
        let err = WordlistMatcher::new("unused")
            .scan(WordlistSource::Custom(&patterns), "x", "*")
            .unwrap_err();
        assert!(matches!(err, AppError::Pattern(_)));
    }
}
