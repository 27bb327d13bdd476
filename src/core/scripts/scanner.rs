//! Risk Scanner
//!
//! Textual heuristic that flags calls which spawn processes, evaluate code
//! dynamically or import modules by name. It is a deterrent surfaced to the
//! user before running a script, not a security boundary: aliasing or any
//! indirection defeats it.

use lazy_static::lazy_static;
use regex::Regex;
use serde::Serialize;
use std::fmt;

/// A fixed risk pattern
pub struct RiskPattern {
    /// Stable identifier
    pub id: &'static str,
    /// Human readable label shown to the user
    pub label: &'static str,
    regex: Regex,
}

impl RiskPattern {
    fn new(id: &'static str, label: &'static str, pattern: &str) -> Self {
        Self {
            id,
            label,
            regex: Regex::new(pattern).expect("risk pattern must compile"),
        }
    }

    /// Check the pattern against already comment-stripped code
    pub fn is_match(&self, code: &str) -> bool {
        self.regex.is_match(code)
    }
}

impl fmt::Debug for RiskPattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RiskPattern")
            .field("id", &self.id)
            .field("label", &self.label)
            .finish()
    }
}

// `(?:^|[^\w])` stands in for a negative look-behind on identifier chars,
// so `obj.eval(` is flagged while `my_eval(` is not.
lazy_static! {
    /// Patterns in priority order; warnings are reported in this order.
    pub static ref RISK_PATTERNS: Vec<RiskPattern> = vec![
        RiskPattern::new("subprocess_call", "subprocess.call", r"\bsubprocess\s*\.\s*call\b"),
        RiskPattern::new("subprocess_run", "subprocess.run", r"\bsubprocess\s*\.\s*run\b"),
        RiskPattern::new("subprocess_popen", "subprocess.Popen", r"\bsubprocess\s*\.\s*Popen\b"),
        RiskPattern::new("os_system", "os.system()", r"\bos\s*\.\s*system\s*\("),
        RiskPattern::new("eval", "eval()", r"(?m)(?:^|[^\w])eval\s*\("),
        RiskPattern::new("exec", "exec()", r"(?m)(?:^|[^\w])exec\s*\("),
        RiskPattern::new("dynamic_import", "__import__()", r"(?m)(?:^|[^\w])__import__\s*\("),
        RiskPattern::new("os_execute", "os.execute()", r"\bos\s*\.\s*execute\s*\("),
        RiskPattern::new("io_popen", "io.popen()", r"\bio\s*\.\s*popen\s*\("),
        RiskPattern::new("load", "load()", r"(?m)(?:^|[^\w])load(?:string)?\s*\("),
        RiskPattern::new("dofile", "dofile()", r"(?m)(?:^|[^\w])(?:dofile|loadfile)\s*\("),
    ];
}

/// One risky operation found in a script
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RiskWarning {
    pub pattern_id: &'static str,
    pub label: &'static str,
}

impl RiskWarning {
    /// Display string presented to the user
    pub fn message(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for RiskWarning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "⚠️ Potentially risky operation detected: {}", self.label)
    }
}

/// Scan script source and return one warning per matched pattern.
///
/// Comment lines (`--` or `#` after leading whitespace) and Lua block
/// comments are ignored. Pure and order-stable: warnings follow
/// [`RISK_PATTERNS`] order, never source order.
pub fn scan(source: &str) -> Vec<RiskWarning> {
    let code = strip_comments(source);
    RISK_PATTERNS
        .iter()
        .filter(|pattern| pattern.is_match(&code))
        .map(|pattern| RiskWarning {
            pattern_id: pattern.id,
            label: pattern.label,
        })
        .collect()
}

/// Drop block comments, then every line whose first non-blank text is a comment
fn strip_comments(source: &str) -> String {
    let without_blocks = strip_block_comments(source);
    without_blocks
        .lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            !(trimmed.starts_with("--") || trimmed.starts_with('#'))
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Remove `--[[ ... ]]` / `--[==[ ... ]==]` comments; an unterminated one runs to EOF.
///
/// Quoted strings and long-bracket strings are skipped while looking for
/// comments, so a `--[[` inside a string literal opens nothing.
fn strip_block_comments(source: &str) -> String {
    let bytes = source.as_bytes();
    let mut out = String::with_capacity(source.len());
    let mut copied = 0;
    let mut i = 0;

    // Every delimiter is ASCII, so each index stopped at is a char boundary
    while i < bytes.len() {
        match bytes[i] {
            quote @ (b'"' | b'\'') => i = skip_quoted(bytes, i + 1, quote),
            b'-' if bytes.get(i + 1) == Some(&b'-') => match long_bracket_level(bytes, i + 2) {
                Some(level) => {
                    let end = long_bracket_end(source, i + 2 + level + 2, level);
                    out.push_str(&source[copied..i]);
                    // Keep line structure so line-based filtering stays aligned
                    out.extend(source[i..end].chars().filter(|c| *c == '\n'));
                    i = end;
                    copied = end;
                }
                None => {
                    i = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
                }
            },
            b'#' if at_line_start(source, i) => {
                i = source[i..].find('\n').map_or(bytes.len(), |n| i + n);
            }
            b'[' => match long_bracket_level(bytes, i) {
                Some(level) => i = long_bracket_end(source, i + level + 2, level),
                None => i += 1,
            },
            _ => i += 1,
        }
    }

    out.push_str(&source[copied..]);
    out
}

/// Only blanks between the previous newline and `at`
fn at_line_start(source: &str, at: usize) -> bool {
    source[..at]
        .rsplit('\n')
        .next()
        .map_or(true, |prefix| prefix.trim().is_empty())
}

/// Index just past the closing quote; an unterminated string ends at the newline
fn skip_quoted(bytes: &[u8], mut i: usize, quote: u8) -> usize {
    while i < bytes.len() {
        match bytes[i] {
            b'\\' => i += 2,
            b'\n' => return i,
            b if b == quote => return i + 1,
            _ => i += 1,
        }
    }
    bytes.len()
}

/// `[[` is level 0, `[==[` level 2; `None` when `at` does not open a long bracket
fn long_bracket_level(bytes: &[u8], at: usize) -> Option<usize> {
    if bytes.get(at) != Some(&b'[') {
        return None;
    }
    let level = bytes[at + 1..].iter().take_while(|b| **b == b'=').count();
    (bytes.get(at + 1 + level) == Some(&b'[')).then_some(level)
}

/// Index just past the matching `]=*]`, or end of input
fn long_bracket_end(source: &str, body: usize, level: usize) -> usize {
    let close = format!("]{}]", "=".repeat(level));
    source[body..]
        .find(&close)
        .map_or(source.len(), |end| body + end + close.len())
}
