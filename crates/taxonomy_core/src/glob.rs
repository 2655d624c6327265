//! Shell-glob matching for vocabulary name filters.
//!
//! # Responsibility
//! - Decide whether a vocabulary name passes an optional `fnmatch`-style filter.
//!
//! # Invariants
//! - Matching is anchored at both ends and case-sensitive.
//! - `*` also matches `/` and leading dots; names are plain strings, not paths.
//! - An unterminated `[` is matched literally.

use regex::Regex;

/// Compiled glob pattern.
#[derive(Debug, Clone)]
pub struct GlobPattern {
    source: String,
    regex: Option<Regex>,
}

impl GlobPattern {
    pub fn new(pattern: impl Into<String>) -> Self {
        let source = pattern.into();
        let regex = Regex::new(&translate(&source)).ok();
        Self { source, regex }
    }

    pub fn as_str(&self) -> &str {
        &self.source
    }

    pub fn matches(&self, name: &str) -> bool {
        match &self.regex {
            Some(regex) => regex.is_match(name),
            // Untranslatable patterns degrade to literal comparison.
            None => self.source == name,
        }
    }
}

/// Optional vocabulary name filter; an absent pattern matches every name.
#[derive(Debug, Clone, Default)]
pub struct NameFilter {
    pattern: Option<GlobPattern>,
}

impl NameFilter {
    /// Filter that accepts every name.
    pub fn any() -> Self {
        Self::default()
    }

    pub fn new(pattern: Option<&str>) -> Self {
        Self {
            pattern: pattern.map(GlobPattern::new),
        }
    }

    pub fn pattern(&self) -> Option<&str> {
        self.pattern.as_ref().map(GlobPattern::as_str)
    }

    pub fn matches(&self, name: &str) -> bool {
        self.pattern
            .as_ref()
            .map_or(true, |pattern| pattern.matches(name))
    }
}

/// One-shot form of [`NameFilter::matches`].
pub fn matches(pattern: Option<&str>, name: &str) -> bool {
    NameFilter::new(pattern).matches(name)
}

fn translate(pattern: &str) -> String {
    let chars = pattern.chars().collect::<Vec<_>>();
    let mut out = String::from(r"(?s)\A");
    let mut index = 0;

    while index < chars.len() {
        match chars[index] {
            '*' => out.push_str(".*"),
            '?' => out.push('.'),
            '[' => {
                if let Some((class, next)) = translate_class(&chars, index + 1) {
                    out.push_str(&class);
                    index = next;
                    continue;
                }
                out.push_str(r"\[");
            }
            '\\' if index + 1 < chars.len() => {
                index += 1;
                push_literal(&mut out, chars[index]);
            }
            other => push_literal(&mut out, other),
        }
        index += 1;
    }

    out.push_str(r"\z");
    out
}

/// Translates a bracket expression starting after `[`.
///
/// Returns the regex class and the index after the closing `]`, or `None`
/// when the expression is unterminated.
fn translate_class(chars: &[char], start: usize) -> Option<(String, usize)> {
    let mut index = start;
    let negated = matches!(chars.get(index), Some('!') | Some('^'));
    if negated {
        index += 1;
    }

    let mut items = String::new();
    let mut first = true;
    loop {
        let mut low = *chars.get(index)?;
        if low == ']' && !first {
            break;
        }
        first = false;
        if low == '\\' {
            index += 1;
            low = *chars.get(index)?;
        }
        index += 1;

        let is_range = chars.get(index) == Some(&'-')
            && chars.get(index + 1).is_some_and(|next| *next != ']');
        if !is_range {
            push_class_char(&mut items, low);
            continue;
        }

        let mut high = chars[index + 1];
        index += 2;
        if high == '\\' {
            high = *chars.get(index)?;
            index += 1;
        }
        // Reversed ranges match nothing.
        if low <= high {
            push_class_char(&mut items, low);
            items.push('-');
            push_class_char(&mut items, high);
        }
    }

    let class = match (negated, items.is_empty()) {
        (true, true) => ".".to_string(),
        (false, true) => r"[^\x00-\x{10FFFF}]".to_string(),
        (true, false) => format!("[^{items}]"),
        (false, false) => format!("[{items}]"),
    };
    Some((class, index + 1))
}

fn push_literal(out: &mut String, value: char) {
    out.push_str(&regex::escape(value.encode_utf8(&mut [0; 4])));
}

fn push_class_char(out: &mut String, value: char) {
    if matches!(value, '\\' | ']' | '[' | '^' | '-' | '&' | '~') {
        out.push('\\');
    }
    out.push(value);
}
