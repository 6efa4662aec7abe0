//! Workspace scope patterns.
//!
//! A scope pattern is a `/`-separated glob (`*`, `?`, `[...]`, `**`) that
//! names files or directories a unit may touch. A pattern always covers the
//! descendants of whatever it matches: `src/a` covers `src/a/lib.rs`, and
//! `src/*` covers `src/a/b/c.rs`.
//!
//! Two patterns overlap when at least one concrete path is covered by both.

use std::fmt;

use glob::{MatchOptions, Pattern};

#[derive(Debug, Clone, PartialEq, Eq)]
enum Token {
    Lit(char),
    /// `?`; matches exactly one character.
    AnyChar,
    /// `[...]` or `[!...]`; inclusive ranges, single chars as `(c, c)`.
    Class {
        negated: bool,
        ranges: Vec<(char, char)>,
    },
    /// `*`; any run of characters within one segment.
    AnyRun,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Part(Vec<Token>),
    /// `**`; any number of whole segments, including none.
    AnyDepth,
}

/// A validated, normalized scope pattern.
#[derive(Debug, Clone)]
pub struct ScopePattern {
    raw: String,
    absolute: bool,
    /// Segment count before the implicit trailing `**`.
    base_len: usize,
    segments: Vec<Segment>,
    matcher: Pattern,
}

impl PartialEq for ScopePattern {
    fn eq(&self, other: &Self) -> bool {
        self.raw == other.raw
    }
}

impl Eq for ScopePattern {}

impl fmt::Display for ScopePattern {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl ScopePattern {
    /// Parse and normalize `raw`. The error string explains what is wrong
    /// with the pattern.
    pub fn parse(raw: &str) -> Result<Self, String> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err("pattern is empty".to_string());
        }
        Pattern::new(trimmed).map_err(|e| e.to_string())?;

        let absolute = trimmed.starts_with('/');
        let mut parts = Vec::new();
        for part in trimmed.split('/') {
            match part {
                "" | "." => continue,
                ".." => return Err("parent directory segments are not allowed".to_string()),
                _ => parts.push(part),
            }
        }

        let mut segments: Vec<Segment> = parts.iter().map(|p| parse_segment(p)).collect();
        let base_len = segments.len();
        if segments.last() != Some(&Segment::AnyDepth) {
            segments.push(Segment::AnyDepth);
        }

        let normalized = if absolute {
            format!("/{}", parts.join("/"))
        } else {
            parts.join("/")
        };
        let matcher = Pattern::new(&normalized).map_err(|e| e.to_string())?;

        Ok(Self {
            raw: trimmed.to_string(),
            absolute,
            base_len,
            segments,
            matcher,
        })
    }

    pub fn as_str(&self) -> &str {
        &self.raw
    }

    /// True when some path is covered by both patterns.
    pub fn overlaps(&self, other: &ScopePattern) -> bool {
        self.absolute == other.absolute
            && sequences_intersect(
                &self.segments,
                &other.segments,
                |s| *s == Segment::AnyDepth,
                segments_compatible,
            )
    }

    /// True when `path` (or one of its ancestors) matches this pattern.
    pub fn covers(&self, path: &str) -> bool {
        if path.trim().starts_with('/') != self.absolute {
            return false;
        }
        if self.base_len == 0 {
            return true;
        }

        let parts: Vec<&str> = path
            .trim()
            .split('/')
            .filter(|p| !p.is_empty() && *p != ".")
            .collect();
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: true,
            require_literal_leading_dot: false,
        };

        (1..=parts.len()).any(|len| {
            let joined = parts[..len].join("/");
            let candidate = if self.absolute {
                format!("/{joined}")
            } else {
                joined
            };
            self.matcher.matches_with(&candidate, options)
        })
    }
}

/// Parse every pattern, stopping at the first invalid one.
pub fn parse_patterns<S: AsRef<str>>(raw: &[S]) -> Result<Vec<ScopePattern>, (String, String)> {
    raw.iter()
        .map(|p| ScopePattern::parse(p.as_ref()).map_err(|e| (p.as_ref().to_string(), e)))
        .collect()
}

/// First overlapping pair between two pattern sets, if any.
pub fn first_overlap<'a>(
    left: &'a [ScopePattern],
    right: &'a [ScopePattern],
) -> Option<(&'a ScopePattern, &'a ScopePattern)> {
    left.iter()
        .flat_map(|l| right.iter().map(move |r| (l, r)))
        .find(|(l, r)| l.overlaps(r))
}

fn parse_segment(part: &str) -> Segment {
    if part == "**" {
        return Segment::AnyDepth;
    }

    let mut tokens = Vec::new();
    let mut chars = part.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if tokens.last() != Some(&Token::AnyRun) {
                    tokens.push(Token::AnyRun);
                }
            }
            '?' => tokens.push(Token::AnyChar),
            '[' => tokens.push(parse_class(&mut chars)),
            other => tokens.push(Token::Lit(other)),
        }
    }
    Segment::Part(tokens)
}

/// Parse a class body after its opening `[`. `Pattern::new` has already
/// accepted the pattern, so the class is terminated.
fn parse_class(chars: &mut std::iter::Peekable<std::str::Chars<'_>>) -> Token {
    let negated = chars.next_if_eq(&'!').is_some();
    let mut ranges = Vec::new();
    // A leading `]` is a member, as in glob.
    let mut first = true;
    while let Some(c) = chars.next() {
        if c == ']' && !first {
            break;
        }
        first = false;
        let mut lookahead = chars.clone();
        if lookahead.next() == Some('-') {
            if let Some(hi) = lookahead.next().filter(|&hi| hi != ']') {
                chars.next();
                chars.next();
                ranges.push((c, hi));
                continue;
            }
        }
        ranges.push((c, c));
    }
    Token::Class { negated, ranges }
}

fn class_contains(ranges: &[(char, char)], c: char) -> bool {
    ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi)
}

/// Whether some single character matches both class tokens or literals.
fn char_sets_intersect(a: &Token, b: &Token) -> bool {
    match (a, b) {
        (Token::Lit(x), Token::Lit(y)) => x == y,
        (Token::Lit(c), Token::Class { negated, ranges })
        | (Token::Class { negated, ranges }, Token::Lit(c)) => {
            class_contains(ranges, *c) != *negated
        }
        (
            Token::Class {
                negated: false,
                ranges: pos,
            },
            Token::Class {
                negated: true,
                ranges: neg,
            },
        )
        | (
            Token::Class {
                negated: true,
                ranges: neg,
            },
            Token::Class {
                negated: false,
                ranges: pos,
            },
        ) => pos.iter().any(|&(lo, hi)| {
            // Candidates: the range start and every char just past a negated range.
            std::iter::once(lo)
                .chain(
                    neg.iter()
                        .filter_map(|&(_, nhi)| char::from_u32(nhi as u32 + 1)),
                )
                .filter(|&c| lo <= c && c <= hi)
                .any(|c| !class_contains(neg, c))
        }),
        (
            Token::Class {
                negated: false,
                ranges: x,
            },
            Token::Class {
                negated: false,
                ranges: y,
            },
        ) => x
            .iter()
            .any(|&(alo, ahi)| y.iter().any(|&(blo, bhi)| alo <= bhi && blo <= ahi)),
        // Two negated classes always leave characters in common.
        _ => true,
    }
}

fn segments_compatible(a: &Segment, b: &Segment) -> bool {
    match (a, b) {
        (Segment::Part(x), Segment::Part(y)) => {
            sequences_intersect(x, y, |t| *t == Token::AnyRun, tokens_compatible)
        }
        _ => true,
    }
}

fn tokens_compatible(a: &Token, b: &Token) -> bool {
    match (a, b) {
        (Token::AnyChar, _) | (_, Token::AnyChar) => true,
        (Token::AnyRun, _) | (_, Token::AnyRun) => true,
        _ => char_sets_intersect(a, b),
    }
}

/// Whether two sequences with "star" elements (matching any run of
/// elements, including none) can produce a common concrete sequence.
///
/// `reach[i][j]` holds for suffixes `a[i..]` and `b[j..]`.
fn sequences_intersect<T>(
    a: &[T],
    b: &[T],
    is_star: impl Fn(&T) -> bool,
    compatible: impl Fn(&T, &T) -> bool,
) -> bool {
    let (n, m) = (a.len(), b.len());
    let mut reach = vec![vec![false; m + 1]; n + 1];
    reach[n][m] = true;

    for i in (0..=n).rev() {
        for j in (0..=m).rev() {
            if i == n && j == m {
                continue;
            }
            let a_star = i < n && is_star(&a[i]);
            let b_star = j < m && is_star(&b[j]);
            reach[i][j] = if a_star {
                reach[i + 1][j] || (j < m && reach[i][j + 1])
            } else if b_star {
                reach[i][j + 1] || (i < n && reach[i + 1][j])
            } else if i < n && j < m {
                compatible(&a[i], &b[j]) && reach[i + 1][j + 1]
            } else {
                false
            };
        }
    }

    reach[0][0]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(raw: &str) -> ScopePattern {
        ScopePattern::parse(raw).unwrap()
    }

    #[test]
    fn glob_overlaps_file_in_same_directory() {
        assert!(p("src/a/*").overlaps(&p("src/a/utils.py")));
        assert!(p("src/a/utils.py").overlaps(&p("src/a/*")));
    }

    #[test]
    fn sibling_directories_do_not_overlap() {
        assert!(!p("src/a/**").overlaps(&p("src/b/**")));
        assert!(!p("src/a").overlaps(&p("src/ab")));
        assert!(!p("src/*.rs").overlaps(&p("src/lib.py")));
    }

    #[test]
    fn directory_prefix_covers_descendants() {
        assert!(p("docs").overlaps(&p("docs/guide/intro.md")));
        assert!(p("docs/").overlaps(&p("docs/**/*.md")));
        assert!(p("src/*").overlaps(&p("src/a/b/c.rs")));
    }

    #[test]
    fn wildcards_intersect_by_characters() {
        assert!(p("src/*_test.rs").overlaps(&p("src/graph*")));
        assert!(p("src/?.rs").overlaps(&p("src/[ab].rs")));
        assert!(!p("src/??.rs").overlaps(&p("src/abc.rs")));
        assert!(p("**/*.rs").overlaps(&p("crates/core/src/lib.rs")));
    }

    #[test]
    fn character_classes_are_compared_by_contents() {
        assert!(!p("src/[!a].rs").overlaps(&p("src/a.rs")));
        assert!(p("src/[!a].rs").overlaps(&p("src/b.rs")));
        assert!(!p("src/[a-c].rs").overlaps(&p("src/[x-z].rs")));
        assert!(p("src/[a-c].rs").overlaps(&p("src/[c-f].rs")));
        assert!(!p("src/[ab].rs").overlaps(&p("src/[!a-b].rs")));
        assert!(p("src/[abc].rs").overlaps(&p("src/[!ab].rs")));
        assert!(p("src/[!a].rs").overlaps(&p("src/[!b].rs")));
        assert!(p("src/[]x].rs").overlaps(&p("src/].rs")));
    }

    #[test]
    fn absolute_and_relative_never_overlap() {
        assert!(!p("/etc/**").overlaps(&p("etc/**")));
        assert!(p("/etc/**").overlaps(&p("/etc/hosts")));
    }

    #[test]
    fn root_pattern_overlaps_everything() {
        assert!(p(".").overlaps(&p("src/lib.rs")));
        assert!(p("./").covers("anything/at/all"));
    }

    #[test]
    fn rejects_invalid_patterns() {
        assert!(ScopePattern::parse("").is_err());
        assert!(ScopePattern::parse("src/[a").is_err());
        assert!(ScopePattern::parse("../outside").is_err());
    }

    #[test]
    fn covers_checks_ancestors() {
        let pattern = p("src/a/*");
        assert!(pattern.covers("src/a/utils.py"));
        assert!(pattern.covers("src/a/nested/deep.py"));
        assert!(!pattern.covers("src/b/utils.py"));
        assert!(!pattern.covers("src/a"));
        assert!(p("./src/lib.rs").covers("src/lib.rs"));
    }

    #[test]
    fn first_overlap_reports_pair() {
        let left = vec![p("src/a/**"), p("docs/**")];
        let right = vec![p("tests/**"), p("docs/api.md")];
        let (l, r) = first_overlap(&left, &right).unwrap();
        assert_eq!(l.as_str(), "docs/**");
        assert_eq!(r.as_str(), "docs/api.md");
        assert!(first_overlap(&left, &[p("tests/**")]).is_none());
    }
}
