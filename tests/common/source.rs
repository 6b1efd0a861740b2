use kprof::error::Result;
use kprof::models::{KeyRecord, KeyType};
use kprof::scanner::{KeySource, RecordStream};
use std::cell::Cell;
use std::collections::BTreeSet;

/// Key source over a fixed list of records.
///
/// Tracks how many cursors were opened and released.
#[derive(Debug, Default)]
pub struct MemorySource {
    records: Vec<KeyRecord>,
    opened: Cell<usize>,
    released: Cell<usize>,
}

impl MemorySource {
    pub fn new(records: Vec<KeyRecord>) -> Self {
        Self {
            records,
            ..Self::default()
        }
    }

    pub fn opened(&self) -> usize {
        self.opened.get()
    }

    pub fn released(&self) -> usize {
        self.released.get()
    }
}

impl KeySource for MemorySource {
    fn open(&self, match_pattern: &str, accepted: &BTreeSet<KeyType>) -> Result<RecordStream<'_>> {
        self.opened.set(self.opened.get() + 1);
        Ok(Box::new(MemoryCursor {
            source: self,
            pattern: Glob::new(match_pattern),
            accepted: accepted.clone(),
            position: 0,
        }))
    }
}

struct MemoryCursor<'a> {
    source: &'a MemorySource,
    pattern: Glob,
    accepted: BTreeSet<KeyType>,
    position: usize,
}

impl Iterator for MemoryCursor<'_> {
    type Item = Result<KeyRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        while let Some(record) = self.source.records.get(self.position) {
            self.position += 1;
            if self.accepted.contains(&record.key_type) && self.pattern.matches(&record.name) {
                return Some(Ok(record.clone()));
            }
        }
        None
    }
}

impl Drop for MemoryCursor<'_> {
    fn drop(&mut self) {
        self.source.released.set(self.source.released.get() + 1);
    }
}

/// Store-style glob matching: `*`, `?`, `[abc]`, `[a-z]`, `[^a]` and `\` escapes.
pub fn glob_match(pattern: &str, name: &str) -> bool {
    Glob::new(pattern).matches(name)
}

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Star,
    Any,
    Literal(char),
    Class { negate: bool, ranges: Vec<(char, char)> },
}

impl Token {
    fn matches(&self, c: char) -> bool {
        match self {
            Token::Star | Token::Any => true,
            Token::Literal(lit) => *lit == c,
            Token::Class { negate, ranges } => {
                ranges.iter().any(|&(lo, hi)| lo <= c && c <= hi) != *negate
            }
        }
    }
}

/// A pattern compiled once per cursor.
#[derive(Debug, Clone)]
pub struct Glob {
    tokens: Vec<Token>,
}

impl Glob {
    pub fn new(pattern: &str) -> Self {
        let p: Vec<char> = pattern.chars().collect();
        let mut tokens = Vec::new();
        let mut i = 0;

        while i < p.len() {
            match p[i] {
                '*' => {
                    tokens.push(Token::Star);
                    i += 1;
                }
                '?' => {
                    tokens.push(Token::Any);
                    i += 1;
                }
                '[' => match parse_class(&p[i + 1..]) {
                    Some((class, consumed)) => {
                        tokens.push(class);
                        i += 1 + consumed;
                    }
                    // unterminated class matches a literal '['
                    None => {
                        tokens.push(Token::Literal('['));
                        i += 1;
                    }
                },
                '\\' if i + 1 < p.len() => {
                    tokens.push(Token::Literal(p[i + 1]));
                    i += 2;
                }
                c => {
                    tokens.push(Token::Literal(c));
                    i += 1;
                }
            }
        }

        Self { tokens }
    }

    /// Two-pointer match keeping only the latest `*` as the backtrack point,
    /// so the cost stays within pattern length times name length.
    pub fn matches(&self, name: &str) -> bool {
        let n: Vec<char> = name.chars().collect();
        let (mut t, mut i) = (0, 0);
        let mut star: Option<(usize, usize)> = None;

        while i < n.len() {
            match self.tokens.get(t) {
                Some(Token::Star) => {
                    star = Some((t + 1, i));
                    t += 1;
                    continue;
                }
                Some(token) if token.matches(n[i]) => {
                    t += 1;
                    i += 1;
                    continue;
                }
                _ => {}
            }

            match star {
                Some((resume, consumed)) => {
                    star = Some((resume, consumed + 1));
                    t = resume;
                    i = consumed + 1;
                }
                None => return false,
            }
        }

        self.tokens[t..].iter().all(|token| *token == Token::Star)
    }
}

/// Parse the class body after `[`. Returns the class and the number of
/// pattern chars consumed including the closing `]`.
fn parse_class(body: &[char]) -> Option<(Token, usize)> {
    let mut i = 0;
    let negate = body.first() == Some(&'^');
    if negate {
        i += 1;
    }

    let mut ranges = Vec::new();
    while i < body.len() && body[i] != ']' {
        if body[i] == '\\' && i + 1 < body.len() {
            ranges.push((body[i + 1], body[i + 1]));
            i += 2;
        } else if i + 2 < body.len() && body[i + 1] == '-' && body[i + 2] != ']' {
            let (lo, hi) = if body[i] <= body[i + 2] {
                (body[i], body[i + 2])
            } else {
                (body[i + 2], body[i])
            };
            ranges.push((lo, hi));
            i += 3;
        } else {
            ranges.push((body[i], body[i]));
            i += 1;
        }
    }

    if i >= body.len() {
        return None;
    }
    Some((Token::Class { negate, ranges }, i + 1))
}
