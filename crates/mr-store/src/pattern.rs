//! Glob matching for `KEYS`.
//!
//! Supports `*`, `?`, `[...]` classes with ranges and `^` negation, and
//! backslash escapes. Matching is byte-wise and case sensitive.

/// Outcome of matching one pattern token against one subject byte.
enum Step {
    Star,
    Matched(usize),
    Mismatch,
}

/// Runs in `O(pattern * subject)`: a mismatch rewinds to the most recent
/// `*` and lets it absorb one more byte.
#[must_use]
pub fn glob_matches(pattern: &[u8], subject: &[u8]) -> bool {
    let mut p = 0;
    let mut s = 0;
    let mut last_star: Option<(usize, usize)> = None;
    while s < subject.len() {
        if p < pattern.len() {
            match step(pattern, p, subject[s]) {
                Step::Star => {
                    p += 1;
                    last_star = Some((p, s));
                    continue;
                }
                Step::Matched(next) => {
                    p = next;
                    s += 1;
                    continue;
                }
                Step::Mismatch => {}
            }
        }
        let Some((resume, absorbed)) = last_star else {
            return false;
        };
        p = resume;
        s = absorbed + 1;
        last_star = Some((resume, s));
    }
    pattern[p..].iter().all(|&token| token == b'*')
}

fn step(pattern: &[u8], p: usize, byte: u8) -> Step {
    let rest = &pattern[p + 1..];
    let matched = |ok: bool, next: usize| if ok { Step::Matched(next) } else { Step::Mismatch };
    match pattern[p] {
        b'*' => Step::Star,
        b'?' => Step::Matched(p + 1),
        b'[' => {
            let (ok, after) = match_class(rest, byte);
            matched(ok, pattern.len() - after.len())
        }
        b'\\' if !rest.is_empty() => matched(rest[0] == byte, p + 2),
        literal => matched(literal == byte, p + 1),
    }
}

/// Evaluates the class body that follows `[` against `byte`. Returns the
/// verdict and the pattern remaining after the closing `]`. An unterminated
/// class consumes the rest of the pattern.
fn match_class(body: &[u8], byte: u8) -> (bool, &[u8]) {
    let (negate, mut cursor) = match body.split_first() {
        Some((&b'^', rest)) => (true, rest),
        _ => (false, body),
    };
    let mut matched = false;
    loop {
        match cursor {
            [] => break,
            [b']', rest @ ..] => {
                cursor = rest;
                break;
            }
            [b'\\', escaped, rest @ ..] => {
                matched |= *escaped == byte;
                cursor = rest;
            }
            [low, b'-', high, rest @ ..] if *high != b']' => {
                let (low, high) = if low <= high { (*low, *high) } else { (*high, *low) };
                matched |= (low..=high).contains(&byte);
                cursor = rest;
            }
            [single, rest @ ..] => {
                matched |= *single == byte;
                cursor = rest;
            }
        }
    }
    (matched != negate, cursor)
}

#[cfg(test)]
mod tests {
    use super::glob_matches;

    #[test]
    fn wildcards() {
        assert!(glob_matches(b"*", b""));
        assert!(glob_matches(b"*", b"anything"));
        assert!(glob_matches(b"h?llo", b"hello"));
        assert!(!glob_matches(b"h?llo", b"hllo"));
        assert!(glob_matches(b"h*llo", b"heeeello"));
        assert!(glob_matches(b"user:*:name", b"user:42:name"));
        assert!(!glob_matches(b"user:*:name", b"user:42:age"));
    }

    #[test]
    fn classes_and_ranges() {
        assert!(glob_matches(b"h[ae]llo", b"hallo"));
        assert!(!glob_matches(b"h[ae]llo", b"hillo"));
        assert!(glob_matches(b"h[^e]llo", b"hallo"));
        assert!(!glob_matches(b"h[^e]llo", b"hello"));
        assert!(glob_matches(b"h[a-b]llo", b"hbllo"));
        assert!(glob_matches(b"h[b-a]llo", b"hallo"));
        assert!(!glob_matches(b"h[a-b]llo", b"hcllo"));
    }

    #[test]
    fn escapes_match_literally() {
        assert!(glob_matches(br"a\*b", b"a*b"));
        assert!(!glob_matches(br"a\*b", b"axb"));
        assert!(glob_matches(br"[\]]", b"]"));
    }

    #[test]
    fn repeated_stars_do_not_blow_up() {
        let subject = vec![b'a'; 4096];
        assert!(!glob_matches(b"a*a*a*a*a*a*a*a*a*a*b", &subject));
        assert!(glob_matches(b"a*a*a*a*a*a*a*a*a*a*a", &subject));
        assert!(glob_matches(b"**a**", b"xax"));
        assert!(glob_matches(b"*:*:end", b"a:b:c:end"));
        assert!(!glob_matches(b"*:*:end", b"a:end"));
        assert!(glob_matches(b"*[0-9]", b"key7"));
    }

    #[test]
    fn unterminated_class_consumes_pattern() {
        assert!(glob_matches(b"a[bc", b"ab"));
        assert!(!glob_matches(b"a[bc", b"ad"));
    }
}
