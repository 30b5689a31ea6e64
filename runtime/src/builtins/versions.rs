//! Decomposition and ordering of version strings, backing
//! `compareVersions` and `splitVersion`.
//!
//! A version string is broken into parts at every non-alphanumeric
//! character, and additionally whenever a run of digits meets a run of
//! letters. Separators themselves are not part of any component.

use std::cmp::Ordering;

/// One component of a version string: either a run of digits or a run
/// of other characters.
#[derive(PartialEq, Eq, Clone, Debug)]
pub enum VersionPart<'a> {
    Word(&'a str),
    Number(&'a str),
}

impl PartialOrd for VersionPart<'_> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for VersionPart<'_> {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (VersionPart::Number(s1), VersionPart::Number(s2)) => {
                // The split guarantees these parse.
                let n1: u64 = s1.parse().unwrap();
                let n2: u64 = s2.parse().unwrap();
                n1.cmp(&n2)
            }

            // an empty word always loses
            (VersionPart::Word(""), VersionPart::Number(_)) => Ordering::Less,
            (VersionPart::Number(_), VersionPart::Word("")) => Ordering::Greater,

            // `pre` loses unless the other part is also a `pre`
            (VersionPart::Word("pre"), VersionPart::Word("pre")) => Ordering::Equal,
            (VersionPart::Word("pre"), _) => Ordering::Less,
            (_, VersionPart::Word("pre")) => Ordering::Greater,

            // number wins against word
            (VersionPart::Number(_), VersionPart::Word(_)) => Ordering::Greater,
            (VersionPart::Word(_), VersionPart::Number(_)) => Ordering::Less,

            (VersionPart::Word(w1), VersionPart::Word(w2)) => w1.cmp(w2),
        }
    }
}

fn flush<'a>(
    parts: &mut Vec<VersionPart<'a>>,
    version: &'a str,
    range: std::ops::Range<usize>,
    digit: bool,
) {
    let text = &version[range];
    parts.push(if digit {
        VersionPart::Number(text)
    } else {
        VersionPart::Word(text)
    });
}

/// Split a version string into its ordered components.
pub fn split_version(version: &str) -> Vec<VersionPart<'_>> {
    let mut parts = vec![];
    let mut start = None::<usize>;
    let mut start_is_digit = false;

    for (pos, c) in version.char_indices() {
        if c.is_ascii_alphanumeric() {
            let is_digit = c.is_ascii_digit();
            match start {
                // a run continues as long as the character class stays
                // the same
                Some(_) if start_is_digit == is_digit => {}
                Some(s) => {
                    flush(&mut parts, version, s..pos, start_is_digit);
                    start = Some(pos);
                    start_is_digit = is_digit;
                }
                None => {
                    start = Some(pos);
                    start_is_digit = is_digit;
                }
            }
        } else if let Some(s) = start.take() {
            flush(&mut parts, version, s..pos, start_is_digit);
        }
    }

    if let Some(s) = start {
        flush(&mut parts, version, s..version.len(), start_is_digit);
    }

    parts
}

/// Compare two version strings componentwise, returning the sign of
/// the first non-equal pair. A missing component on one side compares
/// as the empty word.
pub fn compare_versions(a: &str, b: &str) -> Ordering {
    let mut left = split_version(a).into_iter();
    let mut right = split_version(b).into_iter();

    loop {
        match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (l, r) => {
                let l = l.unwrap_or(VersionPart::Word(""));
                let r = r.unwrap_or(VersionPart::Word(""));
                match l.cmp(&r) {
                    Ordering::Equal => continue,
                    other => return other,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splitting() {
        assert_eq!(
            split_version("2.3pre1"),
            vec![
                VersionPart::Number("2"),
                VersionPart::Number("3"),
                VersionPart::Word("pre"),
                VersionPart::Number("1"),
            ]
        );

        assert_eq!(
            split_version("1.2-a3_b"),
            vec![
                VersionPart::Number("1"),
                VersionPart::Number("2"),
                VersionPart::Word("a"),
                VersionPart::Number("3"),
                VersionPart::Word("b"),
            ]
        );

        assert_eq!(split_version(""), vec![]);
        assert_eq!(split_version(".."), vec![]);
    }

    #[test]
    fn splitting_is_stable_under_alnum_concat() {
        // concatenating purely-alphabetic tokens extends the last run
        assert_eq!(
            split_version("abc"),
            vec![VersionPart::Word("abc")]
        );
        assert_eq!(
            split_version("12"),
            vec![VersionPart::Number("12")]
        );
    }

    #[test]
    fn ordering_table() {
        assert_eq!(compare_versions("2.3pre1", "2.3"), Ordering::Less);
        assert_eq!(compare_versions("2.3.1", "2.3"), Ordering::Greater);
        assert_eq!(compare_versions("2.3pre3", "2.3pre12"), Ordering::Less);
        assert_eq!(compare_versions("2.3a", "2.3c"), Ordering::Less);
        assert_eq!(compare_versions("2.3", "2.3"), Ordering::Equal);
        assert_eq!(compare_versions("2.3", "2.3a"), Ordering::Less);
        assert_eq!(compare_versions("1.0", "1"), Ordering::Greater);
        assert_eq!(compare_versions("2.3pre", "2.3q"), Ordering::Less);
    }
}
