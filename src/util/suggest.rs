//! Name suggestions for unknown references
//!
//! Used by every pass that resolves a name against a known set: job
//! dependencies, imported names, fragment names, type references.

/// Edit distance between two strings (insert, delete, substitute)
pub fn levenshtein(a: &str, b: &str) -> usize {
    let b_chars: Vec<char> = b.chars().collect();
    let mut prev: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, ca) in a.chars().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b_chars.iter().enumerate() {
            let cost = usize::from(ca != *cb);
            curr[j + 1] = (prev[j] + cost).min(prev[j + 1] + 1).min(curr[j] + 1);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b_chars.len()]
}

/// Closest candidate within a length-scaled distance, ties broken by order
///
/// The threshold is half the longer name (at least 1), so `biuld`
/// finds `build` while `x` never matches `deploy`.
pub fn did_you_mean<'a, I>(name: &str, candidates: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<(usize, &'a str)> = None;
    for candidate in candidates {
        if candidate == name {
            continue;
        }
        let distance = levenshtein(name, candidate);
        let limit = (name.chars().count().max(candidate.chars().count()) / 2).max(1);
        if distance > limit {
            continue;
        }
        if best.map_or(true, |(d, _)| distance < d) {
            best = Some((distance, candidate));
        }
    }
    best.map(|(_, c)| c)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_levenshtein_basics() {
        assert_eq!(levenshtein("", ""), 0);
        assert_eq!(levenshtein("abc", ""), 3);
        assert_eq!(levenshtein("kitten", "sitting"), 3);
        assert_eq!(levenshtein("build", "biuld"), 2);
    }

    #[test]
    fn test_did_you_mean_picks_closest() {
        let names = ["build", "deploy", "test"];
        assert_eq!(did_you_mean("biuld", names), Some("build"));
        assert_eq!(did_you_mean("tset", names), Some("test"));
        assert_eq!(did_you_mean("zzzzzz", names), None);
    }

    #[test]
    fn test_did_you_mean_skips_exact_and_prefers_first_tie() {
        assert_eq!(did_you_mean("ab", ["ab"]), None);
        assert_eq!(did_you_mean("aa", ["ab", "ba"]), Some("ab"));
    }
}
