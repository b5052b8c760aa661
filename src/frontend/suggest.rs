use strsim::levenshtein;

/// Up to 3 candidates within an edit distance scaled to the needle's length.
pub fn suggest<S: AsRef<str>>(needle: &str, candidates: impl IntoIterator<Item = S>) -> Vec<String> {
    let needle = needle.trim();
    if needle.is_empty() {
        return vec![];
    }

    let max_dist = match needle.len() {
        0..=3 => 1,
        4..=6 => 2,
        7..=10 => 3,
        _ => 4,
    };

    let mut scored: Vec<(usize, String)> = candidates
        .into_iter()
        .map(|c| c.as_ref().to_string())
        .filter(|c| !c.is_empty() && c != needle)
        .map(|c| (levenshtein(needle, &c), c))
        .filter(|(d, _)| *d <= max_dist)
        .collect();
    scored.sort_by(|(da, a), (db, b)| da.cmp(db).then(a.len().cmp(&b.len())).then(a.cmp(b)));
    scored.dedup_by(|a, b| a.1 == b.1);

    scored.into_iter().take(3).map(|(_, s)| s).collect()
}

pub fn did_you_mean<S: AsRef<str>>(needle: &str, candidates: impl IntoIterator<Item = S>) -> Option<String> {
    let v = suggest(needle, candidates);
    match v.as_slice() {
        [] => None,
        [only] => Some(format!("did you mean `{}`?", only)),
        many => Some(format!(
            "did you mean one of: {}?",
            many.iter()
                .map(|s| format!("`{}`", s))
                .collect::<Vec<_>>()
                .join(", ")
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::{did_you_mean, suggest};

    #[test]
    fn suggests_close_parameter_names() {
        assert_eq!(
            did_you_mean("vale", ["value", "other"]),
            Some("did you mean `value`?".to_string())
        );
        assert_eq!(did_you_mean("zzzzzz", ["value"]), None);
    }

    #[test]
    fn ranks_by_distance_then_length() {
        assert_eq!(suggest("ab", ["abc", "ab", "xb", "abcd"]), vec!["xb", "abc"]);
    }
}
