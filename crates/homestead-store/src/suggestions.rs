//! Fuzzy matching for unknown package names

/// Maximum Levenshtein distance to consider for suggestions
const MAX_SUGGESTION_DISTANCE: usize = 3;

/// Closest candidate to `input`, if any is within the distance threshold
pub fn closest_match<'a, I>(input: &str, candidates: I) -> Option<String>
where
    I: IntoIterator<Item = &'a str>,
{
    candidates
        .into_iter()
        .filter_map(|candidate| {
            let distance = strsim::levenshtein(input, candidate);
            (distance <= MAX_SUGGESTION_DISTANCE && distance > 0).then_some((distance, candidate))
        })
        .min_by(|a, b| a.0.cmp(&b.0).then_with(|| a.1.cmp(b.1)))
        .map(|(_, candidate)| candidate.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_closest_match() {
        let names = ["core/redis", "core/nginx", "core/glibc"];
        assert_eq!(
            closest_match("core/reddis", names),
            Some("core/redis".to_string())
        );
        assert_eq!(closest_match("core/postgresql", names), None);
    }

    #[test]
    fn test_exact_match_is_not_suggested() {
        assert_eq!(closest_match("core/redis", ["core/redis"]), None);
    }
}
