// 🎯 Match scoring - fuzzy similarity between a query and a candidate name

/// Lowercase and trim, the form both sides are compared in
pub fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// True when query and name are equal after normalization
pub fn is_exact_match(query: &str, name: &str) -> bool {
    normalize(query) == normalize(name)
}

/// Similarity score between two normalized strings, 0-100
///
/// score = round(100 * 2 * LCS / (len(a) + len(b)))
///
/// which is the indel-distance ratio: every edit needed to turn one string
/// into the other costs one point per inserted or deleted character.
/// Either side empty scores 0. Halves round to even.
///
/// Example:
/// - ratio("fido", "fido") = 100
/// - ratio("fido", "fida") = 75
pub fn ratio(a: &str, b: &str) -> u32 {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();
    let total = a_chars.len() + b_chars.len();

    if a_chars.is_empty() || b_chars.is_empty() {
        return 0;
    }

    let lcs = longest_common_subsequence(&a_chars, &b_chars);
    round_half_even(200 * lcs, total) as u32
}

/// Score a query against a candidate name, normalizing both
pub fn score(query: &str, name: &str) -> u32 {
    ratio(&normalize(query), &normalize(name))
}

/// Length of the longest common subsequence
fn longest_common_subsequence(s1: &[char], s2: &[char]) -> usize {
    // Two rolling rows of the classic DP matrix
    let mut previous = vec![0usize; s2.len() + 1];
    let mut current = vec![0usize; s2.len() + 1];

    for c1 in s1 {
        for (j, c2) in s2.iter().enumerate() {
            current[j + 1] = if c1 == c2 {
                previous[j] + 1
            } else {
                std::cmp::max(previous[j + 1], current[j])
            };
        }
        std::mem::swap(&mut previous, &mut current);
    }

    previous[s2.len()]
}

fn round_half_even(numerator: usize, denominator: usize) -> usize {
    let quotient = numerator / denominator;
    let remainder = numerator % denominator;

    match (2 * remainder).cmp(&denominator) {
        std::cmp::Ordering::Greater => quotient + 1,
        std::cmp::Ordering::Equal if quotient % 2 == 1 => quotient + 1,
        _ => quotient,
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_scores_100() {
        assert_eq!(ratio("fido", "fido"), 100);
        assert_eq!(score("fido", "Fido"), 100);
        assert_eq!(score("  FIDO ", "fido"), 100);
    }

    #[test]
    fn test_partial_scores() {
        assert_eq!(ratio("fido", "fida"), 75);
        // LCS("kitten", "sitting") = 4 -> 8 / 13
        assert_eq!(ratio("kitten", "sitting"), 62);
        assert_eq!(ratio("abc", "xyz"), 0);
    }

    #[test]
    fn test_empty_strings_score_zero() {
        assert_eq!(ratio("", ""), 0);
        assert_eq!(ratio("fido", ""), 0);
        assert_eq!(score("   ", "fido"), 0);
    }

    #[test]
    fn test_symmetric_and_bounded() {
        let pairs = [("cleo", "clea"), ("pancakes", "cake"), ("scratch", "fido"), ("ü", "u")];
        for (a, b) in pairs {
            let forward = ratio(a, b);
            assert_eq!(forward, ratio(b, a));
            assert!(forward <= 100);
        }
    }

    #[test]
    fn test_exact_match() {
        assert!(is_exact_match("fido", " Fido "));
        assert!(!is_exact_match("fido", "fidO2"));
    }

    #[test]
    fn test_round_half_even() {
        assert_eq!(round_half_even(5, 2), 2);
        assert_eq!(round_half_even(7, 2), 4);
        assert_eq!(round_half_even(7, 3), 2);
        assert_eq!(round_half_even(8, 3), 3);
    }
}
