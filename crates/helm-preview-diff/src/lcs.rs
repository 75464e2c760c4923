//! Longest-common-subsequence alignment for ordered lists.

use serde_json::Value;

/// Align two ordered lists, returning the matched (equal) index pairs in
/// increasing order.
///
/// When the DP table ties on which side to advance, the element whose
/// canonical serialization sorts smaller is skipped. That choice is symmetric
/// under swapping the inputs, which the diff engine relies on for its
/// mirror-image property; it is also deterministic for identical inputs.
pub fn align(a: &[Value], b: &[Value]) -> Vec<(usize, usize)> {
    let n = a.len();
    let m = b.len();
    // dp[i][j] = LCS length of a[i..] and b[j..]
    let mut dp = vec![vec![0usize; m + 1]; n + 1];
    for i in (0..n).rev() {
        for j in (0..m).rev() {
            dp[i][j] = if a[i] == b[j] {
                dp[i + 1][j + 1] + 1
            } else {
                dp[i + 1][j].max(dp[i][j + 1])
            };
        }
    }

    let mut matched = Vec::new();
    let (mut i, mut j) = (0, 0);
    while i < n && j < m {
        if a[i] == b[j] {
            matched.push((i, j));
            i += 1;
            j += 1;
        } else if dp[i + 1][j] > dp[i][j + 1] {
            i += 1;
        } else if dp[i + 1][j] < dp[i][j + 1] {
            j += 1;
        } else if canonical(&a[i]) <= canonical(&b[j]) {
            i += 1;
        } else {
            j += 1;
        }
    }
    matched
}

fn canonical(v: &Value) -> String {
    // Maps are BTreeMap-backed, so this serialization is canonical.
    serde_json::to_string(v).unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vals(items: &[i64]) -> Vec<Value> {
        items.iter().map(|i| json!(i)).collect()
    }

    #[test]
    fn finds_longest_subsequence() {
        let a = vals(&[1, 2, 3, 4]);
        let b = vals(&[2, 4, 5]);
        assert_eq!(align(&a, &b), vec![(1, 0), (3, 1)]);
    }

    #[test]
    fn identical_lists_fully_match() {
        let a = vals(&[1, 2, 3]);
        assert_eq!(align(&a, &a), vec![(0, 0), (1, 1), (2, 2)]);
    }

    #[test]
    fn tie_break_is_symmetric() {
        let a = vals(&[1, 2]);
        let b = vals(&[2, 1]);
        let forward = align(&a, &b);
        let backward = align(&b, &a);
        let mirrored: Vec<(usize, usize)> = backward.iter().map(|&(i, j)| (j, i)).collect();
        assert_eq!(forward, mirrored);
    }

    #[test]
    fn empty_sides() {
        assert!(align(&[], &vals(&[1])).is_empty());
        assert!(align(&vals(&[1]), &[]).is_empty());
    }
}
