//! Mergeable/cloneable accounting (spec §4.3, §4.4): upper bounds on
//! how many merges/clones a leaf's walkers could support, computed
//! from weights alone (no walker identities are needed here).

/// The *single* method (spec §4.3, the only supported merge policy):
/// given a leaf's weights, find the largest ascending-weight prefix
/// `k` whose sum is `<= max_weight`; `n_mergeable = k - 1`. If `k <= 1`
/// no merge is possible and this returns 0.
///
/// This resolves the `while...else` ambiguity of the original
/// `calc_squashable_walkers_single_method` (spec §9 open question 2):
/// `k` is exactly the prefix length at loop exit, whether by exhausting
/// the list or by the next addition overshooting `max_weight`.
pub fn n_mergeable(weights: &[f64], max_weight: f64) -> usize {
    if weights.len() < 2 {
        return 0;
    }
    let mut sorted: Vec<f64> = weights.to_vec();
    sorted.sort_by(f64::total_cmp);

    let mut sum = sorted[0];
    let mut k = 1usize;
    for &w in &sorted[1..] {
        let next_sum = sum + w;
        if next_sum > max_weight {
            break;
        }
        sum = next_sum;
        k += 1;
    }
    k.saturating_sub(1)
}

/// Per-walker maximum clone count (spec §4.4): the largest `c >= 0`
/// such that `w/(c+1) >= min_weight` and `(c+1) <= max_num_walkers`.
pub fn max_n_clones_one(weight: f64, min_weight: f64, max_num_walkers: usize) -> usize {
    let mut n_splits: usize = 1;
    while (weight / (n_splits + 1) as f64) >= min_weight && (n_splits + 1) <= max_num_walkers {
        n_splits += 1;
    }
    n_splits - 1
}

/// Sum of per-walker max clone counts over a leaf's weights (spec §4.4).
pub fn n_cloneable(weights: &[f64], min_weight: f64, max_num_walkers: usize) -> usize {
    weights.iter().map(|&w| max_n_clones_one(w, min_weight, max_num_walkers)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mergeable_counts_largest_prefix() {
        // four walkers weight 0.1 each, pmax 0.5: 0.1+0.1+0.1+0.1 = 0.4 <= 0.5, k=4
        assert_eq!(n_mergeable(&[0.1, 0.1, 0.1, 0.1], 0.5), 3);
    }

    #[test]
    fn mergeable_zero_when_single_walker_exceeds() {
        assert_eq!(n_mergeable(&[0.6], 0.5), 0);
    }

    #[test]
    fn mergeable_zero_for_empty_or_singleton() {
        assert_eq!(n_mergeable(&[], 0.5), 0);
        assert_eq!(n_mergeable(&[0.3], 0.5), 0);
    }

    #[test]
    fn mergeable_stops_at_first_overshoot() {
        // 0.1, 0.2, 0.3: sums 0.1, 0.3, 0.6 > 0.5 so k=2, n_mergeable=1
        assert_eq!(n_mergeable(&[0.3, 0.1, 0.2], 0.5), 1);
    }

    #[test]
    fn cloneable_basic() {
        // weight 0.4, min 1e-12: can split many times; max_num_walkers caps it
        assert_eq!(max_n_clones_one(0.4, 1e-12, 4), 3);
        assert_eq!(max_n_clones_one(0.4, 0.21, 100), 0);
        assert_eq!(max_n_clones_one(0.4, 0.2, 100), 1);
    }

    #[test]
    fn cloneable_sums_over_leaf() {
        assert_eq!(n_cloneable(&[0.4, 0.4], 0.2, 100), 2);
    }
}
