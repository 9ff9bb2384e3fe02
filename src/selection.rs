//! Random selection helpers shared by the resolver and the rotation.

use rand::seq::SliceRandom;
use rand::Rng;

/// Weighted random choice.
///
/// Draws `u` uniformly in `[0, total)` and returns the first entry whose
/// running sum of weights exceeds `u`. Returns `None` when the table is empty
/// or every weight is zero, so a fully zeroed table is never answered with an
/// arbitrary entry.
pub fn weighted_select<'a, T, R>(entries: &'a [(T, f64)], rng: &mut R) -> Option<&'a T>
where
    R: Rng + ?Sized,
{
    let total: f64 = entries.iter().map(|(_, weight)| weight.max(0.0)).sum();
    if total <= 0.0 {
        return None;
    }
    entry_at(entries, rng.random::<f64>() * total)
}

fn entry_at<T>(entries: &[(T, f64)], target: f64) -> Option<&T> {
    let mut accumulated = 0.0;
    for (item, weight) in entries {
        accumulated += weight.max(0.0);
        if accumulated > target {
            return Some(item);
        }
    }
    // Rounding can leave the target at or past the last running sum.
    entries
        .iter()
        .rev()
        .find(|(_, weight)| *weight > 0.0)
        .map(|(item, _)| item)
}

/// Draws `count` values so the result looks random while no value occurs more
/// than once more often than any other.
///
/// Returns an empty list when `values` is empty.
pub fn minimal_reoccurrence_selections<T, R>(values: &[T], count: usize, rng: &mut R) -> Vec<T>
where
    T: Clone,
    R: Rng + ?Sized,
{
    if values.is_empty() {
        return Vec::new();
    }

    let mut pool: Vec<T> = Vec::new();
    let mut selections = Vec::with_capacity(count);
    for _ in 0..count {
        if pool.is_empty() {
            pool = values.to_vec();
            pool.shuffle(rng);
        }
        if let Some(value) = pool.pop() {
            selections.push(value);
        }
    }
    selections.shuffle(rng);
    selections
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::collections::HashMap;

    #[test]
    fn test_weighted_select_follows_weights() {
        let mut rng = StdRng::seed_from_u64(42);
        let table = vec![("a", 3.0), ("b", 1.0)];
        let draws = 100_000;
        let mut hits = 0;
        for _ in 0..draws {
            if weighted_select(&table, &mut rng) == Some(&"a") {
                hits += 1;
            }
        }
        let ratio = hits as f64 / draws as f64;
        assert!((ratio - 0.75).abs() < 0.03, "ratio was {}", ratio);
    }

    #[test]
    fn test_weighted_select_never_picks_zero_weight() {
        let mut rng = StdRng::seed_from_u64(3);
        let table = vec![("never", 0.0), ("always", 2.0), ("also_never", 0.0)];
        for _ in 0..1_000 {
            assert_eq!(weighted_select(&table, &mut rng), Some(&"always"));
        }
    }

    #[test]
    fn test_weighted_select_empty_or_zeroed_table() {
        let mut rng = StdRng::seed_from_u64(0);
        let empty: Vec<(&str, f64)> = Vec::new();
        assert_eq!(weighted_select(&empty, &mut rng), None);

        let zeroed = vec![("a", 0.0), ("b", 0.0)];
        assert_eq!(weighted_select(&zeroed, &mut rng), None);
    }

    #[test]
    fn test_target_at_total_picks_last_weighted_entry() {
        let table = vec![("a", 0.1), ("b", 0.2), ("c", 0.0)];
        let total: f64 = table.iter().map(|(_, w)| w).sum();

        assert_eq!(entry_at(&table, total), Some(&"b"));
        assert_eq!(entry_at(&table, 0.0), Some(&"a"));
        assert_eq!(entry_at(&table, 0.15), Some(&"b"));
    }

    #[test]
    fn test_minimal_reoccurrence_is_balanced() {
        let mut rng = StdRng::seed_from_u64(11);
        let values = vec!["a", "b", "c", "d"];
        for size in 1..=values.len() {
            let subset = &values[..size];
            for count in 0..7 {
                let selections = minimal_reoccurrence_selections(subset, count, &mut rng);
                assert_eq!(selections.len(), count);

                let mut counts: HashMap<&str, usize> = HashMap::new();
                for value in subset {
                    counts.insert(*value, 0);
                }
                for value in &selections {
                    *counts.entry(*value).or_default() += 1;
                }
                let max = counts.values().max().copied().unwrap_or(0);
                let min = counts.values().min().copied().unwrap_or(0);
                assert!(max <= min + 1, "{:?} from {:?}", selections, subset);
            }
        }
    }

    #[test]
    fn test_minimal_reoccurrence_of_nothing() {
        let mut rng = StdRng::seed_from_u64(1);
        let values: Vec<u8> = Vec::new();
        assert!(minimal_reoccurrence_selections(&values, 3, &mut rng).is_empty());
    }
}
