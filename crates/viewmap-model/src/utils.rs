//! Utility functions shared by stores and the translator.

/// Returns the positions (into `values`) of one longest strictly increasing
/// subsequence, in ascending order.
///
/// Used to decide which elements kept their relative order across an update;
/// everything outside the subsequence is reported as moved.
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    // tails[k] = position of the smallest tail of an increasing run of length k + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut predecessor: Vec<Option<usize>> = vec![None; values.len()];

    for (pos, &value) in values.iter().enumerate() {
        let slot = tails.partition_point(|&tail| values[tail] < value);
        if slot > 0 {
            predecessor[pos] = Some(tails[slot - 1]);
        }
        if slot == tails.len() {
            tails.push(pos);
        } else {
            tails[slot] = pos;
        }
    }

    let mut out = Vec::with_capacity(tails.len());
    let mut cursor = tails.last().copied();
    while let Some(pos) = cursor {
        out.push(pos);
        cursor = predecessor[pos];
    }
    out.reverse();
    out
}
