//! Property-based tests for the sequence diff

use live_updates::client::morph::diff;
use proptest::prelude::*;

fn lcs_len(a: &[u8], b: &[u8]) -> usize {
    let mut table = vec![vec![0usize; b.len() + 1]; a.len() + 1];
    for i in (0..a.len()).rev() {
        for j in (0..b.len()).rev() {
            table[i][j] = if a[i] == b[j] {
                table[i + 1][j + 1] + 1
            } else {
                table[i + 1][j].max(table[i][j + 1])
            };
        }
    }
    table[0][0]
}

proptest! {
    #[test]
    fn test_hunks_rebuild_new(
        old in prop::collection::vec(0u8..4, 0..24),
        new in prop::collection::vec(0u8..4, 0..24),
    ) {
        let units = diff(&old, &new);

        let mut rebuilt = Vec::new();
        let mut i = 0;
        for unit in &units {
            prop_assert!(unit.from.start >= i);
            prop_assert!(!unit.from.is_empty() || !unit.to.is_empty());
            rebuilt.extend_from_slice(&old[i..unit.from.start]);
            rebuilt.extend_from_slice(&new[unit.to.clone()]);
            i = unit.from.end;
        }
        rebuilt.extend_from_slice(&old[i..]);
        prop_assert_eq!(rebuilt, new);
    }

    #[test]
    fn test_edit_script_is_minimal(
        old in prop::collection::vec(0u8..4, 0..24),
        new in prop::collection::vec(0u8..4, 0..24),
    ) {
        let edits: usize = diff(&old, &new)
            .iter()
            .map(|unit| unit.from.len() + unit.to.len())
            .sum();
        prop_assert_eq!(edits, old.len() + new.len() - 2 * lcs_len(&old, &new));
    }
}
