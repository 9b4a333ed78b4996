/**
 * Sequence Diff
 *
 * Myers' O((N+M)D) shortest-edit-script diff over any `PartialEq` sequence,
 * in the linear-space variant that splits on the middle snake, reported as
 * hunks: each `DiffUnit` says that `old[from]` was replaced by
 * `new[to]`, and everything between hunks is unchanged. A pure insertion has
 * an empty `from`; a pure deletion an empty `to`.
 */

use std::ops::Range;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffUnit {
    pub from: Range<usize>,
    pub to: Range<usize>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Edit {
    Keep,
    Delete,
    Insert,
}

/// Diff `old` against `new`; hunks are returned in ascending order
pub fn diff<T: PartialEq>(old: &[T], new: &[T]) -> Vec<DiffUnit> {
    let edits = edit_script(old, new);

    let mut units = Vec::new();
    let mut current: Option<DiffUnit> = None;
    let (mut i, mut j) = (0, 0);
    for edit in edits {
        match edit {
            Edit::Keep => {
                units.extend(current.take());
                i += 1;
                j += 1;
            }
            Edit::Delete => {
                let unit = current.get_or_insert(DiffUnit { from: i..i, to: j..j });
                i += 1;
                unit.from.end = i;
            }
            Edit::Insert => {
                let unit = current.get_or_insert(DiffUnit { from: i..i, to: j..j });
                j += 1;
                unit.to.end = j;
            }
        }
    }
    units.extend(current);
    units
}

fn edit_script<T: PartialEq>(old: &[T], new: &[T]) -> Vec<Edit> {
    let bound = max_d(old.len(), new.len());
    let mut myers = Myers {
        old,
        new,
        forward: Diagonals::new(bound),
        backward: Diagonals::new(bound),
        edits: Vec::with_capacity(old.len() + new.len()),
    };
    myers.conquer(0..old.len(), 0..new.len());
    myers.edits
}

/// Upper bound on `d` for the middle snake search over `n` by `m`
fn max_d(n: usize, m: usize) -> usize {
    (n + m + 1) / 2 + 1
}

/// Furthest-reaching `x` per diagonal `k`, indexed from `-bound` to `bound`
struct Diagonals {
    offset: isize,
    v: Vec<usize>,
}

impl Diagonals {
    fn new(bound: usize) -> Self {
        Self {
            offset: bound as isize + 1,
            v: vec![0; 2 * bound + 3],
        }
    }

    fn get(&self, k: isize) -> usize {
        self.v[(k + self.offset) as usize]
    }

    fn set(&mut self, k: isize, x: usize) {
        let index = (k + self.offset) as usize;
        self.v[index] = x;
    }
}

/// Linear-space Myers: split on the middle snake and recurse on both halves
struct Myers<'a, T> {
    old: &'a [T],
    new: &'a [T],
    forward: Diagonals,
    backward: Diagonals,
    edits: Vec<Edit>,
}

impl<T: PartialEq> Myers<'_, T> {
    fn conquer(&mut self, mut old: Range<usize>, mut new: Range<usize>) {
        let prefix = self.common_prefix(old.clone(), new.clone());
        self.push(Edit::Keep, prefix);
        old.start += prefix;
        new.start += prefix;

        let suffix = self.common_suffix(old.clone(), new.clone());
        old.end -= suffix;
        new.end -= suffix;

        if old.is_empty() {
            self.push(Edit::Insert, new.len());
        } else if new.is_empty() {
            self.push(Edit::Delete, old.len());
        } else if let Some((x, y)) = self.middle_snake(old.clone(), new.clone()) {
            self.conquer(old.start..x, new.start..y);
            self.conquer(x..old.end, y..new.end);
        } else {
            self.push(Edit::Delete, old.len());
            self.push(Edit::Insert, new.len());
        }

        self.push(Edit::Keep, suffix);
    }

    fn push(&mut self, edit: Edit, count: usize) {
        self.edits.extend(std::iter::repeat(edit).take(count));
    }

    fn common_prefix(&self, old: Range<usize>, new: Range<usize>) -> usize {
        self.old[old]
            .iter()
            .zip(&self.new[new])
            .take_while(|(a, b)| a == b)
            .count()
    }

    fn common_suffix(&self, old: Range<usize>, new: Range<usize>) -> usize {
        self.old[old]
            .iter()
            .rev()
            .zip(self.new[new].iter().rev())
            .take_while(|(a, b)| a == b)
            .count()
    }

    /// Start of a snake on some shortest path through the box, in absolute
    /// coordinates. The box must have differing first and last elements.
    fn middle_snake(&mut self, old: Range<usize>, new: Range<usize>) -> Option<(usize, usize)> {
        let n = old.len();
        let m = new.len();
        let delta = n as isize - m as isize;
        let odd = delta & 1 == 1;
        self.forward.set(1, 0);
        self.backward.set(1, 0);

        for d in 0..max_d(n, m) as isize {
            for k in (-d..=d).rev().step_by(2) {
                let mut x = if k == -d || (k != d && self.forward.get(k - 1) < self.forward.get(k + 1)) {
                    self.forward.get(k + 1)
                } else {
                    self.forward.get(k - 1) + 1
                };
                let y = (x as isize - k) as usize;
                let (x0, y0) = (x, y);
                if x < n && y < m {
                    x += self.common_prefix(old.start + x..old.end, new.start + y..new.end);
                }
                self.forward.set(k, x);
                if odd && (k - delta).abs() < d && x + self.backward.get(-(k - delta)) >= n {
                    return Some((old.start + x0, new.start + y0));
                }
            }

            for k in (-d..=d).rev().step_by(2) {
                let mut x = if k == -d || (k != d && self.backward.get(k - 1) < self.backward.get(k + 1)) {
                    self.backward.get(k + 1)
                } else {
                    self.backward.get(k - 1) + 1
                };
                let mut y = (x as isize - k) as usize;
                if x < n && y < m {
                    let advance = self.common_suffix(old.start..old.end - x, new.start..new.end - y);
                    x += advance;
                    y += advance;
                }
                self.backward.set(k, x);
                if !odd && (k - delta).abs() <= d && x + self.forward.get(-(k - delta)) >= n {
                    return Some((old.end - x, new.end - y));
                }
            }
        }
        None
    }
}
