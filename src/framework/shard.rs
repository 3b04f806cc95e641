//! Merge order for shard accumulators.
//!
//! Shards `0..n` form an implicit binary tree: node = interval `[left, right]`,
//! children split at `m = ⌊(left + right) / 2⌋`. Combining depth-first, left
//! child before right, merges adjacent coordinate ranges in ascending order,
//! so an order-sensitive `combine` sees the same sequence on every run.

use std::fmt;

use crate::framework::ReduceError;
use crate::walker::Reducer;

/// Node of the merge tree (implicit: just an interval of shard indices).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ShardNode {
    /// First shard index (inclusive).
    pub left: usize,
    /// Last shard index (inclusive).
    pub right: usize,
}

impl ShardNode {
    /// Root spanning `[left, right]`.
    pub fn root(left: usize, right: usize) -> Self {
        Self { left, right }
    }

    /// Single shard.
    #[inline]
    pub fn is_leaf(&self) -> bool {
        self.left == self.right
    }

    /// Number of shards under the node.
    #[inline]
    pub fn length(&self) -> usize {
        self.right - self.left + 1
    }

    /// Split point.
    #[inline]
    pub fn midpoint(&self) -> usize {
        (self.left + self.right) / 2
    }

    /// `([left, mid], [mid + 1, right])`.
    pub fn children(&self) -> (ShardNode, ShardNode) {
        debug_assert!(!self.is_leaf(), "leaf has no children");
        let mid = self.midpoint();
        (
            ShardNode {
                left: self.left,
                right: mid,
            },
            ShardNode {
                left: mid + 1,
                right: self.right,
            },
        )
    }
}

impl fmt::Display for ShardNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_leaf() {
            write!(f, "[{}]", self.left)
        } else {
            write!(f, "[{}, {}]", self.left, self.right)
        }
    }
}

/// Merge shard accumulators (given in ascending coordinate order) with `combine`.
///
/// No shards yields `reduce_init()`.
pub fn tree_combine<V, R>(reducer: &R, parts: Vec<R::Accumulator>) -> Result<R::Accumulator, ReduceError>
where
    R: Reducer<V> + ?Sized,
{
    if parts.is_empty() {
        return Ok(reducer.reduce_init());
    }
    if parts.len() > 1 && !reducer.supports_combine() {
        return Err(ReduceError::CombineUnsupported);
    }
    let root = ShardNode::root(0, parts.len() - 1);
    let mut slots: Vec<Option<R::Accumulator>> = parts.into_iter().map(Some).collect();
    merge_node(reducer, root, &mut slots)
}

fn merge_node<V, R>(
    reducer: &R,
    node: ShardNode,
    slots: &mut [Option<R::Accumulator>],
) -> Result<R::Accumulator, ReduceError>
where
    R: Reducer<V> + ?Sized,
{
    if node.is_leaf() {
        return slots[node.left]
            .take()
            .ok_or_else(|| ReduceError::Combine(format!("shard {} merged twice", node.left)));
    }
    let (left_child, right_child) = node.children();
    let left = merge_node(reducer, left_child, slots)?;
    let right = merge_node(reducer, right_child, slots)?;
    reducer.combine(left, right)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::walker::FoldReducer;

    fn concat() -> impl Reducer<String, Accumulator = String> {
        FoldReducer::new(String::new, |v: String, mut acc: String| {
            acc.push_str(&v);
            Ok(acc)
        })
        .with_combine(|mut a: String, b: String| {
            a.push_str(&b);
            Ok(a)
        })
    }

    #[test]
    fn midpoint_split() {
        let (left, right) = ShardNode::root(0, 4).children();
        assert_eq!((left.left, left.right), (0, 2));
        assert_eq!((right.left, right.right), (3, 4));
        assert_eq!(left.length() + right.length(), 5);
    }

    #[test]
    fn combine_preserves_shard_order() {
        let reducer = concat();
        for n in 1..=9usize {
            let parts: Vec<String> = (0..n).map(|i| i.to_string()).collect();
            let expected: String = parts.concat();
            assert_eq!(tree_combine(&reducer, parts).unwrap(), expected);
        }
    }

    #[test]
    fn empty_merge_is_identity() {
        let reducer = concat();
        assert_eq!(tree_combine(&reducer, Vec::new()).unwrap(), "");
    }

    #[test]
    fn multi_shard_merge_needs_combine() {
        let reducer = FoldReducer::new(|| 0u32, |v: u32, acc: u32| Ok(acc + v));
        assert_eq!(tree_combine(&reducer, vec![7]), Ok(7));
        assert_eq!(
            tree_combine(&reducer, vec![1, 2]),
            Err(ReduceError::CombineUnsupported)
        );
    }
}
