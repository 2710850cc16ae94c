/// Sizes of `groups` contiguous chunks covering `length` items.
///
/// Every chunk gets `length / groups` items and the first `length % groups`
/// chunks get one more, so sizes never differ by more than one and never
/// increase. Returns an empty vec when `groups == 0`.
pub fn split_sizes(length: usize, groups: usize) -> Vec<usize> {
    if groups == 0 {
        return Vec::new();
    }
    let base = length / groups;
    let remainder = length % groups;
    (0..groups)
        .map(|i| if i < remainder { base + 1 } else { base })
        .collect()
}

/// Exclusive end index of each chunk from [`split_sizes`].
pub fn split_indexes(length: usize, groups: usize) -> Vec<usize> {
    split_sizes(length, groups)
        .into_iter()
        .scan(0, |end, size| {
            *end += size;
            Some(*end)
        })
        .collect()
}

/// Split `items` into contiguous chunks, each paired with the index of its
/// first element. Empty chunks are dropped.
pub fn partition<T>(items: &[T], groups: usize) -> Vec<(usize, &[T])> {
    let mut start = 0;
    split_indexes(items.len(), groups)
        .into_iter()
        .filter_map(|end| {
            let chunk = (start, &items[start..end]);
            start = end;
            (!chunk.1.is_empty()).then_some(chunk)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_sizes_examples() {
        assert_eq!(split_sizes(10, 3), vec![4, 3, 3]);
        assert_eq!(split_sizes(9, 3), vec![3, 3, 3]);
        assert_eq!(split_sizes(2, 4), vec![1, 1, 0, 0]);
        assert_eq!(split_sizes(0, 2), vec![0, 0]);
        assert!(split_sizes(5, 0).is_empty());
    }

    #[test]
    fn test_split_law_holds() {
        for length in 0..60 {
            for groups in 1..12 {
                let sizes = split_sizes(length, groups);
                assert_eq!(sizes.len(), groups);
                assert_eq!(sizes.iter().sum::<usize>(), length);
                let max = *sizes.iter().max().unwrap();
                let min = *sizes.iter().min().unwrap();
                assert!(max - min <= 1, "length={length} groups={groups}");
                assert!(sizes.windows(2).all(|w| w[0] >= w[1]));
            }
        }
    }

    #[test]
    fn test_split_indexes() {
        assert_eq!(split_indexes(10, 3), vec![4, 7, 10]);
    }

    #[test]
    fn test_partition_preserves_order() {
        let items: Vec<u32> = (0..23).collect();
        for groups in 1..30 {
            let chunks = partition(&items, groups);
            assert!(chunks.len() <= groups);
            let rejoined: Vec<u32> = chunks.iter().flat_map(|(_, c)| c.iter().copied()).collect();
            assert_eq!(rejoined, items);
            for (offset, chunk) in &chunks {
                assert_eq!(chunk[0], *offset as u32);
            }
        }
    }
}
