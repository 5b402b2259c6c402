/// Strict left fold over ordered outputs: `acc = fold(output, acc)`
///
/// Runs in the calling thread after every output has been collected.
pub fn fold_ordered<R, Acc, G>(outputs: Vec<R>, init: Acc, mut fold: G) -> Acc
where
    G: FnMut(R, Acc) -> Acc,
{
    let mut acc = init;
    for output in outputs {
        acc = fold(output, acc);
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_sum() {
        assert_eq!(fold_ordered(vec![1, 2, 3, 4], 0, |x, acc| acc + x), 10);
    }

    #[test]
    fn test_fold_respects_order() {
        let joined = fold_ordered(vec!["a", "b", "c"], String::new(), |s, mut acc| {
            acc.push_str(s);
            acc
        });
        assert_eq!(joined, "abc");
    }

    #[test]
    fn test_fold_argument_order() {
        // Output comes first, accumulator second
        let result = fold_ordered(vec![10], 3, |output, acc| output - acc);
        assert_eq!(result, 7);
    }

    #[test]
    fn test_fold_empty_returns_init() {
        assert_eq!(fold_ordered(Vec::<i32>::new(), 5, |x, acc| acc + x), 5);
    }
}
