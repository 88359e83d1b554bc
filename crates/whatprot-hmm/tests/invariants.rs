//! Property-based checks for the per-channel binomial loss machinery: the
//! survival table's row-sum invariant and the forward/backward adjoint
//! relationship every pruning range relies on.

use proptest::prelude::*;
use whatprot_hmm::BinomialTransition;
use whatprot_hmm::step::ChannelLossTransition;
use whatprot_tensor::{KDRange, PeptideStateVector};

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// `sum_j B(i, j) = 1` for every `i` the table was reserved up to,
    /// regardless of the loss probability.
    #[test]
    fn binomial_rows_sum_to_one(p in 0.0f64..=1.0, max_count in 0usize..12) {
        let table = BinomialTransition::new(p, max_count);
        for i in 0..=max_count {
            let sum: f64 = (0..=i).map(|j| table.prob(i, j)).sum();
            prop_assert!((sum - 1.0).abs() < 1e-9, "row {} sums to {}", i, sum);
        }
    }

    /// Cells above the triangular diagonal (more survivors than dyes
    /// present) always carry zero probability.
    #[test]
    fn binomial_above_diagonal_is_zero(p in 0.0f64..=1.0, max_count in 1usize..10) {
        let table = BinomialTransition::new(p, max_count);
        for i in 0..max_count {
            prop_assert_eq!(table.prob(i, i + 1), 0.0);
        }
    }

    /// `<forward(x), y> == <x, backward(y)>` for the channel-loss
    /// transition, over a random single-channel one-axis tensor — the
    /// adjoint relationship the HMM's forward/backward inner-product
    /// invariant depends on.
    #[test]
    fn channel_loss_forward_backward_are_adjoint(
        p in 0.0f64..=1.0,
        max_count in 1usize..6,
        xs in proptest::collection::vec(0.0f64..5.0, 1..7),
        ys in proptest::collection::vec(0.0f64..5.0, 1..7),
    ) {
        let n = max_count + 1;
        let shape = [1usize, n];
        let full = KDRange::full(&shape);

        let mut x = PeptideStateVector::new(&shape);
        for (j, &v) in xs.iter().enumerate().take(n) {
            x.tensor.set(&[0, j], v);
        }
        x.range = full.clone();

        let mut y = PeptideStateVector::new(&shape);
        for (j, &v) in ys.iter().enumerate().take(n) {
            y.tensor.set(&[0, j], v);
        }
        y.range = full.clone();

        let step = ChannelLossTransition::new(1, p, max_count);
        let forward_x = step.forward(&x, &x.range.clone());
        let backward_y = step.backward(&y, &y.range.clone());

        let mut lhs = 0.0;
        let mut rhs = 0.0;
        for j in 0..n {
            lhs += forward_x.tensor.get(&[0, j]) * y.tensor.get(&[0, j]);
            rhs += x.tensor.get(&[0, j]) * backward_y.tensor.get(&[0, j]);
        }
        prop_assert!((lhs - rhs).abs() < 1e-6, "lhs={} rhs={}", lhs, rhs);
    }
}
