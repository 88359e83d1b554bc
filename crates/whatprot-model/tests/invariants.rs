//! Property-based checks for `SequencingModel::distance` (must behave as a
//! metric) and `ParameterFitter::get` (must always return a valid
//! probability).

use proptest::prelude::*;
use whatprot_model::{ChannelModel, DecayingRateModel, ParameterFitter, SequencingModel};

fn arb_channel() -> impl Strategy<Value = ChannelModel> {
    (
        0.0f64..=1.0,
        0.0f64..=1.0,
        -2.0f64..=2.0,
        0.01f64..=2.0,
        0.01f64..=2.0,
    )
        .prop_map(|(bleach, dud, mu, sig, bg_sig)| ChannelModel::new(bleach, dud, mu, sig, bg_sig))
}

fn arb_rate() -> impl Strategy<Value = DecayingRateModel> {
    (0.0f64..=1.0, 0.0f64..=1.0, 0.01f64..=1.0)
        .prop_map(|(base, initial, decay)| DecayingRateModel::new(base, initial, decay))
}

fn arb_model(num_channels: usize) -> impl Strategy<Value = SequencingModel> {
    (
        proptest::collection::vec(arb_channel(), num_channels),
        0.0f64..=1.0,
        0.0f64..=1.0,
        0.0f64..=1.0,
        arb_rate(),
    )
        .prop_map(|(channels, fail, init_block, cyc_block, rate)| {
            SequencingModel::new(channels, fail, init_block, cyc_block, rate)
        })
}

proptest! {
    #![proptest_config(ProptestConfig {
        cases: 64,
        .. ProptestConfig::default()
    })]

    /// `distance` is non-negative and symmetric, and zero exactly when the
    /// two models compare equal field-for-field.
    #[test]
    fn distance_is_a_metric(a in arb_model(2), b in arb_model(2)) {
        let d_ab = a.distance(&b);
        let d_ba = b.distance(&a);
        prop_assert!(d_ab >= 0.0);
        prop_assert!((d_ab - d_ba).abs() < 1e-12);
        prop_assert_eq!(d_ab == 0.0, a == b);
    }

    /// `distance` obeys the triangle inequality across three random models.
    #[test]
    fn distance_satisfies_triangle_inequality(
        a in arb_model(1),
        b in arb_model(1),
        c in arb_model(1),
    ) {
        prop_assert!(a.distance(&c) <= a.distance(&b) + b.distance(&c) + 1e-9);
    }

    /// A fitter with no observations falls back exactly to the prior value
    /// it's given, regardless of that value.
    #[test]
    fn parameter_fitter_falls_back_to_any_prior(fallback in 0.0f64..=1.0) {
        let f = ParameterFitter::new();
        prop_assert_eq!(f.get(fallback), fallback);
    }

    /// Regardless of what's accumulated, the fitted ratio is always a valid
    /// probability.
    #[test]
    fn parameter_fitter_ratio_is_always_in_unit_interval(
        observations in proptest::collection::vec((0.0f64..10.0, 0.0f64..10.0), 0..10),
    ) {
        let mut f = ParameterFitter::new();
        for (num, den) in observations {
            f.add(num, den);
        }
        let ratio = f.get(0.5);
        prop_assert!((0.0..=1.0).contains(&ratio));
    }
}
