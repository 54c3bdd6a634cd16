//! Property-based tests for the critic's gradient penalty using proptest.

use proptest::prelude::*;
use rand::SeedableRng;
use rand::rngs::StdRng;

use ganomaly_core::reproducibility::standard_normal;
use ganomaly_ml::Matrix;
use ganomaly_ml::backend::Component;
use ganomaly_ml::matrix::l2_norm;
use ganomaly_ml::nn::{Activation, Mlp};

const FEATURES: usize = 4;

fn critic(seed: u64) -> Mlp {
    let mut rng = StdRng::seed_from_u64(seed);
    Mlp::new(
        &[FEATURES, 16, 8, 1],
        Activation::LEAKY,
        Activation::Identity,
        &mut rng,
    )
    .unwrap()
}

/// `eps * real + (1 - eps) * fake`, the points the penalty is taken at.
fn interpolated(seed: u64, rows: usize, eps: f64) -> Matrix {
    let mut rng = StdRng::seed_from_u64(seed);
    let real = Matrix::from_shape_simple_fn((rows, FEATURES), || standard_normal(&mut rng));
    let fake = Matrix::from_shape_simple_fn((rows, FEATURES), || standard_normal(&mut rng));
    real * eps + fake * (1.0 - eps)
}

proptest! {
    #[test]
    fn penalty_is_finite_and_non_negative(
        critic_seed in any::<u64>(),
        batch_seed in any::<u64>(),
        rows in 1usize..12,
        eps in 0.0f64..=1.0,
    ) {
        let net = critic(critic_seed);
        let x = interpolated(batch_seed, rows, eps);
        let penalty = net.gradient_penalty(&x).unwrap();

        prop_assert_eq!(penalty.per_sample.len(), rows);
        for value in &penalty.per_sample {
            prop_assert!(value.is_finite() && *value >= 0.0, "penalty {}", value);
        }
        prop_assert_eq!(penalty.gradient.len(), net.parameter_count());
        prop_assert!(penalty.gradient.iter().all(|g| g.is_finite()));
    }

    #[test]
    fn penalty_agrees_with_input_gradient(
        critic_seed in any::<u64>(),
        batch_seed in any::<u64>(),
        rows in 1usize..12,
        eps in 0.0f64..=1.0,
    ) {
        let net = critic(critic_seed);
        let x = interpolated(batch_seed, rows, eps);
        let penalty = net.gradient_penalty(&x).unwrap();
        let input_grad = net.input_gradient(&x).unwrap();

        for (row, analytic) in input_grad.outer_iter().zip(&penalty.per_sample) {
            let expected = (l2_norm(row) - 1.0).powi(2);
            prop_assert!(
                (expected - analytic).abs() <= 1e-9 + 1e-7 * expected.abs(),
                "expected {}, got {}",
                expected,
                analytic
            );
        }
    }
}
