use approx::assert_abs_diff_eq;
use csrecon::lasso::{CoordinateDescent, LassoConfig, LassoError, solve, solve_seeded};
use ndarray::{Array1, Array2, array};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;

fn random_design(n: usize, d: usize, seed: u64) -> Array2<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    Array2::from_shape_fn((n, d), |_| rng.gen_range(-1.0..1.0))
}

fn planted_problem(n: usize, d: usize, seed: u64) -> (Array2<f64>, Array1<f64>, Array1<f64>) {
    let a = random_design(n, d, seed);
    let mut rng = StdRng::seed_from_u64(seed ^ 0xABCD);
    let truth = Array1::from_shape_fn(d, |i| if i % 2 == 0 { rng.gen_range(1.0..3.0) } else { 0.0 });
    let noise = Array1::from_shape_fn(n, |_| rng.gen_range(-0.01..0.01));
    let y = a.dot(&truth) + &noise;
    (a, y, truth)
}

fn l1_norm(x: &Array1<f64>) -> f64 {
    x.iter().map(|v| v.abs()).sum()
}

#[test]
fn reference_scenario_recovers_ones() {
    let a = array![[1.0, 0.0], [0.0, 1.0], [1.0, 1.0], [1.0, -1.0]];
    let y = array![1.0, 1.0, 2.0, 0.0];
    let x0 = array![0.0, 0.0];
    let config = LassoConfig {
        l1_lambda: 0.01,
        tolerance: 1e-3,
        ..LassoConfig::default()
    };
    let fit = solve_seeded(y.view(), a.view(), Some(x0.view()), &config, 0).unwrap();
    assert_abs_diff_eq!(fit.coefficients[0], 1.0, epsilon = 0.05);
    assert_abs_diff_eq!(fit.coefficients[1], 1.0, epsilon = 0.05);
}

#[test]
fn converged_solution_is_a_fixed_point() {
    let (a, y, _) = planted_problem(60, 6, 11);
    let config = LassoConfig {
        l1_lambda: 0.05,
        tolerance: 1e-6,
        max_passes: 100_000,
    };
    let zeros = Array1::<f64>::zeros(6);
    let fit = solve_seeded(y.view(), a.view(), Some(zeros.view()), &config, 0).unwrap();

    let mut rng = StdRng::seed_from_u64(0);
    let mut state = CoordinateDescent::new(
        y.view(),
        a.view(),
        Some(fit.coefficients.view()),
        config.l1_lambda,
        &mut rng,
    )
    .unwrap();
    let max_change = state.sweep();
    assert!(
        max_change <= config.tolerance * state.max_abs_coefficient(),
        "extra pass moved a coordinate by {max_change:.3e}"
    );
}

#[test]
fn planted_sparse_support_is_recovered() {
    let (a, y, truth) = planted_problem(60, 6, 23);
    let config = LassoConfig {
        l1_lambda: 0.05,
        tolerance: 1e-8,
        max_passes: 100_000,
    };
    let fit = solve_seeded(y.view(), a.view(), None, &config, 3).unwrap();
    for (got, want) in fit.coefficients.iter().zip(truth.iter()) {
        assert_abs_diff_eq!(*got, *want, epsilon = 0.05);
    }
}

#[test]
fn larger_penalty_never_increases_l1_norm() {
    let a = random_design(30, 10, 5);
    let mut rng = StdRng::seed_from_u64(55);
    let y = Array1::from_shape_fn(30, |_| rng.gen_range(-3.0..3.0));
    let zeros = Array1::<f64>::zeros(10);

    let mut previous = f64::INFINITY;
    for l1_lambda in [0.001, 0.01, 0.1, 0.5, 1.0, 2.0, 4.0, 8.0, 32.0] {
        let config = LassoConfig {
            l1_lambda,
            tolerance: 1e-10,
            max_passes: 200_000,
        };
        let fit = solve_seeded(y.view(), a.view(), Some(zeros.view()), &config, 0).unwrap();
        let norm = l1_norm(&fit.coefficients);
        assert!(
            norm <= previous + 1e-6,
            "lambda {l1_lambda}: ||x||_1 = {norm} grew from {previous}"
        );
        previous = norm;
    }
}

#[test]
fn different_warm_starts_reach_the_same_minimizer() {
    let (a, y, _) = planted_problem(25, 6, 31);
    let config = LassoConfig {
        l1_lambda: 0.01,
        tolerance: 1e-9,
        max_passes: 200_000,
    };
    let from_zero = Array1::<f64>::zeros(6);
    let from_far = Array1::from_elem(6, -5.0);
    let fit_a = solve_seeded(y.view(), a.view(), Some(from_zero.view()), &config, 0).unwrap();
    let fit_b = solve_seeded(y.view(), a.view(), Some(from_far.view()), &config, 0).unwrap();
    for (x, z) in fit_a.coefficients.iter().zip(fit_b.coefficients.iter()) {
        assert_abs_diff_eq!(*x, *z, epsilon = 1e-5);
    }
}

#[test]
fn residual_invariant_holds_at_pass_boundaries() {
    let mut a = random_design(15, 8, 77);
    a.column_mut(3).fill(0.0);
    let mut rng = StdRng::seed_from_u64(78);
    let y = Array1::from_shape_fn(15, |_| rng.gen_range(-1.0..1.0));

    let mut state = CoordinateDescent::new(y.view(), a.view(), None, 0.02, &mut rng).unwrap();
    assert_eq!(state.column_norms()[3], 0.0);
    assert_eq!(state.coefficients()[3], 0.0);

    for _ in 0..10 {
        state.sweep();
        let direct = state.recompute_residual();
        for (incremental, exact) in state.residual().iter().zip(direct.iter()) {
            assert_abs_diff_eq!(*incremental, *exact, epsilon = 1e-10);
        }
        assert_eq!(state.coefficients()[3], 0.0);
    }
}

#[test]
fn cold_start_on_all_zero_input_returns_zero() {
    let a = Array2::<f64>::zeros((4, 3));
    let y = Array1::<f64>::zeros(4);
    let fit = solve_seeded(y.view(), a.view(), None, &LassoConfig::default(), 8).unwrap();
    assert_eq!(fit.passes, 1);
    assert_eq!(fit.coefficients, Array1::<f64>::zeros(3));
}

#[test]
fn inputs_are_never_mutated() {
    let (a, y, _) = planted_problem(12, 4, 2);
    let (a_before, y_before) = (a.clone(), y.clone());
    let x0 = Array1::from_elem(4, 0.5);
    let x0_before = x0.clone();
    solve_seeded(y.view(), a.view(), Some(x0.view()), &LassoConfig::default(), 0).unwrap();
    assert_eq!(a, a_before);
    assert_eq!(y, y_before);
    assert_eq!(x0, x0_before);
}

#[test]
fn independent_solves_can_run_in_parallel() {
    let problems: Vec<(Array2<f64>, Array1<f64>)> = (0..16)
        .map(|seed| {
            let (a, y, _) = planted_problem(20, 5, seed);
            (a, y)
        })
        .collect();
    let config = LassoConfig {
        tolerance: 1e-6,
        ..LassoConfig::default()
    };

    let sequential: Vec<Array1<f64>> = problems
        .iter()
        .enumerate()
        .map(|(i, (a, y))| {
            solve_seeded(y.view(), a.view(), None, &config, i as u64)
                .unwrap()
                .coefficients
        })
        .collect();
    let parallel: Vec<Array1<f64>> = problems
        .par_iter()
        .enumerate()
        .map(|(i, (a, y))| {
            let mut rng = StdRng::seed_from_u64(i as u64);
            solve(y.view(), a.view(), None, &config, &mut rng)
                .unwrap()
                .coefficients
        })
        .collect();
    assert_eq!(sequential, parallel);
}

#[test]
fn error_messages_name_the_problem() {
    let a = Array2::<f64>::ones((3, 2));
    let y = Array1::<f64>::ones(2);
    let err = solve_seeded(y.view(), a.view(), None, &LassoConfig::default(), 0).unwrap_err();
    assert!(matches!(err, LassoError::DimensionMismatch(_)));
    assert!(err.to_string().contains("3 rows"));

    let config = LassoConfig {
        tolerance: -1.0,
        ..LassoConfig::default()
    };
    let y = Array1::<f64>::ones(3);
    let err = solve_seeded(y.view(), a.view(), None, &config, 0).unwrap_err();
    assert!(err.to_string().contains("tolerance"));
}
