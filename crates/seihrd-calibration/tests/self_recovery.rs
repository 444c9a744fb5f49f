use chrono::NaiveDate;
use seihrd_calibration::{
    fit, optimize, LikelihoodConfig, LikelihoodEvaluator, NelderMeadConfig, OptimizationConfig,
    ParameterBounds, ParticleSwarmConfig, NON_FINITE_PENALTY,
};
use seihrd_core::{
    AgeBand, BandValues, Compartment, InitialConditions, ParameterSet, Population, TimeGrid,
    Trajectory,
};
use seihrd_data::ObservedSeries;
use seihrd_ode::{Integrator, Simulator};

const DAYS: usize = 60;

fn grid() -> TimeGrid {
    TimeGrid::new(NaiveDate::from_ymd_opt(2020, 3, 20).unwrap(), DAYS).unwrap()
}

fn simulator() -> Simulator {
    Simulator::new(
        Population::england_2020(),
        &InitialConditions::default(),
        Integrator::default(),
    )
    .unwrap()
}

fn truth() -> ParameterSet {
    let mut params = ParameterSet::prior();
    params.beta = [0.25, 0.3, 0.2];
    params.delta = [1.0 / 200.0, 1.0 / 60.0, 1.0 / 30.0];
    params
}

fn columns(trajectory: &Trajectory, compartment: Compartment) -> Vec<BandValues> {
    trajectory
        .states()
        .iter()
        .map(|state| *state.compartment(compartment))
        .collect()
}

/// Noiseless observations generated by the model itself.
fn synthetic_evaluator(params: &ParameterSet) -> LikelihoodEvaluator<Simulator> {
    let trajectory = simulator().simulate(params, &grid()).unwrap();
    let observed = ObservedSeries::from_columns(
        grid(),
        columns(&trajectory, Compartment::Hospitalised),
        columns(&trajectory, Compartment::Deceased),
    )
    .unwrap();
    LikelihoodEvaluator::new(simulator(), observed, LikelihoodConfig::default()).unwrap()
}

fn nelder_mead(max_iterations: u64) -> OptimizationConfig {
    OptimizationConfig::NelderMead(NelderMeadConfig::new().with_max_iterations(max_iterations))
}

#[test]
fn test_true_parameters_outscore_prior() {
    let evaluator = synthetic_evaluator(&truth());
    let at_truth = evaluator.log_likelihood(&truth());
    let at_prior = evaluator.log_likelihood(&ParameterSet::prior());

    assert!(at_truth.is_finite());
    assert!(at_truth > at_prior);
}

#[test]
fn test_fit_from_truth_does_not_lose_ground() {
    let evaluator = synthetic_evaluator(&truth());
    let result = fit(evaluator, &truth(), ParameterBounds::default(), &nelder_mead(40)).unwrap();

    assert!(result.initial_log_likelihood.is_finite());
    assert!(result.log_likelihood >= result.initial_log_likelihood);
    assert_eq!(result.trajectory.len(), DAYS);
    assert!(result.iterations <= 40);
    assert!(result.cost_evaluations > 18);
    assert!(ParameterBounds::default().contains(&result.parameters));
}

#[test]
fn test_fit_improves_on_perturbed_start() {
    let evaluator = synthetic_evaluator(&truth());
    let mut start = truth();
    start.beta = start.beta.map(|b| b * 1.2);
    start.rho = start.rho.map(|r| r * 0.7);

    let result = fit(evaluator, &start, ParameterBounds::default(), &nelder_mead(150)).unwrap();

    assert!(result.log_likelihood >= result.initial_log_likelihood);
    assert!(!result.termination_reason.is_empty());
    // The fitted trajectory is the one the reported score belongs to.
    let rescored = synthetic_evaluator(&truth()).score(&result.trajectory);
    assert!((rescored - result.log_likelihood).abs() <= 1e-6 * rescored.abs().max(1.0));
}

#[test]
fn test_fit_from_perturbed_start_reaches_true_score() {
    let evaluator = synthetic_evaluator(&truth());
    let true_score = evaluator.log_likelihood(&truth());
    let mut start = truth();
    start.beta = start.beta.map(|b| b * 1.2);
    start.rho = start.rho.map(|r| r * 0.7);

    let config = OptimizationConfig::NelderMead(NelderMeadConfig::default());
    let result = fit(evaluator, &start, ParameterBounds::default(), &config).unwrap();

    assert!(true_score.is_finite());
    assert!(result.log_likelihood >= true_score);
}

#[test]
fn test_early_zero_deaths_do_not_stall_the_search() {
    let days = 30;
    let grid = TimeGrid::new(NaiveDate::from_ymd_opt(2020, 3, 20).unwrap(), days).unwrap();
    let trajectory = simulator().simulate(&truth(), &grid).unwrap();
    let mut deaths = columns(&trajectory, Compartment::Deceased);
    for day in deaths.iter_mut().take(10) {
        day[AgeBand::Young.index()] = 0.0;
    }
    let observed = ObservedSeries::from_columns(
        grid,
        columns(&trajectory, Compartment::Hospitalised),
        deaths,
    )
    .unwrap();
    let evaluator =
        LikelihoodEvaluator::new(simulator(), observed, LikelihoodConfig::default()).unwrap();

    let prior = ParameterSet::prior();
    let start_cost = evaluator.penalised_cost(&prior);
    assert_eq!(evaluator.log_likelihood(&prior), f64::NEG_INFINITY);
    assert!(start_cost >= NON_FINITE_PENALTY);

    let outcome = optimize(evaluator, &prior, &nelder_mead(200)).unwrap();
    assert!(outcome.best_cost < start_cost);
    assert_ne!(outcome.parameter_set().unwrap(), prior);
}

#[test]
fn test_budget_exhaustion_is_reported_not_fatal() {
    let evaluator = synthetic_evaluator(&truth());
    let outcome = optimize(evaluator, &ParameterSet::prior(), &nelder_mead(2)).unwrap();

    assert!(!outcome.converged);
    assert_eq!(outcome.termination_reason, "MaxItersReached");
    assert_eq!(outcome.best_parameters.len(), 18);
    assert_eq!(outcome.parameter_names[0], "beta_young");
}

#[test]
fn test_start_outside_bounds_is_clamped() {
    let evaluator = synthetic_evaluator(&truth());
    let mut start = truth();
    start.sigma[AgeBand::Adult.index()] = 9.0;

    let outcome = optimize(evaluator, &start, &nelder_mead(1)).unwrap();
    assert!(outcome.best_parameters.iter().all(|v| (0.0..=5.0).contains(v)));
}

#[test]
fn test_particle_swarm_stays_within_bounds() {
    let evaluator = synthetic_evaluator(&truth());
    let bounds = ParameterBounds::uniform(0.0, 0.5);
    let config = OptimizationConfig::ParticleSwarm(
        ParticleSwarmConfig::new()
            .with_num_particles(6)
            .with_max_iterations(3),
    );

    let result = fit(evaluator, &ParameterSet::prior(), bounds, &config).unwrap();

    assert!(bounds.contains(&result.parameters));
    assert_eq!(result.trajectory.len(), DAYS);
    assert!(result.cost_evaluations > 0);
}

#[test]
fn test_invalid_bounds_rejected_before_search() {
    let evaluator = synthetic_evaluator(&truth());
    let result = fit(
        evaluator,
        &truth(),
        ParameterBounds::uniform(2.0, 1.0),
        &nelder_mead(10),
    );
    assert!(result.is_err());
}
