//! Execution helper that runs an `argmin` solver on a loss-minimization
//! problem and returns a crate-friendly [`OptimOutcome`].
use std::sync::{Arc, Mutex, PoisonError};

use crate::optimization::{
    errors::{OptError, OptResult},
    loss_optimizer::{
        Objective, OptimOutcome, SolverOptions, Termination, Theta,
        adapter::ArgMinAdapter,
        trace::{IterationTrace, TraceObserver},
        types::{Cost, FnEvalMap, LbfgsState},
    },
};
use argmin::core::{Executor, Solver, State, observers::ObserverMode};

/// Run an `argmin` optimization for a loss-minimization problem.
///
/// This is the shared runner used by both line-search variants. It wires up
/// the problem, the solver, the initial parameter `theta0`, the trace
/// observer, the optional slog observer, and the iteration cap, then executes
/// the solver and converts the result into [`OptimOutcome`].
///
/// # Arguments
/// - `theta0`: initial parameter vector.
/// - `cost0`: `L(θ₀)`, already evaluated by the caller; seeds the trace.
/// - `opts`: optimizer options (tolerances, verbosity, max iters).
/// - `problem`: an [`ArgMinAdapter`] wrapping the objective and its data.
/// - `solver`: a fully constructed solver from `builders`.
///
/// # Feature flags
/// With `obs_slog` enabled and `opts.verbose == true`, a terminal slog
/// observer is attached with `ObserverMode::Always`.
///
/// # Outcomes
/// - Normal termination maps through [`Termination::from_status`].
/// - A non-finite loss or gradient mid-run returns
///   [`OptError::NumericalFailure`] carrying the last finite iterate.
/// - Any other backend error (e.g. a line search that cannot find an
///   acceptable step) is reported as [`Termination::Stalled`] with the best
///   iterate recorded so far.
/// - Errors raised by the objective that are neither of the above propagate
///   unchanged.
pub fn run_lbfgs<'a, F, S>(
    theta0: Theta, cost0: Cost, opts: &SolverOptions, problem: ArgMinAdapter<'a, F>, solver: S,
) -> OptResult<OptimOutcome>
where
    F: Objective,
    S: Solver<ArgMinAdapter<'a, F>, LbfgsState> + Send + 'static,
{
    let trace = Arc::new(Mutex::new(IterationTrace::new(theta0.clone(), cost0)));
    let mut optimizer = Executor::new(problem, solver)
        .configure(|state| state.param(theta0))
        .add_observer(TraceObserver::new(Arc::clone(&trace)), ObserverMode::Always);
    #[cfg(feature = "obs_slog")]
    if opts.verbose {
        let observer = argmin_observer_slog::SlogLogger::term_noblock();
        optimizer = optimizer.add_observer(observer, ObserverMode::Always);
    }
    if let Some(max_iter) = opts.tols.max_iter {
        optimizer = optimizer.configure(|state| state.max_iters(max_iter as u64));
    }

    let run = optimizer.run();
    let recorded = trace.lock().unwrap_or_else(PoisonError::into_inner).clone();
    match run {
        Ok(result) => {
            let mut state = result.state().clone();
            let iterations = state.get_iter();
            let function_counts = state.get_func_counts().clone();
            let termination = Termination::from_status(state.get_termination_status());
            let grad = state.take_gradient();
            let best_cost = state.get_best_cost();
            let (theta_hat, value) = match state.take_best_param() {
                Some(param) if best_cost.is_finite() => (param, best_cost),
                _ => (recorded.best_param.clone(), recorded.best_cost),
            };
            log::debug!("L-BFGS finished after {iterations} iterations: {termination}");
            OptimOutcome::new(
                Some(theta_hat),
                value,
                termination,
                iterations,
                function_counts,
                grad,
                recorded.costs,
            )
        }
        Err(err) => classify_failure(OptError::from(err), recorded),
    }
}

/// Turn an aborted run into either a hard numerical failure or a soft stall.
fn classify_failure(err: OptError, recorded: IterationTrace) -> OptResult<OptimOutcome> {
    let iterations = recorded.costs.len().saturating_sub(1);
    if err.is_numerical_failure() {
        log::warn!("L-BFGS aborted after {iterations} iterations: {err}");
        return Err(OptError::NumericalFailure {
            reason: err.to_string(),
            iterations,
            last_iterate: recorded.last_param,
        });
    }
    if !is_backend_stop(&err) {
        return Err(err);
    }
    log::warn!("L-BFGS stalled after {iterations} iterations: {err}");
    OptimOutcome::new(
        Some(recorded.best_param),
        recorded.best_cost,
        Termination::Stalled { reason: err.to_string() },
        iterations as u64,
        FnEvalMap::new(),
        None,
        recorded.costs,
    )
}

fn is_backend_stop(err: &OptError) -> bool {
    matches!(
        err,
        OptError::InvalidParameter { .. }
            | OptError::NotImplemented { .. }
            | OptError::NotInitialized { .. }
            | OptError::ConditionViolated { .. }
            | OptError::PotentialBug { .. }
            | OptError::ImpossibleError { .. }
            | OptError::BackendError { .. }
            | OptError::UnknownError
    )
}
