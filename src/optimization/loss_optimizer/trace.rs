//! Per-iteration recording of an L-BFGS run.
//!
//! [`TraceObserver`] is attached to every run as an argmin observer. It
//! appends the current loss after each iteration and remembers the latest and
//! best iterates, so the runner can still return a meaningful point when the
//! solver aborts with an error and its final state is lost.
use std::sync::{Arc, Mutex, PoisonError};

use argmin::core::{Error, KV, State, observers::Observe};

use crate::optimization::loss_optimizer::types::{Cost, LbfgsState, Theta};

/// Loss history and iterates collected during a run.
#[derive(Debug, Clone, PartialEq)]
pub struct IterationTrace {
    /// `L(θ₀)` followed by the loss after every completed iteration.
    pub costs: Vec<Cost>,
    /// Most recent finite iterate.
    pub last_param: Theta,
    /// Lowest-loss iterate seen so far.
    pub best_param: Theta,
    pub best_cost: Cost,
}

impl IterationTrace {
    pub fn new(theta0: Theta, cost0: Cost) -> Self {
        Self { costs: vec![cost0], last_param: theta0.clone(), best_param: theta0, best_cost: cost0 }
    }

    /// Record one iteration.
    pub fn record(&mut self, param: &Theta, cost: Cost) {
        self.costs.push(cost);
        if param.iter().all(|v| v.is_finite()) {
            self.last_param = param.clone();
            if cost.is_finite() && cost <= self.best_cost {
                self.best_cost = cost;
                self.best_param = param.clone();
            }
        }
    }

    /// Whether the recorded losses never increase (up to `slack`).
    pub fn is_monotone(&self, slack: f64) -> bool {
        self.costs.windows(2).all(|pair| pair[1] <= pair[0] + slack)
    }
}

/// Argmin observer feeding a shared [`IterationTrace`].
#[derive(Debug, Clone)]
pub struct TraceObserver {
    trace: Arc<Mutex<IterationTrace>>,
}

impl TraceObserver {
    pub fn new(trace: Arc<Mutex<IterationTrace>>) -> Self {
        Self { trace }
    }
}

impl Observe<LbfgsState> for TraceObserver {
    fn observe_iter(&mut self, state: &LbfgsState, _kv: &KV) -> Result<(), Error> {
        if let Some(param) = state.get_param() {
            let mut trace = self.trace.lock().unwrap_or_else(PoisonError::into_inner);
            trace.record(param, state.get_cost());
        }
        Ok(())
    }
}
