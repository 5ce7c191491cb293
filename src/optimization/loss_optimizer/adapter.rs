//! Adapter that exposes a user [`Objective`] as an `argmin` problem.
//!
//! The loss is minimized as-is, so no sign flips happen here. Objectives that
//! implement a joint [`Objective::value_and_grad`] are evaluated once per
//! point: the adapter keeps the last `(θ, L, ∇L)` triple and serves the
//! separate `cost`/`gradient` requests issued by the line search from it.
//! Objectives without an analytic gradient fall back to finite differences of
//! the cost.
use std::cell::RefCell;

use crate::optimization::{
    errors::OptError,
    loss_optimizer::{
        traits::Objective,
        types::{Cost, Grad, Theta},
        validation::{validate_grad, validate_value},
    },
};
use argmin::core::{CostFunction, Error, Gradient};
use finitediff::FiniteDiff;

/// Last joint evaluation served from the cache.
#[derive(Debug, Clone)]
struct Evaluation {
    theta: Theta,
    cost: Cost,
    grad: Grad,
}

/// Bridges a user [`Objective`] to `argmin`'s `CostFunction` and `Gradient`.
///
/// - `CostFunction::cost` returns `L(θ)`.
/// - `Gradient::gradient` returns the analytic `∇L(θ)` when available, or a
///   finite-difference gradient of the cost otherwise.
pub struct ArgMinAdapter<'a, F: Objective> {
    pub f: &'a F,
    pub data: &'a F::Data,
    cache: RefCell<Option<Evaluation>>,
}

impl<'a, F: Objective> ArgMinAdapter<'a, F> {
    /// Construct a new adapter over a user objective and its data.
    pub fn new(f: &'a F, data: &'a F::Data) -> Self {
        Self { f, data, cache: RefCell::new(None) }
    }

    fn cached(&self, theta: &Theta) -> Option<(Cost, Grad)> {
        self.cache
            .borrow()
            .as_ref()
            .filter(|eval| eval.theta == *theta)
            .map(|eval| (eval.cost, eval.grad.clone()))
    }

    /// Joint evaluation with caching.
    ///
    /// Returns `Ok(None)` when the objective has no analytic gradient, in
    /// which case the caller evaluates the cost alone.
    ///
    /// # Errors
    /// - [`OptError::NonFiniteCost`] / [`OptError::InvalidGradient`] for
    ///   non-finite outputs.
    /// - Any other error raised by the objective.
    fn evaluate(&self, theta: &Theta) -> Result<Option<(Cost, Grad)>, Error> {
        if let Some(hit) = self.cached(theta) {
            return Ok(Some(hit));
        }
        match self.f.value_and_grad(theta, self.data) {
            Ok((cost, grad)) => {
                validate_value(cost)?;
                validate_grad(&grad, theta.len())?;
                *self.cache.borrow_mut() =
                    Some(Evaluation { theta: theta.clone(), cost, grad: grad.clone() });
                Ok(Some((cost, grad)))
            }
            Err(OptError::GradientNotImplemented) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn plain_cost(&self, theta: &Theta) -> Result<Cost, Error> {
        let value = self.f.value(theta, self.data)?;
        validate_value(value)?;
        Ok(value)
    }
}

impl<'a, F: Objective> CostFunction for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Output = Cost;

    /// Evaluate the loss `L(θ)`, rejecting non-finite values with
    /// [`OptError::NonFiniteCost`].
    fn cost(&self, theta: &Self::Param) -> Result<Self::Output, Error> {
        match self.evaluate(theta)? {
            Some((cost, _)) => Ok(cost),
            None => self.plain_cost(theta),
        }
    }
}

impl<'a, F: Objective> Gradient for ArgMinAdapter<'a, F> {
    type Param = Theta;
    type Gradient = Grad;

    /// Evaluate the gradient of the loss at `θ`.
    ///
    /// Behavior:
    /// - If the objective implements a gradient, it is validated and returned
    ///   (from the cache when the point was just evaluated).
    /// - Otherwise a finite-difference gradient of the cost is computed:
    ///   central differences first, then forward differences if any cost
    ///   evaluation failed or the central result is not finite.
    ///
    /// The FD closure must return `f64`, so the first error raised inside it
    /// is captured in `closure_err` and `NaN` is returned in its place.
    ///
    /// # Errors
    /// - Propagates objective errors other than `GradientNotImplemented`.
    /// - Propagates errors raised by cost evaluations performed during FD.
    /// - Returns validation errors for wrong dimension or non-finite entries.
    fn gradient(&self, theta: &Self::Param) -> Result<Self::Gradient, Error> {
        if let Some((_, grad)) = self.evaluate(theta)? {
            return Ok(grad);
        }
        let dim = theta.len();
        let closure_err: RefCell<Option<Error>> = RefCell::new(None);
        let cost_func = |theta: &Theta| -> f64 {
            match self.plain_cost(theta) {
                Ok(val) => val,
                Err(e) => {
                    let mut slot = closure_err.borrow_mut();
                    if slot.is_none() {
                        *slot = Some(e);
                    }
                    f64::NAN
                }
            }
        };
        let fd_grad = theta.central_diff(&cost_func);
        if closure_err.borrow().is_some() {
            return run_forward_diff(theta, &cost_func, &closure_err);
        }
        match validate_grad(&fd_grad, dim) {
            Ok(()) => Ok(fd_grad),
            Err(_) => run_forward_diff(theta, &cost_func, &closure_err),
        }
    }
}

/// Forward-difference gradient of `func` at `theta`, with error capture.
///
/// Clears `closure_err`, runs `forward_diff`, surfaces any captured error,
/// and validates the result.
fn run_forward_diff<G: Fn(&Theta) -> f64>(
    theta: &Theta, func: &G, closure_err: &RefCell<Option<Error>>,
) -> Result<Grad, Error> {
    closure_err.replace(None);
    let fd_grad = theta.forward_diff(func);
    if let Some(err) = closure_err.take() {
        return Err(err);
    }
    validate_grad(&fd_grad, theta.len())?;
    Ok(fd_grad)
}
