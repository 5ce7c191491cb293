//! Public API surface for loss minimization.
//!
//! - [`Objective`]: trait users implement for their loss.
//! - [`SolverOptions`] and [`Tolerances`]: configuration for the optimizer.
//! - [`LineSearcher`]: choice of line search used by L-BFGS.
//! - [`Termination`] and [`OptimOutcome`]: normalized result returned by the
//!   high-level `minimize` API.
//!
//! Convention: the optimizer *minimizes* the user loss `L(θ)` directly. If an
//! analytic gradient is provided, it is `∇L(θ)` and is passed through unchanged.
use crate::optimization::{
    errors::{OptError, OptResult},
    loss_optimizer::{
        Cost, FnEvalMap, Grad, Theta,
        types::{DEFAULT_HISTORY_SIZE, DEFAULT_MAX_ITER, DEFAULT_TOL_COST, DEFAULT_TOL_GRAD},
        validation::{validate_theta_hat, validate_value, verify_tol_cost, verify_tol_grad},
    },
};
use argmin::core::{TerminationReason, TerminationStatus};
use argmin_math::ArgminL2Norm;
use std::{fmt, str::FromStr};

/// User-implemented loss interface.
///
/// - `type Data`: per-problem data carried into `value`/`grad`/`check`.
///
/// Required:
/// - `value(&Theta, &Data) -> OptResult<Cost>`: evaluate `L(θ)`.
/// - `check(&Theta, &Data) -> OptResult<()>`: validation hook to reject
///   obviously invalid `θ`/`data` pairs. Called once before optimization.
///
/// Optional:
/// - `grad(&Theta, &Data) -> OptResult<Grad>`: analytic gradient `∇L(θ)`.
///   If not implemented, finite differences are used automatically.
/// - `value_and_grad(&Theta, &Data)`: joint evaluation. Override it when the
///   loss and gradient share expensive intermediates; the optimizer adapter
///   calls it once per point and caches the pair.
pub trait Objective {
    type Data;

    // Required methods
    fn value(&self, theta: &Theta, data: &Self::Data) -> OptResult<Cost>;
    fn check(&self, theta: &Theta, data: &Self::Data) -> OptResult<()>;

    // Optional methods
    fn grad(&self, _theta: &Theta, _data: &Self::Data) -> OptResult<Grad> {
        Err(OptError::GradientNotImplemented)
    }

    fn value_and_grad(&self, theta: &Theta, data: &Self::Data) -> OptResult<(Cost, Grad)> {
        let grad = self.grad(theta, data)?;
        let value = self.value(theta, data)?;
        Ok((value, grad))
    }
}

/// Choice of line search used inside the L-BFGS solver.
///
/// Both variants enforce the strong Wolfe conditions. Parsing via `FromStr`
/// is case-insensitive (`"MoreThuente"`, `"HagerZhang"`); unknown names
/// return [`OptError::InvalidLineSearch`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LineSearcher {
    #[default]
    MoreThuente,
    HagerZhang,
}

impl FromStr for LineSearcher {
    type Err = OptError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "morethuente" => Ok(LineSearcher::MoreThuente),
            "hagerzhang" => Ok(LineSearcher::HagerZhang),
            _ => Err(OptError::InvalidLineSearch {
                name: s.to_string(),
                reason: "Valid options are case insensitive 'MoreThuente' or 'HagerZhang'.",
            }),
        }
    }
}

/// Optimizer-level configuration.
///
/// Fields:
/// - `tols: Tolerances`: numerical tolerances and iteration limits.
/// - `line_searcher: LineSearcher`: line-search algorithm used by L-BFGS.
/// - `verbose: bool`: if `true`, attaches a terminal observer (behind the
///   `obs_slog` feature) that prints every iteration.
/// - `history_size: Option<usize>`: L-BFGS memory `m`; `None` uses
///   [`DEFAULT_HISTORY_SIZE`].
///
/// Default:
/// - `tols`: `tol_grad = 1e-10`, `tol_cost = 1e-6` (relative), `max_iter = 5000`
/// - `line_searcher`: `MoreThuente`
/// - `verbose`: `false`
/// - `history_size`: `None`
#[derive(Debug, Clone, PartialEq)]
pub struct SolverOptions {
    pub tols: Tolerances,
    pub line_searcher: LineSearcher,
    pub verbose: bool,
    pub history_size: Option<usize>,
}

impl SolverOptions {
    /// Create a new set of optimizer options.
    ///
    /// # Errors
    /// - [`OptError::InvalidHistorySize`] if `history_size == Some(0)`.
    pub fn new(
        tols: Tolerances, line_searcher: LineSearcher, verbose: bool, history_size: Option<usize>,
    ) -> OptResult<Self> {
        if let Some(size) = history_size {
            if size == 0 {
                return Err(OptError::InvalidHistorySize {
                    size,
                    reason: "L-BFGS history size must be greater than zero.",
                });
            }
        }
        Ok(Self { tols, line_searcher, verbose, history_size })
    }

    /// History size actually handed to the solver.
    pub fn effective_history_size(&self) -> usize {
        self.history_size.unwrap_or(DEFAULT_HISTORY_SIZE)
    }
}

impl Default for SolverOptions {
    fn default() -> Self {
        Self {
            tols: Tolerances::default(),
            line_searcher: LineSearcher::MoreThuente,
            verbose: false,
            history_size: None,
        }
    }
}

/// Numerical tolerances and iteration limits used by the optimizer.
///
/// - `tol_grad`: terminate when the gradient norm falls below this threshold.
/// - `tol_cost`: terminate when the per-iteration change in the loss falls
///   below `tol_cost · max(|L(θ₀)|, 1)`.
/// - `max_iter`: hard cap on the number of iterations.
///
/// Any field can be `None` but **at least one** of the three must be provided
/// (see [`Tolerances::new`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tolerances {
    pub tol_grad: Option<f64>,
    pub tol_cost: Option<f64>,
    pub max_iter: Option<usize>,
}

impl Tolerances {
    /// Construct validated tolerances.
    ///
    /// # Rules
    /// - At least one of `tol_grad`, `tol_cost`, or `max_iter` must be `Some`.
    /// - If provided, tolerances must be **finite and strictly positive**.
    /// - If provided, `max_iter` must be `> 0`.
    ///
    /// # Errors
    /// - [`OptError::NoTolerancesProvided`] if all three are `None`.
    /// - [`OptError::InvalidTolGrad`] / [`OptError::InvalidTolCost`] for
    ///   non-finite or non-positive tolerances.
    /// - [`OptError::InvalidMaxIter`] if `max_iter == 0`.
    pub fn new(
        tol_grad: Option<f64>, tol_cost: Option<f64>, max_iter: Option<usize>,
    ) -> OptResult<Self> {
        if tol_grad.is_none() && tol_cost.is_none() && max_iter.is_none() {
            return Err(OptError::NoTolerancesProvided);
        }
        verify_tol_cost(tol_cost)?;
        verify_tol_grad(tol_grad)?;
        if let Some(max_iter) = max_iter {
            if max_iter == 0 {
                return Err(OptError::InvalidMaxIter {
                    max_iter,
                    reason: "Maximum iterations must be greater than zero.",
                });
            }
        }
        Ok(Self { tol_grad, tol_cost, max_iter })
    }
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            tol_grad: Some(DEFAULT_TOL_GRAD),
            tol_cost: Some(DEFAULT_TOL_COST),
            max_iter: Some(DEFAULT_MAX_ITER),
        }
    }
}

/// Why a run stopped.
///
/// - `Converged`: a gradient or objective-change tolerance was met.
/// - `MaxIterationsReached`: the iteration cap was hit; the best iterate is
///   still returned.
/// - `Stalled`: the solver could not make further progress (typically a line
///   search that found no acceptable step).
///
/// Non-finite losses are not a termination state; they abort the run with
/// [`OptError::NumericalFailure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Termination {
    Converged,
    MaxIterationsReached,
    Stalled { reason: String },
}

impl Termination {
    /// Map argmin's termination status onto the crate's three outcomes.
    pub fn from_status(status: &TerminationStatus) -> Self {
        match status {
            TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached) => {
                Termination::Converged
            }
            TerminationStatus::Terminated(TerminationReason::MaxItersReached) => {
                Termination::MaxIterationsReached
            }
            TerminationStatus::NotTerminated => {
                Termination::Stalled { reason: "Solver returned without terminating".to_string() }
            }
            TerminationStatus::Terminated(other) => {
                Termination::Stalled { reason: format!("{other:?}") }
            }
        }
    }

    pub fn is_converged(&self) -> bool {
        matches!(self, Termination::Converged)
    }
}

impl fmt::Display for Termination {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Termination::Converged => write!(f, "Converged"),
            Termination::MaxIterationsReached => write!(f, "Maximum iterations reached"),
            Termination::Stalled { reason } => write!(f, "Stalled: {reason}"),
        }
    }
}

/// Canonical result returned by `minimize`.
///
/// - `theta_hat`: best parameter vector found.
/// - `value`: best loss value `L(θ̂)`.
/// - `converged`: `true` only for [`Termination::Converged`].
/// - `termination`: structured stop reason.
/// - `status`: human-readable termination status string.
/// - `iterations`: number of optimizer iterations performed.
/// - `fn_evals`: function-evaluation counters reported by `argmin`
///   (e.g. `cost_count`, `gradient_count`).
/// - `grad_norm`: norm of the last available gradient, if present.
/// - `trace`: loss value after every iteration, starting with `L(θ₀)`.
#[derive(Debug, Clone, PartialEq)]
pub struct OptimOutcome {
    pub theta_hat: Theta,
    pub value: f64,
    pub converged: bool,
    pub termination: Termination,
    pub status: String,
    pub iterations: usize,
    pub fn_evals: FnEvalMap,
    pub grad_norm: Option<f64>,
    pub trace: Vec<f64>,
}

impl OptimOutcome {
    /// Build a validated [`OptimOutcome`] from raw solver state.
    ///
    /// # Errors
    /// - Propagates validation errors for `theta_hat` (missing or non-finite)
    ///   and `value` (non-finite).
    pub fn new(
        theta_hat_opt: Option<Theta>, value: f64, termination: Termination, iterations: u64,
        fn_evals: FnEvalMap, grad: Option<Grad>, trace: Vec<f64>,
    ) -> OptResult<Self> {
        let theta_hat = validate_theta_hat(theta_hat_opt)?;
        validate_value(value)?;
        let status = termination.to_string();
        let converged = termination.is_converged();
        let grad_norm = grad.map(|g| g.l2_norm());
        Ok(Self {
            theta_hat,
            value,
            converged,
            termination,
            status,
            iterations: iterations as usize,
            fn_evals,
            grad_norm,
            trace,
        })
    }
}
