//! Sequential execution of one filter phase.

use crate::filter::BoxedFilter;
use futures_util::FutureExt;
use portico_core::{FailureCause, FilterError, Phase, RequestContext};
use std::panic::{self, AssertUnwindSafe};

/// Runs the filters of one phase in order, stopping at the first failure.
///
/// Filters are ordered by ascending [`order`](crate::Filter::order); filters
/// with equal order keep their registration order. Each filter's predicate is
/// checked right before the filter would run, so it observes the mutations
/// of the filters before it.
///
/// # Example
///
/// ```
/// use portico_filters::{BoxedFilter, FnFilter, Phase, PhaseExecutor};
/// use std::sync::Arc;
///
/// let filters: Vec<BoxedFilter> = vec![
///     Arc::new(FnFilter::new("late", Phase::Pre, 10, |_| Ok(()))),
///     Arc::new(FnFilter::new("early", Phase::Pre, -5, |_| Ok(()))),
///     Arc::new(FnFilter::new("route", Phase::Route, 0, |_| Ok(()))),
/// ];
///
/// let pre = PhaseExecutor::new(Phase::Pre, &filters);
/// assert_eq!(pre.filter_names(), vec!["early", "late"]);
/// ```
pub struct PhaseExecutor {
    phase: Phase,
    filters: Vec<BoxedFilter>,
}

impl PhaseExecutor {
    /// Selects the filters bound to `phase` and orders them.
    #[must_use]
    pub fn new(phase: Phase, filters: &[BoxedFilter]) -> Self {
        let mut selected: Vec<BoxedFilter> = filters
            .iter()
            .filter(|filter| filter.phase() == phase)
            .cloned()
            .collect();
        // Vec::sort_by_key is stable
        selected.sort_by_key(|filter| filter.order());

        Self {
            phase,
            filters: selected,
        }
    }

    /// Returns the phase this executor runs.
    #[must_use]
    pub fn phase(&self) -> Phase {
        self.phase
    }

    /// Returns the filter names in execution order.
    #[must_use]
    pub fn filter_names(&self) -> Vec<&str> {
        self.filters.iter().map(|filter| filter.name()).collect()
    }

    /// Returns the number of filters in this phase.
    #[must_use]
    pub fn len(&self) -> usize {
        self.filters.len()
    }

    /// Returns true if no filter is bound to this phase.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.filters.is_empty()
    }

    /// Runs the phase against `ctx`.
    ///
    /// On the first failing filter the failure is recorded on the context
    /// (unless one is already recorded for this phase) and returned; the
    /// remaining filters are skipped.
    pub async fn execute(&self, ctx: &mut RequestContext) -> Result<(), FailureCause> {
        for filter in &self.filters {
            let applies = panic::catch_unwind(AssertUnwindSafe(|| filter.should_run(ctx)));
            match applies {
                Ok(true) => {}
                Ok(false) => {
                    tracing::trace!(phase = %self.phase, filter = filter.name(), "Filter skipped");
                    continue;
                }
                Err(payload) => {
                    return Err(self.fail(ctx, filter.name(), FilterError::from_panic(payload)));
                }
            }

            let outcome = AssertUnwindSafe(filter.run(ctx)).catch_unwind().await;
            let error = match outcome {
                Ok(Ok(())) => continue,
                Ok(Err(error)) => error,
                Err(payload) => FilterError::from_panic(payload),
            };
            return Err(self.fail(ctx, filter.name(), error));
        }

        Ok(())
    }

    fn fail(&self, ctx: &mut RequestContext, filter: &str, error: FilterError) -> FailureCause {
        let cause = FailureCause::new(self.phase, error).with_filter(filter);
        tracing::warn!(
            phase = %self.phase,
            filter = filter,
            category = cause.error().category(),
            error = %cause.error(),
            "Filter failed"
        );
        ctx.record_failure(cause.clone());
        cause
    }
}

impl std::fmt::Debug for PhaseExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PhaseExecutor")
            .field("phase", &self.phase)
            .field("filters", &self.filter_names())
            .finish()
    }
}
