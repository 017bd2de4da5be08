use palaver_core::tokens::TokenEstimator;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct BudgetDecision {
    pub admitted: bool,
    pub candidate_tokens: i64,
    /// Current spend plus the candidate counted twice, once for the message
    /// and once for the reply it is expected to draw.
    pub projected_total: i64,
    pub ceiling: i64,
}

/// Pre-flight check of a turn against the per-conversation token ceiling.
///
/// The decision is advisory only with respect to the actual cost: the reply
/// is charged after the fact, so the turn that crosses the ceiling still
/// commits and only the next one is refused.
#[derive(Clone, Debug)]
pub struct BudgetGuard {
    estimator: TokenEstimator,
    ceiling: i64,
}

impl BudgetGuard {
    pub fn new(estimator: TokenEstimator, ceiling: i64) -> Self {
        Self { estimator, ceiling }
    }

    pub fn ceiling(&self) -> i64 {
        self.ceiling
    }

    pub fn estimator(&self) -> &TokenEstimator {
        &self.estimator
    }

    pub fn check(&self, current_spent: i64, candidate: &str) -> BudgetDecision {
        let candidate_tokens = self.estimator.estimate(candidate);
        let projected_total =
            current_spent.saturating_add(candidate_tokens).saturating_add(candidate_tokens);

        BudgetDecision {
            admitted: projected_total <= self.ceiling,
            candidate_tokens,
            projected_total,
            ceiling: self.ceiling,
        }
    }
}
