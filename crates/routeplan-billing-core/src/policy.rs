//! Plan and usage policy
//!
//! Pure checks over [`PlanLimits`]. Usage accounting lives in
//! [`BillingService::admit_optimization`](crate::BillingService::admit_optimization),
//! which runs these checks and the increment in one versioned write.

use std::fmt;

use routeplan_types::{Limit, PlanCatalog, PlanLimits, SubscriptionState};

/// Which limit a request ran into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LimitKind {
    Stops,
    Optimizations,
}

impl LimitKind {
    /// Metrics label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Stops => "max_stops",
            Self::Optimizations => "max_optimizations",
        }
    }
}

/// A request refused by plan policy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyRejection {
    pub limit: LimitKind,
    /// Stops requested, or optimizations already used
    pub amount: u32,
    pub max: u32,
    pub plan: String,
}

impl fmt::Display for PolicyRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.limit {
            LimitKind::Stops => write!(
                f,
                "Route has {} stops, which exceeds the limit of {} stops for plan '{}'.",
                self.amount, self.max, self.plan
            ),
            LimitKind::Optimizations => write!(
                f,
                "Optimization limit reached: {} of {} used this cycle for plan '{}'.",
                self.amount, self.max, self.plan
            ),
        }
    }
}

impl std::error::Error for PolicyRejection {}

/// Limits in force for a subscription state.
///
/// Only trialing and active subscriptions resolve their plan.
pub fn resolve_limits(catalog: &PlanCatalog, state: &SubscriptionState) -> PlanLimits {
    if state.has_access() {
        catalog.resolve(state.plan_id())
    } else {
        PlanLimits::no_access()
    }
}

/// Origin and destination count toward the stop limit
pub fn check_stop_limit(limits: &PlanLimits, via_count: usize) -> Result<(), PolicyRejection> {
    let total = u32::try_from(via_count).unwrap_or(u32::MAX).saturating_add(2);
    match limits.max_stops {
        Limit::Bounded(max) if total > max => Err(PolicyRejection {
            limit: LimitKind::Stops,
            amount: total,
            max,
            plan: limits.name.clone(),
        }),
        _ => Ok(()),
    }
}

/// `used` is the count before this request
pub fn check_usage_limit(limits: &PlanLimits, used: u32) -> Result<(), PolicyRejection> {
    match limits.max_optimizations {
        Limit::Bounded(max) if used >= max => Err(PolicyRejection {
            limit: LimitKind::Optimizations,
            amount: used,
            max,
            plan: limits.name.clone(),
        }),
        _ => Ok(()),
    }
}
