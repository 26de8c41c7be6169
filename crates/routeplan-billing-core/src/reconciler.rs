//! Subscription state reconciler
//!
//! Every change the billing provider reports goes through [`transition`],
//! a pure function from the current profile to the next one.

use routeplan_types::{PendingPayment, PlanCycle, PlanId, SubscriptionState, UserSubscriptionProfile};

use crate::stripe::StripeSubscription;

/// Stripe subscription status
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionStatus {
    Active,
    Trialing,
    PastDue,
    Unpaid,
    Incomplete,
    IncompleteExpired,
    Canceled,
    Paused,
    Unknown(String),
}

impl From<&str> for SubscriptionStatus {
    fn from(s: &str) -> Self {
        match s {
            "active" => Self::Active,
            "trialing" => Self::Trialing,
            "past_due" => Self::PastDue,
            "unpaid" => Self::Unpaid,
            "incomplete" => Self::Incomplete,
            "incomplete_expired" => Self::IncompleteExpired,
            "canceled" => Self::Canceled,
            "paused" => Self::Paused,
            other => Self::Unknown(other.to_string()),
        }
    }
}

/// The parts of a provider subscription the reconciler reads
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubscriptionSnapshot {
    pub subscription_id: String,
    pub customer_id: Option<String>,
    pub plan_id: Option<PlanId>,
    pub status: SubscriptionStatus,
    pub period_start: Option<i64>,
    pub trial_end: Option<i64>,
    pub cancel_at_period_end: bool,
}

impl From<&StripeSubscription> for SubscriptionSnapshot {
    fn from(sub: &StripeSubscription) -> Self {
        Self {
            subscription_id: sub.id.clone(),
            customer_id: Some(sub.customer.clone()),
            plan_id: sub.plan_id(),
            status: SubscriptionStatus::from(sub.status.as_str()),
            period_start: sub.period_start(),
            trial_end: sub.trial_end,
            cancel_at_period_end: sub.cancel_at_period_end,
        }
    }
}

/// A billing change to apply to a profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BillingEvent {
    /// Subscription created or updated, or a checkout completed
    SubscriptionChanged(SubscriptionSnapshot),
    /// Subscription ended
    SubscriptionDeleted(SubscriptionSnapshot),
    /// An invoice was paid; confirms the subscription's current status
    /// and starts a new cycle when it still grants access
    InvoicePaid(SubscriptionSnapshot),
    /// An invoice payment failed or needs customer action
    PaymentFailed {
        invoice_id: String,
        payment_intent_id: Option<String>,
        action_required: bool,
    },
}

/// Apply one billing event to a profile. `now` is Unix seconds.
pub fn transition(
    profile: &UserSubscriptionProfile,
    event: &BillingEvent,
    now: i64,
) -> UserSubscriptionProfile {
    let mut next = profile.clone();

    match event {
        BillingEvent::SubscriptionChanged(snapshot) => {
            link_customer(&mut next, snapshot);
            next.cancel_at_period_end = Some(snapshot.cancel_at_period_end);

            match &snapshot.status {
                SubscriptionStatus::Active | SubscriptionStatus::Trialing => {
                    let Some(plan_id) = snapshot.plan_id.clone() else {
                        return next;
                    };
                    let trialing = snapshot.status == SubscriptionStatus::Trialing;
                    let cycle = carry_cycle(profile.state.cycle(), snapshot, plan_id, now);
                    next.state = if trialing {
                        SubscriptionState::Trialing(cycle)
                    } else {
                        SubscriptionState::Active(cycle)
                    };
                    if trialing || snapshot.trial_end.is_some_and(|end| end > now) {
                        next.mark_trial_used();
                    }
                }
                SubscriptionStatus::PastDue
                | SubscriptionStatus::Unpaid
                | SubscriptionStatus::Incomplete => {
                    let cycle = profile.state.cycle().cloned().or_else(|| {
                        snapshot.plan_id.clone().map(|plan_id| {
                            PlanCycle::new(
                                plan_id,
                                Some(snapshot.subscription_id.clone()),
                                snapshot.period_start,
                            )
                        })
                    });
                    if let Some(cycle) = cycle {
                        next.state = SubscriptionState::PastDue(cycle);
                    }
                }
                SubscriptionStatus::Canceled | SubscriptionStatus::IncompleteExpired => {
                    next.state = SubscriptionState::Canceled;
                }
                SubscriptionStatus::Paused | SubscriptionStatus::Unknown(_) => {}
            }
        }
        BillingEvent::SubscriptionDeleted(snapshot) => {
            link_customer(&mut next, snapshot);
            next.state = SubscriptionState::Canceled;
            next.cancel_at_period_end = Some(snapshot.cancel_at_period_end);
            next.pending_payment = None;
        }
        BillingEvent::InvoicePaid(snapshot) => {
            let Some(plan_id) = snapshot.plan_id.clone() else {
                return next;
            };
            link_customer(&mut next, snapshot);
            let cycle = PlanCycle::new(
                plan_id,
                Some(snapshot.subscription_id.clone()),
                Some(snapshot.period_start.unwrap_or(now)),
            );
            // The payment confirms whatever the subscription is now; a late
            // invoice never revives a subscription that has since ended.
            match snapshot.status {
                SubscriptionStatus::Active => {
                    next.state = SubscriptionState::Active(cycle);
                    next.pending_payment = None;
                }
                SubscriptionStatus::Trialing => {
                    next.state = SubscriptionState::Trialing(cycle);
                    next.mark_trial_used();
                    next.pending_payment = None;
                }
                SubscriptionStatus::Canceled | SubscriptionStatus::IncompleteExpired => {
                    next.state = SubscriptionState::Canceled;
                    next.pending_payment = None;
                }
                _ => {}
            }
        }
        BillingEvent::PaymentFailed {
            invoice_id,
            payment_intent_id,
            action_required,
        } => {
            if let Some(cycle) = profile.state.cycle() {
                next.state = SubscriptionState::PastDue(cycle.clone());
            }
            if *action_required {
                next.pending_payment = Some(PendingPayment {
                    invoice_id: Some(invoice_id.clone()),
                    payment_intent_id: payment_intent_id.clone(),
                    client_secret: None,
                });
            }
        }
    }

    next
}

/// Keep usage when plan and cycle start are unchanged; otherwise start over
fn carry_cycle(
    previous: Option<&PlanCycle>,
    snapshot: &SubscriptionSnapshot,
    plan_id: PlanId,
    now: i64,
) -> PlanCycle {
    let cycle_start = snapshot.period_start.unwrap_or(now);
    let mut cycle = PlanCycle::new(
        plan_id,
        Some(snapshot.subscription_id.clone()),
        Some(cycle_start),
    );
    if let Some(prev) = previous {
        if prev.plan_id == cycle.plan_id && prev.cycle_start == Some(cycle_start) {
            cycle.optimizations_used = prev.optimizations_used;
        }
    }
    cycle
}

fn link_customer(profile: &mut UserSubscriptionProfile, snapshot: &SubscriptionSnapshot) {
    if profile.stripe_customer_id.is_none() {
        profile.stripe_customer_id = snapshot.customer_id.clone();
    }
}
