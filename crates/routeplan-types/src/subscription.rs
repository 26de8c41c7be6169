//! Subscription profile types
//!
//! The profile lives in the identity provider as flat public metadata. In
//! memory it is an explicit [`SubscriptionState`] plus side fields, and
//! [`ProfileMetadata`] is the wire format between the two.

use serde::{Deserialize, Serialize};

use crate::PlanId;

/// Plan, cycle and usage carried by every state that has a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanCycle {
    /// Plan the user is subscribed to
    pub plan_id: PlanId,
    /// Billing provider subscription id
    pub subscription_id: Option<String>,
    /// Start of the current billing cycle (Unix seconds)
    pub cycle_start: Option<i64>,
    /// Optimizations consumed in the current cycle
    pub optimizations_used: u32,
}

impl PlanCycle {
    /// A fresh cycle with zero usage
    pub fn new(plan_id: PlanId, subscription_id: Option<String>, cycle_start: Option<i64>) -> Self {
        Self {
            plan_id,
            subscription_id,
            cycle_start,
            optimizations_used: 0,
        }
    }
}

/// Subscription lifecycle state
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SubscriptionState {
    /// Never subscribed
    #[default]
    NoPlan,
    /// Free trial in progress
    Trialing(PlanCycle),
    /// Paid and current
    Active(PlanCycle),
    /// Payment failed; plan retained, access revoked
    PastDue(PlanCycle),
    /// Subscription ended
    Canceled,
}

impl SubscriptionState {
    /// Only trialing and active subscriptions grant access
    pub fn has_access(&self) -> bool {
        matches!(self, Self::Trialing(_) | Self::Active(_))
    }

    /// Cycle data, if the state carries a plan
    pub fn cycle(&self) -> Option<&PlanCycle> {
        match self {
            Self::Trialing(c) | Self::Active(c) | Self::PastDue(c) => Some(c),
            Self::NoPlan | Self::Canceled => None,
        }
    }

    pub fn cycle_mut(&mut self) -> Option<&mut PlanCycle> {
        match self {
            Self::Trialing(c) | Self::Active(c) | Self::PastDue(c) => Some(c),
            Self::NoPlan | Self::Canceled => None,
        }
    }

    pub fn plan_id(&self) -> Option<&PlanId> {
        self.cycle().map(|c| &c.plan_id)
    }

    pub fn subscription_id(&self) -> Option<&str> {
        self.cycle().and_then(|c| c.subscription_id.as_deref())
    }

    /// Status label written to metadata
    pub fn label(&self) -> Option<&'static str> {
        match self {
            Self::NoPlan => None,
            Self::Trialing(_) => Some("trialing"),
            Self::Active(_) => Some("active"),
            Self::PastDue(_) => Some("past_due"),
            Self::Canceled => Some("canceled"),
        }
    }
}

/// Client-side payment continuation recorded after an incomplete upgrade
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PendingPayment {
    pub invoice_id: Option<String>,
    pub payment_intent_id: Option<String>,
    pub client_secret: Option<String>,
}

/// Per-user subscription profile
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct UserSubscriptionProfile {
    /// Lifecycle state
    pub state: SubscriptionState,
    /// Set once a trial has been granted; never cleared
    pub has_had_free_trial: bool,
    /// Mirrors the provider's cancel-at-period-end flag
    pub cancel_at_period_end: Option<bool>,
    /// Billing provider customer id
    pub stripe_customer_id: Option<String>,
    /// Outstanding payment continuation, if any
    pub pending_payment: Option<PendingPayment>,
    /// Optimistic concurrency token, bumped on every write
    pub version: u64,
}

impl UserSubscriptionProfile {
    /// Record that a trial was granted. There is no inverse.
    pub fn mark_trial_used(&mut self) {
        self.has_had_free_trial = true;
    }

    pub fn optimizations_used(&self) -> u32 {
        self.state.cycle().map_or(0, |c| c.optimizations_used)
    }
}

/// Flat identity-provider metadata for a profile.
///
/// `None` fields serialize as `null` so that a merge-style update clears
/// them on the provider side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileMetadata {
    #[serde(default)]
    pub has_active_subscription: bool,
    #[serde(default)]
    pub stripe_plan_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_id: Option<String>,
    #[serde(default)]
    pub stripe_subscription_status: Option<String>,
    #[serde(default)]
    pub sub_cycle_start_date: Option<i64>,
    #[serde(default)]
    pub optimizations_used_this_cycle: Option<u32>,
    #[serde(default)]
    pub has_had_free_trial: bool,
    #[serde(default)]
    pub stripe_cancel_at_period_end: Option<bool>,
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    #[serde(default)]
    pub pending_invoice_id: Option<String>,
    #[serde(default)]
    pub pending_payment_intent_id: Option<String>,
    #[serde(default)]
    pub pending_payment_client_secret: Option<String>,
    #[serde(default)]
    pub profile_version: u64,
}

impl From<&UserSubscriptionProfile> for ProfileMetadata {
    fn from(profile: &UserSubscriptionProfile) -> Self {
        let cycle = profile.state.cycle();
        let pending = profile.pending_payment.clone().unwrap_or_default();
        Self {
            has_active_subscription: profile.state.has_access(),
            stripe_plan_id: cycle.map(|c| c.plan_id.to_string()),
            stripe_subscription_id: cycle.and_then(|c| c.subscription_id.clone()),
            stripe_subscription_status: profile.state.label().map(str::to_string),
            sub_cycle_start_date: cycle.and_then(|c| c.cycle_start),
            optimizations_used_this_cycle: cycle.map(|c| c.optimizations_used),
            has_had_free_trial: profile.has_had_free_trial,
            stripe_cancel_at_period_end: profile.cancel_at_period_end,
            stripe_customer_id: profile.stripe_customer_id.clone(),
            pending_invoice_id: pending.invoice_id,
            pending_payment_intent_id: pending.payment_intent_id,
            pending_payment_client_secret: pending.client_secret,
            profile_version: profile.version,
        }
    }
}

impl From<ProfileMetadata> for UserSubscriptionProfile {
    fn from(meta: ProfileMetadata) -> Self {
        let cycle = meta.stripe_plan_id.map(|plan_id| PlanCycle {
            plan_id: PlanId::from(plan_id),
            subscription_id: meta.stripe_subscription_id,
            cycle_start: meta.sub_cycle_start_date,
            optimizations_used: meta.optimizations_used_this_cycle.unwrap_or(0),
        });

        // Records written before the status field existed only carry the
        // active flag; those map to Active.
        let state = match (
            meta.has_active_subscription,
            meta.stripe_subscription_status.as_deref(),
            cycle,
        ) {
            (true, Some("trialing"), Some(c)) => SubscriptionState::Trialing(c),
            (true, _, Some(c)) => SubscriptionState::Active(c),
            (false, Some("past_due" | "unpaid" | "incomplete"), Some(c)) => {
                SubscriptionState::PastDue(c)
            }
            (false, Some("canceled"), _) => SubscriptionState::Canceled,
            _ => SubscriptionState::NoPlan,
        };

        let pending_payment = if meta.pending_invoice_id.is_some()
            || meta.pending_payment_intent_id.is_some()
            || meta.pending_payment_client_secret.is_some()
        {
            Some(PendingPayment {
                invoice_id: meta.pending_invoice_id,
                payment_intent_id: meta.pending_payment_intent_id,
                client_secret: meta.pending_payment_client_secret,
            })
        } else {
            None
        };

        Self {
            state,
            has_had_free_trial: meta.has_had_free_trial,
            cancel_at_period_end: meta.stripe_cancel_at_period_end,
            stripe_customer_id: meta.stripe_customer_id,
            pending_payment,
            version: meta.profile_version,
        }
    }
}
