//! Plan and limit types

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Stripe price id of the Pro plan
pub const PRO_PLAN_ID: &str = "price_1RMkdoAEvm0dTvhJ2ZAeLPkj";

/// Stripe price id of the Unlimited plan
pub const UNLIMITED_PLAN_ID: &str = "price_1RMkePAEvm0dTvhJro8NBlJF";

/// Display name used when no plan resolves
pub const NO_ACCESS_PLAN_NAME: &str = "No Active Plan";

/// Plan identifier (the billing provider's price id)
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanId(String);

impl PlanId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for PlanId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for PlanId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// A numeric ceiling that may be absent.
///
/// Serialized as a number, or `null` when unbounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Option<u32>", into = "Option<u32>")]
pub enum Limit {
    Bounded(u32),
    Unbounded,
}

impl Limit {
    pub fn is_unbounded(&self) -> bool {
        matches!(self, Self::Unbounded)
    }
}

impl From<Option<u32>> for Limit {
    fn from(value: Option<u32>) -> Self {
        value.map_or(Self::Unbounded, Self::Bounded)
    }
}

impl From<Limit> for Option<u32> {
    fn from(limit: Limit) -> Self {
        match limit {
            Limit::Bounded(n) => Some(n),
            Limit::Unbounded => None,
        }
    }
}

impl std::fmt::Display for Limit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Bounded(n) => write!(f, "{n}"),
            Self::Unbounded => f.write_str("unlimited"),
        }
    }
}

/// Limits granted by a plan
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanLimits {
    /// Display name ("Pro", "Unlimited", ...)
    pub name: String,
    /// Ordering used to tell upgrades from downgrades; -1 means no access
    pub level: i32,
    /// Maximum stops per route, origin and destination included
    pub max_stops: Limit,
    /// Maximum optimizations per billing cycle
    #[serde(alias = "maxOptimizationsPerCycle")]
    pub max_optimizations: Limit,
}

impl PlanLimits {
    /// Limits applied when no plan resolves
    pub fn no_access() -> Self {
        Self {
            name: NO_ACCESS_PLAN_NAME.to_string(),
            level: -1,
            max_stops: Limit::Bounded(0),
            max_optimizations: Limit::Bounded(0),
        }
    }
}

/// Static plan configuration keyed by plan id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlanCatalog {
    plans: HashMap<PlanId, PlanLimits>,
}

impl Default for PlanCatalog {
    fn default() -> Self {
        Self::empty()
            .with_plan(
                PRO_PLAN_ID,
                PlanLimits {
                    name: "Pro".to_string(),
                    level: 1,
                    max_stops: Limit::Bounded(100),
                    max_optimizations: Limit::Bounded(50),
                },
            )
            .with_plan(
                UNLIMITED_PLAN_ID,
                PlanLimits {
                    name: "Unlimited".to_string(),
                    level: 2,
                    max_stops: Limit::Unbounded,
                    max_optimizations: Limit::Unbounded,
                },
            )
    }
}

impl PlanCatalog {
    /// A catalog with no plans; every id resolves to no access
    pub fn empty() -> Self {
        Self {
            plans: HashMap::new(),
        }
    }

    /// Parse a catalog from a JSON object keyed by plan id.
    ///
    /// ```json
    /// {"price_abc": {"name": "Pro", "level": 1, "maxStops": 100, "maxOptimizations": 50}}
    /// ```
    pub fn from_json(json: &str) -> Result<Self, ModelError> {
        let catalog: Self =
            serde_json::from_str(json).map_err(|e| ModelError::InvalidCatalog(e.to_string()))?;
        if catalog.plans.is_empty() {
            return Err(ModelError::InvalidCatalog("no plans defined".to_string()));
        }
        Ok(catalog)
    }

    /// Add or replace a plan
    #[must_use]
    pub fn with_plan(mut self, id: impl Into<PlanId>, limits: PlanLimits) -> Self {
        self.plans.insert(id.into(), limits);
        self
    }

    /// Look up a configured plan
    pub fn get(&self, id: &PlanId) -> Option<&PlanLimits> {
        self.plans.get(id)
    }

    pub fn contains(&self, id: &PlanId) -> bool {
        self.plans.contains_key(id)
    }

    /// Resolve a possibly-absent plan id, falling back to no-access limits
    pub fn resolve(&self, id: Option<&PlanId>) -> PlanLimits {
        id.and_then(|id| self.plans.get(id))
            .cloned()
            .unwrap_or_else(PlanLimits::no_access)
    }

    pub fn len(&self) -> usize {
        self.plans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plans.is_empty()
    }
}
