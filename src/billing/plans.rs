//! Static plan catalog
//!
//! Maps a plan identifier to its entitlement shape. Unknown identifiers are
//! rejected; callers never fall back to a default plan.

use serde::{Deserialize, Serialize};

/// Seconds in one day. Expiry math is plain arithmetic on epoch seconds.
const SECONDS_PER_DAY: i64 = 86_400;

/// Known plan identifiers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PlanId {
    #[serde(rename = "pack-5")]
    Pack5,
    #[serde(rename = "pack-10")]
    Pack10,
    #[serde(rename = "pack-25")]
    Pack25,
    #[serde(rename = "pro-monthly")]
    ProMonthly,
}

impl PlanId {
    pub const ALL: [PlanId; 4] = [
        PlanId::Pack5,
        PlanId::Pack10,
        PlanId::Pack25,
        PlanId::ProMonthly,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pack5 => "pack-5",
            Self::Pack10 => "pack-10",
            Self::Pack25 => "pack-25",
            Self::ProMonthly => "pro-monthly",
        }
    }
}

impl std::fmt::Display for PlanId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Output quality tier for the generation call
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    Standard,
    Hd,
}

/// Whether a plan is a one-time pack or a recurring subscription
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Pack,
    Subscription,
}

/// Entitlement shape of a plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanConfig {
    pub id: PlanId,
    /// Price in cents
    pub price: u32,
    pub uses: u32,
    pub duration_days: u32,
    pub quality: Quality,
    pub token_type: TokenType,
}

const PLANS: [PlanConfig; 4] = [
    PlanConfig {
        id: PlanId::Pack5,
        price: 999,
        uses: 5,
        duration_days: 30,
        quality: Quality::Standard,
        token_type: TokenType::Pack,
    },
    PlanConfig {
        id: PlanId::Pack10,
        price: 1799,
        uses: 10,
        duration_days: 60,
        quality: Quality::Hd,
        token_type: TokenType::Pack,
    },
    PlanConfig {
        id: PlanId::Pack25,
        price: 3999,
        uses: 25,
        duration_days: 90,
        quality: Quality::Hd,
        token_type: TokenType::Pack,
    },
    PlanConfig {
        id: PlanId::ProMonthly,
        price: 2999,
        uses: 100,
        duration_days: 30,
        quality: Quality::Hd,
        token_type: TokenType::Subscription,
    },
];

/// Validate a raw identifier against the known plans
pub fn resolve_plan_id(raw: &str) -> Option<PlanId> {
    PlanId::ALL
        .into_iter()
        .find(|id| id.as_str() == raw.trim())
}

/// Look up a plan's configuration; `None` means reject the operation
pub fn get_plan_config(raw: &str) -> Option<&'static PlanConfig> {
    let id = resolve_plan_id(raw)?;
    Some(plan_config(id))
}

/// Configuration for an already-resolved plan
pub fn plan_config(id: PlanId) -> &'static PlanConfig {
    match id {
        PlanId::Pack5 => &PLANS[0],
        PlanId::Pack10 => &PLANS[1],
        PlanId::Pack25 => &PLANS[2],
        PlanId::ProMonthly => &PLANS[3],
    }
}

/// `now + duration_days` days, in epoch seconds
pub fn get_expiration_timestamp(duration_days: u32, now: i64) -> i64 {
    now + i64::from(duration_days) * SECONDS_PER_DAY
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_known_plans() {
        assert_eq!(resolve_plan_id("pack-10"), Some(PlanId::Pack10));
        assert_eq!(resolve_plan_id(" pro-monthly "), Some(PlanId::ProMonthly));
    }

    #[test]
    fn test_unknown_plan_rejected() {
        assert_eq!(resolve_plan_id("bogus"), None);
        assert_eq!(resolve_plan_id(""), None);
        assert_eq!(resolve_plan_id("PACK-10"), None);
        assert!(get_plan_config("bogus").is_none());
    }

    #[test]
    fn test_every_plan_resolves_to_its_own_config() {
        for id in PlanId::ALL {
            let config = get_plan_config(id.as_str()).unwrap();
            assert_eq!(config.id, id);
            assert!(config.uses > 0);
        }
    }

    #[test]
    fn test_expiration_is_plain_arithmetic() {
        let now = 1_700_000_000;
        assert_eq!(get_expiration_timestamp(30, now), now + 30 * 86_400);
        assert_eq!(get_expiration_timestamp(0, now), now);
    }

    #[test]
    fn test_plan_serializes_with_wire_id() {
        let json = serde_json::to_value(plan_config(PlanId::Pack10)).unwrap();
        assert_eq!(json["id"], "pack-10");
        assert_eq!(json["tokenType"], "pack");
        assert_eq!(json["durationDays"], 60);
    }
}
