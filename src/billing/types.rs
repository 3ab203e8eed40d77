//! Billing data types

use serde::{Deserialize, Serialize};

use super::plans::{PlanId, Quality, TokenType};

/// Claims carried by a signed access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenPayload {
    pub plan_id: PlanId,
    pub token_type: TokenType,
    pub uses_left: u32,
    pub total_uses: u32,
    /// Epoch seconds
    pub expires_at: i64,
    pub quality: Quality,
    /// Lineage id, shared by every token re-issued from the same purchase
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
}

impl AccessTokenPayload {
    /// Usable tokens have uses left, a consistent count and an expiry in the future
    pub fn is_usable_at(&self, now: i64) -> bool {
        self.uses_left > 0 && self.uses_left <= self.total_uses && self.expires_at > now
    }

    pub fn seconds_remaining(&self, now: i64) -> i64 {
        (self.expires_at - now).max(0)
    }
}

/// Which allowance a ledger consumption drew from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CreditKind {
    Free,
    Paid,
}

impl CreditKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Free => "free",
            Self::Paid => "paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "free" => Some(Self::Free),
            "paid" => Some(Self::Paid),
            _ => None,
        }
    }
}

/// Durable ledger row
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageEntitlement {
    pub token_id: String,
    pub free_granted: u32,
    pub free_used: u32,
    pub paid_granted: u32,
    pub paid_used: u32,
    /// Epoch seconds
    pub updated_at: i64,
}

impl UsageEntitlement {
    pub fn free_remaining(&self) -> u32 {
        self.free_granted.saturating_sub(self.free_used)
    }

    pub fn paid_remaining(&self) -> u32 {
        self.paid_granted.saturating_sub(self.paid_used)
    }

    pub fn total_remaining(&self) -> u32 {
        self.free_remaining() + self.paid_remaining()
    }
}

/// Outcome of a successful ledger consumption
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageResult {
    pub consumed: CreditKind,
    pub entitlement: UsageEntitlement,
}

/// Snapshot of a premium token for status responses
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessTokenSummary {
    #[serde(rename = "type")]
    pub token_type: TokenType,
    pub plan_id: PlanId,
    pub expires_at: i64,
    pub time_remaining: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_left: Option<u32>,
}

impl AccessTokenSummary {
    pub fn from_payload(payload: &AccessTokenPayload, now: i64) -> Self {
        Self {
            token_type: payload.token_type,
            plan_id: payload.plan_id,
            expires_at: payload.expires_at,
            time_remaining: payload.seconds_remaining(now),
            usage_left: Some(payload.uses_left),
        }
    }
}

/// Anonymous per-IP usage snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IpUsageSnapshot {
    pub usage_count: u32,
    pub limit: u32,
    pub remaining: u32,
}

impl IpUsageSnapshot {
    pub fn new(usage_count: u32, limit: u32) -> Self {
        Self {
            usage_count,
            limit,
            remaining: limit.saturating_sub(usage_count),
        }
    }
}

/// Response of `GET /api/usage-status`
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
#[serde(untagged)]
pub enum UsageStatus {
    /// Limits are globally disabled
    Unlimited {
        #[serde(rename = "usageCount")]
        usage_count: u32,
        limit: Option<u32>,
        remaining: Option<u32>,
        status: &'static str,
    },
    /// Premium token present
    Premium {
        #[serde(rename = "usageCount")]
        usage_count: u32,
        limit: u32,
        remaining: u32,
        status: &'static str,
        #[serde(rename = "accessToken")]
        access_token: AccessTokenSummary,
    },
    /// Anonymous, IP-governed caller
    Legacy {
        #[serde(rename = "usageCount")]
        usage_count: u32,
        limit: u32,
        remaining: u32,
        status: &'static str,
    },
}

impl UsageStatus {
    pub fn unlimited() -> Self {
        Self::Unlimited {
            usage_count: 0,
            limit: None,
            remaining: None,
            status: "unlimited",
        }
    }

    pub fn premium(payload: &AccessTokenPayload, now: i64) -> Self {
        Self::Premium {
            usage_count: payload.total_uses - payload.uses_left.min(payload.total_uses),
            limit: payload.total_uses,
            remaining: payload.uses_left,
            status: "premium",
            access_token: AccessTokenSummary::from_payload(payload, now),
        }
    }

    pub fn legacy(snapshot: IpUsageSnapshot) -> Self {
        Self::Legacy {
            usage_count: snapshot.usage_count,
            limit: snapshot.limit,
            remaining: snapshot.remaining,
            status: if snapshot.remaining == 0 {
                "limit_reached"
            } else {
                "active"
            },
        }
    }
}

/// Response of `GET /api/check-token`
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenCheck {
    pub valid: bool,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub token_type: Option<TokenType>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_left: Option<u32>,
}
