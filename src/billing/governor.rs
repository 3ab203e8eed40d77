//! Request governance for the staging endpoint
//!
//! Three stages, each usable on its own:
//!
//! 1. `check_token` reads the cookie and attaches a usable payload, if any.
//! 2. `access_gate` reserves one ledger use for token holders and applies
//!    the per-IP free allowance to everyone else. A token whose ledger row is
//!    spent is treated as absent. Anonymous attempts are counted before the
//!    generation call runs, so failed generations still count.
//! 3. `finalize` keeps the reservation and re-issues the token only when the
//!    handler reports success; otherwise the reservation is returned.
//!
//! Every stage returns plain values; nothing here touches the transport.

use axum::http::StatusCode;
use serde_json::{json, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use super::cookie::{set_access_token_cookie, CookieDirective};
use super::ip_usage::IpUsageCounter;
use super::plans::{plan_config, resolve_plan_id};
use super::token::{IssuedToken, TokenCodec, TokenError};
use super::types::{
    AccessTokenPayload, AccessTokenSummary, CreditKind, IpUsageSnapshot, TokenCheck, UsageStatus,
};
use super::usage::{UsageStore, UsageStoreError};

/// Where anonymous callers are sent once the free allowance is gone
pub const UPGRADE_REDIRECT: &str = "/upgrade";

#[derive(Debug, Clone, Copy)]
pub struct GovernanceConfig {
    pub free_limit: u32,
    pub limits_disabled: bool,
}

impl Default for GovernanceConfig {
    fn default() -> Self {
        Self {
            free_limit: 2,
            limits_disabled: false,
        }
    }
}

#[derive(Debug, Error)]
pub enum IssueError {
    #[error("unknown plan: {0}")]
    UnknownPlan(String),
    #[error(transparent)]
    Token(#[from] TokenError),
    #[error(transparent)]
    Ledger(#[from] UsageStoreError),
}

/// Per-request governance state threaded between the stages
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub client_ip: String,
    pub access: Option<AccessTokenPayload>,
    /// A cookie was sent but is unusable and should be cleared
    pub clear_stale_cookie: bool,
    /// Anonymous count recorded by the gate for this request
    pub ip_count: Option<u32>,
    /// Ledger use held by the gate until `finalize`
    pub reserved: Option<CreditKind>,
}

/// Why a request was let through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessSource {
    Unlimited,
    Token,
    FreeTier { count: u32 },
}

/// Result of a governance stage that produces a response
#[derive(Debug, Clone)]
pub struct GovernanceOutcome {
    /// Governance answered the request itself; the handler did not run
    pub handled: bool,
    pub status: StatusCode,
    pub body: Value,
    pub cookie: Option<CookieDirective>,
}

#[derive(Debug, Clone)]
pub enum GateDecision {
    Allow(AccessSource),
    Deny(GovernanceOutcome),
}

impl GateDecision {
    pub fn allowed(&self) -> Option<AccessSource> {
        match self {
            GateDecision::Allow(source) => Some(*source),
            GateDecision::Deny(_) => None,
        }
    }
}

pub struct Governor {
    codec: TokenCodec,
    ip_usage: Arc<dyn IpUsageCounter>,
    ledger: Arc<UsageStore>,
    config: GovernanceConfig,
}

impl Governor {
    pub fn new(
        codec: TokenCodec,
        ip_usage: Arc<dyn IpUsageCounter>,
        ledger: Arc<UsageStore>,
        config: GovernanceConfig,
    ) -> Self {
        Self {
            codec,
            ip_usage,
            ledger,
            config,
        }
    }

    pub fn config(&self) -> GovernanceConfig {
        self.config
    }

    pub fn ip_usage(&self) -> &dyn IpUsageCounter {
        self.ip_usage.as_ref()
    }

    pub fn ledger(&self) -> &UsageStore {
        &self.ledger
    }

    /// Stage 1: attach a usable payload; anything else proceeds anonymously
    pub fn check_token(&self, cookie: Option<&str>, client_ip: &str, now: i64) -> RequestContext {
        let access = cookie
            .and_then(|token| self.codec.verify_token_at(token, now))
            .filter(|payload| payload.is_usable_at(now));

        if let Some(payload) = &access {
            debug!(ip = client_ip, plan = %payload.plan_id, uses_left = payload.uses_left, "Access token accepted");
        }

        RequestContext {
            client_ip: client_ip.to_string(),
            clear_stale_cookie: cookie.is_some() && access.is_none(),
            access,
            ip_count: None,
            reserved: None,
        }
    }

    /// Stage 2: token holders bypass the IP counter while the ledger has uses
    pub fn access_gate(&self, ctx: &mut RequestContext) -> GateDecision {
        if self.config.limits_disabled {
            return GateDecision::Allow(AccessSource::Unlimited);
        }
        if let Some(jti) = ctx.access.as_ref().and_then(|p| p.jti.clone()) {
            match self.ledger.consume_one_entitlement(&jti) {
                Ok(result) => {
                    debug!(
                        token_id = %jti,
                        kind = result.consumed.as_str(),
                        remaining = result.entitlement.total_remaining(),
                        "Reserved ledger use"
                    );
                    ctx.reserved = Some(result.consumed);
                    return GateDecision::Allow(AccessSource::Token);
                }
                Err(e @ UsageStoreError::Database(_)) => {
                    error!(token_id = %jti, error = %e, "Ledger reservation failed");
                    return GateDecision::Deny(GovernanceOutcome {
                        handled: true,
                        status: StatusCode::INTERNAL_SERVER_ERROR,
                        body: json!({ "success": false, "error": "Internal server error" }),
                        cookie: None,
                    });
                }
                Err(e) => {
                    // Replayed or orphaned cookie: the ledger has the final say
                    info!(token_id = %jti, error = %e, "Ledger refused access token");
                    ctx.access = None;
                    ctx.clear_stale_cookie = true;
                }
            }
        } else if ctx.access.is_some() {
            return GateDecision::Allow(AccessSource::Token);
        }

        let count = self.ip_usage.increment(&ctx.client_ip);
        ctx.ip_count = Some(count);

        if count > self.config.free_limit {
            info!(ip = %ctx.client_ip, count, limit = self.config.free_limit, "Free usage limit reached");
            let snapshot = IpUsageSnapshot::new(count, self.config.free_limit);
            return GateDecision::Deny(GovernanceOutcome {
                handled: true,
                status: StatusCode::PAYMENT_REQUIRED,
                body: json!({
                    "success": false,
                    "error": "Free usage limit reached. Upgrade to keep staging rooms.",
                    "redirect": UPGRADE_REDIRECT,
                    "usage": snapshot,
                }),
                cookie: ctx.clear_stale_cookie.then_some(CookieDirective::Clear),
            });
        }

        debug!(ip = %ctx.client_ip, count, "Free tier request admitted");
        GateDecision::Allow(AccessSource::FreeTier { count })
    }

    /// Stage 3: spend a paid use only for a successful response
    pub fn finalize(
        &self,
        ctx: &RequestContext,
        status: StatusCode,
        mut body: Value,
        now: i64,
    ) -> GovernanceOutcome {
        let stale = ctx.clear_stale_cookie.then_some(CookieDirective::Clear);
        let succeeded = body.get("success") == Some(&Value::Bool(true));

        if !succeeded {
            self.release_reservation(ctx);
            return GovernanceOutcome {
                handled: false,
                status,
                body,
                cookie: stale,
            };
        }

        if self.config.limits_disabled {
            body["usage"] = json!({ "status": "unlimited" });
            return GovernanceOutcome {
                handled: false,
                status,
                body,
                cookie: stale,
            };
        }

        let cookie = match &ctx.access {
            Some(payload) => self.consume_token(payload, &mut body, now),
            None => {
                let count = ctx
                    .ip_count
                    .unwrap_or_else(|| self.ip_usage.get(&ctx.client_ip));
                body["usage"] = json!(IpUsageSnapshot::new(count, self.config.free_limit));
                stale
            }
        };

        GovernanceOutcome {
            handled: false,
            status,
            body,
            cookie,
        }
    }

    fn release_reservation(&self, ctx: &RequestContext) {
        let (Some(kind), Some(jti)) = (
            ctx.reserved,
            ctx.access.as_ref().and_then(|p| p.jti.as_deref()),
        ) else {
            return;
        };
        match self.ledger.release_one_entitlement(jti, kind) {
            Ok(Some(_)) => debug!(token_id = %jti, kind = kind.as_str(), "Released ledger use"),
            Ok(None) => warn!(token_id = %jti, kind = kind.as_str(), "Reserved ledger use was already gone"),
            Err(e) => error!(token_id = %jti, error = %e, "Failed to release ledger use"),
        }
    }

    /// The ledger use was taken by the gate; only the cookie moves here
    fn consume_token(
        &self,
        payload: &AccessTokenPayload,
        body: &mut Value,
        now: i64,
    ) -> Option<CookieDirective> {
        let next = match self.codec.decrement_token_usage(payload, now) {
            Ok(Some(next)) => next,
            Ok(None) => return Some(CookieDirective::Clear),
            Err(e) => {
                error!(error = %e, plan = %payload.plan_id, "Failed to re-issue access token");
                return None;
            }
        };

        body["accessToken"] = json!(AccessTokenSummary::from_payload(&next.payload, now));
        body["usageLeft"] = json!(next.payload.uses_left);
        Some(set_access_token_cookie(&next.token, next.payload.expires_at, now))
    }

    /// Snapshot for `GET /api/usage-status`
    pub fn usage_status(&self, ctx: &RequestContext, now: i64) -> UsageStatus {
        if self.config.limits_disabled {
            return UsageStatus::unlimited();
        }
        match &ctx.access {
            Some(payload) => UsageStatus::premium(payload, now),
            None => UsageStatus::legacy(IpUsageSnapshot::new(
                self.ip_usage.get(&ctx.client_ip),
                self.config.free_limit,
            )),
        }
    }

    /// Diagnostic view of the caller's token
    pub fn token_check(&self, ctx: &RequestContext) -> TokenCheck {
        match &ctx.access {
            Some(payload) => TokenCheck {
                valid: true,
                token_type: Some(payload.token_type),
                expires_at: Some(payload.expires_at),
                usage_left: Some(payload.uses_left),
            },
            None => TokenCheck::default(),
        }
    }

    /// Issue the first token for a completed purchase and fund its ledger row
    pub fn issue_for_plan(&self, raw_plan_id: &str, now: i64) -> Result<IssuedToken, IssueError> {
        let plan_id = resolve_plan_id(raw_plan_id)
            .ok_or_else(|| IssueError::UnknownPlan(raw_plan_id.to_string()))?;
        let issued = self.codec.generate_token(plan_id, now)?;

        if let Some(jti) = &issued.payload.jti {
            self.ledger.get_or_create_usage_entitlement(jti)?;
            self.ledger
                .grant_paid_credits(jti, plan_config(plan_id).uses)?;
        }

        info!(plan = %plan_id, expires_at = issued.payload.expires_at, "Issued plan access token");
        Ok(issued)
    }
}
