//! Billing module for paid access and usage governance
//!
//! This module handles:
//! - Plan catalog and signed access tokens carried in a cookie
//! - Per-IP free allowance for anonymous callers
//! - Durable per-token usage ledger (free before paid)
//! - The governance chain wrapped around the staging endpoint

mod cookie;
mod governor;
mod ip_usage;
mod plans;
mod token;
mod types;
mod usage;

pub use cookie::{read_cookie, set_access_token_cookie, CookieDirective, CookieSettings, ACCESS_TOKEN_COOKIE};
pub use governor::{
    AccessSource, GateDecision, GovernanceConfig, GovernanceOutcome, Governor, IssueError,
    RequestContext, UPGRADE_REDIRECT,
};
pub use ip_usage::{InMemoryIpUsage, IpUsageCounter};
pub use plans::{
    get_expiration_timestamp, get_plan_config, plan_config, resolve_plan_id, PlanConfig, PlanId,
    Quality, TokenType,
};
pub use token::{IssuedToken, TokenCodec, TokenError, MIN_SECRET_LEN};
pub use types::{
    AccessTokenPayload, AccessTokenSummary, CreditKind, IpUsageSnapshot, TokenCheck,
    UsageEntitlement, UsageResult, UsageStatus,
};
pub use usage::{DefaultGrants, UsageStore, UsageStoreError};
