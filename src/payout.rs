//! Display-only estimates of what a vote is worth. Nothing here is used for consensus.

use chrono::NaiveDateTime;
use serde::Deserialize;

use crate::content::ContentRecord;

/// Full voting power in basis points.
pub const FULL_POWER: i64 = 10_000;
/// Seconds for voting power to regenerate from 0 to full.
pub const REGENERATION_SECONDS: i64 = 5 * 24 * 60 * 60;
const VOTE_POWER_DIVISOR: i64 = 50;

#[derive(Debug, Clone, Deserialize)]
pub struct Account {
    pub name: String,
    pub voting_power: i64,
    pub last_vote_time: NaiveDateTime,
    pub vesting_shares: String,
    #[serde(default)]
    pub received_vesting_shares: String,
    #[serde(default)]
    pub delegated_vesting_shares: String,
}

impl Account {
    pub fn effective_vests(&self) -> f64 {
        parse_amount(&self.vesting_shares) + parse_amount(&self.received_vesting_shares)
            - parse_amount(&self.delegated_vesting_shares)
    }

    /// Voting power at `now`, regenerated linearly since the last vote.
    pub fn current_voting_power(&self, now: NaiveDateTime) -> i64 {
        let elapsed = (now - self.last_vote_time).num_seconds().max(0);
        let regenerated = elapsed * FULL_POWER / REGENERATION_SECONDS;
        (self.voting_power + regenerated).clamp(0, FULL_POWER)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GlobalProperties {
    pub total_vesting_shares: String,
    pub total_vesting_fund_steem: String,
}

impl GlobalProperties {
    pub fn vests_to_power(&self, vests: f64) -> f64 {
        let total_vests = parse_amount(&self.total_vesting_shares);
        if total_vests == 0.0 {
            return 0.0;
        }
        parse_amount(&self.total_vesting_fund_steem) * vests / total_vests
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RewardFund {
    pub reward_balance: String,
    pub recent_claims: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct MedianPrice {
    pub base: String,
    pub quote: String,
}

impl MedianPrice {
    /// Dollar-token value of one ledger token.
    pub fn rate(&self) -> f64 {
        let quote = parse_amount(&self.quote);
        if quote == 0.0 {
            return 0.0;
        }
        parse_amount(&self.base) / quote
    }
}

/// Estimated payout a vote of `percent` (0-100) would add, in dollar tokens.
pub fn voting_value(
    percent: u8,
    account: &Account,
    fund: &RewardFund,
    rate: f64,
    now: NaiveDateTime,
) -> f64 {
    let weight = i64::from(percent.min(100)) * 100;
    let power = account.current_voting_power(now);
    let used_power = (power * weight / FULL_POWER + VOTE_POWER_DIVISOR - 1) / VOTE_POWER_DIVISOR;
    let rshares = account.effective_vests() * 1e6 * used_power as f64 / FULL_POWER as f64;

    let recent_claims: f64 = fund.recent_claims.trim().parse().unwrap_or(0.0);
    if recent_claims == 0.0 {
        return 0.0;
    }
    rshares / recent_claims * parse_amount(&fund.reward_balance) * rate
}

/// Platform score added by a vote, shown next to the payout estimate on posts.
pub fn hunt_score_increment(percent: u8, user_score: f64, boost_score: f64) -> f64 {
    f64::from(percent) * user_score * 0.01 * boost_score
}

/// Pending plus already-paid author and curator rewards of a post or comment.
pub fn content_payout(record: &ContentRecord) -> f64 {
    parse_amount(&record.pending_payout_value)
        + parse_amount(&record.total_payout_value)
        + parse_amount(&record.curator_payout_value)
}

/// Numeric part of a ledger asset string such as `"1.234 SBD"`; 0 when unparseable.
pub fn parse_amount(asset: &str) -> f64 {
    asset
        .split_whitespace()
        .next()
        .and_then(|n| n.parse().ok())
        .unwrap_or(0.0)
}

pub fn format_number(value: f64) -> String {
    let fixed = format!("{:.2}", value.abs());
    let (int_part, frac_part) = fixed.split_once('.').unwrap_or((&fixed, "00"));

    let mut grouped = String::with_capacity(int_part.len() + int_part.len() / 3);
    for (i, ch) in int_part.chars().enumerate() {
        if i > 0 && (int_part.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }

    let sign = if value < 0.0 && fixed != "0.00" { "-" } else { "" };
    format!("{sign}{grouped}.{frac_part}")
}

pub fn format_amount(value: f64) -> String {
    let n = format_number(value);
    match n.strip_prefix('-') {
        Some(abs) => format!("-${abs}"),
        None => format!("${n}"),
    }
}
