//! Domain enums shared across the store, normalizer, gates, and scoring
//! layers. Kept separate from `src/db` so pure-logic modules (`gates.rs`,
//! `scoring.rs`) don't need to depend on `rusqlite`.

use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClientTier {
    A,
    B,
    C,
}

impl fmt::Display for ClientTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClientTier::A => write!(f, "A"),
            ClientTier::B => write!(f, "B"),
            ClientTier::C => write!(f, "C"),
        }
    }
}

impl ClientTier {
    pub fn from_db(s: &str) -> Self {
        match s {
            "A" => ClientTier::A,
            "B" => ClientTier::B,
            _ => ClientTier::C,
        }
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            ClientTier::A => "A",
            ClientTier::B => "B",
            ClientTier::C => "C",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientLifecycle {
    Active,
    Dormant,
    Churned,
}

impl ClientLifecycle {
    pub fn from_db(s: &str) -> Self {
        match s {
            "dormant" => ClientLifecycle::Dormant,
            "churned" => ClientLifecycle::Churned,
            _ => ClientLifecycle::Active,
        }
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            ClientLifecycle::Active => "active",
            ClientLifecycle::Dormant => "dormant",
            ClientLifecycle::Churned => "churned",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectLinkStatus {
    Linked,
    Partial,
    Unlinked,
}

impl ProjectLinkStatus {
    pub fn from_db(s: &str) -> Self {
        match s {
            "linked" => ProjectLinkStatus::Linked,
            "partial" => ProjectLinkStatus::Partial,
            _ => ProjectLinkStatus::Unlinked,
        }
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            ProjectLinkStatus::Linked => "linked",
            ProjectLinkStatus::Partial => "partial",
            ProjectLinkStatus::Unlinked => "unlinked",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClientLinkStatus {
    Linked,
    Unlinked,
    #[serde(rename = "n/a")]
    NotApplicable,
}

impl ClientLinkStatus {
    pub fn from_db(s: &str) -> Self {
        match s {
            "linked" => ClientLinkStatus::Linked,
            "unlinked" => ClientLinkStatus::Unlinked,
            _ => ClientLinkStatus::NotApplicable,
        }
    }

    pub fn as_db_str(&self) -> &'static str {
        match self {
            ClientLinkStatus::Linked => "linked",
            ClientLinkStatus::Unlinked => "unlinked",
            ClientLinkStatus::NotApplicable => "n/a",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProjectHealthColor {
    Green,
    Yellow,
    Red,
}

impl ProjectHealthColor {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            ProjectHealthColor::Green => "green",
            ProjectHealthColor::Yellow => "yellow",
            ProjectHealthColor::Red => "red",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "yellow" => ProjectHealthColor::Yellow,
            "red" => ProjectHealthColor::Red,
            _ => ProjectHealthColor::Green,
        }
    }
}

/// Invoice aging buckets, recomputed by the normalizer for every unpaid
/// invoice from `today - due_date`. Never written by a collector; paid
/// invoices keep no bucket (left null).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AgingBucket {
    Current,
    Days1To30,
    Days31To60,
    Days61To90,
    Days90Plus,
}

impl AgingBucket {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            AgingBucket::Current => "current",
            AgingBucket::Days1To30 => "1-30",
            AgingBucket::Days31To60 => "31-60",
            AgingBucket::Days61To90 => "61-90",
            AgingBucket::Days90Plus => "90+",
        }
    }

    pub fn from_db(s: &str) -> Self {
        match s {
            "1-30" => AgingBucket::Days1To30,
            "31-60" => AgingBucket::Days31To60,
            "61-90" => AgingBucket::Days61To90,
            "90+" => AgingBucket::Days90Plus,
            _ => AgingBucket::Current,
        }
    }

    /// Classify days-past-due into a bucket. `days_past_due <= 0` is current.
    pub fn from_days_past_due(days_past_due: i64) -> Self {
        match days_past_due {
            d if d <= 0 => AgingBucket::Current,
            1..=30 => AgingBucket::Days1To30,
            31..=60 => AgingBucket::Days31To60,
            61..=90 => AgingBucket::Days61To90,
            _ => AgingBucket::Days90Plus,
        }
    }

    /// Ordering used when rolling up a client's worst outstanding bucket.
    pub fn severity(&self) -> u8 {
        match self {
            AgingBucket::Current => 0,
            AgingBucket::Days1To30 => 1,
            AgingBucket::Days31To60 => 2,
            AgingBucket::Days61To90 => 3,
            AgingBucket::Days90Plus => 4,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DomainConfidence {
    Blocked,
    Degraded,
    Reliable,
}

impl DomainConfidence {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            DomainConfidence::Blocked => "blocked",
            DomainConfidence::Degraded => "degraded",
            DomainConfidence::Reliable => "reliable",
        }
    }
}

/// Planning horizon buckets used for scoring eligibility gates (§4.6).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Horizon {
    Now,
    Today,
    ThisWeek,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MoveType {
    CollectionCall,
    EscalateBlocker,
    FollowUpEmail,
    ReassignOverload,
    ScheduleMeeting,
    ResolveLink,
}

impl MoveType {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            MoveType::CollectionCall => "collection_call",
            MoveType::EscalateBlocker => "escalate_blocker",
            MoveType::FollowUpEmail => "follow_up_email",
            MoveType::ReassignOverload => "reassign_overload",
            MoveType::ScheduleMeeting => "schedule_meeting",
            MoveType::ResolveLink => "resolve_link",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Low,
    Medium,
    High,
}

impl RiskLevel {
    pub fn as_db_str(&self) -> &'static str {
        match self {
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn aging_bucket_boundaries() {
        assert_eq!(AgingBucket::from_days_past_due(0), AgingBucket::Current);
        assert_eq!(AgingBucket::from_days_past_due(30), AgingBucket::Days1To30);
        assert_eq!(AgingBucket::from_days_past_due(31), AgingBucket::Days31To60);
        assert_eq!(AgingBucket::from_days_past_due(90), AgingBucket::Days61To90);
        assert_eq!(AgingBucket::from_days_past_due(91), AgingBucket::Days90Plus);
    }

    #[test]
    fn tier_round_trips_through_db_repr() {
        for t in [ClientTier::A, ClientTier::B, ClientTier::C] {
            assert_eq!(ClientTier::from_db(t.as_db_str()), t);
        }
    }
}
