//! Tier configuration.
//!
//! Lead-time thresholds and percentages are business configuration, not
//! law: deployments override `/schedule/tiers` in their YAML layers.

use anyhow::Result;
use cbe_schemas::MilestoneKind;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::ScheduleError;

pub const DEFAULT_NET_TERM_DAYS: i64 = 30;
pub const DEFAULT_DAYS_BEFORE_EVENT: i64 = 7;

/// When a split falls due, relative to generation date and event date.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DueRule {
    /// `due_date = None`.
    Immediate,
    /// Halfway between generation and the event.
    Midpoint,
    /// `days_before_event` ahead of the event, never before generation.
    BeforeEvent,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MilestoneSplit {
    pub kind: MilestoneKind,
    pub percentage: u8,
    pub due: DueRule,
}

impl MilestoneSplit {
    pub fn new(kind: MilestoneKind, percentage: u8, due: DueRule) -> Self {
        Self {
            kind,
            percentage,
            due,
        }
    }
}

/// A named lead-time tier. `max_days = None` is the open-ended last tier.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleTier {
    pub name: String,
    #[serde(default)]
    pub max_days: Option<i64>,
    pub splits: Vec<MilestoneSplit>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScheduleConfig {
    #[serde(default = "default_net_term_days")]
    pub net_term_days: i64,
    #[serde(default = "default_days_before_event")]
    pub days_before_event: i64,
    #[serde(default = "default_tiers")]
    pub tiers: Vec<ScheduleTier>,
}

fn default_net_term_days() -> i64 {
    DEFAULT_NET_TERM_DAYS
}

fn default_days_before_event() -> i64 {
    DEFAULT_DAYS_BEFORE_EVENT
}

/// RUSH (<= 7 days): 100 now.
/// SHORT (8-30 days): 60 now / 40 before the event.
/// STANDARD (> 30 days): 10 now / 40 at the midpoint / 50 before the event.
pub fn default_tiers() -> Vec<ScheduleTier> {
    use DueRule::*;
    use MilestoneKind::*;
    vec![
        ScheduleTier {
            name: "RUSH".to_string(),
            max_days: Some(7),
            splits: vec![MilestoneSplit::new(Balance, 100, Immediate)],
        },
        ScheduleTier {
            name: "SHORT".to_string(),
            max_days: Some(30),
            splits: vec![
                MilestoneSplit::new(Deposit, 60, Immediate),
                MilestoneSplit::new(Balance, 40, BeforeEvent),
            ],
        },
        ScheduleTier {
            name: "STANDARD".to_string(),
            max_days: None,
            splits: vec![
                MilestoneSplit::new(Deposit, 10, Immediate),
                MilestoneSplit::new(Progress, 40, Midpoint),
                MilestoneSplit::new(Balance, 50, BeforeEvent),
            ],
        },
    ]
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            net_term_days: DEFAULT_NET_TERM_DAYS,
            days_before_event: DEFAULT_DAYS_BEFORE_EVENT,
            tiers: default_tiers(),
        }
    }
}

impl ScheduleConfig {
    /// Read `/schedule` from canonical config JSON (produced by cbe-config).
    pub fn from_config_json(cfg: &Value) -> Result<Self> {
        let parsed: ScheduleConfig = cbe_config::section(cfg, "/schedule")?;
        parsed.validate()?;
        Ok(parsed)
    }

    /// Structural checks:
    /// - non-negative day counts
    /// - at least one tier; `max_days` strictly increasing; only the last
    ///   tier may be open-ended and it must be
    /// - every tier has splits, each percentage in 1..=100, summing to 100
    pub fn validate(&self) -> Result<(), ScheduleError> {
        let invalid = |tier: &str, reason: String| ScheduleError::InvalidTier {
            tier: tier.to_string(),
            reason,
        };

        if self.net_term_days < 0 {
            return Err(invalid("NET_TERM", format!("net_term_days {} < 0", self.net_term_days)));
        }
        if self.days_before_event < 0 {
            return Err(invalid(
                "*",
                format!("days_before_event {} < 0", self.days_before_event),
            ));
        }
        if self.tiers.is_empty() {
            return Err(invalid("*", "no tiers configured".to_string()));
        }

        let mut prev_max: Option<i64> = None;
        for (i, tier) in self.tiers.iter().enumerate() {
            let is_last = i + 1 == self.tiers.len();
            match (tier.max_days, is_last) {
                (None, false) => {
                    return Err(invalid(&tier.name, "only the last tier may be open-ended".into()))
                }
                (Some(_), true) => {
                    return Err(invalid(&tier.name, "last tier must be open-ended".into()))
                }
                (Some(max), false) => {
                    if max < 0 || prev_max.is_some_and(|p| max <= p) {
                        return Err(invalid(
                            &tier.name,
                            format!("max_days {max} must be >= 0 and increase across tiers"),
                        ));
                    }
                    prev_max = Some(max);
                }
                (None, true) => {}
            }

            if tier.splits.is_empty() {
                return Err(invalid(&tier.name, "tier has no splits".into()));
            }
            let mut sum: u32 = 0;
            for s in &tier.splits {
                if s.percentage == 0 || s.percentage > 100 {
                    return Err(invalid(
                        &tier.name,
                        format!("percentage {} outside 1..=100", s.percentage),
                    ));
                }
                sum += u32::from(s.percentage);
            }
            if sum != 100 {
                return Err(invalid(&tier.name, format!("percentages sum to {sum}, not 100")));
            }
        }
        Ok(())
    }

    /// First tier whose `max_days` covers `days_until_due`.
    pub fn tier_for(&self, days_until_due: i64) -> Option<&ScheduleTier> {
        self.tiers
            .iter()
            .find(|t| t.max_days.map_or(true, |max| days_until_due <= max))
    }
}
