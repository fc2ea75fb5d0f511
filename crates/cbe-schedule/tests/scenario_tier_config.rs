//! Tiers are configuration
//!
//! GREEN when:
//! - a YAML `/schedule` section replaces the default tiers
//! - structurally invalid tiers are rejected before any schedule is built

use cbe_schedule::{MilestoneScheduler, ScheduleConfig, ScheduleRequest};
use chrono::NaiveDate;
use uuid::Uuid;

const TIERS_YAML: &str = r#"
schedule:
  net_term_days: 45
  days_before_event: 3
  tiers:
    - name: RUSH
      max_days: 14
      splits:
        - { kind: balance, percentage: 100, due: immediate }
    - name: STANDARD
      splits:
        - { kind: deposit, percentage: 25, due: immediate }
        - { kind: balance, percentage: 75, due: before_event }
"#;

fn cfg_json(yaml: &str) -> serde_json::Value {
    let v: serde_yaml::Value = serde_yaml::from_str(yaml).unwrap();
    serde_json::to_value(v).unwrap()
}

#[test]
fn yaml_tiers_replace_defaults() {
    let cfg = ScheduleConfig::from_config_json(&cfg_json(TIERS_YAML)).unwrap();
    assert_eq!(cfg.net_term_days, 45);
    let sched = MilestoneScheduler::new(cfg).unwrap();
    let s = sched
        .generate(&ScheduleRequest {
            document_id: Uuid::from_u128(1),
            total_payable_cents: 10_001,
            days_until_due: 20,
            is_exempt: false,
            generated_on: NaiveDate::from_ymd_opt(2026, 1, 1).unwrap(),
        })
        .unwrap();
    assert_eq!(s.tier, "STANDARD");
    let amounts: Vec<i64> = s.milestones.iter().map(|m| m.amount_cents).collect();
    assert_eq!(amounts, vec![2_500, 7_501]);
    assert_eq!(
        s.milestones[1].due_date,
        Some(NaiveDate::from_ymd_opt(2026, 1, 18).unwrap())
    );
}

#[test]
fn missing_section_uses_defaults() {
    let cfg = ScheduleConfig::from_config_json(&serde_json::json!({})).unwrap();
    assert_eq!(cfg, ScheduleConfig::default());
}

#[test]
fn percentages_must_sum_to_one_hundred() {
    let bad = TIERS_YAML.replace("percentage: 75", "percentage: 70");
    let err = ScheduleConfig::from_config_json(&cfg_json(&bad)).unwrap_err();
    assert!(format!("{err:#}").contains("sum to 95"), "{err:#}");
}

#[test]
fn last_tier_must_be_open_ended() {
    let bad = TIERS_YAML.replace("    - name: STANDARD\n", "    - name: STANDARD\n      max_days: 90\n");
    assert!(ScheduleConfig::from_config_json(&cfg_json(&bad)).is_err());
}

#[test]
fn unknown_split_field_is_rejected() {
    let bad = TIERS_YAML.replace("due: immediate }", "due: immediate, pct: 1 }");
    assert!(ScheduleConfig::from_config_json(&cfg_json(&bad)).is_err());
}
