//! Pure billing computations: `cbe schedule`, `cbe allocate`, `cbe reorder`.
//!
//! Nothing here touches a store; inputs come from flags and files and the
//! result is printed.

use anyhow::{Context, Result};
use cbe_schedule::{MilestoneScheduler, ScheduleConfig, ScheduleRequest};
use cbe_schemas::{format_cents, PaymentEvent, PaymentMilestone};
use cbe_sequencer::{KeyAssignment, OrderedKey, Sequencer, SequencerConfig};
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use super::{load_config, read_json_file};

pub fn schedule(
    total_cents: i64,
    days_until_due: i64,
    exempt: bool,
    generated_on: Option<String>,
    config_paths: &[String],
) -> Result<()> {
    let loaded = load_config(config_paths)?;
    let cfg = ScheduleConfig::from_config_json(&loaded.config_json)?;
    let scheduler = MilestoneScheduler::new(cfg)?;

    let generated_on = match generated_on {
        Some(s) => NaiveDate::parse_from_str(&s, "%Y-%m-%d")
            .with_context(|| format!("--generated-on must be YYYY-MM-DD, got {s}"))?,
        None => Utc::now().date_naive(),
    };

    let schedule = scheduler.generate(&ScheduleRequest {
        document_id: Uuid::nil(),
        total_payable_cents: total_cents,
        days_until_due,
        is_exempt: exempt,
        generated_on,
    })?;
    info!(tier = %schedule.tier, milestones = schedule.milestones.len(), "schedule generated");

    println!("config_hash={}", loaded.config_hash);
    println!("tier={}", schedule.tier);
    println!("tax_exempt={}", schedule.tax_exempt);
    println!("event_date={}", schedule.event_date);
    println!("total_payable={}", format_cents(schedule.total_payable_cents));
    for m in &schedule.milestones {
        println!(
            "milestone seq={} kind={} percentage={} amount_cents={} due={}",
            m.sequence_index,
            m.kind.as_str(),
            m.percentage,
            m.amount_cents,
            m.due_date
                .map(|d| d.to_string())
                .unwrap_or_else(|| "immediate".to_string())
        );
    }
    println!("scheduled_cents={}", schedule.scheduled_cents());
    Ok(())
}

#[derive(Deserialize)]
#[serde(deny_unknown_fields)]
struct AllocateInput {
    milestones: Vec<PaymentMilestone>,
    #[serde(default)]
    total_paid_cents: Option<i64>,
    #[serde(default)]
    payments: Vec<PaymentEvent>,
}

pub fn allocate(file: &str) -> Result<()> {
    let input: AllocateInput = read_json_file(file)?;
    let allocation = match input.total_paid_cents {
        Some(paid) => {
            if !input.payments.is_empty() {
                anyhow::bail!("{file}: give either total_paid_cents or payments, not both");
            }
            cbe_waterfall::allocate(&input.milestones, paid)?
        }
        None => cbe_waterfall::allocate_events(&input.milestones, &input.payments)?,
    };

    println!("total_paid_cents={}", allocation.total_paid_cents);
    println!("allocated_cents={}", allocation.allocated_cents);
    println!("outstanding_cents={}", allocation.outstanding_cents);
    println!(
        "unallocated_credit_cents={}",
        allocation.unallocated_credit_cents
    );
    for m in &allocation.milestones {
        println!(
            "milestone seq={} applied_cents={} remaining_cents={} status={}",
            m.milestone.sequence_index,
            m.applied_cents,
            m.remaining_cents,
            m.status.as_str()
        );
    }
    let json = serde_json::to_string_pretty(&allocation).context("serialize allocation failed")?;
    println!("{json}");
    Ok(())
}

pub fn reorder(keys: &[i64], from: usize, to: usize, config_paths: &[String]) -> Result<()> {
    let loaded = load_config(config_paths)?;
    let sequencer = Sequencer::from_config(&SequencerConfig::from_config_json(&loaded.config_json)?)?;

    // Synthetic ids: position in the input list.
    let items: Vec<OrderedKey> = keys
        .iter()
        .enumerate()
        .map(|(i, k)| OrderedKey::new(Uuid::from_u128(i as u128 + 1), *k))
        .collect();
    let moved = items
        .get(from)
        .map(|it| it.id)
        .with_context(|| format!("--from {from} out of range for {} keys", items.len()))?;

    let assignment = sequencer.reorder(&items, moved, to)?;
    let order: Vec<String> = assignment
        .apply(&items)
        .iter()
        .map(|it| it.order_key.to_string())
        .collect();

    match &assignment {
        KeyAssignment::Single { order_key, .. } => {
            println!("kind=single");
            println!("order_key={order_key}");
        }
        KeyAssignment::Renumbered { order_keys } => {
            info!(len = order_keys.len(), "keys converged; renumbered");
            println!("kind=renumbered");
            if let Some(k) = assignment.key_for(moved) {
                println!("order_key={k}");
            }
        }
    }
    println!("keys={}", order.join(","));
    Ok(())
}
