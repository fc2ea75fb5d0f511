use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ErrorClass;

/// Invariant violations on line item construction / mutation.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum LineItemError {
    #[error("line item invariant: quantity must be > 0, got {quantity}")]
    NonPositiveQuantity { quantity: i64 },
    #[error("line item invariant: unit_price_cents must be >= 0, got {unit_price_cents}")]
    NegativeUnitPrice { unit_price_cents: i64 },
    #[error("line item invariant: quantity {quantity} x unit_price_cents {unit_price_cents} overflows")]
    TotalOverflow { quantity: i64, unit_price_cents: i64 },
}

impl LineItemError {
    pub fn class(&self) -> ErrorClass {
        ErrorClass::Validation
    }
}

/// A billable line on an estimate/invoice.
///
/// `total_cents` is derived. It is private so it can only change through
/// [`LineItem::set_quantity`] / [`LineItem::set_unit_price`], which recompute it.
/// `order_key` is ordering metadata only; it is never business data.
/// Deserialization recomputes the total and rejects invalid quantity/price.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "LineItemWire")]
pub struct LineItem {
    pub id: Uuid,
    pub order_key: i64,
    pub description: String,
    quantity: i64,
    unit_price_cents: i64,
    total_cents: i64,
}

impl LineItem {
    pub fn new(
        id: Uuid,
        order_key: i64,
        description: impl Into<String>,
        quantity: i64,
        unit_price_cents: i64,
    ) -> Result<Self, LineItemError> {
        let total_cents = compute_total(quantity, unit_price_cents)?;
        Ok(Self {
            id,
            order_key,
            description: description.into(),
            quantity,
            unit_price_cents,
            total_cents,
        })
    }

    pub fn quantity(&self) -> i64 {
        self.quantity
    }

    pub fn unit_price_cents(&self) -> i64 {
        self.unit_price_cents
    }

    pub fn total_cents(&self) -> i64 {
        self.total_cents
    }

    /// Change quantity; `total_cents` follows. On error the item is unchanged.
    pub fn set_quantity(&mut self, quantity: i64) -> Result<(), LineItemError> {
        self.total_cents = compute_total(quantity, self.unit_price_cents)?;
        self.quantity = quantity;
        Ok(())
    }

    /// Change unit price; `total_cents` follows. On error the item is unchanged.
    pub fn set_unit_price(&mut self, unit_price_cents: i64) -> Result<(), LineItemError> {
        self.total_cents = compute_total(self.quantity, unit_price_cents)?;
        self.unit_price_cents = unit_price_cents;
        Ok(())
    }
}

#[derive(Deserialize)]
struct LineItemWire {
    id: Uuid,
    order_key: i64,
    description: String,
    quantity: i64,
    unit_price_cents: i64,
}

impl TryFrom<LineItemWire> for LineItem {
    type Error = LineItemError;

    fn try_from(w: LineItemWire) -> Result<Self, Self::Error> {
        LineItem::new(w.id, w.order_key, w.description, w.quantity, w.unit_price_cents)
    }
}

fn compute_total(quantity: i64, unit_price_cents: i64) -> Result<i64, LineItemError> {
    if quantity <= 0 {
        return Err(LineItemError::NonPositiveQuantity { quantity });
    }
    if unit_price_cents < 0 {
        return Err(LineItemError::NegativeUnitPrice { unit_price_cents });
    }
    quantity
        .checked_mul(unit_price_cents)
        .ok_or(LineItemError::TotalOverflow {
            quantity,
            unit_price_cents,
        })
}
