use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

pub type ProductId = Uuid;
pub type CategoryId = Uuid;
pub type UserId = Uuid;
pub type OrderId = Uuid;
pub type JobId = Uuid;

/// Monetary amount in integer cents. Arithmetic is checked; overflow is a
/// domain error, never a silent wrap.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(transparent)]
pub struct Money(pub i64);

impl Money {
    pub const ZERO: Money = Money(0);

    pub fn from_cents(cents: i64) -> Self {
        Money(cents)
    }

    pub fn cents(&self) -> i64 {
        self.0
    }

    pub fn checked_add(self, other: Money) -> Option<Money> {
        self.0.checked_add(other.0).map(Money)
    }

    pub fn checked_mul(self, factor: i64) -> Option<Money> {
        self.0.checked_mul(factor).map(Money)
    }
}

impl fmt::Display for Money {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sign = if self.0 < 0 { "-" } else { "" };
        let abs = self.0.unsigned_abs();
        write!(f, "{}{}.{:02}", sign, abs / 100, abs % 100)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Customer,
    Admin,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub display_name: String,
    pub role: Role,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
    pub parent_id: Option<CategoryId>,
    pub sort_order: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Product {
    pub id: ProductId,
    pub category_id: CategoryId,
    pub name: String,
    pub slug: String,
    pub description: String,
    /// Print material for jobs spawned from this product (must name an
    /// entry in the material table).
    pub material: String,
    pub price: Money,
    pub stock_quantity: u32,
    pub active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cart {
    pub user_id: UserId,
    pub lines: Vec<CartLine>,
    pub updated_at: DateTime<Utc>,
}

impl Cart {
    pub fn empty(user_id: UserId) -> Self {
        Self {
            user_id,
            lines: Vec::new(),
            updated_at: Utc::now(),
        }
    }

    pub fn subtotal(&self) -> Option<Money> {
        self.lines.iter().try_fold(Money::ZERO, |acc, line| {
            line.unit_price
                .checked_mul(i64::from(line.quantity))
                .and_then(|line_total| acc.checked_add(line_total))
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    Placed,
    Paid,
    Fulfilled,
    Cancelled,
}

/// Order lines denormalize the product name and unit price at placement time
/// so later catalog edits never rewrite purchase history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderLine {
    pub product_id: ProductId,
    pub product_name: String,
    pub quantity: u32,
    pub unit_price: Money,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub lines: Vec<OrderLine>,
    pub subtotal: Money,
    pub total: Money,
    pub status: OrderStatus,
    pub placed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobPriority {
    Low,
    Normal,
    High,
    Rush,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Assigned,
    Printing,
    Completed,
    Cancelled,
    Failed,
}

impl JobStatus {
    /// Legal lifecycle edges. Everything else is rejected before any state
    /// is written.
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Assigned)
                | (Pending, Cancelled)
                | (Assigned, Printing)
                | (Assigned, Cancelled)
                | (Printing, Completed)
                | (Printing, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Cancelled | JobStatus::Failed
        )
    }

    /// Customer-facing label shown on the tracking page.
    pub fn display_label(self) -> &'static str {
        match self {
            JobStatus::Pending => "In queue",
            JobStatus::Assigned => "Assigned to printer",
            JobStatus::Printing => "Printing",
            JobStatus::Completed => "Completed",
            JobStatus::Cancelled => "Cancelled",
            JobStatus::Failed => "Failed",
        }
    }
}

/// Public identifier for unauthenticated status lookups: 10 characters from
/// an alphabet without 0/O and 1/I.
pub const TRACKING_ALPHABET: &[u8; 32] = b"ABCDEFGHJKLMNPQRSTUVWXYZ23456789";
pub const TRACKING_CODE_LEN: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TrackingCode(String);

impl TrackingCode {
    pub fn parse(raw: &str) -> Option<TrackingCode> {
        let raw = raw.trim().to_ascii_uppercase();
        if raw.len() != TRACKING_CODE_LEN {
            return None;
        }
        if raw.bytes().all(|b| TRACKING_ALPHABET.contains(&b)) {
            Some(TrackingCode(raw))
        } else {
            None
        }
    }

    /// Construct from characters already known to be in the alphabet.
    pub(crate) fn from_generated(code: String) -> TrackingCode {
        debug_assert_eq!(code.len(), TRACKING_CODE_LEN);
        TrackingCode(code)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TrackingCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrintJob {
    pub id: JobId,
    pub order_id: OrderId,
    pub tracking_code: TrackingCode,
    pub model_hash: Option<String>,
    pub material: String,
    pub status: JobStatus,
    pub priority: JobPriority,
    pub printer_id: Option<String>,
    pub submitted_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    pub completed_at: Option<DateTime<Utc>>,
    pub failure_reason: Option<String>,
}

impl PrintJob {
    pub fn new(
        order_id: OrderId,
        tracking_code: TrackingCode,
        material: impl Into<String>,
        priority: JobPriority,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            order_id,
            tracking_code,
            model_hash: None,
            material: material.into(),
            status: JobStatus::Pending,
            priority,
            printer_id: None,
            submitted_at: Utc::now(),
            started_at: None,
            completed_at: None,
            failure_reason: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn money_display_and_checked_math() {
        assert_eq!(Money(1999).to_string(), "19.99");
        assert_eq!(Money(-50).to_string(), "-0.50");
        assert_eq!(Money(100).checked_mul(3), Some(Money(300)));
        assert!(Money(i64::MAX).checked_add(Money(1)).is_none());
    }

    #[test]
    fn cart_subtotal_sums_lines() {
        let mut cart = Cart::empty(Uuid::new_v4());
        cart.lines.push(CartLine {
            product_id: Uuid::new_v4(),
            quantity: 2,
            unit_price: Money(1500),
        });
        cart.lines.push(CartLine {
            product_id: Uuid::new_v4(),
            quantity: 1,
            unit_price: Money(250),
        });
        assert_eq!(cart.subtotal(), Some(Money(3250)));
    }

    #[test]
    fn job_status_lifecycle() {
        use JobStatus::*;
        assert!(Pending.can_transition_to(Assigned));
        assert!(Pending.can_transition_to(Cancelled));
        assert!(Assigned.can_transition_to(Printing));
        assert!(Printing.can_transition_to(Completed));
        assert!(Printing.can_transition_to(Failed));

        assert!(!Pending.can_transition_to(Printing));
        assert!(!Printing.can_transition_to(Cancelled));
        assert!(!Completed.can_transition_to(Pending));
        assert!(Completed.is_terminal());
        assert!(!Assigned.is_terminal());
    }

    #[test]
    fn tracking_code_parse_rejects_bad_input() {
        assert!(TrackingCode::parse("ABCDEFGH23").is_some());
        assert!(TrackingCode::parse("abcdefgh23").is_some()); // case-folded
        assert!(TrackingCode::parse("ABCDEFGH2").is_none()); // short
        assert!(TrackingCode::parse("ABCDEFGH0O").is_none()); // ambiguous chars
    }
}
