//! Order status labels.

use serde::{Deserialize, Serialize};

/// The status of an order.
///
/// Statuses form an open set: the well-known labels below get their own
/// variants, anything else a caller supplies is kept verbatim in `Other`.
/// Statuses compare by label, so `Other("shipped")` equals `Shipped`; stores
/// persist the [`normalized`](OrderStatus::normalized) form.
/// No transition graph is enforced; any status may follow any other.
///
/// ```text
/// pending ──► processing ──► shipped ──► delivered
///    │             │            │
///    └─────────────┴────────────┴──► cancelled      (conventional flow only)
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum OrderStatus {
    /// Initial status of every new order.
    #[default]
    Pending,

    Processing,

    /// Reaching this status triggers the shipping notification.
    Shipped,

    Delivered,

    Cancelled,

    /// Any caller-defined label.
    Other(String),
}

impl OrderStatus {
    /// Returns the persisted label.
    pub fn as_str(&self) -> &str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::Other(label) => label,
        }
    }

    /// Maps a well-known label held in `Other` onto its own variant.
    pub fn normalized(self) -> Self {
        match self {
            OrderStatus::Other(label) => OrderStatus::from(label),
            known => known,
        }
    }

    pub fn is_shipped(&self) -> bool {
        self.as_str() == OrderStatus::Shipped.as_str()
    }
}

impl PartialEq for OrderStatus {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for OrderStatus {}

impl std::hash::Hash for OrderStatus {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for OrderStatus {
    fn from(label: &str) -> Self {
        match label {
            "pending" => OrderStatus::Pending,
            "processing" => OrderStatus::Processing,
            "shipped" => OrderStatus::Shipped,
            "delivered" => OrderStatus::Delivered,
            "cancelled" => OrderStatus::Cancelled,
            other => OrderStatus::Other(other.to_string()),
        }
    }
}

impl From<String> for OrderStatus {
    fn from(label: String) -> Self {
        OrderStatus::from(label.as_str())
    }
}

impl From<OrderStatus> for String {
    fn from(status: OrderStatus) -> Self {
        match status {
            OrderStatus::Other(label) => label,
            known => known.as_str().to_string(),
        }
    }
}
