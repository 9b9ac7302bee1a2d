use serde::{Deserialize, Serialize};

use crate::db_types::{EnforcementTier, Order, OrderStatusType};

/// An order has been paid in full, either directly or by a completed swap.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderPaidEvent {
    pub order: Order,
}

impl OrderPaidEvent {
    pub fn new(order: Order) -> Self {
        Self { order }
    }
}

/// An order has been cancelled or has expired, and its inventory has been returned to stock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAnnulledEvent {
    pub order: Order,
    pub status: OrderStatusType,
}

impl OrderAnnulledEvent {
    pub fn new(order: Order) -> Self {
        let status = order.status;
        Self { order, status }
    }
}

/// A tenant has been deactivated because a commission invoice is overdue.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TenantDeactivatedEvent {
    pub tenant_id: i64,
    pub invoice_id: i64,
    pub tier: EnforcementTier,
}

impl TenantDeactivatedEvent {
    pub fn new(tenant_id: i64, invoice_id: i64, tier: EnforcementTier) -> Self {
        Self { tenant_id, invoice_id, tier }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EventType {
    OrderPaid(OrderPaidEvent),
    OrderAnnulled(OrderAnnulledEvent),
    TenantDeactivated(TenantDeactivatedEvent),
}
