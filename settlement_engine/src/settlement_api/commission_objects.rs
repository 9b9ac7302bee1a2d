use serde::{Deserialize, Serialize};
use tsg_common::Amount;

use crate::db_types::CommissionInvoice;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InvoiceGenerationReport {
    pub created: Vec<CommissionInvoice>,
    /// Tenants that could not be invoiced, with the reason
    pub failures: Vec<(i64, String)>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvoicePaymentResult {
    pub invoice: CommissionInvoice,
    /// True if the amount received covers the commission due
    pub paid: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OverdueReport {
    /// Invoices that passed their due date on this run
    pub marked_overdue: Vec<i64>,
    /// Tenants suspended on this run
    pub suspended: Vec<i64>,
    /// Tenants terminated on this run
    pub terminated: Vec<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlatformRevenue {
    /// Commission on invoices paid in the period
    pub total_commission: Amount,
    pub paid_invoices: usize,
    /// Invoices that are currently `Pending` or `Overdue`
    pub outstanding_invoices: usize,
    pub outstanding_amount: Amount,
}
