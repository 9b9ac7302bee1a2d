use std::str::FromStr;

use chrono::{Duration, Utc};
use cucumber::{given, then, when};
use rust_decimal::Decimal;
use settlement_engine::{
    db_types::{Amount, CommissionRate, EnforcementTier, InvoiceStatus, NewProduct, NewTenant},
    test_utils::prepare_env::TEST_WALLET,
    traits::TenantManagement,
};

use crate::cucumber::{settlement_world::SettlementSystem, SettlementWorld};

fn amount(s: &str) -> Amount {
    Amount::from_str(s).expect("Not a valid amount")
}

#[given("a fresh settlement system")]
async fn fresh_system(world: &mut SettlementWorld) {
    world.system = Some(SettlementSystem::new().await);
}

#[given(expr = "a tenant '{word}' with commission rate {word}")]
async fn tenant_with_rate(world: &mut SettlementWorld, name: String, rate: String) {
    let rate = CommissionRate::new(Decimal::from_str(&rate).expect("Not a decimal")).expect("Invalid rate");
    let sys = world.system_mut();
    let tenant = sys
        .db
        .create_tenant(NewTenant::new(name.as_str()).with_wallet(TEST_WALLET).with_commission_rate(rate))
        .await
        .expect("Error creating tenant");
    sys.tenants.insert(name, tenant);
}

#[given(expr = "'{word}' sells '{word}' at {word} XMR with {int} in stock")]
async fn tenant_product(world: &mut SettlementWorld, tenant: String, product: String, price: String, stock: i64) {
    let tenant_id = world.tenant(&tenant).id;
    let sys = world.system_mut();
    let p = sys
        .db
        .create_product(NewProduct::new(tenant_id, product.as_str(), amount(&price), stock))
        .await
        .expect("Error creating product");
    sys.products.insert(product, p);
}

#[when(expr = "{int} orders for '{word}' are placed and paid")]
async fn paid_orders(world: &mut SettlementWorld, count: usize, product: String) {
    let sys = world.system();
    let p = sys.products.get(&product).expect("Unknown product");
    for _ in 0..count {
        let order = sys.orders.create_order(p.tenant_id, p.id, 1, "cucumber lane", "xmr").await.expect("Order failed");
        sys.orders.confirm_payment(order.order_id).await.expect("Payment failed");
    }
}

#[when(expr = "an order for '{word}' is placed but never paid")]
async fn unpaid_order(world: &mut SettlementWorld, product: String) {
    let sys = world.system();
    let p = sys.products.get(&product).expect("Unknown product");
    sys.orders.create_order(p.tenant_id, p.id, 1, "cucumber lane", "xmr").await.expect("Order failed");
}

#[when(expr = "'{word}' changes commission rate to {word}")]
async fn change_rate(world: &mut SettlementWorld, tenant: String, rate: String) {
    let rate = CommissionRate::new(Decimal::from_str(&rate).expect("Not a decimal")).expect("Invalid rate");
    let tenant_id = world.tenant(&tenant).id;
    let sys = world.system_mut();
    let updated = sys.db.set_commission_rate(tenant_id, rate).await.expect("Error setting rate");
    sys.tenants.insert(tenant, updated);
}

#[when(expr = "invoices for the last 30 days are generated {int} days ago")]
async fn generate_invoices(world: &mut SettlementWorld, days_ago: i64) {
    let now = Utc::now();
    let sys = world.system_mut();
    let report = sys
        .commission
        .generate_invoices_at(now - Duration::days(30), now + Duration::minutes(1), now - Duration::days(days_ago))
        .await
        .expect("Error generating invoices");
    assert!(report.failures.is_empty(), "Invoice generation failures: {:?}", report.failures);
    for invoice in report.created {
        let name = sys
            .tenants
            .iter()
            .find(|(_, t)| t.id == invoice.tenant_id)
            .map(|(n, _)| n.clone())
            .expect("Invoice for unknown tenant");
        sys.invoices.insert(name, invoice);
    }
}

#[when(expr = "'{word}' pays {word} XMR against the invoice")]
async fn pay_invoice(world: &mut SettlementWorld, tenant: String, paid: String) {
    let id = world.invoice(&tenant).id;
    let result = world.system().commission.check_invoice_payment(id, amount(&paid)).await.expect("Payment failed");
    world.system_mut().invoices.insert(tenant, result.invoice);
}

#[when("overdue invoices are processed")]
async fn process_overdue(world: &mut SettlementWorld) {
    world.system().commission.process_overdue_invoices().await.expect("Error processing overdue invoices");
}

#[when(expr = "the invoice for '{word}' is waived because {string}")]
async fn waive(world: &mut SettlementWorld, tenant: String, reason: String) {
    let id = world.invoice(&tenant).id;
    let invoice = world.system().commission.waive_invoice(id, &reason).await.expect("Error waiving invoice");
    world.system_mut().invoices.insert(tenant, invoice);
}

#[then(expr = "'{word}' has an invoice for {int} orders with {word} XMR sales and {word} XMR due")]
async fn check_invoice(world: &mut SettlementWorld, tenant: String, count: i64, sales: String, due: String) {
    let invoice = world.invoice(&tenant);
    assert_eq!(invoice.order_count, count, "Order count");
    assert_eq!(invoice.total_sales, amount(&sales), "Total sales");
    assert_eq!(invoice.commission_due, amount(&due), "Commission due");
}

#[then(expr = "'{word}' has no invoice")]
async fn check_no_invoice(world: &mut SettlementWorld, tenant: String) {
    let tenant_id = world.tenant(&tenant).id;
    let invoices = world.system().commission.invoices_for_tenant(tenant_id).await.expect("Error fetching invoices");
    assert!(invoices.is_empty(), "Expected no invoices, but found {}", invoices.len());
}

#[then(expr = "the invoice for '{word}' is {word}")]
async fn check_invoice_status(world: &mut SettlementWorld, tenant: String, status: String) {
    let id = world.invoice(&tenant).id;
    let invoice = world.system().commission.fetch_invoice(id).await.expect("Error fetching invoice");
    let expected = match status.as_str() {
        "Pending" => InvoiceStatus::Pending,
        "Paid" => InvoiceStatus::Paid,
        "Overdue" => InvoiceStatus::Overdue,
        "Waived" => InvoiceStatus::Waived,
        s => panic!("Unknown invoice status {s}"),
    };
    assert_eq!(invoice.status, expected);
}

#[then(expr = "the invoice for '{word}' records enforcement {word}")]
async fn check_enforcement(world: &mut SettlementWorld, tenant: String, tier: String) {
    let id = world.invoice(&tenant).id;
    let invoice = world.system().commission.fetch_invoice(id).await.expect("Error fetching invoice");
    let expected = match tier.as_str() {
        "none" => None,
        "Suspended" => Some(EnforcementTier::Suspended),
        "Terminated" => Some(EnforcementTier::Terminated),
        s => panic!("Unknown enforcement tier {s}"),
    };
    assert_eq!(invoice.enforcement, expected);
}

#[then(expr = "tenant '{word}' is {word}")]
async fn check_tenant_active(world: &mut SettlementWorld, tenant: String, state: String) {
    let tenant_id = world.tenant(&tenant).id;
    let t = world.system().db.fetch_tenant(tenant_id).await.expect("Error fetching tenant").expect("No tenant");
    match state.as_str() {
        "active" => assert!(t.active, "{tenant} should be active"),
        "inactive" => assert!(!t.active, "{tenant} should be inactive"),
        s => panic!("Unknown tenant state {s}"),
    }
}

#[then(expr = "tenant '{word}' has {int} overdue invoices")]
async fn check_overdue_count(world: &mut SettlementWorld, tenant: String, count: i64) {
    let tenant_id = world.tenant(&tenant).id;
    let t = world.system().db.fetch_tenant(tenant_id).await.expect("Error fetching tenant").expect("No tenant");
    assert_eq!(t.overdue_invoices, count);
}
