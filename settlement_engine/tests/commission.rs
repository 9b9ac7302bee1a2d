use chrono::{DateTime, Duration, Utc};
use log::*;
use rust_decimal_macros::dec;
use settlement_engine::{
    db_types::{Amount, CommissionRate, EnforcementTier, InvoiceStatus, Tenant},
    events::EventProducers,
    test_utils::{
        fakes::{FakeReceipts, FixedRates, ScriptedSwaps},
        prepare_env::{prepare_test_db, seed_product, seed_tenant, PLATFORM_WALLET},
    },
    traits::{SettlementDatabase, TenantManagement},
    CommissionApi,
    CommissionError,
    CurrencyConverter,
    ErrorKind,
    OrderFlowApi,
    SqliteDatabase,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

struct Harness {
    db: SqliteDatabase,
    orders: OrderFlowApi<SqliteDatabase, FixedRates, ScriptedSwaps>,
    commission: CommissionApi<SqliteDatabase>,
}

impl Harness {
    async fn new() -> Self {
        let db = prepare_test_db().await;
        let orders = OrderFlowApi::new(
            db.clone(),
            CurrencyConverter::new(FixedRates::standard()),
            ScriptedSwaps::new(),
            EventProducers::default(),
        );
        let commission = CommissionApi::new(db.clone(), PLATFORM_WALLET.to_string(), EventProducers::default());
        Self { db, orders, commission }
    }

    /// Places and pays `count` orders of one unit each at `price`.
    async fn completed_sales(&self, tenant: &Tenant, price: Amount, count: usize) {
        let product = seed_product(&self.db, tenant.id, price, 100).await;
        for _ in 0..count {
            let order = self.orders.create_order(tenant.id, product.id, 1, "a", "xmr").await.unwrap();
            self.orders.confirm_payment(order.order_id).await.unwrap();
        }
    }

    async fn tear_down(mut self) {
        if let Err(e) = self.db.close().await {
            error!("🚀️ Failed to close database: {e}");
        }
        Sqlite::drop_database(self.db.url()).await.unwrap();
    }
}

fn xmr(v: rust_decimal::Decimal) -> Amount {
    Amount::from(v)
}

fn this_month() -> (DateTime<Utc>, DateTime<Utc>) {
    let now = Utc::now();
    (now - Duration::days(30), now + Duration::minutes(1))
}

#[tokio::test]
async fn weekly_invoice_and_payment() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "alice").await;
    let idle = seed_tenant(&h.db, "bob").await;
    h.completed_sales(&tenant, xmr(dec!(10.0)), 5).await;
    // Unpaid orders are not billed
    let product = seed_product(&h.db, tenant.id, xmr(dec!(99)), 1).await;
    h.orders.create_order(tenant.id, product.id, 1, "a", "xmr").await.unwrap();

    let (start, end) = this_month();
    let now = Utc::now();
    let report = h.commission.generate_invoices_at(start, end, now).await.unwrap();
    assert_eq!(report.created.len(), 1);
    assert!(report.failures.is_empty());
    let invoice = &report.created[0];
    assert_eq!(invoice.tenant_id, tenant.id);
    assert_eq!(invoice.order_count, 5);
    assert_eq!(invoice.total_sales, xmr(dec!(50.0)));
    assert_eq!(invoice.commission_due, xmr(dec!(2.5)));
    assert_eq!(invoice.order_commission, xmr(dec!(2.5)));
    assert_eq!(invoice.status, InvoiceStatus::Pending);
    assert_eq!(invoice.payment_address, PLATFORM_WALLET);
    assert_eq!(invoice.payment_id.len(), 64);
    assert!((invoice.due_date - (now + Duration::days(7))).num_seconds().abs() < 1);
    assert!(h.commission.invoices_for_tenant(idle.id).await.unwrap().is_empty());

    let underpaid = h.commission.check_invoice_payment(invoice.id, xmr(dec!(1.0))).await.unwrap();
    assert!(!underpaid.paid);
    assert_eq!(underpaid.invoice.status, InvoiceStatus::Pending);
    assert_eq!(underpaid.invoice.amount_received, xmr(dec!(1.0)));

    let paid = h.commission.check_invoice_payment(invoice.id, xmr(dec!(2.5))).await.unwrap();
    assert!(paid.paid);
    assert_eq!(paid.invoice.status, InvoiceStatus::Paid);
    assert!(paid.invoice.paid_at.is_some());

    let err = h.commission.check_invoice_payment(invoice.id, xmr(dec!(2.5))).await.unwrap_err();
    assert!(matches!(err, CommissionError::InvoiceClosed { status: InvoiceStatus::Paid, .. }));
    assert_eq!(err.kind(), ErrorKind::Validation);

    let revenue = h.commission.calculate_platform_revenue(start, Utc::now() + Duration::minutes(1)).await.unwrap();
    assert_eq!(revenue.total_commission, xmr(dec!(2.5)));
    assert_eq!(revenue.paid_invoices, 1);
    assert_eq!(revenue.outstanding_invoices, 0);

    let actions =
        h.db.fetch_audit_log_for_tenant(tenant.id).await.unwrap().into_iter().map(|e| e.action).collect::<Vec<_>>();
    assert!(actions.contains(&"invoice_generated".to_string()));
    assert!(actions.contains(&"invoice_paid".to_string()));
    h.tear_down().await;
}

#[tokio::test]
async fn overpayment_is_accepted_and_bad_amounts_are_rejected() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "carol").await;
    h.completed_sales(&tenant, xmr(dec!(3)), 1).await;
    let (start, end) = this_month();
    let invoice = h.commission.generate_invoices_at(start, end, Utc::now()).await.unwrap().created.remove(0);
    assert_eq!(invoice.commission_due, xmr(dec!(0.15)));

    let err = h.commission.check_invoice_payment(invoice.id, Amount::ZERO).await.unwrap_err();
    assert!(matches!(err, CommissionError::NonPositiveAmount(_)));
    let err = h.commission.check_invoice_payment(9999, xmr(dec!(1))).await.unwrap_err();
    assert!(matches!(err, CommissionError::InvoiceNotFound(9999)));
    assert_eq!(err.kind(), ErrorKind::NotFound);

    let paid = h.commission.check_invoice_payment(invoice.id, xmr(dec!(1))).await.unwrap();
    assert!(paid.paid);
    assert_eq!(paid.invoice.amount_received, xmr(dec!(1)));
    h.tear_down().await;
}

#[tokio::test]
async fn periods_never_overlap() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "dave").await;
    h.completed_sales(&tenant, xmr(dec!(1)), 2).await;
    let now = Utc::now();
    let (start, end) = this_month();
    assert_eq!(h.commission.generate_invoices_at(start, end, now).await.unwrap().created.len(), 1);

    let report = h.commission.generate_invoices_at(start + Duration::days(1), end, now).await.unwrap();
    assert!(report.created.is_empty());
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].0, tenant.id);

    let err = h.commission.generate_invoices_at(end, start, now).await.unwrap_err();
    assert!(matches!(err, CommissionError::InvalidPeriod));
    assert_eq!(h.commission.invoices_for_tenant(tenant.id).await.unwrap().len(), 1);
    h.tear_down().await;
}

#[tokio::test]
async fn invoices_use_the_rate_at_generation_time() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "erin").await;
    h.completed_sales(&tenant, xmr(dec!(10)), 2).await;
    let tenant = h.db.set_commission_rate(tenant.id, CommissionRate::new(dec!(0.08)).unwrap()).await.unwrap();
    let (start, end) = this_month();
    let invoice = h.commission.generate_invoices_at(start, end, Utc::now()).await.unwrap().created.remove(0);
    assert_eq!(invoice.commission_rate, tenant.commission_rate);
    assert_eq!(invoice.commission_due, xmr(dec!(1.6)));
    // The orders keep the commission they were created with
    assert_eq!(invoice.order_commission, xmr(dec!(1.0)));
    h.tear_down().await;
}

#[tokio::test]
async fn zero_commission_is_never_invoiced() {
    let h = Harness::new().await;
    let free = seed_tenant(&h.db, "judy").await;
    let free = h.db.set_commission_rate(free.id, CommissionRate::new(dec!(0)).unwrap()).await.unwrap();
    h.completed_sales(&free, xmr(dec!(10)), 1).await;
    // 0.05 * 0.0000001 rounds down to nothing at 8 decimal places
    let tiny = seed_tenant(&h.db, "ken").await;
    h.completed_sales(&tiny, xmr(dec!(0.0000001)), 1).await;
    let billed = seed_tenant(&h.db, "liam").await;
    h.completed_sales(&billed, xmr(dec!(10)), 1).await;

    let (start, end) = this_month();
    // Due 15 days ago, so any invoice would be terminated
    let report = h.commission.generate_invoices_at(start, end, Utc::now() - Duration::days(22)).await.unwrap();
    assert!(report.failures.is_empty());
    assert_eq!(report.created.len(), 1);
    assert_eq!(report.created[0].tenant_id, billed.id);
    assert!(h.commission.invoices_for_tenant(free.id).await.unwrap().is_empty());
    assert!(h.commission.invoices_for_tenant(tiny.id).await.unwrap().is_empty());

    let report = h.commission.process_overdue_invoices().await.unwrap();
    assert_eq!(report.terminated, vec![billed.id]);
    for id in [free.id, tiny.id] {
        let t = h.db.fetch_tenant(id).await.unwrap().unwrap();
        assert!(t.active);
        assert_eq!(t.overdue_invoices, 0);
    }
    h.tear_down().await;
}

#[tokio::test]
async fn overdue_enforcement_escalates() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "frank").await;
    h.completed_sales(&tenant, xmr(dec!(10)), 1).await;
    let (start, end) = this_month();
    // Due 8 days ago
    let generated_at = Utc::now() - Duration::days(15);
    let invoice = h.commission.generate_invoices_at(start, end, generated_at).await.unwrap().created.remove(0);

    let now = Utc::now();
    let report = h.commission.process_overdue_invoices_at(now).await.unwrap();
    assert_eq!(report.marked_overdue, vec![invoice.id]);
    assert_eq!(report.suspended, vec![tenant.id]);
    assert!(report.terminated.is_empty());
    let stored = h.commission.fetch_invoice(invoice.id).await.unwrap();
    assert_eq!(stored.status, InvoiceStatus::Overdue);
    assert_eq!(stored.enforcement, Some(EnforcementTier::Suspended));
    assert!(stored.paid_at.is_none());
    let t = h.db.fetch_tenant(tenant.id).await.unwrap().unwrap();
    assert!(!t.active);
    assert_eq!(t.overdue_invoices, 1);

    // Nothing new happens until the next tier
    let report = h.commission.process_overdue_invoices_at(now + Duration::days(1)).await.unwrap();
    assert!(report.marked_overdue.is_empty());
    assert!(report.suspended.is_empty());
    assert!(report.terminated.is_empty());

    // 15 days overdue
    let report = h.commission.process_overdue_invoices_at(now + Duration::days(7)).await.unwrap();
    assert_eq!(report.terminated, vec![tenant.id]);
    let stored = h.commission.fetch_invoice(invoice.id).await.unwrap();
    assert_eq!(stored.status, InvoiceStatus::Overdue);
    assert_eq!(stored.enforcement, Some(EnforcementTier::Terminated));

    let actions =
        h.db.fetch_audit_log_for_tenant(tenant.id).await.unwrap().into_iter().map(|e| e.action).collect::<Vec<_>>();
    assert!(actions.contains(&"tenant_suspended_nonpayment".to_string()));
    assert!(actions.contains(&"tenant_terminated_nonpayment".to_string()));

    // Paying late still settles the invoice
    let paid = h.commission.check_invoice_payment(invoice.id, xmr(dec!(0.5))).await.unwrap();
    assert!(paid.paid);
    let t = h.db.fetch_tenant(tenant.id).await.unwrap().unwrap();
    assert_eq!(t.overdue_invoices, 0);
    h.tear_down().await;
}

#[tokio::test]
async fn long_overdue_invoices_terminate_straight_away() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "grace").await;
    h.completed_sales(&tenant, xmr(dec!(10)), 1).await;
    let (start, end) = this_month();
    // Due 15 days ago
    let generated_at = Utc::now() - Duration::days(22);
    h.commission.generate_invoices_at(start, end, generated_at).await.unwrap();
    let report = h.commission.process_overdue_invoices().await.unwrap();
    assert!(report.suspended.is_empty());
    assert_eq!(report.terminated, vec![tenant.id]);
    assert!(!h.db.fetch_tenant(tenant.id).await.unwrap().unwrap().active);
    h.tear_down().await;
}

#[tokio::test]
async fn recently_due_invoices_are_only_marked_overdue() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "heidi").await;
    h.completed_sales(&tenant, xmr(dec!(10)), 1).await;
    let (start, end) = this_month();
    let generated_at = Utc::now() - Duration::days(10);
    h.commission.generate_invoices_at(start, end, generated_at).await.unwrap();
    let report = h.commission.process_overdue_invoices().await.unwrap();
    assert_eq!(report.marked_overdue.len(), 1);
    assert!(report.suspended.is_empty());
    assert!(h.db.fetch_tenant(tenant.id).await.unwrap().unwrap().active);
    h.tear_down().await;
}

#[tokio::test]
async fn waivers() {
    let h = Harness::new().await;
    let tenant = seed_tenant(&h.db, "ivan").await;
    h.completed_sales(&tenant, xmr(dec!(10)), 1).await;
    let (start, end) = this_month();
    let invoice = h
        .commission
        .generate_invoices_at(start, end, Utc::now() - Duration::days(9))
        .await
        .unwrap()
        .created
        .remove(0);
    h.commission.process_overdue_invoices().await.unwrap();
    assert_eq!(h.db.fetch_tenant(tenant.id).await.unwrap().unwrap().overdue_invoices, 1);

    let waived = h.commission.waive_invoice(invoice.id, "Launch promotion").await.unwrap();
    assert_eq!(waived.status, InvoiceStatus::Waived);
    assert_eq!(waived.waiver_reason.as_deref(), Some("Launch promotion"));
    assert_eq!(h.db.fetch_tenant(tenant.id).await.unwrap().unwrap().overdue_invoices, 0);

    let err = h.commission.waive_invoice(invoice.id, "again").await.unwrap_err();
    assert!(matches!(err, CommissionError::InvoiceClosed { status: InvoiceStatus::Waived, .. }));
    let err = h.commission.check_invoice_payment(invoice.id, xmr(dec!(1))).await.unwrap_err();
    assert!(matches!(err, CommissionError::InvoiceClosed { .. }));
    h.tear_down().await;
}

#[tokio::test]
async fn wallet_reconciliation() {
    let h = Harness::new().await;
    let alice = seed_tenant(&h.db, "alice").await;
    let bob = seed_tenant(&h.db, "bob").await;
    let carol = seed_tenant(&h.db, "carol").await;
    for t in [&alice, &bob, &carol] {
        h.completed_sales(t, xmr(dec!(20)), 1).await;
    }
    let (start, end) = this_month();
    let invoices = h.commission.generate_invoices_at(start, end, Utc::now()).await.unwrap().created;
    assert_eq!(invoices.len(), 3);
    let by_tenant = |id: i64| invoices.iter().find(|i| i.tenant_id == id).unwrap().clone();

    let receipts = FakeReceipts::new();
    receipts.receive(&by_tenant(alice.id).payment_id, xmr(dec!(1.0)));
    receipts.receive(&by_tenant(bob.id).payment_id, xmr(dec!(0.4)));
    receipts.make_unreadable(&by_tenant(carol.id).payment_id);

    let paid = h.commission.reconcile_invoice_payments(&receipts).await.unwrap();
    assert_eq!(paid, 1);
    assert_eq!(h.commission.fetch_invoice(by_tenant(alice.id).id).await.unwrap().status, InvoiceStatus::Paid);
    let bobs = h.commission.fetch_invoice(by_tenant(bob.id).id).await.unwrap();
    assert_eq!(bobs.status, InvoiceStatus::Pending);
    assert_eq!(bobs.amount_received, xmr(dec!(0.4)));

    receipts.receive(&by_tenant(bob.id).payment_id, xmr(dec!(0.6)));
    let paid = h.commission.reconcile_invoice_payments(&receipts).await.unwrap();
    assert_eq!(paid, 1);
    assert_eq!(h.commission.open_invoices().await.unwrap().len(), 1);
    h.tear_down().await;
}
