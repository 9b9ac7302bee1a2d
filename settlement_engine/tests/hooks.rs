use std::sync::{
    atomic::{AtomicI32, Ordering},
    Arc,
};

use chrono::{Duration, Utc};
use futures_util::FutureExt;
use log::*;
use rust_decimal_macros::dec;
use settlement_engine::{
    db_types::{Amount, EnforcementTier, OrderStatusType},
    events::{EventHandlers, EventHooks},
    test_utils::{
        fakes::{FixedRates, ScriptedSwaps},
        prepare_env::{prepare_test_db, seed_product, seed_tenant, PLATFORM_WALLET},
    },
    traits::SettlementDatabase,
    CommissionApi,
    CurrencyConverter,
    OrderFlowApi,
};
use sqlx::{migrate::MigrateDatabase, Sqlite};

#[derive(Default, Clone)]
struct HookCalled {
    called: Arc<AtomicI32>,
}

impl HookCalled {
    pub fn called(&self) {
        let _ = self.called.fetch_add(1, Ordering::SeqCst);
    }

    pub fn count(&self) -> i32 {
        self.called.load(Ordering::SeqCst)
    }
}

#[tokio::test]
async fn hooks_fire_for_paid_annulled_and_deactivated() {
    let paid = HookCalled::default();
    let annulled = HookCalled::default();
    let deactivated = HookCalled::default();
    let (p, a, d) = (paid.clone(), annulled.clone(), deactivated.clone());

    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(move |ev| {
            info!("🪝️ Order paid: #{}", ev.order.id);
            p.called();
            async {}.boxed()
        })
        .on_order_annulled(move |ev| {
            info!("🪝️ Order annulled: #{} ({})", ev.order.id, ev.status);
            assert_eq!(ev.status, OrderStatusType::Cancelled);
            a.called();
            async {}.boxed()
        })
        .on_tenant_deactivated(move |ev| {
            info!("🪝️ Tenant #{} deactivated", ev.tenant_id);
            assert_eq!(ev.tier, EnforcementTier::Terminated);
            d.called();
            async {}.boxed()
        });
    let handlers = EventHandlers::new(16, hooks);
    let producers = handlers.producers();
    handlers.start_handlers().await;

    let db = prepare_test_db().await;
    let tenant = seed_tenant(&db, "hooked").await;
    let product = seed_product(&db, tenant.id, Amount::from(dec!(10)), 10).await;
    let orders = OrderFlowApi::new(
        db.clone(),
        CurrencyConverter::new(FixedRates::standard()),
        ScriptedSwaps::new(),
        producers.clone(),
    );
    let commission = CommissionApi::new(db.clone(), PLATFORM_WALLET.to_string(), producers);

    let start = Utc::now() - Duration::days(30);
    let first = orders.create_order(tenant.id, product.id, 1, "a", "xmr").await.unwrap();
    let second = orders.create_order(tenant.id, product.id, 1, "a", "xmr").await.unwrap();
    orders.confirm_payment(first.order_id).await.unwrap();
    orders.cancel_order(second.order_id).await.unwrap();
    // Already cancelled, so no second event
    orders.cancel_order(second.order_id).await.unwrap();

    let generated_at = Utc::now() - Duration::days(22);
    let report = commission.generate_invoices_at(start, Utc::now(), generated_at).await.unwrap();
    assert_eq!(report.created.len(), 1);
    let overdue = commission.process_overdue_invoices().await.unwrap();
    assert_eq!(overdue.terminated, vec![tenant.id]);

    drop(orders);
    drop(commission);
    tokio::time::sleep(std::time::Duration::from_millis(250)).await;
    assert_eq!(paid.count(), 1);
    assert_eq!(annulled.count(), 1);
    assert_eq!(deactivated.count(), 1);

    let mut db = db;
    db.close().await.unwrap();
    Sqlite::drop_database(db.url()).await.unwrap();
}
