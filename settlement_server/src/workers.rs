use std::{future::Future, time::Duration};

use chrono::{Datelike, Utc, Weekday};
use log::*;
use exchange_tools::MoneroWalletRpc;
use tokio::{sync::watch, task::JoinHandle, time::MissedTickBehavior};

use crate::{
    config::ScheduleConfig,
    services::{LiveCommission, LiveOrderFlow, Services},
};

/// The background jobs that move orders and invoices forward.
///
/// Each job is an independent task driven by its own interval timer. Shutdown is signalled over a shared watch
/// channel and observed between ticks, so a pass that has started always runs to completion.
pub struct ReconciliationScheduler {
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl ReconciliationScheduler {
    pub fn start(services: &Services, schedule: &ScheduleConfig, unpaid_timeout: chrono::Duration) -> Self {
        let (shutdown, signal) = watch::channel(false);
        let mut handles = Vec::with_capacity(5);

        let orders = services.orders.clone();
        handles.push(spawn_job("swap status poller", schedule.swap_poll_interval, signal.clone(), move || {
            let orders = orders.clone();
            async move { poll_swaps(&orders).await }
        }));

        let orders = services.orders.clone();
        handles.push(spawn_job("unpaid order expiry", schedule.order_expiry_interval, signal.clone(), move || {
            let orders = orders.clone();
            async move { expire_orders(&orders, unpaid_timeout).await }
        }));

        match &services.wallet {
            Some(wallet) => {
                let commission = services.commission.clone();
                let wallet = wallet.clone();
                let period = schedule.invoice_payment_interval;
                handles.push(spawn_job("invoice payment checker", period, signal.clone(), move || {
                    let commission = commission.clone();
                    let wallet = wallet.clone();
                    async move { check_invoice_payments(&commission, wallet.as_ref()).await }
                }));
            },
            None => warn!("🕰️ No wallet RPC is configured. The invoice payment checker will not run."),
        }

        let commission = services.commission.clone();
        let weekday = schedule.invoice_weekday;
        handles.push(spawn_job("invoice generator", schedule.invoice_generation_interval, signal.clone(), move || {
            let commission = commission.clone();
            async move {
                if is_invoice_day(Utc::now().weekday(), weekday) {
                    generate_invoices(&commission).await;
                } else {
                    trace!("🕰️ Invoices are only generated on {weekday}");
                }
            }
        }));

        let commission = services.commission.clone();
        handles.push(spawn_job("overdue processor", schedule.overdue_interval, signal, move || {
            let commission = commission.clone();
            async move { process_overdue(&commission).await }
        }));

        info!("🕰️ Reconciliation scheduler started with {} jobs", handles.len());
        Self { shutdown, handles }
    }

    pub fn job_count(&self) -> usize {
        self.handles.len()
    }

    /// Signals every job to stop and waits for them to finish their current pass.
    pub async fn shutdown(self) {
        info!("🕰️ Stopping the reconciliation scheduler");
        let _ = self.shutdown.send(true);
        for result in futures::future::join_all(self.handles).await {
            if let Err(e) = result {
                error!("🕰️ A scheduler job did not shut down cleanly. {e}");
            }
        }
        info!("🕰️ Reconciliation scheduler stopped");
    }
}

/// Runs `job` every `period` until `shutdown` is set. The first pass runs immediately.
pub fn spawn_job<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send,
{
    tokio::spawn(async move {
        let mut timer = tokio::time::interval(period);
        timer.set_missed_tick_behavior(MissedTickBehavior::Delay);
        info!("🕰️ {name} started. Runs every {}s", period.as_secs());
        loop {
            if *shutdown.borrow() {
                break;
            }
            tokio::select! {
                _ = timer.tick() => {
                    debug!("🕰️ Running {name}");
                    job().await;
                },
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        debug!("🕰️ Shutdown channel for {name} closed");
                        break;
                    }
                },
            }
        }
        info!("🕰️ {name} stopped");
    })
}

pub fn is_invoice_day(today: Weekday, invoice_day: Weekday) -> bool {
    today == invoice_day
}

pub async fn poll_swaps(orders: &LiveOrderFlow) {
    match orders.process_pending_swaps().await {
        Ok(report) => info!("🕰️ Swap poll complete. {report}"),
        Err(e) => error!("🕰️ Error polling pending swaps: {e}"),
    }
}

pub async fn expire_orders(orders: &LiveOrderFlow, timeout: chrono::Duration) {
    match orders.expire_unpaid_orders(timeout).await {
        Ok(report) => {
            info!("🕰️ {} unpaid orders expired", report.expired.len());
            if report.errors > 0 {
                warn!("🕰️ {} orders could not be expired and will be retried on the next pass", report.errors);
            }
        },
        Err(e) => error!("🕰️ Error running unpaid order expiry job: {e}"),
    }
}

pub async fn check_invoice_payments(commission: &LiveCommission, wallet: &MoneroWalletRpc) {
    match commission.reconcile_invoice_payments(wallet).await {
        Ok(paid) => info!("🕰️ Invoice payment check complete. {paid} invoices paid"),
        Err(e) => error!("🕰️ Error checking invoice payments: {e}"),
    }
}

pub async fn generate_invoices(commission: &LiveCommission) {
    match commission.generate_invoices().await {
        Ok(report) => {
            info!("🕰️ {} commission invoices generated", report.created.len());
            for (tenant_id, reason) in &report.failures {
                warn!("🕰️ No invoice for tenant #{tenant_id}. {reason}");
            }
        },
        Err(e) => error!("🕰️ Error generating commission invoices: {e}"),
    }
}

pub async fn process_overdue(commission: &LiveCommission) {
    match commission.process_overdue_invoices().await {
        Ok(report) => info!(
            "🕰️ Overdue processing complete. {} newly overdue, {} suspended, {} terminated",
            report.marked_overdue.len(),
            report.suspended.len(),
            report.terminated.len()
        ),
        Err(e) => error!("🕰️ Error processing overdue invoices: {e}"),
    }
}
