use log::*;
use settlement_engine::events::{EventHandlers, EventHooks};

use crate::{
    cli::Command,
    config::ServerConfig,
    errors::ServerError,
    services::Services,
    workers::ReconciliationScheduler,
};

const EVENT_BUFFER_SIZE: usize = 64;

/// Executes a single CLI command against the configured database and services.
pub async fn run_command(command: Command, config: ServerConfig) -> Result<(), ServerError> {
    config.validate()?;
    let handlers = EventHandlers::new(EVENT_BUFFER_SIZE, logging_hooks());
    let services = Services::connect(&config, handlers.producers()).await?;
    handlers.start_handlers().await;
    match command {
        Command::Run => run_server(services, config).await,
        Command::GenerateInvoices => {
            let report = services.commission.generate_invoices().await?;
            println!("{} invoices generated", report.created.len());
            for invoice in &report.created {
                println!(
                    "  #{:<6} tenant #{:<6} {} orders, {} XMR due by {}",
                    invoice.id, invoice.tenant_id, invoice.order_count, invoice.commission_due, invoice.due_date
                );
            }
            for (tenant_id, reason) in &report.failures {
                println!("  tenant #{tenant_id} skipped: {reason}");
            }
            Ok(())
        },
        Command::ProcessOverdue => {
            let report = services.commission.process_overdue_invoices().await?;
            let json = serde_json::to_string_pretty(&report).map_err(|e| ServerError::BackendError(e.to_string()))?;
            println!("{json}");
            Ok(())
        },
        Command::CheckSwaps => {
            let report = services.orders.process_pending_swaps().await?;
            println!("{report}");
            Ok(())
        },
        Command::WaiveInvoice { id, reason } => {
            let invoice = services.commission.waive_invoice(id, &reason).await?;
            println!("Invoice #{} is now {}", invoice.id, invoice.status);
            Ok(())
        },
        Command::ShowEnv => {
            crate::cli::display_envs();
            Ok(())
        },
    }
}

/// Runs the reconciliation scheduler until the process receives Ctrl-C.
pub async fn run_server(services: Services, config: ServerConfig) -> Result<(), ServerError> {
    let scheduler = ReconciliationScheduler::start(&services, &config.schedule, config.unpaid_order_timeout);
    info!("🚀️ Settlement server running with {} jobs. Press Ctrl-C to stop.", scheduler.job_count());
    tokio::signal::ctrl_c().await?;
    scheduler.shutdown().await;
    Ok(())
}

fn logging_hooks() -> EventHooks {
    let mut hooks = EventHooks::default();
    hooks
        .on_order_paid(|ev| {
            Box::pin(async move {
                info!("📬️ Order #{} for tenant #{} has been paid", ev.order.id, ev.order.tenant_id);
            })
        })
        .on_order_annulled(|ev| {
            Box::pin(async move {
                info!("📬️ Order #{} for tenant #{} is {}", ev.order.id, ev.order.tenant_id, ev.status);
            })
        })
        .on_tenant_deactivated(|ev| {
            Box::pin(async move {
                warn!(
                    "📬️ Tenant #{} has been {} for non-payment of invoice #{}",
                    ev.tenant_id,
                    ev.tier.to_string().to_lowercase(),
                    ev.invoice_id
                );
            })
        });
    hooks
}
