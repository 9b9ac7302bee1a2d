use std::{env, env::VarError};

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(version, about = "Order settlement and commission server for the tenant settlement gateway")]
pub struct Arguments {
    /// Defaults to `run`
    #[command(subcommand)]
    pub command: Option<Command>,
}

#[derive(Debug, Clone, PartialEq, Eq, Subcommand)]
pub enum Command {
    /// Start the reconciliation scheduler and run until interrupted
    #[clap(name = "run")]
    Run,
    /// Generate commission invoices for the week ending at the most recent midnight (UTC)
    #[clap(name = "generate-invoices")]
    GenerateInvoices,
    /// Mark unpaid invoices overdue and apply any suspensions or terminations they call for
    #[clap(name = "process-overdue")]
    ProcessOverdue,
    /// Poll every pending swap once
    #[clap(name = "check-swaps")]
    CheckSwaps,
    /// Waive a commission invoice
    #[clap(name = "waive-invoice")]
    WaiveInvoice {
        /// The invoice id
        #[arg(short, long)]
        id: i64,
        /// Recorded in the audit log
        #[arg(short, long)]
        reason: String,
    },
    /// Print the current configuration environment (secrets excluded)
    #[clap(name = "show-env")]
    ShowEnv,
}

impl Arguments {
    pub fn command(&self) -> Command {
        self.command.clone().unwrap_or(Command::Run)
    }
}

pub fn display_envs() {
    // Secrets are deliberately left off this list
    const DISPLAY_ENVS: [&str; 15] = [
        "RUST_LOG",
        "TSG_DATABASE_URL",
        "TSG_RUN_MIGRATIONS",
        "TSG_TESTNET",
        "TSG_SWAP_PROVIDERS",
        "TSG_PLATFORM_WALLET_ADDRESS",
        "TSG_COINGECKO_URL",
        "TSG_TROCADOR_URL",
        "TSG_CHANGENOW_URL",
        "TSG_PROVIDER_TIMEOUT",
        "TSG_RATE_TIMEOUT",
        "TSG_WALLET_RPC_URL",
        "TSG_SWAP_POLL_INTERVAL",
        "TSG_UNPAID_ORDER_TIMEOUT",
        "TSG_INVOICE_WEEKDAY",
    ];

    println!("Current environment values (EXCLUDING variables that contain secrets):");
    DISPLAY_ENVS.iter().for_each(|&name| {
        let val = match env::var(name) {
            Ok(s) => s,
            Err(VarError::NotPresent) => "Not set".into(),
            Err(VarError::NotUnicode(s)) => format!("Invalid value: {}", s.to_string_lossy()),
        };
        println!("  {name:<35} {val:<15}");
    })
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn default_command_is_run() {
        let args = Arguments::parse_from(["settlement_server"]);
        assert_eq!(args.command(), Command::Run);
    }

    #[test]
    fn waive_invoice_args() {
        let args =
            Arguments::parse_from(["settlement_server", "waive-invoice", "--id", "12", "--reason", "Goodwill gesture"]);
        assert_eq!(args.command(), Command::WaiveInvoice { id: 12, reason: "Goodwill gesture".into() });
    }

    #[test]
    fn waive_invoice_needs_a_reason() {
        assert!(Arguments::try_parse_from(["settlement_server", "waive-invoice", "--id", "12"]).is_err());
    }
}
