use exchange_tools::MoneroWalletRpc;
use thiserror::Error;
use tsg_common::Amount;

#[derive(Debug, Clone, Error)]
#[error("Could not read payments from the wallet: {0}")]
pub struct PaymentReceiptError(pub String);

/// Reports the total received by the platform wallet against a payment id.
#[allow(async_fn_in_trait)]
pub trait PaymentReceipts {
    async fn received_for_payment_id(&self, payment_id: &str) -> Result<Amount, PaymentReceiptError>;
}

impl PaymentReceipts for MoneroWalletRpc {
    async fn received_for_payment_id(&self, payment_id: &str) -> Result<Amount, PaymentReceiptError> {
        MoneroWalletRpc::received_for_payment_id(self, payment_id).await.map_err(|e| PaymentReceiptError(e.to_string()))
    }
}
