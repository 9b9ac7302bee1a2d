use tsg_common::{Amount, Currency, SwapOrder, SwapQuote, SwapStatus};

use crate::SwapError;

/// Quotes, creates and tracks swaps from a customer's payment coin into the reference currency.
#[allow(async_fn_in_trait)]
pub trait SwapExchange {
    async fn quote(&self, from: Currency, amount: Amount) -> Result<SwapQuote, SwapError>;

    async fn create_swap(
        &self,
        from: Currency,
        amount: Amount,
        destination: &str,
        refund: Option<&str>,
    ) -> Result<SwapOrder, SwapError>;

    /// Asks the provider named `provider` (as stored on the order) for the swap's current status.
    async fn check_status(&self, swap_id: &str, provider: &str) -> Result<SwapStatus, SwapError>;
}
