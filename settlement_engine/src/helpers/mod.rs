mod address_cipher;
mod address_format;
mod payment_id;

pub use address_cipher::{decrypt_address, encrypt_address, generate_tenant_key, CipherError};
pub use address_format::{is_plausible_deposit_address, mock_deposit_address};
pub use payment_id::{random_hex, random_payment_id};
