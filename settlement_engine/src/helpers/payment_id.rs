use rand::{thread_rng, RngCore};

/// `n` random bytes, hex-encoded.
pub fn random_hex(n: usize) -> String {
    let mut bytes = vec![0u8; n];
    thread_rng().fill_bytes(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A fresh 64-character payment id for a commission invoice.
pub fn random_payment_id() -> String {
    random_hex(32)
}
