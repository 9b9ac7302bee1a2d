use regex::Regex;
use tsg_common::Currency;

use crate::helpers::random_hex;

fn deposit_address_pattern(currency: Currency) -> Option<&'static str> {
    match currency {
        Currency::Btc => Some(r"^(bc1|[13])[a-zA-Z0-9]{25,87}$"),
        Currency::Ltc => Some(r"^(ltc1|[LM3])[a-zA-Z0-9]{25,87}$"),
        Currency::Eth | Currency::Usdt | Currency::Usdc => Some(r"^0x[0-9a-fA-F]{40}$"),
        Currency::Sol => Some(r"^[0-9A-Za-z]{32,64}$"),
        Currency::Xmr => Some(r"^[0-9A-Za-z]{95,106}$"),
        _ => None,
    }
}

/// A syntactic check on a deposit address returned by a swap provider. This does not validate checksums; it only
/// rejects responses that are obviously not an address for the paying coin.
pub fn is_plausible_deposit_address(currency: Currency, address: &str) -> bool {
    deposit_address_pattern(currency)
        .and_then(|p| Regex::new(p).ok())
        .map(|re| re.is_match(address.trim()))
        .unwrap_or(false)
}

/// A random address in the right shape for `currency`, used by the test-mode swap provider.
pub fn mock_deposit_address(currency: Currency) -> String {
    match currency {
        Currency::Btc => format!("bc1qtest{}", random_hex(16)),
        Currency::Ltc => format!("ltc1qtest{}", random_hex(16)),
        Currency::Eth | Currency::Usdt | Currency::Usdc => format!("0x{}", random_hex(20)),
        Currency::Sol => random_hex(32),
        _ => "mock_address".to_string(),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn plausible_addresses() {
        assert!(is_plausible_deposit_address(Currency::Btc, "bc1qar0srrr7xfkvy5l643lydnw9re59gtzzwf5mdq"));
        assert!(is_plausible_deposit_address(Currency::Btc, "1BvBMSEYstWetqTFn5Au4m4GFg7xJaNVN2"));
        assert!(!is_plausible_deposit_address(Currency::Btc, "0x52908400098527886E0F7030069857D2E4169EE7"));
        assert!(is_plausible_deposit_address(Currency::Eth, "0x52908400098527886E0F7030069857D2E4169EE7"));
        assert!(!is_plausible_deposit_address(Currency::Eth, "0x5290"));
        assert!(is_plausible_deposit_address(Currency::Ltc, "ltc1qg82tzd7vjh9nhvksx0q6t6cv3kzw8g2ah8q6mu"));
        assert!(!is_plausible_deposit_address(Currency::Sol, ""));
        assert!(!is_plausible_deposit_address(Currency::Usd, "anything"));
    }

    #[test]
    fn mock_addresses_look_real() {
        for coin in [Currency::Btc, Currency::Eth, Currency::Sol, Currency::Ltc, Currency::Usdt, Currency::Usdc] {
            let address = mock_deposit_address(coin);
            assert!(is_plausible_deposit_address(coin, &address), "{coin}: {address}");
        }
    }
}
