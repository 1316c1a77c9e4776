//! ISO 4217 currency codes.

/// Active ISO 4217 alphabetic codes, sorted.
///
/// Mirrors ISO 4217 List One as of 2025: `SLL` and `ZWL` are withdrawn,
/// `ZWG` and `XCG` are in. Update alongside ISO amendments.
pub const ISO_4217_CODES: &[&str] = &[
    "AED", "AFN", "ALL", "AMD", "ANG", "AOA", "ARS", "AUD", "AWG", "AZN", "BAM", "BBD", "BDT",
    "BGN", "BHD", "BIF", "BMD", "BND", "BOB", "BOV", "BRL", "BSD", "BTN", "BWP", "BYN", "BZD",
    "CAD", "CDF", "CHE", "CHF", "CHW", "CLF", "CLP", "CNY", "COP", "COU", "CRC", "CUC", "CUP",
    "CVE", "CZK", "DJF", "DKK", "DOP", "DZD", "EGP", "ERN", "ETB", "EUR", "FJD", "FKP", "GBP",
    "GEL", "GHS", "GIP", "GMD", "GNF", "GTQ", "GYD", "HKD", "HNL", "HTG", "HUF", "IDR", "ILS",
    "INR", "IQD", "IRR", "ISK", "JMD", "JOD", "JPY", "KES", "KGS", "KHR", "KMF", "KPW", "KRW",
    "KWD", "KYD", "KZT", "LAK", "LBP", "LKR", "LRD", "LSL", "LYD", "MAD", "MDL", "MGA", "MKD",
    "MMK", "MNT", "MOP", "MRU", "MUR", "MVR", "MWK", "MXN", "MXV", "MYR", "MZN", "NAD", "NGN",
    "NIO", "NOK", "NPR", "NZD", "OMR", "PAB", "PEN", "PGK", "PHP", "PKR", "PLN", "PYG", "QAR",
    "RON", "RSD", "RUB", "RWF", "SAR", "SBD", "SCR", "SDG", "SEK", "SGD", "SHP", "SLE", "SOS",
    "SRD", "SSP", "STN", "SVC", "SYP", "SZL", "THB", "TJS", "TMT", "TND", "TOP", "TRY", "TTD",
    "TWD", "TZS", "UAH", "UGX", "USD", "USN", "UYI", "UYU", "UYW", "UZS", "VED", "VES", "VND",
    "VUV", "WST", "XAF", "XAG", "XAU", "XBA", "XBB", "XBC", "XBD", "XCD", "XCG", "XDR", "XOF",
    "XPD", "XPF", "XPT", "XSU", "XTS", "XUA", "XXX", "YER", "ZAR", "ZMW", "ZWG",
];

/// Returns true if `code` is an active ISO 4217 code (case-sensitive, upper).
pub fn is_iso4217(code: &str) -> bool {
    ISO_4217_CODES.binary_search(&code).is_ok()
}

/// Upper-cases and validates a currency code, falling back to `default`.
pub fn normalize_currency(input: &str, default: &str) -> String {
    let candidate = input.trim().to_ascii_uppercase();
    if is_iso4217(&candidate) {
        candidate
    } else {
        tracing::info!(
            currency = input,
            fallback = default,
            "Currency is not a valid ISO 4217 code, using default"
        );
        default.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test]
    fn test_codes_are_sorted_for_lookup() {
        assert!(ISO_4217_CODES.windows(2).all(|w| w[0] < w[1]));
    }

    #[test_case("eur", "EUR")]
    #[test_case(" gbp ", "GBP")]
    #[test_case("USD", "USD")]
    #[test_case("zwg", "ZWG")]
    #[test_case("ZWL", "USD"; "withdrawn code")]
    #[test_case("xyz", "USD")]
    #[test_case("", "USD")]
    fn test_normalize_currency(input: &str, expected: &str) {
        assert_eq!(normalize_currency(input, "USD"), expected);
    }
}
