//! Live payment gateways over their REST APIs (no SDK dependency)

pub mod paypal;
pub mod stripe;

pub use paypal::{PayPalAdapter, PayPalConfig};
pub use stripe::{verify_stripe_signature, StripeAdapter};

/// `1234` pence → `"12.34"`
pub fn format_minor_units(amount_pence: i64) -> String {
    let sign = if amount_pence < 0 { "-" } else { "" };
    let abs = amount_pence.unsigned_abs();
    format!("{}{}.{:02}", sign, abs / 100, abs % 100)
}

/// `"12.34"` → `1234` pence; `"12"` and `"12.3"` are accepted
pub fn parse_minor_units(value: &str) -> Option<i64> {
    let (whole, frac) = match value.split_once('.') {
        Some((w, f)) => (w, f),
        None => (value, ""),
    };
    if frac.len() > 2 {
        return None;
    }
    let whole: i64 = whole.parse().ok()?;
    let frac: i64 = if frac.is_empty() {
        0
    } else {
        format!("{:0<2}", frac).parse().ok()?
    };
    whole.checked_mul(100)?.checked_add(frac)
}
