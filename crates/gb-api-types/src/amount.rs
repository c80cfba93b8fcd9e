//! Conversion between human NEAR decimals and yoctoNEAR integers.

use thiserror::Error;

/// Decimal places between NEAR and yoctoNEAR.
pub const NEAR_NOMINATION_EXP: usize = 24;

pub const NEAR_NOMINATION: u128 = 1_000_000_000_000_000_000_000_000;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AmountError {
    #[error("amount is empty")]
    Empty,
    #[error("amount `{0}` is not a decimal number")]
    Malformed(String),
    #[error("amount `{0}` has more than 24 fractional digits")]
    TooPrecise(String),
    #[error("amount `{0}` does not fit in yoctoNEAR")]
    Overflow(String),
}

/// Parses a human decimal such as `"1.5"` or `"1,000"` into yoctoNEAR.
pub fn parse_near_amount(input: &str) -> Result<u128, AmountError> {
    let cleaned: String = input.trim().chars().filter(|c| *c != ',').collect();
    if cleaned.is_empty() {
        return Err(AmountError::Empty);
    }

    let mut parts = cleaned.split('.');
    let whole = parts.next().unwrap_or_default();
    let fraction = parts.next().unwrap_or_default();
    if parts.next().is_some() || (whole.is_empty() && fraction.is_empty()) {
        return Err(AmountError::Malformed(input.to_owned()));
    }

    let all_digits = |s: &str| s.bytes().all(|b| b.is_ascii_digit());
    if !all_digits(whole) || !all_digits(fraction) {
        return Err(AmountError::Malformed(input.to_owned()));
    }
    if fraction.len() > NEAR_NOMINATION_EXP {
        return Err(AmountError::TooPrecise(input.to_owned()));
    }

    let combined = format!("{whole}{fraction:0<width$}", width = NEAR_NOMINATION_EXP);
    let digits = combined.trim_start_matches('0');
    if digits.is_empty() {
        return Ok(0);
    }

    digits
        .parse::<u128>()
        .map_err(|_| AmountError::Overflow(input.to_owned()))
}

/// Renders yoctoNEAR as a human decimal, rounded half-up to `frac_digits`.
pub fn format_near_amount(yocto: u128, frac_digits: usize) -> String {
    let frac_digits = frac_digits.min(NEAR_NOMINATION_EXP);
    let mut balance = yocto;

    if frac_digits < NEAR_NOMINATION_EXP {
        let rounding_exp = (NEAR_NOMINATION_EXP - frac_digits - 1) as u32;
        balance = balance.saturating_add(5 * 10_u128.pow(rounding_exp));
    }

    let whole = balance / NEAR_NOMINATION;
    let fraction = format!(
        "{:0>width$}",
        balance % NEAR_NOMINATION,
        width = NEAR_NOMINATION_EXP
    );
    let fraction = fraction[..frac_digits].trim_end_matches('0');

    let whole = group_thousands(&whole.to_string());
    if fraction.is_empty() {
        whole
    } else {
        format!("{whole}.{fraction}")
    }
}

fn group_thousands(digits: &str) -> String {
    let mut output = String::with_capacity(digits.len() + digits.len() / 3);
    for (index, ch) in digits.chars().enumerate() {
        if index > 0 && (digits.len() - index) % 3 == 0 {
            output.push(',');
        }
        output.push(ch);
    }
    output
}
