/// Decimals used by the $BUD and $TERP assets.
pub const TOKEN_DECIMALS: u32 = 6;

pub fn format_cooldown(seconds: u64) -> String {
    if seconds == 0 {
        return "Ready".to_string();
    }
    let hours = seconds / 3600;
    let minutes = (seconds % 3600) / 60;
    if hours > 0 {
        format!("{hours}h {minutes}m")
    } else {
        format!("{minutes}m")
    }
}

/// Renders a raw token amount with two decimals and thousands separators.
///
/// A `u64` holds at most 20 digits, so any `decimals` beyond that renders as
/// `0.00`.
pub fn format_token_amount(raw: u64, decimals: u32) -> String {
    let Some(scale) = 10u128.checked_pow(decimals) else {
        return "0.00".to_string();
    };
    // hundredths, rounded half up
    let cents = (u128::from(raw) * 100 + scale / 2) / scale;
    let whole = cents / 100;
    let fraction = cents % 100;
    format!("{}.{fraction:02}", group_thousands(whole))
}

fn group_thousands(value: u128) -> String {
    let digits = value.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
