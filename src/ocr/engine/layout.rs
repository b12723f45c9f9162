/// Splits `text` into `line_count` word-aligned lines, giving each line a
/// share of the words proportional to its original pixel width.
///
/// Every line but the last takes `floor(total * round(w_i / sum(w), 2))`
/// words; the last line takes whatever is left, so no word is ever lost.
pub fn distribute_text(text: &str, line_count: usize, line_widths: &[u32]) -> Vec<String> {
    if line_count == 0 {
        return Vec::new();
    }
    let tokens: Vec<&str> = text.split_whitespace().collect();
    let total = tokens.len();
    let width_sum: u64 = (0..line_count)
        .map(|idx| line_widths.get(idx).copied().unwrap_or(0) as u64)
        .sum();

    let mut lines = Vec::with_capacity(line_count);
    let mut rest: &[&str] = &tokens;
    for idx in 0..line_count {
        if idx == line_count - 1 {
            lines.push(rest.join(" "));
            break;
        }
        let ratio = line_ratio(line_widths.get(idx).copied().unwrap_or(0), width_sum);
        let take = ((total as f64 * ratio).floor() as usize).min(rest.len());
        let (head, tail) = rest.split_at(take);
        lines.push(head.join(" "));
        rest = tail;
    }
    lines
}

fn line_ratio(width: u32, width_sum: u64) -> f64 {
    if width_sum == 0 {
        return 0.0;
    }
    round_hundredths(width as f64 / width_sum as f64)
}

/// Rounds a non-negative ratio to two decimals, half to even, deciding ties
/// on the exact binary value rather than on `value * 100`.
fn round_hundredths(value: f64) -> f64 {
    if !value.is_finite() || value <= 0.0 {
        return 0.0;
    }
    let bits = value.to_bits();
    let biased = ((bits >> 52) & 0x7ff) as i32;
    let fraction = bits & ((1u64 << 52) - 1);
    // value == mantissa * 2^exponent
    let (mantissa, exponent) = if biased == 0 {
        (fraction, -1074)
    } else {
        (fraction | (1u64 << 52), biased - 1075)
    };
    if exponent >= 0 {
        return value;
    }
    let shift = exponent.unsigned_abs();
    // mantissa * 100 < 2^60, so anything shifted this far rounds to zero
    if shift >= 120 {
        return 0.0;
    }
    let scaled = mantissa as u128 * 100;
    let whole = scaled >> shift;
    let rest = scaled & ((1u128 << shift) - 1);
    let half = 1u128 << (shift - 1);
    let rounded = if rest > half || (rest == half && whole % 2 == 1) {
        whole + 1
    } else {
        whole
    };
    rounded as f64 / 100.0
}
