use chrono::{DateTime, Utc};

/// Returns "$123.45". Negative amounts keep their sign ("$-1.50").
pub fn format_currency(dollars: f64) -> String {
    format!("${:.2}", dollars)
}

/// Returns the record's day as "2023-11-14".
pub fn format_day(datetime: &DateTime<Utc>) -> String {
    datetime.format("%Y-%m-%d").to_string()
}

/// Returns "[█████░░░░░░░]" where the filled portion is `cost / max_cost`.
/// Width is the number of block characters inside the brackets.
pub fn format_cost_bar(cost: f64, max_cost: f64, width: usize) -> String {
    if max_cost <= 0.0 {
        return format!("[{}]", "░".repeat(width));
    }
    let ratio = (cost / max_cost).clamp(0.0, 1.0);
    let filled = (ratio * width as f64).round() as usize;
    let empty = width.saturating_sub(filled);
    format!("[{}{}]", "█".repeat(filled), "░".repeat(empty))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_currency_two_decimals() {
        assert_eq!(format_currency(123.45), "$123.45");
        assert_eq!(format_currency(5.0), "$5.00");
        assert_eq!(format_currency(0.005), "$0.01");
        assert_eq!(format_currency(0.0), "$0.00");
    }

    #[test]
    fn format_day_from_timestamp() {
        let dt = DateTime::from_timestamp(1700000000, 0).unwrap();
        assert_eq!(format_day(&dt), "2023-11-14");
    }

    #[test]
    fn format_cost_bar_scales_to_max() {
        assert_eq!(format_cost_bar(5.0, 10.0, 4), "[██░░]");
        assert_eq!(format_cost_bar(10.0, 10.0, 4), "[████]");
        assert_eq!(format_cost_bar(0.0, 10.0, 4), "[░░░░]");
    }

    #[test]
    fn format_cost_bar_clamps_overflow() {
        assert_eq!(format_cost_bar(20.0, 10.0, 4), "[████]");
        assert_eq!(format_cost_bar(-1.0, 10.0, 4), "[░░░░]");
    }

    #[test]
    fn format_cost_bar_handles_zero_max() {
        assert_eq!(format_cost_bar(0.0, 0.0, 4), "[░░░░]");
    }
}
