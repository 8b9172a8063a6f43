//! Price helpers shared by the storefront and subscription plans.

/// Percentage saved when paying `target` instead of `regular`.
///
/// Returns 0 whenever there is no real discount: `regular <= target`, or
/// either price is non-positive. Otherwise the rate is rounded to the nearest
/// whole percent.
pub fn discount_rate(regular: i64, target: i64) -> u32 {
    if regular <= 0 || target <= 0 || regular <= target {
        return 0;
    }

    let rate = (regular - target) as f64 / regular as f64 * 100.0;
    rate.round() as u32
}

/// Price after applying a whole-percent discount, rounded down to the unit.
pub fn apply_discount(regular: i64, percent: u32) -> i64 {
    if regular <= 0 {
        return 0;
    }
    let percent = percent.min(100) as i64;
    regular * (100 - percent) / 100
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_discount_rate_basic() {
        assert_eq!(discount_rate(1000, 800), 20);
        assert_eq!(discount_rate(3000, 1980), 34);
    }

    #[test]
    fn test_discount_rate_rounds_to_nearest() {
        // 1/3 off -> 33.33..%
        assert_eq!(discount_rate(300, 200), 33);
        // 2/3 off -> 66.66..%
        assert_eq!(discount_rate(300, 100), 67);
    }

    #[test]
    fn test_discount_rate_no_discount() {
        assert_eq!(discount_rate(800, 1000), 0);
        assert_eq!(discount_rate(1000, 1000), 0);
    }

    #[test]
    fn test_discount_rate_non_positive_inputs() {
        assert_eq!(discount_rate(0, 0), 0);
        assert_eq!(discount_rate(-1000, 800), 0);
        assert_eq!(discount_rate(1000, 0), 0);
        assert_eq!(discount_rate(1000, -5), 0);
    }

    #[test]
    fn test_apply_discount() {
        assert_eq!(apply_discount(1000, 20), 800);
        assert_eq!(apply_discount(999, 10), 899);
        assert_eq!(apply_discount(1000, 150), 0);
        assert_eq!(apply_discount(-5, 10), 0);
    }
}
