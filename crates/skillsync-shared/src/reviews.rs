//! Aggregate statistics shown next to a product's reviews.

use serde::{Deserialize, Serialize};

/// Lowest accepted star rating.
pub const MIN_RATING: u8 = 1;
/// Highest accepted star rating.
pub const MAX_RATING: u8 = 5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ReviewStats {
    /// Number of valid ratings counted.
    pub count: u32,
    /// Mean rating rounded to one decimal, 0.0 without ratings.
    pub average: f64,
    /// `distribution[i]` is the number of `i + 1` star ratings.
    pub distribution: [u32; 5],
}

impl ReviewStats {
    /// Aggregate raw star ratings. Ratings outside `1..=5` are skipped.
    pub fn from_ratings(ratings: &[u8]) -> Self {
        let mut stats = Self::default();
        let mut total: u64 = 0;

        for &rating in ratings {
            if !(MIN_RATING..=MAX_RATING).contains(&rating) {
                continue;
            }
            stats.count += 1;
            stats.distribution[(rating - 1) as usize] += 1;
            total += rating as u64;
        }

        if stats.count > 0 {
            let mean = total as f64 / stats.count as f64;
            stats.average = (mean * 10.0).round() / 10.0;
        }

        stats
    }

    /// Share of ratings with `stars` stars, as a whole percentage.
    pub fn percentage(&self, stars: u8) -> u32 {
        if self.count == 0 || !(MIN_RATING..=MAX_RATING).contains(&stars) {
            return 0;
        }
        let n = self.distribution[(stars - 1) as usize] as f64;
        (n / self.count as f64 * 100.0).round() as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_ratings() {
        let stats = ReviewStats::from_ratings(&[]);
        assert_eq!(stats.count, 0);
        assert_eq!(stats.average, 0.0);
        assert_eq!(stats.percentage(5), 0);
    }

    #[test]
    fn average_is_rounded_to_one_decimal() {
        let stats = ReviewStats::from_ratings(&[5, 4, 4]);
        assert_eq!(stats.count, 3);
        assert_eq!(stats.average, 4.3);
        assert_eq!(stats.distribution, [0, 0, 0, 2, 1]);
    }

    #[test]
    fn out_of_range_ratings_are_ignored() {
        let stats = ReviewStats::from_ratings(&[0, 6, 3, 5]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.average, 4.0);
    }

    #[test]
    fn percentage_per_star() {
        let stats = ReviewStats::from_ratings(&[5, 5, 5, 1]);
        assert_eq!(stats.percentage(5), 75);
        assert_eq!(stats.percentage(1), 25);
        assert_eq!(stats.percentage(3), 0);
        assert_eq!(stats.percentage(9), 0);
    }
}
