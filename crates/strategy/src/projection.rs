//! Growth projections from a monthly close series.

use serde::Serialize;

/// Simple CAGR over a monthly close series: `(last / first)^(1 / years) - 1`
/// with `years = (n - 1) / 12`.
///
/// `None` with fewer than two closes or a non-positive first close.
pub fn cagr(monthly_closes: &[f64]) -> Option<f64> {
    let (&first, &last) = (monthly_closes.first()?, monthly_closes.last()?);
    if monthly_closes.len() < 2 || first <= 0.0 || last < 0.0 {
        return None;
    }
    let years = (monthly_closes.len() - 1) as f64 / 12.0;
    let rate = (last / first).powf(1.0 / years) - 1.0;
    rate.is_finite().then_some(rate)
}

/// Monthly rate equivalent to an annual `cagr`.
pub fn avg_monthly_return(cagr: f64) -> f64 {
    (1.0 + cagr).powf(1.0 / 12.0) - 1.0
}

/// Gain on `amount` after `months` of compounding at `cagr`.
pub fn projected_gain(amount: f64, cagr: f64, months: u32) -> f64 {
    amount * ((1.0 + cagr).powf(months as f64 / 12.0) - 1.0)
}

/// Gains for holding periods of 1..=12 months and 5 years.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectionSchedule {
    pub amount: f64,
    pub cagr: f64,
    /// `monthly[i]` is the gain after `i + 1` months.
    pub monthly: [f64; 12],
    pub five_year: f64,
}

impl ProjectionSchedule {
    pub fn new(amount: f64, cagr: f64) -> Self {
        let mut monthly = [0.0; 12];
        for (i, gain) in monthly.iter_mut().enumerate() {
            *gain = projected_gain(amount, cagr, i as u32 + 1);
        }
        Self {
            amount,
            cagr,
            monthly,
            five_year: projected_gain(amount, cagr, 60),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn doubling_over_one_year() {
        // 13 monthly closes span exactly 12 months.
        let mut closes = vec![100.0; 12];
        closes.push(200.0);
        assert!(approx(cagr(&closes).unwrap(), 1.0));
    }

    #[test]
    fn cagr_needs_two_points_and_positive_start() {
        assert_eq!(cagr(&[]), None);
        assert_eq!(cagr(&[10.0]), None);
        assert_eq!(cagr(&[0.0, 10.0]), None);
    }

    #[test]
    fn monthly_rate_compounds_back_to_annual() {
        let m = avg_monthly_return(0.12);
        assert!(approx((1.0 + m).powi(12) - 1.0, 0.12));
    }

    #[test]
    fn schedule_twelfth_month_equals_annual_gain() {
        let s = ProjectionSchedule::new(1_000.0, 0.1);
        assert!(approx(s.monthly[11], 100.0));
        assert!(approx(s.five_year, 1_000.0 * (1.1f64.powi(5) - 1.0)));
        assert!(s.monthly.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn negative_cagr_projects_losses() {
        assert!(projected_gain(500.0, -0.2, 12) < 0.0);
    }
}
