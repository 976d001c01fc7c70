use crate::types::BucketRow;
use crate::util::{ratio_or_zero, round2};

/// Bucket table with `Costo mm` filled in, plus the line-level figures.
#[derive(Debug, Clone, PartialEq)]
pub struct Allocation {
    pub buckets: Vec<BucketRow>,
    /// Sum of bucket `mm_total`, rounded to two decimals.
    pub mm_total: f64,
    pub global_cost_per_mm: f64,
    /// `reference_cost - global_cost_per_mm`; positive when the reference is higher.
    pub margin: f64,
}

/// Each line's share of the combined perforation count. All zero when nothing
/// was perforated.
pub fn traffic_shares(totals: &[f64]) -> Vec<f64> {
    let grand: f64 = totals.iter().sum();
    totals.iter().map(|t| ratio_or_zero(*t, grand)).collect()
}

/// Spread `monthly_budget` over the bands by perforation share and divide by
/// each band's thickness span. Zero denominators yield a zero cost.
pub fn allocate(
    mut buckets: Vec<BucketRow>,
    total_perforations: f64,
    monthly_budget: f64,
    traffic_share: f64,
    reference_cost: f64,
) -> Allocation {
    for b in &mut buckets {
        let share = ratio_or_zero(b.perforations, total_perforations);
        b.cost_per_mm = round2(ratio_or_zero(share * monthly_budget, b.mm_total));
    }
    let mm_total = round2(buckets.iter().map(|b| b.mm_total).sum());
    let global_cost_per_mm = round2(ratio_or_zero(monthly_budget * traffic_share, mm_total));
    Allocation {
        buckets,
        mm_total,
        global_cost_per_mm,
        margin: reference_cost - global_cost_per_mm,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn bucket(label: &str, perforations: f64, mm_total: f64) -> BucketRow {
        BucketRow {
            label: label.to_string(),
            rows: 1,
            kg: 0.0,
            tiempo: 0.0,
            tiempo_seteo: 0.0,
            placas: 0.0,
            process_minutes: 0.0,
            mm_total,
            perforations,
            cost_per_mm: 0.0,
        }
    }

    #[test]
    fn allocates_budget_per_band() {
        let buckets = vec![bucket("<= 20", 6.0, 90.0), bucket("> 20", 4.0, 160.0)];
        let a = allocate(buckets, 10.0, 1_000_000.0, 1.0, 160.0);
        assert_eq!(a.buckets[0].cost_per_mm, 6666.67);
        assert_eq!(a.buckets[1].cost_per_mm, 2500.0);
        assert_eq!(a.mm_total, 250.0);
        assert_eq!(a.global_cost_per_mm, 4000.0);
        assert_eq!(a.margin, 160.0 - 4000.0);
    }

    #[test]
    fn zero_span_gives_zero_cost() {
        let buckets = vec![bucket("<= 12", 5.0, 0.0), bucket("> 12", 0.0, 0.0)];
        let a = allocate(buckets, 5.0, 1_000_000.0, 0.5, 160.0);
        assert!(a.buckets.iter().all(|b| b.cost_per_mm == 0.0));
        assert_eq!(a.global_cost_per_mm, 0.0);
        assert_eq!(a.margin, 160.0);
    }

    #[test]
    fn no_perforations_is_a_well_formed_result() {
        let buckets = vec![bucket("<= 12", 0.0, 0.0), bucket("> 12", 0.0, 0.0)];
        let a = allocate(buckets, 0.0, 15_000_000.0, 0.0, 160.0);
        assert!(a.buckets.iter().all(|b| b.cost_per_mm == 0.0 && b.cost_per_mm.is_finite()));
        assert_eq!(a.global_cost_per_mm, 0.0);
    }

    #[test]
    fn traffic_shares_sum_to_one() {
        let shares = traffic_shares(&[1234.0, 766.0]);
        assert_abs_diff_eq!(shares.iter().sum::<f64>(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(shares[0], 0.617, epsilon = 1e-12);
    }

    #[test]
    fn traffic_shares_are_zero_without_perforations() {
        assert_eq!(traffic_shares(&[0.0, 0.0]), vec![0.0, 0.0]);
    }
}
