//! Deterministic cron tag generation for per-tenant schedule staggering.
//!
//! Scheduling every tenant's sync at the same wall-clock time would hammer
//! both the providers and the queue at once. Instead each tenant gets a
//! stable pseudo-random time-of-day derived from its identifier: the sum of
//! the identifier's character codes, reduced modulo 60 for the minute and
//! modulo 24 for the hour. Collisions across tenants are expected and fine.

/// A tenant-specific wall-clock "minute hour" pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CronTag {
    pub minute: u32,
    pub hour: u32,
}

impl CronTag {
    /// Render as a five-field daily cron expression.
    pub fn daily_expression(&self) -> String {
        format!("{} {} * * *", self.minute, self.hour)
    }
}

fn char_code_sum(id: &str) -> u32 {
    id.chars().fold(0u32, |acc, c| acc.wrapping_add(c as u32))
}

/// Derive the daily sync time for a tenant. Total and deterministic.
pub fn daily_tag(tenant_id: &str) -> CronTag {
    let sum = char_code_sum(tenant_id);
    CronTag {
        minute: sum % 60,
        hour: sum % 24,
    }
}

/// Derive a minute-only stagger for workloads on a fixed every-6-hours
/// cadence, rendered directly as a cron expression.
pub fn six_hourly_expression(tenant_id: &str) -> String {
    let minute = char_code_sum(tenant_id) % 60;
    format!("{} */6 * * *", minute)
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_daily_tag_deterministic() {
        let id = "b3b5c2a0-9b3e-4f6e-8f2a-1c9d1e2f3a4b";
        assert_eq!(daily_tag(id), daily_tag(id));
    }

    #[test]
    fn test_daily_tag_in_range() {
        for _ in 0..200 {
            let tag = daily_tag(&Uuid::new_v4().to_string());
            assert!(tag.minute < 60);
            assert!(tag.hour < 24);
        }
    }

    #[test]
    fn test_daily_expression_format() {
        let tag = CronTag { minute: 7, hour: 19 };
        assert_eq!(tag.daily_expression(), "7 19 * * *");
    }

    #[test]
    fn test_six_hourly_expression_format() {
        let expr = six_hourly_expression("tenant-a");
        let minute: u32 = expr.split(' ').next().unwrap().parse().unwrap();
        assert!(minute < 60);
        assert!(expr.ends_with(" */6 * * *"));
    }

    #[test]
    fn test_six_hourly_matches_daily_minute() {
        let id = "3f2c9d8e-1a2b-4c3d-9e8f-7a6b5c4d3e2f";
        let tag = daily_tag(id);
        assert!(six_hourly_expression(id).starts_with(&format!("{} ", tag.minute)));
    }

    #[test]
    fn test_rough_uniformity_over_sample() {
        // Not cryptographic spread: just check a large sample touches most
        // hour buckets and no single bucket dominates.
        let mut hour_counts = [0usize; 24];
        let n = 2000;
        for _ in 0..n {
            let tag = daily_tag(&Uuid::new_v4().to_string());
            hour_counts[tag.hour as usize] += 1;
        }
        let populated = hour_counts.iter().filter(|&&c| c > 0).count();
        assert!(populated >= 20, "only {} hour buckets populated", populated);
        let max = *hour_counts.iter().max().unwrap();
        assert!(max < n / 4, "one hour bucket holds {} of {}", max, n);
    }

    #[test]
    fn test_empty_identifier_is_total() {
        let tag = daily_tag("");
        assert_eq!(tag.minute, 0);
        assert_eq!(tag.hour, 0);
    }
}
