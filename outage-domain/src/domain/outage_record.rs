/// Outage counts for one geographic area at the time of a scrape.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct OutageRecord {
    /// Granularity of `area`, e.g. `county` or `zip_code`. Used as the tag key.
    pub level: String,
    pub area: String,
    pub customers_affected: u64,
    pub customers_served: u64,
}

impl OutageRecord {
    /// Share of served customers that are without power, in percent.
    ///
    /// Zero when nobody is affected or nobody is served.
    pub fn percentage_affected(&self) -> f64 {
        if self.customers_affected == 0 || self.customers_served == 0 {
            return 0.0;
        }
        self.customers_affected as f64 * 100.0 / self.customers_served as f64
    }

    /// `level:area`, the tag attached to every metric derived from this record.
    pub fn area_tag(&self) -> String {
        format!("{}:{}", self.level, self.area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(affected: u64, served: u64) -> OutageRecord {
        OutageRecord {
            level: "area".to_string(),
            area: "Detroit".to_string(),
            customers_affected: affected,
            customers_served: served,
        }
    }

    #[test]
    fn percentage_is_affected_over_served() {
        assert_eq!(record(150, 2000).percentage_affected(), 7.5);
    }

    #[test]
    fn whole_percentages_are_exact() {
        assert_eq!(record(7, 100).percentage_affected(), 7.0);
        assert_eq!(record(29, 100).percentage_affected(), 29.0);
        assert_eq!(record(1, 3).percentage_affected(), 100.0 / 3.0);
    }

    #[test]
    fn percentage_is_zero_without_affected_customers() {
        let p = record(0, 0).percentage_affected();
        assert_eq!(p, 0.0);
        assert!(!p.is_nan());
        assert_eq!(record(0, 500).percentage_affected(), 0.0);
    }

    #[test]
    fn percentage_is_zero_when_served_count_is_missing() {
        assert_eq!(record(12, 0).percentage_affected(), 0.0);
    }

    #[test]
    fn area_tag_joins_level_and_area() {
        assert_eq!(record(1, 1).area_tag(), "area:Detroit");
    }

    #[cfg(feature = "serde")]
    #[test]
    fn serializes_with_field_names() {
        let json = serde_json::to_value(record(150, 2000)).unwrap();
        assert_eq!(json["customers_affected"], 150);
        assert_eq!(json["level"], "area");
    }
}
