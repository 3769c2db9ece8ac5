use crate::config::FilterConfig;
use crate::record::Record;

/// Domain predicates deciding which records are persisted.
///
/// The value-threshold and address-suffix checks are pure per-record
/// predicates. The periodic downsampling rule is not: it counts accepted
/// records within whatever sequential unit evaluates it, so the chunk
/// boundaries chosen by the caller change which records it drops. See
/// [`BusinessFilter::filter_chunk`].
#[derive(Debug, Clone)]
pub struct BusinessFilter {
    min_value: i64,
    excluded_suffixes: Vec<String>,
    drop_every: usize,
}

impl BusinessFilter {
    pub fn new(cfg: &FilterConfig) -> Self {
        Self {
            min_value: cfg.min_value,
            excluded_suffixes: cfg.excluded_suffixes.clone(),
            drop_every: cfg.drop_every,
        }
    }

    /// The order-independent predicates: value threshold and address-suffix
    /// exclusion. Opaque text values are not subject to the threshold.
    pub fn accepts(&self, rec: &Record) -> bool {
        if let Some(amount) = rec.value.amount() {
            if amount < self.min_value {
                return false;
            }
        }
        let address = rec.address.trim();
        !self
            .excluded_suffixes
            .iter()
            .any(|suffix| address.ends_with(suffix.as_str()))
    }

    /// Filters one contiguous chunk, applying the periodic rule with a
    /// counter local to this chunk: every `drop_every`th record that passes
    /// [`accepts`](Self::accepts) is dropped and the counter resets.
    /// Because the counter starts fresh per chunk, the worker count used to
    /// partition the input is a parameter of the filtering result.
    pub fn filter_chunk(&self, chunk: &[Record]) -> Vec<Record> {
        let mut out = Vec::new();
        let mut accepted = 0usize;
        for rec in chunk {
            if !self.accepts(rec) {
                continue;
            }
            if self.drop_every > 0 {
                accepted += 1;
                if accepted == self.drop_every {
                    accepted = 0;
                    continue;
                }
            }
            out.push(rec.clone());
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::SaleValue;
    use chrono::NaiveDate;

    fn filter(min_value: i64, suffixes: &[&str], drop_every: usize) -> BusinessFilter {
        BusinessFilter::new(&FilterConfig {
            min_value,
            excluded_suffixes: suffixes.iter().map(|s| s.to_string()).collect(),
            drop_every,
        })
    }

    fn rec(id: i64, address: &str, value: i64) -> Record {
        Record {
            id,
            address: address.into(),
            suburb: "Springfield".into(),
            date: NaiveDate::from_ymd_opt(2020, 1, 2).unwrap(),
            value: SaleValue::Amount(value),
        }
    }

    #[test]
    fn rejects_below_value_threshold() {
        let f = filter(400_000, &[], 0);
        assert!(!f.accepts(&rec(1, "10 Main ST", 399_999)));
        assert!(f.accepts(&rec(1, "10 Main ST", 400_000)));
    }

    #[test]
    fn text_values_are_not_thresholded() {
        let f = filter(400_000, &[], 0);
        let mut r = rec(1, "10 Main ST", 0);
        r.value = SaleValue::Text("whatever".into());
        assert!(f.accepts(&r));
    }

    #[test]
    fn rejects_excluded_suffix_after_trim() {
        let f = filter(0, &["AVE", "CRES", "PL"], 0);
        assert!(!f.accepts(&rec(1, "10 Main AVE  ", 500_000)));
        assert!(!f.accepts(&rec(2, "2 Ring CRES", 500_000)));
        assert!(!f.accepts(&rec(3, "9 Quiet PL", 500_000)));
        assert!(f.accepts(&rec(4, "10 Main ST", 500_000)));
        // suffix must be at the very end of the trimmed address
        assert!(f.accepts(&rec(5, "10 AVE North ST", 500_000)));
    }

    #[test]
    fn periodic_rule_drops_every_nth_accepted() {
        let f = filter(0, &[], 3);
        let chunk: Vec<Record> = (1..=7).map(|id| rec(id, "10 Main ST", 500_000)).collect();
        let ids: Vec<i64> = f.filter_chunk(&chunk).iter().map(|r| r.id).collect();
        // every 3rd accepted record is dropped, counter resets
        assert_eq!(ids, vec![1, 2, 4, 5, 7]);
    }

    #[test]
    fn periodic_counter_only_advances_on_accepted_records() {
        let f = filter(400_000, &[], 2);
        let chunk = vec![
            rec(1, "10 Main ST", 500_000),
            rec(2, "10 Main ST", 100_000), // rejected, does not advance counter
            rec(3, "10 Main ST", 500_000), // 2nd accepted: dropped
            rec(4, "10 Main ST", 500_000),
        ];
        let ids: Vec<i64> = f.filter_chunk(&chunk).iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![1, 4]);
    }

    #[test]
    fn zero_disables_periodic_rule() {
        let f = filter(0, &[], 0);
        let chunk: Vec<Record> = (1..=25).map(|id| rec(id, "10 Main ST", 500_000)).collect();
        assert_eq!(f.filter_chunk(&chunk).len(), 25);
    }
}
