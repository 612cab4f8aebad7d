use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

const KST_OFFSET_SECS: i32 = 9 * 3600;

/// Calendar day of a collection timestamp in the chart's home market.
///
/// Charts are fetched for the Korean storefront, so day bucketing uses KST
/// (UTC+9, no DST). If the offset cannot be constructed, the UTC day is
/// used instead.
pub fn market_day(ts: DateTime<Utc>) -> NaiveDate {
    match FixedOffset::east_opt(KST_OFFSET_SECS) {
        Some(kst) => ts.with_timezone(&kst).date_naive(),
        None => ts.date_naive(),
    }
}
