use chrono::{DateTime, NaiveDate, Utc};

pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Calendar day used for daily quotas.
pub fn today_utc() -> NaiveDate {
    now().date_naive()
}
