use chrono::{DateTime, Duration, Local, NaiveDate, NaiveTime, Utc};

/// Calendar boundary for the sequencing core. All due-date math goes
/// through this trait so tests can pin the current day.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    fn today(&self) -> NaiveDate;

    /// Calendar day an instant falls on, in the clock's reporting zone.
    fn day_of(&self, at: DateTime<Utc>) -> NaiveDate;

    fn is_due_or_past(&self, date: NaiveDate) -> bool {
        date <= self.today()
    }

    /// True when `at` falls within the trailing `days`-day window ending
    /// today, inclusive of today.
    fn within_trailing_days(&self, at: DateTime<Utc>, days: i64) -> bool {
        let day = self.day_of(at);
        let today = self.today();
        day <= today && day > today - Duration::days(days)
    }
}

pub fn add_days(date: NaiveDate, days: i64) -> NaiveDate {
    date + Duration::days(days)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }

    fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.with_timezone(&Local).date_naive()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    now: DateTime<Utc>,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            now: today.and_time(NaiveTime::MIN).and_utc(),
        }
    }

    pub fn at(now: DateTime<Utc>) -> Self {
        Self { now }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.now
    }

    fn today(&self) -> NaiveDate {
        self.now.date_naive()
    }

    fn day_of(&self, at: DateTime<Utc>) -> NaiveDate {
        at.date_naive()
    }
}
