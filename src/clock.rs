use chrono::{Local, NaiveDate};

/// Source of "today" for the `*_today` entry points.
///
/// The upstream serves menus by its own calendar day (US Pacific). The
/// default [`SystemClock`] uses the process's local time zone, so hosts
/// running elsewhere should inject a clock that reports the Pacific date.
pub trait Clock {
    fn today(&self) -> NaiveDate;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Local::now().date_naive()
    }
}

/// Always reports the same day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FixedClock(pub NaiveDate);

impl Clock for FixedClock {
    fn today(&self) -> NaiveDate {
        self.0
    }
}

impl<F: Fn() -> NaiveDate> Clock for F {
    fn today(&self) -> NaiveDate {
        self()
    }
}
