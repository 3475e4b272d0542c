//! Market session classification and refresh cadence selection.
//!
//! The oracle is a pure function of wall-clock time: it converts an instant
//! into the exchange's local time, classifies the session, and derives the
//! refresh interval the rest of the subsystem should use. It holds no
//! mutable state, so it is freely shareable across threads.
//!
//! Holiday handling is the simplified fixed-date table the service has
//! always used (New Year's Day, Independence Day, Christmas) plus the
//! weekend-observation shifts. Floating holidays are not modeled.

use std::collections::HashSet;
use std::time::Duration;

use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, TimeZone, Utc, Weekday};
use chrono_tz::Tz;
use lazy_static::lazy_static;
use log::warn;

lazy_static! {
    static ref MARKET_OPEN: NaiveTime = NaiveTime::from_hms_opt(9, 30, 0).unwrap();
    static ref MARKET_CLOSE: NaiveTime = NaiveTime::from_hms_opt(16, 0, 0).unwrap();
    static ref PRE_MARKET_OPEN: NaiveTime = NaiveTime::from_hms_opt(4, 0, 0).unwrap();
    static ref AFTER_HOURS_CLOSE: NaiveTime = NaiveTime::from_hms_opt(20, 0, 0).unwrap();

    /// Fixed-date US market holidays as (month, day).
    static ref FIXED_HOLIDAYS: HashSet<(u32, u32)> =
        [(1, 1), (7, 4), (12, 25)].into_iter().collect();
}

/// Refresh cadence during regular trading hours.
const REGULAR_REFRESH: Duration = Duration::from_secs(60);
/// Refresh cadence during pre-market and after-hours sessions.
const EXTENDED_REFRESH: Duration = Duration::from_secs(5 * 60);
/// Refresh cadence while the market is closed.
const CLOSED_REFRESH: Duration = Duration::from_secs(15 * 60);

/// Trading session classification.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum MarketSession {
    /// Pre-market trading (04:00 to open on a trading day).
    PreMarket,
    /// Regular trading hours (09:30 to 16:00 on a trading day).
    Regular,
    /// After-hours trading (close to 20:00 on a trading day).
    AfterHours,
    /// Nights, weekends, and holidays.
    Closed,
}

impl std::fmt::Display for MarketSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::PreMarket => write!(f, "PreMarket"),
            Self::Regular => write!(f, "Regular"),
            Self::AfterHours => write!(f, "AfterHours"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Classifies instants into market sessions for a single exchange timezone.
#[derive(Clone, Debug)]
pub struct MarketHoursOracle {
    timezone: Tz,
}

impl MarketHoursOracle {
    /// Create an oracle for the given exchange timezone.
    pub fn new(timezone: Tz) -> Self {
        Self { timezone }
    }

    /// Create an oracle from an IANA timezone name, falling back to
    /// `America/New_York` when the name does not parse.
    pub fn from_timezone_name(name: &str) -> Self {
        match name.parse::<Tz>() {
            Ok(tz) => Self::new(tz),
            Err(_) => {
                warn!("Unknown market timezone '{}', using America/New_York", name);
                Self::new(chrono_tz::America::New_York)
            }
        }
    }

    /// Classify the session at a specific instant.
    pub fn session_at(&self, instant: DateTime<Utc>) -> MarketSession {
        let local = instant.with_timezone(&self.timezone);
        let date = local.date_naive();
        let time = local.time();

        if !self.is_trading_day(date) {
            return MarketSession::Closed;
        }

        if time >= *MARKET_OPEN && time < *MARKET_CLOSE {
            MarketSession::Regular
        } else if time >= *PRE_MARKET_OPEN && time < *MARKET_OPEN {
            MarketSession::PreMarket
        } else if time >= *MARKET_CLOSE && time < *AFTER_HOURS_CLOSE {
            MarketSession::AfterHours
        } else {
            MarketSession::Closed
        }
    }

    /// Classify the current session.
    pub fn current_session(&self) -> MarketSession {
        self.session_at(Utc::now())
    }

    /// Whether regular trading hours are in effect right now.
    pub fn is_market_open(&self) -> bool {
        self.current_session() == MarketSession::Regular
    }

    /// Whether regular trading hours are in effect at a specific instant.
    pub fn is_market_open_at(&self, instant: DateTime<Utc>) -> bool {
        self.session_at(instant) == MarketSession::Regular
    }

    /// Whether today, in exchange local time, is a trading day.
    pub fn is_trading_day_now(&self) -> bool {
        self.is_trading_day(Utc::now().with_timezone(&self.timezone).date_naive())
    }

    /// Whether the given local date is a trading day (weekday, not a holiday).
    pub fn is_trading_day(&self, date: NaiveDate) -> bool {
        !matches!(date.weekday(), Weekday::Sat | Weekday::Sun) && !self.is_holiday(date)
    }

    /// Whether the given local date is a market holiday, including
    /// weekend-observed shifts (Saturday holidays observed Friday,
    /// Sunday holidays observed Monday).
    pub fn is_holiday(&self, date: NaiveDate) -> bool {
        if FIXED_HOLIDAYS.contains(&(date.month(), date.day())) {
            return true;
        }
        FIXED_HOLIDAYS
            .iter()
            .any(|&(month, day)| Self::is_observed_on(date, month, day))
    }

    /// The next instant at which regular trading opens, at or after `from`.
    pub fn next_market_open(&self, from: DateTime<Utc>) -> DateTime<Utc> {
        let local = from.with_timezone(&self.timezone);
        let mut date = local.date_naive();
        if !(self.is_trading_day(date) && local.time() < *MARKET_OPEN) {
            date = self.next_trading_day(date);
        }
        loop {
            // 09:30 local never lands in a DST gap, but stay total anyway.
            if let Some(open) = self
                .timezone
                .from_local_datetime(&date.and_time(*MARKET_OPEN))
                .earliest()
            {
                return open.with_timezone(&Utc);
            }
            date = self.next_trading_day(date);
        }
    }

    /// How often quotes should be refreshed for the current session.
    pub fn optimal_refresh_interval(&self) -> Duration {
        self.refresh_interval_for(self.current_session())
    }

    /// How often quotes should be refreshed for a given session.
    pub fn refresh_interval_for(&self, session: MarketSession) -> Duration {
        match session {
            MarketSession::Regular => REGULAR_REFRESH,
            MarketSession::PreMarket | MarketSession::AfterHours => EXTENDED_REFRESH,
            MarketSession::Closed => CLOSED_REFRESH,
        }
    }

    fn next_trading_day(&self, date: NaiveDate) -> NaiveDate {
        let mut next = date.succ_opt().unwrap_or(date);
        while !self.is_trading_day(next) {
            next = match next.succ_opt() {
                Some(day) => day,
                None => return next,
            };
        }
        next
    }

    fn is_observed_on(date: NaiveDate, month: u32, day: u32) -> bool {
        let Some(holiday) = NaiveDate::from_ymd_opt(date.year(), month, day) else {
            return false;
        };
        match holiday.weekday() {
            Weekday::Sat => holiday.pred_opt() == Some(date),
            Weekday::Sun => holiday.succ_opt() == Some(date),
            _ => false,
        }
    }
}

impl Default for MarketHoursOracle {
    fn default() -> Self {
        Self::new(chrono_tz::America::New_York)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn oracle() -> MarketHoursOracle {
        MarketHoursOracle::default()
    }

    fn utc(y: i32, mo: u32, d: u32, h: u32, mi: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, mo, d, h, mi, 0).unwrap()
    }

    #[test]
    fn test_regular_session_midday_wednesday() {
        // 2024-01-10 was a Wednesday; 15:00 UTC is 10:00 ET.
        assert_eq!(oracle().session_at(utc(2024, 1, 10, 15, 0)), MarketSession::Regular);
        assert!(oracle().is_market_open_at(utc(2024, 1, 10, 15, 0)));
    }

    #[test]
    fn test_pre_market_session() {
        // 12:00 UTC is 07:00 ET.
        assert_eq!(oracle().session_at(utc(2024, 1, 10, 12, 0)), MarketSession::PreMarket);
    }

    #[test]
    fn test_after_hours_session() {
        // 22:00 UTC is 17:00 ET.
        assert_eq!(oracle().session_at(utc(2024, 1, 10, 22, 0)), MarketSession::AfterHours);
    }

    #[test]
    fn test_overnight_is_closed() {
        // 07:00 UTC is 02:00 ET, before pre-market.
        assert_eq!(oracle().session_at(utc(2024, 1, 10, 7, 0)), MarketSession::Closed);
    }

    #[test]
    fn test_weekend_is_closed() {
        // 2024-01-13 was a Saturday.
        assert_eq!(oracle().session_at(utc(2024, 1, 13, 15, 0)), MarketSession::Closed);
    }

    #[test]
    fn test_session_boundaries() {
        // Open boundary: 14:30 UTC is exactly 09:30 ET.
        assert_eq!(oracle().session_at(utc(2024, 1, 10, 14, 30)), MarketSession::Regular);
        // Close boundary: 21:00 UTC is exactly 16:00 ET.
        assert_eq!(oracle().session_at(utc(2024, 1, 10, 21, 0)), MarketSession::AfterHours);
    }

    #[test]
    fn test_fixed_holiday_is_closed() {
        // New Year's Day 2024 fell on a Monday.
        assert_eq!(oracle().session_at(utc(2024, 1, 1, 15, 0)), MarketSession::Closed);
        assert!(!oracle().is_trading_day(NaiveDate::from_ymd_opt(2024, 1, 1).unwrap()));
    }

    #[test]
    fn test_sunday_holiday_observed_monday() {
        // Christmas 2022 fell on a Sunday, observed Monday the 26th.
        let observed = NaiveDate::from_ymd_opt(2022, 12, 26).unwrap();
        assert!(oracle().is_holiday(observed));
        assert!(!oracle().is_trading_day(observed));
    }

    #[test]
    fn test_saturday_holiday_observed_friday() {
        // Independence Day 2026 falls on a Saturday, observed Friday the 3rd.
        let observed = NaiveDate::from_ymd_opt(2026, 7, 3).unwrap();
        assert!(oracle().is_holiday(observed));
    }

    #[test]
    fn test_plain_weekday_is_not_holiday() {
        assert!(!oracle().is_holiday(NaiveDate::from_ymd_opt(2024, 1, 10).unwrap()));
    }

    #[test]
    fn test_refresh_intervals_per_session() {
        let oracle = oracle();
        assert_eq!(
            oracle.refresh_interval_for(MarketSession::Regular),
            Duration::from_secs(60)
        );
        assert_eq!(
            oracle.refresh_interval_for(MarketSession::PreMarket),
            Duration::from_secs(300)
        );
        assert_eq!(
            oracle.refresh_interval_for(MarketSession::AfterHours),
            Duration::from_secs(300)
        );
        assert_eq!(
            oracle.refresh_interval_for(MarketSession::Closed),
            Duration::from_secs(900)
        );
    }

    #[test]
    fn test_next_market_open_from_weekend() {
        // From Saturday 2024-01-13, the next open is Monday 09:30 ET = 14:30 UTC.
        let next = oracle().next_market_open(utc(2024, 1, 13, 12, 0));
        assert_eq!(next, utc(2024, 1, 15, 14, 30));
    }

    #[test]
    fn test_next_market_open_same_day_before_open() {
        // 12:00 UTC Wednesday is 07:00 ET, so the open is later the same day.
        let next = oracle().next_market_open(utc(2024, 1, 10, 12, 0));
        assert_eq!(next, utc(2024, 1, 10, 14, 30));
    }

    #[test]
    fn test_unknown_timezone_falls_back() {
        let oracle = MarketHoursOracle::from_timezone_name("Not/AZone");
        // Still classifies like the default Eastern-time oracle.
        assert_eq!(oracle.session_at(utc(2024, 1, 10, 15, 0)), MarketSession::Regular);
    }
}
