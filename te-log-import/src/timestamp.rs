// Copyright (c) The te-log-import Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reconstruction of absolute timestamps from the time-of-day readings in a log.
//!
//! The log records `HH:MM:SS` clock readings without a date. A single anchor message carries an
//! epoch timestamp; every reading is placed on the anchor's calendar day, or on the following day
//! if it reads earlier than the anchor (the run crossed midnight).

use crate::errors::{ClockReadingError, TimestampStrategyParseError};
use chrono::{DateTime, FixedOffset, NaiveDateTime, NaiveTime, SubsecRound, TimeDelta, Timelike};
use serde::Deserialize;
use std::{fmt, str::FromStr};

/// The format of resolved timestamps in the output document.
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d %H:%M:%S";

/// How the end timestamp of a node is obtained.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TimestampStrategy {
    /// End is the resolved start plus the node's `duration`. Nodes without a duration fall back to
    /// [`Self::Direct`] for their end.
    #[default]
    Duration,

    /// The `end-ts` reading is resolved against the anchor on its own.
    Direct,
}

impl TimestampStrategy {
    /// Returns the string values accepted by [`FromStr`].
    pub fn variants() -> &'static [&'static str] {
        &["duration", "direct"]
    }
}

impl fmt::Display for TimestampStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Duration => write!(f, "duration"),
            Self::Direct => write!(f, "direct"),
        }
    }
}

impl FromStr for TimestampStrategy {
    type Err = TimestampStrategyParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "duration" => Ok(Self::Duration),
            "direct" => Ok(Self::Direct),
            other => Err(TimestampStrategyParseError::new(other)),
        }
    }
}

/// The raw clock readings of one node, collected while the log is streamed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ClockReadings {
    /// Time of day the node started.
    pub start: Option<NaiveTime>,
    /// Time of day the node ended.
    pub end: Option<NaiveTime>,
    /// Elapsed time of the node.
    pub duration: Option<TimeDelta>,
}

impl ClockReadings {
    /// Returns true if no reading was recorded.
    pub fn is_empty(&self) -> bool {
        self.start.is_none() && self.end.is_none() && self.duration.is_none()
    }
}

/// Parses a time-of-day reading such as `23:58:00`, `23:58:00.250` or `23:58:00 250` (the
/// trailing field being milliseconds).
pub fn parse_time_of_day(input: &str) -> Result<NaiveTime, ClockReadingError> {
    let err = || ClockReadingError::new("time-of-day", input.trim());
    let mut fields = input.split_whitespace();
    let clock = fields.next().ok_or_else(err)?;
    let time = NaiveTime::parse_from_str(clock, "%H:%M:%S%.f").map_err(|_| err())?;

    match fields.next() {
        None => Ok(time),
        Some(millis) if time.nanosecond() == 0 => {
            let millis: u32 = millis.parse().map_err(|_| err())?;
            if millis >= 1000 {
                return Err(err());
            }
            time.with_nanosecond(millis * 1_000_000).ok_or_else(err)
        }
        Some(_) => Err(err()),
    }
}

/// Parses an elapsed-time reading `HH:MM:SS`. Hours are not limited to a day; fractional seconds
/// and a trailing millisecond field are accepted as for [`parse_time_of_day`].
pub fn parse_elapsed(input: &str) -> Result<TimeDelta, ClockReadingError> {
    let err = || ClockReadingError::new("duration", input.trim());
    let mut fields = input.split_whitespace();
    let clock = fields.next().ok_or_else(err)?;

    let mut parts = clock.split(':');
    let (Some(hours), Some(minutes), Some(seconds), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(err());
    };

    let hours: i64 = hours.parse().map_err(|_| err())?;
    let minutes: i64 = minutes.parse().map_err(|_| err())?;
    let (seconds, fraction) = seconds.split_once('.').unwrap_or((seconds, ""));
    let seconds: i64 = seconds.parse().map_err(|_| err())?;
    if hours < 0 || !(0..60).contains(&minutes) || !(0..60).contains(&seconds) {
        return Err(err());
    }

    let mut nanos = parse_fraction(fraction).ok_or_else(err)?;
    if let Some(millis) = fields.next() {
        let millis: u32 = millis.parse().map_err(|_| err())?;
        if nanos != 0 || millis >= 1000 {
            return Err(err());
        }
        nanos = millis * 1_000_000;
    }
    if fields.next().is_some() {
        return Err(err());
    }

    hours
        .checked_mul(3600)
        .and_then(|secs| secs.checked_add(minutes * 60 + seconds))
        .and_then(TimeDelta::try_seconds)
        .and_then(|whole| whole.checked_add(&TimeDelta::nanoseconds(i64::from(nanos))))
        .ok_or_else(err)
}

fn parse_fraction(fraction: &str) -> Option<u32> {
    if fraction.is_empty() {
        return Some(0);
    }
    if fraction.len() > 9 || !fraction.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    let digits: u32 = fraction.parse().ok()?;
    Some(digits * 10u32.pow(9 - fraction.len() as u32))
}

/// The run-wide reference instant, taken from the first message carrying a `ts_val` attribute.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Anchor {
    at: NaiveDateTime,
}

impl Anchor {
    /// Creates an anchor from Unix epoch seconds, expressed as wall-clock time at `offset`.
    pub fn from_epoch(secs: i64, offset: FixedOffset) -> Option<Self> {
        let at = DateTime::from_timestamp(secs, 0)?
            .with_timezone(&offset)
            .naive_local();
        Some(Self { at })
    }

    /// Parses a `ts_val` attribute: epoch seconds, optionally with a fractional part that is
    /// ignored.
    pub fn parse_ts_val(value: &str, offset: FixedOffset) -> Option<Self> {
        let value = value.trim();
        let (secs, _) = value.split_once('.').unwrap_or((value, ""));
        Self::from_epoch(secs.parse().ok()?, offset)
    }

    /// Returns the anchor as wall-clock date and time.
    pub fn at(&self) -> NaiveDateTime {
        self.at
    }
}

/// Resolved start and end of one node.
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ResolvedSpan {
    /// Absolute start, truncated to whole seconds.
    pub start: Option<NaiveDateTime>,
    /// Absolute end, truncated to whole seconds.
    pub end: Option<NaiveDateTime>,
}

/// Turns clock readings into absolute timestamps for one run.
#[derive(Clone, Copy, Debug)]
pub struct TimestampReconciler {
    anchor: Anchor,
    strategy: TimestampStrategy,
}

impl TimestampReconciler {
    /// Creates a reconciler; the strategy applies to every node of the run.
    pub fn new(anchor: Anchor, strategy: TimestampStrategy) -> Self {
        Self { anchor, strategy }
    }

    /// Places a time-of-day reading on the anchor's day, or on the next day if it reads earlier
    /// than the anchor. The comparison is done at whole-second precision.
    pub fn resolve_clock(&self, time: NaiveTime) -> NaiveDateTime {
        let anchor_time = self.anchor.at.time().trunc_subsecs(0);
        let mut date = self.anchor.at.date();
        if time.trunc_subsecs(0) < anchor_time {
            // The only date without a successor is the maximum representable one.
            date = date.succ_opt().unwrap_or(date);
        }
        NaiveDateTime::new(date, time)
    }

    /// Resolves the readings of one node.
    pub fn resolve(&self, readings: &ClockReadings) -> ResolvedSpan {
        let start = readings.start.map(|time| self.resolve_clock(time));

        let from_duration = match (self.strategy, start, readings.duration) {
            (TimestampStrategy::Duration, Some(start), Some(duration)) => {
                start.checked_add_signed(duration)
            }
            _ => None,
        };
        let end = from_duration.or_else(|| readings.end.map(|time| self.resolve_clock(time)));

        ResolvedSpan {
            start: start.map(|ts| ts.trunc_subsecs(0)),
            end: end.map(|ts| ts.trunc_subsecs(0)),
        }
    }
}

/// Serde support for optional timestamps in [`TIMESTAMP_FORMAT`].
pub(crate) mod serde_timestamp {
    use super::TIMESTAMP_FORMAT;
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    #[expect(clippy::ref_option, reason = "serde `with` signature")]
    pub(crate) fn serialize<S>(ts: &Option<NaiveDateTime>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match ts {
            Some(ts) => serializer.collect_str(&ts.format(TIMESTAMP_FORMAT)),
            None => serializer.serialize_none(),
        }
    }

    pub(crate) fn deserialize<'de, D>(deserializer: D) -> Result<Option<NaiveDateTime>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let Some(s) = Option::<String>::deserialize(deserializer)? else {
            return Ok(None);
        };
        NaiveDateTime::parse_from_str(&s, TIMESTAMP_FORMAT)
            .map(Some)
            .map_err(|err| D::Error::custom(format!("invalid timestamp `{s}`: {err}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use test_case::test_case;

    fn utc() -> FixedOffset {
        FixedOffset::east_opt(0).expect("zero offset is valid")
    }

    fn datetime(y: i32, mo: u32, d: u32, h: u32, mi: u32, s: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .and_then(|date| date.and_hms_opt(h, mi, s))
            .expect("valid datetime")
    }

    fn time(h: u32, m: u32, s: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, s).expect("valid time")
    }

    // 2023-06-01 23:55:00 UTC
    const ANCHOR_2355: i64 = 1_685_663_700;

    fn reconciler(strategy: TimestampStrategy) -> TimestampReconciler {
        let anchor = Anchor::from_epoch(ANCHOR_2355, utc()).expect("valid epoch");
        TimestampReconciler::new(anchor, strategy)
    }

    #[test_case("23:58:00", time(23, 58, 0) ; "plain")]
    #[test_case("  00:00:01\n", time(0, 0, 1) ; "surrounding whitespace")]
    #[test_case("12:00:00.250", NaiveTime::from_hms_milli_opt(12, 0, 0, 250).unwrap() ; "fraction")]
    #[test_case("12:00:00 250", NaiveTime::from_hms_milli_opt(12, 0, 0, 250).unwrap() ; "millisecond field")]
    fn time_of_day_parses(input: &str, expected: NaiveTime) {
        assert_eq!(parse_time_of_day(input), Ok(expected));
    }

    #[test_case("" ; "empty")]
    #[test_case("24:00:00" ; "hour out of range")]
    #[test_case("12:00" ; "missing seconds")]
    #[test_case("12:00:00 2500" ; "millisecond field out of range")]
    #[test_case("12:00:00.5 250" ; "fraction and millisecond field")]
    fn time_of_day_rejects(input: &str) {
        parse_time_of_day(input).expect_err("reading is invalid");
    }

    #[test_case("00:10:00", TimeDelta::minutes(10) ; "minutes")]
    #[test_case("27:00:05", TimeDelta::hours(27) + TimeDelta::seconds(5) ; "more than a day")]
    #[test_case("00:00:01.5", TimeDelta::milliseconds(1500) ; "fraction")]
    #[test_case("00:00:01 500", TimeDelta::milliseconds(1500) ; "millisecond field")]
    fn elapsed_parses(input: &str, expected: TimeDelta) {
        assert_eq!(parse_elapsed(input), Ok(expected));
    }

    #[test_case("10:00" ; "two fields")]
    #[test_case("00:61:00" ; "minutes out of range")]
    #[test_case("-1:00:00" ; "negative")]
    #[test_case("a:b:c" ; "not numbers")]
    #[test_case("9999999999999999:00:00" ; "hours overflow")]
    #[test_case("2562047788015215:30:08" ; "sum overflow")]
    fn elapsed_rejects(input: &str) {
        parse_elapsed(input).expect_err("reading is invalid");
    }

    #[test]
    fn ts_val_parses_integer_and_fraction() {
        let expected = Anchor::from_epoch(ANCHOR_2355, utc());
        assert_eq!(Anchor::parse_ts_val("1685663700", utc()), expected);
        assert_eq!(Anchor::parse_ts_val("1685663700.731", utc()), expected);
        assert_eq!(Anchor::parse_ts_val("yesterday", utc()), None);
        assert_eq!(
            expected.map(|anchor| anchor.at()),
            Some(datetime(2023, 6, 1, 23, 55, 0))
        );
    }

    #[test]
    fn anchor_honors_offset() {
        let offset = FixedOffset::east_opt(3 * 3600).expect("valid offset");
        let anchor = Anchor::from_epoch(ANCHOR_2355, offset).expect("valid epoch");
        assert_eq!(anchor.at(), datetime(2023, 6, 2, 2, 55, 0));
    }

    #[test_case(time(23, 58, 0), datetime(2023, 6, 1, 23, 58, 0) ; "after anchor same day")]
    #[test_case(time(23, 55, 0), datetime(2023, 6, 1, 23, 55, 0) ; "equal to anchor same day")]
    #[test_case(time(0, 3, 0), datetime(2023, 6, 2, 0, 3, 0) ; "before anchor next day")]
    fn clock_resolution(reading: NaiveTime, expected: NaiveDateTime) {
        assert_eq!(
            reconciler(TimestampStrategy::Duration).resolve_clock(reading),
            expected
        );
    }

    #[test]
    fn duration_strategy_rolls_end_over_midnight() {
        let readings = ClockReadings {
            start: Some(time(23, 58, 0)),
            // Deliberately inconsistent: the duration wins.
            end: Some(time(23, 59, 0)),
            duration: Some(TimeDelta::minutes(10)),
        };
        let span = reconciler(TimestampStrategy::Duration).resolve(&readings);
        assert_eq!(span.start, Some(datetime(2023, 6, 1, 23, 58, 0)));
        assert_eq!(span.end, Some(datetime(2023, 6, 2, 0, 8, 0)));
    }

    #[test]
    fn duration_strategy_falls_back_without_duration() {
        let readings = ClockReadings {
            start: Some(time(23, 58, 0)),
            end: Some(time(0, 1, 0)),
            duration: None,
        };
        let span = reconciler(TimestampStrategy::Duration).resolve(&readings);
        assert_eq!(span.end, Some(datetime(2023, 6, 2, 0, 1, 0)));
    }

    #[test]
    fn direct_strategy_ignores_duration() {
        let readings = ClockReadings {
            start: Some(time(23, 58, 0)),
            end: Some(time(23, 59, 0)),
            duration: Some(TimeDelta::minutes(10)),
        };
        let span = reconciler(TimestampStrategy::Direct).resolve(&readings);
        assert_eq!(span.end, Some(datetime(2023, 6, 1, 23, 59, 0)));
    }

    #[test]
    fn resolved_timestamps_drop_subseconds() {
        let readings = ClockReadings {
            start: Some(NaiveTime::from_hms_milli_opt(23, 58, 0, 900).expect("valid time")),
            end: None,
            duration: Some(TimeDelta::milliseconds(200)),
        };
        let span = reconciler(TimestampStrategy::Duration).resolve(&readings);
        assert_eq!(span.start, Some(datetime(2023, 6, 1, 23, 58, 0)));
        assert_eq!(span.end, Some(datetime(2023, 6, 1, 23, 58, 1)));
    }

    #[test]
    fn strategy_from_str() {
        for variant in TimestampStrategy::variants() {
            let strategy: TimestampStrategy = variant.parse().expect("known variant");
            assert_eq!(strategy.to_string(), *variant);
        }
        "legacy"
            .parse::<TimestampStrategy>()
            .expect_err("unknown strategy is rejected");
    }
}
