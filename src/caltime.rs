use {
    anyhow::Context,
    jiff::{Span, Zoned, civil, tz::TimeZone},
};

use crate::weekday::{WeekStart, abbreviation};

/// A time zone aware instant with the calendar operations that recurrence
/// expansion needs.
///
/// This is a thin wrapper around `jiff::Zoned`, which does all of the heavy
/// lifting. The wrapper exists so that the handful of calendar operations
/// used by recurrence expansion (days in month, weekday relative to a week
/// start, the compact formatting used by outline renderers) live in one
/// place, and so that equality and ordering are explicitly defined in terms
/// of the physical instant.
///
/// That is, two `CalendarTime` values in different time zones compare equal
/// when they refer to the same instant.
#[derive(Clone, Debug)]
pub struct CalendarTime {
    zdt: Zoned,
}

impl CalendarTime {
    /// Wrap an existing zoned datetime.
    pub fn new(zdt: Zoned) -> CalendarTime {
        CalendarTime { zdt }
    }

    /// Build a time from its civil parts.
    ///
    /// When no time zone is given, UTC is used. Civil datetimes that fall in
    /// a gap or fold of the time zone are resolved the way
    /// `jiff::civil::DateTime::to_zoned` does.
    pub fn from_parts(
        year: i16,
        month: i8,
        day: i8,
        hour: i8,
        minute: i8,
        tz: Option<TimeZone>,
    ) -> anyhow::Result<CalendarTime> {
        let date = civil::Date::new(year, month, day).with_context(|| {
            format!("invalid date {year:04}-{month:02}-{day:02}")
        })?;
        let time = civil::Time::new(hour, minute, 0, 0)
            .with_context(|| format!("invalid time {hour:02}:{minute:02}"))?;
        CalendarTime::from_civil(civil::DateTime::from_parts(date, time), tz)
    }

    /// Returns this time with its seconds and microseconds replaced.
    ///
    /// This is the way to build a time from its civil parts when it needs
    /// more precision than `from_parts` offers:
    ///
    /// ```
    /// use calrecur::CalendarTime;
    ///
    /// let t = CalendarTime::from_parts(2022, 5, 11, 12, 0, None)?
    ///     .with_seconds(30, 250_000)?;
    /// assert_eq!(t.to_string(), "2022-05-11T12:00:30.25+00:00[UTC]");
    ///
    /// # Ok::<(), anyhow::Error>(())
    /// ```
    pub fn with_seconds(
        &self,
        second: i8,
        microsecond: i32,
    ) -> anyhow::Result<CalendarTime> {
        anyhow::ensure!(
            (0..1_000_000).contains(&microsecond),
            "invalid microsecond {microsecond} (must be in range 0..999999)",
        );
        let zdt = self
            .zdt
            .with()
            .second(second)
            .subsec_nanosecond(microsecond * 1_000)
            .build()
            .with_context(|| {
                format!("invalid seconds {second:02}.{microsecond:06}")
            })?;
        Ok(CalendarTime { zdt })
    }

    /// Build a time from a civil datetime, which may carry seconds and
    /// sub-second components.
    pub fn from_civil(
        dt: civil::DateTime,
        tz: Option<TimeZone>,
    ) -> anyhow::Result<CalendarTime> {
        let tz = tz.unwrap_or(TimeZone::UTC);
        let zdt = dt.to_zoned(tz).with_context(|| {
            format!("failed to attach time zone to civil datetime {dt}")
        })?;
        Ok(CalendarTime { zdt })
    }

    /// Parse either the strict `YYYY-MM-DD[THH:MM][/TZID]` form accepted by
    /// `FromStr`, or a full RFC 9557 timestamp such as
    /// `2022-03-26T08:00:00+01:00[Europe/Berlin]`.
    pub fn parse_any(s: &str) -> anyhow::Result<CalendarTime> {
        let strict = match s.parse::<CalendarTime>() {
            Ok(time) => return Ok(time),
            Err(err) => err,
        };
        match s.parse::<Zoned>() {
            Ok(zdt) => Ok(CalendarTime { zdt }),
            // Report the strict failure, since that is the grammar
            // callers are expected to write by hand.
            Err(_) => Err(strict),
        }
    }

    /// Returns the first instant of the current day in the given time zone.
    pub fn today(tz: TimeZone) -> anyhow::Result<CalendarTime> {
        let zdt = Zoned::now()
            .with_time_zone(tz)
            .start_of_day()
            .context("failed to find the start of the current day")?;
        Ok(CalendarTime { zdt })
    }

    /// Get the underlying Jiff zoned datetime.
    pub fn get(&self) -> &Zoned {
        &self.zdt
    }

    pub fn time_zone(&self) -> &TimeZone {
        self.zdt.time_zone()
    }

    /// Returns the same instant rendered in another time zone.
    pub fn in_tz(&self, tz: &TimeZone) -> CalendarTime {
        CalendarTime { zdt: self.zdt.with_time_zone(tz.clone()) }
    }

    pub fn year(&self) -> i16 {
        self.zdt.year()
    }

    pub fn month(&self) -> i8 {
        self.zdt.month()
    }

    pub fn day(&self) -> i8 {
        self.zdt.day()
    }

    pub fn hour(&self) -> i8 {
        self.zdt.hour()
    }

    pub fn minute(&self) -> i8 {
        self.zdt.minute()
    }

    pub fn second(&self) -> i8 {
        self.zdt.second()
    }

    /// The fractional part of the second, in whole microseconds.
    pub fn microsecond(&self) -> i32 {
        self.zdt.subsec_nanosecond() / 1_000
    }

    pub fn weekday(&self) -> civil::Weekday {
        self.zdt.weekday()
    }

    /// Returns the position of this time's weekday in a week beginning on
    /// `start`, where the first day of the week is `0`.
    pub fn weekday_index(&self, start: WeekStart) -> i8 {
        start.index(self.weekday())
    }

    /// Returns the number of days in this time's month.
    pub fn days_in_month(&self) -> i8 {
        self.zdt.days_in_month()
    }

    /// Add a span to this time.
    ///
    /// Calendar units (days and weeks) keep the wall clock time, even across
    /// a DST transition. Time units (hours and smaller) are added to the
    /// physical instant. So adding `24h` across a DST transition gives a
    /// different result than adding `1d`.
    pub fn checked_add(&self, span: Span) -> anyhow::Result<CalendarTime> {
        let zdt = self.zdt.checked_add(span).with_context(|| {
            format!("adding `{span:#}` to `{}` overflowed", self.zdt)
        })?;
        Ok(CalendarTime { zdt })
    }

    /// Subtract a span from this time.
    ///
    /// See `CalendarTime::checked_add` for how calendar and time units
    /// differ.
    pub fn checked_sub(&self, span: Span) -> anyhow::Result<CalendarTime> {
        let zdt = self.zdt.checked_sub(span).with_context(|| {
            format!("subtracting `{span:#}` from `{}` overflowed", self.zdt)
        })?;
        Ok(CalendarTime { zdt })
    }

    /// Move by a number of calendar days, keeping the wall clock time.
    pub fn plus_days(&self, days: i64) -> anyhow::Result<CalendarTime> {
        let span = Span::new()
            .try_days(days)
            .with_context(|| format!("`{days}` days is out of range"))?;
        self.checked_add(span)
    }

    /// Returns the same wall clock time on the first day of this month.
    pub fn first_of_month(&self) -> anyhow::Result<CalendarTime> {
        self.plus_days(1 - i64::from(self.day()))
    }

    /// Returns the first instant of this time's day.
    pub fn start_of_day(&self) -> anyhow::Result<CalendarTime> {
        let zdt = self.zdt.start_of_day().with_context(|| {
            format!("failed to find the start of the day for `{}`", self.zdt)
        })?;
        Ok(CalendarTime { zdt })
    }

    /// The English abbreviation of this time's weekday, e.g., `Wed`.
    pub fn weekday_str(&self) -> &'static str {
        abbreviation(self.weekday())
    }

    /// The date along with its weekday, e.g., `2022-05-11 Wed`.
    pub fn date_str(&self) -> String {
        format!(
            "{:04}-{:02}-{:02} {}",
            self.year(),
            self.month(),
            self.day(),
            self.weekday_str(),
        )
    }

    /// The wall clock time, e.g., `08:30`.
    pub fn time_str(&self) -> String {
        format!("{:02}:{:02}", self.hour(), self.minute())
    }

    /// The bracketed timestamp used by outline renderers, e.g.,
    /// `<2022-05-11 Wed 12:00>`.
    ///
    /// When a recurrence shorthand is given, it's appended inside the
    /// brackets, e.g., `<2022-05-11 Wed 12:00 +1w>`.
    pub fn timespec(&self, shorthand: Option<&str>) -> String {
        match shorthand {
            None => format!("<{} {}>", self.date_str(), self.time_str()),
            Some(spec) => {
                format!("<{} {} {spec}>", self.date_str(), self.time_str())
            }
        }
    }
}

/// Returns the number of days in the given month of the given year.
pub fn days_in_month(year: i16, month: i8) -> anyhow::Result<i8> {
    let first = civil::Date::new(year, month, 1)
        .with_context(|| format!("invalid month {year:04}-{month:02}"))?;
    Ok(first.days_in_month())
}

impl Eq for CalendarTime {}

impl PartialEq for CalendarTime {
    fn eq(&self, rhs: &CalendarTime) -> bool {
        self.zdt.timestamp() == rhs.zdt.timestamp()
    }
}

impl Ord for CalendarTime {
    fn cmp(&self, rhs: &CalendarTime) -> std::cmp::Ordering {
        self.zdt.timestamp().cmp(&rhs.zdt.timestamp())
    }
}

impl PartialOrd for CalendarTime {
    fn partial_cmp(&self, rhs: &CalendarTime) -> Option<std::cmp::Ordering> {
        Some(self.cmp(rhs))
    }
}

impl std::hash::Hash for CalendarTime {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.zdt.timestamp().hash(state);
    }
}

impl From<Zoned> for CalendarTime {
    fn from(zdt: Zoned) -> CalendarTime {
        CalendarTime { zdt }
    }
}

impl std::fmt::Display for CalendarTime {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        std::fmt::Display::fmt(&self.zdt, f)
    }
}

impl std::str::FromStr for CalendarTime {
    type Err = anyhow::Error;

    /// Parses `YYYY-MM-DD` or `YYYY-MM-DDTHH:MM`, optionally followed by
    /// `/` and an IANA time zone name. Without a time zone name, the time is
    /// in UTC.
    ///
    /// Any deviation from that grammar is a `FormatError`.
    fn from_str(s: &str) -> anyhow::Result<CalendarTime> {
        let (stamp, name) = match s.split_once('/') {
            None => (s, None),
            Some((stamp, name)) => (stamp, Some(name)),
        };
        let Some(dt) = parse_stamp(stamp) else {
            return Err(anyhow::Error::new(FormatError::new(s)));
        };
        let tz = match name {
            None => TimeZone::UTC,
            Some(name) => TimeZone::get(name).with_context(|| {
                format!("unknown time zone `{name}` in `{s}`")
            })?,
        };
        CalendarTime::from_civil(dt, Some(tz))
    }
}

/// Parse exactly 10 date characters, optionally followed by `T` and exactly
/// 5 time characters.
fn parse_stamp(s: &str) -> Option<civil::DateTime> {
    fn number<T: std::str::FromStr>(s: &str) -> Option<T> {
        if !s.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        s.parse().ok()
    }

    if !s.is_ascii() {
        return None;
    }
    let (date, time) = match s.len() {
        10 => (s, None),
        16 if s.as_bytes()[10] == b'T' => (&s[..10], Some(&s[11..])),
        _ => return None,
    };
    let bytes = date.as_bytes();
    if bytes[4] != b'-' || bytes[7] != b'-' {
        return None;
    }
    let date = civil::Date::new(
        number(&date[0..4])?,
        number(&date[5..7])?,
        number(&date[8..10])?,
    )
    .ok()?;
    let time = match time {
        None => civil::Time::midnight(),
        Some(time) => {
            if time.as_bytes()[2] != b':' {
                return None;
            }
            civil::Time::new(number(&time[0..2])?, number(&time[3..5])?, 0, 0)
                .ok()?
        }
    };
    Some(civil::DateTime::from_parts(date, time))
}

/// The error returned when a time string doesn't match the strict
/// `YYYY-MM-DD[THH:MM]` grammar.
///
/// This is carried inside an `anyhow::Error`, so callers that need to
/// distinguish it should use `anyhow::Error::downcast_ref`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct FormatError {
    input: String,
}

impl FormatError {
    fn new(input: &str) -> FormatError {
        FormatError { input: input.to_string() }
    }

    /// The string that failed to parse.
    pub fn input(&self) -> &str {
        &self.input
    }
}

impl std::fmt::Display for FormatError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "invalid time `{}` (expected `YYYY-MM-DD` or \
             `YYYY-MM-DDTHH:MM`, optionally followed by `/` and \
             a time zone name)",
            self.input,
        )
    }
}

impl std::error::Error for FormatError {}

impl serde::Serialize for CalendarTime {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.collect_str(self)
    }
}

impl<'de> serde::Deserialize<'de> for CalendarTime {
    #[inline]
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> Result<CalendarTime, D::Error> {
        use serde::de;

        struct Visitor;

        impl<'de> de::Visitor<'de> for Visitor {
            type Value = CalendarTime;

            fn expecting(
                &self,
                f: &mut core::fmt::Formatter,
            ) -> core::fmt::Result {
                f.write_str("a calendar time string")
            }

            #[inline]
            fn visit_str<E: de::Error>(
                self,
                value: &str,
            ) -> Result<CalendarTime, E> {
                CalendarTime::parse_any(value).map_err(de::Error::custom)
            }
        }

        deserializer.deserialize_str(Visitor)
    }
}
