use std::sync::Arc;

use {
    anyhow::Context,
    jiff::{Span, civil::Weekday},
};

use crate::{
    caltime::CalendarTime,
    config::Config,
    increment::{CalendarIncrement, Increment},
    range::{RecurrenceRange, RecurrenceRangeBuilder},
    subiter::{MonthDaySet, MonthWeekdayPositions, Subiterator, WeekdaySet},
    trace::Tracer,
    weekday::{WeekStart, decode_packed, ecal_weekday},
};

/// The value calendar services put in unused slots of a by-field array.
pub const UNSET: i16 = 32639;

/// The unit at which a recurrence repeats.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Frequency {
    Yearly,
    Monthly,
    Weekly,
    Daily,
    Hourly,
    Minutely,
    Secondly,
}

impl Frequency {
    pub fn as_str(&self) -> &'static str {
        match *self {
            Frequency::Yearly => "yearly",
            Frequency::Monthly => "monthly",
            Frequency::Weekly => "weekly",
            Frequency::Daily => "daily",
            Frequency::Hourly => "hourly",
            Frequency::Minutely => "minutely",
            Frequency::Secondly => "secondly",
        }
    }

    /// The plural unit name, e.g., `weeks`.
    fn unit_name(&self) -> &'static str {
        match *self {
            Frequency::Yearly => "years",
            Frequency::Monthly => "months",
            Frequency::Weekly => "weeks",
            Frequency::Daily => "days",
            Frequency::Hourly => "hours",
            Frequency::Minutely => "minutes",
            Frequency::Secondly => "seconds",
        }
    }

    /// Returns a span of `interval` units of this frequency.
    ///
    /// Days and weeks are calendar units, so stepping by them keeps the wall
    /// clock time across DST transitions. Hours, minutes and seconds step the
    /// physical instant.
    fn to_span(&self, interval: i32) -> anyhow::Result<Span> {
        let n = i64::from(interval);
        let span = match *self {
            Frequency::Yearly => Span::new().try_years(n),
            Frequency::Monthly => Span::new().try_months(n),
            Frequency::Weekly => Span::new().try_weeks(n),
            Frequency::Daily => Span::new().try_days(n),
            Frequency::Hourly => Span::new().try_hours(n),
            Frequency::Minutely => Span::new().try_minutes(n),
            Frequency::Secondly => Span::new().try_seconds(n),
        };
        span.with_context(|| {
            format!(
                "could not convert {freq} interval of `{interval}` to \
                 time span",
                freq = self.as_str(),
            )
        })
    }
}

impl std::str::FromStr for Frequency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Frequency> {
        use self::Frequency::*;

        // Friendly names, along with the names calendar services use.
        let unit = match &*s.to_lowercase() {
            "yearly" | "year" | "yr" | "y" | "i_cal_yearly_recurrence" => {
                Yearly
            }
            "monthly" | "month" | "mo" | "i_cal_monthly_recurrence" => Monthly,
            "weekly" | "week" | "wk" | "w" | "i_cal_weekly_recurrence" => {
                Weekly
            }
            "daily" | "day" | "d" | "i_cal_daily_recurrence" => Daily,
            "hourly" | "hour" | "hr" | "h" | "i_cal_hourly_recurrence" => {
                Hourly
            }
            "minutely" | "minute" | "min" | "m"
            | "i_cal_minutely_recurrence" => Minutely,
            "secondly" | "second" | "sec" | "s"
            | "i_cal_secondly_recurrence" => Secondly,
            unk => anyhow::bail!("unrecognized frequency: `{unk}`"),
        };
        Ok(unit)
    }
}

impl std::fmt::Display for Frequency {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The by-field arrays of a repetition description.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
enum ByField {
    Second,
    Minute,
    Hour,
    Day,
    WeekNo,
    MonthDay,
    YearDay,
    SetPos,
}

impl ByField {
    const ALL: [ByField; 8] = [
        ByField::Second,
        ByField::Minute,
        ByField::Hour,
        ByField::Day,
        ByField::WeekNo,
        ByField::MonthDay,
        ByField::YearDay,
        ByField::SetPos,
    ];

    fn name(self) -> &'static str {
        match self {
            ByField::Second => "seconds",
            ByField::Minute => "minutes",
            ByField::Hour => "hours",
            ByField::Day => "weekdays",
            ByField::WeekNo => "week numbers",
            ByField::MonthDay => "month days",
            ByField::YearDay => "year days",
            ByField::SetPos => "set positions",
        }
    }

    /// Values at or above this are treated as unset.
    fn limit(self) -> i16 {
        match self {
            ByField::Second | ByField::Minute => 60,
            ByField::Hour => 24,
            // includes the packed week number
            ByField::Day => 50,
            ByField::WeekNo => 54,
            ByField::MonthDay => 32,
            ByField::YearDay | ByField::SetPos => 368,
        }
    }
}

/// A repetition description, as provided by a calendar service.
///
/// This mirrors the shape of the external description rather than what
/// this crate can expand. In particular, the by-field arrays are stored
/// raw and may contain `UNSET` padding. Use `Recurrence::from_description`
/// to turn this into something that can be expanded.
///
/// Weekday values use the calendar service encoding, where `1` is Sunday
/// and `7` is Saturday. At monthly and yearly frequency, a weekday may be
/// packed with a week number (see `weekday::decode_packed`).
#[derive(Clone, Debug)]
pub struct RepetitionDescription {
    freq: Frequency,
    interval: i32,
    by_second: Vec<i16>,
    by_minute: Vec<i16>,
    by_hour: Vec<i16>,
    by_day: Vec<i16>,
    by_week_no: Vec<i16>,
    by_month_day: Vec<i16>,
    by_year_day: Vec<i16>,
    by_set_pos: Vec<i16>,
    until: Option<CalendarTime>,
    count: u32,
    week_start: Weekday,
}

impl RepetitionDescription {
    /// Create a description repeating every unit of the given frequency,
    /// forever, with weeks starting on Monday.
    pub fn new(freq: Frequency) -> RepetitionDescription {
        RepetitionDescription {
            freq,
            interval: 1,
            by_second: vec![],
            by_minute: vec![],
            by_hour: vec![],
            by_day: vec![],
            by_week_no: vec![],
            by_month_day: vec![],
            by_year_day: vec![],
            by_set_pos: vec![],
            until: None,
            count: 0,
            week_start: Weekday::Monday,
        }
    }

    pub fn frequency(&self) -> Frequency {
        self.freq
    }

    pub fn interval(&mut self, interval: i32) -> &mut RepetitionDescription {
        self.interval = interval;
        self
    }

    pub fn by_second<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_second.extend(values);
        self
    }

    pub fn by_minute<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_minute.extend(values);
        self
    }

    pub fn by_hour<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_hour.extend(values);
        self
    }

    pub fn by_day<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_day.extend(values);
        self
    }

    pub fn by_week_no<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_week_no.extend(values);
        self
    }

    pub fn by_month_day<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_month_day.extend(values);
        self
    }

    pub fn by_year_day<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_year_day.extend(values);
        self
    }

    pub fn by_set_pos<I: IntoIterator<Item = i16>>(
        &mut self,
        values: I,
    ) -> &mut RepetitionDescription {
        self.by_set_pos.extend(values);
        self
    }

    pub fn until(
        &mut self,
        until: CalendarTime,
    ) -> &mut RepetitionDescription {
        self.until = Some(until);
        self
    }

    /// Bound the repetition to `count` occurrences. Zero means unbounded.
    pub fn count(&mut self, count: u32) -> &mut RepetitionDescription {
        self.count = count;
        self
    }

    pub fn week_start(
        &mut self,
        weekday: Weekday,
    ) -> &mut RepetitionDescription {
        self.week_start = weekday;
        self
    }

    fn raw(&self, field: ByField) -> &[i16] {
        match field {
            ByField::Second => &self.by_second,
            ByField::Minute => &self.by_minute,
            ByField::Hour => &self.by_hour,
            ByField::Day => &self.by_day,
            ByField::WeekNo => &self.by_week_no,
            ByField::MonthDay => &self.by_month_day,
            ByField::YearDay => &self.by_year_day,
            ByField::SetPos => &self.by_set_pos,
        }
    }
}

/// The by-field values that survived filtering of unset slots.
#[derive(Debug)]
struct ByValues {
    values: [Vec<i16>; 8],
}

impl ByValues {
    fn new(desc: &RepetitionDescription) -> ByValues {
        let values = ByField::ALL.map(|field| {
            desc.raw(field)
                .iter()
                .copied()
                .filter(|&v| v != UNSET && v < field.limit())
                .collect::<Vec<i16>>()
        });
        ByValues { values }
    }

    fn get(&self, field: ByField) -> &[i16] {
        &self.values[field as usize]
    }
}

/// The outcome of converting a repetition description.
#[derive(Clone, Debug)]
pub enum Conversion {
    Rule(Recurrence),
    /// The description uses something that can't be expanded. The reason
    /// is meant for humans, e.g., as an annotation on the event.
    Rejected(String),
}

impl Conversion {
    pub fn into_rule(self) -> Option<Recurrence> {
        match self {
            Conversion::Rule(rule) => Some(rule),
            Conversion::Rejected(_) => None,
        }
    }

    pub fn rejection(&self) -> Option<&str> {
        match *self {
            Conversion::Rule(_) => None,
            Conversion::Rejected(ref reason) => Some(reason.as_str()),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(*self, Conversion::Rejected(_))
    }
}

/// A recurrence rule that isn't yet attached to a particular start time.
///
/// The same rule is typically used twice for one event, once anchored at
/// its start and once anchored at its end. See `Recurrence::range_from`.
#[derive(Clone, Debug)]
pub struct Recurrence {
    shorthand: Option<String>,
    increment: Increment,
    subiterator: Option<Subiterator>,
    until: Option<CalendarTime>,
    count: u32,
}

impl Recurrence {
    /// Create a recurrence from its parts.
    ///
    /// A `count` of `0` means unbounded. Recurrences built this way never
    /// have a shorthand code.
    pub fn new(
        increment: Increment,
        subiterator: Option<Subiterator>,
        until: Option<CalendarTime>,
        count: u32,
    ) -> Recurrence {
        Recurrence { shorthand: None, increment, subiterator, until, count }
    }

    /// Repeat every day, optionally bounded to `count` occurrences.
    pub fn daily(count: u32) -> Recurrence {
        let increment = Increment::Fixed(Span::new().days(1));
        Recurrence::new(increment, None, None, count)
    }

    /// Convert a calendar service description using the default
    /// configuration.
    pub fn from_description(desc: &RepetitionDescription) -> Conversion {
        Recurrence::from_description_with(desc, &Config::default())
    }

    /// Convert a calendar service description.
    ///
    /// Only a few shapes of description are supported:
    ///
    /// * Minute, hour and day frequencies without any by-fields.
    /// * Week frequency, optionally with a list of weekdays.
    /// * Month and year frequency, optionally with one of: a list of
    /// weekdays paired with an equally long list of set positions, a list of
    /// (possibly packed) weekdays, or a list of month days.
    ///
    /// Everything else, including any second based repetition, is rejected
    /// with a description of what couldn't be handled.
    pub fn from_description_with(
        desc: &RepetitionDescription,
        config: &Config,
    ) -> Conversion {
        match convert(desc, config) {
            Ok(rule) => Conversion::Rule(rule),
            Err(reason) => {
                log::debug!(
                    "rejecting {freq} repetition: {reason}",
                    freq = desc.freq,
                );
                Conversion::Rejected(reason)
            }
        }
    }

    /// The short repeater code for this rule, e.g., `+3w`, when it is simple
    /// enough to have one.
    pub fn shorthand(&self) -> Option<&str> {
        self.shorthand.as_deref()
    }

    pub fn increment(&self) -> &Increment {
        &self.increment
    }

    pub fn subiterator(&self) -> Option<&Subiterator> {
        self.subiterator.as_ref()
    }

    pub fn until(&self) -> Option<&CalendarTime> {
        self.until.as_ref()
    }

    /// The maximum number of occurrences, or `0` when unbounded.
    pub fn count(&self) -> u32 {
        self.count
    }

    /// Returns every occurrence of this rule anchored at `anchor`.
    pub fn range_from(&self, anchor: &CalendarTime) -> RecurrenceRange {
        self.range_builder(anchor).build()
    }

    /// Like `range_from`, but with trace events sent to the given sink.
    pub fn range_from_with_tracer(
        &self,
        anchor: &CalendarTime,
        tracer: Arc<dyn Tracer>,
    ) -> RecurrenceRange {
        self.range_builder(anchor).tracer(tracer).build()
    }

    fn range_builder(&self, anchor: &CalendarTime) -> RecurrenceRangeBuilder {
        let mut builder =
            RecurrenceRange::builder(anchor.clone(), self.increment.clone());
        builder.count(self.count);
        if let Some(ref sub) = self.subiterator {
            builder.subiterator(sub.clone());
        }
        if let Some(ref until) = self.until {
            builder.until(until.clone());
        }
        builder
    }
}

impl std::fmt::Display for Recurrence {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "{{")?;
        if let Some(ref spec) = self.shorthand {
            write!(f, "spec={spec}, ")?;
        }
        write!(f, "inc={}", self.increment)?;
        if let Some(ref sub) = self.subiterator {
            write!(f, ", subit={sub}")?;
        }
        if let Some(ref until) = self.until {
            write!(f, ", until={until}")?;
        }
        if self.count > 0 {
            write!(f, ", count={}", self.count)?;
        }
        write!(f, "}}")
    }
}

fn convert(
    desc: &RepetitionDescription,
    config: &Config,
) -> Result<Recurrence, String> {
    let freq = desc.freq;
    if freq == Frequency::Secondly {
        return Err("cannot use second-based repetition".to_string());
    }
    if desc.interval < 1 {
        return Err(format!(
            "interval value of `{}` is invalid \
             (interval must be greater than or equal to 1)",
            desc.interval,
        ));
    }
    let week_start =
        WeekStart::try_from(desc.week_start).map_err(|err| err.to_string())?;
    let by = ByValues::new(desc);
    let mut handled = vec![];
    let (increment, subiterator) = match freq {
        Frequency::Minutely | Frequency::Hourly | Frequency::Daily => {
            let span =
                freq.to_span(desc.interval).map_err(|err| format!("{err:#}"))?;
            (Increment::Fixed(span), None)
        }
        Frequency::Weekly => {
            let span =
                freq.to_span(desc.interval).map_err(|err| format!("{err:#}"))?;
            let days = by.get(ByField::Day);
            let sub = if days.is_empty() {
                None
            } else {
                handled.push(ByField::Day);
                Some(weekly_subiterator(week_start, days)?)
            };
            (Increment::Fixed(span), sub)
        }
        Frequency::Monthly | Frequency::Yearly => {
            let sub = monthly_subiterator(&by, &mut handled)?;
            let interval = desc.interval.unsigned_abs();
            let inc = match freq {
                Frequency::Monthly => CalendarIncrement::months(interval),
                Frequency::Yearly => CalendarIncrement::years(interval),
                _ => unreachable!("calendar increment for {freq} frequency"),
            };
            (Increment::Calendar(inc), sub)
        }
        Frequency::Secondly => unreachable!("second-based repetition"),
    };

    let overlooked: Vec<String> = ByField::ALL
        .into_iter()
        .filter(|field| !handled.contains(field))
        .filter_map(|field| {
            let values = by.get(field);
            if values.is_empty() {
                return None;
            }
            let values = values
                .iter()
                .map(|v| v.to_string())
                .collect::<Vec<String>>()
                .join(", ");
            Some(format!("{} ({values})", field.name()))
        })
        .collect();
    if !overlooked.is_empty() {
        return Err(format!(
            "repetition in {} not completely handled due to {}",
            freq.unit_name(),
            overlooked.join("; "),
        ));
    }

    let shorthand = if subiterator.is_none()
        && desc.until.is_none()
        && desc.count == 0
    {
        config.shorthand(freq, desc.interval)
    } else {
        None
    };
    Ok(Recurrence {
        shorthand,
        increment,
        subiterator,
        until: desc.until.clone(),
        count: desc.count,
    })
}

fn weekly_subiterator(
    week_start: WeekStart,
    days: &[i16],
) -> Result<Subiterator, String> {
    let weekdays = days
        .iter()
        .map(|&code| {
            ecal_weekday(code).ok_or_else(|| {
                format!("weekday `{code}` cannot be used at weekly frequency")
            })
        })
        .collect::<Result<Vec<Weekday>, String>>()?;
    let set = WeekdaySet::new(week_start, weekdays)
        .map_err(|err| err.to_string())?;
    Ok(Subiterator::Weekdays(set))
}

fn monthly_subiterator(
    by: &ByValues,
    handled: &mut Vec<ByField>,
) -> Result<Option<Subiterator>, String> {
    let days = by.get(ByField::Day);
    let set_pos = by.get(ByField::SetPos);
    let month_days = by.get(ByField::MonthDay);
    if !days.is_empty() && days.len() == set_pos.len() {
        handled.extend([ByField::Day, ByField::SetPos]);
        let positions = set_pos
            .iter()
            .zip(days.iter())
            .map(|(&pos, &code)| {
                let weekday = ecal_weekday(code).ok_or_else(|| {
                    format!(
                        "weekday `{code}` cannot be combined \
                         with set position `{pos}`"
                    )
                })?;
                let week = i8::try_from(pos)
                    .ok()
                    .filter(|&week| week != 0)
                    .ok_or_else(|| {
                        format!("set position `{pos}` is invalid")
                    })?;
                Ok((week, weekday))
            })
            .collect::<Result<Vec<(i8, Weekday)>, String>>()?;
        let set = MonthWeekdayPositions::new(positions)
            .map_err(|err| err.to_string())?;
        Ok(Some(Subiterator::MonthWeekdays(set)))
    } else if !days.is_empty() {
        handled.push(ByField::Day);
        let positions = days
            .iter()
            .map(|&code| {
                decode_packed(code)
                    .ok_or_else(|| format!("weekday `{code}` is invalid"))
            })
            .collect::<Result<Vec<(i8, Weekday)>, String>>()?;
        let set = MonthWeekdayPositions::new(positions)
            .map_err(|err| err.to_string())?;
        Ok(Some(Subiterator::MonthWeekdays(set)))
    } else if !month_days.is_empty() {
        handled.push(ByField::MonthDay);
        let days = month_days
            .iter()
            .map(|&day| {
                i8::try_from(day).map_err(|_| {
                    format!("day of the month `{day}` is invalid")
                })
            })
            .collect::<Result<Vec<i8>, String>>()?;
        let set = MonthDaySet::new(days).map_err(|err| err.to_string())?;
        Ok(Some(Subiterator::MonthDays(set)))
    } else {
        Ok(None)
    }
}
