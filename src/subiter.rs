use jiff::civil::Weekday;

use crate::{
    caltime::CalendarTime,
    weekday::{WeekStart, abbreviation},
};

/// A strategy for picking dates within one period of a recurrence.
///
/// A recurrence with a sub-iterator is expanded in two loops. The outer loop
/// moves from period to period using the recurrence's increment, and the
/// sub-iterator enumerates the matching dates inside each period. For a
/// weekday set, a period is the week containing a date. For the other two
/// strategies, a period is the month containing a date.
///
/// Every date produced keeps the wall clock time of the date it was derived
/// from.
#[derive(Clone, Debug)]
pub enum Subiterator {
    Weekdays(WeekdaySet),
    MonthDays(MonthDaySet),
    MonthWeekdays(MonthWeekdayPositions),
}

impl Subiterator {
    /// Returns the first day of the period containing `t`.
    ///
    /// This is idempotent: the base date of a base date is itself.
    pub fn base_date(&self, t: &CalendarTime) -> anyhow::Result<CalendarTime> {
        match *self {
            Subiterator::Weekdays(ref set) => set.base_date(t),
            Subiterator::MonthDays(_) | Subiterator::MonthWeekdays(_) => {
                t.first_of_month()
            }
        }
    }

    /// Returns the matching dates in the period containing `t`, in ascending
    /// order and without duplicates.
    ///
    /// Only dates on or after `t` itself are produced, so when `t` is in the
    /// middle of its period, earlier matches are skipped.
    pub fn all_from(&self, t: &CalendarTime) -> Period {
        let offsets = match *self {
            Subiterator::Weekdays(ref set) => set.offsets(t),
            Subiterator::MonthDays(ref set) => set.offsets(t),
            Subiterator::MonthWeekdays(ref set) => set.offsets(t),
        };
        log::trace!("period from {t} has day offsets {offsets:?}");
        Period { from: t.clone(), offsets: offsets.into_iter() }
    }
}

impl std::fmt::Display for Subiterator {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            Subiterator::Weekdays(ref set) => write!(f, "{set}"),
            Subiterator::MonthDays(ref set) => write!(f, "{set}"),
            Subiterator::MonthWeekdays(ref set) => write!(f, "{set}"),
        }
    }
}

/// The dates selected by a sub-iterator within a single period.
///
/// This is finite and cheap to create. Restarting is done by asking the
/// sub-iterator for a new one.
#[derive(Clone, Debug)]
pub struct Period {
    from: CalendarTime,
    /// Days relative to `from`, ascending and deduplicated.
    offsets: std::vec::IntoIter<i8>,
}

impl Iterator for Period {
    type Item = CalendarTime;

    fn next(&mut self) -> Option<CalendarTime> {
        let offset = self.offsets.next()?;
        match self.from.plus_days(i64::from(offset)) {
            Ok(t) => Some(t),
            Err(err) => {
                log::debug!("ending period early: {err:#}");
                self.offsets = Vec::new().into_iter();
                None
            }
        }
    }
}

impl std::iter::FusedIterator for Period {}

/// A set of weekdays, selected within each week.
#[derive(Clone, Debug)]
pub struct WeekdaySet {
    start: WeekStart,
    /// Positions within the week (see `WeekStart::index`), sorted and
    /// deduplicated.
    indices: Box<[i8]>,
}

impl WeekdaySet {
    pub fn new<I: IntoIterator<Item = Weekday>>(
        start: WeekStart,
        weekdays: I,
    ) -> anyhow::Result<WeekdaySet> {
        let mut indices: Vec<i8> =
            weekdays.into_iter().map(|wd| start.index(wd)).collect();
        anyhow::ensure!(
            !indices.is_empty(),
            "a weekday set requires at least one weekday",
        );
        indices.sort();
        indices.dedup();
        Ok(WeekdaySet { start, indices: indices.into_boxed_slice() })
    }

    pub fn week_start(&self) -> WeekStart {
        self.start
    }

    /// Returns the weekdays in this set in the order they occur in a week.
    pub fn weekdays(&self) -> impl Iterator<Item = Weekday> + '_ {
        self.indices.iter().map(|&i| self.start.from_index(i))
    }

    fn base_date(&self, t: &CalendarTime) -> anyhow::Result<CalendarTime> {
        t.plus_days(-i64::from(t.weekday_index(self.start)))
    }

    fn offsets(&self, t: &CalendarTime) -> Vec<i8> {
        let today = t.weekday_index(self.start);
        self.indices
            .iter()
            .filter(|&&i| i >= today)
            .map(|&i| i - today)
            .collect()
    }
}

impl std::fmt::Display for WeekdaySet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "weekdays[")?;
        for (i, wd) in self.weekdays().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            f.write_str(abbreviation(wd))?;
        }
        write!(f, "] (week starts {})", self.start)
    }
}

/// A set of days of the month, selected within each month.
///
/// Negative days count from the end of the month, so `-1` is the last day.
/// Days that don't exist in a particular month (like the 31st of April) are
/// skipped for that month.
#[derive(Clone, Debug)]
pub struct MonthDaySet {
    // can be negative
    days: Box<[i8]>,
}

impl MonthDaySet {
    pub fn new<I: IntoIterator<Item = i8>>(
        days: I,
    ) -> anyhow::Result<MonthDaySet> {
        let mut days: Vec<i8> = days.into_iter().collect();
        anyhow::ensure!(
            !days.is_empty(),
            "a month day set requires at least one day",
        );
        for &d in days.iter() {
            anyhow::ensure!(
                (-31 <= d && d <= -1) || (1 <= d && d <= 31),
                "invalid day of the month `{d}` \
                 (values must be in range 1..=31 or -31..=-1)",
            );
        }
        days.sort();
        days.dedup();
        Ok(MonthDaySet { days: days.into_boxed_slice() })
    }

    pub fn days(&self) -> &[i8] {
        &self.days
    }

    fn offsets(&self, t: &CalendarTime) -> Vec<i8> {
        let (today, dim) = (t.day(), t.days_in_month());
        let mut days: Vec<i8> = self
            .days
            .iter()
            .map(|&d| if d < 0 { dim + d + 1 } else { d })
            .filter(|&d| 1 <= d && d <= dim && d >= today)
            .collect();
        days.sort();
        days.dedup();
        days.into_iter().map(|d| d - today).collect()
    }
}

impl std::fmt::Display for MonthDaySet {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "month-days[")?;
        for (i, d) in self.days.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

/// A set of "nth weekday of the month" positions.
///
/// Each position is a week ordinal paired with a weekday. A positive ordinal
/// counts from the start of the month (`1` is the first such weekday), a
/// negative ordinal counts from the end (`-1` is the last such weekday) and
/// `0` selects every such weekday in the month. Positions that don't exist
/// in a particular month (like the 5th Monday of most Februaries) are
/// skipped for that month.
#[derive(Clone, Debug)]
pub struct MonthWeekdayPositions {
    positions: Box<[(i8, Weekday)]>,
}

impl MonthWeekdayPositions {
    pub fn new<I: IntoIterator<Item = (i8, Weekday)>>(
        positions: I,
    ) -> anyhow::Result<MonthWeekdayPositions> {
        let mut positions: Vec<(i8, Weekday)> =
            positions.into_iter().collect();
        anyhow::ensure!(
            !positions.is_empty(),
            "a month weekday set requires at least one position",
        );
        for &(week, wd) in positions.iter() {
            anyhow::ensure!(
                -5 <= week && week <= 5,
                "invalid week `{week}` for {wd:?} \
                 (values must be in range -5..=5)",
            );
        }
        positions
            .sort_by_key(|&(week, wd)| (week, wd.to_monday_one_offset()));
        positions.dedup();
        Ok(MonthWeekdayPositions { positions: positions.into_boxed_slice() })
    }

    pub fn positions(&self) -> &[(i8, Weekday)] {
        &self.positions
    }

    fn offsets(&self, t: &CalendarTime) -> Vec<i8> {
        let (today, dim) = (t.day(), t.days_in_month());
        let first = t.weekday().wrapping_sub(today - 1);
        let last = first.wrapping_add(dim - 1);
        let mut days = vec![];
        for &(week, wd) in self.positions.iter() {
            let first_match = 1 + wd.since(first);
            if week == 0 {
                let every = (0..5).map(|n| first_match + 7 * n);
                days.extend(every.take_while(|&d| d <= dim));
            } else if week > 0 {
                days.push(first_match + 7 * (week - 1));
            } else {
                let last_match = dim - last.since(wd);
                days.push(last_match - 7 * (-week - 1));
            }
        }
        days.retain(|&d| 1 <= d && d <= dim && d >= today);
        days.sort();
        days.dedup();
        days.into_iter().map(|d| d - today).collect()
    }
}

impl std::fmt::Display for MonthWeekdayPositions {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(f, "month-weekdays[")?;
        for (i, &(week, wd)) in self.positions.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            if week != 0 {
                write!(f, "{week}-")?;
            }
            f.write_str(abbreviation(wd))?;
        }
        write!(f, "]")
    }
}
