use {
    anyhow::Context,
    jiff::{Span, civil},
};

use crate::caltime::CalendarTime;

/// The step taken between two periods of a recurrence.
///
/// Fixed steps (seconds through weeks) are added like any other span.
/// Calendar steps (months and years) use their own day clamping rule. See
/// `CalendarIncrement`.
#[derive(Clone, Debug)]
pub enum Increment {
    Fixed(Span),
    Calendar(CalendarIncrement),
}

impl Increment {
    /// Returns the time one step after `t`.
    pub fn apply(&self, t: &CalendarTime) -> anyhow::Result<CalendarTime> {
        match *self {
            Increment::Fixed(span) => t.checked_add(span),
            Increment::Calendar(ref inc) => inc.apply(t),
        }
    }
}

impl From<Span> for Increment {
    fn from(span: Span) -> Increment {
        Increment::Fixed(span)
    }
}

impl From<CalendarIncrement> for Increment {
    fn from(inc: CalendarIncrement) -> Increment {
        Increment::Calendar(inc)
    }
}

impl std::fmt::Display for Increment {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            // This emits Jiff's "friendly" duration format.
            Increment::Fixed(span) => write!(f, "{span:#}"),
            Increment::Calendar(ref inc) => write!(f, "{inc}"),
        }
    }
}

/// A step of whole months.
///
/// Years are represented as twelve months. A step of `N` months moves to the
/// first day of the month `N` months later and only then restores the
/// original day of the month, clamped to the length of that month. Since the
/// clamp happens once, at the end, January 31 plus two months is March 31
/// and not March 28 or 29.
///
/// Note that the clamp is relative to the time being stepped, so repeatedly
/// applying a one month step to January 31 gives February 28, then March 28.
#[derive(Clone, Copy, Debug)]
pub struct CalendarIncrement {
    months: u32,
    /// Only used for display. A step of one year equals a step of twelve
    /// months.
    yearly: bool,
}

impl CalendarIncrement {
    pub fn months(months: u32) -> CalendarIncrement {
        CalendarIncrement { months, yearly: false }
    }

    pub fn years(years: u32) -> CalendarIncrement {
        CalendarIncrement { months: years.saturating_mul(12), yearly: true }
    }

    /// The total number of months in this step.
    pub fn get(&self) -> u32 {
        self.months
    }

    /// Returns `t` moved forward by this many months.
    ///
    /// The wall clock time is kept. A step of zero months returns `t`
    /// unchanged.
    pub fn apply(&self, t: &CalendarTime) -> anyhow::Result<CalendarTime> {
        if self.months == 0 {
            return Ok(t.clone());
        }
        let dt = self.apply_civil(t.get().datetime())?;
        CalendarTime::from_civil(dt, Some(t.time_zone().clone()))
    }

    /// Like `apply`, but on a civil datetime.
    fn apply_civil(
        &self,
        dt: civil::DateTime,
    ) -> anyhow::Result<civil::DateTime> {
        if self.months == 0 {
            return Ok(dt);
        }
        // Adding months to the first day of a month never clamps, so the
        // only clamp is the one below.
        let months = Span::new()
            .try_months(i64::from(self.months))
            .with_context(|| format!("{self} is too big of a step"))?;
        let first = dt
            .first_of_month()
            .checked_add(months)
            .with_context(|| format!("failed to step `{dt}` by {self}"))?;
        let day = dt.day().min(first.days_in_month());
        let stepped = first.with().day(day).build()?;
        Ok(stepped)
    }
}

impl Eq for CalendarIncrement {}

impl PartialEq for CalendarIncrement {
    fn eq(&self, rhs: &CalendarIncrement) -> bool {
        self.months == rhs.months
    }
}

impl std::hash::Hash for CalendarIncrement {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.months.hash(state);
    }
}

impl std::fmt::Display for CalendarIncrement {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        if self.yearly {
            write!(f, "{{years+={}}}", self.months / 12)
        } else {
            write!(f, "{{months+={}}}", self.months)
        }
    }
}

/// A position reached by repeatedly stepping by an increment.
///
/// The wall clock time is tracked alongside the resolved time. When a step
/// lands in a gap (e.g., 02:30 on the day clocks spring forward), the
/// resolved time is pushed forward, but the next step still starts from the
/// wall clock time. Steps made only of time units (hours and smaller) are
/// physical, so for those the wall clock follows the resolved time.
#[derive(Clone, Debug)]
pub(crate) struct Cursor {
    time: CalendarTime,
    wall: civil::DateTime,
}

impl Cursor {
    /// Create a cursor at `time` whose wall clock shows `clock`.
    pub(crate) fn new(time: CalendarTime, clock: civil::Time) -> Cursor {
        let wall = time.get().date().to_datetime(clock);
        Cursor { time, wall }
    }

    pub(crate) fn time(&self) -> &CalendarTime {
        &self.time
    }

    /// Returns the cursor one step of `inc` after this one.
    pub(crate) fn step(&self, inc: &Increment) -> anyhow::Result<Cursor> {
        let wall = match *inc {
            Increment::Fixed(span) if is_physical(span) => {
                let time = self.time.checked_add(span)?;
                let wall = time.get().datetime();
                return Ok(Cursor { time, wall });
            }
            Increment::Fixed(span) => {
                self.wall.checked_add(span).with_context(|| {
                    format!("adding `{span:#}` to `{}` overflowed", self.wall)
                })?
            }
            Increment::Calendar(ref inc) => inc.apply_civil(self.wall)?,
        };
        let tz = self.time.time_zone().clone();
        let time = CalendarTime::from_civil(wall, Some(tz))?;
        Ok(Cursor { time, wall })
    }
}

/// Returns true when `span` has no calendar units.
fn is_physical(span: Span) -> bool {
    span.get_years() == 0
        && span.get_months() == 0
        && span.get_weeks() == 0
        && span.get_days() == 0
}
