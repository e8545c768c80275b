/*!
This crate expands calendar recurrence rules into concrete occurrences.

A calendar service describes a repeating event with a repetition
description: a frequency, an interval, a handful of "by" fields and an
optional count or until bound. This crate converts the subset of those
descriptions that outline renderers can reasonably show into a
[`Recurrence`], and then anchors that rule at a start time to produce a
[`RecurrenceRange`], which can be traversed any number of times.

Descriptions that can't be expanded faithfully are rejected with a human
readable reason instead of being approximated.

# Example

This expands "the 4th Wednesday of every month, 3 times":

```
use calrecur::{CalendarTime, Frequency, Recurrence, RepetitionDescription};

let mut desc = RepetitionDescription::new(Frequency::Monthly);
desc.by_day([36]).count(3);
let rule = Recurrence::from_description(&desc).into_rule().unwrap();

let start: CalendarTime = "2022-01-26T09:00".parse()?;
let dates: Vec<String> =
    rule.range_from(&start).all().map(|t| t.date_str()).collect();
assert_eq!(dates, ["2022-01-26 Wed", "2022-02-23 Wed", "2022-03-23 Wed"]);

# Ok::<(), anyhow::Error>(())
```

# Logging

Expansion is traced through a [`Tracer`] owned by each range. The default
sink forwards events to the `log` crate at trace level, and conversion
rejections are logged at debug level. Nothing is emitted unless the
application installs a logger.
*/

pub use crate::{
    caltime::{CalendarTime, FormatError, days_in_month},
    config::{Config, ShorthandUnits},
    increment::{CalendarIncrement, Increment},
    range::{Occurrences, RecurrenceRange, RecurrenceRangeBuilder, Starting},
    rule::{
        Conversion, Frequency, Recurrence, RepetitionDescription, UNSET,
    },
    subiter::{
        MonthDaySet, MonthWeekdayPositions, Period, Subiterator, WeekdaySet,
    },
    trace::{FinishReason, LogTracer, NoTracer, Phase, TraceEvent, Tracer},
    weekday::{WeekStart, abbreviation, decode_packed, ecal_weekday},
};

mod caltime;
mod config;
mod increment;
mod range;
mod rule;
mod subiter;
mod trace;
mod weekday;
