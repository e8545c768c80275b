use calrecur::{CalendarTime, Conversion, Recurrence, RepetitionDescription};

mod monthly;
mod resume;

/// Parse a time in the `YYYY-MM-DD[THH:MM][/TZID]` form.
fn caltime(s: &str) -> CalendarTime {
    s.parse().unwrap()
}

/// Convert the given description, panicking if it was rejected.
fn rule(desc: &RepetitionDescription) -> Recurrence {
    match Recurrence::from_description(desc) {
        Conversion::Rule(rule) => rule,
        Conversion::Rejected(reason) => {
            panic!("expected recurrence rule, but got rejection: {reason}")
        }
    }
}

/// Render each time on its own line, in the time zone it carries.
fn snapshot(it: impl IntoIterator<Item = CalendarTime>) -> String {
    it.into_iter()
        .map(|t| format!("{} {}", t.date_str(), t.time_str()))
        .collect::<Vec<String>>()
        .join("\n")
}

/// Like `snapshot`, but with every time converted to UTC first.
fn snapshot_utc(it: impl IntoIterator<Item = CalendarTime>) -> String {
    snapshot(it.into_iter().map(|t| t.in_tz(&jiff::tz::TimeZone::UTC)))
}
