use jiff::civil::Weekday;

/// The day on which a week is considered to begin.
///
/// Calendar services let a recurrence rule pick any weekday as the start of
/// the week, but only Sunday-first and Monday-first weeks are supported here.
/// Anything else is rejected when converting from a `Weekday`.
///
/// The week start matters for weekday selection at weekly frequency: with an
/// interval greater than one, the period that gets skipped depends on where
/// one week ends and the next begins.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
pub enum WeekStart {
    Sunday,
    #[default]
    Monday,
}

impl WeekStart {
    /// Returns the first weekday of weeks using this convention.
    pub fn weekday(self) -> Weekday {
        match self {
            WeekStart::Sunday => Weekday::Sunday,
            WeekStart::Monday => Weekday::Monday,
        }
    }

    /// Returns the zero based position of `wd` within a week.
    ///
    /// The first day of the week is `0` and the last is `6`. So for
    /// Sunday-first weeks, Sunday is `0`, while for Monday-first weeks,
    /// Sunday is `6`.
    pub fn index(self, wd: Weekday) -> i8 {
        wd.since(self.weekday())
    }

    /// The inverse of `WeekStart::index`.
    ///
    /// Values outside of `0..=6` wrap around.
    pub fn from_index(self, index: i8) -> Weekday {
        self.weekday().wrapping_add(index)
    }
}

impl TryFrom<Weekday> for WeekStart {
    type Error = anyhow::Error;

    fn try_from(wd: Weekday) -> anyhow::Result<WeekStart> {
        match wd {
            Weekday::Sunday => Ok(WeekStart::Sunday),
            Weekday::Monday => Ok(WeekStart::Monday),
            _ => anyhow::bail!(
                "weeks starting on {wd:?} are not supported \
                 (only weeks starting on Sunday or Monday are)",
            ),
        }
    }
}

impl std::fmt::Display for WeekStart {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(abbreviation(self.weekday()))
    }
}

/// Returns the three letter English abbreviation for the given weekday.
pub fn abbreviation(wd: Weekday) -> &'static str {
    match wd {
        Weekday::Sunday => "Sun",
        Weekday::Monday => "Mon",
        Weekday::Tuesday => "Tue",
        Weekday::Wednesday => "Wed",
        Weekday::Thursday => "Thu",
        Weekday::Friday => "Fri",
        Weekday::Saturday => "Sat",
    }
}

/// Decodes a calendar service weekday code.
///
/// Codes count from Sunday: `1` is Sunday, `2` is Monday and so on up to `7`
/// for Saturday. Anything else (including `0`, which calendar services use
/// for "no weekday") returns `None`.
pub fn ecal_weekday(code: i16) -> Option<Weekday> {
    let wd = match code {
        1 => Weekday::Sunday,
        2 => Weekday::Monday,
        3 => Weekday::Tuesday,
        4 => Weekday::Wednesday,
        5 => Weekday::Thursday,
        6 => Weekday::Friday,
        7 => Weekday::Saturday,
        _ => return None,
    };
    Some(wd)
}

/// Decodes a packed "nth weekday" code into a signed week ordinal and a
/// weekday.
///
/// The low three bits of the magnitude hold the weekday (see `ecal_weekday`)
/// and the remaining bits hold the week ordinal. The sign of the code is the
/// sign of the ordinal, so a negative ordinal counts from the end of the
/// period. For example, `36` is the 4th Wednesday, `9` is the 1st Sunday,
/// `-9` is the last Sunday and `-17` is the second to last Sunday.
///
/// A code without a week (i.e., `1..=7`) decodes to week `0`, which selects
/// every occurrence of the weekday.
///
/// This returns `None` when the weekday bits don't name a weekday or when the
/// ordinal doesn't fit in an `i8`.
pub fn decode_packed(code: i16) -> Option<(i8, Weekday)> {
    let magnitude = code.checked_abs()?;
    let weekday = ecal_weekday(magnitude & 7)?;
    let week = i8::try_from(magnitude >> 3).ok()?;
    Some((if code < 0 { -week } else { week }, weekday))
}
