use anyhow::Context;

use crate::rule::Frequency;

/// Settings controlling how simple recurrences are summarized.
///
/// A recurrence with no selectors and no bounds can be written as a short
/// repeater code like `+3w` or `+1M`, which outline renderers with native
/// recurrence support can use instead of expanding occurrences. This
/// configures whether such codes are produced at all, and which designator
/// is used for each frequency.
#[derive(Clone, Debug, Default, Eq, PartialEq)]
pub struct Config {
    shorthand_disabled: bool,
    units: ShorthandUnits,
}

impl Config {
    /// Read the configuration from the environment, falling back to the
    /// defaults for anything that isn't set.
    ///
    /// `CALRECUR_SHORTHAND` enables or disables shorthand codes.
    /// `CALRECUR_SHORTHAND_UNITS` sets the designators, given as six comma
    /// separated values for minutes, hours, days, weeks, months and years.
    pub fn from_env() -> anyhow::Result<Config> {
        let mut config = Config::default();
        if let Some(enabled) = read_env_shorthand()? {
            config.enable_shorthand(enabled);
        }
        if let Some(units) = read_env_shorthand_units()? {
            config.set_units(units);
        }
        Ok(config)
    }

    pub fn enable_shorthand(&mut self, yes: bool) -> &mut Config {
        self.shorthand_disabled = !yes;
        self
    }

    pub fn set_units(&mut self, units: ShorthandUnits) -> &mut Config {
        self.units = units;
        self
    }

    pub fn shorthand_enabled(&self) -> bool {
        !self.shorthand_disabled
    }

    pub fn units(&self) -> &ShorthandUnits {
        &self.units
    }

    /// Returns the shorthand code for repeating every `interval` units of
    /// `freq`, e.g., `+3w`.
    ///
    /// This returns `None` when shorthand codes are disabled and for
    /// second-based repetition, which has no shorthand.
    pub fn shorthand(&self, freq: Frequency, interval: i32) -> Option<String> {
        if self.shorthand_disabled {
            return None;
        }
        let unit = self.units.designator(freq)?;
        Some(format!("+{interval}{unit}"))
    }
}

/// The designator used in shorthand codes for each frequency.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ShorthandUnits {
    minute: String,
    hour: String,
    day: String,
    week: String,
    month: String,
    year: String,
}

impl ShorthandUnits {
    /// Returns the designator for the given frequency, if it has one.
    pub fn designator(&self, freq: Frequency) -> Option<&str> {
        let unit = match freq {
            Frequency::Secondly => return None,
            Frequency::Minutely => &self.minute,
            Frequency::Hourly => &self.hour,
            Frequency::Daily => &self.day,
            Frequency::Weekly => &self.week,
            Frequency::Monthly => &self.month,
            Frequency::Yearly => &self.year,
        };
        Some(unit.as_str())
    }
}

impl Default for ShorthandUnits {
    fn default() -> ShorthandUnits {
        ShorthandUnits {
            minute: "m".to_string(),
            hour: "h".to_string(),
            day: "d".to_string(),
            week: "w".to_string(),
            month: "M".to_string(),
            year: "Y".to_string(),
        }
    }
}

impl std::str::FromStr for ShorthandUnits {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<ShorthandUnits> {
        let units: Vec<&str> = s.split(',').map(|unit| unit.trim()).collect();
        let [minute, hour, day, week, month, year] = units[..] else {
            anyhow::bail!(
                "expected 6 comma separated shorthand designators \
                 (for minutes, hours, days, weeks, months and years), \
                 but got {} in `{s}`",
                units.len(),
            );
        };
        for unit in units.iter() {
            anyhow::ensure!(
                !unit.is_empty(),
                "shorthand designators must not be empty, but got `{s}`",
            );
            anyhow::ensure!(
                !unit.starts_with(|c: char| c.is_ascii_digit()),
                "shorthand designator `{unit}` must not start with a digit",
            );
        }
        Ok(ShorthandUnits {
            minute: minute.to_string(),
            hour: hour.to_string(),
            day: day.to_string(),
            week: week.to_string(),
            month: month.to_string(),
            year: year.to_string(),
        })
    }
}

impl std::fmt::Display for ShorthandUnits {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{},{},{},{},{},{}",
            self.minute, self.hour, self.day, self.week, self.month, self.year,
        )
    }
}

fn read_env_shorthand() -> anyhow::Result<Option<bool>> {
    let Some(val) = std::env::var_os("CALRECUR_SHORTHAND") else {
        return Ok(None);
    };
    let Some(val) = val.to_str() else {
        anyhow::bail!(
            "`CALRECUR_SHORTHAND` environment variable is not valid UTF-8: \
             {val:?}"
        )
    };
    parse_switch(val)
        .context("`CALRECUR_SHORTHAND` environment variable is not a switch")
        .map(Some)
}

fn read_env_shorthand_units() -> anyhow::Result<Option<ShorthandUnits>> {
    let Some(val) = std::env::var_os("CALRECUR_SHORTHAND_UNITS") else {
        return Ok(None);
    };
    let Some(val) = val.to_str() else {
        anyhow::bail!(
            "`CALRECUR_SHORTHAND_UNITS` environment variable is not valid \
             UTF-8: {val:?}"
        )
    };
    let units = val.parse::<ShorthandUnits>().context(
        "failed to parse `CALRECUR_SHORTHAND_UNITS` environment variable",
    )?;
    Ok(Some(units))
}

fn parse_switch(s: &str) -> anyhow::Result<bool> {
    match &*s.trim().to_lowercase() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        unk => anyhow::bail!(
            "unrecognized switch value `{unk}` \
             (expected one of 1, true, yes, on, 0, false, no or off)"
        ),
    }
}
