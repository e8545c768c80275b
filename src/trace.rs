// This module defines the trace sink used by recurrence ranges. Each range
// owns a sink, handed to it at construction, rather than consulting some
// process wide hook. By default, events are forwarded to the `log` crate at
// trace level, which means they cost nothing unless a logger is installed
// and the max level permits it.

use crate::caltime::CalendarTime;

/// A sink for the events produced while expanding a recurrence range.
pub trait Tracer: std::fmt::Debug + Send + Sync {
    fn trace(&self, event: &TraceEvent<'_>);
}

/// Which part of the expansion produced an event.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum Phase {
    /// The anchor itself, which is always a candidate occurrence.
    Anchor,
    /// The rest of the anchor's own period.
    CatchUp,
    /// Every period after the anchor's.
    Free,
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match *self {
            Phase::Anchor => "anchor",
            Phase::CatchUp => "catch-up",
            Phase::Free => "free",
        };
        f.write_str(name)
    }
}

/// Why a traversal stopped.
#[derive(Clone, Copy, Debug, Eq, Hash, PartialEq)]
pub enum FinishReason {
    /// The next candidate was after the until bound.
    Until,
    /// The count bound was reached.
    Count,
    /// The next candidate couldn't be represented.
    Overflow,
}

impl std::fmt::Display for FinishReason {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        let name = match *self {
            FinishReason::Until => "until bound reached",
            FinishReason::Count => "count exhausted",
            FinishReason::Overflow => "arithmetic overflow",
        };
        f.write_str(name)
    }
}

/// A single step of a recurrence range traversal.
#[derive(Clone, Debug)]
pub enum TraceEvent<'a> {
    Start {
        start: &'a CalendarTime,
        count: Option<u32>,
        until: Option<&'a CalendarTime>,
    },
    Emit {
        phase: Phase,
        at: &'a CalendarTime,
        /// The number of occurrences still allowed after this one, when the
        /// range is bounded by a count.
        remaining: Option<u32>,
    },
    /// A sub-iterator candidate at or before the anchor was dropped.
    Skip { phase: Phase, at: &'a CalendarTime },
    /// A sub-iterator period was entered.
    Period { phase: Phase, base: &'a CalendarTime },
    Finish { phase: Phase, reason: FinishReason },
}

impl<'a> std::fmt::Display for TraceEvent<'a> {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        match *self {
            TraceEvent::Start { start, count, until } => {
                write!(f, "start at {start}")?;
                if let Some(count) = count {
                    write!(f, ", count={count}")?;
                }
                if let Some(until) = until {
                    write!(f, ", until={until}")?;
                }
                Ok(())
            }
            TraceEvent::Emit { phase, at, remaining } => {
                write!(f, "{phase}: emit {at}")?;
                if let Some(remaining) = remaining {
                    write!(f, " ({remaining} remaining)")?;
                }
                Ok(())
            }
            TraceEvent::Skip { phase, at } => {
                write!(f, "{phase}: skip {at}")
            }
            TraceEvent::Period { phase, base } => {
                write!(f, "{phase}: period at {base}")
            }
            TraceEvent::Finish { phase, reason } => {
                write!(f, "{phase}: finished, {reason}")
            }
        }
    }
}

/// Forwards every event to `log::trace!`.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogTracer;

impl Tracer for LogTracer {
    fn trace(&self, event: &TraceEvent<'_>) {
        log::trace!("{event}");
    }
}

/// Discards every event.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoTracer;

impl Tracer for NoTracer {
    fn trace(&self, _: &TraceEvent<'_>) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let t: CalendarTime = "2020-01-28T11:00".parse().unwrap();
        let u: CalendarTime = "2020-02-01T11:00".parse().unwrap();
        let events = [
            TraceEvent::Start { start: &t, count: Some(5), until: Some(&u) },
            TraceEvent::Emit {
                phase: Phase::Anchor,
                at: &t,
                remaining: Some(4),
            },
            TraceEvent::Skip { phase: Phase::CatchUp, at: &t },
            TraceEvent::Period { phase: Phase::Free, base: &u },
            TraceEvent::Emit { phase: Phase::Free, at: &u, remaining: None },
            TraceEvent::Finish {
                phase: Phase::Free,
                reason: FinishReason::Count,
            },
        ];
        let lines = events
            .iter()
            .map(|e| e.to_string())
            .collect::<Vec<String>>()
            .join("\n");
        insta::assert_snapshot!(
            lines,
            @r"
        start at 2020-01-28T11:00:00+00:00[UTC], count=5, until=2020-02-01T11:00:00+00:00[UTC]
        anchor: emit 2020-01-28T11:00:00+00:00[UTC] (4 remaining)
        catch-up: skip 2020-01-28T11:00:00+00:00[UTC]
        free: period at 2020-02-01T11:00:00+00:00[UTC]
        free: emit 2020-02-01T11:00:00+00:00[UTC]
        free: finished, count exhausted
        ",
        );
    }
}
