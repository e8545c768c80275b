use std::sync::Arc;

use jiff::{civil, tz::TimeZone};

use crate::{
    caltime::CalendarTime,
    increment::{Cursor, Increment},
    subiter::{Period, Subiterator},
    trace::{FinishReason, LogTracer, Phase, TraceEvent, Tracer},
};

/// The full sequence of occurrences of one recurrence anchored at one time.
///
/// A range is immutable and cheap to clone. Each call to `all` or `starting`
/// creates an independent cursor over the same sequence, so a range can be
/// traversed any number of times.
///
/// The sequence may be infinite. Use `is_finite` to check, and bound the
/// traversal (with `take`, `between` or similar) when it isn't.
#[derive(Clone, Debug)]
pub struct RecurrenceRange {
    inner: Arc<RangeInner>,
}

#[derive(Debug)]
struct RangeInner {
    start: CalendarTime,
    increment: Increment,
    subiterator: Option<Subiterator>,
    count: Option<u32>,
    /// Always in the time zone of `start`.
    until: Option<CalendarTime>,
    tracer: Arc<dyn Tracer>,
}

impl RecurrenceRange {
    /// Create a new range with the default trace sink.
    ///
    /// A `count` of `0` means the range isn't bounded by a count. The
    /// `until` bound, when present, is inclusive.
    pub fn new(
        start: CalendarTime,
        increment: Increment,
        subiterator: Option<Subiterator>,
        count: u32,
        until: Option<CalendarTime>,
    ) -> RecurrenceRange {
        let mut builder = RecurrenceRange::builder(start, increment);
        builder.count(count);
        if let Some(sub) = subiterator {
            builder.subiterator(sub);
        }
        if let Some(until) = until {
            builder.until(until);
        }
        builder.build()
    }

    /// Returns a builder for constructing a `RecurrenceRange`.
    ///
    /// The anchor and the increment are the only two things required.
    pub fn builder(
        start: CalendarTime,
        increment: Increment,
    ) -> RecurrenceRangeBuilder {
        RecurrenceRangeBuilder::new(start, increment)
    }

    /// Returns every occurrence, starting with the anchor.
    pub fn all(&self) -> Occurrences<'_> {
        let inner = &*self.inner;
        inner.tracer.trace(&TraceEvent::Start {
            start: &inner.start,
            count: inner.count,
            until: inner.until.as_ref(),
        });
        Occurrences {
            range: self,
            remaining: inner.count,
            state: State::Anchor,
        }
    }

    /// Returns every occurrence at or after `t`.
    ///
    /// This produces exactly what filtering `all` to `>= t` would. Skipped
    /// occurrences are generated and discarded, but nothing is generated
    /// twice.
    pub fn starting(&self, t: &CalendarTime) -> Starting<'_> {
        Starting { it: self.all(), from: Some(t.in_tz(self.time_zone())) }
    }

    /// Returns every occurrence in the half open interval `[from, to)`.
    ///
    /// This always terminates, even when the range is infinite.
    pub fn between<'r>(
        &'r self,
        from: &CalendarTime,
        to: &CalendarTime,
    ) -> impl Iterator<Item = CalendarTime> + use<'r> {
        let to = to.clone();
        self.starting(from).take_while(move |t| *t < to)
    }

    /// Returns true if and only if this range is bounded by a count or an
    /// until time.
    pub fn is_finite(&self) -> bool {
        self.inner.count.is_some() || self.inner.until.is_some()
    }

    /// The anchor of this range, which is always its first candidate.
    pub fn start_date(&self) -> &CalendarTime {
        &self.inner.start
    }

    /// The time zone every occurrence is rendered in.
    pub fn time_zone(&self) -> &TimeZone {
        self.inner.start.time_zone()
    }

    pub fn increment(&self) -> &Increment {
        &self.inner.increment
    }

    pub fn subiterator(&self) -> Option<&Subiterator> {
        self.inner.subiterator.as_ref()
    }

    /// The maximum number of occurrences, if bounded by a count.
    pub fn count(&self) -> Option<u32> {
        self.inner.count
    }

    /// The last instant an occurrence may fall on, if any.
    pub fn until(&self) -> Option<&CalendarTime> {
        self.inner.until.as_ref()
    }
}

impl<'r> IntoIterator for &'r RecurrenceRange {
    type IntoIter = Occurrences<'r>;
    type Item = CalendarTime;

    fn into_iter(self) -> Occurrences<'r> {
        self.all()
    }
}

/// A builder for constructing a recurrence range.
#[derive(Clone, Debug)]
pub struct RecurrenceRangeBuilder {
    start: CalendarTime,
    increment: Increment,
    subiterator: Option<Subiterator>,
    count: u32,
    until: Option<CalendarTime>,
    tracer: Arc<dyn Tracer>,
}

impl RecurrenceRangeBuilder {
    fn new(
        start: CalendarTime,
        increment: Increment,
    ) -> RecurrenceRangeBuilder {
        RecurrenceRangeBuilder {
            start,
            increment,
            subiterator: None,
            count: 0,
            until: None,
            tracer: Arc::new(LogTracer),
        }
    }

    pub fn build(&self) -> RecurrenceRange {
        let tz = self.start.time_zone();
        let inner = Arc::new(RangeInner {
            start: self.start.clone(),
            increment: self.increment.clone(),
            subiterator: self.subiterator.clone(),
            count: (self.count > 0).then_some(self.count),
            until: self.until.as_ref().map(|until| until.in_tz(tz)),
            tracer: Arc::clone(&self.tracer),
        });
        RecurrenceRange { inner }
    }

    pub fn subiterator(
        &mut self,
        subiterator: Subiterator,
    ) -> &mut RecurrenceRangeBuilder {
        self.subiterator = Some(subiterator);
        self
    }

    /// Bound the range to at most `count` occurrences. Zero means unbounded.
    pub fn count(&mut self, count: u32) -> &mut RecurrenceRangeBuilder {
        self.count = count;
        self
    }

    /// Bound the range to occurrences at or before `until`.
    pub fn until(
        &mut self,
        until: CalendarTime,
    ) -> &mut RecurrenceRangeBuilder {
        self.until = Some(until);
        self
    }

    /// Send trace events to the given sink instead of the `log` crate.
    pub fn tracer(
        &mut self,
        tracer: Arc<dyn Tracer>,
    ) -> &mut RecurrenceRangeBuilder {
        self.tracer = tracer;
        self
    }
}

/// An iterator over every occurrence in a recurrence range.
///
/// Expansion proceeds in three phases. First, the anchor itself is emitted.
/// Second, when there is a sub-iterator, the rest of the anchor's period is
/// searched for matches after the anchor. Third, the increment is applied
/// repeatedly, with each new position either emitted directly or, when there
/// is a sub-iterator, used as the start of a new period to search.
#[derive(Clone, Debug)]
pub struct Occurrences<'r> {
    range: &'r RecurrenceRange,
    /// The number of occurrences that may still be emitted, when bounded.
    remaining: Option<u32>,
    state: State,
}

#[derive(Clone, Debug)]
enum State {
    Anchor,
    /// Searching the period containing the anchor, whose first day is
    /// `base`.
    CatchUp { base: CalendarTime, period: Period },
    /// Positioned at `pos`. When `period` is `None`, the position hasn't been
    /// checked against the bounds yet.
    Free { pos: Cursor, period: Option<Period> },
    Done,
}

/// The outcome of searching a period for its next occurrence.
enum Pull {
    Emit(CalendarTime),
    Stop(FinishReason),
    Exhausted,
}

impl<'r> Occurrences<'r> {
    fn inner(&self) -> &'r RangeInner {
        let range: &'r RecurrenceRange = self.range;
        &range.inner
    }

    fn trace(&self, event: TraceEvent<'_>) {
        self.inner().tracer.trace(&event);
    }

    /// Returns the reason `t` may not be emitted, if any.
    fn bound(&self, t: &CalendarTime) -> Option<FinishReason> {
        if self.remaining == Some(0) {
            return Some(FinishReason::Count);
        }
        match self.inner().until {
            Some(ref until) if t > until => Some(FinishReason::Until),
            _ => None,
        }
    }

    fn emit(&mut self, phase: Phase, t: CalendarTime) -> CalendarTime {
        if let Some(ref mut remaining) = self.remaining {
            *remaining = remaining.saturating_sub(1);
        }
        self.trace(TraceEvent::Emit {
            phase,
            at: &t,
            remaining: self.remaining,
        });
        t
    }

    fn finish(&mut self, phase: Phase, reason: FinishReason) {
        self.state = State::Done;
        self.trace(TraceEvent::Finish { phase, reason });
    }

    /// Returns a cursor at `t` showing the anchor's wall clock time.
    fn cursor(&self, t: &CalendarTime) -> Cursor {
        let clock: civil::Time = self.inner().start.get().time();
        Cursor::new(t.clone(), clock)
    }

    /// Returns the state following emission of the anchor.
    fn after_anchor(&self) -> State {
        let inner = self.inner();
        let Some(ref sub) = inner.subiterator else {
            return self.advance(Phase::Anchor, &self.cursor(&inner.start));
        };
        match sub.base_date(&inner.start) {
            Ok(base) => {
                self.trace(TraceEvent::Period {
                    phase: Phase::CatchUp,
                    base: &base,
                });
                let period = sub.all_from(&base);
                State::CatchUp { base, period }
            }
            Err(err) => self.overflow(Phase::Anchor, err),
        }
    }

    /// Returns the state positioned one increment after `pos`.
    fn advance(&self, phase: Phase, pos: &Cursor) -> State {
        match pos.step(&self.inner().increment) {
            Ok(pos) => State::Free { pos, period: None },
            Err(err) => self.overflow(phase, err),
        }
    }

    fn overflow(&self, phase: Phase, err: anyhow::Error) -> State {
        log::debug!("recurrence expansion stopped early: {err:#}");
        let reason = FinishReason::Overflow;
        self.trace(TraceEvent::Finish { phase, reason });
        State::Done
    }

    /// Returns the next candidate in `period` that comes after the anchor,
    /// provided it is within bounds.
    fn pull(&mut self, phase: Phase, period: &mut Period) -> Pull {
        let start = &self.inner().start;
        for t in period {
            if t <= *start {
                self.trace(TraceEvent::Skip { phase, at: &t });
                continue;
            }
            if let Some(reason) = self.bound(&t) {
                return Pull::Stop(reason);
            }
            return Pull::Emit(self.emit(phase, t));
        }
        Pull::Exhausted
    }
}

impl<'r> Iterator for Occurrences<'r> {
    type Item = CalendarTime;

    fn next(&mut self) -> Option<CalendarTime> {
        loop {
            match std::mem::replace(&mut self.state, State::Done) {
                State::Done => return None,
                State::Anchor => {
                    let start = &self.inner().start;
                    if let Some(reason) = self.bound(start) {
                        self.finish(Phase::Anchor, reason);
                        return None;
                    }
                    let t = self.emit(Phase::Anchor, start.clone());
                    self.state = self.after_anchor();
                    return Some(t);
                }
                State::CatchUp { base, mut period } => {
                    match self.pull(Phase::CatchUp, &mut period) {
                        Pull::Emit(t) => {
                            self.state = State::CatchUp { base, period };
                            return Some(t);
                        }
                        Pull::Stop(reason) => {
                            self.finish(Phase::CatchUp, reason);
                            return None;
                        }
                        Pull::Exhausted => {
                            let pos = self.cursor(&base);
                            self.state = self.advance(Phase::CatchUp, &pos);
                        }
                    }
                }
                State::Free { pos, period: Some(mut period) } => {
                    match self.pull(Phase::Free, &mut period) {
                        Pull::Emit(t) => {
                            self.state =
                                State::Free { pos, period: Some(period) };
                            return Some(t);
                        }
                        Pull::Stop(reason) => {
                            self.finish(Phase::Free, reason);
                            return None;
                        }
                        Pull::Exhausted => {
                            self.state = self.advance(Phase::Free, &pos);
                        }
                    }
                }
                State::Free { pos, period: None } => {
                    if let Some(reason) = self.bound(pos.time()) {
                        self.finish(Phase::Free, reason);
                        return None;
                    }
                    let Some(ref sub) = self.inner().subiterator else {
                        let t = self.emit(Phase::Free, pos.time().clone());
                        self.state = self.advance(Phase::Free, &pos);
                        return Some(t);
                    };
                    self.trace(TraceEvent::Period {
                        phase: Phase::Free,
                        base: pos.time(),
                    });
                    let period = sub.all_from(pos.time());
                    self.state = State::Free { pos, period: Some(period) };
                }
            }
        }
    }
}

impl<'r> std::iter::FusedIterator for Occurrences<'r> {}

/// An iterator over the occurrences of a range at or after some time.
///
/// This is created by `RecurrenceRange::starting`.
#[derive(Clone, Debug)]
pub struct Starting<'r> {
    it: Occurrences<'r>,
    /// Set until the first occurrence has been found.
    from: Option<CalendarTime>,
}

impl<'r> Iterator for Starting<'r> {
    type Item = CalendarTime;

    fn next(&mut self) -> Option<CalendarTime> {
        let Some(from) = self.from.take() else { return self.it.next() };
        self.it.find(|t| *t >= from)
    }
}

impl<'r> std::iter::FusedIterator for Starting<'r> {}
