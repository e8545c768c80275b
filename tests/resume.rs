use std::sync::{Arc, Mutex};

use calrecur::{
    CalendarTime, FinishReason, Frequency, Recurrence, RepetitionDescription,
    TraceEvent, Tracer,
};

use crate::{caltime, rule, snapshot};

/// A handful of rules that exercise every kind of sub-iterator.
fn rules() -> Vec<Recurrence> {
    vec![
        rule(RepetitionDescription::new(Frequency::Daily).interval(3)),
        rule(RepetitionDescription::new(Frequency::Weekly).by_day([2, 6])),
        rule(
            RepetitionDescription::new(Frequency::Weekly)
                .interval(2)
                .by_day([1, 4])
                .week_start(jiff::civil::Weekday::Sunday),
        ),
        rule(RepetitionDescription::new(Frequency::Monthly).by_day([-9, 10])),
        rule(
            RepetitionDescription::new(Frequency::Monthly)
                .by_month_day([1, 15, -1]),
        ),
        rule(RepetitionDescription::new(Frequency::Yearly).by_day([3])),
    ]
}

/// Tests that resuming at any time produces exactly the occurrences at or
/// after that time, in the same order as a full traversal.
#[test]
fn starting_agrees_with_full_traversal() {
    let anchor = caltime("2022-01-19T08:30");
    let cutoffs = [
        caltime("2021-12-01T00:00"),
        caltime("2022-01-19T08:30"),
        caltime("2022-01-19T08:31"),
        caltime("2022-02-28T00:00"),
        caltime("2022-03-31T08:30"),
        caltime("2022-07-04T23:59"),
    ];
    for rule in rules() {
        let range = rule.range_from(&anchor);
        let all: Vec<CalendarTime> = range.all().take(60).collect();
        let last = all.last().unwrap().clone();
        for cutoff in cutoffs.iter().filter(|&c| *c <= last) {
            let expected: Vec<&CalendarTime> =
                all.iter().filter(|t| *t >= cutoff).collect();
            let got: Vec<CalendarTime> =
                range.starting(cutoff).take(expected.len()).collect();
            assert_eq!(
                got.iter().collect::<Vec<&CalendarTime>>(),
                expected,
                "rule {rule} resumed at {cutoff}",
            );
        }
    }
}

/// Tests that resuming at each occurrence yields that occurrence and
/// everything after it.
#[test]
fn starting_at_each_occurrence() {
    let anchor = caltime("2022-01-19T08:30");
    for rule in rules() {
        let range = rule.range_from(&anchor);
        let all: Vec<CalendarTime> = range.all().take(40).collect();
        for (i, t) in all.iter().enumerate() {
            let expected = &all[i..];
            let got: Vec<CalendarTime> =
                range.starting(t).take(expected.len()).collect();
            assert_eq!(got, expected, "rule {rule} resumed at {t}");
        }
    }
}

/// Tests that occurrences are strictly increasing and that the anchor is
/// always first.
#[test]
fn occurrences_are_strictly_increasing() {
    let anchor = caltime("2022-01-19T08:30");
    for rule in rules() {
        let range = rule.range_from(&anchor);
        let all: Vec<CalendarTime> = range.all().take(100).collect();
        assert_eq!(all[0], anchor);
        for pair in all.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a < b, "rule {rule}: {a} >= {b}");
        }
    }
}

#[test]
fn between_is_half_open() {
    let rule =
        rule(RepetitionDescription::new(Frequency::Weekly).by_day([2, 6]));
    let range = rule.range_from(&caltime("2022-01-03T09:00"));
    insta::assert_snapshot!(
        snapshot(range.between(
            &caltime("2022-01-10T09:00"),
            &caltime("2022-01-24T09:00"),
        )),
        @r"
    2022-01-10 Mon 09:00
    2022-01-14 Fri 09:00
    2022-01-17 Mon 09:00
    2022-01-21 Fri 09:00
    ",
    );
}

/// Tests that one rule can be anchored at both ends of an event.
#[test]
fn start_and_end_ranges_are_independent() {
    let rule = rule(RepetitionDescription::new(Frequency::Weekly).count(3));
    let starts = rule.range_from(&caltime("2022-01-03T09:00"));
    let ends = rule.range_from(&caltime("2022-01-03T10:30"));
    let pairs: Vec<String> = starts
        .all()
        .zip(ends.all())
        .map(|(s, e)| {
            format!("{} {}-{}", s.date_str(), s.time_str(), e.time_str())
        })
        .collect();
    insta::assert_snapshot!(
        pairs.join("\n"),
        @r"
    2022-01-03 Mon 09:00-10:30
    2022-01-10 Mon 09:00-10:30
    2022-01-17 Mon 09:00-10:30
    ",
    );
}

#[derive(Debug, Default)]
struct Finishes {
    reasons: Mutex<Vec<FinishReason>>,
}

impl Tracer for Finishes {
    fn trace(&self, event: &TraceEvent<'_>) {
        if let TraceEvent::Finish { reason, .. } = *event {
            self.reasons.lock().unwrap().push(reason);
        }
    }
}

#[test]
fn finish_reasons_are_traced() {
    let finishes = Arc::new(Finishes::default());
    let counted = rule(RepetitionDescription::new(Frequency::Daily).count(2));
    let range = counted.range_from_with_tracer(
        &caltime("2022-01-03T09:00"),
        finishes.clone(),
    );
    assert_eq!(range.all().count(), 2);

    let bounded = rule(
        RepetitionDescription::new(Frequency::Monthly)
            .by_month_day([31])
            .until(caltime("2022-05-01T00:00")),
    );
    let range = bounded.range_from_with_tracer(
        &caltime("2022-01-31T09:00"),
        finishes.clone(),
    );
    insta::assert_snapshot!(
        snapshot(range.all()),
        @r"
    2022-01-31 Mon 09:00
    2022-03-31 Thu 09:00
    ",
    );
    assert_eq!(
        *finishes.reasons.lock().unwrap(),
        vec![FinishReason::Count, FinishReason::Until],
    );
}
