use calrecur::{Frequency, RepetitionDescription};

use crate::{caltime, rule, snapshot};

/// The description a calendar service produces for "the Nth weekday of
/// every month" when the week ordinal is packed into the weekday code.
fn packed(code: i16) -> RepetitionDescription {
    let mut desc = RepetitionDescription::new(Frequency::Monthly);
    desc.by_day([code]);
    desc
}

/// The description a calendar service produces for "the Nth weekday of
/// every month" when the week ordinal is given as a set position.
fn positioned(weekday: i16, pos: i16) -> RepetitionDescription {
    let mut desc = RepetitionDescription::new(Frequency::Monthly);
    desc.by_day([weekday]).by_set_pos([pos]);
    desc
}

#[test]
fn every_fourth_wednesday() {
    let rule = rule(&packed(36));
    assert_eq!(rule.shorthand(), None);
    insta::assert_snapshot!(
        rule,
        @"{inc={months+=1}, subit=month-weekdays[4-Wed]}",
    );
    let range = rule.range_from(&caltime("2022-02-10T00:00"));
    assert!(!range.is_finite());
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2022-02-10 Thu 00:00
    2022-02-23 Wed 00:00
    2022-03-23 Wed 00:00
    2022-04-27 Wed 00:00
    2022-05-25 Wed 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-24T13:30")).take(2)),
        @r"
    2022-04-27 Wed 00:00
    2022-05-25 Wed 00:00
    ",
    );
}

#[test]
fn every_first_sunday() {
    let mut desc = packed(9);
    desc.count(77);
    let rule = rule(&desc);
    assert_eq!(rule.shorthand(), None);
    let range = rule.range_from(&caltime("2022-02-06T00:00"));
    assert!(range.is_finite());
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2022-02-06 Sun 00:00
    2022-03-06 Sun 00:00
    2022-04-03 Sun 00:00
    2022-05-01 Sun 00:00
    2022-06-05 Sun 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-03 Sun 00:00
    2022-05-01 Sun 00:00
    ",
    );
    assert_eq!(range.all().count(), 77);
}

#[test]
fn every_second_sunday() {
    let range = rule(&packed(17)).range_from(&caltime("2022-02-13T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2022-02-13 Sun 00:00
    2022-03-13 Sun 00:00
    2022-04-10 Sun 00:00
    2022-05-08 Sun 00:00
    2022-06-12 Sun 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-10 Sun 00:00
    2022-05-08 Sun 00:00
    ",
    );
}

#[test]
fn every_second_saturday() {
    let range = rule(&packed(23)).range_from(&caltime("2022-02-12T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2022-02-12 Sat 00:00
    2022-03-12 Sat 00:00
    2022-04-09 Sat 00:00
    2022-05-14 Sat 00:00
    2022-06-11 Sat 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-09 Sat 00:00
    2022-05-14 Sat 00:00
    ",
    );
}

#[test]
fn every_last_sunday() {
    let expected = "\
2022-01-30 Sun 00:00
2022-02-27 Sun 00:00
2022-03-27 Sun 00:00
2022-04-24 Sun 00:00
2022-05-29 Sun 00:00";
    // Both encodings calendar services use for "last Sunday" must agree.
    for desc in [packed(-9), positioned(1, -1)] {
        let range = rule(&desc).range_from(&caltime("2022-01-30T00:00"));
        assert!(!range.is_finite());
        assert_eq!(snapshot(range.all().take(5)), expected);
        assert_eq!(
            snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
            "2022-04-24 Sun 00:00\n2022-05-29 Sun 00:00",
        );
    }
}

#[test]
fn every_last_friday() {
    let range = rule(&packed(-14)).range_from(&caltime("2022-01-28T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2022-01-28 Fri 00:00
    2022-02-25 Fri 00:00
    2022-03-25 Fri 00:00
    2022-04-29 Fri 00:00
    2022-05-27 Fri 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-29 Fri 00:00
    2022-05-27 Fri 00:00
    ",
    );
}

/// Tests a negative packed ordinal beyond the last week.
#[test]
fn every_second_to_last_sunday() {
    let rule = rule(&packed(-17));
    insta::assert_snapshot!(
        rule,
        @"{inc={months+=1}, subit=month-weekdays[-2-Sun]}",
    );
    let range = rule.range_from(&caltime("2022-01-23T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(4)),
        @r"
    2022-01-23 Sun 00:00
    2022-02-20 Sun 00:00
    2022-03-20 Sun 00:00
    2022-04-17 Sun 00:00
    ",
    );
}

#[test]
fn every_last_monday() {
    let rule = rule(&positioned(2, -1));
    insta::assert_snapshot!(
        rule,
        @"{inc={months+=1}, subit=month-weekdays[-1-Mon]}",
    );
    let range = rule.range_from(&caltime("2022-01-31T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2022-01-31 Mon 00:00
    2022-02-28 Mon 00:00
    2022-03-28 Mon 00:00
    2022-04-25 Mon 00:00
    2022-05-30 Mon 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-25 Mon 00:00
    2022-05-30 Mon 00:00
    ",
    );
}

#[test]
fn every_third_monday() {
    let range =
        rule(&positioned(2, 3)).range_from(&caltime("2021-11-15T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2021-11-15 Mon 00:00
    2021-12-20 Mon 00:00
    2022-01-17 Mon 00:00
    2022-02-21 Mon 00:00
    2022-03-21 Mon 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-18 Mon 00:00
    2022-05-16 Mon 00:00
    ",
    );
}

#[test]
fn every_third_sunday() {
    let rule = rule(&positioned(1, 3));
    insta::assert_snapshot!(
        rule,
        @"{inc={months+=1}, subit=month-weekdays[3-Sun]}",
    );
    let range = rule.range_from(&caltime("2021-11-21T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2021-11-21 Sun 00:00
    2021-12-19 Sun 00:00
    2022-01-16 Sun 00:00
    2022-02-20 Sun 00:00
    2022-03-20 Sun 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-17 Sun 00:00
    2022-05-15 Sun 00:00
    ",
    );
}

#[test]
fn second_day_every_two_months() {
    let rule = rule(
        RepetitionDescription::new(Frequency::Monthly)
            .interval(2)
            .by_month_day([2]),
    );
    assert_eq!(rule.shorthand(), None);
    insta::assert_snapshot!(rule, @"{inc={months+=2}, subit=month-days[2]}");
    let range = rule.range_from(&caltime("2022-02-02T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(5)),
        @r"
    2022-02-02 Wed 00:00
    2022-04-02 Sat 00:00
    2022-06-02 Thu 00:00
    2022-08-02 Tue 00:00
    2022-10-02 Sun 00:00
    ",
    );
    insta::assert_snapshot!(
        snapshot(range.starting(&caltime("2022-04-01T13:30")).take(2)),
        @r"
    2022-04-02 Sat 00:00
    2022-06-02 Thu 00:00
    ",
    );
}

/// Tests that the last day of the month follows the length of each month.
#[test]
fn last_day_of_month() {
    let rule = rule(
        RepetitionDescription::new(Frequency::Monthly).by_month_day([-1]),
    );
    let range = rule.range_from(&caltime("2024-01-31T09:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(4)),
        @r"
    2024-01-31 Wed 09:00
    2024-02-29 Thu 09:00
    2024-03-31 Sun 09:00
    2024-04-30 Tue 09:00
    ",
    );
}

/// Tests that a plain monthly repetition from the 31st clamps to the last
/// day of shorter months.
#[test]
fn monthly_from_end_of_month() {
    let rule = rule(&RepetitionDescription::new(Frequency::Monthly));
    assert_eq!(rule.shorthand(), Some("+1M"));
    let range = rule.range_from(&caltime("2022-01-31T09:00"));
    let dates: Vec<String> =
        range.all().take(3).map(|t| t.date_str()).collect();
    assert_eq!(dates[0], "2022-01-31 Mon");
    assert_eq!(dates[1], "2022-02-28 Mon");
    // Each step starts from the previous occurrence, so the clamped day
    // sticks.
    assert_eq!(dates[2], "2022-03-28 Mon");
}

/// Tests that a plain weekday code at monthly frequency selects every such
/// weekday in the month.
#[test]
fn every_tuesday_of_every_month() {
    let rule = rule(&packed(3));
    insta::assert_snapshot!(
        rule,
        @"{inc={months+=1}, subit=month-weekdays[Tue]}",
    );
    let range = rule.range_from(&caltime("2022-02-01T18:00"));
    insta::assert_snapshot!(
        snapshot(range.all().take(6)),
        @r"
    2022-02-01 Tue 18:00
    2022-02-08 Tue 18:00
    2022-02-15 Tue 18:00
    2022-02-22 Tue 18:00
    2022-03-01 Tue 18:00
    2022-03-08 Tue 18:00
    ",
    );
}

#[test]
fn count_covers_anchor_and_matches() {
    let mut desc = positioned(6, -1);
    desc.count(3);
    // The anchor doesn't match "last Friday", but still counts.
    let range = rule(&desc).range_from(&caltime("2022-01-10T00:00"));
    insta::assert_snapshot!(
        snapshot(range.all()),
        @r"
    2022-01-10 Mon 00:00
    2022-01-28 Fri 00:00
    2022-02-25 Fri 00:00
    ",
    );
}

/// Tests that a monthly time pushed forward by a DST gap returns to its wall
/// clock time the month after.
#[test]
fn monthly_across_dst_gap() {
    let rule = rule(&RepetitionDescription::new(Frequency::Monthly));
    let range = rule.range_from(&caltime("2022-02-27T02:30/Europe/Berlin"));
    insta::assert_snapshot!(
        snapshot(range.all().take(4)),
        @r"
    2022-02-27 Sun 02:30
    2022-03-27 Sun 03:30
    2022-04-27 Wed 02:30
    2022-05-27 Fri 02:30
    ",
    );
}
