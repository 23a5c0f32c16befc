//! Post shift-set validation: acceptance examples and the commit-or-nothing rule.

use rstest::rstest;
use roster_core::{Post, RosterError, Shift, SlotDefinition, TimeOfDay};

fn shift(id: &str, start: &str, end: &str) -> Shift {
    Shift::new(
        id,
        start.parse::<TimeOfDay>().expect("start"),
        end.parse::<TimeOfDay>().expect("end"),
        vec![SlotDefinition::any(); 2],
    )
    .expect("shift")
}

// ---------------------------------------------------------------------------
// 1. Acceptance examples
// ---------------------------------------------------------------------------

#[test]
fn afternoon_then_overnight_is_accepted() {
    let mut post = Post::new("gate", "Main gate");
    post.add_shift(shift("swing", "14:00", "22:00")).expect("swing");
    post.add_shift(shift("night", "22:00", "06:00")).expect("night");
    assert_eq!(post.shifts().len(), 2);
}

#[test]
fn overlapping_early_shifts_are_rejected() {
    let mut post = Post::new("gate", "Main gate");
    post.add_shift(shift("a", "00:00", "04:00")).expect("first");
    let err = post.add_shift(shift("b", "02:00", "08:00")).unwrap_err();
    assert!(matches!(err, RosterError::OverlappingShifts { .. }), "got: {err}");
    assert_eq!(post.shifts().len(), 1, "failed add must not change the post");
}

// ---------------------------------------------------------------------------
// 2. Accept iff ids unique and quanta disjoint
// ---------------------------------------------------------------------------

#[rstest]
#[case::adjacent(&[("a", "06:00", "14:00"), ("b", "14:00", "22:00")], true)]
#[case::full_day_cover(&[("a", "06:00", "14:00"), ("b", "14:00", "22:00"), ("c", "22:00", "06:00")], true)]
#[case::midnight_boundary(&[("a", "18:00", "00:00"), ("b", "00:00", "06:00")], true)]
#[case::single_quantum(&[("a", "23:45", "00:00"), ("b", "00:00", "00:15")], true)]
#[case::wrap_collides_with_morning(&[("a", "22:00", "06:00"), ("b", "05:45", "07:00")], false)]
#[case::contained(&[("a", "06:00", "18:00"), ("b", "08:00", "09:00")], false)]
#[case::whole_day_plus_one(&[("a", "00:00", "00:00"), ("b", "12:00", "13:00")], false)]
#[case::duplicate_id(&[("a", "06:00", "07:00"), ("a", "08:00", "09:00")], false)]
fn add_shift_accepts_iff_valid(#[case] shifts: &[(&str, &str, &str)], #[case] ok: bool) {
    let mut post = Post::new("gate", "Main gate");
    let mut result = Ok(());
    for (id, start, end) in shifts {
        result = post.add_shift(shift(id, start, end));
        if result.is_err() {
            break;
        }
    }
    assert_eq!(result.is_ok(), ok, "result: {result:?}");
}

#[test]
fn with_shifts_validates_the_whole_set() {
    let err = Post::with_shifts(
        "gate",
        "Main gate",
        vec![shift("a", "06:00", "14:00"), shift("b", "12:00", "16:00")],
    )
    .unwrap_err();
    assert!(matches!(err, RosterError::OverlappingShifts { .. }));
}

#[test]
fn zero_length_shift_never_reaches_a_post() {
    let err = Shift::new(
        "flash",
        "10:00".parse().unwrap(),
        "10:00".parse().unwrap(),
        vec![],
    )
    .unwrap_err();
    assert!(err.to_string().contains("flash"));
}
