//! Integration tests: swap sessions against recording adapters.

use super::mock_io::{Harness, RED};
use cellarkeeper::app::commands::{AppCommand, DeviceEvent};
use cellarkeeper::app::events::Notification;
use cellarkeeper::cabinet::{DrawerId, SlotRef};
use cellarkeeper::fsm::swap::SwapPhase;
use cellarkeeper::indicator::Indicator;
use cellarkeeper::inventory::SlotState;

const X: &str = "XXXX0001";
const Y: &str = "YYYY0002";

fn stocked() -> Harness {
    let mut h = Harness::new();
    h.stock("drawer_5", 1, X, 800.0);
    h.stock("drawer_5", 2, Y, 450.0);
    h
}

fn bottle_at(h: &Harness, drawer: &str, slot: u8) -> (String, f32) {
    match h.coord.inventory().get(&SlotRef::new(drawer, slot)) {
        SlotState::Occupied(b) => (b.barcode, b.weight_grams),
        SlotState::Empty => panic!("{drawer} #{slot} is empty"),
    }
}

fn completions(h: &Harness) -> Vec<(bool, Option<String>)> {
    h.io.notifications()
        .filter_map(|n| match n {
            Notification::SwapCompleted { success, error } => Some((*success, error.clone())),
            _ => None,
        })
        .collect()
}

/// Occupied records holding `barcode` in the last persisted document.
fn stored_copies(h: &Harness, barcode: &str) -> usize {
    let Some(doc) = h.coord.inventory().backend().stored() else {
        return 0;
    };
    doc.drawers
        .values()
        .flat_map(|d| d.positions.values())
        .filter(|p| p.occupied && p.barcode.as_deref() == Some(barcode))
        .count()
}

/// Lift both stocked bottles and land X on Y's old slot.
fn one_leg_landed() -> Harness {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.remove("drawer_5", 2);
    h.place("drawer_5", 2, 790.0);
    assert_eq!(h.coord.swap().unwrap().targets().len(), 1);
    h
}

#[test]
fn swap_exchanges_two_bottles() {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    assert_eq!(h.io.count("swap_started"), 1);
    assert_eq!(h.timers.live(), 1);

    h.remove("drawer_5", 1);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 1), Indicator::Staged));
    h.remove("drawer_5", 2);
    assert_eq!(h.io.count("bottle_event"), 2);
    assert_eq!(h.coord.swap().unwrap().phase(), SwapPhase::Placing);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 2), Indicator::PlaceHere));
    assert!(h.io.shows(&SlotRef::new("drawer_5", 1), Indicator::Staged));

    // X goes to Y's old slot; the scale reads a little different.
    h.place("drawer_5", 2, 790.0);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 1), Indicator::PlaceHere));
    h.place("drawer_5", 1, 460.0);

    assert_eq!(bottle_at(&h, "drawer_5", 1), (Y.to_owned(), 450.0));
    assert_eq!(bottle_at(&h, "drawer_5", 2), (X.to_owned(), 800.0));
    assert_eq!(completions(&h), [(true, None)]);
    assert_eq!(h.coord.inventory().total_occupied(), 2);
    assert!(h.coord.swap().is_none());
    assert_eq!(h.timers.live(), 0);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 1), Indicator::Off));
    assert!(h.io.shows(&SlotRef::new("drawer_5", 2), Indicator::Off));
}

#[test]
fn wrong_swap_position_then_recovery() {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.remove("drawer_5", 2);

    h.place("drawer_5", 5, 800.0);
    assert_eq!(h.io.count("swap_error"), 1);
    match h.io.last_notification() {
        Some(Notification::SwapError {
            error,
            wrong_position,
            expected_positions,
            ..
        }) => {
            assert_eq!(error, "wrong_swap_position");
            assert_eq!(*wrong_position, Some(5));
            assert_eq!(
                expected_positions,
                &[SlotRef::new("drawer_5", 2), SlotRef::new("drawer_5", 1)]
            );
        }
        other => panic!("expected swap_error, got {:?}", other),
    }
    assert!(h.io.shows(&SlotRef::new("drawer_5", 5), Indicator::Wrong));
    assert!(!h.occupied("drawer_5", 5));

    h.remove("drawer_5", 5);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 5), Indicator::Off));
    assert!(h.io.shows(&SlotRef::new("drawer_5", 2), Indicator::PlaceHere));
    assert_eq!(h.io.count("wrong_bottle_removed"), 1);
    match h.io.last_notification() {
        Some(Notification::WrongBottleRemoved {
            drawer,
            position,
            expected_position,
        }) => {
            assert_eq!(drawer, &DrawerId::from("drawer_5"));
            assert_eq!(*position, 5);
            assert_eq!(*expected_position, 2);
        }
        other => panic!("expected wrong_bottle_removed, got {:?}", other),
    }

    h.place("drawer_5", 2, 800.0);
    h.place("drawer_5", 1, 450.0);
    assert_eq!(completions(&h), [(true, None)]);
    assert_eq!(h.io.count("swap_error"), 1);
}

#[test]
fn swap_timeout_clears_every_touched_indicator() {
    let mut h = stocked();
    let before = h.coord.inventory().document().clone();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.remove("drawer_5", 2);
    h.place("drawer_5", 6, 800.0);

    h.fire_all();
    assert_eq!(completions(&h), [(false, Some("Timeout".to_owned()))]);
    assert!(h.coord.swap().is_none());
    for s in [1, 2, 6] {
        assert!(h.io.shows(&SlotRef::new("drawer_5", s), Indicator::Off), "#{s}");
    }
    assert_eq!(h.coord.inventory().document(), &before);
}

#[test]
fn timeout_after_one_leg_vacates_the_stranded_slot() {
    let mut h = one_leg_landed();

    h.fire_all();
    assert_eq!(completions(&h), [(false, Some("Timeout".to_owned()))]);
    assert_eq!(bottle_at(&h, "drawer_5", 2), (X.to_owned(), 800.0));
    assert!(!h.occupied("drawer_5", 1));
    assert_eq!(h.coord.inventory().total_occupied(), 1);
    assert_eq!(stored_copies(&h, X), 1);
    assert_eq!(stored_copies(&h, Y), 0);
    for s in [1, 2] {
        assert!(h.io.shows(&SlotRef::new("drawer_5", s), Indicator::Off), "#{s}");
    }
}

#[test]
fn cancel_after_one_leg_vacates_the_stranded_slot() {
    let mut h = one_leg_landed();
    h.io.clear();

    h.command(AppCommand::CancelSwap {});
    assert!(h.coord.swap().is_none());
    assert_eq!(h.io.notifications().count(), 0);
    assert!(!h.occupied("drawer_5", 1));
    assert_eq!(stored_copies(&h, X), 1);
    assert_eq!(h.coord.inventory().total_occupied(), 1);
}

#[test]
fn failed_vacate_is_reported_before_the_timeout() {
    let mut h = one_leg_landed();
    h.coord.inventory_mut().backend_mut().fail_writes(true);

    h.fire_all();
    let sent: Vec<_> = h.io.notifications().collect();
    let [.., error, done] = sent.as_slice() else {
        panic!("expected two notifications, got {:?}", sent);
    };
    assert!(matches!(done, Notification::SwapCompleted { success: false, .. }));
    match error {
        Notification::SwapError {
            code,
            expected_positions,
            ..
        } => {
            assert_eq!(*code, Some("persistence"));
            assert_eq!(expected_positions, &[SlotRef::new("drawer_5", 1)]);
        }
        other => panic!("expected swap_error, got {:?}", other),
    }
    assert!(h.coord.swap().is_none());
}

#[test]
fn wrong_placement_signal_is_ignored_during_swap() {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.remove("drawer_5", 2);
    let writes = h.coord.inventory().backend().writes();

    h.device(
        "drawer_5",
        DeviceEvent::WrongPlacement {
            position: 2,
            expected_position: 1,
        },
    );
    assert_eq!(h.coord.inventory().backend().writes(), writes);
    assert_eq!(h.coord.swap().unwrap().targets().len(), 2);
    assert_eq!(h.io.count("swap_error"), 0);

    h.place("drawer_5", 2, 790.0);
    assert_eq!(h.io.count("swap_error"), 0);
    assert!(!h.io.shows(&SlotRef::new("drawer_5", 2), Indicator::Wrong));
    h.place("drawer_5", 1, 460.0);
    assert_eq!(completions(&h), [(true, None)]);
    assert_eq!(bottle_at(&h, "drawer_5", 2), (X.to_owned(), 800.0));
}

#[test]
fn repeated_placement_at_a_landed_target_is_idempotent() {
    let mut h = one_leg_landed();
    let events = h.io.count("bottle_event");
    let writes = h.coord.inventory().backend().writes();

    h.place("drawer_5", 2, 795.0);
    assert_eq!(h.io.count("swap_error"), 0);
    assert_eq!(h.io.count("bottle_event"), events);
    assert_eq!(h.coord.inventory().backend().writes(), writes);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 2), Indicator::Occupied));
    assert_eq!(h.coord.swap().unwrap().targets().len(), 1);

    h.place("drawer_5", 1, 460.0);
    assert_eq!(completions(&h), [(true, None)]);
    assert_eq!(bottle_at(&h, "drawer_5", 1), (Y.to_owned(), 450.0));
}

#[test]
fn swap_and_operations_exclude_each_other() {
    let mut h = stocked();
    h.load(RED);
    h.command(AppCommand::StartSwap {});
    assert!(matches!(
        h.io.last_notification(),
        Some(Notification::SwapError { code: Some("operations_pending"), .. })
    ));
    assert!(h.coord.swap().is_none());

    h.command(AppCommand::CancelLoad { barcode: None });
    h.command(AppCommand::StartSwap {});
    assert!(h.coord.swap().is_some());

    h.load(RED);
    assert!(matches!(
        h.io.last_notification(),
        Some(Notification::LoadError { code: "swap_active", .. })
    ));
    h.unload(X);
    assert!(matches!(
        h.io.last_notification(),
        Some(Notification::UnloadError { code: "swap_active", .. })
    ));
    assert!(h.coord.operations().is_empty());
}

#[test]
fn duplicate_and_empty_removals_are_ignored() {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.remove("drawer_5", 1);
    h.remove("drawer_5", 7);
    assert_eq!(h.io.count("bottle_event"), 1);
    assert_eq!(h.coord.swap().unwrap().removed().len(), 1);
}

#[test]
fn lifted_bottle_can_be_put_back() {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.place("drawer_5", 1, 800.0);

    let sw = h.coord.swap().unwrap();
    assert!(sw.removed().is_empty());
    assert_eq!(sw.phase(), SwapPhase::Removing);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 1), Indicator::Occupied));
}

#[test]
fn cancel_swap_is_silent() {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.io.clear();

    h.command(AppCommand::CancelSwap {});
    assert!(h.coord.swap().is_none());
    assert_eq!(h.io.notifications().count(), 0);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 1), Indicator::Off));
    assert_eq!(h.timers.live(), 0);
}

#[test]
fn swap_across_drawers() {
    let mut h = Harness::new();
    h.stock("drawer_3", 1, X, 700.0);
    h.stock("drawer_7", 4, Y, 350.0);
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_3", 1);
    h.remove("drawer_7", 4);
    h.place("drawer_7", 4, 700.0);
    h.place("drawer_3", 1, 350.0);

    assert_eq!(bottle_at(&h, "drawer_3", 1), (Y.to_owned(), 350.0));
    assert_eq!(bottle_at(&h, "drawer_7", 4), (X.to_owned(), 700.0));
    assert_eq!(completions(&h), [(true, None)]);
}

#[test]
fn failed_swap_commit_leaves_target_pending() {
    let mut h = stocked();
    h.command(AppCommand::StartSwap {});
    h.remove("drawer_5", 1);
    h.remove("drawer_5", 2);
    h.coord.inventory_mut().backend_mut().fail_writes(true);

    h.place("drawer_5", 2, 800.0);
    assert!(matches!(
        h.io.last_notification(),
        Some(Notification::SwapError { code: Some("persistence"), .. })
    ));
    assert_eq!(h.coord.swap().unwrap().targets().len(), 2);

    h.coord.inventory_mut().backend_mut().fail_writes(false);
    h.remove("drawer_5", 2);
    h.place("drawer_5", 2, 800.0);
    h.place("drawer_5", 1, 450.0);
    assert_eq!(completions(&h), [(true, None)]);
}
