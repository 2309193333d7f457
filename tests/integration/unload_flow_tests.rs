//! Integration tests: unload flow against recording adapters.

use super::mock_io::{Harness, RED, WHITE};
use cellarkeeper::app::commands::AppCommand;
use cellarkeeper::app::events::Notification;
use cellarkeeper::cabinet::SlotRef;
use cellarkeeper::indicator::Indicator;

fn unload_with(h: &mut Harness, barcode: &str, drawer: Option<&str>, manual: Option<(&str, u8)>) {
    h.command(AppCommand::StartUnload {
        barcode: barcode.into(),
        name: None,
        drawer: drawer.map(Into::into),
        position: manual.map(|(_, p)| p),
        drawer_id: manual.map(|(d, _)| d.into()),
    });
}

fn unload_errors(h: &Harness) -> Vec<&'static str> {
    h.io.notifications()
        .filter_map(|n| match n {
            Notification::UnloadError { code, .. } => Some(*code),
            _ => None,
        })
        .collect()
}

fn unloaded(h: &Harness) -> Vec<(bool, Option<String>, Option<bool>)> {
    h.io.notifications()
        .filter_map(|n| match n {
            Notification::BottleUnloaded(r) => Some((r.success, r.error.clone(), r.close_screen)),
            _ => None,
        })
        .collect()
}

#[test]
fn unload_then_correct_removal() {
    let mut h = Harness::new();
    h.stock("drawer_5", 4, RED, 800.0);
    h.unload(RED);

    assert!(matches!(
        h.io.last_notification(),
        Some(Notification::ExpectRemoval { position: 4, wine_name, .. }) if wine_name == &format!("Wine {RED}")
    ));
    assert!(h.io.shows(&SlotRef::new("drawer_5", 4), Indicator::RemoveHere));

    h.remove("drawer_5", 4);
    assert_eq!(unloaded(&h), [(true, None, None)]);
    assert!(!h.occupied("drawer_5", 4));
    assert_eq!(h.coord.inventory().total_occupied(), 0);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 4), Indicator::Off));
    assert_eq!(h.timers.live(), 0);
}

#[test]
fn wrong_removal_returned_then_correct() {
    let mut h = Harness::new();
    h.stock("drawer_5", 4, RED, 800.0);
    h.stock("drawer_5", 6, WHITE, 800.0);
    h.unload(RED);

    h.remove("drawer_5", 6);
    assert_eq!(h.io.count("unload_incorrect"), 1);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 6), Indicator::Wrong));
    assert!(h.io.shows(&SlotRef::new("drawer_5", 4), Indicator::RemoveHere));
    assert!(h.occupied("drawer_5", 6), "wrong removal never touches inventory");

    h.place("drawer_5", 6, 800.0);
    assert_eq!(h.io.count("wrong_bottle_returned"), 1);
    assert!(h.io.shows(&SlotRef::new("drawer_5", 6), Indicator::Occupied));

    h.remove("drawer_5", 4);
    assert_eq!(unloaded(&h), [(true, None, None)]);
    assert!(h.occupied("drawer_5", 6));
    assert!(!h.occupied("drawer_5", 4));
}

#[test]
fn missing_barcode_is_not_found() {
    let mut h = Harness::new();
    h.unload("MISSING01");
    assert_eq!(unload_errors(&h), ["not_found"]);
    assert!(h.coord.operations().is_empty());
}

#[test]
fn sensorless_drawer_is_unsupported() {
    let mut h = Harness::new();
    h.stock("drawer_1", 2, RED, 800.0);
    h.unload(RED);
    assert_eq!(unload_errors(&h), ["unsupported_location"]);
    assert!(h.coord.operations().is_empty());
}

#[test]
fn functional_drawers_are_searched_first() {
    let mut h = Harness::new();
    h.stock("drawer_1", 1, RED, 800.0);
    h.stock("drawer_7", 5, RED, 800.0);
    h.unload(RED);
    assert!(h.coord.operations().contains(&SlotRef::new("drawer_7", 5)));
}

#[test]
fn drawer_hint_restricts_lookup() {
    let mut h = Harness::new();
    h.stock("drawer_3", 1, RED, 800.0);
    h.stock("drawer_7", 2, RED, 800.0);

    unload_with(&mut h, RED, Some("drawer_7"), None);
    assert!(h.coord.operations().contains(&SlotRef::new("drawer_7", 2)));

    unload_with(&mut h, RED, Some("drawer_5"), None);
    assert_eq!(unload_errors(&h), ["not_found"]);
}

#[test]
fn manual_slot_must_hold_the_barcode() {
    let mut h = Harness::new();
    h.stock("drawer_5", 4, RED, 800.0);

    unload_with(&mut h, WHITE, None, Some(("drawer_5", 4)));
    assert_eq!(unload_errors(&h), ["not_found"]);

    unload_with(&mut h, RED, None, Some(("drawer_5", 4)));
    assert!(h.coord.operations().contains(&SlotRef::new("drawer_5", 4)));
}

#[test]
fn second_unload_of_armed_slot_is_busy() {
    let mut h = Harness::new();
    h.stock("drawer_5", 4, RED, 800.0);
    h.unload(RED);
    h.unload(RED);
    assert_eq!(unload_errors(&h), ["slot_busy"]);
    assert_eq!(h.coord.operations().len(), 1);
}

#[test]
fn unload_timeout_keeps_inventory() {
    let mut h = Harness::new();
    h.stock("drawer_5", 4, RED, 800.0);
    h.unload(RED);
    h.fire_all();

    assert_eq!(unloaded(&h), [(false, Some("Timeout".to_owned()), Some(false))]);
    assert!(h.occupied("drawer_5", 4));
    assert!(h.coord.operations().is_empty());
    assert!(h.io.shows(&SlotRef::new("drawer_5", 4), Indicator::Off));
}

#[test]
fn cancel_unload_is_silent() {
    let mut h = Harness::new();
    h.stock("drawer_5", 4, RED, 800.0);
    h.unload(RED);
    h.io.clear();

    h.command(AppCommand::CancelUnload {});
    assert!(h.coord.operations().is_empty());
    assert_eq!(h.io.notifications().count(), 0);
    assert_eq!(h.timers.live(), 0);

    h.remove("drawer_5", 4);
    assert!(h.occupied("drawer_5", 4), "removal after cancel is unmanaged");
}

#[test]
fn failed_vacate_keeps_bottle_and_operation() {
    let mut h = Harness::new();
    h.stock("drawer_5", 4, RED, 800.0);
    h.unload(RED);
    h.coord.inventory_mut().backend_mut().fail_writes(true);

    h.remove("drawer_5", 4);
    assert!(unloaded(&h).is_empty());
    assert_eq!(unload_errors(&h), ["persistence"]);
    assert!(h.occupied("drawer_5", 4));
    assert_eq!(h.coord.operations().len(), 1);
}

#[test]
fn load_and_unload_coexist_in_one_drawer() {
    let mut h = Harness::new();
    h.stock("drawer_5", 1, RED, 800.0);
    h.unload(RED);
    h.load(WHITE);
    assert!(h.coord.operations().contains(&SlotRef::new("drawer_5", 2)));

    h.place("drawer_5", 2, 500.0);
    h.remove("drawer_5", 1);
    assert_eq!(h.io.count("bottle_placed"), 1);
    assert_eq!(unloaded(&h).len(), 1);
    assert_eq!(h.io.count("placement_error") + h.io.count("unload_incorrect"), 0);
    assert!(h.occupied("drawer_5", 2));
    assert!(!h.occupied("drawer_5", 1));
}
