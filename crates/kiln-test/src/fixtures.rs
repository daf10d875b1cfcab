//! Native event fixtures.

use kiln_events::{NativeEvent, NativeEventKind};

/// Primary-button `click`.
#[must_use]
pub fn click() -> NativeEvent {
    NativeEvent::mouse("click")
}

/// `keydown` for `key`, with the matching physical code.
#[must_use]
pub fn keydown(key: &str) -> NativeEvent {
    NativeEvent::keyboard("keydown", key, key_code(key))
}

/// `keyup` for `key`.
#[must_use]
pub fn keyup(key: &str) -> NativeEvent {
    NativeEvent::keyboard("keyup", key, key_code(key))
}

/// Mouse `pointerdown`.
#[must_use]
pub fn pointerdown() -> NativeEvent {
    pointer("pointerdown")
}

/// Mouse `pointerup`.
#[must_use]
pub fn pointerup() -> NativeEvent {
    pointer("pointerup")
}

/// Secondary-button `contextmenu`.
#[must_use]
pub fn context_menu() -> NativeEvent {
    NativeEvent::new("contextmenu", NativeEventKind::Mouse { button: 2 })
}

fn pointer(event_type: &str) -> NativeEvent {
    NativeEvent::new(
        event_type,
        NativeEventKind::Pointer {
            pointer_id: 1,
            pointer_type: "mouse".to_owned(),
        },
    )
}

fn key_code(key: &str) -> String {
    match key {
        " " | "Spacebar" => "Space".to_owned(),
        k if k.len() == 1 && k.chars().all(|c| c.is_ascii_alphabetic()) => {
            format!("Key{}", k.to_ascii_uppercase())
        },
        k => k.to_owned(),
    }
}
