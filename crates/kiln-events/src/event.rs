//! Event payloads delivered by the router.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Platform-specific details of a native event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NativeEventKind {
    /// Mouse events (`click`, `contextmenu`, ...).
    Mouse {
        /// Button index.
        button: u8,
    },
    /// Pointer events (`pointerdown`, `pointerup`, ...).
    Pointer {
        /// Pointer id.
        pointer_id: u32,
        /// `mouse`, `pen` or `touch`.
        pointer_type: String,
    },
    /// Keyboard events (`keydown`, `keyup`).
    Keyboard {
        /// Logical key value (`Enter`, `" "`, `a`).
        key: String,
        /// Physical key code (`Enter`, `Space`, `KeyA`).
        code: String,
        /// Whether the key is auto-repeating.
        repeat: bool,
    },
    /// Anything else.
    Generic,
}

/// A platform event as the host dispatched it.
///
/// The router shares one `Arc<NativeEvent>` across every channel, so a
/// `prevent_default` call made by one listener is visible to all others.
#[derive(Debug)]
pub struct NativeEvent {
    event_type: String,
    kind: NativeEventKind,
    default_prevented: AtomicBool,
}

impl NativeEvent {
    /// Create an event of `event_type`.
    #[must_use]
    pub fn new(event_type: impl Into<String>, kind: NativeEventKind) -> Self {
        Self {
            event_type: event_type.into(),
            kind,
            default_prevented: AtomicBool::new(false),
        }
    }

    /// Primary-button mouse event.
    #[must_use]
    pub fn mouse(event_type: impl Into<String>) -> Self {
        Self::new(event_type, NativeEventKind::Mouse { button: 0 })
    }

    /// Keyboard event with the given key and code.
    #[must_use]
    pub fn keyboard(
        event_type: impl Into<String>,
        key: impl Into<String>,
        code: impl Into<String>,
    ) -> Self {
        Self::new(
            event_type,
            NativeEventKind::Keyboard {
                key: key.into(),
                code: code.into(),
                repeat: false,
            },
        )
    }

    /// Event without platform details.
    #[must_use]
    pub fn generic(event_type: impl Into<String>) -> Self {
        Self::new(event_type, NativeEventKind::Generic)
    }

    /// Platform event type, e.g. `click`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// Platform details.
    #[must_use]
    pub fn kind(&self) -> &NativeEventKind {
        &self.kind
    }

    /// The logical key of a keyboard event.
    #[must_use]
    pub fn key(&self) -> Option<&str> {
        match &self.kind {
            NativeEventKind::Keyboard { key, .. } => Some(key),
            _ => None,
        }
    }

    /// Ask the host to skip the platform's default action.
    pub fn prevent_default(&self) {
        self.default_prevented.store(true, Ordering::SeqCst);
    }

    /// Whether any listener called [`prevent_default`](Self::prevent_default).
    #[must_use]
    pub fn default_prevented(&self) -> bool {
        self.default_prevented.load(Ordering::SeqCst)
    }
}

/// A synthesized semantic event. `detail` is the original native event,
/// unmodified.
#[derive(Debug, Clone)]
pub struct CustomEvent {
    event_type: String,
    detail: Arc<NativeEvent>,
}

impl CustomEvent {
    /// Wrap `detail` as a semantic event of `event_type`.
    #[must_use]
    pub fn new(event_type: impl Into<String>, detail: Arc<NativeEvent>) -> Self {
        Self {
            event_type: event_type.into(),
            detail,
        }
    }

    /// Semantic type, e.g. `press.commit`.
    #[must_use]
    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    /// The native event that produced this one.
    #[must_use]
    pub fn detail(&self) -> &Arc<NativeEvent> {
        &self.detail
    }
}

/// Delivery channel of a registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Channel {
    /// `native:<type>` passthrough.
    Native,
    /// Dot-named semantic events.
    Semantic,
    /// `host.<type>` passthrough.
    Host,
}

/// Prefix of native passthrough registrations.
pub const NATIVE_PREFIX: &str = "native:";
/// Prefix of host passthrough registrations.
pub const HOST_PREFIX: &str = "host.";

impl Channel {
    /// Split a registration type string into its channel and the underlying
    /// event type. `native:click` and `host.click` name `click`; anything else
    /// is a semantic type and is returned whole.
    #[must_use]
    pub fn parse(registration: &str) -> (Self, &str) {
        if let Some(native) = registration.strip_prefix(NATIVE_PREFIX) {
            (Self::Native, native)
        } else if let Some(native) = registration.strip_prefix(HOST_PREFIX) {
            (Self::Host, native)
        } else {
            (Self::Semantic, registration)
        }
    }
}

/// What a router listener receives.
#[derive(Debug, Clone)]
pub enum RoutedEvent {
    /// The raw native event, on the `native:` channel.
    Native(Arc<NativeEvent>),
    /// A semantic event.
    Semantic(CustomEvent),
    /// The raw native event, on the `host.` channel.
    Host(Arc<NativeEvent>),
}

impl RoutedEvent {
    /// Delivery channel.
    #[must_use]
    pub fn channel(&self) -> Channel {
        match self {
            Self::Native(_) => Channel::Native,
            Self::Semantic(_) => Channel::Semantic,
            Self::Host(_) => Channel::Host,
        }
    }

    /// The native event underneath, whichever the channel.
    #[must_use]
    pub fn native(&self) -> &Arc<NativeEvent> {
        match self {
            Self::Native(event) | Self::Host(event) => event,
            Self::Semantic(custom) => custom.detail(),
        }
    }

    /// The semantic event, if this was delivered on the semantic channel.
    #[must_use]
    pub fn as_semantic(&self) -> Option<&CustomEvent> {
        match self {
            Self::Semantic(custom) => Some(custom),
            _ => None,
        }
    }
}

impl fmt::Display for RoutedEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Native(event) => write!(f, "{NATIVE_PREFIX}{}", event.event_type()),
            Self::Semantic(custom) => f.write_str(custom.event_type()),
            Self::Host(event) => write!(f, "{HOST_PREFIX}{}", event.event_type()),
        }
    }
}
