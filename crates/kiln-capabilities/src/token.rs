//! Capability tokens.
//!
//! A token names an injectable dependency. The type parameter is a
//! compile-time brand only; identity is the id string.

use std::any::Any;
use std::borrow::Cow;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;

use kiln_core::{KilnError, KilnResult};

/// A globally-unique, namespaced capability identifier branded with the type
/// of the value it resolves to.
pub struct CapabilityToken<T> {
    id: Cow<'static, str>,
    _brand: PhantomData<fn() -> T>,
}

impl<T> CapabilityToken<T> {
    /// Create a token from a static id. The id is not validated; use this for
    /// well-known `const` tokens.
    #[must_use]
    pub const fn new(id: &'static str) -> Self {
        Self {
            id: Cow::Borrowed(id),
            _brand: PhantomData,
        }
    }

    /// Create a token from a runtime string, validating the
    /// `@scope/feature/name` shape.
    ///
    /// # Errors
    ///
    /// Returns [`KilnError::InvalidCapabilityId`] if the id is malformed.
    pub fn parse(id: impl Into<String>) -> KilnResult<Self> {
        let id = id.into();
        if !is_valid_id(&id) {
            return Err(KilnError::InvalidCapabilityId { id });
        }
        Ok(Self {
            id: Cow::Owned(id),
            _brand: PhantomData,
        })
    }

    /// The identifier string.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl<T: Any + Send + Sync> CapabilityToken<T> {
    /// Pair this token with a value.
    #[must_use]
    pub fn entry(&self, value: T) -> CapEntry {
        self.entry_shared(Arc::new(value))
    }

    /// Pair this token with an already shared value. Re-attaching the same
    /// `Arc` is a no-op for the vault.
    #[must_use]
    pub fn entry_shared(&self, value: Arc<T>) -> CapEntry {
        CapEntry {
            id: self.id.clone(),
            value,
        }
    }
}

fn is_valid_id(id: &str) -> bool {
    let Some(rest) = id.strip_prefix('@') else {
        return false;
    };
    let segments: Vec<&str> = rest.split('/').collect();
    segments.len() == 3
        && segments.iter().all(|segment| {
            !segment.is_empty()
                && segment.chars().all(|c| {
                    c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.')
                })
        })
}

impl<T> Clone for CapabilityToken<T> {
    fn clone(&self) -> Self {
        Self {
            id: self.id.clone(),
            _brand: PhantomData,
        }
    }
}

impl<T> PartialEq for CapabilityToken<T> {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl<T> Eq for CapabilityToken<T> {}

impl<T> Hash for CapabilityToken<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl<T> fmt::Debug for CapabilityToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CapabilityToken").field(&self.id).finish()
    }
}

impl<T> fmt::Display for CapabilityToken<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.id)
    }
}

/// A capability id paired with its type-erased value.
#[derive(Clone)]
pub struct CapEntry {
    pub(crate) id: Cow<'static, str>,
    pub(crate) value: Arc<dyn Any + Send + Sync>,
}

impl CapEntry {
    /// The capability id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl fmt::Debug for CapEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CapEntry").field("id", &self.id).finish_non_exhaustive()
    }
}
