use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

mod connection;
mod request;
mod tls;
mod upgrade;

pub use connection::{ConnectionState, HttpConnection};
pub use request::HttpRequest;
pub use tls::{Certificate, TlsConnection, TlsState};
pub use upgrade::{is_websocket_handshake, AcceptContext, Upgraded, UpgradedIo, WebSocketUpgrade};

// Re-export CancellationToken, which is accepted by asynchronous feature operations.
pub use tokio_util::sync::CancellationToken;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("operation was cancelled")]
    Cancelled,
    #[error("transport I/O failed")]
    Io(#[from] std::io::Error),
    #[error("upgrade handshake failed: {0}")]
    Handshake(String),
}
pub type Result<T> = std::result::Result<T, Error>;

/// Features is a type-keyed collection which holds at most one value
/// of each stored type, alongside a revision which is bumped upon every
/// addition, replacement, or removal of a value.
///
/// Values are typically shared feature handles such as `Arc<dyn HttpConnection>`,
/// and are keyed on that handle type. Features are shared (`Arc<Features>`)
/// between the transport which populates them and the façades which read them.
pub struct Features {
    entries: RwLock<HashMap<TypeId, Entry>>,
    revision: AtomicU64,
}

struct Entry {
    name: &'static str,
    value: Box<dyn Any + Send + Sync>,
}

impl Features {
    pub fn new() -> Self {
        Self {
            entries: Default::default(),
            revision: AtomicU64::new(0),
        }
    }

    /// Builder-style variant of insert().
    pub fn with<T: Clone + Send + Sync + 'static>(self, value: T) -> Self {
        self.insert(value);
        self
    }

    /// Current revision of the collection.
    #[inline]
    pub fn revision(&self) -> u64 {
        self.revision.load(Ordering::Acquire)
    }

    /// Get a clone of the value stored for type `T`, if any.
    pub fn get<T: Clone + 'static>(&self) -> Option<T> {
        let entries = self.entries.read().unwrap();

        entries
            .get(&TypeId::of::<T>())
            .and_then(|entry| entry.value.downcast_ref::<T>())
            .cloned()
    }

    /// Insert or replace the value stored for type `T`,
    /// returning the revision produced by this insertion.
    pub fn insert<T: Clone + Send + Sync + 'static>(&self, value: T) -> u64 {
        let name = std::any::type_name::<T>();
        let mut entries = self.entries.write().unwrap();

        let replaced = entries
            .insert(
                TypeId::of::<T>(),
                Entry {
                    name,
                    value: Box::new(value),
                },
            )
            .is_some();

        // Bump while holding the write lock, so that readers never observe
        // an updated entry under a prior revision.
        let revision = self.revision.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        tracing::debug!(feature = name, replaced, revision, "inserted feature");

        revision
    }

    /// Remove and return the value stored for type `T`.
    /// The revision is bumped only if a value was present.
    pub fn remove<T: Clone + Send + Sync + 'static>(&self) -> Option<T> {
        let mut entries = self.entries.write().unwrap();
        let entry = entries.remove(&TypeId::of::<T>())?;

        let revision = self.revision.fetch_add(1, Ordering::AcqRel).wrapping_add(1);
        tracing::debug!(feature = entry.name, revision, "removed feature");

        entry.value.downcast::<T>().ok().map(|value| *value)
    }

    /// Returns true if a value of type `T` is present.
    pub fn contains<T: 'static>(&self) -> bool {
        self.entries
            .read()
            .unwrap()
            .contains_key(&TypeId::of::<T>())
    }

    pub fn len(&self) -> usize {
        self.entries.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Features {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Features {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let entries = self.entries.read().unwrap();
        let mut names: Vec<_> = entries.values().map(|entry| entry.name).collect();
        names.sort();

        f.debug_struct("Features")
            .field("revision", &self.revision())
            .field("entries", &names)
            .finish()
    }
}
