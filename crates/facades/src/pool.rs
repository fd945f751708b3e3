use crate::Reusable;
use features::Features;
use std::sync::Arc;

/// Pool is a bounded free-list of Reusable façades.
///
/// take() binds an idle (or new) façade to a request's Features,
/// and give() un-binds it before it's retained for the next request.
/// A Pool is owned by a single request-processing loop.
pub struct Pool<T> {
    idle: Vec<T>,
    capacity: usize,
    stats: PoolStats,
}

/// Counters of Pool activity.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PoolStats {
    /// Façades constructed because none were idle.
    pub created: u64,
    /// Façades taken from the idle list.
    pub reused: u64,
    /// Façades dropped because the pool was full.
    pub discarded: u64,
}

impl<T: Reusable> Pool<T> {
    /// Build a Pool which retains up to `capacity` idle façades.
    pub fn new(capacity: usize) -> Self {
        Self {
            idle: Vec::with_capacity(capacity),
            capacity,
            stats: PoolStats::default(),
        }
    }

    /// Take a façade bound to `features`.
    pub fn take(&mut self, features: Arc<Features>) -> T {
        let mut facade = match self.idle.pop() {
            Some(facade) => {
                self.stats.reused += 1;
                facade
            }
            None => {
                self.stats.created += 1;
                tracing::trace!(
                    facade = std::any::type_name::<T>(),
                    "no idle façade; constructing"
                );
                T::default()
            }
        };
        facade.initialize(features);
        facade
    }

    /// Return a façade once its request has completed.
    pub fn give(&mut self, mut facade: T) {
        facade.uninitialize();

        if self.idle.len() < self.capacity {
            self.idle.push(facade);
        } else {
            self.stats.discarded += 1;
        }
    }

    pub fn idle(&self) -> usize {
        self.idle.len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn stats(&self) -> PoolStats {
        self.stats
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{ConnectionInfo, Error, UpgradeManager};
    use features::{ConnectionState, HttpConnection};

    fn features(id: &str) -> Arc<Features> {
        Arc::new(
            Features::new().with::<Arc<dyn HttpConnection>>(Arc::new(ConnectionState::new(id))),
        )
    }

    #[test]
    fn test_take_and_give_recycles() {
        let mut pool = Pool::<ConnectionInfo>::new(1);

        let mut first = pool.take(features("one"));
        assert_eq!(first.id().unwrap(), "one");
        pool.give(first);
        assert_eq!(pool.idle(), 1);

        let mut second = pool.take(features("two"));
        assert_eq!(pool.idle(), 0);
        assert_eq!(second.id().unwrap(), "two");

        // A concurrently outstanding façade is freshly constructed,
        // and is discarded on return as the pool is full.
        let third = pool.take(features("three"));
        pool.give(second);
        pool.give(third);

        insta::assert_debug_snapshot!(pool.stats(), @r###"
        PoolStats {
            created: 2,
            reused: 1,
            discarded: 1,
        }
        "###);
        assert_eq!(pool.idle(), pool.capacity());
    }

    #[test]
    fn test_given_facades_are_uninitialized() {
        let features = features("held");
        let mut pool = Pool::<UpgradeManager>::new(4);

        let mut manager = pool.take(features.clone());
        assert!(!manager.is_upgrade_request().unwrap());
        pool.give(manager);

        // The pool retains no reference to the request's Features.
        assert_eq!(Arc::strong_count(&features), 1);

        let mut manager = pool.take(Arc::new(Features::new()));
        assert!(manager.requested_sub_protocols().unwrap().is_empty());
        manager.uninitialize();
        assert!(matches!(manager.is_upgrade_request(), Err(Error::Detached)));
    }
}
