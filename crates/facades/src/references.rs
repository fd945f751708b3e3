use crate::{Error, Result};
use features::Features;
use std::sync::Arc;

/// Slot is the cached resolution of a single feature type.
#[derive(Debug, Clone, PartialEq)]
pub enum Slot<T> {
    /// Not looked up since the cache was last flushed.
    Unresolved,
    /// Looked up, and the collection had no such feature.
    Absent,
    Resolved(T),
}

impl<T> Default for Slot<T> {
    fn default() -> Self {
        Slot::Unresolved
    }
}

impl<T> Slot<T> {
    pub fn is_resolved(&self) -> bool {
        !matches!(self, Slot::Unresolved)
    }

    fn get_or_resolve(&mut self, resolve: impl FnOnce() -> Option<T>) -> Option<&T> {
        if let Slot::Unresolved = self {
            *self = match resolve() {
                Some(value) => Slot::Resolved(value),
                None => Slot::Absent,
            };
        }
        match self {
            Slot::Resolved(value) => Some(value),
            Slot::Absent | Slot::Unresolved => None,
        }
    }
}

/// Resolve is the policy applied when a slot's feature isn't in the collection.
pub enum Resolve<T> {
    /// Resolve to absent.
    OrAbsent,
    /// Build a default feature and insert it into the collection,
    /// so that it's shared with every other user of the collection.
    OrInsert(fn() -> T),
}

/// FeatureReferences caches resolved features of a bound Features collection.
///
/// `C` is a record of Slot fields, one per feature type of interest.
/// Slots are valid only for the collection revision at which they were
/// resolved: when the revision moves, all slots are flushed upon the next
/// fetch() and each is re-resolved only as it's touched again.
pub struct FeatureReferences<C> {
    features: Option<Arc<Features>>,
    // Revision observed at last resolution.
    // None never matches a collection revision.
    revision: Option<u64>,
    cache: C,
}

impl<C: Default> Default for FeatureReferences<C> {
    fn default() -> Self {
        Self {
            features: None,
            revision: None,
            cache: C::default(),
        }
    }
}

impl<C: Default> FeatureReferences<C> {
    /// Build FeatureReferences which are bound to `features`.
    pub fn new(features: Arc<Features>) -> Self {
        let mut references = Self::default();
        references.initialize(features);
        references
    }

    /// Bind to `features`. The collection revision isn't sampled until
    /// first fetch(), as the collection may change before then.
    pub fn initialize(&mut self, features: Arc<Features>) {
        self.features = Some(features);
        self.revision = None;
        self.cache = C::default();
    }

    /// Release the bound collection and every cached feature.
    pub fn uninitialize(&mut self) {
        *self = Self::default();
    }

    /// Fetch the feature of the slot chosen by `select`, resolving it
    /// from the collection under policy `resolve` if it's not already
    /// cached for the current collection revision.
    pub fn fetch<T>(
        &mut self,
        select: impl FnOnce(&mut C) -> &mut Slot<T>,
        resolve: &Resolve<T>,
    ) -> Result<Option<&T>>
    where
        T: Clone + Send + Sync + 'static,
    {
        let Self {
            features,
            revision,
            cache,
        } = self;

        let Some(features) = features.as_deref() else {
            return Err(Error::Detached);
        };

        let current = features.revision();
        if *revision != Some(current) {
            *cache = C::default();
            *revision = Some(current);
        }

        Ok(select(cache).get_or_resolve(|| {
            tracing::trace!(
                feature = std::any::type_name::<T>(),
                revision = current,
                "resolving feature"
            );

            match (features.get::<T>(), resolve) {
                (Some(value), _) => Some(value),
                (None, Resolve::OrAbsent) => None,
                (None, Resolve::OrInsert(build)) => {
                    let value = build();
                    // Our own insertion leaves other cached slots valid.
                    *revision = Some(features.insert(value.clone()));
                    Some(value)
                }
            }
        }))
    }

    pub fn is_attached(&self) -> bool {
        self.features.is_some()
    }

    /// Bound collection, if attached.
    pub fn features(&self) -> Option<&Arc<Features>> {
        self.features.as_ref()
    }

    /// Collection revision observed at last fetch(), if any.
    pub fn observed_revision(&self) -> Option<u64> {
        self.revision
    }

    /// Slot record of the cache. Slots may be stale if the
    /// collection revision has since moved.
    pub fn cache(&self) -> &C {
        &self.cache
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[derive(Debug, PartialEq)]
    struct Widget(&'static str);

    #[derive(Debug, PartialEq)]
    struct Gadget(&'static str);

    #[derive(Default)]
    struct Cache {
        widget: Slot<Arc<Widget>>,
        gadget: Slot<Arc<Gadget>>,
    }

    thread_local! {
        static GADGETS_BUILT: Cell<usize> = Cell::new(0);
    }

    fn build_gadget() -> Arc<Gadget> {
        GADGETS_BUILT.with(|built| built.set(built.get() + 1));
        Arc::new(Gadget("default"))
    }

    const WIDGET: Resolve<Arc<Widget>> = Resolve::OrAbsent;
    const GADGET: Resolve<Arc<Gadget>> = Resolve::OrInsert(build_gadget);

    fn widget(refs: &mut FeatureReferences<Cache>) -> Option<Arc<Widget>> {
        refs.fetch(|c| &mut c.widget, &WIDGET).unwrap().cloned()
    }
    fn gadget(refs: &mut FeatureReferences<Cache>) -> Arc<Gadget> {
        refs.fetch(|c| &mut c.gadget, &GADGET)
            .unwrap()
            .unwrap()
            .clone()
    }

    #[test]
    fn test_repeated_fetch_is_memoized() {
        let first = Arc::new(Widget("first"));
        let features = Arc::new(Features::new().with(first.clone()));
        let mut refs = FeatureReferences::<Cache>::new(features.clone());

        let a = widget(&mut refs).unwrap();
        let b = widget(&mut refs).unwrap();
        assert!(Arc::ptr_eq(&a, &first));
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(refs.observed_revision(), Some(1));

        // Only the touched slot was resolved.
        assert!(refs.cache().widget.is_resolved());
        assert!(!refs.cache().gadget.is_resolved());
    }

    #[test]
    fn test_replacement_is_observed() {
        let features = Arc::new(Features::new().with(Arc::new(Widget("first"))));
        let mut refs = FeatureReferences::<Cache>::new(features.clone());
        assert_eq!(widget(&mut refs).unwrap().0, "first");

        let second = Arc::new(Widget("second"));
        features.insert(second.clone());

        let fetched = widget(&mut refs).unwrap();
        assert!(Arc::ptr_eq(&fetched, &second));
        assert_eq!(refs.observed_revision(), Some(2));
    }

    #[test]
    fn test_invalidation_is_lazy() {
        let features = Arc::new(Features::new().with(Arc::new(Widget("w"))));
        let mut refs = FeatureReferences::<Cache>::new(features.clone());
        let before = widget(&mut refs).unwrap();

        // An unrelated mutation doesn't eagerly touch the cache.
        features.insert(7u32);
        assert!(refs.cache().widget.is_resolved());
        assert_eq!(refs.observed_revision(), Some(1));

        // The next fetch flushes and re-resolves, finding the same instance.
        let after = widget(&mut refs).unwrap();
        assert!(Arc::ptr_eq(&before, &after));
        assert_eq!(refs.observed_revision(), Some(2));
    }

    #[test]
    fn test_absent_is_cached_until_revision_moves() {
        let features = Arc::new(Features::new());
        let mut refs = FeatureReferences::<Cache>::new(features.clone());

        assert!(widget(&mut refs).is_none());
        assert_eq!(refs.cache().widget, Slot::Absent);

        features.insert(Arc::new(Widget("late")));
        assert_eq!(widget(&mut refs).unwrap().0, "late");
    }

    #[test]
    fn test_or_insert_builds_once_and_installs() {
        let features = Arc::new(Features::new().with(Arc::new(Widget("w"))));
        let mut refs = FeatureReferences::<Cache>::new(features.clone());

        let w = widget(&mut refs).unwrap();
        let g1 = gadget(&mut refs);
        let g2 = gadget(&mut refs);

        assert_eq!(GADGETS_BUILT.with(Cell::get), 1);
        assert!(Arc::ptr_eq(&g1, &g2));

        // The default was installed into the collection,
        // and our own insertion didn't flush the widget slot.
        assert!(Arc::ptr_eq(&features.get::<Arc<Gadget>>().unwrap(), &g1));
        assert_eq!(refs.observed_revision(), Some(features.revision()));
        assert!(refs.cache().widget.is_resolved());
        assert!(Arc::ptr_eq(&w, &widget(&mut refs).unwrap()));

        // A later flush finds the installed gadget, rather than building another.
        features.insert(1u8);
        assert!(Arc::ptr_eq(&gadget(&mut refs), &g1));
        assert_eq!(GADGETS_BUILT.with(Cell::get), 1);
    }

    #[test]
    fn test_initialize_defers_revision_sampling() {
        let features = Arc::new(Features::new().with(1u8).with(2u16));
        let refs = FeatureReferences::<Cache>::new(features);

        assert!(refs.is_attached());
        assert_eq!(refs.observed_revision(), None);
    }

    #[test]
    fn test_detached_fetch_fails() {
        let mut refs = FeatureReferences::<Cache>::default();
        let err = refs.fetch(|c| &mut c.widget, &WIDGET).unwrap_err();
        assert!(matches!(err, Error::Detached));

        let features = Arc::new(Features::new().with(Arc::new(Widget("w"))));
        refs.initialize(features);
        assert!(widget(&mut refs).is_some());

        refs.uninitialize();
        refs.uninitialize();
        assert!(!refs.is_attached());
        assert!(refs.features().is_none());
        assert_eq!(refs.observed_revision(), None);
        assert!(!refs.cache().widget.is_resolved());
        assert!(matches!(
            refs.fetch(|c| &mut c.widget, &WIDGET),
            Err(Error::Detached)
        ));
    }

    #[test]
    fn test_uninitialize_releases_features() {
        let held = Arc::new(Widget("held"));
        let features = Arc::new(Features::new().with(held.clone()));
        let mut refs = FeatureReferences::<Cache>::new(features.clone());
        widget(&mut refs);

        drop(features);
        refs.uninitialize();

        // Only our local handle remains.
        assert_eq!(Arc::strong_count(&held), 1);
    }
}
