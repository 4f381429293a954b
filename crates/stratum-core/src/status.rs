//! The three-valued read result.

/// Outcome of a cache read.
///
/// A read distinguishes three cases, and the distinction is load-bearing:
///
/// - [`Found`](CacheStatus::Found): a domain value was cached.
/// - [`KnownAbsent`](CacheStatus::KnownAbsent): a tombstone was cached. The
///   data source has already been asked and returned nothing, and callers
///   should not re-query it.
/// - [`NotFound`](CacheStatus::NotFound): neither tier holds the key. Nothing
///   is known about it.
///
/// Collapsing `KnownAbsent` into `NotFound` would reintroduce the cache
/// penetration problem negative caching exists to solve, so the engine never
/// does it; use [`into_option`](CacheStatus::into_option) only when the
/// distinction genuinely does not matter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus<V> {
    /// A domain value was found in L1 or L2.
    Found(V),
    /// A tombstone was found: the key is cached as absent.
    KnownAbsent,
    /// The key is not cached in any tier.
    NotFound,
}

impl<V> CacheStatus<V> {
    /// Returns `true` if a domain value was found.
    #[must_use]
    pub fn is_found(&self) -> bool {
        matches!(self, Self::Found(_))
    }

    /// Returns `true` if the key is cached as absent.
    #[must_use]
    pub fn is_known_absent(&self) -> bool {
        matches!(self, Self::KnownAbsent)
    }

    /// Returns `true` if the key is not cached at all.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }

    /// Returns `true` if the read settled the question with either a value
    /// or a tombstone. Only `NotFound` warrants a trip to the data source.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !self.is_not_found()
    }

    /// Extracts the value, collapsing both absence cases into `None`.
    #[must_use]
    pub fn into_option(self) -> Option<V> {
        match self {
            Self::Found(v) => Some(v),
            Self::KnownAbsent | Self::NotFound => None,
        }
    }

    /// Converts from `&CacheStatus<V>` to `CacheStatus<&V>`.
    pub fn as_ref(&self) -> CacheStatus<&V> {
        match self {
            Self::Found(v) => CacheStatus::Found(v),
            Self::KnownAbsent => CacheStatus::KnownAbsent,
            Self::NotFound => CacheStatus::NotFound,
        }
    }

    /// Maps the contained value, preserving the status.
    pub fn map<U>(self, f: impl FnOnce(V) -> U) -> CacheStatus<U> {
        match self {
            Self::Found(v) => CacheStatus::Found(f(v)),
            Self::KnownAbsent => CacheStatus::KnownAbsent,
            Self::NotFound => CacheStatus::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_predicates() {
        let found = CacheStatus::Found(7);
        assert!(found.is_found());
        assert!(found.is_settled());
        assert!(!found.is_known_absent());

        let absent: CacheStatus<i32> = CacheStatus::KnownAbsent;
        assert!(absent.is_known_absent());
        assert!(absent.is_settled());
        assert!(!absent.is_found());

        let missing: CacheStatus<i32> = CacheStatus::NotFound;
        assert!(missing.is_not_found());
        assert!(!missing.is_settled());
    }

    #[test]
    fn test_into_option_collapses_absence() {
        assert_eq!(CacheStatus::Found("v").into_option(), Some("v"));
        assert_eq!(CacheStatus::<&str>::KnownAbsent.into_option(), None);
        assert_eq!(CacheStatus::<&str>::NotFound.into_option(), None);
    }

    #[test]
    fn test_map_preserves_status() {
        assert_eq!(CacheStatus::Found(2).map(|v| v * 10), CacheStatus::Found(20));
        assert_eq!(
            CacheStatus::<i32>::KnownAbsent.map(|v| v * 10),
            CacheStatus::KnownAbsent
        );
        assert_eq!(
            CacheStatus::<i32>::NotFound.map(|v| v * 10),
            CacheStatus::NotFound
        );
    }
}
