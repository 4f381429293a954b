//! Cache key encoding and namespacing.
//!
//! Every engine is bound to one namespace. The wire key for the remote tier
//! is `"{namespace}:{user_key}"`, and the corresponding remote-lock key is
//! `"lock:{namespace}:{user_key}"`. Scalar user keys encode as their textual
//! form; composite keys implement [`KeyEncode`] themselves.

/// Types usable as cache keys.
///
/// The encoding must be stable: two keys that encode to the same string are
/// the same cache entry.
///
/// # Example
///
/// ```
/// use stratum_core::KeyEncode;
///
/// struct OrderLine {
///     order_id: u64,
///     line_no: u32,
/// }
///
/// impl KeyEncode for OrderLine {
///     fn encode_key(&self) -> String {
///         format!("{}/{}", self.order_id, self.line_no)
///     }
/// }
/// ```
pub trait KeyEncode {
    /// Encodes this key as its canonical string form.
    fn encode_key(&self) -> String;
}

impl KeyEncode for str {
    fn encode_key(&self) -> String {
        self.to_string()
    }
}

impl KeyEncode for String {
    fn encode_key(&self) -> String {
        self.clone()
    }
}

impl KeyEncode for uuid::Uuid {
    fn encode_key(&self) -> String {
        self.to_string()
    }
}

impl<T: KeyEncode + ?Sized> KeyEncode for &T {
    fn encode_key(&self) -> String {
        (**self).encode_key()
    }
}

macro_rules! impl_key_encode_for_scalar {
    ($($t:ty),* $(,)?) => {
        $(
            impl KeyEncode for $t {
                fn encode_key(&self) -> String {
                    self.to_string()
                }
            }
        )*
    };
}

impl_key_encode_for_scalar!(i8, i16, i32, i64, i128, u8, u16, u32, u64, u128, bool);

/// Builds the remote-tier key for a user key within a namespace.
#[inline]
#[must_use]
pub fn full_key(namespace: &str, user_key: &str) -> String {
    format!("{namespace}:{user_key}")
}

/// Builds the remote-lock key for a user key within a namespace.
#[inline]
#[must_use]
pub fn lock_key(namespace: &str, user_key: &str) -> String {
    format!("lock:{namespace}:{user_key}")
}

/// Strips the namespace prefix from a full key, returning the user key.
///
/// Returns `None` when the full key belongs to a different namespace. Used by
/// eviction and invalidation listeners that observe full keys on a store
/// shared across namespaces.
#[must_use]
pub fn user_key<'a>(namespace: &str, full_key: &'a str) -> Option<&'a str> {
    full_key
        .strip_prefix(namespace)
        .and_then(|rest| rest.strip_prefix(':'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scalar_encoding() {
        assert_eq!(42u64.encode_key(), "42");
        assert_eq!((-7i32).encode_key(), "-7");
        assert_eq!(true.encode_key(), "true");
        assert_eq!("abc".encode_key(), "abc");
        assert_eq!(String::from("abc").encode_key(), "abc");
    }

    #[test]
    fn test_uuid_encoding() {
        let id = uuid::Uuid::new_v4();
        assert_eq!(id.encode_key(), id.to_string());
    }

    #[test]
    fn test_reference_encoding() {
        let key = 42u64;
        assert_eq!((&key).encode_key(), "42");
    }

    #[test]
    fn test_key_formats() {
        assert_eq!(full_key("products", "42"), "products:42");
        assert_eq!(lock_key("products", "42"), "lock:products:42");
    }

    #[test]
    fn test_user_key_round_trip() {
        let full = full_key("products", "42");
        assert_eq!(user_key("products", &full), Some("42"));
        assert_eq!(user_key("orders", &full), None);
    }

    #[test]
    fn test_user_key_with_colons_in_key() {
        let full = full_key("products", "region:eu:42");
        assert_eq!(user_key("products", &full), Some("region:eu:42"));
    }
}
