use std::{
    borrow::Borrow,
    fmt::{Display, Formatter},
    ops::Deref,
    str::FromStr,
};

use thiserror::Error;

/// A nonempty string that does not contain [`Scope::DELIMITER`], the
/// character the persistence layer reserves for composite keys.
///
/// This is the owned variant of [`Scope`].
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct ScopeBuf(String);

impl AsRef<Scope> for ScopeBuf {
    fn as_ref(&self) -> &Scope {
        self
    }
}

impl Borrow<Scope> for ScopeBuf {
    fn borrow(&self) -> &Scope {
        self
    }
}

impl Deref for ScopeBuf {
    type Target = Scope;

    fn deref(&self) -> &Self::Target {
        unsafe { Scope::from_str_unchecked(&self.0) }
    }
}

impl Display for ScopeBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for ScopeBuf {
    type Err = ParseScopeError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Scope::parse(s)?.to_owned())
    }
}

impl From<&Scope> for ScopeBuf {
    fn from(value: &Scope) -> Self {
        value.to_owned()
    }
}

impl From<ScopeBuf> for String {
    fn from(value: ScopeBuf) -> Self {
        value.0
    }
}

/// A nonempty string slice that does not contain [`Scope::DELIMITER`].
///
/// For the owned variant, see [`ScopeBuf`].
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct Scope(str);

impl Scope {
    /// Reserved by the persistence layer; scope names must not contain it.
    pub const DELIMITER: char = ':';

    /// Parse a Scope from a string.
    ///
    /// # Errors
    /// If the string is empty or contains [`Scope::DELIMITER`] a
    /// [`ParseScopeError`] variant will be returned.
    pub const fn parse(value: &str) -> Result<&Self, ParseScopeError> {
        if value.is_empty() {
            Err(ParseScopeError::Empty)
        } else if Self::contains_delimiter(value.as_bytes()) {
            Err(ParseScopeError::ContainsDelimiter)
        } else {
            unsafe { Ok(Scope::from_str_unchecked(value)) }
        }
    }

    /// Return the encapsulated string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creates a Scope from a string without performing any checks.
    ///
    /// # Safety
    /// The string must be nonempty and free of [`Scope::DELIMITER`].
    const unsafe fn from_str_unchecked(s: &str) -> &Self {
        &*(s as *const _ as *const Self)
    }

    const fn contains_delimiter(bytes: &[u8]) -> bool {
        let mut index = 0;

        while index < bytes.len() {
            if bytes[index] == Scope::DELIMITER as u8 {
                return true;
            }
            index += 1;
        }

        false
    }
}

impl Display for Scope {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl ToOwned for Scope {
    type Owned = ScopeBuf;

    fn to_owned(&self) -> Self::Owned {
        ScopeBuf(self.0.to_owned())
    }
}

/// Represents all ways parsing a string as a [`Scope`] can fail.
#[derive(Debug, Error)]
pub enum ParseScopeError {
    #[error("scopes must be nonempty")]
    Empty,
    #[error("scopes must not contain the ':' delimiter")]
    ContainsDelimiter,
}

mod serde_impls {
    use super::{Scope, ScopeBuf};

    impl serde::Serialize for ScopeBuf {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(self.as_str())
        }
    }

    impl<'de> serde::Deserialize<'de> for ScopeBuf {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let value: String = serde::Deserialize::deserialize(deserializer)?;
            Scope::parse(&value)
                .map(ToOwned::to_owned)
                .map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::Scope;

    #[test]
    fn test_plain_scope_succeeds() {
        assert!(Scope::parse("user-1").is_ok());
    }

    #[test]
    fn test_underscore_succeeds() {
        assert!(Scope::parse("user_1").is_ok());
    }

    #[test]
    fn test_empty_fails() {
        assert!(Scope::parse("").is_err());
    }

    #[test]
    fn test_containing_delimiter_fails() {
        assert!(Scope::parse(&format!("user{}1", Scope::DELIMITER)).is_err());
    }

    #[test]
    fn test_leading_delimiter_fails() {
        assert!(Scope::parse(&format!("{}user", Scope::DELIMITER)).is_err());
    }

    #[test]
    fn test_trailing_delimiter_fails() {
        assert!(Scope::parse(&format!("user{}", Scope::DELIMITER)).is_err());
    }

    #[test]
    fn test_round_trips_through_owned() {
        let scope = Scope::parse("tenant-42").unwrap();
        assert_eq!(scope.to_owned().as_str(), "tenant-42");
    }
}
