use std::{
    borrow::Borrow,
    fmt::{Display, Formatter},
    ops::Deref,
    str::FromStr,
};

use thiserror::Error;

/// A nonempty string built only from ASCII letters, digits and hyphens.
///
/// This is the owned variant of [`FeatureName`].
#[derive(Clone, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct FeatureNameBuf(String);

impl AsRef<FeatureName> for FeatureNameBuf {
    fn as_ref(&self) -> &FeatureName {
        self
    }
}

impl Borrow<FeatureName> for FeatureNameBuf {
    fn borrow(&self) -> &FeatureName {
        self
    }
}

impl Deref for FeatureNameBuf {
    type Target = FeatureName;

    fn deref(&self) -> &Self::Target {
        unsafe { FeatureName::from_str_unchecked(&self.0) }
    }
}

impl Display for FeatureNameBuf {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for FeatureNameBuf {
    type Err = ParseFeatureNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(FeatureName::parse(s)?.to_owned())
    }
}

impl From<&FeatureName> for FeatureNameBuf {
    fn from(value: &FeatureName) -> Self {
        value.to_owned()
    }
}

impl From<FeatureNameBuf> for String {
    fn from(value: FeatureNameBuf) -> Self {
        value.0
    }
}

/// A nonempty string slice built only from ASCII letters, digits and
/// hyphens.
///
/// For the owned variant, see [`FeatureNameBuf`].
#[derive(Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
#[repr(transparent)]
pub struct FeatureName(str);

impl FeatureName {
    /// Parse a FeatureName from a string.
    ///
    /// # Errors
    /// If the string is empty or contains a character outside
    /// `[A-Za-z0-9-]` a [`ParseFeatureNameError`] variant will be returned.
    pub const fn parse(value: &str) -> Result<&Self, ParseFeatureNameError> {
        if value.is_empty() {
            Err(ParseFeatureNameError::Empty)
        } else if !Self::all_valid(value.as_bytes()) {
            Err(ParseFeatureNameError::InvalidCharacter)
        } else {
            unsafe { Ok(FeatureName::from_str_unchecked(value)) }
        }
    }

    /// Return the encapsulated string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Creates a FeatureName from a string without performing any checks.
    ///
    /// # Safety
    /// The string must be nonempty and built only from `[A-Za-z0-9-]`.
    const unsafe fn from_str_unchecked(s: &str) -> &Self {
        &*(s as *const _ as *const Self)
    }

    const fn all_valid(bytes: &[u8]) -> bool {
        let mut index = 0;

        while index < bytes.len() {
            if !(bytes[index].is_ascii_alphanumeric() || bytes[index] == b'-') {
                return false;
            }
            index += 1;
        }

        true
    }
}

impl Display for FeatureName {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", &self.0)
    }
}

impl ToOwned for FeatureName {
    type Owned = FeatureNameBuf;

    fn to_owned(&self) -> Self::Owned {
        FeatureNameBuf(self.0.to_owned())
    }
}

/// Represents all ways parsing a string as a [`FeatureName`] can fail.
#[derive(Debug, Error)]
pub enum ParseFeatureNameError {
    #[error("feature names must be nonempty")]
    Empty,
    #[error("feature names may only contain ASCII letters, digits and hyphens")]
    InvalidCharacter,
}

mod serde_impls {
    use super::{FeatureName, FeatureNameBuf};

    impl serde::Serialize for FeatureNameBuf {
        fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
        where
            S: serde::Serializer,
        {
            serializer.serialize_str(self.as_str())
        }
    }

    impl<'de> serde::Deserialize<'de> for FeatureNameBuf {
        fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
        where
            D: serde::Deserializer<'de>,
        {
            let value: String = serde::Deserialize::deserialize(deserializer)?;
            FeatureName::parse(&value)
                .map(ToOwned::to_owned)
                .map_err(serde::de::Error::custom)
        }
    }
}
