use std::cmp::Ordering;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;

use err_derive::Error;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Primary key of a row in `T`'s table.
///
/// The phantom parameter keeps an `Id<Product>` from being passed where an
/// `Id<Order>` is wanted; on the wire and in the database it is a plain
/// `BIGSERIAL` value.
pub struct Id<T> {
    val: i64,
    phantom: PhantomData<T>,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum IdParseError {
    #[error(display = "not a number: {:?}", _0)]
    Unparseable(String),
    #[error(display = "identifiers must be positive, got {}", _0)]
    NotPositive(i64),
}

pub trait Entity {
    const TABLE: &'static str;
}

impl<T> Id<T> {
    pub fn new(val: i64) -> Self {
        Id {
            val,
            phantom: PhantomData,
        }
    }

    pub fn value(&self) -> i64 {
        self.val
    }
}

impl<T> Clone for Id<T> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<T> Copy for Id<T> {}

impl<T> PartialEq for Id<T> {
    fn eq(&self, other: &Self) -> bool {
        self.val == other.val
    }
}

impl<T> Eq for Id<T> {}

impl<T> PartialOrd for Id<T> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl<T> Ord for Id<T> {
    fn cmp(&self, other: &Self) -> Ordering {
        self.val.cmp(&other.val)
    }
}

impl<T> Hash for Id<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.val.hash(state)
    }
}

impl<T> fmt::Display for Id<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}", self.val)
    }
}

impl<T: Entity> fmt::Debug for Id<T> {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        write!(fmt, "{}#{}", T::TABLE, self.val)
    }
}

impl<T> std::str::FromStr for Id<T> {
    type Err = IdParseError;
    fn from_str(src: &str) -> Result<Self, Self::Err> {
        let val = src
            .trim()
            .parse::<i64>()
            .map_err(|_| IdParseError::Unparseable(src.to_string()))?;
        if val < 1 {
            return Err(IdParseError::NotPositive(val));
        }
        Ok(Id::new(val))
    }
}

impl<T> Serialize for Id<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_i64(self.val)
    }
}

impl<'de, T> Deserialize<'de> for Id<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        i64::deserialize(deserializer).map(Id::new)
    }
}
