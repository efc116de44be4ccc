use std::{
    fmt::Display,
    iter::Sum,
    ops::{Add, AddAssign, Sub, SubAssign},
};

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sqlx::Type;

use crate::op;

//--------------------------------------      Quantity       ---------------------------------------------------------
/// A mass of crop residue. Stored as whole kilograms, presented as tonnes.
///
/// On the wire a quantity is a decimal number of tonnes, e.g. `10.25`. Values are rounded to the nearest kilogram.
#[derive(Debug, Clone, Copy, Default, Type, PartialEq, Eq, Ord, PartialOrd, Hash)]
#[sqlx(transparent)]
pub struct Quantity(i64);

op!(binary Quantity, Add, add);
op!(binary Quantity, Sub, sub);
op!(inplace Quantity, AddAssign, add_assign);
op!(inplace Quantity, SubAssign, sub_assign);

impl Sum for Quantity {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Self::default(), Add::add)
    }
}

impl Quantity {
    pub fn from_kg(kg: i64) -> Self {
        Self(kg)
    }

    #[allow(clippy::cast_possible_truncation)]
    pub fn from_tonnes(tonnes: f64) -> Self {
        Self((tonnes * 1000.0).round() as i64)
    }

    pub fn kg(&self) -> i64 {
        self.0
    }

    #[allow(clippy::cast_precision_loss)]
    pub fn tonnes(&self) -> f64 {
        self.0 as f64 / 1000.0
    }

    pub fn is_positive(&self) -> bool {
        self.0 > 0
    }
}

impl Display for Quantity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.3}t", self.tonnes())
    }
}

impl Serialize for Quantity {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_f64(self.tonnes())
    }
}

impl<'de> Deserialize<'de> for Quantity {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let tonnes = f64::deserialize(deserializer)?;
        if !tonnes.is_finite() {
            return Err(serde::de::Error::custom("quantity must be a finite number of tonnes"));
        }
        Ok(Self::from_tonnes(tonnes))
    }
}
