//! Fixed-point integer types for prices and quantities
//!
//! Every price and quantity is an `i64` scaled by 1e8 (`100_000_000` raw units
//! equal `1.0`). Matching never touches floating point; `rust_decimal` is
//! only used at the human boundary to parse and print values.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::iter::Sum;
use std::ops::{Add, AddAssign, Sub, SubAssign};
use std::str::FromStr;
use thiserror::Error;

/// Number of raw units in one whole unit
pub const SCALE: i64 = 100_000_000;

/// Number of fractional digits represented by [`SCALE`]
pub const SCALE_DIGITS: u32 = 8;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NumericError {
    #[error("Invalid decimal literal: {0}")]
    Parse(String),

    #[error("Value {0} has more than 8 fractional digits")]
    TooPrecise(String),

    #[error("Value {0} does not fit in 64-bit fixed point")]
    OutOfRange(String),

    #[error("Notional overflow: price {price} x quantity {qty}")]
    NotionalOverflow { price: i64, qty: i64 },
}

fn parse_fixed(s: &str) -> Result<i64, NumericError> {
    let d = Decimal::from_str(s.trim()).map_err(|_| NumericError::Parse(s.to_string()))?;
    let scaled = d
        .checked_mul(Decimal::from(SCALE))
        .ok_or_else(|| NumericError::OutOfRange(s.to_string()))?;
    if !scaled.fract().is_zero() {
        return Err(NumericError::TooPrecise(s.to_string()));
    }
    scaled
        .to_i64()
        .ok_or_else(|| NumericError::OutOfRange(s.to_string()))
}

fn fmt_fixed(raw: i64, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "{}", Decimal::new(raw, SCALE_DIGITS).normalize())
}

macro_rules! fixed_point {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
        )]
        #[serde(transparent)]
        pub struct $name(i64);

        impl $name {
            pub const ZERO: Self = Self(0);
            pub const MAX: Self = Self(i64::MAX);

            /// Wrap a raw fixed-point value
            pub const fn from_raw(raw: i64) -> Self {
                Self(raw)
            }

            /// Whole units, e.g. `from_units(3)` is `3.0`
            pub fn from_units(units: i64) -> Option<Self> {
                units.checked_mul(SCALE).map(Self)
            }

            pub const fn raw(self) -> i64 {
                self.0
            }

            pub fn is_zero(self) -> bool {
                self.0 == 0
            }

            pub fn is_positive(self) -> bool {
                self.0 > 0
            }

            pub fn checked_add(self, other: Self) -> Option<Self> {
                self.0.checked_add(other.0).map(Self)
            }

            pub fn checked_sub(self, other: Self) -> Option<Self> {
                self.0.checked_sub(other.0).map(Self)
            }

            /// Addition clamped at `i64::MAX`
            pub fn saturating_add(self, other: Self) -> Self {
                Self(self.0.saturating_add(other.0))
            }

            /// True when the value is a whole multiple of `step`
            pub fn is_multiple_of(self, step: Self) -> bool {
                step.0 > 0 && self.0 % step.0 == 0
            }

            pub fn to_decimal(self) -> Decimal {
                Decimal::new(self.0, SCALE_DIGITS)
            }
        }

        impl Add for $name {
            type Output = Self;
            fn add(self, rhs: Self) -> Self {
                Self(self.0 + rhs.0)
            }
        }

        impl AddAssign for $name {
            fn add_assign(&mut self, rhs: Self) {
                self.0 += rhs.0;
            }
        }

        impl Sub for $name {
            type Output = Self;
            fn sub(self, rhs: Self) -> Self {
                Self(self.0 - rhs.0)
            }
        }

        impl SubAssign for $name {
            fn sub_assign(&mut self, rhs: Self) {
                self.0 -= rhs.0;
            }
        }

        impl Sum for $name {
            fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, x| acc + x)
            }
        }

        impl<'a> Sum<&'a $name> for $name {
            fn sum<I: Iterator<Item = &'a Self>>(iter: I) -> Self {
                iter.fold(Self::ZERO, |acc, x| acc + *x)
            }
        }

        impl FromStr for $name {
            type Err = NumericError;
            fn from_str(s: &str) -> Result<Self, Self::Err> {
                parse_fixed(s).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                fmt_fixed(self.0, f)
            }
        }
    };
}

fixed_point!(Price);
fixed_point!(Quantity);

/// Quote amount for `qty` at `price`: `floor(price * qty / 1e8)`
///
/// Computed in 128-bit space; fails when the result does not fit `i64`.
pub fn notional(price: Price, qty: Quantity) -> Result<i64, NumericError> {
    let wide = i128::from(price.raw()) * i128::from(qty.raw()) / i128::from(SCALE);
    i64::try_from(wide).map_err(|_| NumericError::NotionalOverflow {
        price: price.raw(),
        qty: qty.raw(),
    })
}
