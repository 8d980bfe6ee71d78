//! Signed 24.8 fixed-point numbers.

/// A signed 24.8 fixed-point value, stored as its raw wire word.
#[derive(Copy, Clone, Debug, Default, Hash, PartialEq, Eq, PartialOrd, Ord)]
pub struct Fixed(i32);

impl Fixed {
    pub const ZERO: Fixed = Fixed(0);
    pub const ONE: Fixed = Fixed(256);

    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Integer values outside the 24-bit range wrap, as on the wire.
    pub const fn from_int(v: i32) -> Self {
        Self(v.wrapping_mul(256))
    }

    /// Truncates toward negative infinity, like an arithmetic shift.
    pub const fn to_int(self) -> i32 {
        self.0 >> 8
    }

    /// Rounds to the nearest representable value.
    pub fn from_f64(v: f64) -> Self {
        Self((v * 256.0).round() as i32)
    }

    pub fn to_f64(self) -> f64 {
        self.0 as f64 / 256.0
    }
}

impl From<i32> for Fixed {
    fn from(v: i32) -> Self {
        Self::from_int(v)
    }
}

impl From<Fixed> for f64 {
    fn from(v: Fixed) -> Self {
        v.to_f64()
    }
}

impl std::fmt::Display for Fixed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_f64())
    }
}
