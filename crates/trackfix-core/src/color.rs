#![forbid(unsafe_code)]

//! Track display colors.

use std::fmt;

use serde::{Serialize, Serializer};

/// A 24-bit display color.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    #[inline]
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Build from the low 24 bits of `value` (`0xRRGGBB`).
    #[inline]
    pub const fn from_u32(value: u32) -> Self {
        Self {
            r: ((value >> 16) & 0xff) as u8,
            g: ((value >> 8) & 0xff) as u8,
            b: (value & 0xff) as u8,
        }
    }

    /// Parse `#rrggbb` (the leading `#` is optional).
    pub fn from_hex(text: &str) -> Option<Self> {
        let digits = text.strip_prefix('#').unwrap_or(text);
        if digits.len() != 6 {
            return None;
        }
        u32::from_str_radix(digits, 16).ok().map(Self::from_u32)
    }

    /// CSS-style `#rrggbb`.
    pub fn to_hex(self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }
}

impl Serialize for Rgb {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// Source of arbitrary track colors.
///
/// Deterministic for a given seed (xorshift64), so sessions replayed from a
/// script assign the same colors.
#[derive(Debug, Clone)]
pub struct Palette {
    state: u64,
}

impl Default for Palette {
    fn default() -> Self {
        Self::new(0x5eed_7ac4)
    }
}

impl Palette {
    pub fn new(seed: u64) -> Self {
        Self {
            state: if seed == 0 { 1 } else { seed },
        }
    }

    fn next_u64(&mut self) -> u64 {
        let mut x = self.state;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.state = x;
        x
    }

    /// Next color in the sequence.
    pub fn next_color(&mut self) -> Rgb {
        Rgb::from_u32((self.next_u64() % 0x0100_0000) as u32)
    }

    /// Next color that differs from every color in `taken`.
    pub fn next_distinct(&mut self, taken: &[Rgb]) -> Rgb {
        loop {
            let color = self.next_color();
            if !taken.contains(&color) {
                return color;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let color = Rgb::new(0x12, 0xab, 0x0f);
        assert_eq!(color.to_hex(), "#12ab0f");
        assert_eq!(Rgb::from_hex("#12ab0f"), Some(color));
        assert_eq!(Rgb::from_hex("12AB0F"), Some(color));
    }

    #[test]
    fn from_hex_rejects_bad_input() {
        assert_eq!(Rgb::from_hex("#123"), None);
        assert_eq!(Rgb::from_hex("#zzzzzz"), None);
    }

    #[test]
    fn palette_is_deterministic_per_seed() {
        let mut a = Palette::new(42);
        let mut b = Palette::new(42);
        for _ in 0..16 {
            assert_eq!(a.next_color(), b.next_color());
        }
    }

    #[test]
    fn next_distinct_skips_taken_colors() {
        let mut replay = Palette::new(7);
        let first = replay.next_color();
        let mut palette = Palette::new(7);
        let color = palette.next_distinct(&[first]);
        assert_ne!(color, first);
    }

    #[test]
    fn zero_seed_is_usable() {
        let mut palette = Palette::new(0);
        let _ = palette.next_color();
    }
}
