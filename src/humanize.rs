//! Human-readable size parsing and formatting utilities

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Size not specified")]
    Empty,

    #[error("Invalid number: {0}")]
    InvalidNumber(#[from] std::num::ParseFloatError),

    #[error("Invalid size prefix: {0}")]
    InvalidPrefix(String),
}

/// Byte size wrapper with human-readable parsing
///
/// Metric prefixes are powers of 1000 (`1K` = 1000 bytes) and binary
/// prefixes are powers of 1024 (`1KiB` = 1024 bytes), with an optional
/// trailing `B` and fractional values allowed (`1.5G`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub struct ByteSize(pub u64);

const PREFIXES: &[(char, u32)] = &[
    ('K', 1),
    ('M', 2),
    ('G', 3),
    ('T', 4),
    ('P', 5),
    ('E', 6),
    ('Z', 7),
    ('Y', 8),
];

fn prefix_exponent(c: char) -> Option<u32> {
    PREFIXES.iter().find(|&&(p, _)| p == c).map(|&(_, e)| e)
}

impl ByteSize {
    pub fn as_u64(&self) -> u64 {
        self.0
    }

    pub fn to_human_readable(&self) -> String {
        const UNITS: &[(&str, u64)] = &[
            ("B", 1),
            ("KiB", 1024),
            ("MiB", 1024 * 1024),
            ("GiB", 1024 * 1024 * 1024),
            ("TiB", 1024 * 1024 * 1024 * 1024),
        ];

        for (i, &(unit, divisor)) in UNITS.iter().enumerate().rev() {
            if self.0 >= divisor {
                let value = self.0 / divisor;
                let remainder = self.0 % divisor;

                if remainder == 0 || i == 0 {
                    return format!("{}{}", value, unit);
                }
                let decimal = remainder * 10 / divisor;
                if decimal > 0 {
                    return format!("{}.{}{}", value, decimal, unit);
                }
                return format!("{}{}", value, unit);
            }
        }

        format!("{}B", self.0)
    }
}

impl FromStr for ByteSize {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut value = s.trim().to_uppercase();
        if value.is_empty() {
            return Err(ParseError::Empty);
        }

        if value.ends_with('B') {
            value.pop();
        }

        let (number, multiplier) = if value.ends_with('I') {
            value.pop();
            match value.pop().and_then(prefix_exponent) {
                Some(exp) => (value, 1024f64.powi(exp as i32)),
                None => return Err(ParseError::InvalidPrefix(s.trim().to_string())),
            }
        } else if let Some(exp) = value.chars().last().and_then(prefix_exponent) {
            value.pop();
            (value, 1000f64.powi(exp as i32))
        } else {
            (value, 1.0)
        };

        let number: f64 = number.trim().parse()?;
        Ok(ByteSize((number * multiplier) as u64))
    }
}

impl<'de> Deserialize<'de> for ByteSize {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        struct ByteSizeVisitor;

        impl serde::de::Visitor<'_> for ByteSizeVisitor {
            type Value = ByteSize;

            fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
                formatter.write_str("a byte size as string (e.g., \"5M\", \"1GiB\") or integer")
            }

            fn visit_u64<E>(self, v: u64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                Ok(ByteSize(v))
            }

            fn visit_i64<E>(self, v: i64) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                u64::try_from(v)
                    .map(ByteSize)
                    .map_err(|_| E::custom("byte size cannot be negative"))
            }

            fn visit_str<E>(self, v: &str) -> Result<Self::Value, E>
            where
                E: serde::de::Error,
            {
                v.parse::<ByteSize>().map_err(serde::de::Error::custom)
            }
        }

        deserializer.deserialize_any(ByteSizeVisitor)
    }
}

impl fmt::Display for ByteSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_human_readable())
    }
}
