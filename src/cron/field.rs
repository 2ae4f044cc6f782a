//! Time-field compiler: one textual cron field into a compact bitset.
//!
//! A field expression is a comma-separated list of ranges, each optionally
//! stepped: `*`, `5`, `2-8`, `*/15`, `10-50/5`, `mon-fri`. Every eligible
//! value becomes one set bit in a [`FieldSet`].

use crate::error::FieldError;

/// Marker bit recording that the source expression was an unrestricted `*`
/// (or a stepped wildcard with step exactly 1). Field values never exceed
/// bit 59, so the top bit is free to carry the tag.
pub const STAR_BIT: u64 = 1 << 63;

/// Valid value range for one time dimension, plus the name table for the
/// fields that accept three-letter names.
#[derive(Debug, Clone, Copy)]
pub struct Bounds {
    pub min: u32,
    pub max: u32,
    pub names: &'static [(&'static str, u32)],
}

pub const MINUTE: Bounds = Bounds {
    min: 0,
    max: 59,
    names: &[],
};

pub const HOUR: Bounds = Bounds {
    min: 0,
    max: 23,
    names: &[],
};

pub const DAY_OF_MONTH: Bounds = Bounds {
    min: 1,
    max: 31,
    names: &[],
};

pub const MONTH: Bounds = Bounds {
    min: 1,
    max: 12,
    names: &[
        ("jan", 1),
        ("feb", 2),
        ("mar", 3),
        ("apr", 4),
        ("may", 5),
        ("jun", 6),
        ("jul", 7),
        ("aug", 8),
        ("sep", 9),
        ("oct", 10),
        ("nov", 11),
        ("dec", 12),
    ],
};

pub const DAY_OF_WEEK: Bounds = Bounds {
    min: 0,
    max: 6,
    names: &[
        ("sun", 0),
        ("mon", 1),
        ("tue", 2),
        ("wed", 3),
        ("thu", 4),
        ("fri", 5),
        ("sat", 6),
    ],
};

/// Compiled set of eligible values for one time dimension.
///
/// Bit `i` set means value `i` matches. Bit 63 is [`STAR_BIT`], which only
/// matters for the day-of-month/day-of-week combining rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSet(u64);

impl FieldSet {
    pub fn contains(self, value: u32) -> bool {
        self.0 & (1u64 << value) != 0
    }

    /// Whether the source expression was the unrestricted wildcard.
    pub fn is_wildcard(self) -> bool {
        self.0 & STAR_BIT != 0
    }

    pub fn bits(self) -> u64 {
        self.0
    }
}

/// Compile a full field expression (comma list of ranges) against `bounds`.
pub fn parse_field(field: &str, bounds: &Bounds) -> Result<FieldSet, FieldError> {
    let mut bits = 0u64;
    for expr in field.split(',').filter(|s| !s.is_empty()) {
        bits |= parse_range(expr, bounds)?;
    }
    Ok(FieldSet(bits))
}

fn parse_range(expr: &str, bounds: &Bounds) -> Result<u64, FieldError> {
    let range_and_step: Vec<&str> = expr.split('/').collect();
    let low_and_high: Vec<&str> = range_and_step[0].split('-').collect();
    let single_value = low_and_high.len() == 1;

    let mut star = 0u64;
    let start;
    let mut end;
    if low_and_high[0] == "*" {
        start = bounds.min;
        end = bounds.max;
        star = STAR_BIT;
    } else {
        start = parse_int_or_name(low_and_high[0], bounds.names)?;
        match low_and_high.len() {
            1 => end = start,
            2 => end = parse_int_or_name(low_and_high[1], bounds.names)?,
            _ => return Err(FieldError::TooManyHyphens(expr.to_string())),
        }
    }

    let step = match range_and_step.len() {
        1 => 1,
        2 => {
            let step = parse_int(range_and_step[1])?;
            // "N/step" with no explicit upper bound means "N-max/step".
            if single_value {
                end = bounds.max;
            }
            // A stepped wildcard is restricted; it loses the tag. A step of
            // exactly 1 keeps it, which governs the dom/dow combining rule.
            if step > 1 {
                star = 0;
            }
            step
        }
        _ => return Err(FieldError::TooManySlashes(expr.to_string())),
    };

    if start < bounds.min {
        return Err(FieldError::BelowMinimum {
            start,
            min: bounds.min,
            expr: expr.to_string(),
        });
    }
    if end > bounds.max {
        return Err(FieldError::AboveMaximum {
            end,
            max: bounds.max,
            expr: expr.to_string(),
        });
    }
    if start > end {
        return Err(FieldError::InvertedRange {
            start,
            end,
            expr: expr.to_string(),
        });
    }
    if step == 0 {
        return Err(FieldError::ZeroStep(expr.to_string()));
    }

    Ok(make_range(start, end, step) | star)
}

fn parse_int_or_name(expr: &str, names: &[(&str, u32)]) -> Result<u32, FieldError> {
    let lower = expr.to_ascii_lowercase();
    if let Some(&(_, value)) = names.iter().find(|(name, _)| *name == lower) {
        return Ok(value);
    }
    parse_int(expr)
}

fn parse_int(expr: &str) -> Result<u32, FieldError> {
    let num: i64 = expr
        .parse()
        .map_err(|_| FieldError::BadInt(expr.to_string()))?;
    if num < 0 {
        return Err(FieldError::Negative {
            num,
            expr: expr.to_string(),
        });
    }
    u32::try_from(num).map_err(|_| FieldError::BadInt(expr.to_string()))
}

/// Set the bits `{min, min+step, min+2*step, ...}` up to `max` inclusive.
///
/// For step 1 this is a closed-interval fill computed with shifts; the
/// iterative loop below produces the same bits (property-tested).
pub fn make_range(min: u32, max: u32, step: u32) -> u64 {
    debug_assert!(max < 63);

    if step == 1 {
        return (u64::MAX << min) & (u64::MAX >> (63 - max));
    }

    let mut bits = 0u64;
    let mut i = u64::from(min);
    while i <= u64::from(max) {
        bits |= 1 << i;
        i += u64::from(step);
    }
    bits
}
