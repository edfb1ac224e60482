use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// A monetary amount in the smallest currency unit (cents).
///
/// Amounts are integers so aggregate arithmetic is exact: summing sub-goal
/// costs never drifts the way floating point totals do.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Cost(pub i64);

impl Cost {
    pub const ZERO: Cost = Cost(0);

    pub fn cents(self) -> i64 {
        self.0
    }

    pub fn is_negative(self) -> bool {
        self.0 < 0
    }

    /// `None` when the sum leaves the `i64` range.
    pub fn checked_add(self, rhs: Cost) -> Option<Cost> {
        self.0.checked_add(rhs.0).map(Cost)
    }

    pub fn saturating_sub(self, rhs: Cost) -> Cost {
        Cost(self.0.saturating_sub(rhs.0))
    }

    /// Sums `costs`, or `None` if any partial sum overflows.
    pub fn checked_sum<I>(costs: I) -> Option<Cost>
    where
        I: IntoIterator<Item = Cost>,
    {
        costs.into_iter().try_fold(Cost::ZERO, Cost::checked_add)
    }

    /// Formats the amount with thousands separators, e.g. `$1,500.00`.
    pub fn display(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "" };
        format!("{}${}", sign, group_amount(self.0.unsigned_abs()))
    }

    /// Formats the amount as a signed difference, e.g. `+$500.00`.
    pub fn display_signed(self) -> String {
        let sign = if self.0 < 0 { "-" } else { "+" };
        format!("{}${}", sign, group_amount(self.0.unsigned_abs()))
    }
}

fn group_amount(cents: u64) -> String {
    let units = (cents / 100).to_string();
    let mut grouped = String::with_capacity(units.len() + units.len() / 3);
    for (i, ch) in units.chars().enumerate() {
        if i > 0 && (units.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(ch);
    }
    format!("{}.{:02}", grouped, cents % 100)
}

impl fmt::Display for Cost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display())
    }
}

impl From<i64> for Cost {
    fn from(cents: i64) -> Self {
        Cost(cents)
    }
}

/// Coerces whatever a stored document holds into a cost.
///
/// Documents written by older clients may carry costs as strings, floats,
/// `null`, or garbage. Numbers are rounded to the nearest cent, numeric
/// strings are parsed, and everything else counts as zero.
pub fn coerce(value: &serde_json::Value) -> Cost {
    match value {
        serde_json::Value::Number(n) => match n.as_i64() {
            Some(i) => Cost(i),
            None => n.as_f64().map(round_cents).unwrap_or_default(),
        },
        serde_json::Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .map(Cost)
                .or_else(|_| s.parse::<f64>().map(round_cents))
                .unwrap_or_default()
        }
        _ => Cost::ZERO,
    }
}

fn round_cents(f: f64) -> Cost {
    if f.is_finite() {
        Cost(f.round() as i64)
    } else {
        Cost::ZERO
    }
}

/// Serde adapter for document fields that must tolerate malformed costs.
pub fn lenient<'de, D>(deserializer: D) -> Result<Cost, D::Error>
where
    D: Deserializer<'de>,
{
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(coerce(&value))
}
