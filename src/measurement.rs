use lazy_static::lazy_static;
use regex::Regex;
use serde::{Deserialize, Serialize};
use thiserror::Error;

lazy_static! {
    /// Text that is already acceptable while typing: digits, one optional dot, at most two decimals
    static ref TWO_DECIMALS_REGEX: Regex = Regex::new(r"^[0-9]*\.?[0-9]{0,2}$").unwrap();
    /// Longest acceptable prefix of a text that is not acceptable as a whole
    static ref TWO_DECIMALS_PREFIX_REGEX: Regex = Regex::new(r"^[0-9]*\.?[0-9]{0,2}").unwrap();
}

/// Which of the two form fields a value belongs to
///
/// Each kind carries its own ceiling and unit, used by [`parse_measurement`]
/// and by the messages shown next to the field.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MeasurementKind {
    /// Height in meters, accepted in (0, 3]
    Height,

    /// Weight in kilograms, accepted in (0, 500]
    Weight,
}

impl MeasurementKind {
    /// Largest accepted value (inclusive)
    pub fn maximum(self) -> f64 {
        match self {
            MeasurementKind::Height => 3.0,
            MeasurementKind::Weight => 500.0,
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            MeasurementKind::Height => "m",
            MeasurementKind::Weight => "kg",
        }
    }

    /// Ceiling as written in error messages
    pub fn ceiling_label(self) -> &'static str {
        match self {
            MeasurementKind::Height => "3.00 m",
            MeasurementKind::Weight => "500 kg",
        }
    }

    /// Name of the field on the wire and in the form (`altura` / `peso`)
    pub fn field_name(self) -> &'static str {
        match self {
            MeasurementKind::Height => "altura",
            MeasurementKind::Weight => "peso",
        }
    }
}

/// Why a field's text could not become a measurement
///
/// Checks run in a fixed order (number, sign, ceiling), so a negative value is
/// always reported as [`ValidationError::NonPositive`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{} is not a valid number", .kind.field_name())]
    NotANumber { kind: MeasurementKind },

    #[error("{} must be greater than 0", .kind.field_name())]
    NonPositive { kind: MeasurementKind },

    #[error("{} cannot exceed {}", .kind.field_name(), .kind.ceiling_label())]
    AboveMaximum { kind: MeasurementKind },
}

impl ValidationError {
    pub fn kind(&self) -> MeasurementKind {
        match self {
            ValidationError::NotANumber { kind }
            | ValidationError::NonPositive { kind }
            | ValidationError::AboveMaximum { kind } => *kind,
        }
    }

    /// Message shown under the offending field in the Spanish UI
    pub fn localized(&self) -> &'static str {
        match self {
            ValidationError::NotANumber {
                kind: MeasurementKind::Height,
            } => "Ingresa una altura válida. Ejemplo: 1,75",
            ValidationError::NonPositive {
                kind: MeasurementKind::Height,
            } => "La altura debe ser mayor que 0",
            ValidationError::AboveMaximum {
                kind: MeasurementKind::Height,
            } => "La altura no puede superar 3,00 m",
            ValidationError::NotANumber {
                kind: MeasurementKind::Weight,
            } => "Ingresa un peso válido. Ejemplo: 70",
            ValidationError::NonPositive {
                kind: MeasurementKind::Weight,
            } => "El peso debe ser mayor que 0",
            ValidationError::AboveMaximum {
                kind: MeasurementKind::Weight,
            } => "El peso no puede superar 500 kg",
        }
    }
}

/// Keep a text field in a state that can still become a two-decimal number
///
/// Called on every keystroke. Either `,` or `.` may be typed as the decimal
/// separator; only the first comma counts as a separator for validation.
/// Text that already has at most two decimals is returned verbatim. Otherwise
/// the longest acceptable prefix is kept, written back with the separator the
/// user typed.
///
/// The operation is idempotent and never fails.
///
/// # Examples
/// ```
/// use imc::measurement::truncate_to_two_decimals;
///
/// assert_eq!(truncate_to_two_decimals("1.234"), "1.23");
/// assert_eq!(truncate_to_two_decimals("70,456"), "70,45");
/// assert_eq!(truncate_to_two_decimals("1,7"), "1,7");
/// ```
pub fn truncate_to_two_decimals(text: &str) -> String {
    let normalized = text.replacen(',', ".", 1);

    if TWO_DECIMALS_REGEX.is_match(&normalized) {
        return text.to_string();
    }

    // The prefix pattern can match the empty string, so a match always exists
    let prefix = TWO_DECIMALS_PREFIX_REGEX
        .find(&normalized)
        .map(|m| m.as_str())
        .unwrap_or("");

    let separator = if text.contains(',') { "," } else { "." };
    prefix.replacen('.', separator, 1)
}

/// Turn the submitted text of a field into a bounded measurement
///
/// Commas are read as decimal points. The checks run in order: the text must
/// parse to a finite number, the number must be positive, and it must not
/// exceed the ceiling of `kind` (3 m for height, 500 kg for weight).
///
/// # Examples
/// ```
/// use imc::measurement::{MeasurementKind, ValidationError, parse_measurement};
///
/// assert_eq!(parse_measurement("1,75", MeasurementKind::Height), Ok(1.75));
/// assert_eq!(
///     parse_measurement("600", MeasurementKind::Weight),
///     Err(ValidationError::AboveMaximum { kind: MeasurementKind::Weight })
/// );
/// ```
pub fn parse_measurement(text: &str, kind: MeasurementKind) -> Result<f64, ValidationError> {
    let normalized = text.trim().replace(',', ".");

    let value = match normalized.parse::<f64>() {
        Ok(value) if value.is_finite() => value,
        _ => return Err(ValidationError::NotANumber { kind }),
    };

    if value <= 0.0 {
        return Err(ValidationError::NonPositive { kind });
    }

    if value > kind.maximum() {
        return Err(ValidationError::AboveMaximum { kind });
    }

    Ok(value)
}
