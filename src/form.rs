use serde::{Deserialize, Serialize, Serializer, ser::SerializeMap};

use crate::measurement::{
    MeasurementKind, ValidationError, parse_measurement, truncate_to_two_decimals,
};
use crate::record::CalculationRequest;

/// Error display state of one form field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum FieldState {
    #[default]
    Clean,
    Invalid(ValidationError),
}

/// A measurement input as the user edits it
///
/// Editing always truncates the text and clears a previous error; only a
/// submit can put the field back into [`FieldState::Invalid`].
#[derive(Clone, Debug, PartialEq)]
pub struct MeasurementField {
    kind: MeasurementKind,
    text: String,
    state: FieldState,
}

impl MeasurementField {
    pub fn new(kind: MeasurementKind) -> Self {
        Self {
            kind,
            text: String::new(),
            state: FieldState::Clean,
        }
    }

    pub fn kind(&self) -> MeasurementKind {
        self.kind
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn state(&self) -> FieldState {
        self.state
    }

    /// Store what the user typed, truncated to two decimals
    pub fn edit(&mut self, text: &str) {
        self.text = truncate_to_two_decimals(text);
        self.state = FieldState::Clean;
    }

    /// Parse the current text, remembering the error if there is one
    pub fn validate(&mut self) -> Result<f64, ValidationError> {
        match parse_measurement(&self.text, self.kind) {
            Ok(value) => {
                self.state = FieldState::Clean;
                Ok(value)
            }
            Err(error) => {
                self.state = FieldState::Invalid(error);
                Err(error)
            }
        }
    }
}

/// Raw text of both fields as posted by the browser
#[derive(Clone, Debug, Default, Deserialize, Serialize)]
pub struct FormInput {
    #[serde(rename = "altura", default)]
    pub height: String,

    #[serde(rename = "peso", default)]
    pub weight: String,
}

/// Errors of a rejected submit, one slot per field
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct FormErrors {
    pub height: Option<ValidationError>,
    pub weight: Option<ValidationError>,
}

impl FormErrors {
    pub fn is_empty(&self) -> bool {
        self.height.is_none() && self.weight.is_none()
    }
}

// Serialized as `{ "altura": "<message>", "peso": "<message>" }` with only the
// failing fields present.
impl Serialize for FormErrors {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let present = [self.height, self.weight].iter().flatten().count();
        let mut map = serializer.serialize_map(Some(present))?;
        for error in [self.height, self.weight].into_iter().flatten() {
            map.serialize_entry(error.kind().field_name(), error.localized())?;
        }
        map.end()
    }
}

/// The height/weight form
#[derive(Clone, Debug, PartialEq)]
pub struct ImcForm {
    pub height: MeasurementField,
    pub weight: MeasurementField,
}

impl Default for ImcForm {
    fn default() -> Self {
        Self {
            height: MeasurementField::new(MeasurementKind::Height),
            weight: MeasurementField::new(MeasurementKind::Weight),
        }
    }
}

impl ImcForm {
    /// Form filled from posted text, as if the user had typed it
    pub fn from_input(input: &FormInput) -> Self {
        let mut form = Self::default();
        form.height.edit(&input.height);
        form.weight.edit(&input.weight);
        form
    }

    /// Validate both fields and build the calculation payload
    ///
    /// Both fields are always checked so the user sees every problem at once.
    pub fn submit(&mut self) -> Result<CalculationRequest, FormErrors> {
        let height = self.height.validate();
        let weight = self.weight.validate();

        match (height, weight) {
            (Ok(height), Ok(weight)) => Ok(CalculationRequest::from_validated(height, weight)),
            (height, weight) => Err(FormErrors {
                height: height.err(),
                weight: weight.err(),
            }),
        }
    }
}
