//! Browser bindings for the input normalizer
//!
//! Built into `static/pkg` with
//! `wasm-pack build --target web --out-dir static/pkg -- --no-default-features --features wasm`.
//! `static/imc.js` loads `/static/pkg/imc.js` on the form page and falls back
//! to `POST /api/normalize` when the module is not there.

use wasm_bindgen::prelude::*;

use crate::measurement::{self, MeasurementKind};

/// Keystroke-level truncation of a measurement field
#[wasm_bindgen(js_name = truncateToTwoDecimals)]
pub fn truncate_to_two_decimals(text: &str) -> String {
    measurement::truncate_to_two_decimals(text)
}

/// Localized validation message for a field, or `undefined` when valid
///
/// `field` is `"altura"` or `"peso"`; anything else is treated as weight.
#[wasm_bindgen(js_name = validateMeasurement)]
pub fn validate_measurement(text: &str, field: &str) -> Option<String> {
    let kind = match field {
        "altura" | "height" => MeasurementKind::Height,
        _ => MeasurementKind::Weight,
    };
    measurement::parse_measurement(text, kind)
        .err()
        .map(|err| err.localized().to_string())
}
