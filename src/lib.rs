/*!
# IMC Calculator

A browser-based body mass index (IMC) calculator front end, built in Rust.

## Overview

Users sign in, type their height and weight, and get back a BMI and its
category from a remote calculation service. Every calculation is stored by
that service; this crate shows the history as a filterable, sortable, paged
table and aggregates it into a small dashboard.

## Architecture

### Frontend Layer
- **Technologies**: HTML, JavaScript, optional WebAssembly
- **Key Components**:
  - Measurement form - keystroke-level normalization of the two inputs
  - History table - date range filter, column sorting, pages of 10 rows
  - Dashboard - evolution series and category breakdown

### Backend Layer
- **Technologies**: Rust, axum
- **Core Components**:
  - Input Normalizer - two-decimal truncation and measurement validation
  - History Projector - filter, sort and paginate calculation records
  - Dashboard aggregation - category counts, averages and percentages
  - Sessions - cookie sessions carrying the identity provider's bearer token
  - Service clients - calculation backend and identity provider over HTTP

## Modules

- **measurement**: Input normalization and validation
- **record**: Calculation records and requests as exchanged with the backend
- **history**: Filtering, sorting and pagination of the history table
- **form**: Per-field state of the measurement form
- **dashboard**: History aggregation for the dashboard page
- **session**: Session store (web only)
- **config**: Environment configuration (web only)
- **client**: Backend and identity provider clients (web only)
- **login**: Sign-in, sign-up, logout and the auth middleware (web only)
- **app**: Routing and handlers (web only)
- **wasm**: Browser bindings for the normalizer (wasm only)

## REST API Endpoints

- `POST /api/normalize` - Truncates a measurement to two decimals
- `POST /api/calculate` - Validates and submits a measurement pair
- `GET /api/history` - One page of the filtered, sorted history
- `GET /api/dashboard` - Dashboard summary of the whole history
*/

pub mod dashboard;
pub mod form;
pub mod history;
pub mod measurement;
pub mod record;

#[cfg(feature = "web")]
pub mod app;
#[cfg(feature = "web")]
pub mod client;
#[cfg(feature = "web")]
pub mod config;
#[cfg(feature = "web")]
pub mod login;
#[cfg(feature = "web")]
pub mod session;

#[cfg(feature = "wasm")]
pub mod wasm;

pub use history::{HistoryProjector, PAGE_SIZE, Projection, project};
pub use measurement::{
    MeasurementKind, ValidationError, parse_measurement, truncate_to_two_decimals,
};
pub use record::{CalculationRecord, CalculationRequest};
