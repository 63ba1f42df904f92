use std::sync::Arc;

use yieldcast_core::{
    error::{ErrorKind, EstimateError},
    model::{Orientation, SolarSpec},
    service::{Estimate, YieldService},
};

/// Orientations in compass order, for cycling with the arrow keys.
const COMPASS: [Orientation; 8] = [
    Orientation::North,
    Orientation::NorthEast,
    Orientation::East,
    Orientation::SouthEast,
    Orientation::South,
    Orientation::SouthWest,
    Orientation::West,
    Orientation::NorthWest,
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Screen {
    Form,
    Results,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Postcode,
    Capacity,
    Orientation,
    Tilt,
    Shading,
    Inverter,
}

impl Field {
    pub(crate) const ALL: [Field; 6] = [
        Field::Postcode,
        Field::Capacity,
        Field::Orientation,
        Field::Tilt,
        Field::Shading,
        Field::Inverter,
    ];

    pub(crate) fn label(self) -> &'static str {
        match self {
            Field::Postcode => "Postcode",
            Field::Capacity => "Capacity (kWp)",
            Field::Orientation => "Orientation",
            Field::Tilt => "Tilt (°, blank = optimal)",
            Field::Shading => "Shading factor",
            Field::Inverter => "Inverter efficiency",
        }
    }

    fn position(self) -> usize {
        Field::ALL
            .iter()
            .position(|field| *field == self)
            .unwrap_or_default()
    }

    pub(crate) fn next(self) -> Field {
        let index = (self.position() + 1) % Field::ALL.len();
        Field::ALL.get(index).copied().unwrap_or(self)
    }

    pub(crate) fn previous(self) -> Field {
        let index = (self.position() + Field::ALL.len() - 1) % Field::ALL.len();
        Field::ALL.get(index).copied().unwrap_or(self)
    }
}

/// Editable inputs of the estimate form.
#[derive(Debug, Clone)]
pub(crate) struct Form {
    pub focus: Field,
    pub postcode: String,
    pub capacity: String,
    pub orientation: Orientation,
    pub tilt: String,
    pub shading: String,
    pub inverter: String,
}

impl Default for Form {
    fn default() -> Self {
        let defaults = SolarSpec::new(4.0);
        Self {
            focus: Field::Postcode,
            postcode: String::new(),
            capacity: defaults.capacity_kwp.to_string(),
            orientation: defaults.orientation,
            tilt: String::new(),
            shading: defaults.shading_factor.to_string(),
            inverter: defaults.inverter_efficiency.to_string(),
        }
    }
}

impl Form {
    /// Text buffer behind the focused field; the orientation field has none.
    pub(crate) fn focused_input(&mut self) -> Option<&mut String> {
        match self.focus {
            Field::Postcode => Some(&mut self.postcode),
            Field::Capacity => Some(&mut self.capacity),
            Field::Orientation => None,
            Field::Tilt => Some(&mut self.tilt),
            Field::Shading => Some(&mut self.shading),
            Field::Inverter => Some(&mut self.inverter),
        }
    }

    pub(crate) fn value(&self, field: Field) -> &str {
        match field {
            Field::Postcode => &self.postcode,
            Field::Capacity => &self.capacity,
            Field::Orientation => self.orientation.label(),
            Field::Tilt => &self.tilt,
            Field::Shading => &self.shading,
            Field::Inverter => &self.inverter,
        }
    }

    pub(crate) fn rotate_orientation(&mut self, clockwise: bool) {
        let current = COMPASS
            .iter()
            .position(|orientation| *orientation == self.orientation)
            .unwrap_or_default();
        let step = if clockwise { 1 } else { COMPASS.len() - 1 };
        let index = (current + step) % COMPASS.len();
        self.orientation = COMPASS.get(index).copied().unwrap_or_default();
    }

    /// Read the inputs into a specification; bounds are checked by the service.
    pub(crate) fn build_spec(&self) -> Result<SolarSpec, String> {
        let capacity = parse_number(Field::Capacity, &self.capacity)?;
        let shading = parse_number(Field::Shading, &self.shading)?;
        let inverter = parse_number(Field::Inverter, &self.inverter)?;

        let mut spec = SolarSpec::new(capacity)
            .with_orientation(self.orientation)
            .with_shading(shading)
            .with_inverter_efficiency(inverter);
        if !self.tilt.trim().is_empty() {
            spec = spec.with_tilt(parse_number(Field::Tilt, &self.tilt)?);
        }
        Ok(spec)
    }
}

pub(crate) struct App {
    pub service: Arc<YieldService>,

    pub screen: Screen,
    pub form: Form,
    pub estimate: Option<Estimate>,

    pub is_loading: bool,
    pub error_message: Option<String>,
}

impl App {
    pub(crate) fn new(service: Arc<YieldService>) -> Self {
        Self {
            service,
            screen: Screen::Form,
            form: Form::default(),
            estimate: None,
            is_loading: false,
            error_message: None,
        }
    }

    pub(crate) fn show_estimate(&mut self, estimate: Estimate) {
        self.estimate = Some(estimate);
        self.error_message = None;
        self.screen = Screen::Results;
    }
}

fn parse_number(field: Field, raw: &str) -> Result<f64, String> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| format!("{} must be a number, got '{}'", field.label(), raw.trim()))
}

/// Message shown for a failed estimate, prefixed with its stable code.
pub(crate) fn describe_error(err: &EstimateError) -> String {
    let kind = err.kind();
    let text = match kind {
        ErrorKind::LocationNotFound => "Postcode not recognised, check it and try again".to_owned(),
        ErrorKind::LocationServiceUnavailable => {
            "Postcode service is unavailable, try again later".to_owned()
        }
        ErrorKind::ClimateServiceUnavailable => {
            "Climate data service is unavailable, try again later".to_owned()
        }
        ErrorKind::ClimateDataMalformed => {
            "Climate data for this location is incomplete".to_owned()
        }
        ErrorKind::UnsupportedSystemType => "Only solar estimates are supported".to_owned(),
        ErrorKind::Validation | ErrorKind::Internal => err.to_string(),
    };
    format!("[{}] {text}", kind.code())
}
