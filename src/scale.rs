use serde::{Deserialize, Serialize};
use std::borrow::Cow;

use crate::error::GradingError;

/// One row of a threshold table: inputs `>= min` map to `value`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Band<T> {
    pub min: f64,
    pub value: T,
}

const fn band<T>(min: f64, value: T) -> Band<T> {
    Band { min, value }
}

/// Shared lookup for every table in this module.
///
/// Bands are ordered by descending `min`. The first band whose threshold is
/// met or exceeded wins; anything below the last threshold (or NaN) falls into
/// the last band.
pub fn find_band<T: Copy>(bands: &[Band<T>], x: f64) -> Option<T> {
    bands
        .iter()
        .find(|b| x >= b.min)
        .or_else(|| bands.last())
        .map(|b| b.value)
}

pub const TRANSMUTED_MIN: u8 = 60;

/// DepEd Order No. 8, s. 2015 transmutation table (initial grade -> quarterly grade).
pub const SHS_TRANSMUTATION: &[Band<u8>] = &[
    band(100.0, 100),
    band(98.40, 99),
    band(96.80, 98),
    band(95.20, 97),
    band(93.60, 96),
    band(92.00, 95),
    band(90.40, 94),
    band(88.80, 93),
    band(87.20, 92),
    band(85.60, 91),
    band(84.00, 90),
    band(82.40, 89),
    band(80.80, 88),
    band(79.20, 87),
    band(77.60, 86),
    band(76.00, 85),
    band(74.40, 84),
    band(72.80, 83),
    band(71.20, 82),
    band(69.60, 81),
    band(68.00, 80),
    band(66.40, 79),
    band(64.80, 78),
    band(63.20, 77),
    band(61.60, 76),
    band(60.00, 75),
    band(56.00, 74),
    band(52.00, 73),
    band(48.00, 72),
    band(44.00, 71),
    band(40.00, 70),
    band(36.00, 69),
    band(32.00, 68),
    band(28.00, 67),
    band(24.00, 66),
    band(20.00, 65),
    band(16.00, 64),
    band(12.00, 63),
    band(8.00, 62),
    band(4.00, 61),
    band(0.00, 60),
];

pub const SHS_DESCRIPTORS: &[Band<&str>] = &[
    band(90.0, "Outstanding"),
    band(85.0, "Very Satisfactory"),
    band(80.0, "Satisfactory"),
    band(75.0, "Fairly Satisfactory"),
    band(0.0, "Did Not Meet Expectations"),
];

/// Inverted 5-point scale: 1.00 is the highest grade, 3.00 the lowest pass.
pub const FIVE_POINT: &[Band<f64>] = &[
    band(97.0, 1.00),
    band(94.0, 1.25),
    band(91.0, 1.50),
    band(88.0, 1.75),
    band(85.0, 2.00),
    band(82.0, 2.25),
    band(79.0, 2.50),
    band(76.0, 2.75),
    band(75.0, 3.00),
    band(0.0, 5.00),
];

pub const FOUR_POINT: &[Band<f64>] = &[
    band(93.0, 4.00),
    band(90.0, 3.70),
    band(87.0, 3.30),
    band(83.0, 3.00),
    band(80.0, 2.70),
    band(77.0, 2.30),
    band(73.0, 2.00),
    band(70.0, 1.70),
    band(67.0, 1.30),
    band(65.0, 1.00),
    band(0.0, 0.00),
];

/// Maps a raw 0-100 initial grade onto the transmuted 60-100 band.
///
/// Out-of-range input clamps to the nearest band.
pub fn transmute_shs_grade(raw_percentage: f64) -> u8 {
    find_band(SHS_TRANSMUTATION, raw_percentage).unwrap_or(TRANSMUTED_MIN)
}

pub fn shs_descriptor(transmuted_grade: u8) -> &'static str {
    find_band(SHS_DESCRIPTORS, f64::from(transmuted_grade)).unwrap_or("Did Not Meet Expectations")
}

/// An institution-supplied college table.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomScale {
    bands: Vec<Band<f64>>,
    decimals: usize,
    passing_value: f64,
    lower_is_better: bool,
}

impl CustomScale {
    pub fn new(
        bands: Vec<Band<f64>>,
        decimals: usize,
        passing_value: f64,
        lower_is_better: bool,
    ) -> Result<Self, GradingError> {
        let Some(last) = bands.last() else {
            return Err(GradingError::config("customScale.bands must not be empty"));
        };
        if last.min > 0.0 {
            return Err(GradingError::config(format!(
                "customScale.bands must cover 0 (last threshold is {})",
                last.min
            )));
        }
        if bands
            .iter()
            .any(|b| !b.min.is_finite() || !b.value.is_finite())
        {
            return Err(GradingError::config(
                "customScale.bands must contain finite numbers",
            ));
        }
        if bands.windows(2).any(|w| w[1].min >= w[0].min) {
            return Err(GradingError::config(
                "customScale.bands thresholds must be strictly descending",
            ));
        }
        if decimals > 4 {
            return Err(GradingError::config("customScale.decimals must be <= 4"));
        }
        if !passing_value.is_finite() {
            return Err(GradingError::config(
                "customScale.passingValue must be finite",
            ));
        }
        Ok(Self {
            bands,
            decimals,
            passing_value,
            lower_is_better,
        })
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NumericScale {
    FivePoint,
    FourPoint,
    HundredPoint,
    Custom(CustomScale),
}

impl NumericScale {
    pub fn as_str(&self) -> &'static str {
        match self {
            NumericScale::FivePoint => "fivePoint",
            NumericScale::FourPoint => "fourPoint",
            NumericScale::HundredPoint => "hundredPoint",
            NumericScale::Custom(_) => "custom",
        }
    }

    /// Resolves a built-in scale name. `custom` needs its table and is
    /// handled by the config parser.
    pub fn builtin(name: &str) -> Result<Self, GradingError> {
        match name {
            "fivePoint" => Ok(NumericScale::FivePoint),
            "fourPoint" => Ok(NumericScale::FourPoint),
            "hundredPoint" => Ok(NumericScale::HundredPoint),
            other => Err(GradingError::config(format!(
                "unrecognized numeric scale: {other}"
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Conversion {
    /// The scale value is the percentage itself.
    Percent,
    Bands(Cow<'static, [Band<f64>]>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScaleTable {
    pub conversion: Conversion,
    pub decimals: usize,
    pub passing_value: f64,
    pub lower_is_better: bool,
}

impl ScaleTable {
    pub fn scale_value(&self, percentage: f64) -> f64 {
        match &self.conversion {
            Conversion::Percent => percentage,
            Conversion::Bands(bands) => find_band(&bands[..], percentage).unwrap_or(0.0),
        }
    }

    pub fn passes(&self, value: f64) -> bool {
        if self.lower_is_better {
            value <= self.passing_value
        } else {
            value >= self.passing_value
        }
    }

    pub fn bands(&self) -> &[Band<f64>] {
        match &self.conversion {
            Conversion::Percent => &[],
            Conversion::Bands(bands) => &bands[..],
        }
    }
}

pub fn college_scale_table(scale: &NumericScale) -> ScaleTable {
    match scale {
        NumericScale::FivePoint => ScaleTable {
            conversion: Conversion::Bands(Cow::Borrowed(FIVE_POINT)),
            decimals: 2,
            passing_value: 3.0,
            lower_is_better: true,
        },
        NumericScale::FourPoint => ScaleTable {
            conversion: Conversion::Bands(Cow::Borrowed(FOUR_POINT)),
            decimals: 2,
            passing_value: 1.0,
            lower_is_better: false,
        },
        NumericScale::HundredPoint => ScaleTable {
            conversion: Conversion::Percent,
            decimals: 1,
            passing_value: 75.0,
            lower_is_better: false,
        },
        NumericScale::Custom(custom) => ScaleTable {
            conversion: Conversion::Bands(Cow::Owned(custom.bands.clone())),
            decimals: custom.decimals,
            passing_value: custom.passing_value,
            lower_is_better: custom.lower_is_better,
        },
    }
}

pub fn college_remark(value: f64, scale: &NumericScale) -> &'static str {
    if college_scale_table(scale).passes(value) {
        "Passed"
    } else {
        "Failed"
    }
}
