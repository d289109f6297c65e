//! Temperature unit classification and conversion.

/// Physical unit of a temperature array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TemperatureUnit {
    Kelvin,
    Celsius,
    Fahrenheit,
}

/// Values above this are only plausible as Kelvin for sea water.
const KELVIN_INFERENCE_THRESHOLD: f64 = 150.0;

impl TemperatureUnit {
    /// Classify a declared unit string by substring match.
    ///
    /// Recognizes the spellings providers actually use: `K`, `kelvin`,
    /// `degree_K`, `degree_C`, `Celsius`, `degC`, `deg_F` and so on.
    pub fn classify(units: &str) -> Option<Self> {
        let lower = units.trim().to_ascii_lowercase();
        let squashed: String = lower
            .chars()
            .filter(|c| c.is_ascii_alphabetic())
            .collect();

        if lower.contains("kelvin") || squashed == "k" || squashed.ends_with("degk")
            || squashed.ends_with("degreek")
            || squashed.ends_with("degreesk")
        {
            Some(TemperatureUnit::Kelvin)
        } else if lower.contains("celsius")
            || lower.contains("centigrade")
            || squashed == "c"
            || squashed.ends_with("degc")
            || squashed.ends_with("degreec")
            || squashed.ends_with("degreesc")
        {
            Some(TemperatureUnit::Celsius)
        } else if lower.contains("fahrenheit")
            || squashed == "f"
            || squashed.ends_with("degf")
            || squashed.ends_with("degreef")
            || squashed.ends_with("degreesf")
        {
            Some(TemperatureUnit::Fahrenheit)
        } else {
            None
        }
    }

    /// Fallback when no usable unit is declared: mean magnitude decides
    /// between Kelvin and Celsius.
    pub fn infer_from_values(values: &[f64]) -> Self {
        let (sum, count) = values
            .iter()
            .filter(|v| v.is_finite())
            .fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));

        if count > 0 && sum / count as f64 > KELVIN_INFERENCE_THRESHOLD {
            TemperatureUnit::Kelvin
        } else {
            TemperatureUnit::Celsius
        }
    }

    /// Convert one value to °F.
    #[inline]
    pub fn to_fahrenheit(self, value: f64) -> f64 {
        match self {
            TemperatureUnit::Kelvin => (value - 273.15) * 1.8 + 32.0,
            TemperatureUnit::Celsius => value * 1.8 + 32.0,
            TemperatureUnit::Fahrenheit => value,
        }
    }
}
