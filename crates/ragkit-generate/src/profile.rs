//! Model capability profiles.
//!
//! Some model families only accept their default sampling temperature and
//! reject an output-token cap. The profile is selected once from the model
//! name and applied to every call, so callers never see a rejection.
use serde::Serialize;
use std::fmt;

use ragkit_core::types::SamplingParams;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(tag = "profile", rename_all = "snake_case")]
pub enum ModelProfile {
    Standard,
    FixedTemperature { temperature: f32 },
}

impl ModelProfile {
    pub fn for_model(model: &str) -> Self {
        let m = model.to_ascii_lowercase();
        let reasoning_family = ["o1", "o3", "o4"].iter().any(|p| m == *p || m.starts_with(&format!("{p}-")));
        if m.contains("gpt-5") || reasoning_family {
            Self::FixedTemperature { temperature: 1.0 }
        } else {
            Self::Standard
        }
    }

    /// The sampling parameters actually sent for a requested temperature.
    pub fn sampling(&self, requested_temperature: f32, max_output_tokens: Option<u32>) -> SamplingParams {
        match *self {
            Self::Standard => SamplingParams { temperature: requested_temperature, max_output_tokens },
            Self::FixedTemperature { temperature } => SamplingParams { temperature, max_output_tokens: None },
        }
    }
}

impl fmt::Display for ModelProfile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Standard => f.write_str("standard"),
            Self::FixedTemperature { temperature } => write!(f, "fixed_temperature({temperature})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_selection_by_model_name() {
        assert_eq!(ModelProfile::for_model("gpt-5"), ModelProfile::FixedTemperature { temperature: 1.0 });
        assert_eq!(ModelProfile::for_model("gpt-5-mini"), ModelProfile::FixedTemperature { temperature: 1.0 });
        assert_eq!(ModelProfile::for_model("o3-mini"), ModelProfile::FixedTemperature { temperature: 1.0 });
        assert_eq!(ModelProfile::for_model("o1"), ModelProfile::FixedTemperature { temperature: 1.0 });
        assert_eq!(ModelProfile::for_model("gpt-4o-mini"), ModelProfile::Standard);
        assert_eq!(ModelProfile::for_model("omni-local"), ModelProfile::Standard);
    }

    #[test]
    fn fixed_profile_overrides_temperature_and_drops_cap() {
        let p = ModelProfile::FixedTemperature { temperature: 1.0 }.sampling(0.2, Some(500));
        assert_eq!(p, SamplingParams { temperature: 1.0, max_output_tokens: None });
        let p = ModelProfile::Standard.sampling(0.2, Some(500));
        assert_eq!(p, SamplingParams { temperature: 0.2, max_output_tokens: Some(500) });
    }
}
