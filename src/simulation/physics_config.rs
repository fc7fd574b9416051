//! Scalar model parameters and the snapshot/playback cadence.
//!
//! Both are supplied once per run and validated before any engine state is
//! allocated.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Number of entries in the ordered parameter list `[Δt, pipeLength, gravity, Ke]`.
pub const MODEL_PARAMETER_COUNT: usize = 4;

/// Default cadence: snapshot every 200 steps, stop at 3000, 300 sub-frames per interval.
pub const DEFAULT_DRAWING_STEPS: [u32; 3] = [200, 3000, 300];

/// Constants of the virtual-pipe model for one run.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct ModelParameters {
    /// Time step
    pub delta_t: f32,
    /// Length of a virtual pipe between two cells
    pub pipe_length: f32,
    /// Gravitational acceleration
    pub gravity: f32,
    /// Flow resistance coefficient
    pub ke: f32,
}

impl Default for ModelParameters {
    fn default() -> Self {
        Self {
            delta_t: 0.02,
            pipe_length: 1.0,
            gravity: 9.81,
            ke: 0.0,
        }
    }
}

impl ModelParameters {
    /// Build from the ordered list form and validate.
    pub fn from_list(list: &[f32]) -> Result<Self, ConfigError> {
        let [delta_t, pipe_length, gravity, ke] = <[f32; MODEL_PARAMETER_COUNT]>::try_from(list)
            .map_err(|_| ConfigError::ParameterCount {
                expected: MODEL_PARAMETER_COUNT,
                actual: list.len(),
            })?;
        let params = Self {
            delta_t,
            pipe_length,
            gravity,
            ke,
        };
        params.validate()?;
        Ok(params)
    }

    pub fn to_list(&self) -> [f32; MODEL_PARAMETER_COUNT] {
        [self.delta_t, self.pipe_length, self.gravity, self.ke]
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.delta_t.is_finite() && self.delta_t > 0.0) {
            return Err(ConfigError::InvalidTimeStep(self.delta_t));
        }
        if !(self.pipe_length.is_finite() && self.pipe_length > 0.0) {
            return Err(ConfigError::InvalidPipeLength(self.pipe_length));
        }
        if !(self.gravity.is_finite() && self.gravity >= 0.0) {
            return Err(ConfigError::InvalidGravity(self.gravity));
        }
        if !(self.ke.is_finite() && self.ke >= 0.0) {
            return Err(ConfigError::InvalidResistance(self.ke));
        }
        Ok(())
    }
}

/// How often snapshots are captured, when the run stops, and how many
/// playback sub-frames interpolate between two snapshots.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DrawingParams {
    pub saving_step: u32,
    pub ending_step: u32,
    pub drawing_step: u32,
}

impl Default for DrawingParams {
    fn default() -> Self {
        let [saving_step, ending_step, drawing_step] = DEFAULT_DRAWING_STEPS;
        Self {
            saving_step,
            ending_step,
            drawing_step,
        }
    }
}

impl DrawingParams {
    pub fn new(saving_step: u32, ending_step: u32, drawing_step: u32) -> Result<Self, ConfigError> {
        let params = Self {
            saving_step,
            ending_step,
            drawing_step,
        };
        params.validate()?;
        Ok(params)
    }

    /// Build from the ordered list form `[savingStep, endingStep, drawingStep]`.
    pub fn from_list(list: &[u32]) -> Result<Self, ConfigError> {
        match *list {
            [saving, ending, drawing] => Self::new(saving, ending, drawing),
            _ => Err(ConfigError::ParameterCount {
                expected: 3,
                actual: list.len(),
            }),
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.saving_step == 0 {
            return Err(ConfigError::InvalidDrawing("saving step must be positive".into()));
        }
        if self.drawing_step == 0 {
            return Err(ConfigError::InvalidDrawing("drawing step must be positive".into()));
        }
        if self.ending_step < self.saving_step {
            return Err(ConfigError::InvalidDrawing(format!(
                "ending step {} is before the first saving step {}",
                self.ending_step, self.saving_step
            )));
        }
        Ok(())
    }

    /// Snapshots a full run produces. A trailing partial interval is not captured.
    pub fn expected_snapshots(&self) -> u32 {
        self.ending_step / self.saving_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parameters_from_ordered_list() {
        let params = ModelParameters::from_list(&[0.1, 2.0, 9.8, 0.5]).unwrap();
        assert_eq!(params.delta_t, 0.1);
        assert_eq!(params.pipe_length, 2.0);
        assert_eq!(params.gravity, 9.8);
        assert_eq!(params.ke, 0.5);
        assert_eq!(params.to_list(), [0.1, 2.0, 9.8, 0.5]);
    }

    #[test]
    fn parameters_fail_fast() {
        assert!(matches!(
            ModelParameters::from_list(&[-0.1, 1.0, 9.8, 0.0]),
            Err(ConfigError::InvalidTimeStep(_))
        ));
        assert!(matches!(
            ModelParameters::from_list(&[0.1, 0.0, 9.8, 0.0]),
            Err(ConfigError::InvalidPipeLength(_))
        ));
        assert!(matches!(
            ModelParameters::from_list(&[0.1, 1.0, f32::NAN, 0.0]),
            Err(ConfigError::InvalidGravity(_))
        ));
        assert!(matches!(
            ModelParameters::from_list(&[0.1, 1.0, 9.8]),
            Err(ConfigError::ParameterCount { expected: 4, actual: 3 })
        ));
    }

    #[test]
    fn drawing_defaults_and_cadence() {
        let drawing = DrawingParams::default();
        assert_eq!(drawing, DrawingParams::from_list(&[200, 3000, 300]).unwrap());
        assert_eq!(drawing.expected_snapshots(), 15);
        assert_eq!(DrawingParams::new(200, 3100, 10).unwrap().expected_snapshots(), 15);
    }

    #[test]
    fn drawing_rejects_zero_steps() {
        assert!(DrawingParams::new(0, 100, 10).is_err());
        assert!(DrawingParams::new(10, 100, 0).is_err());
        assert!(DrawingParams::new(10, 5, 1).is_err());
        assert!(DrawingParams::from_list(&[1, 2]).is_err());
    }
}
