//! Per-request prediction flags

use serde::{Deserialize, Serialize};

/// Flags a caller can set on a single prediction request.
///
/// Both flags default to `true`: a request that only carries an image gets
/// resized to the model input and a calibrated probability back.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestOptions {
    /// Resize the decoded image to the model's input size. When `false`,
    /// images whose dimensions differ from the model input are rejected.
    pub with_resize: bool,

    /// Calibrate scores with softmax before reporting. When `false`, the
    /// reported score is the raw model output (a logit, not a probability).
    pub with_post_process: bool,
}

impl Default for RequestOptions {
    fn default() -> Self {
        Self {
            with_resize: true,
            with_post_process: true,
        }
    }
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder method to set the resize flag
    pub fn with_resize(mut self, enabled: bool) -> Self {
        self.with_resize = enabled;
        self
    }

    /// Builder method to set the calibration flag
    pub fn with_post_process(mut self, enabled: bool) -> Self {
        self.with_post_process = enabled;
        self
    }
}

/// Parse a form-encoded boolean.
///
/// Accepts `true/false`, `1/0`, `yes/no` and `on/off`, case-insensitive and
/// ignoring surrounding whitespace. Clients are documented to send `"True"`
/// and `"False"`.
pub fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}
