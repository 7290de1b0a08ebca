//! Parser for the correction model's answer.
//!
//! Expected shape:
//!
//! ```text
//! ANALYSIS: the login button sits left of the cursor
//! COORDINATES: 412,88
//! ```
//!
//! or `COORDINATES: NONE` when the model sees no suitable target.

use once_cell::sync::Lazy;
use perceiver_visual::Point;
use regex::Regex;

use crate::errors::LocatorError;

/// Parsed correction answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAnswer {
    pub analysis: String,
    /// `None` when the model answered `NONE`
    pub target: Option<Point>,
}

static COORDINATES_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"COORDINATES:\s*(\d+)\s*,\s*(\d+)").unwrap());

/// Text after `ANALYSIS:` up to the `COORDINATES:` marker.
pub fn extract_analysis(response: &str) -> String {
    let Some(start) = response.find("ANALYSIS:") else {
        return String::new();
    };
    let rest = &response[start + "ANALYSIS:".len()..];
    let body = match rest.find("COORDINATES:") {
        Some(end) => &rest[..end],
        None => rest,
    };
    body.trim().to_string()
}

/// Parse a model answer, rejecting coordinates outside `width` x `height`.
pub fn parse_target(response: &str, width: i32, height: i32) -> Result<TargetAnswer, LocatorError> {
    let analysis = extract_analysis(response);

    if let Some(caps) = COORDINATES_RE.captures(response) {
        let x = caps[1]
            .parse::<i32>()
            .map_err(|e| LocatorError::MalformedResponse(format!("x coordinate: {}", e)))?;
        let y = caps[2]
            .parse::<i32>()
            .map_err(|e| LocatorError::MalformedResponse(format!("y coordinate: {}", e)))?;
        let point = Point::new(x, y);
        if !point.within(width, height) {
            return Err(LocatorError::MalformedResponse(format!(
                "coordinates {} outside {}x{}",
                point, width, height
            )));
        }
        return Ok(TargetAnswer {
            analysis,
            target: Some(point),
        });
    }

    let declined = response
        .split("COORDINATES:")
        .nth(1)
        .map(|tail| tail.trim_start().to_uppercase().starts_with("NONE"))
        .unwrap_or(false);
    if declined {
        return Ok(TargetAnswer {
            analysis,
            target: None,
        });
    }

    Err(LocatorError::MalformedResponse(
        "no COORDINATES line in response".to_string(),
    ))
}
