use std::fmt;

use serde::{Deserialize, Serialize};

/// A viewing angle in degrees, always within `[0, 360)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u16", into = "u16")]
pub struct Angle(u16);

impl Angle {
    pub const FULL_TURN: u16 = 360;

    pub fn new(degrees: u16) -> Option<Self> {
        (degrees < Self::FULL_TURN).then_some(Self(degrees))
    }

    pub fn degrees(self) -> u16 {
        self.0
    }
}

impl TryFrom<u16> for Angle {
    type Error = String;

    fn try_from(degrees: u16) -> Result<Self, Self::Error> {
        Self::new(degrees).ok_or_else(|| format!("pose angle must be below 360, got {degrees}"))
    }
}

impl From<Angle> for u16 {
    fn from(angle: Angle) -> Self {
        angle.0
    }
}

/// Target orientation of the person in the composite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "degrees", rename_all = "snake_case")]
pub enum Pose {
    #[default]
    Original,
    Angle(Angle),
}

impl Pose {
    /// Angles outside `[0, 360)` are rejected.
    pub fn angle(degrees: u16) -> Option<Self> {
        Angle::new(degrees).map(Self::Angle)
    }

    pub fn parse(raw: &str) -> Result<Self, String> {
        let normalized = raw.trim().to_ascii_lowercase();
        if matches!(normalized.as_str(), "" | "original" | "keep" | "default") {
            return Ok(Self::Original);
        }
        let digits = normalized
            .trim_end_matches("deg")
            .trim_end_matches('°')
            .trim();
        let degrees: u16 = digits
            .parse()
            .map_err(|_| format!("pose must be 'original' or an angle in degrees, got '{raw}'"))?;
        Angle::try_from(degrees).map(Self::Angle)
    }

    pub fn directive(&self) -> String {
        match self {
            Self::Original => {
                "Maintain the person's original pose and orientation exactly.".to_string()
            }
            Self::Angle(angle) => format!(
                "Rotate the person to a {} degree view (0 faces the camera, 90 shows the \
                 right profile, 180 the back, 270 the left profile) while keeping them \
                 the same person.",
                angle.degrees()
            ),
        }
    }
}

impl fmt::Display for Pose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Original => write!(f, "original"),
            Self::Angle(angle) => write!(f, "{}°", angle.degrees()),
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::{Angle, Pose};

    #[test]
    fn parses_sentinel_and_angles() {
        assert_eq!(Pose::parse("original"), Ok(Pose::Original));
        assert_eq!(Pose::parse("  "), Ok(Pose::Original));
        assert_eq!(Pose::parse("90").ok(), Pose::angle(90));
        assert_eq!(Pose::parse("180deg").ok(), Pose::angle(180));
        assert_eq!(Pose::parse("0").map(|pose| pose.to_string()), Ok("0°".to_string()));
    }

    #[test]
    fn rejects_out_of_range_angles() {
        assert!(Pose::parse("360").is_err());
        assert!(Pose::parse("720").is_err());
        assert!(Pose::parse("-10").is_err());
        assert!(Pose::parse("sideways").is_err());
        assert_eq!(Pose::angle(359).map(|pose| pose.to_string()), Some("359°".to_string()));
        assert_eq!(Pose::angle(360), None);
        assert_eq!(Angle::new(720), None);
    }

    #[test]
    fn deserializing_checks_the_angle() {
        let pose: Pose = serde_json::from_value(json!({"kind": "angle", "degrees": 45})).unwrap();
        assert_eq!(Some(pose), Pose::angle(45));
        assert_eq!(serde_json::to_value(pose).unwrap(), json!({"kind": "angle", "degrees": 45}));

        assert!(serde_json::from_value::<Pose>(json!({"kind": "angle", "degrees": 720})).is_err());
        assert!(serde_json::from_value::<Angle>(json!(360)).is_err());
    }

    #[test]
    fn directive_names_the_angle() {
        let side = Pose::angle(270).unwrap();
        assert!(side.directive().contains("270 degree"));
        assert!(Pose::Original.directive().contains("original pose"));
    }
}
