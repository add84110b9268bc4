use std::{fmt, str::FromStr};

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Building element kinds a mapping document may declare rules for.
///
/// The wire name (`ifcClass`) is the IFC class name, e.g. `IfcColumn`.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash, Ord, PartialOrd, Serialize, Deserialize)]
pub enum EntityKind {
    #[serde(rename = "IfcBuildingStorey")]
    BuildingStorey,
    #[serde(rename = "IfcColumn")]
    Column,
    #[serde(rename = "IfcBeam")]
    Beam,
    #[serde(rename = "IfcWallStandardCase")]
    WallStandardCase,
}

impl EntityKind {
    pub const ALL: [EntityKind; 4] = [
        EntityKind::BuildingStorey,
        EntityKind::Column,
        EntityKind::Beam,
        EntityKind::WallStandardCase,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::BuildingStorey => "IfcBuildingStorey",
            Self::Column => "IfcColumn",
            Self::Beam => "IfcBeam",
            Self::WallStandardCase => "IfcWallStandardCase",
        }
    }

    /// Parameters an entity of this kind cannot be built without, in
    /// declaration order.
    pub fn required_params(self) -> &'static [RequiredParam] {
        use ParamType::{Number, Point2, Text};
        match self {
            Self::BuildingStorey => &[
                RequiredParam { name: "name", ty: Text },
                RequiredParam { name: "height", ty: Number },
            ],
            Self::Column => &[
                RequiredParam { name: "coordinate", ty: Point2 },
                RequiredParam { name: "height", ty: Number },
                RequiredParam { name: "rotation", ty: Number },
                RequiredParam { name: "targetStorey", ty: Text },
            ],
            Self::Beam => &[
                RequiredParam { name: "startPt", ty: Point2 },
                RequiredParam { name: "endPt", ty: Point2 },
                RequiredParam { name: "height", ty: Number },
                RequiredParam { name: "rotation", ty: Number },
                RequiredParam { name: "targetStorey", ty: Text },
            ],
            Self::WallStandardCase => &[
                RequiredParam { name: "startPt", ty: Point2 },
                RequiredParam { name: "endPt", ty: Point2 },
                RequiredParam { name: "height", ty: Number },
                RequiredParam { name: "zOffset", ty: Number },
                RequiredParam { name: "thickness", ty: Number },
                RequiredParam { name: "targetStorey", ty: Text },
            ],
        }
    }

    pub fn is_known_param(self, name: &str) -> bool {
        self.required_params().iter().any(|param| param.name == name)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a string does not name a supported [`EntityKind`].
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct UnknownEntityKind(pub String);

impl fmt::Display for UnknownEntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown entity kind `{}`", self.0)
    }
}

impl std::error::Error for UnknownEntityKind {}

impl FromStr for EntityKind {
    type Err = UnknownEntityKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| UnknownEntityKind(s.to_string()))
    }
}

/// Value shape a required parameter must have.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ParamType {
    Text,
    Number,
    /// Array of exactly two numbers.
    Point2,
}

impl ParamType {
    pub fn accepts(self, value: &Value) -> bool {
        match self {
            Self::Text => value.is_string(),
            Self::Number => value.is_number(),
            Self::Point2 => value
                .as_array()
                .is_some_and(|items| items.len() == 2 && items.iter().all(Value::is_number)),
        }
    }

    pub fn describe(self) -> &'static str {
        match self {
            Self::Text => "string",
            Self::Number => "number",
            Self::Point2 => "array of 2 numbers",
        }
    }
}

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RequiredParam {
    pub name: &'static str,
    pub ty: ParamType,
}

impl RequiredParam {
    const fn new(name: &'static str, ty: ParamType) -> Self {
        Self { name, ty }
    }
}
