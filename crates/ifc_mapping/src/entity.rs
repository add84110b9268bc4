use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::kind::{EntityKind, ParamType};

/// 2D plan coordinate `[x, y]`.
pub type Point2 = [f64; 2];

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildingStorey {
    pub name: String,
    pub height: f64,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Column {
    pub coordinate: Point2,
    pub height: f64,
    pub rotation: f64,
    pub target_storey: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Beam {
    pub start_pt: Point2,
    pub end_pt: Point2,
    pub height: f64,
    pub rotation: f64,
    pub target_storey: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WallStandardCase {
    pub start_pt: Point2,
    pub end_pt: Point2,
    pub height: f64,
    pub z_offset: f64,
    pub thickness: f64,
    pub target_storey: String,
}

/// A validated building element, exported to the worker as
/// `{"ifcClass": "<kind>", ...fields}`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "ifcClass")]
pub enum MappableEntity {
    #[serde(rename = "IfcBuildingStorey")]
    BuildingStorey(BuildingStorey),
    #[serde(rename = "IfcColumn")]
    Column(Column),
    #[serde(rename = "IfcBeam")]
    Beam(Beam),
    #[serde(rename = "IfcWallStandardCase")]
    WallStandardCase(WallStandardCase),
}

/// Why an argument bag could not become an entity. Names the first failing
/// parameter in declaration order.
#[derive(Clone, Debug, Error, PartialEq)]
pub enum EntityError {
    #[error("{kind}: required parameter `{parameter}` is missing")]
    Missing {
        kind: EntityKind,
        parameter: &'static str,
    },
    #[error("{kind}: parameter `{parameter}` must be a {expected}")]
    WrongType {
        kind: EntityKind,
        parameter: &'static str,
        expected: &'static str,
    },
}

impl EntityError {
    pub fn parameter(&self) -> &'static str {
        match self {
            Self::Missing { parameter, .. } | Self::WrongType { parameter, .. } => parameter,
        }
    }
}

impl MappableEntity {
    /// Builds and validates an entity of `kind` from remapped arguments keyed
    /// by internal parameter name. Parameters the kind does not know are ignored.
    pub fn from_args(kind: EntityKind, args: &Map<String, Value>) -> Result<Self, EntityError> {
        let args = Args { kind, args };
        Ok(match kind {
            EntityKind::BuildingStorey => Self::BuildingStorey(BuildingStorey {
                name: args.text("name")?,
                height: args.number("height")?,
            }),
            EntityKind::Column => Self::Column(Column {
                coordinate: args.point("coordinate")?,
                height: args.number("height")?,
                rotation: args.number("rotation")?,
                target_storey: args.text("targetStorey")?,
            }),
            EntityKind::Beam => Self::Beam(Beam {
                start_pt: args.point("startPt")?,
                end_pt: args.point("endPt")?,
                height: args.number("height")?,
                rotation: args.number("rotation")?,
                target_storey: args.text("targetStorey")?,
            }),
            EntityKind::WallStandardCase => Self::WallStandardCase(WallStandardCase {
                start_pt: args.point("startPt")?,
                end_pt: args.point("endPt")?,
                height: args.number("height")?,
                z_offset: args.number("zOffset")?,
                thickness: args.number("thickness")?,
                target_storey: args.text("targetStorey")?,
            }),
        })
    }

    pub fn kind(&self) -> EntityKind {
        match self {
            Self::BuildingStorey(_) => EntityKind::BuildingStorey,
            Self::Column(_) => EntityKind::Column,
            Self::Beam(_) => EntityKind::Beam,
            Self::WallStandardCase(_) => EntityKind::WallStandardCase,
        }
    }

    /// Rejects non-finite numbers, which JSON cannot carry to the worker.
    pub fn validate(&self) -> Result<(), EntityError> {
        let kind = self.kind();
        let finite = |parameter: &'static str, values: &[f64]| {
            if values.iter().all(|value| value.is_finite()) {
                Ok(())
            } else {
                Err(EntityError::WrongType {
                    kind,
                    parameter,
                    expected: "finite number",
                })
            }
        };

        match self {
            Self::BuildingStorey(storey) => finite("height", &[storey.height]),
            Self::Column(column) => {
                finite("coordinate", &column.coordinate)?;
                finite("height", &[column.height])?;
                finite("rotation", &[column.rotation])
            }
            Self::Beam(beam) => {
                finite("startPt", &beam.start_pt)?;
                finite("endPt", &beam.end_pt)?;
                finite("height", &[beam.height])?;
                finite("rotation", &[beam.rotation])
            }
            Self::WallStandardCase(wall) => {
                finite("startPt", &wall.start_pt)?;
                finite("endPt", &wall.end_pt)?;
                finite("height", &[wall.height])?;
                finite("zOffset", &[wall.z_offset])?;
                finite("thickness", &[wall.thickness])
            }
        }
    }
}

struct Args<'a> {
    kind: EntityKind,
    args: &'a Map<String, Value>,
}

impl<'a> Args<'a> {
    fn get(&self, parameter: &'static str, ty: ParamType) -> Result<&'a Value, EntityError> {
        let value = self.args.get(parameter).ok_or(EntityError::Missing {
            kind: self.kind,
            parameter,
        })?;
        if ty.accepts(value) {
            Ok(value)
        } else {
            Err(EntityError::WrongType {
                kind: self.kind,
                parameter,
                expected: ty.describe(),
            })
        }
    }

    fn text(&self, parameter: &'static str) -> Result<String, EntityError> {
        let value = self.get(parameter, ParamType::Text)?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    fn number(&self, parameter: &'static str) -> Result<f64, EntityError> {
        let value = self.get(parameter, ParamType::Number)?;
        Ok(value.as_f64().unwrap_or_default())
    }

    fn point(&self, parameter: &'static str) -> Result<Point2, EntityError> {
        let value = self.get(parameter, ParamType::Point2)?;
        let coord = |index: usize| value.get(index).and_then(Value::as_f64).unwrap_or_default();
        Ok([coord(0), coord(1)])
    }
}
