use ifc_mapping::MappableEntity;
use serde::Serialize;

use crate::config::ProjectSettings;

pub const ACTION_CREATE_IFC: &str = "create_ifc";

/// The single request line sent to the worker for one conversion.
#[derive(Debug, Serialize)]
pub struct WorkerRequest<'a> {
    pub header: RequestHeader<'a>,
    pub entities: RequestEntities<'a>,
}

#[derive(Debug, Serialize)]
pub struct RequestHeader<'a> {
    pub action: &'static str,
    pub project_name: &'a str,
    pub site_name: &'a str,
}

#[derive(Debug, Serialize)]
pub struct RequestEntities<'a> {
    pub elements: &'a [MappableEntity],
    pub output_file: &'a str,
}

impl<'a> WorkerRequest<'a> {
    pub fn create_ifc(
        project: &'a ProjectSettings,
        elements: &'a [MappableEntity],
        output_file: &'a str,
    ) -> Self {
        Self {
            header: RequestHeader {
                action: ACTION_CREATE_IFC,
                project_name: &project.project_name,
                site_name: &project.site_name,
            },
            entities: RequestEntities {
                elements,
                output_file,
            },
        }
    }
}
