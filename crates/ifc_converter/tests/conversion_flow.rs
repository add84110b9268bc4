#![cfg(unix)]

use std::{fs, path::PathBuf};

use ifc_converter::{
    ConvertError, Converter, ConverterConfig, CreationStatus, ProjectSettings,
};
use ifc_mapping::{RawRecord, UnmappedReason};
use serde_json::{json, Value};
use worker_channel::{ChannelError, ChannelState, WorkerChannel, WorkerConfig};

const MAPPING: &str = r#"{
  "mappingEntity": {
    "IfcBuildingStorey": {"userKey": "STOREY1", "userArgs": {"name": "n", "height": "h"}},
    "IfcColumn": {
      "userKey": "COLUMN",
      "userArgs": {"coordinate": "xy", "height": "h", "rotation": "rot", "targetStorey": "level"}
    }
  }
}"#;

const SUCCESSFUL_WORKER: &str = r#"
while IFS= read -r line; do
  printf '%s\n' "$line" > "$REQUEST_LOG"
  printf '%s\n' '{"action":"writingEntity","result":true,"entityType":"IfcBuildingStorey"}'
  printf '%s\n' '{"action":"writingEntity","result":true,"entityType":"IfcColumn"}'
  printf '%s\n' '{"action":"writingFile","result":true}'
  printf '%s\n' '{"status":"success","file":"/tmp/model.ifc"}'
done
"#;

struct Fixture {
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        fs::write(dir.path().join("mapping.json"), MAPPING).expect("write mapping");
        Self { dir }
    }

    fn path(&self, name: &str) -> PathBuf {
        self.dir.path().join(name)
    }

    fn converter(&self, worker_body: &str) -> Converter {
        let script = self.path("worker.sh");
        fs::write(&script, worker_body).expect("write worker");
        let channel = WorkerChannel::new(
            WorkerConfig::builder()
                .executable("/bin/sh")
                .script(script)
                .env("REQUEST_LOG", self.path("request.json"))
                .build(),
        );
        let mut converter = Converter::new(channel, ProjectSettings::default());
        converter
            .load_mapping_file(&self.path("mapping.json"))
            .expect("load mapping");
        converter
    }

    fn logged_request(&self) -> Value {
        let logged = fs::read_to_string(self.path("request.json")).expect("request log");
        serde_json::from_str(logged.trim()).expect("request is json")
    }
}

fn records() -> Vec<RawRecord> {
    RawRecord::parse_batch(
        &json!([
            {"userKey": "STOREY1", "userArgs": {"n": "L1", "h": 3.5}},
            {"userKey": "BEAM", "userArgs": {"from": [0, 0]}},
            {"userKey": "COLUMN", "userArgs": {"xy": [1, 2], "h": 3, "rot": 0, "level": "L1"}}
        ])
        .to_string(),
    )
    .expect("records")
}

#[tokio::test]
async fn conversion_reports_progress_and_output() {
    let fixture = Fixture::new();
    let mut converter = fixture.converter(SUCCESSFUL_WORKER);
    converter.set_output_path("/tmp/model.ifc");

    let mut updates: Vec<CreationStatus> = Vec::new();
    let mut collect = |status: &CreationStatus| updates.push(status.clone());
    let report = converter
        .run_conversion(&records(), &mut collect)
        .await
        .expect("conversion succeeds");

    assert_eq!(report.output_file, "/tmp/model.ifc");
    assert_eq!(report.mapped_count, 2);
    assert_eq!(report.unmapped.len(), 1);
    assert_eq!(report.unmapped[0].original.user_key, "BEAM");
    assert_eq!(report.unmapped[0].reason, UnmappedReason::RuleNotFound);

    let steps: Vec<_> = updates
        .iter()
        .map(|status| (status.total_steps, status.current_step))
        .collect();
    assert_eq!(steps, [(3, 1), (3, 2), (3, 3)]);
    assert!((updates[0].percent - 100.0 / 3.0).abs() < 1e-9);
    assert_eq!(updates[2].percent, 100.0);
    assert!(updates[1].message.ends_with("Writing IfcColumn is done"));
    assert!(updates[2].message.ends_with("Writing IFC file is done"));

    let request = fixture.logged_request();
    assert_eq!(
        request["header"],
        json!({"action": "create_ifc", "project_name": "My Building Project", "site_name": "my_site"})
    );
    assert_eq!(request["entities"]["output_file"], "/tmp/model.ifc");
    let classes: Vec<_> = request["entities"]["elements"]
        .as_array()
        .expect("elements")
        .iter()
        .map(|element| element["ifcClass"].as_str().unwrap_or_default().to_string())
        .collect();
    assert_eq!(classes, ["IfcBuildingStorey", "IfcColumn"]);

    assert!(!converter.channel().is_running());
    assert!(converter.session().is_empty());
}

#[tokio::test]
async fn missing_output_path_fails_before_starting_the_worker() {
    let fixture = Fixture::new();
    let mut converter = fixture.converter(SUCCESSFUL_WORKER);

    let err = converter
        .run_conversion(&records(), &mut |_: &CreationStatus| {})
        .await
        .unwrap_err();

    assert!(matches!(err, ConvertError::OutputPathNotSet));
    assert_eq!(err.to_string(), "IFC output file path is not set.");
    assert_eq!(converter.channel().state(), ChannelState::Idle);
    assert!(!fixture.path("request.json").exists());
}

#[tokio::test]
async fn worker_error_status_surfaces_its_message() {
    let fixture = Fixture::new();
    let mut converter = fixture.converter(
        r#"
while IFS= read -r line; do
  printf '%s\n' '{"status":"error","message":"storey L1 not found"}'
done
"#,
    );
    converter.set_output_path(fixture.path("out.ifc"));

    let err = converter
        .run_conversion(&records(), &mut |_: &CreationStatus| {})
        .await
        .unwrap_err();

    match &err {
        ConvertError::WorkerFailed {
            status, message, ..
        } => {
            assert_eq!(status, "error");
            assert_eq!(message, "storey L1 not found");
        }
        other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(err.unmapped().len(), 1);
    assert_eq!(err.unmapped()[0].original.user_key, "BEAM");
    assert!(!converter.channel().is_running());
    assert!(converter.session().is_empty());
}

#[tokio::test]
async fn worker_crash_is_a_channel_error() {
    let fixture = Fixture::new();
    let mut converter = fixture.converter("IFS= read -r line\nexit 2\n");
    converter.set_output_path(fixture.path("out.ifc"));

    let err = converter
        .run_conversion(&records(), &mut |_: &CreationStatus| {})
        .await
        .unwrap_err();

    assert!(
        matches!(
            err,
            ConvertError::Channel {
                source: ChannelError::ProcessTerminated { code: Some(2) },
                ..
            }
        ),
        "unexpected error: {err:?}"
    );
    assert_eq!(err.unmapped().len(), 1);
    assert_eq!(err.unmapped()[0].reason, UnmappedReason::RuleNotFound);
    assert!(converter.session().is_empty());
}

#[tokio::test]
async fn converter_can_run_again_after_a_conversion() {
    let fixture = Fixture::new();
    let mut converter = fixture.converter(SUCCESSFUL_WORKER);
    converter.set_output_path("/tmp/model.ifc");

    for _ in 0..2 {
        let report = converter
            .run_conversion(&records(), &mut |_: &CreationStatus| {})
            .await
            .expect("conversion succeeds");
        assert_eq!(report.mapped_count, 2);
    }
}

#[test]
fn errors_before_the_worker_carry_no_unmapped_records() {
    assert!(ConvertError::OutputPathNotSet.unmapped().is_empty());
}

#[test]
fn rejected_mapping_document_keeps_previous_rules() {
    let fixture = Fixture::new();
    let mut converter = fixture.converter(SUCCESSFUL_WORKER);
    let broken = fixture.path("broken.json");
    fs::write(&broken, r#"{"mappingEntity": {"IfcSlab": {}}}"#).expect("write broken mapping");

    let err = converter.load_mapping_file(&broken).unwrap_err();
    assert!(matches!(err, ConvertError::MappingDocument { .. }));
    assert_eq!(converter.store().len(), 2);

    let err = converter
        .load_mapping_file(&fixture.path("absent.json"))
        .unwrap_err();
    assert!(matches!(err, ConvertError::ReadInput { .. }));
}

#[test]
fn dry_run_maps_without_a_worker() {
    let fixture = Fixture::new();
    let mut converter = Converter::from_config(&ConverterConfig::default());
    converter
        .load_mapping_file(&fixture.path("mapping.json"))
        .expect("load mapping");

    let outcome = converter.map_records(&records());
    assert_eq!(outcome.mapped.len(), 2);
    assert_eq!(outcome.unmapped.len(), 1);
    assert_eq!(converter.channel().state(), ChannelState::Idle);
}
