//! Check that the bundled scene definitions load and build.
//!
//! Run with: cargo test --test scene_definitions

mod support;

use std::fs;
use std::path::PathBuf;

use serde_json::Value;

use scenesync::definition::SceneDefinition;
use scenesync::prelude::*;
use support::{Mirror, EXTRAS};

fn scenes_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("scenes")
}

#[test]
fn test_bundled_definitions_build() {
    let mut checked = 0;
    for entry in fs::read_dir(scenes_dir()).unwrap() {
        let path = entry.unwrap().path();
        if path.extension().and_then(|e| e.to_str()) != Some("json") {
            continue;
        }
        let definition = SceneDefinition::from_file(&path)
            .unwrap_or_else(|e| panic!("{}: {:#}", path.display(), e));
        let scene = definition.build().unwrap();
        assert_eq!(scene.object_count(), definition.object_count(), "{}", path.display());
        assert_eq!(scene.graph().scope_depth(), 1);
        checked += 1;
    }
    assert!(checked > 0, "no scene definitions found");
}

#[test]
fn test_table_scene_replays_to_renderer() {
    let definition = SceneDefinition::from_file(&scenes_dir().join("table.json")).unwrap();
    let mut scene = definition.build().unwrap();
    assert_eq!(scene.camera().position, Point3::new(3.0, -5.0, 4.0));
    assert_eq!(scene.camera().look_at, Point3::new(0.0, 0.0, 0.5));

    let ball = scene
        .graph()
        .depth_first()
        .into_iter()
        .find(|n| n.name() == Some("ball"))
        .map(|n| n.id().clone())
        .unwrap();
    assert!(scene.get(ball.as_str()).unwrap().is_draggable());

    let mirror = Mirror::new();
    let conn = scene.connect(mirror.clone());
    scene.handle_event(conn, "init", &Value::Null).unwrap();
    assert_eq!(mirror.count(), 6 + EXTRAS);
}

#[test]
fn test_missing_definition_reports_path() {
    let err = SceneDefinition::from_file(&scenes_dir().join("missing.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("missing.json"));
}
