//! End-to-end behaviour of the scene controller against mirror renderers.
//!
//! Run with: cargo test --test scene_controller

mod support;

use std::sync::{Arc, Mutex};

use anyhow::anyhow;
use futures::executor::block_on;
use futures::FutureExt;
use serde_json::{json, Value};

use scenesync::events::ClickHit;
use scenesync::prelude::*;
use scenesync::protocol::{Command, Query};
use support::{ready_mirror, Mirror, EXTRAS};

fn assert_tree_invariant(scene: &SceneController) {
    let graph = scene.graph();
    let nodes = graph.depth_first();
    assert_eq!(nodes.len(), scene.object_count(), "registry and tree disagree");
    for node in nodes {
        let chain = graph.ancestors(node.id().as_str());
        let mut unique = chain.clone();
        unique.sort();
        unique.dedup();
        assert_eq!(unique.len(), chain.len(), "cycle above {}", node.id());
    }
}

// ============================================================================
// Initialization handshake
// ============================================================================

#[test]
fn test_reconnection_converges_to_live_object_count() {
    let mut scene = SceneController::default();
    for _ in 0..3 {
        scene.add_box(1.0, 1.0, 1.0);
    }

    let (_, a) = ready_mirror(&mut scene);
    assert_eq!(a.count(), 3 + EXTRAS);

    scene.add_sphere(1.0);
    scene.add_sphere(2.0);

    let b = Mirror::new();
    let b_id = scene.connect(b.clone());
    // Awaiting init: nothing rendered yet, and no incremental traffic.
    assert_eq!(b.count(), 0);
    assert!(b.names().is_empty());

    scene.handle_event(b_id, "init", &Value::Null).unwrap();
    assert_eq!(b.count(), 5 + EXTRAS);
    // A caught up through incremental `create` commands.
    assert_eq!(a.count(), 5 + EXTRAS);
}

#[test]
fn test_repeated_init_resends_full_snapshot() {
    let mut scene = SceneController::default();
    scene.add_box(1.0, 1.0, 1.0);
    let (id, mirror) = ready_mirror(&mut scene);
    scene.add_box(1.0, 1.0, 1.0);

    // Renderer reload on the same connection.
    scene.handle_event(id, "init", &Value::Null).unwrap();
    assert_eq!(mirror.count(), 2 + EXTRAS);
    assert_eq!(mirror.names(), vec!["snapshot", "create", "snapshot"]);
}

#[test]
fn test_reconnect_after_disconnect() {
    let mut scene = SceneController::default();
    let (first, _) = ready_mirror(&mut scene);
    scene.add_box(1.0, 1.0, 1.0);
    scene.disconnect(first).unwrap();
    assert_eq!(scene.connection_state(first), ConnectionState::Disconnected);

    scene.add_box(1.0, 1.0, 1.0);
    let (second, mirror) = ready_mirror(&mut scene);
    assert_ne!(first, second);
    assert_eq!(mirror.count(), 2 + EXTRAS);
}

#[test]
fn test_snapshot_lists_parents_before_children() {
    let mut scene = SceneController::default();
    let group = scene.group().id().clone();
    let child = scene
        .scope(&group, |scene| scene.add_sphere(1.0).id().clone())
        .unwrap();

    let (_, mirror) = ready_mirror(&mut scene);
    let Some(Message::Command(Command::Snapshot(snapshot))) = mirror.last() else {
        panic!("expected a snapshot");
    };
    let ids: Vec<_> = snapshot.nodes.iter().map(|n| n.id.clone()).collect();
    assert_eq!(ids, vec![group.clone(), child]);
    assert_eq!(snapshot.nodes[1].parent_id, Some(group));
    assert_eq!(snapshot.camera, *scene.camera());
}

#[test]
fn test_initialized_waits_for_connection_then_ack() {
    let mut scene = SceneController::default();
    let mut ready = scene.initialized();
    assert!((&mut ready).now_or_never().is_none());

    let mirror = Mirror::new();
    let id = scene.connect(mirror);
    assert!((&mut ready).now_or_never().is_none());

    scene.handle_event(id, "init", &Value::Null).unwrap();
    assert!(matches!(ready.now_or_never(), Some(Ok(()))));
}

#[test]
fn test_initialized_sees_ack_before_first_poll() {
    let mut scene = SceneController::default();
    let id = scene.connect(Mirror::new());
    let ready = scene.initialized();
    scene.handle_event(id, "init", &Value::Null).unwrap();
    assert!(matches!(ready.now_or_never(), Some(Ok(()))));

    // Already initialized: resolves immediately.
    assert!(matches!(scene.initialized().now_or_never(), Some(Ok(()))));
    assert!(scene.is_initialized());
}

#[test]
fn test_initialized_fails_when_scene_dropped() {
    let mut scene = SceneController::default();
    let ready = scene.initialized();
    drop(scene);
    assert!(matches!(block_on(ready), Err(SceneError::SceneClosed)));
}

// ============================================================================
// Object lifecycle
// ============================================================================

#[test]
fn test_group_delete_removes_n_plus_one() {
    let mut scene = SceneController::default();
    let (_, mirror) = ready_mirror(&mut scene);
    scene.add_box(1.0, 1.0, 1.0);

    let group = scene.group().id().clone();
    let leaf = scene
        .scope(&group, |scene| {
            scene.add_sphere(1.0);
            let inner = scene.group().id().clone();
            scene
                .scope(&inner, |scene| {
                    scene.add_sphere(1.0);
                    scene.add_sphere(1.0).id().clone()
                })
                .unwrap()
        })
        .unwrap();

    let before = scene.object_count();
    let rendered = mirror.count();
    assert_eq!(scene.delete(group.as_str()).unwrap(), 5);
    assert_eq!(scene.object_count(), before - 5);
    assert_eq!(mirror.count(), rendered - 5);
    assert!(!mirror.shows(&leaf));

    assert_eq!(scene.delete(leaf.as_str()).unwrap(), 0);
    assert_tree_invariant(&scene);
}

#[test]
fn test_clear_and_delete_objects() {
    let mut scene = SceneController::default();
    let (_, mirror) = ready_mirror(&mut scene);
    scene.add_box(1.0, 1.0, 1.0).with_name("crate");
    scene.add_box(1.0, 1.0, 1.0).with_name("crate");
    scene.add_sphere(1.0).with_name("ball");

    assert_eq!(scene.delete_objects(|n| n.name() == Some("crate")).unwrap(), 2);
    assert_eq!(scene.object_count(), 1);

    assert_eq!(scene.clear().unwrap(), 1);
    assert_eq!(scene.object_count(), 0);
    assert_eq!(mirror.count(), EXTRAS);
}

#[test]
fn test_attach_and_detach_keep_world_position() {
    let mut scene = SceneController::default();
    let (_, mirror) = ready_mirror(&mut scene);
    let group = scene.group().move_to(1.0, 2.0, 3.0).id().clone();
    let ball = scene.add_sphere(1.0).move_to(2.0, 2.0, 3.0).id().clone();

    scene.node(ball.as_str()).unwrap().attach(&group).unwrap();
    assert_eq!(scene.get(ball.as_str()).unwrap().position(), Point3::new(1.0, 0.0, 0.0));
    assert_eq!(scene.get(ball.as_str()).unwrap().parent(), Some(&group));
    assert!(matches!(
        mirror.last(),
        Some(Message::Command(Command::Attach(ref id, ref parent))) if *id == ball && *parent == group
    ));

    assert!(matches!(
        scene.node(group.as_str()).unwrap().attach(&ball),
        Err(SceneError::Cycle { .. })
    ));

    scene.node(ball.as_str()).unwrap().detach().unwrap();
    assert_eq!(scene.get(ball.as_str()).unwrap().position(), Point3::new(2.0, 2.0, 3.0));
    assert_eq!(mirror.names().last(), Some(&"detach"));
    assert_tree_invariant(&scene);
}

#[test]
fn test_scope_errors() {
    let mut scene = SceneController::default();
    assert!(matches!(scene.exit_scope(), Err(SceneError::ScopeUnderflow)));
    assert!(matches!(
        scene.enter_scope(ObjectId::new("nope")),
        Err(SceneError::UnknownIdentity(_))
    ));

    let group = scene.group().id().clone();
    scene.enter_scope(&group).unwrap();
    assert!(matches!(scene.delete(group.as_str()), Err(SceneError::ScopeActive(_))));
    assert_eq!(scene.exit_scope().unwrap(), Frame::Node(group.clone()));
    assert_eq!(scene.delete(group.as_str()).unwrap(), 1);
}

// ============================================================================
// Event reconciliation
// ============================================================================

#[test]
fn test_drag_start_is_provisional_and_drag_end_commits() {
    let mut scene = SceneController::default();
    let (conn, mirror) = ready_mirror(&mut scene);
    let id = scene.add_box(1.0, 1.0, 1.0).draggable(true).id().clone();

    let starts = Arc::new(Mutex::new(0));
    let ends = Arc::new(Mutex::new(Vec::new()));
    let s = starts.clone();
    let e = ends.clone();
    scene
        .on_drag_start(move |_| {
            *s.lock().unwrap() += 1;
            Ok(())
        })
        .on_drag_end(move |event| {
            e.lock().unwrap().push(event.position);
            Ok(())
        });

    let args = json!({"object_id": id, "object_name": "", "x": 1.0, "y": 2.0, "z": 3.0});
    scene.handle_event(conn, "drag_start", &args).unwrap();
    assert_eq!(scene.get(id.as_str()).unwrap().position(), Point3::ZERO);
    assert_eq!(*starts.lock().unwrap(), 1);

    mirror.clear_log();
    scene.handle_event(conn, "drag_end", &args).unwrap();
    assert_eq!(scene.get(id.as_str()).unwrap().position(), Point3::new(1.0, 2.0, 3.0));
    assert_eq!(*ends.lock().unwrap(), vec![Point3::new(1.0, 2.0, 3.0)]);
    assert_eq!(mirror.names(), vec!["move"]);
    assert_eq!(mirror.commands_for(&id), vec!["move"]);
}

#[test]
fn test_drag_end_for_deleted_object_still_dispatches() {
    let mut scene = SceneController::default();
    let (conn, mirror) = ready_mirror(&mut scene);
    let id = scene.add_box(1.0, 1.0, 1.0).id().clone();
    scene.delete(id.as_str()).unwrap();
    mirror.clear_log();

    let args = json!({"object_id": id, "object_name": "", "x": 1.0, "y": 2.0, "z": 3.0});
    scene.on_drag_end(|_| Ok(()));
    let report = scene.handle_event(conn, "drag_end", &args).unwrap();
    assert_eq!(report.invoked, 1);
    assert!(mirror.names().is_empty());
    assert_eq!(scene.object_count(), 0);
}

#[test]
fn test_transform_end_for_deleted_object_still_dispatches() {
    let mut scene = SceneController::default();
    let (conn, mirror) = ready_mirror(&mut scene);
    let id = scene.add_sphere(1.0).id().clone();
    scene.delete(id.as_str()).unwrap();
    mirror.clear_log();

    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    scene.on_transform_end(move |event| {
        sink.lock().unwrap().push(event.position);
        Ok(())
    });

    let args = json!({
        "object_id": id, "x": 1.0, "y": 2.0, "z": 3.0,
        "rx": 0.0, "ry": 0.0, "rz": 0.0, "mode": "translate"
    });
    let report = scene.handle_event(conn, "transform_end", &args).unwrap();
    assert_eq!(report.invoked, 1);
    assert!(report.is_clean());
    assert!(mirror.names().is_empty());
    assert_eq!(scene.object_count(), 0);
    assert_eq!(*seen.lock().unwrap(), vec![Point3::new(1.0, 2.0, 3.0)]);
}

#[test]
fn test_delete_deeply_nested_groups() {
    let mut scene = SceneController::default();
    let (_, mirror) = ready_mirror(&mut scene);
    let root = scene.group().id().clone();
    let mut current = root.clone();
    for _ in 0..10_000 {
        scene.enter_scope(&current).unwrap();
        current = scene.group().id().clone();
    }
    while scene.exit_scope().is_ok() {}
    assert_eq!(scene.graph().scope_depth(), 1);

    assert_eq!(scene.delete(root.as_str()).unwrap(), 10_001);
    assert_eq!(scene.object_count(), 0);
    assert_eq!(mirror.count(), EXTRAS);
    assert_eq!(mirror.last(), Some(Message::Command(Command::Delete(root))));
}

#[test]
fn test_click_decodes_and_isolates_failing_handler() {
    let mut scene = SceneController::default();
    let (conn, _) = ready_mirror(&mut scene);

    let received = Arc::new(Mutex::new(Vec::new()));
    let sink = received.clone();
    scene
        .on_click(|_| Err(anyhow!("first handler fails")))
        .on_click(move |event| {
            sink.lock().unwrap().push(event.clone());
            Ok(())
        });

    let args = json!({
        "click_type": "click",
        "button": 0,
        "hits": [{"object_id": "a", "object_name": "A", "point": {"x": 1, "y": 0, "z": 0}}]
    });
    let report = scene.handle_event(conn, "click", &args).unwrap();
    assert_eq!(report.invoked, 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].index, 0);

    let received = received.lock().unwrap();
    assert_eq!(received.len(), 1);
    let click = &received[0];
    assert_eq!(
        click.hits,
        vec![ClickHit {
            object_id: ObjectId::new("a"),
            object_name: "A".to_string(),
            x: 1.0,
            y: 0.0,
            z: 0.0,
        }]
    );
    assert_eq!(click.hits[0].point(), Point3::new(1.0, 0.0, 0.0));
    assert_eq!(click.ground_point, None);
    assert_eq!(click.connection, conn);
}

#[test]
fn test_malformed_event_is_rejected_without_dropping_connection() {
    let mut scene = SceneController::default();
    let (conn, mirror) = ready_mirror(&mut scene);
    scene.on_click(|_| Ok(()));

    let result = scene.handle_event(conn, "click", &json!({"button": "left"}));
    assert!(matches!(result, Err(SceneError::ProtocolDecode { .. })));
    assert_eq!(scene.connection_state(conn), ConnectionState::Ready);

    scene.add_box(1.0, 1.0, 1.0);
    assert_eq!(mirror.count(), 1 + EXTRAS);
}

// ============================================================================
// Camera and queries
// ============================================================================

#[test]
fn test_partial_camera_update_keeps_previous_values() {
    let mut scene = SceneController::default();
    let (_, mirror) = ready_mirror(&mut scene);

    scene.move_camera(CameraMove::new().position(1.0, 2.0, 3.0), DEFAULT_MOVE_DURATION);
    scene.move_camera(CameraMove::new().z(10.0), 0.0);
    assert_eq!(scene.camera().position, Point3::new(1.0, 2.0, 10.0));

    let Some(Message::Command(command)) = mirror.last() else {
        panic!("expected a command");
    };
    assert_eq!(command.name(), "move_camera");
    assert_eq!(
        command.args(),
        vec![
            json!(1.0),
            json!(2.0),
            json!(10.0),
            json!(0.0),
            json!(0.0),
            json!(0.0),
            json!(0.0),
            json!(0.0),
            json!(1.0),
            json!(0.0)
        ]
    );
}

#[test]
fn test_get_camera_round_trip_leaves_cache_untouched() {
    let mut scene = SceneController::default();
    assert!(matches!(scene.get_camera(), Err(SceneError::NotConnected)));

    let (conn, mirror) = ready_mirror(&mut scene);
    let reply = scene.get_camera().unwrap();
    let (request_id, query) = mirror.last_query().unwrap();
    assert_eq!(query, Query::GetCamera);

    let response = json!({
        "request_id": request_id,
        "value": {
            "position": {"x": 9.0, "y": 9.0, "z": 9.0},
            "up": {"x": 0.0, "y": 0.0, "z": 1.0}
        }
    });
    scene.handle_event(conn, "response", &response).unwrap();

    let live = block_on(reply).unwrap();
    assert_eq!(live.position, Point3::new(9.0, 9.0, 9.0));
    assert_eq!(scene.camera().position, Point3::new(0.0, -3.0, 5.0));
}

#[test]
fn test_query_targets_oldest_ready_connection() {
    let mut scene = SceneController::default();
    let (_, first) = ready_mirror(&mut scene);
    let (_, second) = ready_mirror(&mut scene);

    let _reply = scene.has_gizmo("4").unwrap();
    assert!(first.last_query().is_some());
    assert!(second.last_query().is_none());
}

#[test]
fn test_query_fails_when_renderer_disconnects() {
    let mut scene = SceneController::default();
    let (conn, _) = ready_mirror(&mut scene);
    let reply = scene.has_gizmo("4").unwrap();
    scene.disconnect(conn).unwrap();
    assert!(matches!(
        block_on(reply),
        Err(SceneError::RoundTripTimeout { query: "has_gizmo" })
    ));
}

#[test]
fn test_query_response_with_wrong_shape() {
    let mut scene = SceneController::default();
    let (conn, mirror) = ready_mirror(&mut scene);
    let reply = scene.has_gizmo("4").unwrap();
    let (request_id, _) = mirror.last_query().unwrap();

    scene
        .handle_event(conn, "response", &json!({"request_id": request_id, "value": "yes"}))
        .unwrap();
    assert!(matches!(block_on(reply), Err(SceneError::ProtocolDecode { .. })));
}
