use axum::body::{to_bytes, Body};
use axum::http::{Request, StatusCode};
use tower::ServiceExt;

use bowling_chase::tuning::{build_router, ApiTuning, RigTuning};
use std::sync::{Arc, Mutex};

fn patch(payload: serde_json::Value) -> Request<Body> {
    Request::builder()
        .method("PATCH")
        .uri("/tuning")
        .header("content-type", "application/json")
        .body(Body::from(payload.to_string()))
        .unwrap()
}

#[tokio::test]
async fn http_get_and_patch_partial() {
    let (tx, rx) = crossbeam_channel::unbounded::<RigTuning>();
    let mirror = Arc::new(Mutex::new(RigTuning {
        aim_speed: 4.0,
        left_limit: -1.5,
        right_limit: 1.5,
        launch_force: 900.0,
        ..RigTuning::default()
    }));

    let app = build_router(tx, mirror.clone());

    let resp = app.clone().oneshot(Request::builder().uri("/tuning").body(Body::empty()).unwrap()).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let current: ApiTuning = serde_json::from_slice(&body).unwrap();
    assert_eq!(current.aim.limits.left, -1.5);
    assert_eq!(current.launch.force, 900.0);

    let payload = serde_json::json!({
        "camera": { "offset": { "y": 4.5 }, "follow": { "on_move": false } },
        "debug": { "show_gizmos": true }
    });
    let resp = app.clone().oneshot(patch(payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let guard = mirror.lock().unwrap();
    assert_eq!(guard.offset_y, 4.5);
    assert!(!guard.follow_on_move);
    assert!(guard.show_gizmos);
    assert_eq!(guard.aim_speed, 4.0);

    let sent = rx.try_recv().unwrap();
    assert_eq!(sent, *guard);
}

#[tokio::test]
async fn http_patch_rejects_invalid_tuning() {
    let (tx, rx) = crossbeam_channel::unbounded::<RigTuning>();
    let mirror = Arc::new(Mutex::new(RigTuning::default()));
    let app = build_router(tx, mirror.clone());

    let payload = serde_json::json!({ "aim": { "limits": { "left": 5.0 } } });
    let resp = app.oneshot(patch(payload)).await.unwrap();
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    let error: serde_json::Value = serde_json::from_slice(&body).unwrap();
    assert!(error["error"].as_str().unwrap().contains("left limit"));

    assert_eq!(*mirror.lock().unwrap(), RigTuning::default());
    assert!(rx.try_recv().is_err());
}
