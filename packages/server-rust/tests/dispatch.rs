//! End-to-end dispatch of recorded runtime events through the domain router.

mod common;

use common::{dispatcher, envelope_body, fixture, row};
use roster_server::session::MemoryDatabase;
use roster_server::DispatchError;
use serde_json::json;

#[tokio::test]
async fn api_gateway_v2_get_student() {
    let db = MemoryDatabase::new();
    db.push_rows(vec![row(json!({
        "student_id": 7,
        "first_name": "Ada",
        "last_name": "Lovelace",
        "program_id": "math",
    }))]);

    let envelope = dispatcher(&db)
        .resolve_and_invoke(fixture("apigw_v2_get_student.json"))
        .await
        .unwrap();

    assert_eq!(envelope["statusCode"], 200);
    assert_eq!(envelope["headers"]["content-type"], "application/json");
    assert_eq!(envelope["isBase64Encoded"], false);
    assert_eq!(
        envelope_body(&envelope),
        json!({"studentId": 7, "firstName": "Ada", "lastName": "Lovelace", "programId": "math"})
    );

    let queries = db.queries();
    assert_eq!(queries.len(), 1);
    assert_eq!(queries[0].1, vec![json!("7")]);
    assert_eq!(db.lifecycle(), vec!["connect", "begin", "commit", "reset"]);
}

#[tokio::test]
async fn api_gateway_v2_base64_body_is_decoded() {
    let db = MemoryDatabase::new();

    let envelope = dispatcher(&db)
        .resolve_and_invoke(fixture("apigw_v2_save_student.json"))
        .await
        .unwrap();

    assert_eq!(envelope["statusCode"], 200);
    let saved = envelope_body(&envelope);
    assert_eq!(saved["firstName"], "Ada");
    assert_eq!(saved["lastName"], "Lovelace");
    assert!(saved["studentUuid"].as_str().is_some_and(|u| u.len() == 36));

    let params = &db.queries()[0].1;
    assert_eq!(params[1], json!("Ada"));
    assert_eq!(params[4], json!("math"));
}

#[tokio::test]
async fn appsync_resolver_returns_raw_rows() {
    let db = MemoryDatabase::new();
    db.push_rows(vec![row(json!({"student_id": 1, "last_name": "Lovelace"}))]);

    let result = dispatcher(&db)
        .resolve_and_invoke(fixture("appsync_list_students.json"))
        .await
        .unwrap();

    assert_eq!(result, json!([{"studentId": 1, "lastName": "Lovelace"}]));
    assert_eq!(db.queries()[0].1, vec![json!("Lovelace")]);
}

#[tokio::test]
async fn direct_invocation_lists_students() {
    let db = MemoryDatabase::new();
    db.push_rows(vec![
        row(json!({"student_id": 1})),
        row(json!({"student_id": 2})),
    ]);

    let result = dispatcher(&db)
        .resolve_and_invoke(fixture("direct_list_students.json"))
        .await
        .unwrap();

    assert_eq!(result, json!([{"studentId": 1}, {"studentId": 2}]));
}

#[tokio::test]
async fn warm_invocations_share_one_connection() {
    let db = MemoryDatabase::new();
    let dispatcher = dispatcher(&db);

    for _ in 0..3 {
        dispatcher
            .resolve_and_invoke(fixture("direct_list_students.json"))
            .await
            .unwrap();
    }

    assert_eq!(db.connect_count(), 1);
    assert_eq!(
        db.lifecycle().iter().filter(|s| *s == "commit").count(),
        3
    );
}

#[tokio::test]
async fn graphql_missing_record_is_an_error() {
    let db = MemoryDatabase::new();

    let err = dispatcher(&db)
        .resolve_and_invoke(json!({
            "info": {"parentTypeName": "Query", "fieldName": "getStudent"},
            "arguments": {"studentId": "404"},
        }))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Handler(_)));
    assert_eq!(err.to_string(), "student 404 not found");
    assert_eq!(db.lifecycle(), vec!["connect", "begin", "rollback", "reset"]);
}

#[tokio::test]
async fn unknown_event_shape_is_rejected_before_any_connection() {
    let db = MemoryDatabase::new();

    let err = dispatcher(&db)
        .resolve_and_invoke(json!({"source": "aws.events", "detail": {}}))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Unroutable(_)));
    assert!(db.log().is_empty());
}
