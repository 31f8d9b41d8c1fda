//! Program records.

use futures_util::future::BoxFuture;
use roster_core::{Arguments, PatternError};
use serde_json::{json, Value};

use super::{external_row, external_rows};
use crate::service::error::HandlerError;
use crate::service::handler::{handler_fn, HandlerExt};
use crate::service::router::Router;
use crate::session::DataAccess;

pub const LIST_PROGRAMS: &str = "
SELECT program_id, name, code, active
FROM programs
WHERE active = true
ORDER BY name";

pub const GET_PROGRAM: &str = "
SELECT program_id, name, code, active
FROM programs
WHERE active = true
AND program_id::text = $1::text";

pub fn register(router: &mut Router) -> Result<(), PatternError> {
    router.register_rest("GET", "/programs", handler_fn(list_programs))?;
    router.register_rest(
        "GET",
        "/programs/{programId}",
        handler_fn(get_program).requires(&["programId"]),
    )?;

    router.register_graphql("Query", "listPrograms", handler_fn(list_programs));
    router.register_graphql(
        "Query",
        "getProgram",
        handler_fn(get_program).requires(&["programId"]),
    );
    Ok(())
}

pub fn list_programs(
    db: &mut dyn DataAccess,
    _args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move { Ok(external_rows(db.fetch_all(LIST_PROGRAMS, &[]).await?)) })
}

pub fn get_program(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let program_id = args.require_str("programId")?;
        let row = db
            .fetch_optional(GET_PROGRAM, &[json!(program_id)])
            .await?
            .ok_or_else(|| HandlerError::not_found(format!("program {program_id} not found")))?;
        Ok(external_row(row))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::domain::testing::{args, connection, empty_args, row};
    use crate::session::MemoryDatabase;

    #[tokio::test]
    async fn lists_programs_in_query_order() {
        let db = MemoryDatabase::new();
        db.push_rows(vec![
            row(json!({"program_id": "a", "name": "Astronomy", "code": "AST", "active": true})),
            row(json!({"program_id": "b", "name": "Botany", "code": "BOT", "active": true})),
        ]);
        let mut conn = connection(&db).await;

        let out = list_programs(conn.data_access(), empty_args()).await.unwrap();
        assert_eq!(out[0]["programId"], "a");
        assert_eq!(out[1]["code"], "BOT");
        assert_eq!(db.queries()[0].0, LIST_PROGRAMS);
    }

    #[tokio::test]
    async fn gets_one_program() {
        let db = MemoryDatabase::new();
        db.push_rows(vec![row(
            json!({"program_id": "a", "name": "Astronomy", "code": "AST", "active": true}),
        )]);
        let mut conn = connection(&db).await;

        let out = get_program(conn.data_access(), args(json!({"programId": "a"})))
            .await
            .unwrap();
        assert_eq!(out["name"], "Astronomy");
        assert_eq!(db.queries()[0].1, vec![json!("a")]);
    }

    #[tokio::test]
    async fn missing_program_is_not_found() {
        let db = MemoryDatabase::new();
        let mut conn = connection(&db).await;

        let err = get_program(conn.data_access(), args(json!({"programId": "zz"})))
            .await
            .unwrap_err();
        assert!(matches!(err, HandlerError::NotFound { .. }));
    }
}
