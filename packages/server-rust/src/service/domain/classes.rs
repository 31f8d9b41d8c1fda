//! Class records.

use futures_util::future::BoxFuture;
use roster_core::{Arguments, PatternError};
use serde_json::{json, Value};

use super::{external_row, external_rows};
use crate::service::error::HandlerError;
use crate::service::handler::{handler_fn, HandlerExt};
use crate::service::router::Router;
use crate::session::DataAccess;

pub const LIST_CLASSES: &str = "
SELECT class_id, class_name, hours_per_week, program_id, active
FROM classes
WHERE active = true
ORDER BY class_name";

pub const GET_CLASS: &str = "
SELECT class_id, class_name, hours_per_week, program_id, active
FROM classes
WHERE active = true
AND class_id::text = $1::text";

pub const DELETE_CLASS: &str = "DELETE FROM classes WHERE class_id::text = $1::text";

pub fn register(router: &mut Router) -> Result<(), PatternError> {
    router.register_rest("GET", "/classes", handler_fn(list_classes))?;
    router.register_rest(
        "GET",
        "/classes/{classId}",
        handler_fn(get_class).requires(&["classId"]),
    )?;
    router.register_rest(
        "DELETE",
        "/classes/{classId}",
        handler_fn(delete_class).requires(&["classId"]),
    )?;

    router.register_graphql("Query", "listClasses", handler_fn(list_classes));
    router.register_graphql(
        "Query",
        "getClass",
        handler_fn(get_class).requires(&["classId"]),
    );
    Ok(())
}

pub fn list_classes(
    db: &mut dyn DataAccess,
    _args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move { Ok(external_rows(db.fetch_all(LIST_CLASSES, &[]).await?)) })
}

pub fn get_class(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let class_id = args.require_str("classId")?;
        let row = db
            .fetch_optional(GET_CLASS, &[json!(class_id)])
            .await?
            .ok_or_else(|| HandlerError::not_found(format!("class {class_id} not found")))?;
        Ok(external_row(row))
    })
}

/// Deletes the class. Deleting an unknown id still reports success.
pub fn delete_class(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let class_id = args.require_str("classId")?;
        db.execute(DELETE_CLASS, &[json!(class_id)]).await?;
        Ok(json!({ "result": "success" }))
    })
}
