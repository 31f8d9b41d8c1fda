//! Student records.

use futures_util::future::BoxFuture;
use roster_core::case::to_camel;
use roster_core::{ArgumentError, Arguments, PatternError};
use serde_json::{json, Map, Value};
use uuid::Uuid;

use super::{external_row, external_rows};
use crate::service::error::HandlerError;
use crate::service::handler::{handler_fn, HandlerExt};
use crate::service::router::Router;
use crate::session::DataAccess;

pub const LIST_STUDENTS: &str = "
SELECT student_uuid, student_id, first_name, last_name, status, program_id
FROM students
WHERE active = true
ORDER BY student_id";

pub const LIST_STUDENTS_BY_LAST_NAME: &str = "
SELECT student_uuid, student_id, first_name, last_name, status, program_id
FROM students
WHERE active = true
AND last_name = $1::text
ORDER BY student_id";

pub const GET_STUDENT: &str = "
SELECT student_uuid, student_id, first_name, last_name, status, program_id
FROM students
WHERE active = true
AND student_id = $1::integer";

/// Upsert keyed on `student_uuid`.
pub const SAVE_STUDENT: &str = "
INSERT INTO students (student_uuid, first_name, last_name, status, program_id, active, updated_by, created_by)
VALUES ($1::uuid, $2::text, $3::text, $4::text, $5::uuid, true, 'system', 'system')
ON CONFLICT (student_uuid) DO UPDATE
SET
  first_name = excluded.first_name,
  last_name = excluded.last_name,
  status = excluded.status,
  program_id = excluded.program_id,
  active = excluded.active,
  updated_by = excluded.updated_by
RETURNING student_uuid, student_id, first_name, last_name, status, program_id";

pub const UPDATE_STUDENT: &str = "
UPDATE students
SET
  student_uuid = $1::uuid,
  first_name = $2::text,
  last_name = $3::text,
  status = $4::text,
  program_id = $5::uuid,
  updated_by = 'system'
WHERE student_id = $6::integer
RETURNING student_uuid, student_id, first_name, last_name, status, program_id";

pub const DELETE_STUDENT: &str = "DELETE FROM students WHERE student_id = $1::integer";

/// Fields written by `SAVE_STUDENT` and `UPDATE_STUDENT`, in parameter order.
const WRITE_FIELDS: [&str; 5] = ["studentUuid", "firstName", "lastName", "status", "programId"];

pub fn register(router: &mut Router) -> Result<(), PatternError> {
    router.register_rest("GET", "/students", handler_fn(list_students))?;
    router.register_rest(
        "GET",
        "/students/{studentId}",
        handler_fn(get_student).requires(&["studentId"]),
    )?;
    router.register_rest("PUT", "/students", handler_fn(save_student))?;
    router.register_rest(
        "POST",
        "/students/{studentId}",
        handler_fn(update_student).requires(&["studentId"]),
    )?;
    router.register_rest(
        "DELETE",
        "/students/{studentId}",
        handler_fn(delete_student).requires(&["studentId"]),
    )?;

    router.register_direct("list_students", handler_fn(list_students));

    router.register_graphql("Query", "listStudents", handler_fn(list_students));
    router.register_graphql(
        "Query",
        "getStudent",
        handler_fn(get_student).requires(&["studentId"]),
    );
    router.register_graphql(
        "Mutation",
        "saveStudent",
        handler_fn(save_student).requires(&["student"]),
    );
    Ok(())
}

/// Active students, optionally filtered by `lastName`.
pub fn list_students(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let rows = match args.get_str("lastName") {
            Some(last_name) => {
                db.fetch_all(LIST_STUDENTS_BY_LAST_NAME, &[json!(last_name)])
                    .await?
            }
            None => db.fetch_all(LIST_STUDENTS, &[]).await?,
        };
        Ok(external_rows(rows))
    })
}

pub fn get_student(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let student_id = args.require_str("studentId")?;
        let row = db
            .fetch_optional(GET_STUDENT, &[json!(student_id)])
            .await?
            .ok_or_else(|| HandlerError::not_found(format!("student {student_id} not found")))?;
        Ok(external_row(row))
    })
}

/// Inserts or replaces a student sent as `{"student": {...}}`.
///
/// A `studentUuid` is generated when the caller omits one.
pub fn save_student(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let mut student = student_input(&args)?;
        for required in ["firstName", "lastName"] {
            if student.get(required).map_or(true, Value::is_null) {
                return Err(ArgumentError::Missing {
                    name: format!("student.{required}"),
                }
                .into());
            }
        }
        if student.get("studentUuid").map_or(true, Value::is_null) {
            student.insert(
                "studentUuid".to_string(),
                Value::String(Uuid::new_v4().to_string()),
            );
        }

        let row = db
            .fetch_optional(SAVE_STUDENT, &write_params(&student))
            .await?;
        Ok(row.map_or(Value::Object(student), external_row))
    })
}

/// Merges the request body over the stored record; body fields win.
pub fn update_student(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let student_id = args.require_str("studentId")?;
        let changes = match args.body() {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(body)) => match body.get("student") {
                Some(Value::Object(student)) => student.clone(),
                _ => body.clone(),
            },
            Some(other) => {
                return Err(ArgumentError::Invalid {
                    name: "body".to_string(),
                    reason: format!("expected an object, got {other}"),
                }
                .into())
            }
        };

        let not_found = || HandlerError::not_found(format!("student {student_id} not found"));
        let existing = db
            .fetch_optional(GET_STUDENT, &[json!(student_id)])
            .await?
            .ok_or_else(not_found)?;

        let mut merged: Map<String, Value> = existing
            .into_iter()
            .map(|(column, value)| (to_camel(&column), value))
            .collect();
        merged.extend(changes);

        let mut params = write_params(&merged);
        params.push(json!(student_id));
        let row = db
            .fetch_optional(UPDATE_STUDENT, &params)
            .await?
            .ok_or_else(not_found)?;
        Ok(external_row(row))
    })
}

pub fn delete_student(
    db: &mut dyn DataAccess,
    args: Arguments,
) -> BoxFuture<'_, Result<Value, HandlerError>> {
    Box::pin(async move {
        let student_id = args.require_str("studentId")?;
        db.execute(DELETE_STUDENT, &[json!(student_id)]).await?;
        Ok(json!({ "result": "success" }))
    })
}

/// The student object from a REST body (`body.student`) or a GraphQL or
/// direct argument (`student`).
fn student_input(args: &Arguments) -> Result<Map<String, Value>, ArgumentError> {
    let value = args
        .body()
        .and_then(|body| body.get("student"))
        .or_else(|| args.get("student"));
    match value {
        Some(Value::Object(student)) => Ok(student.clone()),
        None | Some(Value::Null) => Err(ArgumentError::Missing {
            name: "student".to_string(),
        }),
        Some(other) => Err(ArgumentError::Invalid {
            name: "student".to_string(),
            reason: format!("expected an object, got {other}"),
        }),
    }
}

fn write_params(student: &Map<String, Value>) -> Vec<Value> {
    WRITE_FIELDS
        .iter()
        .map(|field| student.get(*field).cloned().unwrap_or(Value::Null))
        .collect()
}
