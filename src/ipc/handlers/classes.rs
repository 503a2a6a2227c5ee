use rusqlite::{params, params_from_iter, types::Value as SqlValue, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use crate::errors::CoreError;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{core_err, db_conn, optional_str, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::validate::{self, ClassRecord};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassListRow {
    id: i64,
    subject_code: String,
    subject_name: String,
    class_name: Option<String>,
    semester: String,
    year: i64,
    max_capacity: i64,
    lecturer_first_name: Option<String>,
    lecturer_last_name: Option<String>,
    enrolled_count: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassDetailRow {
    id: i64,
    subject_code: String,
    subject_name: String,
    credits: i64,
    class_name: Option<String>,
    semester: String,
    year: i64,
    max_capacity: i64,
    lecturer_id: Option<i64>,
    lecturer_first_name: Option<String>,
    lecturer_last_name: Option<String>,
}

/// Subject must exist up front; a dangling lecturer id is reported the same
/// way before the insert hits the FK.
fn check_class_refs(
    conn: &rusqlite::Connection,
    rec: &ClassRecord,
) -> Result<(), CoreError> {
    let subject: Option<i64> = conn
        .query_row(
            "SELECT 1 FROM subjects WHERE code = ?1",
            params![rec.subject_code],
            |r| r.get(0),
        )
        .optional()?;
    if subject.is_none() {
        return Err(CoreError::not_found("subject"));
    }
    if let Some(lecturer_id) = rec.lecturer_id {
        let lecturer: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM lecturers WHERE id = ?1",
                params![lecturer_id],
                |r| r.get(0),
            )
            .optional()?;
        if lecturer.is_none() {
            return Err(CoreError::not_found("lecturer"));
        }
    }
    Ok(())
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let year = match req.params.get("year") {
        None => None,
        Some(v) if v.is_null() => None,
        Some(v) => match v.as_i64() {
            Some(n) => Some(n),
            None => return err(&req.id, "bad_params", "year must be an integer", None),
        },
    };
    let semester = optional_str(req, "semester").map(|s| s.to_ascii_uppercase());

    let mut sql = String::from(
        "SELECT c.id, c.subject_code, sub.name, c.class_name, c.semester, c.year,
                c.max_capacity, l.first_name, l.last_name, COUNT(e.student_id)
         FROM classes c
         JOIN subjects sub ON sub.code = c.subject_code
         LEFT JOIN lecturers l ON l.id = c.lecturer_id
         LEFT JOIN enrollments e ON e.class_id = c.id
         WHERE 1=1",
    );
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(year) = year {
        sql.push_str(" AND c.year = ?");
        values.push(SqlValue::Integer(year));
    }
    if let Some(sem) = &semester {
        sql.push_str(" AND c.semester = ?");
        values.push(SqlValue::Text(sem.clone()));
    }
    sql.push_str(" GROUP BY c.id ORDER BY c.year DESC, c.semester");

    let rows = conn.prepare(&sql).and_then(|mut stmt| {
        stmt.query_map(params_from_iter(values), |r| {
            Ok(ClassListRow {
                id: r.get(0)?,
                subject_code: r.get(1)?,
                subject_name: r.get(2)?,
                class_name: r.get(3)?,
                semester: r.get(4)?,
                year: r.get(5)?,
                max_capacity: r.get(6)?,
                lecturer_first_name: r.get(7)?,
                lecturer_last_name: r.get(8)?,
                enrolled_count: r.get(9)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    });
    match rows {
        Ok(classes) => ok(&req.id, json!({ "classes": classes })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let row = conn
        .query_row(
            "SELECT c.id, c.subject_code, sub.name, sub.credits, c.class_name,
                    c.semester, c.year, c.max_capacity, c.lecturer_id,
                    l.first_name, l.last_name
             FROM classes c
             JOIN subjects sub ON sub.code = c.subject_code
             LEFT JOIN lecturers l ON l.id = c.lecturer_id
             WHERE c.id = ?1",
            params![id],
            |r| {
                Ok(ClassDetailRow {
                    id: r.get(0)?,
                    subject_code: r.get(1)?,
                    subject_name: r.get(2)?,
                    credits: r.get(3)?,
                    class_name: r.get(4)?,
                    semester: r.get(5)?,
                    year: r.get(6)?,
                    max_capacity: r.get(7)?,
                    lecturer_id: r.get(8)?,
                    lecturer_first_name: r.get(9)?,
                    lecturer_last_name: r.get(10)?,
                })
            },
        )
        .optional();
    match row {
        Ok(Some(class)) => ok(&req.id, json!({ "class": class })),
        Ok(None) => core_err(req, CoreError::not_found("class")),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rec = match validate::validate_class_record(&req.params) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };
    if let Err(e) = check_class_refs(conn, &rec) {
        return core_err(req, e);
    }

    let res = conn.execute(
        "INSERT INTO classes(subject_code, lecturer_id, class_name, semester, year, max_capacity)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            rec.subject_code,
            rec.lecturer_id,
            rec.class_name,
            rec.semester.as_str(),
            rec.year,
            rec.max_capacity
        ],
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "classId": conn.last_insert_rowid() })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rec = match validate::validate_class_record(&req.params) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };
    if let Err(e) = check_class_refs(conn, &rec) {
        return core_err(req, e);
    }

    let res = conn.execute(
        "UPDATE classes
         SET subject_code = ?1, lecturer_id = ?2, class_name = ?3, semester = ?4,
             year = ?5, max_capacity = ?6
         WHERE id = ?7",
        params![
            rec.subject_code,
            rec.lecturer_id,
            rec.class_name,
            rec.semester.as_str(),
            rec.year,
            rec.max_capacity,
            id
        ],
    );
    match res {
        Ok(0) => core_err(req, CoreError::not_found("class")),
        Ok(n) => ok(&req.id, json!({ "updated": n })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    // Enrollments for the class go with it via ON DELETE CASCADE.
    match conn.execute("DELETE FROM classes WHERE id = ?1", params![id]) {
        Ok(0) => core_err(req, CoreError::not_found("class")),
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => core_err(req, e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "classes.list" => Some(handle_list(state, req)),
        "classes.get" => Some(handle_get(state, req)),
        "classes.create" => Some(handle_create(state, req)),
        "classes.update" => Some(handle_update(state, req)),
        "classes.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
