use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use crate::errors::CoreError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{core_err, db_conn, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::validate;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LecturerRow {
    id: i64,
    first_name: String,
    last_name: String,
    email: Option<String>,
    office: Option<String>,
}

fn lecturer_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<LecturerRow> {
    Ok(LecturerRow {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        email: r.get(3)?,
        office: r.get(4)?,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct LecturerClassRow {
    class_id: i64,
    subject_code: String,
    subject_name: String,
    class_name: Option<String>,
    semester: String,
    year: i64,
    max_capacity: i64,
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = conn
        .prepare("SELECT id, first_name, last_name, email, office FROM lecturers ORDER BY id")
        .and_then(|mut stmt| {
            stmt.query_map([], lecturer_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });
    match rows {
        Ok(rows) => ok(&req.id, json!({ "lecturers": rows })),
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
            "SELECT id, first_name, last_name, email, office FROM lecturers WHERE id = ?1",
            params![id],
            lecturer_from_row,
        )
        .optional();
    match row {
        Ok(Some(lecturer)) => ok(&req.id, json!({ "lecturer": lecturer })),
        Ok(None) => core_err(req, CoreError::not_found("lecturer")),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rec = match validate::validate_lecturer_record(conn, &req.params, None) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    let res = conn.execute(
        "INSERT INTO lecturers(first_name, last_name, email, office) VALUES(?1, ?2, ?3, ?4)",
        params![rec.first_name, rec.last_name, rec.email, rec.office],
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "lecturerId": conn.last_insert_rowid() })),
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
    let rec = match validate::validate_lecturer_record(conn, &req.params, Some(id)) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    let res = conn.execute(
        "UPDATE lecturers SET first_name = ?1, last_name = ?2, email = ?3, office = ?4
         WHERE id = ?5",
        params![rec.first_name, rec.last_name, rec.email, rec.office, id],
    );
    match res {
        Ok(0) => core_err(req, CoreError::not_found("lecturer")),
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

    // Classes keep their row and fall back to lecturer NULL (ON DELETE SET NULL).
    match conn.execute("DELETE FROM lecturers WHERE id = ?1", params![id]) {
        Ok(0) => core_err(req, CoreError::not_found("lecturer")),
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_classes(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let id = match required_i64(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let lecturer = conn
        .query_row(
            "SELECT id, first_name, last_name, email, office FROM lecturers WHERE id = ?1",
            params![id],
            lecturer_from_row,
        )
        .optional();
    let lecturer = match lecturer {
        Ok(Some(v)) => v,
        Ok(None) => return core_err(req, CoreError::not_found("lecturer")),
        Err(e) => return core_err(req, e.into()),
    };

    let classes = conn
        .prepare(
            "SELECT c.id, c.subject_code, sub.name, c.class_name, c.semester, c.year,
                    c.max_capacity
             FROM classes c
             JOIN subjects sub ON sub.code = c.subject_code
             WHERE c.lecturer_id = ?1
             ORDER BY c.year DESC, c.semester",
        )
        .and_then(|mut stmt| {
            stmt.query_map(params![id], |r| {
                Ok(LecturerClassRow {
                    class_id: r.get(0)?,
                    subject_code: r.get(1)?,
                    subject_name: r.get(2)?,
                    class_name: r.get(3)?,
                    semester: r.get(4)?,
                    year: r.get(5)?,
                    max_capacity: r.get(6)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });
    match classes {
        Ok(classes) => ok(&req.id, json!({ "lecturer": lecturer, "classes": classes })),
        Err(e) => core_err(req, e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "lecturers.list" => Some(handle_list(state, req)),
        "lecturers.get" => Some(handle_get(state, req)),
        "lecturers.create" => Some(handle_create(state, req)),
        "lecturers.update" => Some(handle_update(state, req)),
        "lecturers.delete" => Some(handle_delete(state, req)),
        "lecturers.classes" => Some(handle_classes(state, req)),
        _ => None,
    }
}
