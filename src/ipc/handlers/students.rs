use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use crate::errors::CoreError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{core_err, db_conn, optional_i64, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::validate;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentRow {
    id: i64,
    first_name: String,
    last_name: String,
    date_of_birth: String,
    gender: String,
    address: Option<String>,
    phone: Option<String>,
    email: String,
    enrollment_year: i64,
    major: Option<String>,
}

const STUDENT_COLS: &str =
    "id, first_name, last_name, date_of_birth, gender, address, phone, email, enrollment_year, major";

fn student_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StudentRow> {
    Ok(StudentRow {
        id: r.get(0)?,
        first_name: r.get(1)?,
        last_name: r.get(2)?,
        date_of_birth: r.get(3)?,
        gender: r.get(4)?,
        address: r.get(5)?,
        phone: r.get(6)?,
        email: r.get(7)?,
        enrollment_year: r.get(8)?,
        major: r.get(9)?,
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let limit = match optional_i64(req, "limit", 50) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let offset = match optional_i64(req, "offset", 0) {
        Ok(v) => v,
        Err(e) => return e,
    };

    let sql = format!(
        "SELECT {} FROM students ORDER BY id LIMIT ?1 OFFSET ?2",
        STUDENT_COLS
    );
    let rows = conn.prepare(&sql).and_then(|mut stmt| {
        stmt.query_map(params![limit, offset], student_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    });
    let rows = match rows {
        Ok(v) => v,
        Err(e) => return core_err(req, e.into()),
    };
    let total: i64 = match conn.query_row("SELECT COUNT(*) FROM students", [], |r| r.get(0)) {
        Ok(v) => v,
        Err(e) => return core_err(req, e.into()),
    };
    ok(&req.id, json!({ "students": rows, "total": total }))
}

fn handle_search(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let term = match required_str(req, "term") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let pattern = format!("%{}%", term);

    let sql = format!(
        "SELECT {} FROM students
         WHERE first_name LIKE ?1 OR last_name LIKE ?1 OR email LIKE ?1
         ORDER BY id",
        STUDENT_COLS
    );
    let rows = conn.prepare(&sql).and_then(|mut stmt| {
        stmt.query_map(params![pattern], student_from_row)
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
    });
    match rows {
        Ok(rows) => ok(&req.id, json!({ "students": rows })),
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

    let sql = format!("SELECT {} FROM students WHERE id = ?1", STUDENT_COLS);
    let row = conn
        .query_row(&sql, params![id], student_from_row)
        .optional();
    match row {
        Ok(Some(student)) => ok(&req.id, json!({ "student": student })),
        Ok(None) => core_err(req, CoreError::not_found("student")),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rec = match validate::validate_student_record(conn, &req.params, None) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    let res = conn.execute(
        "INSERT INTO students(first_name, last_name, date_of_birth, gender,
                              address, phone, email, enrollment_year, major)
         VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            rec.first_name,
            rec.last_name,
            rec.date_of_birth,
            rec.gender.as_str(),
            rec.address,
            rec.phone,
            rec.email,
            rec.enrollment_year,
            rec.major
        ],
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "studentId": conn.last_insert_rowid() })),
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
    let rec = match validate::validate_student_record(conn, &req.params, Some(id)) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    let res = conn.execute(
        "UPDATE students
         SET first_name = ?1, last_name = ?2, date_of_birth = ?3, gender = ?4,
             address = ?5, phone = ?6, email = ?7, enrollment_year = ?8, major = ?9
         WHERE id = ?10",
        params![
            rec.first_name,
            rec.last_name,
            rec.date_of_birth,
            rec.gender.as_str(),
            rec.address,
            rec.phone,
            rec.email,
            rec.enrollment_year,
            rec.major,
            id
        ],
    );
    match res {
        Ok(0) => core_err(req, CoreError::not_found("student")),
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

    // Enrollments go with the student via ON DELETE CASCADE.
    match conn.execute("DELETE FROM students WHERE id = ?1", params![id]) {
        Ok(0) => core_err(req, CoreError::not_found("student")),
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => core_err(req, e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "students.list" => Some(handle_list(state, req)),
        "students.search" => Some(handle_search(state, req)),
        "students.get" => Some(handle_get(state, req)),
        "students.create" => Some(handle_create(state, req)),
        "students.update" => Some(handle_update(state, req)),
        "students.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
