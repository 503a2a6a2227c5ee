use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use crate::errors::CoreError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{core_err, db_conn, required_str};
use crate::ipc::types::{AppState, Request};
use crate::validate;

#[derive(Debug, Clone, Serialize)]
struct SubjectRow {
    code: String,
    name: String,
    credits: i64,
}

fn subject_from_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<SubjectRow> {
    Ok(SubjectRow {
        code: r.get(0)?,
        name: r.get(1)?,
        credits: r.get(2)?,
    })
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rows = conn
        .prepare("SELECT code, name, credits FROM subjects ORDER BY code")
        .and_then(|mut stmt| {
            stmt.query_map([], subject_from_row)
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });
    match rows {
        Ok(rows) => ok(&req.id, json!({ "subjects": rows })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v.trim().to_ascii_uppercase(),
        Err(e) => return e,
    };

    let row = conn
        .query_row(
            "SELECT code, name, credits FROM subjects WHERE code = ?1",
            params![code],
            subject_from_row,
        )
        .optional();
    match row {
        Ok(Some(subject)) => ok(&req.id, json!({ "subject": subject })),
        Ok(None) => core_err(req, CoreError::not_found("subject")),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rec = match validate::validate_subject_record(conn, &req.params, true) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    let res = conn.execute(
        "INSERT INTO subjects(code, name, credits) VALUES(?1, ?2, ?3)",
        params![rec.code, rec.name, rec.credits],
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "subjectCode": rec.code })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rec = match validate::validate_subject_record(conn, &req.params, false) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    let res = conn.execute(
        "UPDATE subjects SET name = ?1, credits = ?2 WHERE code = ?3",
        params![rec.name, rec.credits, rec.code],
    );
    match res {
        Ok(0) => core_err(req, CoreError::not_found("subject")),
        Ok(n) => ok(&req.id, json!({ "updated": n })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let code = match required_str(req, "code") {
        Ok(v) => v.trim().to_ascii_uppercase(),
        Err(e) => return e,
    };

    // A subject with classes still attached trips the FK constraint.
    match conn.execute("DELETE FROM subjects WHERE code = ?1", params![code]) {
        Ok(0) => core_err(req, CoreError::not_found("subject")),
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => core_err(req, e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "subjects.list" => Some(handle_list(state, req)),
        "subjects.get" => Some(handle_get(state, req)),
        "subjects.create" => Some(handle_create(state, req)),
        "subjects.update" => Some(handle_update(state, req)),
        "subjects.delete" => Some(handle_delete(state, req)),
        _ => None,
    }
}
