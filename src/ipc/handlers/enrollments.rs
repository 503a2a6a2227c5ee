use rusqlite::{params, OptionalExtension};
use serde::Serialize;
use serde_json::json;

use crate::errors::CoreError;
use crate::ipc::error::ok;
use crate::ipc::helpers::{core_err, db_conn, optional_str, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::validate::{self, GRADE_MAX, GRADE_MIN};

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StudentEnrollmentRow {
    student_id: i64,
    class_id: i64,
    grade: Option<f64>,
    grade_letter: Option<String>,
    note: Option<String>,
    class_name: Option<String>,
    semester: String,
    year: i64,
    subject_name: String,
    credits: i64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct ClassEnrollmentRow {
    student_id: i64,
    class_id: i64,
    grade: Option<f64>,
    grade_letter: Option<String>,
    note: Option<String>,
    first_name: String,
    last_name: String,
    email: String,
}

fn row_exists(
    conn: &rusqlite::Connection,
    sql: &str,
    id: i64,
) -> Result<bool, rusqlite::Error> {
    let hit: Option<i64> = conn.query_row(sql, params![id], |r| r.get(0)).optional()?;
    Ok(hit.is_some())
}

fn handle_create(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let rec = match validate::validate_enrollment_record(conn, &req.params, true) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    match row_exists(conn, "SELECT 1 FROM students WHERE id = ?1", rec.student_id) {
        Ok(true) => {}
        Ok(false) => return core_err(req, CoreError::not_found("student")),
        Err(e) => return core_err(req, e.into()),
    }
    match row_exists(conn, "SELECT 1 FROM classes WHERE id = ?1", rec.class_id) {
        Ok(true) => {}
        Ok(false) => return core_err(req, CoreError::not_found("class")),
        Err(e) => return core_err(req, e.into()),
    }

    let res = conn.execute(
        "INSERT INTO enrollments(student_id, class_id, grade, grade_letter, note)
         VALUES(?1, ?2, ?3, ?4, ?5)",
        params![
            rec.student_id,
            rec.class_id,
            rec.grade,
            rec.grade_letter,
            rec.note
        ],
    );
    match res {
        Ok(_) => ok(&req.id, json!({ "ok": true })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_update(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_i64(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let grade = match validate::validate_grade(req.params.get("grade"), GRADE_MIN, GRADE_MAX) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };
    let grade_letter = match validate::validate_grade_letter(req.params.get("gradeLetter")) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };
    let note = optional_str(req, "note");

    let res = conn.execute(
        "UPDATE enrollments SET grade = ?1, grade_letter = ?2, note = ?3
         WHERE student_id = ?4 AND class_id = ?5",
        params![grade, grade_letter, note, student_id, class_id],
    );
    match res {
        Ok(0) => core_err(req, CoreError::not_found("enrollment")),
        Ok(n) => ok(&req.id, json!({ "updated": n })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_i64(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let res = conn.execute(
        "DELETE FROM enrollments WHERE student_id = ?1 AND class_id = ?2",
        params![student_id, class_id],
    );
    match res {
        Ok(0) => core_err(req, CoreError::not_found("enrollment")),
        Ok(n) => ok(&req.id, json!({ "deleted": n })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_by_student(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let student_id = match required_i64(req, "studentId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = conn
        .prepare(
            "SELECT e.student_id, e.class_id, e.grade, e.grade_letter, e.note,
                    c.class_name, c.semester, c.year, sub.name, sub.credits
             FROM enrollments e
             JOIN classes c ON c.id = e.class_id
             JOIN subjects sub ON sub.code = c.subject_code
             WHERE e.student_id = ?1
             ORDER BY c.year DESC, c.semester",
        )
        .and_then(|mut stmt| {
            stmt.query_map(params![student_id], |r| {
                Ok(StudentEnrollmentRow {
                    student_id: r.get(0)?,
                    class_id: r.get(1)?,
                    grade: r.get(2)?,
                    grade_letter: r.get(3)?,
                    note: r.get(4)?,
                    class_name: r.get(5)?,
                    semester: r.get(6)?,
                    year: r.get(7)?,
                    subject_name: r.get(8)?,
                    credits: r.get(9)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });
    match rows {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => core_err(req, e.into()),
    }
}

fn handle_by_class(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let class_id = match required_i64(req, "classId") {
        Ok(v) => v,
        Err(e) => return e,
    };

    let rows = conn
        .prepare(
            "SELECT e.student_id, e.class_id, e.grade, e.grade_letter, e.note,
                    s.first_name, s.last_name, s.email
             FROM enrollments e
             JOIN students s ON s.id = e.student_id
             WHERE e.class_id = ?1
             ORDER BY s.last_name, s.first_name",
        )
        .and_then(|mut stmt| {
            stmt.query_map(params![class_id], |r| {
                Ok(ClassEnrollmentRow {
                    student_id: r.get(0)?,
                    class_id: r.get(1)?,
                    grade: r.get(2)?,
                    grade_letter: r.get(3)?,
                    note: r.get(4)?,
                    first_name: r.get(5)?,
                    last_name: r.get(6)?,
                    email: r.get(7)?,
                })
            })
            .and_then(|it| it.collect::<Result<Vec<_>, _>>())
        });
    match rows {
        Ok(enrollments) => ok(&req.id, json!({ "enrollments": enrollments })),
        Err(e) => core_err(req, e.into()),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "enrollments.create" => Some(handle_create(state, req)),
        "enrollments.update" => Some(handle_update(state, req)),
        "enrollments.delete" => Some(handle_delete(state, req)),
        "enrollments.byStudent" => Some(handle_by_student(state, req)),
        "enrollments.byClass" => Some(handle_by_class(state, req)),
        _ => None,
    }
}
