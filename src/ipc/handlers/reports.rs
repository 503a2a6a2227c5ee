use serde::Serialize;
use serde_json::json;
use std::path::PathBuf;

use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{core_err, db_conn, optional_i64, optional_str, required_str};
use crate::ipc::types::{AppState, Request};
use crate::queries::{self, GradeBucketing};

fn rows_json<T: Serialize>(rows: Vec<T>) -> Vec<serde_json::Value> {
    rows.into_iter().map(|r| json!(r)).collect()
}

/// Runs one named report against the open database and returns its rows as
/// JSON objects. Shared by the report methods and the CSV export, so an
/// exported file always matches what the same request would return inline.
fn report_rows(
    conn: &rusqlite::Connection,
    req: &Request,
    report: &str,
) -> Result<Vec<serde_json::Value>, serde_json::Value> {
    match report {
        "gradesBySubject" => {
            let code = optional_str(req, "subjectCode").map(|s| s.to_ascii_uppercase());
            queries::grades_by_subject(conn, code.as_deref())
                .map(rows_json)
                .map_err(|e| core_err(req, e))
        }
        "allStudents" => queries::all_students_with_grades(conn)
            .map(rows_json)
            .map_err(|e| core_err(req, e)),
        "enrollmentInfo" => {
            let filters = queries::parse_enrollment_filters(req.params.get("filters"))
                .map_err(|e| core_err(req, e))?;
            queries::complete_enrollment_info(conn, &filters)
                .map(rows_json)
                .map_err(|e| core_err(req, e))
        }
        "aboveAverage" => {
            let min_classes = optional_i64(req, "minClasses", 3)?;
            queries::students_above_average(conn, min_classes)
                .map(rows_json)
                .map_err(|e| core_err(req, e))
        }
        "topStudents" => {
            let limit = optional_i64(req, "limit", 10)?;
            let min_classes = optional_i64(req, "minClasses", 1)?;
            queries::top_students(conn, limit, min_classes)
                .map(rows_json)
                .map_err(|e| core_err(req, e))
        }
        "gradeDistribution" => {
            let bucketing = match req
                .params
                .get("bucketing")
                .and_then(|v| v.as_str())
                .map(|s| s.to_ascii_lowercase())
                .as_deref()
            {
                None | Some("ranges") => GradeBucketing::Ranges,
                Some("letters") => GradeBucketing::Letters,
                Some(other) => {
                    return Err(err(
                        &req.id,
                        "bad_params",
                        "bucketing must be one of: ranges, letters",
                        Some(json!({ "bucketing": other })),
                    ))
                }
            };
            queries::grade_distribution(conn, bucketing)
                .map(rows_json)
                .map_err(|e| core_err(req, e))
        }
        "subjectPerformance" => queries::subject_performance(conn)
            .map(rows_json)
            .map_err(|e| core_err(req, e)),
        "lecturerPerformance" => queries::lecturer_performance(conn)
            .map(rows_json)
            .map_err(|e| core_err(req, e)),
        other => Err(err(
            &req.id,
            "bad_params",
            format!("unknown report: {}", other),
            None,
        )),
    }
}

fn handle_report(state: &mut AppState, req: &Request, report: &str) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match report_rows(conn, req, report) {
        Ok(rows) => ok(&req.id, json!({ "rows": rows })),
        Err(e) => e,
    }
}

fn handle_dashboard_kpis(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    match queries::dashboard_kpis(conn) {
        Ok(kpis) => ok(&req.id, json!(kpis)),
        Err(e) => core_err(req, e),
    }
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let report = match required_str(req, "report") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let out_path = match req.params.get("outPath").and_then(|v| v.as_str()) {
        Some(v) if !v.trim().is_empty() => v.trim().to_string(),
        _ => return err(&req.id, "bad_params", "missing outPath", None),
    };

    let rows = match report_rows(conn, req, &report) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let csv = match export::render_csv(&rows) {
        Ok(v) => v,
        Err(e) => return core_err(req, e),
    };

    let out = PathBuf::from(&out_path);
    if let Some(parent) = out.parent() {
        if let Err(e) = std::fs::create_dir_all(parent) {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": out_path })),
            );
        }
    }
    if let Err(e) = std::fs::write(&out, csv) {
        return err(
            &req.id,
            "io_failed",
            e.to_string(),
            Some(json!({ "path": out_path })),
        );
    }

    ok(
        &req.id,
        json!({ "ok": true, "rowsExported": rows.len(), "path": out_path }),
    )
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.gradesBySubject" => Some(handle_report(state, req, "gradesBySubject")),
        "reports.allStudents" => Some(handle_report(state, req, "allStudents")),
        "reports.enrollmentInfo" => Some(handle_report(state, req, "enrollmentInfo")),
        "reports.aboveAverage" => Some(handle_report(state, req, "aboveAverage")),
        "reports.topStudents" => Some(handle_report(state, req, "topStudents")),
        "reports.gradeDistribution" => Some(handle_report(state, req, "gradeDistribution")),
        "reports.subjectPerformance" => Some(handle_report(state, req, "subjectPerformance")),
        "reports.lecturerPerformance" => Some(handle_report(state, req, "lecturerPerformance")),
        "dashboard.kpis" => Some(handle_dashboard_kpis(state, req)),
        "reports.exportCsv" => Some(handle_export_csv(state, req)),
        _ => None,
    }
}
