mod test_support;

use chrono::Datelike;
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{request_ok, spawn_sidecar, temp_dir};

fn select_workspace(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>, name: &str) {
    let workspace = temp_dir(name);
    let _ = request_ok(
        stdin,
        reader,
        "0",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

/// Two subjects, two students, three enrollments. Intro's class carries one
/// graded and one ungraded row, Calculus only the first student.
fn seed(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) -> (i64, i64) {
    for (code, name) in [("CS101", "Intro"), ("MATH20", "Calculus")] {
        let _ = request_ok(
            stdin,
            reader,
            "seed-subject",
            "subjects.create",
            json!({ "subjectCode": code, "subjectName": name, "credits": 4 }),
        );
    }
    let mut student_ids = Vec::new();
    for (first, last, email) in [("An", "Tran", "an@example.com"), ("Bao", "Ngo", "bao@example.com")]
    {
        let created = request_ok(
            stdin,
            reader,
            "seed-student",
            "students.create",
            json!({
                "firstName": first,
                "lastName": last,
                "email": email,
                "dateOfBirth": format!("{}-03-14", chrono::Local::now().year() - 20),
                "gender": "M",
                "enrollmentYear": 2024
            }),
        );
        student_ids.push(created.get("studentId").and_then(|v| v.as_i64()).expect("studentId"));
    }
    let mut class_ids = Vec::new();
    for code in ["CS101", "MATH20"] {
        let created = request_ok(
            stdin,
            reader,
            "seed-class",
            "classes.create",
            json!({ "subjectCode": code, "semester": "S1", "year": 2024 }),
        );
        class_ids.push(created.get("classId").and_then(|v| v.as_i64()).expect("classId"));
    }

    let seeds = [
        (student_ids[0], class_ids[0], json!(8.5), json!("B")),
        (student_ids[1], class_ids[0], json!(null), json!(null)),
        (student_ids[0], class_ids[1], json!(6.0), json!("C")),
    ];
    for (i, (student_id, class_id, grade, letter)) in seeds.iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("seed-enr{}", i),
            "enrollments.create",
            json!({
                "studentId": student_id,
                "classId": class_id,
                "grade": grade,
                "gradeLetter": letter
            }),
        );
    }
    (class_ids[0], class_ids[1])
}

#[test]
fn rows_come_back_by_subject_name_then_student_name() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-grades-order");
    let (cs_class, math_class) = seed(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.gradesBySubject",
        json!({}),
    );
    let rows = result.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 3);

    // Calculus sorts before Intro; inside Intro, Ngo before Tran.
    let order: Vec<(String, String)> = rows
        .iter()
        .map(|r| {
            (
                r.get("subjectName").and_then(|v| v.as_str()).unwrap().to_string(),
                r.get("lastName").and_then(|v| v.as_str()).unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            ("Calculus".to_string(), "Tran".to_string()),
            ("Intro".to_string(), "Ngo".to_string()),
            ("Intro".to_string(), "Tran".to_string())
        ]
    );

    let calculus = &rows[0];
    assert_eq!(calculus.get("subjectCode").and_then(|v| v.as_str()), Some("MATH20"));
    assert_eq!(calculus.get("classId").and_then(|v| v.as_i64()), Some(math_class));
    assert!(calculus.get("className").map(|v| v.is_null()).unwrap_or(false));
    assert_eq!(calculus.get("semester").and_then(|v| v.as_str()), Some("S1"));
    assert_eq!(calculus.get("year").and_then(|v| v.as_i64()), Some(2024));
    assert!((calculus.get("grade").and_then(|v| v.as_f64()).expect("grade") - 6.0).abs() < 1e-9);
    assert_eq!(calculus.get("gradeLetter").and_then(|v| v.as_str()), Some("C"));

    let ungraded = &rows[1];
    assert_eq!(ungraded.get("classId").and_then(|v| v.as_i64()), Some(cs_class));
    assert!(ungraded.get("grade").map(|v| v.is_null()).unwrap_or(false));
    assert!(ungraded.get("gradeLetter").map(|v| v.is_null()).unwrap_or(false));
}

#[test]
fn subject_code_filter_is_case_insensitive() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-grades-filter");
    let _ = seed(&mut stdin, &mut reader);

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.gradesBySubject",
        json!({ "subjectCode": "cs101" }),
    );
    let rows = result.get("rows").and_then(|v| v.as_array()).expect("rows");
    assert_eq!(rows.len(), 2);
    for row in rows {
        assert_eq!(row.get("subjectCode").and_then(|v| v.as_str()), Some("CS101"));
    }
}

#[test]
fn empty_report_has_no_rows() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-grades-empty");

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.gradesBySubject",
        json!({}),
    );
    assert_eq!(
        result.get("rows").and_then(|v| v.as_array()).map(|a| a.len()),
        Some(0)
    );
}
