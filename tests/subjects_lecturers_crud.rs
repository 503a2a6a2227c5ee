mod test_support;

use chrono::Datelike;
use serde_json::json;
use std::io::BufReader;
use std::process::{ChildStdin, ChildStdout};
use test_support::{error_code, request_err, request_ok, spawn_sidecar, temp_dir};

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

#[test]
fn subjects_list_in_code_order() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-subjects-list");

    for (i, (code, name)) in [("MATH20", "Calculus"), ("CS101", "Intro"), ("EE150", "Circuits")]
        .iter()
        .enumerate()
    {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("c{}", i),
            "subjects.create",
            json!({ "subjectCode": code, "subjectName": name, "credits": 3 }),
        );
    }

    let listed = request_ok(&mut stdin, &mut reader, "1", "subjects.list", json!({}));
    let codes: Vec<String> = listed
        .get("subjects")
        .and_then(|v| v.as_array())
        .expect("subjects")
        .iter()
        .filter_map(|s| s.get("code").and_then(|v| v.as_str()))
        .map(|s| s.to_string())
        .collect();
    assert_eq!(codes, vec!["CS101", "EE150", "MATH20"]);
}

#[test]
fn lecturer_crud_and_optional_email() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-lecturers-crud");

    // Email is optional for lecturers.
    let created = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "lecturers.create",
        json!({ "firstName": "Minh", "lastName": "Nguyen" }),
    );
    let id = created
        .get("lecturerId")
        .and_then(|v| v.as_i64())
        .expect("lecturerId");

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lecturers.get",
        json!({ "id": id }),
    );
    let lecturer = got.get("lecturer").cloned().expect("lecturer");
    assert!(lecturer.get("email").map(|v| v.is_null()).unwrap_or(false));

    // When given, it still has to look like an email.
    let error = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "lecturers.create",
        json!({ "firstName": "Thu", "lastName": "Dang", "email": "not-an-email" }),
    );
    assert_eq!(error_code(&error), "invalid_format");

    let updated = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lecturers.update",
        json!({ "id": id, "firstName": "Minh", "lastName": "Nguyen", "email": "minh@uni.edu", "office": "B2-201" }),
    );
    assert_eq!(updated.get("updated").and_then(|v| v.as_i64()), Some(1));

    let duplicate = request_err(
        &mut stdin,
        &mut reader,
        "5",
        "lecturers.create",
        json!({ "firstName": "Another", "lastName": "Person", "email": "minh@uni.edu" }),
    );
    assert_eq!(error_code(&duplicate), "duplicate_key");

    let deleted = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "lecturers.delete",
        json!({ "id": id }),
    );
    assert_eq!(deleted.get("deleted").and_then(|v| v.as_i64()), Some(1));
    let error = request_err(
        &mut stdin,
        &mut reader,
        "7",
        "lecturers.get",
        json!({ "id": id }),
    );
    assert_eq!(error_code(&error), "not_found");
}

#[test]
fn student_and_lecturer_emails_are_separate_namespaces() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-email-scopes");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "students.create",
        json!({
            "firstName": "An",
            "lastName": "Tran",
            "email": "shared@uni.edu",
            "dateOfBirth": format!("{}-03-14", chrono::Local::now().year() - 20),
            "gender": "F",
            "enrollmentYear": 2024
        }),
    );
    // The same address is fine on the lecturer side.
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "lecturers.create",
        json!({ "firstName": "Minh", "lastName": "Nguyen", "email": "shared@uni.edu" }),
    );
}

#[test]
fn lecturer_classes_come_back_newest_year_first() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-lecturer-classes");

    let lecturer = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "lecturers.create",
        json!({ "firstName": "Minh", "lastName": "Nguyen", "email": "minh@uni.edu" }),
    );
    let lecturer_id = lecturer
        .get("lecturerId")
        .and_then(|v| v.as_i64())
        .expect("lecturerId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.create",
        json!({ "subjectCode": "CS101", "subjectName": "Intro", "credits": 4 }),
    );

    for (i, (semester, year)) in [("S2", 2023), ("S1", 2024), ("S2", 2024)].iter().enumerate() {
        let _ = request_ok(
            &mut stdin,
            &mut reader,
            &format!("cls{}", i),
            "classes.create",
            json!({
                "subjectCode": "CS101",
                "lecturerId": lecturer_id,
                "semester": semester,
                "year": year
            }),
        );
    }

    let result = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "lecturers.classes",
        json!({ "id": lecturer_id }),
    );
    assert_eq!(
        result
            .get("lecturer")
            .and_then(|l| l.get("firstName"))
            .and_then(|v| v.as_str()),
        Some("Minh")
    );
    let classes = result.get("classes").and_then(|v| v.as_array()).expect("classes");
    let order: Vec<(i64, String)> = classes
        .iter()
        .map(|c| {
            (
                c.get("year").and_then(|v| v.as_i64()).unwrap(),
                c.get("semester").and_then(|v| v.as_str()).unwrap().to_string(),
            )
        })
        .collect();
    assert_eq!(
        order,
        vec![
            (2024, "S1".to_string()),
            (2024, "S2".to_string()),
            (2023, "S2".to_string())
        ]
    );
    assert_eq!(
        classes[0].get("subjectName").and_then(|v| v.as_str()),
        Some("Intro")
    );
}

#[test]
fn deleting_a_lecturer_detaches_their_classes() {
    let (_child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, "studentd-lecturer-detach");

    let lecturer = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "lecturers.create",
        json!({ "firstName": "Minh", "lastName": "Nguyen" }),
    );
    let lecturer_id = lecturer
        .get("lecturerId")
        .and_then(|v| v.as_i64())
        .expect("lecturerId");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "2",
        "subjects.create",
        json!({ "subjectCode": "CS101", "subjectName": "Intro", "credits": 4 }),
    );
    let class = request_ok(
        &mut stdin,
        &mut reader,
        "3",
        "classes.create",
        json!({ "subjectCode": "CS101", "lecturerId": lecturer_id, "semester": "S1", "year": 2024 }),
    );
    let class_id = class.get("classId").and_then(|v| v.as_i64()).expect("classId");

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "lecturers.delete",
        json!({ "id": lecturer_id }),
    );

    let got = request_ok(
        &mut stdin,
        &mut reader,
        "5",
        "classes.get",
        json!({ "id": class_id }),
    );
    let class = got.get("class").cloned().expect("class");
    assert!(class.get("lecturerId").map(|v| v.is_null()).unwrap_or(false));
    assert!(class
        .get("lecturerFirstName")
        .map(|v| v.is_null())
        .unwrap_or(false));
}
