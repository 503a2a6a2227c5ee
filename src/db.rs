use rusqlite::Connection;
use std::path::Path;

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join("students.db");
    let conn = Connection::open(db_path)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS students(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            date_of_birth TEXT NOT NULL,
            gender TEXT NOT NULL CHECK(gender IN ('M','F','O')),
            address TEXT,
            phone TEXT,
            email TEXT NOT NULL UNIQUE,
            enrollment_year INTEGER NOT NULL,
            major TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS subjects(
            code TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            credits INTEGER NOT NULL CHECK(credits BETWEEN 1 AND 10)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS lecturers(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            first_name TEXT NOT NULL,
            last_name TEXT NOT NULL,
            email TEXT UNIQUE,
            office TEXT
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS classes(
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            subject_code TEXT NOT NULL,
            lecturer_id INTEGER,
            class_name TEXT,
            semester TEXT NOT NULL CHECK(semester IN ('S1','S2','S3','SUMMER')),
            year INTEGER NOT NULL,
            max_capacity INTEGER NOT NULL DEFAULT 60,
            FOREIGN KEY(subject_code) REFERENCES subjects(code),
            FOREIGN KEY(lecturer_id) REFERENCES lecturers(id) ON DELETE SET NULL
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_subject ON classes(subject_code)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_classes_lecturer ON classes(lecturer_id)",
        [],
    )?;

    // Composite key: one enrollment per (student, class).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS enrollments(
            student_id INTEGER NOT NULL,
            class_id INTEGER NOT NULL,
            grade REAL CHECK(grade IS NULL OR (grade >= 0 AND grade <= 10)),
            grade_letter TEXT CHECK(grade_letter IS NULL OR grade_letter IN ('A','B','C','D','F')),
            note TEXT,
            PRIMARY KEY(student_id, class_id),
            FOREIGN KEY(student_id) REFERENCES students(id) ON DELETE CASCADE,
            FOREIGN KEY(class_id) REFERENCES classes(id) ON DELETE CASCADE
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_enrollments_class ON enrollments(class_id)",
        [],
    )?;

    Ok(conn)
}
