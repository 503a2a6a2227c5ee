use rusqlite::{params, params_from_iter, types::Value as SqlValue, Connection};
use serde::Serialize;
use serde_json::Value;
use std::cmp::Ordering;

use crate::errors::CoreError;

/// Two-decimal rounding, applied at the point of return and never before
/// aggregation.
pub fn round2(x: f64) -> f64 {
    (x * 100.0).round() / 100.0
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectGradeRow {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub subject_code: String,
    pub subject_name: String,
    pub class_id: i64,
    pub class_name: Option<String>,
    pub semester: String,
    pub year: i64,
    pub grade: Option<f64>,
    pub grade_letter: Option<String>,
}

/// One row per (student, enrollment, class, subject) tuple; students with no
/// enrollment do not appear.
pub fn grades_by_subject(
    conn: &Connection,
    subject_code: Option<&str>,
) -> Result<Vec<SubjectGradeRow>, CoreError> {
    let mut sql = String::from(
        "SELECT s.id, s.first_name, s.last_name,
                sub.code, sub.name,
                c.id, c.class_name, c.semester, c.year,
                e.grade, e.grade_letter
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         JOIN classes c ON c.id = e.class_id
         JOIN subjects sub ON sub.code = c.subject_code",
    );
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(code) = subject_code {
        sql.push_str(" WHERE sub.code = ?");
        values.push(SqlValue::Text(code.to_string()));
    }
    sql.push_str(" ORDER BY sub.name, s.last_name, s.first_name");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |r| {
            Ok(SubjectGradeRow {
                student_id: r.get(0)?,
                first_name: r.get(1)?,
                last_name: r.get(2)?,
                subject_code: r.get(3)?,
                subject_name: r.get(4)?,
                class_id: r.get(5)?,
                class_name: r.get(6)?,
                semester: r.get(7)?,
                year: r.get(8)?,
                grade: r.get(9)?,
                grade_letter: r.get(10)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StudentGradeRow {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub major: Option<String>,
    pub class_id: Option<i64>,
    pub class_name: Option<String>,
    pub semester: Option<String>,
    pub year: Option<i64>,
    pub grade: Option<f64>,
    pub grade_letter: Option<String>,
    pub total_enrollments: i64,
}

/// Every student appears at least once; totalEnrollments is the same
/// per-student count on each of that student's rows.
pub fn all_students_with_grades(conn: &Connection) -> Result<Vec<StudentGradeRow>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.first_name, s.last_name, s.email, s.major,
                c.id, c.class_name, c.semester, c.year,
                e.grade, e.grade_letter,
                COUNT(e.class_id) OVER (PARTITION BY s.id)
         FROM students s
         LEFT JOIN enrollments e ON e.student_id = s.id
         LEFT JOIN classes c ON c.id = e.class_id
         ORDER BY s.id, c.year DESC, c.semester",
    )?;
    let rows = stmt
        .query_map([], |r| {
            Ok(StudentGradeRow {
                student_id: r.get(0)?,
                first_name: r.get(1)?,
                last_name: r.get(2)?,
                email: r.get(3)?,
                major: r.get(4)?,
                class_id: r.get(5)?,
                class_name: r.get(6)?,
                semester: r.get(7)?,
                year: r.get(8)?,
                grade: r.get(9)?,
                grade_letter: r.get(10)?,
                total_enrollments: r.get(11)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

#[derive(Debug, Clone, Default)]
pub struct EnrollmentInfoFilters {
    pub student_id: Option<i64>,
    pub subject_code: Option<String>,
    pub lecturer_id: Option<i64>,
    pub semester: Option<String>,
    pub year: Option<i64>,
}

fn filter_int(raw: Option<&Value>, field: &str) -> Result<Option<i64>, CoreError> {
    match raw {
        None => Ok(None),
        Some(v) if v.is_null() => Ok(None),
        Some(v) => match v.as_i64() {
            Some(n) => Ok(Some(n)),
            None => Err(CoreError::invalid_format(
                field,
                format!("{} must be an integer", field),
            )),
        },
    }
}

fn filter_text(raw: Option<&Value>) -> Option<String> {
    match raw {
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() || t.eq_ignore_ascii_case("ALL") {
                None
            } else {
                Some(t.to_string())
            }
        }
        _ => None,
    }
}

pub fn parse_enrollment_filters(raw: Option<&Value>) -> Result<EnrollmentInfoFilters, CoreError> {
    let Some(raw) = raw else {
        return Ok(EnrollmentInfoFilters::default());
    };
    if raw.is_null() {
        return Ok(EnrollmentInfoFilters::default());
    }
    let Some(obj) = raw.as_object() else {
        return Err(CoreError::invalid_format("filters", "filters must be an object"));
    };

    Ok(EnrollmentInfoFilters {
        student_id: filter_int(obj.get("studentId"), "filters.studentId")?,
        subject_code: filter_text(obj.get("subjectCode")).map(|s| s.to_ascii_uppercase()),
        lecturer_id: filter_int(obj.get("lecturerId"), "filters.lecturerId")?,
        semester: filter_text(obj.get("semester")).map(|s| s.to_ascii_uppercase()),
        year: filter_int(obj.get("year"), "filters.year")?,
    })
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EnrollmentInfoRow {
    pub student_id: i64,
    pub student_first_name: String,
    pub student_last_name: String,
    pub student_email: String,
    pub major: Option<String>,
    pub subject_code: String,
    pub subject_name: String,
    pub credits: i64,
    pub class_id: i64,
    pub class_name: Option<String>,
    pub semester: String,
    pub year: i64,
    pub lecturer_id: Option<i64>,
    pub lecturer_first_name: Option<String>,
    pub lecturer_last_name: Option<String>,
    pub lecturer_name: Option<String>,
    pub office: Option<String>,
    pub grade: Option<f64>,
    pub grade_letter: Option<String>,
    pub note: Option<String>,
}

/// Five-way join. The lecturer join is outer: classes without a lecturer
/// keep their rows with null lecturer fields. Supplied filters are ANDed;
/// absent ones impose no constraint.
pub fn complete_enrollment_info(
    conn: &Connection,
    filters: &EnrollmentInfoFilters,
) -> Result<Vec<EnrollmentInfoRow>, CoreError> {
    let mut sql = String::from(
        "SELECT s.id, s.first_name, s.last_name, s.email, s.major,
                sub.code, sub.name, sub.credits,
                c.id, c.class_name, c.semester, c.year,
                l.id, l.first_name, l.last_name,
                l.first_name || ' ' || l.last_name,
                l.office,
                e.grade, e.grade_letter, e.note
         FROM enrollments e
         JOIN students s ON s.id = e.student_id
         JOIN classes c ON c.id = e.class_id
         JOIN subjects sub ON sub.code = c.subject_code
         LEFT JOIN lecturers l ON l.id = c.lecturer_id
         WHERE 1=1",
    );
    let mut values: Vec<SqlValue> = Vec::new();
    if let Some(id) = filters.student_id {
        sql.push_str(" AND s.id = ?");
        values.push(SqlValue::Integer(id));
    }
    if let Some(code) = &filters.subject_code {
        sql.push_str(" AND sub.code = ?");
        values.push(SqlValue::Text(code.clone()));
    }
    if let Some(id) = filters.lecturer_id {
        sql.push_str(" AND l.id = ?");
        values.push(SqlValue::Integer(id));
    }
    if let Some(sem) = &filters.semester {
        sql.push_str(" AND c.semester = ?");
        values.push(SqlValue::Text(sem.clone()));
    }
    if let Some(year) = filters.year {
        sql.push_str(" AND c.year = ?");
        values.push(SqlValue::Integer(year));
    }
    sql.push_str(" ORDER BY c.year DESC, c.semester, sub.name, s.last_name");

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map(params_from_iter(values), |r| {
            Ok(EnrollmentInfoRow {
                student_id: r.get(0)?,
                student_first_name: r.get(1)?,
                student_last_name: r.get(2)?,
                student_email: r.get(3)?,
                major: r.get(4)?,
                subject_code: r.get(5)?,
                subject_name: r.get(6)?,
                credits: r.get(7)?,
                class_id: r.get(8)?,
                class_name: r.get(9)?,
                semester: r.get(10)?,
                year: r.get(11)?,
                lecturer_id: r.get(12)?,
                lecturer_first_name: r.get(13)?,
                lecturer_last_name: r.get(14)?,
                lecturer_name: r.get(15)?,
                office: r.get(16)?,
                grade: r.get(17)?,
                grade_letter: r.get(18)?,
                note: r.get(19)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AboveAverageRow {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub major: Option<String>,
    pub average: f64,
    pub global_average: f64,
    pub graded_count: i64,
    pub difference: f64,
}

/// Two-phase aggregate. Phase one computes the global average over every
/// non-null grade; phase two keeps students with at least `min_classes`
/// graded enrollments whose unrounded personal average strictly exceeds the
/// rounded global average. An ungraded database yields an empty result.
pub fn students_above_average(
    conn: &Connection,
    min_classes: i64,
) -> Result<Vec<AboveAverageRow>, CoreError> {
    let global_raw: Option<f64> = conn.query_row(
        "SELECT AVG(grade) FROM enrollments WHERE grade IS NOT NULL",
        [],
        |r| r.get(0),
    )?;
    let Some(global_raw) = global_raw else {
        return Ok(Vec::new());
    };
    let benchmark = round2(global_raw);

    let mut stmt = conn.prepare(
        "SELECT s.id, s.first_name, s.last_name, s.email, s.major,
                AVG(e.grade), COUNT(e.grade)
         FROM students s
         JOIN enrollments e ON e.student_id = s.id
         WHERE e.grade IS NOT NULL
         GROUP BY s.id
         HAVING COUNT(e.grade) >= ?1 AND AVG(e.grade) > ?2",
    )?;
    let mut rows = stmt
        .query_map(params![min_classes, benchmark], |r| {
            let raw_avg: f64 = r.get(5)?;
            Ok(AboveAverageRow {
                student_id: r.get(0)?,
                first_name: r.get(1)?,
                last_name: r.get(2)?,
                email: r.get(3)?,
                major: r.get(4)?,
                average: round2(raw_avg),
                global_average: benchmark,
                graded_count: r.get(6)?,
                difference: round2(raw_avg - benchmark),
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    rows.sort_by(|a, b| {
        b.average
            .partial_cmp(&a.average)
            .unwrap_or(Ordering::Equal)
            .then(b.graded_count.cmp(&a.graded_count))
    });
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TopStudentRow {
    pub student_id: i64,
    pub first_name: String,
    pub last_name: String,
    pub average: f64,
    pub graded_count: i64,
    pub min_grade: f64,
    pub max_grade: f64,
}

pub fn top_students(
    conn: &Connection,
    limit: i64,
    min_classes: i64,
) -> Result<Vec<TopStudentRow>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT s.id, s.first_name, s.last_name,
                AVG(e.grade), COUNT(e.grade), MIN(e.grade), MAX(e.grade)
         FROM students s
         JOIN enrollments e ON e.student_id = s.id
         WHERE e.grade IS NOT NULL
         GROUP BY s.id
         HAVING COUNT(e.grade) >= ?1
         ORDER BY AVG(e.grade) DESC, COUNT(e.grade) DESC
         LIMIT ?2",
    )?;
    let mut rows = stmt
        .query_map(params![min_classes, limit], |r| {
            let raw_avg: f64 = r.get(3)?;
            Ok(TopStudentRow {
                student_id: r.get(0)?,
                first_name: r.get(1)?,
                last_name: r.get(2)?,
                average: round2(raw_avg),
                graded_count: r.get(4)?,
                min_grade: r.get(5)?,
                max_grade: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    rows.sort_by(|a, b| {
        b.average
            .partial_cmp(&a.average)
            .unwrap_or(Ordering::Equal)
            .then(b.graded_count.cmp(&a.graded_count))
    });
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DashboardKpis {
    pub total_students: i64,
    pub total_subjects: i64,
    pub total_classes: i64,
    pub total_enrollments: i64,
    pub average_grade: Option<f64>,
    pub pass_rate: Option<f64>,
}

/// Single snapshot record. averageGrade and passRate are null, not zero,
/// when no graded enrollment exists.
pub fn dashboard_kpis(conn: &Connection) -> Result<DashboardKpis, CoreError> {
    let kpis = conn.query_row(
        "SELECT
            (SELECT COUNT(*) FROM students),
            (SELECT COUNT(*) FROM subjects),
            (SELECT COUNT(*) FROM classes),
            (SELECT COUNT(*) FROM enrollments),
            (SELECT AVG(grade) FROM enrollments WHERE grade IS NOT NULL),
            (SELECT 100.0 * COUNT(CASE WHEN grade >= 5 THEN 1 END) / COUNT(*)
             FROM enrollments WHERE grade IS NOT NULL)",
        [],
        |r| {
            Ok(DashboardKpis {
                total_students: r.get(0)?,
                total_subjects: r.get(1)?,
                total_classes: r.get(2)?,
                total_enrollments: r.get(3)?,
                average_grade: r.get::<_, Option<f64>>(4)?.map(round2),
                pass_rate: r.get::<_, Option<f64>>(5)?.map(round2),
            })
        },
    )?;
    Ok(kpis)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GradeBucketing {
    Ranges,
    Letters,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeBucketRow {
    pub grade_range: String,
    pub count: i64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub average_in_range: Option<f64>,
}

/// Buckets every non-null grade; empty buckets produce no row. `Ranges` is
/// the chart scheme [0,5), [5,7), [7,8.5), [8.5,10]; `Letters` maps whole
/// grades to A through F and carries each bucket's average.
pub fn grade_distribution(
    conn: &Connection,
    bucketing: GradeBucketing,
) -> Result<Vec<GradeBucketRow>, CoreError> {
    match bucketing {
        GradeBucketing::Ranges => {
            let mut stmt = conn.prepare(
                "SELECT CASE
                        WHEN grade < 5 THEN '0 - 5'
                        WHEN grade < 7 THEN '5 - 7'
                        WHEN grade < 8.5 THEN '7 - 8.5'
                        ELSE '8.5 - 10'
                    END AS grade_range,
                    COUNT(*)
                 FROM enrollments
                 WHERE grade IS NOT NULL
                 GROUP BY grade_range
                 ORDER BY grade_range",
            )?;
            let rows = stmt
                .query_map([], |r| {
                    Ok(GradeBucketRow {
                        grade_range: r.get(0)?,
                        count: r.get(1)?,
                        average_in_range: None,
                    })
                })
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
            Ok(rows)
        }
        GradeBucketing::Letters => {
            let mut stmt = conn.prepare(
                "SELECT CASE
                        WHEN grade >= 9 THEN 'A (9-10)'
                        WHEN grade >= 8 THEN 'B (8-9)'
                        WHEN grade >= 7 THEN 'C (7-8)'
                        WHEN grade >= 6 THEN 'D (6-7)'
                        WHEN grade >= 5 THEN 'E (5-6)'
                        ELSE 'F (0-5)'
                    END AS grade_range,
                    COUNT(*), AVG(grade)
                 FROM enrollments
                 WHERE grade IS NOT NULL
                 GROUP BY grade_range
                 ORDER BY CASE grade_range
                        WHEN 'A (9-10)' THEN 1
                        WHEN 'B (8-9)' THEN 2
                        WHEN 'C (7-8)' THEN 3
                        WHEN 'D (6-7)' THEN 4
                        WHEN 'E (5-6)' THEN 5
                        ELSE 6
                    END",
            )?;
            let rows = stmt
                .query_map([], |r| {
                    let avg: f64 = r.get(2)?;
                    Ok(GradeBucketRow {
                        grade_range: r.get(0)?,
                        count: r.get(1)?,
                        average_in_range: Some(round2(avg)),
                    })
                })
                .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
            Ok(rows)
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubjectPerformanceRow {
    pub subject_code: String,
    pub subject_name: String,
    pub credits: i64,
    pub total_students: i64,
    pub average_grade: f64,
    pub min_grade: f64,
    pub max_grade: f64,
    pub pass_count: i64,
    pub fail_count: i64,
}

/// Per-subject grade statistics over graded enrollments only; subjects with
/// no graded enrollment do not appear.
pub fn subject_performance(conn: &Connection) -> Result<Vec<SubjectPerformanceRow>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT sub.code, sub.name, sub.credits,
                COUNT(DISTINCT e.student_id),
                AVG(e.grade), MIN(e.grade), MAX(e.grade),
                COUNT(CASE WHEN e.grade >= 5 THEN 1 END),
                COUNT(CASE WHEN e.grade < 5 THEN 1 END)
         FROM subjects sub
         JOIN classes c ON c.subject_code = sub.code
         JOIN enrollments e ON e.class_id = c.id
         WHERE e.grade IS NOT NULL
         GROUP BY sub.code
         ORDER BY AVG(e.grade) DESC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let raw_avg: f64 = r.get(4)?;
            Ok(SubjectPerformanceRow {
                subject_code: r.get(0)?,
                subject_name: r.get(1)?,
                credits: r.get(2)?,
                total_students: r.get(3)?,
                average_grade: round2(raw_avg),
                min_grade: r.get(5)?,
                max_grade: r.get(6)?,
                pass_count: r.get(7)?,
                fail_count: r.get(8)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LecturerPerformanceRow {
    pub lecturer_id: i64,
    pub lecturer_name: String,
    pub office: Option<String>,
    pub total_classes: i64,
    pub total_students: i64,
    pub average_grade: f64,
    pub excellent_count: i64,
}

pub fn lecturer_performance(conn: &Connection) -> Result<Vec<LecturerPerformanceRow>, CoreError> {
    let mut stmt = conn.prepare(
        "SELECT l.id, l.first_name || ' ' || l.last_name, l.office,
                COUNT(DISTINCT c.id),
                COUNT(DISTINCT e.student_id),
                AVG(e.grade),
                COUNT(CASE WHEN e.grade >= 8 THEN 1 END)
         FROM lecturers l
         JOIN classes c ON c.lecturer_id = l.id
         JOIN enrollments e ON e.class_id = c.id
         WHERE e.grade IS NOT NULL
         GROUP BY l.id
         ORDER BY AVG(e.grade) DESC",
    )?;
    let rows = stmt
        .query_map([], |r| {
            let raw_avg: f64 = r.get(5)?;
            Ok(LecturerPerformanceRow {
                lecturer_id: r.get(0)?,
                lecturer_name: r.get(1)?,
                office: r.get(2)?,
                total_classes: r.get(3)?,
                total_students: r.get(4)?,
                average_grade: round2(raw_avg),
                excellent_count: r.get(6)?,
            })
        })
        .and_then(|it| it.collect::<Result<Vec<_>, _>>())?;
    Ok(rows)
}
