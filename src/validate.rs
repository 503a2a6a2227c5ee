use chrono::{Datelike, Local};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;

use crate::errors::{CoreError, ErrorKind};
use crate::queries::round2;

pub const GRADE_MIN: f64 = 0.0;
pub const GRADE_MAX: f64 = 10.0;

pub const YEAR_MIN: i64 = 1990;
pub const AGE_MIN: i64 = 15;
pub const AGE_MAX: i64 = 80;
pub const CAPACITY_MIN: i64 = 1;
pub const CAPACITY_MAX: i64 = 500;
pub const CAPACITY_DEFAULT: i64 = 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Gender {
    Male,
    Female,
    Other,
}

impl Gender {
    pub fn as_str(self) -> &'static str {
        match self {
            Gender::Male => "M",
            Gender::Female => "F",
            Gender::Other => "O",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Semester {
    S1,
    S2,
    S3,
    Summer,
}

impl Semester {
    pub fn as_str(self) -> &'static str {
        match self {
            Semester::S1 => "S1",
            Semester::S2 => "S2",
            Semester::S3 => "S3",
            Semester::Summer => "SUMMER",
        }
    }
}

/// Which table an email must be unique within. Student and lecturer emails
/// are independent namespaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmailScope {
    Students,
    Lecturers,
}

impl EmailScope {
    fn table(self) -> &'static str {
        match self {
            EmailScope::Students => "students",
            EmailScope::Lecturers => "lecturers",
        }
    }
}

#[derive(Debug, Clone)]
pub struct StudentRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub date_of_birth: String,
    pub gender: Gender,
    pub enrollment_year: i64,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub major: Option<String>,
}

#[derive(Debug, Clone)]
pub struct SubjectRecord {
    pub code: String,
    pub name: String,
    pub credits: i64,
}

#[derive(Debug, Clone)]
pub struct LecturerRecord {
    pub first_name: String,
    pub last_name: String,
    pub email: Option<String>,
    pub office: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ClassRecord {
    pub subject_code: String,
    pub lecturer_id: Option<i64>,
    pub class_name: Option<String>,
    pub semester: Semester,
    pub year: i64,
    pub max_capacity: i64,
}

#[derive(Debug, Clone)]
pub struct EnrollmentRecord {
    pub student_id: i64,
    pub class_id: i64,
    pub grade: Option<f64>,
    pub grade_letter: Option<String>,
    pub note: Option<String>,
}

/// Missing, null, and whitespace-only strings are all rejected. Non-string
/// scalars pass through stringified.
pub fn require_non_empty(raw: Option<&Value>, field: &str) -> Result<String, CoreError> {
    let Some(v) = raw else {
        return Err(CoreError::empty_field(field));
    };
    match v {
        Value::Null => Err(CoreError::empty_field(field)),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                Err(CoreError::empty_field(field))
            } else {
                Ok(t.to_string())
            }
        }
        other => Ok(other.to_string()),
    }
}

pub fn require_int(raw: Option<&Value>, field: &str) -> Result<i64, CoreError> {
    let Some(v) = raw else {
        return Err(CoreError::empty_field(field));
    };
    match v {
        Value::Null => Err(CoreError::empty_field(field)),
        Value::Number(_) => v
            .as_i64()
            .ok_or_else(|| CoreError::invalid_format(field, format!("{} must be an integer", field))),
        Value::String(s) => {
            let t = s.trim();
            if t.is_empty() {
                return Err(CoreError::empty_field(field));
            }
            t.parse::<i64>()
                .map_err(|_| CoreError::invalid_format(field, format!("{} must be an integer", field)))
        }
        _ => Err(CoreError::invalid_format(field, format!("{} must be an integer", field))),
    }
}

fn optional_int(raw: Option<&Value>, field: &str) -> Result<Option<i64>, CoreError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) if s.trim().is_empty() => Ok(None),
        some => require_int(some, field).map(Some),
    }
}

fn optional_text(raw: Option<&Value>) -> Option<String> {
    match raw {
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                None
            } else {
                Some(t.to_string())
            }
        }
        _ => None,
    }
}

fn is_word_char(c: char) -> bool {
    c.is_alphanumeric() || c == '_'
}

/// local@domain.tld: local and domain limited to word chars, dots and
/// dashes; everything after the last dot must be word chars.
fn email_shape_ok(email: &str) -> bool {
    let mut parts = email.splitn(2, '@');
    let local = parts.next().unwrap_or("");
    let Some(rest) = parts.next() else {
        return false;
    };
    if local.is_empty() || rest.contains('@') {
        return false;
    }
    if !local.chars().all(|c| is_word_char(c) || c == '.' || c == '-') {
        return false;
    }
    let Some(dot) = rest.rfind('.') else {
        return false;
    };
    let domain = &rest[..dot];
    let tld = &rest[dot + 1..];
    if domain.is_empty() || tld.is_empty() {
        return false;
    }
    if !domain.chars().all(|c| is_word_char(c) || c == '.' || c == '-') {
        return false;
    }
    tld.chars().all(is_word_char)
}

pub fn validate_email(
    conn: &Connection,
    email: &str,
    scope: EmailScope,
    exclude_id: Option<i64>,
) -> Result<String, CoreError> {
    let email = email.trim();
    if email.is_empty() {
        return Err(CoreError::empty_field("email"));
    }
    if !email_shape_ok(email) {
        return Err(CoreError::invalid_format("email", "invalid email format"));
    }

    let clash = match exclude_id {
        Some(id) => conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE email = ?1 AND id != ?2", scope.table()),
                params![email, id],
                |r| r.get::<_, i64>(0),
            )
            .optional()?,
        None => conn
            .query_row(
                &format!("SELECT 1 FROM {} WHERE email = ?1", scope.table()),
                params![email],
                |r| r.get::<_, i64>(0),
            )
            .optional()?,
    };
    if clash.is_some() {
        return Err(CoreError::duplicate_key(
            "email",
            format!("email '{}' is already registered", email),
        ));
    }
    Ok(email.to_string())
}

/// Age is computed from calendar years only; month and day are parsed for
/// format validity but do not shift it.
pub fn validate_date_of_birth(dob: &str) -> Result<String, CoreError> {
    let dob = dob.trim();
    if dob.is_empty() {
        return Err(CoreError::empty_field("dateOfBirth"));
    }
    let parsed = chrono::NaiveDate::parse_from_str(dob, "%Y-%m-%d")
        .map_err(|_| CoreError::invalid_format("dateOfBirth", "date of birth must be YYYY-MM-DD"))?;
    let age = Local::now().year() as i64 - parsed.year() as i64;
    if !(AGE_MIN..=AGE_MAX).contains(&age) {
        return Err(CoreError::out_of_range(
            "dateOfBirth",
            format!("age must be between {} and {} years", AGE_MIN, AGE_MAX),
        ));
    }
    Ok(dob.to_string())
}

pub fn validate_gender(value: &str) -> Result<Gender, CoreError> {
    if value.trim().is_empty() {
        return Err(CoreError::empty_field("gender"));
    }
    // Tokens are case-sensitive: "male" is not accepted.
    match value {
        "Male" | "M" => Ok(Gender::Male),
        "Female" | "F" => Ok(Gender::Female),
        "Other" | "O" => Ok(Gender::Other),
        _ => Err(CoreError::invalid_format(
            "gender",
            "gender must be Male, Female, or Other",
        )),
    }
}

pub fn validate_year(raw: Option<&Value>, field: &str) -> Result<i64, CoreError> {
    let year = require_int(raw, field)?;
    let max = Local::now().year() as i64 + 5;
    if year < YEAR_MIN || year > max {
        return Err(CoreError::out_of_range(
            field,
            format!("{} must be between {} and {}", field, YEAR_MIN, max),
        ));
    }
    Ok(year)
}

fn subject_code_shape_ok(code: &str) -> bool {
    let letters = code.chars().take_while(|c| c.is_ascii_uppercase()).count();
    if letters == 0 || letters == code.len() {
        return false;
    }
    code[letters..].chars().all(|c| c.is_ascii_digit())
}

pub fn validate_subject_code(
    conn: &Connection,
    code: &str,
    is_new: bool,
) -> Result<String, CoreError> {
    let code = code.trim().to_ascii_uppercase();
    if code.is_empty() {
        return Err(CoreError::empty_field("subjectCode"));
    }
    if !subject_code_shape_ok(&code) {
        return Err(CoreError::invalid_format(
            "subjectCode",
            "subject code must be letters followed by digits (e.g. CS101)",
        ));
    }
    if is_new {
        let exists = conn
            .query_row(
                "SELECT 1 FROM subjects WHERE code = ?1",
                params![code],
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(CoreError::duplicate_key(
                "subjectCode",
                format!("subject code '{}' already exists", code),
            ));
        }
    }
    Ok(code)
}

/// Grade is optional: absent, null, and blank all come back as None.
pub fn validate_grade(raw: Option<&Value>, min: f64, max: f64) -> Result<Option<f64>, CoreError> {
    let grade = match raw {
        None | Some(Value::Null) => return Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim();
            if t.is_empty() {
                return Ok(None);
            }
            t.parse::<f64>()
                .map_err(|_| CoreError::invalid_format("grade", "grade must be a number"))?
        }
        Some(v) => v
            .as_f64()
            .ok_or_else(|| CoreError::invalid_format("grade", "grade must be a number"))?,
    };
    if grade < min || grade > max {
        return Err(CoreError::out_of_range(
            "grade",
            format!("grade must be between {} and {}", min, max),
        ));
    }
    Ok(Some(round2(grade)))
}

pub fn validate_grade_letter(raw: Option<&Value>) -> Result<Option<String>, CoreError> {
    match raw {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => {
            let t = s.trim().to_ascii_uppercase();
            if t.is_empty() {
                return Ok(None);
            }
            match t.as_str() {
                "A" | "B" | "C" | "D" | "F" => Ok(Some(t)),
                _ => Err(CoreError::invalid_format(
                    "gradeLetter",
                    "grade letter must be one of A, B, C, D, F",
                )),
            }
        }
        Some(_) => Err(CoreError::invalid_format(
            "gradeLetter",
            "grade letter must be one of A, B, C, D, F",
        )),
    }
}

pub fn validate_semester(value: &str) -> Result<Semester, CoreError> {
    let t = value.trim().to_ascii_uppercase();
    if t.is_empty() {
        return Err(CoreError::empty_field("semester"));
    }
    match t.as_str() {
        "S1" => Ok(Semester::S1),
        "S2" => Ok(Semester::S2),
        "S3" => Ok(Semester::S3),
        "SUMMER" => Ok(Semester::Summer),
        _ => Err(CoreError::invalid_format(
            "semester",
            "semester must be one of S1, S2, S3, SUMMER",
        )),
    }
}

pub fn validate_capacity(raw: Option<&Value>) -> Result<i64, CoreError> {
    let capacity = match optional_int(raw, "maxCapacity")? {
        Some(v) => v,
        None => CAPACITY_DEFAULT,
    };
    if capacity < CAPACITY_MIN || capacity > CAPACITY_MAX {
        return Err(CoreError::out_of_range(
            "maxCapacity",
            format!(
                "maxCapacity must be between {} and {}",
                CAPACITY_MIN, CAPACITY_MAX
            ),
        ));
    }
    Ok(capacity)
}

/// Fail-fast order: first name, last name, email, date of birth, gender,
/// enrollment year. Address, phone and major pass through untouched.
pub fn validate_student_record(
    conn: &Connection,
    raw: &Value,
    exclude_id: Option<i64>,
) -> Result<StudentRecord, CoreError> {
    let first_name = require_non_empty(raw.get("firstName"), "firstName")?;
    let last_name = require_non_empty(raw.get("lastName"), "lastName")?;
    let email = require_non_empty(raw.get("email"), "email")?;
    let email = validate_email(conn, &email, EmailScope::Students, exclude_id)?;
    let dob = require_non_empty(raw.get("dateOfBirth"), "dateOfBirth")?;
    let date_of_birth = validate_date_of_birth(&dob)?;
    let gender_raw = require_non_empty(raw.get("gender"), "gender")?;
    let gender = validate_gender(&gender_raw)?;
    let enrollment_year = validate_year(raw.get("enrollmentYear"), "enrollmentYear")?;

    Ok(StudentRecord {
        first_name,
        last_name,
        email,
        date_of_birth,
        gender,
        enrollment_year,
        address: optional_text(raw.get("address")),
        phone: optional_text(raw.get("phone")),
        major: optional_text(raw.get("major")),
    })
}

pub fn validate_subject_record(
    conn: &Connection,
    raw: &Value,
    is_new: bool,
) -> Result<SubjectRecord, CoreError> {
    let code = require_non_empty(raw.get("subjectCode"), "subjectCode")?;
    let code = validate_subject_code(conn, &code, is_new)?;
    let name = require_non_empty(raw.get("subjectName"), "subjectName")?;
    let credits = require_int(raw.get("credits"), "credits")?;
    if !(1..=10).contains(&credits) {
        return Err(CoreError::out_of_range(
            "credits",
            "credits must be between 1 and 10",
        ));
    }
    Ok(SubjectRecord { code, name, credits })
}

pub fn validate_lecturer_record(
    conn: &Connection,
    raw: &Value,
    exclude_id: Option<i64>,
) -> Result<LecturerRecord, CoreError> {
    let first_name = require_non_empty(raw.get("firstName"), "firstName")?;
    let last_name = require_non_empty(raw.get("lastName"), "lastName")?;
    let email = match optional_text(raw.get("email")) {
        None => None,
        Some(e) => Some(validate_email(conn, &e, EmailScope::Lecturers, exclude_id)?),
    };
    Ok(LecturerRecord {
        first_name,
        last_name,
        email,
        office: optional_text(raw.get("office")),
    })
}

pub fn validate_class_record(raw: &Value) -> Result<ClassRecord, CoreError> {
    let subject_code = require_non_empty(raw.get("subjectCode"), "subjectCode")?;
    let subject_code = subject_code.to_ascii_uppercase();
    let lecturer_id = optional_int(raw.get("lecturerId"), "lecturerId")?;
    let semester_raw = require_non_empty(raw.get("semester"), "semester")?;
    let semester = validate_semester(&semester_raw)?;
    let year = validate_year(raw.get("year"), "year")?;
    let max_capacity = validate_capacity(raw.get("maxCapacity"))?;
    Ok(ClassRecord {
        subject_code,
        lecturer_id,
        class_name: optional_text(raw.get("className")),
        semester,
        year,
        max_capacity,
    })
}

pub fn validate_enrollment_record(
    conn: &Connection,
    raw: &Value,
    is_new: bool,
) -> Result<EnrollmentRecord, CoreError> {
    let student_id = require_int(raw.get("studentId"), "studentId")?;
    let class_id = require_int(raw.get("classId"), "classId")?;
    let grade = validate_grade(raw.get("grade"), GRADE_MIN, GRADE_MAX)?;
    let grade_letter = validate_grade_letter(raw.get("gradeLetter"))?;
    let note = optional_text(raw.get("note"));

    if is_new {
        let exists = conn
            .query_row(
                "SELECT 1 FROM enrollments WHERE student_id = ?1 AND class_id = ?2",
                params![student_id, class_id],
                |r| r.get::<_, i64>(0),
            )
            .optional()?;
        if exists.is_some() {
            return Err(CoreError::new(
                ErrorKind::DuplicateKey,
                "student is already enrolled in this class",
            ));
        }
    }

    Ok(EnrollmentRecord {
        student_id,
        class_id,
        grade,
        grade_letter,
        note,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn email_shape_accepts_plain_addresses() {
        assert!(email_shape_ok("alice@example.com"));
        assert!(email_shape_ok("a.b-c_d@mail.example.co"));
        assert!(email_shape_ok("x@y.z"));
    }

    #[test]
    fn email_shape_rejects_malformed_addresses() {
        assert!(!email_shape_ok("alice"));
        assert!(!email_shape_ok("alice@"));
        assert!(!email_shape_ok("@example.com"));
        assert!(!email_shape_ok("alice@example"));
        assert!(!email_shape_ok("alice@.com"));
        assert!(!email_shape_ok("alice@example.c-m"));
        assert!(!email_shape_ok("a b@example.com"));
        assert!(!email_shape_ok("a@b@example.com"));
    }

    #[test]
    fn subject_code_shape_requires_letters_then_digits() {
        assert!(subject_code_shape_ok("CS101"));
        assert!(subject_code_shape_ok("MATH2"));
        assert!(!subject_code_shape_ok("CS"));
        assert!(!subject_code_shape_ok("101"));
        assert!(!subject_code_shape_ok("CS101A"));
        assert!(!subject_code_shape_ok("CS-101"));
    }

    #[test]
    fn grade_is_optional_and_rounds_to_two_decimals() {
        assert_eq!(validate_grade(None, GRADE_MIN, GRADE_MAX).unwrap(), None);
        assert_eq!(
            validate_grade(Some(&Value::Null), GRADE_MIN, GRADE_MAX).unwrap(),
            None
        );
        assert_eq!(
            validate_grade(Some(&json!("  ")), GRADE_MIN, GRADE_MAX).unwrap(),
            None
        );
        assert_eq!(
            validate_grade(Some(&json!(7.123)), GRADE_MIN, GRADE_MAX).unwrap(),
            Some(7.12)
        );
        assert_eq!(
            validate_grade(Some(&json!("8.4")), GRADE_MIN, GRADE_MAX).unwrap(),
            Some(8.4)
        );
    }

    #[test]
    fn grade_out_of_range_and_non_numeric_fail() {
        let over = validate_grade(Some(&json!(10.001)), GRADE_MIN, GRADE_MAX).unwrap_err();
        assert_eq!(over.kind, ErrorKind::OutOfRange);
        let under = validate_grade(Some(&json!(-0.01)), GRADE_MIN, GRADE_MAX).unwrap_err();
        assert_eq!(under.kind, ErrorKind::OutOfRange);
        let text = validate_grade(Some(&json!("ten")), GRADE_MIN, GRADE_MAX).unwrap_err();
        assert_eq!(text.kind, ErrorKind::InvalidFormat);
    }

    #[test]
    fn gender_tokens_are_case_sensitive() {
        assert_eq!(validate_gender("Male").unwrap(), Gender::Male);
        assert_eq!(validate_gender("F").unwrap(), Gender::Female);
        assert_eq!(validate_gender("Other").unwrap(), Gender::Other);
        assert_eq!(
            validate_gender("male").unwrap_err().kind,
            ErrorKind::InvalidFormat
        );
        assert_eq!(
            validate_gender("  ").unwrap_err().kind,
            ErrorKind::EmptyField
        );
    }

    #[test]
    fn dob_age_window_follows_the_current_year() {
        let this_year = Local::now().year();
        let ok = format!("{}-06-15", this_year - 20);
        assert_eq!(validate_date_of_birth(&ok).unwrap(), ok);

        let too_young = format!("{}-06-15", this_year - 10);
        assert_eq!(
            validate_date_of_birth(&too_young).unwrap_err().kind,
            ErrorKind::OutOfRange
        );
        let too_old = format!("{}-06-15", this_year - 90);
        assert_eq!(
            validate_date_of_birth(&too_old).unwrap_err().kind,
            ErrorKind::OutOfRange
        );
        assert_eq!(
            validate_date_of_birth("15/06/2000").unwrap_err().kind,
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn year_window_is_1990_to_five_years_ahead() {
        let max = Local::now().year() as i64 + 5;
        assert_eq!(validate_year(Some(&json!(2001)), "year").unwrap(), 2001);
        assert_eq!(validate_year(Some(&json!(max)), "year").unwrap(), max);
        assert_eq!(
            validate_year(Some(&json!(1989)), "year").unwrap_err().kind,
            ErrorKind::OutOfRange
        );
        assert_eq!(
            validate_year(Some(&json!(max + 1)), "year").unwrap_err().kind,
            ErrorKind::OutOfRange
        );
        assert_eq!(
            validate_year(Some(&json!("soon")), "year").unwrap_err().kind,
            ErrorKind::InvalidFormat
        );
        assert_eq!(validate_year(None, "year").unwrap_err().kind, ErrorKind::EmptyField);
    }

    #[test]
    fn semester_normalizes_case_and_whitespace() {
        assert_eq!(validate_semester(" s1 ").unwrap(), Semester::S1);
        assert_eq!(validate_semester("summer").unwrap(), Semester::Summer);
        assert_eq!(
            validate_semester("S4").unwrap_err().kind,
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn grade_letter_normalizes_or_rejects() {
        assert_eq!(validate_grade_letter(None).unwrap(), None);
        assert_eq!(validate_grade_letter(Some(&json!(""))).unwrap(), None);
        assert_eq!(
            validate_grade_letter(Some(&json!("b"))).unwrap(),
            Some("B".to_string())
        );
        assert_eq!(
            validate_grade_letter(Some(&json!("E"))).unwrap_err().kind,
            ErrorKind::InvalidFormat
        );
    }

    #[test]
    fn capacity_defaults_and_bounds() {
        assert_eq!(validate_capacity(None).unwrap(), CAPACITY_DEFAULT);
        assert_eq!(validate_capacity(Some(&json!(120))).unwrap(), 120);
        assert_eq!(
            validate_capacity(Some(&json!(0))).unwrap_err().kind,
            ErrorKind::OutOfRange
        );
        assert_eq!(
            validate_capacity(Some(&json!(501))).unwrap_err().kind,
            ErrorKind::OutOfRange
        );
    }

    #[test]
    fn require_non_empty_trims_and_rejects_blank() {
        assert_eq!(
            require_non_empty(Some(&json!("  Ada ")), "firstName").unwrap(),
            "Ada"
        );
        assert_eq!(
            require_non_empty(Some(&json!("   ")), "firstName")
                .unwrap_err()
                .kind,
            ErrorKind::EmptyField
        );
        assert_eq!(
            require_non_empty(None, "firstName").unwrap_err().kind,
            ErrorKind::EmptyField
        );
    }
}
