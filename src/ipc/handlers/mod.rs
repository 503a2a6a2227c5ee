pub mod classes;
pub mod core;
pub mod enrollments;
pub mod lecturers;
pub mod reports;
pub mod students;
pub mod subjects;
