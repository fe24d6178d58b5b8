#![allow(dead_code)]

use marks_core::{RosterRepository, SqliteRosterRepository, StudentId, SubjectId};
use rusqlite::Connection;

pub struct Roster {
    pub subject_id: SubjectId,
    pub other_subject_id: SubjectId,
    pub students: Vec<StudentId>,
}

/// Seeds two subjects and `student_count` students with roll numbers
/// `R001`, `R002`, ...
pub fn seed_roster(conn: &Connection, student_count: usize) -> Roster {
    let roster = SqliteRosterRepository::new(conn);
    let subject_id = roster.create_subject("Mathematics").unwrap();
    let other_subject_id = roster.create_subject("Physics").unwrap();
    let students = (1..=student_count)
        .map(|n| {
            roster
                .create_student(&format!("R{n:03}"), &format!("Student {n}"), None)
                .unwrap()
        })
        .collect();
    Roster {
        subject_id,
        other_subject_id,
        students,
    }
}

pub fn count_marks(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM marks;", [], |row| row.get(0))
        .unwrap()
}

/// Largest number of rows sharing one triple; 1 means the uniqueness
/// invariant holds (0 for an empty table).
pub fn max_rows_per_triple(conn: &Connection) -> i64 {
    conn.query_row(
        "SELECT COALESCE(MAX(n), 0) FROM (
            SELECT COUNT(*) AS n
            FROM marks
            GROUP BY student_id, subject_id, exam_type
        );",
        [],
        |row| row.get(0),
    )
    .unwrap()
}
