use crate::model::{AttendanceRecord, AttendanceStats, AttendanceStatus};

/// A student whose present-rate across all recorded days falls below this
/// fraction is flagged at risk.
pub const RISK_THRESHOLD: f64 = 0.75;

/// Per-student counts across the whole attendance log. A record without an
/// entry for the student contributes nothing; order of the log is
/// irrelevant.
pub fn compute_stats(student_id: &str, attendance: &[AttendanceRecord]) -> AttendanceStats {
    let mut stats = AttendanceStats::default();
    for record in attendance {
        let Some(entry) = record.records.iter().find(|e| e.student_id == student_id) else {
            continue;
        };
        stats.total += 1;
        match entry.status {
            AttendanceStatus::Present => stats.present += 1,
            AttendanceStatus::Absent => stats.absent += 1,
            AttendanceStatus::Justified => stats.justified += 1,
        }
    }
    stats
}

/// No recorded days is not risk.
pub fn is_at_risk(stats: &AttendanceStats) -> bool {
    if stats.total == 0 {
        return false;
    }
    (stats.present as f64) / (stats.total as f64) < RISK_THRESHOLD
}

/// Raw entry counts across every record for the class. Unlike the
/// per-student aggregation this is roster-independent: entries for students
/// no longer on the roster still count.
pub fn class_stats(class_id: &str, attendance: &[AttendanceRecord]) -> AttendanceStats {
    let mut stats = AttendanceStats::default();
    for record in attendance.iter().filter(|r| r.class_id == class_id) {
        for entry in &record.records {
            stats.total += 1;
            match entry.status {
                AttendanceStatus::Present => stats.present += 1,
                AttendanceStatus::Absent => stats.absent += 1,
                AttendanceStatus::Justified => stats.justified += 1,
            }
        }
    }
    stats
}
