pub mod attendance;
pub mod branches;
pub mod daily_count;

pub use attendance::{
    AttendancePatch, AttendanceRow, AttendanceStats, AttendanceStatus, NewAttendance,
};
pub use branches::BranchRow;
pub use daily_count::DailyCountRow;
