use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct AttendanceRow {
    pub id: i64,
    pub created_at: String,
    pub full_name: String,
    pub phone_number: String,
    pub status: String,
    pub branch: String,
    pub invited_by: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
}

impl AttendanceRow {
    /// CSS modifier for the status badge, e.g. "First Timer" -> "first-timer".
    pub fn badge_class(&self) -> String {
        self.status.to_lowercase().replace(' ', "-")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Member,
    Guest,
    FirstTimer,
}

impl AttendanceStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            AttendanceStatus::Member => "Member",
            AttendanceStatus::Guest => "Guest",
            AttendanceStatus::FirstTimer => "First Timer",
        }
    }

    pub fn parse(input: &str) -> Option<Self> {
        match input.trim() {
            "Member" => Some(AttendanceStatus::Member),
            "Guest" => Some(AttendanceStatus::Guest),
            "First Timer" => Some(AttendanceStatus::FirstTimer),
            _ => None,
        }
    }

    /// Members count on their own; Guest and First Timer share the guest bucket.
    pub fn is_guest_class(self) -> bool {
        !matches!(self, AttendanceStatus::Member)
    }
}

/// Columns written by a registration. `id` and `created_at` come from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewAttendance {
    pub full_name: String,
    pub phone_number: String,
    pub status: AttendanceStatus,
    pub branch: String,
    pub invited_by: Option<String>,
    pub location: Option<String>,
    pub email: Option<String>,
}

/// Partial update. `None` leaves the column untouched; for nullable columns
/// `Some(None)` clears it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttendancePatch {
    pub full_name: Option<String>,
    pub phone_number: Option<String>,
    pub status: Option<String>,
    pub branch: Option<String>,
    pub invited_by: Option<Option<String>>,
    pub location: Option<Option<String>>,
}

impl AttendancePatch {
    pub fn is_empty(&self) -> bool {
        self.full_name.is_none()
            && self.phone_number.is_none()
            && self.status.is_none()
            && self.branch.is_none()
            && self.invited_by.is_none()
            && self.location.is_none()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AttendanceStats {
    pub total: i64,
    pub members: i64,
    pub guests: i64,
}
