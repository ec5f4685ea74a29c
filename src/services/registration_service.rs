use serde::Deserialize;
use sqlx::SqlitePool;
use thiserror::Error;
use tracing::{error, info, warn};

use crate::database::attendance_repo;
use crate::models::{AttendancePatch, AttendanceRow, AttendanceStatus, NewAttendance};
use crate::services::change_feed::{AttendanceChange, ChangeFeed};
use crate::services::email_service::EmailClient;

/// Fields posted by the public and admin registration forms.
#[derive(Debug, Deserialize, Default, Clone)]
pub struct RegistrationForm {
    pub status: Option<String>, // Member|Guest
    pub phone: Option<String>,
    pub full_name: Option<String>,
    pub branch: Option<String>,
    pub location: Option<String>,
    pub invited_by: Option<String>,
    /// Admin form only.
    pub email: Option<String>,
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    #[error("Please enter your full name")]
    MissingName,
    #[error("Please enter your phone number")]
    MissingPhone,
    #[error("Please select a branch")]
    MissingBranch,
    #[error("Unknown status '{0}'")]
    InvalidStatus(String),
    #[error("Phone number already registered!")]
    DuplicatePhone,
    #[error("Error checking registration")]
    DuplicateCheck(#[source] sqlx::Error),
    #[error("Something went wrong. Please try again.")]
    Database(#[from] sqlx::Error),
}

impl RegistrationError {
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            RegistrationError::MissingName
                | RegistrationError::MissingPhone
                | RegistrationError::MissingBranch
                | RegistrationError::InvalidStatus(_)
        )
    }
}

fn trimmed(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Local validation; no store access. Location is kept for both selectable
/// statuses, invited-by only for guests.
pub fn validate(form: &RegistrationForm) -> Result<NewAttendance, RegistrationError> {
    let status = match form.status.as_deref().map(str::trim) {
        None | Some("") => AttendanceStatus::Member,
        Some(raw) => match AttendanceStatus::parse(raw) {
            Some(s @ (AttendanceStatus::Member | AttendanceStatus::Guest)) => s,
            _ => return Err(RegistrationError::InvalidStatus(raw.to_string())),
        },
    };

    let full_name = trimmed(form.full_name.as_deref()).ok_or(RegistrationError::MissingName)?;
    let phone_number = trimmed(form.phone.as_deref()).ok_or(RegistrationError::MissingPhone)?;
    let branch = trimmed(form.branch.as_deref()).ok_or(RegistrationError::MissingBranch)?;

    let shows_location = matches!(status, AttendanceStatus::Member | AttendanceStatus::Guest);
    let shows_invited_by = status == AttendanceStatus::Guest;

    Ok(NewAttendance {
        full_name,
        phone_number,
        status,
        branch,
        location: if shows_location {
            trimmed(form.location.as_deref())
        } else {
            None
        },
        invited_by: if shows_invited_by {
            trimmed(form.invited_by.as_deref())
        } else {
            None
        },
        email: trimmed(form.email.as_deref()),
    })
}

/// Dashboard edit: every field is written back, as the edit dialog posts the
/// whole record. Legacy "First Timer" rows stay editable.
pub fn edit_patch(form: &RegistrationForm) -> Result<AttendancePatch, RegistrationError> {
    let status = match form.status.as_deref().map(str::trim) {
        None | Some("") => None,
        Some(raw) => Some(
            AttendanceStatus::parse(raw)
                .ok_or_else(|| RegistrationError::InvalidStatus(raw.to_string()))?,
        ),
    };

    Ok(AttendancePatch {
        full_name: Some(trimmed(form.full_name.as_deref()).ok_or(RegistrationError::MissingName)?),
        phone_number: Some(trimmed(form.phone.as_deref()).ok_or(RegistrationError::MissingPhone)?),
        status: status.map(|s| s.as_str().to_string()),
        branch: Some(trimmed(form.branch.as_deref()).ok_or(RegistrationError::MissingBranch)?),
        invited_by: Some(trimmed(form.invited_by.as_deref())),
        location: Some(trimmed(form.location.as_deref())),
    })
}

/// Public sign-up: validate, insert, announce.
pub async fn register_public(
    pool: &SqlitePool,
    changes: &ChangeFeed,
    form: &RegistrationForm,
) -> Result<AttendanceRow, RegistrationError> {
    let mut new = validate(form)?;
    // The public form does not collect email.
    new.email = None;

    let row = attendance_repo::insert(pool, &new).await.map_err(|e| {
        error!("Registration insert failed: {}", e);
        RegistrationError::Database(e)
    })?;

    info!(id = row.id, status = %row.status, "📝 Public registration stored");
    changes.publish(AttendanceChange::Inserted(row.clone()));
    Ok(row)
}

/// Admin manual entry: rejects a phone number that is already registered and
/// sends a confirmation email in the background when an address was given.
pub async fn register_admin(
    pool: &SqlitePool,
    changes: &ChangeFeed,
    email: &EmailClient,
    form: &RegistrationForm,
) -> Result<AttendanceRow, RegistrationError> {
    let new = validate(form)?;

    let exists = attendance_repo::exists_by_phone(pool, &new.phone_number)
        .await
        .map_err(|e| {
            error!("Duplicate phone check failed: {}", e);
            RegistrationError::DuplicateCheck(e)
        })?;
    if exists {
        warn!(phone = %new.phone_number, "Admin registration rejected, phone already registered");
        return Err(RegistrationError::DuplicatePhone);
    }

    let row = attendance_repo::insert(pool, &new).await.map_err(|e| {
        error!("Admin registration insert failed: {}", e);
        RegistrationError::Database(e)
    })?;

    if let Some(address) = row.email.clone() {
        email.spawn_confirmation(row.full_name.clone(), address);
    }

    info!(id = row.id, status = %row.status, "📝 Admin registration stored");
    changes.publish(AttendanceChange::Inserted(row.clone()));
    Ok(row)
}
