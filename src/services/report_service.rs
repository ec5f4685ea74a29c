use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use sqlx::SqlitePool;
use tracing::{error, info};

use crate::database::attendance_repo;
use crate::models::AttendanceRow;

pub const CSV_HEADER: &str = "Time,Full Name,Phone,Status,Branch,Location,Invited By";
pub const PREVIEW_ROWS: usize = 5;

#[derive(Debug, Deserialize, Default, Clone)]
pub struct ReportQuery {
    pub start_date: Option<String>, // YYYY-MM-DD
    pub end_date: Option<String>,   // YYYY-MM-DD
    pub status: Option<String>,     // All|Members|Guests
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StatusClass {
    #[default]
    All,
    Members,
    Guests,
}

impl StatusClass {
    pub fn as_str(self) -> &'static str {
        match self {
            StatusClass::All => "All",
            StatusClass::Members => "Members",
            StatusClass::Guests => "Guests",
        }
    }

    fn statuses(self) -> Option<&'static [&'static str]> {
        match self {
            StatusClass::All => None,
            StatusClass::Members => Some(&["Member"][..]),
            StatusClass::Guests => Some(&["Guest", "First Timer"][..]),
        }
    }
}

fn parse_status_class(input: Option<&str>) -> StatusClass {
    match input.map(str::trim).unwrap_or("All") {
        "Members" => StatusClass::Members,
        "Guests" => StatusClass::Guests,
        _ => StatusClass::All,
    }
}

fn parse_date(input: Option<&str>) -> Option<NaiveDate> {
    input
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .and_then(|s| NaiveDate::parse_from_str(s, "%Y-%m-%d").ok())
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReportFilter {
    pub start_date: Option<NaiveDate>,
    pub end_date: Option<NaiveDate>,
    pub status: StatusClass,
}

impl ReportFilter {
    /// Unparseable dates are ignored, matching an empty date input.
    pub fn from_query(query: &ReportQuery) -> Self {
        Self {
            start_date: parse_date(query.start_date.as_deref()),
            end_date: parse_date(query.end_date.as_deref()),
            status: parse_status_class(query.status.as_deref()),
        }
    }

    fn created_from(&self) -> Option<String> {
        self.start_date.map(|d| d.format("%Y-%m-%d").to_string())
    }

    /// End date covers the whole day.
    fn created_until(&self) -> Option<String> {
        self.end_date
            .map(|d| format!("{}T23:59:59.999Z", d.format("%Y-%m-%d")))
    }
}

pub async fn generate_report(
    pool: &SqlitePool,
    filter: &ReportFilter,
) -> sqlx::Result<Vec<AttendanceRow>> {
    let from = filter.created_from();
    let until = filter.created_until();
    let rows = attendance_repo::list_for_report(
        pool,
        from.as_deref(),
        until.as_deref(),
        filter.status.statuses(),
    )
    .await
    .map_err(|e| {
        error!("Error generating report: {}", e);
        e
    })?;

    info!(
        rows = rows.len(),
        status = filter.status.as_str(),
        "📊 Attendance report generated"
    );
    Ok(rows)
}

/// "2026-02-21T09:05:00.123Z" -> "2026-02-21 09:05:00". Unparseable values pass through.
pub fn format_timestamp(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw.trim()) {
        Ok(dt) => dt.with_timezone(&Utc).format("%Y-%m-%d %H:%M:%S").to_string(),
        Err(_) => raw.to_string(),
    }
}

/// Name and phone are wrapped in quotes; nothing else is escaped.
pub fn csv_row(row: &AttendanceRow) -> String {
    [
        format_timestamp(&row.created_at),
        format!("\"{}\"", row.full_name),
        format!("\"{}\"", row.phone_number),
        row.status.clone(),
        row.branch.clone(),
        row.location.clone().unwrap_or_default(),
        row.invited_by.clone().unwrap_or_default(),
    ]
    .join(",")
}

pub fn render_csv(rows: &[AttendanceRow]) -> String {
    std::iter::once(CSV_HEADER.to_string())
        .chain(rows.iter().map(csv_row))
        .collect::<Vec<_>>()
        .join("\n")
}

pub fn export_file_name(today: NaiveDate) -> String {
    format!("attendance_report_{}.csv", today.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::models::{AttendanceStatus, NewAttendance};

    fn row(name: &str, phone: &str, status: &str, branch: &str) -> AttendanceRow {
        AttendanceRow {
            id: 1,
            created_at: "2026-02-21T09:05:00.123Z".to_string(),
            full_name: name.to_string(),
            phone_number: phone.to_string(),
            status: status.to_string(),
            branch: branch.to_string(),
            invited_by: None,
            location: None,
            email: None,
        }
    }

    #[test]
    fn csv_quotes_only_name_and_phone() {
        let line = csv_row(&row("Jane, Doe", "0551234567", "Member", "Accra"));
        assert_eq!(line, "2026-02-21 09:05:00,\"Jane, Doe\",\"0551234567\",Member,Accra,,");
        assert!(line.ends_with("\"Jane, Doe\",\"0551234567\",Member,Accra,,"));
    }

    #[test]
    fn csv_starts_with_fixed_header() {
        let mut guest = row("Kofi", "0240000000", "Guest", "Kumasi");
        guest.location = Some("Ofankor".to_string());
        guest.invited_by = Some("Ama".to_string());

        let csv = render_csv(&[guest]);
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], CSV_HEADER);
        assert_eq!(lines[1], "2026-02-21 09:05:00,\"Kofi\",\"0240000000\",Guest,Kumasi,Ofankor,Ama");
        assert_eq!(render_csv(&[]), CSV_HEADER);
    }

    #[test]
    fn filter_parsing_ignores_blank_and_bad_dates() {
        let filter = ReportFilter::from_query(&ReportQuery {
            start_date: Some("2026-02-01".to_string()),
            end_date: Some("not a date".to_string()),
            status: Some("Guests".to_string()),
        });
        assert_eq!(filter.start_date, NaiveDate::from_ymd_opt(2026, 2, 1));
        assert_eq!(filter.end_date, None);
        assert_eq!(filter.status, StatusClass::Guests);
        assert_eq!(ReportFilter::from_query(&ReportQuery::default()), ReportFilter::default());
    }

    #[test]
    fn file_name_uses_the_given_day() {
        let day = NaiveDate::from_ymd_opt(2026, 2, 21).unwrap();
        assert_eq!(export_file_name(day), "attendance_report_2026-02-21.csv");
    }

    #[tokio::test]
    async fn report_respects_end_of_day_and_status_class() {
        let pool = test_pool().await;
        for (name, status) in [
            ("Ama", AttendanceStatus::Member),
            ("Kofi", AttendanceStatus::Guest),
            ("Esi", AttendanceStatus::FirstTimer),
        ] {
            attendance_repo::insert(
                &pool,
                &NewAttendance {
                    full_name: name.to_string(),
                    phone_number: name.to_string(),
                    status,
                    branch: "Accra".to_string(),
                    invited_by: None,
                    location: None,
                    email: None,
                },
            )
            .await
            .unwrap();
        }

        let today = Utc::now().date_naive();
        let guests = generate_report(
            &pool,
            &ReportFilter {
                start_date: Some(today),
                end_date: Some(today),
                status: StatusClass::Guests,
            },
        )
        .await
        .unwrap();
        let names: Vec<&str> = guests.iter().map(|r| r.full_name.as_str()).collect();
        assert_eq!(names, vec!["Esi", "Kofi"]);

        let yesterday = today.pred_opt().unwrap();
        let before = generate_report(
            &pool,
            &ReportFilter {
                end_date: Some(yesterday),
                ..Default::default()
            },
        )
        .await
        .unwrap();
        assert!(before.is_empty());
    }
}
