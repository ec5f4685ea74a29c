use chrono::NaiveDate;
use serde::Serialize;
use sqlx::SqlitePool;

use crate::database::attendance_repo;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChartPoint {
    pub date: String,
    pub count: i64,
}

/// "2026-02-21" -> "21 Feb".
fn day_label(day: &str) -> String {
    NaiveDate::parse_from_str(day, "%Y-%m-%d")
        .map(|d| d.format("%d %b").to_string())
        .unwrap_or_else(|_| day.to_string())
}

/// Registrations per day, oldest first.
pub async fn load_registration_chart(pool: &SqlitePool) -> sqlx::Result<Vec<ChartPoint>> {
    let rows = attendance_repo::daily_counts(pool).await?;
    Ok(rows
        .into_iter()
        .map(|r| ChartPoint {
            date: day_label(&r.day),
            count: r.count,
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::models::{AttendanceStatus, NewAttendance};

    #[test]
    fn labels_use_day_and_short_month() {
        assert_eq!(day_label("2026-02-01"), "01 Feb");
        assert_eq!(day_label("garbage"), "garbage");
    }

    #[tokio::test]
    async fn counts_are_grouped_per_day() {
        let pool = test_pool().await;
        assert!(load_registration_chart(&pool).await.unwrap().is_empty());

        for phone in ["1", "2"] {
            attendance_repo::insert(
                &pool,
                &NewAttendance {
                    full_name: "Ama".to_string(),
                    phone_number: phone.to_string(),
                    status: AttendanceStatus::Member,
                    branch: "Accra".to_string(),
                    invited_by: None,
                    location: None,
                    email: None,
                },
            )
            .await
            .unwrap();
        }

        let points = load_registration_chart(&pool).await.unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].count, 2);
    }
}
