use sqlx::{sqlite::SqliteArguments, Arguments, Sqlite, SqlitePool};

use crate::models::{AttendancePatch, AttendanceRow, AttendanceStats, DailyCountRow, NewAttendance};

const ATTENDANCE_COLUMNS: &str = r#"
  id,
  created_at,
  full_name,
  phone_number,
  status,
  branch,
  invited_by,
  location,
  email
"#;

const SQL_LIST_PAGE: &str = r#"
SELECT
  id,
  created_at,
  full_name,
  phone_number,
  status,
  branch,
  invited_by,
  location,
  email
FROM attendance_logs
ORDER BY created_at DESC, id DESC
LIMIT ?1 OFFSET ?2
"#;

pub async fn list_page(
    pool: &SqlitePool,
    offset: i64,
    limit: i64,
) -> sqlx::Result<Vec<AttendanceRow>> {
    sqlx::query_as::<_, AttendanceRow>(SQL_LIST_PAGE)
        .bind(limit)
        .bind(offset)
        .fetch_all(pool)
        .await
}

const SQL_FIND_BY_ID: &str = r#"
SELECT
  id,
  created_at,
  full_name,
  phone_number,
  status,
  branch,
  invited_by,
  location,
  email
FROM attendance_logs
WHERE id = ?1
LIMIT 1
"#;

pub async fn find_by_id(pool: &SqlitePool, id: i64) -> sqlx::Result<Option<AttendanceRow>> {
    sqlx::query_as::<_, AttendanceRow>(SQL_FIND_BY_ID)
        .bind(id)
        .fetch_optional(pool)
        .await
}

const SQL_COUNT_ALL: &str = "SELECT COUNT(*) FROM attendance_logs";
const SQL_COUNT_MEMBERS: &str = "SELECT COUNT(*) FROM attendance_logs WHERE status = 'Member'";
const SQL_COUNT_GUESTS: &str =
    "SELECT COUNT(*) FROM attendance_logs WHERE status IN ('Guest', 'First Timer')";

async fn count(pool: &SqlitePool, sql: &'static str) -> sqlx::Result<i64> {
    sqlx::query_scalar::<_, i64>(sql).fetch_one(pool).await
}

/// Three independent count queries, issued concurrently.
pub async fn load_stats(pool: &SqlitePool) -> sqlx::Result<AttendanceStats> {
    let (total, members, guests) = tokio::try_join!(
        count(pool, SQL_COUNT_ALL),
        count(pool, SQL_COUNT_MEMBERS),
        count(pool, SQL_COUNT_GUESTS),
    )?;
    Ok(AttendanceStats {
        total,
        members,
        guests,
    })
}

const SQL_EXISTS_BY_PHONE: &str = r#"
SELECT id
FROM attendance_logs
WHERE phone_number = ?1
LIMIT 1
"#;

pub async fn exists_by_phone(pool: &SqlitePool, phone_number: &str) -> sqlx::Result<bool> {
    let found = sqlx::query_scalar::<_, i64>(SQL_EXISTS_BY_PHONE)
        .bind(phone_number)
        .fetch_optional(pool)
        .await?;
    Ok(found.is_some())
}

const SQL_INSERT: &str = r#"
INSERT INTO attendance_logs (
  full_name,
  phone_number,
  status,
  branch,
  invited_by,
  location,
  email
) VALUES (?, ?, ?, ?, ?, ?, ?)
RETURNING
  id,
  created_at,
  full_name,
  phone_number,
  status,
  branch,
  invited_by,
  location,
  email
"#;

pub async fn insert(pool: &SqlitePool, new: &NewAttendance) -> sqlx::Result<AttendanceRow> {
    sqlx::query_as::<_, AttendanceRow>(SQL_INSERT)
        .bind(&new.full_name)
        .bind(&new.phone_number)
        .bind(new.status.as_str())
        .bind(&new.branch)
        .bind(new.invited_by.as_deref())
        .bind(new.location.as_deref())
        .bind(new.email.as_deref())
        .fetch_one(pool)
        .await
}

fn push_arg<'q, T>(args: &mut SqliteArguments<'q>, value: T) -> sqlx::Result<()>
where
    T: sqlx::Encode<'q, Sqlite> + sqlx::Type<Sqlite> + 'q,
{
    args.add(value).map_err(sqlx::Error::Encode)
}

/// Writes only the columns present in the patch. Returns rows affected.
pub async fn update(pool: &SqlitePool, id: i64, patch: &AttendancePatch) -> sqlx::Result<u64> {
    if patch.is_empty() {
        return Ok(0);
    }

    let mut sets: Vec<&str> = Vec::new();
    let mut args = SqliteArguments::default();

    if let Some(v) = &patch.full_name {
        sets.push("full_name = ?");
        push_arg(&mut args, v.clone())?;
    }
    if let Some(v) = &patch.phone_number {
        sets.push("phone_number = ?");
        push_arg(&mut args, v.clone())?;
    }
    if let Some(v) = &patch.status {
        sets.push("status = ?");
        push_arg(&mut args, v.clone())?;
    }
    if let Some(v) = &patch.branch {
        sets.push("branch = ?");
        push_arg(&mut args, v.clone())?;
    }
    if let Some(v) = &patch.invited_by {
        sets.push("invited_by = ?");
        push_arg(&mut args, v.clone())?;
    }
    if let Some(v) = &patch.location {
        sets.push("location = ?");
        push_arg(&mut args, v.clone())?;
    }

    let sql = format!("UPDATE attendance_logs SET {} WHERE id = ?", sets.join(", "));
    push_arg(&mut args, id)?;

    let res = sqlx::query_with(&sql, args).execute(pool).await?;
    Ok(res.rows_affected())
}

const SQL_DELETE: &str = "DELETE FROM attendance_logs WHERE id = ?1";

pub async fn delete(pool: &SqlitePool, id: i64) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_DELETE).bind(id).execute(pool).await?;
    Ok(res.rows_affected())
}

/// Report query. Bounds are compared as RFC 3339 text; `statuses` restricts to
/// an `IN` list when given.
pub async fn list_for_report(
    pool: &SqlitePool,
    created_from: Option<&str>,
    created_until: Option<&str>,
    statuses: Option<&[&str]>,
) -> sqlx::Result<Vec<AttendanceRow>> {
    let mut sql = format!("SELECT {} FROM attendance_logs WHERE 1 = 1", ATTENDANCE_COLUMNS);
    let mut args = SqliteArguments::default();

    if let Some(from) = created_from {
        sql.push_str(" AND created_at >= ?");
        push_arg(&mut args, from.to_string())?;
    }
    if let Some(until) = created_until {
        sql.push_str(" AND created_at <= ?");
        push_arg(&mut args, until.to_string())?;
    }
    if let Some(statuses) = statuses.filter(|s| !s.is_empty()) {
        let placeholders = vec!["?"; statuses.len()].join(", ");
        sql.push_str(&format!(" AND status IN ({})", placeholders));
        for status in statuses {
            push_arg(&mut args, status.to_string())?;
        }
    }

    sql.push_str(" ORDER BY created_at DESC, id DESC");

    sqlx::query_as_with::<_, AttendanceRow, _>(&sql, args)
        .fetch_all(pool)
        .await
}

const SQL_DAILY_COUNTS: &str = r#"
SELECT
  substr(created_at, 1, 10) AS day,
  COUNT(*) AS count
FROM attendance_logs
GROUP BY day
ORDER BY day ASC
"#;

pub async fn daily_counts(pool: &SqlitePool) -> sqlx::Result<Vec<DailyCountRow>> {
    sqlx::query_as::<_, DailyCountRow>(SQL_DAILY_COUNTS)
        .fetch_all(pool)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_pool;
    use crate::models::AttendanceStatus;

    fn guest(name: &str, phone: &str) -> NewAttendance {
        NewAttendance {
            full_name: name.to_string(),
            phone_number: phone.to_string(),
            status: AttendanceStatus::Guest,
            branch: "Accra".to_string(),
            invited_by: Some("Kofi".to_string()),
            location: None,
            email: None,
        }
    }

    #[tokio::test]
    async fn insert_returns_store_assigned_columns() {
        let pool = test_pool().await;
        let row = insert(&pool, &guest("Ama Mensah", "0551234567")).await.unwrap();

        assert!(row.id > 0);
        assert!(row.created_at.ends_with('Z'));
        assert_eq!(row.status, "Guest");
        assert_eq!(row.invited_by.as_deref(), Some("Kofi"));
    }

    #[tokio::test]
    async fn pages_are_newest_first() {
        let pool = test_pool().await;
        for i in 0..5 {
            insert(&pool, &guest(&format!("Guest {i}"), &format!("05500000{i}")))
                .await
                .unwrap();
        }

        let first = list_page(&pool, 0, 2).await.unwrap();
        let second = list_page(&pool, 2, 2).await.unwrap();
        let third = list_page(&pool, 4, 2).await.unwrap();

        assert_eq!(first[0].full_name, "Guest 4");
        assert_eq!(first[1].full_name, "Guest 3");
        assert_eq!(second[0].full_name, "Guest 2");
        assert_eq!(third.len(), 1);
    }

    #[tokio::test]
    async fn stats_bucket_first_timers_with_guests() {
        let pool = test_pool().await;
        insert(&pool, &guest("A", "1")).await.unwrap();
        let mut member = guest("B", "2");
        member.status = AttendanceStatus::Member;
        insert(&pool, &member).await.unwrap();
        let mut legacy = guest("C", "3");
        legacy.status = AttendanceStatus::FirstTimer;
        insert(&pool, &legacy).await.unwrap();

        let stats = load_stats(&pool).await.unwrap();
        assert_eq!(
            stats,
            AttendanceStats {
                total: 3,
                members: 1,
                guests: 2
            }
        );
    }

    #[tokio::test]
    async fn update_touches_only_patched_columns() {
        let pool = test_pool().await;
        let row = insert(&pool, &guest("Ama", "0551")).await.unwrap();

        let patch = AttendancePatch {
            full_name: Some("Ama Mensah".to_string()),
            invited_by: Some(None),
            ..Default::default()
        };
        assert_eq!(update(&pool, row.id, &patch).await.unwrap(), 1);

        let updated = find_by_id(&pool, row.id).await.unwrap().unwrap();
        assert_eq!(updated.full_name, "Ama Mensah");
        assert_eq!(updated.phone_number, "0551");
        assert_eq!(updated.invited_by, None);
    }

    #[tokio::test]
    async fn delete_removes_row() {
        let pool = test_pool().await;
        let row = insert(&pool, &guest("Ama", "0551")).await.unwrap();

        assert_eq!(delete(&pool, row.id).await.unwrap(), 1);
        assert_eq!(delete(&pool, row.id).await.unwrap(), 0);
        assert!(find_by_id(&pool, row.id).await.unwrap().is_none());
        assert!(!exists_by_phone(&pool, "0551").await.unwrap());
    }

    #[tokio::test]
    async fn report_filters_by_status_list() {
        let pool = test_pool().await;
        insert(&pool, &guest("A", "1")).await.unwrap();
        let mut member = guest("B", "2");
        member.status = AttendanceStatus::Member;
        insert(&pool, &member).await.unwrap();

        let members = list_for_report(&pool, None, None, Some(&["Member"][..]))
            .await
            .unwrap();
        assert_eq!(members.len(), 1);
        assert_eq!(members[0].full_name, "B");

        let everyone = list_for_report(&pool, Some("2000-01-01"), None, None)
            .await
            .unwrap();
        assert_eq!(everyone.len(), 2);

        let none = list_for_report(&pool, None, Some("2000-01-01T23:59:59.999Z"), None)
            .await
            .unwrap();
        assert!(none.is_empty());
    }
}
