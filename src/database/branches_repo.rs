use sqlx::SqlitePool;

use crate::models::BranchRow;

const SQL_LIST_BRANCHES: &str = r#"
SELECT id, name
FROM branches
ORDER BY name ASC
"#;

pub async fn list_branches(pool: &SqlitePool) -> sqlx::Result<Vec<BranchRow>> {
    sqlx::query_as::<_, BranchRow>(SQL_LIST_BRANCHES)
        .fetch_all(pool)
        .await
}

const SQL_INSERT_BRANCH: &str = r#"
INSERT INTO branches (name)
VALUES (?1)
ON CONFLICT (name) DO NOTHING
"#;

/// Returns 0 when the branch already exists.
pub async fn insert_branch(pool: &SqlitePool, name: &str) -> sqlx::Result<u64> {
    let res = sqlx::query(SQL_INSERT_BRANCH)
        .bind(name)
        .execute(pool)
        .await?;
    Ok(res.rows_affected())
}
