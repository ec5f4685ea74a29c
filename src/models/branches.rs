use serde::Serialize;

#[derive(Debug, Clone, Serialize, sqlx::FromRow)]
pub struct BranchRow {
    pub id: i64,
    pub name: String,
}
