#[derive(Debug, Clone, sqlx::FromRow)]
pub struct DailyCountRow {
    pub day: String,
    pub count: i64,
}
