use axum::{extract::State, http::StatusCode, response::Json};
use serde_json::{json, Value};
use sqlx::SqlitePool;
use tracing::error;

use crate::database::branches_repo;

pub async fn list_branches_handler(
    State(pool): State<SqlitePool>,
) -> Result<Json<Vec<String>>, (StatusCode, Json<Value>)> {
    match branches_repo::list_branches(&pool).await {
        Ok(rows) => Ok(Json(rows.into_iter().map(|b| b.name).collect())),
        Err(e) => {
            error!("Error fetching branches: {}", e);
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Error fetching branches" })),
            ))
        }
    }
}
