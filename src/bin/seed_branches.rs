use std::env;

use dotenvy::dotenv;
use tracing::{error, info};

use registration::database::{self, branches_repo};

/// Branch names from the command line, or a comma-separated `SEED_BRANCHES`.
fn branch_names() -> Vec<String> {
    let args: Vec<String> = env::args().skip(1).collect();
    let raw = if args.is_empty() {
        env::var("SEED_BRANCHES")
            .map(|v| v.split(',').map(str::to_string).collect())
            .unwrap_or_default()
    } else {
        args
    };

    raw.into_iter()
        .map(|name| name.trim().to_string())
        .filter(|name| !name.is_empty())
        .collect()
}

#[tokio::main]
async fn main() {
    dotenv().ok();
    tracing_subscriber::fmt::init();

    let Ok(db_url) = env::var("DATABASE_URL") else {
        error!("DATABASE_URL must be set");
        std::process::exit(1);
    };

    let names = branch_names();
    if names.is_empty() {
        error!("No branches given. Pass names as arguments or set SEED_BRANCHES=\"Accra,Kumasi\"");
        std::process::exit(1);
    }

    let pool = match database::connect(&db_url).await {
        Ok(pool) => pool,
        Err(e) => {
            error!("Could not open database: {}", e);
            std::process::exit(1);
        }
    };

    let mut added = 0;
    for name in &names {
        match branches_repo::insert_branch(&pool, name).await {
            Ok(rows) => added += rows,
            Err(e) => {
                error!("Could not add branch {}: {}", name, e);
                std::process::exit(1);
            }
        }
    }

    info!(
        "branch seed: given={}, added={}, existing={}",
        names.len(),
        added,
        names.len() as u64 - added
    );
}
