use std::env;

use colored::Colorize;
use encore_lobby::{Lobby, SqliteDatabase};
use encore_server::logging;
use log::{error, info};

#[tokio::main]
async fn main() {
    logging::init_logger();

    let database_url =
        env::var("ENCORE_DATABASE_URL").unwrap_or_else(|_| "sqlite:encore.db".to_string());

    info!("Connecting to database...");

    match SqliteDatabase::new(&database_url).await {
        Ok(database) => {
            info!("Initialized successfully.");
            encore_server::run_server(Lobby::new(database)).await;
        }
        Err(error) => {
            error!(
                "{} Read the error below to troubleshoot the issue.",
                "encore failed to start!".bold()
            );
            error!("{}", error);
        }
    }
}
