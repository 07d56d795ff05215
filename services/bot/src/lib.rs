mod catalog_check;
mod cli;
mod infra;
mod polling;
mod routes;
mod server;

use hr_intake::error::AppError;

pub async fn run() -> Result<(), AppError> {
    cli::run().await
}
