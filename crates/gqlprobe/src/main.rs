use std::process::ExitCode;

use gqlprobe::cli::run_app;
use gqlprobe::ux;

#[tokio::main]
async fn main() -> ExitCode {
    match run_app().await {
        Ok(true) => ExitCode::SUCCESS,
        Ok(false) => ExitCode::FAILURE,
        Err(e) => {
            ux::present_error(e);
            ExitCode::FAILURE
        }
    }
}
