use std::process::ExitCode;

#[tokio::main]
async fn main() -> ExitCode {
    instancesmith_lib::run().await
}
