use anyhow::Result;
use portiro::cli;

#[tokio::main]
async fn main() -> Result<()> {
    let action = cli::start()?;
    action.execute().await
}
