use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    tomcat_analyzer::cli::run().await
}
