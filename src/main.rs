/*
 * Responsibility
 * - tokio runtime entrypoint
 * - calls app::run() (no logic here)
 */
use anyhow::Result;

#[tokio::main]
async fn main() -> Result<()> {
    guidogerb_gateway::app::run().await
}
