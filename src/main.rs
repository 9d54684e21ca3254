#[tokio::main]
async fn main() -> anyhow::Result<()> {
    focuspet_lib::run().await
}
