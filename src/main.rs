#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fermentor_x_lib::run().await
}
