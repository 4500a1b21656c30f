use anyhow::Result;
use dog_content::ContentConfig;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let config = ContentConfig::from_env(documents_fs::ENV_PREFIX);
    let ax = documents_fs::build(&config).await?;

    let host = config.get_string("http.host").unwrap_or_else(|| "127.0.0.1".to_string());
    let port = config.get_string("http.port").unwrap_or_else(|| "3030".to_string());
    let addr = format!("{host}:{port}");

    println!("[documents] listening on http://{addr}");

    ax.listen(addr).await?;

    Ok(())
}
