use posting_cluster::api::router;
use posting_cluster::cluster::LocalCluster;
use posting_cluster::config::ClusterConfig;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        // .with_max_level(tracing::Level::DEBUG)
        .with_max_level(tracing::Level::INFO)
        .init();

    let args: Vec<String> = std::env::args().collect();

    if args.iter().any(|a| a == "--help" || a == "-h") {
        eprintln!(
            "Usage: {} [--api <addr:port>] [--shard <addr:port>]... [--workers <n>]",
            args[0]
        );
        eprintln!(
            "       [--poll-ms <ms>] [--rpc-timeout-ms <ms>] [--rpc-attempts <n>] [--lease-ms <ms>]"
        );
        eprintln!(
            "       [--window <n>] [--data-dir <path>] [--corpus-doctypes <n>] [--corpus-documents <n>]"
        );
        eprintln!(
            "Example: {} --api 127.0.0.1:8080 --shard 127.0.0.1:9001 --shard 127.0.0.1:9002",
            args[0]
        );
        std::process::exit(1);
    }

    let config = ClusterConfig::from_args(&args)?;

    tracing::info!("Starting posting cluster with {} shards", config.shards.len());
    match &config.data_dir {
        Some(dir) => tracing::info!("Journals under {}", dir.display()),
        None => tracing::info!("No --data-dir given, state is kept in memory only"),
    }

    // 1. Shards, posting client, store, queue and workers:
    let cluster = LocalCluster::start(config).await?;

    // 2. HTTP API:
    let listener = tokio::net::TcpListener::bind(cluster.config.api_addr).await?;
    tracing::info!("Press Ctrl+C to shutdown");

    router::serve(
        listener,
        cluster.context.clone(),
        cluster.queue.clone(),
        async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
            }
            tracing::info!("Shutdown requested");
        },
    )
    .await?;

    // 3. Drain workers, stop shards:
    cluster.shutdown().await;

    Ok(())
}
