use anyhow::Result;

fn init_logger() -> Result<()> {
    let base_config = fern::Dispatch::new();

    let stderr_config = fern::Dispatch::new()
        .level(log::LevelFilter::Warn)
        .level_for("wns_notify", log::LevelFilter::Info)
        .format(|out, message, record| {
            out.finish(format_args!(
                "{}[{}][{}] {}",
                chrono::Local::now().format("[%H:%M:%S]"),
                record.level(),
                record.target(),
                message
            ))
        })
        .chain(std::io::stderr());

    base_config.chain(stderr_config).apply()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    init_logger()?;

    let config = wns_notify::config::Config::from_env()?;
    if config.credentials().is_none() {
        log::warn!("WNS_CLIENT_ID/WNS_CLIENT_SECRET not set, notifications cannot be sent");
    }

    wns_notify::server::start_server(config).await?;

    Ok(())
}
