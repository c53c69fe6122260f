use clap::Parser;
use trust_monitor::{cli::Cli, init_logging, settings::Settings, Monitor};

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;
    init_logging(settings.debug);

    let monitor = Monitor::new(settings)?;
    let result = trust_monitor::cli::execute(&cli, &monitor).await;
    monitor.shutdown();
    result
}
