use {
    candle_cast::{
        Cli, DriftBackend, PaperTradingClient, Pipeline, TradingClient, cancel_on_ctrl_c,
        data::BinanceProvider,
    },
    clap::Parser,
    std::{panic, sync::Arc},
    tokio_util::sync::CancellationToken,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    panic::set_hook(Box::new(|info| {
        let backtrace = std::backtrace::Backtrace::force_capture();
        log::error!("CRITICAL PANIC:\n{}\nStack Trace:\n{}", info, backtrace);
    }));

    let (global_level, my_code_level) = if cfg!(debug_assertions) {
        (log::LevelFilter::Warn, log::LevelFilter::Info)
    } else {
        (log::LevelFilter::Error, log::LevelFilter::Info)
    };

    env_logger::Builder::new()
        .filter(None, global_level)
        .filter(Some("candle_cast"), my_code_level)
        .parse_default_env()
        .init();

    let config = Cli::parse().into_config();
    let trader: Option<Arc<dyn TradingClient>> = Some(Arc::new(PaperTradingClient));
    let pipeline = Pipeline::new(
        config,
        Arc::new(BinanceProvider::default()),
        Arc::new(DriftBackend),
        trader,
    )?;

    let cancel = CancellationToken::new();
    cancel_on_ctrl_c(cancel.clone());
    pipeline.run(cancel).await
}
