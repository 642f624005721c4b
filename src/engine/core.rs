use {
    super::{
        inference::InferenceAgent,
        ingest::IngestAgent,
        messages::{IntervalRecord, ScaledWindow, TrainingBatch},
        preprocess::PreprocessAgent,
        retention::RetentionAgent,
        scheduler::TrainingScheduler,
        train::TrainAgent,
        trading::{TradingAgent, TradingClient},
    },
    crate::{
        config::PipelineConfig,
        data::MarketDataProvider,
        domain::Prediction,
        models::{ModelBackend, ModelRegistry},
        pipeline::Channel,
    },
    anyhow::{Context, Result},
    std::{sync::Arc, time::Duration},
    tokio::task::JoinSet,
    tokio_util::sync::CancellationToken,
};

/// Wires every agent together from one immutable config and runs them until
/// cancelled.
pub struct Pipeline {
    config: Arc<PipelineConfig>,
    provider: Arc<dyn MarketDataProvider>,
    backend: Arc<dyn ModelBackend>,
    trader: Option<Arc<dyn TradingClient>>,
}

impl Pipeline {
    pub fn new(
        config: PipelineConfig,
        provider: Arc<dyn MarketDataProvider>,
        backend: Arc<dyn ModelBackend>,
        trader: Option<Arc<dyn TradingClient>>,
    ) -> Result<Self> {
        config.validate().context("invalid pipeline configuration")?;
        Ok(Self {
            config: Arc::new(config),
            provider,
            backend,
            trader,
        })
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Spawns one task per agent and waits for all of them. Returns once
    /// `cancel` fires and every agent has wound down.
    pub async fn run(self, cancel: CancellationToken) -> Result<()> {
        let config = self.config;
        let layout = &config.layout;
        std::fs::create_dir_all(layout.root())
            .with_context(|| format!("creating {}", layout.root().display()))?;

        log::info!(
            "🚀 Pipeline for {}{} on {:?} under {}",
            config.symbol,
            config.quote_symbol,
            config.intervals,
            layout.root().display()
        );

        let backoff = config.channel_backoff();
        let raw = Channel::<IntervalRecord>::new("raw records", backoff);
        let windows = Channel::<ScaledWindow>::new("scaled windows", backoff);
        let predictions = Channel::<Prediction>::new("predictions", backoff);
        let training = Channel::<TrainingBatch>::new("training batches", backoff);

        let registry = Arc::new(ModelRegistry::new(
            layout.model_dir(),
            Duration::from_secs(config.registry_scan_secs),
        ));

        let mut tasks = JoinSet::new();
        tasks.spawn(
            IngestAgent::new(config.clone(), self.provider.clone(), raw.clone())
                .run(cancel.clone()),
        );
        tasks.spawn(
            PreprocessAgent::new(config.clone(), raw.clone(), windows.clone()).run(cancel.clone()),
        );
        tasks.spawn(
            InferenceAgent::new(
                config.clone(),
                registry.clone(),
                self.backend.clone(),
                windows.clone(),
                predictions.clone(),
            )
            .run(cancel.clone()),
        );
        let trader = if config.trading.enabled { self.trader } else { None };
        tasks.spawn(
            TradingAgent::new(config.trading, trader, predictions.clone()).run(cancel.clone()),
        );
        tasks.spawn(
            TrainingScheduler::new(
                config.clone(),
                self.provider,
                registry.clone(),
                training.clone(),
            )
            .run(cancel.clone()),
        );
        tasks.spawn(
            TrainAgent::new(config.clone(), self.backend, registry, training.clone())
                .run(cancel.clone()),
        );
        tasks.spawn(RetentionAgent::new(config.clone()).run(cancel.clone()));

        while let Some(joined) = tasks.join_next().await {
            if let Err(e) = joined {
                log::error!("Agent task ended abnormally: {}", e);
                cancel.cancel();
            }
        }

        log::info!(
            "🏁 Pipeline stopped. Peak queue depths: raw {}, windows {}, predictions {}, training {}",
            raw.high_water(),
            windows.high_water(),
            predictions.high_water(),
            training.high_water()
        );
        Ok(())
    }
}

/// Cancels `cancel` on the first Ctrl-C.
pub fn cancel_on_ctrl_c(cancel: CancellationToken) {
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                log::info!("🛑 Ctrl-C received, shutting down");
                cancel.cancel();
            }
            Err(e) => log::error!("Could not listen for Ctrl-C: {}", e),
        }
    });
}
