//! Turns predictions into buy / sell calls on a trading collaborator.

use {
    crate::{
        config::{DF, TradingSettings},
        domain::Prediction,
        pipeline::Channel,
    },
    anyhow::Result,
    async_trait::async_trait,
    std::sync::Arc,
    strum_macros::Display,
    tokio_util::sync::CancellationToken,
};

#[async_trait]
pub trait TradingClient: Send + Sync {
    async fn buy(&self, amount: f64) -> Result<()>;
    async fn sell(&self, amount: f64) -> Result<()>;
}

/// Logs orders instead of placing them.
#[derive(Debug, Default)]
pub struct PaperTradingClient;

#[async_trait]
impl TradingClient for PaperTradingClient {
    async fn buy(&self, amount: f64) -> Result<()> {
        log::info!("📝 Paper BUY {:.2}", amount);
        Ok(())
    }

    async fn sell(&self, amount: f64) -> Result<()> {
        log::info!("📝 Paper SELL {:.2}", amount);
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Signal {
    Buy,
    Sell,
    Hold,
}

/// Buy above `+threshold`, sell below `-threshold`, hold otherwise.
/// `threshold` is a fraction of the reference close.
pub fn signal_for(prediction: &Prediction, threshold: f64) -> Signal {
    let change = prediction.expected_change();
    if change > threshold {
        Signal::Buy
    } else if change < -threshold {
        Signal::Sell
    } else {
        Signal::Hold
    }
}

pub struct TradingAgent {
    settings: TradingSettings,
    client: Option<Arc<dyn TradingClient>>,
    input: Channel<Prediction>,
}

impl TradingAgent {
    /// Without a client, signals are only logged.
    pub fn new(
        settings: TradingSettings,
        client: Option<Arc<dyn TradingClient>>,
        input: Channel<Prediction>,
    ) -> Self {
        Self {
            settings,
            client,
            input,
        }
    }

    pub async fn run(self, cancel: CancellationToken) {
        log::info!(
            "💹 Trading started ({}, threshold {:.2}%)",
            if self.client.is_some() { "orders on" } else { "signals only" },
            self.settings.signal_threshold_pct * 100.0
        );

        while let Some(prediction) = self.input.take(&cancel).await {
            self.act(&prediction).await;
        }

        log::info!("💹 Trading stopped");
    }

    pub async fn act(&self, prediction: &Prediction) -> Signal {
        let signal = signal_for(prediction, self.settings.signal_threshold_pct);
        if DF.log_predictions || signal != Signal::Hold {
            log::info!(
                "💹 {} {} ({:+.3}%)",
                prediction.interval,
                signal,
                prediction.expected_change() * 100.0
            );
        }

        let Some(client) = &self.client else {
            return signal;
        };
        let amount = self.settings.order_amount;
        let placed = match signal {
            Signal::Buy => client.buy(amount).await,
            Signal::Sell => client.sell(amount).await,
            Signal::Hold => Ok(()),
        };
        if let Err(e) = placed {
            log::error!("{} order of {:.2} failed: {:#}", signal, amount, e);
        }
        signal
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Interval;
    use std::sync::Mutex;

    fn prediction(close: f64) -> Prediction {
        Prediction {
            close,
            unix_time: 0,
            interval: Interval::FiveMinute,
            reference_close: 100.0,
        }
    }

    #[test]
    fn threshold_is_exclusive_both_ways() {
        assert_eq!(signal_for(&prediction(102.0), 0.01), Signal::Buy);
        assert_eq!(signal_for(&prediction(98.0), 0.01), Signal::Sell);
        assert_eq!(signal_for(&prediction(100.5), 0.01), Signal::Hold);
        assert_eq!(signal_for(&prediction(99.5), 0.01), Signal::Hold);
    }

    #[derive(Default)]
    struct Recording {
        orders: Mutex<Vec<String>>,
        fail: bool,
    }

    #[async_trait]
    impl TradingClient for Recording {
        async fn buy(&self, amount: f64) -> Result<()> {
            self.orders.lock().unwrap().push(format!("buy {}", amount));
            if self.fail {
                anyhow::bail!("exchange down");
            }
            Ok(())
        }

        async fn sell(&self, amount: f64) -> Result<()> {
            self.orders.lock().unwrap().push(format!("sell {}", amount));
            Ok(())
        }
    }

    fn settings() -> TradingSettings {
        TradingSettings {
            enabled: true,
            signal_threshold_pct: 0.01,
            order_amount: 25.0,
        }
    }

    #[tokio::test]
    async fn places_orders_for_signals_only() {
        let client = Arc::new(Recording::default());
        let channel = Channel::new("predictions", std::time::Duration::from_millis(5));
        let agent = TradingAgent::new(settings(), Some(client.clone()), channel);

        agent.act(&prediction(105.0)).await;
        agent.act(&prediction(100.0)).await;
        agent.act(&prediction(90.0)).await;

        assert_eq!(*client.orders.lock().unwrap(), vec!["buy 25", "sell 25"]);
    }

    #[tokio::test]
    async fn client_failure_is_not_fatal() {
        let client = Arc::new(Recording {
            fail: true,
            ..Recording::default()
        });
        let channel = Channel::new("predictions", std::time::Duration::from_millis(5));
        channel.put(prediction(110.0)).unwrap();
        channel.put(prediction(111.0)).unwrap();
        channel.complete();

        TradingAgent::new(settings(), Some(client.clone()), channel)
            .run(CancellationToken::new())
            .await;
        assert_eq!(client.orders.lock().unwrap().len(), 2);
    }
}
