use crate::{context::AppContext, metrics};
use tokio::{
    sync::watch,
    task::JoinHandle,
    time::{interval, Duration, MissedTickBehavior},
};
use tracing::{error, info};

pub mod tasks;

/// Job scheduler for background tasks
///
/// Owns its loops; `stop` signals them and waits for the current run to end.
pub struct JobScheduler {
    context: AppContext,
    shutdown: watch::Sender<bool>,
    handles: Vec<JoinHandle<()>>,
}

impl JobScheduler {
    pub fn new(context: AppContext) -> Self {
        let (shutdown, _) = watch::channel(false);
        Self {
            context,
            shutdown,
            handles: Vec::new(),
        }
    }

    /// Start all background jobs
    pub fn start(&mut self) {
        info!("Starting background job scheduler");

        let every = Duration::from_secs(self.context.config.jobs.token_sweep_interval_secs);
        self.handles.push(tokio::spawn(Self::token_sweep_job(
            self.context.clone(),
            every,
            self.shutdown.subscribe(),
        )));

        info!("Background jobs started");
    }

    /// Signal every job to stop and wait for them
    pub async fn stop(self) {
        // Receivers may already be gone if a job exited on its own
        let _ = self.shutdown.send(true);

        for handle in self.handles {
            if let Err(e) = handle.await {
                error!("Background job ended abnormally: {}", e);
            }
        }

        info!("Background jobs stopped");
    }

    /// Delete expired refresh tokens on a fixed interval
    async fn token_sweep_job(ctx: AppContext, every: Duration, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = interval(every);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            match tasks::sweep_expired_tokens(&ctx).await {
                Ok(count) => {
                    metrics::record_background_job("token_sweep", true);
                    if count > 0 {
                        info!("Swept {} expired refresh tokens", count);
                    }
                }
                Err(e) => {
                    metrics::record_background_job("token_sweep", false);
                    error!("Failed to sweep expired refresh tokens: {}", e);
                }
            }
        }
    }
}
