//! Cron effect — declared cron subscriptions backed by `tokio-cron-scheduler`.

use std::collections::HashMap;

use hearth_domain::error::HearthError;
use hearth_domain::sub::CronSub;
use hearth_domain::time;
use tokio_cron_scheduler::{Job, JobScheduler};
use uuid::Uuid;

use crate::dispatch::Dispatcher;
use crate::updater::Updater;

/// Keeps cron jobs in sync with the declared set, keyed by expression.
pub struct CronEffect<M: Send + 'static> {
    scheduler: JobScheduler,
    dispatcher: Dispatcher<M>,
    updater: Updater<CronSub<M>>,
    jobs: HashMap<String, Vec<Uuid>>,
}

impl<M: Send + 'static> CronEffect<M> {
    /// Starts the underlying scheduler.
    ///
    /// # Errors
    ///
    /// Fails when the scheduler cannot be created or started.
    pub async fn new(dispatcher: Dispatcher<M>) -> Result<Self, HearthError> {
        let scheduler = JobScheduler::new()
            .await
            .map_err(|err| HearthError::Scheduler(Box::new(err)))?;
        scheduler
            .start()
            .await
            .map_err(|err| HearthError::Scheduler(Box::new(err)))?;
        Ok(Self {
            scheduler,
            dispatcher,
            updater: Updater::new(|spec| spec.expr.clone()),
            jobs: HashMap::new(),
        })
    }

    /// Registers jobs for expressions that appeared and drops jobs for
    /// expressions that disappeared. A bad expression is logged and skipped.
    pub async fn apply(&mut self, specs: Vec<CronSub<M>>) {
        let diff = self.updater.update(specs);
        for spec in diff.removed {
            let Some(ids) = self.jobs.remove(&spec.expr) else {
                continue;
            };
            for id in ids {
                if let Err(err) = self.scheduler.remove(&id).await {
                    tracing::warn!(%err, expr = %spec.expr, "failed to remove cron job");
                }
            }
        }
        for spec in diff.added {
            self.register(spec).await;
        }
    }

    async fn register(&mut self, spec: CronSub<M>) {
        let dispatcher = self.dispatcher.clone();
        let tagger = spec.tagger;
        let job = Job::new_async(spec.expr.as_str(), move |_id, _scheduler| {
            let dispatcher = dispatcher.clone();
            Box::pin(async move {
                dispatcher.dispatch(tagger(time::now()));
            })
        });
        let job = match job {
            Ok(job) => job,
            Err(err) => {
                tracing::error!(%err, expr = %spec.expr, "invalid cron expression");
                return;
            }
        };
        match self.scheduler.add(job).await {
            Ok(id) => self.jobs.entry(spec.expr).or_default().push(id),
            Err(err) => tracing::error!(%err, expr = %spec.expr, "failed to schedule cron job"),
        }
    }

    #[cfg(test)]
    fn job_count(&self) -> usize {
        self.jobs.values().map(Vec::len).sum()
    }
}
