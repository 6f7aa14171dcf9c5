//! Pool controller (spec §4.5): advertises node capacity on a broker
//! channel and dispatches `start_job`/`stop_job` messages to a
//! `JobController`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::stream::StreamExt;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};
use vbot_broker::{BrokerClient, SubscribeOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobSummary {
    pub job_id: String,
    pub job_type: String,
}

/// `job_controller` (spec §4.5): the collaborator a pool controller drives.
/// Implementations own the actual job lifecycle; the pool controller only
/// forwards broker messages to it and reports its state as a heartbeat.
pub trait JobController: Send + Sync {
    fn add_job(&self, job_type: &str, job_id: &str, config: Value) -> Result<(), String>;
    fn remove_job(&self, job_id: &str) -> Result<(), String>;
    fn list_jobs(&self) -> Vec<JobSummary>;
    /// Configured capacity per job type (`N` in `N - running`).
    fn capacity(&self) -> HashMap<String, i64>;
}

#[derive(Debug, Deserialize)]
struct PoolMessage {
    action: String,
    to: Option<String>,
    #[serde(default)]
    job_type: Option<String>,
    #[serde(default)]
    job_id: Option<String>,
    #[serde(default)]
    config: Value,
}

pub struct PoolController {
    node_id: String,
    pool_channel: String,
    client: Arc<dyn BrokerClient>,
    controller: Arc<dyn JobController>,
}

impl PoolController {
    pub fn new(
        node_id: impl Into<String>,
        pool_channel: impl Into<String>,
        client: Arc<dyn BrokerClient>,
        controller: Arc<dyn JobController>,
    ) -> Self {
        Self {
            node_id: node_id.into(),
            pool_channel: pool_channel.into(),
            client,
            controller,
        }
    }

    /// Subscribes to the pool channel and runs the 1-second heartbeat timer
    /// until the returned future is dropped or the incoming channel ends.
    pub async fn run(&self) {
        let mut incoming =
            vbot_broker_rt::channel(self.client.clone(), self.pool_channel.clone(), SubscribeOptions::default());
        let mut heartbeat = tokio::time::interval(Duration::from_secs(1));

        loop {
            tokio::select! {
                _ = heartbeat.tick() => self.publish_heartbeat(),
                message = incoming.next() => {
                    match message {
                        Some(value) => self.handle_message(value),
                        None => break,
                    }
                }
            }
        }
    }

    fn publish_heartbeat(&self) {
        let active_jobs = self.controller.list_jobs();
        let mut available_capacity = self.controller.capacity();
        for job in &active_jobs {
            if let Some(remaining) = available_capacity.get_mut(&job.job_type) {
                *remaining -= 1;
            }
        }
        let heartbeat = serde_json::json!({
            "from": self.node_id,
            "active_jobs": active_jobs,
            "available_capacity": available_capacity,
        });
        self.client.publish(&self.pool_channel, heartbeat, None);
    }

    fn handle_message(&self, value: Value) {
        let message: PoolMessage = match serde_json::from_value(value) {
            Ok(m) => m,
            Err(err) => {
                warn!(%err, "pool controller: ignoring malformed message");
                return;
            }
        };
        if message.to.as_deref() != Some(self.node_id.as_str()) {
            return;
        }
        match message.action.as_str() {
            "start_job" => {
                let (Some(job_type), Some(job_id)) = (message.job_type, message.job_id) else {
                    warn!("pool controller: start_job missing job_type/job_id");
                    return;
                };
                if let Err(err) = self.controller.add_job(&job_type, &job_id, message.config) {
                    warn!(%err, job_id, "pool controller: add_job failed");
                }
            }
            "stop_job" => {
                let Some(job_id) = message.job_id else {
                    warn!("pool controller: stop_job missing job_id");
                    return;
                };
                if let Err(err) = self.controller.remove_job(&job_id) {
                    warn!(%err, job_id, "pool controller: remove_job failed");
                }
            }
            other => info!(action = other, "pool controller: unhandled action"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeController {
        jobs: Mutex<Vec<JobSummary>>,
        capacity: HashMap<String, i64>,
    }

    impl JobController for FakeController {
        fn add_job(&self, job_type: &str, job_id: &str, _config: Value) -> Result<(), String> {
            self.jobs.lock().unwrap().push(JobSummary {
                job_id: job_id.to_string(),
                job_type: job_type.to_string(),
            });
            Ok(())
        }

        fn remove_job(&self, job_id: &str) -> Result<(), String> {
            self.jobs.lock().unwrap().retain(|j| j.job_id != job_id);
            Ok(())
        }

        fn list_jobs(&self) -> Vec<JobSummary> {
            self.jobs.lock().unwrap().clone()
        }

        fn capacity(&self) -> HashMap<String, i64> {
            self.capacity.clone()
        }
    }

    #[test]
    fn start_and_stop_job_update_the_controller() {
        let controller = FakeController {
            jobs: Mutex::new(Vec::new()),
            capacity: HashMap::from([("record".to_string(), 2)]),
        };
        controller.add_job("record", "job-1", Value::Null).unwrap();
        assert_eq!(1, controller.list_jobs().len());
        controller.remove_job("job-1").unwrap();
        assert!(controller.list_jobs().is_empty());
    }
}
