use log::{debug, error, info, warn};
use mongodb::Database;
use rocket::{
    fairing::{Fairing, Info, Kind},
    tokio::{
        self,
        sync::Mutex,
        task::JoinHandle,
        time::{interval, MissedTickBehavior},
    },
    Orbit, Rocket,
};

use crate::{clock::SharedClock, config::Config, model::mongodb::Coll};

use super::reconciler::{close_expired_polls, PollSchedule};

/// A fairing that periodically closes expired polls in the background.
///
/// Request handlers always reconcile synchronously before touching poll
/// status; this only keeps the stored status fresh between requests.
/// The sweep starts at liftoff and is aborted on shutdown.
/// Depends on `Config`, the `Database` and a `SharedClock` being in managed state.
#[derive(Default)]
pub struct PollSweeperFairing {
    task: Mutex<Option<JoinHandle<()>>>,
}

#[rocket::async_trait]
impl Fairing for PollSweeperFairing {
    fn info(&self) -> Info {
        Info {
            name: "Poll Sweeper",
            kind: Kind::Liftoff | Kind::Shutdown,
        }
    }

    async fn on_liftoff(&self, rocket: &Rocket<Orbit>) {
        let (config, db, clock) = match (
            rocket.state::<Config>(),
            rocket.state::<Database>(),
            rocket.state::<SharedClock>(),
        ) {
            (Some(config), Some(db), Some(clock)) => (config, db, clock.clone()),
            _ => {
                error!("Poll sweeper is missing managed state; background sweeps disabled");
                return;
            }
        };
        let period = match config.sweep_interval() {
            Some(period) => period,
            None => {
                info!("Background poll sweeps disabled by config");
                return;
            }
        };

        let schedules = Coll::<PollSchedule>::from_db(db);
        let handle = tokio::spawn(async move {
            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                match close_expired_polls(&schedules, clock.now()).await {
                    Ok(closed) if !closed.is_empty() => {
                        debug!("Background sweep closed {} poll(s)", closed.len())
                    }
                    Ok(_) => {}
                    Err(e) => error!("Background poll sweep failed: {e}"),
                }
            }
        });
        info!("Sweeping expired polls every {}s", period.as_secs());
        *self.task.lock().await = Some(handle);
    }

    async fn on_shutdown(&self, _rocket: &Rocket<Orbit>) {
        if let Some(handle) = self.task.lock().await.take() {
            handle.abort();
            warn!("Stopped background poll sweeps");
        }
    }
}
