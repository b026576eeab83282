use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::models::StabilizedActivity;

use super::engine::EngineCore;
use super::events::EngineCommand;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info};

/// Engine task: periodic fusion cycles plus commands, until cancelled.
///
/// Cycles and commands are served one at a time, so the core never sees
/// concurrent mutation. Cancellation wins over everything, including a cycle
/// that is mid-flight.
pub(crate) async fn engine_loop(
    mut core: EngineCore,
    mut commands: mpsc::Receiver<EngineCommand>,
    cancel_token: CancellationToken,
) {
    core.reset_detectors().await;

    let mut ticker = tokio::time::interval(core.fusion_interval());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    log_info!("engine loop started (fusion every {}ms)", core.fusion_interval().as_millis());

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                break;
            }
            _ = ticker.tick() => {
                if run_cycle(&mut core, false, &cancel_token).await.is_none() {
                    break;
                }
            }
            command = commands.recv() => {
                let Some(command) = command else {
                    log_debug!("command channel closed");
                    break;
                };
                if !handle_command(&mut core, command, &cancel_token).await {
                    break;
                }
            }
        }
    }

    log_info!("engine loop shutting down");
}

/// `None` when cancelled mid-cycle; the cycle future is dropped with every
/// detector call it was awaiting.
async fn run_cycle(
    core: &mut EngineCore,
    force: bool,
    cancel_token: &CancellationToken,
) -> Option<Option<StabilizedActivity>> {
    tokio::select! {
        biased;
        _ = cancel_token.cancelled() => None,
        current = core.run_cycle(force) => Some(current),
    }
}

/// Returns `false` once the loop should stop.
async fn handle_command(
    core: &mut EngineCore,
    command: EngineCommand,
    cancel_token: &CancellationToken,
) -> bool {
    log_debug!("serving {}", command.name());

    // A dropped reply only means the caller gave up waiting.
    match command {
        EngineCommand::ForceCycle { reply } => {
            let Some(current) = run_cycle(core, true, cancel_token).await else {
                return false;
            };
            let _ = reply.send(current);
        }
        EngineCommand::History { since, limit, reply } => {
            let _ = reply.send(core.history(since, limit));
        }
        EngineCommand::ActivityHistory { since, limit, reply } => {
            let _ = reply.send(core.activity_history(since, limit));
        }
        EngineCommand::Statistics { window, reply } => {
            let _ = reply.send(core.statistics(window));
        }
        EngineCommand::ClearHistoryOlderThan { cutoff, reply } => {
            let _ = reply.send(core.clear_history_older_than(cutoff));
        }
        EngineCommand::Metrics { reply } => {
            let _ = reply.send(core.metrics());
        }
    }
    true
}
