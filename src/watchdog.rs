//! Watchdog task to reset the system if the tasks stop reporting
use bike_computer::system_state::SYSTEM_STATE;
use defmt::{Format, info, warn};
use embassy_rp::{Peri, peripherals::WATCHDOG, watchdog::Watchdog};
use embassy_sync::{blocking_mutex::raw::CriticalSectionRawMutex, mutex::Mutex};
use embassy_time::{Duration, Instant, Timer};

/// How long unhealthy tasks are tolerated before the board is reset
const COUNTDOWN_TIMEOUT: Duration = Duration::from_secs(520);
/// How often task health is checked
const HEALTH_CHECK_INTERVAL: Duration = Duration::from_secs(60);
/// Hardware watchdog timeout, only started to perform the reset
const HARDWARE_WATCHDOG_TIMEOUT: Duration = Duration::from_millis(8000);

/// Task identifiers for health tracking
#[derive(Debug, Clone, Copy, Eq, PartialEq, Format)]
pub enum TaskId {
    /// Periodic measurement and rendering cycle
    Cycle,
    /// Display task
    Display,
    /// Orchestrator task
    Orchestrator,
    /// Wireless link task
    Wireless,
}

impl TaskId {
    /// Number of tracked tasks
    const COUNT: usize = 4;
}

/// Health of every task plus the reset countdown
struct SystemHealth {
    /// Whether each task reported success since the last check
    reported: [bool; TaskId::COUNT],
    /// Reset deadline, running while some task is silent
    deadline: Option<Instant>,
}

impl SystemHealth {
    /// All tasks unreported, no countdown yet
    const fn new() -> Self {
        Self {
            reported: [false; TaskId::COUNT],
            deadline: None,
        }
    }

    /// Marks a task as alive
    const fn report(&mut self, task_id: TaskId) {
        self.reported[task_id as usize] = true;
    }

    /// Evaluates health and tells whether the countdown ran out.
    ///
    /// A task counts as healthy once it has reported at least once; the cycle task
    /// must keep reporting because it runs five times a second.
    fn check(&mut self, now: Instant) -> bool {
        let cycle_alive = self.reported[TaskId::Cycle as usize];
        let all_alive = self.reported.iter().all(|reported| *reported);
        self.reported[TaskId::Cycle as usize] = false;

        if all_alive && cycle_alive {
            self.deadline = None;
            return false;
        }
        let deadline = *self.deadline.get_or_insert(now + COUNTDOWN_TIMEOUT);
        now >= deadline
    }
}

/// Global system health tracker
static SYSTEM_HEALTH: Mutex<CriticalSectionRawMutex, SystemHealth> = Mutex::new(SystemHealth::new());

/// Report a successful task iteration
pub async fn report_task_success(task_id: TaskId) {
    SYSTEM_HEALTH.lock().await.report(task_id);
}

/// Logs the shared state alongside each health check
async fn log_system_state() {
    let state = *SYSTEM_STATE.lock().await;
    info!(
        "Health: link {}, actuator {}, display booted {}, skipped cycles {}",
        state.link(),
        state.actuator_on(),
        state.display_booted(),
        state.skipped_cycles()
    );
    if !state.display_booted() {
        warn!("Display boot not confirmed yet");
    }
}

#[embassy_executor::task]
pub async fn watchdog_task(wd: Peri<'static, WATCHDOG>) {
    info!(
        "Watchdog started with {}s countdown, checking health every {}s",
        COUNTDOWN_TIMEOUT.as_secs(),
        HEALTH_CHECK_INTERVAL.as_secs()
    );

    loop {
        Timer::after(HEALTH_CHECK_INTERVAL).await;

        let expired = SYSTEM_HEALTH.lock().await.check(Instant::now());
        log_system_state().await;
        if !expired {
            continue;
        }

        warn!("Countdown expired - resetting due to unhealthy tasks");
        let mut watchdog = Watchdog::new(wd);
        watchdog.pause_on_debug(false);
        watchdog.start(HARDWARE_WATCHDOG_TIMEOUT);
        info!(
            "Hardware watchdog started - system will reset in {}ms",
            HARDWARE_WATCHDOG_TIMEOUT.as_millis()
        );

        // Never fed again
        loop {
            Timer::after_secs(1).await;
        }
    }
}
