use std::sync::{Arc, Mutex, MutexGuard, Weak};

use tokio::sync::mpsc;
use tokio::time::{self, Duration, Instant};
use uuid::Uuid;

use crate::classifier::{ClassifierClient, Judgement, PersonaContext};
use crate::error::{ClassifierError, MonitorError};
use crate::persona::{pick_random, Personality, PersonalityCatalog};
use crate::sensing::phash::fingerprint;
use crate::sensing::window_watch::compare_fingerprint;
use crate::sensing::{
    ActiveWindowEvent, CapturedImage, FingerprintVerdict, ScreenshotSource, WindowWatchController,
};
use crate::settings::{EngineConfig, WindowChangeStrategy};

use super::scheduler::CheckScheduler;
use super::sink::PresentationSink;
use super::state::{Mode, Session, StateSnapshot};
use super::transitions::{apply_judgement, prefer_static_reaction, Rules};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const MSG_STARTED: &str = "Monitoring started! Let's focus! ✨";
const MSG_STOPPED: &str = "Monitoring stopped.";
const MSG_PAUSED_FOR_CHAT: &str = "Monitoring paused while we chat.";
const MSG_WRONG_MODE: &str = "Switch to productivity mode to start monitoring.";
const MSG_ALREADY_MONITORING: &str = "Already keeping an eye on you! 👀";
const MSG_NO_CAPTURE: &str = "Error: Cannot capture screen.";
const MSG_NO_CLIENT: &str = "Error: API client not ready.";
const MSG_CAPTURE_FAILED: &str = "Error capturing screen.";
const MSG_CAPTURE_GAVE_UP: &str = "Error capturing screen. Monitoring stopped.";

const CHAT_PROMPT_FOR_INPUT: &str = "What would you like to talk about?";
const CHAT_NO_CLIENT: &str = "Sorry, my brain (API client) isn't working right now.";
const CHAT_NO_ANSWER: &str = "Hmm, I'm not sure how to respond to that.";

struct EngineInner {
    session: Mutex<Session>,
    config: EngineConfig,
    rules: Rules,
    classifier: Option<Arc<dyn ClassifierClient>>,
    capture: Mutex<Option<Arc<dyn ScreenshotSource>>>,
    sink: Arc<dyn PresentationSink>,
    scheduler: CheckScheduler,
    watcher: Mutex<WindowWatchController>,
    /// Held for the duration of a check so two checks never interleave.
    check_gate: tokio::sync::Mutex<()>,
}

/// Drives the pet: scheduled and window-triggered checks, distraction
/// accounting, life/emotion transitions and chat.
///
/// Cheap to clone; all clones share one session.
#[derive(Clone)]
pub struct MonitoringEngine {
    inner: Arc<EngineInner>,
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}

impl MonitoringEngine {
    pub fn new(
        config: EngineConfig,
        sink: Arc<dyn PresentationSink>,
        classifier: Option<Arc<dyn ClassifierClient>>,
    ) -> Self {
        let session = Session::new(
            config.personality,
            config.context_history_capacity,
            config.emotion.enabled,
            config.debounce(),
        );

        Self {
            inner: Arc::new(EngineInner {
                session: Mutex::new(session),
                rules: Rules::from_config(&config),
                config,
                classifier,
                capture: Mutex::new(None),
                sink,
                scheduler: CheckScheduler::new(),
                watcher: Mutex::new(WindowWatchController::new()),
                check_gate: tokio::sync::Mutex::new(()),
            }),
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.inner.config
    }

    fn session(&self) -> MutexGuard<'_, Session> {
        lock(&self.inner.session)
    }

    /// Runs `f` on the session and returns its result with the resulting snapshot.
    fn mutate<T>(&self, f: impl FnOnce(&mut Session) -> T) -> (T, StateSnapshot) {
        let mut session = self.session();
        let out = f(&mut session);
        (out, session.snapshot())
    }

    fn notify(&self, snapshot: &StateSnapshot, message: Option<&str>, speak: bool) {
        self.inner.sink.on_update(snapshot, message, speak);
    }

    fn notify_current(&self, message: Option<&str>, speak: bool) {
        let snapshot = self.get_state();
        self.notify(&snapshot, message, speak);
    }

    fn capture_source(&self) -> Option<Arc<dyn ScreenshotSource>> {
        lock(&self.inner.capture).clone()
    }

    pub fn get_state(&self) -> StateSnapshot {
        self.session().snapshot()
    }

    /// Last few activity descriptions, oldest first.
    pub fn context_history(&self) -> Vec<String> {
        self.session().context_history.to_vec()
    }

    /// Greets the user and starts window change detection when a capture source is known.
    pub fn initialize(&self, capture: Option<Arc<dyn ScreenshotSource>>) {
        if let Some(source) = capture {
            *lock(&self.inner.capture) = Some(source);
        }
        if self.inner.classifier.is_none() {
            log_warn!("no classifier configured; monitoring cannot start");
        }

        self.start_window_detection();

        let (welcome, snapshot) = self.mutate(|session| {
            PersonalityCatalog.welcome(session.personality, &mut rand::thread_rng())
        });
        self.notify(&snapshot, Some(&welcome), true);
    }

    pub fn start_monitoring(
        &self,
        capture: Option<Arc<dyn ScreenshotSource>>,
    ) -> Result<(), MonitorError> {
        let refusal = {
            let session = self.session();
            // A dead pet is revived into productivity mode, whatever mode it died in.
            if session.mode != Mode::Productivity && !session.is_dead() {
                Some((MonitorError::NotInProductivityMode, MSG_WRONG_MODE, false))
            } else if session.is_monitoring {
                Some((MonitorError::AlreadyMonitoring, MSG_ALREADY_MONITORING, false))
            } else {
                None
            }
        };
        if let Some((err, message, speak)) = refusal {
            log_info!("cannot start monitoring: {err}");
            self.notify_current(Some(message), speak);
            return Err(err);
        }

        let Some(source) = capture.or_else(|| self.capture_source()) else {
            log_error!("cannot start monitoring: no screenshot source");
            self.notify_current(Some(MSG_NO_CAPTURE), true);
            return Err(MonitorError::NoCaptureSource);
        };
        if self.inner.classifier.is_none() {
            log_error!("cannot start monitoring: classifier client not available");
            self.notify_current(Some(MSG_NO_CLIENT), true);
            return Err(MonitorError::NoClassifier);
        }

        *lock(&self.inner.capture) = Some(source);

        let run_id = Uuid::new_v4().to_string();
        log_info!(
            "Starting productivity monitoring (run {run_id}, every {}s)",
            self.inner.config.check_interval().as_secs()
        );
        let ((), snapshot) = self.mutate(|session| session.begin_monitoring(run_id));

        self.start_window_detection();
        self.arm_checks(Duration::ZERO);
        self.notify(&snapshot, Some(MSG_STARTED), true);
        Ok(())
    }

    /// Stops the periodic checks. Window change detection keeps running.
    pub fn stop_monitoring(&self) -> bool {
        let (was_monitoring, snapshot) = self.mutate(|session| {
            let was = session.is_monitoring;
            session.end_monitoring();
            was
        });
        if !was_monitoring {
            return false;
        }

        self.inner.scheduler.cancel_scheduled();
        log_info!("Stopped productivity monitoring");
        self.notify(&snapshot, Some(MSG_STOPPED), true);
        true
    }

    /// Flips between productivity and relax; `None` when the pet is dead.
    pub fn toggle_mode(&self) -> Option<Mode> {
        let mode = {
            let mut session = self.session();
            if session.is_dead() {
                return None;
            }
            session.toggle_mode()
        };
        log_info!("Mode toggled to {mode}");

        if mode == Mode::Relax {
            self.stop_monitoring();
        }

        let (greeting, snapshot) = self.mutate(|session| greeting(session));
        self.notify(&snapshot, Some(&greeting), false);
        Some(mode)
    }

    /// Flips stats visibility; `None` when the pet is dead.
    pub fn toggle_stats_visibility(&self) -> Option<bool> {
        let (visible, snapshot) = self.mutate(|session| {
            if session.is_dead() {
                return None;
            }
            session.stats_visible = !session.stats_visible;
            Some(session.stats_visible)
        });
        let visible = visible?;
        self.notify(&snapshot, None, false);
        Some(visible)
    }

    pub fn set_personality(&self, id: &str) -> Result<Personality, MonitorError> {
        let personality: Personality = id.parse()?;
        let (welcome, snapshot) = self.mutate(|session| {
            session.personality = personality;
            PersonalityCatalog.welcome(personality, &mut rand::thread_rng())
        });
        log_info!("Personality changed to {personality}");
        self.notify(&snapshot, Some(&welcome), true);
        Ok(personality)
    }

    /// Answers a user message, pausing monitoring while the model thinks.
    ///
    /// A paused run resumes after the chat resume delay, whether the reply
    /// succeeded or not.
    pub async fn chat(&self, query: &str) -> String {
        let query = query.trim();
        if query.is_empty() {
            return CHAT_PROMPT_FOR_INPUT.to_string();
        }
        let Some(classifier) = self.inner.classifier.clone() else {
            return CHAT_NO_CLIENT.to_string();
        };

        let ((paused, persona, history), snapshot) = self.mutate(|session| {
            let paused = session.is_monitoring;
            session.end_monitoring();
            (paused, session.persona_context(), session.context_history.to_vec())
        });

        let _resume = paused.then(|| {
            self.inner.scheduler.cancel_scheduled();
            log_info!("Pausing monitoring for chat");
            self.notify(&snapshot, Some(MSG_PAUSED_FOR_CHAT), false);
            ResumeAfterChat {
                engine: self.clone(),
            }
        });

        match classifier.chat(query, &persona, &history).await {
            Ok(reply) => reply,
            Err(ClassifierError::EmptyReply | ClassifierError::MissingField(_)) => {
                CHAT_NO_ANSWER.to_string()
            }
            Err(err) => {
                log_warn!("chat request failed: {err}");
                format!("Sorry, I encountered an error: {err}")
            }
        }
    }

    fn resume_after_chat(&self) {
        let (resumed, snapshot) = self.mutate(|session| {
            if session.is_dead() || session.is_monitoring || session.mode != Mode::Productivity {
                return false;
            }
            session.is_monitoring = true;
            true
        });
        if !resumed {
            return;
        }

        if tokio::runtime::Handle::try_current().is_err() {
            log_warn!("runtime gone; not resuming monitoring");
            return;
        }
        let delay = self.inner.config.chat_resume_delay();
        log_info!("Resuming monitoring in {}s after chat", delay.as_secs());
        self.arm_checks(delay);
        self.notify(&snapshot, None, false);
    }

    /// Judges `image` and applies the result to the session.
    pub async fn classify_and_update(&self, image: &CapturedImage) {
        let persona = {
            let session = self.session();
            if session.is_dead() {
                log_debug!("skipping classification: pet is dead");
                return;
            }
            session.persona_context()
        };

        let judgement = self.classify(image).await;

        let wants_reaction = persona.mode == Mode::Productivity
            && !prefer_static_reaction(self.inner.config.static_reaction_ratio, &mut rand::thread_rng());
        let generated = if wants_reaction {
            self.generate_reaction(&judgement, &persona).await
        } else {
            None
        };

        let ((reaction, run_id), snapshot) = self.mutate(|session| {
            let mut rng = rand::thread_rng();
            let reaction =
                apply_judgement(session, &judgement, generated, &self.inner.rules, &mut rng);
            (reaction, session.run_id.clone())
        });
        let Some(reaction) = reaction else {
            return;
        };

        log_info!(
            "check (run {}): distracting={} activity={:?} count={} life={} emotion={:?}",
            run_id.as_deref().unwrap_or("-"),
            judgement.is_distracting,
            judgement.activity_description,
            snapshot.distraction_count,
            snapshot.life_state,
            snapshot.emotion_level
        );

        if reaction.died {
            log_info!("Pet died; halting monitoring");
            self.inner.scheduler.cancel_scheduled();
        }
        self.notify(&snapshot, Some(&reaction.message), reaction.speak);
    }

    async fn classify(&self, image: &CapturedImage) -> Judgement {
        let Some(classifier) = self.inner.classifier.as_ref() else {
            log_warn!("classification skipped: {}", ClassifierError::NotConfigured);
            return Judgement::neutral();
        };
        match classifier.classify(image.encoded()).await {
            Ok(judgement) => judgement,
            Err(err) => {
                log_warn!("classification failed, assuming focus: {err}");
                Judgement::neutral()
            }
        }
    }

    async fn generate_reaction(&self, judgement: &Judgement, persona: &PersonaContext) -> Option<String> {
        let classifier = self.inner.classifier.as_ref()?;
        match classifier
            .generate_reaction(
                judgement.is_distracting,
                judgement.activity_description.as_deref(),
                persona,
            )
            .await
        {
            Ok(text) => Some(text),
            Err(err) => {
                log_warn!("reaction generation failed, using canned line: {err}");
                None
            }
        }
    }

    fn should_check(&self) -> bool {
        let session = self.session();
        session.is_monitoring && !session.is_dead() && session.mode == Mode::Productivity
    }

    /// Replaces any pending check with a loop that starts after `delay`.
    fn arm_checks(&self, delay: Duration) {
        let weak = Arc::downgrade(&self.inner);
        let interval = self.inner.config.check_interval();
        self.inner
            .scheduler
            .schedule_after(delay, check_loop(weak, interval));
    }

    async fn run_scheduled_check(&self) {
        let _turn = self.inner.check_gate.lock().await;
        if !self.should_check() {
            return;
        }
        let Some(image) = self.capture_image().await else {
            return;
        };
        self.refresh_fingerprint(&image).await;
        self.classify_and_update(&image).await;
    }

    /// Check triggered by a window change, skipped if another check is in flight.
    async fn run_window_check(&self, image: Option<&CapturedImage>) {
        let Ok(_turn) = self.inner.check_gate.try_lock() else {
            log_debug!("window change ignored: check already in flight");
            return;
        };
        if self.session().is_dead() {
            return;
        }
        match image {
            Some(image) => self.classify_and_update(image).await,
            None => {
                if let Some(image) = self.capture_image().await {
                    self.classify_and_update(&image).await;
                }
            }
        }
    }

    async fn capture_image(&self) -> Option<CapturedImage> {
        let Some(source) = self.capture_source() else {
            log_error!("no screenshot source available for check");
            self.stop_monitoring();
            self.notify_current(Some(MSG_NO_CAPTURE), true);
            return None;
        };

        let captured = match source.capture().await {
            Ok(data_uri) => CapturedImage::from_data_uri(&data_uri),
            Err(err) => Err(err),
        };

        match captured {
            Ok(image) => {
                self.session().capture_failures = 0;
                Some(image)
            }
            Err(err) => {
                let limit = self.inner.config.max_capture_failures.max(1);
                let (give_up, snapshot) = self.mutate(|session| {
                    session.capture_failures += 1;
                    let give_up = session.is_monitoring && session.capture_failures >= limit;
                    if give_up {
                        session.end_monitoring();
                    }
                    give_up
                });
                if give_up {
                    log_error!("screen capture failed {limit} times in a row, stopping: {err}");
                    self.inner.scheduler.cancel_scheduled();
                    self.notify(&snapshot, Some(MSG_CAPTURE_GAVE_UP), true);
                } else {
                    log_warn!("screen capture failed: {err}");
                    self.notify(&snapshot, Some(MSG_CAPTURE_FAILED), false);
                }
                None
            }
        }
    }

    /// Keeps the hash poller's baseline in step with scheduled captures.
    async fn refresh_fingerprint(&self, image: &CapturedImage) {
        if self.inner.config.window_change.strategy != WindowChangeStrategy::HashPolling {
            return;
        }
        let image = image.clone();
        match tokio::task::spawn_blocking(move || fingerprint(&image)).await {
            Ok(Some(current)) => self.session().last_fingerprint = Some(current),
            Ok(None) => {}
            Err(err) => log_warn!("fingerprint worker join failed: {err}"),
        }
    }

    /// Compares a fresh fingerprint to the stored one and keeps the fresh one.
    pub fn record_fingerprint(&self, current: String) -> FingerprintVerdict {
        let threshold = self.inner.config.window_change.hash_threshold;
        let mut session = self.session();
        let verdict = compare_fingerprint(session.last_fingerprint.as_deref(), &current, threshold);
        session.last_fingerprint = Some(current);
        verdict
    }

    /// Hash poller detected a different window.
    pub async fn on_window_changed(&self, image: &CapturedImage) {
        if !self.should_check() {
            log_debug!("window change detected, but not analyzing (monitoring off, relax mode or dead)");
            return;
        }
        self.run_window_check(Some(image)).await;
    }

    /// Handles a foreground application report; genuine changes trigger a
    /// check whether or not periodic monitoring is running.
    pub async fn notify_active_window(&self, event: &ActiveWindowEvent) {
        let changed = self.session().window_debounce.observe(event, Instant::now());
        let Some(app) = changed else {
            return;
        };
        log_info!("Foreground application changed to {app}");
        self.run_window_check(None).await;
    }

    /// Starts the configured hash-polling watcher. The active-window
    /// strategy starts through [`Self::attach_active_window_feed`].
    pub fn start_window_detection(&self) -> bool {
        if self.inner.config.window_change.strategy != WindowChangeStrategy::HashPolling {
            return false;
        }
        let Some(source) = self.capture_source() else {
            log_debug!("window change detection needs a screenshot source");
            return false;
        };
        lock(&self.inner.watcher).start_hash_polling(
            self.clone(),
            source,
            self.inner.config.poll_interval(),
        )
    }

    pub fn attach_active_window_feed(&self, events: mpsc::Receiver<ActiveWindowEvent>) -> bool {
        if self.inner.config.window_change.strategy != WindowChangeStrategy::ActiveWindow {
            log_warn!(
                "active window feed ignored: strategy is {:?}",
                self.inner.config.window_change.strategy
            );
            return false;
        }
        lock(&self.inner.watcher).start_active_window(self.clone(), events)
    }

    pub fn stop_window_detection(&self) -> bool {
        let stopped = lock(&self.inner.watcher).stop();
        let mut session = self.session();
        session.last_fingerprint = None;
        session.window_debounce.reset();
        stopped
    }

    pub fn is_window_detection_active(&self) -> bool {
        lock(&self.inner.watcher).is_active()
    }

    /// Cancels every background task owned by the engine.
    pub fn shutdown(&self) {
        self.inner.scheduler.cancel_scheduled();
        self.stop_window_detection();
    }
}

/// Greeting shown after a mode switch.
fn greeting(session: &Session) -> String {
    let catalog = PersonalityCatalog;
    let mut rng = rand::thread_rng();
    if session.is_dead() {
        return pick_random(catalog.dead_pool(session.personality), &mut rng).to_string();
    }
    let profile = catalog.profile(session.personality);
    match session.mode {
        Mode::Productivity => pick_random(profile.productive, &mut rng).to_string(),
        Mode::Relax => profile.relax_message.to_string(),
    }
}

async fn check_loop(engine: Weak<EngineInner>, interval: Duration) {
    loop {
        let Some(inner) = engine.upgrade() else {
            break;
        };
        let engine_ref = MonitoringEngine { inner };
        if !engine_ref.should_check() {
            log_debug!("check loop exiting (monitoring off or dead)");
            break;
        }
        engine_ref.run_scheduled_check().await;
        drop(engine_ref);
        time::sleep(interval).await;
    }
}

/// Re-arms monitoring when a chat finishes, however it finishes.
struct ResumeAfterChat {
    engine: MonitoringEngine,
}

impl Drop for ResumeAfterChat {
    fn drop(&mut self) {
        self.engine.resume_after_chat();
    }
}
