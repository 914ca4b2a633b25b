//! Kiosk Orchestrator - the turn loop
//!
//! One value owns everything a turn touches: the visit [`Session`], the menu
//! board, the speech session, and speech output. It is driven through `&mut
//! self`, so each finalized utterance is handled to completion before the
//! next one is read.
//!
//! Per utterance:
//! 1. local keyword shortcuts (screen moves, stop listening)
//! 2. the raw utterance goes to the dialogue agent with store and cart context
//! 3. the agent's actions are applied by the dispatcher
//! 4. the reply (plus read-back summary, order result, follow-up) is spoken

use crate::error::VoiceResult;
use crate::output::SpeechOutput;
use crate::session::{IdleReason, SpeechEvent, SpeechSession};
use chrono::{DateTime, Utc};
use kiosk_core::{
    load_board, ActionDispatcher, AgentTurnRequest, CatalogSource, DialogueClient,
    DialogueOutcome, KioskConfig, LocalIntent, MenuBoard, OrderRequest, PaymentGateway,
    Phrases, Profile, ScreenState, Session, ShortcutConfig, ShortcutMatcher, ShortcutOutcome,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Stage value the agent uses when it needs the customer to clarify.
const CLARIFY_STAGE: &str = "clarify";

/// Configuration for the orchestrator
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub store: String,
    pub phrases: Phrases,
    pub shortcuts: ShortcutConfig,
    pub follow_up_enabled: bool,
    pub profile: Option<Profile>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self::from(&KioskConfig::default())
    }
}

impl From<&KioskConfig> for OrchestratorConfig {
    fn from(config: &KioskConfig) -> Self {
        Self {
            store: config.store.clone(),
            phrases: config.phrases.clone(),
            shortcuts: config.shortcuts.clone(),
            follow_up_enabled: config.follow_up_enabled,
            profile: None,
        }
    }
}

/// "Have we already nudged the customer for this utterance?"
///
/// Reset once per finalized utterance, never in the middle of one.
#[derive(Debug, Default)]
pub struct FollowUpGate {
    nudged: bool,
}

impl FollowUpGate {
    pub fn reset(&mut self) {
        self.nudged = false;
    }

    /// True the first time it is called after a reset.
    pub fn try_nudge(&mut self) -> bool {
        !std::mem::replace(&mut self.nudged, true)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    Replied {
        stage: String,
        applied: usize,
        skipped: usize,
    },
    /// The dialogue service could not be reached; the apology was spoken.
    Unreachable(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderStatus {
    NotRequested,
    Completed { total: u64 },
    Failed(String),
}

/// What one utterance did, for the caller's logs and tests.
#[derive(Debug, Clone)]
pub struct TurnReport {
    pub utterance: String,
    pub shortcut: ShortcutOutcome,
    pub outcome: TurnOutcome,
    /// Everything spoken for this turn, in one utterance.
    pub spoken: Option<String>,
    pub follow_up: Option<String>,
    pub screen: ScreenState,
    pub cart_total: u64,
    pub order: OrderStatus,
    pub at: DateTime<Utc>,
}

/// Turns handled during one listening session and why it ended.
#[derive(Debug, Clone, Default)]
pub struct ListenSummary {
    pub turns: Vec<TurnReport>,
    pub reason: Option<IdleReason>,
}

impl ListenSummary {
    /// The recognizer has no more input and nothing was said.
    pub fn exhausted(&self) -> bool {
        self.turns.is_empty() && self.reason == Some(IdleReason::Ended)
    }
}

pub struct Orchestrator {
    config: OrchestratorConfig,
    session: Session,
    menu: MenuBoard,
    speech: SpeechSession,
    output: SpeechOutput,
    dialogue: Arc<dyn DialogueClient>,
    payment: Arc<dyn PaymentGateway>,
    catalog: Option<Arc<dyn CatalogSource>>,
    shortcuts: ShortcutMatcher,
    dispatcher: ActionDispatcher,
    follow_up: FollowUpGate,
    keep_listening: bool,
}

impl Orchestrator {
    pub fn new(
        config: OrchestratorConfig,
        speech: SpeechSession,
        output: SpeechOutput,
        dialogue: Arc<dyn DialogueClient>,
        payment: Arc<dyn PaymentGateway>,
    ) -> Self {
        info!("🎭 Initializing kiosk orchestrator for {}", config.store);
        let shortcuts = ShortcutMatcher::new(config.shortcuts.clone());
        let dispatcher = ActionDispatcher::new(config.phrases.empty_cart.clone());
        Self {
            session: Session::new(config.store.clone()),
            config,
            menu: MenuBoard::default(),
            speech,
            output,
            dialogue,
            payment,
            catalog: None,
            shortcuts,
            dispatcher,
            follow_up: FollowUpGate::default(),
            keep_listening: true,
        }
    }

    pub fn with_catalog(mut self, catalog: Arc<dyn CatalogSource>) -> Self {
        self.catalog = Some(catalog);
        self
    }

    pub fn with_menu(mut self, menu: MenuBoard) -> Self {
        self.menu = menu;
        self
    }

    /// Refresh the board from the catalog, if one is attached. A failing
    /// catalog leaves an empty board.
    pub async fn load_menu(&mut self) -> usize {
        if let Some(catalog) = &self.catalog {
            self.menu = load_board(catalog.as_ref(), &self.config.store).await;
        }
        self.menu.len()
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn menu(&self) -> &MenuBoard {
        &self.menu
    }

    pub fn screen(&self) -> ScreenState {
        self.session.screen()
    }

    pub fn is_speaking(&self) -> bool {
        self.output.is_speaking()
    }

    /// False once the customer asked to stop listening.
    pub fn wants_listening(&self) -> bool {
        self.keep_listening
    }

    /// Start a listening session. Playback is cancelled first so the kiosk
    /// never talks over the customer.
    pub async fn start_listening(&mut self) -> VoiceResult<bool> {
        if self.output.cancel() {
            debug!("playback cancelled for new listening session");
        }
        self.keep_listening = true;
        self.speech.start().await
    }

    /// Start listening, retrying a failing speech provider after `delay`.
    /// The last error is returned once `attempts` tries have failed.
    pub async fn start_listening_with_retry(&mut self, attempts: u32, delay: Duration) -> VoiceResult<bool> {
        let attempts = attempts.max(1);
        let mut tried = 0;
        loop {
            match self.start_listening().await {
                Ok(started) => return Ok(started),
                Err(e) => {
                    tried += 1;
                    if tried >= attempts {
                        return Err(e);
                    }
                    warn!("could not start listening (attempt {}/{}): {}", tried, attempts, e);
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    pub async fn stop_listening(&mut self) -> VoiceResult<()> {
        self.speech.stop().await
    }

    /// Wait for the current reply to finish playing.
    pub async fn wait_for_speech(&mut self) {
        self.output.wait_until_done().await;
    }

    /// Begin a new visit: fresh session, reloaded menu.
    pub async fn reset_visit(&mut self) {
        self.output.cancel();
        self.session.reset();
        self.follow_up.reset();
        self.load_menu().await;
        info!("🆕 new visit {}", self.session.session_id);
    }

    /// Drive the speech session until it goes idle, handling every final utterance.
    pub async fn run_until_idle(&mut self) -> ListenSummary {
        let mut summary = ListenSummary::default();
        while let Some(event) = self.speech.next_event().await {
            match event {
                SpeechEvent::Listening => debug!("listening"),
                SpeechEvent::Interim(text) => debug!("interim: {}", text),
                SpeechEvent::Final(text) => {
                    let report = self.handle_utterance(&text).await;
                    summary.turns.push(report);
                }
                SpeechEvent::Idle(reason) => summary.reason = Some(reason),
            }
        }
        summary
    }

    /// Handle one finalized utterance end to end.
    pub async fn handle_utterance(&mut self, utterance: &str) -> TurnReport {
        self.follow_up.reset();
        let utterance = utterance.trim().to_string();
        info!("🗣️ utterance: {}", utterance);

        let shortcut = self.shortcuts.apply(&utterance, &mut self.session.screen);
        if shortcut.screen_changed {
            info!("⚡ shortcut moved screen to {}", self.session.screen());
        }
        if shortcut.contains(LocalIntent::StopListening) {
            self.keep_listening = false;
            if let Err(e) = self.speech.stop().await {
                warn!("stop listening failed: {}", e);
            }
        }

        let request = AgentTurnRequest {
            session_id: self.session.session_id.clone(),
            message: utterance.clone(),
            store: self.session.store.clone(),
            selected_names: self.session.cart.names(),
            profile: self.config.profile.clone(),
        };

        let reply = match self.dialogue.send(&request).await {
            DialogueOutcome::Reply(reply) => reply,
            DialogueOutcome::Unreachable(reason) => {
                let apology = self.config.phrases.apology.clone();
                self.output.speak(&apology);
                return self.report(
                    utterance,
                    shortcut,
                    TurnOutcome::Unreachable(reason),
                    Some(apology),
                    None,
                    OrderStatus::NotRequested,
                );
            }
        };

        let dispatch = self
            .dispatcher
            .apply(&mut self.session, &mut self.menu, &reply.actions);
        debug!(
            "dispatch: applied={} skipped={} unknown={}",
            dispatch.applied, dispatch.skipped, dispatch.unknown
        );

        let mut parts: Vec<String> = Vec::new();
        if !reply.speak.is_empty() {
            parts.push(reply.speak.clone());
        }
        if let Some(summary) = &dispatch.summary {
            parts.push(summary.clone());
        }

        let order = match &dispatch.order {
            Some(request) => self.complete_order(request).await,
            None => OrderStatus::NotRequested,
        };
        match &order {
            OrderStatus::Completed { .. } => parts.push(self.config.phrases.order_complete.clone()),
            OrderStatus::Failed(_) => parts.push(self.config.phrases.order_failed.clone()),
            OrderStatus::NotRequested => {}
        }

        let ambiguous = reply.stage.eq_ignore_ascii_case(CLARIFY_STAGE)
            || (dispatch.unknown > 0 && dispatch.applied == 0);
        let unanswered = !reply.has_actions() && !shortcut.screen_changed;
        let mut follow_up = None;
        if self.config.follow_up_enabled && (unanswered || ambiguous) && self.follow_up.try_nudge() {
            follow_up = self
                .config
                .phrases
                .follow_up_for(self.session.screen())
                .map(str::to_string);
        }
        if let Some(prompt) = &follow_up {
            parts.push(prompt.clone());
        }

        let spoken = (!parts.is_empty()).then(|| parts.join(" "));
        if let Some(text) = &spoken {
            self.output.speak(text);
        }

        let outcome = TurnOutcome::Replied {
            stage: reply.stage,
            applied: dispatch.applied,
            skipped: dispatch.skipped,
        };
        self.report(utterance, shortcut, outcome, spoken, follow_up, order)
    }

    async fn complete_order(&mut self, request: &OrderRequest) -> OrderStatus {
        match self.payment.submit(request).await {
            Ok(()) => {
                let total = request.total();
                self.session.screen.transition(ScreenState::Done);
                info!("✅ order complete: {} lines, total {}", request.items.len(), total);
                OrderStatus::Completed { total }
            }
            Err(e) => {
                warn!("order failed: {}", e);
                OrderStatus::Failed(e.to_string())
            }
        }
    }

    fn report(
        &self,
        utterance: String,
        shortcut: ShortcutOutcome,
        outcome: TurnOutcome,
        spoken: Option<String>,
        follow_up: Option<String>,
        order: OrderStatus,
    ) -> TurnReport {
        TurnReport {
            utterance,
            shortcut,
            outcome,
            spoken,
            follow_up,
            screen: self.session.screen(),
            cart_total: self.session.cart.total(),
            order,
            at: Utc::now(),
        }
    }
}
