//! Applies agent actions to the session, cart, and menu board, left to right.
//!
//! Each action is independent: an unknown tag, a malformed payload, or an
//! unmet precondition skips that one action and the rest still run.

use crate::action::{Action, ActionError};
use crate::menu::{MenuBoard, MenuItem};
use crate::payment::OrderRequest;
use crate::screen::ScreenState;
use crate::session::Session;
use serde_json::Value;
use tracing::{debug, info, warn};

/// What one response's action list did.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DispatchReport {
    /// Actions that parsed and were applied (including valid no-ops).
    pub applied: usize,
    /// Actions skipped because they were unknown, malformed, or unmet.
    pub skipped: usize,
    /// Of the skipped, how many carried a tag the protocol does not define.
    pub unknown: usize,
    /// True when any action moved the screen.
    pub navigated: bool,
    /// Cart read-back requested by `READ_BACK_SUMMARY`.
    pub summary: Option<String>,
    /// Order to submit, present only when `ORDER` ran against a non-empty cart.
    pub order: Option<OrderRequest>,
}

impl DispatchReport {
    pub fn is_empty(&self) -> bool {
        self.applied == 0 && self.skipped == 0
    }
}

/// Outcome of a single action inside the dispatcher.
enum Step {
    Applied,
    Skipped(&'static str),
}

#[derive(Debug, Clone)]
pub struct ActionDispatcher {
    empty_cart_phrase: String,
}

impl Default for ActionDispatcher {
    fn default() -> Self {
        Self::new("장바구니가 비어 있어요.")
    }
}

impl ActionDispatcher {
    pub fn new(empty_cart_phrase: impl Into<String>) -> Self {
        Self {
            empty_cart_phrase: empty_cart_phrase.into(),
        }
    }

    /// Parse and apply a raw action list as received from the agent.
    pub fn apply(&self, session: &mut Session, menu: &mut MenuBoard, raw: &[Value]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for (index, value) in raw.iter().enumerate() {
            match Action::parse(value) {
                Ok(action) => self.apply_one(session, menu, &action, &mut report),
                Err(ActionError::Unknown(kind)) => {
                    debug!("action[{}]: ignoring unknown type {}", index, kind);
                    report.skipped += 1;
                    report.unknown += 1;
                }
                Err(e) => {
                    warn!("action[{}]: skipped: {}", index, e);
                    report.skipped += 1;
                }
            }
        }
        report
    }

    /// Apply already-typed actions.
    pub fn apply_actions(&self, session: &mut Session, menu: &mut MenuBoard, actions: &[Action]) -> DispatchReport {
        let mut report = DispatchReport::default();
        for action in actions {
            self.apply_one(session, menu, action, &mut report);
        }
        report
    }

    fn apply_one(&self, session: &mut Session, menu: &mut MenuBoard, action: &Action, report: &mut DispatchReport) {
        match self.step(session, menu, action, report) {
            Step::Applied => {
                debug!("action {} applied", action.kind());
                report.applied += 1;
            }
            Step::Skipped(why) => {
                warn!("action {} skipped: {}", action.kind(), why);
                report.skipped += 1;
            }
        }
    }

    fn step(&self, session: &mut Session, menu: &mut MenuBoard, action: &Action, report: &mut DispatchReport) -> Step {
        // Done is terminal until the visit is reset; the paid cart is read-only.
        if session.screen.is_done() && !matches!(action, Action::ReadBackSummary {}) {
            return Step::Skipped("order already completed");
        }
        match action {
            Action::Navigate { target } => match ScreenState::from_target(target) {
                Some(to) => {
                    report.navigated |= session.screen.transition(to);
                    Step::Applied
                }
                None => Step::Skipped("empty navigation target"),
            },

            Action::ShowRecommendations { items } => {
                let names: Vec<&str> = items.iter().map(|r| r.name()).collect();
                let moved = menu.prioritize(&names);
                debug!("recommendations: {} of {} named items on the board", moved, names.len());
                report.navigated |= session.screen.transition(ScreenState::Menu);
                Step::Applied
            }

            Action::SelectMenuByName { name } => {
                match menu.find_by_name(name) {
                    Some(item) => {
                        info!("selected {} ({})", item.name, item.id);
                        session.pending_item_id = Some(item.id.clone());
                    }
                    None => debug!("no menu item matches {:?}", name),
                }
                Step::Applied
            }

            Action::SetQty { value } => {
                let Some(quantity) = quantity_from(*value) else {
                    return Step::Skipped("quantity must be a finite number of at least 1");
                };
                let Some(item) = pending_item(session, menu) else {
                    return Step::Skipped("no pending item");
                };
                session.cart.add_or_set_quantity(&item, quantity);
                Step::Applied
            }

            Action::IncrementQty {} => {
                let Some(item) = pending_item(session, menu) else {
                    return Step::Skipped("no pending item");
                };
                if session.cart.adjust_quantity(&item.id, 1).is_none() {
                    session.cart.add_or_set_quantity(&item, 1);
                }
                Step::Applied
            }

            Action::DecrementQty {} => {
                let Some(id) = session.pending_item_id.clone() else {
                    return Step::Skipped("no pending item");
                };
                // Absent entry: valid no-op, decrements never create.
                session.cart.adjust_quantity(&id, -1);
                Step::Applied
            }

            Action::AddToCart {} => {
                let Some(item) = pending_item(session, menu) else {
                    return Step::Skipped("no pending item");
                };
                session.cart.add_if_absent(&item);
                Step::Applied
            }

            Action::RemoveFromCart { id } => {
                if session.cart.remove(id).is_none() {
                    debug!("remove: {} not in cart", id);
                }
                Step::Applied
            }

            Action::ReadBackSummary {} => {
                report.summary = Some(session.cart.summary(&self.empty_cart_phrase));
                Step::Applied
            }

            Action::Order {} => {
                if session.cart.is_empty() {
                    info!("ORDER ignored: cart is empty");
                } else {
                    report.order = Some(OrderRequest::from_cart(&session.store, &session.cart));
                }
                Step::Applied
            }
        }
    }
}

/// Truncate a positive finite quantity; anything below 1 after truncation is invalid.
fn quantity_from(value: f64) -> Option<u32> {
    if !value.is_finite() {
        return None;
    }
    let whole = value.trunc();
    if whole < 1.0 || whole > f64::from(u32::MAX) {
        return None;
    }
    Some(whole as u32)
}

/// The pending item, resolved against the board first and the cart second
/// (the board can be reloaded between turns while the cart line survives).
fn pending_item(session: &Session, menu: &MenuBoard) -> Option<MenuItem> {
    let id = session.pending_item_id.as_deref()?;
    if let Some(item) = menu.get(id) {
        return Some(item.clone());
    }
    session
        .cart
        .get(id)
        .map(|line| MenuItem::new(line.id.clone(), line.name.clone(), line.price))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn menu() -> MenuBoard {
        MenuBoard::new(vec![
            MenuItem::new("1", "불고기정식", 15000),
            MenuItem::new("2", "김치찌개", 12000),
            MenuItem::new("5", "냉면", 14000),
        ])
    }

    fn session() -> Session {
        Session::new("옥소반 마곡본점")
    }

    #[test]
    fn quantity_conversion() {
        assert_eq!(quantity_from(2.0), Some(2));
        assert_eq!(quantity_from(2.9), Some(2));
        assert_eq!(quantity_from(0.5), None);
        assert_eq!(quantity_from(-1.0), None);
        assert_eq!(quantity_from(f64::NAN), None);
        assert_eq!(quantity_from(f64::INFINITY), None);
    }

    #[test]
    fn select_then_set_quantity() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        let report = dispatcher.apply(
            &mut session,
            &mut menu,
            &[
                json!({"type": "SELECT_MENU_BY_NAME", "name": "불고기정식"}),
                json!({"type": "SET_QTY", "value": 2}),
            ],
        );
        assert_eq!(report.applied, 2);
        assert_eq!(session.cart.get("1").map(|l| l.quantity), Some(2));
        assert_eq!(session.cart.total(), 30000);
    }

    #[test]
    fn set_quantity_without_pending_is_skipped() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        let report = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "SET_QTY", "value": 2})]);
        assert_eq!(report.skipped, 1);
        assert!(session.cart.is_empty());
    }

    #[test]
    fn unmatched_selection_keeps_previous_pending() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        session.pending_item_id = Some("2".into());
        dispatcher.apply(&mut session, &mut menu, &[json!({"type": "SELECT_MENU_BY_NAME", "name": "피자"})]);
        assert_eq!(session.pending_item_id.as_deref(), Some("2"));
    }

    #[test]
    fn increment_creates_decrement_does_not() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        session.pending_item_id = Some("5".into());

        dispatcher.apply(&mut session, &mut menu, &[json!({"type": "DECREMENT_QTY"})]);
        assert!(session.cart.is_empty());

        dispatcher.apply(&mut session, &mut menu, &[json!({"type": "INCREMENT_QTY"}), json!({"type": "INCREMENT_QTY"})]);
        assert_eq!(session.cart.get("5").map(|l| l.quantity), Some(2));
    }

    #[test]
    fn add_to_cart_never_resets_quantity() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        session.pending_item_id = Some("1".into());
        dispatcher.apply(&mut session, &mut menu, &[json!({"type": "SET_QTY", "value": 3}), json!({"type": "ADD_TO_CART"})]);
        assert_eq!(session.cart.get("1").map(|l| l.quantity), Some(3));
    }

    #[test]
    fn recommendations_reorder_and_open_menu() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        let report = dispatcher.apply(
            &mut session,
            &mut menu,
            &[json!({"type": "SHOW_RECOMMENDATIONS", "items": [{"name": "냉면", "reason": "시원해요"}]})],
        );
        assert!(report.navigated);
        assert_eq!(session.screen(), ScreenState::Menu);
        assert_eq!(menu.names(), vec!["냉면", "불고기정식", "김치찌개"]);
    }

    #[test]
    fn order_requires_items() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        let report = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "ORDER"})]);
        assert!(report.order.is_none());

        session.cart.add_or_set_quantity(&MenuItem::new("2", "김치찌개", 12000), 2);
        let report = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "ORDER"})]);
        let order = report.order.unwrap();
        assert_eq!(order.store, "옥소반 마곡본점");
        assert_eq!(order.total(), 24000);
    }

    #[test]
    fn read_back_does_not_mutate() {
        let dispatcher = ActionDispatcher::new("비어 있어요");
        let mut session = session();
        let mut menu = menu();
        let report = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "READ_BACK_SUMMARY"})]);
        assert_eq!(report.summary.as_deref(), Some("비어 있어요"));
        assert!(session.cart.is_empty());
    }

    #[test]
    fn numeric_ids_reach_cart_and_board() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        session.cart.add_or_set_quantity(&MenuItem::new("2", "김치찌개", 12000), 1);
        session.cart.add_or_set_quantity(&MenuItem::new("5", "냉면", 14000), 1);

        let report = dispatcher.apply(
            &mut session,
            &mut menu,
            &[
                json!({"type": "REMOVE_FROM_CART", "id": 2}),
                json!({"type": "SHOW_RECOMMENDATIONS", "items": [{"name": "냉면", "menu_id": 5, "price": 14000}]}),
            ],
        );
        assert_eq!(report.skipped, 0);
        assert!(session.cart.get("2").is_none());
        assert_eq!(session.cart.total(), 14000);
        assert_eq!(session.screen(), ScreenState::Menu);
        assert_eq!(menu.names()[0], "냉면");
    }

    #[test]
    fn completed_order_is_not_resubmitted() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        session.cart.add_or_set_quantity(&MenuItem::new("5", "냉면", 14000), 1);
        session.screen.transition(ScreenState::Done);

        let report = dispatcher.apply(
            &mut session,
            &mut menu,
            &[
                json!({"type": "NAVIGATE", "target": "home"}),
                json!({"type": "SHOW_RECOMMENDATIONS", "items": ["김치찌개"]}),
                json!({"type": "REMOVE_FROM_CART", "id": "5"}),
                json!({"type": "ORDER"}),
                json!({"type": "READ_BACK_SUMMARY"}),
            ],
        );
        assert!(report.order.is_none());
        assert!(!report.navigated);
        assert_eq!(report.skipped, 4);
        assert_eq!(report.applied, 1);
        assert!(report.summary.is_some());
        assert_eq!(session.screen(), ScreenState::Done);
        assert_eq!(session.cart.total(), 14000);

        session.reset();
        session.cart.add_or_set_quantity(&MenuItem::new("2", "김치찌개", 12000), 1);
        let report = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "ORDER"})]);
        assert_eq!(report.order.map(|o| o.total()), Some(12000));
    }

    #[test]
    fn empty_navigation_target_is_malformed() {
        let dispatcher = ActionDispatcher::default();
        let mut session = session();
        let mut menu = menu();
        let report = dispatcher.apply(&mut session, &mut menu, &[json!({"type": "NAVIGATE", "target": ""})]);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.unknown, 0);
        assert_eq!(session.screen(), ScreenState::Intro);
    }
}
