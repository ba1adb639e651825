//! Guided dialogue state machine.
//!
//! The executor is stateless: the session carries the active flow and step,
//! and flow definitions are read-only reference data.

use serde_json::Value;
use tracing::debug;

use crate::core::{ConversationFlow, FlowStep, Session};
use crate::error::FlowError;

/// Closing line used when a flow has no completion message.
pub const DEFAULT_COMPLETION_MESSAGE: &str =
    "¡Gracias! Hemos recibido tus datos. Un miembro del equipo se pondrá en contacto contigo pronto.";

/// Result of advancing a flow by one answer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FlowOutcome {
    /// Next prompt, or the closing line when `completed`.
    pub message: String,
    /// Whether the flow finished with this answer.
    pub completed: bool,
    /// Answers collected during the flow, keyed by step id. Only populated
    /// when `completed`, since the session's copy is cleared.
    pub collected: serde_json::Map<String, Value>,
}

/// Advances sessions through [`ConversationFlow`] definitions.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlowExecutor;

impl FlowExecutor {
    /// Enters `flow` at its first step and returns that step's prompt.
    ///
    /// Resets the session's flow data.
    pub fn start(&self, session: &mut Session, flow: &ConversationFlow) -> Result<String, FlowError> {
        let first = flow.first_step().ok_or_else(|| FlowError::EmptyFlow {
            flow_id: flow.id.clone(),
        })?;
        session.enter_flow(&flow.id, &first.id);
        debug!(flow_id = %flow.id, step_id = %first.id, "flow started");
        Ok(first.prompt())
    }

    /// Records `input` for the current step and moves to the next one.
    ///
    /// On completion the session leaves the flow. On error the session is
    /// left untouched; the caller decides whether to abandon the flow.
    pub fn advance(
        &self,
        input: &str,
        session: &mut Session,
        flows: &[ConversationFlow],
    ) -> Result<FlowOutcome, FlowError> {
        let Some(active) = session.active_flow.clone() else {
            return Err(FlowError::UnknownFlow {
                flow_id: String::new(),
            });
        };

        let flow = flows
            .iter()
            .find(|f| f.id == active.flow_id)
            .ok_or_else(|| FlowError::UnknownFlow {
                flow_id: active.flow_id.clone(),
            })?;
        let step = flow.step(&active.step_id).ok_or_else(|| FlowError::UnknownStep {
            flow_id: flow.id.clone(),
            step_id: active.step_id.clone(),
        })?;

        let (recorded, next) = resolve(flow, step, input)?;
        session
            .flow_data
            .insert(step.id.clone(), Value::String(recorded));

        if let Some(next) = next {
            session.enter_step(&next.id);
            debug!(flow_id = %flow.id, step_id = %next.id, "flow advanced");
            return Ok(FlowOutcome {
                message: next.prompt(),
                completed: false,
                collected: serde_json::Map::new(),
            });
        }

        let collected = session.flow_data.drain().collect();
        session.clear_flow();
        debug!(flow_id = %flow.id, "flow completed");
        Ok(FlowOutcome {
            message: flow
                .completion_message
                .clone()
                .filter(|m| !m.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_COMPLETION_MESSAGE.to_string()),
            completed: true,
            collected,
        })
    }
}

/// Value to record and the step to move to, if any.
fn resolve<'f>(
    flow: &'f ConversationFlow,
    step: &FlowStep,
    input: &str,
) -> Result<(String, Option<&'f FlowStep>), FlowError> {
    let answer = input.trim();
    let chosen = choose_option(step, answer);

    let target = chosen
        .and_then(|o| o.next_step_id.as_deref())
        .or(step.next_step_id.as_deref());

    let next = match target {
        Some(id) => Some(flow.step(id).ok_or_else(|| FlowError::UnknownStep {
            flow_id: flow.id.clone(),
            step_id: id.to_string(),
        })?),
        None => flow.step_after(&step.id),
    };

    let recorded = chosen.map_or_else(|| answer.to_string(), |o| o.recorded_value().to_string());
    Ok((recorded, next))
}

/// Option picked by 1-based number, value, or label (case-insensitive).
fn choose_option<'s>(step: &'s FlowStep, answer: &str) -> Option<&'s crate::core::FlowOption> {
    if let Ok(n) = answer.parse::<usize>() {
        if let Some(option) = n.checked_sub(1).and_then(|i| step.options.get(i)) {
            return Some(option);
        }
    }
    let folded = answer.to_lowercase();
    step.options.iter().find(|o| {
        o.label.to_lowercase() == folded
            || o.value.as_deref().is_some_and(|v| v.to_lowercase() == folded)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::{FlowOption, FlowStepType};

    fn booking_flow() -> ConversationFlow {
        ConversationFlow {
            id: "booking".to_string(),
            name: "Reserva".to_string(),
            trigger_keywords: vec!["reservar".to_string()],
            steps: vec![
                FlowStep::question("name", "¿Cómo te llamas?"),
                FlowStep {
                    id: "class".to_string(),
                    step_type: FlowStepType::Options,
                    content: "¿Qué clase te interesa?".to_string(),
                    options: vec![
                        FlowOption {
                            label: "Yoga".to_string(),
                            value: Some("yoga".to_string()),
                            next_step_id: Some("yoga_level".to_string()),
                        },
                        FlowOption {
                            label: "Spinning".to_string(),
                            value: None,
                            next_step_id: None,
                        },
                    ],
                    next_step_id: Some("time".to_string()),
                },
                FlowStep::question("yoga_level", "¿Qué nivel tienes?"),
                FlowStep::question("time", "¿A qué hora?"),
            ],
            completion_message: Some("¡Reserva anotada!".to_string()),
            enabled: true,
        }
    }

    fn started(flow: &ConversationFlow) -> Session {
        let mut session = Session::new("s", "c");
        session.flow_data.insert("stale".to_string(), Value::Bool(true));
        FlowExecutor
            .start(&mut session, flow)
            .unwrap_or_else(|_| unreachable!());
        session
    }

    #[test]
    fn test_start_resets_data_and_enters_first_step() {
        let flow = booking_flow();
        let session = started(&flow);
        assert!(session.flow_data.is_empty());
        assert_eq!(session.current_flow_id(), Some("booking"));
        assert_eq!(session.current_step_id(), Some("name"));
    }

    #[test]
    fn test_start_empty_flow_fails() {
        let mut flow = booking_flow();
        flow.steps.clear();
        let mut session = Session::new("s", "c");
        let err = FlowExecutor.start(&mut session, &flow);
        assert_eq!(
            err,
            Err(FlowError::EmptyFlow {
                flow_id: "booking".to_string()
            })
        );
        assert!(session.active_flow.is_none());
    }

    #[test]
    fn test_option_by_number_branches() {
        let flow = booking_flow();
        let flows = vec![flow.clone()];
        let mut session = started(&flow);

        let out = FlowExecutor
            .advance("Ana", &mut session, &flows)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.message.contains("1. Yoga"));
        assert_eq!(session.current_step_id(), Some("class"));

        let out = FlowExecutor
            .advance("1", &mut session, &flows)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(out.message, "¿Qué nivel tienes?");
        assert_eq!(session.flow_data.get("class"), Some(&Value::String("yoga".to_string())));
    }

    #[test]
    fn test_option_by_label_falls_back_to_step_successor() {
        let flow = booking_flow();
        let flows = vec![flow.clone()];
        let mut session = started(&flow);
        session.enter_step("class");

        let out = FlowExecutor
            .advance("spinning", &mut session, &flows)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(out.message, "¿A qué hora?");
        assert_eq!(
            session.flow_data.get("class"),
            Some(&Value::String("Spinning".to_string()))
        );
    }

    #[test]
    fn test_completion_clears_flow_and_returns_data() {
        let flow = booking_flow();
        let flows = vec![flow.clone()];
        let mut session = started(&flow);
        session.enter_step("time");
        session
            .flow_data
            .insert("name".to_string(), Value::String("Ana".to_string()));

        let out = FlowExecutor
            .advance("18:00", &mut session, &flows)
            .unwrap_or_else(|_| unreachable!());
        assert!(out.completed);
        assert_eq!(out.message, "¡Reserva anotada!");
        assert_eq!(out.collected.get("time"), Some(&Value::String("18:00".to_string())));
        assert_eq!(out.collected.len(), 2);
        assert!(session.active_flow.is_none());
        assert!(session.flow_data.is_empty());
    }

    #[test]
    fn test_default_completion_message() {
        let mut flow = booking_flow();
        flow.completion_message = None;
        let flows = vec![flow.clone()];
        let mut session = started(&flow);
        session.enter_step("time");

        let out = FlowExecutor
            .advance("tarde", &mut session, &flows)
            .unwrap_or_else(|_| unreachable!());
        assert_eq!(out.message, DEFAULT_COMPLETION_MESSAGE);
    }

    #[test]
    fn test_unknown_flow_and_step() {
        let flow = booking_flow();
        let mut session = started(&flow);

        let err = FlowExecutor.advance("x", &mut session, &[]);
        assert!(matches!(err, Err(FlowError::UnknownFlow { .. })));
        assert_eq!(session.current_flow_id(), Some("booking"));

        session.enter_step("gone");
        let err = FlowExecutor.advance("x", &mut session, &[flow]);
        assert!(matches!(err, Err(FlowError::UnknownStep { .. })));
    }
}
