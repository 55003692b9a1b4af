use async_trait::async_trait;
use serde_json::{Value, json};
use std::time::Instant;
use tracing::{debug, info, warn};

use super::budget::turn_budget;
use super::context::AgentContext;
use super::error::AgentError;
use super::events::{CancelHandle, EventSink, StepEvent, StepKind};
use super::gaps::is_gap_error;
use super::parser::{ParsedTurn, ToolCall};
use super::prompt::{PromptSections, system_prompt};
use super::reflexion::{ReflexionTracker, refusal_message};
use super::safety::{RiskGate, is_mutating, verification_instruction};
use crate::application::approval::{ApprovalDecision, ApprovalRequest, ApprovalSubject};
use crate::application::planner::{PlanError, SubTaskRunner};
use crate::application::routing::{ToolAssembler, ToolSet};
use crate::application::validation::{
    EscalationDecision, Escalator, ValidationReport, partial_completion_report,
};
use crate::config::ProtocolMode;
use crate::domain::{
    ChatMessage, ExecutionTrace, FunctionCall, LogCategory, Scope, SubTask, ToolStatus, TraceBuilder,
};
use crate::infrastructure::tooling::invoke_with_retry;
use crate::text;

const EVENT_PREVIEW_CHARS: usize = 500;
const LOG_PREVIEW_CHARS: usize = 200;
/// Minimum successful calls before a run is remembered as an SOP.
const SOP_MIN_CALLS: usize = 2;

#[derive(Debug, Clone, Default)]
pub struct RunOptions {
    /// Scope id pinned by the caller; wins over routing when routable.
    pub pinned_scope: Option<String>,
    pub events: EventSink,
    pub cancel: CancelHandle,
    /// Overrides the tiered turn budget.
    pub max_turns: Option<u32>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Completed,
    Partial,
    Error,
    Cancelled,
}

impl RunStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            RunStatus::Completed => "completed",
            RunStatus::Partial => "partial",
            RunStatus::Error => "error",
            RunStatus::Cancelled => "cancelled",
        }
    }
}

#[derive(Debug, Clone)]
pub struct AgentOutcome {
    pub response: String,
    pub trace: ExecutionTrace,
    pub status: RunStatus,
    pub validation: Option<ValidationReport>,
    pub scope_id: Option<String>,
    pub escalations: u32,
}

/// What one model turn produced.
enum Turn {
    Answer(String),
    Calls {
        text: String,
        calls: Vec<PendingCall>,
        native: bool,
    },
}

struct PendingCall {
    id: String,
    call: ToolCall,
}

enum CallFlow {
    Continue(String),
    Cancel,
}

/// Mutable state of one run.
struct RunState {
    task: String,
    scope: Option<Scope>,
    messages: Vec<ChatMessage>,
    trace: TraceBuilder,
    toolset: ToolSet,
    reflexion: ReflexionTracker,
    sections: PromptSections,
    turn: u32,
    last_text: String,
    last_result: String,
    escalations: u32,
    prompt_stale: bool,
}

/// Runs one task: model turns, tool calls, validation and escalation.
pub struct ExecutionLoop {
    ctx: AgentContext,
    assembler: ToolAssembler,
    risk: RiskGate,
    escalator: Escalator,
}

impl ExecutionLoop {
    pub fn new(ctx: AgentContext) -> Self {
        let risk = RiskGate::from_config(&ctx.config);
        let escalator = Escalator::from_config(&ctx.config);
        Self {
            ctx,
            assembler: ToolAssembler::new(),
            risk,
            escalator,
        }
    }

    pub fn context(&self) -> &AgentContext {
        &self.ctx
    }

    /// Never fails: model errors and cancellation are reported through the
    /// outcome status.
    pub async fn run(&self, task: &str, options: RunOptions) -> AgentOutcome {
        let selection = self.assembler.prepare(
            &self.ctx.catalog,
            &self.ctx.scopes,
            task,
            options.pinned_scope.as_deref(),
        );
        let scope = selection.scope.clone();
        let scope_id = scope.as_ref().map(|scope| scope.id.clone());
        let toolset = ToolSet::new(&selection, self.ctx.catalog.clone());
        let mut budget = options
            .max_turns
            .unwrap_or_else(|| turn_budget(task, &self.ctx.config));
        info!(
            scope = scope_id.as_deref(),
            tools = toolset.tools().len(),
            filtered = toolset.is_filtered(),
            budget,
            "Agent run started"
        );
        self.ctx
            .memory
            .log(LogCategory::Action, &format!("task: {}", text::truncate(task, LOG_PREVIEW_CHARS)));

        let sections = PromptSections::gather(&self.ctx, task, scope.as_ref()).await;
        let mut state = RunState {
            task: task.to_string(),
            messages: vec![
                ChatMessage::system(system_prompt(self.ctx.config.protocol, toolset.tools(), &sections)),
                ChatMessage::user(task),
            ],
            trace: TraceBuilder::new(task, scope_id),
            scope,
            toolset,
            reflexion: ReflexionTracker::new(),
            sections,
            turn: 0,
            last_text: String::new(),
            last_result: String::new(),
            escalations: 0,
            prompt_stale: false,
        };
        let events = &options.events;

        loop {
            while state.turn < budget {
                if options.cancel.is_cancelled() {
                    return self.finish(state, RunStatus::Cancelled, AgentError::Cancelled.user_message(), None, events);
                }
                state.turn += 1;
                state.trace.set_turns(state.turn);
                if state.prompt_stale {
                    self.refresh_system_prompt(&mut state);
                }
                debug!(turn = state.turn, remaining = budget - state.turn, "Submitting agent turn to model");
                events.emit(StepEvent::new(StepKind::Thinking, state.turn, "Waiting for the model"));

                let turn = match self.model_turn(&state).await {
                    Ok(turn) => turn,
                    Err(err) => {
                        warn!(error = %err, turn = state.turn, "Model turn failed");
                        return self.finish(state, RunStatus::Error, err.user_message(), None, events);
                    }
                };

                match turn {
                    Turn::Answer(answer) if answer.trim().is_empty() => {
                        debug!(turn = state.turn, "Model produced no answer text");
                        break;
                    }
                    Turn::Answer(answer) => {
                        info!(turn = state.turn, "Agent returned final response");
                        return self.finish(state, RunStatus::Completed, answer, None, events);
                    }
                    Turn::Calls { text, calls, native } => {
                        if native && !text.trim().is_empty() {
                            state.last_text = text.clone();
                        }
                        if native {
                            let descriptors = calls
                                .iter()
                                .map(|pending| FunctionCall {
                                    id: pending.id.clone(),
                                    name: pending.call.name.clone(),
                                    arguments: pending.call.arguments.clone(),
                                })
                                .collect();
                            state.messages.push(ChatMessage::assistant_calls(text, descriptors));
                        } else {
                            state.messages.push(ChatMessage::assistant(text));
                        }
                        for pending in calls {
                            let content = match self.execute_call(&mut state, &pending.call, events).await {
                                CallFlow::Continue(content) => content,
                                CallFlow::Cancel => {
                                    info!(tool = %pending.call.name, "Run cancelled at approval");
                                    return self.finish(
                                        state,
                                        RunStatus::Cancelled,
                                        AgentError::Cancelled.user_message(),
                                        None,
                                        events,
                                    );
                                }
                            };
                            state.messages.push(if native {
                                ChatMessage::tool_result(pending.id, content)
                            } else {
                                ChatMessage::user(content)
                            });
                        }
                    }
                }
            }

            let report = self
                .ctx
                .validator()
                .validate(&state.task, &state.trace.snapshot(), last_output(&state), scope_metrics(&state))
                .await;
            match self.escalator.decide(&report, state.escalations) {
                EscalationDecision::Resume {
                    extra_turns,
                    instruction,
                } => {
                    state.escalations += 1;
                    budget += extra_turns;
                    info!(
                        rate = report.completion_rate,
                        escalation = state.escalations,
                        extra_turns,
                        "Escalating unfinished task"
                    );
                    state.messages.push(ChatMessage::user(instruction));
                }
                EscalationDecision::Stop if report.completed => {
                    let response = if state.last_text.trim().is_empty() {
                        report.summary.clone()
                    } else {
                        state.last_text.clone()
                    };
                    return self.finish(state, RunStatus::Completed, response, Some(report), events);
                }
                EscalationDecision::Stop => {
                    let response = partial_completion_report(&report, &state.last_text);
                    return self.finish(state, RunStatus::Partial, response, Some(report), events);
                }
            }
        }
    }

    async fn model_turn(&self, state: &RunState) -> Result<Turn, AgentError> {
        let timeout = self.ctx.config.model_timeout;
        match self.ctx.config.protocol {
            ProtocolMode::Text => {
                let reply = tokio::time::timeout(timeout, self.ctx.model.complete(&state.messages))
                    .await
                    .map_err(|_| AgentError::Timeout(timeout))??;
                Ok(match self.ctx.parser.parse(&reply) {
                    ParsedTurn::Calls(calls) => Turn::Calls {
                        text: reply,
                        calls: calls
                            .into_iter()
                            .enumerate()
                            .map(|(index, call)| PendingCall {
                                id: format!("call_{}_{index}", state.turn),
                                call,
                            })
                            .collect(),
                        native: false,
                    },
                    ParsedTurn::Final(answer) | ParsedTurn::Plain(answer) => Turn::Answer(answer),
                })
            }
            ProtocolMode::Native => {
                let response = tokio::time::timeout(
                    timeout,
                    self.ctx
                        .model
                        .stream(&state.messages, Some(state.toolset.tools())),
                )
                .await
                .map_err(|_| AgentError::Timeout(timeout))??;
                if response.function_calls.is_empty() {
                    return Ok(Turn::Answer(response.text));
                }
                Ok(Turn::Calls {
                    text: response.text,
                    calls: response
                        .function_calls
                        .into_iter()
                        .map(|function| PendingCall {
                            id: function.id,
                            call: ToolCall::new(function.name, normalize_arguments(function.arguments)),
                        })
                        .collect(),
                    native: true,
                })
            }
        }
    }

    async fn execute_call(&self, state: &mut RunState, call: &ToolCall, events: &EventSink) -> CallFlow {
        let turn = state.turn;
        let name = call.name.as_str();

        if state.reflexion.should_refuse(name, &call.arguments) {
            warn!(tool = name, "Refusing repeated failing call");
            let message = refusal_message(name);
            events.emit(StepEvent::new(StepKind::Error, turn, message.clone()).for_tool(name));
            return CallFlow::Continue(tool_feedback(name, &call.arguments, false, &message, None));
        }

        if let Some(pattern) = self.risk.check(name, &call.arguments) {
            let request = ApprovalRequest {
                subject: ApprovalSubject::ToolCall {
                    tool: name.to_string(),
                },
                detail: call.arguments.to_string(),
                reason: format!("arguments contain the dangerous pattern `{pattern}`"),
            };
            warn!(tool = name, pattern, "High-risk call requires approval");
            let rejection = match self.ctx.approval.decide(&request).await {
                ApprovalDecision::Approve => None,
                ApprovalDecision::Reject { reason } => Some(format!(
                    "The user rejected this call: {reason}. Do not retry it; find a safer approach."
                )),
                ApprovalDecision::Skip => {
                    Some("The user skipped this call. Continue without it.".to_string())
                }
                ApprovalDecision::Cancel => return CallFlow::Cancel,
            };
            if let Some(message) = rejection {
                events.emit(StepEvent::new(StepKind::Error, turn, message.clone()).for_tool(name));
                return CallFlow::Continue(tool_feedback(name, &call.arguments, false, &message, None));
            }
        }

        if !state.toolset.contains(name) {
            if state.toolset.resolve_missing(name) {
                state.prompt_stale = true;
            } else if state.toolset.is_filtered() {
                let message = format!("Tool `{name}` was not found among the tools offered for this task.");
                warn!(tool = name, "Call outside the filtered tool set");
                state.trace.record(name, call.arguments.clone(), ToolStatus::Error, message.clone(), 0);
                if state.toolset.note_outcome(false) {
                    state.prompt_stale = true;
                }
                events.emit(StepEvent::new(StepKind::Error, turn, message.clone()).for_tool(name));
                return CallFlow::Continue(tool_feedback(name, &call.arguments, false, &message, None));
            }
        }

        info!(tool = name, turn, "Agent requested tool execution");
        events.emit(StepEvent::new(StepKind::ToolCall, turn, call.arguments.to_string()).for_tool(name));
        self.ctx
            .memory
            .log(LogCategory::Action, &format!("{name} {}", text::truncate(&call.arguments.to_string(), LOG_PREVIEW_CHARS)));

        let started = Instant::now();
        let (status, result) =
            match invoke_with_retry(self.ctx.tools.as_ref(), name, call.arguments.clone(), self.ctx.retry).await {
                Ok(response) => (response.status, response.result_text()),
                Err(err) => (ToolStatus::Error, err.to_string()),
            };
        let latency_ms = started.elapsed().as_millis() as u64;
        state
            .trace
            .record(name, call.arguments.clone(), status, result.clone(), latency_ms);
        state.last_result = result.clone();

        let success = status.is_success();
        if state.toolset.note_outcome(success) {
            state.prompt_stale = true;
        }
        events.emit(
            StepEvent::new(StepKind::ToolResult, turn, text::truncate(&result, EVENT_PREVIEW_CHARS)).for_tool(name),
        );
        self.ctx.memory.log(
            LogCategory::Result,
            &format!(
                "{name} [{}] {}",
                if success { "ok" } else { "error" },
                text::truncate(&result.replace('\n', " "), LOG_PREVIEW_CHARS)
            ),
        );

        let instruction = if success {
            state.reflexion.record_success(name, &call.arguments);
            is_mutating(name, &self.ctx.config.mutating_tool_markers).then(|| verification_instruction(name))
        } else {
            if is_gap_error(&result) && self.ctx.gaps.record(name, &result) {
                state.sections.limitations = self.ctx.gaps.disclosure();
                state.prompt_stale = true;
            }
            let reflection = state.reflexion.record_failure(name, &call.arguments, &result);
            debug!(tool = name, occurrences = reflection.occurrences, "Tool failure reflected");
            Some(reflection.instruction)
        };
        CallFlow::Continue(tool_feedback(name, &call.arguments, success, &result, instruction.as_deref()))
    }

    fn refresh_system_prompt(&self, state: &mut RunState) {
        let prompt = system_prompt(self.ctx.config.protocol, state.toolset.tools(), &state.sections);
        if let Some(first) = state.messages.first_mut() {
            *first = ChatMessage::system(prompt);
        }
        state.prompt_stale = false;
    }

    fn finish(
        &self,
        state: RunState,
        status: RunStatus,
        response: String,
        validation: Option<ValidationReport>,
        events: &EventSink,
    ) -> AgentOutcome {
        let RunState {
            task,
            mut trace,
            turn,
            escalations,
            ..
        } = state;
        trace.set_turns(turn);
        let trace = trace.seal();

        if let Some(stats) = self.ctx.tracker.record(&trace)
            && let Some(scope_id) = trace.scope_id.as_deref()
        {
            let activated = self.ctx.rules.evaluate(scope_id, &stats);
            if !activated.is_empty() {
                info!(scope = scope_id, rules = activated.len(), "Behavior rules activated");
            }
        }
        self.ctx.memory.traces().archive(&trace);
        if status == RunStatus::Completed && trace.success && trace.outcomes.len() >= SOP_MIN_CALLS {
            let steps: Vec<String> = trace.outcomes.iter().map(|outcome| outcome.name.clone()).collect();
            if let Err(err) = self.ctx.memory.facts().record_sop(&task, &steps) {
                warn!(error = %err, "Failed to record SOP");
            }
        }
        self.ctx.memory.log(
            LogCategory::Result,
            &format!(
                "task {}: {}",
                status.as_str(),
                text::truncate(&response.replace('\n', " "), LOG_PREVIEW_CHARS)
            ),
        );

        let kind = match status {
            RunStatus::Completed | RunStatus::Partial => StepKind::Output,
            RunStatus::Error | RunStatus::Cancelled => StepKind::Error,
        };
        events.emit(StepEvent::new(kind, turn, response.clone()));
        info!(
            status = status.as_str(),
            turns = turn,
            calls = trace.outcomes.len(),
            errors = trace.errors,
            escalations,
            "Agent run finished"
        );
        AgentOutcome {
            response,
            scope_id: trace.scope_id.clone(),
            trace,
            status,
            validation,
            escalations,
        }
    }
}

/// Tool output as the model sees it on the next turn.
fn tool_feedback(tool: &str, input: &Value, success: bool, output: &str, instruction: Option<&str>) -> String {
    let mut payload = json!({
        "tool_result": {
            "tool": tool,
            "input": input,
            "success": success,
            "output": output,
        }
    });
    if let Some(instruction) = instruction {
        payload["tool_result"]["instruction"] = Value::String(instruction.to_string());
    }
    payload.to_string()
}

fn last_output(state: &RunState) -> &str {
    if state.last_result.is_empty() {
        &state.last_text
    } else {
        &state.last_result
    }
}

fn scope_metrics(state: &RunState) -> &[String] {
    state
        .scope
        .as_ref()
        .map(|scope| scope.metrics.as_slice())
        .unwrap_or(&[])
}

/// Native gateways sometimes send arguments as a JSON string.
fn normalize_arguments(arguments: Value) -> Value {
    match arguments {
        Value::String(raw) => serde_json::from_str(&raw).unwrap_or(Value::String(raw)),
        Value::Null => json!({}),
        other => other,
    }
}

#[async_trait]
impl SubTaskRunner for ExecutionLoop {
    async fn run_subtask(&self, subtask: &SubTask, prompt: &str) -> Result<String, PlanError> {
        let outcome = self.run(prompt, RunOptions::default()).await;
        match outcome.status {
            RunStatus::Completed => Ok(outcome.response),
            _ => Err(PlanError::sub_task(&subtask.id, outcome.response)),
        }
    }
}
