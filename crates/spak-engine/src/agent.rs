// Agent execution
// Couples a spec descriptor and mutable state with a policy: a restartable,
// cooperative producer of effects and a final value.

use spak_types::Value;

use crate::effect::Effect;
use crate::error::EngineResult;
use crate::runtime::Runtime;

/// Descriptor naming the spec an agent was instantiated from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AgentDescriptor {
    pub name: String,
    pub description: String,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
        }
    }
}

/// What a policy produced on one resumption.
#[derive(Debug, Clone, PartialEq)]
pub enum PolicyStep {
    /// An effect to resolve; its result is fed back on the next resume.
    Perform(Effect),
    /// The policy is complete with a final value.
    Done(Value),
}

/// A component's suspendable execution trace.
///
/// The coroutine contract realized as a restartable state machine: the first
/// `resume(None)` starts the policy; each subsequent call delivers the
/// previous effect's result to exactly one resumption point. Effects arise
/// in program order.
pub trait Policy {
    fn resume(&mut self, signal: Option<Value>) -> EngineResult<PolicyStep>;
}

/// An agent: descriptor, mutable state value, and policy.
pub struct Agent {
    pub descriptor: AgentDescriptor,
    pub state: Value,
    policy: Box<dyn Policy>,
}

impl Agent {
    pub fn new(descriptor: AgentDescriptor, state: Value, policy: Box<dyn Policy>) -> Self {
        Self {
            descriptor,
            state,
            policy,
        }
    }
}

/// Result of a single agent step.
#[derive(Debug, Clone, PartialEq)]
pub enum StepOutcome {
    /// The policy performed an effect; this is the resolved value.
    Resolved(Value),
    /// The policy completed with this final value.
    Complete(Value),
}

impl Runtime {
    /// Advance an agent by one suspension.
    ///
    /// The first call resumes the policy from its start with no signal;
    /// subsequent calls deliver `signal` as the value of the previously
    /// suspended perform. Handler failures propagate to the caller and the
    /// policy is not advanced past its suspension point.
    pub fn step(&self, agent: &mut Agent, signal: Option<Value>) -> EngineResult<StepOutcome> {
        match agent.policy.resume(signal)? {
            PolicyStep::Perform(effect) => {
                let value = self.resolve(&effect)?;
                Ok(StepOutcome::Resolved(value))
            }
            PolicyStep::Done(value) => Ok(StepOutcome::Complete(value)),
        }
    }

    /// Drive an agent to completion, feeding each resolved effect value into
    /// the next resumption.
    pub fn run(&self, agent: &mut Agent) -> EngineResult<Value> {
        let mut signal = None;
        loop {
            match self.step(agent, signal.take())? {
                StepOutcome::Resolved(value) => signal = Some(value),
                StepOutcome::Complete(value) => return Ok(value),
            }
        }
    }
}
