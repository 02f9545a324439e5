//! Rewrite pipeline.
//!
//! One pass per inbound frame, strictly forward:
//!
//! ```text
//! Parsed -> Classified -> (TimestampInjected)? -> (KeyspaceQualified)? -> Final
//! ```
//!
//! Parsing and classification happen in [`Frame::parse`]. The planner picks
//! the optional steps from the frame kind and the caller's context; each step
//! either applies completely or leaves the frame exactly as it was. A failed
//! step never aborts the pass and never reverts an earlier step.

use super::{QueryKind, RewriteContext};
use crate::config::RewriteConfig;
use crate::error::RewriteError;
use crate::protocol::{Frame, FrameBuffer, Opcode};

/// Steps chosen for one frame.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RewritePlan {
    /// Inject the arrival timestamp.
    pub inject_timestamp: bool,
    /// Keyspace to prefix the table reference with.
    pub qualify_keyspace: Option<String>,
}

impl RewritePlan {
    /// Plan that forwards the frame untouched.
    pub fn pass_through() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        !self.inject_timestamp && self.qualify_keyspace.is_none()
    }
}

/// What happened to one step.
#[derive(Debug)]
pub enum StepStatus {
    /// Not part of the plan.
    Skipped,
    /// Bytes were rewritten.
    Applied,
    /// Nothing to do; the frame already satisfied the step.
    AlreadyPresent,
    /// Step could not run; the frame is as it was before the step.
    Failed(RewriteError),
}

impl StepStatus {
    #[inline]
    pub fn is_applied(&self) -> bool {
        matches!(self, StepStatus::Applied)
    }

    pub fn error(&self) -> Option<&RewriteError> {
        match self {
            StepStatus::Failed(error) => Some(error),
            _ => None,
        }
    }
}

/// Result of a pass, ready for the forwarding layer.
#[derive(Debug)]
pub struct RewriteOutcome {
    pub frame: Frame,
    pub timestamp: StepStatus,
    pub keyspace: StepStatus,
}

impl RewriteOutcome {
    /// Whether any step changed the bytes.
    pub fn changed(&self) -> bool {
        self.timestamp.is_applied() || self.keyspace.is_applied()
    }

    /// Errors of the steps that failed, in pipeline order.
    pub fn errors(&self) -> impl Iterator<Item = &RewriteError> {
        self.timestamp.error().into_iter().chain(self.keyspace.error())
    }

    /// Statement kind, for routing decisions.
    pub fn kind(&self) -> QueryKind {
        self.frame.kind()
    }
}

/// Plans and applies rewrites according to a [`RewriteConfig`].
///
/// Holds no per-frame state; one instance can serve every connection.
#[derive(Debug, Clone, Default)]
pub struct Rewriter {
    config: RewriteConfig,
}

impl Rewriter {
    pub fn new(config: RewriteConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RewriteConfig {
        &self.config
    }

    /// Stream framer for one client connection, bounded by the configured
    /// maximum body size.
    pub fn frame_buffer(&self) -> FrameBuffer {
        FrameBuffer::from_config(&self.config)
    }

    /// Choose the steps for `frame`.
    ///
    /// - timestamp: the statement mutates data (for EXECUTE, the kind comes
    ///   from the prepared-statement cache via the context)
    /// - keyspace: a table is attached, its reference is unqualified, a
    ///   keyspace is known, and the frame carries query text other than `USE`
    pub fn plan(&self, frame: &Frame, ctx: &RewriteContext) -> RewritePlan {
        let opcode = frame.typed_opcode();

        let kind = match (opcode, ctx.prepared_kind()) {
            (Some(Opcode::Execute), Some(prepared)) => prepared,
            _ => frame.kind(),
        };
        let inject_timestamp = self.config.inject_timestamps && kind.is_mutation();

        // USE names a keyspace, never a table.
        let carries_table = matches!(opcode, Some(Opcode::Query) | Some(Opcode::Prepare))
            && frame.kind() != QueryKind::Use;
        let qualify = self.config.qualify_keyspaces && carries_table && !ctx.table_qualified();
        let qualify_keyspace = match frame.table() {
            Some(table) if qualify => ctx
                .keyspace()
                .or_else(|| table.keyspace())
                .filter(|keyspace| !keyspace.is_empty())
                .map(str::to_string),
            _ => None,
        };

        RewritePlan {
            inject_timestamp,
            qualify_keyspace,
        }
    }

    /// Run `plan` against `frame`.
    ///
    /// Steps are atomic one by one, not as a whole: when qualification fails
    /// after the timestamp was injected, the frame keeps the timestamp.
    pub fn apply(&self, mut frame: Frame, plan: &RewritePlan) -> RewriteOutcome {
        let timestamp = if plan.inject_timestamp {
            let status = match frame.inject_timestamp() {
                Ok(true) => StepStatus::Applied,
                Ok(false) => StepStatus::AlreadyPresent,
                Err(error) => StepStatus::Failed(error),
            };
            log_step(&frame, "timestamp", &status);
            status
        } else {
            StepStatus::Skipped
        };

        let keyspace = match &plan.qualify_keyspace {
            Some(keyspace) => {
                let status = match frame.qualify_keyspace(keyspace) {
                    Ok(true) => StepStatus::Applied,
                    Ok(false) => StepStatus::Skipped,
                    Err(error) => StepStatus::Failed(error),
                };
                log_step(&frame, "keyspace", &status);
                status
            }
            None => StepStatus::Skipped,
        };

        RewriteOutcome {
            frame,
            timestamp,
            keyspace,
        }
    }

    /// Plan and apply in one call.
    pub fn rewrite(&self, frame: Frame, ctx: &RewriteContext) -> RewriteOutcome {
        let plan = self.plan(&frame, ctx);
        self.apply(frame, &plan)
    }
}

fn log_step(frame: &Frame, step: &'static str, status: &StepStatus) {
    match status {
        StepStatus::Applied => tracing::trace!(
            stream = frame.stream(),
            opcode = frame.opcode(),
            kind = %frame.kind(),
            step,
            "rewrite applied"
        ),
        StepStatus::AlreadyPresent => tracing::debug!(
            stream = frame.stream(),
            kind = %frame.kind(),
            step,
            "client value present, frame left as is"
        ),
        StepStatus::Failed(
            error @ (RewriteError::UnsupportedOpcode(_) | RewriteError::UnsupportedFlags(_)),
        ) => tracing::debug!(
            stream = frame.stream(),
            opcode = frame.opcode(),
            step,
            "forwarding unmodified: {}",
            error
        ),
        StepStatus::Failed(error) => tracing::warn!(
            stream = frame.stream(),
            opcode = frame.opcode(),
            kind = %frame.kind(),
            step,
            "rewrite skipped, forwarding unmodified: {}",
            error
        ),
        StepStatus::Skipped => {}
    }
}
