//! Interpreter configuration.

/// Default operand stack capacity.
pub const DEFAULT_STACK_LIMIT: usize = 256;

/// Knobs for one [`crate::Vm`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct VmOptions {
    /// Emit a `trace` event (stack + disassembled row) before each instruction.
    pub trace: bool,
    /// Maximum number of values on the operand stack.
    pub stack_limit: usize,
    /// Stop with `StepLimit` after this many instructions.
    pub step_limit: Option<u64>,
}

impl Default for VmOptions {
    fn default() -> Self {
        Self { trace: false, stack_limit: DEFAULT_STACK_LIMIT, step_limit: None }
    }
}

impl VmOptions {
    /// Toggle per-instruction tracing.
    #[must_use]
    pub fn with_trace(mut self, trace: bool) -> Self {
        self.trace = trace;
        self
    }

    /// Set the operand stack limit.
    #[must_use]
    pub fn with_stack_limit(mut self, limit: usize) -> Self {
        self.stack_limit = limit;
        self
    }

    /// Set (or clear) the instruction budget.
    #[must_use]
    pub fn with_step_limit(mut self, limit: Option<u64>) -> Self {
        self.step_limit = limit;
        self
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let opts: VmOptions = serde_json::from_str(r#"{ "trace": true }"#).unwrap();
        assert_eq!(opts, VmOptions::default().with_trace(true));
    }
}
