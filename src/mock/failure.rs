//! Failure injection for the mock cluster service

use std::collections::HashMap;
use std::fmt;

/// Cluster API operations that can be made to fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiOperation {
    AddJobFlowSteps,
    RunJobFlow,
    ListSteps,
    DescribeCluster,
    DescribeStep,
}

impl fmt::Display for ApiOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::AddJobFlowSteps => "AddJobFlowSteps",
            Self::RunJobFlow => "RunJobFlow",
            Self::ListSteps => "ListSteps",
            Self::DescribeCluster => "DescribeCluster",
            Self::DescribeStep => "DescribeStep",
        };
        f.write_str(name)
    }
}

/// Failure configuration for an operation
#[derive(Debug, Clone)]
pub struct FailureConfig {
    /// Message carried by the injected error
    pub message: String,
    /// Number of calls to fail before succeeding (None = always fail)
    pub fail_count: Option<u32>,
}

impl FailureConfig {
    /// Fail every call
    pub fn always(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            fail_count: None,
        }
    }

    /// Fail the next `count` calls only
    pub fn times(message: impl Into<String>, count: u32) -> Self {
        Self {
            message: message.into(),
            fail_count: Some(count),
        }
    }
}

/// Tracks injected failures per operation
#[derive(Debug, Default)]
pub struct FailureInjector {
    configs: HashMap<ApiOperation, FailureConfig>,
}

impl FailureInjector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, op: ApiOperation, config: FailureConfig) {
        self.configs.insert(op, config);
    }

    pub fn clear(&mut self) {
        self.configs.clear();
    }

    /// Returns the error message if this call of `op` should fail.
    pub fn check(&mut self, op: ApiOperation) -> Option<String> {
        let config = self.configs.get_mut(&op)?;
        let message = config.message.clone();
        match config.fail_count {
            None => Some(message),
            Some(0) => {
                self.configs.remove(&op);
                None
            }
            Some(n) => {
                if n == 1 {
                    self.configs.remove(&op);
                } else {
                    config.fail_count = Some(n - 1);
                }
                Some(message)
            }
        }
    }
}
