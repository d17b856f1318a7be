//! Timeout and bounded-retry wrapper around driver invocations.
//!
//! Every driver call goes through here. Timeouts are retried up to the
//! policy cap, one warning per timed-out attempt; any other transport
//! failure surfaces immediately. A successful call returns the captured
//! lines regardless of semantic content.

use crate::config::RetryPolicy;
use crate::remote::driver::{DriverOp, DriverTransport, TransportError};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ExecError {
    /// Per-attempt timeout exhausted the retry cap.
    #[error("driver call timed out on all {attempts} attempts")]
    TimedOut { attempts: u32 },

    /// Abnormal termination. Not retried.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

pub struct RetryingExecutor {
    transport: Arc<dyn DriverTransport>,
    policy: RetryPolicy,
}

impl RetryingExecutor {
    pub fn new(transport: Arc<dyn DriverTransport>, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Per-attempt deadline: size-derived for uploads, fixed otherwise.
    fn timeout_for(&self, op: &DriverOp) -> Duration {
        match op {
            DriverOp::Upload { size, .. } => self.policy.upload_timeout(*size),
            _ => self.policy.op_timeout,
        }
    }

    /// Run one driver operation to completion or exhaustion.
    pub async fn run(&self, op: &DriverOp) -> Result<Vec<String>, ExecError> {
        let deadline = self.timeout_for(op);
        let mut attempt = 0;
        loop {
            attempt += 1;
            match tokio::time::timeout(deadline, self.transport.invoke(op)).await {
                Ok(Ok(lines)) => return Ok(lines),
                Ok(Err(e)) => return Err(ExecError::Transport(e)),
                Err(_) => {
                    warn!(
                        op = op.verb(),
                        attempt,
                        timeout_secs = deadline.as_secs(),
                        "driver call timed out"
                    );
                    if attempt >= self.policy.max_attempts {
                        return Err(ExecError::TimedOut { attempts: attempt });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Times out (by sleeping past the deadline) for the first
    /// `slow_attempts` calls, then answers instantly.
    struct SlowThenFast {
        slow_attempts: u32,
        calls: AtomicU32,
    }

    #[async_trait]
    impl DriverTransport for SlowThenFast {
        async fn invoke(&self, _op: &DriverOp) -> Result<Vec<String>, TransportError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.slow_attempts {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            Ok(vec!["ok".to_string()])
        }
    }

    struct AlwaysAbnormal {
        calls: AtomicU32,
    }

    #[async_trait]
    impl DriverTransport for AlwaysAbnormal {
        async fn invoke(&self, _op: &DriverOp) -> Result<Vec<String>, TransportError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Err(TransportError::AbnormalExit("signal: 9".to_string()))
        }
    }

    fn tight_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 3,
            op_timeout: Duration::from_millis(20),
            min_throughput_bytes_per_sec: 1,
            upload_grace: Duration::from_millis(20),
        }
    }

    #[tokio::test]
    async fn test_two_timeouts_then_success() {
        let transport = Arc::new(SlowThenFast {
            slow_attempts: 2,
            calls: AtomicU32::new(0),
        });
        let executor = RetryingExecutor::new(transport.clone(), tight_policy());
        let lines = executor
            .run(&DriverOp::Meta("/backup/a".to_string()))
            .await
            .unwrap();
        assert_eq!(lines, vec!["ok"]);
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_cap_exhaustion_makes_no_fourth_attempt() {
        let transport = Arc::new(SlowThenFast {
            slow_attempts: 10,
            calls: AtomicU32::new(0),
        });
        let executor = RetryingExecutor::new(transport.clone(), tight_policy());
        let err = executor
            .run(&DriverOp::Meta("/backup/a".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::TimedOut { attempts: 3 }));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_abnormal_exit_is_not_retried() {
        let transport = Arc::new(AlwaysAbnormal {
            calls: AtomicU32::new(0),
        });
        let executor = RetryingExecutor::new(transport.clone(), tight_policy());
        let err = executor
            .run(&DriverOp::Mkdir("/backup/a".to_string()))
            .await
            .unwrap_err();
        assert!(matches!(err, ExecError::Transport(_)));
        assert_eq!(transport.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_upload_timeout_is_size_derived() {
        let executor = RetryingExecutor::new(
            Arc::new(AlwaysAbnormal {
                calls: AtomicU32::new(0),
            }),
            RetryPolicy::default(),
        );
        let op = DriverOp::Upload {
            local_path: PathBuf::from("/data/a.txt"),
            remote_parent: "/backup".to_string(),
            size: 10 * 1024 * 1024,
        };
        let timeout = executor.timeout_for(&op);
        let policy = RetryPolicy::default();
        let expected = 10.0 * 1024.0 * 1024.0 / policy.min_throughput_bytes_per_sec as f64
            + policy.upload_grace.as_secs_f64();
        assert!((timeout.as_secs_f64() - expected).abs() < 1.0);
        assert_eq!(
            executor.timeout_for(&DriverOp::Meta("/x".to_string())),
            policy.op_timeout
        );
    }
}
