use crate::consumer::{Call, Dispatcher, InvokeError};
use crate::serialization::SerializationError;
use bytes::Bytes;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::task::JoinHandle;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Strategy {
    /// One attempt. The first error goes back to the caller as is.
    FailFast,
    /// Up to `1 + retries` attempts, each dispatched anew so the rotation moves on to the
    /// next provider. Provider application errors are not retried.
    Failover,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct StrategyConfig {
    pub strategy: Strategy,
    pub retries: u32,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            strategy: Strategy::FailFast,
            retries: 0,
        }
    }
}

/// ClusterInvoker applies a fault strategy on top of a dispatcher.
pub struct ClusterInvoker<D> {
    logger: slog::Logger,
    dispatcher: Arc<D>,
    config: StrategyConfig,
}

impl<D> Clone for ClusterInvoker<D> {
    fn clone(&self) -> Self {
        ClusterInvoker {
            logger: self.logger.clone(),
            dispatcher: self.dispatcher.clone(),
            config: self.config,
        }
    }
}

impl<D: Dispatcher> ClusterInvoker<D> {
    pub fn new(logger: slog::Logger, dispatcher: D, config: StrategyConfig) -> Self {
        ClusterInvoker {
            logger,
            dispatcher: Arc::new(dispatcher),
            config,
        }
    }

    pub fn strategy(&self) -> StrategyConfig {
        self.config
    }

    /// Resolves once the strategy has produced a result.
    pub async fn invoke(&self, call: &Call) -> Result<D::Output, InvokeError> {
        match self.config.strategy {
            Strategy::FailFast => self.dispatcher.dispatch(call).await,
            Strategy::Failover => self.failover(call).await,
        }
    }

    /// Starts the invocation in the background and returns right away.
    pub fn invoke_async(&self, call: Call) -> InvokeFuture<D::Output> {
        let invoker = self.clone();
        InvokeFuture {
            task: tokio::task::spawn(async move { invoker.invoke(&call).await }),
        }
    }

    async fn failover(&self, call: &Call) -> Result<D::Output, InvokeError> {
        let attempts = self.config.retries.saturating_add(1);
        let mut attempt = 1;
        loop {
            match self.dispatcher.dispatch(call).await {
                Ok(output) => return Ok(output),
                Err(e) if attempt < attempts && e.is_retryable() => {
                    slog::warn!(
                        self.logger,
                        "Attempt {}/{} of {:?}.{} failed: {}",
                        attempt,
                        attempts,
                        call.service,
                        call.method,
                        e
                    );
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

impl<D: Dispatcher<Output = Bytes>> ClusterInvoker<D> {
    /// Invokes and decodes the provider's answer as `M`.
    pub async fn invoke_as<M: prost::Message + Default>(&self, call: &Call) -> Result<M, InvokeError> {
        let body = self.invoke(call).await?;
        let message = M::decode(body).map_err(SerializationError::from)?;

        Ok(message)
    }
}

/// InvokeFuture is the pending result of `ClusterInvoker::invoke_async`. Dropping it does not
/// stop the invocation; `cancel` does.
pub struct InvokeFuture<T> {
    task: JoinHandle<Result<T, InvokeError>>,
}

impl<T> InvokeFuture<T> {
    pub fn cancel(&self) {
        self.task.abort();
    }
}

impl<T> Future for InvokeFuture<T> {
    type Output = Result<T, InvokeError>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match Pin::new(&mut self.task).poll(cx) {
            Poll::Ready(Ok(result)) => Poll::Ready(result),
            Poll::Ready(Err(_)) => Poll::Ready(Err(InvokeError::Cancelled)),
            Poll::Pending => Poll::Pending,
        }
    }
}
