//! Deferred values.
//!
//! An [`Output`] is a value that becomes known some time after the
//! resource producing it is declared: a load balancer's DNS name, a
//! repository URL, a pushed image name. Descriptors hold outputs so that
//! dependents can be declared before their inputs are known.
//!
//! Outputs are write-once. The producing side holds a [`Resolver`] and
//! settles it exactly once; every clone of the output then observes the
//! same value or the same failure.

use std::fmt;
use std::future::Future;

use tierstack_common::error::OutputError;
use tokio::sync::watch;

#[derive(Debug, Clone)]
enum Slot<T> {
    Pending,
    Ready(T),
    Failed(OutputError),
}

impl<T: Clone> Slot<T> {
    fn settled(&self) -> Option<Result<T, OutputError>> {
        match self {
            Self::Pending => None,
            Self::Ready(value) => Some(Ok(value.clone())),
            Self::Failed(error) => Some(Err(error.clone())),
        }
    }
}

/// A value that may not be known yet.
#[derive(Debug, Clone)]
pub struct Output<T> {
    rx: watch::Receiver<Slot<T>>,
}

/// Write side of a pending [`Output`].
///
/// Dropping a resolver without settling it fails every dependent with
/// [`OutputError::Abandoned`].
#[derive(Debug)]
pub struct Resolver<T> {
    tx: watch::Sender<Slot<T>>,
}

impl<T> Resolver<T> {
    /// Publishes the value.
    pub fn resolve(self, value: T) {
        self.settle(Ok(value));
    }

    /// Publishes a failure.
    pub fn fail(self, error: impl Into<OutputError>) {
        self.settle(Err(error.into()));
    }

    /// Publishes either outcome.
    pub fn settle(self, result: Result<T, OutputError>) {
        let slot = match result {
            Ok(value) => Slot::Ready(value),
            Err(error) => Slot::Failed(error),
        };
        // Nobody listening is fine: the value is simply unobserved.
        let _ = self.tx.send(slot);
    }
}

impl<T> Output<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// An output whose value is already known.
    #[must_use]
    pub fn known(value: T) -> Self {
        let (_, rx) = watch::channel(Slot::Ready(value));
        Self { rx }
    }

    /// An output that has already failed.
    #[must_use]
    pub fn failed(error: impl Into<OutputError>) -> Self {
        let (_, rx) = watch::channel(Slot::Failed(error.into()));
        Self { rx }
    }

    /// An unresolved output together with the resolver that settles it.
    #[must_use]
    pub fn pending() -> (Self, Resolver<T>) {
        let (tx, rx) = watch::channel(Slot::Pending);
        (Self { rx }, Resolver { tx })
    }

    /// An output settled by a future running on the ambient tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    #[must_use]
    pub fn from_future<Fut>(future: Fut) -> Self
    where
        Fut: Future<Output = Result<T, OutputError>> + Send + 'static,
    {
        let (output, resolver) = Self::pending();
        let _ = tokio::spawn(async move {
            resolver.settle(future.await);
        });
        output
    }

    /// Returns the outcome if it is already known, without waiting.
    #[must_use]
    pub fn current(&self) -> Option<Result<T, OutputError>> {
        self.rx.borrow().settled()
    }

    /// Returns whether the output has settled.
    #[must_use]
    pub fn is_settled(&self) -> bool {
        !matches!(*self.rx.borrow(), Slot::Pending)
    }

    /// Waits until the output settles.
    ///
    /// # Errors
    ///
    /// Returns the producer's failure, or [`OutputError::Abandoned`] if the
    /// producer went away without settling.
    pub async fn resolve(&self) -> Result<T, OutputError> {
        let mut rx = self.rx.clone();
        loop {
            if let Some(result) = rx.borrow_and_update().settled() {
                return result;
            }
            if rx.changed().await.is_err() {
                return rx.borrow().settled().unwrap_or(Err(OutputError::Abandoned));
            }
        }
    }

    /// Derives a new output by applying `f` once this one resolves.
    ///
    /// Applied immediately when the value is already known; otherwise the
    /// work is spawned and this call returns without waiting.
    ///
    /// # Panics
    ///
    /// Panics if this output is still pending and no tokio runtime is running.
    #[must_use]
    pub fn map<U, F>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> U + Send + 'static,
    {
        match self.current() {
            Some(Ok(value)) => Output::known(f(value)),
            Some(Err(error)) => Output::failed(error),
            None => self.then(move |value| async move { Ok(f(value)) }),
        }
    }

    /// Derives a new output from an async, fallible step run once this one
    /// resolves. A failure of this output skips `f` and propagates.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless this output has already failed.
    #[must_use]
    pub fn then<U, F, Fut>(&self, f: F) -> Output<U>
    where
        U: Clone + Send + Sync + 'static,
        F: FnOnce(T) -> Fut + Send + 'static,
        Fut: Future<Output = Result<U, OutputError>> + Send + 'static,
    {
        if let Some(Err(error)) = self.current() {
            return Output::failed(error);
        }
        let source = self.clone();
        Output::from_future(async move {
            let value = source.resolve().await?;
            f(value).await
        })
    }

    /// Pairs this output with another.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless both outputs are known or
    /// either has already failed.
    #[must_use]
    pub fn zip<U>(&self, other: &Output<U>) -> Output<(T, U)>
    where
        U: Clone + Send + Sync + 'static,
    {
        match (self.current(), other.current()) {
            (Some(Ok(left)), Some(Ok(right))) => return Output::known((left, right)),
            (Some(Err(error)), _) | (_, Some(Err(error))) => return Output::failed(error),
            _ => {}
        }
        let other = other.clone();
        self.then(move |left| async move {
            let right = other.resolve().await?;
            Ok((left, right))
        })
    }

    /// Collects many outputs into one, preserving order.
    ///
    /// # Panics
    ///
    /// Panics outside a tokio runtime unless every output is known or one
    /// has already failed.
    #[must_use]
    pub fn all(outputs: Vec<Self>) -> Output<Vec<T>> {
        if let Some(error) = outputs
            .iter()
            .find_map(|o| o.current().and_then(Result::err))
        {
            return Output::failed(error);
        }
        let known: Option<Vec<T>> = outputs
            .iter()
            .map(|o| o.current().and_then(Result::ok))
            .collect();
        if let Some(values) = known {
            return Output::known(values);
        }
        Output::from_future(async move {
            let mut values = Vec::with_capacity(outputs.len());
            for output in &outputs {
                values.push(output.resolve().await?);
            }
            Ok(values)
        })
    }
}

impl<T> fmt::Display for Output<T>
where
    T: fmt::Display,
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &*self.rx.borrow() {
            Slot::Pending => write!(f, "(known after apply)"),
            Slot::Ready(value) => write!(f, "{value}"),
            Slot::Failed(error) => write!(f, "(failed: {error})"),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use tierstack_common::error::StackError;

    use super::*;

    #[test]
    fn known_value_is_current() {
        let output = Output::known(7_u32);
        assert!(output.is_settled());
        assert_eq!(output.current().unwrap().unwrap(), 7);
        assert_eq!(output.to_string(), "7");
    }

    #[test]
    fn map_on_known_value_needs_no_runtime() {
        let url = Output::known("lb.example".to_string()).map(|d| format!("http://{d}/"));
        assert_eq!(url.current().unwrap().unwrap(), "http://lb.example/");
    }

    #[test]
    fn pending_displays_placeholder() {
        let (output, _resolver) = Output::<String>::pending();
        assert!(!output.is_settled());
        assert_eq!(output.to_string(), "(known after apply)");
    }

    #[tokio::test]
    async fn map_waits_for_resolution() {
        let (dns, resolver) = Output::<String>::pending();
        let url = dns.map(|d| format!("http://{d}/WeatherForecast"));
        assert!(!url.is_settled());

        resolver.resolve("internal-api.elb".into());
        assert_eq!(
            url.resolve().await.unwrap(),
            "http://internal-api.elb/WeatherForecast"
        );
    }

    #[tokio::test]
    async fn then_propagates_failure_without_running_step() {
        let (source, resolver) = Output::<u32>::pending();
        let ran = Arc::new(std::sync::atomic::AtomicBool::new(false));
        let flag = Arc::clone(&ran);
        let derived = source.then(move |v| async move {
            flag.store(true, std::sync::atomic::Ordering::SeqCst);
            Ok(v + 1)
        });

        resolver.fail(StackError::invalid_credential("empty password"));
        let err = derived.resolve().await.unwrap_err();
        assert!(matches!(
            err.root_cause(),
            Some(StackError::InvalidCredential { .. })
        ));
        assert!(!ran.load(std::sync::atomic::Ordering::SeqCst));
    }

    #[tokio::test]
    async fn dropped_resolver_abandons_dependents() {
        let (source, resolver) = Output::<u32>::pending();
        let derived = source.map(|v| v * 2);
        drop(resolver);
        assert!(matches!(
            derived.resolve().await,
            Err(OutputError::Abandoned)
        ));
    }

    #[tokio::test]
    async fn zip_and_all_wait_for_every_input() {
        let (a, ra) = Output::<u32>::pending();
        let (b, rb) = Output::<u32>::pending();
        let pair = a.zip(&b);
        let both = Output::all(vec![a.clone(), b.clone(), Output::known(3)]);

        rb.resolve(2);
        assert!(!pair.is_settled());
        ra.resolve(1);

        assert_eq!(pair.resolve().await.unwrap(), (1, 2));
        assert_eq!(both.resolve().await.unwrap(), vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn resolved_value_never_changes() {
        let (output, resolver) = Output::<u32>::pending();
        let observer = output.clone();
        resolver.resolve(5);
        assert_eq!(output.resolve().await.unwrap(), 5);
        assert_eq!(observer.resolve().await.unwrap(), 5);
        assert_eq!(observer.resolve().await.unwrap(), 5);
    }

    #[test]
    fn failed_sources_short_circuit_without_a_runtime() {
        let failed = Output::<u32>::failed(OutputError::Abandoned);
        let (pending, _resolver) = Output::<u32>::pending();

        let stepped = failed.then(|v| async move { Ok(v + 1) });
        assert!(matches!(stepped.current(), Some(Err(OutputError::Abandoned))));
        let paired = pending.zip(&failed);
        assert!(matches!(paired.current(), Some(Err(OutputError::Abandoned))));
        let collected = Output::all(vec![Output::known(1), failed.clone(), pending]);
        assert!(matches!(collected.current(), Some(Err(OutputError::Abandoned))));
    }

    #[test]
    fn all_of_nothing_is_known() {
        let empty = Output::<u32>::all(Vec::new());
        assert_eq!(empty.current().unwrap().unwrap(), Vec::<u32>::new());
    }
}
