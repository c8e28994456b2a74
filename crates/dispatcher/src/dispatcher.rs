//! Concurrent fan-out and the shutdown drain.
//!
//! Every call to [`Dispatcher::dispatch`] spawns one tracked task for the
//! event, which owns a [`JoinSet`] with one child per endpoint. All children
//! start together; a slow or unreachable endpoint never delays its siblings.
//!
//! Both levels are registered with a [`TaskTracker`]. [`Dispatcher::shutdown`]
//! closes the tracker and waits until every tracked task has finished, so a
//! delivery that has started is never cut off by process exit (unless the
//! optional drain timeout expires first).
//!
//! `dispatch` checks the tracker and spawns into it under a shared admission
//! lock; `shutdown` closes the tracker under the exclusive lock. A dispatch
//! is therefore either refused or tracked before the drain starts waiting.

use std::sync::{Arc, PoisonError, RwLock};
use std::time::Duration;

use tokio::task::JoinSet;
use tokio_util::task::TaskTracker;
use tracing::{debug, error, info, info_span, warn, Instrument};

use routing::{Endpoint, InboundEvent};

use crate::delivery::deliver;
use crate::errors::DispatchError;
use crate::retry::{RetryConfig, RetryPolicy};
use crate::transport::{OutboundRequest, Transport};

/// Tunables for [`Dispatcher`].
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DispatcherConfig {
    /// Retry budget for each endpoint.
    pub retry: RetryConfig,
    /// Whether transport failures are retried.
    pub retry_policy: RetryPolicy,
}

/// Result of [`Dispatcher::shutdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Every tracked task finished.
    Drained,
    /// The drain timeout expired with `remaining` tasks still running.
    TimedOut {
        /// Tracked tasks (dispatches and deliveries) still in flight.
        remaining: usize,
    },
}

/// Fans events out to their endpoints. Cheap to clone; clones share the
/// transport and the in-flight tracker.
#[derive(Clone)]
pub struct Dispatcher {
    inner: Arc<DispatcherInner>,
}

struct DispatcherInner {
    transport: Arc<dyn Transport>,
    config: DispatcherConfig,
    tracker: TaskTracker,
    admission: RwLock<()>,
}

impl Dispatcher {
    /// Creates a dispatcher delivering through `transport`.
    pub fn new(transport: Arc<dyn Transport>, config: DispatcherConfig) -> Self {
        Self {
            inner: Arc::new(DispatcherInner {
                transport,
                config,
                tracker: TaskTracker::new(),
                admission: RwLock::new(()),
            }),
        }
    }

    /// Starts delivering `event` to every endpoint and returns immediately.
    ///
    /// Outcomes are only visible in the logs and through [`Self::shutdown`].
    /// Must be called from within a Tokio runtime.
    pub fn dispatch(
        &self,
        event: InboundEvent,
        endpoints: Vec<Endpoint>,
    ) -> Result<(), DispatchError> {
        let _admission = self
            .inner
            .admission
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        if self.inner.tracker.is_closed() {
            warn!(
                dispatch_id = %event.dispatch_id(),
                endpoints = endpoints.len(),
                "Dispatcher is shutting down, dropping event"
            );
            return Err(DispatchError::ShuttingDown);
        }
        if endpoints.is_empty() {
            return Ok(());
        }

        let span = info_span!(
            "dispatch",
            dispatch_id = %event.dispatch_id(),
            event_type = %event.event_type(),
            org = %event.org(),
            repo = %event.repo(),
            fields = ?event.logging_fields()
        );
        let inner = Arc::clone(&self.inner);

        self.inner.tracker.spawn(
            async move {
                let DispatcherConfig {
                    retry,
                    retry_policy,
                } = inner.config;
                let total = endpoints.len();
                let mut deliveries = JoinSet::new();

                for endpoint in endpoints {
                    let request = OutboundRequest::for_event(&event, &endpoint);
                    let transport = Arc::clone(&inner.transport);
                    let delivery_span = info_span!(
                        "delivery",
                        destination = %endpoint.destination,
                        endpoint = %endpoint.url
                    );
                    deliveries.spawn(
                        inner.tracker.track_future(
                            async move {
                                let report = deliver(
                                    transport.as_ref(),
                                    endpoint,
                                    &request,
                                    retry,
                                    retry_policy,
                                )
                                .await;
                                report.log();
                                report.is_delivered()
                            }
                            .instrument(delivery_span),
                        ),
                    );
                }

                let mut delivered = 0;
                while let Some(joined) = deliveries.join_next().await {
                    match joined {
                        Ok(true) => delivered += 1,
                        Ok(false) => {}
                        Err(e) => error!(error = %e, "Delivery task panicked"),
                    }
                }
                debug!(total, delivered, "Dispatch finished");
            }
            .instrument(span),
        );

        Ok(())
    }

    /// Number of tracked tasks (dispatches plus their deliveries) still running.
    pub fn in_flight(&self) -> usize {
        self.inner.tracker.len()
    }

    /// Returns `true` once [`Self::shutdown`] has been called.
    pub fn is_shutting_down(&self) -> bool {
        self.inner.tracker.is_closed()
    }

    /// Stops accepting new dispatches and waits for in-flight deliveries.
    ///
    /// With `timeout = None` the wait is unbounded. Deliveries are never
    /// cancelled; on timeout they keep running until the runtime stops.
    pub async fn shutdown(&self, timeout: Option<Duration>) -> DrainOutcome {
        let tracker = &self.inner.tracker;
        {
            let _admission = self
                .inner
                .admission
                .write()
                .unwrap_or_else(PoisonError::into_inner);
            tracker.close();
        }
        info!(in_flight = tracker.len(), "Draining in-flight deliveries");

        let outcome = match timeout {
            None => {
                tracker.wait().await;
                DrainOutcome::Drained
            }
            Some(limit) => match tokio::time::timeout(limit, tracker.wait()).await {
                Ok(()) => DrainOutcome::Drained,
                Err(_) => DrainOutcome::TimedOut {
                    remaining: tracker.len(),
                },
            },
        };

        match outcome {
            DrainOutcome::Drained => info!("All deliveries drained"),
            DrainOutcome::TimedOut { remaining } => warn!(
                remaining,
                timeout_ms = timeout.map(|t| t.as_millis() as u64),
                "Drain timed out with deliveries still in flight"
            ),
        }
        outcome
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("config", &self.inner.config)
            .field("in_flight", &self.in_flight())
            .field("closed", &self.is_shutting_down())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::{BTreeMap, HashMap};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    use async_trait::async_trait;
    use bytes::Bytes;
    use routing::{DestinationName, RawEvent};
    use tokio::sync::Semaphore;
    use url::Url;

    use super::*;
    use crate::transport::{TransportError, TransportResponse, RELAY_CHAIN_HEADER};

    /// How the fake subscriber at a URL behaves.
    #[derive(Clone, Copy)]
    enum Behaviour {
        Answer(u16),
        Unreachable,
        /// Waits for a permit on the gate, then answers 200.
        Gated,
    }

    struct FakeTransport {
        behaviours: HashMap<String, Behaviour>,
        gate: Arc<Semaphore>,
        completed: Mutex<Vec<(String, Option<u16>)>>,
        requests: Mutex<Vec<OutboundRequest>>,
    }

    impl FakeTransport {
        fn new(behaviours: &[(&str, Behaviour)]) -> Arc<Self> {
            Arc::new(Self {
                behaviours: behaviours
                    .iter()
                    .map(|(url, b)| (url.to_string(), *b))
                    .collect(),
                gate: Arc::new(Semaphore::new(0)),
                completed: Mutex::new(Vec::new()),
                requests: Mutex::new(Vec::new()),
            })
        }

        fn completed(&self) -> Vec<(String, Option<u16>)> {
            self.completed.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn post(
            &self,
            request: &OutboundRequest,
        ) -> Result<TransportResponse, TransportError> {
            self.requests.lock().unwrap().push(request.clone());
            let url = request.url.to_string();
            let behaviour = self.behaviours.get(&url).copied().unwrap_or(Behaviour::Answer(200));
            let result = match behaviour {
                Behaviour::Answer(status) => Ok(status),
                Behaviour::Unreachable => Err(TransportError::Connect("refused".into())),
                Behaviour::Gated => {
                    let permit = self.gate.acquire().await.expect("gate closed");
                    permit.forget();
                    Ok(200)
                }
            };
            self.completed
                .lock()
                .unwrap()
                .push((url, result.as_ref().ok().copied()));
            result.map(|status| TransportResponse {
                status,
                body_bytes: 0,
            })
        }
    }

    fn event() -> InboundEvent {
        RawEvent {
            event_type: Some("Issue Hook".into()),
            payload: Some(Bytes::from_static(b"{\"action\":\"open\"}")),
            org: Some("org1".into()),
            repo: Some("repo1".into()),
            headers: BTreeMap::from([("content-type".into(), "application/json".into())]),
            logging_fields: BTreeMap::new(),
        }
        .admit()
        .unwrap()
    }

    fn endpoints(urls: &[&str]) -> Vec<Endpoint> {
        urls.iter()
            .enumerate()
            .map(|(i, url)| Endpoint {
                destination: DestinationName::new(format!("s{i}")).unwrap(),
                url: Url::parse(url).unwrap(),
            })
            .collect()
    }

    fn fast_config() -> DispatcherConfig {
        DispatcherConfig {
            retry: RetryConfig {
                max_retries: 2,
                base_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                growth: 2.0,
            },
            retry_policy: RetryPolicy::RetryTransient,
        }
    }

    async fn wait_for(transport: &FakeTransport, count: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while transport.completed().len() < count {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("deliveries did not complete in time");
    }

    #[tokio::test]
    async fn delivers_to_every_endpoint() {
        let transport = FakeTransport::new(&[]);
        let dispatcher = Dispatcher::new(transport.clone(), fast_config());

        dispatcher
            .dispatch(event(), endpoints(&["http://h/e1", "http://h/e2", "http://h/e1"]))
            .unwrap();
        assert_eq!(dispatcher.shutdown(None).await, DrainOutcome::Drained);

        let requests = transport.requests.lock().unwrap();
        assert_eq!(requests.len(), 3);
        for request in requests.iter() {
            assert_eq!(&request.body[..], b"{\"action\":\"open\"}");
            assert_eq!(request.headers["content-type"], "application/json");
            assert!(request.headers.contains_key(RELAY_CHAIN_HEADER));
        }
    }

    #[tokio::test]
    async fn slow_endpoint_does_not_block_siblings() {
        let transport = FakeTransport::new(&[
            ("http://h/slow", Behaviour::Gated),
            ("http://h/down", Behaviour::Unreachable),
        ]);
        let dispatcher = Dispatcher::new(transport.clone(), fast_config());

        dispatcher
            .dispatch(
                event(),
                endpoints(&["http://h/slow", "http://h/fast", "http://h/down", "http://h/other"]),
            )
            .unwrap();

        // fast + other once each, down three times (1 + 2 retries).
        wait_for(&transport, 5).await;
        let completed = transport.completed();
        assert!(completed.contains(&("http://h/fast".into(), Some(200))));
        assert!(completed.contains(&("http://h/other".into(), Some(200))));
        assert_eq!(
            completed.iter().filter(|(url, _)| url == "http://h/down").count(),
            3
        );
        assert!(!completed.iter().any(|(url, _)| url == "http://h/slow"));
        assert!(dispatcher.in_flight() > 0);

        transport.gate.add_permits(1);
        assert_eq!(dispatcher.shutdown(None).await, DrainOutcome::Drained);
        assert!(transport.completed().contains(&("http://h/slow".into(), Some(200))));
        assert_eq!(dispatcher.in_flight(), 0);
    }

    #[tokio::test]
    async fn drain_waits_for_in_flight_deliveries() {
        let transport = FakeTransport::new(&[("http://h/slow", Behaviour::Gated)]);
        let dispatcher = Dispatcher::new(transport.clone(), fast_config());
        dispatcher.dispatch(event(), endpoints(&["http://h/slow"])).unwrap();

        let outcome = dispatcher.shutdown(Some(Duration::from_millis(50))).await;
        assert!(matches!(outcome, DrainOutcome::TimedOut { remaining } if remaining >= 1));
        assert!(transport.completed().is_empty());

        let drain = tokio::spawn({
            let dispatcher = dispatcher.clone();
            async move { dispatcher.shutdown(None).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!drain.is_finished());

        transport.gate.add_permits(1);
        assert_eq!(drain.await.unwrap(), DrainOutcome::Drained);
        assert_eq!(transport.completed(), vec![("http://h/slow".into(), Some(200))]);
    }

    #[tokio::test]
    async fn rejects_dispatch_after_shutdown() {
        let transport = FakeTransport::new(&[]);
        let dispatcher = Dispatcher::new(transport.clone(), fast_config());
        assert_eq!(dispatcher.shutdown(None).await, DrainOutcome::Drained);

        assert!(dispatcher.is_shutting_down());
        assert_eq!(
            dispatcher.dispatch(event(), endpoints(&["http://h/e1"])),
            Err(DispatchError::ShuttingDown)
        );
        assert!(transport.requests.lock().unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn every_accepted_dispatch_is_drained_during_concurrent_shutdown() {
        for _ in 0..25 {
            let transport = FakeTransport::new(&[]);
            let dispatcher = Dispatcher::new(transport.clone(), fast_config());
            let accepted = Arc::new(AtomicUsize::new(0));

            let producers: Vec<_> = (0..4)
                .map(|_| {
                    let dispatcher = dispatcher.clone();
                    let accepted = Arc::clone(&accepted);
                    tokio::spawn(async move {
                        while dispatcher
                            .dispatch(event(), endpoints(&["http://h/e1"]))
                            .is_ok()
                        {
                            accepted.fetch_add(1, Ordering::SeqCst);
                            tokio::task::yield_now().await;
                        }
                    })
                })
                .collect();
            tokio::task::yield_now().await;

            assert_eq!(dispatcher.shutdown(None).await, DrainOutcome::Drained);
            let delivered = transport.completed().len();
            for producer in producers {
                producer.await.unwrap();
            }
            assert_eq!(delivered, accepted.load(Ordering::SeqCst));
        }
    }

    #[tokio::test]
    async fn empty_endpoint_list_spawns_nothing() {
        let transport = FakeTransport::new(&[]);
        let dispatcher = Dispatcher::new(transport.clone(), fast_config());
        dispatcher.dispatch(event(), Vec::new()).unwrap();
        assert_eq!(dispatcher.in_flight(), 0);
    }
}
