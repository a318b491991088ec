//! Token cache with request coalescing
//!
//! [`TokenCache`] owns the single client-credentials token of a session. A
//! caller finding a usable token gets it back without any I/O. Otherwise one
//! exchange is started and stored as a shared future; every caller arriving
//! while it is pending awaits that same future, so the token endpoint sees at
//! most one request per expiry window.
//!
//! ```ignore
//! let cache = TokenCache::new(exchanger, Arc::new(SystemClock));
//! let token = cache.get_token().await?;
//! request.bearer_token(token.value());
//! ```

use crate::error::{CredentialExchangeError, Result};
use crate::exchange::CredentialExchanger;
use crate::token::Token;
use bridge_traits::time::Clock;
use chrono::Duration as ChronoDuration;
use core_runtime::events::{AuthEvent, CoreEvent, EventBus};
use futures::future::{BoxFuture, FutureExt, Shared};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default margin removed from a token's declared lifetime.
pub const DEFAULT_EXPIRY_SKEW: Duration = Duration::from_secs(5);

type SharedExchange = Shared<BoxFuture<'static, Result<Token>>>;

struct InFlight {
    generation: u64,
    exchange: SharedExchange,
}

#[derive(Default)]
struct CacheState {
    token: Option<Token>,
    in_flight: Option<InFlight>,
    next_generation: u64,
}

/// Client-credentials token cache.
pub struct TokenCache {
    exchanger: Arc<dyn CredentialExchanger>,
    clock: Arc<dyn Clock>,
    skew: ChronoDuration,
    state: Mutex<CacheState>,
    event_bus: Option<EventBus>,
}

impl TokenCache {
    pub fn new(exchanger: Arc<dyn CredentialExchanger>, clock: Arc<dyn Clock>) -> Self {
        Self {
            exchanger,
            clock,
            skew: to_chrono(DEFAULT_EXPIRY_SKEW),
            state: Mutex::new(CacheState::default()),
            event_bus: None,
        }
    }

    /// Margin subtracted from the declared lifetime when it exceeds the margin.
    pub fn with_expiry_skew(mut self, skew: Duration) -> Self {
        self.skew = to_chrono(skew);
        self
    }

    pub fn with_event_bus(mut self, event_bus: EventBus) -> Self {
        self.event_bus = Some(event_bus);
        self
    }

    /// Returns a usable token, exchanging credentials only when none is cached.
    ///
    /// # Errors
    ///
    /// The [`CredentialExchangeError`] of the exchange this call waited on.
    /// Every caller coalesced onto a failed exchange receives the same error,
    /// and the next call starts a fresh exchange.
    pub async fn get_token(&self) -> Result<Token> {
        let (generation, exchange) = {
            let mut state = self.state.lock();
            let now = self.clock.now();

            match state.token.as_ref() {
                Some(token) if token.is_valid_at(now) => return Ok(token.clone()),
                Some(_) => {
                    debug!("Cached token expired");
                    state.token = None;
                }
                None => {}
            }

            match state.in_flight.as_ref() {
                Some(in_flight) => {
                    debug!(generation = in_flight.generation, "Joining in-flight exchange");
                    (in_flight.generation, in_flight.exchange.clone())
                }
                None => {
                    let generation = state.next_generation;
                    state.next_generation += 1;
                    let exchange = self.start_exchange();
                    state.in_flight = Some(InFlight {
                        generation,
                        exchange: exchange.clone(),
                    });
                    self.emit(AuthEvent::TokenRefreshing);
                    (generation, exchange)
                }
            }
        };

        let result = exchange.await;
        self.settle(generation, &result);
        result
    }

    /// Drops `rejected` if it is still the cached token.
    ///
    /// Returns `false` when the cache already moved on (another caller
    /// refreshed, or nothing is cached), in which case the next
    /// [`get_token`](Self::get_token) serves whatever is current.
    pub fn invalidate(&self, rejected: &Token) -> bool {
        let mut state = self.state.lock();
        if state.token.as_ref() != Some(rejected) {
            return false;
        }

        state.token = None;
        drop(state);

        info!("Cached token invalidated");
        self.emit(AuthEvent::TokenInvalidated);
        true
    }

    /// The cached token if it is still usable. Never performs I/O.
    pub fn peek(&self) -> Option<Token> {
        let now = self.clock.now();
        self.state
            .lock()
            .token
            .as_ref()
            .filter(|token| token.is_valid_at(now))
            .cloned()
    }

    /// Whether an exchange is currently pending.
    pub fn is_exchanging(&self) -> bool {
        self.state.lock().in_flight.is_some()
    }

    fn start_exchange(&self) -> SharedExchange {
        let exchanger = Arc::clone(&self.exchanger);
        let clock = Arc::clone(&self.clock);
        let skew = self.skew;

        async move {
            let issued = exchanger.exchange().await?;

            let lifetime = to_chrono(issued.expires_in);
            let effective = if lifetime > skew { lifetime - skew } else { lifetime };
            let now = clock.now();
            let token = Token::new(issued.access_token, now + effective);

            if !token.is_valid_at(now) {
                return Err(CredentialExchangeError::InvalidResponse(
                    "Token expired on arrival".to_string(),
                ));
            }
            Ok(token)
        }
        .boxed()
        .shared()
    }

    /// Applies the outcome of exchange `generation`. The first waiter to get
    /// here clears the in-flight slot; later waiters find nothing to do.
    fn settle(&self, generation: u64, result: &Result<Token>) {
        let mut state = self.state.lock();
        match state.in_flight.as_ref() {
            Some(in_flight) if in_flight.generation == generation => {}
            _ => return,
        }
        state.in_flight = None;

        match result {
            Ok(token) => {
                state.token = Some(token.clone());
                drop(state);
                info!(expires_at = %token.expires_at(), "Access token refreshed");
                self.emit(AuthEvent::TokenRefreshed {
                    expires_at: token.expires_at().timestamp(),
                });
            }
            Err(error) => {
                state.token = None;
                drop(state);
                warn!(error = %error, "Credential exchange failed");
                self.emit(AuthEvent::AuthError {
                    message: error.to_string(),
                    recoverable: error.is_recoverable(),
                });
            }
        }
    }

    fn emit(&self, event: AuthEvent) {
        if let Some(bus) = &self.event_bus {
            bus.emit(CoreEvent::Auth(event)).ok();
        }
    }
}

fn to_chrono(duration: Duration) -> ChronoDuration {
    ChronoDuration::from_std(duration).unwrap_or_else(|_| ChronoDuration::days(365))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::exchange::ExchangedToken;
    use async_trait::async_trait;
    use bridge_traits::time::ManualClock;
    use chrono::Utc;
    use futures::future::join_all;
    use std::collections::VecDeque;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::sync::Semaphore;

    /// Exchanger answering from a script, optionally held until released.
    struct ScriptedExchanger {
        calls: AtomicUsize,
        script: Mutex<VecDeque<Result<ExchangedToken>>>,
        gate: Option<Semaphore>,
    }

    impl ScriptedExchanger {
        fn new(script: Vec<Result<ExchangedToken>>) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                script: Mutex::new(script.into()),
                gate: None,
            }
        }

        fn gated(script: Vec<Result<ExchangedToken>>) -> Self {
            Self {
                gate: Some(Semaphore::new(0)),
                ..Self::new(script)
            }
        }

        fn release(&self) {
            if let Some(gate) = &self.gate {
                gate.add_permits(1);
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl CredentialExchanger for ScriptedExchanger {
        async fn exchange(&self) -> Result<ExchangedToken> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if let Some(gate) = &self.gate {
                gate.acquire().await.unwrap().forget();
            }
            self.script
                .lock()
                .pop_front()
                .unwrap_or_else(|| Err(CredentialExchangeError::Network("script exhausted".into())))
        }
    }

    fn issued(value: &str, secs: u64) -> Result<ExchangedToken> {
        Ok(ExchangedToken::new(value, Duration::from_secs(secs)))
    }

    fn cache_with(
        exchanger: &Arc<ScriptedExchanger>,
        clock: &Arc<ManualClock>,
    ) -> TokenCache {
        TokenCache::new(exchanger.clone(), clock.clone())
    }

    #[tokio::test]
    async fn second_call_within_lifetime_makes_no_exchange() {
        let exchanger = Arc::new(ScriptedExchanger::new(vec![issued("t1", 3600)]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&exchanger, &clock);

        let first = cache.get_token().await.unwrap();
        clock.advance(ChronoDuration::milliseconds(900));
        let second = cache.get_token().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(exchanger.calls(), 1);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let exchanger = Arc::new(ScriptedExchanger::gated(vec![issued("shared", 3600)]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&exchanger, &clock);

        let mut all = Box::pin(join_all((0..8).map(|_| cache.get_token())));
        assert!(futures::poll!(all.as_mut()).is_pending());
        assert!(cache.is_exchanging());

        exchanger.release();
        let tokens = all.await;

        assert_eq!(exchanger.calls(), 1);
        for token in tokens {
            assert_eq!(token.unwrap().value(), "shared");
        }
        assert!(!cache.is_exchanging());
    }

    #[tokio::test]
    async fn failure_reaches_every_waiter_and_next_call_retries() {
        let exchanger = Arc::new(ScriptedExchanger::gated(vec![
            Err(CredentialExchangeError::Rejected {
                status: 503,
                message: "busy".into(),
            }),
            issued("after-failure", 3600),
        ]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&exchanger, &clock);

        let mut all = Box::pin(join_all((0..3).map(|_| cache.get_token())));
        assert!(futures::poll!(all.as_mut()).is_pending());
        exchanger.release();

        for result in all.await {
            assert!(matches!(
                result,
                Err(CredentialExchangeError::Rejected { status: 503, .. })
            ));
        }
        assert_eq!(exchanger.calls(), 1);
        assert!(cache.peek().is_none());

        exchanger.release();
        let token = cache.get_token().await.unwrap();
        assert_eq!(token.value(), "after-failure");
        assert_eq!(exchanger.calls(), 2);
    }

    #[tokio::test]
    async fn token_never_served_at_or_after_expiry() {
        let exchanger = Arc::new(ScriptedExchanger::new(vec![
            issued("first", 3600),
            issued("second", 3600),
        ]));
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let cache = cache_with(&exchanger, &clock);

        let first = cache.get_token().await.unwrap();
        assert_eq!(first.expires_at(), start + ChronoDuration::seconds(3595));

        clock.set(start + ChronoDuration::seconds(3594));
        assert_eq!(cache.get_token().await.unwrap().value(), "first");

        clock.set(first.expires_at());
        assert!(cache.peek().is_none());
        let refreshed = cache.get_token().await.unwrap();
        assert_eq!(refreshed.value(), "second");
        assert!(refreshed.is_valid_at(clock.now()));
        assert_eq!(exchanger.calls(), 2);
    }

    #[tokio::test]
    async fn skew_is_not_applied_to_short_lifetimes() {
        let exchanger = Arc::new(ScriptedExchanger::new(vec![issued("short", 3)]));
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let cache = cache_with(&exchanger, &clock);

        let token = cache.get_token().await.unwrap();
        assert_eq!(token.expires_at(), start + ChronoDuration::seconds(3));
    }

    #[tokio::test]
    async fn custom_skew_is_honoured() {
        let exchanger = Arc::new(ScriptedExchanger::new(vec![issued("t", 3600)]));
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let cache = cache_with(&exchanger, &clock).with_expiry_skew(Duration::from_secs(60));

        let token = cache.get_token().await.unwrap();
        assert_eq!(token.expires_at(), start + ChronoDuration::seconds(3540));
    }

    #[tokio::test]
    async fn invalidate_only_drops_the_rejected_token() {
        let exchanger = Arc::new(ScriptedExchanger::new(vec![
            issued("old", 3600),
            issued("new", 3600),
        ]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let cache = cache_with(&exchanger, &clock);

        let old = cache.get_token().await.unwrap();
        assert!(cache.invalidate(&old));
        assert!(!cache.invalidate(&old));

        let new = cache.get_token().await.unwrap();
        assert_eq!(new.value(), "new");

        // A late rejection of the old token must not evict the new one.
        assert!(!cache.invalidate(&old));
        assert_eq!(cache.peek(), Some(new));
        assert_eq!(exchanger.calls(), 2);
    }

    #[tokio::test]
    async fn emits_refresh_events() {
        let exchanger = Arc::new(ScriptedExchanger::new(vec![issued("t", 3600)]));
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let bus = EventBus::new(16);
        let mut events = bus.subscribe();
        let cache = cache_with(&exchanger, &clock).with_event_bus(bus);

        let token = cache.get_token().await.unwrap();

        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshing)
        );
        assert_eq!(
            events.recv().await.unwrap(),
            CoreEvent::Auth(AuthEvent::TokenRefreshed {
                expires_at: token.expires_at().timestamp()
            })
        );
    }
}
