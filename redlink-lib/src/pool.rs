//! A bounded, multiplexed pool of clients keyed by endpoint.
//!
//! The pool is the only component allowed to hand out clients for shared
//! use: a leased client belongs exclusively to its borrower until the
//! guard drops, which is how single-writer/single-reader connections stay
//! single-writer under parallel callers. Idle clients form a LIFO stack
//! per endpoint so the warmest connection goes out first.
//!
//! The map is guarded by one short-critical-section mutex; no I/O happens
//! under the lock. Waiters park on a `Notify` until a slot frees up or
//! their lease timeout elapses.

use std::collections::HashMap;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::sync::Notify;
use tokio::time;
use tracing::{debug, instrument};

use crate::clients::{Client, Endpoint};
use crate::{Error, Result};

#[derive(Clone, Debug)]
pub struct PoolConfig {
    /// Maximum connections per endpoint, leased and idle together.
    pub max_size: usize,
    /// How long a lease may wait for a free slot; `None` fails fast.
    pub wait_timeout: Option<Duration>,
    /// Issue `PING` on every lease and discard connections that fail it.
    pub health_check: bool,
}

impl Default for PoolConfig {
    fn default() -> PoolConfig {
        PoolConfig {
            max_size: 16,
            wait_timeout: None,
            health_check: false,
        }
    }
}

#[derive(Debug)]
struct Entry {
    client: Client,
    last_used: Instant,
    generation: u64,
}

#[derive(Default, Debug)]
struct State {
    idle: HashMap<Endpoint, Vec<Entry>>,
    /// Leased plus idle, per endpoint.
    total: HashMap<Endpoint, usize>,
    generation: u64,
    draining: bool,
}

#[derive(Debug)]
struct Inner {
    config: PoolConfig,
    state: Mutex<State>,
    freed: Notify,
}

/// Cloneable pool handle; clones share the same state.
#[derive(Clone)]
pub struct Pool {
    inner: Arc<Inner>,
}

enum Plan {
    Reuse(Client),
    Connect,
    Wait,
}

impl Pool {
    pub fn new(config: PoolConfig) -> Pool {
        Pool {
            inner: Arc::new(Inner {
                config,
                state: Mutex::new(State::default()),
                freed: Notify::new(),
            }),
        }
    }

    /// Leases a client for `endpoint`, connecting when the stack is empty
    /// and capacity remains.
    ///
    /// At capacity, waits up to the configured timeout for a return;
    /// without a timeout (or once it elapses, or after `drain`) fails with
    /// [`Error::PoolExhausted`].
    #[instrument(skip(self, endpoint), fields(addr = %endpoint.addr))]
    pub async fn lease(&self, endpoint: &Endpoint) -> Result<PooledClient> {
        let deadline = self.inner.config.wait_timeout.map(|wait| Instant::now() + wait);

        loop {
            let plan = {
                let mut state = self.inner.state.lock().expect("pool mutex poisoned");
                if state.draining {
                    return Err(Error::PoolExhausted);
                }
                if let Some(entry) = state.idle.get_mut(endpoint).and_then(Vec::pop) {
                    Plan::Reuse(entry.client)
                } else if state.total.get(endpoint).copied().unwrap_or(0)
                    < self.inner.config.max_size
                {
                    *state.total.entry(endpoint.clone()).or_insert(0) += 1;
                    Plan::Connect
                } else {
                    Plan::Wait
                }
            };

            match plan {
                Plan::Reuse(mut client) => {
                    if self.inner.config.health_check && !healthy(&mut client).await {
                        debug!("discarding unhealthy pooled connection");
                        client.close().await;
                        self.release_slot(endpoint);
                        continue;
                    }
                    return Ok(self.guard(endpoint, client));
                }
                Plan::Connect => match Client::connect(endpoint.clone()).await {
                    Ok(client) => return Ok(self.guard(endpoint, client)),
                    Err(err) => {
                        self.release_slot(endpoint);
                        return Err(err);
                    }
                },
                Plan::Wait => {
                    let Some(deadline) = deadline else {
                        return Err(Error::PoolExhausted);
                    };
                    let remaining = deadline.saturating_duration_since(Instant::now());
                    if remaining.is_zero()
                        || time::timeout(remaining, self.inner.freed.notified())
                            .await
                            .is_err()
                    {
                        return Err(Error::PoolExhausted);
                    }
                }
            }
        }
    }

    /// Closes idle clients unused for longer than `older_than`.
    pub fn evict_idle(&self, older_than: Duration) {
        let mut guard = self.inner.state.lock().expect("pool mutex poisoned");
        let state = &mut *guard;
        let mut evicted = 0usize;
        for (endpoint, stack) in &mut state.idle {
            let before = stack.len();
            // Dropping a client closes its socket.
            stack.retain(|entry| entry.last_used.elapsed() <= older_than);
            let dropped = before - stack.len();
            if dropped > 0 {
                evicted += dropped;
                if let Some(total) = state.total.get_mut(endpoint) {
                    *total -= dropped;
                }
            }
        }
        drop(guard);
        if evicted > 0 {
            debug!(evicted, "evicted idle connections");
            self.inner.freed.notify_waiters();
        }
    }

    /// Closes every idle client and fails all further leases. Clients
    /// still leased are closed when their guards drop.
    pub fn drain(&self) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.draining = true;
        for (endpoint, stack) in state.idle.drain().collect::<Vec<_>>() {
            if let Some(total) = state.total.get_mut(&endpoint) {
                *total -= stack.len();
            }
        }
        drop(state);
        self.inner.freed.notify_waiters();
    }

    /// Idle connections currently stacked for `endpoint`.
    pub fn idle_count(&self, endpoint: &Endpoint) -> usize {
        let state = self.inner.state.lock().expect("pool mutex poisoned");
        state.idle.get(endpoint).map_or(0, Vec::len)
    }

    fn guard(&self, endpoint: &Endpoint, client: Client) -> PooledClient {
        PooledClient {
            inner: self.inner.clone(),
            endpoint: endpoint.clone(),
            client: Some(client),
        }
    }

    fn release_slot(&self, endpoint: &Endpoint) {
        release_slot(&self.inner, endpoint);
    }
}

fn release_slot(inner: &Inner, endpoint: &Endpoint) {
    let mut state = inner.state.lock().expect("pool mutex poisoned");
    if let Some(total) = state.total.get_mut(endpoint) {
        *total = total.saturating_sub(1);
    }
    drop(state);
    inner.freed.notify_one();
}

/// Only a clean, normal-mode client goes back on the stack. Anything
/// mid-pipeline, mid-transaction, watching, subscribed, re-SELECTed, or
/// closed is discarded: its connection may carry state the next borrower
/// never asked for.
fn return_client(inner: &Inner, endpoint: &Endpoint, client: Client) {
    if !client.is_poolable() || client.is_closed() {
        // Dropping closes the socket (and stops a subscription reader).
        drop(client);
        release_slot(inner, endpoint);
        return;
    }

    let mut state = inner.state.lock().expect("pool mutex poisoned");
    if state.draining {
        drop(state);
        drop(client);
        release_slot(inner, endpoint);
        return;
    }
    state.generation += 1;
    let generation = state.generation;
    state.idle.entry(endpoint.clone()).or_default().push(Entry {
        client,
        last_used: Instant::now(),
        generation,
    });
    drop(state);
    debug!(generation, "returned client to the idle stack");
    inner.freed.notify_one();
}

async fn healthy(client: &mut Client) -> bool {
    matches!(client.ping(None).await, Ok(reply) if reply.as_ref() == b"PONG")
}

/// RAII lease over a pooled [`Client`]; returns it on drop.
#[derive(Debug)]
pub struct PooledClient {
    inner: Arc<Inner>,
    endpoint: Endpoint,
    client: Option<Client>,
}

impl PooledClient {
    /// Takes the client out of the pool's management entirely.
    pub fn detach(mut self) -> Client {
        let client = self.client.take().expect("client already detached");
        release_slot(&self.inner, &self.endpoint);
        client
    }
}

impl Deref for PooledClient {
    type Target = Client;

    fn deref(&self) -> &Client {
        self.client.as_ref().expect("client already detached")
    }
}

impl DerefMut for PooledClient {
    fn deref_mut(&mut self) -> &mut Client {
        self.client.as_mut().expect("client already detached")
    }
}

impl Drop for PooledClient {
    fn drop(&mut self) {
        if let Some(client) = self.client.take() {
            return_client(&self.inner, &self.endpoint, client);
        }
    }
}
