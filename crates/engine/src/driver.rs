// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Single-task driver
//!
//! The spawned task owns the engine. Requests from [`EngineHandle`]s, remote
//! notifications and timer ticks are taken one at a time by a `select!` loop,
//! so local mutations and remote snapshots never interleave.

use crate::engine::{MutationTicket, SyncEngine};
use crate::error::EngineError;
use crate::status::SyncStatus;
use canvass_adapters::{
    ChangeStream, IdentityProvider, RealtimeNotifier, RemoteChange, RemoteStore,
};
use canvass_core::{Clock, Command, IdGen, ProtectionFlag, Snapshot};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

const REQUEST_BUFFER: usize = 64;

type Reply<T> = oneshot::Sender<Result<T, EngineError>>;

enum Request {
    Mutate {
        command: Command,
        reply: Reply<MutationTicket>,
    },
    SetOnline {
        online: bool,
        reply: Reply<()>,
    },
    Protect {
        flag: ProtectionFlag,
        reply: Reply<()>,
    },
    Release {
        flag: ProtectionFlag,
        reply: Reply<()>,
    },
    ForceResync {
        reply: Reply<()>,
    },
    SignOut {
        reply: Reply<()>,
    },
}

/// Cloneable front door to a running engine
#[derive(Clone)]
pub struct EngineHandle {
    requests: mpsc::Sender<Request>,
    snapshots: watch::Receiver<Snapshot>,
    status: watch::Receiver<SyncStatus>,
}

impl EngineHandle {
    pub async fn mutate(&self, command: Command) -> Result<MutationTicket, EngineError> {
        self.call(|reply| Request::Mutate { command, reply }).await
    }

    pub async fn set_online(&self, online: bool) -> Result<(), EngineError> {
        self.call(|reply| Request::SetOnline { online, reply }).await
    }

    pub async fn protect(&self, flag: ProtectionFlag) -> Result<(), EngineError> {
        self.call(|reply| Request::Protect { flag, reply }).await
    }

    pub async fn release(&self, flag: ProtectionFlag) -> Result<(), EngineError> {
        self.call(|reply| Request::Release { flag, reply }).await
    }

    pub async fn force_resync(&self) -> Result<(), EngineError> {
        self.call(|reply| Request::ForceResync { reply }).await
    }

    /// Sign out and stop the driver
    pub async fn sign_out(&self) -> Result<(), EngineError> {
        self.call(|reply| Request::SignOut { reply }).await
    }

    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshots.clone()
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.clone()
    }

    async fn call<T>(
        &self,
        request: impl FnOnce(Reply<T>) -> Request,
    ) -> Result<T, EngineError> {
        let (tx, rx) = oneshot::channel();
        self.requests
            .send(request(tx))
            .await
            .map_err(|_| EngineError::Stopped)?;
        rx.await.map_err(|_| EngineError::Stopped)?
    }
}

/// Run `engine` as a task: bootstrap, subscribe to the user's changes, then
/// serve requests, notifications and ticks until sign-out or until every
/// handle is dropped
pub fn spawn<R, I, C, G, N>(engine: SyncEngine<R, I, C, G>, notifier: N) -> (EngineHandle, JoinHandle<()>)
where
    R: RemoteStore,
    I: IdentityProvider,
    C: Clock + 'static,
    G: IdGen + 'static,
    N: RealtimeNotifier,
{
    let (requests, rx) = mpsc::channel(REQUEST_BUFFER);
    let handle = EngineHandle {
        requests,
        snapshots: engine.subscribe(),
        status: engine.subscribe_status(),
    };
    let task = tokio::spawn(run(engine, notifier, rx));
    (handle, task)
}

async fn run<R, I, C, G, N>(
    mut engine: SyncEngine<R, I, C, G>,
    notifier: N,
    mut requests: mpsc::Receiver<Request>,
) where
    R: RemoteStore,
    I: IdentityProvider,
    C: Clock,
    G: IdGen,
    N: RealtimeNotifier,
{
    let user_id = engine.session().user_id.clone();
    tracing::info!(%user_id, "sync engine starting");

    if let Err(e) = engine.bootstrap().await {
        tracing::warn!(error = %e, "bootstrap failed");
    }

    let mut changes = match notifier.subscribe(&user_id).await {
        Ok(stream) => Some(stream),
        Err(e) => {
            tracing::warn!(error = %e, "realtime subscription failed, relying on fetches");
            None
        }
    };

    let mut ticker = tokio::time::interval(engine.config().tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            request = requests.recv() => {
                let Some(request) = request else {
                    tracing::debug!("all handles dropped");
                    break;
                };
                if handle_request(&mut engine, request).await.is_break() {
                    break;
                }
            }

            change = next_change(&mut changes) => match change {
                Some(change) => {
                    if let Err(e) = engine.handle_remote_change(change).await {
                        tracing::error!(error = %e, "error applying remote change");
                    }
                }
                None => {
                    tracing::info!("realtime stream closed");
                    changes = None;
                }
            },

            _ = ticker.tick() => {
                if let Err(e) = engine.tick().await {
                    tracing::error!(error = %e, "error on tick");
                }
            }
        }
    }

    tracing::info!(%user_id, "sync engine stopped");
}

async fn next_change(changes: &mut Option<ChangeStream>) -> Option<RemoteChange> {
    match changes {
        Some(stream) => stream.recv().await,
        None => std::future::pending().await,
    }
}

async fn handle_request<R, I, C, G>(
    engine: &mut SyncEngine<R, I, C, G>,
    request: Request,
) -> std::ops::ControlFlow<()>
where
    R: RemoteStore,
    I: IdentityProvider,
    C: Clock,
    G: IdGen,
{
    use std::ops::ControlFlow;

    match request {
        Request::Mutate { command, reply } => {
            let _ = reply.send(engine.mutate(command).await);
        }
        Request::SetOnline { online, reply } => {
            let _ = reply.send(engine.set_online(online).await);
        }
        Request::Protect { flag, reply } => {
            let _ = reply.send(engine.protect(flag));
        }
        Request::Release { flag, reply } => {
            let _ = reply.send(engine.release(flag).await);
        }
        Request::ForceResync { reply } => {
            let _ = reply.send(engine.force_resync().await);
        }
        Request::SignOut { reply } => {
            let _ = reply.send(engine.sign_out());
            return ControlFlow::Break(());
        }
    }
    ControlFlow::Continue(())
}

#[cfg(test)]
#[path = "driver_tests.rs"]
mod tests;
