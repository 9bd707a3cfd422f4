//! The bridge event loop.
//!
//! One task owns the [`Dispatcher`] and serves three sources: inbound host
//! commands, the scheduler's recurring activities and, while loading, the
//! engine instantiation future. Engine access is therefore never concurrent.

use std::sync::Arc;

use gatebridge_data::{HostMessage, RawCommand};
use tokio::sync::mpsc::UnboundedReceiver;

use crate::command::Command;
use crate::config::BridgeConfig;
use crate::dispatcher::Dispatcher;
use crate::engine::EngineLoader;
use crate::error::Result;
use crate::outbox::Outbox;

pub struct Bridge {
    dispatcher: Dispatcher,
    loader: Arc<dyn EngineLoader>,
    request_module: bool,
}

impl Bridge {
    pub fn new(config: &BridgeConfig, loader: Arc<dyn EngineLoader>, outbox: Outbox) -> Self {
        Self {
            dispatcher: Dispatcher::new(config, outbox),
            loader,
            request_module: config.lifecycle.request_module_on_boot,
        }
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Serves the host until the inbound channel closes, then cancels all
    /// recurring activity.
    pub async fn run(mut self, mut inbound: UnboundedReceiver<RawCommand>) -> Result<()> {
        if self.request_module {
            self.dispatcher.outbox().send(HostMessage::FetchWasm);
        }
        tracing::info!("bridge started");

        let mut open = true;
        while open {
            tokio::select! {
                raw = inbound.recv() => match raw {
                    Some(raw) => open = self.receive(raw, &mut inbound).await,
                    None => open = false,
                },
                activity = self.dispatcher.next_activity() => {
                    self.dispatcher.on_activity(activity);
                }
            }
        }

        self.dispatcher.shutdown();
        tracing::info!("inbound channel closed, bridge stopped");
        Ok(())
    }

    /// Returns false once the inbound channel has closed.
    async fn receive(&mut self, raw: RawCommand, inbound: &mut UnboundedReceiver<RawCommand>) -> bool {
        let Some(command) = decode(raw) else {
            return true;
        };
        match command {
            Command::Fetch(image) => self.load(Some(image), inbound).await,
            Command::LoadBuiltin => self.load(None, inbound).await,
            command => {
                self.dispatcher.receive(command);
                true
            }
        }
    }

    async fn load(&mut self, module: Option<Vec<u8>>, inbound: &mut UnboundedReceiver<RawCommand>) -> bool {
        if !self.dispatcher.begin_loading() {
            return true;
        }

        let loader = Arc::clone(&self.loader);
        let loading = loader.instantiate(module);
        tokio::pin!(loading);

        let mut open = true;
        let result = loop {
            tokio::select! {
                result = &mut loading => break result,
                raw = inbound.recv(), if open => match raw {
                    None => open = false,
                    Some(raw) => match decode(raw) {
                        Some(command) if command.is_module_load() => {
                            tracing::warn!(command = command.kind(), "engine load in progress, ignoring");
                        }
                        Some(command) => self.dispatcher.receive(command),
                        None => {}
                    },
                },
            }
        };

        self.dispatcher.finish_loading(result);
        open
    }
}

fn decode(raw: RawCommand) -> Option<Command> {
    let kind = raw.kind.clone();
    match Command::try_from(raw) {
        Ok(command) => Some(command),
        Err(e) => {
            tracing::warn!(command = %kind, error = %e, "dropping malformed command");
            None
        }
    }
}
