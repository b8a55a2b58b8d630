use super::context::{ControllerContext, SharedContext};
use super::dispatcher::ActionDispatcher;
use super::ingest::{ProgressEvent, ProgressIngestor};
use crate::gateway::TaskGateway;
use crate::util::i18n::LocalizationManager;
use crate::view::projector::ProjectorOptions;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Owns the shared context and wires the dispatcher and ingestor to it
pub struct Controller<G: ?Sized> {
    gateway: Arc<G>,
    context: SharedContext,
    dispatcher: ActionDispatcher<G>,
    ingestor: ProgressIngestor,
}

impl<G: ?Sized> Clone for Controller<G> {
    fn clone(&self) -> Self {
        Self {
            gateway: Arc::clone(&self.gateway),
            context: Arc::clone(&self.context),
            dispatcher: self.dispatcher.clone(),
            ingestor: self.ingestor.clone(),
        }
    }
}

impl<G: TaskGateway + ?Sized + 'static> Controller<G> {
    pub fn new(gateway: Arc<G>, i18n: Arc<LocalizationManager>, options: ProjectorOptions) -> Self {
        let context = ControllerContext::new(i18n, options).into_shared();
        Self {
            dispatcher: ActionDispatcher::new(Arc::clone(&gateway), Arc::clone(&context)),
            ingestor: ProgressIngestor::new(Arc::clone(&context)),
            gateway,
            context,
        }
    }

    pub fn gateway(&self) -> &Arc<G> {
        &self.gateway
    }

    pub fn context(&self) -> &SharedContext {
        &self.context
    }

    pub fn dispatcher(&self) -> &ActionDispatcher<G> {
        &self.dispatcher
    }

    pub fn ingestor(&self) -> &ProgressIngestor {
        &self.ingestor
    }

    /// Start consuming backend events in the background
    pub fn spawn_ingest(&self, events: mpsc::Receiver<ProgressEvent>) -> JoinHandle<()> {
        self.ingestor.clone().spawn(events)
    }
}
