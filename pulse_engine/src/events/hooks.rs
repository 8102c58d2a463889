use std::{future::Future, pin::Pin, sync::Arc};

use tokio::task::JoinHandle;

use crate::events::{EventHandler, EventProducer, GoalCompletedEvent, Handler, PaymentEvent};

#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_received_producer: Vec<EventProducer<PaymentEvent>>,
    pub goal_completed_producer: Vec<EventProducer<GoalCompletedEvent>>,
}

pub struct EventHandlers {
    pub on_payment_received: Vec<EventHandler<PaymentEvent>>,
    pub on_goal_completed: Vec<EventHandler<GoalCompletedEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        let on_payment_received =
            hooks.on_payment_received.into_iter().map(|f| EventHandler::new(buffer_size, f)).collect();
        let on_goal_completed = hooks.on_goal_completed.into_iter().map(|f| EventHandler::new(buffer_size, f)).collect();
        Self { on_payment_received, on_goal_completed }
    }

    pub fn producers(&self) -> EventProducers {
        EventProducers {
            payment_received_producer: self.on_payment_received.iter().map(EventHandler::subscribe).collect(),
            goal_completed_producer: self.on_goal_completed.iter().map(EventHandler::subscribe).collect(),
        }
    }

    /// Spawns every handler. Each task ends once all the producers feeding it have been dropped.
    pub fn start_handlers(self) -> Vec<JoinHandle<()>> {
        let payments = self.on_payment_received.into_iter().map(|h| tokio::spawn(h.start_handler()));
        let goals = self.on_goal_completed.into_iter().map(|h| tokio::spawn(h.start_handler()));
        payments.chain(goals).collect()
    }
}

/// Registers async callbacks for marketplace events. Several hooks may be registered for the same event.
#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_received: Vec<Handler<PaymentEvent>>,
    pub on_goal_completed: Vec<Handler<GoalCompletedEvent>>,
}

impl EventHooks {
    pub fn on_payment_received<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(PaymentEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_payment_received.push(Arc::new(f));
        self
    }

    pub fn on_goal_completed<F>(&mut self, f: F) -> &mut Self
    where F: (Fn(GoalCompletedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>>) + Send + Sync + 'static {
        self.on_goal_completed.push(Arc::new(f));
        self
    }

    /// Registers an already type-erased payment hook, such as [`crate::events::PaymentBroadcaster::hook`].
    pub fn add_payment_received_handler(&mut self, handler: Handler<PaymentEvent>) -> &mut Self {
        self.on_payment_received.push(handler);
        self
    }
}
