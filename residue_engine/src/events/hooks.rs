use std::{future::Future, pin::Pin, sync::Arc};

use log::*;

use crate::events::{
    EventHandler,
    EventProducer,
    Handler,
    OrderCancelledEvent,
    OrderDeliveredEvent,
    OrderDispatchedEvent,
    PaymentAppliedEvent,
    PaymentFailedEvent,
};

/// The publishing half of the hook system. The engine APIs hold one of these and publish to every subscriber.
#[derive(Default, Clone)]
pub struct EventProducers {
    pub payment_applied_producer: Vec<EventProducer<PaymentAppliedEvent>>,
    pub payment_failed_producer: Vec<EventProducer<PaymentFailedEvent>>,
    pub order_dispatched_producer: Vec<EventProducer<OrderDispatchedEvent>>,
    pub order_delivered_producer: Vec<EventProducer<OrderDeliveredEvent>>,
    pub order_cancelled_producer: Vec<EventProducer<OrderCancelledEvent>>,
}

impl EventProducers {
    pub async fn publish_payment_applied(&self, event: PaymentAppliedEvent) {
        for emitter in &self.payment_applied_producer {
            debug!("🔄️💳️ Notifying payment applied hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_payment_failed(&self, event: PaymentFailedEvent) {
        for emitter in &self.payment_failed_producer {
            debug!("🔄️💳️ Notifying payment failed hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_dispatched(&self, event: OrderDispatchedEvent) {
        for emitter in &self.order_dispatched_producer {
            debug!("🔄️🏭️ Notifying order dispatched hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_delivered(&self, event: OrderDeliveredEvent) {
        for emitter in &self.order_delivered_producer {
            debug!("🔄️🚚️ Notifying order delivered hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }

    pub async fn publish_order_cancelled(&self, event: OrderCancelledEvent) {
        for emitter in &self.order_cancelled_producer {
            debug!("🔄️📦️ Notifying order cancelled hook subscribers");
            emitter.publish_event(event.clone()).await;
        }
    }
}

pub struct EventHandlers {
    pub on_payment_applied: Option<EventHandler<PaymentAppliedEvent>>,
    pub on_payment_failed: Option<EventHandler<PaymentFailedEvent>>,
    pub on_order_dispatched: Option<EventHandler<OrderDispatchedEvent>>,
    pub on_order_delivered: Option<EventHandler<OrderDeliveredEvent>>,
    pub on_order_cancelled: Option<EventHandler<OrderCancelledEvent>>,
}

impl EventHandlers {
    pub fn new(buffer_size: usize, hooks: EventHooks) -> Self {
        Self {
            on_payment_applied: hooks.on_payment_applied.map(|f| EventHandler::new(buffer_size, f)),
            on_payment_failed: hooks.on_payment_failed.map(|f| EventHandler::new(buffer_size, f)),
            on_order_dispatched: hooks.on_order_dispatched.map(|f| EventHandler::new(buffer_size, f)),
            on_order_delivered: hooks.on_order_delivered.map(|f| EventHandler::new(buffer_size, f)),
            on_order_cancelled: hooks.on_order_cancelled.map(|f| EventHandler::new(buffer_size, f)),
        }
    }

    pub fn producers(&self) -> EventProducers {
        let mut result = EventProducers::default();
        if let Some(handler) = &self.on_payment_applied {
            result.payment_applied_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_payment_failed {
            result.payment_failed_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_dispatched {
            result.order_dispatched_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_delivered {
            result.order_delivered_producer.push(handler.subscribe());
        }
        if let Some(handler) = &self.on_order_cancelled {
            result.order_cancelled_producer.push(handler.subscribe());
        }
        result
    }

    /// Spawns every configured handler onto the runtime.
    pub fn start_handlers(self) {
        spawn_handler(self.on_payment_applied);
        spawn_handler(self.on_payment_failed);
        spawn_handler(self.on_order_dispatched);
        spawn_handler(self.on_order_delivered);
        spawn_handler(self.on_order_cancelled);
    }
}

fn spawn_handler<E: Send + Sync + 'static>(handler: Option<EventHandler<E>>) {
    if let Some(handler) = handler {
        tokio::spawn(async move {
            handler.start_handler().await;
        });
    }
}

#[derive(Default, Clone)]
pub struct EventHooks {
    pub on_payment_applied: Option<Handler<PaymentAppliedEvent>>,
    pub on_payment_failed: Option<Handler<PaymentFailedEvent>>,
    pub on_order_dispatched: Option<Handler<OrderDispatchedEvent>>,
    pub on_order_delivered: Option<Handler<OrderDeliveredEvent>>,
    pub on_order_cancelled: Option<Handler<OrderCancelledEvent>>,
}

impl EventHooks {
    pub fn on_payment_applied<F>(&mut self, f: F) -> &mut Self
    where F: Fn(PaymentAppliedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_payment_applied = Some(Arc::new(f));
        self
    }

    pub fn on_payment_failed<F>(&mut self, f: F) -> &mut Self
    where F: Fn(PaymentFailedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_payment_failed = Some(Arc::new(f));
        self
    }

    pub fn on_order_dispatched<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderDispatchedEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_order_dispatched = Some(Arc::new(f));
        self
    }

    pub fn on_order_delivered<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderDeliveredEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_order_delivered = Some(Arc::new(f));
        self
    }

    pub fn on_order_cancelled<F>(&mut self, f: F) -> &mut Self
    where F: Fn(OrderCancelledEvent) -> Pin<Box<dyn Future<Output = ()> + Send>> + Send + Sync + 'static {
        self.on_order_cancelled = Some(Arc::new(f));
        self
    }
}
