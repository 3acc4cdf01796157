//! Lifecycle events and a small publish/subscribe broker.
//!
//! Handlers return `true` to let an action proceed. Only
//! [`Event::BeforeAnnotationRemoved`] is acted upon when vetoed, every other
//! event is purely informational.

use crate::annotation::{Annotation, Shape};
use crate::geometry::Point;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventType {
    MouseOverAnnotatableItem,
    MouseOutOfAnnotatableItem,
    MouseOverAnnotation,
    MouseOutOfAnnotation,
    SelectionStarted,
    SelectionChanged,
    SelectionCompleted,
    SelectionCanceled,
    EditorShown,
    BeforePopupHide,
    BeforeAnnotationRemoved,
    AnnotationRemoved,
    AnnotationCreated,
    AnnotationUpdated,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    MouseOverAnnotatableItem { src: String },
    MouseOutOfAnnotatableItem { src: String },
    MouseOverAnnotation { annotation: Annotation },
    MouseOutOfAnnotation { annotation: Annotation },
    SelectionStarted { src: String, point: Point },
    SelectionChanged { src: String, shape: Shape },
    SelectionCompleted { src: String, shape: Shape },
    SelectionCanceled { src: String },
    /// `annotation` is set when an existing annotation is being edited.
    EditorShown {
        src: String,
        annotation: Option<Annotation>,
    },
    BeforePopupHide { annotation: Annotation },
    BeforeAnnotationRemoved { annotation: Annotation },
    AnnotationRemoved { annotation: Annotation },
    AnnotationCreated { annotation: Annotation },
    AnnotationUpdated { annotation: Annotation },
}

impl Event {
    pub fn event_type(&self) -> EventType {
        match self {
            Event::MouseOverAnnotatableItem { .. } => EventType::MouseOverAnnotatableItem,
            Event::MouseOutOfAnnotatableItem { .. } => EventType::MouseOutOfAnnotatableItem,
            Event::MouseOverAnnotation { .. } => EventType::MouseOverAnnotation,
            Event::MouseOutOfAnnotation { .. } => EventType::MouseOutOfAnnotation,
            Event::SelectionStarted { .. } => EventType::SelectionStarted,
            Event::SelectionChanged { .. } => EventType::SelectionChanged,
            Event::SelectionCompleted { .. } => EventType::SelectionCompleted,
            Event::SelectionCanceled { .. } => EventType::SelectionCanceled,
            Event::EditorShown { .. } => EventType::EditorShown,
            Event::BeforePopupHide { .. } => EventType::BeforePopupHide,
            Event::BeforeAnnotationRemoved { .. } => EventType::BeforeAnnotationRemoved,
            Event::AnnotationRemoved { .. } => EventType::AnnotationRemoved,
            Event::AnnotationCreated { .. } => EventType::AnnotationCreated,
            Event::AnnotationUpdated { .. } => EventType::AnnotationUpdated,
        }
    }

    /// Image the event belongs to.
    pub fn src(&self) -> &str {
        match self {
            Event::MouseOverAnnotatableItem { src }
            | Event::MouseOutOfAnnotatableItem { src }
            | Event::SelectionStarted { src, .. }
            | Event::SelectionChanged { src, .. }
            | Event::SelectionCompleted { src, .. }
            | Event::SelectionCanceled { src }
            | Event::EditorShown { src, .. } => src,
            Event::MouseOverAnnotation { annotation }
            | Event::MouseOutOfAnnotation { annotation }
            | Event::BeforePopupHide { annotation }
            | Event::BeforeAnnotationRemoved { annotation }
            | Event::AnnotationRemoved { annotation }
            | Event::AnnotationCreated { annotation }
            | Event::AnnotationUpdated { annotation } => &annotation.src,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(u64);

pub type Handler = Box<dyn FnMut(&Event) -> bool>;

#[derive(Default)]
pub struct EventBroker {
    handlers: Vec<(HandlerId, EventType, Handler)>,
    next_id: u64,
}

impl EventBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_handler(
        &mut self,
        event_type: EventType,
        handler: impl FnMut(&Event) -> bool + 'static,
    ) -> HandlerId {
        self.next_id += 1;
        let id = HandlerId(self.next_id);
        self.handlers.push((id, event_type, Box::new(handler)));
        id
    }

    /// Returns whether the handler was registered.
    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        let before = self.handlers.len();
        self.handlers.retain(|(hid, _, _)| *hid != id);
        self.handlers.len() != before
    }

    pub fn remove_handlers(&mut self, event_type: EventType) {
        self.handlers.retain(|(_, t, _)| *t != event_type);
    }

    /// Runs every matching handler in registration order. `false` if any vetoed.
    pub fn fire(&mut self, event: &Event) -> bool {
        let event_type = event.event_type();
        tracing::trace!(?event_type, src = event.src(), "fire");

        let mut allowed = true;
        for (_, t, handler) in self.handlers.iter_mut() {
            if *t == event_type && !handler(event) {
                allowed = false;
            }
        }
        allowed
    }
}

impl std::fmt::Debug for EventBroker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroker")
            .field("handlers", &self.handlers.len())
            .finish()
    }
}
