//! Per-image controller.
//!
//! An [`ImageAnnotator`] owns the selectors, viewer, popup, editor and hint
//! of one image and moves between three modes:
//!
//! * `Viewing`: pointer hover highlights annotations and shows the popup.
//! * `Selecting`: pointer input goes to the active selector.
//! * `Editing`: the text editor is open for a new or existing annotation.
//!
//! The pointer methods take image pixel positions and a timestamp in
//! seconds, which keeps the choreography testable without a GUI. [`show`]
//! is the egui glue that feeds them.
//!
//! [`show`]: ImageAnnotator::show

use std::time::Duration;

use eframe::egui::{self, Color32, Key, Pos2, Rect, Vec2, load::SizedTexture};

use crate::annotation::{Annotation, AnnotationId, Geometry};
use crate::config::Settings;
use crate::editor::{Editor, EditorAction, EditorTarget};
use crate::error::{Error, Result};
use crate::events::{Event, EventBroker};
use crate::geometry::{ImageFrame, Point};
use crate::hint::Hint;
use crate::popup::{Popup, PopupAction};
use crate::selector::{SelectionEvent, Selector, builtin_selectors};
use crate::viewer::{Viewer, paint_outline};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Viewing,
    Selecting,
    Editing,
}

pub struct ImageAnnotator {
    src: String,
    image_size: Vec2,
    settings: Settings,
    selectors: Vec<Box<dyn Selector>>,
    active: usize,
    viewer: Viewer,
    popup: Popup,
    editor: Editor,
    hint: Hint,
    mode: Mode,
    selection_enabled: bool,
    pointer_inside: bool,
    last_pointer: Option<Point>,
}

impl ImageAnnotator {
    pub fn new(src: impl Into<String>, image_size: Vec2, settings: &Settings) -> Result<Self> {
        let src = src.into();
        if image_size.x <= 0.0 || image_size.y <= 0.0 {
            return Err(Error::EmptyImage {
                src,
                width: image_size.x,
                height: image_size.y,
            });
        }

        let selectors = builtin_selectors(settings);
        let active = match selectors
            .iter()
            .position(|s| s.name() == settings.default_selector)
        {
            Some(i) => i,
            None => {
                tracing::warn!(
                    selector = %settings.default_selector,
                    "unknown default selector, falling back to '{}'",
                    selectors[0].name()
                );
                0
            }
        };

        tracing::debug!(%src, width = image_size.x, height = image_size.y, "annotator created");
        Ok(Self {
            src,
            image_size,
            settings: settings.clone(),
            selectors,
            active,
            viewer: Viewer::new(image_size),
            popup: Popup::default(),
            editor: Editor::default(),
            hint: Hint::default(),
            mode: Mode::Viewing,
            selection_enabled: true,
            pointer_inside: false,
            last_pointer: None,
        })
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    pub fn image_size(&self) -> Vec2 {
        self.image_size
    }

    pub fn mode(&self) -> Mode {
        self.mode
    }

    pub fn popup(&self) -> &Popup {
        &self.popup
    }

    pub fn editor(&self) -> &Editor {
        &self.editor
    }

    pub fn editor_mut(&mut self) -> &mut Editor {
        &mut self.editor
    }

    pub fn hint(&self) -> &Hint {
        &self.hint
    }

    pub fn highlighted(&self) -> Option<&Annotation> {
        self.viewer.highlighted()
    }

    fn selector(&mut self) -> &mut dyn Selector {
        self.selectors[self.active].as_mut()
    }

    pub fn selector_names(&self) -> Vec<&'static str> {
        self.selectors.iter().map(|s| s.name()).collect()
    }

    pub fn active_selector(&self) -> &'static str {
        self.selectors[self.active].name()
    }

    /// Switching abandons a selection in progress without firing events. A
    /// shape waiting in the editor stays there.
    pub fn activate_selector(&mut self, name: &str) -> Result<()> {
        let index = self
            .selectors
            .iter()
            .position(|s| s.name() == name)
            .ok_or_else(|| Error::UnknownSelector(name.to_string()))?;
        self.selector().stop_selection();
        if self.mode == Mode::Selecting {
            self.mode = Mode::Viewing;
        }
        self.active = index;
        Ok(())
    }

    pub fn set_selection_enabled(&mut self, enabled: bool) {
        self.selection_enabled = enabled;
        if !enabled {
            self.hint.hide();
            if self.mode == Mode::Selecting {
                self.selector().stop_selection();
                self.mode = Mode::Viewing;
            }
        }
    }

    pub fn selection_enabled(&self) -> bool {
        self.selection_enabled
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<()> {
        annotation.validate()?;
        if annotation.src != self.src {
            tracing::warn!(
                src = %annotation.src,
                annotator = %self.src,
                "adding annotation that belongs to another image"
            );
        }
        self.viewer.add(annotation);
        Ok(())
    }

    /// API removal: no events, no veto.
    pub fn remove_annotation(&mut self, id: AnnotationId) -> Option<Annotation> {
        if self.popup.annotation().is_some_and(|a| a.id == id) {
            self.popup.hide();
        }
        let editing = matches!(
            self.editor.target(),
            Some(EditorTarget::Edit { annotation, .. }) if annotation.id == id
        );
        if editing {
            self.mode = Mode::Viewing;
            return match self.editor.close()? {
                (EditorTarget::Edit { annotation, .. }, _) => Some(annotation),
                (EditorTarget::Create(_), _) => None,
            };
        }
        self.viewer.remove(id)
    }

    /// Every annotation, including one temporarily out of the viewer for editing.
    pub fn annotations(&self) -> Vec<Annotation> {
        let mut all = self.viewer.annotations().to_vec();
        if let Some(EditorTarget::Edit { annotation, index }) = self.editor.target() {
            all.insert((*index).min(all.len()), annotation.clone());
        }
        all
    }

    pub fn contains(&self, id: AnnotationId) -> bool {
        self.annotations().iter().any(|a| a.id == id)
    }

    pub fn set_annotations_visible(&mut self, visible: bool, broker: &mut EventBroker) {
        if !visible {
            self.dismiss_popup(broker);
        }
        self.viewer.set_visible(visible);
    }

    pub fn annotations_visible(&self) -> bool {
        self.viewer.is_visible()
    }

    /// Highlights `id` and shows its popup, or clears the highlight.
    pub fn highlight(&mut self, id: Option<AnnotationId>, broker: &mut EventBroker) {
        if self.mode != Mode::Viewing {
            return;
        }
        self.set_highlight(id, broker);
        match self.viewer.highlighted().cloned() {
            Some(annotation) => self.popup.show(annotation),
            None => {
                self.popup.hide();
            }
        }
    }

    pub fn reset(&mut self) {
        for selector in self.selectors.iter_mut() {
            selector.stop_selection();
        }
        self.viewer.clear();
        self.popup.hide();
        self.editor.close();
        self.hint.hide();
        self.mode = Mode::Viewing;
        self.last_pointer = None;
    }

    pub fn pointer_entered(&mut self, now: f64, broker: &mut EventBroker) {
        if self.pointer_inside {
            return;
        }
        self.pointer_inside = true;
        broker.fire(&Event::MouseOverAnnotatableItem {
            src: self.src.clone(),
        });
        if self.selection_enabled && self.mode == Mode::Viewing {
            self.hint.show(now, self.settings.hint_duration);
        }
    }

    pub fn pointer_left(&mut self, now: f64, broker: &mut EventBroker) {
        if !self.pointer_inside {
            return;
        }
        self.pointer_inside = false;
        self.hint.hide();
        broker.fire(&Event::MouseOutOfAnnotatableItem {
            src: self.src.clone(),
        });
        if self.mode == Mode::Viewing {
            self.hover(None, now, broker);
        }
    }

    pub fn pointer_pressed(&mut self, p: Point, now: f64, broker: &mut EventBroker) {
        match self.mode {
            Mode::Viewing => {
                if !self.selection_enabled {
                    return;
                }
                self.hint.hide();
                self.dismiss_popup(broker);
                self.mode = Mode::Selecting;
                let event = self.selector().start_selection(p);
                self.dispatch(event, now, broker);
            }
            Mode::Selecting => {
                if let Some(event) = self.selector().pointer_pressed(p) {
                    self.dispatch(event, now, broker);
                }
            }
            Mode::Editing => {}
        }
    }

    pub fn pointer_moved(&mut self, p: Point, now: f64, broker: &mut EventBroker) {
        self.last_pointer = Some(p);
        match self.mode {
            Mode::Viewing => {
                let target = self.viewer.topmost_at(p).map(|a| a.id);
                self.hover(target, now, broker);
            }
            Mode::Selecting => {
                if let Some(event) = self.selector().pointer_moved(p) {
                    self.dispatch(event, now, broker);
                }
            }
            Mode::Editing => {}
        }
    }

    pub fn pointer_released(&mut self, p: Point, now: f64, broker: &mut EventBroker) {
        if self.mode != Mode::Selecting {
            return;
        }
        if let Some(event) = self.selector().pointer_released(p) {
            self.dispatch(event, now, broker);
        }
    }

    pub fn key_pressed(&mut self, key: Key, now: f64, broker: &mut EventBroker) {
        match self.mode {
            Mode::Selecting => {
                if let Some(event) = self.selector().key_pressed(key) {
                    self.dispatch(event, now, broker);
                }
            }
            Mode::Editing if key == Key::Escape => self.cancel_editor(broker),
            _ => {}
        }
    }

    /// Fires due timers.
    pub fn tick(&mut self, now: f64, broker: &mut EventBroker) {
        if self.popup.is_due(now) {
            self.dismiss_popup(broker);
        }
    }

    /// Earliest pending timer, for scheduling a repaint.
    pub fn next_deadline(&self, now: f64) -> Option<f64> {
        match (self.popup.deadline(), self.hint.deadline(now)) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    pub fn popup_hover_changed(&mut self, hovered: bool, now: f64) {
        if self.popup.is_visible() && hovered != self.popup.is_hovered() {
            self.popup
                .set_hovered(hovered, now, self.settings.popup_hide_delay);
        }
    }

    fn hover(&mut self, target: Option<AnnotationId>, now: f64, broker: &mut EventBroker) {
        if self.popup.is_hovered() {
            return;
        }
        match target {
            Some(id) if self.viewer.highlighted().map(|a| a.id) == Some(id) => {
                self.popup.clear_hide_timer();
            }
            Some(id) => {
                self.set_highlight(Some(id), broker);
                if let Some(annotation) = self.viewer.highlighted().cloned() {
                    self.popup.show(annotation);
                }
            }
            None => {
                if self.viewer.highlighted().is_some() {
                    self.popup
                        .start_hide_timer(now, self.settings.popup_hide_delay);
                }
            }
        }
    }

    fn set_highlight(&mut self, id: Option<AnnotationId>, broker: &mut EventBroker) {
        let change = self.viewer.set_highlighted(id);
        if let Some(annotation) = change.out {
            broker.fire(&Event::MouseOutOfAnnotation { annotation });
        }
        if let Some(annotation) = change.over {
            broker.fire(&Event::MouseOverAnnotation { annotation });
        }
    }

    /// Hides the popup and drops the highlight that belonged to it.
    fn dismiss_popup(&mut self, broker: &mut EventBroker) {
        if let Some(annotation) = self.popup.annotation().cloned() {
            broker.fire(&Event::BeforePopupHide { annotation });
            self.popup.hide();
        }
        self.set_highlight(None, broker);
    }

    fn dispatch(&mut self, event: SelectionEvent, now: f64, broker: &mut EventBroker) {
        let src = self.src.clone();
        match event {
            SelectionEvent::Started(point) => {
                broker.fire(&Event::SelectionStarted { src, point });
            }
            SelectionEvent::Changed(shape) => {
                let shape = shape.to_units(self.settings.units, self.image_size);
                broker.fire(&Event::SelectionChanged { src, shape });
            }
            SelectionEvent::Completed(shape) => {
                let shape = shape.to_units(self.settings.units, self.image_size);
                tracing::debug!(src = %self.src, kind = ?shape.shape_type(), "selection completed");
                broker.fire(&Event::SelectionCompleted {
                    src: src.clone(),
                    shape: shape.clone(),
                });
                self.editor.open_for_create(shape);
                self.mode = Mode::Editing;
                broker.fire(&Event::EditorShown {
                    src,
                    annotation: None,
                });
            }
            SelectionEvent::Canceled => {
                self.selector().stop_selection();
                self.mode = Mode::Viewing;
                broker.fire(&Event::SelectionCanceled { src });
                // A click without drag falls through to the viewer.
                if let Some(p) = self.last_pointer {
                    let target = self.viewer.topmost_at(p).map(|a| a.id);
                    self.hover(target, now, broker);
                }
            }
        }
    }

    pub fn save_editor(&mut self, broker: &mut EventBroker) -> Option<Annotation> {
        let (target, text) = self.editor.close()?;
        self.mode = Mode::Viewing;
        match target {
            EditorTarget::Create(shape) => {
                self.selector().stop_selection();
                let annotation = Annotation::new(self.src.clone(), text, shape);
                self.viewer.add(annotation.clone());
                tracing::info!(src = %self.src, "annotation created");
                broker.fire(&Event::AnnotationCreated {
                    annotation: annotation.clone(),
                });
                Some(annotation)
            }
            EditorTarget::Edit {
                mut annotation,
                index,
            } => {
                annotation.text = text;
                self.viewer.insert(index, annotation.clone());
                tracing::info!(src = %self.src, "annotation updated");
                broker.fire(&Event::AnnotationUpdated {
                    annotation: annotation.clone(),
                });
                Some(annotation)
            }
        }
    }

    pub fn cancel_editor(&mut self, broker: &mut EventBroker) {
        let Some((target, _)) = self.editor.close() else {
            return;
        };
        self.mode = Mode::Viewing;
        match target {
            EditorTarget::Create(_) => {
                self.selector().stop_selection();
                broker.fire(&Event::SelectionCanceled {
                    src: self.src.clone(),
                });
            }
            EditorTarget::Edit { annotation, index } => {
                self.viewer.insert(index, annotation);
            }
        }
    }

    /// Opens the editor on the popup's annotation.
    pub fn edit_popup_annotation(&mut self, broker: &mut EventBroker) -> bool {
        let Some(annotation) = self
            .popup
            .annotation()
            .filter(|a| a.editable && a.pixel_shape(self.image_size).is_some())
            .cloned()
        else {
            return false;
        };
        self.dismiss_popup(broker);
        let Some(index) = self.viewer.position(annotation.id) else {
            return false;
        };
        let Some(current) = self.viewer.remove(annotation.id) else {
            return false;
        };
        self.editor.open_for_edit(current.clone(), index);
        self.mode = Mode::Editing;
        broker.fire(&Event::EditorShown {
            src: self.src.clone(),
            annotation: Some(current),
        });
        true
    }

    /// Deletes the popup's annotation unless a handler vetoes it.
    pub fn delete_popup_annotation(&mut self, broker: &mut EventBroker) -> bool {
        let Some(annotation) = self.popup.annotation().filter(|a| a.editable).cloned() else {
            return false;
        };
        if !broker.fire(&Event::BeforeAnnotationRemoved {
            annotation: annotation.clone(),
        }) {
            tracing::debug!(src = %self.src, "annotation removal vetoed");
            return false;
        }
        self.dismiss_popup(broker);
        let Some(removed) = self.viewer.remove(annotation.id) else {
            return false;
        };
        tracing::info!(src = %self.src, "annotation removed");
        broker.fire(&Event::AnnotationRemoved {
            annotation: removed,
        });
        true
    }

    fn copy_popup_text(&self) {
        let Some(annotation) = self.popup.annotation() else {
            return;
        };
        match arboard::Clipboard::new() {
            Ok(mut clipboard) => {
                if let Err(e) = clipboard.set_text(annotation.text.clone()) {
                    tracing::warn!("failed to copy annotation text: {e}");
                }
            }
            Err(e) => tracing::warn!("clipboard unavailable: {e}"),
        }
    }

    /// Fitted display size for a given available width.
    pub fn display_size(&self, available_width: f32) -> Vec2 {
        let scale = (available_width / self.image_size.x).min(1.0);
        self.image_size * scale
    }

    pub fn show(
        &mut self,
        ui: &mut egui::Ui,
        texture: SizedTexture,
        broker: &mut EventBroker,
    ) -> egui::Response {
        let display_size = self.display_size(ui.available_width());
        let (rect, response) = ui.allocate_exact_size(display_size, egui::Sense::click_and_drag());

        let mut mesh = egui::Mesh::with_texture(texture.id);
        mesh.add_rect_with_uv(
            rect,
            Rect::from_min_max(Pos2::ZERO, Pos2::new(1.0, 1.0)),
            Color32::WHITE,
        );
        ui.painter().add(egui::Shape::mesh(mesh));

        let ctx = ui.ctx().clone();
        let frame = ImageFrame::new(rect, self.image_size);
        let now = ctx.input(|i| i.time);

        self.handle_input(&ctx, &response, &frame, now, broker);
        self.tick(now, broker);

        let painter = ui.painter_at(rect);
        let style = self.settings.style.clone();
        self.viewer.draw(&painter, &frame, &style);
        let editing = match self.editor.target() {
            Some(EditorTarget::Create(shape)) => Some(shape.to_pixels(self.image_size)),
            Some(EditorTarget::Edit { annotation, .. }) => annotation.pixel_shape(self.image_size),
            None => None,
        };
        match editing {
            Some(shape) => {
                let points: Vec<Pos2> = match &shape.geometry {
                    Geometry::Rect(r) => {
                        let r = frame.rect_to_screen(*r);
                        vec![r.left_top(), r.right_top(), r.right_bottom(), r.left_bottom()]
                    }
                    Geometry::Polygon(poly) => {
                        poly.points.iter().map(|p| frame.to_screen(*p)).collect()
                    }
                };
                paint_outline(&painter, &points, true, &style, true);
            }
            None => self.selectors[self.active].draw(&painter, &frame, &style),
        }
        self.hint.draw(&painter, &frame, now);

        if self.mode == Mode::Viewing && self.popup.is_visible() {
            let popup = self.popup.ui(&ctx, &frame);
            self.popup_hover_changed(popup.hovered, now);
            match popup.action {
                Some(PopupAction::Edit) => {
                    self.edit_popup_annotation(broker);
                }
                Some(PopupAction::Delete) => {
                    self.delete_popup_annotation(broker);
                }
                Some(PopupAction::CopyText) => self.copy_popup_text(),
                None => {}
            }
        }

        if self.mode == Mode::Editing {
            match self.editor.ui(&ctx, &frame, &self.src) {
                Some(EditorAction::Save) => {
                    self.save_editor(broker);
                }
                Some(EditorAction::Cancel) => self.cancel_editor(broker),
                None => {}
            }
        }

        if let Some(deadline) = self.next_deadline(now) {
            ctx.request_repaint_after(Duration::from_secs_f64((deadline - now).max(0.0)));
        }
        response
    }

    fn handle_input(
        &mut self,
        ctx: &egui::Context,
        response: &egui::Response,
        frame: &ImageFrame,
        now: f64,
        broker: &mut EventBroker,
    ) {
        let (pressed, released, hover, keys) = ctx.input(|i| {
            let keys: Vec<Key> = i
                .events
                .iter()
                .filter_map(|e| match e {
                    egui::Event::Key {
                        key, pressed: true, ..
                    } => Some(*key),
                    _ => None,
                })
                .collect();
            (
                i.pointer.primary_pressed(),
                i.pointer.primary_released(),
                i.pointer.hover_pos(),
                keys,
            )
        });

        let inside = hover.is_some_and(|p| frame.screen_rect.contains(p));
        if inside && !self.pointer_inside {
            self.pointer_entered(now, broker);
        } else if !inside && self.pointer_inside {
            self.pointer_left(now, broker);
        }

        if let Some(pos) = hover {
            let p = frame.clamp(frame.to_image(pos));
            let targeted = response.hovered() || self.mode == Mode::Selecting;
            if pressed && response.hovered() {
                self.pointer_pressed(p, now, broker);
            }
            if targeted && self.last_pointer != Some(p) {
                self.pointer_moved(p, now, broker);
            }
            if released && self.mode == Mode::Selecting {
                self.pointer_released(p, now, broker);
            }
        }

        if self.mode == Mode::Selecting && !ctx.wants_keyboard_input() {
            for key in keys {
                self.key_pressed(key, now, broker);
            }
        }
    }
}

impl std::fmt::Debug for ImageAnnotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ImageAnnotator")
            .field("src", &self.src)
            .field("image_size", &self.image_size)
            .field("mode", &self.mode)
            .field("active_selector", &self.active_selector())
            .field("annotations", &self.viewer.annotations().len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use super::*;
    use crate::annotation::{Shape, Units};
    use crate::events::EventType;
    use crate::geometry::RectGeometry;

    const ALL_EVENTS: [EventType; 14] = [
        EventType::MouseOverAnnotatableItem,
        EventType::MouseOutOfAnnotatableItem,
        EventType::MouseOverAnnotation,
        EventType::MouseOutOfAnnotation,
        EventType::SelectionStarted,
        EventType::SelectionChanged,
        EventType::SelectionCompleted,
        EventType::SelectionCanceled,
        EventType::EditorShown,
        EventType::BeforePopupHide,
        EventType::BeforeAnnotationRemoved,
        EventType::AnnotationRemoved,
        EventType::AnnotationCreated,
        EventType::AnnotationUpdated,
    ];

    /// Broker that records the type of every fired event.
    fn recording_broker() -> (EventBroker, Rc<RefCell<Vec<EventType>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut broker = EventBroker::new();
        for t in ALL_EVENTS {
            let log = Rc::clone(&log);
            broker.add_handler(t, move |e| {
                log.borrow_mut().push(e.event_type());
                true
            });
        }
        (broker, log)
    }

    fn annotator() -> ImageAnnotator {
        ImageAnnotator::new("img.png", Vec2::new(200.0, 100.0), &Settings::default()).unwrap()
    }

    fn draw_rect(a: &mut ImageAnnotator, broker: &mut EventBroker) {
        a.pointer_pressed(Point::new(10.0, 10.0), 0.0, broker);
        a.pointer_moved(Point::new(50.0, 40.0), 0.0, broker);
        a.pointer_released(Point::new(50.0, 40.0), 0.0, broker);
    }

    fn with_annotation(a: &mut ImageAnnotator, rect: RectGeometry) -> Annotation {
        let ann = Annotation::new("img.png", "note", Shape::rect(rect, Units::Pixel));
        a.add_annotation(ann.clone()).unwrap();
        ann
    }

    #[test]
    fn empty_image_is_rejected() {
        let err = ImageAnnotator::new("x.png", Vec2::ZERO, &Settings::default()).unwrap_err();
        assert!(matches!(err, Error::EmptyImage { .. }));
    }

    #[test]
    fn unknown_default_selector_falls_back_to_rect() {
        let settings = Settings {
            default_selector: "lasso".into(),
            ..Settings::default()
        };
        let a = ImageAnnotator::new("x.png", Vec2::new(10.0, 10.0), &settings).unwrap();
        assert_eq!(a.active_selector(), "rect");
    }

    #[test]
    fn drag_opens_editor_and_save_creates_annotation() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();

        draw_rect(&mut a, &mut broker);
        assert_eq!(a.mode(), Mode::Editing);
        assert_eq!(
            a.editor().bounds(a.image_size()),
            Some(RectGeometry::new(10.0, 10.0, 40.0, 30.0))
        );

        a.editor_mut().set_text("a cat");
        let created = a.save_editor(&mut broker).unwrap();
        assert_eq!(created.text, "a cat");
        assert_eq!(created.src, "img.png");
        assert_eq!(a.mode(), Mode::Viewing);
        assert_eq!(a.annotations().len(), 1);

        assert_eq!(
            *log.borrow(),
            vec![
                EventType::SelectionStarted,
                EventType::SelectionChanged,
                EventType::SelectionCompleted,
                EventType::EditorShown,
                EventType::AnnotationCreated,
            ]
        );
    }

    #[test]
    fn completed_shape_uses_configured_units() {
        let settings = Settings {
            units: Units::Fraction,
            ..Settings::default()
        };
        let mut broker = EventBroker::new();
        let mut a = ImageAnnotator::new("img.png", Vec2::new(200.0, 100.0), &settings).unwrap();

        draw_rect(&mut a, &mut broker);
        let created = a.save_editor(&mut broker).unwrap();
        let shape = created.shape().unwrap();
        assert_eq!(shape.units, Units::Fraction);
        assert_eq!(
            shape.geometry,
            Geometry::Rect(RectGeometry::new(0.05, 0.1, 0.2, 0.3))
        );
    }

    #[test]
    fn click_without_drag_cancels_selection() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();

        a.pointer_pressed(Point::new(10.0, 10.0), 0.0, &mut broker);
        a.pointer_released(Point::new(10.0, 10.0), 0.0, &mut broker);

        assert_eq!(a.mode(), Mode::Viewing);
        assert!(!a.editor().is_open());
        assert_eq!(
            *log.borrow(),
            vec![EventType::SelectionStarted, EventType::SelectionCanceled]
        );
    }

    #[test]
    fn editor_cancel_discards_selection() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();

        draw_rect(&mut a, &mut broker);
        a.key_pressed(Key::Escape, 0.0, &mut broker);

        assert_eq!(a.mode(), Mode::Viewing);
        assert!(a.annotations().is_empty());
        assert_eq!(log.borrow().last(), Some(&EventType::SelectionCanceled));
    }

    #[test]
    fn selection_disabled_ignores_presses() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        a.set_selection_enabled(false);
        a.pointer_pressed(Point::new(10.0, 10.0), 0.0, &mut broker);
        assert_eq!(a.mode(), Mode::Viewing);
    }

    #[test]
    fn polygon_selector_round_trip() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        a.activate_selector("polygon").unwrap();

        a.pointer_pressed(Point::new(0.0, 0.0), 0.0, &mut broker);
        a.pointer_released(Point::new(0.0, 0.0), 0.0, &mut broker);
        for p in [Point::new(100.0, 0.0), Point::new(100.0, 80.0)] {
            a.pointer_pressed(p, 0.0, &mut broker);
            a.pointer_moved(p, 0.0, &mut broker);
            a.pointer_released(p, 0.0, &mut broker);
        }
        assert_eq!(a.mode(), Mode::Selecting);
        a.key_pressed(Key::Enter, 0.0, &mut broker);
        assert_eq!(a.mode(), Mode::Editing);

        let created = a.save_editor(&mut broker).unwrap();
        assert_eq!(created.shape().unwrap().area(), 4000.0);
    }

    #[test]
    fn unknown_selector_is_an_error() {
        let mut a = annotator();
        assert!(matches!(
            a.activate_selector("lasso"),
            Err(Error::UnknownSelector(_))
        ));
        assert_eq!(a.active_selector(), "rect");
        assert_eq!(a.selector_names(), vec!["rect", "polygon"]);
    }

    #[test]
    fn hover_highlights_and_popup_hides_after_delay() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();
        let ann = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));

        a.pointer_moved(Point::new(10.0, 10.0), 1.0, &mut broker);
        assert_eq!(a.highlighted().map(|x| x.id), Some(ann.id));
        assert!(a.popup().is_visible());

        // Leaving starts the timer; highlight lingers with the popup.
        a.pointer_moved(Point::new(150.0, 80.0), 2.0, &mut broker);
        assert!(a.highlighted().is_some());
        a.tick(2.2, &mut broker);
        assert!(a.popup().is_visible());

        a.tick(2.5, &mut broker);
        assert!(!a.popup().is_visible());
        assert!(a.highlighted().is_none());

        assert_eq!(
            *log.borrow(),
            vec![
                EventType::MouseOverAnnotation,
                EventType::BeforePopupHide,
                EventType::MouseOutOfAnnotation,
            ]
        );
    }

    #[test]
    fn returning_to_annotation_cancels_hide_timer() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));

        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        a.pointer_moved(Point::new(150.0, 80.0), 1.0, &mut broker);
        a.pointer_moved(Point::new(20.0, 20.0), 1.1, &mut broker);
        a.tick(5.0, &mut broker);
        assert!(a.popup().is_visible());
    }

    #[test]
    fn hovering_popup_keeps_it_open() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        let ann = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));

        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        a.pointer_moved(Point::new(10.0, 60.0), 0.5, &mut broker);
        a.popup_hover_changed(true, 0.6);
        a.tick(10.0, &mut broker);
        assert_eq!(a.popup().annotation().map(|x| x.id), Some(ann.id));

        a.popup_hover_changed(false, 10.0);
        a.tick(10.5, &mut broker);
        assert!(!a.popup().is_visible());
    }

    #[test]
    fn moving_between_annotations_swaps_highlight() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();
        let first = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));
        let second = with_annotation(&mut a, RectGeometry::new(100.0, 0.0, 50.0, 50.0));

        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        a.pointer_moved(Point::new(110.0, 10.0), 0.1, &mut broker);

        assert_eq!(a.highlighted().map(|x| x.id), Some(second.id));
        assert_eq!(a.popup().annotation().map(|x| x.id), Some(second.id));
        assert_ne!(first.id, second.id);
        assert_eq!(
            *log.borrow(),
            vec![
                EventType::MouseOverAnnotation,
                EventType::MouseOutOfAnnotation,
                EventType::MouseOverAnnotation,
            ]
        );
    }

    #[test]
    fn delete_respects_veto() {
        let mut broker = EventBroker::new();
        let veto = Rc::new(RefCell::new(true));
        let v = Rc::clone(&veto);
        broker.add_handler(EventType::BeforeAnnotationRemoved, move |_| !*v.borrow());

        let mut a = annotator();
        let ann = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));
        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);

        assert!(!a.delete_popup_annotation(&mut broker));
        assert!(a.contains(ann.id));
        assert!(a.popup().is_visible());

        *veto.borrow_mut() = false;
        assert!(a.delete_popup_annotation(&mut broker));
        assert!(!a.contains(ann.id));
        assert!(!a.popup().is_visible());
    }

    #[test]
    fn read_only_annotations_cannot_be_deleted_or_edited() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        let ann = Annotation::new(
            "img.png",
            "fixed",
            Shape::rect(RectGeometry::new(0.0, 0.0, 50.0, 50.0), Units::Pixel),
        )
        .read_only();
        a.add_annotation(ann.clone()).unwrap();
        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);

        assert!(!a.delete_popup_annotation(&mut broker));
        assert!(!a.edit_popup_annotation(&mut broker));
        assert!(a.contains(ann.id));
    }

    #[test]
    fn edit_then_save_updates_in_place() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();
        let first = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));
        let second = with_annotation(&mut a, RectGeometry::new(100.0, 0.0, 50.0, 50.0));

        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        assert!(a.edit_popup_annotation(&mut broker));
        assert_eq!(a.mode(), Mode::Editing);
        assert_eq!(a.editor().text(), "note");
        // Still reported while out of the viewer.
        assert_eq!(a.annotations().len(), 2);

        a.editor_mut().set_text("edited");
        let updated = a.save_editor(&mut broker).unwrap();
        assert_eq!(updated.id, first.id);

        let all = a.annotations();
        assert_eq!(all[0].text, "edited");
        assert_eq!(all[1].id, second.id);
        assert_eq!(log.borrow().last(), Some(&EventType::AnnotationUpdated));
    }

    #[test]
    fn edit_then_cancel_restores_annotation() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        let ann = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));

        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        a.edit_popup_annotation(&mut broker);
        a.editor_mut().set_text("nope");
        a.cancel_editor(&mut broker);

        assert_eq!(a.annotations(), vec![ann]);
    }

    #[test]
    fn entering_item_shows_hint() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();

        a.pointer_entered(0.0, &mut broker);
        a.pointer_entered(0.1, &mut broker);
        assert!(a.hint().is_visible(1.0));
        assert_eq!(a.hint().message(), crate::hint::DEFAULT_MESSAGE);
        assert!(!a.hint().is_visible(2.5));

        a.pointer_left(1.0, &mut broker);
        assert!(!a.hint().is_visible(1.0));
        assert_eq!(
            *log.borrow(),
            vec![
                EventType::MouseOverAnnotatableItem,
                EventType::MouseOutOfAnnotatableItem,
            ]
        );
    }

    #[test]
    fn hidden_annotations_are_not_hovered() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));
        a.set_annotations_visible(false, &mut broker);

        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        assert!(a.highlighted().is_none());
        assert!(!a.popup().is_visible());
    }

    #[test]
    fn api_highlight_shows_popup() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        let ann = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));

        a.highlight(Some(ann.id), &mut broker);
        assert_eq!(a.popup().annotation().map(|x| x.id), Some(ann.id));

        a.highlight(None, &mut broker);
        assert!(a.highlighted().is_none());
        assert!(!a.popup().is_visible());
    }

    #[test]
    fn api_remove_while_editing_closes_editor() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        let ann = with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));
        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        a.edit_popup_annotation(&mut broker);

        assert_eq!(a.remove_annotation(ann.id).map(|x| x.id), Some(ann.id));
        assert_eq!(a.mode(), Mode::Viewing);
        assert!(a.annotations().is_empty());
    }

    #[test]
    fn next_deadline_picks_earliest_timer() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));

        a.pointer_entered(0.0, &mut broker);
        assert_eq!(a.next_deadline(0.0), Some(2.0));

        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        a.pointer_moved(Point::new(150.0, 80.0), 1.0, &mut broker);
        let deadline = a.next_deadline(1.0).unwrap();
        assert!((deadline - 1.3).abs() < 1e-9);
    }

    #[test]
    fn display_size_never_upscales() {
        let a = annotator();
        assert_eq!(a.display_size(1000.0), Vec2::new(200.0, 100.0));
        assert_eq!(a.display_size(100.0), Vec2::new(100.0, 50.0));
    }

    #[test]
    fn switching_selector_while_editing_drops_old_outline() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        draw_rect(&mut a, &mut broker);
        assert_eq!(a.mode(), Mode::Editing);

        a.activate_selector("polygon").unwrap();
        assert_eq!(a.mode(), Mode::Editing);
        assert!(matches!(a.editor().target(), Some(EditorTarget::Create(_))));
        assert!(a.save_editor(&mut broker).is_some());

        a.activate_selector("rect").unwrap();
        assert_eq!(a.mode(), Mode::Viewing);
        assert!(a.selectors.iter().all(|s| s.shape().is_none()));
    }

    #[test]
    fn shapeless_annotations_are_rejected() {
        let mut a = annotator();
        let ann: Annotation = serde_json::from_str(r#"{"src":"img.png","shapes":[]}"#).unwrap();
        assert!(matches!(a.add_annotation(ann), Err(Error::NoShape(_))));
        assert!(a.annotations().is_empty());
    }

    #[test]
    fn edit_refuses_annotation_without_shape() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        let ann: Annotation = serde_json::from_str(r#"{"src":"img.png","shapes":[]}"#).unwrap();
        a.viewer.add(ann.clone());
        a.highlight(Some(ann.id), &mut broker);
        assert!(a.popup().is_visible());

        assert!(!a.edit_popup_annotation(&mut broker));
        assert_eq!(a.mode(), Mode::Viewing);
        assert!(!a.editor().is_open());
    }

    #[test]
    fn reset_clears_popup_selection_and_editor() {
        let mut broker = EventBroker::new();
        let mut a = annotator();
        with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));
        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        assert!(a.popup().is_visible());

        a.reset();
        assert!(!a.popup().is_visible());
        assert!(a.highlighted().is_none());
        assert!(a.annotations().is_empty());

        a.pointer_pressed(Point::new(60.0, 60.0), 0.0, &mut broker);
        a.pointer_moved(Point::new(90.0, 90.0), 0.0, &mut broker);
        assert_eq!(a.mode(), Mode::Selecting);
        a.reset();
        assert_eq!(a.mode(), Mode::Viewing);
        assert!(a.selectors.iter().all(|s| s.shape().is_none()));

        draw_rect(&mut a, &mut broker);
        assert!(a.editor().is_open());
        a.reset();
        assert!(!a.editor().is_open());
        assert_eq!(a.mode(), Mode::Viewing);
        assert!(a.annotations().is_empty());
    }

    #[test]
    fn hiding_annotations_drops_highlight_with_events() {
        let (mut broker, log) = recording_broker();
        let mut a = annotator();
        with_annotation(&mut a, RectGeometry::new(0.0, 0.0, 50.0, 50.0));
        a.pointer_moved(Point::new(10.0, 10.0), 0.0, &mut broker);
        log.borrow_mut().clear();

        a.set_annotations_visible(false, &mut broker);
        assert_eq!(
            *log.borrow(),
            vec![EventType::BeforePopupHide, EventType::MouseOutOfAnnotation]
        );
        assert!(a.highlighted().is_none());
        assert!(!a.popup().is_visible());
        assert!(!a.annotations_visible());
    }
}
