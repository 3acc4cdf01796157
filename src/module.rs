//! The annotatable page: every image, and an annotator per image once it
//! has scrolled into view and loaded.
//!
//! Calls that target an image without an annotator yet are remembered and
//! replayed when the annotator is created.

use std::collections::HashMap;
use std::collections::hash_map::Entry;
use std::path::{Path, PathBuf};

use eframe::egui::{
    self, Color32, Vec2,
    load::{SizeHint, SizedTexture, TexturePoll},
};

use crate::annotation::{Annotation, AnnotationId};
use crate::annotator::ImageAnnotator;
use crate::config::Settings;
use crate::error::{Error, Result};
use crate::events::{Event, EventBroker, EventType, HandlerId};
use crate::selector::builtin_selectors;

pub const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "bmp", "webp"];

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
}

/// Expands a directory into its image files (sorted, not recursive). A
/// file path is returned as is.
pub fn discover_images(path: &Path) -> Result<Vec<PathBuf>> {
    if !path.is_dir() {
        return Ok(vec![path.to_path_buf()]);
    }
    let io_err = |source| Error::Io {
        path: path.to_path_buf(),
        source,
    };
    let mut images = Vec::new();
    for entry in std::fs::read_dir(path).map_err(io_err)? {
        let entry_path = entry.map_err(io_err)?.path();
        if entry_path.is_file() && is_image(&entry_path) {
            images.push(entry_path);
        }
    }
    images.sort();
    tracing::debug!(dir = %path.display(), count = images.len(), "scanned for images");
    Ok(images)
}

/// Reads a JSON array of annotations.
pub fn read_annotations(path: &Path) -> Result<Vec<Annotation>> {
    let text = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(serde_json::from_str(&text)?)
}

pub struct ImageItem {
    src: String,
    uri: String,
    texture: Option<SizedTexture>,
    error: Option<String>,
}

impl ImageItem {
    pub fn new(src: impl Into<String>, uri: impl Into<String>) -> Self {
        Self {
            src: src.into(),
            uri: uri.into(),
            texture: None,
            error: None,
        }
    }

    pub fn from_path(path: &Path) -> Self {
        Self::new(
            path.display().to_string(),
            format!("file://{}", path.display()),
        )
    }

    pub fn src(&self) -> &str {
        &self.src
    }

    /// Load failure reported by the image loader, if any.
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }
}

#[derive(Debug, Clone, Default)]
struct ItemSettings {
    annotations_visible: Option<bool>,
    selection_enabled: Option<bool>,
    selector: Option<String>,
}

pub struct ImageModule {
    settings: Settings,
    items: Vec<ImageItem>,
    annotators: HashMap<String, ImageAnnotator>,
    buffered: Vec<Annotation>,
    item_settings: HashMap<String, ItemSettings>,
    annotations_visible: bool,
    selection_enabled: bool,
    selector: String,
    broker: EventBroker,
}

impl ImageModule {
    pub fn new(settings: Settings) -> Self {
        let selector = settings.default_selector.clone();
        Self {
            settings,
            items: Vec::new(),
            annotators: HashMap::new(),
            buffered: Vec::new(),
            item_settings: HashMap::new(),
            annotations_visible: true,
            selection_enabled: true,
            selector,
            broker: EventBroker::new(),
        }
    }

    pub fn from_paths(paths: &[PathBuf], settings: Settings) -> Self {
        let mut module = Self::new(settings);
        for path in paths {
            module.add_item(ImageItem::from_path(path));
        }
        module
    }

    /// Returns false for an image that is already on the page.
    pub fn add_item(&mut self, item: ImageItem) -> bool {
        if self.has_item(&item.src) {
            return false;
        }
        tracing::debug!(src = %item.src, "image added");
        self.items.push(item);
        true
    }

    pub fn items(&self) -> &[ImageItem] {
        &self.items
    }

    fn has_item(&self, src: &str) -> bool {
        self.items.iter().any(|i| i.src == src)
    }

    fn check_item(&self, src: &str) -> Result<()> {
        if self.has_item(src) {
            Ok(())
        } else {
            Err(Error::UnknownImage(src.to_string()))
        }
    }

    pub fn annotator(&self, src: &str) -> Option<&ImageAnnotator> {
        self.annotators.get(src)
    }

    /// Creates the annotator for `src` on first call, replaying buffered state.
    pub fn ensure_annotator(&mut self, src: &str, image_size: Vec2) -> Result<&mut ImageAnnotator> {
        self.check_item(src)?;
        match self.annotators.entry(src.to_string()) {
            Entry::Occupied(entry) => Ok(entry.into_mut()),
            Entry::Vacant(entry) => {
                let mut annotator = ImageAnnotator::new(src, image_size, &self.settings)?;
                annotator.set_annotations_visible(self.annotations_visible, &mut self.broker);
                annotator.set_selection_enabled(self.selection_enabled);
                let mut selector = self.selector.clone();

                if let Some(item) = self.item_settings.get(src) {
                    if let Some(visible) = item.annotations_visible {
                        annotator.set_annotations_visible(visible, &mut self.broker);
                    }
                    if let Some(enabled) = item.selection_enabled {
                        annotator.set_selection_enabled(enabled);
                    }
                    if let Some(name) = &item.selector {
                        selector = name.clone();
                    }
                }
                if let Err(e) = annotator.activate_selector(&selector) {
                    tracing::warn!(%src, "{e}");
                }

                let (mine, rest): (Vec<_>, Vec<_>) = std::mem::take(&mut self.buffered)
                    .into_iter()
                    .partition(|a| a.src == src);
                self.buffered = rest;
                let replayed = mine.len();
                for annotation in mine {
                    if let Err(e) = annotator.add_annotation(annotation) {
                        tracing::warn!(%src, "{e}");
                    }
                }

                tracing::info!(%src, replayed, "image is now annotatable");
                Ok(entry.insert(annotator))
            }
        }
    }

    pub fn add_annotation(&mut self, annotation: Annotation) -> Result<()> {
        self.check_item(&annotation.src)?;
        annotation.validate()?;
        match self.annotators.get_mut(&annotation.src) {
            Some(annotator) => annotator.add_annotation(annotation)?,
            None => self.buffered.push(annotation),
        }
        Ok(())
    }

    pub fn remove_annotation(&mut self, id: AnnotationId) -> Option<Annotation> {
        for annotator in self.annotators.values_mut() {
            if let Some(removed) = annotator.remove_annotation(id) {
                return Some(removed);
            }
        }
        let index = self.buffered.iter().position(|a| a.id == id)?;
        Some(self.buffered.remove(index))
    }

    /// Annotations of one image, or of the whole page in page order.
    pub fn annotations(&self, src: Option<&str>) -> Vec<Annotation> {
        self.items
            .iter()
            .filter(|item| src.is_none_or(|s| s == item.src))
            .flat_map(|item| match self.annotators.get(&item.src) {
                Some(annotator) => annotator.annotations(),
                None => self
                    .buffered
                    .iter()
                    .filter(|a| a.src == item.src)
                    .cloned()
                    .collect(),
            })
            .collect()
    }

    /// Highlights one annotation page-wide; `None` clears every highlight.
    pub fn highlight(&mut self, id: Option<AnnotationId>) -> bool {
        let mut found = false;
        for annotator in self.annotators.values_mut() {
            match id {
                Some(id) if annotator.contains(id) => {
                    annotator.highlight(Some(id), &mut self.broker);
                    found = true;
                }
                _ => annotator.highlight(None, &mut self.broker),
            }
        }
        found
    }

    pub fn activate_selector(&mut self, src: Option<&str>, name: &str) -> Result<()> {
        if !builtin_selectors(&self.settings)
            .iter()
            .any(|s| s.name() == name)
        {
            return Err(Error::UnknownSelector(name.to_string()));
        }
        match src {
            None => {
                self.selector = name.to_string();
                for item in self.item_settings.values_mut() {
                    item.selector = None;
                }
                for annotator in self.annotators.values_mut() {
                    annotator.activate_selector(name)?;
                }
            }
            Some(src) => {
                self.check_item(src)?;
                self.item_settings.entry(src.to_string()).or_default().selector =
                    Some(name.to_string());
                if let Some(annotator) = self.annotators.get_mut(src) {
                    annotator.activate_selector(name)?;
                }
            }
        }
        Ok(())
    }

    pub fn selector(&self) -> &str {
        &self.selector
    }

    pub fn set_annotations_visible(&mut self, src: Option<&str>, visible: bool) -> Result<()> {
        match src {
            None => {
                self.annotations_visible = visible;
                for item in self.item_settings.values_mut() {
                    item.annotations_visible = None;
                }
                for annotator in self.annotators.values_mut() {
                    annotator.set_annotations_visible(visible, &mut self.broker);
                }
            }
            Some(src) => {
                self.check_item(src)?;
                self.item_settings
                    .entry(src.to_string())
                    .or_default()
                    .annotations_visible = Some(visible);
                if let Some(annotator) = self.annotators.get_mut(src) {
                    annotator.set_annotations_visible(visible, &mut self.broker);
                }
            }
        }
        Ok(())
    }

    pub fn annotations_visible(&self) -> bool {
        self.annotations_visible
    }

    pub fn set_selection_enabled(&mut self, src: Option<&str>, enabled: bool) -> Result<()> {
        match src {
            None => {
                self.selection_enabled = enabled;
                for item in self.item_settings.values_mut() {
                    item.selection_enabled = None;
                }
                for annotator in self.annotators.values_mut() {
                    annotator.set_selection_enabled(enabled);
                }
            }
            Some(src) => {
                self.check_item(src)?;
                self.item_settings
                    .entry(src.to_string())
                    .or_default()
                    .selection_enabled = Some(enabled);
                if let Some(annotator) = self.annotators.get_mut(src) {
                    annotator.set_selection_enabled(enabled);
                }
            }
        }
        Ok(())
    }

    pub fn selection_enabled(&self) -> bool {
        self.selection_enabled
    }

    /// Drops every annotation and per-image setting. Images and their
    /// annotators stay, back on the page-wide settings.
    pub fn reset(&mut self) {
        tracing::info!(annotators = self.annotators.len(), "resetting page");
        self.buffered.clear();
        self.item_settings.clear();
        for annotator in self.annotators.values_mut() {
            annotator.reset();
            annotator.set_annotations_visible(self.annotations_visible, &mut self.broker);
            annotator.set_selection_enabled(self.selection_enabled);
            if let Err(e) = annotator.activate_selector(&self.selector) {
                tracing::warn!(src = %annotator.src(), "{e}");
            }
        }
    }

    pub fn add_handler(
        &mut self,
        event_type: EventType,
        handler: impl FnMut(&Event) -> bool + 'static,
    ) -> HandlerId {
        self.broker.add_handler(event_type, handler)
    }

    pub fn remove_handler(&mut self, id: HandlerId) -> bool {
        self.broker.remove_handler(id)
    }

    pub fn show(&mut self, ui: &mut egui::Ui) {
        egui::ScrollArea::vertical()
            .auto_shrink([false, false])
            .show(ui, |ui| {
                for index in 0..self.items.len() {
                    self.show_item(ui, index);
                    ui.add_space(12.0);
                }
            });
    }

    fn show_item(&mut self, ui: &mut egui::Ui, index: usize) {
        let src = self.items[index].src.clone();
        ui.label(egui::RichText::new(&src).strong());

        if let Some(texture) = self.items[index].texture {
            if let Err(e) = self.ensure_annotator(&src, texture.size) {
                ui.colored_label(Color32::RED, e.to_string());
                return;
            }
            if let Some(annotator) = self.annotators.get_mut(&src) {
                annotator.show(ui, texture, &mut self.broker);
            }
            return;
        }

        let [w, h] = self.settings.placeholder_size;
        let scale = (ui.available_width() / w).min(1.0);
        let (rect, _) = ui.allocate_exact_size(Vec2::new(w, h) * scale, egui::Sense::hover());
        let painter = ui.painter();
        painter.rect_filled(rect, 4.0, ui.visuals().faint_bg_color);

        if let Some(error) = self.items[index].error() {
            painter.text(
                rect.center(),
                egui::Align2::CENTER_CENTER,
                error,
                egui::FontId::proportional(14.0),
                Color32::RED,
            );
            return;
        }

        // Only images scrolled into view are loaded.
        if !ui.is_rect_visible(rect) {
            return;
        }
        painter.text(
            rect.center(),
            egui::Align2::CENTER_CENTER,
            "Loading…",
            egui::FontId::proportional(14.0),
            ui.visuals().weak_text_color(),
        );

        let uri = self.items[index].uri.clone();
        match ui
            .ctx()
            .try_load_texture(&uri, egui::TextureOptions::default(), SizeHint::default())
        {
            Ok(TexturePoll::Ready { texture }) => {
                tracing::debug!(%src, width = texture.size.x, height = texture.size.y, "image loaded");
                self.items[index].texture = Some(texture);
                ui.ctx().request_repaint();
            }
            Ok(TexturePoll::Pending { .. }) => {}
            Err(e) => {
                tracing::warn!(%src, "failed to load image: {e}");
                self.items[index].error = Some(e.to_string());
            }
        }
    }
}
