use crate::enhance::{EnhanceRequest, Enhancer, STATUS_PHRASES};
use crate::error::EnhanceError;
use crate::event::AppEvent;
use crate::gallery::store::GalleryStore;
use crate::gallery::EnhancedImage;
use crate::media::{self, InlinePayload};
use crate::session::store::SessionStore;
use crate::session::{EnhancementMode, SessionRecord};
use crate::theme::Theme;
use chrono::{Local, TimeZone};
use eframe::egui::{self, RichText, ScrollArea, TextureHandle};
use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::mpsc::{Receiver, TryRecvError};
use std::time::Duration;

pub struct GarnishApp {
    rx: Receiver<AppEvent>,
    enhancer: Enhancer,
    session_store: SessionStore,
    gallery_store: GalleryStore,
    theme: Theme,

    session: Option<SessionRecord>,
    busy: bool,
    mode: EnhancementMode,
    source: Option<InlinePayload>,
    reference: Option<InlinePayload>,
    gallery: Vec<EnhancedImage>,
    current: Option<EnhancedImage>,
    error: Option<String>,
    status: Option<&'static str>,
    compare_open: bool,
    compare: Option<(InlinePayload, InlinePayload)>,
    login_email: String,
    login_password: String,
    diagnostics: Vec<String>,
    textures: HashMap<u64, TextureHandle>,
}

impl GarnishApp {
    pub fn new(
        rx: Receiver<AppEvent>,
        enhancer: Enhancer,
        session_store: SessionStore,
        gallery_store: GalleryStore,
    ) -> Self {
        let mut app = Self {
            rx,
            enhancer,
            session_store,
            gallery_store,
            theme: Theme::default(),
            session: None,
            busy: false,
            mode: EnhancementMode::default(),
            source: None,
            reference: None,
            gallery: Vec::new(),
            current: None,
            error: None,
            status: None,
            compare_open: false,
            compare: None,
            login_email: String::new(),
            login_password: String::new(),
            diagnostics: Vec::new(),
            textures: HashMap::new(),
        };

        match app.session_store.get() {
            Ok(Some(record)) => {
                app.mode = record.mode;
                app.session = Some(record);
                app.refresh_gallery();
            }
            Ok(None) => {}
            Err(err) => app.log_diagnostic(format!("failed to restore session: {err}")),
        }

        app
    }

    pub fn apply_theme(&self, ctx: &egui::Context) {
        self.theme.apply_visuals(ctx);
    }

    fn log_diagnostic(&mut self, message: impl Into<String>) {
        self.diagnostics
            .push(format!("[{}] {}", Local::now().format("%H:%M:%S"), message.into()));
    }

    fn fail(&mut self, err: EnhanceError) {
        self.log_diagnostic(format!("{}: {err}", err.kind()));
        self.error = Some(err.to_string());
    }

    fn refresh_gallery(&mut self) {
        match self.gallery_store.list_all() {
            Ok(records) => self.gallery = sorted_newest_first(records),
            Err(err) => self.fail(err),
        }
    }

    // Placeholder auth: any non-empty email and password sign in.
    fn login(&mut self) {
        let email = self.login_email.trim().to_string();
        if email.is_empty() || self.login_password.trim().is_empty() {
            self.error = Some("enter an email and password".to_string());
            return;
        }

        let record = SessionRecord::new(email);
        if let Err(err) = self.session_store.put(&record) {
            self.log_diagnostic(format!("failed to persist session: {err}"));
        }
        self.mode = record.mode;
        self.session = Some(record);
        self.login_email.clear();
        self.login_password.clear();
        self.error = None;
        self.refresh_gallery();
    }

    fn logout(&mut self) {
        if let Err(err) = self.session_store.clear() {
            self.log_diagnostic(format!("failed to clear session: {err}"));
        }
        self.session = None;
        self.gallery.clear();
        self.source = None;
        self.reference = None;
        self.current = None;
        self.compare = None;
        self.compare_open = false;
        self.error = None;
        self.status = None;
        self.textures.clear();
    }

    // The in-memory mode switch is applied first; a failure persisting it
    // is reported but never reverts the switch.
    fn set_mode(&mut self, mode: EnhancementMode) {
        if self.mode == mode {
            return;
        }
        self.mode = mode;
        self.source = None;
        self.reference = None;
        self.current = None;
        self.compare = None;
        self.compare_open = false;
        self.error = None;

        let persisted = match self.session.as_mut() {
            Some(record) => {
                record.mode = mode;
                Some(self.session_store.put(record))
            }
            None => None,
        };
        if let Some(Err(err)) = persisted {
            self.log_diagnostic(format!("failed to persist mode change: {err}"));
            self.error = Some(err.to_string());
        }
    }

    // The busy gate rejects re-entry no matter who calls this, not just
    // while the buttons are disabled.
    fn begin_enhancement(&mut self, source: Option<InlinePayload>) -> bool {
        if self.busy {
            return false;
        }
        if self.session.is_none() {
            self.fail(EnhanceError::AuthenticationRequired);
            return false;
        }
        let Some(source) = source else {
            self.fail(EnhanceError::Validation("add a dish photo first".to_string()));
            return false;
        };
        if self.mode.needs_reference() && self.reference.is_none() {
            self.fail(EnhanceError::Validation(
                "add a reference photo for brand style".to_string(),
            ));
            return false;
        }

        self.busy = true;
        self.error = None;
        self.status = Some(STATUS_PHRASES[0]);
        self.enhancer.spawn(EnhanceRequest {
            mode: self.mode,
            source,
            reference: self.reference.clone(),
        });
        true
    }

    fn start_enhancement(&mut self) {
        let source = self.source.clone();
        self.begin_enhancement(source);
    }

    // "Try again" reuses the record's stored original source, so lineage
    // never drifts across repeated enhancements.
    fn try_again(&mut self) {
        let source = self.current.as_ref().map(|record| record.source.clone());
        self.begin_enhancement(source);
    }

    fn apply_event(&mut self, event: AppEvent) {
        match event {
            AppEvent::StatusTick(phrase) => {
                // a tick that raced the completion event is stale
                if self.busy {
                    self.status = Some(phrase);
                }
            }
            AppEvent::EnhanceFinished(result) => {
                self.busy = false;
                self.status = None;
                match result {
                    Ok(outcome) => {
                        self.gallery = sorted_newest_first(outcome.all);
                        self.current = Some(outcome.record);
                        self.error = None;
                    }
                    Err(err) => {
                        self.current = None;
                        self.fail(err);
                    }
                }
            }
        }
    }

    fn drain_events(&mut self) {
        loop {
            match self.rx.try_recv() {
                Ok(event) => self.apply_event(event),
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    self.log_diagnostic("event channel disconnected");
                    break;
                }
            }
        }
    }

    fn clear_gallery(&mut self) {
        match self.gallery_store.clear_all() {
            Ok(()) => {
                self.gallery.clear();
                self.current = None;
                self.compare = None;
                self.compare_open = false;
                self.textures.clear();
            }
            Err(err) => self.fail(err),
        }
    }

    fn pick_image(&mut self) -> Option<InlinePayload> {
        let path = rfd::FileDialog::new()
            .add_filter("Images", &media::SUPPORTED_EXTENSIONS)
            .pick_file()?;
        self.load_payload(&path)
    }

    fn load_payload(&mut self, path: &std::path::Path) -> Option<InlinePayload> {
        match media::load_image_file(path) {
            Ok(payload) => Some(payload),
            Err(err) => {
                self.fail(err);
                None
            }
        }
    }

    fn export_current(&mut self) {
        let Some(record) = self.current.clone() else {
            return;
        };
        let suggested = media::export_file_name(&record.image, Local::now());
        let Some(path) = rfd::FileDialog::new().set_file_name(&suggested).save_file() else {
            return;
        };
        let written = record.image.decode().and_then(|bytes| {
            std::fs::write(&path, bytes)
                .map_err(|err| EnhanceError::storage("failed to write export", err))
        });
        match written {
            Ok(()) => self.log_diagnostic(format!("exported {}", path.display())),
            Err(err) => self.fail(err),
        }
    }

    // A dropped file fills the source slot; once brand style already has a
    // source, the next drop fills the reference slot instead.
    fn handle_dropped_files(&mut self, ctx: &egui::Context) {
        if self.session.is_none() || self.busy {
            return;
        }
        let dropped = ctx.input(|i| i.raw.dropped_files.clone());
        if let Some(path) = dropped.into_iter().find_map(|file| file.path) {
            if let Some(payload) = self.load_payload(&path) {
                if self.mode.needs_reference() && self.source.is_some() {
                    self.reference = Some(payload);
                } else {
                    self.source = Some(payload);
                }
                self.error = None;
            }
        }
    }

    fn render_login(&mut self, ctx: &egui::Context) {
        egui::CentralPanel::default().show(ctx, |ui| {
            ui.add_space(ui.available_height() * 0.25);
            ui.vertical_centered(|ui| {
                ui.heading("Garnish");
                ui.label(
                    RichText::new("Make every dish photo look like the menu shot")
                        .color(self.theme.text_muted),
                );
                ui.add_space(self.theme.spacing_16);

                ui.add(
                    egui::TextEdit::singleline(&mut self.login_email)
                        .hint_text("email")
                        .desired_width(260.0),
                );
                let password = ui.add(
                    egui::TextEdit::singleline(&mut self.login_password)
                        .hint_text("password")
                        .password(true)
                        .desired_width(260.0),
                );
                ui.add_space(self.theme.spacing_8);

                let submitted = password.lost_focus()
                    && ui.input(|i| i.key_pressed(egui::Key::Enter));
                let ready =
                    !self.login_email.trim().is_empty() && !self.login_password.trim().is_empty();
                let clicked = ui
                    .add_enabled(ready, egui::Button::new("Sign in"))
                    .clicked();
                if (submitted && ready) || clicked {
                    self.login();
                }

                if let Some(error) = &self.error {
                    ui.add_space(self.theme.spacing_8);
                    ui.label(RichText::new(error).color(self.theme.danger));
                }
            });
        });
    }

    fn render_top_bar(&mut self, ctx: &egui::Context) {
        let email = self
            .session
            .as_ref()
            .map(|record| record.email.clone())
            .unwrap_or_default();
        let mut sign_out = false;

        egui::TopBottomPanel::top("top_bar").show(ctx, |ui| {
            ui.horizontal(|ui| {
                ui.strong("Garnish");
                ui.separator();
                ui.label(RichText::new(email).color(self.theme.text_muted));
                ui.with_layout(egui::Layout::right_to_left(egui::Align::Center), |ui| {
                    if ui.add_enabled(!self.busy, egui::Button::new("Sign out")).clicked() {
                        sign_out = true;
                    }
                });
            });
        });

        if sign_out {
            self.logout();
        }
    }

    fn render_gallery_panel(&mut self, ctx: &egui::Context) {
        let mut selected: Option<EnhancedImage> = None;
        let mut clear = false;

        egui::SidePanel::left("gallery_panel")
            .resizable(true)
            .default_width(230.0)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.heading("Gallery");
                    ui.label(
                        RichText::new(format!("{}", self.gallery.len()))
                            .color(self.theme.text_muted),
                    );
                });
                if ui
                    .add_enabled(
                        !self.gallery.is_empty() && !self.busy,
                        egui::Button::new("Clear gallery"),
                    )
                    .clicked()
                {
                    clear = true;
                }
                ui.separator();

                if self.gallery.is_empty() {
                    ui.label(RichText::new("No enhanced photos yet").color(self.theme.text_muted));
                    return;
                }

                ScrollArea::vertical().id_salt("gallery_list").show(ui, |ui| {
                    for record in &self.gallery {
                        let is_current = self
                            .current
                            .as_ref()
                            .map(|current| current.id == record.id)
                            .unwrap_or(false);

                        match texture_for(&mut self.textures, ctx, &record.image) {
                            Some(texture) => {
                                let response = ui.add(
                                    egui::Image::new(&texture)
                                        .max_height(76.0)
                                        .sense(egui::Sense::click()),
                                );
                                if response.clicked() {
                                    selected = Some(record.clone());
                                }
                            }
                            None => {
                                if ui.button("preview unavailable").clicked() {
                                    selected = Some(record.clone());
                                }
                            }
                        }

                        let mut stamp = RichText::new(created_label(record))
                            .color(self.theme.text_muted)
                            .size(11.0);
                        if is_current {
                            stamp = stamp.color(self.theme.accent_primary);
                        }
                        ui.label(stamp);
                        ui.add_space(self.theme.spacing_8);
                    }
                });
            });

        if clear {
            self.clear_gallery();
        }
        if let Some(record) = selected {
            self.current = Some(record);
            self.compare = None;
            self.compare_open = false;
        }
    }

    fn render_workbench(&mut self, ctx: &egui::Context) {
        let mut pending_mode: Option<EnhancementMode> = None;
        let mut pick_source = false;
        let mut pick_reference = false;
        let mut enhance = false;
        let mut try_again = false;
        let mut compare = false;
        let mut export = false;

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                for mode in EnhancementMode::ALL {
                    if ui
                        .add_enabled(
                            !self.busy,
                            egui::SelectableLabel::new(self.mode == mode, mode.label()),
                        )
                        .clicked()
                    {
                        pending_mode = Some(mode);
                    }
                }
            });
            ui.add_space(self.theme.spacing_8);

            self.theme.card_frame().show(ui, |ui| {
                ui.horizontal(|ui| {
                    ui.vertical(|ui| {
                        ui.strong("Dish photo");
                        if ui.add_enabled(!self.busy, egui::Button::new("Choose…")).clicked() {
                            pick_source = true;
                        }
                        ui.label(
                            RichText::new("or drop a file on the window")
                                .color(self.theme.text_muted)
                                .size(11.0),
                        );
                        if let Some(source) = &self.source {
                            if let Some(texture) = texture_for(&mut self.textures, ctx, source) {
                                ui.add(egui::Image::new(&texture).max_height(120.0));
                            }
                        }
                    });

                    if self.mode.needs_reference() {
                        ui.separator();
                        ui.vertical(|ui| {
                            ui.strong("Reference photo");
                            if ui.add_enabled(!self.busy, egui::Button::new("Choose…")).clicked() {
                                pick_reference = true;
                            }
                            ui.label(
                                RichText::new("the look to transfer")
                                    .color(self.theme.text_muted)
                                    .size(11.0),
                            );
                            if let Some(reference) = &self.reference {
                                if let Some(texture) =
                                    texture_for(&mut self.textures, ctx, reference)
                                {
                                    ui.add(egui::Image::new(&texture).max_height(120.0));
                                }
                            }
                        });
                    }
                });
            });
            ui.add_space(self.theme.spacing_8);

            let ready = !self.busy
                && self.source.is_some()
                && (!self.mode.needs_reference() || self.reference.is_some());
            ui.horizontal(|ui| {
                if ui.add_enabled(ready, egui::Button::new("Enhance")).clicked() {
                    enhance = true;
                }
                if self.busy {
                    ui.spinner();
                    if let Some(status) = self.status {
                        ui.label(RichText::new(status).color(self.theme.accent_primary));
                    }
                }
            });

            if let Some(error) = &self.error {
                ui.add_space(self.theme.spacing_4);
                ui.label(RichText::new(error).color(self.theme.danger));
            }

            if let Some(record) = &self.current {
                ui.add_space(self.theme.spacing_12);
                ui.separator();
                ui.strong("Result");
                if let Some(texture) = texture_for(&mut self.textures, ctx, &record.image) {
                    ui.add(egui::Image::new(&texture).max_height(320.0));
                } else {
                    ui.label(
                        RichText::new("preview unavailable").color(self.theme.text_muted),
                    );
                }
                ui.horizontal(|ui| {
                    if ui.add_enabled(!self.busy, egui::Button::new("Try again")).clicked() {
                        try_again = true;
                    }
                    if ui.button("Compare").clicked() {
                        compare = true;
                    }
                    if ui.button("Export").clicked() {
                        export = true;
                    }
                });
            }

            ui.add_space(self.theme.spacing_12);
            egui::CollapsingHeader::new("Diagnostics")
                .default_open(false)
                .show(ui, |ui| {
                    ScrollArea::vertical()
                        .id_salt("diagnostics_log")
                        .max_height(90.0)
                        .stick_to_bottom(true)
                        .show(ui, |ui| {
                            for entry in &self.diagnostics {
                                ui.label(RichText::new(entry).size(11.0));
                            }
                        });
                });
        });

        if let Some(mode) = pending_mode {
            self.set_mode(mode);
        }
        if pick_source {
            if let Some(payload) = self.pick_image() {
                self.source = Some(payload);
                self.error = None;
            }
        }
        if pick_reference {
            if let Some(payload) = self.pick_image() {
                self.reference = Some(payload);
                self.error = None;
            }
        }
        if enhance {
            self.start_enhancement();
        }
        if try_again {
            self.try_again();
        }
        if compare {
            if let Some(record) = self.current.clone() {
                self.compare = Some((record.source, record.image));
                self.compare_open = true;
            }
        }
        if export {
            self.export_current();
        }
    }

    fn render_compare_window(&mut self, ctx: &egui::Context) {
        if !self.compare_open {
            return;
        }
        let Some((before, after)) = self.compare.clone() else {
            self.compare_open = false;
            return;
        };

        let mut open = self.compare_open;
        egui::Window::new("Before / after")
            .open(&mut open)
            .resizable(true)
            .show(ctx, |ui| {
                ui.horizontal(|ui| {
                    ui.vertical(|ui| {
                        ui.label(RichText::new("Before").color(self.theme.text_muted));
                        if let Some(texture) = texture_for(&mut self.textures, ctx, &before) {
                            ui.add(egui::Image::new(&texture).max_height(260.0));
                        }
                    });
                    ui.separator();
                    ui.vertical(|ui| {
                        ui.label(RichText::new("After").color(self.theme.accent_primary));
                        if let Some(texture) = texture_for(&mut self.textures, ctx, &after) {
                            ui.add(egui::Image::new(&texture).max_height(260.0));
                        }
                    });
                });
            });
        self.compare_open = open;
    }
}

impl eframe::App for GarnishApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.drain_events();
        self.handle_dropped_files(ctx);

        if self.busy {
            ctx.request_repaint_after(Duration::from_millis(200));
        }

        if self.session.is_none() {
            self.render_login(ctx);
            return;
        }

        self.render_top_bar(ctx);
        self.render_gallery_panel(ctx);
        self.render_workbench(ctx);
        self.render_compare_window(ctx);
    }
}

fn sorted_newest_first(mut records: Vec<EnhancedImage>) -> Vec<EnhancedImage> {
    records.sort_by(|a, b| (b.created_at, &b.id).cmp(&(a.created_at, &a.id)));
    records
}

fn created_label(record: &EnhancedImage) -> String {
    match Local.timestamp_millis_opt(record.created_at).single() {
        Some(stamp) => stamp.format("%b %e %H:%M").to_string(),
        None => record.id.clone(),
    }
}

fn payload_key(payload: &InlinePayload) -> u64 {
    let mut hasher = DefaultHasher::new();
    payload.mime_type.hash(&mut hasher);
    payload.data.hash(&mut hasher);
    hasher.finish()
}

fn texture_for(
    textures: &mut HashMap<u64, TextureHandle>,
    ctx: &egui::Context,
    payload: &InlinePayload,
) -> Option<TextureHandle> {
    let key = payload_key(payload);
    if let Some(texture) = textures.get(&key) {
        return Some(texture.clone());
    }

    let bytes = payload.decode().ok()?;
    let decoded = image::load_from_memory(&bytes).ok()?;
    let rgba = decoded.to_rgba8();
    let size = [rgba.width() as usize, rgba.height() as usize];
    let color = egui::ColorImage::from_rgba_unmultiplied(size, rgba.as_raw());
    let texture = ctx.load_texture(format!("payload-{key:016x}"), color, egui::TextureOptions::LINEAR);
    textures.insert(key, texture.clone());
    Some(texture)
}
