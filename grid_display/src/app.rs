// app.rs - eframe shell around one GridViewer and its connection

use std::time::{Duration, Instant};

use conway_client::{ConnectionManager, ConnectionState, Damage, GridId, GridViewer, SubscriptionState};
use eframe::egui;
use egui::{Align2, Color32, FontId, Rect, Sense, TextureHandle, TextureOptions, Vec2};
use tracing::{info, warn};

const FRAME_INTERVAL: Duration = Duration::from_millis(16);

pub struct ConwayApp {
    conn: ConnectionManager,
    viewer: GridViewer,
    texture: Option<TextureHandle>,
    selected_grid: u32,
    grid_count: u32,
    action_error: Option<String>,
    // Last so the viewer unsubscribes before the runtime shuts down.
    runtime: tokio::runtime::Runtime,
}

impl ConwayApp {
    pub fn new(
        mut conn: ConnectionManager,
        viewer: GridViewer,
        grid_count: u32,
        runtime: tokio::runtime::Runtime,
    ) -> Self {
        conn.connect();
        Self {
            selected_grid: viewer.grid_id().0,
            conn,
            viewer,
            texture: None,
            grid_count,
            action_error: None,
            runtime,
        }
    }

    fn pump_events(&mut self) {
        // Backends may spawn from inside their callbacks.
        let _guard = self.runtime.enter();
        for event in self.conn.poll() {
            self.viewer.handle_event(&self.conn, event);
        }
        self.viewer.check_timeouts(Instant::now());
    }

    fn connection_label(&self) -> (String, Color32) {
        match self.conn.state() {
            ConnectionState::Connected => {
                let who = self.conn.identity().map(|id| id.to_hex_string()).unwrap_or_default();
                (format!("Connected as {}", short_id(&who)), Color32::LIGHT_GREEN)
            }
            ConnectionState::Connecting => ("Connecting...".to_string(), Color32::YELLOW),
            ConnectionState::Disconnected => ("Disconnected".to_string(), Color32::GRAY),
            ConnectionState::Error(message) => (format!("Error: {message}"), Color32::LIGHT_RED),
        }
    }

    fn top_bar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.heading("Conway's Game of Life");
            ui.separator();
            let (text, color) = self.connection_label();
            ui.colored_label(color, text);
            let offline = matches!(
                self.conn.state(),
                ConnectionState::Disconnected | ConnectionState::Error(_)
            );
            if offline && ui.button("Reconnect").clicked() {
                info!("reconnect requested");
                self.conn.connect();
            }
        });
    }

    fn controls(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            match (self.viewer.snapshot(), self.viewer.info()) {
                (Some(snapshot), info) => {
                    ui.label(format!("Generation: {}", snapshot.generation));
                    let status = info.map(|info| info.status.as_str()).unwrap_or("-");
                    ui.label(format!("Status: {status}"));
                }
                (None, _) => {
                    ui.label("Generation: -");
                }
            }
            ui.separator();

            let live = self.conn.is_connected();
            if ui.add_enabled(live, egui::Button::new("Reset Grid")).clicked() {
                self.action_error = self.viewer.reset(&self.conn).err().map(|err| err.to_string());
            }

            let staged = self.viewer.pending().len();
            let add = egui::Button::new(format!("Add Cells ({staged})"));
            if ui.add_enabled(live && staged > 0, add).clicked() {
                match self.viewer.submit(&self.conn) {
                    Ok(_) => self.action_error = None,
                    Err(err) => {
                        warn!(%err, "submit failed");
                        self.action_error = Some(err.to_string());
                    }
                }
            }
            ui.separator();

            ui.label("Grid:");
            let before = self.selected_grid;
            egui::ComboBox::from_id_source("grid_selector")
                .selected_text(format!("#{}", self.selected_grid))
                .show_ui(ui, |ui| {
                    for id in 0..self.grid_count {
                        ui.selectable_value(&mut self.selected_grid, id, format!("#{id}"));
                    }
                });
            if self.selected_grid != before {
                let _guard = self.runtime.enter();
                self.viewer.set_grid_id(&self.conn, GridId(self.selected_grid));
                self.texture = None;
            }
        });

        ui.horizontal(|ui| {
            let mut palette = *self.viewer.renderer().palette();
            ui.label("Live:");
            ui.color_edit_button_srgba(&mut palette.alive);
            ui.label("Dead:");
            ui.color_edit_button_srgba(&mut palette.dead);
            ui.label("Staged:");
            ui.color_edit_button_srgba(&mut palette.staged);
            self.viewer.renderer_mut().set_palette(palette);

            ui.separator();
            let cells = self.viewer.cells();
            let total = cells.cell_count().max(1);
            let alive = cells.alive_count();
            ui.label(format!(
                "Live cells: {alive} / {total} ({:.1}%)",
                alive as f32 * 100.0 / total as f32
            ));
        });

        if let Some(message) = self.action_error.as_ref() {
            ui.colored_label(Color32::LIGHT_RED, message);
        } else if let Some(err) = self.viewer.last_error() {
            ui.colored_label(Color32::LIGHT_RED, err.to_string());
        }
    }

    fn board(&mut self, ui: &mut egui::Ui) {
        let available = ui.available_size();
        let points = available.x.min(available.y).max(0.0);
        let ppp = ui.ctx().pixels_per_point();
        let side = (points * ppp).floor() as usize;
        if self.viewer.resize(side) {
            self.texture = None;
        }

        let (response, painter) = ui.allocate_painter(Vec2::splat(points), Sense::click());
        let rect = response.rect;

        let to_pixels = |pos: egui::Pos2| ((pos.x - rect.min.x) * ppp, (pos.y - rect.min.y) * ppp);
        match response.hover_pos() {
            Some(pos) => self.viewer.pointer_moved(Some(to_pixels(pos))),
            None => self.viewer.pointer_left(),
        }
        if response.clicked() {
            if let Some(pos) = response.interact_pointer_pos() {
                let (x, y) = to_pixels(pos);
                self.viewer.clicked(x, y);
            }
        }

        self.upload(ui.ctx());
        if let Some(texture) = &self.texture {
            let uv = Rect::from_min_max(egui::pos2(0.0, 0.0), egui::pos2(1.0, 1.0));
            painter.image(texture.id(), rect, uv, Color32::WHITE);
        }

        let overlay = if self.viewer.is_loading() {
            Some("Loading...")
        } else if self.viewer.is_stale() {
            Some("Connection lost, showing last known state")
        } else {
            None
        };
        if let Some(text) = overlay {
            painter.text(rect.center(), Align2::CENTER_CENTER, text, FontId::proportional(20.0), Color32::LIGHT_GRAY);
        }
    }

    /// Pushes whatever the renderer repainted to the GPU texture.
    fn upload(&mut self, ctx: &egui::Context) {
        let damage = self.viewer.render();
        let renderer = self.viewer.renderer();
        if renderer.side() == 0 {
            return;
        }
        match (&mut self.texture, damage) {
            (None, _) => {
                self.texture = Some(ctx.load_texture("conway-grid", renderer.image().clone(), TextureOptions::NEAREST));
            }
            (Some(_), Damage::None) => {}
            (Some(texture), Damage::Full) => {
                texture.set(renderer.image().clone(), TextureOptions::NEAREST);
            }
            (Some(texture), Damage::Rects(rects)) => {
                for rect in rects {
                    texture.set_partial([rect.x, rect.y], renderer.region(rect), TextureOptions::NEAREST);
                }
            }
        }
    }
}

impl eframe::App for ConwayApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        self.pump_events();

        egui::TopBottomPanel::top("connection").show(ctx, |ui| self.top_bar(ui));
        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| self.controls(ui));
        egui::CentralPanel::default().show(ctx, |ui| {
            if self.viewer.subscription_state() == SubscriptionState::Unsubscribing {
                ui.label("Switching grid...");
            }
            self.board(ui);
        });

        ctx.request_repaint_after(FRAME_INTERVAL);
    }
}

fn short_id(hex: &str) -> &str {
    hex.get(..8).unwrap_or(hex)
}
