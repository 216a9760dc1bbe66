use std::collections::VecDeque;
use std::time::Duration;

use eframe::egui;
use egui::{Align2, ColorImage, TextureHandle, TextureOptions, Vec2};
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;

use crate::app::{AppEvent, AppHandles, ClientVariant, UiAction};
use crate::capture::Frame;
use crate::codecs::{decode_jpeg, decode_payload, CodecErrors};
use crate::render::RenderedFrame;
use crate::status::Alert;

// Watch channels don't wake the UI, so poll at roughly the capture rate.
const REPAINT_INTERVAL: Duration = Duration::from_millis(33);
const SURFACE_SIZE: Vec2 = Vec2::new(640.0, 480.0);

/// Window with the status line, the live preview, the server canvas and the
/// save button. All state lives in the event loop; this only reads snapshots
/// and posts UI actions.
pub(super) struct RelayApp {
    variant: ClientVariant,
    handles: AppHandles,
    preview: watch::Receiver<Option<Frame>>,
    shutdown: CancellationToken,
    preview_texture: Option<TextureHandle>,
    canvas_texture: Option<TextureHandle>,
    alerts: VecDeque<Alert>,
}

impl RelayApp {
    pub fn new(
        variant: ClientVariant,
        handles: AppHandles,
        preview: watch::Receiver<Option<Frame>>,
        shutdown: CancellationToken,
    ) -> Self {
        RelayApp {
            variant,
            handles,
            preview,
            shutdown,
            preview_texture: None,
            canvas_texture: None,
            alerts: VecDeque::new(),
        }
    }

    fn refresh_preview(&mut self, ctx: &egui::Context) {
        if !self.preview.has_changed().unwrap_or(false) {
            return;
        }
        match self.preview.borrow_and_update().as_ref() {
            Some(frame) => {
                let size = [frame.width as usize, frame.height as usize];
                if frame.data.len() != size[0] * size[1] * 3 {
                    return;
                }
                let image = ColorImage::from_rgb(size, &frame.data);
                set_texture(ctx, &mut self.preview_texture, "preview", image);
            }
            None => self.preview_texture = None,
        }
    }

    fn refresh_canvas(&mut self, ctx: &egui::Context) {
        if !self.handles.canvas.has_changed().unwrap_or(false) {
            return;
        }
        let Some(frame) = self.handles.canvas.borrow_and_update().clone() else {
            return;
        };
        match canvas_image(&frame) {
            Ok(image) => set_texture(ctx, &mut self.canvas_texture, "canvas", image),
            Err(err) => tracing::warn!("Could not display canvas frame {}: {err}", frame.sequence),
        }
    }

    fn show_alert(&mut self, ctx: &egui::Context) {
        let Some(alert) = self.alerts.front() else {
            return;
        };
        let mut dismissed = false;
        egui::Window::new(alert.title())
            .collapsible(false)
            .resizable(false)
            .anchor(Align2::CENTER_CENTER, Vec2::ZERO)
            .show(ctx, |ui| {
                ui.label(alert.to_string());
                ui.add_space(8.0);
                dismissed = ui.button("OK").clicked();
            });
        if dismissed {
            self.alerts.pop_front();
        }
    }
}

/// A repeat of the last queued alert adds nothing.
fn queue_alert(queue: &mut VecDeque<Alert>, alert: Alert) {
    if queue.back() != Some(&alert) {
        queue.push_back(alert);
    }
}

fn canvas_image(frame: &RenderedFrame) -> Result<ColorImage, CodecErrors> {
    let rgba = decode_jpeg(&decode_payload(frame.payload())?)?;
    let size = [rgba.width() as usize, rgba.height() as usize];
    Ok(ColorImage::from_rgba_unmultiplied(size, rgba.as_raw()))
}

fn set_texture(
    ctx: &egui::Context,
    slot: &mut Option<TextureHandle>,
    name: &str,
    image: ColorImage,
) {
    match slot {
        Some(texture) => texture.set(image, TextureOptions::LINEAR),
        None => *slot = Some(ctx.load_texture(name, image, TextureOptions::LINEAR)),
    }
}

fn surface(ui: &mut egui::Ui, heading: &str, texture: Option<&TextureHandle>, waiting: &str) {
    ui.vertical(|ui| {
        ui.heading(heading);
        match texture {
            Some(texture) => {
                ui.image((texture.id(), SURFACE_SIZE));
            }
            None => {
                let (rect, _) = ui.allocate_exact_size(SURFACE_SIZE, egui::Sense::hover());
                ui.painter().rect_filled(rect, 4.0, egui::Color32::from_gray(30));
                ui.painter().text(
                    rect.center(),
                    Align2::CENTER_CENTER,
                    waiting,
                    egui::FontId::proportional(16.0),
                    egui::Color32::GRAY,
                );
            }
        }
    });
}

impl eframe::App for RelayApp {
    fn update(&mut self, ctx: &egui::Context, _: &mut eframe::Frame) {
        if self.shutdown.is_cancelled() {
            ctx.send_viewport_cmd(egui::ViewportCommand::Close);
            return;
        }

        while let Ok(alert) = self.handles.alerts.try_recv() {
            queue_alert(&mut self.alerts, alert);
        }
        self.refresh_preview(ctx);
        self.refresh_canvas(ctx);

        egui::TopBottomPanel::bottom("controls").show(ctx, |ui| {
            ui.horizontal_centered(|ui| {
                if ui.button("Save canvas").clicked()
                    && self.handles.events.send(AppEvent::Ui(UiAction::Save)).is_err()
                {
                    tracing::error!("Event loop is gone, cannot save");
                }
                ui.separator();
                ui.label(self.handles.status.borrow().message.as_str());
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.horizontal(|ui| {
                if self.variant == ClientVariant::Capture {
                    surface(ui, "Webcam", self.preview_texture.as_ref(), "Waiting for camera...");
                }
                surface(ui, "Canvas", self.canvas_texture.as_ref(), "Waiting for canvas...");
            });
        });

        self.show_alert(ctx);
        ctx.request_repaint_after(REPAINT_INTERVAL);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repeated_alerts_collapse() {
        let mut queue = VecDeque::new();
        for _ in 0..50 {
            queue_alert(&mut queue, Alert::Generic("Connection refused".to_owned()));
        }
        queue_alert(&mut queue, Alert::DeviceAccess);
        queue_alert(&mut queue, Alert::Generic("Connection refused".to_owned()));

        assert_eq!(
            Vec::from(queue),
            vec![
                Alert::Generic("Connection refused".to_owned()),
                Alert::DeviceAccess,
                Alert::Generic("Connection refused".to_owned()),
            ]
        );
    }
}
