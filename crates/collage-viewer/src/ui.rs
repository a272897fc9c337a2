//! egui overlay: toolbar, transform readout and load status.

use crate::{gizmo::GizmoMode, input::Command};
use collage::Readout;

pub const HINT: &str = "\"t\" translate | \"r\" rotate | \"s\" scale | \"c\" toggle controls";

/// Everything the overlay shows.
#[derive(Debug, Clone, Default)]
pub struct Hud {
    pub mode: GizmoMode,
    /// Readout panels and the hint are shown only while the handles are.
    pub controls_visible: bool,
    /// Last refreshed readout; `None` until the model has loaded.
    pub readout: Option<Readout>,
    pub status: Vec<String>,
    pub errors: Vec<String>,
}

/// Draws the overlay and returns the commands clicked this frame.
pub fn draw(ctx: &egui::Context, hud: &Hud) -> Vec<Command> {
    let mut commands = Vec::new();

    egui::TopBottomPanel::top("toolbar").show(ctx, |ui| {
        ui.horizontal(|ui| {
            for (label, command) in Command::BUTTONS {
                let selected = matches!(command, Command::SetMode(m) if m == hud.mode)
                    || (command == Command::ToggleControls && hud.controls_visible);
                if ui.selectable_label(selected, label).clicked() {
                    commands.push(command);
                }
            }
        });
    });

    if hud.controls_visible {
        if let Some(readout) = &hud.readout {
            readout_panel(ctx, "position", readout.position_lines(), [10.0, 40.0]);
            readout_panel(ctx, "rotation", readout.rotation_lines(), [10.0, 130.0]);
            readout_panel(ctx, "scale", readout.scale_lines(), [10.0, 220.0]);
        }

        egui::TopBottomPanel::bottom("hint").show(ctx, |ui| {
            ui.label(HINT);
        });
    }

    if !hud.status.is_empty() || !hud.errors.is_empty() {
        egui::Window::new("status")
            .anchor(egui::Align2::RIGHT_TOP, [-10.0, 40.0])
            .resizable(false)
            .collapsible(true)
            .show(ctx, |ui| {
                for line in &hud.status {
                    ui.label(line);
                }
                for line in &hud.errors {
                    ui.colored_label(egui::Color32::from_rgb(255, 110, 110), line);
                }
            });
    }

    commands
}

fn readout_panel(ctx: &egui::Context, title: &str, lines: [String; 3], offset: [f32; 2]) {
    egui::Window::new(title)
        .anchor(egui::Align2::LEFT_TOP, offset)
        .resizable(false)
        .collapsible(false)
        .show(ctx, |ui| {
            for line in lines {
                ui.monospace(line);
            }
        });
}

#[cfg(test)]
mod tests {
    use super::*;
    use collage::Transform;

    #[test]
    fn overlay_runs_headless_without_commands() {
        let ctx = egui::Context::default();
        let hud = Hud {
            controls_visible: true,
            readout: Some(Readout::from_transform(&Transform::IDENTITY)),
            status: vec!["scene: part".into()],
            errors: vec!["splat: not found".into()],
            ..Hud::default()
        };

        let mut commands = Vec::new();
        let _ = ctx.run(egui::RawInput::default(), |ctx| {
            commands = draw(ctx, &hud);
        });
        assert!(commands.is_empty());
    }

    fn screen() -> egui::Rect {
        egui::Rect::from_min_size(egui::Pos2::ZERO, egui::vec2(800.0, 600.0))
    }

    fn frames(ctx: &egui::Context, hud: &Hud, events: Vec<Vec<egui::Event>>) -> Vec<Command> {
        let mut out = Vec::new();
        for events in events {
            let input = egui::RawInput {
                screen_rect: Some(screen()),
                events,
                ..Default::default()
            };
            let _ = ctx.run(input, |ctx| out.extend(draw(ctx, hud)));
        }
        out
    }

    fn click_at(ctx: &egui::Context, hud: &Hud, pos: egui::Pos2) -> Vec<Command> {
        let button = |pressed| egui::Event::PointerButton {
            pos,
            button: egui::PointerButton::Primary,
            pressed,
            modifiers: egui::Modifiers::default(),
        };
        frames(
            ctx,
            hud,
            vec![
                vec![egui::Event::PointerMoved(pos), button(true)],
                vec![button(false)],
                vec![egui::Event::PointerGone],
            ],
        )
    }

    fn readout_hud(controls_visible: bool) -> Hud {
        Hud {
            controls_visible,
            readout: Some(Readout::from_transform(&Transform::IDENTITY)),
            ..Hud::default()
        }
    }

    fn panels_shown(ctx: &egui::Context) -> [bool; 4] {
        let window = |title: &str| ctx.memory(|m| m.area_rect(egui::Id::new(title)).is_some());
        [
            window("position"),
            window("rotation"),
            window("scale"),
            egui::panel::PanelState::load(ctx, egui::Id::new("hint")).is_some(),
        ]
    }

    #[test]
    fn readout_and_hint_follow_controls_visibility() {
        let hidden = egui::Context::default();
        frames(&hidden, &readout_hud(false), vec![vec![], vec![]]);
        assert_eq!(panels_shown(&hidden), [false; 4]);

        let shown = egui::Context::default();
        frames(&shown, &readout_hud(true), vec![vec![], vec![]]);
        assert_eq!(panels_shown(&shown), [true; 4]);
    }

    #[test]
    fn toolbar_buttons_issue_their_commands_in_order() {
        let ctx = egui::Context::default();
        let hud = Hud::default();
        frames(&ctx, &hud, vec![vec![]]);

        // Sweep the toolbar row left to right and record each distinct command.
        let mut seen: Vec<Command> = Vec::new();
        for x in (0..600).step_by(4) {
            for command in click_at(&ctx, &hud, egui::pos2(x as f32, 10.0)) {
                if seen.last() != Some(&command) {
                    seen.push(command);
                }
            }
        }

        let expected: Vec<Command> = Command::BUTTONS.iter().map(|(_, c)| *c).collect();
        assert_eq!(seen, expected);
        assert_eq!(seen.last(), Some(&Command::ToggleControls));
    }

    #[test]
    fn hint_names_every_shortcut() {
        for key in ["\"t\"", "\"r\"", "\"s\"", "\"c\""] {
            assert!(HINT.contains(key));
        }
    }
}
