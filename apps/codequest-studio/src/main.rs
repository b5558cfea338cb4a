use cq_buffers::BufferKind;
use cq_channel::EventKind;
use cq_console::format_clock;
use cq_console::PanelStatus;
use cq_editor::EditorSession;
use cq_editor::LintReport;
use cq_highlight::HighlightState;
use cq_highlight::TokenKind;
use cq_storage::StorageConfig;
use cq_storage::WorkspaceStore;
use cq_validate::Challenge;
use cq_validate::ValidationReport;
use eframe::egui;
use std::path::PathBuf;
use std::time::Duration;
use std::time::Instant;
use std::time::{SystemTime, UNIX_EPOCH};

const TICK_INTERVAL: Duration = Duration::from_millis(100);
const EDITOR_ROWS: usize = 10;
const DEFAULT_WORKSPACE: &str = "scratch";

const COLOR_ERROR: egui::Color32 = egui::Color32::from_rgb(200, 65, 65);
const COLOR_OK: egui::Color32 = egui::Color32::from_rgb(120, 180, 90);
const COLOR_MUTED: egui::Color32 = egui::Color32::from_rgb(150, 150, 150);
const COLOR_TEXT: egui::Color32 = egui::Color32::from_rgb(226, 226, 226);

fn main() -> Result<(), eframe::Error> {
    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_title("CodeQuest Studio")
            .with_inner_size([1320.0, 840.0])
            .with_min_inner_size([960.0, 640.0]),
        ..Default::default()
    };

    eframe::run_native(
        "CodeQuest Studio",
        native_options,
        Box::new(|_cc| Ok(Box::new(StudioApp::default()))),
    )
}

fn workspace_root() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(std::env::temp_dir)
        .join(".codequest")
}

fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

fn token_color(kind: TokenKind) -> egui::Color32 {
    match kind {
        TokenKind::Text => COLOR_TEXT,
        TokenKind::Markup => egui::Color32::from_rgb(126, 180, 226),
        TokenKind::StringLit => egui::Color32::from_rgb(152, 195, 121),
        TokenKind::Comment => COLOR_MUTED,
        TokenKind::Keyword => egui::Color32::from_rgb(198, 120, 221),
        TokenKind::Number => egui::Color32::from_rgb(209, 153, 29),
        TokenKind::Symbol => egui::Color32::from_rgb(180, 180, 180),
    }
}

fn status_text(status: &PanelStatus) -> (String, egui::Color32) {
    match status {
        PanelStatus::Ready => ("Ready".to_owned(), COLOR_OK),
        PanelStatus::Errors(1) => ("1 error".to_owned(), COLOR_ERROR),
        PanelStatus::Errors(count) => (format!("{count} errors"), COLOR_ERROR),
    }
}

fn buffer_label(kind: BufferKind) -> &'static str {
    match kind {
        BufferKind::Html => "HTML",
        BufferKind::Css => "CSS",
        BufferKind::Js => "JavaScript",
    }
}

fn lint_issue_count(report: &LintReport) -> usize {
    report.html.len() + report.css.len() + report.js.len()
}

struct StudioApp {
    session: Option<EditorSession>,
    init_error: Option<String>,
    html_input: String,
    css_input: String,
    js_input: String,
    selected_challenge: usize,
    highlight_buffer: BufferKind,
    workspace_input: String,
    last_report: Option<ValidationReport>,
    last_lint: Option<LintReport>,
    status_line: String,
    last_error: Option<String>,
}

impl Default for StudioApp {
    fn default() -> Self {
        let store = WorkspaceStore::new(StorageConfig::default())
            .with_persistent_root(workspace_root());

        let (session, init_error) = match EditorSession::new(store) {
            Ok(session) => (Some(session), None),
            Err(error) => (None, Some(error.to_string())),
        };

        Self {
            session,
            init_error,
            html_input: String::new(),
            css_input: String::new(),
            js_input: String::new(),
            selected_challenge: 0,
            highlight_buffer: BufferKind::Html,
            workspace_input: DEFAULT_WORKSPACE.to_owned(),
            last_report: None,
            last_lint: None,
            status_line: "Welcome to CodeQuest Studio".to_owned(),
            last_error: None,
        }
    }
}

impl StudioApp {
    fn current_challenge(&self) -> Option<&'static Challenge> {
        cq_validate::challenges().get(self.selected_challenge)
    }

    fn sync_inputs_from_session(&mut self) {
        if let Some(session) = &self.session {
            self.html_input = session.sources().html.clone();
            self.css_input = session.sources().css.clone();
            self.js_input = session.sources().js.clone();
        }
    }

    fn run_validation(&mut self) {
        let Some(challenge) = self.current_challenge() else {
            return;
        };
        let (category, id, title) = (challenge.category, challenge.id, challenge.title);

        if let Some(session) = &mut self.session {
            let outcome = session.validate(category, id);
            self.status_line = format!("{title}: {}", outcome.report.summary);
            self.last_report = Some(outcome.report);
            self.last_lint = Some(outcome.lint);
        }
    }

    fn save_workspace(&mut self) {
        let Some(session) = &self.session else {
            return;
        };
        match session.save(&self.workspace_input, now_millis()) {
            Ok(()) => {
                self.status_line = format!("Saved workspace `{}`", self.workspace_input);
                self.last_error = None;
            }
            Err(error) => self.last_error = Some(error.to_string()),
        }
    }

    fn load_workspace(&mut self) {
        let workspace = self.workspace_input.clone();
        if let Some(session) = &mut self.session {
            session.restore(&workspace, Instant::now());
            self.status_line = format!("Loaded workspace `{workspace}`");
            self.last_error = None;
        }
        self.sync_inputs_from_session();
    }

    fn render_toolbar(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Challenge");
            let selected_title = self
                .current_challenge()
                .map_or("-", |challenge| challenge.title);
            egui::ComboBox::from_id_salt("challenge_selector")
                .selected_text(selected_title)
                .show_ui(ui, |ui| {
                    for (index, challenge) in cq_validate::challenges().iter().enumerate() {
                        ui.selectable_value(
                            &mut self.selected_challenge,
                            index,
                            format!(
                                "{} / {} (+{} XP)",
                                challenge.category.as_str(),
                                challenge.title,
                                challenge.xp_reward
                            ),
                        );
                    }
                });

            if ui.button("Validate").clicked() {
                self.run_validation();
            }
            if ui.button("Refresh Preview").clicked() {
                if let Some(session) = &mut self.session {
                    session.refresh();
                }
            }
            if ui.button("Clear Console").clicked() {
                if let Some(session) = &mut self.session {
                    session.clear_console();
                }
            }

            ui.separator();
            ui.label("Workspace");
            ui.add_sized(
                [160.0, 24.0],
                egui::TextEdit::singleline(&mut self.workspace_input),
            );
            if ui.button("Save").clicked() {
                self.save_workspace();
            }
            if ui.button("Load").clicked() {
                self.load_workspace();
            }
        });
    }

    fn render_editor(&mut self, ui: &mut egui::Ui, kind: BufferKind) {
        let input = match kind {
            BufferKind::Html => &mut self.html_input,
            BufferKind::Css => &mut self.css_input,
            BufferKind::Js => &mut self.js_input,
        };

        ui.label(buffer_label(kind));
        let response = ui.add(
            egui::TextEdit::multiline(input)
                .code_editor()
                .desired_rows(EDITOR_ROWS)
                .desired_width(f32::INFINITY),
        );

        if response.changed() {
            let text = input.clone();
            if let Some(session) = &mut self.session {
                session.edit(kind, text, Instant::now());
            }
        }
    }

    fn render_highlight_pane(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.label("Highlight");
            for kind in BufferKind::ALL {
                ui.selectable_value(&mut self.highlight_buffer, kind, buffer_label(kind));
            }
        });

        let Some(session) = &self.session else {
            return;
        };
        let state = HighlightState::compute(
            self.highlight_buffer,
            session.sources().get(self.highlight_buffer),
        );

        egui::ScrollArea::both()
            .id_salt("highlight_scroll")
            .max_height(220.0)
            .show(ui, |ui| {
                ui.spacing_mut().item_spacing = egui::vec2(0.0, 2.0);
                for (number, line) in state.gutter().into_iter().zip(&state.lines) {
                    ui.horizontal(|ui| {
                        ui.label(
                            egui::RichText::new(format!("{number:>4} "))
                                .monospace()
                                .color(COLOR_MUTED),
                        );
                        for token in line {
                            ui.label(
                                egui::RichText::new(token.text.as_str())
                                    .monospace()
                                    .color(token_color(token.kind)),
                            );
                        }
                    });
                }
            });
    }

    fn render_console(&self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };

        ui.label("Console");
        egui::ScrollArea::vertical()
            .id_salt("console_scroll")
            .max_height(200.0)
            .stick_to_bottom(true)
            .show(ui, |ui| {
                for message in session.console().messages() {
                    let color = match message.kind {
                        EventKind::Log => COLOR_TEXT,
                        EventKind::Error => COLOR_ERROR,
                    };
                    ui.label(
                        egui::RichText::new(format!(
                            "[{}] {}",
                            format_clock(message.timestamp_millis),
                            message.text
                        ))
                        .monospace()
                        .color(color),
                    );
                }
            });
    }

    fn render_preview_source(&self, ui: &mut egui::Ui) {
        let Some(session) = &self.session else {
            return;
        };

        ui.label("Preview Document");
        egui::ScrollArea::vertical()
            .id_salt("preview_scroll")
            .max_height(220.0)
            .show(ui, |ui| {
                ui.label(
                    egui::RichText::new(session.preview().markup.as_str())
                        .monospace()
                        .color(COLOR_TEXT),
                );
            });
    }

    fn render_validation_results(&self, ui: &mut egui::Ui) {
        let Some(report) = &self.last_report else {
            return;
        };

        ui.separator();
        ui.label(
            egui::RichText::new(report.summary.as_str()).color(if report.is_valid {
                COLOR_OK
            } else {
                COLOR_ERROR
            }),
        );
        for outcome in &report.rules {
            let (mark, color) = if outcome.passed {
                ("PASS", COLOR_OK)
            } else {
                ("FAIL", COLOR_ERROR)
            };
            ui.horizontal(|ui| {
                ui.label(egui::RichText::new(mark).monospace().color(color));
                ui.label(format!("{}: {}", outcome.name, outcome.message));
            });
        }

        if let Some(lint) = &self.last_lint {
            if !lint.is_clean() {
                ui.separator();
                ui.label(format!("Hints ({})", lint_issue_count(lint)));
                for issue in lint.html.iter().chain(&lint.css).chain(&lint.js) {
                    ui.colored_label(COLOR_MUTED, issue);
                }
            }
        }
    }
}

impl eframe::App for StudioApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(session) = &mut self.session {
            session.tick(Instant::now());
        }
        ctx.request_repaint_after(TICK_INTERVAL);

        egui::TopBottomPanel::top("toolbar_panel").show(ctx, |ui| {
            self.render_toolbar(ui);
        });

        egui::TopBottomPanel::bottom("status_panel").show(ctx, |ui| {
            ui.horizontal_wrapped(|ui| {
                if let Some(session) = &self.session {
                    let (text, color) = status_text(&session.status());
                    ui.colored_label(color, text);
                    ui.separator();
                }
                ui.label(&self.status_line);
                if let Some(error) = self.init_error.as_ref().or(self.last_error.as_ref()) {
                    ui.separator();
                    ui.colored_label(COLOR_ERROR, format!("Error: {error}"));
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.columns(2, |columns| {
                egui::ScrollArea::vertical()
                    .id_salt("editors_scroll")
                    .show(&mut columns[0], |ui| {
                        for kind in BufferKind::ALL {
                            self.render_editor(ui, kind);
                            ui.add_space(6.0);
                        }
                        self.render_validation_results(ui);
                    });

                egui::ScrollArea::vertical()
                    .id_salt("output_scroll")
                    .show(&mut columns[1], |ui| {
                        self.render_highlight_pane(ui);
                        ui.separator();
                        self.render_console(ui);
                        ui.separator();
                        self.render_preview_source(ui);
                    });
            });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::buffer_label;
    use super::lint_issue_count;
    use super::status_text;
    use super::COLOR_ERROR;
    use super::COLOR_OK;
    use cq_buffers::BufferKind;
    use cq_console::PanelStatus;
    use cq_editor::LintReport;

    #[test]
    fn status_text_reflects_error_count() {
        let (text, color) = status_text(&PanelStatus::Ready);
        assert_eq!(text, "Ready");
        assert_eq!(color, COLOR_OK);

        let (text, color) = status_text(&PanelStatus::Errors(1));
        assert_eq!(text, "1 error");
        assert_eq!(color, COLOR_ERROR);

        let (text, _) = status_text(&PanelStatus::Errors(3));
        assert_eq!(text, "3 errors");
    }

    #[test]
    fn every_buffer_has_a_label() {
        for kind in BufferKind::ALL {
            assert!(!buffer_label(kind).is_empty());
        }
    }

    #[test]
    fn lint_issue_count_sums_all_buffers() {
        let report = LintReport {
            html: vec!["a".to_owned()],
            css: vec![],
            js: vec!["b".to_owned(), "c".to_owned()],
        };
        assert_eq!(lint_issue_count(&report), 3);
    }
}
