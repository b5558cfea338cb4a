//! Editing session orchestration.
//!
//! `EditorSession` owns the source buffers, the preview channel, the console
//! panel, and the render scheduler, and wires them into the edit/render/
//! validate loop. Progression side effects go through the
//! [`GamificationHooks`] seam so the pipeline itself stays testable with a
//! recording stub.

use cq_buffers::BufferKind;
use cq_buffers::SourceSet;
use cq_channel::ChannelConfig;
use cq_channel::PreviewChannel;
use cq_console::ConsolePanel;
use cq_console::PanelStatus;
use cq_core::EditorResult;
use cq_preview::PreviewDocument;
use cq_preview::PreviewSandbox;
use cq_preview::build_preview;
use cq_storage::WorkspaceStore;
use cq_validate::Category;
use cq_validate::ValidationReport;
use std::time::Duration;
use std::time::Instant;

/// Trailing-edge delay between the last edit and the preview rebuild.
pub const RENDER_DEBOUNCE: Duration = Duration::from_millis(300);

/// Coalesces bursts of edits into a single render. Every request pushes the
/// deadline out; the render fires once the burst goes quiet.
#[derive(Debug, Clone, Copy, Default)]
pub struct RenderScheduler {
    deadline: Option<Instant>,
}

impl RenderScheduler {
    pub fn request(&mut self, now: Instant) {
        self.deadline = Some(now + RENDER_DEBOUNCE);
    }

    pub fn is_pending(&self) -> bool {
        self.deadline.is_some()
    }

    /// Consumes the deadline and reports whether a render is due.
    pub fn fire_if_due(&mut self, now: Instant) -> bool {
        match self.deadline {
            Some(deadline) if now >= deadline => {
                self.deadline = None;
                true
            }
            _ => false,
        }
    }
}

/// Progression side effects raised by a fully valid challenge attempt.
/// Fire-and-forget; the session never consumes a return value.
pub trait GamificationHooks {
    fn award_xp(&mut self, _amount: u32, _reason: &str) {}
    fn record_progress(&mut self, _category: &str, _challenge_id: &str, _percentage: u32) {}
    fn check_achievements(&mut self) {}
}

/// Hooks that do nothing. Used when no progression backend is attached.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullHooks;

impl GamificationHooks for NullHooks {}

/// Advisory analyzer output for all three buffers.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct LintReport {
    pub html: Vec<String>,
    pub css: Vec<String>,
    pub js: Vec<String>,
}

impl LintReport {
    pub fn is_clean(&self) -> bool {
        self.html.is_empty() && self.css.is_empty() && self.js.is_empty()
    }
}

/// Everything a validate action produces: the scored report plus the
/// advisory lint issues shown alongside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChallengeOutcome {
    pub report: ValidationReport,
    pub lint: LintReport,
}

/// One user's live editing session.
pub struct EditorSession {
    sources: SourceSet,
    channel: PreviewChannel,
    sandbox: PreviewSandbox,
    console: ConsolePanel,
    scheduler: RenderScheduler,
    store: WorkspaceStore,
    hooks: Box<dyn GamificationHooks>,
    preview: PreviewDocument,
    render_count: u64,
}

impl EditorSession {
    pub fn new(store: WorkspaceStore) -> EditorResult<Self> {
        let channel = PreviewChannel::new(ChannelConfig::hardened()?)?;
        Ok(Self {
            sources: SourceSet::empty(),
            channel,
            sandbox: PreviewSandbox::default(),
            console: ConsolePanel::new(),
            scheduler: RenderScheduler::default(),
            store,
            hooks: Box::new(NullHooks),
            preview: build_preview(&SourceSet::empty()),
            render_count: 0,
        })
    }

    pub fn with_hooks(mut self, hooks: Box<dyn GamificationHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn sources(&self) -> &SourceSet {
        &self.sources
    }

    pub fn console(&self) -> &ConsolePanel {
        &self.console
    }

    pub fn status(&self) -> PanelStatus {
        self.console.status()
    }

    pub fn preview(&self) -> &PreviewDocument {
        &self.preview
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub fn render_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    /// Replaces one buffer and schedules a debounced render.
    pub fn edit(&mut self, kind: BufferKind, text: impl Into<String>, now: Instant) {
        self.sources.set(kind, text);
        self.scheduler.request(now);
    }

    /// Drives the session clock: fires a due render and pumps any sandbox
    /// events into the console.
    pub fn tick(&mut self, now: Instant) {
        if self.scheduler.fire_if_due(now) {
            self.render_now();
        }
        self.pump_events();
    }

    /// Rebuilds the preview immediately from the current buffers. Each
    /// render starts a new epoch, so output from a superseded sandbox can
    /// no longer reach the console.
    pub fn render_now(&mut self) {
        self.channel.begin_epoch();
        let doc = build_preview(&self.sources);
        self.sandbox.execute(&doc, &self.channel.emitter());
        self.preview = doc;
        self.render_count = self.render_count.saturating_add(1);
        self.pump_events();
    }

    /// Forces a render regardless of any pending debounce.
    pub fn refresh(&mut self) {
        self.scheduler = RenderScheduler::default();
        self.render_now();
    }

    /// Scores the current buffers against a challenge and runs the advisory
    /// analyzers alongside. Progression hooks fire only on a fully valid
    /// attempt; a partial score never awards XP.
    pub fn validate(&mut self, category: Category, challenge_id: &str) -> ChallengeOutcome {
        let report = cq_validate::validate(category, challenge_id, &self.sources);
        if report.is_valid {
            self.hooks.award_xp(report.xp_reward, challenge_id);
            self.hooks
                .record_progress(category.as_str(), challenge_id, report.percentage);
            self.hooks.check_achievements();
        }

        ChallengeOutcome {
            report,
            lint: self.lint(),
        }
    }

    pub fn lint(&self) -> LintReport {
        LintReport {
            html: cq_lint::lint_html(&self.sources.html),
            css: cq_lint::lint_css(&self.sources.css),
            js: cq_lint::lint_js(&self.sources.js),
        }
    }

    pub fn clear_console(&mut self) {
        self.console.clear();
    }

    pub fn save(&self, workspace: &str, timestamp_millis: u64) -> EditorResult<()> {
        self.store.store(workspace, &self.sources, timestamp_millis)
    }

    /// Loads a saved workspace into the buffers and schedules a render.
    /// A missing or unreadable workspace degrades to empty buffers.
    pub fn restore(&mut self, workspace: &str, now: Instant) {
        self.sources = match self.store.snapshot(workspace) {
            Ok(Some(snapshot)) => snapshot.sources,
            Ok(None) | Err(_) => SourceSet::empty(),
        };
        self.scheduler.request(now);
    }

    fn pump_events(&mut self) {
        for event in self.channel.drain() {
            self.console.append(event.kind, &event.text);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::EditorSession;
    use super::GamificationHooks;
    use super::RENDER_DEBOUNCE;
    use super::RenderScheduler;
    use cq_buffers::BufferKind;
    use cq_channel::EventKind;
    use cq_storage::StorageConfig;
    use cq_storage::WorkspaceStore;
    use cq_validate::Category;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::Duration;
    use std::time::Instant;
    use std::time::{SystemTime, UNIX_EPOCH};

    #[derive(Debug, Default)]
    struct Recorded {
        xp: Vec<(u32, String)>,
        progress: Vec<(String, String, u32)>,
        achievement_checks: u32,
    }

    struct RecordingHooks {
        recorded: Rc<RefCell<Recorded>>,
    }

    impl GamificationHooks for RecordingHooks {
        fn award_xp(&mut self, amount: u32, reason: &str) {
            self.recorded.borrow_mut().xp.push((amount, reason.to_owned()));
        }

        fn record_progress(&mut self, category: &str, challenge_id: &str, percentage: u32) {
            self.recorded.borrow_mut().progress.push((
                category.to_owned(),
                challenge_id.to_owned(),
                percentage,
            ));
        }

        fn check_achievements(&mut self) {
            self.recorded.borrow_mut().achievement_checks += 1;
        }
    }

    fn temp_store() -> WorkspaceStore {
        let stamp = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|value| value.as_nanos())
            .unwrap_or_default();
        WorkspaceStore::new(StorageConfig::default())
            .with_persistent_root(std::env::temp_dir().join(format!("codequest-editor-test-{stamp}")))
    }

    fn session() -> EditorSession {
        let session = EditorSession::new(temp_store());
        assert!(session.is_ok());
        session.unwrap_or_else(|_| unreachable!())
    }

    fn valid_html() -> &'static str {
        "<!DOCTYPE html>\n<html lang=\"en\">\n<head><title>t</title></head>\n<body></body>\n</html>"
    }

    #[test]
    fn edit_burst_renders_once_with_final_buffers() {
        let mut session = session();
        let start = Instant::now();

        session.edit(BufferKind::Html, "<p>one</p>", start);
        session.edit(BufferKind::Html, "<p>two</p>", start + Duration::from_millis(100));
        session.edit(BufferKind::Html, "<p>three</p>", start + Duration::from_millis(200));

        session.tick(start + Duration::from_millis(250));
        assert_eq!(session.render_count(), 0);
        assert!(session.render_pending());

        session.tick(start + Duration::from_millis(200) + RENDER_DEBOUNCE);
        assert_eq!(session.render_count(), 1);
        assert!(!session.render_pending());
        assert!(session.preview().markup.contains("<p>three</p>"));

        // A later tick without a new edit stays quiet.
        session.tick(start + Duration::from_secs(5));
        assert_eq!(session.render_count(), 1);
    }

    #[test]
    fn scheduler_deadline_slides_with_each_request() {
        let mut scheduler = RenderScheduler::default();
        let start = Instant::now();

        scheduler.request(start);
        scheduler.request(start + Duration::from_millis(200));

        assert!(!scheduler.fire_if_due(start + RENDER_DEBOUNCE));
        assert!(scheduler.fire_if_due(start + Duration::from_millis(200) + RENDER_DEBOUNCE));
        assert!(!scheduler.fire_if_due(start + Duration::from_secs(10)));
    }

    #[test]
    fn rendered_script_output_lands_in_the_console() {
        let mut session = session();
        let now = Instant::now();

        session.edit(BufferKind::Js, "console.log('from sandbox');", now);
        session.render_now();

        let texts: Vec<&str> = session
            .console()
            .messages()
            .map(|message| message.text.as_str())
            .collect();
        assert_eq!(texts, vec!["from sandbox"]);
    }

    #[test]
    fn valid_attempt_fires_hooks_once() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut session = session().with_hooks(Box::new(RecordingHooks {
            recorded: Rc::clone(&recorded),
        }));

        session.edit(BufferKind::Html, valid_html(), Instant::now());
        let outcome = session.validate(Category::Html, "basic-structure");
        assert!(outcome.report.is_valid);

        let recorded = recorded.borrow();
        assert_eq!(recorded.xp, vec![(50, "basic-structure".to_owned())]);
        assert_eq!(
            recorded.progress,
            vec![("html".to_owned(), "basic-structure".to_owned(), 100)]
        );
        assert_eq!(recorded.achievement_checks, 1);
    }

    #[test]
    fn partial_attempt_fires_no_hooks() {
        let recorded = Rc::new(RefCell::new(Recorded::default()));
        let mut session = session().with_hooks(Box::new(RecordingHooks {
            recorded: Rc::clone(&recorded),
        }));

        session.edit(BufferKind::Html, "<body></body>", Instant::now());
        let outcome = session.validate(Category::Html, "basic-structure");
        assert!(!outcome.report.is_valid);
        assert_eq!(outcome.report.passed, 1);

        let recorded = recorded.borrow();
        assert!(recorded.xp.is_empty());
        assert!(recorded.progress.is_empty());
        assert_eq!(recorded.achievement_checks, 0);
    }

    #[test]
    fn validate_does_not_touch_buffers_or_preview() {
        let mut session = session();
        session.edit(BufferKind::Html, "<body></body>", Instant::now());
        let before_sources = session.sources().clone();
        let before_renders = session.render_count();

        let _ = session.validate(Category::Html, "basic-structure");

        assert_eq!(session.sources(), &before_sources);
        assert_eq!(session.render_count(), before_renders);
    }

    #[test]
    fn save_then_restore_roundtrips_buffers() {
        let mut session = session();
        let now = Instant::now();

        session.edit(BufferKind::Css, "p { margin: 0; }", now);
        let saved = session.save("lesson-1", 123);
        assert!(saved.is_ok());

        session.edit(BufferKind::Css, "p { margin: 4px; }", now);
        session.restore("lesson-1", now);
        assert_eq!(session.sources().css, "p { margin: 0; }");
        assert!(session.render_pending());
    }

    #[test]
    fn restoring_a_missing_workspace_empties_the_buffers() {
        let mut session = session();
        let now = Instant::now();

        session.edit(BufferKind::Js, "console.log(1);", now);
        session.restore("never-saved", now);
        assert!(session.sources().is_empty());
    }

    #[test]
    fn lint_covers_all_three_buffers() {
        let mut session = session();
        let now = Instant::now();
        session.edit(BufferKind::Html, "<p>ok</p>", now);
        session.edit(BufferKind::Css, "p { color: red; }", now);
        session.edit(BufferKind::Js, "const x = 1;", now);

        let report = session.lint();
        assert!(report.is_clean(), "unexpected issues: {report:?}");

        session.edit(BufferKind::Js, "function broken( {", now);
        let report = session.lint();
        assert!(!report.is_clean());
        assert!(report.js.iter().any(|issue| issue.contains("Syntax error")));
    }

    #[test]
    fn clearing_the_console_resets_error_state() {
        let mut session = session();
        session.edit(BufferKind::Js, "null.missing;", Instant::now());
        session.render_now();
        assert!(session.console().error_count() > 0);

        session.clear_console();
        assert_eq!(session.console().error_count(), 0);
        let kinds: Vec<EventKind> = session
            .console()
            .messages()
            .map(|message| message.kind)
            .collect();
        assert_eq!(kinds, vec![EventKind::Log]);
    }
}
