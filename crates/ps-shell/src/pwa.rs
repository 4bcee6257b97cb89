//! The navigation orchestrator: classify, fetch, transform, swap, commit.

use crate::attacher;
use crate::bindings::BindingMigrator;
use crate::config::RouteRules;
use crate::config::ShellConfig;
use crate::forms::FormRoute;
use crate::forms::FormSubmission;
use crate::history::CommitInfo;
use crate::history::HistoryCoordinator;
use crate::hooks::NoopHooks;
use crate::hooks::PageHooks;
use crate::hooks::PostRenderContext;
use crate::hooks::RenderContext;
use crate::persistence::StatePersistence;
use crate::platform::Platform;
use crate::router::LoadOutcome;
use crate::router::NavState;
use crate::router::NavigationCause;
use crate::router::NavigationKind;
use crate::router::NavigationRequest;
use crate::router::RouteView;
use crate::router::classify;
use crate::router::select_slot;
use crate::runtime::ShadowRuntime;
use crate::session::Session;
use crate::slot::DocumentSlot;
use crate::slot::SlotId;
use crate::tasks::Deferred;
use crate::tasks::ShellTask;
use crate::tasks::TaskQueue;
use ps_core::NavigationError;
use ps_core::NavigationResult;
use ps_core::ShellError;
use ps_core::ShellResult;
use ps_core::time::Clock;
use ps_core::time::SystemClock;
use ps_dom::Document;
use ps_net::DocumentFetcher;
use ps_net::DocumentSource;
use ps_net::FetchRequest;
use ps_net::FetchedDocument;
use ps_net::ShellUrl;
use ps_net::Transport;
use ps_storage::MemoryStorage;
use ps_storage::StorageArea;
use std::sync::Arc;
use tracing::debug;
use tracing::error;
use tracing::info;
use tracing::trace;
use tracing::warn;

const MAX_IDLE_TICKS: usize = 64;

/// One shell per page session. `load` takes `&mut self`, so a second
/// navigation cannot start while one is running.
pub struct Pwa<S, R, P> {
    config: ShellConfig,
    rules: RouteRules,
    source: S,
    runtime: R,
    platform: P,
    hooks: Box<dyn PageHooks>,
    clock: Arc<dyn Clock>,
    session: Session,
    history: HistoryCoordinator,
    bindings: BindingMigrator,
    persistence: StatePersistence,
    tasks: TaskQueue,
    state: NavState,
}

impl<T: Transport, R: ShadowRuntime, P: Platform> Pwa<DocumentFetcher<T>, R, P> {
    /// Fetches over `transport` with the fetcher settings `config` carries.
    pub fn with_transport(config: ShellConfig, transport: T, runtime: R, platform: P) -> ShellResult<Self> {
        let source = config.document_fetcher(transport);
        Self::new(config, source, runtime, platform)
    }
}

impl<S: DocumentSource, R: ShadowRuntime, P: Platform> Pwa<S, R, P> {
    pub fn new(config: ShellConfig, source: S, runtime: R, platform: P) -> ShellResult<Self> {
        config.validate()?;
        let rules = config.route_rules()?;
        let persistence = StatePersistence::new(
            &config.persistence,
            Box::new(MemoryStorage::new()),
            Box::new(MemoryStorage::new()),
        );

        Ok(Self {
            rules,
            source,
            runtime,
            platform,
            hooks: Box::new(NoopHooks),
            clock: Arc::new(SystemClock::new()),
            session: Session::new()?,
            history: HistoryCoordinator::new(),
            bindings: BindingMigrator::new(),
            persistence,
            tasks: TaskQueue::new(),
            state: NavState::Idle,
            config,
        })
    }

    pub fn with_hooks(mut self, hooks: Box<dyn PageHooks>) -> Self {
        self.hooks = hooks;
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Backs state persistence with real storage areas.
    pub fn with_storage(mut self, session: Box<dyn StorageArea>, local: Box<dyn StorageArea>) -> Self {
        self.persistence = StatePersistence::new(&self.config.persistence, session, local);
        self
    }

    pub fn config(&self) -> &ShellConfig {
        &self.config
    }

    pub fn state(&self) -> NavState {
        self.state
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn slot(&self, id: SlotId) -> &DocumentSlot {
        self.session.slot(id)
    }

    pub fn page_loads(&self) -> u64 {
        self.session.page_loads()
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn runtime(&self) -> &R {
        &self.runtime
    }

    pub fn runtime_mut(&mut self) -> &mut R {
        &mut self.runtime
    }

    pub fn platform(&self) -> &P {
        &self.platform
    }

    pub fn platform_mut(&mut self) -> &mut P {
        &mut self.platform
    }

    pub fn history(&self) -> &HistoryCoordinator {
        &self.history
    }

    pub fn persistence(&self) -> &StatePersistence {
        &self.persistence
    }

    pub fn pending_tasks(&self) -> usize {
        self.tasks.len()
    }

    /// Whether captured bindings wait for the next document.
    pub fn bindings_pending(&self) -> bool {
        self.bindings.is_pending()
    }

    /// Navigation triggered by a link click.
    pub fn load(&mut self, href: &str) -> LoadOutcome {
        self.load_with_cause(href, NavigationCause::UserClick)
    }

    pub fn load_with_cause(&mut self, href: &str, cause: NavigationCause) -> LoadOutcome {
        let mut target = href.to_owned();
        let mut cause = cause;
        let mut redirects = 0;

        let outcome = loop {
            match self.run_once(&target, cause) {
                Ok(outcome) => break outcome,
                Err(NavigationError::RedirectRequested { target: next }) => {
                    if redirects >= self.config.max_redirects {
                        let error = NavigationError::RedirectLoop {
                            url: target.clone(),
                            attempts: redirects,
                        };
                        break self.fail(error, &target);
                    }
                    redirects += 1;
                    debug!(from = %target, to = %next, redirects, "following meta refresh");
                    target = next;
                    if cause != NavigationCause::HistoryPop {
                        cause = NavigationCause::Redirect;
                    }
                }
                Err(error) => break self.fail(error, &target),
            }
        };

        self.history.cancel_pop();
        outcome
    }

    /// Classifies `href` against the current session without acting on it.
    pub fn load_type_get(&self, href: &str, cause: NavigationCause) -> NavigationResult<NavigationRequest> {
        let url = self.resolve(href)?;
        Ok(self.classify_url(url, cause))
    }

    /// The slot a document for `url` would land in.
    pub fn load_doc_get(&self, url: &ShellUrl) -> SlotId {
        select_slot(url, self.session.slots(), &self.rules)
    }

    /// `popstate` listener. The load runs on the next tick.
    pub fn on_pop_state(&mut self) {
        self.history.on_pop_state(&mut self.tasks);
    }

    /// Runs the tasks queued before this tick. Returns how many ran.
    pub fn tick(&mut self) -> usize {
        let tasks = self.tasks.take_tick();
        let count = tasks.len();
        for task in tasks {
            self.run_task(task);
        }
        count
    }

    /// Ticks until the queue is empty, with an upper bound on ticks.
    pub fn run_until_idle(&mut self) -> usize {
        let mut ticks = 0;
        while !self.tasks.is_empty() && ticks < MAX_IDLE_TICKS {
            self.tick();
            ticks += 1;
        }
        if !self.tasks.is_empty() {
            warn!(pending = self.tasks.len(), ticks, "task queue still busy, yielding");
        }
        ticks
    }

    /// GET forms become SPA navigations to the encoded action URL.
    pub fn route_form_submit(&mut self, form: &FormSubmission) -> FormRoute {
        if !form.is_get() {
            return FormRoute::Native;
        }

        let href = match self.resolve(&form.action) {
            Ok(action) => action
                .with_fragment(None)
                .with_query_pairs(&form.fields)
                .as_str()
                .to_owned(),
            Err(_) => form.action.clone(),
        };
        FormRoute::Spa(self.load(&href))
    }

    /// Warms the cache for a likely next page.
    pub fn prefetch(&self, href: &str) -> NavigationResult<()> {
        let url = self.resolve(href)?;
        self.source.prefetch(&FetchRequest {
            url: url.without_fragment(),
            timeout: self.config.fetch_timeout(),
        })
    }

    fn run_task(&mut self, task: ShellTask) {
        match task {
            ShellTask::PopState => {
                let href = self.platform.location_href();
                self.history.begin_pop(&href, &mut self.platform);
                let outcome = self.load_with_cause(&href, NavigationCause::HistoryPop);
                debug!(href = %href, ?outcome, "history pop handled");
            }
            ShellTask::RestoreScroll { href } => {
                if !self.history.restore_scroll(&href, &mut self.platform) {
                    debug!(href = %href, "no scroll offset stored");
                }
            }
            ShellTask::Navigate { href } => {
                let outcome = self.load_with_cause(&href, NavigationCause::Programmatic);
                debug!(href = %href, ?outcome, "deferred navigation handled");
            }
        }
    }

    fn run_once(&mut self, href: &str, cause: NavigationCause) -> NavigationResult<LoadOutcome> {
        self.transition(NavState::Classifying);
        let mut url = self.resolve(href)?;

        let mut interaction = None;
        if self.session.is_first_load() {
            if let Some(value) = url.query_param(&self.config.interaction_param) {
                url = url.without_query_param(&self.config.interaction_param);
                interaction = Some(value);
            }
        }

        let request = self.classify_url(url, cause);
        debug!(href = %request.url, kind = ?request.kind, cause = ?cause, "navigation classified");

        match request.kind {
            NavigationKind::CrossDomain => Ok(self.leave_shell(request.url.as_str().to_owned())),
            NavigationKind::NotHandled => {
                let target = self.with_reload_marker(&request.url);
                Ok(self.leave_shell(target))
            }
            NavigationKind::SameUrlNoop => Err(NavigationError::SameUrlNoop {
                url: request.url.as_str().to_owned(),
            }),
            NavigationKind::AnchorOnCurrentPage => Ok(self.scroll_to_anchor(&request)),
            NavigationKind::AlreadyOpenElsewhere(slot) => self.switch_to(slot, &request, interaction),
            NavigationKind::NormalPage => self.navigate(&request, interaction),
        }
    }

    fn resolve(&self, href: &str) -> NavigationResult<ShellUrl> {
        let resolved = match ShellUrl::parse(&self.platform.location_href()) {
            Ok(base) => ShellUrl::resolve(&base, href),
            Err(_) => ShellUrl::parse(href),
        };
        resolved.map_err(|error| NavigationError::InvalidUrl {
            input: href.to_owned(),
            reason: error.message,
        })
    }

    fn classify_url(&self, url: ShellUrl, cause: NavigationCause) -> NavigationRequest {
        let location = ShellUrl::parse(&self.platform.location_href()).ok();
        let view = RouteView {
            location: location.as_ref(),
            displayed: self.session.current_url(),
            first_load: self.session.is_first_load(),
            active: self.session.active(),
            slots: self.session.slots(),
        };
        let kind = classify(&url, cause, &view, &self.rules);
        NavigationRequest { url, kind, cause }
    }

    fn navigate(&mut self, request: &NavigationRequest, interaction: Option<String>) -> NavigationResult<LoadOutcome> {
        self.transition(NavState::Fetching);
        let FetchedDocument { url, mut document } = self.fetch(&request.url)?;

        self.leave_current();

        self.transition(NavState::Transforming);
        let hydrated = self.persistence.hydrate(&mut document);
        let context = RenderContext {
            url: &url,
            search_term: url.query_param(&self.config.search_param),
            sku_override: url.query_param(&self.config.sku_param),
            first_load: self.session.is_first_load(),
        };
        self.hooks
            .before_render(&mut document, &context)
            .map_err(|error| NavigationError::hook("before_render", error.to_string()))?;
        debug!(href = %url, hydrated, "document transformed");

        self.transition(NavState::Attaching);
        let target = self.load_doc_get(&url);
        if let Some(outgoing) = self.session.active() {
            let previous = self
                .session
                .slot(outgoing)
                .handle()
                .and_then(|handle| self.runtime.document(handle));
            if let Some(previous) = previous {
                self.bindings.capture_outgoing(outgoing, previous, target)?;
            }
        }

        let (slot, shell) = self.session.slot_and_shell_mut(target);
        attacher::clear(slot, shell, &mut self.runtime, &mut self.platform)?;
        let handle = attacher::attach(slot, &mut self.runtime, document, &url)?;
        if let Some(incoming) = self.runtime.document_mut(handle) {
            self.bindings.merge_incoming(incoming)?;
        }

        self.settle(target, &url, request.cause, interaction)
    }

    fn fetch(&mut self, url: &ShellUrl) -> NavigationResult<FetchedDocument> {
        let request = FetchRequest {
            url: url.clone(),
            timeout: self.config.fetch_timeout(),
        };

        let mut waits = 0;
        loop {
            match self.source.fetch_document(&request) {
                Err(NavigationError::DocumentNotBuilt { url: pending })
                    if self.config.retry_pending_builds() && waits < self.config.max_build_waits =>
                {
                    waits += 1;
                    info!(href = %pending, attempt = waits, "document still building, waiting");
                    self.clock.sleep(self.config.build_wait_interval());
                }
                result => return result,
            }
        }
    }

    /// Shows a document another slot already holds.
    fn switch_to(
        &mut self,
        slot: SlotId,
        request: &NavigationRequest,
        interaction: Option<String>,
    ) -> NavigationResult<LoadOutcome> {
        self.transition(NavState::Attaching);
        self.leave_current();
        self.session.slot_mut(slot).update_href(request.url.clone());
        self.settle(slot, &request.url, request.cause, interaction)
    }

    fn scroll_to_anchor(&mut self, request: &NavigationRequest) -> LoadOutcome {
        let fragment = request.url.fragment().map(str::to_owned);
        let Some(slot) = self.session.active() else {
            return LoadOutcome::Ignored;
        };

        if let Some(current) = self.session.current_url() {
            self.history.before_leave(current.as_str(), &self.platform);
        }

        let restored = request.cause == NavigationCause::HistoryPop
            && self
                .history
                .restore_scroll(request.url.as_str(), &mut self.platform);
        if !restored {
            match &fragment {
                Some(fragment) => self.platform.scroll_to_fragment(slot, fragment),
                None => self.platform.scroll_to(0.0),
            }
        }

        if request.cause != NavigationCause::HistoryPop {
            let title = self.slot_title(slot);
            self.platform.push_state(request.url.as_str(), &title);
        }

        self.session.slot_mut(slot).update_href(request.url.clone());
        self.session.set_current_url(request.url.clone());
        self.transition(NavState::Settled);
        LoadOutcome::Anchor { fragment }
    }

    fn settle(
        &mut self,
        slot: SlotId,
        url: &ShellUrl,
        cause: NavigationCause,
        interaction: Option<String>,
    ) -> NavigationResult<LoadOutcome> {
        let handle = self.session.slot(slot).handle().ok_or_else(|| {
            ShellError::new(
                "slot.empty",
                format!("slot `{}` has no document to settle on", slot.as_str()),
            )
        })?;
        let first_load = self.session.is_first_load();
        let previous = self.platform.location_href();
        let title = self.slot_title(slot);

        self.platform.show_slot(slot);
        self.history.commit(
            &CommitInfo {
                href: url.as_str(),
                title: &title,
                first_load,
                previous_href: Some(&previous),
            },
            &mut self.platform,
        );
        self.session.settle(slot, url.clone());

        let context = PostRenderContext {
            url,
            slot,
            first_load,
            page_loads: self.session.page_loads(),
            interaction,
        };
        if let Some(document) = self.runtime.document_mut(handle) {
            let mut deferred = Deferred::new(&mut self.tasks);
            self.hooks
                .post_render(document, &context, &mut deferred)
                .map_err(|error| NavigationError::hook("post_render", error.to_string()))?;
        }

        if cause == NavigationCause::HistoryPop {
            self.tasks.push(ShellTask::RestoreScroll {
                href: url.as_str().to_owned(),
            });
        }

        self.transition(NavState::Settled);
        info!(
            href = %url,
            slot = slot.as_str(),
            page_loads = self.session.page_loads(),
            "navigation settled"
        );
        Ok(LoadOutcome::Settled {
            slot,
            href: url.as_str().to_owned(),
        })
    }

    /// Snapshots scroll and persists state of the page on screen.
    fn leave_current(&mut self) {
        let Some(current) = self.session.current_url() else {
            return;
        };
        self.history.before_leave(current.as_str(), &self.platform);

        if let Some(handle) = self.session.active_slot().and_then(DocumentSlot::handle) {
            let captured = self
                .persistence
                .persist(&self.runtime, handle, self.clock.as_ref());
            debug!(captured, "state persisted");
        }
    }

    fn slot_title(&self, slot: SlotId) -> String {
        self.session
            .slot(slot)
            .handle()
            .and_then(|handle| self.runtime.document(handle))
            .map(Document::title)
            .unwrap_or_default()
    }

    fn leave_shell(&mut self, href: String) -> LoadOutcome {
        info!(href = %href, "leaving the shell with a full page load");
        self.platform.full_reload(&href);
        self.transition(NavState::Idle);
        LoadOutcome::FullReload { href }
    }

    fn fail(&mut self, error: NavigationError, href: &str) -> LoadOutcome {
        if error.is_silent() {
            trace!(href, code = error.code(), "navigation ignored");
            self.transition(NavState::Idle);
            return LoadOutcome::Ignored;
        }

        self.transition(NavState::Failed);
        if self.bindings.discard().is_some() {
            debug!("dropped binding snapshot of failed navigation");
        }

        error!(href, code = error.code(), %error, "navigation failed, falling back to full page load");
        let target = match self.resolve(href) {
            Ok(url) => self.with_reload_marker(&url),
            Err(_) => href.to_owned(),
        };
        self.platform.full_reload(&target);
        LoadOutcome::FullReload { href: target }
    }

    fn with_reload_marker(&self, url: &ShellUrl) -> String {
        let marker = &self.config.reload_marker;
        url.with_query_param(&marker.name, &marker.value)
            .as_str()
            .to_owned()
    }

    fn transition(&mut self, next: NavState) {
        if self.state != next {
            debug!(from = self.state.as_str(), to = next.as_str(), "navigation state");
        }
        self.state = next;
    }
}
