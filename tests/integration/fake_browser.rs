//! In-memory model of the eVIEW frontend and the Microsoft sign-in pages
//!
//! `FakeSite` implements just enough of the DOM the extractor touches: the
//! SSO entry, the sign-in form, the project list, the page menu and a
//! virtualized page list that realizes a fixed window of items around the
//! scroll offset.

use async_trait::async_trait;
use eview_extractor::driver::{
    Browser, BrowserLauncher, BrowserOptions, DriverError, DriverResult, Locator,
};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const BASE_URL: &str = "https://eview.example.com/";
pub const SSO_URL: &str = "https://login.microsoftonline.com/common/oauth2/authorize";
pub const ITEM_HEIGHT: f64 = 100.0;

/// One entry of the project's page list
#[derive(Debug, Clone)]
pub struct FakePage {
    pub name: String,
    pub kind: String,
    pub rows: Vec<Vec<String>>,
    /// Clicking the item fails as if the list re-rendered under the cursor
    pub stale: bool,
    /// Clicking the item hits an overlay instead
    pub intercepted: bool,
}

impl FakePage {
    pub fn diagram(name: &str, rows: &[&[&str]]) -> Self {
        Self {
            name: name.to_string(),
            kind: "PLC-Diagram".to_string(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(|s| s.to_string()).collect())
                .collect(),
            stale: false,
            intercepted: false,
        }
    }

    pub fn cover(name: &str) -> Self {
        Self {
            name: name.to_string(),
            kind: "Cover sheet".to_string(),
            rows: Vec::new(),
            stale: false,
            intercepted: false,
        }
    }

    fn markup(&self) -> String {
        let mut html =
            String::from(r#"<div class="ev-svg-cad-content" id="page"><svg>"#);
        for row in &self.rows {
            html.push_str("<g>");
            for node in row {
                html.push_str(&format!("<text>{}</text>", node));
            }
            html.push_str("</g>");
        }
        html.push_str("</svg></div>");
        html
    }
}

/// `n` diagram pages with two addresses each
pub fn numbered_diagrams(n: usize) -> Vec<FakePage> {
    (0..n)
        .map(|i| {
            let input = format!("I{}.0", i);
            let output = format!("Q{}.1", i);
            let input_name = format!("Input_{}", i);
            let output_name = format!("Output_{}", i);
            FakePage::diagram(
                &format!("=CAB1+PLC/{}", i + 1),
                &[
                    &["=+A1-K1", input.as_str(), input_name.as_str()],
                    &[output.as_str(), ":13", output_name.as_str()],
                    &["Title block", "Sheet"],
                ],
            )
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SignIn {
    Email,
    Password,
    StaySignedIn,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Blank,
    Landing,
    SignIn(SignIn),
    ProjectList { selected: bool },
    Project { menu_open: bool, list_view: bool },
}

type Hook = Arc<dyn Fn(usize) + Send + Sync>;
type Action = Arc<dyn Fn() + Send + Sync>;

struct SiteState {
    project_id: String,
    pages: Vec<FakePage>,
    window: usize,
    password_field: bool,
    sso_button: bool,
    stay_prompt: bool,
    open_button: bool,
    page_menu: bool,
    final_url: Option<String>,

    phase: Phase,
    url: String,
    scroll_top: f64,
    selected_page: Option<usize>,

    typed: Vec<String>,
    detail_reads: usize,
    launches: usize,
    failing_launches: usize,
    launch_delay: Duration,
    quits: usize,
    dropped: usize,
    on_detail_read: Option<Hook>,
    on_open: Option<Action>,
    stall_open: Option<Duration>,
}

impl SiteState {
    fn max_scroll(&self) -> f64 {
        self.pages.len().saturating_sub(self.window) as f64 * ITEM_HEIGHT
    }

    fn realized(&self) -> std::ops::Range<usize> {
        let first = (self.scroll_top / ITEM_HEIGHT).floor() as usize;
        let last = (first + self.window).min(self.pages.len());
        first.min(last)..last
    }

    fn submit(&mut self) {
        let Phase::SignIn(step) = self.phase else {
            return;
        };
        match step {
            SignIn::Email if self.password_field => self.phase = Phase::SignIn(SignIn::Password),
            SignIn::Email | SignIn::Password if self.stay_prompt => {
                self.phase = Phase::SignIn(SignIn::StaySignedIn)
            }
            SignIn::Email | SignIn::Password => self.land(),
            SignIn::StaySignedIn => {}
        }
    }

    /// Leaves the sign-in pages for the project list
    fn land(&mut self) {
        self.phase = Phase::ProjectList { selected: false };
        self.url = self
            .final_url
            .clone()
            .unwrap_or_else(|| format!("{}projects", BASE_URL));
    }
}

/// Shared handle to the modelled site; clones see the same state
#[derive(Clone)]
pub struct FakeSite {
    state: Arc<Mutex<SiteState>>,
}

impl FakeSite {
    pub fn new(project_id: &str, pages: Vec<FakePage>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SiteState {
                project_id: project_id.to_string(),
                pages,
                window: 4,
                password_field: true,
                sso_button: true,
                stay_prompt: true,
                open_button: true,
                page_menu: true,
                final_url: None,
                phase: Phase::Blank,
                url: "about:blank".to_string(),
                scroll_top: 0.0,
                selected_page: None,
                typed: Vec::new(),
                detail_reads: 0,
                launches: 0,
                failing_launches: 0,
                launch_delay: Duration::ZERO,
                quits: 0,
                dropped: 0,
                on_detail_read: None,
                on_open: None,
                stall_open: None,
            })),
        }
    }

    fn with_state<T>(&self, f: impl FnOnce(&mut SiteState) -> T) -> T {
        let mut state = self.state.lock().unwrap();
        f(&mut state)
    }

    pub fn without_password_field(self) -> Self {
        self.with_state(|s| s.password_field = false);
        self
    }

    pub fn without_sso_button(self) -> Self {
        self.with_state(|s| s.sso_button = false);
        self
    }

    pub fn without_stay_prompt(self) -> Self {
        self.with_state(|s| s.stay_prompt = false);
        self
    }

    pub fn without_open_button(self) -> Self {
        self.with_state(|s| s.open_button = false);
        self
    }

    /// The opened project already shows its page list and has no page menu
    pub fn without_page_menu(self) -> Self {
        self.with_state(|s| s.page_menu = false);
        self
    }

    /// URL the browser lands on after signing in
    pub fn final_url(self, url: &str) -> Self {
        self.with_state(|s| s.final_url = Some(url.to_string()));
        self
    }

    /// Calls `hook` when the project's Open button is clicked
    pub fn on_open(self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.with_state(|s| s.on_open = Some(Arc::new(hook)));
        self
    }

    /// The first Open click of the site hangs for `delay`
    pub fn stall_once_on_open(self, delay: Duration) -> Self {
        self.with_state(|s| s.stall_open = Some(delay));
        self
    }

    pub fn failing_launches(self, count: usize) -> Self {
        self.with_state(|s| s.failing_launches = count);
        self
    }

    pub fn launch_delay(self, delay: Duration) -> Self {
        self.with_state(|s| s.launch_delay = delay);
        self
    }

    /// Calls `hook` with the running count after every diagram read
    pub fn on_detail_read(self, hook: impl Fn(usize) + Send + Sync + 'static) -> Self {
        self.with_state(|s| s.on_detail_read = Some(Arc::new(hook)));
        self
    }

    pub fn mark_stale(&self, index: usize) {
        self.with_state(|s| s.pages[index].stale = true);
    }

    pub fn intercept(&self, index: usize) {
        self.with_state(|s| s.pages[index].intercepted = true);
    }

    pub fn detail_reads(&self) -> usize {
        self.with_state(|s| s.detail_reads)
    }

    pub fn launches(&self) -> usize {
        self.with_state(|s| s.launches)
    }

    pub fn quits(&self) -> usize {
        self.with_state(|s| s.quits)
    }

    /// Browsers dropped so far, whether or not they were quit first
    pub fn dropped_browsers(&self) -> usize {
        self.with_state(|s| s.dropped)
    }

    pub fn typed(&self) -> Vec<String> {
        self.with_state(|s| s.typed.clone())
    }

    pub fn launcher(&self) -> FakeLauncher {
        FakeLauncher { site: self.clone() }
    }
}

/// Element handles of the modelled DOM
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FakeElement {
    SsoButton,
    EmailInput,
    PasswordInput,
    SubmitButton,
    StayButton,
    ProjectCell,
    OpenButton,
    MenuButton,
    ListViewItem,
    ScrollContainer,
    PageItem(usize),
    PageLabel(usize),
    DiagramBody,
}

pub struct FakeLauncher {
    site: FakeSite,
}

#[async_trait]
impl BrowserLauncher for FakeLauncher {
    type Browser = FakeBrowser;

    async fn launch(&self, _options: &BrowserOptions) -> DriverResult<FakeBrowser> {
        let delay = self.site.with_state(|s| s.launch_delay);
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        self.site.with_state(|s| {
            s.launches += 1;
            if s.launches <= s.failing_launches {
                return Err(DriverError::Launch("chrome exited early".to_string()));
            }
            s.phase = Phase::Blank;
            s.url = "about:blank".to_string();
            s.scroll_top = 0.0;
            s.selected_page = None;
            Ok(())
        })?;

        Ok(FakeBrowser {
            site: self.site.clone(),
        })
    }
}

pub struct FakeBrowser {
    site: FakeSite,
}

#[async_trait]
impl Browser for FakeBrowser {
    type Element = FakeElement;

    async fn goto(&self, url: &str) -> DriverResult<()> {
        self.site.with_state(|s| {
            s.url = url.to_string();
            s.phase = Phase::Landing;
        });
        Ok(())
    }

    async fn current_url(&self) -> DriverResult<String> {
        Ok(self.site.with_state(|s| s.url.clone()))
    }

    async fn find_all(&self, locator: &Locator) -> DriverResult<Vec<FakeElement>> {
        Ok(self.site.with_state(|s| match locator {
            Locator::XPath(expr) => {
                if expr == eview_extractor::navigation::SSO_BUTTON_XPATH {
                    if s.phase == Phase::Landing && s.sso_button {
                        vec![FakeElement::SsoButton]
                    } else {
                        vec![]
                    }
                } else if matches!(s.phase, Phase::ProjectList { .. })
                    && expr.contains(&format!("'{}'", s.project_id))
                {
                    vec![FakeElement::ProjectCell]
                } else {
                    vec![]
                }
            }
            Locator::Css(selector) => match (selector.as_str(), s.phase) {
                ("input[type='email']", Phase::SignIn(SignIn::Email)) => {
                    vec![FakeElement::EmailInput]
                }
                ("input[type='password']", Phase::SignIn(SignIn::Password)) => {
                    vec![FakeElement::PasswordInput]
                }
                ("input[type='submit']", Phase::SignIn(SignIn::Email | SignIn::Password)) => {
                    vec![FakeElement::SubmitButton]
                }
                ("input[value='Yes']", Phase::SignIn(SignIn::StaySignedIn)) => {
                    vec![FakeElement::StayButton]
                }
                ("button", Phase::ProjectList { selected: true }) if s.open_button => {
                    vec![FakeElement::OpenButton]
                }
                ("eplan-icon-button", Phase::Project { .. }) if s.page_menu => {
                    vec![FakeElement::MenuButton]
                }
                ("eplan-dropdown-item", Phase::Project { menu_open: true, .. }) => {
                    vec![FakeElement::ListViewItem]
                }
                ("cdk-virtual-scroll-viewport", Phase::Project { list_view: true, .. }) => {
                    vec![FakeElement::ScrollContainer]
                }
                ("pv-page-list-item", Phase::Project { list_view: true, .. }) => {
                    s.realized().map(FakeElement::PageItem).collect()
                }
                (".ev-svg-cad-content", Phase::Project { .. }) if s.selected_page.is_some() => {
                    vec![FakeElement::DiagramBody]
                }
                _ => vec![],
            },
        }))
    }

    async fn find_children(&self, parent: &FakeElement, css: &str) -> DriverResult<Vec<FakeElement>> {
        match (parent, css) {
            (FakeElement::PageItem(index), "div") => Ok(vec![FakeElement::PageLabel(*index)]),
            _ => Ok(vec![]),
        }
    }

    async fn is_displayed(&self, _element: &FakeElement) -> DriverResult<bool> {
        Ok(true)
    }

    async fn is_enabled(&self, _element: &FakeElement) -> DriverResult<bool> {
        Ok(true)
    }

    async fn click(&self, element: &FakeElement) -> DriverResult<()> {
        if *element == FakeElement::OpenButton {
            let (stall, hook) = self
                .site
                .with_state(|s| (s.stall_open.take(), s.on_open.clone()));
            if let Some(delay) = stall {
                tokio::time::sleep(delay).await;
            }
            if let Some(hook) = hook {
                hook();
            }
        }

        self.site.with_state(|s| {
            match *element {
                FakeElement::SsoButton => {
                    s.phase = Phase::SignIn(SignIn::Email);
                    s.url = SSO_URL.to_string();
                }
                FakeElement::SubmitButton => s.submit(),
                FakeElement::StayButton => s.land(),
                FakeElement::ProjectCell => s.phase = Phase::ProjectList { selected: true },
                FakeElement::OpenButton => {
                    s.phase = Phase::Project {
                        menu_open: false,
                        list_view: !s.page_menu,
                    }
                }
                FakeElement::MenuButton => {
                    if let Phase::Project { list_view, .. } = s.phase {
                        s.phase = Phase::Project {
                            menu_open: true,
                            list_view,
                        };
                    }
                }
                FakeElement::ListViewItem => {
                    s.phase = Phase::Project {
                        menu_open: false,
                        list_view: true,
                    }
                }
                FakeElement::PageItem(index) => {
                    if s.pages[index].stale {
                        return Err(DriverError::StaleElement);
                    }
                    if s.pages[index].intercepted {
                        return Err(DriverError::ClickIntercepted(
                            "element is covered by a toast".to_string(),
                        ));
                    }
                    s.selected_page = Some(index);
                }
                _ => {}
            }
            Ok(())
        })
    }

    async fn script_click(&self, element: &FakeElement) -> DriverResult<()> {
        self.click(element).await
    }

    async fn text(&self, element: &FakeElement) -> DriverResult<String> {
        Ok(self.site.with_state(|s| match *element {
            FakeElement::PageLabel(index) => s.pages[index].kind.clone(),
            FakeElement::OpenButton => "Open".to_string(),
            FakeElement::SsoButton => "Sign in with Microsoft".to_string(),
            _ => String::new(),
        }))
    }

    async fn attribute(&self, element: &FakeElement, name: &str) -> DriverResult<Option<String>> {
        Ok(self.site.with_state(|s| match (*element, name) {
            (FakeElement::PageItem(index), "data-name") => Some(s.pages[index].name.clone()),
            (FakeElement::MenuButton, "data-t") => Some("ev-btn-page-more".to_string()),
            (FakeElement::MenuButton, "class") => match s.phase {
                Phase::Project { menu_open: true, .. } => Some("fl-pop-up-open".to_string()),
                _ => Some(String::new()),
            },
            (FakeElement::ListViewItem, "data-name") => Some("ev-page-list-view-btn".to_string()),
            _ => None,
        }))
    }

    async fn clear_and_type(&self, _element: &FakeElement, text: &str) -> DriverResult<()> {
        self.site.with_state(|s| s.typed.push(text.to_string()));
        Ok(())
    }

    async fn press_enter(&self, _element: &FakeElement) -> DriverResult<()> {
        self.site.with_state(|s| s.submit());
        Ok(())
    }

    async fn outer_html(&self, element: &FakeElement) -> DriverResult<String> {
        let (html, reads, hook) = self.site.with_state(|s| match (*element, s.selected_page) {
            (FakeElement::DiagramBody, Some(index)) => {
                s.detail_reads += 1;
                (
                    s.pages[index].markup(),
                    s.detail_reads,
                    s.on_detail_read.clone(),
                )
            }
            _ => (String::new(), s.detail_reads, None),
        });

        if let Some(hook) = hook {
            hook(reads);
        }
        Ok(html)
    }

    async fn set_scroll_top(&self, _element: &FakeElement, offset: f64) -> DriverResult<()> {
        self.site
            .with_state(|s| s.scroll_top = offset.clamp(0.0, s.max_scroll()));
        Ok(())
    }

    async fn scroll_by(&self, _element: &FakeElement, delta: f64) -> DriverResult<()> {
        self.site
            .with_state(|s| s.scroll_top = (s.scroll_top + delta).clamp(0.0, s.max_scroll()));
        Ok(())
    }

    async fn scroll_top(&self, _element: &FakeElement) -> DriverResult<f64> {
        Ok(self.site.with_state(|s| s.scroll_top))
    }

    async fn quit(&mut self) -> DriverResult<()> {
        self.site.with_state(|s| s.quits += 1);
        Ok(())
    }
}

impl Drop for FakeBrowser {
    fn drop(&mut self) {
        self.site.with_state(|s| s.dropped += 1);
    }
}
