//! [`TimesheetPage`] over the Chrome DevTools Protocol.
//!
//! All DOM work happens in small evaluated scripts. Arguments are embedded
//! as JSON literals, and every script returns a non-null value so results
//! always deserialize.

use async_trait::async_trait;
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::cdp::js_protocol::runtime::EvaluateParams;
use chromiumoxide::page::{Page, ScreenshotParams};
use futures::StreamExt;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio::time::{Instant, sleep};
use tracing::{debug, info, warn};

use crate::error::PageError;
use crate::helpers::template::ProjectData;
use crate::helpers::week::parse_week_display;
use crate::models::{WeekId, Weekday};
use crate::page::{FieldHandle, Locator, PageResult, RowHandle, TimesheetPage, selectors};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// How the Chromium process is launched.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserOptions {
    /// Manual login needs a visible window, so this defaults to off.
    pub headless: bool,
    pub executable: Option<PathBuf>,
    pub sandbox: bool,
    pub window_width: u32,
    pub window_height: u32,
}

impl Default for BrowserOptions {
    fn default() -> Self {
        Self {
            headless: false,
            executable: None,
            sandbox: true,
            window_width: 1400,
            window_height: 900,
        }
    }
}

pub struct ChromiumPage {
    browser: Browser,
    page: Page,
    handler: JoinHandle<()>,
    closed: bool,
}

impl ChromiumPage {
    /// Launch Chromium and open a blank page.
    pub async fn launch(options: &BrowserOptions, page_load_timeout: Duration) -> PageResult<Self> {
        info!(
            "Launching Chromium ({})",
            if options.headless { "headless" } else { "headed" }
        );

        let mut builder = BrowserConfig::builder()
            .request_timeout(page_load_timeout)
            .window_size(options.window_width, options.window_height);
        if !options.headless {
            builder = builder.with_head();
        }
        if !options.sandbox {
            builder = builder.no_sandbox();
        }
        if let Some(ref path) = options.executable {
            builder = builder.chrome_executable(path);
        }

        let config = builder.build().map_err(PageError::Browser)?;
        let (browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| PageError::Browser(e.to_string()))?;

        let handler = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("CDP handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = browser
            .new_page("about:blank")
            .await
            .map_err(|e| PageError::Browser(e.to_string()))?;

        Ok(Self {
            browser,
            page,
            handler,
            closed: false,
        })
    }

    async fn eval<T: DeserializeOwned>(&mut self, script: String) -> PageResult<T> {
        if self.closed {
            return Err(PageError::Closed);
        }

        let params = EvaluateParams::builder()
            .expression(script)
            .return_by_value(true)
            .await_promise(true)
            .build()
            .map_err(PageError::Script)?;

        self.page
            .evaluate_expression(params)
            .await
            .map_err(|e| PageError::Script(e.to_string()))?
            .into_value()
            .map_err(|e| PageError::Script(e.to_string()))
    }

    async fn probe(&mut self, locator: &Locator) -> PageResult<bool> {
        self.eval(format!(
            "(() => {{ const el = {}; return el !== null; }})()",
            find_expr(locator)
        ))
        .await
    }
}

/// JSON literal for embedding a value in a script.
fn js<T: Serialize + ?Sized>(value: &T) -> String {
    serde_json::to_string(value).unwrap_or_else(|_| "null".to_string())
}

/// Expression yielding the first visible element matching `locator`, or null.
fn find_expr(locator: &Locator) -> String {
    format!(
        "(Array.from(document.querySelectorAll({css})).find(el => \
            el.getClientRects().length > 0 && \
            ({text} === null || (el.textContent || '').includes({text}))) || null)",
        css = js(&locator.css),
        text = js(&locator.text),
    )
}

/// The row is found again by project key on every use, exact match first.
fn row_expr(row: &RowHandle) -> String {
    format!(
        "((key) => {{ \
            const rows = Array.from(document.querySelectorAll({rows})); \
            const cell = r => (r.querySelector({cell})?.textContent || '').trim(); \
            return rows.find(r => cell(r) === key) \
                || rows.find(r => cell(r).includes(key)) || null; \
        }})({key})",
        rows = js(selectors::PROJECT_ROWS),
        cell = js(selectors::PROJECT_CELL),
        key = js(&row.project_number),
    )
}

/// A poll result where a failed evaluation counts as "not yet".
///
/// While a click replaces the document, `Runtime.evaluate` fails against the
/// torn-down context. Only a closed page ends the wait early.
fn still_loading(result: PageResult<bool>) -> PageResult<bool> {
    match result {
        Err(PageError::Script(e) | PageError::Browser(e)) => {
            debug!("Evaluation failed while polling: {}", e);
            Ok(false)
        }
        other => other,
    }
}

fn field_expr(field: &FieldHandle) -> String {
    format!(
        "({row}?.querySelector({input}) ?? null)",
        row = row_expr(&field.row),
        input = js(&selectors::day_input(field.weekday)),
    )
}

/// Script setting an input through the native setter so Angular sees it.
fn set_value_script(field: &FieldHandle, value: &str) -> String {
    format!(
        "(() => {{ \
            const el = {field}; \
            if (el === null) return false; \
            const setter = Object \
                .getOwnPropertyDescriptor(HTMLInputElement.prototype, 'value').set; \
            el.focus(); \
            setter.call(el, {value}); \
            el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
            el.dispatchEvent(new Event('change', {{ bubbles: true }})); \
            el.blur(); \
            return true; \
        }})()",
        field = field_expr(field),
        value = js(value),
    )
}

#[derive(Debug, Deserialize)]
struct ValueProbe {
    found: bool,
    value: String,
}

#[async_trait]
impl TimesheetPage for ChromiumPage {
    async fn navigate(&mut self, url: &str) -> PageResult<()> {
        info!("Navigating to {}", url);
        self.page
            .goto(url)
            .await
            .map_err(|e| PageError::Browser(e.to_string()))?;
        Ok(())
    }

    async fn wait_for_visible(&mut self, locator: &Locator, timeout: Duration) -> PageResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            if still_loading(self.probe(locator).await)? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                debug!("{} not visible after {:?}", locator, timeout);
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn detect_current_week(&mut self) -> PageResult<WeekId> {
        let texts: Vec<String> = self
            .eval(format!(
                "Array.from(document.querySelectorAll({})) \
                    .map(el => (el.textContent || '').trim().slice(0, 200))",
                js(selectors::WEEK_DISPLAY)
            ))
            .await?;

        let mut last_error = None;
        for text in texts.iter().filter(|t| !t.is_empty()) {
            match parse_week_display(text) {
                Ok(week) => {
                    debug!("Week display '{}' -> {}", text, week);
                    return Ok(week);
                }
                Err(e) => last_error = Some(e),
            }
        }

        match last_error {
            Some(e) => Err(PageError::WeekDisplay(e)),
            None => Err(PageError::WeekDisplayMissing),
        }
    }

    async fn locate_row(&mut self, project_number: &str) -> PageResult<Option<RowHandle>> {
        let index: i64 = self
            .eval(format!(
                "(() => {{ \
                    const key = {key}; \
                    const rows = Array.from(document.querySelectorAll({rows})); \
                    const cell = row => (row.querySelector({cell})?.textContent || '').trim(); \
                    let i = rows.findIndex(row => cell(row) === key); \
                    if (i < 0) i = rows.findIndex(row => cell(row).includes(key)); \
                    return i; \
                }})()",
                key = js(project_number),
                rows = js(selectors::PROJECT_ROWS),
                cell = js(selectors::PROJECT_CELL),
            ))
            .await?;

        Ok(usize::try_from(index).ok().map(|id| RowHandle {
            id,
            project_number: project_number.to_string(),
        }))
    }

    async fn locate_field(
        &mut self,
        row: &RowHandle,
        weekday: Weekday,
    ) -> PageResult<Option<FieldHandle>> {
        let field = FieldHandle {
            row: row.clone(),
            weekday,
        };
        let present: bool = self
            .eval(format!("({} !== null)", field_expr(&field)))
            .await?;
        Ok(present.then_some(field))
    }

    async fn read_value(&mut self, field: &FieldHandle) -> PageResult<String> {
        let probe: ValueProbe = self
            .eval(format!(
                "(() => {{ const el = {}; \
                    return {{ found: el !== null, \
                        value: el ? String(el.value ?? '') : '' }}; }})()",
                field_expr(field)
            ))
            .await?;

        if !probe.found {
            return Err(PageError::Script(format!(
                "{} input for {} is gone",
                field.weekday, field.row.project_number
            )));
        }
        Ok(probe.value)
    }

    async fn clear(&mut self, field: &FieldHandle) -> PageResult<()> {
        self.write_value(field, "").await
    }

    async fn write_value(&mut self, field: &FieldHandle, text: &str) -> PageResult<()> {
        let written: bool = self.eval(set_value_script(field, text)).await?;
        if written {
            Ok(())
        } else {
            Err(PageError::Script(format!(
                "{} input for {} is gone",
                field.weekday, field.row.project_number
            )))
        }
    }

    async fn click(&mut self, locator: &Locator) -> PageResult<bool> {
        let clicked: bool = self
            .eval(format!(
                "(() => {{ \
                    const el = {find}; \
                    if (el === null) return false; \
                    window.__tmsStamp = true; \
                    window.__tmsMutated = false; \
                    if (window.__tmsObserver) window.__tmsObserver.disconnect(); \
                    window.__tmsObserver = \
                        new MutationObserver(() => {{ window.__tmsMutated = true; }}); \
                    window.__tmsObserver.observe( \
                        document.body, {{ childList: true, subtree: true, characterData: true }}); \
                    el.click(); \
                    return true; \
                }})()",
                find = find_expr(locator),
            ))
            .await?;

        debug!("click {} -> {}", locator, clicked);
        Ok(clicked)
    }

    async fn wait_for_transition(&mut self, timeout: Duration) -> PageResult<bool> {
        let deadline = Instant::now() + timeout;
        loop {
            // A replaced document drops the stamp; an SPA update trips the observer.
            let settled = self
                .eval(
                    "((window.__tmsStamp !== true || window.__tmsMutated === true) \
                        && document.readyState === 'complete')"
                        .to_string(),
                )
                .await;
            if still_loading(settled)? {
                return Ok(true);
            }
            if Instant::now() >= deadline {
                return Ok(false);
            }
            sleep(POLL_INTERVAL).await;
        }
    }

    async fn list_projects(&mut self) -> PageResult<Vec<ProjectData>> {
        let projects: Vec<ProjectData> = self
            .eval(format!(
                "Array.from(document.querySelectorAll({rows})).map(row => {{ \
                    const text = sel => (row.querySelector(sel)?.textContent || '').trim(); \
                    return {{ project_number: text({number}), \
                        project_name: text({name}), project_task: text({task}) }}; \
                }}).filter(p => p.project_number.length > 0)",
                rows = js(selectors::PROJECT_ROWS),
                number = js(selectors::PROJECT_CELL),
                name = js(selectors::NAME_CELL),
                task = js(selectors::TASK_CELL),
            ))
            .await?;

        info!("Found {} project row(s) on the page", projects.len());
        Ok(projects)
    }

    async fn screenshot(&mut self, path: &Path) -> PageResult<()> {
        if self.closed {
            return Err(PageError::Closed);
        }

        let png = self
            .page
            .screenshot(ScreenshotParams::builder().full_page(true).build())
            .await
            .map_err(|e| PageError::Browser(e.to_string()))?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(path, png).await?;

        info!("Saved screenshot to {}", path.display());
        Ok(())
    }

    async fn close(&mut self) -> PageResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;

        info!("Closing browser");
        if let Err(e) = self.browser.close().await {
            warn!("Browser did not close cleanly: {}", e);
        }
        if let Err(e) = self.browser.wait().await {
            warn!("Failed to reap browser process: {}", e);
        }
        self.handler.abort();
        Ok(())
    }
}
