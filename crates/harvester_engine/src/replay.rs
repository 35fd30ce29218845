//! An in-memory portal that implements [`UiDriver`].
//!
//! The replay driver renders a virtualized activity feed from a
//! [`PortalFixture`], serves detail and download pages, packs batch downloads
//! into zip archives and answers the transfer compose surface. It backs the
//! CLI's offline mode and the engine's integration tests.
use std::collections::{BTreeSet, VecDeque};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::Instant;

use crate::driver::{
    ClickModifiers, DriverError, DriverEvent, ElementHandle, EventKind, FileChooser,
    PendingDownload, UiDriver,
};
use crate::PortalSelectors;

const REPLAY_TICK: Duration = Duration::from_millis(2);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureFile {
    pub name: String,
    pub content: String,
}

impl Default for FixtureFile {
    fn default() -> Self {
        Self {
            name: "file.xlsx".to_string(),
            content: String::new(),
        }
    }
}

impl FixtureFile {
    pub fn new(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            content: content.into(),
        }
    }
}

/// One activity in the replayed feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct FixtureItem {
    pub title: String,
    pub subtext: String,
    /// Label shown on the feed row.
    pub row_time: String,
    /// Text of the detail view's timestamp element.
    pub timestamp: String,
    /// Whether the detail view shows an interstitial first.
    pub gate: bool,
    pub files: Vec<FixtureFile>,
    /// Serve the selection as this archive even when only one file is selected.
    pub archive_name: Option<String>,
    /// Never start the download.
    pub stall_download: bool,
    /// Serve garbage under an archive name.
    pub corrupt_archive: bool,
    /// The detail view never renders its timestamp.
    pub broken_detail: bool,
    /// The download page lacks the batch download button.
    pub no_download_button: bool,
}

impl FixtureItem {
    pub fn new(title: &str, subtext: &str, timestamp: &str) -> Self {
        Self {
            title: title.to_string(),
            subtext: subtext.to_string(),
            row_time: "recently".to_string(),
            timestamp: timestamp.to_string(),
            ..Self::default()
        }
    }

    pub fn with_files(mut self, files: Vec<FixtureFile>) -> Self {
        self.files = files;
        self
    }
}

/// Everything the replayed portal knows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PortalFixture {
    pub username: String,
    pub password: String,
    pub login_error: String,
    pub items: Vec<FixtureItem>,
    /// Rows rendered at once.
    pub window: usize,
    pub row_height_px: i64,
    /// Feed visibility checks that report hidden before the feed shows.
    pub hidden_reads: u32,
    /// The feed never becomes visible.
    pub feed_hidden: bool,
    /// Final status text of a sent transfer. `None` hides the indicator.
    pub transfer_status: Option<String>,
    /// Text of the first error indicator after a send.
    pub transfer_error: Option<String>,
    /// Status reads that show an in-progress label first.
    pub status_pending_reads: u32,
    pub chooser_multiple: bool,
    /// Sign in is accepted but the feed never loads.
    pub stall_sign_in: bool,
}

impl Default for PortalFixture {
    fn default() -> Self {
        Self {
            username: "ops@example.com".to_string(),
            password: "secret".to_string(),
            login_error: "Incorrect email or password".to_string(),
            items: Vec::new(),
            window: 4,
            row_height_px: 100,
            hidden_reads: 0,
            feed_hidden: false,
            transfer_status: Some("Transfer completed".to_string()),
            transfer_error: None,
            status_pending_reads: 1,
            chooser_multiple: true,
            stall_sign_in: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Page {
    Blank,
    Login,
    Feed,
    Detail { item: usize, gate_open: bool },
    Downloads { item: usize },
    Compose,
}

#[derive(Debug)]
struct ReplayState {
    page: Page,
    url: String,
    base_url: String,
    password_step: bool,
    typed_username: String,
    typed_password: String,
    login_failed: bool,
    signed_in: bool,
    scroll_px: i64,
    hidden_reads_left: u32,
    selected: BTreeSet<usize>,
    events: VecDeque<DriverEvent>,
    downloads: Vec<(String, Vec<u8>)>,
    opened: Vec<String>,
    screenshots: Vec<PathBuf>,
    sent_files: Vec<PathBuf>,
    recipient: Option<String>,
    transfer_sent: bool,
    status_reads: u32,
    closed: bool,
}

/// Role of an element handle, recovered from its id.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Role {
    Username,
    Continue,
    Password,
    SignIn,
    LoginError,
    Feed,
    Row(usize),
    RowTitle(usize),
    RowSubtext(usize),
    RowTime(usize),
    Gate,
    Stamp,
    OpenDownloads,
    FileList,
    File(usize),
    FileName(usize),
    DownloadSelected,
    Compose,
    AddFiles,
    Recipient,
    Send,
    Status,
    ErrorText,
}

impl Role {
    fn handle(self) -> ElementHandle {
        let id = match self {
            Role::Row(i) => format!("row:{i}"),
            Role::RowTitle(i) => format!("row:{i}:title"),
            Role::RowSubtext(i) => format!("row:{i}:subtext"),
            Role::RowTime(i) => format!("row:{i}:time"),
            Role::File(i) => format!("file:{i}"),
            Role::FileName(i) => format!("file:{i}:name"),
            other => format!("{other:?}").to_lowercase(),
        };
        ElementHandle::new(id)
    }

    fn parse(handle: &ElementHandle) -> Option<Role> {
        let parts: Vec<&str> = handle.id().split(':').collect();
        match parts.as_slice() {
            ["row", i] => i.parse().ok().map(Role::Row),
            ["row", i, "title"] => i.parse().ok().map(Role::RowTitle),
            ["row", i, "subtext"] => i.parse().ok().map(Role::RowSubtext),
            ["row", i, "time"] => i.parse().ok().map(Role::RowTime),
            ["file", i] => i.parse().ok().map(Role::File),
            ["file", i, "name"] => i.parse().ok().map(Role::FileName),
            [single] => [
                Role::Username,
                Role::Continue,
                Role::Password,
                Role::SignIn,
                Role::LoginError,
                Role::Feed,
                Role::Gate,
                Role::Stamp,
                Role::OpenDownloads,
                Role::FileList,
                Role::DownloadSelected,
                Role::Compose,
                Role::AddFiles,
                Role::Recipient,
                Role::Send,
                Role::Status,
                Role::ErrorText,
            ]
            .into_iter()
            .find(|role| role.handle().id() == *single),
            _ => None,
        }
    }
}

pub struct ReplayDriver {
    fixture: PortalFixture,
    selectors: PortalSelectors,
    state: Mutex<ReplayState>,
}

impl ReplayDriver {
    pub fn new(fixture: PortalFixture, selectors: PortalSelectors) -> Self {
        let hidden_reads_left = fixture.hidden_reads;
        Self {
            fixture,
            selectors,
            state: Mutex::new(ReplayState {
                page: Page::Blank,
                url: "about:blank".to_string(),
                base_url: String::new(),
                password_step: false,
                typed_username: String::new(),
                typed_password: String::new(),
                login_failed: false,
                signed_in: false,
                scroll_px: 0,
                hidden_reads_left,
                selected: BTreeSet::new(),
                events: VecDeque::new(),
                downloads: Vec::new(),
                opened: Vec::new(),
                screenshots: Vec::new(),
                sent_files: Vec::new(),
                recipient: None,
                transfer_sent: false,
                status_reads: 0,
                closed: false,
            }),
        }
    }

    fn state(&self) -> MutexGuard<'_, ReplayState> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Titles of every entry whose detail view was opened, in order.
    pub fn opened_titles(&self) -> Vec<String> {
        self.state().opened.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.state().closed
    }

    pub fn screenshots(&self) -> Vec<PathBuf> {
        self.state().screenshots.clone()
    }

    pub fn sent_files(&self) -> Vec<PathBuf> {
        self.state().sent_files.clone()
    }

    pub fn recipient(&self) -> Option<String> {
        self.state().recipient.clone()
    }

    fn first_rendered_row(&self, state: &ReplayState) -> usize {
        let height = self.fixture.row_height_px.max(1);
        usize::try_from(state.scroll_px / height).unwrap_or(0)
    }

    fn rendered_rows(&self, state: &ReplayState) -> std::ops::Range<usize> {
        if state.page != Page::Feed {
            return 0..0;
        }
        let first = self.first_rendered_row(state).min(self.fixture.items.len());
        let last = (first + self.fixture.window).min(self.fixture.items.len());
        first..last
    }

    fn max_scroll(&self) -> i64 {
        let hidden_rows = self.fixture.items.len().saturating_sub(self.fixture.window);
        i64::try_from(hidden_rows).unwrap_or(i64::MAX) * self.fixture.row_height_px.max(1)
    }

    fn item(&self, index: usize) -> Result<&FixtureItem, DriverError> {
        self.fixture
            .items
            .get(index)
            .ok_or_else(|| DriverError::NotFound(format!("item {index}")))
    }

    fn ensure_open(state: &ReplayState) -> Result<(), DriverError> {
        if state.closed {
            return Err(DriverError::Interaction("session is closed".to_string()));
        }
        Ok(())
    }

    /// Roles currently present for `selector`.
    fn query(&self, state: &ReplayState, selector: &str) -> Vec<Role> {
        let s = &self.selectors;
        let on_login = state.page == Page::Login;
        let present = |cond: bool, role: Role| if cond { vec![role] } else { Vec::new() };

        if selector == s.username_input {
            present(on_login, Role::Username)
        } else if selector == s.continue_button {
            present(on_login, Role::Continue)
        } else if selector == s.password_input {
            present(on_login && state.password_step, Role::Password)
        } else if selector == s.sign_in_button {
            present(on_login && state.password_step, Role::SignIn)
        } else if selector == s.login_error {
            present(on_login && state.login_failed, Role::LoginError)
        } else if selector == s.feed_container {
            present(state.page == Page::Feed, Role::Feed)
        } else if selector == s.transfer_gate {
            present(matches!(state.page, Page::Detail { gate_open: true, .. }), Role::Gate)
        } else if selector == s.detail_timestamp {
            let ready = match state.page {
                Page::Detail { item, gate_open } => {
                    !gate_open && self.item(item).map(|i| !i.broken_detail).unwrap_or(false)
                }
                _ => false,
            };
            present(ready, Role::Stamp)
        } else if selector == s.open_downloads {
            present(matches!(state.page, Page::Detail { .. }), Role::OpenDownloads)
        } else if selector == s.file_list {
            present(matches!(state.page, Page::Downloads { .. }), Role::FileList)
        } else if selector == s.download_selected {
            let shown = match state.page {
                Page::Downloads { item } => {
                    self.item(item).map(|i| !i.no_download_button).unwrap_or(false)
                }
                _ => false,
            };
            present(shown, Role::DownloadSelected)
        } else if selector == s.compose_button {
            present(state.page == Page::Feed, Role::Compose)
        } else if selector == s.add_files_button {
            present(state.page == Page::Compose, Role::AddFiles)
        } else if selector == s.recipient_input {
            present(state.page == Page::Compose, Role::Recipient)
        } else if selector == s.send_button {
            present(state.page == Page::Compose, Role::Send)
        } else if selector == s.progress_indicator {
            present(
                state.transfer_sent && self.fixture.transfer_status.is_some(),
                Role::Status,
            )
        } else if s.error_indicators.first().map(String::as_str) == Some(selector) {
            present(
                state.transfer_sent && self.fixture.transfer_error.is_some(),
                Role::ErrorText,
            )
        } else {
            Vec::new()
        }
    }

    fn query_within(&self, state: &ReplayState, parent: Role, selector: &str) -> Vec<Role> {
        let s = &self.selectors;
        match parent {
            Role::Feed if selector == s.feed_row => {
                self.rendered_rows(state).map(Role::Row).collect()
            }
            Role::Row(i) if selector == s.row_title => vec![Role::RowTitle(i)],
            Role::Row(i) if selector == s.row_subtext => vec![Role::RowSubtext(i)],
            Role::Row(i) if selector == s.row_timestamp => vec![Role::RowTime(i)],
            Role::FileList if selector == s.file_row => match state.page {
                Page::Downloads { item } => self
                    .item(item)
                    .map(|i| (0..i.files.len()).map(Role::File).collect::<Vec<_>>())
                    .unwrap_or_default(),
                _ => Vec::new(),
            },
            Role::File(i) if selector == s.file_name => vec![Role::FileName(i)],
            _ => Vec::new(),
        }
    }

    /// Fails with a stale handle if `role` is not rendered any more.
    fn check_attached(&self, state: &ReplayState, role: Role) -> Result<(), DriverError> {
        let attached = match role {
            Role::Row(i) | Role::RowTitle(i) | Role::RowSubtext(i) | Role::RowTime(i) => {
                self.rendered_rows(state).contains(&i)
            }
            Role::File(i) | Role::FileName(i) => match state.page {
                Page::Downloads { item } => self
                    .item(item)
                    .map(|it| i < it.files.len())
                    .unwrap_or(false),
                _ => false,
            },
            Role::Feed => state.page == Page::Feed,
            Role::Gate => matches!(state.page, Page::Detail { gate_open: true, .. }),
            Role::Stamp | Role::OpenDownloads => matches!(state.page, Page::Detail { .. }),
            Role::FileList | Role::DownloadSelected => {
                matches!(state.page, Page::Downloads { .. })
            }
            Role::Username | Role::Continue | Role::Password | Role::SignIn | Role::LoginError => {
                state.page == Page::Login
            }
            Role::Compose => state.page == Page::Feed,
            Role::AddFiles | Role::Recipient | Role::Send => state.page == Page::Compose,
            Role::Status | Role::ErrorText => state.transfer_sent,
        };
        if attached {
            Ok(())
        } else {
            Err(DriverError::StaleHandle(role.handle().id().to_string()))
        }
    }

    fn resolve(&self, state: &ReplayState, handle: &ElementHandle) -> Result<Role, DriverError> {
        Self::ensure_open(state)?;
        let role = Role::parse(handle)
            .ok_or_else(|| DriverError::NotFound(handle.id().to_string()))?;
        self.check_attached(state, role)?;
        Ok(role)
    }

    fn prepare_download(&self, state: &mut ReplayState, item_index: usize) -> Result<(), DriverError> {
        let item = self.item(item_index)?;
        if item.stall_download || state.selected.is_empty() {
            return Ok(());
        }
        let selected: Vec<&FixtureFile> = state
            .selected
            .iter()
            .filter_map(|i| item.files.get(*i))
            .collect();

        let (name, payload) = if item.corrupt_archive {
            (
                item.archive_name
                    .clone()
                    .unwrap_or_else(|| format!("transfer-{item_index}.zip")),
                b"this is not a zip archive".to_vec(),
            )
        } else if selected.len() > 1 || item.archive_name.is_some() {
            (
                item.archive_name
                    .clone()
                    .unwrap_or_else(|| format!("transfer-{item_index}.zip")),
                pack_zip(&selected)?,
            )
        } else if let Some(file) = selected.first() {
            (file.name.clone(), file.content.as_bytes().to_vec())
        } else {
            return Ok(());
        };

        let id = format!("download-{}", state.downloads.len() + 1);
        state.downloads.push((id.clone(), payload));
        state.events.push_back(DriverEvent::DownloadStarted(PendingDownload {
            id,
            suggested_filename: name,
        }));
        Ok(())
    }

    fn activate(&self, state: &mut ReplayState, role: Role, modifiers: ClickModifiers) -> Result<(), DriverError> {
        match role {
            Role::Continue => {
                if !state.typed_username.trim().is_empty() {
                    state.password_step = true;
                }
            }
            Role::SignIn => {
                if self.fixture.stall_sign_in {
                    return Ok(());
                }
                if state.typed_username == self.fixture.username
                    && state.typed_password == self.fixture.password
                {
                    state.signed_in = true;
                    state.page = Page::Feed;
                    state.scroll_px = 0;
                } else {
                    state.login_failed = true;
                }
            }
            Role::Row(i) => {
                let item = self.item(i)?;
                state.opened.push(item.title.clone());
                state.page = Page::Detail {
                    item: i,
                    gate_open: item.gate,
                };
                state.url = format!("{}transfers/{i}", state.base_url);
            }
            Role::Gate => {
                if let Page::Detail { item, .. } = state.page {
                    state.page = Page::Detail {
                        item,
                        gate_open: false,
                    };
                }
            }
            Role::OpenDownloads => {
                if let Page::Detail { item, .. } = state.page {
                    state.page = Page::Downloads { item };
                    state.selected.clear();
                    state.url = format!("{}downloads/{item}", state.base_url);
                }
            }
            Role::File(i) => {
                if !modifiers.multi_select {
                    state.selected.clear();
                }
                state.selected.insert(i);
            }
            Role::DownloadSelected => {
                if let Page::Downloads { item } = state.page {
                    self.prepare_download(state, item)?;
                }
            }
            Role::Compose => state.page = Page::Compose,
            Role::AddFiles => state.events.push_back(DriverEvent::FileChooser(FileChooser {
                id: "chooser".to_string(),
                multiple: self.fixture.chooser_multiple,
            })),
            Role::Send => {
                state.transfer_sent = true;
                state.status_reads = 0;
            }
            _ => {}
        }
        Ok(())
    }

    fn text_of(&self, state: &mut ReplayState, role: Role) -> Result<Option<String>, DriverError> {
        let text = match role {
            Role::RowTitle(i) => Some(self.item(i)?.title.clone()),
            Role::RowSubtext(i) => Some(self.item(i)?.subtext.clone()),
            Role::RowTime(i) => Some(self.item(i)?.row_time.clone()),
            Role::Stamp => match state.page {
                Page::Detail { item, .. } => Some(self.item(item)?.timestamp.clone()),
                _ => None,
            },
            Role::FileName(i) => match state.page {
                Page::Downloads { item } => self.item(item)?.files.get(i).map(|f| f.name.clone()),
                _ => None,
            },
            Role::LoginError => Some(self.fixture.login_error.clone()),
            Role::Status => {
                state.status_reads += 1;
                if state.status_reads <= self.fixture.status_pending_reads {
                    Some("Uploading...".to_string())
                } else {
                    self.fixture.transfer_status.clone()
                }
            }
            Role::ErrorText => self.fixture.transfer_error.clone(),
            _ => None,
        };
        Ok(text)
    }
}

fn pack_zip(files: &[&FixtureFile]) -> Result<Vec<u8>, DriverError> {
    let zip_err = |err: zip::result::ZipError| DriverError::Interaction(err.to_string());
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for file in files {
        writer
            .start_file(file.name.as_str(), zip::write::SimpleFileOptions::default())
            .map_err(zip_err)?;
        writer.write_all(file.content.as_bytes())?;
    }
    Ok(writer.finish().map_err(zip_err)?.into_inner())
}

#[async_trait::async_trait]
impl UiDriver for ReplayDriver {
    async fn open(&self, url: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        if state.base_url.is_empty() {
            state.base_url = url.to_string();
        }
        state.url = url.to_string();
        state.scroll_px = 0;
        state.page = if state.signed_in { Page::Feed } else { Page::Login };
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        let state = self.state();
        Self::ensure_open(&state)?;
        Ok(state.url.clone())
    }

    async fn locate(&self, selector: &str) -> Result<Vec<ElementHandle>, DriverError> {
        let state = self.state();
        Self::ensure_open(&state)?;
        Ok(self
            .query(&state, selector)
            .into_iter()
            .map(Role::handle)
            .collect())
    }

    async fn locate_within(
        &self,
        parent: &ElementHandle,
        selector: &str,
    ) -> Result<Vec<ElementHandle>, DriverError> {
        let state = self.state();
        let parent = self.resolve(&state, parent)?;
        Ok(self
            .query_within(&state, parent, selector)
            .into_iter()
            .map(Role::handle)
            .collect())
    }

    async fn is_visible(&self, handle: &ElementHandle) -> Result<bool, DriverError> {
        let mut state = self.state();
        let role = self.resolve(&state, handle)?;
        if role != Role::Feed {
            return Ok(true);
        }
        if self.fixture.feed_hidden {
            return Ok(false);
        }
        if state.hidden_reads_left > 0 {
            state.hidden_reads_left -= 1;
            return Ok(false);
        }
        Ok(true)
    }

    async fn click(
        &self,
        handle: &ElementHandle,
        modifiers: ClickModifiers,
    ) -> Result<(), DriverError> {
        let mut state = self.state();
        let role = self.resolve(&state, handle)?;
        self.activate(&mut state, role, modifiers)
    }

    async fn fill(&self, handle: &ElementHandle, text: &str) -> Result<(), DriverError> {
        let mut state = self.state();
        match self.resolve(&state, handle)? {
            Role::Username => state.typed_username = text.to_string(),
            Role::Password => state.typed_password = text.to_string(),
            Role::Recipient => state.recipient = Some(text.to_string()),
            other => {
                return Err(DriverError::Interaction(format!(
                    "{} is not an input",
                    other.handle().id()
                )))
            }
        }
        Ok(())
    }

    async fn scroll(&self, container: &ElementHandle, delta_px: i64) -> Result<(), DriverError> {
        let mut state = self.state();
        self.resolve(&state, container)?;
        state.scroll_px = (state.scroll_px + delta_px).clamp(0, self.max_scroll());
        Ok(())
    }

    async fn wait_for_selector(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<ElementHandle, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            if let Some(handle) = self.locate(selector).await?.into_iter().next() {
                return Ok(handle);
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    what: selector.to_string(),
                    after: timeout,
                });
            }
            tokio::time::sleep(REPLAY_TICK).await;
        }
    }

    async fn wait_for_event(
        &self,
        kind: EventKind,
        timeout: Duration,
    ) -> Result<DriverEvent, DriverError> {
        let deadline = Instant::now() + timeout;
        loop {
            {
                let mut state = self.state();
                Self::ensure_open(&state)?;
                if let Some(pos) = state.events.iter().position(|e| e.kind() == kind) {
                    if let Some(event) = state.events.remove(pos) {
                        return Ok(event);
                    }
                }
            }
            if Instant::now() >= deadline {
                return Err(DriverError::Timeout {
                    what: format!("{kind:?} event"),
                    after: timeout,
                });
            }
            tokio::time::sleep(REPLAY_TICK).await;
        }
    }

    async fn text_content(&self, handle: &ElementHandle) -> Result<Option<String>, DriverError> {
        let mut state = self.state();
        let role = self.resolve(&state, handle)?;
        self.text_of(&mut state, role)
    }

    async fn set_files(&self, chooser: &FileChooser, paths: &[PathBuf]) -> Result<(), DriverError> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        if paths.len() > 1 && !chooser.multiple {
            return Err(DriverError::Interaction(
                "chooser accepts one file".to_string(),
            ));
        }
        state.sent_files.extend(paths.iter().cloned());
        Ok(())
    }

    async fn save_download(
        &self,
        download: &PendingDownload,
        dest: &Path,
    ) -> Result<(), DriverError> {
        let payload = {
            let state = self.state();
            Self::ensure_open(&state)?;
            state
                .downloads
                .iter()
                .find(|(id, _)| *id == download.id)
                .map(|(_, bytes)| bytes.clone())
                .ok_or_else(|| DriverError::NotFound(download.id.clone()))?
        };
        std::fs::write(dest, payload)?;
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        let mut state = self.state();
        Self::ensure_open(&state)?;
        std::fs::write(path, format!("replay page {:?}\n", state.page))?;
        state.screenshots.push(path.to_path_buf());
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        let mut state = self.state();
        state.closed = true;
        state.page = Page::Blank;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn driver(items: Vec<FixtureItem>) -> ReplayDriver {
        ReplayDriver::new(
            PortalFixture {
                items,
                window: 2,
                ..PortalFixture::default()
            },
            PortalSelectors::default(),
        )
    }

    #[test]
    fn handles_round_trip_through_roles() {
        for role in [Role::Row(3), Role::FileName(1), Role::DownloadSelected, Role::Feed] {
            assert_eq!(Role::parse(&role.handle()), Some(role));
        }
    }

    #[tokio::test]
    async fn scrolling_moves_the_rendered_window() {
        let items = (0..5)
            .map(|i| FixtureItem::new(&format!("Received {i}"), "", "2025-11-03"))
            .collect();
        let driver = driver(items);
        let selectors = PortalSelectors::default();
        {
            let mut state = driver.state();
            state.signed_in = true;
            state.page = Page::Feed;
        }
        let feed = driver.locate(&selectors.feed_container).await.unwrap().remove(0);
        let rows = driver.locate_within(&feed, &selectors.feed_row).await.unwrap();
        assert_eq!(rows, vec![Role::Row(0).handle(), Role::Row(1).handle()]);

        driver.scroll(&feed, 250).await.unwrap();
        let rows = driver.locate_within(&feed, &selectors.feed_row).await.unwrap();
        assert_eq!(rows, vec![Role::Row(2).handle(), Role::Row(3).handle()]);

        let stale = driver.text_content(&Role::RowTitle(0).handle()).await;
        assert!(matches!(stale, Err(DriverError::StaleHandle(_))));

        driver.scroll(&feed, 10_000).await.unwrap();
        let rows = driver.locate_within(&feed, &selectors.feed_row).await.unwrap();
        assert_eq!(rows, vec![Role::Row(3).handle(), Role::Row(4).handle()]);
    }
}
