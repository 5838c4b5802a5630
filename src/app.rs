//! コンソール操作。ストリームの購読者をつなぎ、ユーザーのコマンドを実行する

use std::cell::{Cell, RefCell};
use std::path::PathBuf;
use std::rc::Rc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::backend::Backend;
use crate::connection::{ConnectionManager, FrameSubscriber, Timer, Transport};
use crate::protocol::StreamFrame;
use crate::recognition::{LiveDisplay, RecognitionClient, RecognitionState};
use crate::render::frame::{FrameRenderer, OverlayStyle};
use crate::render::skeleton::{CANVAS_HEIGHT, CANVAS_WIDTH};
use crate::report;
use crate::rules::{Confirm, DeleteOutcome, MappingDraft, RuleStore};
use crate::session::{stop_and_analyze, SessionRecorder};

pub const DEFAULT_HISTORY_LINES: usize = 10;

pub const HELP: &str = "\
commands:
  record <label>                       start recording an exercise
  stop                                 stop recording and analyze
  status                               connection, session and live gesture
  history [n]                          last n recognized gestures
  rules                                list gesture mappings
  add <gesture> <type> <payload> [| description]
                                       create a mapping (log/callback/keyboard/mouse)
  update <gesture> <type> <payload> [| description]
                                       replace an existing mapping
  show <gesture>                       fetch one mapping from the backend
  delete <gesture>                     delete a mapping
  sequences <label>                    previous recordings of an exercise
  snapshot <path.png>                  save the current frame with overlay
  help                                 this text
  quit                                 exit";

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Record(String),
    Stop,
    Status,
    History(usize),
    Rules,
    Add(MappingDraft),
    Update(MappingDraft),
    Show(String),
    Delete(String),
    Sequences(String),
    Snapshot(PathBuf),
    Help,
    Quit,
}

impl Command {
    /// 空行は `Ok(None)`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        let (name, rest) = match line.split_once(char::is_whitespace) {
            Some((name, rest)) => (name, rest.trim()),
            None => (line, ""),
        };

        let command = match name {
            "" => return Ok(None),
            "record" => Self::Record(required(rest, "record <label>")?.to_string()),
            "stop" => Self::Stop,
            "status" => Self::Status,
            "history" if rest.is_empty() => Self::History(DEFAULT_HISTORY_LINES),
            "history" => Self::History(rest.parse().context("usage: history [n]")?),
            "rules" => Self::Rules,
            "add" => Self::Add(parse_draft(name, rest)?),
            "update" => Self::Update(parse_draft(name, rest)?),
            "show" => Self::Show(required(rest, "show <gesture>")?.to_string()),
            "delete" => Self::Delete(required(rest, "delete <gesture>")?.to_string()),
            "sequences" => Self::Sequences(required(rest, "sequences <label>")?.to_string()),
            "snapshot" => Self::Snapshot(PathBuf::from(required(rest, "snapshot <path.png>")?)),
            "help" | "?" => Self::Help,
            "quit" | "exit" | "q" => Self::Quit,
            other => bail!("unknown command '{other}' (try 'help')"),
        };
        Ok(Some(command))
    }
}

fn required<'a>(rest: &'a str, usage: &str) -> Result<&'a str> {
    if rest.is_empty() {
        bail!("usage: {usage}");
    }
    Ok(rest)
}

/// `<gesture> <type> <payload...> [| description]`
/// ペイロードは種類に対応するフィールドへ入れる。検証は RuleStore 側
fn parse_draft(command: &str, rest: &str) -> Result<MappingDraft> {
    let (fields, description) = match rest.split_once('|') {
        Some((fields, desc)) => (fields.trim(), Some(desc.trim().to_string())),
        None => (rest, None),
    };
    let mut parts = fields.splitn(3, char::is_whitespace);
    let (Some(gesture), Some(action_type)) = (parts.next().filter(|g| !g.is_empty()), parts.next()) else {
        bail!("usage: {command} <gesture> <type> <payload> [| description]");
    };
    let payload = parts.next().map(|p| p.trim().to_string()).filter(|p| !p.is_empty());

    let mut draft = MappingDraft {
        gesture: gesture.to_string(),
        action_type: action_type.to_string(),
        description,
        ..Default::default()
    };
    match action_type {
        "log" => draft.message = payload,
        "callback" => draft.url = payload,
        "keyboard" => draft.key = payload,
        "mouse" => draft.mouse_action = payload,
        _ => {}
    }
    Ok(draft)
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Text(String),
    Quit,
}

/// ステータス表示用の接続状態とフレーム数
#[derive(Debug, Clone, Default)]
pub struct LinkMonitor {
    connected: Rc<Cell<bool>>,
    frames: Rc<Cell<u64>>,
}

impl LinkMonitor {
    pub fn connected(&self) -> bool {
        self.connected.get()
    }

    pub fn frames(&self) -> u64 {
        self.frames.get()
    }
}

impl FrameSubscriber for LinkMonitor {
    fn on_frame(&mut self, _frame: &StreamFrame) {
        self.frames.set(self.frames.get() + 1);
    }

    fn on_connectivity(&mut self, connected: bool) {
        self.connected.set(connected);
    }
}

pub struct AppContext<B: Backend + 'static> {
    backend: Rc<B>,
    recognition: Rc<RefCell<RecognitionState>>,
    recorder: Rc<RefCell<SessionRecorder>>,
    renderer: Rc<RefCell<FrameRenderer>>,
    rules: RuleStore<B>,
    link: LinkMonitor,
}

impl<B: Backend + 'static> AppContext<B> {
    pub fn new(backend: Rc<B>, recognition: RecognitionState, style: OverlayStyle) -> Self {
        Self {
            rules: RuleStore::new(Rc::clone(&backend)),
            backend,
            recognition: Rc::new(RefCell::new(recognition)),
            recorder: Rc::new(RefCell::new(SessionRecorder::new())),
            renderer: Rc::new(RefCell::new(FrameRenderer::new(CANVAS_WIDTH, CANVAS_HEIGHT, style))),
            link: LinkMonitor::default(),
        }
    }

    pub fn renderer(&self) -> Rc<RefCell<FrameRenderer>> {
        Rc::clone(&self.renderer)
    }

    pub fn recognition(&self) -> Rc<RefCell<RecognitionState>> {
        Rc::clone(&self.recognition)
    }

    pub fn recorder(&self) -> Rc<RefCell<SessionRecorder>> {
        Rc::clone(&self.recorder)
    }

    pub fn rules(&self) -> &RuleStore<B> {
        &self.rules
    }

    pub fn rules_mut(&mut self) -> &mut RuleStore<B> {
        &mut self.rules
    }

    /// ストリームの購読者をすべて `manager` に登録
    pub fn attach<T: Transport, C: Timer>(&self, manager: &mut ConnectionManager<T, C>) {
        manager.subscribe(self.link.clone());
        manager.subscribe(Rc::clone(&self.renderer));
        manager.subscribe(Rc::clone(&self.recorder));
        manager.subscribe(RecognitionClient::new(
            Rc::clone(&self.recognition),
            Rc::clone(&self.backend),
        ));
    }

    pub async fn execute(&mut self, command: Command, confirm: &mut impl Confirm) -> Result<Reply> {
        let text = match command {
            Command::Record(label) => {
                self.recorder.borrow_mut().start(&label)?;
                format!("recording '{}'", label.trim())
            }
            Command::Stop => match stop_and_analyze(&self.recorder, self.backend.as_ref()).await? {
                Some(report) => report::present(&report).to_string(),
                None => "not recording".to_string(),
            },
            Command::Status => self.status_text(),
            Command::History(n) => self.history_text(n),
            Command::Rules => {
                self.rules.load_mappings().await?;
                self.rules_text()
            }
            Command::Add(draft) => {
                let mapping = self.rules.create_from_draft(draft).await?;
                self.reload_after(format!("added {mapping}")).await
            }
            Command::Update(draft) => {
                let mapping = self.rules.update_from_draft(draft).await?;
                self.reload_after(format!("updated {mapping}")).await
            }
            Command::Show(gesture) => self.rules.fetch_mapping(&gesture).await?.to_string(),
            Command::Delete(gesture) => match self.rules.delete_mapping(&gesture, confirm).await? {
                DeleteOutcome::Deleted => self.reload_after(format!("deleted '{gesture}'")).await,
                DeleteOutcome::Cancelled => "cancelled".to_string(),
            },
            Command::Sequences(label) => {
                let listing = self.backend.list_sequences(&label).await?;
                let lines = report::present_history(&listing);
                if lines.is_empty() {
                    format!("no recordings for '{label}'")
                } else {
                    lines.join("\n")
                }
            }
            Command::Snapshot(path) => {
                self.snapshot(&path)?;
                format!("saved {}", path.display())
            }
            Command::Help => HELP.to_string(),
            Command::Quit => return Ok(Reply::Quit),
        };
        Ok(Reply::Text(text))
    }

    /// 変更後の再読込。失敗しても変更結果の文言に注記を付けて返す
    async fn reload_after(&mut self, done: String) -> String {
        match self.rules.load_mappings().await {
            Ok(_) => done,
            Err(e) => {
                warn!("[rules] reload after change failed: {e}");
                format!("{done}\n(rule list not refreshed: {e})")
            }
        }
    }

    fn status_text(&self) -> String {
        let recorder = self.recorder.borrow();
        let session = match recorder.label() {
            Some(label) => format!("{} '{}' ({} frames)", recorder.status(), label, recorder.buffered()),
            None => recorder.status().to_string(),
        };
        let live = match self.recognition.borrow().display() {
            LiveDisplay::Waiting => "waiting for gesture...".to_string(),
            LiveDisplay::Recognized { gesture, action } => format!("{gesture}: {}", action.text),
        };
        format!(
            "stream: {} ({} frames)\nsession: {}\nlive: {}",
            if self.link.connected() { "connected" } else { "disconnected" },
            self.link.frames(),
            session,
            live,
        )
    }

    /// 新しい順
    fn history_text(&self, n: usize) -> String {
        let state = self.recognition.borrow();
        if state.history_len() == 0 {
            return "no gestures recognized yet".to_string();
        }
        state
            .history()
            .rev()
            .take(n)
            .map(|e| format!("{}  {}  {}", e.timestamp.format("%H:%M:%S"), e.gesture, e.action.text))
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn rules_text(&self) -> String {
        if self.rules.mappings().is_empty() {
            return "no mappings".to_string();
        }
        self.rules
            .mappings()
            .iter()
            .map(|m| m.to_string())
            .collect::<Vec<_>>()
            .join("\n")
    }

    fn snapshot(&self, path: &std::path::Path) -> Result<()> {
        let renderer = self.renderer.borrow();
        let mut composed = renderer.video().borrow().clone();
        composed.compose(renderer.overlay());
        composed
            .to_rgb_image()
            .save(path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        info!(path = %path.display(), "[render] snapshot saved");
        Ok(())
    }
}
