//! Interactive chat session: one event loop over stdin lines, radar ticks and
//! gateway completions.
//!
//! Local commands run inline through [`Console::dispatch`]. Gateway calls are
//! spawned and report back as events, so a slow summarize never holds up the
//! next chat line.

use std::io::{BufRead, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use rand::rngs::SmallRng;
use tokio::sync::mpsc;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use tl_core::{
    ClassificationResult, Command, CompressionResult, Console, CoreError, MessageLog, Outcome,
    ProximityEstimator, SummaryResult, TopologyProjector,
};
use tl_store::{Journal, MeshConfig};

use crate::gateway::{AiGateway, GatewayError, ImageFile};
use crate::render;

const EVENT_BUFFER: usize = 64;

const HELP: &str = "\
commands:
  <text>              send a chat message
  /sos                broadcast SOS
  /classify [text]    remote classification (default: last message)
  /summarize [text]   remote summary (default: whole log)
  /compress <path>    compress an image via the AI service
  /peers              nearby peer distances
  /mesh               mesh topology layout
  /log                replay the message log
  /help               this list
  /quit               leave";

/// Everything the session loop reacts to.
#[derive(Debug)]
pub enum Event {
    Input(String),
    InputClosed,
    Tick,
    Gateway(Reply),
}

/// Completion of a spawned gateway call.
#[derive(Debug)]
pub enum Reply {
    Classified(std::result::Result<ClassificationResult, GatewayError>),
    Summarized(std::result::Result<SummaryResult, GatewayError>),
    Compressed {
        source: PathBuf,
        result: std::result::Result<CompressionResult, GatewayError>,
    },
}

#[derive(Clone, Debug, PartialEq)]
pub enum ChatCommand {
    Send(String),
    Sos,
    Classify(Option<String>),
    Summarize(Option<String>),
    Compress(Option<PathBuf>),
    Peers,
    Mesh,
    Log,
    Help,
    Quit,
    Unknown(String),
}

/// Parse one input line. Anything that is not a slash command is chat text.
pub fn parse_line(line: &str) -> ChatCommand {
    let trimmed = line.trim();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return ChatCommand::Send(line.to_string());
    };
    let (name, arg) = match rest.split_once(char::is_whitespace) {
        Some((name, arg)) => (name, Some(arg.trim().to_string()).filter(|a| !a.is_empty())),
        None => (rest, None),
    };
    match name.to_ascii_lowercase().as_str() {
        "sos" => ChatCommand::Sos,
        "classify" => ChatCommand::Classify(arg),
        "summarize" | "summary" => ChatCommand::Summarize(arg),
        "compress" => ChatCommand::Compress(arg.map(PathBuf::from)),
        "peers" | "radar" => ChatCommand::Peers,
        "mesh" => ChatCommand::Mesh,
        "log" => ChatCommand::Log,
        "help" | "?" => ChatCommand::Help,
        "quit" | "exit" => ChatCommand::Quit,
        other => ChatCommand::Unknown(other.to_string()),
    }
}

#[derive(Debug, PartialEq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct ChatSession<W: Write> {
    console: Console,
    journal: Option<Journal>,
    gateway: AiGateway,
    mesh: MeshConfig,
    rng: SmallRng,
    events: mpsc::Sender<Event>,
    cancel: CancellationToken,
    out: W,
}

impl<W: Write> ChatSession<W> {
    /// Build a session and the receiving end of its event channel.
    pub fn new(
        log: MessageLog,
        proximity: ProximityEstimator,
        journal: Option<Journal>,
        gateway: AiGateway,
        mesh: MeshConfig,
        rng: SmallRng,
        out: W,
    ) -> (Self, mpsc::Receiver<Event>) {
        let (events, rx) = mpsc::channel(EVENT_BUFFER);
        let session = Self {
            console: Console::new(log, proximity),
            journal,
            gateway,
            mesh,
            rng,
            events,
            cancel: CancellationToken::new(),
            out,
        };
        (session, rx)
    }

    #[cfg(test)]
    pub fn sender(&self) -> mpsc::Sender<Event> {
        self.events.clone()
    }

    #[cfg(test)]
    pub fn console(&self) -> &Console {
        &self.console
    }

    /// Feed radar ticks into the loop every `period` until the session ends.
    pub fn start_radar(&self, period: Duration) {
        let tx = self.events.clone();
        let token = self.cancel.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => break,
                    _ = interval.tick() => {}
                }
                if tx.send(Event::Tick).await.is_err() {
                    break;
                }
            }
        });
    }

    /// Forward stdin lines on a plain thread; a blocked read there never
    /// holds up runtime shutdown.
    pub fn start_stdin(&self) {
        let tx = self.events.clone();
        std::thread::spawn(move || {
            let stdin = std::io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.blocking_send(Event::Input(line)).is_err() {
                    return;
                }
            }
            let _ = tx.blocking_send(Event::InputClosed);
        });
    }

    /// Drive the loop until `/quit` or end of input, then cancel anything
    /// still in flight and hand back the owned state.
    pub async fn run(
        mut self,
        mut rx: mpsc::Receiver<Event>,
    ) -> Result<(MessageLog, ProximityEstimator)> {
        writeln!(self.out, "TerraLink chat. /help for commands.")?;
        while let Some(event) = rx.recv().await {
            if self.handle(event)? == Flow::Quit {
                break;
            }
        }
        self.cancel.cancel();
        self.out.flush()?;
        tracing::info!(messages = self.console.log().len(), "chat session closed");
        Ok(self.console.into_parts())
    }

    pub fn handle(&mut self, event: Event) -> Result<Flow> {
        match event {
            Event::Input(line) => self.handle_command(parse_line(&line)),
            Event::InputClosed => Ok(Flow::Quit),
            Event::Tick => {
                self.console.dispatch(Command::Tick, &mut self.rng)?;
                Ok(Flow::Continue)
            }
            Event::Gateway(reply) => {
                self.handle_reply(reply)?;
                Ok(Flow::Continue)
            }
        }
    }

    fn handle_command(&mut self, command: ChatCommand) -> Result<Flow> {
        match command {
            ChatCommand::Send(text) => self.local(Command::Send(text))?,
            ChatCommand::Sos => self.local(Command::Sos)?,
            ChatCommand::Classify(text) => {
                let Some(text) = text.or_else(|| self.last_text()) else {
                    writeln!(self.out, "nothing to classify")?;
                    return Ok(Flow::Continue);
                };
                let gw = self.gateway.clone();
                self.spawn_call(async move { Reply::Classified(gw.classify(&text).await) });
                writeln!(self.out, "classifying...")?;
            }
            ChatCommand::Summarize(text) => {
                let text = text.unwrap_or_else(|| self.transcript());
                let gw = self.gateway.clone();
                self.spawn_call(async move { Reply::Summarized(gw.summarize(&text).await) });
                writeln!(self.out, "summarizing...")?;
            }
            ChatCommand::Compress(path) => {
                let gw = self.gateway.clone();
                self.spawn_call(async move {
                    let source = path.clone().unwrap_or_default();
                    let result = match path {
                        None => gw.compress(&[]).await,
                        Some(p) => match ImageFile::read(&p).await {
                            Ok(file) => gw.compress(&[file]).await,
                            Err(e) => Err(GatewayError::Request {
                                endpoint: p.display().to_string(),
                                status: None,
                                detail: e.to_string(),
                            }),
                        },
                    };
                    Reply::Compressed { source, result }
                });
            }
            ChatCommand::Peers => {
                let snapshot = self.console.proximity();
                writeln!(self.out, "{}", render::peers(&snapshot))?;
            }
            ChatCommand::Mesh => match self.mesh.graph() {
                Ok(graph) => {
                    let mut projector = TopologyProjector::new(graph, self.mesh.layout_params());
                    projector.run();
                    writeln!(self.out, "{}", render::layout(&projector))?;
                }
                Err(e) => writeln!(self.out, "mesh unavailable: {e}")?,
            },
            ChatCommand::Log => {
                for msg in self.console.log().all() {
                    writeln!(self.out, "{}", render::message(msg))?;
                }
            }
            ChatCommand::Help => writeln!(self.out, "{HELP}")?,
            ChatCommand::Quit => return Ok(Flow::Quit),
            ChatCommand::Unknown(name) => {
                writeln!(self.out, "unknown command /{name}; /help lists commands")?
            }
        }
        Ok(Flow::Continue)
    }

    fn local(&mut self, command: Command) -> Result<()> {
        match self.console.dispatch(command, &mut self.rng) {
            Ok(Outcome::Appended(msg)) => {
                writeln!(self.out, "{}", render::message(&msg))?;
                // The journal may be shared with one-shot commands; a failed
                // write leaves the message in this session only.
                if let Some(journal) = &self.journal {
                    if let Err(e) = journal.append(&msg) {
                        tracing::warn!(sequence = msg.sequence, "failed to journal message: {e}");
                        writeln!(self.out, "not saved: {e}")?;
                    }
                }
            }
            Ok(Outcome::Proximity(snapshot)) => {
                writeln!(self.out, "{}", render::peers(&snapshot))?;
            }
            Err(CoreError::EmptyMessage) => tracing::debug!("ignored blank input"),
            Err(e) => writeln!(self.out, "rejected: {e}")?,
        }
        Ok(())
    }

    fn spawn_call<F>(&self, call: F)
    where
        F: std::future::Future<Output = Reply> + Send + 'static,
    {
        let tx = self.events.clone();
        let token = self.cancel.clone();
        tokio::spawn(async move {
            let reply = tokio::select! {
                biased;
                _ = token.cancelled() => return,
                reply = call => reply,
            };
            let _ = tx.send(Event::Gateway(reply)).await;
        });
    }

    fn handle_reply(&mut self, reply: Reply) -> Result<()> {
        match reply {
            Reply::Classified(Ok(result)) => {
                writeln!(self.out, "{}", render::classification(&result))?
            }
            Reply::Summarized(Ok(result)) => writeln!(self.out, "{}", render::summary(&result))?,
            Reply::Compressed {
                source,
                result: Ok(result),
            } => {
                let target = compressed_path(&source, &result);
                std::fs::write(&target, &result.bytes)
                    .with_context(|| format!("failed to write {}", target.display()))?;
                writeln!(
                    self.out,
                    "compressed {} -> {} ({} bytes, {})",
                    source.display(),
                    target.display(),
                    result.len(),
                    result.content_type
                )?;
            }
            Reply::Classified(Err(e)) => writeln!(self.out, "classify failed: {e}")?,
            Reply::Summarized(Err(e)) => writeln!(self.out, "summarize failed: {e}")?,
            Reply::Compressed { result: Err(e), .. } => {
                writeln!(self.out, "compress failed: {e}")?
            }
        }
        Ok(())
    }

    fn last_text(&self) -> Option<String> {
        self.console.log().all().last().map(|m| m.text.clone())
    }

    fn transcript(&self) -> String {
        self.console
            .log()
            .all()
            .iter()
            .map(|m| m.text.as_str())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Where a compressed copy of `source` is written: alongside it, with a
/// `.compressed` infix and the extension of the returned content type.
pub fn compressed_path(source: &Path, result: &CompressionResult) -> PathBuf {
    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "image".to_string());
    source.with_file_name(format!("{stem}.compressed.{}", result.extension()))
}
