//! Interactive chat session.
//!
//! Reads commands line by line and races them against live messages from the
//! current channel's subscription with `tokio::select!`. Bus failures are
//! printed as notices; only terminal I/O errors end the session.

use std::sync::Arc;

use chanlog_bus::{ChannelBus, Message, Subscription};
use chanlog_store::LogStore;
use chrono::FixedOffset;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

use crate::{CliError, Command, command::validate_nick, render};

/// Whether the session keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Read the next line.
    Continue,
    /// Leave the session.
    Quit,
}

/// One user's chat session over a shared bus.
pub struct ChatSession<S, W> {
    bus: Arc<ChannelBus<S>>,
    subscription: Subscription<S>,
    nick: String,
    offset: FixedOffset,
    out: W,
}

impl<S: LogStore, W: AsyncWrite + Unpin> ChatSession<S, W> {
    /// Session for `nick`, printing to `out` with clocks at `offset`.
    pub fn new(
        bus: Arc<ChannelBus<S>>,
        nick: impl Into<String>,
        offset: FixedOffset,
        out: W,
    ) -> Self {
        let subscription = Subscription::new(Arc::clone(&bus));
        Self { bus, subscription, nick: nick.into(), offset, out }
    }

    /// Current nickname.
    pub fn nick(&self) -> &str {
        &self.nick
    }

    /// Channel currently shown, if any.
    pub fn channel(&self) -> Option<&str> {
        self.subscription.channel()
    }

    /// Everything written so far.
    pub fn output(&self) -> &W {
        &self.out
    }

    /// Bootstrap the bus and enter the first channel.
    ///
    /// Enters `preferred` when given and known, otherwise the first default
    /// channel that exists, otherwise the first known channel.
    pub async fn start(&mut self, preferred: Option<&str>) -> Result<(), CliError> {
        let channels = self.bus.bootstrap().await;
        tracing::info!(count = channels.len(), "bootstrap complete");

        if let Some(name) = preferred.filter(|name| !channels.contains(*name)) {
            self.notice(format!("Canal desconhecido: {name}")).await?;
        }

        let initial = preferred
            .filter(|name| channels.contains(*name))
            .map(str::to_string)
            .or_else(|| {
                let defaults = &self.bus.config().default_channels;
                defaults.iter().find(|c| channels.contains(c.as_str())).cloned()
            })
            .or_else(|| channels.first().cloned());

        match initial {
            Some(channel) => self.join(&channel).await,
            None => self.notice("Nenhum canal disponível. Use /create <canal>").await,
        }
    }

    /// Run until `/quit` or end of input.
    pub async fn run<R: AsyncBufRead + Unpin>(&mut self, input: R) -> Result<(), CliError> {
        let mut lines = input.lines();

        loop {
            tokio::select! {
                line = lines.next_line() => {
                    let Some(line) = line? else { break };
                    let Some(command) = Command::parse(&line) else { continue };
                    if self.handle(command).await? == Flow::Quit {
                        return Ok(());
                    }
                },
                Some(message) = self.subscription.next() => self.show(&message).await?,
                _ = tokio::signal::ctrl_c() => break,
            }
        }

        self.subscription.cancel().await;
        Ok(())
    }

    /// Wait for the next live message and print it.
    ///
    /// Returns `false` when nothing is being tailed.
    pub async fn deliver_next(&mut self) -> Result<bool, CliError> {
        let Some(message) = self.subscription.next().await else {
            return Ok(false);
        };
        self.show(&message).await?;
        Ok(true)
    }

    /// Execute one command.
    pub async fn handle(&mut self, command: Command) -> Result<Flow, CliError> {
        match command {
            Command::Say(text) => self.say(&text).await?,
            Command::Join(channel) => self.join(&channel).await?,
            Command::Create(channel) => self.create(&channel).await?,
            Command::Channels => self.list_channels().await?,
            Command::Nick(nick) => self.change_nick(&nick).await?,
            Command::History => self.replay_history().await?,
            Command::Help => self.print(render::help_lines()).await?,
            Command::Usage(usage) => self.notice(format!("Uso: {usage}")).await?,
            Command::Unknown(name) => self.notice(format!("Comando desconhecido: /{name}")).await?,
            Command::Quit => {
                self.subscription.cancel().await;
                return Ok(Flow::Quit);
            },
        }
        Ok(Flow::Continue)
    }

    async fn say(&mut self, text: &str) -> Result<(), CliError> {
        let Some(channel) = self.subscription.channel().map(str::to_string) else {
            return self.notice("Nenhum canal selecionado").await;
        };

        // Own messages come back through the tail
        if !self.bus.publish(&channel, &self.nick, text).await {
            self.notice("Erro ao enviar mensagem").await?;
        }
        Ok(())
    }

    async fn join(&mut self, channel: &str) -> Result<(), CliError> {
        // Checked here so a typo does not drop the current channel
        if !self.bus.contains(channel) {
            return self.notice(format!("Canal desconhecido: {channel}")).await;
        }

        match self.subscription.select(channel).await {
            Ok(history) => {
                self.print(render::channel_banner(channel, &self.nick)).await?;
                for message in &history {
                    self.show(message).await?;
                }
                Ok(())
            },
            Err(e) => {
                tracing::warn!(channel, error = %e, "could not enter channel");
                self.notice(format!("Erro ao entrar no canal {channel}")).await
            },
        }
    }

    async fn create(&mut self, channel: &str) -> Result<(), CliError> {
        let channel = channel.trim();
        if self.bus.create_channel(channel).await {
            self.join(channel).await
        } else {
            self.notice("Erro ao criar canal").await
        }
    }

    async fn list_channels(&mut self) -> Result<(), CliError> {
        self.bus.discover_channels().await;
        let current = self.subscription.channel().map(str::to_string);

        let lines = self
            .bus
            .channels()
            .into_iter()
            .map(|name| {
                let marker = if current.as_deref() == Some(name.as_str()) { '*' } else { ' ' };
                format!("{marker} #{name}")
            })
            .collect::<Vec<_>>();

        self.print(lines).await
    }

    async fn change_nick(&mut self, nick: &str) -> Result<(), CliError> {
        let nick = match validate_nick(nick) {
            Ok(nick) => nick.to_string(),
            Err(e) => return self.notice(format!("✗ {e}")).await,
        };

        let old = std::mem::replace(&mut self.nick, nick);
        self.notice(format!("✓ Nickname alterado para '{}'", self.nick)).await?;

        if let Some(channel) = self.subscription.channel().map(str::to_string) {
            if !self.bus.announce_nickname_change(&channel, &old, &self.nick).await {
                self.notice("Erro ao anunciar novo nickname").await?;
            }
        }
        Ok(())
    }

    async fn replay_history(&mut self) -> Result<(), CliError> {
        let Some(channel) = self.subscription.channel().map(str::to_string) else {
            return self.notice("Nenhum canal selecionado").await;
        };

        for message in self.bus.history(&channel).await {
            self.show(&message).await?;
        }
        Ok(())
    }

    async fn show(&mut self, message: &Message) -> Result<(), CliError> {
        self.print(render::message_lines(message, &self.nick, self.offset)).await
    }

    async fn notice(&mut self, text: impl Into<String>) -> Result<(), CliError> {
        self.print([text.into()]).await
    }

    async fn print(&mut self, lines: impl IntoIterator<Item = String>) -> Result<(), CliError> {
        for line in lines {
            self.out.write_all(line.as_bytes()).await?;
            self.out.write_all(b"\n").await?;
        }
        self.out.flush().await?;
        Ok(())
    }
}
