//! Control surface
//!
//! CAT commands and port lifecycle operations, shared by the `exec` and
//! `ports` subcommands and the console of a running service. Port changes
//! are mirrored into the settings so the next start provisions them.

use std::fmt::Write as _;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use cat_gateway::{GatewayContext, PortKind, PortManager, PortSpec, PAIR_OFFSET};
use tracing::warn;

use crate::settings::Settings;

/// One console or command-line operation
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ControlCommand {
    /// Run a CAT command and return its reply
    Execute(String),
    ListPorts,
    CreatePort { kind: PortKind, number: Option<u32> },
    DeletePort(u32),
    Help,
}

pub const HELP: &str = "\
<cmd>;                  execute a CAT command (FA; ZZIF; ...)
ports                   list ports
create <kind> [number]  create and open a pair
delete <number>         remove a pair by either number
help                    show this text";

impl ControlCommand {
    /// Parse a console line; blank lines give `None`
    pub fn parse(line: &str) -> Result<Option<Self>> {
        let line = line.trim();
        if line.is_empty() {
            return Ok(None);
        }
        if line.contains(';') {
            return Ok(Some(ControlCommand::Execute(line.to_string())));
        }

        let mut words = line.split_whitespace();
        let command = match words.next().unwrap_or_default().to_ascii_lowercase().as_str() {
            "ports" | "list" => ControlCommand::ListPorts,
            "create" => {
                let kind = words
                    .next()
                    .context("create needs a port kind")?
                    .parse::<PortKind>()?;
                let number = words
                    .next()
                    .map(|n| n.parse::<u32>().with_context(|| format!("bad port number {n}")))
                    .transpose()?;
                ControlCommand::CreatePort { kind, number }
            }
            "delete" => {
                let n = words.next().context("delete needs a port number")?;
                ControlCommand::DeletePort(
                    n.parse().with_context(|| format!("bad port number {n}"))?,
                )
            }
            "help" | "?" => ControlCommand::Help,
            other => bail!("unknown command '{other}' (CAT commands end in ';')"),
        };
        if let Some(extra) = words.next() {
            bail!("unexpected '{extra}'");
        }
        Ok(Some(command))
    }
}

/// Gateway, port manager and settings behind the control surface
pub struct Control {
    ctx: Arc<GatewayContext>,
    manager: PortManager,
    settings: Settings,
    serial: String,
    persist: bool,
}

impl Control {
    /// `serial` owns the ports created here; with `persist` every port
    /// change is saved to disk
    pub fn new(
        ctx: Arc<GatewayContext>,
        manager: PortManager,
        settings: Settings,
        serial: impl Into<String>,
        persist: bool,
    ) -> Self {
        Self {
            ctx,
            manager,
            settings,
            serial: serial.into(),
            persist,
        }
    }

    /// Open every persisted port; returns how many opened
    pub async fn provision(&mut self) -> usize {
        let radios = self.settings.radios.clone();
        self.manager.provision(&radios).await
    }

    #[cfg(test)]
    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    #[cfg(test)]
    pub fn manager(&self) -> &PortManager {
        &self.manager
    }

    /// Carry out one operation; returns the text to show
    pub async fn apply(&mut self, command: ControlCommand) -> Result<String> {
        match command {
            ControlCommand::Execute(text) => {
                let text = if text.ends_with(';') {
                    text
                } else {
                    format!("{text};")
                };
                Ok(self.ctx.processor.execute(&text).await)
            }
            ControlCommand::ListPorts => Ok(self.port_list()),
            ControlCommand::CreatePort { kind, number } => {
                let number = match number {
                    Some(n) => n,
                    None => self.manager.next_free_pair().context("no free port pair")?,
                };
                let spec = PortSpec::new(number, kind);
                let gateway = self.manager.create_port(spec.clone()).await?;
                self.settings.remember_port(&self.serial, spec);
                self.save();
                Ok(format!("{} port {}/{} created", kind.name(), number, gateway))
            }
            ControlCommand::DeletePort(number) => {
                self.manager.delete_port(number).await?;
                self.settings.forget_port(number);
                self.save();
                Ok(format!("port {} deleted", number))
            }
            ControlCommand::Help => Ok(HELP.to_string()),
        }
    }

    /// Parse and apply a console line; errors are reported as text
    pub async fn handle_line(&mut self, line: &str) -> Option<String> {
        let result = match ControlCommand::parse(line) {
            Ok(Some(command)) => self.apply(command).await,
            Ok(None) => return None,
            Err(e) => Err(e),
        };
        Some(result.unwrap_or_else(|e| format!("error: {e:#}")))
    }

    /// Close every port; pairs stay in place
    pub async fn shutdown(&mut self) {
        self.manager.shutdown().await;
    }

    fn port_list(&self) -> String {
        let ports = self.manager.ports();
        if ports.is_empty() {
            return "no ports".to_string();
        }
        let mut out = String::new();
        for info in ports {
            let _ = writeln!(
                out,
                "{}/{} {} {}",
                info.spec.number,
                info.spec.number + PAIR_OFFSET,
                info.spec.kind.name(),
                if info.open { "open" } else { "closed" }
            );
        }
        out.trim_end().to_string()
    }

    fn save(&self) {
        if !self.persist {
            return;
        }
        if let Err(e) = self.settings.save() {
            warn!("Port change not saved: {:#}", e);
        }
    }
}
