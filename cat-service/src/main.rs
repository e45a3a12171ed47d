//! FlexCAT service
//!
//! Runs the CAT translation gateway: opens the persisted virtual ports,
//! serves the TCP CAT endpoint and keeps going until interrupted. The
//! `exec` and `ports` subcommands run single commands and port operations
//! against the same gateway.

mod cli;
mod control;
mod settings;
mod traffic;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use cat_detect::SystemPortProvider;
use cat_gateway::{
    run_tcp_endpoint, DescriptorTable, EndpointCommand, GatewayContext, PollConfig, PortManager,
};
use cat_sim::SimRadio;
use clap::Parser;
use cli::{Cli, Command, PortAction};
use control::{Control, ControlCommand};
use settings::Settings;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Radio link and context of a started gateway
struct Gateway {
    radio: Arc<SimRadio>,
    ctx: Arc<GatewayContext>,
    pump: JoinHandle<()>,
}

impl Gateway {
    fn start(settings: &Settings) -> Result<Self> {
        let descriptors = match &settings.descriptor_file {
            Some(path) => DescriptorTable::load(path)
                .with_context(|| format!("Failed to load descriptors from {}", path.display()))?,
            None => DescriptorTable::builtin(),
        };
        info!("{} command descriptors loaded", descriptors.len());

        let (radio, notifications) = SimRadio::start(settings.simulation.clone());
        info!("Using simulated radio {}", radio.serial());

        let ctx = GatewayContext::new(settings.gateway_config(), descriptors, radio.clone());
        let pump = ctx.spawn_notification_pump(notifications);
        Ok(Self { radio, ctx, pump })
    }

    /// Control surface over the host's ports
    fn control(&self, settings: &Settings) -> Control {
        let provider = Arc::new(SystemPortProvider::new(
            settings.port_name_template.clone(),
            settings.baud_rate,
        ));
        let manager = PortManager::new(provider, self.ctx.clone());
        Control::new(
            self.ctx.clone(),
            manager,
            settings.clone(),
            self.radio.serial(),
            true,
        )
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                "flexcat=info,cat_protocol=info,cat_detect=info,cat_gateway=info,cat_sim=info"
                    .into()
            }),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let settings = Settings::load();
    if Settings::settings_path().is_some_and(|p| !p.exists()) {
        if let Err(e) = settings.save() {
            warn!("Could not write default settings: {:#}", e);
        }
    }

    match cli.command.unwrap_or(Command::Run { console: false }) {
        Command::Run { console } => run(settings, console).await,
        Command::Exec { commands } => exec(settings, commands).await,
        Command::Ports { action } => ports(settings, action).await,
    }
}

async fn run(settings: Settings, console: bool) -> Result<()> {
    info!("Starting FlexCAT gateway");
    let gateway = Gateway::start(&settings)?;
    let traffic = tokio::spawn(traffic::run_traffic_log(gateway.ctx.subscribe_events()));

    let mut control = gateway.control(&settings);
    let opened = control.provision().await;
    info!("{} ports opened", opened);

    let endpoint = if settings.tcp_endpoint.enabled {
        let address = settings.tcp_endpoint.address();
        let listener = TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind TCP endpoint {}", address))?;
        let (cmd_tx, cmd_rx) = mpsc::channel(1);
        let task = tokio::spawn(run_tcp_endpoint(listener, gateway.ctx.clone(), cmd_rx));
        Some((cmd_tx, task))
    } else {
        None
    };

    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    if console {
        println!("{}", control::HELP);
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            tokio::select! {
                signal = &mut shutdown => {
                    signal.context("Failed to listen for shutdown signal")?;
                    break;
                }

                line = lines.next_line() => match line {
                    Ok(Some(line)) => {
                        if let Some(reply) = control.handle_line(&line).await {
                            println!("{}", reply);
                        }
                    }
                    Ok(None) => {
                        info!("Console closed");
                        (&mut shutdown)
                            .await
                            .context("Failed to listen for shutdown signal")?;
                        break;
                    }
                    Err(e) => {
                        warn!("Console read failed: {}", e);
                        (&mut shutdown)
                            .await
                            .context("Failed to listen for shutdown signal")?;
                        break;
                    }
                },
            }
        }
    } else {
        shutdown
            .await
            .context("Failed to listen for shutdown signal")?;
    }
    info!("Shutting down");

    if let Some((cmd_tx, task)) = endpoint {
        let _ = cmd_tx.send(EndpointCommand::Shutdown).await;
        let _ = task.await;
    }
    control.shutdown().await;
    gateway.pump.abort();
    traffic.abort();

    info!("FlexCAT gateway stopped");
    Ok(())
}

async fn exec(settings: Settings, commands: Vec<String>) -> Result<()> {
    let gateway = Gateway::start(&settings)?;
    let ctx = gateway.ctx.clone();

    let announced = PollConfig::new(100, Duration::from_millis(10))
        .wait_until(|| ctx.processor.state().has_slice(0))
        .await;
    if !announced {
        warn!("Radio has not announced a slice");
    }

    let mut control = gateway.control(&settings);
    for command in commands {
        let reply = control.apply(ControlCommand::Execute(command.clone())).await?;
        println!("{} {}", command, reply);
    }
    gateway.pump.abort();
    Ok(())
}

async fn ports(settings: Settings, action: PortAction) -> Result<()> {
    let gateway = Gateway::start(&settings)?;
    let mut control = gateway.control(&settings);
    control.provision().await;

    let command = match action {
        PortAction::List => ControlCommand::ListPorts,
        PortAction::Create { kind, number } => ControlCommand::CreatePort { kind, number },
        PortAction::Delete { number } => ControlCommand::DeletePort(number),
    };
    let result = control.apply(command).await;

    control.shutdown().await;
    gateway.pump.abort();
    println!("{}", result?);
    Ok(())
}
