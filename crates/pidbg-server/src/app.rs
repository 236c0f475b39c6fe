//! Main application orchestration.
//!
//! Starts the engine, the enabled samplers and the dashboard, then tears
//! them down in order on shutdown: samplers first, then the engine (which
//! drains its intake and closes every subscriber), then the HTTP server.

use crate::config::AppConfig;
use crate::error::AppResult;
use pidbg_core::AppInfo;
use pidbg_dashboard::{serve, AppState};
use pidbg_engine::{DispatcherHandle, Engine, QueryGateway};
use pidbg_sources::{
    detect_board, select_backend, spawn_sampler, NetworkSampler, PinSampler, SystemSampler,
};
use std::future::Future;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

/// Crate version plus the compiler that built this binary.
pub fn app_info() -> AppInfo {
    AppInfo {
        debugger_version: env!("CARGO_PKG_VERSION").to_string(),
        runtime_version: env!("PIDBG_RUSTC_VERSION").to_string(),
    }
}

/// Main application.
pub struct Application {
    config: AppConfig,
    engine: Engine,
    cancel: CancellationToken,
    samplers: Vec<JoinHandle<()>>,
}

impl Application {
    /// Validate the config and start the engine.
    pub fn new(config: AppConfig) -> AppResult<Self> {
        config.validate()?;

        let mut engine_config = config.engine_config();
        engine_config.board = detect_board();
        engine_config.app = app_info();
        let engine = Engine::start(engine_config);

        Ok(Self {
            config,
            engine,
            cancel: CancellationToken::new(),
            samplers: Vec::new(),
        })
    }

    pub fn gateway(&self) -> QueryGateway {
        self.engine.gateway()
    }

    pub fn handle(&self) -> DispatcherHandle {
        self.engine.handle()
    }

    /// Spawn one task per enabled sampler.
    pub async fn start_sources(&mut self) -> AppResult<()> {
        let sources = self.config.sources.clone();
        let handle = self.engine.handle();

        if sources.gpio_enabled {
            let backend = select_backend(sources.gpio_backend)?;
            let pins = sources.gpio_schema().into_values().collect();
            let mut sampler = PinSampler::new(backend, pins);
            sampler.setup().await?;
            if sampler.pins().is_empty() {
                warn!("No GPIO pins could be configured, GPIO sampler not started");
            } else {
                self.samplers.push(spawn_sampler(
                    sampler,
                    sources.gpio_period(),
                    handle.clone(),
                    self.cancel.child_token(),
                ));
            }
        }

        if sources.wifi_enabled || sources.bluetooth_enabled {
            let sampler = NetworkSampler::new(sources.wifi_enabled, sources.bluetooth_enabled);
            self.samplers.push(spawn_sampler(
                sampler,
                sources.network_period(),
                handle.clone(),
                self.cancel.child_token(),
            ));
        }

        if sources.system_health_enabled {
            self.samplers.push(spawn_sampler(
                SystemSampler::new(),
                sources.system_period(),
                handle,
                self.cancel.child_token(),
            ));
        }

        info!(
            gpio = sources.gpio_enabled,
            wifi = sources.wifi_enabled,
            bluetooth = sources.bluetooth_enabled,
            system_health = sources.system_health_enabled,
            samplers = self.samplers.len(),
            "Sources started"
        );
        Ok(())
    }

    /// Run until `shutdown` completes, serving the dashboard on `listener`.
    pub async fn run<F>(mut self, listener: TcpListener, shutdown: F) -> AppResult<()>
    where
        F: Future<Output = ()>,
    {
        self.engine.handle().broadcast_meta().await?;
        self.start_sources().await?;

        let state = AppState::new(
            self.engine.gateway(),
            self.engine.handle(),
            &self.config.dashboard,
        );
        let server_stop = CancellationToken::new();
        let mut server = tokio::spawn(serve(
            listener,
            state,
            server_stop.clone().cancelled_owned(),
        ));

        let server_result = tokio::select! {
            _ = shutdown => {
                info!("Shutdown signal received");
                None
            }
            result = &mut server => Some(result),
        };

        info!("Shutting down");
        self.cancel.cancel();
        for sampler in self.samplers.drain(..) {
            if let Err(e) = sampler.await {
                warn!(error = %e, "Sampler task ended abnormally");
            }
        }
        self.engine.shutdown().await;
        server_stop.cancel();

        let result = match server_result {
            Some(result) => result,
            None => server.await,
        };
        match result {
            Ok(served) => served?,
            Err(e) => warn!(error = %e, "Dashboard task ended abnormally"),
        }
        Ok(())
    }
}
