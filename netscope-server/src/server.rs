use crate::config::NetScopeConfig;
use crate::gateway::Gateway;
use crate::rest;
use crate::rpc::RpcService;
use crate::rpc_server::RpcServer;
use anyhow::Context;
use axum::Router;
use netscope_core::CapabilityRegistry;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{error, info};

/// Runs the REST adapter and, when enabled, the RPC adapter.
#[derive(Debug)]
pub struct NetScopeServer {
    config: NetScopeConfig,
    gateway: Gateway,
}

impl NetScopeServer {
    pub fn new(config: NetScopeConfig, registry: Arc<CapabilityRegistry>) -> Self {
        let gateway = Gateway::new(registry, config.security.clone());
        NetScopeServer { config, gateway }
    }

    pub fn config(&self) -> &NetScopeConfig {
        &self.config
    }

    pub fn gateway(&self) -> &Gateway {
        &self.gateway
    }

    pub fn router(&self) -> Router {
        rest::router(self.gateway.clone(), &self.config.rest)
    }

    pub fn rpc_service(&self) -> RpcService {
        RpcService::new(self.gateway.clone())
    }

    /// Serve until Ctrl-C.
    pub async fn run(self) -> anyhow::Result<()> {
        self.run_until(shutdown_signal()).await
    }

    /// Serve until `shutdown` resolves. A misconfigured capability catalog
    /// fails here, before any listener is bound.
    pub async fn run_until(
        self,
        shutdown: impl Future<Output = ()> + Send + 'static,
    ) -> anyhow::Result<()> {
        let capabilities = self
            .gateway
            .registry()
            .scan()
            .context("capability scan failed")?
            .len();
        info!(capabilities, "Capabilities ready");

        let (stop, signal) = watch::channel(false);
        tokio::spawn(async move {
            shutdown.await;
            stop.send_replace(true);
        });

        let rest_addr = self.config.rest.addr();
        let rest_listener = TcpListener::bind(&rest_addr)
            .await
            .with_context(|| format!("failed to bind REST listener on {}", rest_addr))?;
        info!(addr = %rest_addr, docs = %self.config.rest.docs_path, "REST listener started");

        let rest = axum::serve(rest_listener, self.router())
            .with_graceful_shutdown(stopped(signal.clone()));

        if !self.config.rpc.enabled {
            rest.await.context("REST server failed")?;
            info!("NetScope server stopped");
            return Ok(());
        }

        let rpc_addr = self.config.rpc.addr();
        let rpc_listener = TcpListener::bind(&rpc_addr)
            .await
            .with_context(|| format!("failed to bind RPC listener on {}", rpc_addr))?;
        let rpc = RpcServer::new(self.rpc_service(), self.config.rpc.max_inbound_message_size);

        tokio::try_join!(
            async { rest.await.context("REST server failed") },
            async {
                rpc.serve(rpc_listener, stopped(signal.clone()))
                    .await
                    .context("RPC server failed")
            },
        )?;
        info!("NetScope server stopped");
        Ok(())
    }
}

/// Resolves once shutdown is published or the sender is gone.
async fn stopped(mut signal: watch::Receiver<bool>) {
    let _ = signal.wait_for(|stop| *stop).await;
}

async fn shutdown_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(e) => {
            error!(error = %e, "Failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    }
}
