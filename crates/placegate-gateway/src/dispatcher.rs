use std::net::{Ipv4Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;

use anyhow::Result;
use socket2::{Domain, Protocol, Socket, Type};
use tracing::{error, info};

use placegate_db::Store;
use placegate_db::statement::QueryTemplate;
use placegate_types::models::Session;

use crate::GatewayConfig;
use crate::auth::CredentialValidator;
use crate::connection::{self, ConnectionContext};
use crate::pool::WorkerPool;
use crate::upstream::Upstream;

/// Queue slots per worker before submission blocks the accept loop.
const QUEUE_SLOTS_PER_WORKER: usize = 4;

/// The gateway front door: a single accept thread feeding the bounded
/// worker pool. Each accepted socket is stamped with a fresh session and
/// handled end-to-end by exactly one worker.
pub struct Gateway {
    config: GatewayConfig,
    store: Option<Arc<Store>>,
    upstream: Arc<dyn Upstream>,
}

impl Gateway {
    pub fn new(
        config: GatewayConfig,
        store: Option<Arc<Store>>,
        upstream: Arc<dyn Upstream>,
    ) -> Self {
        Self {
            config,
            store,
            upstream,
        }
    }

    /// Bind the listener and start the accept loop on its own thread.
    pub fn start(self) -> Result<GatewayHandle> {
        let listener = bind_listener(self.config.port)?;
        let addr = listener.local_addr()?;
        info!("Starting gateway on {addr}");

        let pool = Arc::new(WorkerPool::new(
            self.config.workers,
            self.config.workers * QUEUE_SLOTS_PER_WORKER,
        ));
        let shutdown = Arc::new(AtomicBool::new(false));

        let ctx = Arc::new(ConnectionContext {
            validator: CredentialValidator::new(self.store.clone(), self.config.allow_anonymous),
            store: self.store.clone(),
            upstream: self.upstream.clone(),
            search_template: QueryTemplate::searches(self.config.query_limit),
            result_template: QueryTemplate::results(self.config.query_limit),
        });

        let accept_shutdown = shutdown.clone();
        let accept_pool = pool.clone();
        let accept = std::thread::spawn(move || {
            accept_loop(listener, accept_shutdown, accept_pool, ctx);
        });

        Ok(GatewayHandle {
            addr,
            shutdown,
            accept: Some(accept),
            pool,
        })
    }
}

fn accept_loop(
    listener: TcpListener,
    shutdown: Arc<AtomicBool>,
    pool: Arc<WorkerPool>,
    ctx: Arc<ConnectionContext>,
) {
    loop {
        match listener.accept() {
            Ok((stream, peer)) => {
                if shutdown.load(Ordering::SeqCst) {
                    // Wake-up connection (or a racing client); not handled
                    drop(stream);
                    break;
                }
                info!("Accepted connection from {peer}");

                let session = Session::new();
                let ctx = ctx.clone();
                pool.execute(move || connection::handle(stream, session, &ctx));
            }
            Err(e) => {
                if shutdown.load(Ordering::SeqCst) {
                    break;
                }
                // Fatal to the listener, not the process
                error!("Error accepting connection: {e}");
                break;
            }
        }
    }
    // The listener closes when this thread returns
}

fn bind_listener(port: u16) -> Result<TcpListener> {
    let addr: SocketAddr = SocketAddr::new(Ipv4Addr::UNSPECIFIED.into(), port);
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.bind(&addr.into())?;
    socket.listen(128)?;
    Ok(socket.into())
}

/// Running gateway. Shutdown stops the accept loop first, then drains the
/// worker pool, so in-flight requests always deliver their responses.
pub struct GatewayHandle {
    addr: SocketAddr,
    shutdown: Arc<AtomicBool>,
    accept: Option<JoinHandle<()>>,
    pool: Arc<WorkerPool>,
}

impl GatewayHandle {
    pub fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Accepted connections still waiting for a worker.
    pub fn queue_depth(&self) -> usize {
        self.pool.queue_depth()
    }

    /// Stop accepting, drain in-flight work, release the pool. Blocks until
    /// everything already accepted has completed.
    pub fn shutdown(mut self) {
        self.shutdown.store(true, Ordering::SeqCst);

        // The accept thread is blocked in accept(); poke it so it can
        // observe the flag and exit, closing the listener
        let wake = SocketAddr::new(Ipv4Addr::LOCALHOST.into(), self.addr.port());
        let _ = TcpStream::connect(wake);

        if let Some(accept) = self.accept.take() {
            let _ = accept.join();
        }
        self.pool.shutdown();
        info!("Gateway shut down");
    }

    /// Block until the accept loop exits on its own (fatal accept error),
    /// then drain the pool.
    pub fn join(mut self) {
        if let Some(accept) = self.accept.take() {
            let _ = accept.join();
        }
        self.pool.shutdown();
    }
}
