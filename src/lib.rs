use std::collections::BTreeMap;
use std::net::SocketAddr;
use std::thread::JoinHandle;
use log::{error, info};
use tokio::sync::oneshot::Sender;

pub mod res;
pub mod tiled;
pub mod dump;
pub mod http;
pub mod config;

use config::VersionResources;
use http::ServerError;


/// MediaServer runs the http media service on its own thread until stopped.
pub struct MediaServer {
    stop_signal: Sender<()>,
    handle: JoinHandle<Result<(), ServerError>>,
}


impl MediaServer {
    pub fn start(addr: SocketAddr, versions: BTreeMap<String, VersionResources>) -> Self {
        info!("start media server, {} versions", versions.len());
        let (http_stop_tx, http_stop_rx) = tokio::sync::oneshot::channel::<()>();

        let handle = std::thread::spawn(move || {
            http::http_server_service(addr, versions, http_stop_rx)
        });

        Self { stop_signal: http_stop_tx, handle }
    }

    pub fn is_running(&self) -> bool {
        !self.handle.is_finished()
    }

    /// Stops accepting connections, waits for running requests and returns the server outcome.
    pub fn stop(self) -> Result<(), ServerError> {
        info!("stop media server");
        // the receiver is gone when the server already failed
        self.stop_signal.send(()).ok();

        match self.handle.join() {
            Ok(result) => result,
            Err(_) => {
                error!("media server thread panicked");
                Err(ServerError::Panicked)
            }
        }
    }
}
