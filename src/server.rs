//! TCP query server.
//!
//! One accept loop, one short-lived task per client. A request is a single
//! exact command; the response is JSON. Anything else closes the
//! connection without a reply.
//!
//!   GET DATA STR        -> array of aircraft records
//!   GET STATISTICS STR  -> counter object
//!   GET FLIGHT_DB STR   -> persistent flight counters

use std::sync::Arc;

use parking_lot::{Mutex, RwLock};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, info};

use crate::aircraft::AircraftStore;
use crate::error::SpotsError;
use crate::flight_db::FlightDb;
use crate::stats::Stats;

pub struct QueryServer {
    store: Arc<RwLock<AircraftStore>>,
    stats: Arc<Stats>,
    flight_db: Option<Arc<Mutex<FlightDb>>>,
}

impl QueryServer {
    pub fn new(
        store: Arc<RwLock<AircraftStore>>,
        stats: Arc<Stats>,
        flight_db: Option<Arc<Mutex<FlightDb>>>,
    ) -> Self {
        Self {
            store,
            stats,
            flight_db,
        }
    }

    /// Bind the listening socket; failure here is fatal at startup.
    pub async fn bind(address: &str, port: u16) -> Result<TcpListener, SpotsError> {
        TcpListener::bind((address, port))
            .await
            .map_err(|e| SpotsError::ServerBind {
                addr: format!("{address}:{port}"),
                source: e,
            })
    }

    pub async fn serve(self: Arc<Self>, listener: TcpListener) {
        if let Ok(addr) = listener.local_addr() {
            info!("query server listening on {addr}");
        }
        loop {
            let (socket, peer) = match listener.accept().await {
                Ok(conn) => conn,
                Err(e) => {
                    debug!("accept failed: {e}");
                    continue;
                }
            };
            let server = Arc::clone(&self);
            tokio::spawn(async move {
                if let Err(e) = server.handle(socket).await {
                    debug!("query client {peer}: {e}");
                }
            });
        }
    }

    async fn handle(&self, mut socket: TcpStream) -> std::io::Result<()> {
        let mut buf = [0u8; 1024];
        let n = socket.read(&mut buf).await?;
        match self.respond(&buf[..n]) {
            Some(response) => socket.write_all(response.as_bytes()).await,
            // unknown command: close without a reply
            None => Ok(()),
        }
    }

    fn respond(&self, command: &[u8]) -> Option<String> {
        let value = match command {
            b"GET DATA STR" => serde_json::to_value(self.store.read().snapshot()).ok()?,
            b"GET STATISTICS STR" => self.stats.snapshot(),
            b"GET FLIGHT_DB STR" => match &self.flight_db {
                Some(db) => db.lock().to_json(),
                None => serde_json::json!({}),
            },
            _ => return None,
        };
        serde_json::to_string(&value).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn server() -> Arc<QueryServer> {
        let store = Arc::new(RwLock::new(AircraftStore::new(60, (0.0, 0.0))));
        Arc::new(QueryServer::new(store, Arc::new(Stats::new()), None))
    }

    #[test]
    fn statistics_query_returns_counters() {
        let response = server().respond(b"GET STATISTICS STR").unwrap();
        let value: Value = serde_json::from_str(&response).unwrap();
        assert!(value["df_total"].is_u64());
        assert!(value["valid_preambles"].is_u64());
    }

    #[test]
    fn data_query_returns_an_array() {
        let response = server().respond(b"GET DATA STR").unwrap();
        let value: Value = serde_json::from_str(&response).unwrap();
        assert!(value.as_array().unwrap().is_empty());
    }

    #[test]
    fn flight_db_query_without_db_is_empty_object() {
        let response = server().respond(b"GET FLIGHT_DB STR").unwrap();
        assert_eq!(response, "{}");
    }

    #[test]
    fn unknown_commands_get_no_reply() {
        assert!(server().respond(b"GET DATA").is_none());
        assert!(server().respond(b"get data str").is_none());
        assert!(server().respond(b"GET DATA STR\n").is_none());
        assert!(server().respond(b"").is_none());
    }

    #[tokio::test]
    async fn end_to_end_over_tcp() {
        let listener = QueryServer::bind("127.0.0.1", 0).await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(server().serve(listener));

        let mut client = TcpStream::connect(addr).await.unwrap();
        client.write_all(b"GET STATISTICS STR").await.unwrap();
        let mut response = Vec::new();
        client.read_to_end(&mut response).await.unwrap();
        let value: Value = serde_json::from_slice(&response).unwrap();
        assert_eq!(value["df_total"], 0);
    }
}
