//! Aerospike Cluster Adapter
//!
//! Implements `ClusterTopology`, `NodeConnector` and `EvictionExecutor` over
//! the Aerospike wire protocol.
//!
//! - Topology comes from the `node` and `peers-clear-std` info commands,
//!   asked fresh on every call.
//! - Remove-by-age runs the registered Lua UDF as a background query on
//!   every node, then polls `query-show` until each node reports the job done.
//! - UDF registration uses `udf-put` and waits until `udf-list` shows the
//!   module on every node.
//!
//! Authentication and TLS are not supported.

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use base64::Engine as _;
use bytes::{BufMut, Bytes, BytesMut};
use futures::future::try_join_all;
use parking_lot::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::info_protocol::{encode_frame, parse_peers, InfoConnection, AS_MESSAGE};
use crate::domain::ports::{ClusterTopology, EvictionExecutor, InfoSession, Node, NodeConnector};
use crate::error::{Error, Result};

/// Name of the Lua module on the server
pub const UDF_FILENAME: &str = "lru.lua";

/// Lua source of the remove-by-age module
pub const UDF_SOURCE: &str = include_str!("../../udf/lru.lua");

// =============================================================================
// Configuration
// =============================================================================

/// Connection and UDF settings
#[derive(Debug, Clone)]
pub struct AerospikeConfig {
    /// Seed host used for discovery
    pub seed_host: String,

    /// Seed port
    pub seed_port: u16,

    /// Connect and request timeout for every socket
    pub socket_timeout: Duration,

    /// UDF package holding the remove-by-age function
    pub udf_package: String,

    /// Function invoked per record with the cutoff as its only argument
    pub udf_function: String,

    /// Delay between job and registration status polls
    pub poll_interval: Duration,

    /// Upper bound for a background job to finish on every node
    pub job_timeout: Duration,
}

impl Default for AerospikeConfig {
    fn default() -> Self {
        Self {
            seed_host: "127.0.0.1".to_string(),
            seed_port: 3000,
            socket_timeout: Duration::from_secs(300),
            udf_package: "lru".to_string(),
            udf_function: "remove_old_object".to_string(),
            poll_interval: Duration::from_secs(1),
            job_timeout: Duration::from_secs(20 * 60),
        }
    }
}

impl AerospikeConfig {
    pub fn seed_address(&self) -> String {
        if self.seed_host.contains(':') && !self.seed_host.starts_with('[') {
            format!("[{}]:{}", self.seed_host, self.seed_port)
        } else {
            format!("{}:{}", self.seed_host, self.seed_port)
        }
    }
}

// =============================================================================
// Cluster Adapter
// =============================================================================

/// Aerospike cluster reached through a seed node
pub struct AerospikeCluster {
    config: AerospikeConfig,
    /// Addresses seen in the last successful discovery, tried when the seed is down
    known_addresses: Mutex<Vec<String>>,
}

impl AerospikeCluster {
    pub fn new(config: AerospikeConfig) -> Self {
        Self {
            config,
            known_addresses: Mutex::new(Vec::new()),
        }
    }

    pub fn config(&self) -> &AerospikeConfig {
        &self.config
    }

    /// Check that the seed answers. Used once at startup.
    pub async fn probe(&self) -> Result<Node> {
        let address = self.config.seed_address();
        let mut conn = InfoConnection::connect(&address, self.config.socket_timeout)
            .await
            .map_err(|e| Error::Startup(format!("cannot reach seed {}: {}", address, e)))?;
        let node_id = conn
            .info_one("node")
            .await
            .map_err(|e| Error::Startup(format!("seed {} did not identify: {}", address, e)))?;

        info!("Connected to Aerospike seed {} (node {})", address, node_id);
        Ok(Node::new(node_id.trim(), address))
    }

    /// Upload a Lua module and wait until every live node lists it.
    #[instrument(skip(self, source), fields(filename = %filename))]
    pub async fn register_udf(&self, filename: &str, source: &str, timeout: Duration) -> Result<()> {
        let command = udf_put_command(filename, source);

        let address = self.config.seed_address();
        let mut conn = InfoConnection::connect(&address, self.config.socket_timeout)
            .await
            .map_err(|e| Error::Startup(format!("UDF upload to {} failed: {}", address, e)))?;
        let reply = conn
            .info(&[command.as_str()])
            .await
            .map_err(|e| Error::Startup(format!("UDF upload to {} failed: {}", address, e)))?;

        if let Some(error) = reply.values().find(|v| v.contains("error=")) {
            return Err(Error::Startup(format!(
                "server rejected UDF {}: {}",
                filename, error
            )));
        }
        debug!("Uploaded UDF {} ({} bytes)", filename, source.len());

        let wait = async {
            loop {
                match self.udf_visible_everywhere(filename).await {
                    Ok(true) => return Ok::<(), Error>(()),
                    Ok(false) => {}
                    Err(e) => warn!("UDF registration check failed: {}", e),
                }
                tokio::time::sleep(self.config.poll_interval).await;
            }
        };

        tokio::time::timeout(timeout, wait).await.map_err(|_| {
            Error::Startup(format!("UDF {} not visible on all nodes after {:?}", filename, timeout))
        })?
    }

    async fn udf_visible_everywhere(&self, filename: &str) -> Result<bool> {
        let nodes = self.live_nodes().await?;
        for node in &nodes {
            let mut conn = InfoConnection::connect(&node.address, self.config.socket_timeout).await?;
            let listing = conn.info_one("udf-list").await?;
            if !udf_listed(&listing, filename) {
                debug!("UDF {} not yet visible on {}", filename, node);
                return Ok(false);
            }
        }
        Ok(!nodes.is_empty())
    }

    async fn discover_from(&self, address: &str) -> Result<Vec<Node>> {
        let mut conn = InfoConnection::connect(address, self.config.socket_timeout).await?;
        let mut reply = conn.info(&["node", "peers-clear-std"]).await?;

        let seed_id = reply
            .remove("node")
            .map(|id| id.trim().to_string())
            .filter(|id| !id.is_empty())
            .ok_or_else(|| Error::Protocol(format!("{} did not report its node id", address)))?;
        let peers = reply
            .remove("peers-clear-std")
            .ok_or_else(|| Error::Protocol(format!("{} did not report its peers", address)))?;

        let mut nodes = BTreeMap::new();
        nodes.insert(seed_id.clone(), Node::new(seed_id.as_str(), address));
        for peer in parse_peers(&peers)? {
            match peer.addresses.into_iter().next() {
                Some(addr) => {
                    nodes
                        .entry(peer.node_id.clone())
                        .or_insert_with(|| Node::new(peer.node_id.as_str(), addr));
                }
                None => warn!("Peer {} advertises no address, ignoring", peer.node_id),
            }
        }

        Ok(nodes.into_values().collect())
    }

    async fn start_background_udf(
        &self,
        node: &Node,
        namespace: &str,
        set_name: &str,
        cutoff_secs: u64,
        task_id: u64,
    ) -> Result<()> {
        let frame = encode_background_udf(&BackgroundUdf {
            namespace,
            set_name,
            package: &self.config.udf_package,
            function: &self.config.udf_function,
            cutoff_secs,
            task_id,
            timeout_ms: self.config.socket_timeout.as_millis().min(u32::MAX as u128) as u32,
        });

        let mut conn = InfoConnection::connect(&node.address, self.config.socket_timeout).await?;
        let reply = conn.call(&frame, AS_MESSAGE).await?;
        let code = result_code(&reply)?;
        if code != 0 {
            return Err(Error::Protocol(format!(
                "{} refused background UDF with result code {}",
                node, code
            )));
        }

        debug!("Background UDF task {} started on {}", task_id, node);
        Ok(())
    }

    async fn job_done(&self, node: &Node, task_id: u64) -> Result<bool> {
        let mut conn = InfoConnection::connect(&node.address, self.config.socket_timeout).await?;
        let status = conn.info_one(&format!("query-show:trid={}", task_id)).await?;
        Ok(job_finished(&status))
    }

    /// Poll `query-show` until every node reports `task_id` done, for at
    /// most `job_timeout`.
    async fn wait_for_job(&self, nodes: &[Node], task_id: u64) -> Result<()> {
        let poll = async {
            let mut pending: Vec<&Node> = nodes.iter().collect();
            while !pending.is_empty() {
                let mut still_running = Vec::with_capacity(pending.len());
                for node in pending {
                    if !self.job_done(node, task_id).await? {
                        still_running.push(node);
                    }
                }
                pending = still_running;
                if !pending.is_empty() {
                    tokio::time::sleep(self.config.poll_interval).await;
                }
            }
            Ok::<(), Error>(())
        };

        tokio::time::timeout(self.config.job_timeout, poll)
            .await
            .map_err(|_| Error::Timeout {
                operation: format!("background task {}", task_id),
            })?
    }
}

impl std::fmt::Debug for AerospikeCluster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AerospikeCluster")
            .field("seed", &self.config.seed_address())
            .field("known_addresses", &self.known_addresses.lock().len())
            .finish()
    }
}

#[async_trait]
impl ClusterTopology for AerospikeCluster {
    async fn live_nodes(&self) -> Result<Vec<Node>> {
        let seed = self.config.seed_address();
        let mut candidates = vec![seed.clone()];
        candidates.extend(
            self.known_addresses
                .lock()
                .iter()
                .filter(|a| **a != seed)
                .cloned(),
        );

        let mut last_error = None;
        for address in candidates {
            match self.discover_from(&address).await {
                Ok(nodes) => {
                    *self.known_addresses.lock() =
                        nodes.iter().map(|n| n.address.clone()).collect();
                    return Ok(nodes);
                }
                Err(e) => {
                    warn!("Discovery through {} failed: {}", address, e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| Error::Internal("no discovery candidates".to_string())))
    }
}

#[async_trait]
impl NodeConnector for AerospikeCluster {
    async fn connect(&self, node: &Node) -> Result<Box<dyn InfoSession>> {
        let conn = InfoConnection::connect(&node.address, self.config.socket_timeout).await?;
        Ok(Box::new(conn))
    }
}

#[async_trait]
impl EvictionExecutor for AerospikeCluster {
    #[instrument(skip(self))]
    async fn remove_older_than(
        &self,
        namespace: &str,
        set_name: &str,
        cutoff_secs: u64,
    ) -> Result<()> {
        let dispatch_error = |e: Error| Error::Dispatch {
            set_name: set_name.to_string(),
            reason: e.to_string(),
        };

        let nodes = self.live_nodes().await.map_err(dispatch_error)?;
        if nodes.is_empty() {
            return Err(dispatch_error(Error::Protocol("no live nodes".to_string())));
        }

        let task_id = Uuid::new_v4().as_u64_pair().0.max(1);
        try_join_all(nodes.iter().map(|node| {
            self.start_background_udf(node, namespace, set_name, cutoff_secs, task_id)
        }))
        .await
        .map_err(dispatch_error)?;

        info!(
            "Remove-by-age task {} running on {} node(s) for {}.{}",
            task_id,
            nodes.len(),
            namespace,
            set_name
        );
        self.wait_for_job(&nodes, task_id)
            .await
            .map_err(dispatch_error)
    }
}

// =============================================================================
// Message Encoding
// =============================================================================

const MSG_HEADER_LEN: u8 = 22;
const INFO2_WRITE: u8 = 1;

const FIELD_NAMESPACE: u8 = 0;
const FIELD_SET: u8 = 1;
const FIELD_TRAN_ID: u8 = 7;
const FIELD_UDF_PACKAGE: u8 = 30;
const FIELD_UDF_FUNCTION: u8 = 31;
const FIELD_UDF_ARGLIST: u8 = 32;
const FIELD_UDF_OP: u8 = 33;

const UDF_OP_BACKGROUND: u8 = 2;

/// Parameters of one background UDF query
#[derive(Debug, Clone)]
pub(crate) struct BackgroundUdf<'a> {
    pub namespace: &'a str,
    pub set_name: &'a str,
    pub package: &'a str,
    pub function: &'a str,
    pub cutoff_secs: u64,
    pub task_id: u64,
    pub timeout_ms: u32,
}

/// Encode a background query that applies `package.function(cutoff)` to
/// every record of the set.
pub(crate) fn encode_background_udf(udf: &BackgroundUdf<'_>) -> Bytes {
    let fields: [(u8, Vec<u8>); 7] = [
        (FIELD_NAMESPACE, udf.namespace.as_bytes().to_vec()),
        (FIELD_SET, udf.set_name.as_bytes().to_vec()),
        (FIELD_TRAN_ID, udf.task_id.to_be_bytes().to_vec()),
        (FIELD_UDF_PACKAGE, udf.package.as_bytes().to_vec()),
        (FIELD_UDF_FUNCTION, udf.function.as_bytes().to_vec()),
        (FIELD_UDF_ARGLIST, msgpack_int_list(&[udf.cutoff_secs])),
        (FIELD_UDF_OP, vec![UDF_OP_BACKGROUND]),
    ];

    let mut body = BytesMut::new();
    body.put_u8(MSG_HEADER_LEN);
    body.put_u8(0); // info1
    body.put_u8(INFO2_WRITE);
    body.put_u8(0); // info3
    body.put_u8(0); // unused
    body.put_u8(0); // result code
    body.put_u32(0); // generation
    body.put_u32(0); // record ttl
    body.put_u32(udf.timeout_ms);
    body.put_u16(fields.len() as u16);
    body.put_u16(0); // ops

    for (field_type, data) in &fields {
        body.put_u32(data.len() as u32 + 1);
        body.put_u8(*field_type);
        body.put_slice(data);
    }

    encode_frame(AS_MESSAGE, &body)
}

/// Msgpack array of unsigned integers, smallest encoding per value.
fn msgpack_int_list(values: &[u64]) -> Vec<u8> {
    let mut out = Vec::with_capacity(1 + values.len() * 9);
    match values.len() {
        n if n < 16 => out.push(0x90 | n as u8),
        n if n <= u16::MAX as usize => {
            out.push(0xdc);
            out.extend_from_slice(&(n as u16).to_be_bytes());
        }
        n => {
            out.push(0xdd);
            out.extend_from_slice(&(n as u32).to_be_bytes());
        }
    }

    for &v in values {
        if v < 0x80 {
            out.push(v as u8);
        } else if v <= u8::MAX as u64 {
            out.extend_from_slice(&[0xcc, v as u8]);
        } else if v <= u16::MAX as u64 {
            out.push(0xcd);
            out.extend_from_slice(&(v as u16).to_be_bytes());
        } else if v <= u32::MAX as u64 {
            out.push(0xce);
            out.extend_from_slice(&(v as u32).to_be_bytes());
        } else {
            out.push(0xcf);
            out.extend_from_slice(&v.to_be_bytes());
        }
    }
    out
}

/// Result code of an AS_MSG reply body.
fn result_code(body: &[u8]) -> Result<u8> {
    if body.len() < MSG_HEADER_LEN as usize {
        return Err(Error::Protocol(format!(
            "reply of {} bytes is shorter than a message header",
            body.len()
        )));
    }
    Ok(body[5])
}

/// Whether a `query-show` reply describes a finished job.
///
/// Unknown jobs count as finished; nodes drop job records after completion.
fn job_finished(status: &str) -> bool {
    if status.starts_with("ERROR:2") || status.contains("not found") {
        return true;
    }
    status
        .split(':')
        .find_map(|kv| kv.strip_prefix("status="))
        .map(|s| s.starts_with("done"))
        .unwrap_or(false)
}

/// `udf-put` info command carrying `source` as base64.
fn udf_put_command(filename: &str, source: &str) -> String {
    let content = base64::engine::general_purpose::STANDARD.encode(source);
    format!(
        "udf-put:filename={};content={};content-len={};udf-type=LUA;",
        filename,
        content,
        content.len()
    )
}

/// Whether a `udf-list` reply contains `filename`.
fn udf_listed(listing: &str, filename: &str) -> bool {
    listing
        .split(';')
        .flat_map(|entry| entry.split(','))
        .filter_map(|kv| kv.strip_prefix("filename="))
        .any(|name| name == filename)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::info_protocol::{
        decode_header, encode_frame, parse_info_response, read_frame, write_frame, INFO_MESSAGE,
    };
    use assert_matches::assert_matches;
    use tokio::net::TcpListener;

    #[test]
    fn test_config_default() {
        let config = AerospikeConfig::default();
        assert_eq!(config.seed_address(), "127.0.0.1:3000");
        assert_eq!(config.socket_timeout, Duration::from_secs(300));
        assert_eq!(config.udf_package, "lru");
        assert_eq!(config.udf_function, "remove_old_object");
        assert_eq!(config.job_timeout, Duration::from_secs(1200));
    }

    #[test]
    fn test_seed_address_brackets_ipv6() {
        let config = AerospikeConfig {
            seed_host: "::1".to_string(),
            ..Default::default()
        };
        assert_eq!(config.seed_address(), "[::1]:3000");
    }

    #[test]
    fn test_udf_source_defines_function() {
        assert!(UDF_SOURCE.contains("function remove_old_object(rec, ttl)"));
    }

    #[test]
    fn test_msgpack_int_encodings() {
        assert_eq!(msgpack_int_list(&[0]), vec![0x91, 0x00]);
        assert_eq!(msgpack_int_list(&[200]), vec![0x91, 0xcc, 200]);
        assert_eq!(msgpack_int_list(&[7200]), vec![0x91, 0xcd, 0x1c, 0x20]);
        assert_eq!(
            msgpack_int_list(&[86_400 * 365]),
            vec![0x91, 0xce, 0x01, 0xe1, 0x33, 0x80]
        );
    }

    #[test]
    fn test_background_udf_layout() {
        let frame = encode_background_udf(&BackgroundUdf {
            namespace: "persisted",
            set_name: "lru",
            package: "lru",
            function: "remove_old_object",
            cutoff_secs: 7200,
            task_id: 42,
            timeout_ms: 1000,
        });

        let mut header = [0u8; 8];
        header.copy_from_slice(&frame[..8]);
        let (msg_type, len) = decode_header(header).unwrap();
        assert_eq!(msg_type, AS_MESSAGE);
        assert_eq!(len, frame.len() - 8);

        let body = &frame[8..];
        assert_eq!(body[0], 22);
        assert_eq!(body[2], INFO2_WRITE);
        assert_eq!(u32::from_be_bytes([body[14], body[15], body[16], body[17]]), 1000);
        assert_eq!(u16::from_be_bytes([body[18], body[19]]), 7);
        assert_eq!(u16::from_be_bytes([body[20], body[21]]), 0);

        // First field: namespace
        assert_eq!(u32::from_be_bytes([body[22], body[23], body[24], body[25]]), 10);
        assert_eq!(body[26], FIELD_NAMESPACE);
        assert_eq!(&body[27..36], b"persisted");

        // Last field: background op
        assert_eq!(&body[body.len() - 6..], &[0, 0, 0, 2, FIELD_UDF_OP, UDF_OP_BACKGROUND]);
    }

    #[test]
    fn test_result_code() {
        let mut reply = vec![0u8; 22];
        assert_eq!(result_code(&reply).unwrap(), 0);
        reply[5] = 4;
        assert_eq!(result_code(&reply).unwrap(), 4);
        assert_matches!(result_code(&reply[..10]), Err(Error::Protocol(_)));
    }

    #[test]
    fn test_job_finished() {
        assert!(job_finished("trid=42:job-type=basic:status=done(ok):recs-succeeded=10"));
        assert!(!job_finished("trid=42:job-type=basic:status=active(ok):recs-succeeded=3"));
        assert!(job_finished("ERROR:2:job not found"));
        assert!(!job_finished(""));
    }

    #[test]
    fn test_udf_put_command_carries_base64_source() {
        let command = udf_put_command(UDF_FILENAME, "return 1\n");
        assert_eq!(
            command,
            "udf-put:filename=lru.lua;content=cmV0dXJuIDEK;content-len=12;udf-type=LUA;"
        );

        let content = command
            .split(';')
            .find_map(|part| part.strip_prefix("content="))
            .unwrap();
        let decoded = base64::engine::general_purpose::STANDARD
            .decode(content)
            .unwrap();
        assert_eq!(decoded, b"return 1\n");
    }

    #[test]
    fn test_udf_listed() {
        let listing = "filename=other.lua,hash=abc,type=LUA;filename=lru.lua,hash=def,type=LUA;";
        assert!(udf_listed(listing, "lru.lua"));
        assert!(!udf_listed(listing, "missing.lua"));
        assert!(!udf_listed("", "lru.lua"));
    }

    /// Answers info requests from a fixed table until the client hangs up.
    async fn spawn_info_node(replies: Vec<(&'static str, String)>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();

        tokio::spawn(async move {
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let replies = replies.clone();
                tokio::spawn(async move {
                    while let Ok(body) = read_frame(&mut socket, INFO_MESSAGE).await {
                        let mut out = String::new();
                        for key in String::from_utf8_lossy(&body).lines() {
                            if let Some((_, value)) = replies.iter().find(|(k, _)| *k == key) {
                                out.push_str(&format!("{}\t{}\n", key, value));
                            }
                        }
                        let frame = encode_frame(INFO_MESSAGE, out.as_bytes());
                        if write_frame(&mut socket, &frame).await.is_err() {
                            return;
                        }
                    }
                });
            }
        });

        address
    }

    fn cluster_for(address: &str) -> AerospikeCluster {
        let (host, port) = address.rsplit_once(':').unwrap();
        AerospikeCluster::new(AerospikeConfig {
            seed_host: host.to_string(),
            seed_port: port.parse().unwrap(),
            socket_timeout: Duration::from_secs(5),
            ..Default::default()
        })
    }

    #[tokio::test]
    async fn test_live_nodes_from_seed_and_peers() {
        let address = spawn_info_node(vec![
            ("node", "BB9010011AC4202".to_string()),
            (
                "peers-clear-std",
                "3,3000,[[BB9020011AC4202,,[10.0.0.2]],[BB9030011AC4202,,[10.0.0.3:3100]]]"
                    .to_string(),
            ),
        ])
        .await;
        let cluster = cluster_for(&address);

        let nodes = cluster.live_nodes().await.unwrap();

        assert_eq!(nodes.len(), 3);
        assert_eq!(nodes[0], Node::new("BB9010011AC4202", address.as_str()));
        assert_eq!(nodes[1].address, "10.0.0.2:3000");
        assert_eq!(nodes[2].address, "10.0.0.3:3100");
    }

    #[tokio::test]
    async fn test_session_reads_sets() {
        let address = spawn_info_node(vec![(
            "sets",
            "ns=persisted:set=lru:objects=12".to_string(),
        )])
        .await;
        let cluster = cluster_for(&address);

        let mut session = cluster
            .connect(&Node::new("A1", address.as_str()))
            .await
            .unwrap();
        let reply = session.request_info(&["sets"]).await.unwrap();

        assert_eq!(reply["sets"], "ns=persisted:set=lru:objects=12");
    }

    #[tokio::test]
    async fn test_unreachable_seed_fails_discovery() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let address = listener.local_addr().unwrap().to_string();
        drop(listener);

        let err = cluster_for(&address).live_nodes().await.unwrap_err();
        assert!(err.is_node_scoped(), "unexpected error: {:?}", err);
    }

    #[tokio::test]
    async fn test_stalled_job_times_out() {
        let address = spawn_info_node(vec![(
            "query-show:trid=42",
            "trid=42:job-type=basic:status=active(ok):recs-succeeded=3".to_string(),
        )])
        .await;
        let (host, port) = address.rsplit_once(':').unwrap();
        let cluster = AerospikeCluster::new(AerospikeConfig {
            seed_host: host.to_string(),
            seed_port: port.parse().unwrap(),
            socket_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_millis(20),
            job_timeout: Duration::from_millis(200),
            ..Default::default()
        });

        let err = cluster
            .wait_for_job(&[Node::new("A1", address.as_str())], 42)
            .await
            .unwrap_err();

        assert_matches!(err, Error::Timeout { .. });
    }

    #[tokio::test]
    async fn test_finished_job_returns() {
        let address = spawn_info_node(vec![(
            "query-show:trid=7",
            "trid=7:job-type=basic:status=done(ok):recs-succeeded=10".to_string(),
        )])
        .await;
        let cluster = cluster_for(&address);

        cluster
            .wait_for_job(&[Node::new("A1", address.as_str())], 7)
            .await
            .unwrap();
    }

    #[test]
    fn test_info_reply_helper_roundtrip() {
        let reply = parse_info_response(b"udf-list\tfilename=lru.lua,hash=1,type=LUA;\n");
        assert!(udf_listed(&reply["udf-list"], UDF_FILENAME));
    }
}
