use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use hickory_client::client::{AsyncClient, ClientHandle};
use hickory_client::op::ResponseCode;
use hickory_client::proto::error::ProtoError;
use hickory_client::proto::rr::dnssec::tsig::TSigner;
use hickory_client::proto::xfer::DnsResponse;
use hickory_client::rr::rdata::TXT;
use hickory_client::rr::{Name, RData, Record};
use hickory_client::tcp::TcpClientStream;
use hickory_client::udp::UdpClientStream;
use log::{debug, warn};
use tokio::net::{TcpStream, UdpSocket};
use tokio_util::sync::CancellationToken;

use crate::error::ClientError;
use crate::model::TsigCredentials;

/// What a single dynamic update call does to the TXT RRset at `fqdn`.
enum UpdateOp {
    AppendTxt { value: String, ttl: u32 },
    DeleteTxt,
}

/// A single-server, single-call authenticated dynamic DNS update client
/// (spec.md §4.1). Stateless across calls: constructing one does no I/O,
/// every call opens its own fresh UDP (and, on truncation, TCP) transport.
#[derive(Clone)]
pub struct Rfc2136Client {
    server: String,
    zone: Name,
    credentials: Arc<TsigCredentials>,
    timeout: Duration,
}

/// The coordinator's view of a per-server client: swappable for a fake in
/// tests so quorum logic can be exercised without real sockets.
#[async_trait]
pub trait DnsUpdateClient: Send + Sync {
    /// # Errors
    ///
    /// Will return `Err` if
    ///
    /// - the transport fails to connect or send within the call timeout.
    /// - the server's TSIG signature fails to verify, or the server rejects
    ///   our own signature.
    /// - the server returns a non-`NOERROR` RCODE.
    /// - `cancel` is cancelled before the call completes.
    async fn add_txt(
        &self,
        cancel: CancellationToken,
        fqdn: &Name,
        value: &str,
        ttl: u32,
    ) -> Result<(), ClientError>;

    /// # Errors
    ///
    /// Same failure modes as [`DnsUpdateClient::add_txt`].
    async fn delete_txt(&self, cancel: CancellationToken, fqdn: &Name) -> Result<(), ClientError>;
}

impl Rfc2136Client {
    pub fn new(
        server: impl Into<String>,
        zone: Name,
        credentials: Arc<TsigCredentials>,
        timeout: Duration,
    ) -> Self {
        Rfc2136Client {
            server: server.into(),
            zone,
            credentials,
            timeout,
        }
    }

    fn build_signer(&self) -> Result<TSigner, ClientError> {
        TSigner::new(
            self.credentials.secret.clone(),
            self.credentials.algorithm.to_hickory(),
            self.credentials.key_name.clone(),
            crate::model::TSIG_FUDGE_SECS,
        )
        .map_err(|e| ClientError::AuthFailure(format!("invalid TSIG key configuration: {e}")))
    }

    async fn resolve(&self) -> Result<SocketAddr, ClientError> {
        // A bare IPv6 literal (`2001:db8::1`) contains colons but no port; an
        // already-addressed `host:port` string (including a bracketed IPv6
        // literal) should pass through unchanged. Telling them apart by
        // counting colons is ambiguous, so this checks whether the whole
        // string parses as an IPv6 address first.
        let target = if self.server.parse::<std::net::Ipv6Addr>().is_ok() {
            format!("[{}]:53", self.server)
        } else if self.server.contains(':') {
            self.server.clone()
        } else {
            format!("{}:53", self.server)
        };
        tokio::net::lookup_host(&target)
            .await
            .map_err(|e| ClientError::SendFailure(format!("resolving {target}: {e}")))?
            .next()
            .ok_or_else(|| ClientError::SendFailure(format!("no address for {target}")))
    }

    async fn connect_udp(&self, addr: SocketAddr) -> Result<AsyncClient, ClientError> {
        let signer = self.build_signer()?;
        let stream = UdpClientStream::<UdpSocket, TSigner>::with_timeout_and_signer(
            addr,
            self.timeout,
            Some(Arc::new(signer)),
        );
        let (client, bg) = AsyncClient::connect(stream)
            .await
            .map_err(|e| ClientError::SendFailure(format!("udp connect to {addr}: {e}")))?;
        tokio::spawn(bg);
        Ok(client)
    }

    async fn connect_tcp(&self, addr: SocketAddr) -> Result<AsyncClient, ClientError> {
        let signer = self.build_signer()?;
        let stream = TcpClientStream::<TcpStream, TSigner>::with_timeout_and_signer(
            addr,
            self.timeout,
            Some(Arc::new(signer)),
        );
        let (client, bg) = AsyncClient::connect(stream)
            .await
            .map_err(|e| ClientError::SendFailure(format!("tcp connect to {addr}: {e}")))?;
        tokio::spawn(bg);
        Ok(client)
    }

    fn build_record(&self, fqdn: &Name, op: &UpdateOp) -> Record {
        match op {
            UpdateOp::AppendTxt { value, ttl } => {
                Record::from_rdata(fqdn.clone(), *ttl, RData::TXT(TXT::new(vec![value.clone()])))
            }
            UpdateOp::DeleteTxt => Record::from_rdata(fqdn.clone(), 0, RData::TXT(TXT::new(vec![]))),
        }
    }

    async fn send(
        &self,
        client: &mut AsyncClient,
        fqdn: &Name,
        op: &UpdateOp,
    ) -> Result<DnsResponse, ClientError> {
        let record = self.build_record(fqdn, op);
        let result = match op {
            UpdateOp::AppendTxt { .. } => client.append(record, self.zone.clone(), false).await,
            UpdateOp::DeleteTxt => client.delete_rrset(record, self.zone.clone()).await,
        };
        result.map_err(|e| classify_proto_error(&e))
    }

    async fn execute(&self, cancel: CancellationToken, fqdn: &Name, op: UpdateOp) -> Result<(), ClientError> {
        let server = self.server.clone();
        let attempt = async {
            let addr = self.resolve().await?;
            let mut client = self.connect_udp(addr).await?;
            let response = self.send(&mut client, fqdn, &op).await?;

            if response.header().truncated() {
                debug!("{server}: UDP response truncated, retrying over TCP");
                let mut client = self.connect_tcp(addr).await?;
                let response = self.send(&mut client, fqdn, &op).await?;
                interpret_response(&response)
            } else {
                interpret_response(&response)
            }
        };

        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(ClientError::Cancelled),
            res = tokio::time::timeout(self.timeout, attempt) => match res {
                Ok(inner) => inner,
                Err(_elapsed) => Err(ClientError::SendFailure(format!("{server}: timed out after {:?}", self.timeout))),
            },
        }
    }
}

#[async_trait]
impl DnsUpdateClient for Rfc2136Client {
    async fn add_txt(
        &self,
        cancel: CancellationToken,
        fqdn: &Name,
        value: &str,
        ttl: u32,
    ) -> Result<(), ClientError> {
        self.execute(
            cancel,
            fqdn,
            UpdateOp::AppendTxt {
                value: value.to_string(),
                ttl,
            },
        )
        .await
    }

    async fn delete_txt(&self, cancel: CancellationToken, fqdn: &Name) -> Result<(), ClientError> {
        self.execute(cancel, fqdn, UpdateOp::DeleteTxt).await
    }
}

/// Maps a response's RCODE (and, for `NOTAUTH`, the TSIG error field on any
/// TSIG RR in the additional section) to the client error taxonomy
/// (spec.md §4.1).
fn interpret_response(response: &DnsResponse) -> Result<(), ClientError> {
    let code = response.response_code();
    if code == ResponseCode::NoError {
        return Ok(());
    }
    if code == ResponseCode::NotAuth {
        let reason = tsig_error_reason(response).unwrap_or_else(|| code.to_string());
        return Err(ClientError::AuthFailure(reason));
    }
    Err(ClientError::UpdateRejected {
        code: u16::from(code),
        mnemonic: code.to_string(),
    })
}

fn tsig_error_reason(response: &DnsResponse) -> Option<String> {
    response.additionals().iter().find_map(|rr| match rr.data() {
        Some(RData::TSIG(tsig)) if tsig.error() != ResponseCode::NoError => Some(tsig.error().to_string()),
        _ => None,
    })
}

/// A `ProtoError` from the transport/TSIG layer itself (as opposed to a
/// successfully parsed, TSIG-verified response with a non-zero RCODE).
/// `hickory-client` verifies the response's own TSIG signature before
/// handing back a result; a verification failure surfaces here, not as a
/// `DnsResponse`.
fn classify_proto_error(e: &ProtoError) -> ClientError {
    let msg = e.to_string();
    if msg.to_lowercase().contains("tsig") {
        warn!("TSIG verification failed: {msg}");
        ClientError::AuthFailure(msg)
    } else {
        ClientError::SendFailure(msg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    fn client() -> Rfc2136Client {
        let credentials = Arc::new(TsigCredentials::new(
            Name::from_str("key.example.com.").unwrap(),
            crate::model::TsigAlgorithmKind::HmacSha256,
            b"sekrit".to_vec(),
        ));
        Rfc2136Client::new(
            "127.0.0.1:1".to_string(),
            Name::from_str("example.com.").unwrap(),
            credentials,
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_add_txt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fqdn = Name::from_str("_acme-challenge.app.example.com.").unwrap();
        let result = client().add_txt(cancel, &fqdn, "token", 60).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[tokio::test]
    async fn cancelled_token_short_circuits_delete_txt() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let fqdn = Name::from_str("_acme-challenge.app.example.com.").unwrap();
        let result = client().delete_txt(cancel, &fqdn).await;
        assert!(matches!(result, Err(ClientError::Cancelled)));
    }

    #[test]
    fn build_signer_succeeds_for_valid_key() {
        assert!(client().build_signer().is_ok());
    }

    /// Drives a real `Rfc2136Client::add_txt` against a bound-but-silent fake
    /// UDP server and inspects the captured wire message (spec.md §8
    /// scenario 1). The fake never replies, so the call itself times out;
    /// only the shape of the outgoing request is under test here.
    #[tokio::test]
    async fn add_txt_wire_message_matches_scenario_1() {
        use hickory_client::op::{Message, OpCode, UpdateMessage};
        use hickory_client::rr::{DNSClass, RecordType};

        let fake_server = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = fake_server.local_addr().unwrap();

        let credentials = Arc::new(TsigCredentials::new(
            Name::from_str("key.example.com.").unwrap(),
            crate::model::TsigAlgorithmKind::HmacSha256,
            b"sekrit".to_vec(),
        ));
        let target = Rfc2136Client::new(
            addr.to_string(),
            Name::from_str("example.com.").unwrap(),
            credentials,
            Duration::from_millis(200),
        );
        let fqdn = Name::from_str("_acme-challenge.app.example.com.").unwrap();

        let call = tokio::spawn(async move {
            target.add_txt(CancellationToken::new(), &fqdn, "tokenA", 60).await
        });

        let mut buf = [0u8; 512];
        let (n, _peer) = tokio::time::timeout(Duration::from_secs(2), fake_server.recv_from(&mut buf))
            .await
            .expect("fake server never received a request")
            .unwrap();

        let message = Message::from_vec(&buf[..n]).unwrap();
        assert_eq!(message.op_code(), OpCode::Update);

        let zones = UpdateMessage::zones(&message);
        assert_eq!(zones.len(), 1);
        assert_eq!(zones[0].name().to_string(), "example.com.");
        assert_eq!(zones[0].query_type(), RecordType::SOA);
        assert_eq!(zones[0].query_class(), DNSClass::IN);

        let updates = UpdateMessage::updates(&message);
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].name().to_string(), "_acme-challenge.app.example.com.");
        assert_eq!(updates[0].record_type(), RecordType::TXT);
        assert_eq!(updates[0].ttl(), 60);

        let has_tsig = message.additionals().iter().any(|rr| matches!(rr.data(), Some(RData::TSIG(_))));
        assert!(has_tsig, "expected a TSIG RR in the additional section");

        // The fake server never replies, so this always resolves to a
        // timeout error; only the captured request is under test.
        let _ = call.await;
    }
}
