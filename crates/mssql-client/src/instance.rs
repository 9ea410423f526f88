//! SQL Server Resolution Protocol (SSRP) named-instance lookup.
//!
//! Named instances (`Server=host\INSTANCENAME`) usually listen on a port
//! chosen at install time rather than the default 1433. The SQL Server
//! Browser service answers UDP broadcasts on port 1434 with a list of the
//! instances running on the host and the TCP port each one is bound to;
//! this module speaks that one-shot request/response to turn an instance
//! name into a port before the real TDS connection is opened.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::net::UdpSocket;
use tokio::time::timeout;

use crate::error::{Error, Result};

/// Well-known port the SQL Server Browser service listens on.
const SSRP_PORT: u16 = 1434;

/// Request byte that asks the browser service for the full instance list.
const SSRP_CLNT_UCAST_INSTANCE: u8 = 0x03;

/// Response message type for a `CLNT_UCAST_INSTANCE` reply.
const SSRP_SVR_RESP: u8 = 0x05;

/// Largest response the browser service can send (UDP datagram, padded).
const SSRP_MAX_RESPONSE: usize = 4096;

/// Resolve `instance_name` on `host` to a TCP port by querying the SQL
/// Server Browser service over UDP.
///
/// Returns `Error::Connection` if the browser service doesn't answer within
/// `resolve_timeout`, or if the instance isn't found in its response.
pub async fn resolve_instance_port(
    host: &str,
    instance_name: &str,
    resolve_timeout: Duration,
) -> Result<u16> {
    let socket = UdpSocket::bind("0.0.0.0:0")
        .await
        .map_err(|e| Error::Io(std::sync::Arc::new(e)))?;

    let addr: SocketAddr = format!("{host}:{SSRP_PORT}")
        .parse()
        .or_else(|_| resolve_to_socket_addr(host))
        .map_err(|_| Error::Connection(format!("cannot resolve host '{host}' for SSRP lookup")))?;

    timeout(resolve_timeout, socket.send_to(&[SSRP_CLNT_UCAST_INSTANCE], addr))
        .await
        .map_err(|_| Error::ConnectTimeout)?
        .map_err(|e| Error::Io(std::sync::Arc::new(e)))?;

    let mut buf = vec![0u8; SSRP_MAX_RESPONSE];
    let len = timeout(resolve_timeout, socket.recv(&mut buf))
        .await
        .map_err(|_| Error::ConnectTimeout)?
        .map_err(|e| Error::Io(std::sync::Arc::new(e)))?;
    buf.truncate(len);

    parse_ssrp_response(&buf, instance_name)
}

/// `host:1434` isn't always a numeric address; resolve it via the stdlib
/// synchronously (name resolution for a LAN instance lookup is cheap enough
/// not to warrant an async resolver dependency).
fn resolve_to_socket_addr(host: &str) -> std::io::Result<SocketAddr> {
    use std::net::ToSocketAddrs;
    format!("{host}:{SSRP_PORT}")
        .to_socket_addrs()?
        .next()
        .ok_or_else(|| std::io::Error::new(std::io::ErrorKind::NotFound, "no address found"))
}

/// Parse a `SVR_RESP` datagram and extract the `tcp` port for
/// `instance_name`.
///
/// Response layout: `u8 type (0x05)`, `u16 length` (little-endian), then
/// `length` bytes of ASCII payload. The payload is a sequence of
/// `;;`-separated instance records, each a `;`-separated flat list of
/// alternating keys and values (`ServerName;HOST;InstanceName;SQLEXPRESS;
/// IsClustered;No;Version;...;tcp;1433;...`).
fn parse_ssrp_response(buf: &[u8], instance_name: &str) -> Result<u16> {
    if buf.len() < 3 || buf[0] != SSRP_SVR_RESP {
        return Err(Error::Connection(
            "malformed SSRP response from SQL Server Browser service".to_string(),
        ));
    }

    let declared_len = u16::from_le_bytes([buf[1], buf[2]]) as usize;
    let payload = &buf[3..];
    let payload = &payload[..declared_len.min(payload.len())];
    let text = String::from_utf8_lossy(payload);

    for record in text.split(";;") {
        let fields: Vec<&str> = record.split(';').collect();
        let mut found_name = false;
        let mut port = None;

        let mut i = 0;
        while i + 1 < fields.len() {
            let key = fields[i];
            let value = fields[i + 1];
            if key.eq_ignore_ascii_case("InstanceName") && value.eq_ignore_ascii_case(instance_name) {
                found_name = true;
            }
            if key.eq_ignore_ascii_case("tcp") {
                port = value.parse::<u16>().ok();
            }
            i += 2;
        }

        if found_name {
            return port.ok_or_else(|| {
                Error::Connection(format!(
                    "instance '{instance_name}' found but has no tcp endpoint"
                ))
            });
        }
    }

    Err(Error::Connection(format!(
        "instance '{instance_name}' not found in SQL Server Browser response"
    )))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn build_response(payload: &str) -> Vec<u8> {
        let mut buf = vec![SSRP_SVR_RESP];
        buf.extend_from_slice(&(payload.len() as u16).to_le_bytes());
        buf.extend_from_slice(payload.as_bytes());
        buf
    }

    #[test]
    fn test_parse_finds_matching_instance() {
        let payload = "ServerName;HOST1;InstanceName;SQLEXPRESS;IsClustered;No;Version;15.0.2000.5;tcp;49172;;";
        let resp = build_response(payload);
        let port = parse_ssrp_response(&resp, "SQLEXPRESS").unwrap();
        assert_eq!(port, 49172);
    }

    #[test]
    fn test_parse_is_case_insensitive() {
        let payload = "ServerName;HOST1;InstanceName;sqlexpress;tcp;1433;;";
        let resp = build_response(payload);
        let port = parse_ssrp_response(&resp, "SqlExpress").unwrap();
        assert_eq!(port, 1433);
    }

    #[test]
    fn test_parse_multiple_instances_picks_right_one() {
        let payload = "ServerName;HOST1;InstanceName;MSSQLSERVER;tcp;1433;;ServerName;HOST1;InstanceName;SQLEXPRESS;tcp;49172;;";
        let resp = build_response(payload);
        let port = parse_ssrp_response(&resp, "SQLEXPRESS").unwrap();
        assert_eq!(port, 49172);
    }

    #[test]
    fn test_parse_missing_instance_errors() {
        let payload = "ServerName;HOST1;InstanceName;MSSQLSERVER;tcp;1433;;";
        let resp = build_response(payload);
        let err = parse_ssrp_response(&resp, "NONEXISTENT");
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_rejects_wrong_message_type() {
        let mut resp = build_response("InstanceName;SQLEXPRESS;tcp;1433;;");
        resp[0] = 0x00;
        let err = parse_ssrp_response(&resp, "SQLEXPRESS");
        assert!(err.is_err());
    }

    #[test]
    fn test_parse_instance_with_no_tcp_endpoint_errors() {
        let payload = "ServerName;HOST1;InstanceName;NP_ONLY;np;\\\\.\\pipe\\sql\\query;;";
        let resp = build_response(payload);
        let err = parse_ssrp_response(&resp, "NP_ONLY");
        assert!(err.is_err());
    }
}
